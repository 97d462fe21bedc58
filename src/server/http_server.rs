use std::io;
use std::net::{SocketAddr, TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may::net::TcpListener;
use tracing::{error, info};

use super::ConnectionDriver;

/// Accept loop: binds a listener and spawns one coroutine per accepted
/// connection, each owning its driver iteration end to end.
pub struct HttpServer {
    driver: Arc<ConnectionDriver>,
}

/// Handle to a running server, for readiness probing, stopping and joining.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// The bound address, with the real port when `:0` was requested.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if StdTcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the accept loop. In-flight connection coroutines finish their
    /// current iteration on their own.
    pub fn stop(self) {
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl HttpServer {
    pub fn new(driver: ConnectionDriver) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }

    /// Bind `addr` and start accepting. Returns once the listener is live.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        info!("listening on {local_addr}");

        let driver = self.driver;
        let handle = may::go!(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let driver = driver.clone();
                        may::go!(move || driver.handle(stream));
                    }
                    Err(e) => error!("failed to accept connection: {e}"),
                }
            }
        });

        Ok(ServerHandle {
            addr: local_addr,
            handle,
        })
    }
}
