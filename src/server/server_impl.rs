use crate::{
    errors::ServerError,
    http::{
        request::Request,
        response::{Handled, Response},
    },
    limits::{ConnLimits, ServerLimits},
    server::connection::HttpConnection,
};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    future::{poll_fn, Future},
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::sleep as tokio_sleep,
};

/// Listening socket shared with the accept task. `None` once stopped.
type ListenerSlot = Arc<Mutex<Option<TcpListener>>>;

/// A trait for handling HTTP requests and generating responses.
///
/// Use `&self` for shared data such as the control plane handles. A fresh
/// [`Response`] is passed for every request.
///
/// # Examples
///
/// ```
/// use control_rest::{Handled, Handler, Request, Response, StatusCode};
///
/// struct MyHandler;
///
/// impl Handler for MyHandler {
///     async fn handle(&self, req: &Request, resp: &mut Response) -> Handled {
///         if req.path() == "/echo" {
///             resp.status(StatusCode::Ok).body("Echo response")
///         } else {
///             resp.status(StatusCode::NotFound).body("Not found :(")
///         }
///     }
/// }
/// ```
pub trait Handler
where
    Self: Sync + Send + 'static,
{
    /// Processes an HTTP request and generates a response.
    ///
    /// Implementations handle their errors internally and set an
    /// appropriate status code. A panic terminates only this connection,
    /// the server keeps accepting.
    fn handle(
        &self,
        request: &Request,
        response: &mut Response,
    ) -> impl Future<Output = Handled> + Send;
}

/// Loopback HTTP server that can be started and stopped repeatedly.
///
/// Each accepted connection runs in its own task and serves exactly one
/// request.
///
/// # Examples
///
/// ```no_run
/// use control_rest::{memory::{MemoryControls, MemoryPlayers}, Api, Server};
/// use std::sync::Arc;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let api = Api::new(Arc::new(MemoryControls::new()), Arc::new(MemoryPlayers::new()));
///     let mut server = Server::builder().handler(api).build();
///
///     server.start(8080).unwrap();
///     assert!(server.is_running());
///
///     tokio::signal::ctrl_c().await.unwrap();
///     server.stop();
/// }
/// ```
pub struct Server<H: Handler> {
    handler: Arc<H>,
    server_limits: ServerLimits,
    conn_limits: ConnLimits,

    running: Option<Running>,
    port: u16,
}

struct Running {
    listener: ListenerSlot,
    accept_task: JoinHandle<()>,
}

impl<H: Handler> Server<H> {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder<H> {
        ServerBuilder {
            handler: None,
            server_limits: None,
            connection_limits: None,
        }
    }

    /// Binds `127.0.0.1:port` and begins accepting connections in a
    /// background task. Port `0` picks an ephemeral port, see [`port`](Self::port).
    ///
    /// Failures are logged and returned; the caller decides whether they
    /// are fatal.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, port: u16) -> Result<(), ServerError> {
        if self.running.is_some() {
            log::warn!("REST API server already running on port {}", self.port);
            return Err(ServerError::AlreadyRunning(self.port));
        }

        let (listener, bound) = match self.bind(port) {
            Ok(value) => value,
            Err(source) => {
                let err = ServerError::Bind { port, source };
                log::warn!("{err}");
                return Err(err);
            }
        };

        let listener: ListenerSlot = Arc::new(Mutex::new(Some(listener)));
        let accept_task = tokio::spawn(Self::accept_loop(
            listener.clone(),
            self.handler.clone(),
            self.conn_limits.clone(),
        ));

        self.port = bound;
        self.running = Some(Running {
            listener,
            accept_task,
        });

        log::info!("REST API server started on http://127.0.0.1:{bound}");
        Ok(())
    }

    /// Stops accepting connections. Connections already accepted are
    /// served to completion. Calling `stop` on a stopped server does nothing.
    ///
    /// The listening socket is closed before `stop` returns, so the port
    /// can be bound again right away.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            drop(running.listener.lock().take());
            running.accept_task.abort();
            log::info!("REST API server stopped");
        }
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Port of the most recent successful [`start`](Self::start), `0` if
    /// the server was never started.
    #[inline(always)]
    pub fn port(&self) -> u16 {
        self.port
    }

    fn bind(&self, port: u16) -> Result<(TcpListener, u16), io::Error> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(self.server_limits.backlog)?;
        socket.set_nonblocking(true)?;

        let listener = TcpListener::from_std(socket.into())?;
        let bound = listener.local_addr()?.port();

        Ok((listener, bound))
    }

    async fn accept_loop(listener: ListenerSlot, handler: Arc<H>, limits: ConnLimits) {
        while let Some(accepted) = poll_fn(|cx| Self::poll_accept(&listener, cx)).await {
            match accepted {
                Ok((stream, addr)) => {
                    log::debug!("Accepted connection from {addr}");

                    let conn = HttpConnection::new(handler.clone(), limits.clone());
                    tokio::spawn(conn.run(stream, addr));
                }
                Err(err) => {
                    log::warn!("Failed to accept connection: {err}");
                    // Out of descriptors and similar errors persist for a while
                    tokio_sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// `Ready(None)` once [`stop`](Self::stop) has taken the listener.
    fn poll_accept(
        listener: &ListenerSlot,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<(TcpStream, SocketAddr)>>> {
        match listener.lock().as_ref() {
            Some(listener) => listener.poll_accept(cx).map(Some),
            None => Poll::Ready(None),
        }
    }
}

impl<H: Handler> Drop for Server<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder<H: Handler> {
    handler: Option<Arc<H>>,
    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
}

impl<H: Handler> ServerBuilder<H> {
    /// Sets the request handler that will process incoming requests.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Configures the listening socket.
    ///
    /// # Examples
    ///
    /// ```
    /// # use control_rest::{memory::{MemoryControls, MemoryPlayers}, Api};
    /// # use std::sync::Arc;
    /// # let api = Api::new(Arc::new(MemoryControls::new()), Arc::new(MemoryPlayers::new()));
    /// use control_rest::{limits::ServerLimits, Server};
    ///
    /// let server = Server::builder()
    ///     .handler(api)
    ///     .server_limits(ServerLimits {
    ///         backlog: 16,
    ///         ..ServerLimits::default() // Required line
    ///     })
    ///     .build();
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures per-connection limits and timeouts.
    ///
    /// # Examples
    ///
    /// ```
    /// # use control_rest::{memory::{MemoryControls, MemoryPlayers}, Api};
    /// # use std::sync::Arc;
    /// # let api = Api::new(Arc::new(MemoryControls::new()), Arc::new(MemoryPlayers::new()));
    /// use control_rest::{limits::ConnLimits, Server};
    /// use std::time::Duration;
    ///
    /// let server = Server::builder()
    ///     .handler(api)
    ///     .connection_limits(ConnLimits {
    ///         max_request_size: 8 * 1024,
    ///         socket_read_timeout: Some(Duration::from_secs(5)),
    ///         ..ConnLimits::default() // Required line
    ///     })
    ///     .build();
    /// ```
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Finalizes the builder. The server is created stopped.
    ///
    /// # Panics
    ///
    /// Error message: ``The `handler` method must be called to create``
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server<H> {
        Server {
            handler: self
                .handler
                .expect("The `handler` method must be called to create"),
            server_limits: self.server_limits.unwrap_or_default(),
            conn_limits: self.connection_limits.unwrap_or_default(),

            running: None,
            port: 0,
        }
    }
}
