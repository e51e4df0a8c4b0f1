//! Server configuration limits and timeouts
//!
//! # Examples
//!
//! ```no_run
//! use control_rest::{
//!     limits::{ConnLimits, ServerLimits},
//!     memory::{MemoryControls, MemoryPlayers},
//!     Api, Server,
//! };
//! use std::{sync::Arc, time::Duration};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let api = Api::new(
//!         Arc::new(MemoryControls::new()),
//!         Arc::new(MemoryPlayers::new()),
//!     );
//!
//!     let mut server = Server::builder()
//!         .handler(api)
//!         .server_limits(ServerLimits {
//!             backlog: 64,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Some(Duration::from_secs(5)),
//!             ..ConnLimits::default()
//!         })
//!         .build();
//!
//!     server.start(8080).unwrap();
//! }
//! ```

use std::time::Duration;

/// Default TCP port of the REST server.
pub const DEFAULT_PORT: u16 = 8080;

/// Default for [`ConnLimits::max_headers`].
pub const DEFAULT_MAX_HEADERS: usize = 64;

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Length of the kernel's pending-connection queue (default: `128`).
    pub backlog: i32,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            backlog: 128,

            _priv: (),
        }
    }
}

/// Per-connection limits and timeouts.
///
/// Each connection serves exactly one request. The request must arrive as one
/// burst of bytes: everything readable when the socket first becomes readable
/// is treated as the complete request.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Largest request burst accepted, in bytes (default: `64 KiB`).
    ///
    /// Larger requests are answered with `413 Payload Too Large`.
    pub max_request_size: usize,

    /// How long to wait for the request bytes (default: `None`).
    ///
    /// With `None` a connection that never sends anything stays open until
    /// the peer goes away. With a timeout it is closed without a response.
    pub socket_read_timeout: Option<Duration>,

    /// Distinct header names kept per request (default: `64`).
    ///
    /// Further header lines are ignored; the body is still found.
    pub max_headers: usize,

    /// Upper bound on writing the response (default: `5s`).
    pub socket_write_timeout: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            max_request_size: 64 * 1024,
            socket_read_timeout: None,
            max_headers: DEFAULT_MAX_HEADERS,
            socket_write_timeout: Duration::from_secs(5),

            _priv: (),
        }
    }
}
