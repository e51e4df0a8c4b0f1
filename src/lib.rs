//! control_rest - Loopback REST API over a live control plane
//!
//! A small hand-rolled HTTP/1.1 server that exposes named numeric controls
//! (`group` + `item`, e.g. `[Channel1]` / `volume`) and player state as
//! JSON. The values themselves live behind the [`ControlPlane`] and
//! [`PlayerRegistry`] traits; the server only reads and writes through them.
//!
//! # Endpoints
//!
//! | Method    | Path                          | Response                          |
//! |-----------|-------------------------------|-----------------------------------|
//! | `GET`     | `/api/status`                 | `{players: [...], master: {...}}` |
//! | `GET`     | `/api/player/{group}`         | player status                     |
//! | `GET`     | `/api/control/{group}/{item}` | `{group, item, value}`            |
//! | `POST`    | `/api/control/{group}/{item}` | `{success, group, item, value}`   |
//! | `OPTIONS` | any                           | `204 No Content`                  |
//!
//! Group names may be given with or without brackets, `Channel1` and
//! `[Channel1]` address the same group.
//!
//! # Connection model
//!
//! - Binds `127.0.0.1` only
//! - One request per connection, then the connection is closed
//! - The request is read as a single burst of bytes, see [`limits::ConnLimits`]
//! - Every response carries `Content-Length` and permissive CORS headers
//!
//! # Examples
//!
//! ```no_run
//! use control_rest::{
//!     memory::{seed_demo, MemoryControls, MemoryPlayers},
//!     Api, Server,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let controls = Arc::new(MemoryControls::new());
//!     let players = Arc::new(MemoryPlayers::new());
//!     seed_demo(&controls, &players);
//!
//!     let mut server = Server::builder()
//!         .handler(Api::new(controls, players))
//!         .build();
//!
//!     if server.start(8080).is_ok() {
//!         tokio::signal::ctrl_c().await.unwrap();
//!     }
//! }
//! ```
//! Custom handler:
//! ```no_run
//! use control_rest::{Handled, Handler, Request, Response, Server, StatusCode};
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     async fn handle(&self, req: &Request, resp: &mut Response) -> Handled {
//!         match req.path() {
//!             "/ping" => resp.status(StatusCode::Ok).body(r#"{"pong":true}"#),
//!             _ => resp.status(StatusCode::NotFound).body(r#"{"error":"Not Found"}"#),
//!         }
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut server = Server::builder().handler(MyHandler).build();
//!     server.start(0).unwrap();
//!     println!("listening on {}", server.port());
//! }
//! ```

pub mod api {
    pub mod control;
    pub mod handlers;
    pub mod router;
}
pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub mod errors;
pub mod limits;
pub mod memory;

pub use crate::{
    api::{
        control::{ControlPlane, PlayerRegistry, Track},
        handlers::Api,
        router::{normalize_group, route, Route},
    },
    errors::{ApiError, ServerError},
    http::{
        request::Request,
        response::{Handled, Response},
        types::{percent_decode, HeaderMap, Method, StatusCode},
    },
    server::server_impl::{Handler, Server, ServerBuilder},
};
