use crate::{
    errors::ApiError,
    http::{
        request::{Burst, Parser, Request},
        response::Response,
    },
    limits::ConnLimits,
    server::server_impl::Handler,
};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};

/// One accepted connection: read one burst, answer once, close.
pub(crate) struct HttpConnection<H: Handler> {
    handler: Arc<H>,

    parser: Parser,
    response: Response,

    conn_limits: ConnLimits,
}

impl<H: Handler> HttpConnection<H> {
    #[inline]
    pub(crate) fn new(handler: Arc<H>, conn_limits: ConnLimits) -> Self {
        Self {
            handler,

            parser: Parser::new(),
            response: Response::new(),

            conn_limits,
        }
    }

    pub(crate) async fn run(mut self, mut stream: TcpStream, addr: SocketAddr) {
        match self.impl_run(&mut stream, addr).await {
            Ok(true) => {}
            Ok(false) => log::debug!("Connection from {addr} closed without a request"),
            Err(err) => log::debug!("Connection from {addr} failed: {err}"),
        }
    }

    /// Returns `false` if the connection ended before a response was due.
    async fn impl_run(&mut self, stream: &mut TcpStream, addr: SocketAddr) -> io::Result<bool> {
        let Some(burst) = self.read_burst(stream).await? else {
            return Ok(false);
        };

        match burst {
            Burst::Closed => return Ok(false),
            Burst::TooLarge => {
                self.response.error(&ApiError::RequestTooLarge);
            }
            Burst::Data => {
                let max_headers = self.conn_limits.max_headers;
                let request = Request::parse_from(self.parser.buffer(), addr, max_headers);

                self.handler.handle(&request, &mut self.response).await;
            }
        }

        self.write_response(stream).await?;
        Ok(true)
    }

    /// `None` when the read timeout elapsed.
    async fn read_burst(&mut self, stream: &TcpStream) -> io::Result<Option<Burst>> {
        let max_size = self.conn_limits.max_request_size;
        let read = self.parser.fill_buffer(stream, max_size);

        match self.conn_limits.socket_read_timeout {
            Some(limit) => match timeout(limit, read).await {
                Ok(burst) => burst.map(Some),
                Err(_) => Ok(None),
            },
            None => read.await.map(Some),
        }
    }

    async fn write_response(&mut self, stream: &mut TcpStream) -> io::Result<()> {
        let bytes = self.response.to_bytes();

        let write = async {
            stream.write_all(&bytes).await?;
            stream.flush().await?;
            stream.shutdown().await
        };

        timeout(self.conn_limits.socket_write_timeout, write).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tools::*, Handled, StatusCode};
    use std::time::Duration;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    struct Echo;

    impl Handler for Echo {
        async fn handle(&self, req: &Request, resp: &mut Response) -> Handled {
            resp.status(StatusCode::Ok)
                .header("x-peer-loopback", req.client_addr().ip().is_loopback().to_string())
                .header("x-header-count", req.headers().len().to_string())
                .body(req.body())
        }
    }

    async fn serve_once(limits: ConnLimits) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            HttpConnection::new(Arc::new(Echo), limits).run(stream, peer).await;
        });

        (addr, task)
    }

    #[tokio::test]
    async fn one_request_then_close() {
        let (addr, task) = serve_once(ConnLimits::default()).await;

        let resp = send(addr.port(), b"POST / HTTP/1.1\r\n\r\nping").await;
        let (headers, body) = split_response(&resp);

        assert_eq!(body, b"ping");
        assert_eq!(header_value(&headers, "x-peer-loopback"), Some("true".into()));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn too_large() {
        let limits = ConnLimits {
            max_request_size: 16,
            ..ConnLimits::default()
        };
        let (addr, task) = serve_once(limits).await;

        let resp = send(addr.port(), b"POST / HTTP/1.1\r\n\r\n0123456789").await;
        let (_, body) = split_response(&resp);

        assert!(str_op(&resp).starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert_eq!(body, br#"{"error":"Request too large"}"#);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn header_cap() {
        let limits = ConnLimits {
            max_headers: 2,
            ..ConnLimits::default()
        };
        let (addr, task) = serve_once(limits).await;

        let resp = send(addr.port(), b"POST / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\nping").await;
        let (headers, body) = split_response(&resp);

        assert_eq!(body, b"ping");
        assert_eq!(header_value(&headers, "x-header-count"), Some("2".into()));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn closed_without_request() {
        let (addr, task) = serve_once(ConnLimits::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut resp = Vec::new();
        stream.read_to_end(&mut resp).await.unwrap();

        assert!(resp.is_empty());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn read_timeout() {
        let limits = ConnLimits {
            socket_read_timeout: Some(Duration::from_millis(50)),
            ..ConnLimits::default()
        };
        let (addr, task) = serve_once(limits).await;

        // Connected but silent
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut resp = Vec::new();
        stream.read_to_end(&mut resp).await.unwrap();

        assert!(resp.is_empty());
        task.await.unwrap();
    }
}
