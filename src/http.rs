//! HTTP interface
//!
//! Verb-to-operation mapping over a single blob store:
//!
//! - `PUT /<any path>` - store the request body, answer 201 with the
//!   blob's location in the `Location` header (200 on the defensive
//!   collision branch)
//! - `GET /<location>` - stream a stored blob back with a sniffed
//!   content-type
//! - `DELETE /<location>` - remove a stored blob, 204
//! - `GET /health` - liveness check
//!
//! Any other method is 405 with an `Allow` header. Upload bodies stream
//! to disk frame-by-frame and blob responses stream from disk, so neither
//! direction ever holds a whole payload in memory.
//!
//! ## Example Usage
//!
//! ```bash
//! # Store a blob
//! curl -X PUT --data-binary @photo.png http://localhost:8090/photo.png
//! # -> Location: /2024-01-02/03/9f8e7d6c-....png
//!
//! # Retrieve it
//! curl http://localhost:8090/2024-01-02/03/9f8e7d6c-....png > photo.png
//!
//! # Remove it
//! curl -X DELETE http://localhost:8090/2024-01-02/03/9f8e7d6c-....png
//! ```

use crate::blob_store::{Blob, BlobStore, PutOutcome};
use crate::error::StoreError;
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use http_body_util::{BodyExt, BodyStream, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

/// Response body: small full buffers for statuses, a lazy file stream for
/// blob reads.
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, std::io::Error>;

/// `Server` header value.
const SERVER_ID: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Read chunk size for streamed blob responses.
const READ_CHUNK: usize = 32 * 1024;

/// HTTP server state
pub struct HttpServer {
    store: Arc<BlobStore>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(store: Arc<BlobStore>, bind_addr: SocketAddr) -> Self {
        Self { store, bind_addr }
    }

    /// Run the accept loop, one http1 connection per task.
    pub async fn run(self: Arc<Self>) -> Result<(), StoreError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "connection error");
                }
            });
        }
    }

    /// Dispatch one request. This is the seam between the connection loop
    /// and the store; the test suite enters here with in-memory bodies.
    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<BoxBody>, hyper::Error>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "incoming request");

        let result = match (method, path.as_str()) {
            (Method::GET, "/health") => self.handle_health(),
            (Method::PUT, _) => self.handle_put(req, &path).await,
            (Method::GET, _) => self.handle_get(&path).await,
            (Method::DELETE, _) => self.handle_delete(&path).await,
            _ => Ok(method_not_allowed()),
        };

        Ok(match result {
            Ok(response) => response,
            Err(e) => error_response(&path, e),
        })
    }

    /// PUT - store the request body, report the new location.
    async fn handle_put<B>(
        &self,
        req: Request<B>,
        path: &str,
    ) -> Result<Response<BoxBody>, StoreError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let body = BodyStream::new(req.into_body())
            .map(|frame| frame.map(|f| f.into_data().unwrap_or_default()));

        let outcome = self.store.put(path, body).await?;
        let status = match &outcome {
            PutOutcome::Created { .. } => StatusCode::CREATED,
            PutOutcome::AlreadyExists { .. } => StatusCode::OK,
        };

        Ok(Response::builder()
            .status(status)
            .header(header::SERVER, SERVER_ID)
            .header(header::LOCATION, outcome.location())
            .header(header::CONTENT_LENGTH, 0)
            .body(empty_body())
            .unwrap())
    }

    /// GET - stream a stored blob back.
    async fn handle_get(&self, path: &str) -> Result<Response<BoxBody>, StoreError> {
        let Blob {
            file,
            len,
            content_type,
        } = self.store.get(path).await?;

        let stream = ReaderStream::with_capacity(file, READ_CHUNK);
        let body = BodyExt::boxed(StreamBody::new(stream.map_ok(Frame::data)));

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::SERVER, SERVER_ID)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, len)
            .body(body)
            .unwrap())
    }

    /// DELETE - remove a stored blob.
    async fn handle_delete(&self, path: &str) -> Result<Response<BoxBody>, StoreError> {
        self.store.delete(path).await?;
        Ok(empty_response(StatusCode::NO_CONTENT))
    }

    /// Liveness check.
    fn handle_health(&self) -> Result<Response<BoxBody>, StoreError> {
        let body = serde_json::json!({
            "status": "ok",
            "store_root": self.store.root().display().to_string(),
        });

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::SERVER, SERVER_ID)
            .header(header::CONTENT_TYPE, "application/json")
            .body(full_body(body.to_string()))
            .unwrap())
    }
}

/// Map a store error onto the response taxonomy: the empty-body rejection
/// is the only client error, unresolvable blobs are 404, everything else
/// escalates as a server error.
fn error_response(path: &str, err: StoreError) -> Response<BoxBody> {
    let status = match &err {
        StoreError::EmptyBody => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) | StoreError::InvalidPath(_) => StatusCode::NOT_FOUND,
        StoreError::Body(_) | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(path = %path, error = %err, "request failed");
    } else {
        debug!(path = %path, error = %err, "request rejected");
    }

    empty_response(status)
}

fn method_not_allowed() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(header::SERVER, SERVER_ID)
        .header(header::ALLOW, "GET, PUT, DELETE")
        .header(header::CONTENT_LENGTH, 0)
        .body(empty_body())
        .unwrap()
}

fn empty_response(status: StatusCode) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header(header::SERVER, SERVER_ID)
        .header(header::CONTENT_LENGTH, 0)
        .body(empty_body())
        .unwrap()
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server() -> (HttpServer, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(BlobStore::new(temp.path()));
        let server = HttpServer::new(store, "127.0.0.1:0".parse().unwrap());
        (server, temp)
    }

    fn request(method: Method, path: &str, body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    #[tokio::test]
    async fn unsupported_verb_is_405_with_allow() {
        let (server, _temp) = server();

        let response = server
            .handle(request(Method::POST, "/x.bin", b"payload"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(header::ALLOW).unwrap(),
            "GET, PUT, DELETE"
        );
    }

    #[tokio::test]
    async fn responses_identify_the_server() {
        let (server, _temp) = server();

        let response = server
            .handle(request(Method::GET, "/health", b""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(header::SERVER).unwrap();
        assert!(id.to_str().unwrap().starts_with("stowage/"));
    }

    #[tokio::test]
    async fn store_errors_map_to_statuses() {
        let (server, _temp) = server();

        let response = server
            .handle(request(Method::PUT, "/empty.bin", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = server
            .handle(request(Method::GET, "/missing.bin", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = server
            .handle(request(Method::DELETE, "/../escape.bin", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
