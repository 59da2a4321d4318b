//! Mock parameters-and-secrets sidecar shared by the integration tests.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

pub const TOKEN: &str = "SessionToken";

/// A running mock sidecar.
///
/// - wrong token → `401 Unauthorized`
/// - name `missing` → `400 Bad Request`
/// - name `garbled` → `200` with a body that is not the expected envelope
/// - name `slow` → answers after 5 s
/// - names under `/distinct/` → `{"Parameter":{"Value":"<full name>_dummy_value"}}`
/// - any other name → `{"Parameter":{"Value":"<last segment>_dummy_value"}}`
pub struct Sidecar {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl Sidecar {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let svc = service_fn(move |req| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        respond(req)
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Self { addr, hits }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn respond(req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.uri().path() != "/systemsmanager/parameters/get" {
        return Ok(status(StatusCode::NOT_FOUND));
    }
    let token = req
        .headers()
        .get("x-aws-parameters-secrets-token")
        .and_then(|v| v.to_str().ok());
    if token != Some(TOKEN) {
        return Ok(status(StatusCode::UNAUTHORIZED));
    }

    let query = req.uri().query().unwrap_or_default();
    let name = url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "name")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    let last = name.rsplit('/').next().unwrap_or_default().to_owned();

    match last.as_str() {
        "missing" => Ok(status(StatusCode::BAD_REQUEST)),
        "garbled" => Ok(Response::new(Full::new(Bytes::from_static(b"{\"Parameter\":null}")))),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(envelope(&last))
        }
        _ if name.starts_with("/distinct/") => Ok(envelope(&name)),
        _ => Ok(envelope(&last)),
    }
}

fn envelope(value_of: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "Parameter": { "Name": value_of, "Type": "SecureString", "Value": format!("{value_of}_dummy_value") }
    });
    Response::new(Full::new(Bytes::from(serde_json::to_vec(&body).unwrap())))
}

fn status(code: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(
        code.canonical_reason().unwrap_or_default(),
    )));
    *response.status_mut() = code;
    response
}
