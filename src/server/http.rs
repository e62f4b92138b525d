//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling; routing is a plain
//! match over method and path.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Args;
use crate::reader::ContentReader;
use crate::routes;
use crate::types::UnrollError;
use crate::unroller::UniversalUnroller;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Content store client, also used by the readiness probe
    pub reader: Arc<ContentReader>,
    /// The expansion engine
    pub unroller: Arc<UniversalUnroller>,
}

impl AppState {
    pub fn new(args: Args, reader: Arc<ContentReader>, unroller: Arc<UniversalUnroller>) -> Self {
        Self {
            args,
            reader,
            unroller,
        }
    }
}

/// Accept connections and serve requests until the process is stopped.
pub async fn run(state: Arc<AppState>) -> Result<(), UnrollError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Content unroller listening on {}", state.args.listen);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Expansion endpoints
        (Method::POST, "/content") => routes::post_content(Arc::clone(&state), req).await,
        (Method::POST, "/internalcontent") => {
            routes::post_internal_content(Arc::clone(&state), req).await
        }

        // Liveness probe - returns 200 if the service is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(&state),

        // Readiness probe - returns 200 only if the content store answers
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(&state).await
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        _ => not_found_response(&path),
    };

    Ok(response)
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(format!(
            r#"{{"message":"no route for {}"}}"#,
            path
        ))))
        .unwrap()
}
