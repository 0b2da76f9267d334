use std::sync::Arc;

use async_trait::async_trait;
use essentials::{debug, info, warn};
use http::{header, HeaderValue, Method, StatusCode};
use serde_json::json;
use tokio::{io::BufReader, net::TcpStream};

use super::ProxyService;
use crate::{
    codec::SerializedRequest,
    http::{server::Handler, HeaderMapExt, ReadRequest, Request, Response, WriteResponse},
    utils::Also,
    Error,
};

/// Serves the proxy wire protocol: `GET /` answers the health probe and
/// `POST /` performs a serialized request.
pub struct ProxyHandler {
    service: Arc<ProxyService>,
}

impl ProxyHandler {
    pub fn new(service: Arc<ProxyService>) -> Self {
        Self { service }
    }

    async fn respond(&self, request: Request) -> Response {
        match (request.route(), &request.method) {
            ("/", &Method::GET) => Response::json(StatusCode::OK, &json!({ "result": "pong" })),
            ("/", &Method::POST) => self.perform(&request.body).await,
            ("/", _) => Response::new(StatusCode::METHOD_NOT_ALLOWED),
            _ => Response::new(StatusCode::NOT_FOUND),
        }
    }

    async fn perform(&self, body: &str) -> Response {
        let request = match serde_json::from_str::<SerializedRequest>(body) {
            Ok(request) => request,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &Error::decode(e)),
        };
        debug!(url = %request.url, method = %request.method, "Proxying request");
        match self.service.handle(request).await {
            Ok(response) => Response::json(StatusCode::OK, response.as_ref()),
            Err(e @ Error::Decode(_)) => error_response(StatusCode::BAD_REQUEST, &e),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
        }
    }
}

fn error_response(status: StatusCode, error: &Error) -> Response {
    warn!(status = status.as_u16(), error = %error, "Proxy request failed");
    Response::json(status, &json!({ "error": error.to_string() }))
}

#[async_trait]
impl Handler for ProxyHandler {
    async fn handle(&self, stream: TcpStream) {
        let ip = stream.peer_addr().ok();
        info!(ip = ?ip, "Connection received");
        let (rx, mut tx) = stream.into_split();
        let mut response = match BufReader::new(rx).read_request().await {
            Ok(request) => {
                debug!(method = %request.method, path = %request.path, "-->");
                self.respond(request).await
            }
            Err(e) => {
                warn!(ip = ?ip, "Failed to read request: {}", e);
                Response::json(StatusCode::BAD_REQUEST, &json!({ "error": e.to_string() }))
            }
        };
        response.insert_header(header::CONNECTION, HeaderValue::from_static("close"));
        if let Err(e) = tx
            .write_response(&response)
            .await
            .also(|_| debug!(status = response.status.as_u16(), "<--"))
        {
            warn!(ip = ?ip, "Failed to write response: {}", e);
            return;
        }
        info!(ip = ?ip, "Connection closed");
    }
}
