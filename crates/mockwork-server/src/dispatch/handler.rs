//! HTTP entry point of a workspace.

use super::response::{build_response, build_response_with_headers};
use super::synthesizer::synthesize;
use crate::request::MockRequest;
use crate::route::RouteTable;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Body returned when no definition matches.
pub const NOT_FOUND_BODY: &str = "api was removed";

/// Stateless request handler bound to one workspace's route table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workspace_id: String,
    routes: Arc<RouteTable>,
}

impl Dispatcher {
    pub fn new(workspace_id: impl Into<String>, routes: Arc<RouteTable>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            routes,
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Handle one request. Never fails; every outcome is an HTTP response.
    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        if is_preflight(&req) {
            return Ok(self.preflight(&req));
        }

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(workspace = %self.workspace_id, error = %e, "Failed to read request body");
                Bytes::new()
            }
        };
        let request = MockRequest::from_parts(parts.method, &parts.uri, parts.headers, body).await;

        let mut response = match self.routes.find(&request) {
            Some(definition) => {
                let synthesized = synthesize(&definition, &request, &self.routes).await;
                debug!(
                    workspace = %self.workspace_id,
                    method = %request.method(),
                    path = %request.path(),
                    definition = %definition.id,
                    status = synthesized.status,
                    "Mock request served"
                );
                synthesized.into_response()
            }
            None => {
                debug!(
                    workspace = %self.workspace_id,
                    method = %request.method(),
                    path = %request.path(),
                    status = 404,
                    "No route matched"
                );
                build_response_with_headers(
                    StatusCode::NOT_FOUND,
                    [
                        ("Content-Type", "text/plain; charset=utf-8"),
                        ("X-Content-Type-Options", "nosniff"),
                    ],
                    NOT_FOUND_BODY,
                )
            }
        };

        if request.header("origin").is_some() {
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
        Ok(response)
    }

    fn preflight<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        let mut response = build_response(StatusCode::NO_CONTENT, Bytes::new());
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        for (request_header, allow_header) in [
            (ACCESS_CONTROL_REQUEST_METHOD, ACCESS_CONTROL_ALLOW_METHODS),
            (ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_ALLOW_HEADERS),
        ] {
            if let Some(value) = req.headers().get(&request_header) {
                headers.insert(allow_header, value.clone());
            }
        }
        debug!(
            workspace = %self.workspace_id,
            path = %req.uri().path(),
            status = 204,
            "CORS preflight answered"
        );
        response
    }
}

fn is_preflight<B>(req: &Request<B>) -> bool {
    req.method() == Method::OPTIONS && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

/// Accept connections until `shutdown` fires, serving each on its own task.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let workspace = dispatcher.workspace_id().to_string();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let dispatcher = Arc::clone(&dispatcher);
                                async move { dispatcher.handle(req).await }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error in workspace {}: {}", workspace, e);
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Workspace {} shutting down", workspace);
                break;
            }
        }
    }
}
