//! Response synthesis for a matched definition.

use super::response::set_header;
use crate::definition::{BodyKind, Definition, KvFields, RawType};
use crate::expression::{self, Bindings};
use crate::functions::RequestScope;
use crate::request::MockRequest;
use crate::route::RouteTable;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_TYPE};
use hyper::{HeaderMap, Response, StatusCode};
use tracing::warn;

/// Mock header key that overrides the computed content type.
///
/// Matched byte-for-byte, unlike every other header lookup.
pub const CONTENT_TYPE_OVERRIDE: &str = "content-Type";

const OCTET_STREAM: &str = "application/octet-stream";

/// A fully computed mock response, before it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    /// Status as configured; may be outside the writable range (see [`Self::into_response`]).
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Synthesized {
    /// Convert into a hyper response in one step.
    ///
    /// Status codes that cannot go on a status line (including the `0` produced
    /// by a non-numeric `statusCode`) are written as 500.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = match StatusCode::from_u16(self.status) {
            Ok(status) => status,
            Err(_) => {
                warn!(status = self.status, "Unwritable mock status, responding 500");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Compute the response for `definition` against `request`.
///
/// Mock headers and raw bodies are templates evaluated with one shared set of
/// bindings; `routes` is the live table consulted by `path`.
pub async fn synthesize(
    definition: &Definition,
    request: &MockRequest,
    routes: &RouteTable,
) -> Synthesized {
    let scope = RequestScope::new(request, definition, routes);
    let mut bindings = Bindings::new();
    let mut headers = HeaderMap::new();

    for (key, value) in definition.mock_headers.pairs() {
        let value = expression::render(value, &mut bindings, &scope);
        set_header(&mut headers, key, &value);
    }
    headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("*"));

    let status = resolve_status(&definition.mock_status);

    let (content_type, mut body) = match definition.mock_body.as_ref() {
        Some(mock) if mock.kind() == BodyKind::Raw => {
            let rendered = expression::render(&mock.raw_value, &mut bindings, &scope);
            (mock.raw_kind().content_type(), Bytes::from(rendered))
        }
        Some(mock) if mock.kind() == BodyKind::File => {
            match tokio::fs::read(mock.file_path()).await {
                Ok(bytes) => (OCTET_STREAM, Bytes::from(bytes)),
                Err(e) => {
                    warn!(
                        definition = %definition.id,
                        path = %mock.file_path(),
                        error = %e,
                        "Failed to read mock body file"
                    );
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/plain; charset=utf-8"),
                    );
                    return Synthesized {
                        status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                        headers,
                        body: Bytes::from(e.to_string()),
                    };
                }
            }
        }
        _ => (RawType::Text.content_type(), Bytes::new()),
    };

    match definition.mock_headers.get_exact(CONTENT_TYPE_OVERRIDE) {
        Some(field) => {
            set_header(&mut headers, CONTENT_TYPE.as_str(), &field.value);
        }
        None => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    if status != 200 {
        body = definition
            .mock_status
            .get("statusText")
            .map(|f| Bytes::from(f.value.clone()))
            .unwrap_or_default();
    }

    Synthesized {
        status,
        headers,
        body,
    }
}

/// `statusCode` from the mock status rows: 200 when absent, 0 when unparseable.
pub fn resolve_status(mock_status: &KvFields) -> u16 {
    match mock_status.get("statusCode") {
        None => 200,
        Some(field) => field.value.parse::<u16>().unwrap_or(0),
    }
}
