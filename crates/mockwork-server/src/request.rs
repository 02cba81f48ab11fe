//! Owned view of an inbound mock request.
//!
//! The dispatcher collects the body once; JSON and form views are parsed on
//! first use and cached for the rest of the request. Multipart fields need an
//! async reader, so [`MockRequest::from_parts`] reads them up front.

use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Method, Uri};
use std::sync::OnceLock;
use tracing::debug;

/// Request data shared by route matching and template functions.
#[derive(Debug)]
pub struct MockRequest {
    method: Method,
    /// Percent-decoded path
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    json: OnceLock<Option<serde_json::Value>>,
    form: OnceLock<Vec<(String, String)>>,
    /// Non-file `multipart/form-data` fields
    multipart: Vec<(String, String)>,
}

impl MockRequest {
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        let path = urlencoding::decode(uri.path())
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| uri.path().to_string());
        Self {
            method,
            path,
            query: parse_query(uri.query()),
            headers,
            body,
            json: OnceLock::new(),
            form: OnceLock::new(),
            multipart: Vec::new(),
        }
    }

    /// Like [`MockRequest::new`], also reading `multipart/form-data` fields.
    pub async fn from_parts(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        let mut request = Self::new(method, uri, headers, body);
        let boundary = request
            .header(CONTENT_TYPE.as_str())
            .and_then(|ct| multer::parse_boundary(ct).ok());
        if let Some(boundary) = boundary {
            request.multipart = read_multipart(request.body.clone(), boundary).await;
        }
        request
    }

    /// Build a body-less request from a method and a URI string.
    ///
    /// Unparseable URIs fall back to `/`.
    pub fn get(method: Method, uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_else(|_| Uri::from_static("/"));
        Self::new(method, &uri, HeaderMap::new(), Bytes::new())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// First value of a header; header names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header that are valid visible ASCII.
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// First value of a URL query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a URL query parameter, in request order.
    pub fn query_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Form field lookup across body and URL query.
    ///
    /// Urlencoded body fields win over the query; multipart fields are consulted
    /// after it. File parts are never form values.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        first_value(self.form(), key)
            .or_else(|| self.query_value(key))
            .or_else(|| first_value(&self.multipart, key))
    }

    /// Request body parsed as JSON; `None` when the body is not JSON.
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json
            .get_or_init(|| serde_json::from_slice(&self.body).ok())
            .as_ref()
    }

    fn form(&self) -> &[(String, String)] {
        self.form.get_or_init(|| {
            let is_form = self
                .header(CONTENT_TYPE.as_str())
                .map(|ct| {
                    ct.split(';')
                        .next()
                        .unwrap_or_default()
                        .trim()
                        .eq_ignore_ascii_case("application/x-www-form-urlencoded")
                })
                .unwrap_or(false);
            if !is_form {
                return Vec::new();
            }
            url::form_urlencoded::parse(&self.body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
    }
}

fn first_value<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

async fn read_multipart(body: Bytes, boundary: String) -> Vec<(String, String)> {
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut fields = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Malformed multipart body");
                break;
            }
        };
        let name = match field.name() {
            Some(name) if field.file_name().is_none() => name.to_string(),
            _ => continue,
        };
        match field.text().await {
            Ok(value) => fields.push((name, value)),
            Err(e) => {
                debug!(field = %name, error = %e, "Unreadable multipart field");
                break;
            }
        }
    }
    fields
}

/// Parse a raw query string into ordered, percent-decoded pairs.
pub fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}
