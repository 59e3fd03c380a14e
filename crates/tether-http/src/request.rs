//! Request construction
//!
//! A [`RequestSpec`] is the logical request; [`RequestSpec::build`] turns it
//! into a wire-ready reqwest request. Building is deterministic, so a retry
//! simply builds the same request again.

use std::{collections::BTreeMap, fs, path::Path};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE},
    multipart, Client, Method, Request,
};
use url::form_urlencoded;

use crate::{
    config::HttpConfig,
    error::{HttpError, Result},
};

pub const DEFAULT_ACCEPT: &str = "application/json";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=UTF-8";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Multipart field carrying an uploaded file
pub const FILE_PART_NAME: &str = "file";

const FILE_PART_MIME: &str = "application/octet-stream";

/// Body variants a request can carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Json(String),
    Text(String),
    Form(Vec<(String, String)>),
    /// File payload, uploaded as a single multipart part
    File { file_name: String, bytes: Vec<u8> },
}

impl RequestBody {
    /// Explicit Content-Type for string-bodied variants.
    ///
    /// Multipart has none: the writer supplies its own boundary header.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Json(_) => Some(CONTENT_TYPE_JSON),
            RequestBody::Text(_) => Some(CONTENT_TYPE_TEXT),
            RequestBody::Form(_) => Some(CONTENT_TYPE_FORM),
            RequestBody::Empty | RequestBody::File { .. } => None,
        }
    }

    /// Body text as sent on the wire, for string-bodied variants.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RequestBody::Json(text) | RequestBody::Text(text) => Some(text.clone()),
            RequestBody::Form(fields) => Some(encode_form(fields)),
            RequestBody::Empty | RequestBody::File { .. } => None,
        }
    }

    /// Short description used by trace output.
    pub fn describe(&self) -> Option<String> {
        match self {
            RequestBody::File { file_name, bytes } => Some(format!(
                "[multipart {FILE_PART_NAME}=\"{file_name}\", {} bytes]",
                bytes.len()
            )),
            other => other.as_text(),
        }
    }
}

/// Logical request: method plus body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    method: Method,
    body: RequestBody,
}

impl RequestSpec {
    pub fn new(method: Method, body: RequestBody) -> Self {
        Self { method, body }
    }

    pub fn get() -> Self {
        Self::new(Method::GET, RequestBody::Empty)
    }

    pub fn post_json(json: impl Into<String>) -> Self {
        Self::new(Method::POST, RequestBody::Json(json.into()))
    }

    pub fn post_text(text: impl Into<String>) -> Self {
        Self::new(Method::POST, RequestBody::Text(text.into()))
    }

    pub fn post_form<K, V>(fields: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let fields = fields
            .iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        Self::new(Method::POST, RequestBody::Form(fields))
    }

    /// Read `path` and wrap it as a multipart upload.
    pub fn post_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| FILE_PART_NAME.to_string());

        Ok(Self::new(Method::POST, RequestBody::File { file_name, bytes }))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Build the wire request against `config`'s target.
    pub fn build(&self, client: &Client, config: &HttpConfig) -> Result<Request> {
        let url = config.target_url()?;
        let headers = merge_headers(&config.headers, self.body.content_type())?;

        let mut builder = client.request(self.method.clone(), url);
        builder = match &self.body {
            RequestBody::Empty => builder,
            RequestBody::Json(text) | RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Form(fields) => builder.body(encode_form(fields)),
            RequestBody::File { file_name, bytes } => builder.multipart(file_form(file_name, bytes)?),
        };

        builder
            .headers(headers)
            .build()
            .map_err(HttpError::RequestFailed)
    }
}

/// Merge caller headers with the defaults.
///
/// `Accept: application/json` is added unless the caller map has the
/// literal key `Accept`; keys that are blank after trimming are dropped.
pub fn merge_headers(
    headers: &BTreeMap<String, String>,
    content_type: Option<&'static str>,
) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();

    if let Some(content_type) = content_type {
        map.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    if !headers.contains_key("Accept") {
        map.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    }

    for (key, value) in headers {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| HttpError::invalid_header(key, e))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| HttpError::invalid_header(key, e))?;
        map.append(name, value);
    }

    Ok(map)
}

/// `application/x-www-form-urlencoded` encoding of `fields` (UTF-8).
pub fn encode_form(fields: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

fn file_form(file_name: &str, bytes: &[u8]) -> Result<multipart::Form> {
    let part = multipart::Part::bytes(bytes.to_vec())
        .file_name(file_name.to_string())
        .mime_str(FILE_PART_MIME)
        .map_err(HttpError::RequestFailed)?;

    // Browser-compatible layout: the file name goes out as raw UTF-8.
    Ok(multipart::Form::new()
        .percent_encode_noop()
        .part(FILE_PART_NAME, part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_accept_injected() {
        let map = merge_headers(&BTreeMap::new(), None).unwrap();
        assert_eq!(map.get(ACCEPT).unwrap(), "application/json");
        assert!(map.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_explicit_accept_preserved() {
        let map = merge_headers(&headers(&[("Accept", "text/html")]), None).unwrap();
        let values: Vec<_> = map.get_all(ACCEPT).iter().collect();
        assert_eq!(values, vec!["text/html"]);
    }

    #[test]
    fn test_accept_check_is_case_sensitive() {
        let map = merge_headers(&headers(&[("accept", "text/html")]), None).unwrap();
        let values: Vec<_> = map.get_all(ACCEPT).iter().collect();
        assert_eq!(values, vec!["application/json", "text/html"]);
    }

    #[test]
    fn test_blank_keys_skipped() {
        let map = merge_headers(&headers(&[("", "a"), ("   ", "b"), ("X-Id", "7")]), None).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x-id").unwrap(), "7");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let result = merge_headers(&headers(&[("Bad Header", "x")]), None);
        assert!(matches!(result, Err(HttpError::InvalidHeader { .. })));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(
            RequestBody::Json("{}".into()).content_type(),
            Some(CONTENT_TYPE_JSON)
        );
        assert_eq!(
            RequestBody::Text("hi".into()).content_type(),
            Some(CONTENT_TYPE_TEXT)
        );
        assert_eq!(RequestBody::Form(vec![]).content_type(), Some(CONTENT_TYPE_FORM));
        assert_eq!(RequestBody::Empty.content_type(), None);
        assert_eq!(
            RequestBody::File {
                file_name: "a.txt".into(),
                bytes: vec![1]
            }
            .content_type(),
            None
        );
    }

    #[test]
    fn test_form_encoding() {
        let spec = RequestSpec::post_form(&[("name", "a b"), ("city", "台北&x")]);
        assert_eq!(
            spec.body().as_text().unwrap(),
            "name=a+b&city=%E5%8F%B0%E5%8C%97%26x"
        );
    }

    #[test]
    fn test_post_file_reads_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();

        let spec = RequestSpec::post_file(file.path()).unwrap();
        match spec.body() {
            RequestBody::File { bytes, file_name } => {
                assert_eq!(bytes, b"payload");
                assert!(!file_name.is_empty());
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert!(spec.body().describe().unwrap().contains("7 bytes"));
    }

    #[test]
    fn test_post_file_missing_is_io_error() {
        let result = RequestSpec::post_file("/nonexistent/upload.bin");
        assert!(matches!(result, Err(HttpError::Io(_))));
    }

    #[test]
    fn test_build_sets_headers_and_body() {
        let client = Client::builder().build().unwrap();
        let config = HttpConfig::new("http://localhost:9/echo").with_header("X-Id", "1");

        let request = RequestSpec::post_json(r#"{"a":1}"#)
            .build(&client, &config)
            .unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().as_str(), "http://localhost:9/echo");
        assert_eq!(request.headers().get(CONTENT_TYPE).unwrap(), CONTENT_TYPE_JSON);
        assert_eq!(request.headers().get(ACCEPT).unwrap(), DEFAULT_ACCEPT);
        assert_eq!(request.headers().get("x-id").unwrap(), "1");
        assert_eq!(request.body().and_then(|b| b.as_bytes()), Some(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn test_build_multipart_has_boundary() {
        let client = Client::builder().build().unwrap();
        let config = HttpConfig::new("http://localhost:9/upload");
        let spec = RequestSpec::new(
            Method::POST,
            RequestBody::File {
                file_name: "456.txt".into(),
                bytes: b"hello".to_vec(),
            },
        );

        let request = spec.build(&client, &config).unwrap();
        let content_type = request.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }
}
