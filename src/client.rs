use std::time::Instant;

use anyhow::{Context, Result};
use reqwest::{header::HeaderMap, Client, Method};
use serde_json::Value;

use crate::response::ResponseFacts;

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Text(String),
}

/// One request to issue, built up fluently before handing it to the client.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }
}

/// Thin wrapper over `reqwest` that issues a [`RequestSpec`] and captures the
/// response as immutable [`ResponseFacts`], elapsed time included. Transport
/// failures surface as errors for the strategy layer to downgrade.
#[derive(Debug, Clone, Default)]
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
    default_headers: Vec<(String, String)>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL prefixed to specs whose URL starts with `/`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    fn resolve_url(&self, url: &str) -> String {
        match (&self.base_url, url.starts_with('/')) {
            (Some(base), true) => format!("{}{url}", base.trim_end_matches('/')),
            _ => url.to_string(),
        }
    }

    pub async fn send(&self, spec: &RequestSpec) -> Result<ResponseFacts> {
        let url = self.resolve_url(&spec.url);
        let mut builder = self.client.request(spec.method.clone(), &url);

        for (name, value) in self.default_headers.iter().chain(spec.headers.iter()) {
            builder = builder.header(name, value);
        }
        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        match &spec.body {
            Some(RequestBody::Json(value)) => builder = builder.json(value),
            Some(RequestBody::Text(text)) => builder = builder.body(text.clone()),
            None => {}
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .with_context(|| format!("sending {} {url}", spec.method))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let status = response.status().as_u16();
        let header_map = response.headers().clone();
        let content_type = header_map
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading response body from {url}"))?;

        Ok(ResponseFacts::new(
            status,
            collect_headers(&header_map),
            content_type,
            body.to_vec(),
            elapsed_ms,
        ))
    }
}

fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_url_joins_base_for_absolute_paths() {
        let client = ApiClient::new().with_base_url("https://api.example.com/");
        assert_eq!(
            client.resolve_url("/users/2"),
            "https://api.example.com/users/2"
        );
        assert_eq!(
            client.resolve_url("https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn resolve_url_passes_through_without_base() {
        let client = ApiClient::new();
        assert_eq!(client.resolve_url("/users"), "/users");
    }

    #[test]
    fn collect_headers_preserves_values() {
        let mut map = HeaderMap::new();
        map.insert("X-Test", "value".parse().unwrap());
        map.insert("content-type", "application/json".parse().unwrap());

        let headers = collect_headers(&map);
        assert!(headers
            .iter()
            .any(|(name, value)| name == "x-test" && value == "value"));
        assert!(headers
            .iter()
            .any(|(name, value)| name == "content-type" && value == "application/json"));
    }

    #[test]
    fn request_spec_builder_accumulates_parts() {
        let spec = RequestSpec::post("/users")
            .with_header("authorization", "Bearer token-123")
            .with_query("page", "2")
            .with_json(serde_json::json!({"name": "morpheus"}));

        assert_eq!(spec.method, Method::POST);
        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.query, vec![("page".to_string(), "2".to_string())]);
        assert!(matches!(spec.body, Some(RequestBody::Json(_))));
    }
}
