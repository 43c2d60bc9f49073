use once_cell::sync::OnceCell;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("response body is not valid JSON: {0}")]
    NotJson(String),
    #[error("empty field path")]
    EmptyPath,
}

/// Normalized, immutable snapshot of one HTTP response. Constructed once per
/// request by the client (or by hand in tests) and consumed read-only by
/// validators, strategies, and the load runner.
#[derive(Debug, Clone, Default)]
pub struct ResponseFacts {
    status: u16,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    body: Vec<u8>,
    elapsed_ms: u64,
    parsed_body: OnceCell<Value>,
}

impl ResponseFacts {
    pub fn new(
        status: u16,
        headers: Vec<(String, String)>,
        content_type: Option<String>,
        body: Vec<u8>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            status,
            headers,
            content_type,
            body,
            elapsed_ms,
            parsed_body: OnceCell::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Case-insensitive header lookup. Duplicate header names collapse to
    /// last-wins; use [`headers`](Self::headers) to enumerate all of them.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Structured view of the body, parsed lazily and cached for the lifetime
    /// of this snapshot.
    pub fn body_json(&self) -> Result<&Value, BodyError> {
        self.parsed_body.get_or_try_init(|| {
            serde_json::from_slice(&self.body).map_err(|err| BodyError::NotJson(err.to_string()))
        })
    }

    /// Resolve a dot-separated path against the structured body. Segments that
    /// parse as integers index into arrays (`data.0.email`). Returns
    /// `Ok(None)` when any segment is absent; parse failures surface as
    /// errors for the caller to downgrade.
    pub fn json_field(&self, path: &str) -> Result<Option<&Value>, BodyError> {
        if path.trim().is_empty() {
            return Err(BodyError::EmptyPath);
        }

        let mut current = self.body_json()?;
        for segment in path.split('.') {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_response(body: Value) -> ResponseFacts {
        ResponseFacts::new(
            200,
            vec![("Content-Type".to_string(), "application/json".to_string())],
            Some("application/json".to_string()),
            body.to_string().into_bytes(),
            42,
        )
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_last_wins() {
        let response = ResponseFacts::new(
            200,
            vec![
                ("X-Token".to_string(), "first".to_string()),
                ("x-token".to_string(), "second".to_string()),
            ],
            None,
            Vec::new(),
            0,
        );

        assert_eq!(response.header("X-TOKEN"), Some("second"));
        assert_eq!(response.header("missing"), None);
        assert_eq!(response.headers().len(), 2);
    }

    #[test]
    fn json_field_resolves_nested_paths_and_indices() {
        let response = json_response(json!({
            "data": [{"email": "george@example.com"}],
            "page": 2
        }));

        assert_eq!(
            response.json_field("data.0.email").unwrap(),
            Some(&json!("george@example.com"))
        );
        assert_eq!(response.json_field("page").unwrap(), Some(&json!(2)));
        assert_eq!(response.json_field("data.5.email").unwrap(), None);
        assert_eq!(response.json_field("missing.deep").unwrap(), None);
    }

    #[test]
    fn json_field_reports_unparseable_bodies() {
        let response = ResponseFacts::new(200, Vec::new(), None, b"<html>".to_vec(), 0);
        let err = response.json_field("anything").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn json_field_rejects_empty_paths() {
        let response = json_response(json!({}));
        assert!(matches!(response.json_field("  "), Err(BodyError::EmptyPath)));
    }

    #[test]
    fn body_text_is_lossy() {
        let response = ResponseFacts::new(200, Vec::new(), None, vec![0x68, 0x69, 0xFF], 0);
        assert_eq!(response.body_text(), "hi\u{FFFD}");
    }
}
