use serde_json::Value;
use tracing::debug;

use crate::response::ResponseFacts;

/// Merged verdict from one or more validators. `valid` is false exactly when
/// `failures` is non-empty.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    valid: bool,
    successes: Vec<String>,
    failures: Vec<String>,
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationOutcome {
    pub fn new() -> Self {
        Self {
            valid: true,
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        let mut outcome = Self::new();
        outcome.add_success(message);
        outcome
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let mut outcome = Self::new();
        outcome.add_failure(message);
        outcome
    }

    pub fn add_success(&mut self, message: impl Into<String>) {
        self.successes.push(message.into());
    }

    pub fn add_failure(&mut self, message: impl Into<String>) {
        self.failures.push(message.into());
        self.valid = false;
    }

    /// Concatenates the other outcome's messages after this one's, in call
    /// order, and ANDs validity. Later failures never mask earlier ones.
    pub fn merge(&mut self, other: ValidationOutcome) {
        self.successes.extend(other.successes);
        self.failures.extend(other.failures);
        self.valid = self.valid && other.valid;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

/// One response check. Implementations must convert any internal evaluation
/// failure into a failed outcome instead of panicking or returning errors.
pub trait Validate {
    fn evaluate(&self, response: &ResponseFacts) -> ValidationOutcome;
}

impl<F> Validate for F
where
    F: Fn(&ResponseFacts) -> ValidationOutcome,
{
    fn evaluate(&self, response: &ResponseFacts) -> ValidationOutcome {
        self(response)
    }
}

/// Ordered list of validators applied to a single response.
///
/// Validation stops at the first link that reports invalid: links after it
/// are skipped entirely, so the merged outcome carries the messages of every
/// link strictly before the failure plus the failing link's own messages.
#[derive(Default)]
pub struct ValidationChain {
    links: Vec<Box<dyn Validate + Send + Sync>>,
}

impl ValidationChain {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Appends a validator, returning the chain so links read left-to-right.
    pub fn link(mut self, validator: impl Validate + Send + Sync + 'static) -> Self {
        self.links.push(Box::new(validator));
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn validate(&self, response: &ResponseFacts) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new();
        for (index, link) in self.links.iter().enumerate() {
            let result = link.evaluate(response);
            let halt = !result.is_valid();
            outcome.merge(result);
            if halt {
                debug!(link = index + 1, total = self.links.len(), "validation chain halted");
                break;
            }
        }
        outcome
    }
}

/// Passes iff the response status equals the expected code.
pub struct StatusCodeCheck {
    expected: u16,
}

impl StatusCodeCheck {
    pub fn new(expected: u16) -> Self {
        Self { expected }
    }
}

impl Validate for StatusCodeCheck {
    fn evaluate(&self, response: &ResponseFacts) -> ValidationOutcome {
        let actual = response.status();
        if actual == self.expected {
            ValidationOutcome::success(format!("Status code validation passed: {actual}"))
        } else {
            ValidationOutcome::failure(format!(
                "Expected status code: {}, but got: {actual}",
                self.expected
            ))
        }
    }
}

/// Passes iff the measured response time is within the allowed maximum.
pub struct ResponseTimeCheck {
    max_ms: u64,
}

impl ResponseTimeCheck {
    pub fn new(max_ms: u64) -> Self {
        Self { max_ms }
    }
}

impl Validate for ResponseTimeCheck {
    fn evaluate(&self, response: &ResponseFacts) -> ValidationOutcome {
        let actual = response.elapsed_ms();
        if actual <= self.max_ms {
            ValidationOutcome::success(format!("Response time validation passed: {actual}ms"))
        } else {
            ValidationOutcome::failure(format!(
                "Response time exceeded. Expected: <= {}ms, but got: {actual}ms",
                self.max_ms
            ))
        }
    }
}

/// Passes iff the content type is present and contains the expected fragment
/// (case-sensitive substring match).
pub struct ContentTypeCheck {
    expected: String,
}

impl ContentTypeCheck {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl Validate for ContentTypeCheck {
    fn evaluate(&self, response: &ResponseFacts) -> ValidationOutcome {
        match response.content_type() {
            Some(actual) if actual.contains(&self.expected) => {
                ValidationOutcome::success(format!("Content type validation passed: {actual}"))
            }
            actual => ValidationOutcome::failure(format!(
                "Expected content type to contain: {}, but got: {}",
                self.expected,
                actual.unwrap_or("none")
            )),
        }
    }
}

/// Passes iff the field at `path` resolves in the structured body and equals
/// the expected value. Resolution errors (unparseable body, bad path) become
/// failures carrying the error text.
pub struct FieldEqualsCheck {
    path: String,
    expected: Value,
}

impl FieldEqualsCheck {
    pub fn new(path: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
        }
    }
}

impl Validate for FieldEqualsCheck {
    fn evaluate(&self, response: &ResponseFacts) -> ValidationOutcome {
        match response.json_field(&self.path) {
            Ok(Some(actual)) if *actual == self.expected => ValidationOutcome::success(format!(
                "Field validation passed for '{}': {actual}",
                self.path
            )),
            Ok(actual) => ValidationOutcome::failure(format!(
                "Field validation failed for '{}'. Expected: {}, Actual: {}",
                self.path,
                self.expected,
                actual.map_or_else(|| "null".to_string(), Value::to_string)
            )),
            Err(err) => ValidationOutcome::failure(format!(
                "Field validation error for '{}': {err}",
                self.path
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_with(status: u16, elapsed_ms: u64, body: &str) -> ResponseFacts {
        ResponseFacts::new(
            status,
            Vec::new(),
            Some("application/json; charset=utf-8".to_string()),
            body.as_bytes().to_vec(),
            elapsed_ms,
        )
    }

    #[test]
    fn status_code_check_reports_both_codes_on_mismatch() {
        let response = response_with(201, 10, "{}");
        let outcome = StatusCodeCheck::new(200).evaluate(&response);

        assert!(!outcome.is_valid());
        assert_eq!(outcome.failures().len(), 1);
        assert!(outcome.failures()[0].contains("200"));
        assert!(outcome.failures()[0].contains("201"));
    }

    #[test]
    fn response_time_check_accepts_exact_boundary() {
        let response = response_with(200, 500, "{}");
        assert!(ResponseTimeCheck::new(500).evaluate(&response).is_valid());
        assert!(!ResponseTimeCheck::new(499).evaluate(&response).is_valid());
    }

    #[test]
    fn content_type_check_requires_substring() {
        let response = response_with(200, 10, "{}");
        assert!(ContentTypeCheck::new("application/json")
            .evaluate(&response)
            .is_valid());
        assert!(!ContentTypeCheck::new("text/html")
            .evaluate(&response)
            .is_valid());

        let no_content_type = ResponseFacts::new(200, Vec::new(), None, Vec::new(), 0);
        let outcome = ContentTypeCheck::new("json").evaluate(&no_content_type);
        assert!(!outcome.is_valid());
        assert!(outcome.failures()[0].contains("none"));
    }

    #[test]
    fn field_equals_check_downgrades_resolution_errors() {
        let response = response_with(200, 10, "not json");
        let outcome = FieldEqualsCheck::new("id", json!(2)).evaluate(&response);

        assert!(!outcome.is_valid());
        assert!(outcome.failures()[0].contains("Field validation error for 'id'"));
    }

    #[test]
    fn field_equals_check_compares_null_safe() {
        let response = response_with(200, 10, r#"{"data":{"id":2}}"#);
        assert!(FieldEqualsCheck::new("data.id", json!(2))
            .evaluate(&response)
            .is_valid());

        let outcome = FieldEqualsCheck::new("data.missing", json!(2)).evaluate(&response);
        assert!(!outcome.is_valid());
        assert!(outcome.failures()[0].contains("Actual: null"));
    }

    #[test]
    fn chain_merges_all_successes_in_order() {
        let chain = ValidationChain::new()
            .link(StatusCodeCheck::new(200))
            .link(ResponseTimeCheck::new(1000))
            .link(ContentTypeCheck::new("json"));
        let response = response_with(200, 100, "{}");

        let outcome = chain.validate(&response);
        assert!(outcome.is_valid());
        assert!(outcome.failures().is_empty());
        assert_eq!(outcome.successes().len(), 3);
        assert!(outcome.successes()[0].starts_with("Status code"));
        assert!(outcome.successes()[1].starts_with("Response time"));
        assert!(outcome.successes()[2].starts_with("Content type"));
    }

    #[test]
    fn chain_skips_links_after_first_failure() {
        let chain = ValidationChain::new()
            .link(StatusCodeCheck::new(200))
            .link(ResponseTimeCheck::new(50))
            .link(|_: &ResponseFacts| panic!("link after a failure must not run"));
        let response = response_with(200, 100, "{}");

        let outcome = chain.validate(&response);
        assert!(!outcome.is_valid());
        assert_eq!(outcome.successes().len(), 1);
        assert_eq!(outcome.failures().len(), 1);
        assert!(outcome.failures()[0].contains("Response time exceeded"));
    }

    #[test]
    fn empty_chain_is_vacuously_valid() {
        let chain = ValidationChain::new();
        let outcome = chain.validate(&response_with(500, 0, ""));
        assert!(outcome.is_valid());
        assert!(outcome.successes().is_empty());
    }

    #[test]
    fn closure_validators_participate_in_chains() {
        let chain = ValidationChain::new().link(|response: &ResponseFacts| {
            if response.body().is_empty() {
                ValidationOutcome::failure("body is empty")
            } else {
                ValidationOutcome::success("body present")
            }
        });

        assert!(chain.validate(&response_with(200, 0, "x")).is_valid());
        assert!(!chain.validate(&response_with(200, 0, "")).is_valid());
    }
}
