use std::collections::BTreeMap;

/// Per-request context populated once at the transport boundary.
///
/// Carries the inbound headers (names lowercased, so lookups are
/// case-insensitive) and the bearer token extracted from them, if any.
/// Created for every inbound call and dropped once the call resolves.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Correlation identifier, taken from `x-request-id` when present.
    pub request_id: String,
    /// Raw inbound headers keyed by lowercased name.
    pub headers: BTreeMap<String, String>,
    /// Credential extracted from `headers`; `None` when absent or empty.
    pub token: Option<String>,
}

impl RequestContext {
    /// Builds a context from raw `(name, value)` header pairs.
    ///
    /// Later duplicates of the same header name win. The token is left
    /// unset; the server's auth forwarder fills it in.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let headers: BTreeMap<String, String> = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
            .collect();
        let request_id = headers.get("x-request-id").cloned().unwrap_or_default();

        Self {
            request_id,
            headers,
            token: None,
        }
    }

    /// Looks up a header value by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns a copy of the context with the given token.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let ctx = RequestContext::from_headers([("Authorization", "Bearer abc")]);
        assert_eq!(ctx.header("authorization"), Some("Bearer abc"));
        assert_eq!(ctx.header("AUTHORIZATION"), Some("Bearer abc"));
        assert!(ctx.header("cookie").is_none());
    }

    #[test]
    fn request_id_taken_from_header() {
        let ctx = RequestContext::from_headers([("X-Request-Id", "req-7")]);
        assert_eq!(ctx.request_id, "req-7");

        let ctx = RequestContext::from_headers(std::iter::empty());
        assert!(ctx.request_id.is_empty());
    }

    #[test]
    fn token_is_not_set_by_construction() {
        let ctx = RequestContext::from_headers([("authorization", "Bearer abc")]);
        assert!(ctx.token.is_none());
        let ctx = ctx.with_token(Some("abc".to_string()));
        assert_eq!(ctx.token.as_deref(), Some("abc"));
    }
}
