//! Bearer credential forwarding from client requests to backend calls.

use shakegate_core::RequestContext;

use super::backend::BackendRequest;

const BEARER_SCHEME: &str = "bearer";

/// Extracts the client credential and attaches it to outbound calls.
///
/// Tokens are opaque: they are never validated here, only moved from the
/// inbound header to the backend's `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthForwarder {
    header: String,
}

impl AuthForwarder {
    /// Creates a forwarder reading the credential from `header`
    /// (matched case-insensitively).
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }

    /// Extracts the token from the request headers.
    ///
    /// Accepts either `Bearer <token>` (scheme matched case-insensitively)
    /// or a bare token. Surrounding whitespace is ignored; an empty value,
    /// or the scheme with no token after it, counts as missing.
    #[must_use]
    pub fn extract(&self, ctx: &RequestContext) -> Option<String> {
        let raw = ctx.header(&self.header)?.trim();
        let token = strip_scheme(raw).unwrap_or(raw);

        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    /// Returns a copy of `ctx` with its token filled in from the headers.
    #[must_use]
    pub fn populate(&self, ctx: RequestContext) -> RequestContext {
        let token = self.extract(&ctx);
        ctx.with_token(token)
    }

    /// Sets the outbound authorization to the standard `Bearer <token>` form.
    #[must_use]
    pub fn attach(token: &str, request: BackendRequest) -> BackendRequest {
        BackendRequest {
            authorization: Some(format!("Bearer {token}")),
            ..request
        }
    }
}

/// Returns what follows a leading `Bearer` scheme, or `None` if `raw` does
/// not start with the scheme as a separate word.
fn strip_scheme(raw: &str) -> Option<&str> {
    let scheme = raw.get(..BEARER_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let rest = &raw[BEARER_SCHEME.len()..];
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

impl Default for AuthForwarder {
    fn default() -> Self {
        Self::new("authorization")
    }
}
