//! Request enhancement.
//!
//! These methods are not bolted onto `Context` itself (that would force
//! every caller who only wants `ctx.method()` to drag in
//! cookie/validation/UA-parsing state) or monkey-patched in from outside.
//! [`RequestView`] is a thin, borrowed wrapper constructed fresh by
//! [`Context::request`] — the same "construct a view, don't mutate the
//! type" shape [`crate::response::Response`] already uses for the response
//! side.

use std::collections::HashMap;

use crate::content_type;
use crate::context::Context;
use crate::cookie;
use crate::sanitize::{self, SanitizeStep};
use crate::useragent::{self, UserAgentInfo};
use crate::validate::{self, FieldRule, ValidationResult};

/// A read-oriented view over a [`Context`]'s request-side data.
pub struct RequestView<'a> {
    ctx: &'a Context,
}

impl<'a> RequestView<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// A captured route parameter, e.g. `:id` in `/users/:id`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.ctx.params.get(name).map(String::as_str)
    }

    /// The first value of a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.ctx.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Resolution order matching [`validate::validate`]'s field lookup:
    /// body, then query, then route params — convenient for handlers that
    /// accept a value from any of the three without caring which.
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(body) = self.ctx.body().and_then(|b| b.get(name)) {
            if let Some(s) = body.as_str() {
                return Some(s.to_string());
            }
            if !body.is_null() {
                return Some(body.to_string());
            }
        }
        if let Some(q) = self.ctx.query().get(name) {
            return Some(q.clone());
        }
        self.param(name).map(str::to_string)
    }

    /// `request.is("json")` — does `Content-Type` match this alias?
    pub fn is(&self, alias: &str) -> bool {
        self.header("content-type").is_some_and(|ct| content_type::alias_matches(ct, alias))
    }

    /// The first of `types` the `Accept` header is willing to receive.
    pub fn accepts<'t>(&self, types: &[&'t str]) -> Option<&'t str> {
        let accept = self.header("accept").unwrap_or("*/*");
        content_type::negotiate(accept, types)
    }

    /// Parses the `Cookie` header, if any, into a name → value map.
    pub fn cookies(&self) -> HashMap<String, String> {
        self.header("cookie").map(cookie::parse).unwrap_or_default()
    }

    /// A single cookie by name, unsigned against `secret` when `secret` is
    /// `Some`.
    pub fn cookie(&self, name: &str, secret: Option<&str>) -> Option<String> {
        let raw = self.cookies().remove(name)?;
        match secret {
            Some(secret) => cookie::unsign(&raw, secret),
            None => Some(raw),
        }
    }

    /// Validates `rules` against this request's body/query/params.
    pub fn validate(&self, rules: &HashMap<String, FieldRule>) -> ValidationResult {
        validate::validate(self.ctx, rules)
    }

    /// Sanitizes an arbitrary string value — exposed on the view for
    /// discoverability (`ctx.request().sanitize(...)`); it does not need
    /// `self` since sanitization has no request-specific state.
    pub fn sanitize(&self, value: &str, steps: &[SanitizeStep]) -> String {
        sanitize::sanitize(value, steps)
    }

    /// Parses the `User-Agent` header.
    pub fn user_agent(&self) -> UserAgentInfo {
        useragent::parse(self.header("user-agent").unwrap_or(""))
    }

    /// A low-entropy per-client identifier derived from IP, UA, and accept
    /// headers — suitable for coarse rate limiting, not for
    /// security-sensitive identification.
    pub fn fingerprint(&self) -> String {
        use base64::Engine as _;

        let raw = format!(
            "{}|{}|{}|{}",
            self.ctx.ip(),
            self.header("user-agent").unwrap_or(""),
            self.header("accept").unwrap_or(""),
            self.header("accept-language").unwrap_or(""),
        );
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw.as_bytes());
        encoded.chars().take(16).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue};

    fn ctx_with_headers(pairs: &[(&str, &str)]) -> Context {
        let mut ctx = crate::context::test_support::blank_context();
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(http::HeaderName::from_bytes(k.as_bytes()).unwrap(), HeaderValue::from_str(v).unwrap());
        }
        ctx.headers = headers;
        ctx
    }

    #[test]
    fn is_matches_json_alias() {
        let ctx = ctx_with_headers(&[("content-type", "application/json; charset=utf-8")]);
        assert!(ctx.request().is("json"));
        assert!(!ctx.request().is("xml"));
    }

    #[test]
    fn accepts_negotiates_first_match() {
        let ctx = ctx_with_headers(&[("accept", "text/html, application/json;q=0.9")]);
        assert_eq!(ctx.request().accepts(&["xml", "json"]), Some("json"));
    }

    #[test]
    fn cookies_parses_the_cookie_header() {
        let ctx = ctx_with_headers(&[("cookie", "a=1; b=2")]);
        let parsed = ctx.request().cookies();
        assert_eq!(parsed.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn signed_cookie_round_trips() {
        let signed = cookie::sign("user-42", "secret");
        let ctx = ctx_with_headers(&[("cookie", &format!("sid={signed}"))]);
        assert_eq!(ctx.request().cookie("sid", Some("secret")), Some("user-42".to_string()));
        assert_eq!(ctx.request().cookie("sid", Some("wrong")), None);
    }

    #[test]
    fn fingerprint_is_stable_for_the_same_inputs() {
        let ctx = ctx_with_headers(&[("user-agent", "curl/8"), ("accept", "*/*")]);
        let a = ctx.request().fingerprint();
        let b = ctx.request().fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn user_agent_detects_bots() {
        let ctx = ctx_with_headers(&[("user-agent", "curl/8.4.0")]);
        assert!(ctx.request().user_agent().is_bot);
    }
}
