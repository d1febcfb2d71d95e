//! Exception filters.
//!
//! Filters are consulted, in registration order, by taxonomy tag:
//! `BadRequest`, `Validation`, … `Timeout`. The first filter whose declared
//! tag set includes the error's tag handles it; [`GlobalExceptionFilter`]
//! is always consulted last and never declines.
//!
//! Filter selection uses an explicit tag-set field rather than reflecting
//! on a filter's type name or constructor metadata.

use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;
use crate::response::Response;

/// A strategy object that turns a raised error into an HTTP response.
pub trait ExceptionFilter: Send + Sync {
    /// The taxonomy tags this filter declares it can handle.
    fn tags(&self) -> &[&str];

    /// Attempts to handle the error. `default` is the response the error's
    /// own `IntoResponse` impl already produced (status + default JSON
    /// body); a filter may return it unchanged, replace it entirely, or
    /// enrich it. Filters run only while headers have not yet been sent —
    /// callers MUST check that before invoking the chain.
    fn handle(&self, ctx: &Context, tag: &str, details: Option<&Value>, default: Response) -> Response;
}

/// The catch-all filter consulted when no registered filter's tag set
/// matches. Maps the error to the default response shape: JSON body
/// `{error, statusCode, details?, timestamp}`, status from the error's
/// taxonomy-derived default.
pub struct GlobalExceptionFilter;

impl ExceptionFilter for GlobalExceptionFilter {
    fn tags(&self) -> &[&str] {
        &[]
    }

    fn handle(&self, _ctx: &Context, _tag: &str, _details: Option<&Value>, default: Response) -> Response {
        default
    }
}

/// The ordered list of filters an [`crate::app::Application`] consults when a
/// middleware, handler, or response write raises a tagged error.
pub struct ExceptionFilterChain {
    filters: Vec<Arc<dyn ExceptionFilter>>,
    global: Arc<dyn ExceptionFilter>,
}

impl ExceptionFilterChain {
    pub fn new() -> Self {
        Self { filters: Vec::new(), global: Arc::new(GlobalExceptionFilter) }
    }

    pub fn register(&mut self, filter: Arc<dyn ExceptionFilter>) {
        self.filters.push(filter);
    }

    /// Resolves `default` (already carrying `tag`/`details` metadata) against
    /// the registered filters, falling back to the global filter.
    ///
    /// If `headers_sent` is true the filter chain does not run at all: the
    /// caller logs and keeps `default` as-is. Once headers are on the wire
    /// there's nothing left to rewrite.
    pub fn resolve(
        &self,
        ctx: &Context,
        tag: &str,
        details: Option<&Value>,
        default: Response,
        headers_sent: bool,
    ) -> Response {
        if headers_sent {
            tracing::error!(tag, "exception raised after headers sent; connection will close");
            return default;
        }

        for filter in &self.filters {
            if filter.tags().contains(&tag) {
                return filter.handle(ctx, tag, details, default);
            }
        }

        self.global.handle(ctx, tag, details, default)
    }
}

impl Default for ExceptionFilterChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NextRushError;
    use crate::response::IntoResponse;

    struct ValidationFilter;
    impl ExceptionFilter for ValidationFilter {
        fn tags(&self) -> &[&str] {
            &["Validation"]
        }

        fn handle(&self, _ctx: &Context, _tag: &str, _details: Option<&Value>, _default: Response) -> Response {
            Response::text("custom validation response")
        }
    }

    #[test]
    fn matching_filter_wins_over_global() {
        let mut chain = ExceptionFilterChain::new();
        chain.register(Arc::new(ValidationFilter));

        let err = NextRushError::Validation("bad field".into());
        let default = err.into_response();
        let ctx = crate::context::test_support::blank_context();

        let resp = chain.resolve(&ctx, "Validation", None, default, false);
        assert_eq!(resp.status_code(), http::StatusCode::OK);
    }

    #[test]
    fn unmatched_tag_falls_back_to_global() {
        let chain = ExceptionFilterChain::new();
        let err = NextRushError::NotFound("x".into());
        let default = err.into_response();
        let ctx = crate::context::test_support::blank_context();

        let resp = chain.resolve(&ctx, "NotFound", None, default, false);
        assert_eq!(resp.status_code(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn headers_sent_skips_the_chain() {
        let mut chain = ExceptionFilterChain::new();
        chain.register(Arc::new(ValidationFilter));
        let err = NextRushError::Validation("bad field".into());
        let default = err.into_response();
        let ctx = crate::context::test_support::blank_context();

        let resp = chain.resolve(&ctx, "Validation", None, default, true);
        assert_eq!(resp.status_code(), http::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
