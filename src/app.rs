//! Pipeline orchestrator.
//!
//! [`Application`] owns the registration surface (`use_mw`, `get`/`post`/…,
//! `router()`/`use_prefixed`) and, per request, composes the middleware
//! chain once — cached behind an [`ArcSwap`] and rebuilt on every mutation —
//! dispatches to the matched route, materializes `ctx.body`/`ctx.set(..)`
//! when a handler prefers that over building a `Response` directly, and
//! runs the exception-filter chain when anything raised a tagged error.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

use crate::context::{Context, ContextFactory, ContextOptions, RawRequest};
use crate::error::NextRushError;
use crate::events::{Event, EventBus};
use crate::exception::{ExceptionFilter, ExceptionFilterChain};
use crate::handler::Handler;
use crate::middleware::{BoxedMiddleware, Chain, Middleware, Next, Terminal, Violation};
use crate::response::{IntoResponse, Response};
use crate::router::{RouteRecord, Router, RouterOptions, SubRouter};

/// The application's single entry point: owns the router, the cached
/// middleware chain, the context pool, the exception-filter chain, and the
/// lifecycle event bus.
pub struct Application {
    router: Router,
    chain: ArcSwap<Chain>,
    middleware: Mutex<Vec<BoxedMiddleware>>,
    context_factory: ContextFactory,
    filters: RwLock<ExceptionFilterChain>,
    events: EventBus,
}

impl Application {
    pub fn new() -> Self {
        Self::with_options(RouterOptions::default(), ContextOptions::default())
    }

    pub fn with_options(router_options: RouterOptions, context_options: ContextOptions) -> Self {
        Self {
            router: Router::with_options(router_options),
            chain: ArcSwap::from_pointee(Vec::new()),
            middleware: Mutex::new(Vec::new()),
            context_factory: ContextFactory::new(context_options),
            filters: RwLock::new(ExceptionFilterChain::new()),
            events: EventBus::new(),
        }
    }

    /// A cheap-to-clone handle to this application's lifecycle event bus
    ///; [`crate::server::Server`] forwards
    /// its own `listening`/`close`/`shutdown*` events through the same bus.
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// `use(middleware)`: appends to the chain and rebuilds the
    /// cached composed form — the cache must be invalidated on every
    /// `use()`.
    pub fn use_mw(&self, mw: impl Middleware) -> &Self {
        self.middleware.lock().push(mw.into_boxed_middleware());
        self.rebuild_chain();
        self
    }

    /// `use(prefix, router)`: folds a detachable [`SubRouter`]'s
    /// routes into the application's table with `prefix` concatenated to
    /// each template, and appends its middleware to the chain.
    pub fn use_prefixed(&self, prefix: &str, sub: SubRouter) -> &Self {
        for (method, template, handler) in sub.routes {
            let full = join_prefix(prefix, &template);
            let record = RouteRecord { handler, middleware: None };
            if let Err(e) = self.router.register_in_place(&method, &full, record) {
                tracing::warn!(error = %e, route = %full, "route registration conflict");
            }
        }

        if !sub.middleware.is_empty() {
            self.middleware.lock().extend(sub.middleware);
            self.rebuild_chain();
        }

        self
    }

    pub fn get(&self, path: &str, handler: impl Handler) -> &Self {
        self.route("GET", path, handler)
    }

    pub fn post(&self, path: &str, handler: impl Handler) -> &Self {
        self.route("POST", path, handler)
    }

    pub fn put(&self, path: &str, handler: impl Handler) -> &Self {
        self.route("PUT", path, handler)
    }

    pub fn delete(&self, path: &str, handler: impl Handler) -> &Self {
        self.route("DELETE", path, handler)
    }

    pub fn patch(&self, path: &str, handler: impl Handler) -> &Self {
        self.route("PATCH", path, handler)
    }

    /// Registers a route for an arbitrary (upper-case) method string;
    /// `"ALL"`/`"*"` match any method at this node.
    pub fn route(&self, method: &str, path: &str, handler: impl Handler) -> &Self {
        let record = RouteRecord { handler: handler.into_boxed_handler(), middleware: None };
        if let Err(e) = self.router.register_in_place(method, path, record) {
            tracing::warn!(error = %e, route = %path, method, "route registration conflict");
        }
        self
    }

    /// `router()`: a detachable sub-router with its own
    /// middleware/route table, folded in later via [`Application::use_prefixed`].
    pub fn router(&self) -> SubRouter {
        SubRouter::new()
    }

    /// Registers an [`ExceptionFilter`], consulted before the always-last
    /// [`crate::exception::GlobalExceptionFilter`].
    pub fn exception_filter(&self, filter: Arc<dyn ExceptionFilter>) -> &Self {
        self.filters.write().register(filter);
        self
    }

    pub fn router_stats(&self) -> crate::router::RouterStats {
        self.router.stats()
    }

    pub(crate) fn context_factory(&self) -> &ContextFactory {
        &self.context_factory
    }

    fn rebuild_chain(&self) {
        let snapshot = self.middleware.lock().clone();
        self.chain.store(Arc::new(snapshot));
    }

    /// Runs one request through the full pipeline: middleware chain, route
    /// dispatch, response-body materialization, and exception-filter
    /// resolution. `raw_body` is the bytes already read off the
    /// wire by the transport. Concrete body-parsers are out of scope here,
    /// so the core only stashes them on `ctx.raw_body` for a body-parser
    /// middleware to pick up.
    pub async fn dispatch(self: &Arc<Self>, raw: RawRequest, raw_body: Vec<u8>) -> Response {
        let method = raw.method.as_str().to_string();
        let path = raw.path.clone();

        let mut ctx = self.context_factory.create(raw);
        ctx.set_raw_body(raw_body);

        let chain = self.chain.load_full();
        let violation = Violation::new();
        let terminal = self.build_terminal(method, path);

        let next = Next::new(chain, terminal, violation.clone());
        let (mut ctx, mut response) = next.call(ctx).await;

        if violation.is_set() {
            tracing::error!("next() called multiple times; request aborted");
            response = NextRushError::Internal("next() called multiple times".to_string()).into();
        }

        response = response.overlay_context_state(&ctx.resp);

        if response.take_wants_body_fallback() {
            if let Some(body) = ctx.body().cloned() {
                response = materialize_body(body);
            }
        }

        if let Some((tag, details)) = response.take_pending_exception() {
            let headers_sent = ctx.resp.sent;
            response = self.filters.read().resolve(&ctx, tag, details.as_ref(), response, headers_sent);
        }

        self.events.emit(Event::Request {
            method: ctx.method().as_str().to_string(),
            path: ctx.path().to_string(),
            status: response.status_code().as_u16(),
            elapsed_ms: ctx.elapsed().as_millis(),
        });

        self.context_factory.release(ctx, self.router.param_pool());
        response
    }

    /// Builds the chain's terminal step: route dispatch. Looked up once
    /// the middleware chain has run to completion, against the
    /// method/path captured when the request arrived (both are immutable
    /// on `Context`).
    fn build_terminal(self: &Arc<Self>, method: String, path: String) -> Terminal {
        let app = Arc::clone(self);
        Arc::new(move |mut ctx: Context| {
            let app = Arc::clone(&app);
            let method = method.clone();
            let path = path.clone();
            Box::pin(async move {
                match app.router.find(&method, &path) {
                    // `ctx.params` so far is the plain empty map `create`
                    // started it with, never drawn from the router's pool —
                    // only the pool-acquired map `find` returns on a match
                    // round-trips the pool, once, for the whole request.
                    Some(found) => {
                        ctx.params = found.params;
                        found.record.handler.call(ctx).await
                    }
                    None => (ctx, not_found()),
                }
            })
        })
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found() -> Response {
    let body = serde_json::json!({"error": "Not Found"});
    Response::builder()
        .status(http::StatusCode::NOT_FOUND)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body_bytes(bytes::Bytes::from(serde_json::to_vec(&body).unwrap_or_default()))
}

/// Materializes a handler's body value into a `Response`. Binary bodies
/// are never JSON-stringified.
fn materialize_body(body: serde_json::Value) -> Response {
    match body {
        serde_json::Value::String(s) => Response::text(s),
        serde_json::Value::Null => Response::status(http::StatusCode::NO_CONTENT),
        other => other.into_response(),
    }
}

/// Concatenates a mount prefix and a sub-router template: `use(prefix,
/// router)` registers the sub-router's routes with `prefix` concatenated
/// to each route template.
fn join_prefix(prefix: &str, template: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let joined = if template == "/" { prefix.to_string() } else { format!("{prefix}{template}") };
    if joined.is_empty() { "/".to_string() } else { joined }
}
