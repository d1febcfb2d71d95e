//! Per-request [`Context`].
//!
//! A `Context` is created once per request, threaded through the middleware
//! chain and the route handler by value (it is `Send`, never `Sync` —
//! mutated only through the pipeline that owns it), and released back to
//! its pool afterwards.

use std::any::Any;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use http::{HeaderMap, HeaderValue, Method, StatusCode};
use uuid::Uuid;

use crate::error::NextRushError;
use crate::response::ResponseState;
use crate::router::pool::ParamsMap;

/// Tuning knobs for [`ContextFactory`].
#[derive(Clone, Copy, Debug)]
pub struct ContextOptions {
    /// Whether `X-Forwarded-For` / `X-Forwarded-Proto` / `X-Real-IP` are
    /// consulted for the derived `ip`/`protocol` fields.
    pub trust_proxy: bool,
    /// Gates the cookie-writer defaults: production defaults to
    /// `Secure; HttpOnly; SameSite=Strict`.
    pub production: bool,
    /// Bounded pool size.
    pub pool_capacity: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self { trust_proxy: true, production: false, pool_capacity: 100 }
    }
}

/// Everything a [`Context`] needs to resolve itself from a raw request: the
/// pieces a transport adapter (hyper, in this crate's case) supplies.
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub search: String,
    pub headers: HeaderMap,
    pub remote_addr: Option<IpAddr>,
    pub socket_encrypted: bool,
}

/// A per-request value object.
///
/// Immutable fields are set once at `create` time; mutable fields (`body`,
/// `params`, `state`, response bits) are cleared on `release` so nothing
/// leaks between requests drawn from the same pooled slot — contexts in
/// the pool are always cleared before reuse.
pub struct Context {
    // ── Immutable ──────────────────────────────────────────────────────────
    pub(crate) id: Uuid,
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) path: String,
    pub(crate) search: String,
    pub(crate) headers: HeaderMap,
    pub(crate) query: HashMap<String, String>,
    pub(crate) ip: String,
    pub(crate) secure: bool,
    pub(crate) protocol: &'static str,
    pub(crate) hostname: String,
    pub(crate) host: String,
    pub(crate) origin: String,
    pub(crate) href: String,
    pub(crate) start_time: Instant,
    pub(crate) production: bool,

    // ── Mutable ────────────────────────────────────────────────────────────
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) raw_body: Vec<u8>,
    pub params: ParamsMap,
    pub state: HashMap<String, Box<dyn Any + Send>>,
    pub(crate) resp: ResponseState,
    pub(crate) cancelled: bool,
}

impl Context {
    /// HTTP method of the request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Flat map of the first occurrence of each query-string key.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// The parsed request body, as set by a body-parser middleware via
    /// [`Context::set_body`]. `None` until one runs.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }

    /// Installed by body-parser middleware (out of scope ; this
    /// is the contract point those middlewares write through).
    pub fn set_body(&mut self, value: serde_json::Value, raw: Vec<u8>) {
        self.body = Some(value);
        self.raw_body = raw;
    }

    /// Stashes the raw request bytes read off the wire, without touching
    /// the parsed `body` slot — called once by the transport layer before
    /// the middleware chain runs. `ctx.body()` stays `None` until a
    /// body-parser middleware calls [`Context::set_body`]; keeps
    /// concrete body-parsers out of this crate's scope.
    pub(crate) fn set_raw_body(&mut self, raw: Vec<u8>) {
        self.raw_body = raw;
    }

    /// `true` once the connection underlying this request has been observed
    /// closed; middleware and filters should check
    /// this before doing further work.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Mirrors a response header onto `ctx.responseHeaders` and the
    /// in-progress response.
    pub fn set(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (http::HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            self.resp.headers.insert(name, value);
        }
    }

    /// Current response status, delegated to the response state.
    pub fn status(&self) -> StatusCode {
        self.resp.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.resp.status = status;
        self.resp.status_set = true;
    }

    /// Builds a tagged error from a raw status and message — the Rust
    /// realization of `ctx.throw(status, msg)`. The caller
    /// propagates it with `return Err(ctx.throw(..))`.
    pub fn throw(&self, status: u16, msg: impl Into<String>) -> NextRushError {
        NextRushError::from_status(status, msg)
    }

    /// `ctx.assert(cond, status, msg)`: returns `Err` built the same
    /// way as [`Context::throw`] when `cond` is false.
    pub fn assert(&self, cond: bool, status: u16, msg: impl Into<String>) -> Result<(), NextRushError> {
        if cond { Ok(()) } else { Err(self.throw(status, msg)) }
    }

    /// `true` when the request's conditional headers (`If-None-Match`,
    /// `If-Modified-Since`) indicate the client's cached copy is still
    /// current, compared against whatever `ETag` / `Last-Modified` the
    /// response has set so far.
    pub fn fresh(&self) -> bool {
        let inm = self.headers.get(http::header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
        let etag = self.resp.headers.get(http::header::ETAG).and_then(|v| v.to_str().ok());
        if let (Some(inm), Some(etag)) = (inm, etag) {
            if inm == "*" || inm.split(',').any(|t| t.trim() == etag) {
                return true;
            }
        }

        let ims = self.headers.get(http::header::IF_MODIFIED_SINCE).and_then(|v| v.to_str().ok());
        let last_modified = self.resp.headers.get(http::header::LAST_MODIFIED).and_then(|v| v.to_str().ok());
        if let (Some(ims), Some(lm)) = (ims, last_modified) {
            return ims == lm;
        }

        false
    }

    pub fn stale(&self) -> bool {
        !self.fresh()
    }

    /// Methods whose semantics guarantee no server-side side effect.
    pub fn idempotent(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS | Method::TRACE)
    }

    pub fn cacheable(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD)
    }

    pub fn production(&self) -> bool {
        self.production
    }

    /// A borrowed view exposing request-enhancement surface
    /// (`is`, `accepts`, `cookies`, `validate`, `sanitize`, `userAgent`,
    /// `fingerprint`) without bloating `Context` itself with that state.
    pub fn request(&self) -> crate::request::RequestView<'_> {
        crate::request::RequestView::new(self)
    }
}

/// Acquires and releases [`Context`]s from a bounded pool.
pub struct ContextFactory {
    pool: parking_lot::Mutex<Vec<Box<Context>>>,
    options: ContextOptions,
}

impl ContextFactory {
    pub fn new(options: ContextOptions) -> Self {
        Self { pool: parking_lot::Mutex::new(Vec::with_capacity(options.pool_capacity)), options }
    }

    /// Acquires a context from the pool (or allocates a fresh one) and fills
    /// its immutable fields from `raw`. `params` starts out as a plain empty
    /// map, not one drawn from the router's pool — the route (and therefore
    /// whether any params exist at all) isn't known until dispatch reaches
    /// the terminal step, so reserving a pooled map this early would cost a
    /// second, usually-wasted pool round-trip on every request.
    pub fn create(&self, raw: RawRequest) -> Context {
        let mut ctx = match self.pool.lock().pop() {
            Some(boxed) => *boxed,
            None => Context {
                id: Uuid::nil(),
                method: Method::GET,
                url: String::new(),
                path: String::new(),
                search: String::new(),
                headers: HeaderMap::new(),
                query: HashMap::new(),
                ip: String::new(),
                secure: false,
                protocol: "http",
                hostname: String::new(),
                host: String::new(),
                origin: String::new(),
                href: String::new(),
                start_time: Instant::now(),
                production: self.options.production,
                body: None,
                raw_body: Vec::new(),
                params: ParamsMap::new(),
                state: HashMap::new(),
                resp: ResponseState::default(),
                cancelled: false,
            },
        };

        self.fill(&mut ctx, raw);
        ctx
    }

    fn fill(&self, ctx: &mut Context, raw: RawRequest) {
        let ip = derive_ip(&raw.headers, raw.remote_addr, self.options.trust_proxy);
        let (protocol, secure) = derive_protocol(&raw.headers, raw.socket_encrypted, self.options.trust_proxy);
        let host = raw
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost")
            .to_string();
        let hostname = host.split(':').next().unwrap_or("localhost").to_string();
        let origin = format!("{protocol}://{host}");
        let href = format!("{origin}{}", raw.url);
        let query = parse_query(&raw.search);

        ctx.id = Uuid::new_v4();
        ctx.method = raw.method;
        ctx.url = raw.url;
        ctx.path = raw.path;
        ctx.search = raw.search;
        ctx.headers = raw.headers;
        ctx.query = query;
        ctx.ip = ip;
        ctx.secure = secure;
        ctx.protocol = protocol;
        ctx.hostname = hostname;
        ctx.host = host;
        ctx.origin = origin;
        ctx.href = href;
        ctx.start_time = Instant::now();
        ctx.production = self.options.production;
        ctx.body = None;
        ctx.raw_body.clear();
        ctx.params = ParamsMap::new();
        ctx.state.clear();
        ctx.resp = ResponseState::default();
        ctx.cancelled = false;
    }

    /// Clears every mutable field and returns both the context and its
    /// params map to their pools.
    pub fn release(&self, mut ctx: Context, param_pool: &crate::router::pool::ParamPool) {
        let params = std::mem::take(&mut ctx.params);
        param_pool.release(params);

        ctx.state.clear();
        ctx.body = None;
        ctx.raw_body.clear();
        ctx.resp = ResponseState::default();
        ctx.cancelled = false;

        let mut pool = self.pool.lock();
        if pool.len() < self.options.pool_capacity {
            pool.push(Box::new(ctx));
        }
    }

    /// Empties the pool — wired into `Server::close` so graceful shutdown
    /// releases pooled contexts.
    pub fn drain(&self) {
        self.pool.lock().clear();
    }

    pub fn pool_len(&self) -> usize {
        self.pool.lock().len()
    }
}

impl Default for ContextFactory {
    fn default() -> Self {
        Self::new(ContextOptions::default())
    }
}

fn derive_ip(headers: &HeaderMap, remote: Option<IpAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            if let Some(first) = xff.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            if !real_ip.trim().is_empty() {
                return real_ip.trim().to_string();
            }
        }
    }

    remote.map(|ip| ip.to_string()).unwrap_or_else(|| "127.0.0.1".to_string())
}

fn derive_protocol(headers: &HeaderMap, socket_encrypted: bool, trust_proxy: bool) -> (&'static str, bool) {
    if trust_proxy {
        if let Some(proto) = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()) {
            if proto.eq_ignore_ascii_case("https") {
                return ("https", true);
            }
        }
    }

    if socket_encrypted { ("https", true) } else { ("http", false) }
}

/// Flat first-occurrence query map.
fn parse_query(search: &str) -> HashMap<String, String> {
    let trimmed = search.strip_prefix('?').unwrap_or(search);
    let mut map = HashMap::new();
    for (k, v) in form_urlencoded::parse(trimmed.as_bytes()) {
        map.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    map
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A fully-cleared `Context` for pipeline/middleware unit tests that do
    /// not exercise `ContextFactory` directly.
    pub(crate) fn blank_context() -> Context {
        let factory = ContextFactory::default();
        factory.create(RawRequest {
            method: Method::GET,
            url: "/".to_string(),
            path: "/".to_string(),
            search: String::new(),
            headers: HeaderMap::new(),
            remote_addr: None,
            socket_encrypted: false,
        })
    }
}
