//! Radix-tree request router.
//!
//! The tree lives behind a [`parking_lot::RwLock`]: reads (lookups) take the
//! shared lock and dominate the hot path; writes (`register`) are rare and
//! only happen during startup or when a sub-[`Router`] is mounted at runtime
//! via `use(prefix, router)`. Registrations during runtime are serialized
//! with a writer-exclusive lock.

pub(crate) mod cache;
pub(crate) mod node;
pub(crate) mod pool;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::BoxedMiddleware;

pub use cache::CachedMatch;
pub use node::{RouteRecord, RouterError};
use node::Node;
use cache::{ResultCache, SplitCache};
use pool::ParamPool;

/// Tuning knobs for a [`Router`].
#[derive(Clone, Copy, Debug)]
pub struct RouterOptions {
    /// Bounded stack size of the parameter-map pool. Default ~200.
    pub param_pool_capacity: usize,
    /// Bounded size of the path split-cache. Default ~1,024.
    pub split_cache_capacity: usize,
    /// Bounded size of the lookup result cache. Default ~1,000.
    pub result_cache_capacity: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self { param_pool_capacity: 200, split_cache_capacity: 1024, result_cache_capacity: 1000 }
    }
}

/// `{cacheHitRate, cacheSize, poolHitRate, totalRoutes}` — `stats()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RouterStats {
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub pool_hit_rate: f64,
    pub total_routes: usize,
}

/// The application router.
///
/// One radix tree with a method→record map at every
/// node, a bounded lookup result cache, a bounded path split-cache, and a
/// bounded parameter-map pool feeding every capturing lookup.
pub struct Router {
    root: RwLock<Node>,
    result_cache: ResultCache,
    split_cache: SplitCache,
    param_pool: ParamPool,
    total_routes: std::sync::atomic::AtomicUsize,
}

impl Router {
    pub fn new() -> Self {
        Self::with_options(RouterOptions::default())
    }

    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            root: RwLock::new(Node::root()),
            result_cache: ResultCache::new(options.result_cache_capacity),
            split_cache: SplitCache::new(options.split_cache_capacity),
            param_pool: ParamPool::new(options.param_pool_capacity),
            total_routes: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Registers a `GET` route. Builder-style: takes and returns `Self`.
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route("GET", path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route("POST", path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route("PUT", path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route("DELETE", path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route("PATCH", path, handler)
    }

    /// Registers a route for an arbitrary (upper-case) method string; `"ALL"`
    /// / `"*"` match any method at this node.
    pub fn route(self, method: &str, path: &str, handler: impl Handler) -> Self {
        self.register(method, path, RouteRecord { handler: handler.into_boxed_handler(), middleware: None })
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"))
    }

    /// Inserts `record` at `(method, template)`. Returns the router so
    /// mounting (`use(prefix, router)`) can fold many registrations into one
    /// chain; see "Behavior on duplicate (method, template):
    /// replace the existing record."
    pub fn register(self, method: &str, template: &str, record: RouteRecord) -> Result<Self, RouterError> {
        let segments = Node::parse_template(template)?;
        {
            let mut root = self.root.write();
            root.insert(template, &segments, method, record)?;
        }
        self.total_routes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.result_cache.clear();
        Ok(self)
    }

    /// Mutates the tree through a shared reference — the counterpart to
    /// [`Router::register`] for an [`crate::app::Application`] holding the
    /// router behind an `Arc`. Registrations during runtime must be
    /// serialized with a writer-exclusive lock, already true here since the
    /// tree lives behind [`RwLock`].
    pub fn register_in_place(&self, method: &str, template: &str, record: RouteRecord) -> Result<(), RouterError> {
        let segments = Node::parse_template(template)?;
        {
            let mut root = self.root.write();
            root.insert(template, &segments, method, record)?;
        }
        self.total_routes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.result_cache.clear();
        Ok(())
    }

    /// Resolves `(method, path)` to a handler and captured parameters.
    /// Never mutates the tree; never panics on an unknown route — the
    /// router never throws on lookup, it returns `None`.
    pub(crate) fn find(&self, method: &str, path: &str) -> Option<CachedMatch> {
        let key = ResultCache::key(method, path);
        if let Some(cached) = self.result_cache.get(&key) {
            return cached;
        }

        let result = self.lookup_uncached(method, path);
        self.result_cache.put(key, result.clone());
        result
    }

    fn lookup_uncached(&self, method: &str, path: &str) -> Option<CachedMatch> {
        if let Some(found) = self.try_lookup(method, path) {
            return Some(found);
        }

        // Trailing-slash retry-once policy: strip or append a
        // single trailing slash and try again before giving up.
        let alternative = if let Some(stripped) = path.strip_suffix('/') {
            if stripped.is_empty() { "/".to_string() } else { stripped.to_string() }
        } else {
            format!("{path}/")
        };

        if alternative != path {
            self.try_lookup(method, &alternative)
        } else {
            None
        }
    }

    fn try_lookup(&self, method: &str, path: &str) -> Option<CachedMatch> {
        let segments = self.split_cache.split(path);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();

        let mut params = self.param_pool.acquire();
        let root = self.root.read();
        match root.find(&refs, method, &mut params) {
            Some(record) => Some(CachedMatch { record, params }),
            None => {
                self.param_pool.release(params);
                None
            }
        }
    }

    /// The router's own parameter-map pool, handed to
    /// [`crate::context::ContextFactory::release`] so a single `release`
    /// call can return both the context and its params map to their pools.
    pub(crate) fn param_pool(&self) -> &ParamPool {
        &self.param_pool
    }

    /// Invalidates the result cache and resets its hit/miss counters.
    pub fn clear_cache(&self) {
        self.result_cache.clear();
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            cache_hit_rate: self.result_cache.hit_rate(),
            cache_size: self.result_cache.len(),
            pool_hit_rate: self.param_pool.hit_rate(),
            total_routes: self.total_routes.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// A detachable sub-router with its own middleware/route table. Routes
/// registered here are folded into the parent
/// [`crate::app::Application`]'s table, prefixed, when mounted via
/// `Application::use_prefixed`.
pub struct SubRouter {
    pub(crate) routes: Vec<(String, String, BoxedHandler)>,
    pub(crate) middleware: Vec<BoxedMiddleware>,
}

impl SubRouter {
    pub fn new() -> Self {
        Self { routes: Vec::new(), middleware: Vec::new() }
    }

    pub fn use_middleware(mut self, mw: impl crate::middleware::Middleware) -> Self {
        self.middleware.push(mw.into_boxed_middleware());
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route("GET", path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route("POST", path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route("PUT", path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route("DELETE", path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route("PATCH", path, handler)
    }

    pub fn route(mut self, method: &str, path: &str, handler: impl Handler) -> Self {
        self.routes.push((method.to_string(), path.to_string(), handler.into_boxed_handler()));
        self
    }
}

impl Default for SubRouter {
    fn default() -> Self {
        Self::new()
    }
}
