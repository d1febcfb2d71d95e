//! Middleware: the onion-model chain.
//!
//! A middleware is an async function `(ctx, next) -> (ctx, Response)`. The
//! pre-`next` half of the function body runs on the way in; the code after
//! `next.call(ctx).await` runs on the way out, in reverse registration order
//! — the same shape [`crate::handler`] uses to type-erase route handlers,
//! generalized here to a chain of steps instead of one terminal step.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::context::Context;
use crate::response::Response;

/// A type-erased future resolving to the context handed back plus the
/// response produced so far.
pub(crate) type ChainFuture = Pin<Box<dyn Future<Output = (Context, Response)> + Send + 'static>>;

/// The terminal step of a chain — route dispatch, installed fresh per request
/// by the orchestrator (it depends on the just-matched route, so it cannot be
/// part of the cached middleware list itself).
pub(crate) type Terminal = Arc<dyn Fn(Context) -> ChainFuture + Send + Sync>;

#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, ctx: Context, next: Next) -> ChainFuture;
}

/// A heap-allocated, type-erased middleware shared across concurrent requests.
#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware function.
///
/// You never implement this yourself — it is satisfied automatically for any
/// `async fn(ctx: Context, next: Next) -> (Context, Response)`.
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Context, Response)> + Send + 'static,
{
}

impl<F, Fut> Middleware for F
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Context, Response)> + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Context, Next) -> Fut + Send + Sync,
    Fut: Future<Output = (Context, Response)> + Send + 'static,
{
    fn call(&self, ctx: Context, next: Next) -> ChainFuture {
        Box::pin((self.0)(ctx, next))
    }
}

/// The ordered, cacheable list of registered middleware — the chain may
/// cache its composed form. Rebuilt and swapped in whenever
/// `Application::use_mw` mutates the registration — see `app::Application`.
pub type Chain = Vec<BoxedMiddleware>;

/// Shared per-request flag: did any middleware call `next()` more than once?
///
/// One `Violation` is created per request and threaded through every `Next`
/// built for that request's chain, regardless of position.
#[derive(Clone, Default)]
pub(crate) struct Violation(Arc<AtomicBool>);

impl Violation {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// The continuation a middleware calls to invoke the rest of the chain.
///
/// Calling it a second time does not re-run the downstream chain (that would
/// duplicate side effects); it short-circuits to an internal error response
/// and records the violation so the orchestrator can override the final
/// response with the documented `"next() called multiple times"` error,
/// regardless of what the offending middleware does with the return value.
#[derive(Clone)]
pub struct Next {
    chain: Arc<Chain>,
    index: usize,
    terminal: Terminal,
    called: Arc<AtomicBool>,
    violation: Violation,
}

impl Next {
    pub(crate) fn new(chain: Arc<Chain>, terminal: Terminal, violation: Violation) -> Self {
        Self { chain, index: 0, terminal, called: Arc::new(AtomicBool::new(false)), violation }
    }

    /// Invokes the rest of the chain: the next middleware in line, or the
    /// terminal route dispatch if this was the last one.
    pub fn call(&self, ctx: Context) -> ChainFuture {
        if self.called.swap(true, Ordering::AcqRel) {
            self.violation.set();
            return Box::pin(async move {
                let response = crate::error::NextRushError::Internal(
                    "next() called multiple times".to_string(),
                )
                .into();
                (ctx, response)
            });
        }

        if self.index < self.chain.len() {
            let mw = Arc::clone(&self.chain[self.index]);
            let next = Next {
                chain: Arc::clone(&self.chain),
                index: self.index + 1,
                terminal: Arc::clone(&self.terminal),
                called: Arc::new(AtomicBool::new(false)),
                violation: self.violation.clone(),
            };
            mw.call(ctx, next)
        } else {
            (self.terminal)(ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use crate::status::Status;

    fn terminal_ok() -> Terminal {
        Arc::new(|ctx: Context| Box::pin(async move { (ctx, Response::status(Status::Ok)) }))
    }

    #[tokio::test]
    async fn onion_order_is_observed() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::<&'static str>::new()));

        let m1: BoxedMiddleware = {
            let order = order.clone();
            (move |ctx: Context, next: Next| {
                let order = order.clone();
                async move {
                    order.lock().push("m1-enter");
                    let (ctx, resp) = next.call(ctx).await;
                    order.lock().push("m1-exit");
                    (ctx, resp)
                }
            })
            .into_boxed_middleware()
        };

        let m2: BoxedMiddleware = {
            let order = order.clone();
            (move |ctx: Context, next: Next| {
                let order = order.clone();
                async move {
                    order.lock().push("m2-enter");
                    let (ctx, resp) = next.call(ctx).await;
                    order.lock().push("m2-exit");
                    (ctx, resp)
                }
            })
            .into_boxed_middleware()
        };

        let chain = Arc::new(vec![m1, m2]);
        let violation = Violation::new();
        let order_for_terminal = order.clone();
        let terminal: Terminal = Arc::new(move |ctx: Context| {
            let order = order_for_terminal.clone();
            Box::pin(async move {
                order.lock().push("handler");
                (ctx, Response::status(Status::Ok))
            })
        });

        let next = Next::new(chain, terminal, violation.clone());
        let ctx = crate::context::test_support::blank_context();
        let _ = next.call(ctx).await;

        assert_eq!(
            *order.lock(),
            vec!["m1-enter", "m2-enter", "handler", "m2-exit", "m1-exit"]
        );
        assert!(!violation.is_set());
    }

    #[tokio::test]
    async fn calling_next_twice_is_flagged() {
        let chain: Arc<Chain> = Arc::new(vec![]);
        let violation = Violation::new();
        let terminal = terminal_ok();
        let next = Next::new(chain, terminal, violation.clone());

        let ctx = crate::context::test_support::blank_context();
        let _ = next.call(ctx).await;
        let ctx = crate::context::test_support::blank_context();
        let _ = next.call(ctx).await;

        assert!(violation.is_set());
    }

    #[tokio::test]
    async fn skipping_next_short_circuits() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::<&'static str>::new()));
        let order_for_mw = order.clone();
        let m1: BoxedMiddleware = (move |ctx: Context, _next: Next| {
            let order = order_for_mw.clone();
            async move {
                order.lock().push("m1-only");
                (ctx, Response::status(Status::Ok))
            }
        })
        .into_boxed_middleware();

        let order_for_terminal = order.clone();
        let terminal: Terminal = Arc::new(move |ctx: Context| {
            let order = order_for_terminal.clone();
            Box::pin(async move {
                order.lock().push("handler");
                (ctx, Response::status(Status::Ok))
            })
        });

        let chain = Arc::new(vec![m1]);
        let next = Next::new(chain, terminal, Violation::new());
        let ctx = crate::context::test_support::blank_context();
        let _ = next.call(ctx).await;

        assert_eq!(*order.lock(), vec!["m1-only"]);
    }
}
