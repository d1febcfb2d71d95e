//! Black-box pipeline properties: onion-order middleware composition,
//! next-called-once enforcement, short-circuiting, exception-filter
//! resolution, and context-pool purity across repeated dispatches.

use std::sync::Arc;

use http::{HeaderMap, Method, StatusCode};
use http_body_util::BodyExt;
use nextrush_core::{Application, Context, ExceptionFilter, NextRushError, Next, RawRequest, Response};
use parking_lot::Mutex;
use serde_json::Value;

fn raw(method: Method, path: &str) -> RawRequest {
    RawRequest {
        method,
        url: path.to_string(),
        path: path.to_string(),
        search: String::new(),
        headers: HeaderMap::new(),
        remote_addr: None,
        socket_encrypted: false,
    }
}

async fn body_text(resp: Response) -> String {
    let (_, _, body) = resp.into_parts();
    String::from_utf8(body.collect().await.unwrap().to_bytes().to_vec()).unwrap()
}

fn recording_middleware(log: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Fn(Context, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = (Context, Response)> + Send>> + Send + Sync + 'static {
    move |ctx: Context, next: Next| {
        let log = log.clone();
        Box::pin(async move {
            log.lock().push(tag);
            let (ctx, resp) = next.call(ctx).await;
            log.lock().push(tag);
            (ctx, resp)
        })
    }
}

#[tokio::test]
async fn scenario_d_onion_order_around_the_handler() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let app = Arc::new(Application::new());

    app.use_mw(recording_middleware(log.clone(), "m1"));
    app.use_mw(recording_middleware(log.clone(), "m2"));
    {
        let log = log.clone();
        app.get("/x", move |ctx: Context| {
            let log = log.clone();
            async move {
                log.lock().push("handler");
                (ctx, Response::text("ok"))
            }
        });
    }

    let resp = app.dispatch(raw(Method::GET, "/x"), Vec::new()).await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(*log.lock(), vec!["m1", "m2", "handler", "m2", "m1"]);
}

#[tokio::test]
async fn middleware_that_skips_next_short_circuits_the_handler() {
    let handler_ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app = Arc::new(Application::new());

    app.use_mw(|ctx: Context, _next: Next| async move { (ctx, Response::text("short-circuited")) });

    {
        let handler_ran = handler_ran.clone();
        app.get("/x", move |ctx: Context| {
            let handler_ran = handler_ran.clone();
            async move {
                handler_ran.store(true, std::sync::atomic::Ordering::SeqCst);
                (ctx, Response::text("unreachable"))
            }
        });
    }

    let resp = app.dispatch(raw(Method::GET, "/x"), Vec::new()).await;
    assert_eq!(body_text(resp).await, "short-circuited");
    assert!(!handler_ran.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn scenario_e_thrown_error_resolves_through_the_global_exception_filter() {
    let app = Arc::new(Application::new());

    app.get("/x", |ctx: Context| async move {
        let err = ctx.throw(422, "invalid");
        (ctx, err)
    });

    let resp = app.dispatch(raw(Method::GET, "/x"), Vec::new()).await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_text(resp).await;
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["error"], "invalid");
    assert_eq!(value["statusCode"], 422);
    assert!(value.get("timestamp").is_some());
}

struct RewritingFilter;

impl ExceptionFilter for RewritingFilter {
    fn tags(&self) -> &[&str] {
        &["Validation"]
    }

    fn handle(&self, _ctx: &Context, _tag: &str, _details: Option<&Value>, _default: Response) -> Response {
        Response::text("validation rewritten")
    }
}

#[tokio::test]
async fn custom_exception_filter_overrides_the_global_default() {
    let app = Arc::new(Application::new());
    app.exception_filter(Arc::new(RewritingFilter));

    app.get("/x", |ctx: Context| async move {
        (ctx, Err::<Response, NextRushError>(NextRushError::Validation("bad field".into())))
    });

    let resp = app.dispatch(raw(Method::GET, "/x"), Vec::new()).await;
    assert_eq!(body_text(resp).await, "validation rewritten");
}

#[tokio::test]
async fn context_pool_is_clean_across_many_dispatches() {
    let app = Arc::new(Application::new());

    app.get("/stateful", |mut ctx: Context| async move {
        let had_body = ctx.body().is_some();
        ctx.set("x-marker", "leftover");
        let _ = &mut ctx;
        (ctx, Response::text(if had_body { "dirty" } else { "clean" }))
    });

    for _ in 0..200 {
        let resp = app.dispatch(raw(Method::GET, "/stateful"), Vec::new()).await;
        assert_eq!(body_text(resp).await, "clean");
    }
}
