//! Minimal nextrush-core example — CRUD-style JSON endpoints, a logging
//! middleware, and a custom exception filter.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/42
//!   curl http://localhost:3000/users/ -i   # triggers the Validation filter

use std::sync::Arc;

use nextrush_core::{Application, Context, ExceptionFilter, NextRushError, Response, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Arc::new(Application::new());
    app.use_mw(log_requests);
    app.exception_filter(Arc::new(ValidationFilter));

    app.get("/users/:id", get_user);
    app.post("/users", create_user);
    app.delete("/users/:id", delete_user);

    let server = Server::new(app);
    server.listen("0.0.0.0:3000").await.expect("bind failed");
    server.serve_until_shutdown().await;
}

async fn log_requests(ctx: Context, next: nextrush_core::Next) -> (Context, Response) {
    let method = ctx.method().clone();
    let path = ctx.path().to_string();
    let (ctx, resp) = next.call(ctx).await;
    tracing::info!(%method, path, status = resp.status_code().as_u16(), "request handled");
    (ctx, resp)
}

async fn get_user(ctx: Context) -> (Context, Result<Response, NextRushError>) {
    let id = ctx.request().param("id").unwrap_or("unknown").to_string();
    if id.is_empty() {
        return (ctx, Err(NextRushError::Validation("id must not be empty".into())));
    }
    let resp = Response::json(&serde_json::json!({"id": id, "name": "alice"})).unwrap();
    (ctx, Ok(resp))
}

async fn create_user(ctx: Context) -> (Context, Response) {
    let body = ctx.body().cloned();
    let Some(body) = body else {
        return (ctx, Response::api_error("missing request body", Some(http::StatusCode::BAD_REQUEST), None));
    };

    let name = body.get("name").and_then(|v| v.as_str()).unwrap_or("new_user");
    let resp = Response::builder()
        .status(http::StatusCode::CREATED)
        .header(http::header::LOCATION, "/users/99")
        .body_bytes(bytes::Bytes::from(serde_json::json!({"id": "99", "name": name}).to_string()));
    (ctx, resp)
}

async fn delete_user(ctx: Context) -> (Context, Response) {
    (ctx, Response::status(http::StatusCode::NO_CONTENT))
}

struct ValidationFilter;

impl ExceptionFilter for ValidationFilter {
    fn tags(&self) -> &[&str] {
        &["Validation"]
    }

    fn handle(&self, _ctx: &Context, tag: &str, _details: Option<&serde_json::Value>, default: Response) -> Response {
        tracing::warn!(tag, "validation rejected the request");
        default
    }
}
