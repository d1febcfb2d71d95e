//! # nextrush-core
//!
//! The request-serving engine of a general-purpose HTTP framework: a
//! radix-tree [`Router`], a pooled per-request [`Context`], request/response
//! enhancers, an [`Application`] orchestrator composing middleware in onion
//! order, and a [`Server`] that owns the listener and graceful shutdown.
//!
//! ## What this crate is not
//!
//! Concrete middleware bodies (CORS, helmet, rate limiting, body parsers),
//! plugins (static files, templating, websockets), and CQRS/event-sourcing
//! tooling are out of scope. This crate models the registration contracts
//! those things plug into — a [`Middleware`] is just
//! `Fn(Context, Next) -> Future<Output = (Context, Response)>` — and nothing
//! more.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nextrush_core::{Application, Context, Response, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Arc::new(Application::new());
//!     app.get("/", hello);
//!     app.get("/users/:id", get_user);
//!
//!     let server = Server::new(app);
//!     server.listen("0.0.0.0:3000").await.unwrap();
//!     server.serve_until_shutdown().await;
//! }
//!
//! async fn hello(ctx: Context) -> (Context, Response) {
//!     (ctx, Response::text("Hello from nextrush!"))
//! }
//!
//! async fn get_user(ctx: Context) -> (Context, Response) {
//!     let id = ctx.request().param("id").unwrap_or("unknown").to_string();
//!     (ctx, Response::text(format!("User: {id}")))
//! }
//! ```

mod app;
mod body;
mod content_type;
mod context;
mod cookie;
mod error;
mod events;
mod exception;
mod handler;
mod request;
mod response;
mod router;
mod sanitize;
mod server;
mod status;
mod useragent;
mod validate;

pub mod middleware;

pub use app::Application;
pub use context::{Context, ContextFactory, ContextOptions, RawRequest};
pub use cookie::{CookieOptions, SameSite};
pub use error::{Error, NextRushError, NextRushErrorWithDetails};
pub use events::{Event, EventBus};
pub use exception::{ExceptionFilter, ExceptionFilterChain, GlobalExceptionFilter};
pub use handler::Handler;
pub use middleware::{Middleware, Next};
pub use request::RequestView;
pub use response::{IntoResponse, Response, ResponseBuilder, SendBody};
pub use router::{CachedMatch, RouteRecord, Router, RouterError, RouterOptions, RouterStats, SubRouter};
pub use sanitize::SanitizeStep;
pub use server::{Server, ServerOptions, State};
pub use status::Status;
pub use useragent::UserAgentInfo;
pub use validate::{FieldRule, FieldType, ValidationResult};
