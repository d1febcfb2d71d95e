//! The outgoing [`Response`] and its builder.
//!
//! A handler returns anything implementing [`IntoResponse`] — a bare
//! `&str`/`String`/[`serde_json::Value`] for the common cases, a
//! [`crate::error::NextRushError`] to let the exception-filter chain take
//! over, or a fully-built [`Response`] from one of the constructors below.

use std::path::Path;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::body::{self, BoxBody};
use crate::context::Context;
use crate::cookie::CookieOptions;
use crate::error::{NextRushError, NextRushErrorWithDetails};
use crate::status::Status;

/// The in-flight response accumulated on [`Context`] while a request is being
/// handled.
/// Reset to its default on every `ContextFactory::create`/`release`.
pub struct ResponseState {
    pub status: StatusCode,
    /// `true` once [`Context::set_status`](crate::context::Context::set_status)
    /// has been called — lets [`crate::app::Application`] tell "caller
    /// explicitly set a status via `ctx`" apart from "default 200," since
    /// the handler's own [`IntoResponse`] value is the normal source of
    /// the final status otherwise.
    pub status_set: bool,
    pub headers: HeaderMap,
    pub body: Option<BoxBody>,
    pub sent: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self { status: StatusCode::OK, status_set: false, headers: HeaderMap::new(), body: None, sent: false }
    }
}

/// The finished response a handler, middleware, or exception filter hands
/// back to the server.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BoxBody,
    /// Set only by the [`NextRushError`]/[`NextRushErrorWithDetails`]
    /// `IntoResponse` impls below; consumed by
    /// [`crate::app::Application::dispatch`] to decide whether this
    /// response still needs to go through the exception-filter chain
    /// before it is sent, since by the time it reaches the
    /// orchestrator it is already a plain `Response` with no other trace
    /// of the taxonomy tag it came from.
    pub(crate) pending_exception: Option<(&'static str, Option<Value>)>,
    /// Set only by `impl IntoResponse for ()` — tells
    /// [`crate::app::Application::dispatch`] that the handler left the
    /// response body unwritten and `ctx.body`/`ctx.responseHeaders` should
    /// be materialized instead — a fallback for handlers that prefer to
    /// set `ctx.body` over calling `res.json` directly.
    pub(crate) wants_body_fallback: bool,
}

/// Accumulates status/headers before a body is attached (response
/// construction). Mirrors [`http::response::Builder`]'s shape, specialized to
/// the crate's boxed body.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new() }
    }

    pub fn status(mut self, status: impl Into<StatusCode>) -> Self {
        self.status = status.into();
        self
    }

    pub fn header(mut self, name: impl http::header::IntoHeaderName, value: impl TryInto<HeaderValue>) -> Self {
        if let Ok(value) = value.try_into() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(self, body: BoxBody) -> Response {
        Response { status: self.status, headers: self.headers, body, pending_exception: None, wants_body_fallback: false }
    }

    pub fn body_bytes(self, bytes: Bytes) -> Response {
        self.body(body::bytes_body(bytes))
    }

    pub fn empty(self) -> Response {
        self.body(body::empty_body())
    }
}

/// The value types `Response::send` accepts — text,
/// a JSON value, or raw bytes, auto-detected from the argument's type.
pub enum SendBody {
    Text(String),
    Json(Value),
    Bytes(Bytes),
}

impl From<&str> for SendBody {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SendBody {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for SendBody {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<Bytes> for SendBody {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl Response {
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// An empty response carrying just a status code, e.g.
    /// `Response::status(Status::NoContent)`.
    pub fn status(status: impl Into<StatusCode>) -> Self {
        Self::builder().status(status).empty()
    }

    /// The status code actually on this response. Named `status_code` (not
    /// `status`) so it doesn't collide with the [`Response::status`]
    /// constructor above — Rust has no overloading by arity.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_status(&mut self, status: impl Into<StatusCode>) {
        self.status = status.into();
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, BoxBody) {
        (self.status, self.headers, self.body)
    }

    pub(crate) fn from_state(state: ResponseState) -> Self {
        Self {
            status: state.status,
            headers: state.headers,
            body: state.body.unwrap_or_else(body::empty_body),
            pending_exception: None,
            wants_body_fallback: false,
        }
    }

    /// Overlays any headers `ctx.set(name, value)` accumulated, and the
    /// status from `ctx.set_status`, onto a response a handler already
    /// returned via `IntoResponse`. Headers the handler's own response
    /// already set win; `ctx`-level headers only fill gaps.
    pub(crate) fn overlay_context_state(mut self, state: &ResponseState) -> Self {
        for (name, value) in state.headers.iter() {
            if !self.headers.contains_key(name) {
                self.headers.insert(name.clone(), value.clone());
            }
        }
        if state.status_set {
            self.status = state.status;
        }
        self
    }

    /// Consumes the marker `impl IntoResponse for ()` sets, signalling that
    /// `ctx.body` (if any) should replace this placeholder response.
    pub(crate) fn take_wants_body_fallback(&mut self) -> bool {
        std::mem::replace(&mut self.wants_body_fallback, false)
    }

    /// Takes the pending-exception marker, if any (consumed exactly once by
    /// [`crate::app::Application::dispatch`]).
    pub(crate) fn take_pending_exception(&mut self) -> Option<(&'static str, Option<Value>)> {
        self.pending_exception.take()
    }

    // ── Body constructors ───────────────────────────────────────

    pub fn text(body: impl Into<String>) -> Self {
        Self::builder()
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body_bytes(Bytes::from(body.into()))
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::builder()
            .header(http::header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body_bytes(Bytes::from(body.into()))
    }

    pub fn xml(body: impl Into<String>) -> Self {
        Self::builder().header(http::header::CONTENT_TYPE, "application/xml").body_bytes(Bytes::from(body.into()))
    }

    pub fn json(value: &impl Serialize) -> Result<Self, NextRushError> {
        let bytes = serde_json::to_vec(value).map_err(|e| NextRushError::Internal(e.to_string()))?;
        Ok(Self::builder().header(http::header::CONTENT_TYPE, "application/json").body_bytes(Bytes::from(bytes)))
    }

    /// `send(body)`: dispatches on the argument's type rather
    /// than inspecting it at runtime.
    pub fn send(body: impl Into<SendBody>) -> Self {
        match body.into() {
            SendBody::Text(s) => Self::text(s),
            SendBody::Json(v) => Self::json(&v).unwrap_or_else(|e| e.into_response()),
            SendBody::Bytes(b) => Self::builder().header(http::header::CONTENT_TYPE, "application/octet-stream").body_bytes(b),
        }
    }

    /// `csv(rows, filename?)`: serializes an array of flat
    /// records to CSV with a header row taken from the first record's keys.
    /// Cells containing `,`, `"`, or a newline are quoted per RFC 4180.
    pub fn csv(rows: &[Value], filename: Option<&str>) -> Self {
        let mut out = String::new();
        if let Some(Value::Object(first)) = rows.first() {
            let headers: Vec<&String> = first.keys().collect();
            out.push_str(&headers.iter().map(|h| csv_escape(h)).collect::<Vec<_>>().join(","));
            out.push_str("\r\n");

            for row in rows {
                if let Value::Object(map) = row {
                    let cells: Vec<String> =
                        headers.iter().map(|h| map.get(h.as_str()).map(value_to_cell).unwrap_or_default()).collect();
                    out.push_str(&cells.join(","));
                    out.push_str("\r\n");
                }
            }
        }

        let mut builder = Self::builder().header(http::header::CONTENT_TYPE, "text/csv; charset=utf-8");
        if let Some(name) = filename {
            builder = builder.header(http::header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\""));
        }
        builder.body_bytes(Bytes::from(out))
    }

    /// `stream(readable, contentType?)`. Back-pressure flows from
    /// the connection through [`body::ReaderBody`] to `reader` one `poll_read`
    /// at a time.
    pub fn stream<R>(reader: R, content_type: Option<&str>) -> Self
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        Self::builder()
            .header(http::header::CONTENT_TYPE, content_type.unwrap_or("application/octet-stream"))
            .body(body::reader_body(reader))
    }

    /// `sendFile(path, opts?)`: MD5-over-`"{size}-{mtime}"` ETag,
    /// RFC 1123 `Last-Modified`, and a `304` short-circuit when the request's
    /// `If-None-Match` already matches.
    pub async fn send_file(ctx: &Context, path: impl AsRef<Path>) -> Result<Self, NextRushError> {
        Self::send_file_as(ctx, path, None).await
    }

    /// `download(path, filename?, opts?)`: [`Response::send_file`]
    /// plus a `Content-Disposition: attachment` header.
    pub async fn download(ctx: &Context, path: impl AsRef<Path>, filename: Option<&str>) -> Result<Self, NextRushError> {
        let path = path.as_ref();
        let name = filename.map(str::to_string).or_else(|| path.file_name().and_then(|n| n.to_str()).map(str::to_string));
        Self::send_file_as(ctx, path, name.as_deref()).await
    }

    async fn send_file_as(ctx: &Context, path: impl AsRef<Path>, download_name: Option<&str>) -> Result<Self, NextRushError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| NextRushError::NotFound(format!("{} not found", path.display())))?;
        if !metadata.is_file() {
            return Err(NextRushError::NotFound(format!("{} not found", path.display())));
        }

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let size = metadata.len();
        let etag = file_etag(size, mtime);

        if let Some(inm) = ctx.headers().get(http::header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
            if inm == "*" || inm.split(',').any(|t| t.trim() == etag) {
                return Ok(Self::status(StatusCode::NOT_MODIFIED));
            }
        }

        let file = tokio::fs::File::open(path).await.map_err(|e| NextRushError::Internal(e.to_string()))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let last_modified = jiff::Timestamp::from_second(mtime as i64)
            .unwrap_or(jiff::Timestamp::UNIX_EPOCH)
            .strftime("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();

        let mut builder = Self::builder()
            .header(http::header::CONTENT_TYPE, crate::content_type::mime_for_extension(extension))
            .header(http::header::ETAG, etag)
            .header(http::header::LAST_MODIFIED, last_modified)
            .header(http::header::CONTENT_LENGTH, size.to_string());

        if let Some(name) = download_name {
            builder = builder.header(http::header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\""));
        }

        Ok(builder.body(body::reader_body(file)))
    }

    // ── Redirects ───────────────────────────────────────────────

    pub fn redirect(location: &str) -> Self {
        Self::redirect_with_status(location, StatusCode::FOUND)
    }

    pub fn redirect_permanent(location: &str) -> Self {
        Self::redirect_with_status(location, StatusCode::MOVED_PERMANENTLY)
    }

    pub fn redirect_temporary(location: &str) -> Self {
        Self::redirect_with_status(location, StatusCode::TEMPORARY_REDIRECT)
    }

    fn redirect_with_status(location: &str, status: StatusCode) -> Self {
        Self::builder().status(status).header(http::header::LOCATION, location.to_string()).empty()
    }

    // ── Header / cookie helpers (builder-style, consume and return `Self`) ──

    pub fn header(mut self, name: impl http::header::IntoHeaderName, value: impl TryInto<HeaderValue>) -> Self {
        if let Ok(value) = value.try_into() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn remove_header(mut self, name: impl http::header::AsHeaderName) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn cookie(mut self, name: &str, value: &str, opts: &CookieOptions, production: bool) -> Self {
        if let Some(set) = crate::cookie::serialize(name, value, opts, production) {
            if let Ok(v) = HeaderValue::from_str(&set) {
                self.headers.append(http::header::SET_COOKIE, v);
            }
        }
        self
    }

    pub fn clear_cookie(mut self, name: &str, opts: &CookieOptions, production: bool) -> Self {
        if let Some(set) = crate::cookie::serialize_clear(name, opts, production) {
            if let Ok(v) = HeaderValue::from_str(&set) {
                self.headers.append(http::header::SET_COOKIE, v);
            }
        }
        self
    }

    // ── Cache / CORS / security headers ─────────────────────────

    pub fn cache(mut self, max_age_secs: u64) -> Self {
        if let Ok(v) = HeaderValue::from_str(&format!("public, max-age={max_age_secs}")) {
            self.headers.insert(http::header::CACHE_CONTROL, v);
        }
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache, must-revalidate"));
        self.headers.insert(http::header::PRAGMA, HeaderValue::from_static("no-cache"));
        self
    }

    pub fn cors(mut self, origin: &str) -> Self {
        if let Ok(v) = HeaderValue::from_str(origin) {
            self.headers.insert(http::header::ACCESS_CONTROL_ALLOW_ORIGIN, v);
        }
        self.headers
            .insert(http::header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"));
        self.headers
            .insert(http::header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type, Authorization"));
        self
    }

    pub fn security(mut self) -> Self {
        self.headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
        self.headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY"));
        self.headers.insert(HeaderName::from_static("x-xss-protection"), HeaderValue::from_static("1; mode=block"));
        self.headers.insert(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        self
    }

    // ── API envelope helpers ────────────────────────────────────

    /// `success(data, msg?)` → `{success:true, data, message, timestamp}`.
    pub fn success(data: &impl Serialize, msg: Option<&str>) -> Self {
        let body = serde_json::json!({
            "success": true,
            "data": data,
            "message": msg,
            "timestamp": jiff::Timestamp::now().to_string(),
        });
        Self::builder()
            .header(http::header::CONTENT_TYPE, "application/json")
            .body_bytes(Bytes::from(serde_json::to_vec(&body).unwrap_or_default()))
    }

    /// `error(msg, code=500, details?)` →
    /// `{success:false, error, details, timestamp}`. `status` defaults to
    /// `500` when `None`.
    pub fn api_error(message: &str, status: Option<StatusCode>, details: Option<&Value>) -> Self {
        let status = status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "success": false,
            "error": message,
            "details": details,
            "timestamp": jiff::Timestamp::now().to_string(),
        });
        Self::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body_bytes(Bytes::from(serde_json::to_vec(&body).unwrap_or_default()))
    }

    /// `paginate(rows, page, limit, total)` →
    /// `{success, data, pagination:{page, limit, total, totalPages, hasNext,
    /// hasPrev}, timestamp}`.
    pub fn paginate(rows: &impl Serialize, page: u64, limit: u64, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        let has_next = page < total_pages;
        let has_prev = page > 1;
        let body = serde_json::json!({
            "success": true,
            "data": rows,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "totalPages": total_pages,
                "hasNext": has_next,
                "hasPrev": has_prev,
            },
            "timestamp": jiff::Timestamp::now().to_string(),
        });
        Self::builder()
            .header(http::header::CONTENT_TYPE, "application/json")
            .body_bytes(Bytes::from(serde_json::to_vec(&body).unwrap_or_default()))
    }

    // ── Minimal templating ─────────────────────────────

    /// Substitutes `{{a.b.c}}` placeholders in `template` with values looked
    /// up via [`get_nested_value`], then wraps the result as HTML.
    pub fn render(template: &str, data: &Value) -> Self {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            rest = &rest[start + 2..];
            match rest.find("}}") {
                Some(end) => {
                    out.push_str(&get_nested_value(data, rest[..end].trim()));
                    rest = &rest[end + 2..];
                }
                None => {
                    out.push_str("{{");
                    break;
                }
            }
        }
        out.push_str(rest);
        Self::html(out)
    }
}

/// `getNestedValue(data, "a.b.c")`, used by [`Response::render`]
/// and exposed standalone for request-side validators that need the same lookup.
pub fn get_nested_value(data: &Value, path: &str) -> String {
    let mut current = data;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn value_to_cell(v: &Value) -> String {
    match v {
        Value::String(s) => csv_escape(s),
        Value::Null => String::new(),
        other => csv_escape(&other.to_string()),
    }
}

fn file_etag(size: u64, mtime: u64) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(format!("{size}-{mtime}").as_bytes());
    format!("\"{:x}\"", hasher.finalize())
}

/// Implemented for every value a handler may return. A bare `Response` passes
/// through; scalar types get the obvious wire representation; a
/// [`NextRushError`] becomes the error-taxonomy JSON body and marks itself
/// pending for the exception-filter chain.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        let mut resp = Response::status(StatusCode::NO_CONTENT);
        resp.wants_body_fallback = true;
        resp
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        Response::status(self)
    }
}

impl IntoResponse for Status {
    fn into_response(self) -> Response {
        Response::status(self)
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response {
        Response::json(&self).unwrap_or_else(|e| e.into_response())
    }
}

impl IntoResponse for NextRushError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message(),
            "statusCode": self.status_code().as_u16(),
            "timestamp": jiff::Timestamp::now().to_string(),
        });
        let tag = self.tag();
        let mut resp = Response::builder()
            .status(self.status_code())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body_bytes(Bytes::from(serde_json::to_vec(&body).unwrap_or_default()));
        resp.pending_exception = Some((tag, None));
        resp
    }
}

impl IntoResponse for NextRushErrorWithDetails {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.error.message(),
            "statusCode": self.error.status_code().as_u16(),
            "timestamp": jiff::Timestamp::now().to_string(),
        });
        if let Some(details) = &self.details {
            body["details"] = details.clone();
        }
        let tag = self.error.tag();
        let mut resp = Response::builder()
            .status(self.error.status_code())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body_bytes(Bytes::from(serde_json::to_vec(&body).unwrap_or_default()));
        resp.pending_exception = Some((tag, self.details));
        resp
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(t) => t.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

impl From<NextRushError> for Response {
    fn from(err: NextRushError) -> Self {
        err.into_response()
    }
}

impl From<NextRushErrorWithDetails> for Response {
    fn from(err: NextRushErrorWithDetails) -> Self {
        err.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> Value {
        let (_, _, body) = resp.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_constructor_and_accessor_are_distinct() {
        let resp = Response::status(Status::NoContent);
        assert_eq!(resp.status_code(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn json_sets_content_type() {
        let resp = Response::json(&serde_json::json!({"ok": true})).unwrap();
        assert_eq!(resp.headers().get(http::header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn redirect_sets_location_and_status() {
        let resp = Response::redirect("/login");
        assert_eq!(resp.status_code(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(http::header::LOCATION).unwrap(), "/login");
    }

    #[test]
    fn cookie_appends_set_cookie_header() {
        let resp = Response::text("ok").cookie("sid", "abc", &CookieOptions::default(), false);
        let value = resp.headers().get(http::header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(value.starts_with("sid=abc"));
    }

    #[test]
    fn csv_derives_header_from_first_row_and_quotes_commas() {
        let rows = vec![
            serde_json::json!({"name": "a", "note": "has, comma"}),
            serde_json::json!({"name": "b", "note": "plain"}),
        ];
        let resp = Response::csv(&rows, None);
        assert_eq!(resp.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/csv; charset=utf-8");
    }

    #[tokio::test]
    async fn paginate_computes_total_pages_and_has_next_prev() {
        let resp = Response::paginate(&serde_json::json!([1, 2, 3]), 1, 10, 25);
        assert_eq!(resp.status_code(), StatusCode::OK);
        let value = body_json(resp).await;
        assert_eq!(value["pagination"]["page"], 1);
        assert_eq!(value["pagination"]["limit"], 10);
        assert_eq!(value["pagination"]["total"], 25);
        assert_eq!(value["pagination"]["totalPages"], 3);
        assert_eq!(value["pagination"]["hasNext"], true);
        assert_eq!(value["pagination"]["hasPrev"], false);
        assert!(value.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn paginate_on_the_last_page_has_no_next() {
        let resp = Response::paginate(&serde_json::json!([1, 2, 3]), 3, 10, 25);
        let value = body_json(resp).await;
        assert_eq!(value["pagination"]["hasNext"], false);
        assert_eq!(value["pagination"]["hasPrev"], true);
    }

    #[tokio::test]
    async fn success_carries_optional_message() {
        let resp = Response::success(&serde_json::json!({"id": 1}), Some("created"));
        let value = body_json(resp).await;
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["id"], 1);
        assert_eq!(value["message"], "created");
        assert!(value.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn api_error_defaults_to_500_and_carries_details() {
        let resp = Response::api_error("bad thing", None, Some(&serde_json::json!({"field": "x"})));
        assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let value = body_json(resp).await;
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "bad thing");
        assert_eq!(value["details"]["field"], "x");
        assert!(value.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn api_error_accepts_an_explicit_status() {
        let resp = Response::api_error("missing field", Some(StatusCode::BAD_REQUEST), None);
        assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn render_substitutes_nested_placeholders() {
        let data = serde_json::json!({"user": {"name": "Ada"}});
        assert_eq!(get_nested_value(&data, "user.name"), "Ada");
        let resp = Response::render("Hello, {{user.name}}!", &data);
        assert_eq!(resp.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/html; charset=utf-8");
    }

    #[test]
    fn error_into_response_carries_taxonomy_status() {
        let resp = NextRushError::NotFound("missing".into()).into_response();
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn send_file_sets_etag_and_content_type() {
        let dir = std::env::temp_dir().join(format!("nextrush-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("hello.txt");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let ctx = crate::context::test_support::blank_context();
        let resp = Response::send_file(&ctx, &path).await.unwrap();
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(resp.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
        assert!(resp.headers().contains_key(http::header::ETAG));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn send_file_returns_not_found_for_missing_path() {
        let ctx = crate::context::test_support::blank_context();
        let err = Response::send_file(&ctx, "/nonexistent/path/nope.txt").await.unwrap_err();
        assert!(matches!(err, NextRushError::NotFound(_)));
    }
}
