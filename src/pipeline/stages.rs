use async_trait::async_trait;
use axum::Json;
use axum::body::Body;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::path::PathBuf;

use crate::error::AppError;
use crate::session::{SESSION_COOKIE_NAME, SessionState};

use super::{RequestContext, Stage, StageOutcome};

// --- Stage 1: CORS Allow-List ---

/// CorsStage
///
/// Enforces the origin allow-list for credentialed cross-origin calls. The matched
/// origin is echoed back verbatim together with `Access-Control-Allow-Credentials:
/// true`, never a wildcard (browsers reject wildcards for requests carrying cookies).
/// An unlisted origin is refused with 403 before any later stage runs; a request
/// without an `Origin` header is same-origin traffic and passes untouched.
pub struct CorsStage {
    allowed_origins: Vec<String>,
}

impl CorsStage {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

#[async_trait]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn apply(&self, mut ctx: RequestContext) -> StageOutcome {
        let Some(origin_value) = ctx.request.headers().get(header::ORIGIN).cloned() else {
            // No Origin header: same-origin request, nothing to enforce.
            return StageOutcome::Continue(ctx);
        };

        // A non-UTF8 origin cannot match any configured entry.
        let allowed = origin_value
            .to_str()
            .is_ok_and(|origin| self.is_allowed(origin));

        if !allowed {
            tracing::info!(origin = ?origin_value, "rejected request from unlisted origin");
            let mut response = (
                StatusCode::FORBIDDEN,
                Json(json!({ "message": "Origin not allowed by CORS policy" })),
            )
                .into_response();
            // The answer depends on the Origin header, so caches must key on it.
            response
                .headers_mut()
                .append(header::VARY, HeaderValue::from_static("Origin"));
            return StageOutcome::Respond(response);
        }

        // Echo the matched origin on whatever response this request produces.
        ctx.add_response_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_value);
        ctx.add_response_header(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        ctx.add_response_header(header::VARY, HeaderValue::from_static("Origin"));

        if ctx.request.method() == Method::OPTIONS {
            // Preflight: answer here with the allowed method/header set. The echoed
            // header list mirrors what the browser asked for.
            let requested_headers = ctx
                .request
                .headers()
                .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("Content-Type"));
            ctx.add_response_header(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
            );
            ctx.add_response_header(header::ACCESS_CONTROL_ALLOW_HEADERS, requested_headers);

            return ctx.respond(StatusCode::NO_CONTENT.into_response());
        }

        StageOutcome::Continue(ctx)
    }
}

// --- Stage 2: Cookie Parsing ---

/// CookieStage
///
/// Parses the request's `Cookie` header(s) into the context's name → value map.
/// Infallible: malformed pairs are skipped, a missing header leaves the map empty.
pub struct CookieStage;

#[async_trait]
impl Stage for CookieStage {
    fn name(&self) -> &'static str {
        "cookies"
    }

    async fn apply(&self, mut ctx: RequestContext) -> StageOutcome {
        let mut cookies = std::collections::HashMap::new();
        for value in ctx.request.headers().get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for pair in raw.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                // First occurrence wins, matching browser ordering semantics.
                cookies
                    .entry(name.to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
        ctx.cookies = cookies;
        StageOutcome::Continue(ctx)
    }
}

// --- Stage 3: Session Resolution ---

/// SessionStage
///
/// Resolves the signed session cookie into a live `SessionRecord` and slides its
/// expiry forward, queueing the refreshed `Set-Cookie` for the response. Missing,
/// unsigned, tampered, unknown, and expired cookies all leave the context
/// anonymous. This stage never creates a session, so anonymous traffic costs no
/// store entry. Only store I/O failures are errors.
pub struct SessionStage {
    sessions: SessionState,
}

impl SessionStage {
    pub fn new(sessions: SessionState) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Stage for SessionStage {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn apply(&self, mut ctx: RequestContext) -> StageOutcome {
        let Some(raw) = ctx.cookies.get(SESSION_COOKIE_NAME).cloned() else {
            return StageOutcome::Continue(ctx);
        };

        match self.sessions.resolve(&raw).await {
            Ok(Some((record, refreshed_cookie))) => {
                let value = match HeaderValue::from_str(&refreshed_cookie) {
                    Ok(value) => value,
                    Err(e) => return StageOutcome::Fail(AppError::Stage(e.to_string())),
                };
                ctx.add_response_header(header::SET_COOKIE, value);
                ctx.session = Some(record);
                StageOutcome::Continue(ctx)
            }
            // Invalid or expired cookie: proceed anonymously. Protected routes
            // answer 401 via the extractor, public routes just work.
            Ok(None) => StageOutcome::Continue(ctx),
            Err(e) => StageOutcome::Fail(e),
        }
    }
}

// --- Stage 4: Static File Serving ---

/// StaticStage
///
/// Serves uploaded files verbatim for `GET`/`HEAD` requests under `/uploads/`.
/// A found file short-circuits with its bytes and an extension-inferred content
/// type; a missing file falls through to route dispatch, whose JSON 404 fallback
/// answers. Directory-navigation segments are stripped before resolution, so the
/// served path can never escape the upload directory.
pub struct StaticStage {
    upload_dir: PathBuf,
}

impl StaticStage {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }
}

#[async_trait]
impl Stage for StaticStage {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn apply(&self, ctx: RequestContext) -> StageOutcome {
        let method = ctx.request.method();
        if method != Method::GET && method != Method::HEAD {
            return StageOutcome::Continue(ctx);
        }
        let Some(rest) = ctx.request.uri().path().strip_prefix("/uploads/") else {
            return StageOutcome::Continue(ctx);
        };

        let sanitized = sanitize_path(rest);
        if sanitized.is_empty() {
            return StageOutcome::Continue(ctx);
        }
        let path = self.upload_dir.join(&sanitized);

        // Resolve existence first so a missing file can fall through instead of
        // surfacing as an I/O failure.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return StageOutcome::Continue(ctx),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return StageOutcome::Continue(ctx);
            }
            Err(e) => return StageOutcome::Fail(AppError::Io(e)),
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return StageOutcome::Fail(AppError::Io(e)),
        };

        let is_head = method == Method::HEAD;
        let builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type_for(&sanitized))
            .header(header::CONTENT_LENGTH, bytes.len());
        let body = if is_head {
            Body::empty()
        } else {
            Body::from(bytes)
        };
        match builder.body(body) {
            Ok(response) => ctx.respond(response),
            Err(e) => StageOutcome::Fail(AppError::Stage(e.to_string())),
        }
    }
}

/// sanitize_path
///
/// Removes directory-navigation components (`..`, `.`, empty segments) from a
/// user-provided path, leaving only plain name segments.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// content_type_for
///
/// Infers a response content type from the file extension. Unknown extensions are
/// served as opaque bytes.
fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("mp4") => "video/mp4",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}
