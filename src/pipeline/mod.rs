// The request middleware pipeline: an ordered, explicit list of stages applied to
// every inbound request before route dispatch. Stages are plain values behind the
// `Stage` trait; the `Pipeline` driver runs them strictly in declared order and a
// tagged `StageOutcome` makes control flow explicit, with no hidden `next`
// chaining and no stage ever recovering another stage's failure.

/// The four concrete stages, in their canonical order: CORS, cookies, session, static files.
pub mod stages;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::session::{CurrentSession, SessionRecord, SessionState};

use stages::{CookieStage, CorsStage, SessionStage, StaticStage};

/// RequestContext
///
/// One per inbound request: owns the HTTP request plus everything the stages have
/// learned about it so far. That covers parsed cookies, the resolved session
/// record, and the response decorations (CORS echo headers, refreshed
/// `Set-Cookie`) that must reach the client no matter which stage or handler
/// ultimately answers. Dropped when the response completes.
pub struct RequestContext {
    pub request: Request<Body>,
    /// Name → value pairs from the `Cookie` header(s); empty until the cookie stage runs.
    pub cookies: HashMap<String, String>,
    /// The live session behind a valid cookie; `None` means anonymous.
    pub session: Option<SessionRecord>,
    decorations: ResponseDecorations,
}

impl RequestContext {
    pub fn new(request: Request<Body>) -> Self {
        Self {
            request,
            cookies: HashMap::new(),
            session: None,
            decorations: ResponseDecorations::default(),
        }
    }

    /// add_response_header
    ///
    /// Queues a header for the eventual response, whoever produces it. Stages use
    /// this instead of touching a response directly so that short-circuits and
    /// dispatched responses are decorated identically.
    pub fn add_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.decorations.push(name, value);
    }

    /// respond
    ///
    /// Short-circuits the pipeline with `response`, first applying every decoration
    /// queued by this and earlier stages. The single construction point for the
    /// `Respond` outcome keeps that invariant in one place.
    pub fn respond(self, mut response: Response) -> StageOutcome {
        self.decorations.apply(&mut response);
        StageOutcome::Respond(response)
    }

    /// into_dispatch
    ///
    /// Converts the context for route dispatch once every stage has continued: the
    /// resolved session is attached to the request extensions (where the `AuthUser`
    /// extractor finds it) and the queued decorations are handed back so the driver
    /// can apply them to the router's response.
    fn into_dispatch(mut self) -> (Request<Body>, ResponseDecorations) {
        if let Some(record) = self.session.take() {
            self.request.extensions_mut().insert(CurrentSession(record));
        }
        (self.request, self.decorations)
    }
}

/// ResponseDecorations
///
/// Headers accumulated by stages for the eventual response. Applied with `append`,
/// so a refreshed `Set-Cookie` never clobbers one a handler set itself.
#[derive(Default)]
struct ResponseDecorations {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl ResponseDecorations {
    fn push(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.push((name, value));
    }

    fn apply(&self, response: &mut Response) {
        for (name, value) in &self.headers {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
}

/// StageOutcome
///
/// The tagged result of one stage. Exactly one of three things happens to a request
/// at each stage: it moves on (annotated), it is answered here, or it failed.
pub enum StageOutcome {
    /// Pass the (possibly annotated) context to the next stage.
    Continue(RequestContext),
    /// Short-circuit with this response; later stages never see the request.
    Respond(Response),
    /// Hand the error to the terminal backstop: log detail, answer the generic 500.
    Fail(AppError),
}

/// Stage
///
/// One step of the pipeline. Implementations are constructed once at startup with
/// whatever they need injected (config slices, the session manager) and shared
/// across all requests, so `apply` takes `&self`.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short identifier used in log events when this stage answers or fails.
    fn name(&self) -> &'static str;

    /// Processes the context. Must not recover a previous stage's failure; by the
    /// time `apply` runs, every earlier stage has continued.
    async fn apply(&self, ctx: RequestContext) -> StageOutcome;
}

/// Pipeline
///
/// The driver: owns the ordered stage list and runs each inbound request through
/// it. Bridged into the router as a single axum middleware (see `create_router`),
/// wrapping route dispatch as the implicit final step.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// standard
    ///
    /// The canonical four-stage pipeline in its fixed order: CORS allow-list,
    /// cookie parsing, session resolution, static file serving. The session
    /// manager is injected; the remaining stages take their slice of `AppConfig`.
    pub fn standard(config: &AppConfig, sessions: SessionState) -> Self {
        Self::with_stages(vec![
            Box::new(CorsStage::new(config.allowed_origins.clone())),
            Box::new(CookieStage),
            Box::new(SessionStage::new(sessions)),
            Box::new(StaticStage::new(config.upload_dir.clone())),
        ])
    }

    /// with_stages
    ///
    /// Builds a driver over an explicit stage list. Tests use this to run reduced
    /// or instrumented pipelines.
    pub fn with_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// handle
    ///
    /// Runs the request through every stage in declared order, then dispatches to
    /// the router. `Respond` returns immediately (decorations already applied by
    /// the stage's context); `Fail` is converted by the terminal backstop into the
    /// generic 500. A dispatched response receives the queued decorations before
    /// it leaves.
    pub async fn handle(&self, request: Request<Body>, next: Next) -> Response {
        let mut ctx = RequestContext::new(request);

        for stage in &self.stages {
            match stage.apply(ctx).await {
                StageOutcome::Continue(next_ctx) => ctx = next_ctx,
                StageOutcome::Respond(response) => {
                    tracing::debug!(
                        stage = stage.name(),
                        status = %response.status(),
                        "pipeline short-circuit"
                    );
                    return response;
                }
                StageOutcome::Fail(error) => {
                    tracing::warn!(stage = stage.name(), "pipeline stage failed");
                    return error.into_response();
                }
            }
        }

        // Every stage continued: hand the annotated request to the router and
        // decorate whatever it answers.
        let (request, decorations) = ctx.into_dispatch();
        let mut response = next.run(request).await;
        decorations.apply(&mut response);
        response
    }
}
