//! HTTP route handlers.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{Config, NetworkMode};
use crate::engine::{Engine, NewTaskInput};
use crate::error::{Error, Result};
use crate::types::{Application, ReportReason, Task};

use super::auth::{self, AuthUser};
use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub engine: Engine,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone())?;
    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
    });

    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        // Internal callback surface, authenticated by shared secret.
        .route(
            "/api/internal/moderation/:task_id",
            post(moderation_callback),
        )
        .route(
            "/api/internal/moderation/:task_id/review",
            post(manual_review),
        )
        .route(
            "/api/internal/applications/:id/auto-review",
            post(auto_review_application),
        );

    let protected_routes = Router::new()
        .route("/api/tasks", post(create_task))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:id", get(get_task))
        .route("/api/tasks/:id/cancel", post(cancel_task))
        .route("/api/tasks/:id/applications", post(apply))
        .route("/api/tasks/:id/applications", get(list_applications))
        .route("/api/applications/:id/decision", post(decide_application))
        .route("/api/tasks/:id/deliverable", post(submit_deliverable))
        .route("/api/deliverables/:id/review", post(review_deliverable))
        .route("/api/tasks/:id/reports", post(report_task))
        .route("/api/actors/:id/profile", get(actor_profile))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let network_mode = match state.config.network_mode {
        NetworkMode::Live => "live",
        NetworkMode::Practice => "practice",
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network_mode: network_mode.to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth_required(),
    })
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    let poster = state.engine.resolve_actor(&user.id, user.role)?;
    let task = state.engine.create_task(
        &poster,
        NewTaskInput {
            title: req.title,
            description: req.description,
            category: req.category,
            budget: req.budget,
            deadline: req.deadline,
            required_capabilities: req.required_capabilities,
        },
    )?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>> {
    let tasks = state.engine.list_open_tasks(
        query.category.as_deref(),
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    )?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>> {
    Ok(Json(state.engine.get_task(task_id)?))
}

async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>> {
    let actor = state.engine.resolve_actor(&user.id, user.role)?;
    Ok(Json(state.engine.cancel_task(&actor, task_id)?))
}

async fn apply(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>)> {
    let applicant = state.engine.resolve_actor(&user.id, user.role)?;
    let application =
        state
            .engine
            .apply(&applicant, task_id, req.proposal, req.proposed_price)?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn list_applications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Vec<Application>>> {
    let actor = state.engine.resolve_actor(&user.id, user.role)?;
    Ok(Json(state.engine.list_task_applications(&actor, task_id)?))
}

async fn decide_application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<crate::engine::DecisionOutcome>> {
    let actor = state.engine.resolve_actor(&user.id, user.role)?;
    let outcome = state
        .engine
        .decide_application(&actor, application_id, req.status)?;
    Ok(Json(outcome))
}

async fn submit_deliverable(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<SubmitDeliverableRequest>,
) -> Result<(StatusCode, Json<crate::engine::SubmittedDeliverable>)> {
    let worker = state.engine.resolve_actor(&user.id, user.role)?;
    let submitted = state.engine.submit_deliverable(&worker, task_id, req.content)?;
    let status = if submitted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(submitted)))
}

async fn review_deliverable(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(deliverable_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<crate::engine::ReviewOutcome>> {
    let actor = state.engine.resolve_actor(&user.id, user.role)?;
    let outcome = state.engine.review_deliverable(
        &actor,
        deliverable_id,
        req.outcome,
        req.rating,
        req.notes,
    )?;
    Ok(Json(outcome))
}

async fn report_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ReportRequest>,
) -> Result<(StatusCode, Json<crate::engine::ReportOutcome>)> {
    let reason = ReportReason::parse(&req.reason)
        .ok_or_else(|| Error::validation(format!("invalid report reason '{}'", req.reason)))?;
    let reporter = state.engine.resolve_actor(&user.id, user.role)?;
    let outcome = state
        .engine
        .report_task(&reporter, task_id, reason, req.details)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn actor_profile(
    State(state): State<Arc<AppState>>,
    Path(actor_id): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let profile = state.engine.actor_profile(&actor_id)?;
    Ok(Json(ProfileResponse::from_actor(profile.actor, profile.tier)))
}

/// Extended-moderation callback: idempotent, shared-secret authenticated.
/// Replays echo the recorded decision.
async fn moderation_callback(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<crate::engine::ModerationOutcome>> {
    auth::verify_moderation_secret(&state, &headers)?;
    Ok(Json(state.engine.resolve_moderation(task_id)?))
}

/// Manual moderator decision for a task in `pending_review`.
async fn manual_review(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ManualReviewRequest>,
) -> Result<Json<crate::engine::ModerationOutcome>> {
    auth::verify_moderation_secret(&state, &headers)?;
    Ok(Json(state.engine.resolve_manual_review(
        task_id,
        req.approve,
        req.note.as_deref(),
    )?))
}

/// Automated application reviewer, same callback authentication.
async fn auto_review_application(
    State(state): State<Arc<AppState>>,
    Path(application_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<crate::engine::AutoReviewOutcome>> {
    auth::verify_moderation_secret(&state, &headers)?;
    Ok(Json(state.engine.auto_review_application(application_id)?))
}
