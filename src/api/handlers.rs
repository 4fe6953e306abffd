use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PreviewConfig;
use crate::error::PreviewError;
use crate::logic::{page_args, ApplyPreview, ApplyPreviewFacade, TargetKind};
use crate::model::{
    ApplyPreviewRequest, ApplyPreviewStats, ChangesetSpecDelta, Id, PageInfo, PublicationIntent,
    ReconcilerOperation,
};
use crate::store::traits::Store;

/// Shared state of the router.
pub struct ApiState<S> {
    pub store: Arc<S>,
    pub preview: PreviewConfig,
}

pub type AppState<S> = Arc<ApiState<S>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: PreviewError) -> ApiError {
    let status = match &err {
        PreviewError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        err if err.is_not_found() => StatusCode::NOT_FOUND,
        PreviewError::Reconciliation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!("apply preview failed: {}", err);
    }
    (status, Json(ErrorResponse::new(&err.to_string())))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyPreviewQuery {
    pub first: Option<usize>,
    /// Cursor returned as `page_info.endCursor` by the previous page
    pub after: Option<String>,
    pub search: Option<String>,
    pub current_state: Option<String>,
    /// Only return mappings whose plan contains this operation
    pub action: Option<String>,
    pub batch_change: Option<Id>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyPreviewBody {
    /// Publication overrides keyed by changeset spec rand id
    #[serde(default)]
    pub publication_states: HashMap<String, PublicationIntent>,
}

#[derive(Debug, Serialize)]
pub struct PreviewNodeResponse {
    pub hidden: bool,
    pub target: TargetKind,
    pub repo_id: Id,
    pub repository: Option<String>,
    pub changeset_spec_id: Option<Id>,
    pub changeset_id: Option<Id>,
    pub title: Option<String>,
    pub operations: Vec<ReconcilerOperation>,
    pub delta: ChangesetSpecDelta,
}

#[derive(Debug, Serialize)]
pub struct ApplyPreviewResponse {
    pub nodes: Vec<PreviewNodeResponse>,
    pub total_count: usize,
    pub page_info: PageInfo,
    pub stats: ApplyPreviewStats,
}

pub async fn get_apply_preview<S: Store>(
    State(state): State<AppState<S>>,
    Path(batch_spec_id): Path<Id>,
    Query(query): Query<ApplyPreviewQuery>,
) -> Result<Json<ApplyPreviewResponse>, ApiError> {
    apply_preview(&state, batch_spec_id, query, HashMap::new())
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn post_apply_preview<S: Store>(
    State(state): State<AppState<S>>,
    Path(batch_spec_id): Path<Id>,
    Query(query): Query<ApplyPreviewQuery>,
    Json(body): Json<ApplyPreviewBody>,
) -> Result<Json<ApplyPreviewResponse>, ApiError> {
    apply_preview(&state, batch_spec_id, query, body.publication_states)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn apply_preview<S: Store>(
    state: &ApiState<S>,
    batch_spec_id: Id,
    query: ApplyPreviewQuery,
    publication_states: HashMap<String, PublicationIntent>,
) -> Result<ApplyPreviewResponse, PreviewError> {
    let args = page_args(
        state.preview.page_size(query.first),
        query.after.as_deref(),
        query.action.as_deref(),
    )?;
    let request = ApplyPreviewRequest {
        batch_spec_id,
        batch_change_id: query.batch_change,
        search: query.search,
        current_state: query.current_state,
        publication_states,
    };

    let facade = ApplyPreviewFacade::open(Arc::clone(&state.store), request).await?;
    let connection = facade.connection(args).await?;

    let mut nodes = Vec::with_capacity(connection.page.nodes.len());
    for preview in &connection.page.nodes {
        nodes.push(node_response(preview).await?);
    }

    Ok(ApplyPreviewResponse {
        nodes,
        total_count: connection.page.total_count,
        page_info: connection.page.page_info.clone(),
        stats: connection.stats,
    })
}

async fn node_response<S: Store>(preview: &ApplyPreview<S>) -> Result<PreviewNodeResponse, PreviewError> {
    let key = preview.key();
    let targets = preview.targets();
    let repository = match preview {
        ApplyPreview::Visible(visible) => visible.mapping().repo.as_ref().map(|repo| repo.name.clone()),
        ApplyPreview::Hidden(_) => None,
    };
    let title = targets
        .changeset_spec()
        .and_then(|spec| spec.visible())
        .and_then(|spec| spec.title())
        .map(str::to_string);

    Ok(PreviewNodeResponse {
        hidden: preview.is_hidden(),
        target: targets.kind(),
        repo_id: key.repo_id,
        repository,
        changeset_spec_id: key.changeset_spec_id,
        changeset_id: key.changeset_id,
        title,
        operations: preview.operations().await?,
        delta: preview.delta().await?,
    })
}
