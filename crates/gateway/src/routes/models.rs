//! Model listing

use axum::extract::State;
use axum::Json;

use mnemo_core::chat::{ModelInfo, ModelListResponse};

use crate::state::AppState;

pub async fn list_models(State(state): State<AppState>) -> Json<ModelListResponse> {
    let data = state
        .model_router
        .list()
        .into_iter()
        .map(ModelInfo::new)
        .collect();
    Json(ModelListResponse::new(data))
}
