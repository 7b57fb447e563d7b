//! Operator endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use saga::CompensationRecord;

use crate::state::AppState;

/// GET /admin/compensations: failed compensations and uncompensated removals.
pub async fn compensations(State(state): State<Arc<AppState>>) -> Json<Vec<CompensationRecord>> {
    Json(state.journal().entries())
}
