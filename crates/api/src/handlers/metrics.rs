use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::metrics::AllMetrics;
use crate::state::AppState;

/// GET /api/fetch-all-metrics
///
/// Not wrapped in the data envelope: dashboards read `hosts` directly.
pub async fn fetch_all_metrics(State(state): State<AppState>) -> AppResult<Json<AllMetrics>> {
    let hosts = state.registry.list_hosts().await?;
    Ok(Json(state.metrics.fetch_all(&hosts).await))
}
