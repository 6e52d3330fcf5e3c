//! Route definitions for the `/batch` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batch;
use crate::state::AppState;

/// Routes mounted at `/batch`.
///
/// ```text
/// GET    /          -> get_batch
/// POST   /          -> start_batch
/// DELETE /          -> dismiss_batch
/// POST   /cancel    -> cancel_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(batch::get_batch)
                .post(batch::start_batch)
                .delete(batch::dismiss_batch),
        )
        .route("/cancel", post(batch::cancel_batch))
}
