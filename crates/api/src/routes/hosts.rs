//! Route definitions for the `/hosts` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::hosts;
use crate::state::AppState;

/// Routes mounted at `/hosts`.
///
/// ```text
/// GET    /                 -> list_hosts
/// PUT    /                 -> replace_hosts
/// PUT    /updates          -> set_updates
/// POST   /remove-update    -> remove_update
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(hosts::list_hosts).put(hosts::replace_hosts))
        .route("/updates", put(hosts::set_updates))
        .route("/remove-update", post(hosts::remove_update))
}
