use axum::{routing::get, Router};

use crate::{handlers, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/messages/{channel}", get(handlers::list_messages))
        .route("/messages/{channel}/{message_id}", get(handlers::get_message))
        .route("/feed/{channel}", get(handlers::feed))
        .with_state(state)
}
