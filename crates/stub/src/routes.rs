use crate::handlers;
use crate::state::StubState;
use axum::{routing::get, Router};

pub fn create_stub_routes(state: StubState) -> Router {
    Router::new()
        .route("/resolve", get(handlers::resolve))
        .with_state(state)
}
