// Local push listener routes

mod push;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::mutator::ConfigMutator;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) mutator: Arc<ConfigMutator>,
    pub(crate) token: String,
}

pub fn app(mutator: Arc<ConfigMutator>, token: String) -> Router {
    let state = AppState { mutator, token };
    Router::new()
        .route("/command", post(push::command_handler)) // POST /command
        .route("/version", get(push::version_handler)) // GET /version
        .with_state(state)
}
