use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    health::{live, ready},
    ingest::ingest_documents,
    memory::memory_snapshot,
    query::answer_query,
    update_sec::update_sec,
};
use tower_http::trace::TraceLayer;

pub mod api_state;
pub mod error;
mod routes;

#[cfg(test)]
mod tests;

/// Router for the question-answering API.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let api = Router::new()
        .route(
            "/ingest",
            post(ingest_documents).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/query", post(answer_query))
        .route("/update_sec", post(update_sec))
        .route("/memory", get(memory_snapshot));

    public.merge(api).layer(TraceLayer::new_for_http())
}
