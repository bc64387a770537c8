pub mod error;
pub mod generator;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.server.cors_origins);

    Router::new()
        // Discovery
        .route(
            "/projects/{id}/discovery",
            get(routes::discovery::get_discovery).delete(routes::discovery::reset),
        )
        .route(
            "/projects/{id}/discovery/mode",
            get(routes::discovery::discovery_mode),
        )
        .route(
            "/projects/{id}/discovery/stage",
            put(routes::discovery::advance_stage),
        )
        .route(
            "/projects/{id}/discovery/data",
            put(routes::discovery::update_data),
        )
        .route(
            "/projects/{id}/discovery/users",
            post(routes::discovery::add_user),
        )
        .route(
            "/projects/{id}/discovery/features",
            post(routes::discovery::add_feature),
        )
        .route(
            "/projects/{id}/discovery/confirm",
            post(routes::discovery::confirm),
        )
        .route(
            "/projects/{id}/discovery/history",
            get(routes::discovery::history),
        )
        .route(
            "/projects/{id}/discovery/extract",
            post(routes::discovery::extract),
        )
        // Project PRDs
        .route("/projects/{id}/prds", get(routes::prds::list_prds))
        .route(
            "/projects/{id}/prds/generate",
            post(routes::prds::generate_pending),
        )
        .route("/projects/{id}/prds/next", get(routes::prds::next_prd))
        .route(
            "/projects/{id}/active-prd",
            get(routes::prds::get_active)
                .put(routes::prds::set_active)
                .delete(routes::prds::clear_active),
        )
        // PRDs
        .route(
            "/prds/{id}",
            get(routes::prds::get_prd).patch(routes::prds::update_content),
        )
        .route("/prds/{id}/status", put(routes::prds::update_status))
        .route("/prds/{id}/retry", post(routes::prds::retry))
        .route("/prds/{id}/generate", post(routes::prds::generate))
        .route(
            "/prds/{id}/user-stories",
            post(routes::prds::add_user_story),
        )
        .route(
            "/prds/{id}/user-stories/{story_id}",
            put(routes::prds::update_user_story).delete(routes::prds::delete_user_story),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the REST server on `0.0.0.0:{port}`.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Start the REST server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("specforge server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_and_explicit_origins_build() {
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&[]);
        let _ = cors_layer(&[
            "http://localhost:5173".to_string(),
            "not a header\u{7f}".to_string(),
        ]);
    }
}
