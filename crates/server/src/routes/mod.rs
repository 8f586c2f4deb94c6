use axum::{
    Router,
    routing::{IntoMakeService, get},
};
use services::services::app::App;
use tower_http::cors::CorsLayer;

pub mod auth;
pub mod dashboard;
pub mod frontend;
pub mod health;
pub mod highlights;
pub mod members;
pub mod notifications;
pub mod public;
pub mod publications;
pub mod push;

pub fn router(app: App) -> IntoMakeService<Router> {
    // Note: health check is inside base_routes so it gets the State<App>
    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::router(&app))
        .merge(members::router(&app))
        .merge(publications::router(&app))
        .merge(highlights::router(&app))
        .merge(notifications::router(&app))
        .merge(dashboard::router(&app))
        .merge(push::router())
        .merge(public::router())
        .layer(CorsLayer::permissive())
        .with_state(app.clone());

    Router::new()
        .route("/", get(frontend::serve_frontend_root))
        .route("/sitemap.xml", get(frontend::serve_sitemap))
        .route("/uploads/{*path}", get(frontend::serve_upload))
        .route("/{*path}", get(frontend::serve_frontend))
        .nest("/api", base_routes)
        .with_state(app)
        .into_make_service()
}
