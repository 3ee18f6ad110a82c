// src/routes.rs

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, assessment, auth, community, dashboard, interaction, profile},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges the public, signed-in and admin sub-routers.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, exam sessions).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(community::ANONYMOUS_ID_HEADER),
        ]);

    let require_auth = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let profile_routes = Router::new()
        .route(
            "/me",
            get(profile::get_me)
                .put(profile::update_me)
                .delete(profile::delete_me),
        )
        .route("/posts", get(profile::list_my_posts))
        .route("/results", get(profile::list_my_results))
        .layer(require_auth());

    let post_routes = Router::new()
        .route("/", get(community::list_posts))
        .route("/hot", get(community::hot_posts))
        .route("/{id}", get(community::get_post))
        .route("/{id}/comments", get(interaction::list_comments))
        .merge(
            Router::new()
                .route("/", post(community::create_post))
                .route(
                    "/{id}",
                    put(community::update_post).delete(community::delete_post),
                )
                .route("/{id}/reaction", post(interaction::react))
                .route("/{id}/comments", post(interaction::create_comment))
                .layer(require_auth()),
        );

    let dashboard_routes = Router::new()
        .route("/banners", get(dashboard::list_banners))
        .route("/visit", post(dashboard::record_visit))
        .merge(
            Router::new()
                .route("/quiz-status", get(dashboard::quiz_status))
                .layer(require_auth()),
        );

    let education_routes = Router::new().route("/", get(dashboard::list_education)).merge(
        Router::new()
            .route("/", post(dashboard::create_education_post))
            .layer(require_auth()),
    );

    let assessment_routes = Router::new()
        .route("/", get(dashboard::list_assessments))
        .route("/{code}/ranking", get(assessment::ranking))
        .merge(
            Router::new()
                .route(
                    "/{code}/session",
                    post(assessment::start_session)
                        .get(assessment::get_session)
                        .delete(assessment::abandon),
                )
                .route("/{code}/session/answers", put(assessment::select_answer))
                .route("/{code}/session/navigate", post(assessment::navigate))
                .route("/{code}/session/save", post(assessment::save_draft))
                .route("/{code}/session/submit", post(assessment::submit))
                .layer(require_auth()),
        );

    let result_routes = Router::new()
        .route("/latest", get(assessment::latest_result))
        .route("/{id}", get(assessment::get_result))
        .layer(require_auth());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/traffic", get(admin::traffic_report))
        .route("/banners", post(admin::create_banner))
        .route("/banners/{id}", delete(admin::delete_banner))
        .route("/questions", post(admin::create_question))
        .route("/questions/{id}", delete(admin::delete_question))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(require_auth());

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/education", education_routes)
        .route("/api/institutions", get(dashboard::search_institutions))
        .nest("/api/assessments", assessment_routes)
        .nest("/api/results", result_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
