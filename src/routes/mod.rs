use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod health;
pub mod invitations;
pub mod jobs;
pub mod profiles;
pub mod proposals;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let users_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/me", get(users::me));

    let jobs_routes = Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/create", post(jobs::create_job))
        .route("/apply/:id", post(jobs::apply_to_job))
        .route("/:id", delete(jobs::delete_job));

    let proposals_routes = Router::new()
        .route("/create", post(proposals::create_proposal))
        .route("/job/:job_id", get(proposals::list_for_job))
        .route("/freelancer/:freelancer_id", get(proposals::list_for_freelancer))
        .route("/:id/status", put(proposals::update_status));

    let invitations_routes = Router::new()
        .route("/", post(invitations::create_invitation))
        .route("/me", get(invitations::list_for_freelancer))
        .route("/sent", get(invitations::list_for_client))
        .route("/:id/status", patch(invitations::respond));

    let profiles_routes = Router::new()
        .route("/", get(profiles::search_profiles))
        .route(
            "/me",
            get(profiles::my_profile).put(profiles::save_my_profile),
        )
        .route("/:user_id", get(profiles::profile_by_user));

    Router::new()
        .nest("/api/users", users_routes)
        .nest("/api/jobs", jobs_routes)
        .nest("/api/proposals", proposals_routes)
        .nest("/api/invitations", invitations_routes)
        .nest("/api/profiles", profiles_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
