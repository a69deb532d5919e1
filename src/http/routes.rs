use axum::{routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_current_account))
        .route("/auth/confirm", post(handlers::confirm_account))
        .route("/auth/confirm/resend", post(handlers::resend_confirmation))
        .route("/auth/change-password", post(handlers::change_password))
        .route("/auth/reset", post(handlers::request_password_reset))
        .route("/auth/reset/confirm", post(handlers::reset_password))
        .route("/auth/change-email", post(handlers::request_email_change))
        .route(
            "/auth/change-email/confirm",
            post(handlers::confirm_email_change),
        )
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route(
            "/users/:id",
            get(handlers::get_user).patch(handlers::update_profile),
        )
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/users/:id/timeline", get(handlers::user_timeline))
        .route("/users/:id/follow", post(handlers::follow_user))
        .route("/users/:id/unfollow", post(handlers::unfollow_user))
        .route("/users/:id/followers", get(handlers::list_followers))
        .route("/users/:id/following", get(handlers::list_following))
        .route("/users/:id/relationship", get(handlers::relationship_status))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route(
            "/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/posts/:id",
            get(handlers::get_post).put(handlers::update_post),
        )
        .route(
            "/posts/:id/comments",
            get(handlers::list_post_comments).post(handlers::create_comment),
        )
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route("/comments", get(handlers::list_comments))
        .route("/comments/:id", get(handlers::get_comment))
        .route("/comments/:id/moderation", put(handlers::moderate_comment))
}
