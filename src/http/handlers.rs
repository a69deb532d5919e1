use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::EmailChangeRequest;
use crate::app::comments::CommentService;
use crate::app::pagination::{PageRequest, Paginated};
use crate::app::posts::PostService;
use crate::app::social::{RelationshipStatus, SocialService, SocialUserEdge};
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::markup::RenderedBody;
use crate::domain::permission::Permission;
use crate::domain::post::{Comment, Post};
use crate::domain::user::{Account, PublicUser};
use crate::http::{AppError, AuthUser};
use crate::infra::db::unique_violation;
use crate::AppState;

pub const API_PREFIX: &str = "/api/v1";

const MAX_PASSWORD_LEN: usize = 128;
const MAX_FIELD_LEN: usize = 64;

type Created<T> = (StatusCode, [(HeaderName, String); 1], Json<T>);

fn user_url(id: Uuid) -> String {
    format!("{}/users/{}", API_PREFIX, id)
}

fn post_url(id: Uuid) -> String {
    format!("{}/posts/{}", API_PREFIX, id)
}

fn comment_url(id: Uuid) -> String {
    format!("{}/comments/{}", API_PREFIX, id)
}

fn created<T>(location: String, body: T) -> Created<T> {
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body))
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    fn request(&self, per_page: i64) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(1), per_page)
    }
}

#[derive(Serialize)]
pub struct UserItem {
    pub url: String,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub posts_url: String,
    pub followed_posts_url: String,
    pub post_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub avatar_url: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

impl From<PublicUser> for UserItem {
    fn from(user: PublicUser) -> Self {
        let url = user_url(user.id);
        Self {
            posts_url: format!("{}/posts", url),
            followed_posts_url: format!("{}/timeline", url),
            url,
            username: user.username,
            member_since: user.member_since,
            last_seen: user.last_seen,
            post_count: user.post_count,
            followers_count: user.followers_count,
            following_count: user.following_count,
            avatar_url: user.avatar_url,
            name: user.name,
            location: user.location,
            about_me: user.about_me,
        }
    }
}

#[derive(Serialize)]
pub struct AccountItem {
    pub id: Uuid,
    pub url: String,
    pub email: String,
    pub username: String,
    pub confirmed: bool,
    pub role: String,
    pub permissions: Permission,
}

impl From<Account> for AccountItem {
    fn from(account: Account) -> Self {
        Self {
            id: account.user.id,
            url: user_url(account.user.id),
            email: account.user.email,
            username: account.user.username,
            confirmed: account.user.confirmed,
            role: account.role.name,
            permissions: account.role.permissions,
        }
    }
}

#[derive(Serialize)]
pub struct FollowItem {
    pub user_url: String,
    pub username: String,
    pub avatar_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl From<SocialUserEdge> for FollowItem {
    fn from(edge: SocialUserEdge) -> Self {
        Self {
            user_url: user_url(edge.user.id),
            avatar_url: edge.user.gravatar(100, "identicon", "g"),
            username: edge.user.username,
            timestamp: edge.followed_at,
        }
    }
}

#[derive(Serialize)]
pub struct PostItem {
    pub url: String,
    pub body: String,
    pub body_html: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub author_url: String,
    pub comments_url: String,
    pub comment_count: i64,
}

impl From<Post> for PostItem {
    fn from(post: Post) -> Self {
        let url = post_url(post.id);
        Self {
            comments_url: format!("{}/comments", url),
            url,
            body: post.body,
            body_html: post.body_html,
            timestamp: post.created_at,
            author_url: user_url(post.author_id),
            comment_count: post.comment_count,
        }
    }
}

#[derive(Serialize)]
pub struct CommentItem {
    pub url: String,
    pub post_url: String,
    pub body: String,
    pub body_html: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub author_url: String,
    pub disabled: bool,
}

impl From<Comment> for CommentItem {
    fn from(comment: Comment) -> Self {
        Self {
            url: comment_url(comment.id),
            post_url: post_url(comment.post_id),
            body: comment.body,
            body_html: comment.body_html,
            timestamp: comment.created_at,
            author_url: user_url(comment.author_id),
            disabled: comment.disabled,
        }
    }
}

#[derive(Serialize)]
pub struct RelationshipResponse {
    pub user_url: String,
    pub is_following: bool,
    pub is_followed_by: bool,
}

impl RelationshipResponse {
    fn new(other_id: Uuid, status: RelationshipStatus) -> Self {
        Self {
            user_url: user_url(other_id),
            is_following: status.is_following,
            is_followed_by: status.is_followed_by,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@')
        }
        None => false,
    };
    if !valid || email.len() > MAX_FIELD_LEN {
        return Err(AppError::bad_request("invalid email address"));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), AppError> {
    let mut chars = username.chars();
    let starts_with_letter = chars.next().map_or(false, |c| c.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !starts_with_letter || !rest_valid || username.len() > MAX_FIELD_LEN {
        return Err(AppError::bad_request(
            "usernames must have only letters, numbers, dots or underscores",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.trim().is_empty() {
        return Err(AppError::bad_request("password is required"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }
    Ok(())
}

fn rendered_body(body: Option<String>, missing: &'static str) -> Result<RenderedBody, AppError> {
    match body {
        Some(body) if !body.trim().is_empty() => Ok(RenderedBody::new(body)),
        _ => Err(AppError::bad_request(missing)),
    }
}

// ---------------------------------------------------------------------------
// Lookups shared by several handlers
// ---------------------------------------------------------------------------

async fn require_user(state: &AppState, user_id: Uuid) -> Result<PublicUser, AppError> {
    UserService::new(state.db.clone())
        .get_public_user(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to load user");
            AppError::internal("failed to load user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn require_post(state: &AppState, post_id: Uuid) -> Result<Post, AppError> {
    PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to load post");
            AppError::internal("failed to load post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Created<AccountItem>, AppError> {
    validate_email(&payload.email)?;
    validate_username(payload.username.trim())?;
    validate_password(&payload.password)?;

    let account = state
        .auth_service()
        .register(&payload.email, &payload.username, &payload.password)
        .await
        .map_err(|err| match unique_violation(&err).as_deref() {
            Some("users_email_key") => AppError::bad_request("email already registered"),
            Some("users_username_key") => AppError::bad_request("username already in use"),
            _ => {
                tracing::error!(error = ?err, "failed to register account");
                AppError::internal("failed to register account")
            }
        })?;

    let item = AccountItem::from(account);
    Ok(created(item.url.clone(), item))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let token = state
        .auth_service()
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    Ok(Json(AccessTokenResponse {
        token: token.token,
        expires_at: token.expires_at,
    }))
}

async fn load_account(state: &AppState, user_id: Uuid) -> Result<Account, AppError> {
    UserService::new(state.db.clone())
        .get_account(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to load account");
            AppError::internal("failed to load account")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn get_current_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AccountItem>, AppError> {
    let account = load_account(&state, auth.user_id).await?;
    Ok(Json(account.into()))
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub confirmed: bool,
}

pub async fn confirm_account(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    if auth.confirmed {
        return Ok(Json(ConfirmResponse { confirmed: true }));
    }

    let confirmed = state
        .auth_service()
        .confirm(auth.user_id, payload.token.trim(), state.token_expiration())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to confirm account");
            AppError::internal("failed to confirm account")
        })?;

    if !confirmed {
        return Err(AppError::bad_request(
            "the confirmation link is invalid or has expired",
        ));
    }

    tracing::info!(user_id = %auth.user_id, "account confirmed");
    Ok(Json(ConfirmResponse { confirmed }))
}

pub async fn resend_confirmation(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if auth.confirmed {
        return Err(AppError::bad_request("account already confirmed"));
    }

    state
        .auth_service()
        .send_confirmation(&auth.email, auth.user_id)
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to send confirmation");
            AppError::internal("failed to send confirmation")
        })?;

    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub password: String,
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_password(&payload.password)?;

    let changed = state
        .auth_service()
        .change_password(auth.user_id, &payload.old_password, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change password");
            AppError::internal("failed to change password")
        })?;

    if !changed {
        return Err(AppError::bad_request("invalid password"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Always accepted, whether or not the address is registered.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<StatusCode, AppError> {
    validate_email(&payload.email)?;

    state
        .auth_service()
        .request_password_reset(&payload.email)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to request password reset");
            AppError::internal("failed to request password reset")
        })?;

    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetConfirmRequest>,
) -> Result<StatusCode, AppError> {
    validate_password(&payload.password)?;

    let reset = state
        .auth_service()
        .reset_password(payload.token.trim(), &payload.password, state.token_expiration())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to reset password");
            AppError::internal("failed to reset password")
        })?;

    if !reset {
        return Err(AppError::bad_request("invalid or expired token"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
    pub password: String,
}

pub async fn request_email_change(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangeEmailRequest>,
) -> Result<StatusCode, AppError> {
    validate_email(&payload.email)?;

    let outcome = state
        .auth_service()
        .request_email_change(auth.user_id, &payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to request email change");
            AppError::internal("failed to request email change")
        })?;

    match outcome {
        EmailChangeRequest::Sent => Ok(StatusCode::ACCEPTED),
        EmailChangeRequest::InvalidPassword => Err(AppError::bad_request("invalid password")),
        EmailChangeRequest::EmailTaken => Err(AppError::bad_request("email already registered")),
    }
}

pub async fn confirm_email_change(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<AccountItem>, AppError> {
    let changed = state
        .auth_service()
        .change_email(auth.user_id, payload.token.trim(), state.token_expiration())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change email");
            AppError::internal("failed to change email")
        })?;

    if !changed {
        return Err(AppError::bad_request("invalid request"));
    }

    let account = load_account(&state, auth.user_id).await?;
    Ok(Json(account.into()))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<UserItem>, AppError> {
    let user = require_user(&state, id).await?;
    Ok(Json(user.into()))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

pub async fn update_profile(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserItem>, AppError> {
    if auth.user_id != id && !auth.is_administrator() {
        return Err(AppError::forbidden("cannot update other users"));
    }

    for field in [&payload.name, &payload.location].into_iter().flatten() {
        if field.len() > MAX_FIELD_LEN {
            return Err(AppError::bad_request("name and location must be at most 64 characters"));
        }
    }

    let update = ProfileUpdate {
        name: payload.name,
        location: payload.location,
        about_me: payload.about_me,
    };
    let updated = UserService::new(state.db.clone())
        .update_profile(id, update)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    if updated.is_none() {
        return Err(AppError::not_found("user not found"));
    }

    let user = require_user(&state, id).await?;
    Ok(Json(user.into()))
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PostItem>>, AppError> {
    require_user(&state, id).await?;

    let page = PostService::new(state.db.clone())
        .list_by_author(id, query.request(state.posts_per_page))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list user posts");
            AppError::internal("failed to list posts")
        })?;

    let route = format!("{}/posts", user_url(id));
    Ok(Json(page.map(PostItem::from).into_paginated(&route)))
}

pub async fn user_timeline(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PostItem>>, AppError> {
    require_user(&state, id).await?;

    let page = SocialService::new(state.db.clone())
        .followed_posts(id, query.request(state.posts_per_page))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to load timeline");
            AppError::internal("failed to load timeline")
        })?;

    let route = format!("{}/timeline", user_url(id));
    Ok(Json(page.map(PostItem::from).into_paginated(&route)))
}

async fn relationship(
    state: &AppState,
    viewer_id: Uuid,
    other_id: Uuid,
) -> Result<RelationshipResponse, AppError> {
    let status = SocialService::new(state.db.clone())
        .relationship_status(viewer_id, other_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %other_id, "failed to load relationship");
            AppError::internal("failed to load relationship")
        })?;
    Ok(RelationshipResponse::new(other_id, status))
}

pub async fn follow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<RelationshipResponse>, AppError> {
    auth.require(Permission::Follow)?;
    if auth.user_id == id {
        return Err(AppError::bad_request("cannot follow yourself"));
    }
    require_user(&state, id).await?;

    SocialService::new(state.db.clone())
        .follow(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to follow user");
            AppError::internal("failed to follow user")
        })?;

    Ok(Json(relationship(&state, auth.user_id, id).await?))
}

pub async fn unfollow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<RelationshipResponse>, AppError> {
    auth.require(Permission::Follow)?;
    if auth.user_id == id {
        return Err(AppError::bad_request("cannot unfollow yourself"));
    }
    require_user(&state, id).await?;

    SocialService::new(state.db.clone())
        .unfollow(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to unfollow user");
            AppError::internal("failed to unfollow user")
        })?;

    Ok(Json(relationship(&state, auth.user_id, id).await?))
}

pub async fn list_followers(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<FollowItem>>, AppError> {
    require_user(&state, id).await?;

    let page = SocialService::new(state.db.clone())
        .list_followers(id, query.request(state.followers_per_page))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list followers");
            AppError::internal("failed to list followers")
        })?;

    let route = format!("{}/followers", user_url(id));
    Ok(Json(page.map(FollowItem::from).into_paginated(&route)))
}

pub async fn list_following(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<FollowItem>>, AppError> {
    require_user(&state, id).await?;

    let page = SocialService::new(state.db.clone())
        .list_following(id, query.request(state.followers_per_page))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list following");
            AppError::internal("failed to list following")
        })?;

    let route = format!("{}/following", user_url(id));
    Ok(Json(page.map(FollowItem::from).into_paginated(&route)))
}

pub async fn relationship_status(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<RelationshipResponse>, AppError> {
    require_user(&state, id).await?;
    Ok(Json(relationship(&state, auth.user_id, id).await?))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct BodyRequest {
    pub body: Option<String>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PostItem>>, AppError> {
    let page = PostService::new(state.db.clone())
        .list_posts(query.request(state.posts_per_page))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    let route = format!("{}/posts", API_PREFIX);
    Ok(Json(page.map(PostItem::from).into_paginated(&route)))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<BodyRequest>,
) -> Result<Created<PostItem>, AppError> {
    auth.require(Permission::WriteArticles)?;
    let body = rendered_body(payload.body, "post does not have a body")?;

    let post = PostService::new(state.db.clone())
        .create_post(auth.user_id, body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    let item = PostItem::from(post);
    Ok(created(item.url.clone(), item))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PostItem>, AppError> {
    let post = require_post(&state, id).await?;
    Ok(Json(post.into()))
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<BodyRequest>,
) -> Result<Json<PostItem>, AppError> {
    auth.require(Permission::WriteArticles)?;
    let post = require_post(&state, id).await?;
    if post.author_id != auth.user_id && !auth.is_administrator() {
        return Err(AppError::forbidden("insufficient permissions"));
    }
    let body = rendered_body(payload.body, "post does not have a body")?;

    let post = PostService::new(state.db.clone())
        .update_body(id, body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    Ok(Json(post.into()))
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CommentItem>>, AppError> {
    require_post(&state, id).await?;

    let page = CommentService::new(state.db.clone())
        .list_for_post(id, query.request(state.comments_per_page))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    let route = format!("{}/comments", post_url(id));
    Ok(Json(page.map(CommentItem::from).into_paginated(&route)))
}

pub async fn create_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<BodyRequest>,
) -> Result<Created<CommentItem>, AppError> {
    auth.require(Permission::Comment)?;
    let body = rendered_body(payload.body, "comment does not have a body")?;

    let comment = CommentService::new(state.db.clone())
        .create_comment(id, auth.user_id, body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    let item = CommentItem::from(comment);
    Ok(created(item.url.clone(), item))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CommentItem>>, AppError> {
    let page = CommentService::new(state.db.clone())
        .list_comments(query.request(state.comments_per_page))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    let route = format!("{}/comments", API_PREFIX);
    Ok(Json(page.map(CommentItem::from).into_paginated(&route)))
}

pub async fn get_comment(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<CommentItem>, AppError> {
    let comment = CommentService::new(state.db.clone())
        .get_comment(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to load comment");
            AppError::internal("failed to load comment")
        })?
        .ok_or_else(|| AppError::not_found("comment not found"))?;

    Ok(Json(comment.into()))
}

#[derive(Deserialize)]
pub struct ModerationRequest {
    pub disabled: bool,
}

pub async fn moderate_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ModerationRequest>,
) -> Result<Json<CommentItem>, AppError> {
    auth.require(Permission::Moderate)?;

    let comment = CommentService::new(state.db.clone())
        .set_disabled(id, payload.disabled)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to moderate comment");
            AppError::internal("failed to moderate comment")
        })?
        .ok_or_else(|| AppError::not_found("comment not found"))?;

    Ok(Json(comment.into()))
}
