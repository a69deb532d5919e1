//! Post & Comment Tests
//!
//! Covers authoring, editing rights, pagination of listings, comment
//! attachment and moderation.

mod common;

use axum::http::StatusCode;
use common::{app, id_from_url, ADMIN_EMAIL};
use quill::domain::role::MODERATOR_ROLE;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Posts
// ===========================================================================

#[tokio::test]
async fn create_post_renders_body() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_create").await;

    let resp = app
        .post_json(
            "/posts",
            json!({ "body": "body of the *blog* post" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["body"], "body of the *blog* post");
    assert_eq!(body["body_html"], "<p>body of the <em>blog</em> post</p>");
    assert_eq!(body["author_url"], format!("/api/v1/users/{}", user.id).as_str());
    assert_eq!(body["comment_count"], 0);
    assert!(body["timestamp"].is_string());
    assert_eq!(resp.location.as_deref(), body["url"].as_str());

    let resp = app.get(&format!("/posts/{}", id_from_url(body["url"].as_str().unwrap())), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["body"], "body of the *blog* post");
}

#[tokio::test]
async fn create_post_requires_body() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_no_body").await;

    for payload in [json!({}), json!({ "body": "" }), json!({ "body": "   " })] {
        let resp = app.post_json("/posts", payload, Some(&user.token)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_message(), "post does not have a body");
    }
}

#[tokio::test]
async fn create_post_sanitizes_markup() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_sanitize").await;

    let post = app
        .create_post(&user, "hi <script>alert(1)</script>\n\nsee https://example.com")
        .await;
    let html = post["body_html"].as_str().unwrap();
    assert!(!html.contains("<script"));
    assert!(html.contains("rel=\"nofollow\""));
}

#[tokio::test]
async fn get_unknown_post() {
    let Some(app) = app().await else { return };

    let resp = app.get(&format!("/posts/{}", Uuid::new_v4()), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

#[tokio::test]
async fn author_can_edit_post() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_edit").await;
    let post = app.create_post(&user, "first draft").await;
    let id = id_from_url(post["url"].as_str().unwrap());

    let resp = app
        .put_json(
            &format!("/posts/{}", id),
            json!({ "body": "**final**" }),
            Some(&user.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["body_html"], "<p><strong>final</strong></p>");
}

#[tokio::test]
async fn other_user_cannot_edit_post() {
    let Some(app) = app().await else { return };
    let author = app.create_user("post_edit_owner").await;
    let other = app.create_user("post_edit_other").await;
    let post = app.create_post(&author, "mine").await;
    let id = id_from_url(post["url"].as_str().unwrap());

    let resp = app
        .put_json(
            &format!("/posts/{}", id),
            json!({ "body": "yours now" }),
            Some(&other.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "insufficient permissions");
}

#[tokio::test]
async fn administrator_can_edit_any_post() {
    let Some(app) = app().await else { return };
    let author = app.create_user("post_edit_by_admin").await;
    let admin = app.register(ADMIN_EMAIL, "post_admin").await;
    let token = app
        .mailer
        .last_to(ADMIN_EMAIL, quill::infra::mail::MailKind::ConfirmAccount)
        .unwrap()
        .token;
    app.post_json("/auth/confirm", json!({ "token": token }), Some(&admin.token))
        .await;

    let post = app.create_post(&author, "typo").await;
    let id = id_from_url(post["url"].as_str().unwrap());

    let resp = app
        .put_json(
            &format!("/posts/{}", id),
            json!({ "body": "fixed" }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["body"], "fixed");
}

#[tokio::test]
async fn user_posts_are_paginated() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_pages").await;
    for n in 1..=4 {
        app.create_post(&user, &format!("post {}", n)).await;
    }

    // POSTS_PER_PAGE is 3 in tests
    let resp = app.get(&format!("/users/{}/posts", user.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["count"], 4);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["items"][0]["body"], "post 1");
    assert!(body["prev"].is_null());
    let next = format!("/api/v1/users/{}/posts?page=2", user.id);
    assert_eq!(body["next"], next.as_str());

    let resp = app.get(&format!("/users/{}/posts?page=2", user.id), None).await;
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["body"], "post 4");
    assert_eq!(
        body["prev"],
        format!("/api/v1/users/{}/posts?page=1", user.id).as_str()
    );
    assert!(body["next"].is_null());

    let resp = app.get(&format!("/users/{}/posts?page=9", user.id), None).await;
    let body = resp.json();
    assert_eq!(resp.status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["count"], 4);

    let resp = app.get(&format!("/users/{}", user.id), None).await;
    assert_eq!(resp.json()["post_count"], 4);
}

#[tokio::test]
async fn list_all_posts() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_list_all").await;
    app.create_post(&user, "listed").await;

    let resp = app.get("/posts", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["count"].as_i64().unwrap() >= 1);
    assert!(body["items"].as_array().unwrap().len() <= 3);
}

// ===========================================================================
// Comments
// ===========================================================================

#[tokio::test]
async fn comment_on_post() {
    let Some(app) = app().await else { return };
    let author = app.create_user("cmt_author").await;
    let reader = app.create_user("cmt_reader").await;
    let post = app.create_post(&author, "discuss").await;
    let post_id = id_from_url(post["url"].as_str().unwrap());

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "nice *post*" }),
            Some(&reader.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let comment = resp.json();
    assert_eq!(comment["body_html"], "<p>nice <em>post</em></p>");
    assert_eq!(comment["post_url"], post["url"]);
    assert_eq!(comment["author_url"], format!("/api/v1/users/{}", reader.id).as_str());
    assert_eq!(comment["disabled"], false);
    assert_eq!(resp.location.as_deref(), comment["url"].as_str());

    let resp = app.get(&format!("/posts/{}", post_id), None).await;
    assert_eq!(resp.json()["comment_count"], 1);

    let resp = app.get(&format!("/posts/{}/comments", post_id), None).await;
    let body = resp.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["url"], comment["url"]);

    let comment_id = id_from_url(comment["url"].as_str().unwrap());
    let resp = app.get(&format!("/comments/{}", comment_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["body"], "nice *post*");
}

#[tokio::test]
async fn comment_requires_body() {
    let Some(app) = app().await else { return };
    let user = app.create_user("cmt_no_body").await;
    let post = app.create_post(&user, "quiet").await;
    let post_id = id_from_url(post["url"].as_str().unwrap());

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "" }),
            Some(&user.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "comment does not have a body");
}

#[tokio::test]
async fn comment_on_unknown_post() {
    let Some(app) = app().await else { return };
    let user = app.create_user("cmt_unknown_post").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", Uuid::new_v4()),
            json!({ "body": "hello?" }),
            Some(&user.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");

    let resp = app
        .get(&format!("/posts/{}/comments", Uuid::new_v4()), None)
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_listed_oldest_first() {
    let Some(app) = app().await else { return };
    let user = app.create_user("cmt_order").await;
    let post = app.create_post(&user, "thread").await;
    let post_id = id_from_url(post["url"].as_str().unwrap());

    for n in 1..=4 {
        app.post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": format!("reply {}", n) }),
            Some(&user.token),
        )
        .await;
    }

    let resp = app.get(&format!("/posts/{}/comments", post_id), None).await;
    let body = resp.json();
    assert_eq!(body["count"], 4);
    let bodies: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["reply 1", "reply 2", "reply 3"]);
    assert!(body["next"].is_string());
}

#[tokio::test]
async fn moderation_requires_permission() {
    let Some(app) = app().await else { return };
    let user = app.create_user("cmt_mod_user").await;
    let post = app.create_post(&user, "spam magnet").await;
    let post_id = id_from_url(post["url"].as_str().unwrap());
    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "buy now" }),
            Some(&user.token),
        )
        .await;
    let comment_id = id_from_url(resp.json()["url"].as_str().unwrap());

    let resp = app
        .put_json(
            &format!("/comments/{}/moderation", comment_id),
            json!({ "disabled": true }),
            Some(&user.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "insufficient permissions");
}

#[tokio::test]
async fn moderator_disables_and_restores_comment() {
    let Some(app) = app().await else { return };
    let user = app.create_user("cmt_mod_author").await;
    let moderator = app.create_user("cmt_mod_staff").await;
    app.set_role(moderator.id, MODERATOR_ROLE).await;

    let post = app.create_post(&user, "heated").await;
    let post_id = id_from_url(post["url"].as_str().unwrap());
    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "rude" }),
            Some(&user.token),
        )
        .await;
    let comment_id = id_from_url(resp.json()["url"].as_str().unwrap());

    let resp = app
        .put_json(
            &format!("/comments/{}/moderation", comment_id),
            json!({ "disabled": true }),
            Some(&moderator.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["disabled"], true);

    let resp = app.get(&format!("/comments/{}", comment_id), None).await;
    assert_eq!(resp.json()["disabled"], true);

    let resp = app
        .put_json(
            &format!("/comments/{}/moderation", comment_id),
            json!({ "disabled": false }),
            Some(&moderator.token),
        )
        .await;
    assert_eq!(resp.json()["disabled"], false);

    let resp = app
        .put_json(
            &format!("/comments/{}/moderation", Uuid::new_v4()),
            json!({ "disabled": true }),
            Some(&moderator.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_all_comments() {
    let Some(app) = app().await else { return };

    let resp = app.get("/comments", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["count"].is_i64());
    assert!(body["items"].is_array());
}
