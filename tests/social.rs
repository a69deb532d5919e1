//! Social Graph Tests
//!
//! Covers follows, the self-edge, follower listings and the timeline.

mod common;

use axum::http::StatusCode;
use common::app;
use quill::app::social::SocialService;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Follow system
// ===========================================================================

#[tokio::test]
async fn follow_user() {
    let Some(app) = app().await else { return };
    let user_a = app.create_user("soc_follow_a").await;
    let user_b = app.create_user("soc_follow_b").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user_b.id),
            json!({}),
            Some(&user_a.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_following"], true);
    assert_eq!(body["is_followed_by"], false);

    let social = SocialService::new(app.state.db.clone());
    assert!(social.is_following(user_a.id, user_b.id).await.unwrap());
    assert!(social.is_followed_by(user_b.id, user_a.id).await.unwrap());
    assert!(!social.is_following(user_b.id, user_a.id).await.unwrap());
}

#[tokio::test]
async fn follow_is_idempotent() {
    let Some(app) = app().await else { return };
    let user_a = app.create_user("soc_follow_dup_a").await;
    let user_b = app.create_user("soc_follow_dup_b").await;

    for _ in 0..2 {
        let resp = app
            .post_json(
                &format!("/users/{}/follow", user_b.id),
                json!({}),
                Some(&user_a.token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json()["is_following"], true);
    }

    let resp = app.get(&format!("/users/{}", user_b.id), None).await;
    assert_eq!(resp.json()["followers_count"], 1);

    let social = SocialService::new(app.state.db.clone());
    assert!(social.follow(user_a.id, user_b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn follow_self() {
    let Some(app) = app().await else { return };
    let user = app.create_user("soc_follow_self").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user.id),
            json!({}),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot follow yourself");
}

#[tokio::test]
async fn follow_unknown_user() {
    let Some(app) = app().await else { return };
    let user = app.create_user("soc_follow_unknown").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", Uuid::new_v4()),
            json!({}),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_requires_token() {
    let Some(app) = app().await else { return };
    let user = app.create_user("soc_follow_anon").await;

    let resp = app
        .post_json(&format!("/users/{}/follow", user.id), json!({}), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unfollow_user() {
    let Some(app) = app().await else { return };
    let user_a = app.create_user("soc_unfollow_a").await;
    let user_b = app.create_user("soc_unfollow_b").await;

    app.post_json(
        &format!("/users/{}/follow", user_b.id),
        json!({}),
        Some(&user_a.token),
    )
    .await;

    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user_b.id),
            json!({}),
            Some(&user_a.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["is_following"], false);

    let social = SocialService::new(app.state.db.clone());
    assert!(!social.is_following(user_a.id, user_b.id).await.unwrap());
    assert!(!social.is_followed_by(user_b.id, user_a.id).await.unwrap());

    // unfollowing again is a no-op
    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user_b.id),
            json!({}),
            Some(&user_a.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["is_following"], false);
}

#[tokio::test]
async fn self_edge_survives_unfollow() {
    let Some(app) = app().await else { return };
    let user = app.create_user("soc_self_edge").await;
    let social = SocialService::new(app.state.db.clone());

    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user.id),
            json!({}),
            Some(&user.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot unfollow yourself");

    assert!(!social.unfollow(user.id, user.id).await.unwrap());
    assert!(social.is_following(user.id, user.id).await.unwrap());
}

#[tokio::test]
async fn unknown_ids_are_not_following() {
    let Some(app) = app().await else { return };
    let social = SocialService::new(app.state.db.clone());

    assert!(!social
        .is_following(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap());
    assert!(!social
        .is_followed_by(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap());
}

#[tokio::test]
async fn relationship_status() {
    let Some(app) = app().await else { return };
    let user_a = app.create_user("soc_rel_a").await;
    let user_b = app.create_user("soc_rel_b").await;

    app.post_json(
        &format!("/users/{}/follow", user_a.id),
        json!({}),
        Some(&user_b.token),
    )
    .await;

    let resp = app
        .get(&format!("/users/{}/relationship", user_b.id), Some(&user_a.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_following"], false);
    assert_eq!(body["is_followed_by"], true);
}

// ===========================================================================
// Listings
// ===========================================================================

#[tokio::test]
async fn followers_and_following_exclude_self() {
    let Some(app) = app().await else { return };
    let star = app.create_user("soc_list_star").await;
    let mut fans = Vec::new();
    for n in 0..4 {
        let fan = app.create_user(&format!("soc_list_fan{}", n)).await;
        app.post_json(
            &format!("/users/{}/follow", star.id),
            json!({}),
            Some(&fan.token),
        )
        .await;
        fans.push(fan);
    }

    // FOLLOWERS_PER_PAGE is 3 in tests
    let resp = app.get(&format!("/users/{}/followers", star.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["count"], 4);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["items"][0]["username"], "user_soc_list_fan0");
    assert!(body["prev"].is_null());
    assert_eq!(
        body["next"],
        format!("/api/v1/users/{}/followers?page=2", star.id).as_str()
    );

    let resp = app
        .get(&format!("/users/{}/followers?page=2", star.id), None)
        .await;
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["next"].is_null());

    let resp = app.get(&format!("/users/{}/following", star.id), None).await;
    let body = resp.json();
    assert_eq!(body["count"], 0);
    assert!(body["items"].as_array().unwrap().is_empty());

    let resp = app.get(&format!("/users/{}/following", fans[0].id), None).await;
    let body = resp.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["username"], "user_soc_list_star");
}

// ===========================================================================
// Timeline
// ===========================================================================

#[tokio::test]
async fn timeline_holds_own_and_followed_posts() {
    let Some(app) = app().await else { return };
    let reader = app.create_user("soc_tl_reader").await;
    let author = app.create_user("soc_tl_author").await;
    let stranger = app.create_user("soc_tl_stranger").await;

    app.create_post(&author, "before follow").await;
    app.create_post(&reader, "my own").await;
    app.create_post(&stranger, "not followed").await;
    app.post_json(
        &format!("/users/{}/follow", author.id),
        json!({}),
        Some(&reader.token),
    )
    .await;

    let resp = app.get(&format!("/users/{}/timeline", reader.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["count"], 2);
    let bodies: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["before follow", "my own"]);

    app.post_json(
        &format!("/users/{}/unfollow", author.id),
        json!({}),
        Some(&reader.token),
    )
    .await;
    let resp = app.get(&format!("/users/{}/timeline", reader.id), None).await;
    assert_eq!(resp.json()["count"], 1);
}
