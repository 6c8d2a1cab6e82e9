//! E2E tests for user profile and follow list endpoints

mod common;

use common::TestServer;

#[tokio::test]
async fn test_get_user_hides_credentials() {
    let server = TestServer::new().await;
    server.register("alice").await;

    let (status, body) = server.get_json("/api/users/alice").await;

    assert_eq!(status, 200);
    assert_eq!(body["name"], "alice");
    assert_eq!(body["role"], "user");
    assert_eq!(body["confirmed"], false);
    assert_eq!(body["followers_count"], 0);
    assert!(body.get("password_hash").is_none());
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn test_admin_email_gets_admin_role() {
    let server = TestServer::new().await;
    server
        .state
        .accounts
        .register("root", "h", "admin@example.com")
        .await
        .unwrap();

    let (_, body) = server.get_json("/api/users/root").await;
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn test_unknown_user_is_404() {
    let server = TestServer::new().await;

    for path in [
        "/api/users/nobody",
        "/api/users/nobody/posts",
        "/api/users/nobody/followers",
        "/api/users/nobody/following",
    ] {
        let (status, _) = server.get_json(path).await;
        assert_eq!(status, 404, "{path}");
    }
}

#[tokio::test]
async fn test_follow_lists() {
    let server = TestServer::with_blog(10, 2).await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let carol = server.register("carol").await;
    let dave = server.register("dave").await;

    for follower in [&bob, &carol, &dave] {
        server.state.accounts.follow(follower, "alice").await.unwrap();
    }
    server.state.accounts.follow(&alice, "bob").await.unwrap();

    let (status, body) = server.get_json("/api/users/alice/followers").await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 3);
    assert_eq!(body["pages"], 2);
    assert_eq!(body["items"][0]["name"], "dave");
    assert_eq!(body["items"][1]["name"], "carol");

    let (_, body) = server.get_json("/api/users/alice/followers?page=2").await;
    assert_eq!(body["items"][0]["name"], "bob");

    let (_, body) = server.get_json("/api/users/alice/following").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["name"], "bob");

    let (_, body) = server.get_json("/api/users/alice").await;
    assert_eq!(body["followers_count"], 3);
    assert_eq!(body["following_count"], 1);

    server.state.accounts.unfollow(&dave, "alice").await.unwrap();
    let (_, body) = server.get_json("/api/users/alice/followers").await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["name"], "carol");
}

#[tokio::test]
async fn test_renamed_author_shows_new_name() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let id = server.publish(&alice, "Hello").await;

    let (_, body) = server.get_json(&format!("/api/posts/{id}")).await;
    assert_eq!(body["author_name"], "alice");

    server
        .state
        .accounts
        .update_profile(&alice, "alicia", "Lisbon", "")
        .await
        .unwrap();

    let (_, body) = server.get_json(&format!("/api/posts/{id}")).await;
    assert_eq!(body["author_name"], "alicia");

    let (status, _) = server.get_json("/api/users/alice").await;
    assert_eq!(status, 404);
    let (_, body) = server.get_json("/api/users/alicia").await;
    assert_eq!(body["location"], "Lisbon");
}
