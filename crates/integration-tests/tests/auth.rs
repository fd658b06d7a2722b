//! Magic-link sign-in over HTTP.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;

use sharerides_integration_tests::TestServer;

#[tokio::test]
async fn test_first_sign_in_creates_account() {
    let server = TestServer::spawn().await;
    let client = server.anonymous();
    assert_eq!(client.session().await.unwrap(), None);

    client
        .request_sign_in("  New.Rider@Example.com ", Some("/profile"))
        .await
        .unwrap();
    let sent = server.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("Complete your sign-up"));

    let link = server.mailer.last_link_for("new.rider@example.com").unwrap();
    assert!(link.starts_with(&server.base_url));
    let location = client.follow_sign_in_link(&link).await.unwrap();
    assert_eq!(location, "/profile");

    let session = client.session().await.unwrap().unwrap();
    assert_eq!(session.email.as_str(), "new.rider@example.com");

    // Welcome email follows the first sign-in.
    let sent = server.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].subject.starts_with("Welcome"));
}

#[tokio::test]
async fn test_returning_user_gets_sign_in_email() {
    let server = TestServer::spawn().await;
    let first = server.signed_in("back@example.com").await;
    let id = first.session().await.unwrap().unwrap().id;

    let second = server.signed_in("back@example.com").await;
    assert_eq!(second.session().await.unwrap().unwrap().id, id);

    let sent = server.mailer.sent();
    assert_eq!(sent.last().unwrap().subject, "Sign in to ShareRideStories");
}

#[tokio::test]
async fn test_link_is_single_use() {
    let server = TestServer::spawn().await;
    server.signed_in("once@example.com").await;
    let link = server.mailer.last_link_for("once@example.com").unwrap();

    let err = server
        .anonymous()
        .follow_sign_in_link(&link)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn test_open_redirect_is_neutralized() {
    let server = TestServer::spawn().await;
    let client = server.anonymous();
    client
        .request_sign_in("safe@example.com", Some("https://evil.example.com"))
        .await
        .unwrap();
    let link = server.mailer.last_link_for("safe@example.com").unwrap();
    assert_eq!(client.follow_sign_in_link(&link).await.unwrap(), "/");
}

#[tokio::test]
async fn test_invalid_email_is_rejected() {
    let server = TestServer::spawn().await;
    let err = server
        .anonymous()
        .request_sign_in("not-an-email", None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert!(server.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_sign_out() {
    let server = TestServer::spawn().await;
    let client = server.signed_in("leaving@example.com").await;
    client.sign_out().await.unwrap();
    assert_eq!(client.session().await.unwrap(), None);
}
