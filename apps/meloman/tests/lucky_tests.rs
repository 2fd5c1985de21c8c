//! Integration tests for the random "lucky" suggestion.

mod common;

use axum::http::StatusCode;
use common::{flash, location, TestApp};

#[tokio::test]
async fn test_lucky_never_suggests_owned_song() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    app.seed_catalog(&[
        ("Numb", "Linkin Park"),
        ("Believer", "Imagine Dragons"),
        ("Yellow", "Coldplay"),
    ])
    .await;
    // Owned with different casing still counts as owned
    app.add_track(user_id, "numb", "LINKIN PARK").await;
    app.add_track(user_id, "Yellow", "Coldplay").await;

    for _ in 0..20 {
        let response = app
            .server()
            .get("/lucky")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("Believer"));
        assert!(!body.contains("Numb"));
        assert!(!body.contains("Yellow"));
    }
}

#[tokio::test]
async fn test_lucky_nothing_left() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    app.seed_catalog(&[("Numb", "Linkin Park")]).await;
    app.add_track(user_id, "Numb", "Linkin Park").await;

    let response = app.server().get("/lucky").add_header(name, value).await;

    response.assert_status_ok();
    assert!(response.text().contains("Nothing left to suggest"));
}

#[tokio::test]
async fn test_lucky_add() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    let ids = app.seed_catalog(&[("Believer", "Imagine Dragons")]).await;

    let response = app
        .server()
        .post(&format!("/lucky/add/{}", ids[0]))
        .add_header(name, value)
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/songs");
    assert!(flash(&response).is_some_and(|f| f.starts_with("success:")));
    assert_eq!(app.track_titles(user_id).await, vec!["Believer"]);
}

#[tokio::test]
async fn test_lucky_add_already_owned() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    let ids = app.seed_catalog(&[("Believer", "Imagine Dragons")]).await;
    app.add_track(user_id, "Believer", "Imagine Dragons").await;

    let response = app
        .server()
        .post(&format!("/lucky/add/{}", ids[0]))
        .add_header(name, value)
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert!(flash(&response).is_some_and(|f| f.starts_with("info:")));
    assert_eq!(app.track_titles(user_id).await.len(), 1);
}

#[tokio::test]
async fn test_lucky_add_unknown_entry() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/lucky/add/424242")
        .add_header(name, value)
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/lucky");
    assert!(flash(&response).is_some_and(|f| f.starts_with("warning:")));
    assert!(app.track_titles(user_id).await.is_empty());
}
