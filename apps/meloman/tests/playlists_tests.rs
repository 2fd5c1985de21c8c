//! Integration tests for playlists, covers and playlist membership.

mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use common::{flash, location, TestApp};
use meloman::db::queries;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";

fn playlist_form(title: &str, description: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", title.to_string())
        .add_text("description", description.to_string())
}

fn with_cover(form: MultipartForm, file_name: &str) -> MultipartForm {
    form.add_part(
        "cover",
        Part::bytes(PNG_BYTES.to_vec())
            .file_name(file_name.to_string())
            .mime_type("image/png"),
    )
}

/// Number of cover files on disk
fn stored_covers(app: &TestApp) -> usize {
    std::fs::read_dir(app.uploads_dir().join("playlists"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

fn with_big_cover(form: MultipartForm, size: usize) -> MultipartForm {
    let mut bytes = PNG_BYTES.to_vec();
    bytes.resize(size, 0);
    form.add_part(
        "cover",
        Part::bytes(bytes)
            .file_name("huge.png".to_string())
            .mime_type("image/png"),
    )
}

fn playlist_id_from(location: &str) -> i64 {
    location
        .strip_prefix("/playlists/")
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(|| panic!("unexpected location {}", location))
}

#[tokio::test]
async fn test_create_playlist() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name, value)
        .multipart(playlist_form("Road trip", "Songs for the car"))
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    let playlist_id = playlist_id_from(&location(&response));
    assert!(flash(&response).is_some_and(|f| f.starts_with("success:")));

    let db = app.db().lock().await;
    let playlist = queries::find_playlist(&db, user_id, playlist_id)
        .unwrap()
        .unwrap();
    assert_eq!(playlist.title, "Road trip");
    assert_eq!(playlist.description.as_deref(), Some("Songs for the car"));
    assert_eq!(playlist.cover, None);
}

#[tokio::test]
async fn test_create_playlist_with_cover() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name, value)
        .multipart(with_cover(playlist_form("Covered", ""), "cover.PNG"))
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    let playlist_id = playlist_id_from(&location(&response));

    let cover = {
        let db = app.db().lock().await;
        let playlist = queries::find_playlist(&db, user_id, playlist_id)
            .unwrap()
            .unwrap();
        assert_eq!(playlist.description, None);
        playlist.cover.expect("cover stored")
    };

    assert!(cover.starts_with("playlists/"));
    assert!(cover.ends_with(".png"));
    let stored = app.uploads_dir().join(&cover);
    assert_eq!(std::fs::read(&stored).unwrap(), PNG_BYTES);

    // Served back under /uploads
    let served = app.server().get(&format!("/uploads/{}", cover)).await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), PNG_BYTES);
}

#[tokio::test]
async fn test_create_playlist_rejects_non_image_cover() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name, value)
        .multipart(with_cover(playlist_form("Bad cover", ""), "script.exe"))
        .await;

    response.assert_status_ok();
    assert!(response.text().contains("Unsupported image type"));

    let db = app.db().lock().await;
    assert_eq!(queries::count_playlists(&db, user_id).unwrap(), 0);
}

#[tokio::test]
async fn test_create_playlist_rejects_oversized_cover() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    // Just over the cover limit, still inside the request limit
    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name.clone(), value.clone())
        .multipart(with_big_cover(playlist_form("Big", ""), 64 * 1024 + 10))
        .await;
    response.assert_status_ok();
    assert!(response.text().contains("Image is too large"));

    // Far past the request limit
    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name, value)
        .multipart(with_big_cover(playlist_form("Huge", ""), 512 * 1024))
        .await;
    response.assert_status_ok();
    assert!(response.text().contains("Image is too large"));

    let db = app.db().lock().await;
    assert_eq!(queries::count_playlists(&db, user_id).unwrap(), 0);
    drop(db);
    assert_eq!(stored_covers(&app), 0);
}

#[tokio::test]
async fn test_edit_playlist_rejects_oversized_cover() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let playlist_id = {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Unchanged".to_string(),
            ..Default::default()
        };
        queries::insert_playlist(&db, user_id, &fields).unwrap()
    };

    let response = app
        .server()
        .post(&format!("/playlists/{}/edit", playlist_id))
        .add_header(name, value)
        .multipart(with_big_cover(playlist_form("Renamed", ""), 512 * 1024))
        .await;
    response.assert_status_ok();
    assert!(response.text().contains("Image is too large"));

    let db = app.db().lock().await;
    let playlist = queries::find_playlist(&db, user_id, playlist_id)
        .unwrap()
        .unwrap();
    assert_eq!(playlist.title, "Unchanged");
    assert_eq!(playlist.cover, None);
}

#[tokio::test]
async fn test_cover_removed_when_playlist_insert_fails() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    {
        let db = app.db().lock().await;
        db.execute_batch(
            "CREATE TRIGGER reject_playlists BEFORE INSERT ON playlists
             BEGIN SELECT RAISE(FAIL, 'disk full'); END;",
        )
        .unwrap();
    }

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name, value)
        .multipart(with_cover(playlist_form("Lost", ""), "cover.png"))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains("Something went wrong"));

    let db = app.db().lock().await;
    assert_eq!(queries::count_playlists(&db, user_id).unwrap(), 0);
    drop(db);
    assert_eq!(stored_covers(&app), 0);
}

#[tokio::test]
async fn test_new_cover_removed_when_playlist_update_fails() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name.clone(), value.clone())
        .multipart(with_cover(playlist_form("Kept", ""), "first.png"))
        .await;
    let playlist_id = playlist_id_from(&location(&response));

    {
        let db = app.db().lock().await;
        db.execute_batch(
            "CREATE TRIGGER reject_playlist_updates BEFORE UPDATE ON playlists
             BEGIN SELECT RAISE(FAIL, 'disk full'); END;",
        )
        .unwrap();
    }

    let response = app
        .server()
        .post(&format!("/playlists/{}/edit", playlist_id))
        .add_header(name, value)
        .multipart(with_cover(playlist_form("Kept", ""), "second.jpg"))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    // Only the original cover is left, still referenced by the row
    assert_eq!(stored_covers(&app), 1);
    let db = app.db().lock().await;
    let cover = queries::find_playlist(&db, user_id, playlist_id)
        .unwrap()
        .unwrap()
        .cover
        .unwrap();
    assert!(app.uploads_dir().join(&cover).exists());
}

#[tokio::test]
async fn test_malformed_ids_get_not_found_page() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let playlist_id = {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Mix".to_string(),
            ..Default::default()
        };
        queries::insert_playlist(&db, user_id, &fields).unwrap()
    };

    let response = app
        .server()
        .get("/playlists/abc")
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status_not_found();
    assert!(response.text().contains("Page not found"));

    app.server()
        .post(&format!("/playlists/{}/tracks/x/remove", playlist_id))
        .add_header(name.clone(), value.clone())
        .await
        .assert_status_not_found();

    // Missing and non-numeric track ids
    let response = app
        .server()
        .post(&format!("/playlists/{}/tracks", playlist_id))
        .add_header(name.clone(), value.clone())
        .form(&[("other", "1")])
        .await;
    response.assert_status_not_found();
    assert!(response.text().contains("Page not found"));

    app.server()
        .post(&format!("/playlists/{}/tracks", playlist_id))
        .add_header(name, value)
        .form(&[("track_id", "seven")])
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_create_playlist_requires_title() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name, value)
        .multipart(playlist_form("   ", "no title"))
        .await;

    response.assert_status_ok();
    assert!(response.text().contains("This field is required"));

    let db = app.db().lock().await;
    assert_eq!(queries::count_playlists(&db, user_id).unwrap(), 0);
}

#[tokio::test]
async fn test_list_playlists_with_counts() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    let track_id = app.add_track(user_id, "Numb", "Linkin Park").await;

    {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Morning mix".to_string(),
            ..Default::default()
        };
        let playlist_id = queries::insert_playlist(&db, user_id, &fields).unwrap();
        queries::add_playlist_track(&db, playlist_id, track_id).unwrap();
    }

    let response = app.server().get("/playlists").add_header(name, value).await;

    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("Morning mix"));
    assert!(body.contains("1 tracks"));
}

#[tokio::test]
async fn test_playlist_detail_and_add_track() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    let numb = app.add_track(user_id, "Numb", "Linkin Park").await;
    app.add_track(user_id, "Yellow", "Coldplay").await;

    let playlist_id = {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Mix".to_string(),
            ..Default::default()
        };
        queries::insert_playlist(&db, user_id, &fields).unwrap()
    };

    let response = app
        .server()
        .post(&format!("/playlists/{}/tracks", playlist_id))
        .add_header(name.clone(), value.clone())
        .form(&[("track_id", numb.to_string())])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/playlists/{}", playlist_id));

    let response = app
        .server()
        .get(&format!("/playlists/{}", playlist_id))
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("Linkin Park - Numb"));
    // Only tracks not yet in the playlist are offered
    assert!(body.contains(r#"<option value=""#));
    assert!(!body.contains(&format!(r#"<option value="{}">"#, numb)));
}

#[tokio::test]
async fn test_add_track_twice_warns() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    let track_id = app.add_track(user_id, "Numb", "Linkin Park").await;

    let playlist_id = {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Mix".to_string(),
            ..Default::default()
        };
        let id = queries::insert_playlist(&db, user_id, &fields).unwrap();
        queries::add_playlist_track(&db, id, track_id).unwrap();
        id
    };

    let response = app
        .server()
        .post(&format!("/playlists/{}/tracks", playlist_id))
        .add_header(name, value)
        .form(&[("track_id", track_id.to_string())])
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert!(flash(&response).is_some_and(|f| f.starts_with("warning:")));

    let db = app.db().lock().await;
    assert_eq!(queries::playlist_tracks(&db, playlist_id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_foreign_track_is_not_found() {
    let app = TestApp::new().await;
    let (alice, _) = app.login("alice@example.com").await;
    let (bob, (name, value)) = app.login("bob@example.com").await;
    let alice_track = app.add_track(alice, "Numb", "Linkin Park").await;

    let playlist_id = {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Bob's".to_string(),
            ..Default::default()
        };
        queries::insert_playlist(&db, bob, &fields).unwrap()
    };

    app.server()
        .post(&format!("/playlists/{}/tracks", playlist_id))
        .add_header(name, value)
        .form(&[("track_id", alice_track.to_string())])
        .await
        .assert_status_not_found();

    let db = app.db().lock().await;
    assert!(queries::playlist_tracks(&db, playlist_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_foreign_playlist_is_not_found() {
    let app = TestApp::new().await;
    let (alice, _) = app.login("alice@example.com").await;
    let (_, (name, value)) = app.login("bob@example.com").await;

    let playlist_id = {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Alice's".to_string(),
            ..Default::default()
        };
        queries::insert_playlist(&db, alice, &fields).unwrap()
    };

    for path in [
        format!("/playlists/{}", playlist_id),
        format!("/playlists/{}/edit", playlist_id),
    ] {
        app.server()
            .get(&path)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_not_found();
    }

    app.server()
        .post(&format!("/playlists/{}/delete", playlist_id))
        .add_header(name, value)
        .await
        .assert_status_not_found();

    let db = app.db().lock().await;
    assert!(queries::find_playlist(&db, alice, playlist_id).unwrap().is_some());
}

#[tokio::test]
async fn test_remove_track_from_playlist() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    let track_id = app.add_track(user_id, "Numb", "Linkin Park").await;

    let playlist_id = {
        let db = app.db().lock().await;
        let fields = queries::PlaylistFields {
            title: "Mix".to_string(),
            ..Default::default()
        };
        let id = queries::insert_playlist(&db, user_id, &fields).unwrap();
        queries::add_playlist_track(&db, id, track_id).unwrap();
        id
    };

    let path = format!("/playlists/{}/tracks/{}/remove", playlist_id, track_id);
    let response = app
        .server()
        .post(&path)
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    // The track itself stays in the user's list
    assert_eq!(app.track_titles(user_id).await, vec!["Numb"]);

    // Removing again: membership no longer exists
    app.server()
        .post(&path)
        .add_header(name, value)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_edit_playlist_replaces_cover() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name.clone(), value.clone())
        .multipart(with_cover(playlist_form("Old title", ""), "first.png"))
        .await;
    let playlist_id = playlist_id_from(&location(&response));

    let old_cover = {
        let db = app.db().lock().await;
        queries::find_playlist(&db, user_id, playlist_id)
            .unwrap()
            .unwrap()
            .cover
            .unwrap()
    };

    let response = app
        .server()
        .post(&format!("/playlists/{}/edit", playlist_id))
        .add_header(name, value)
        .multipart(with_cover(playlist_form("New title", "now described"), "second.jpg"))
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let playlist = {
        let db = app.db().lock().await;
        queries::find_playlist(&db, user_id, playlist_id)
            .unwrap()
            .unwrap()
    };
    assert_eq!(playlist.title, "New title");
    assert_eq!(playlist.description.as_deref(), Some("now described"));
    let new_cover = playlist.cover.unwrap();
    assert_ne!(new_cover, old_cover);
    assert!(new_cover.ends_with(".jpg"));
    assert!(!app.uploads_dir().join(&old_cover).exists());
    assert!(app.uploads_dir().join(&new_cover).exists());
}

#[tokio::test]
async fn test_edit_playlist_remove_cover() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name.clone(), value.clone())
        .multipart(with_cover(playlist_form("Covered", ""), "cover.png"))
        .await;
    let playlist_id = playlist_id_from(&location(&response));

    let cover = {
        let db = app.db().lock().await;
        queries::find_playlist(&db, user_id, playlist_id)
            .unwrap()
            .unwrap()
            .cover
            .unwrap()
    };

    app.server()
        .post(&format!("/playlists/{}/edit", playlist_id))
        .add_header(name, value)
        .multipart(playlist_form("Covered", "").add_text("remove_cover", "on"))
        .await
        .assert_status(StatusCode::SEE_OTHER);

    let db = app.db().lock().await;
    let playlist = queries::find_playlist(&db, user_id, playlist_id)
        .unwrap()
        .unwrap();
    assert_eq!(playlist.cover, None);
    assert!(!app.uploads_dir().join(&cover).exists());
}

#[tokio::test]
async fn test_delete_playlist_removes_memberships_and_cover() {
    let app = TestApp::new().await;
    let (user_id, (name, value)) = app.login("user@example.com").await;
    let track_id = app.add_track(user_id, "Numb", "Linkin Park").await;

    let response = app
        .server()
        .post("/playlists/new")
        .add_header(name.clone(), value.clone())
        .multipart(with_cover(playlist_form("Doomed", ""), "cover.gif"))
        .await;
    let playlist_id = playlist_id_from(&location(&response));

    let cover = {
        let db = app.db().lock().await;
        queries::add_playlist_track(&db, playlist_id, track_id).unwrap();
        queries::find_playlist(&db, user_id, playlist_id)
            .unwrap()
            .unwrap()
            .cover
            .unwrap()
    };

    let response = app
        .server()
        .post(&format!("/playlists/{}/delete", playlist_id))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/playlists");

    let db = app.db().lock().await;
    assert!(queries::find_playlist(&db, user_id, playlist_id).unwrap().is_none());
    let memberships: i64 = db
        .query_row(
            "SELECT COUNT(*) FROM playlist_tracks WHERE playlist_id = ?1",
            [playlist_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(memberships, 0);
    // Tracks survive their playlists
    assert_eq!(queries::count_tracks(&db, user_id).unwrap(), 1);
    assert!(!app.uploads_dir().join(&cover).exists());
}
