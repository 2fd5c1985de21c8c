//! SQL queries, grouped by table.
//!
//! Every function takes a plain `&Connection` so it can run both on the
//! shared connection and inside a `Transaction`.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::fold;
use super::is_unique_violation;
use super::models::{CatalogEntry, Playlist, PlaylistSummary, Track, User};

/// Outcome of an insert guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Created(i64),
    Duplicate,
}

impl Insert {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Insert::Duplicate)
    }
}

fn insert_or_duplicate(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Insert> {
    match conn.execute(sql, params) {
        Ok(_) => Ok(Insert::Created(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(Insert::Duplicate),
        Err(e) => Err(e),
    }
}

// =============================================================================
// Users
// =============================================================================

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
        [email],
        user_from_row,
    )
    .optional()
}

pub fn find_user_by_id(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
        [user_id],
        user_from_row,
    )
    .optional()
}

pub fn insert_user(conn: &Connection, email: &str, password_hash: &str) -> rusqlite::Result<Insert> {
    insert_or_duplicate(
        conn,
        "INSERT INTO users (email, password_hash) VALUES (?1, ?2)",
        params![email, password_hash],
    )
}

/// Deletes a user. Tracks, playlists and memberships go with it.
pub fn delete_user(conn: &Connection, user_id: i64) -> rusqlite::Result<bool> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
    Ok(deleted > 0)
}

// =============================================================================
// Tracks
// =============================================================================

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Lists a user's tracks ordered by artist then title.
///
/// `artist_filter` keeps tracks whose artist contains it, ignoring case.
pub fn list_tracks(
    conn: &Connection,
    user_id: i64,
    artist_filter: Option<&str>,
) -> rusqlite::Result<Vec<Track>> {
    let needle = artist_filter.map(fold).filter(|s| !s.is_empty());

    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, artist, created_at FROM tracks
         WHERE user_id = ?1 AND (?2 IS NULL OR instr(fold(artist), ?2) > 0)
         ORDER BY fold(artist) ASC, fold(title) ASC, id ASC",
    )?;

    let tracks = stmt
        .query_map(params![user_id, needle], track_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tracks)
}

pub fn insert_track(
    conn: &Connection,
    user_id: i64,
    title: &str,
    artist: &str,
) -> rusqlite::Result<Insert> {
    insert_or_duplicate(
        conn,
        "INSERT INTO tracks (user_id, title, artist) VALUES (?1, ?2, ?3)",
        params![user_id, title, artist],
    )
}

/// Finds a track by id, only if it belongs to `user_id`.
pub fn find_track(conn: &Connection, user_id: i64, track_id: i64) -> rusqlite::Result<Option<Track>> {
    conn.query_row(
        "SELECT id, user_id, title, artist, created_at FROM tracks
         WHERE id = ?1 AND user_id = ?2",
        [track_id, user_id],
        track_from_row,
    )
    .optional()
}

pub fn delete_track(conn: &Connection, user_id: i64, track_id: i64) -> rusqlite::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM tracks WHERE id = ?1 AND user_id = ?2",
        [track_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn count_tracks(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM tracks WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )
}

/// Folded `(title, artist)` pairs a user already owns.
pub fn owned_pairs(conn: &Connection, user_id: i64) -> rusqlite::Result<HashSet<(String, String)>> {
    let mut stmt = conn.prepare("SELECT title, artist FROM tracks WHERE user_id = ?1")?;
    let pairs = stmt
        .query_map([user_id], |row| {
            let title: String = row.get(0)?;
            let artist: String = row.get(1)?;
            Ok((fold(&title), fold(&artist)))
        })?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(pairs)
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog row as supplied by the importer.
#[derive(Debug, Clone, Default)]
pub struct NewCatalogEntry {
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
    pub album: Option<String>,
    pub lyrics: Option<String>,
}

fn catalog_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        year: row.get(3)?,
        album: row.get(4)?,
        lyrics: row.get(5)?,
    })
}

/// Finds the catalog entry matching title and artist, ignoring case and
/// surrounding whitespace.
pub fn find_catalog_match(
    conn: &Connection,
    title: &str,
    artist: &str,
) -> rusqlite::Result<Option<CatalogEntry>> {
    conn.query_row(
        "SELECT id, title, artist, year, album, lyrics FROM catalog
         WHERE title_key = ?1 AND artist_key = ?2",
        params![fold(title), fold(artist)],
        catalog_from_row,
    )
    .optional()
}

pub fn find_catalog_entry(conn: &Connection, id: i64) -> rusqlite::Result<Option<CatalogEntry>> {
    conn.query_row(
        "SELECT id, title, artist, year, album, lyrics FROM catalog WHERE id = ?1",
        [id],
        catalog_from_row,
    )
    .optional()
}

pub fn list_catalog(conn: &Connection) -> rusqlite::Result<Vec<CatalogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, artist, year, album, lyrics FROM catalog ORDER BY id",
    )?;
    let entries = stmt
        .query_map([], catalog_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn count_catalog(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM catalog", [], |row| row.get(0))
}

pub fn insert_catalog_entry(conn: &Connection, entry: &NewCatalogEntry) -> rusqlite::Result<Insert> {
    insert_or_duplicate(
        conn,
        "INSERT INTO catalog (title, artist, title_key, artist_key, year, album, lyrics)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.title.trim(),
            entry.artist.trim(),
            fold(&entry.title),
            fold(&entry.artist),
            entry.year,
            entry.album,
            entry.lyrics,
        ],
    )
}

/// Sets lyrics on a catalog entry that has none yet.
pub fn attach_lyrics(
    conn: &Connection,
    title: &str,
    artist: &str,
    lyrics: &str,
) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE catalog SET lyrics = ?3
         WHERE title_key = ?1 AND artist_key = ?2 AND lyrics IS NULL",
        params![fold(title), fold(artist), lyrics],
    )?;
    Ok(updated > 0)
}

/// Distinct catalog artists containing `q`, ignoring case.
pub fn suggest_artists(conn: &Connection, q: &str, limit: u32) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT artist FROM catalog
         WHERE instr(artist_key, ?1) > 0
         ORDER BY artist ASC
         LIMIT ?2",
    )?;
    let artists = stmt
        .query_map(params![fold(q), limit], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(artists)
}

/// Distinct catalog titles containing `q`, optionally by one artist.
pub fn suggest_tracks(
    conn: &Connection,
    q: &str,
    artist: Option<&str>,
    limit: u32,
) -> rusqlite::Result<Vec<String>> {
    let artist_key = artist.map(fold).filter(|s| !s.is_empty());

    let mut stmt = conn.prepare(
        "SELECT DISTINCT title FROM catalog
         WHERE instr(title_key, ?1) > 0 AND (?2 IS NULL OR artist_key = ?2)
         ORDER BY title ASC
         LIMIT ?3",
    )?;
    let titles = stmt
        .query_map(params![fold(q), artist_key, limit], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(titles)
}

// =============================================================================
// Playlists
// =============================================================================

/// Editable playlist columns.
#[derive(Debug, Clone, Default)]
pub struct PlaylistFields {
    pub title: String,
    pub description: Option<String>,
    pub cover: Option<String>,
}

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        cover: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Lists a user's playlists, newest first, with their track counts.
pub fn list_playlists(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<PlaylistSummary>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, p.title, p.description, p.cover, p.created_at,
                COUNT(pt.track_id)
         FROM playlists p
         LEFT JOIN playlist_tracks pt ON pt.playlist_id = p.id
         WHERE p.user_id = ?1
         GROUP BY p.id
         ORDER BY p.created_at DESC, p.id DESC",
    )?;
    let playlists = stmt
        .query_map([user_id], |row| {
            Ok(PlaylistSummary {
                playlist: playlist_from_row(row)?,
                track_count: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(playlists)
}

pub fn count_playlists(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM playlists WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )
}

pub fn insert_playlist(
    conn: &Connection,
    user_id: i64,
    fields: &PlaylistFields,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO playlists (user_id, title, description, cover) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, fields.title, fields.description, fields.cover],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finds a playlist by id, only if it belongs to `user_id`.
pub fn find_playlist(
    conn: &Connection,
    user_id: i64,
    playlist_id: i64,
) -> rusqlite::Result<Option<Playlist>> {
    conn.query_row(
        "SELECT id, user_id, title, description, cover, created_at FROM playlists
         WHERE id = ?1 AND user_id = ?2",
        [playlist_id, user_id],
        playlist_from_row,
    )
    .optional()
}

pub fn update_playlist(
    conn: &Connection,
    user_id: i64,
    playlist_id: i64,
    fields: &PlaylistFields,
) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE playlists SET title = ?3, description = ?4, cover = ?5
         WHERE id = ?1 AND user_id = ?2",
        params![playlist_id, user_id, fields.title, fields.description, fields.cover],
    )?;
    Ok(updated > 0)
}

pub fn delete_playlist(conn: &Connection, user_id: i64, playlist_id: i64) -> rusqlite::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM playlists WHERE id = ?1 AND user_id = ?2",
        [playlist_id, user_id],
    )?;
    Ok(deleted > 0)
}

/// Tracks of a playlist in the order they were added.
pub fn playlist_tracks(conn: &Connection, playlist_id: i64) -> rusqlite::Result<Vec<Track>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.user_id, t.title, t.artist, t.created_at
         FROM playlist_tracks pt
         JOIN tracks t ON t.id = pt.track_id
         WHERE pt.playlist_id = ?1
         ORDER BY pt.added_at ASC, pt.rowid ASC",
    )?;
    let tracks = stmt
        .query_map([playlist_id], track_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tracks)
}

/// Own tracks that are not in the playlist yet.
pub fn addable_tracks(
    conn: &Connection,
    user_id: i64,
    playlist_id: i64,
) -> rusqlite::Result<Vec<Track>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, artist, created_at FROM tracks
         WHERE user_id = ?1
           AND id NOT IN (SELECT track_id FROM playlist_tracks WHERE playlist_id = ?2)
         ORDER BY fold(artist) ASC, fold(title) ASC, id ASC",
    )?;
    let tracks = stmt
        .query_map([user_id, playlist_id], track_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tracks)
}

/// Adds a track to a playlist. Ownership of both must be checked by the caller.
pub fn add_playlist_track(
    conn: &Connection,
    playlist_id: i64,
    track_id: i64,
) -> rusqlite::Result<Insert> {
    insert_or_duplicate(
        conn,
        "INSERT INTO playlist_tracks (playlist_id, track_id) VALUES (?1, ?2)",
        [playlist_id, track_id],
    )
}

pub fn remove_playlist_track(
    conn: &Connection,
    playlist_id: i64,
    track_id: i64,
) -> rusqlite::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM playlist_tracks WHERE playlist_id = ?1 AND track_id = ?2",
        [playlist_id, track_id],
    )?;
    Ok(deleted > 0)
}
