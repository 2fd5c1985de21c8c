//! Catalog operations: spelling normalization, the "lucky" pick and imports.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;
use thiserror::Error;

use crate::db::fold;
use crate::db::models::CatalogEntry;
use crate::db::queries::{self, Insert, NewCatalogEntry};

/// Demo rows inserted by `seed_demo` into an empty catalog.
pub const DEMO_CATALOG: &[(&str, &str)] = &[
    ("Blinding Lights", "The Weeknd"),
    ("bad guy", "Billie Eilish"),
    ("Smells Like Teen Spirit", "Nirvana"),
    ("Lose Yourself", "Eminem"),
    ("Shape of You", "Ed Sheeran"),
    ("Seven Nation Army", "The White Stripes"),
    ("Believer", "Imagine Dragons"),
    ("Take On Me", "a-ha"),
    ("Yellow", "Coldplay"),
    ("Zombie", "The Cranberries"),
    ("Radioactive", "Imagine Dragons"),
    ("Numb", "Linkin Park"),
    ("Nothing Else Matters", "Metallica"),
];

/// Trims user input and adopts the catalog's spelling when the catalog
/// knows the song.
pub fn normalize(conn: &Connection, title: &str, artist: &str) -> rusqlite::Result<(String, String)> {
    let (title, artist) = (title.trim(), artist.trim());

    match queries::find_catalog_match(conn, title, artist)? {
        Some(entry) => Ok((entry.title, entry.artist)),
        None => Ok((title.to_string(), artist.to_string())),
    }
}

/// Chooses uniformly among catalog entries the user does not own.
///
/// `owned` holds folded `(title, artist)` pairs, see [`queries::owned_pairs`].
pub fn pick_lucky<R: Rng + ?Sized>(
    catalog: Vec<CatalogEntry>,
    owned: &HashSet<(String, String)>,
    rng: &mut R,
) -> Option<CatalogEntry> {
    let candidates: Vec<CatalogEntry> = catalog
        .into_iter()
        .filter(|entry| !owned.contains(&(fold(&entry.title), fold(&entry.artist))))
        .collect();

    candidates.choose(rng).cloned()
}

/// Loads the catalog and the user's tracks, then picks a lucky entry.
pub fn lucky_for_user<R: Rng + ?Sized>(
    conn: &Connection,
    user_id: i64,
    rng: &mut R,
) -> rusqlite::Result<Option<CatalogEntry>> {
    let owned = queries::owned_pairs(conn, user_id)?;
    let catalog = queries::list_catalog(conn)?;
    Ok(pick_lucky(catalog, &owned, rng))
}

/// Inserts the demo rows if the catalog is empty. Returns rows added.
pub fn seed_demo(conn: &mut Connection) -> rusqlite::Result<usize> {
    if queries::count_catalog(conn)? > 0 {
        tracing::debug!("Catalog already populated, skipping demo seed");
        return Ok(0);
    }

    let tx = conn.transaction()?;
    let mut added = 0;
    for (title, artist) in DEMO_CATALOG {
        let entry = NewCatalogEntry {
            title: title.to_string(),
            artist: artist.to_string(),
            ..Default::default()
        };
        if let Insert::Created(_) = queries::insert_catalog_entry(&tx, &entry)? {
            added += 1;
        }
    }
    tx.commit()?;

    tracing::info!(added, "Seeded demo catalog");
    Ok(added)
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Counters reported after an import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub existing: usize,
    pub invalid: usize,
    pub lyrics_attached: usize,
}

/// Imports `title,artist[,year[,album]]` rows (no header) into the catalog.
///
/// Entries already present, compared case-insensitively, are left alone
/// except that missing lyrics get attached. The whole import is one
/// transaction.
pub fn import_csv<R: Read>(
    conn: &mut Connection,
    reader: R,
    lyrics_dir: Option<&Path>,
) -> Result<ImportReport, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let tx = conn.transaction()?;
    let mut report = ImportReport::default();

    for record in csv_reader.records() {
        let record = record?;
        let Some(mut entry) = parse_record(&record) else {
            report.invalid += 1;
            continue;
        };

        let lyrics = lyrics_dir.and_then(|dir| read_lyrics(dir, &entry.title, &entry.artist));

        match queries::find_catalog_match(&tx, &entry.title, &entry.artist)? {
            Some(_) => {
                report.existing += 1;
                if let Some(lyrics) = lyrics {
                    if queries::attach_lyrics(&tx, &entry.title, &entry.artist, &lyrics)? {
                        report.lyrics_attached += 1;
                    }
                }
            }
            None => {
                let has_lyrics = lyrics.is_some();
                entry.lyrics = lyrics;
                match queries::insert_catalog_entry(&tx, &entry)? {
                    Insert::Created(_) => {
                        report.added += 1;
                        if has_lyrics {
                            report.lyrics_attached += 1;
                        }
                    }
                    Insert::Duplicate => report.existing += 1,
                }
            }
        }
    }

    tx.commit()?;

    tracing::info!(
        added = report.added,
        existing = report.existing,
        invalid = report.invalid,
        lyrics = report.lyrics_attached,
        "Catalog import finished"
    );
    Ok(report)
}

fn parse_record(record: &csv::StringRecord) -> Option<NewCatalogEntry> {
    let title = record.get(0).unwrap_or_default();
    let artist = record.get(1).unwrap_or_default();
    if title.is_empty() || artist.is_empty() {
        return None;
    }

    let year = record.get(2).and_then(|y| y.parse::<i32>().ok());
    let album = record
        .get(3)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    Some(NewCatalogEntry {
        title: title.to_string(),
        artist: artist.to_string(),
        year,
        album,
        lyrics: None,
    })
}

/// File name lyrics are looked up under: `<artist> - <title>.txt`.
pub fn lyrics_file_name(title: &str, artist: &str) -> String {
    let clean = |s: &str| s.replace(['/', '\\'], "_");
    format!("{} - {}.txt", clean(artist), clean(title))
}

fn read_lyrics(dir: &Path, title: &str, artist: &str) -> Option<String> {
    let path = dir.join(lyrics_file_name(title, artist));
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read lyrics: {}", e);
            None
        }
    }
}
