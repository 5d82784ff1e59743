//! On-disk page dump
//!
//! Each fetched page becomes one `<id>.page` file:
//!
//! ```text
//! {"id":"…","source_url":"…","status_code":200,…,"body_len":1234}\n
//! <raw body bytes>
//! ```
//!
//! Files are written under a `.tmp` name and renamed into place, so a reader
//! never sees a half-written page.

use crate::crawler::FetchResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

const PAGE_EXTENSION: &str = "page";

/// Errors writing or reading persisted pages
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Header serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt page file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// A fetched page ready to be written (or read back from disk)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedPage {
    pub id: String,
    pub source_url: String,
    /// Where the body came from; differs from `source_url` only after a
    /// redirect to an equivalent URL (`/docs` -> `/docs/`)
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub depth: u32,
    pub raw_content: Vec<u8>,
}

/// First line of a page file
#[derive(Debug, Serialize, Deserialize)]
struct PageHeader {
    id: String,
    source_url: String,
    final_url: String,
    status_code: u16,
    content_type: Option<String>,
    fetched_at: DateTime<Utc>,
    depth: u32,
    body_len: u64,
}

/// Writes pages into the output directory
#[derive(Debug)]
pub struct Persister {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl Persister {
    /// Creates the output directory (if needed) and a persister writing into it
    ///
    /// The id sequence continues after the highest sequence number already
    /// used in the directory.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut highest = 0u64;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(seq) = page_sequence(&entry.path()) {
                highest = highest.max(seq);
            }
        }

        if highest > 0 {
            tracing::debug!("Continuing after page {:06} in {}", highest, dir.display());
        }

        Ok(Self {
            dir,
            sequence: AtomicU64::new(highest),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Highest sequence number handed out (or found at startup)
    pub fn assigned(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Builds the page record for a fetch, assigning it a unique id
    ///
    /// Ids are `<first 16 hex chars of SHA-256(url)>-<6-digit sequence>`.
    pub fn assign(&self, fetch: &FetchResult, depth: u32) -> PersistedPage {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let digest = hex::encode(Sha256::digest(fetch.url.as_str().as_bytes()));

        PersistedPage {
            id: format!("{}-{:06}", &digest[..16], seq),
            source_url: fetch.url.to_string(),
            final_url: fetch.final_url.to_string(),
            status_code: fetch.status_code,
            content_type: fetch.content_type.clone(),
            fetched_at: fetch.fetched_at,
            depth,
            raw_content: fetch.body.clone(),
        }
    }

    /// Writes a page and returns the path of the finished file
    pub async fn save(&self, page: &PersistedPage) -> Result<PathBuf, PersistError> {
        let header = PageHeader {
            id: page.id.clone(),
            source_url: page.source_url.clone(),
            final_url: page.final_url.clone(),
            status_code: page.status_code,
            content_type: page.content_type.clone(),
            fetched_at: page.fetched_at,
            depth: page.depth,
            body_len: page.raw_content.len() as u64,
        };

        let mut buf = serde_json::to_vec(&header)?;
        buf.push(b'\n');
        buf.extend_from_slice(&page.raw_content);

        let path = self.dir.join(format!("{}.{}", page.id, PAGE_EXTENSION));
        let tmp = self.dir.join(format!("{}.{}.tmp", page.id, PAGE_EXTENSION));

        tokio::fs::write(&tmp, &buf).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!("Saved {} ({} bytes) to {}", page.source_url, buf.len(), path.display());
        Ok(path)
    }
}

/// Reads a page file written by [`Persister::save`]
pub async fn read_page(path: &Path) -> Result<PersistedPage, PersistError> {
    let bytes = tokio::fs::read(path).await?;

    let corrupt = |reason: &str| PersistError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| corrupt("missing header line"))?;

    let header: PageHeader = serde_json::from_slice(&bytes[..newline])?;
    let body = &bytes[newline + 1..];

    if body.len() as u64 != header.body_len {
        return Err(corrupt(&format!(
            "body is {} bytes, header says {}",
            body.len(),
            header.body_len
        )));
    }

    Ok(PersistedPage {
        id: header.id,
        source_url: header.source_url,
        final_url: header.final_url,
        status_code: header.status_code,
        content_type: header.content_type,
        fetched_at: header.fetched_at,
        depth: header.depth,
        raw_content: body.to_vec(),
    })
}

/// Sequence number of a `<hash>-<seq>.page` file name
fn page_sequence(path: &Path) -> Option<u64> {
    if path.extension().and_then(|e| e.to_str()) != Some(PAGE_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (_, seq) = stem.rsplit_once('-')?;
    seq.parse().ok()
}

/// Lists the finished page files in a directory, sorted by name
pub async fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, PersistError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(PAGE_EXTENSION) {
            pages.push(path);
        }
    }
    pages.sort();
    Ok(pages)
}
