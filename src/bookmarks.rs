//! Bookmark store with dedup-on-insert.
//!
//! [`BookmarkStore`] is an explicit session object that owns the in-memory
//! list and writes through to a [`BookmarkStorage`] backend. Identity is the
//! item url: a second bookmark for the same url is rejected, never merged.

use crate::error::{BookmarkError, StorageError};
use crate::models::{Bookmark, Item, SourceKind};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Durable storage keyed by url.
///
/// `list` returns bookmarks in insertion order.
pub trait BookmarkStorage {
    async fn insert(&self, bookmark: &Bookmark) -> Result<(), StorageError>;
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
    async fn list(&self) -> Result<Vec<Bookmark>, StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bookmarks: Mutex<Vec<Bookmark>>,
}

impl MemoryStorage {
    fn with<T>(&self, f: impl FnOnce(&mut Vec<Bookmark>) -> T) -> T {
        let mut guard = self.bookmarks.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

impl BookmarkStorage for MemoryStorage {
    async fn insert(&self, bookmark: &Bookmark) -> Result<(), StorageError> {
        self.with(|b| {
            b.retain(|x| x.url() != bookmark.url());
            b.push(bookmark.clone());
        });
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        self.with(|b| b.retain(|x| x.url() != url));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Bookmark>, StorageError> {
        Ok(self.with(|b| b.clone()))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.with(Vec::clear);
        Ok(())
    }
}

/// Storage backed by a single JSON file holding an array of bookmarks.
///
/// A missing file reads as empty. Writes go to a sibling temp file that is
/// then renamed over the original.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<Vec<Bookmark>, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), count = bookmarks.len()))]
    async fn write_all(&self, bookmarks: &[Bookmark]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(bookmarks)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Wrote bookmark file");
        Ok(())
    }
}

impl BookmarkStorage for JsonFileStorage {
    async fn insert(&self, bookmark: &Bookmark) -> Result<(), StorageError> {
        let mut all = self.read_all().await?;
        all.retain(|x| x.url() != bookmark.url());
        all.push(bookmark.clone());
        self.write_all(&all).await
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let mut all = self.read_all().await?;
        let before = all.len();
        all.retain(|x| x.url() != url);
        if all.len() == before {
            return Ok(());
        }
        self.write_all(&all).await
    }

    async fn list(&self) -> Result<Vec<Bookmark>, StorageError> {
        self.read_all().await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.write_all(&[]).await
    }
}

/// The user's bookmarks for one session.
#[derive(Debug)]
pub struct BookmarkStore<S> {
    storage: S,
    bookmarks: Vec<Bookmark>,
}

impl<S: BookmarkStorage> BookmarkStore<S> {
    /// Load existing bookmarks from `storage`.
    ///
    /// If the backend holds several bookmarks for one url, the first wins.
    #[instrument(level = "info", skip_all)]
    pub async fn open(storage: S) -> Result<Self, BookmarkError> {
        let stored = storage.list().await?;
        let total = stored.len();
        let bookmarks: Vec<Bookmark> = stored.into_iter().unique_by(|b| b.url().to_string()).collect();
        if bookmarks.len() < total {
            warn!(dropped = total - bookmarks.len(), "Storage held duplicate bookmarks");
        }
        info!(count = bookmarks.len(), "Opened bookmark store");
        Ok(Self { storage, bookmarks })
    }

    /// Bookmark `item`, rejecting a url that is already saved.
    #[instrument(level = "info", skip_all, fields(url = %item.url))]
    pub async fn add(&mut self, item: Item) -> Result<&Bookmark, BookmarkError> {
        if self.contains(&item.url) {
            debug!("Duplicate bookmark rejected");
            return Err(BookmarkError::AlreadyExists { url: item.url });
        }
        let bookmark = Bookmark::new(item);
        self.storage.insert(&bookmark).await?;
        self.bookmarks.push(bookmark);
        info!(count = self.bookmarks.len(), "Bookmark added");
        Ok(&self.bookmarks[self.bookmarks.len() - 1])
    }

    /// Remove the bookmark for `url`. Returns whether one existed.
    #[instrument(level = "info", skip(self))]
    pub async fn remove(&mut self, url: &str) -> Result<bool, BookmarkError> {
        if !self.contains(url) {
            return Ok(false);
        }
        self.storage.delete(url).await?;
        self.bookmarks.retain(|b| b.url() != url);
        Ok(true)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn clear_all(&mut self) -> Result<(), BookmarkError> {
        self.storage.clear().await?;
        let n = self.bookmarks.len();
        self.bookmarks.clear();
        info!(removed = n, "Cleared bookmarks");
        Ok(())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.bookmarks.iter().any(|b| b.url() == url)
    }

    /// All bookmarks in insertion order.
    pub fn list(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// Bookmarks grouped by source kind, insertion order within each group.
    pub fn list_grouped_by_type(&self) -> BTreeMap<SourceKind, Vec<Bookmark>> {
        let mut groups: BTreeMap<SourceKind, Vec<Bookmark>> = BTreeMap::new();
        for b in &self.bookmarks {
            groups.entry(b.item.source_kind).or_default().push(b.clone());
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }
}
