//! Catalog service: the inventory store fronted by a cache
//!
//! Reads populate the cache on a miss, writes commit to the store first and
//! then refresh or evict the affected entries. Each cache key maps onto one of
//! a fixed set of async read/write lock stripes: a miss holds its stripe for
//! reading across "store read + populate", a write holds the stripes of every
//! key it touches across "store commit + cache update". A reader therefore
//! cannot install a value it read before a commit once that commit's eviction
//! has run.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    config::CacheConfig,
    error::AppResult,
    models::book::{fold_case, is_blank, Book, BooksList, NewBook},
    repository::InventoryStore,
    services::cache::BookCache,
};

/// Striped locks keyed by cache key
struct KeyLocks {
    stripes: Vec<RwLock<()>>,
}

impl KeyLocks {
    fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| RwLock::new(())).collect(),
        }
    }

    fn index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    async fn read(&self, key: &str) -> RwLockReadGuard<'_, ()> {
        self.stripes[self.index(key)].read().await
    }

    /// Lock every stripe covering `keys`, in ascending stripe order
    async fn write(&self, keys: &[String]) -> Vec<RwLockWriteGuard<'_, ()>> {
        let mut indices: Vec<usize> = keys.iter().map(|key| self.index(key)).collect();
        indices.sort_unstable();
        indices.dedup();

        let mut guards = Vec::with_capacity(indices.len());
        for index in indices {
            guards.push(self.stripes[index].write().await);
        }
        guards
    }
}

/// Cache-coordinating front of the inventory store
#[derive(Clone)]
pub struct CacheCoordinator {
    store: InventoryStore,
    cache: Arc<dyn BookCache>,
    locks: Arc<KeyLocks>,
    prefix: String,
}

impl CacheCoordinator {
    pub fn new(store: InventoryStore, cache: Arc<dyn BookCache>, config: &CacheConfig) -> Self {
        Self {
            store,
            cache,
            locks: Arc::new(KeyLocks::new(config.lock_stripes)),
            prefix: config.key_prefix.clone(),
        }
    }

    fn isbn_key(&self, isbn: &str) -> String {
        format!("{}:isbn:{}", self.prefix, isbn)
    }

    /// Author queries are case-insensitive, so equivalent spellings share a key
    fn author_key(&self, author: &str) -> String {
        format!("{}:author:{}", self.prefix, fold_case(author))
    }

    /// Get a book by ISBN, through the cache
    pub async fn find_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        let key = self.isbn_key(isbn);
        if let Some(book) = self.cached::<Book>(&key).await {
            tracing::debug!("Cache hit for {}", key);
            return Ok(book);
        }

        tracing::debug!("Cache miss for {}, reading inventory", key);
        let _guard = self.locks.read(&key).await;
        let book = self.store.find_by_isbn(isbn)?;
        self.populate(&key, &book).await;
        Ok(book)
    }

    /// Get the books of an author, through the cache
    pub async fn find_by_author(&self, author: &str) -> AppResult<BooksList> {
        let key = self.author_key(author);
        if let Some(books) = self.cached::<BooksList>(&key).await {
            tracing::debug!("Cache hit for {}", key);
            return Ok(books);
        }

        tracing::debug!("Cache miss for {}, scanning inventory", key);
        let _guard = self.locks.read(&key).await;
        let books = self.store.find_by_author(author)?;
        self.populate(&key, &books).await;
        Ok(books)
    }

    /// Add a book and install it in the cache
    pub async fn add(&self, book: NewBook) -> AppResult<Book> {
        let isbn = match book.isbn.as_deref() {
            Some(isbn) if !is_blank(isbn) => isbn.to_string(),
            // Let the store report the invalid argument
            _ => return self.store.add(book),
        };
        let isbn_key = self.isbn_key(&isbn);
        let author_key = self.author_key(&book.author);

        let _guards = self.locks.write(&[isbn_key.clone(), author_key.clone()]).await;
        let created = self.store.add(book)?;

        match serde_json::to_string(&created) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&isbn_key, &json).await {
                    tracing::warn!("Failed to install {} in cache: {}", isbn_key, e);
                    self.invalidate(&[isbn_key.clone()]).await?;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to encode {}: {}", isbn_key, e);
                self.invalidate(&[isbn_key.clone()]).await?;
            }
        }
        self.invalidate(&[author_key]).await?;
        Ok(created)
    }

    /// Remove a book and evict its entries
    pub async fn remove(&self, isbn: &str) -> AppResult<Book> {
        if is_blank(isbn) {
            return self.store.remove(isbn);
        }
        let (_guards, keys) = self.lock_record(isbn).await;
        let removed = self.store.remove(isbn)?;
        self.invalidate(&keys).await?;
        Ok(removed)
    }

    /// Borrow a copy and evict the now stale entries
    pub async fn borrow(&self, isbn: &str) -> AppResult<Book> {
        if is_blank(isbn) {
            return self.store.borrow(isbn);
        }
        let (_guards, keys) = self.lock_record(isbn).await;
        let book = self.store.borrow(isbn)?;
        self.invalidate(&keys).await?;
        Ok(book)
    }

    /// Return a copy and evict the now stale entries
    pub async fn return_copy(&self, isbn: &str) -> AppResult<Book> {
        if is_blank(isbn) {
            return self.store.return_copy(isbn);
        }
        let (_guards, keys) = self.lock_record(isbn).await;
        let book = self.store.return_copy(isbn)?;
        self.invalidate(&keys).await?;
        Ok(book)
    }

    /// Empty the cache. The inventory is untouched.
    pub async fn clear(&self) -> AppResult<()> {
        self.cache.clear().await?;
        tracing::info!("Cache cleared");
        Ok(())
    }

    /// Write-lock the ISBN key and the author key of the record it names.
    ///
    /// The author is read before locking, so it is checked again under the
    /// lock in case the record was replaced in between.
    async fn lock_record(&self, isbn: &str) -> (Vec<RwLockWriteGuard<'_, ()>>, Vec<String>) {
        loop {
            let author_key = self.current_author_key(isbn);
            let mut keys = vec![self.isbn_key(isbn)];
            keys.extend(author_key.clone());

            let guards = self.locks.write(&keys).await;
            if self.current_author_key(isbn) == author_key {
                return (guards, keys);
            }
            drop(guards);
        }
    }

    fn current_author_key(&self, isbn: &str) -> Option<String> {
        self.store
            .find_by_isbn(isbn)
            .ok()
            .map(|book| self.author_key(&book.author))
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Cache read failed, falling back to inventory: {}", e);
                None
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to encode {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &json).await {
            tracing::warn!("Failed to populate cache entry {}: {}", key, e);
        }
    }

    /// Evict `keys`; if any eviction fails, fall back to clearing everything
    async fn invalidate(&self, keys: &[String]) -> AppResult<()> {
        let mut failed = false;
        for key in keys {
            if let Err(e) = self.cache.delete(key).await {
                tracing::error!("Failed to evict {}: {}", key, e);
                failed = true;
            }
        }

        if failed {
            self.cache.clear().await.map_err(|e| {
                tracing::error!("Cache clear after failed eviction also failed: {}", e);
                e
            })?;
            tracing::warn!("Cache cleared after failed eviction");
        }
        Ok(())
    }
}
