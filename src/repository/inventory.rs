//! In-memory inventory store
//!
//! Records live in a sharded concurrent map keyed by ISBN. The copy counter of
//! each record is an atomic cell, so borrow/return on one ISBN are linearizable
//! without holding any map lock, and operations on different ISBNs never wait
//! on each other beyond a brief shard access.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    error::{AppError, AppResult},
    models::book::{fold_case, is_blank, Book, BooksList, NewBook},
};

/// Counter value of a slot that has been taken out of the map
const RETIRED: u64 = u64::MAX;

/// One stored record. Only the copy counter is mutable.
///
/// The counter holds a `u32` copy count widened to `u64`, or `RETIRED` once
/// the record is removed. Retiring is a single swap, so an operation that
/// still holds the slot either lands before the removal (and is part of the
/// removed snapshot) or fails as not found.
#[derive(Debug)]
struct BookSlot {
    isbn: String,
    title: String,
    author: String,
    /// Case-folded author, compared against folded queries
    author_folded: String,
    publication_year: i32,
    available_copies: AtomicU64,
}

impl BookSlot {
    fn new(isbn: String, book: NewBook) -> Self {
        Self {
            isbn,
            author_folded: fold_case(&book.author),
            title: book.title,
            author: book.author,
            publication_year: book.publication_year,
            available_copies: AtomicU64::new(u64::from(book.available_copies)),
        }
    }

    /// Current state, or `None` once retired
    fn snapshot(&self) -> Option<Book> {
        match self.available_copies.load(Ordering::Acquire) {
            RETIRED => None,
            copies => Some(self.snapshot_with(copies)),
        }
    }

    fn snapshot_with(&self, copies: u64) -> Book {
        Book {
            isbn: self.isbn.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            publication_year: self.publication_year,
            available_copies: u32::try_from(copies).unwrap_or(u32::MAX),
        }
    }

    fn not_found(&self) -> AppError {
        AppError::NotFound(format!("Book ({}) Not found", self.isbn))
    }

    fn take_copy(&self) -> AppResult<Book> {
        let previous = self
            .available_copies
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                RETIRED | 0 => None,
                n => Some(n - 1),
            })
            .map_err(|n| match n {
                RETIRED => self.not_found(),
                _ => AppError::NoCopiesAvailable(format!(
                    "No available copies for book with ISBN {}.",
                    self.isbn
                )),
            })?;
        Ok(self.snapshot_with(previous - 1))
    }

    fn put_copy(&self) -> AppResult<Book> {
        let previous = self
            .available_copies
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                RETIRED => None,
                n if n >= u64::from(u32::MAX) => None,
                n => Some(n + 1),
            })
            .map_err(|n| match n {
                RETIRED => self.not_found(),
                _ => AppError::Internal(format!("Copy counter overflow for ISBN {}", self.isbn)),
            })?;
        Ok(self.snapshot_with(previous + 1))
    }

    /// Final state at the moment of removal
    fn retire(&self) -> Option<Book> {
        match self.available_copies.swap(RETIRED, Ordering::AcqRel) {
            RETIRED => None,
            copies => Some(self.snapshot_with(copies)),
        }
    }
}

/// Concurrent keyed container of inventory records
#[derive(Clone, Default)]
pub struct InventoryStore {
    books: Arc<DashMap<String, Arc<BookSlot>>>,
}

impl InventoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the fixed startup records
    pub fn seeded() -> Self {
        let store = Self::new();
        for book in seed_books() {
            store.insert_unchecked(book);
        }
        tracing::info!("Inventory seeded with {} books", store.len());
        store
    }

    fn insert_unchecked(&self, book: Book) {
        let isbn = book.isbn.clone();
        self.books
            .insert(isbn.clone(), Arc::new(BookSlot::new(isbn, book.into())));
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Clone the slot out so no shard guard outlives this call
    fn slot(&self, isbn: &str) -> AppResult<Arc<BookSlot>> {
        self.books
            .get(isbn)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::NotFound(format!("Book ({}) Not found", isbn)))
    }

    /// Get a book by ISBN
    pub fn find_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        tracing::debug!("Finding book ISBN: {}", isbn);
        if is_blank(isbn) {
            return Err(AppError::NotFound("Not a valid ISBN number.".to_string()));
        }
        let slot = self.slot(isbn)?;
        slot.snapshot().ok_or_else(|| slot.not_found())
    }

    /// Get all books whose author matches, ignoring case, ordered by ISBN
    pub fn find_by_author(&self, author: &str) -> AppResult<BooksList> {
        if is_blank(author) {
            return Err(AppError::InvalidArgument(
                "Author name is Empty or null.".to_string(),
            ));
        }
        tracing::debug!("Finding books by author: {}", author);

        let folded = fold_case(author);
        let mut book_list: Vec<Book> = self
            .books
            .iter()
            .filter(|entry| entry.value().author_folded == folded)
            .filter_map(|entry| entry.value().snapshot())
            .collect();

        if book_list.is_empty() {
            return Err(AppError::NotFound(
                "Book Not found for given author".to_string(),
            ));
        }
        book_list.sort_by(|a, b| a.isbn.cmp(&b.isbn));
        Ok(BooksList { book_list })
    }

    /// Add a new book. The ISBN must not exist yet.
    pub fn add(&self, book: NewBook) -> AppResult<Book> {
        let isbn = match book.isbn.as_deref() {
            Some(isbn) if !is_blank(isbn) => isbn.to_string(),
            _ => return Err(AppError::InvalidArgument("Not a valid ISBN number.".to_string())),
        };

        // The entry holds the shard lock, making check-and-insert one step
        match self.books.entry(isbn.clone()) {
            Entry::Occupied(_) => Err(AppError::DuplicateIsbn(
                "Duplicate ISBN, Try with another ISBN no. ".to_string(),
            )),
            Entry::Vacant(vacant) => {
                let created = Book {
                    isbn: isbn.clone(),
                    title: book.title.clone(),
                    author: book.author.clone(),
                    publication_year: book.publication_year,
                    available_copies: book.available_copies,
                };
                vacant.insert(Arc::new(BookSlot::new(isbn, book)));
                tracing::info!("Added book {} ({} copies)", created.isbn, created.available_copies);
                Ok(created)
            }
        }
    }

    /// Remove a book, returning the record as it stood when it was removed
    pub fn remove(&self, isbn: &str) -> AppResult<Book> {
        validate_isbn(isbn)?;
        let not_found = || AppError::NotFound("ISBN is not found in the library.".to_string());
        let (_, slot) = self.books.remove(isbn).ok_or_else(not_found)?;
        let removed = slot.retire().ok_or_else(not_found)?;
        tracing::info!("Removed book {}", isbn);
        Ok(removed)
    }

    /// Borrow one copy. Fails without touching the count when none is left.
    pub fn borrow(&self, isbn: &str) -> AppResult<Book> {
        validate_isbn(isbn)?;
        let book = self.slot(isbn)?.take_copy()?;
        tracing::info!("Borrowed book {} ({} copies left)", isbn, book.available_copies);
        Ok(book)
    }

    /// Return one copy
    pub fn return_copy(&self, isbn: &str) -> AppResult<Book> {
        validate_isbn(isbn)?;
        let book = self.slot(isbn)?.put_copy()?;
        tracing::info!("Returned book {} ({} copies available)", isbn, book.available_copies);
        Ok(book)
    }
}

fn validate_isbn(isbn: &str) -> AppResult<()> {
    if is_blank(isbn) {
        return Err(AppError::InvalidArgument("Not a valid ISBN number.".to_string()));
    }
    Ok(())
}

/// Records present at every startup
pub fn seed_books() -> Vec<Book> {
    vec![
        Book::new("AA111", "Arrival", "Summer", 1995, 15),
        Book::new("BB222", "Arrival", "Winter", 2000, 10),
        Book::new("CC333", "Parkinson", "Season", 2010, 20),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn new_book(isbn: &str, copies: u32) -> NewBook {
        NewBook {
            isbn: Some(isbn.to_string()),
            title: "Borrow Book".to_string(),
            author: "New Season".to_string(),
            publication_year: 2024,
            available_copies: copies,
        }
    }

    #[test]
    fn test_find_by_isbn() {
        let store = InventoryStore::seeded();
        let book = store.find_by_isbn("AA111").unwrap();
        assert_eq!(book.isbn, "AA111");
        assert_eq!(book.available_copies, 15);

        assert!(matches!(store.find_by_isbn("AA11112"), Err(AppError::NotFound(_))));
        assert!(matches!(store.find_by_isbn("  "), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_find_by_author() {
        let store = InventoryStore::seeded();
        let books = store.find_by_author("Summer").unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books.book_list[0].isbn, "AA111");

        // Case-insensitive, but whole-field only
        assert_eq!(store.find_by_author("wINTER").unwrap().book_list[0].isbn, "BB222");
        assert!(matches!(store.find_by_author("Win"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_find_by_author_errors() {
        let store = InventoryStore::seeded();
        match store.find_by_author("Nonexistent") {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Book Not found for given author"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(store.find_by_author(""), Err(AppError::InvalidArgument(_))));
        assert!(matches!(
            InventoryStore::new().find_by_author("Winter"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_by_author_multiple() {
        let store = InventoryStore::seeded();
        store.add(new_book("ZZ900", 1)).unwrap();
        store.add(new_book("BB123", 1)).unwrap();

        let books = store.find_by_author("new season").unwrap();
        let isbns: Vec<_> = books.book_list.iter().map(|b| b.isbn.as_str()).collect();
        assert_eq!(isbns, vec!["BB123", "ZZ900"]);
    }

    #[test]
    fn test_add() {
        let store = InventoryStore::seeded();
        let created = store.add(new_book("CC123", 50)).unwrap();
        assert_eq!(created.available_copies, 50);
        assert_eq!(store.find_by_isbn("CC123").unwrap(), created);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_add_duplicate_keeps_original() {
        let store = InventoryStore::seeded();
        let result = store.add(new_book("AA111", 99));
        assert!(matches!(result, Err(AppError::DuplicateIsbn(_))));
        assert_eq!(store.find_by_isbn("AA111").unwrap().available_copies, 15);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_add_invalid_isbn() {
        let store = InventoryStore::new();
        assert!(matches!(store.add(NewBook::default()), Err(AppError::InvalidArgument(_))));
        assert!(matches!(store.add(new_book(" ", 1)), Err(AppError::InvalidArgument(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove() {
        let store = InventoryStore::seeded();
        let removed = store.remove("CC333").unwrap();
        assert_eq!(removed.title, "Parkinson");
        assert!(matches!(store.find_by_isbn("CC333"), Err(AppError::NotFound(_))));
        assert!(matches!(store.remove("CC333"), Err(AppError::NotFound(_))));
        assert!(matches!(store.remove(""), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_borrow_until_exhausted_then_return() {
        let store = InventoryStore::seeded();
        for expected in (0..15).rev() {
            assert_eq!(store.borrow("AA111").unwrap().available_copies, expected);
        }

        match store.borrow("AA111") {
            Err(AppError::NoCopiesAvailable(msg)) => {
                assert_eq!(msg, "No available copies for book with ISBN AA111.")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(store.find_by_isbn("AA111").unwrap().available_copies, 0);

        assert_eq!(store.return_copy("AA111").unwrap().available_copies, 1);
    }

    #[test]
    fn test_borrow_return_inverse() {
        let store = InventoryStore::seeded();
        store.borrow("BB222").unwrap();
        store.return_copy("BB222").unwrap();
        assert_eq!(store.find_by_isbn("BB222").unwrap().available_copies, 10);
    }

    #[test]
    fn test_borrow_and_return_errors() {
        let store = InventoryStore::seeded();
        assert!(matches!(store.borrow("XX000"), Err(AppError::NotFound(_))));
        assert!(matches!(store.borrow(" "), Err(AppError::InvalidArgument(_))));
        assert!(matches!(store.return_copy("XX000"), Err(AppError::NotFound(_))));
        assert!(matches!(store.return_copy(""), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_return_has_no_upper_bound() {
        let store = InventoryStore::new();
        store.add(new_book("RR345", 1)).unwrap();
        assert_eq!(store.return_copy("RR345").unwrap().available_copies, 2);
    }

    #[test]
    fn test_concurrent_last_copy_race() {
        for _ in 0..50 {
            let store = InventoryStore::new();
            store.add(new_book("LAST1", 1)).unwrap();
            let barrier = Barrier::new(2);

            let results: Vec<AppResult<Book>> = thread::scope(|s| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        let store = &store;
                        let barrier = &barrier;
                        s.spawn(move || {
                            barrier.wait();
                            store.borrow("LAST1")
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let ok = results.iter().filter(|r| r.is_ok()).count();
            let exhausted = results
                .iter()
                .filter(|r| matches!(r, Err(AppError::NoCopiesAvailable(_))))
                .count();
            assert_eq!((ok, exhausted), (1, 1));
            assert_eq!(store.find_by_isbn("LAST1").unwrap().available_copies, 0);
        }
    }

    #[test]
    fn test_removed_slot_rejects_late_mutations() {
        let store = InventoryStore::seeded();
        let slot = store.slot("AA111").unwrap();

        let removed = store.remove("AA111").unwrap();
        assert_eq!(removed.available_copies, 15);

        // A caller that fetched the slot before the removal cannot change it
        assert!(matches!(slot.take_copy(), Err(AppError::NotFound(_))));
        assert!(matches!(slot.put_copy(), Err(AppError::NotFound(_))));
        assert!(slot.snapshot().is_none());
        assert!(slot.retire().is_none());
    }

    #[test]
    fn test_concurrent_remove_and_borrow_agree() {
        for _ in 0..200 {
            let store = InventoryStore::new();
            store.add(new_book("GONE1", 1)).unwrap();
            let barrier = Barrier::new(2);

            let (removed, borrowed) = thread::scope(|s| {
                let remover = s.spawn(|| {
                    barrier.wait();
                    store.remove("GONE1")
                });
                let borrower = s.spawn(|| {
                    barrier.wait();
                    store.borrow("GONE1")
                });
                (remover.join().unwrap(), borrower.join().unwrap())
            });

            // Either the borrow happened first and the removal saw it, or the
            // borrow came too late and found nothing
            let removed = removed.unwrap();
            match borrowed {
                Ok(book) => {
                    assert_eq!(book.available_copies, 0);
                    assert_eq!(removed.available_copies, 0);
                }
                Err(AppError::NotFound(_)) => assert_eq!(removed.available_copies, 1),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn test_find_by_author_folds_each_character() {
        let store = InventoryStore::new();
        let mut book = new_book("TR001", 1);
        book.author = "İlhan".to_string();
        store.add(book).unwrap();

        assert_eq!(store.find_by_author("ilhan").unwrap().book_list[0].isbn, "TR001");
        assert_eq!(store.find_by_author("ILHAN").unwrap().len(), 1);
        assert!(matches!(store.find_by_author("ilha"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_concurrent_adds_single_winner() {
        let store = InventoryStore::new();
        let barrier = Barrier::new(8);

        let results: Vec<AppResult<Book>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8u32)
                .map(|i| {
                    let store = &store;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        store.add(new_book("DUP01", i))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::DuplicateIsbn(_))))
                .count(),
            7
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_borrow_return_balance() {
        let store = InventoryStore::new();
        store.add(new_book("MIX01", 100)).unwrap();

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..250 {
                        store.borrow("MIX01").unwrap();
                        store.return_copy("MIX01").unwrap();
                    }
                });
            }
        });

        assert_eq!(store.find_by_isbn("MIX01").unwrap().available_copies, 100);
    }
}
