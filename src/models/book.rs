//! Book (inventory record) model and related types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Snapshot of one inventory record.
///
/// `isbn` is the primary key. `title`, `author` and `publication_year` never
/// change once the record exists; `available_copies` is only moved by borrow
/// and return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: String,
    /// Informational only, not range checked
    pub publication_year: i32,
    pub available_copies: u32,
}

impl Book {
    pub fn new(
        isbn: &str,
        title: &str,
        author: &str,
        publication_year: i32,
        available_copies: u32,
    ) -> Self {
        Self {
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            publication_year,
            available_copies,
        }
    }
}

/// Add-book payload.
///
/// The ISBN is optional on the wire so a missing one is reported as an
/// invalid argument instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct NewBook {
    pub isbn: Option<String>,
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    pub available_copies: u32,
}

impl From<Book> for NewBook {
    fn from(book: Book) -> Self {
        Self {
            isbn: Some(book.isbn),
            title: book.title,
            author: book.author,
            publication_year: book.publication_year,
            available_copies: book.available_copies,
        }
    }
}

/// Transient result of an author query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BooksList {
    pub book_list: Vec<Book>,
}

impl BooksList {
    pub fn len(&self) -> usize {
        self.book_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.book_list.is_empty()
    }
}

/// True for empty or whitespace-only identifiers
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Case-fold a name one character at a time.
///
/// Each character maps to exactly one character (upper then lower case,
/// single-character mappings only), so "İ", "ı" and "I" all fold to "i" and
/// two names match only if they match character for character.
pub fn fold_case(value: &str) -> String {
    value.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    let upper = match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        // "ß" -> "SS" and friends keep their own form
        _ => c,
    };
    upper.to_lowercase().next().unwrap_or(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_wire_format() {
        let book = Book::new("AA111", "Arrival", "Summer", 1995, 15);
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["publicationYear"], 1995);
        assert_eq!(json["availableCopies"], 15);

        let list = BooksList { book_list: vec![book] };
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["bookList"][0]["isbn"], "AA111");
    }

    #[test]
    fn test_new_book_missing_fields() {
        let new_book: NewBook = serde_json::from_str(r#"{"title":"No Isbn"}"#).unwrap();
        assert!(new_book.isbn.is_none());
        assert_eq!(new_book.available_copies, 0);
    }

    #[test]
    fn test_negative_copies_rejected() {
        let parsed = serde_json::from_str::<NewBook>(r#"{"isbn":"X1","availableCopies":-1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("  \t"));
        assert!(!is_blank(" AA111 "));
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case("New Season"), "new season");
        assert_eq!(fold_case("İSTANBUL"), fold_case("istanbul"));
        assert_eq!(fold_case("ıI"), "ii");
        assert_eq!(fold_case("Straße"), "straße");
        assert_eq!(fold_case("İ").chars().count(), 1);
        assert_ne!(fold_case("Win"), fold_case("Winter"));
    }
}
