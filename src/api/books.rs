//! Book inventory endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BooksList, NewBook},
};

use super::AuthenticatedUser;

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Acknowledgement of a mutation with the resulting record
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookChangeResponse {
    pub message: String,
    pub book: Book,
}

impl BookChangeResponse {
    fn new(message: &str, book: Book) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            book,
        })
    }
}

/// Get a book by ISBN
#[utoipa::path(
    get,
    path = "/api/v1/books/find/isbn/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn find_by_isbn(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.find_by_isbn(&isbn).await?;
    Ok(Json(book))
}

/// Get the books of an author (case-insensitive exact match)
#[utoipa::path(
    get,
    path = "/api/v1/books/find/author/{author}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("author" = String, Path, description = "Author name")
    ),
    responses(
        (status = 200, description = "Books of the author", body = BooksList),
        (status = 400, description = "Blank author"),
        (status = 404, description = "No book for this author")
    )
)]
pub async fn find_by_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(author): Path<String>,
) -> AppResult<Json<BooksList>> {
    let books = state.services.catalog.find_by_author(&author).await?;
    Ok(Json(books))
}

/// Add a new book
#[utoipa::path(
    post,
    path = "/api/v1/books/newbook",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = NewBook,
    responses(
        (status = 200, description = "Book added", body = BookChangeResponse),
        (status = 400, description = "Invalid book details"),
        (status = 409, description = "ISBN already exists")
    )
)]
pub async fn add_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> AppResult<Json<BookChangeResponse>> {
    let Json(book) = payload.map_err(|rejection| {
        tracing::debug!("Rejected book body: {}", rejection.body_text());
        AppError::InvalidArgument("Not a valid book details.".to_string())
    })?;

    let created = state.services.catalog.add(book).await?;
    tracing::info!("{} added book {}", claims.sub, created.isbn);
    Ok(BookChangeResponse::new("Book Added Successfully", created))
}

/// Remove a book
#[utoipa::path(
    delete,
    path = "/api/v1/books/delete/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Book removed", body = BookChangeResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn remove_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<BookChangeResponse>> {
    let removed = state.services.catalog.remove(&isbn).await?;
    tracing::info!("{} removed book {}", claims.sub, removed.isbn);
    Ok(BookChangeResponse::new("Book Removed Successfully", removed))
}

/// Borrow one copy of a book
#[utoipa::path(
    put,
    path = "/api/v1/books/borrow/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Book borrowed", body = BookChangeResponse),
        (status = 400, description = "No copies available"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<BookChangeResponse>> {
    let book = state.services.catalog.borrow(&isbn).await?;
    Ok(BookChangeResponse::new("Book borrowed successfully", book))
}

/// Return one copy of a book
#[utoipa::path(
    put,
    path = "/api/v1/books/return/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Book returned", body = BookChangeResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<BookChangeResponse>> {
    let book = state.services.catalog.return_copy(&isbn).await?;
    Ok(BookChangeResponse::new("Book returned successfully", book))
}

/// Empty the cache (operational recovery)
#[utoipa::path(
    get,
    path = "/api/v1/books/clearcache",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cache cleared", body = MessageResponse)
    )
)]
pub async fn clear_cache(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    state.services.catalog.clear().await?;
    tracing::info!("{} cleared the cache", claims.sub);
    Ok(Json(MessageResponse {
        message: "Cache Cleared.".to_string(),
    }))
}
