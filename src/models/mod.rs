//! Data models for the inventory server

pub mod book;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BooksList, NewBook};
pub use user::{LoginRequest, LoginResponse, UserClaims};
