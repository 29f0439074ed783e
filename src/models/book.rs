//! Book model as seen by circulation

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Catalog book with its copy counters.
///
/// `available_copies` is owned by the catalog store and only moves through
/// `CatalogStore::decrement_available` / `CatalogStore::increment_available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub publisher: Option<String>,
    pub category_name: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
}

impl Book {
    pub fn is_in_stock(&self) -> bool {
        self.available_copies > 0
    }
}

/// Short book representation embedded in borrow records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookShort {
    pub book_id: i32,
    pub title: String,
    pub isbn: String,
    pub category_name: Option<String>,
    pub publisher: Option<String>,
}

impl From<&Book> for BookShort {
    fn from(book: &Book) -> Self {
        BookShort {
            book_id: book.id,
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            category_name: book.category_name.clone(),
            publisher: book.publisher.clone(),
        }
    }
}
