//! Repository layer: store contracts and their backends
//!
//! Every mutating circulation operation runs inside one [`UnitOfWork`]
//! obtained from [`Database::begin`]. A unit of work that is dropped without
//! [`UnitOfWork::commit`] leaves no trace.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        book::Book,
        borrow::{BorrowQuery, BorrowRecord, BorrowRecordDetails, BorrowStatistics, NewBorrowRecord},
        member::Member,
    },
};

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

/// Catalog side of a unit of work. Owns the copy counters.
#[async_trait]
pub trait CatalogStore: Send {
    /// Fetch a book, locking it for the rest of the unit of work
    async fn find_book(&mut self, id: i32) -> AppResult<Option<Book>>;

    /// Take one copy off the shelf. Fails with `Conflict` when none is left.
    async fn decrement_available(&mut self, id: i32) -> AppResult<()>;

    /// Put one copy back, never exceeding `total_copies`
    async fn increment_available(&mut self, id: i32) -> AppResult<()>;
}

/// Member side of a unit of work (read-only)
#[async_trait]
pub trait MemberStore: Send {
    async fn find_member(&mut self, id: i32) -> AppResult<Option<Member>>;

    /// `false` for inactive and unknown members
    async fn is_active(&mut self, id: i32) -> AppResult<bool>;
}

/// Borrow records side of a unit of work
#[async_trait]
pub trait BorrowLedger: Send {
    /// Fetch a record, locking it for the rest of the unit of work
    async fn find_record(&mut self, id: i32) -> AppResult<Option<BorrowRecord>>;

    async fn count_active_for_member(&mut self, member_id: i32) -> AppResult<i64>;

    async fn has_overdue_for_member(&mut self, member_id: i32, now: DateTime<Utc>) -> AppResult<bool>;

    async fn insert_record(&mut self, record: NewBorrowRecord) -> AppResult<BorrowRecord>;

    async fn update_record(&mut self, record: &BorrowRecord) -> AppResult<()>;

    /// Record joined with its member and book projections
    async fn record_details(&mut self, id: i32) -> AppResult<BorrowRecordDetails>;
}

/// One atomic transaction spanning catalog, members and ledger
#[async_trait]
pub trait UnitOfWork: CatalogStore + MemberStore + BorrowLedger {
    async fn commit(&mut self) -> AppResult<()>;
}

/// Shared handle to a store backend
#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    async fn find_borrow(&self, id: i32) -> AppResult<Option<BorrowRecordDetails>>;

    /// Records matching `query`, in ascending id order
    async fn search_borrows(
        &self,
        query: &BorrowQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRecordDetails>>;

    async fn find_member(&self, id: i32) -> AppResult<Option<Member>>;

    async fn statistics(&self, now: DateTime<Utc>) -> AppResult<BorrowStatistics>;

    /// Cheap connectivity probe for readiness checks
    async fn ping(&self) -> AppResult<()>;
}

/// Number of books listed in statistics
pub const POPULAR_BOOKS_LIMIT: usize = 5;
