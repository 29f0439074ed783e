//! Borrow record model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::book::BookShort;
use super::member::MemberShort;

/// Lifecycle state of a borrow record. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowState {
    Active,
    Returned,
}

/// Borrow record from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BorrowRecord {
    pub id: i32,
    pub member_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_returned: bool,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub notes: Option<String>,
}

impl BorrowRecord {
    pub fn state(&self) -> BorrowState {
        if self.is_returned {
            BorrowState::Returned
        } else {
            BorrowState::Active
        }
    }

    /// Unreturned and past its due date at `now`
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_returned && self.due_date < now
    }
}

/// Values for a record about to be inserted
#[derive(Debug, Clone)]
pub struct NewBorrowRecord {
    pub member_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBorrow {
    pub member_id: i32,
    pub book_id: i32,
    /// Loan length in days (server default when omitted)
    #[validate(range(min = 1, message = "borrowDays must be at least 1"))]
    pub borrow_days: Option<i64>,
    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Extension request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtendBorrow {
    /// Days added to the current due date
    pub extend_days: i64,
    /// Replaces the record's notes when not blank
    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Borrow record with member/book projections for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecordDetails {
    pub borrow_id: i32,
    pub member_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_returned: bool,
    #[schema(value_type = String)]
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub notes: Option<String>,
    pub state: BorrowState,
    pub member: MemberShort,
    pub book: BookShort,
}

impl BorrowRecordDetails {
    pub fn new(record: BorrowRecord, member: MemberShort, book: BookShort) -> Self {
        BorrowRecordDetails {
            state: record.state(),
            borrow_id: record.id,
            member_id: record.member_id,
            book_id: record.book_id,
            borrow_date: record.borrow_date,
            due_date: record.due_date,
            return_date: record.return_date,
            is_returned: record.is_returned,
            fine_amount: record.fine_amount,
            fine_paid: record.fine_paid,
            notes: record.notes,
            member,
            book,
        }
    }
}

/// Internal row structure for joined borrow queries
#[derive(Debug, Clone, FromRow)]
pub struct BorrowDetailsRow {
    id: i32,
    member_id: i32,
    book_id: i32,
    borrow_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    is_returned: bool,
    fine_amount: Decimal,
    fine_paid: bool,
    notes: Option<String>,
    member_code: String,
    full_name: String,
    email: Option<String>,
    title: String,
    isbn: String,
    publisher: Option<String>,
    category_name: Option<String>,
}

impl From<BorrowDetailsRow> for BorrowRecordDetails {
    fn from(row: BorrowDetailsRow) -> Self {
        let member = MemberShort {
            member_id: row.member_id,
            member_code: row.member_code,
            full_name: row.full_name,
            email: row.email,
        };
        let book = BookShort {
            book_id: row.book_id,
            title: row.title,
            isbn: row.isbn,
            category_name: row.category_name,
            publisher: row.publisher,
        };
        let record = BorrowRecord {
            id: row.id,
            member_id: row.member_id,
            book_id: row.book_id,
            borrow_date: row.borrow_date,
            due_date: row.due_date,
            return_date: row.return_date,
            is_returned: row.is_returned,
            fine_amount: row.fine_amount,
            fine_paid: row.fine_paid,
            notes: row.notes,
        };
        BorrowRecordDetails::new(record, member, book)
    }
}

/// Status filter for borrow searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    /// Not yet returned
    Current,
    /// Not yet returned and past due
    Overdue,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Current => "current",
            BorrowStatus::Overdue => "overdue",
            BorrowStatus::Returned => "returned",
        }
    }

    pub fn matches(&self, record: &BorrowRecordDetails, now: DateTime<Utc>) -> bool {
        match self {
            BorrowStatus::Current => !record.is_returned,
            BorrowStatus::Overdue => !record.is_returned && record.due_date < now,
            BorrowStatus::Returned => record.is_returned,
        }
    }
}

/// Borrow search parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BorrowQuery {
    pub member_id: Option<i32>,
    pub book_id: Option<i32>,
    pub status: Option<BorrowStatus>,
}

impl BorrowQuery {
    pub fn current() -> Self {
        BorrowQuery {
            status: Some(BorrowStatus::Current),
            ..Default::default()
        }
    }

    pub fn overdue() -> Self {
        BorrowQuery {
            status: Some(BorrowStatus::Overdue),
            ..Default::default()
        }
    }

    pub fn current_for_member(member_id: i32) -> Self {
        BorrowQuery {
            member_id: Some(member_id),
            status: Some(BorrowStatus::Current),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &BorrowRecordDetails, now: DateTime<Utc>) -> bool {
        self.member_id.map_or(true, |id| record.member_id == id)
            && self.book_id.map_or(true, |id| record.book_id == id)
            && self.status.map_or(true, |s| s.matches(record, now))
    }
}

/// Books ranked by number of borrow records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PopularBook {
    pub book_id: i32,
    pub title: String,
    pub borrow_count: i64,
}

/// Aggregated borrow statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowStatistics {
    pub total_borrows: i64,
    pub current_borrows: i64,
    pub overdue_borrows: i64,
    pub returned_borrows: i64,
    /// Sum of persisted fines
    #[schema(value_type = String)]
    pub total_fines: Decimal,
    #[schema(value_type = String)]
    pub unpaid_fines: Decimal,
    pub popular_books: Vec<PopularBook>,
}
