//! Borrow lifecycle: borrow, return, extend, pay fine
//!
//! A record is `Active` from creation until `return_book`, after which it is
//! `Returned` for good. Each mutating call runs its checks and writes inside
//! a single unit of work.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::borrow::{
        BorrowQuery, BorrowRecordDetails, BorrowStatistics, BorrowStatus, CreateBorrow,
        ExtendBorrow, NewBorrowRecord,
    },
    repository::Database,
};

use super::clock::Clock;
use super::fines::overdue_fine;

#[derive(Clone)]
pub struct BorrowService {
    database: Arc<dyn Database>,
    policy: LoansConfig,
    clock: Arc<dyn Clock>,
}

impl BorrowService {
    pub fn new(database: Arc<dyn Database>, policy: LoansConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            database,
            policy,
            clock,
        }
    }

    /// Lend one copy of a book to a member
    pub async fn borrow_book(&self, request: CreateBorrow) -> AppResult<BorrowRecordDetails> {
        let borrow_days = request.borrow_days.unwrap_or(self.policy.default_borrow_days);
        if borrow_days < 1 || borrow_days > self.policy.max_borrow_days {
            return Err(AppError::Validation(format!(
                "borrowDays must be between 1 and {}",
                self.policy.max_borrow_days
            )));
        }

        let now = self.clock.now();
        let mut uow = self.database.begin().await?;

        let member = uow.find_member(request.member_id).await?;
        let book = uow.find_book(request.book_id).await?;
        let (member, book) = match (member, book) {
            (Some(member), Some(book)) => (member, book),
            (None, _) => {
                return Err(AppError::NotFound(format!("Member {} not found", request.member_id)))
            }
            (_, None) => {
                return Err(AppError::NotFound(format!("Book {} not found", request.book_id)))
            }
        };

        if !book.is_in_stock() {
            return Err(AppError::Conflict(format!("Book '{}' is out of stock", book.title)));
        }

        if !uow.is_active(member.id).await? {
            return Err(AppError::Conflict(format!("Member {} is inactive", member.member_code)));
        }

        if uow.has_overdue_for_member(member.id, now).await? {
            return Err(AppError::Conflict(format!(
                "Member {} has overdue items",
                member.member_code
            )));
        }

        let active = uow.count_active_for_member(member.id).await?;
        if active >= self.policy.max_active_borrows {
            return Err(AppError::Conflict(format!(
                "Member {} reached the borrow limit ({}/{})",
                member.member_code, active, self.policy.max_active_borrows
            )));
        }

        let record = uow
            .insert_record(NewBorrowRecord {
                member_id: member.id,
                book_id: book.id,
                borrow_date: now,
                due_date: now + Duration::days(borrow_days),
                notes: request.notes,
            })
            .await?;
        uow.decrement_available(book.id).await?;
        let details = uow.record_details(record.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Borrow {} created: member={} book={} due={}",
            record.id, member.id, book.id, record.due_date
        );
        Ok(details)
    }

    /// Close a loan, put the copy back and settle the overdue fine
    pub async fn return_book(&self, borrow_id: i32) -> AppResult<BorrowRecordDetails> {
        let now = self.clock.now();
        let mut uow = self.database.begin().await?;

        let mut record = uow
            .find_record(borrow_id)
            .await?
            .ok_or_else(|| not_found(borrow_id))?;

        if record.is_returned {
            return Err(AppError::Conflict(format!("Borrow {} was already returned", borrow_id)));
        }

        record.return_date = Some(now);
        record.is_returned = true;
        record.fine_amount = overdue_fine(record.due_date, now, self.policy.fine_rate_per_day);

        uow.update_record(&record).await?;
        uow.increment_available(record.book_id).await?;
        let details = uow.record_details(record.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Borrow {} returned: book={} fine={}",
            record.id, record.book_id, record.fine_amount
        );
        Ok(details)
    }

    /// Push the due date of an active, not yet overdue loan
    pub async fn extend_borrow(
        &self,
        borrow_id: i32,
        request: ExtendBorrow,
    ) -> AppResult<BorrowRecordDetails> {
        let now = self.clock.now();
        let mut uow = self.database.begin().await?;

        let mut record = uow
            .find_record(borrow_id)
            .await?
            .ok_or_else(|| not_found(borrow_id))?;

        if record.is_returned {
            return Err(AppError::Conflict(format!("Borrow {} was already returned", borrow_id)));
        }

        if now > record.due_date {
            return Err(AppError::Conflict(format!(
                "Borrow {} is overdue and cannot be extended",
                borrow_id
            )));
        }

        if request.extend_days < 1 || request.extend_days > self.policy.max_extend_days {
            return Err(AppError::Validation(format!(
                "extendDays must be between 1 and {}",
                self.policy.max_extend_days
            )));
        }

        record.due_date += Duration::days(request.extend_days);
        if let Some(notes) = request.notes.filter(|n| !n.trim().is_empty()) {
            record.notes = Some(notes);
        }

        uow.update_record(&record).await?;
        let details = uow.record_details(record.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Borrow {} extended by {} days: due={}",
            record.id, request.extend_days, record.due_date
        );
        Ok(details)
    }

    /// Mark the persisted fine of a record as paid
    pub async fn pay_fine(&self, borrow_id: i32) -> AppResult<BorrowRecordDetails> {
        let mut uow = self.database.begin().await?;

        let mut record = uow
            .find_record(borrow_id)
            .await?
            .ok_or_else(|| not_found(borrow_id))?;

        if record.fine_amount <= Decimal::ZERO {
            return Err(AppError::Conflict(format!("Borrow {} has no fine to pay", borrow_id)));
        }

        record.fine_paid = true;
        uow.update_record(&record).await?;
        let details = uow.record_details(record.id).await?;
        uow.commit().await?;

        tracing::info!("Borrow {} fine paid: {}", record.id, record.fine_amount);
        Ok(details)
    }

    pub async fn get_borrow(&self, borrow_id: i32) -> AppResult<BorrowRecordDetails> {
        self.database
            .find_borrow(borrow_id)
            .await?
            .ok_or_else(|| not_found(borrow_id))
    }

    /// Unreturned records, latest due date first
    pub async fn list_current(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        let mut records = self
            .database
            .search_borrows(&BorrowQuery::current(), self.clock.now())
            .await?;
        records.sort_by(|a, b| b.due_date.cmp(&a.due_date));
        Ok(records)
    }

    /// Overdue records, oldest due date first, with the fine they would
    /// incur if returned now
    pub async fn list_overdue(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        let now = self.clock.now();
        let mut records = self.database.search_borrows(&BorrowQuery::overdue(), now).await?;
        records.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(self.with_fine_preview(records, now))
    }

    pub async fn search(&self, query: &BorrowQuery) -> AppResult<Vec<BorrowRecordDetails>> {
        let now = self.clock.now();
        let mut records = self.database.search_borrows(query, now).await?;
        if query.status == Some(BorrowStatus::Overdue) {
            records.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        }
        Ok(self.with_fine_preview(records, now))
    }

    /// Unreturned records of one member
    pub async fn member_borrows(&self, member_id: i32) -> AppResult<Vec<BorrowRecordDetails>> {
        self.database
            .find_member(member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))?;

        let now = self.clock.now();
        let records = self
            .database
            .search_borrows(&BorrowQuery::current_for_member(member_id), now)
            .await?;
        Ok(self.with_fine_preview(records, now))
    }

    pub async fn statistics(&self) -> AppResult<BorrowStatistics> {
        self.database.statistics(self.clock.now()).await
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.database.ping().await
    }

    fn with_fine_preview(
        &self,
        mut records: Vec<BorrowRecordDetails>,
        now: DateTime<Utc>,
    ) -> Vec<BorrowRecordDetails> {
        for record in records.iter_mut().filter(|r| !r.is_returned && r.due_date < now) {
            record.fine_amount = overdue_fine(record.due_date, now, self.policy.fine_rate_per_day);
        }
        records
    }
}

fn not_found(borrow_id: i32) -> AppError {
    AppError::NotFound(format!("Borrow record {} not found", borrow_id))
}
