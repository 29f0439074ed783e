//! In-memory backend for demos and tests
//!
//! A unit of work holds the store's mutex for its whole lifetime and edits a
//! private copy of the state, so units of work are fully serialised and an
//! uncommitted one is discarded on drop.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookShort},
        borrow::{
            BorrowQuery, BorrowRecord, BorrowRecordDetails, BorrowStatistics, NewBorrowRecord,
            PopularBook,
        },
        member::{Member, MemberShort},
    },
};

use super::{BorrowLedger, CatalogStore, Database, MemberStore, UnitOfWork, POPULAR_BOOKS_LIMIT};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<i32, Book>,
    members: BTreeMap<i32, Member>,
    records: BTreeMap<i32, BorrowRecord>,
    last_record_id: i32,
}

impl MemoryState {
    fn details(&self, record: &BorrowRecord) -> AppResult<BorrowRecordDetails> {
        let member = self.members.get(&record.member_id).ok_or_else(|| {
            AppError::Internal(format!("Borrow record {} references missing member", record.id))
        })?;
        let book = self.books.get(&record.book_id).ok_or_else(|| {
            AppError::Internal(format!("Borrow record {} references missing book", record.id))
        })?;
        Ok(BorrowRecordDetails::new(
            record.clone(),
            MemberShort::from(member),
            BookShort::from(book),
        ))
    }
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small catalog for running the server without PostgreSQL
    pub async fn seeded() -> Self {
        let db = Self::new();
        let books = [
            (1, "9780131103627", "The C Programming Language", "Prentice Hall", "Programming", 3),
            (2, "9781593278281", "The Rust Programming Language", "No Starch Press", "Programming", 2),
            (3, "9780262033848", "Introduction to Algorithms", "MIT Press", "Computer Science", 1),
        ];
        for (id, isbn, title, publisher, category, copies) in books {
            db.insert_book(Book {
                id,
                isbn: isbn.to_string(),
                title: title.to_string(),
                publisher: Some(publisher.to_string()),
                category_name: Some(category.to_string()),
                total_copies: copies,
                available_copies: copies,
            })
            .await;
        }
        let members = [(1, "M0001", "Nguyen Van An", true), (2, "M0002", "Tran Thi Binh", true), (3, "M0003", "Le Van Cuong", false)];
        for (id, code, name, is_active) in members {
            db.insert_member(Member {
                id,
                member_code: code.to_string(),
                full_name: name.to_string(),
                email: None,
                is_active,
            })
            .await;
        }
        db
    }

    /// Add or replace a catalog book
    pub async fn insert_book(&self, book: Book) {
        self.state.lock().await.books.insert(book.id, book);
    }

    /// Add or replace a member
    pub async fn insert_member(&self, member: Member) {
        self.state.lock().await.members.insert(member.id, member);
    }

    pub async fn book(&self, id: i32) -> Option<Book> {
        self.state.lock().await.books.get(&id).cloned()
    }

    pub async fn record(&self, id: i32) -> Option<BorrowRecord> {
        self.state.lock().await.records.get(&id).cloned()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn find_borrow(&self, id: i32) -> AppResult<Option<BorrowRecordDetails>> {
        let state = self.state.lock().await;
        state.records.get(&id).map(|r| state.details(r)).transpose()
    }

    async fn search_borrows(
        &self,
        query: &BorrowQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRecordDetails>> {
        let state = self.state.lock().await;
        let mut result = Vec::new();
        for record in state.records.values() {
            let details = state.details(record)?;
            if query.matches(&details, now) {
                result.push(details);
            }
        }
        Ok(result)
    }

    async fn find_member(&self, id: i32) -> AppResult<Option<Member>> {
        Ok(self.state.lock().await.members.get(&id).cloned())
    }

    async fn statistics(&self, now: DateTime<Utc>) -> AppResult<BorrowStatistics> {
        let state = self.state.lock().await;
        let records: Vec<&BorrowRecord> = state.records.values().collect();

        let mut counts: BTreeMap<i32, i64> = BTreeMap::new();
        for record in &records {
            *counts.entry(record.book_id).or_default() += 1;
        }
        let mut popular_books: Vec<PopularBook> = counts
            .into_iter()
            .map(|(book_id, borrow_count)| PopularBook {
                book_id,
                title: state.books.get(&book_id).map(|b| b.title.clone()).unwrap_or_default(),
                borrow_count,
            })
            .collect();
        // stable sort keeps ascending book id among equal counts
        popular_books.sort_by(|a, b| b.borrow_count.cmp(&a.borrow_count));
        popular_books.truncate(POPULAR_BOOKS_LIMIT);

        Ok(BorrowStatistics {
            total_borrows: records.len() as i64,
            current_borrows: records.iter().filter(|r| !r.is_returned).count() as i64,
            overdue_borrows: records.iter().filter(|r| r.is_overdue_at(now)).count() as i64,
            returned_borrows: records.iter().filter(|r| r.is_returned).count() as i64,
            total_fines: records.iter().map(|r| r.fine_amount).sum(),
            unpaid_fines: records
                .iter()
                .filter(|r| r.fine_amount > Decimal::ZERO && !r.fine_paid)
                .map(|r| r.fine_amount)
                .sum(),
            popular_books,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl CatalogStore for MemoryUnitOfWork {
    async fn find_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&id).cloned())
    }

    async fn decrement_available(&mut self, id: i32) -> AppResult<()> {
        let book = self
            .working
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
        if book.available_copies <= 0 {
            return Err(AppError::Conflict(format!("Book {} is out of stock", id)));
        }
        book.available_copies -= 1;
        Ok(())
    }

    async fn increment_available(&mut self, id: i32) -> AppResult<()> {
        let book = self
            .working
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
        book.available_copies = (book.available_copies + 1).clamp(0, book.total_copies);
        Ok(())
    }
}

#[async_trait]
impl MemberStore for MemoryUnitOfWork {
    async fn find_member(&mut self, id: i32) -> AppResult<Option<Member>> {
        Ok(self.working.members.get(&id).cloned())
    }

    async fn is_active(&mut self, id: i32) -> AppResult<bool> {
        Ok(self.working.members.get(&id).map_or(false, |m| m.is_active))
    }
}

#[async_trait]
impl BorrowLedger for MemoryUnitOfWork {
    async fn find_record(&mut self, id: i32) -> AppResult<Option<BorrowRecord>> {
        Ok(self.working.records.get(&id).cloned())
    }

    async fn count_active_for_member(&mut self, member_id: i32) -> AppResult<i64> {
        Ok(self
            .working
            .records
            .values()
            .filter(|r| r.member_id == member_id && !r.is_returned)
            .count() as i64)
    }

    async fn has_overdue_for_member(&mut self, member_id: i32, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self
            .working
            .records
            .values()
            .any(|r| r.member_id == member_id && r.is_overdue_at(now)))
    }

    async fn insert_record(&mut self, record: NewBorrowRecord) -> AppResult<BorrowRecord> {
        self.working.last_record_id += 1;
        let created = BorrowRecord {
            id: self.working.last_record_id,
            member_id: record.member_id,
            book_id: record.book_id,
            borrow_date: record.borrow_date,
            due_date: record.due_date,
            return_date: None,
            is_returned: false,
            fine_amount: Decimal::ZERO,
            fine_paid: false,
            notes: record.notes,
        };
        self.working.records.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_record(&mut self, record: &BorrowRecord) -> AppResult<()> {
        match self.working.records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Borrow record {} not found", record.id))),
        }
    }

    async fn record_details(&mut self, id: i32) -> AppResult<BorrowRecordDetails> {
        let record = self
            .working
            .records
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Borrow record {} not found", id)))?;
        self.working.details(record)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(&mut self) -> AppResult<()> {
        *self.guard = self.working.clone();
        Ok(())
    }
}
