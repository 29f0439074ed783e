//! PostgreSQL backend
//!
//! Locking order inside a unit of work is member row, then book row, then
//! borrow record. The copy counter is decremented with a guarded UPDATE so a
//! racing writer sees zero affected rows instead of a negative stock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres, Row, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow::{
            BorrowDetailsRow, BorrowQuery, BorrowRecord, BorrowRecordDetails, BorrowStatistics,
            NewBorrowRecord, PopularBook,
        },
        member::Member,
    },
};

use super::{BorrowLedger, CatalogStore, Database, MemberStore, UnitOfWork, POPULAR_BOOKS_LIMIT};

const DETAILS_SELECT: &str = r#"
    SELECT br.id, br.member_id, br.book_id, br.borrow_date, br.due_date, br.return_date,
           br.is_returned, br.fine_amount, br.fine_paid, br.notes,
           m.member_code, m.full_name, m.email,
           b.title, b.isbn, b.publisher, c.name AS category_name
    FROM borrow_records br
    JOIN members m ON m.id = br.member_id
    JOIN books b ON b.id = br.book_id
    LEFT JOIN categories c ON c.id = b.category_id
"#;

#[derive(Clone)]
pub struct PgDatabase {
    pool: Pool<Postgres>,
}

impl PgDatabase {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }

    async fn find_borrow(&self, id: i32) -> AppResult<Option<BorrowRecordDetails>> {
        let row = sqlx::query_as::<_, BorrowDetailsRow>(&format!("{} WHERE br.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn search_borrows(
        &self,
        query: &BorrowQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRecordDetails>> {
        let sql = format!(
            r#"{}
            WHERE ($1::int IS NULL OR br.member_id = $1)
              AND ($2::int IS NULL OR br.book_id = $2)
              AND (CASE $3::text
                       WHEN 'current' THEN NOT br.is_returned
                       WHEN 'overdue' THEN NOT br.is_returned AND br.due_date < $4
                       WHEN 'returned' THEN br.is_returned
                       ELSE TRUE
                   END)
            ORDER BY br.id
            "#,
            DETAILS_SELECT
        );

        let rows = sqlx::query_as::<_, BorrowDetailsRow>(&sql)
            .bind(query.member_id)
            .bind(query.book_id)
            .bind(query.status.map(|s| s.as_str()))
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_member(&self, id: i32) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT id, member_code, full_name, email, is_active FROM members WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn statistics(&self, now: DateTime<Utc>) -> AppResult<BorrowStatistics> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_borrows,
                   COUNT(*) FILTER (WHERE NOT is_returned) AS current_borrows,
                   COUNT(*) FILTER (WHERE NOT is_returned AND due_date < $1) AS overdue_borrows,
                   COUNT(*) FILTER (WHERE is_returned) AS returned_borrows,
                   COALESCE(SUM(fine_amount), 0) AS total_fines,
                   COALESCE(SUM(fine_amount) FILTER (WHERE fine_amount > 0 AND NOT fine_paid), 0) AS unpaid_fines
            FROM borrow_records
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let popular_books = sqlx::query_as::<_, PopularBook>(
            r#"
            SELECT b.id AS book_id, b.title, COUNT(*) AS borrow_count
            FROM borrow_records br
            JOIN books b ON b.id = br.book_id
            GROUP BY b.id, b.title
            ORDER BY borrow_count DESC, b.id
            LIMIT $1
            "#,
        )
        .bind(POPULAR_BOOKS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(BorrowStatistics {
            total_borrows: row.get("total_borrows"),
            current_borrows: row.get("current_borrows"),
            overdue_borrows: row.get("overdue_borrows"),
            returned_borrows: row.get("returned_borrows"),
            total_fines: row.get::<Decimal, _>("total_fines"),
            unpaid_fines: row.get::<Decimal, _>("unpaid_fines"),
            popular_books,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Transaction-scoped store. Rolled back by sqlx when dropped uncommitted.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Unit of work already committed".to_string()))
    }
}

#[async_trait]
impl CatalogStore for PgUnitOfWork {
    async fn find_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.id, b.isbn, b.title, b.publisher, c.name AS category_name,
                   b.total_copies, b.available_copies
            FROM books b
            LEFT JOIN categories c ON c.id = b.category_id
            WHERE b.id = $1
            FOR UPDATE OF b
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(book)
    }

    async fn decrement_available(&mut self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 AND available_copies > 0",
        )
        .bind(id)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!("Book {} is out of stock", id)));
        }
        Ok(())
    }

    async fn increment_available(&mut self, id: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE books SET available_copies = GREATEST(0, LEAST(available_copies + 1, total_copies)) WHERE id = $1",
        )
        .bind(id)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MemberStore for PgUnitOfWork {
    async fn find_member(&mut self, id: i32) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT id, member_code, full_name, email, is_active FROM members WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(member)
    }

    async fn is_active(&mut self, id: i32) -> AppResult<bool> {
        let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(active.unwrap_or(false))
    }
}

#[async_trait]
impl BorrowLedger for PgUnitOfWork {
    async fn find_record(&mut self, id: i32) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrow_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(record)
    }

    async fn count_active_for_member(&mut self, member_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE member_id = $1 AND NOT is_returned",
        )
        .bind(member_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(count)
    }

    async fn has_overdue_for_member(&mut self, member_id: i32, now: DateTime<Utc>) -> AppResult<bool> {
        let overdue: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrow_records WHERE member_id = $1 AND NOT is_returned AND due_date < $2)",
        )
        .bind(member_id)
        .bind(now)
        .fetch_one(self.conn()?)
        .await?;
        Ok(overdue)
    }

    async fn insert_record(&mut self, record: NewBorrowRecord) -> AppResult<BorrowRecord> {
        let created = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrow_records (member_id, book_id, borrow_date, due_date, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(record.member_id)
        .bind(record.book_id)
        .bind(record.borrow_date)
        .bind(record.due_date)
        .bind(&record.notes)
        .fetch_one(self.conn()?)
        .await?;
        Ok(created)
    }

    async fn update_record(&mut self, record: &BorrowRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE borrow_records
            SET due_date = $1, return_date = $2, is_returned = $3,
                fine_amount = $4, fine_paid = $5, notes = $6
            WHERE id = $7
            "#,
        )
        .bind(record.due_date)
        .bind(record.return_date)
        .bind(record.is_returned)
        .bind(record.fine_amount)
        .bind(record.fine_paid)
        .bind(&record.notes)
        .bind(record.id)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn record_details(&mut self, id: i32) -> AppResult<BorrowRecordDetails> {
        sqlx::query_as::<_, BorrowDetailsRow>(&format!("{} WHERE br.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("Borrow record {} not found", id)))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Unit of work already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}
