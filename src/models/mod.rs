//! Data models for circulation

pub mod book;
pub mod borrow;
pub mod member;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use borrow::{BorrowRecord, BorrowRecordDetails, BorrowState};
pub use member::{Member, MemberShort};
pub use user::{Role, UserClaims};
