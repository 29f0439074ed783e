//! Business logic services

pub mod borrows;
pub mod clock;
pub mod fines;

use std::sync::Arc;

use crate::{config::LoansConfig, repository::Database};

use self::clock::{Clock, SystemClock};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub borrows: borrows::BorrowService,
}

impl Services {
    /// Create all services on top of the given store, using the wall clock
    pub fn new(database: Arc<dyn Database>, loans_config: LoansConfig) -> Self {
        Self::with_clock(database, loans_config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        database: Arc<dyn Database>,
        loans_config: LoansConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            borrows: borrows::BorrowService::new(database, loans_config, clock),
        }
    }
}
