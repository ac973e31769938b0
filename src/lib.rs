pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod payments;
pub mod reports;
pub mod repository;
pub mod types;

// re-export key types
pub use config::{CreditPolicy, LedgerConfig, LoanLimits};
pub use decimal::{Money, Rate};
pub use errors::{ErrorKind, LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::Ledger;
pub use lifecycle::{ApprovalOutcome, LoanEdit};
pub use model::{Client, Loan, NewClient, NewLoan, NewPayment, Payment};
pub use payments::{LoanFigures, PaymentHistory, PaymentReceipt};
pub use reports::{
    ClientLoanReport, ClientLoans, ClientSection, CollectionEntry, CollectionReport, LoanTotals,
    LoanView, PortfolioSummary,
};
pub use repository::{MemoryStore, Repository, Store, StoreError, StoreResult, Transaction};
#[cfg(feature = "sqlite")]
pub use repository::SqliteStore;
pub use types::{ClientId, CreditScore, LoanId, LoanStatus, LoanTerms, PaymentId};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
