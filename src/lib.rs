//! # Fair Share
//!
//! Tracks bills shared by a small group and works out who owes whom.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: Money kept at 4 decimal places via `rust_decimal`
//! - **Pure core**: Bill normalization and settlement are side-effect free
//! - **Full recompute**: Balances are derived from all bills on every call
//! - **Deterministic output**: Stable ordering of settlement transactions
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use fair_share::{BillDraft, Ledger, Money};
//!
//! let mut ledger = Ledger::new();
//! let alice = ledger.add_participant("Alice").unwrap();
//! let bob = ledger.add_participant("Bob").unwrap();
//!
//! let draft = BillDraft::new(alice.clone(), Money::from_units(20), "Lunch", Utc::now());
//! ledger.add_bill(draft).unwrap();
//!
//! let plan = ledger.settle();
//! assert_eq!(plan.len(), 1);
//! assert_eq!(plan[0].from, bob);
//! assert_eq!(plan[0].to, alice);
//! assert_eq!(plan[0].amount, Money::from_units(10));
//! ```

pub mod bill;
pub mod error;
pub mod ledger;
pub mod money;
pub mod participant;
pub mod record;
pub mod settlement;

pub use bill::{normalize, Bill, BillDraft, BillItem};
pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use money::Money;
pub use participant::{BillId, IdGenerator, ItemId, Participant, ParticipantId, UuidGenerator};
pub use record::{LedgerEntry, LedgerRecord};
pub use settlement::{
    bill_breakdown, compute_balances, minimize, settle, Balances, ShareLine, Transaction,
};
