//! Error types for the ledger and CLI.
//!
//! The settlement engine itself never fails; these cover the bookkeeping
//! around it.

use crate::participant::{BillId, ParticipantId};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while maintaining a ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid ledger record
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// An id is already taken
    #[error("Duplicate id {0}")]
    DuplicateId(String),

    /// Participant id not present in the ledger
    #[error("Unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    /// Bill id not present in the ledger
    #[error("Unknown bill {0}")]
    UnknownBill(BillId),

    /// Participant is payer or item owner on at least one bill
    #[error("Cannot remove participant {0} who is part of existing bills")]
    ParticipantInUse(ParticipantId),

    /// Bill failed validation
    #[error("Invalid bill: {0}")]
    InvalidBill(String),

    /// Participant name is empty after trimming
    #[error("Participant name must not be blank")]
    BlankName,

    /// Missing input file argument
    #[error("Missing input file argument. Usage: fair-share <ledger.csv> [--balances]")]
    MissingArgument,
}
