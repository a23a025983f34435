//! Ledger records for CSV parsing and their typed representation.
//!
//! One CSV file carries participants, bills and bill items; the `type` column
//! selects which columns are meaningful:
//!
//! ```text
//! type,id,name,person,bill,amount,date
//! participant,alice,Alice,,,,
//! bill,b1,Dinner,alice,,30.00,2024-05-01
//! item,i1,Book,bob,b1,10.00,
//! ```

use crate::money::Money;
use crate::participant::{BillId, ItemId, ParticipantId};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::str::FromStr;

/// Raw ledger record as read from CSV.
///
/// Every column but `type` and `id` is optional at this stage; [`parse`]
/// decides what each kind of row requires.
///
/// [`parse`]: LedgerRecord::parse
#[derive(Debug, Default, Deserialize)]
pub struct LedgerRecord {
    /// Row kind: participant, bill, item
    #[serde(rename = "type")]
    pub kind: String,

    pub id: String,

    /// Participant name, bill description or item name
    pub name: Option<String>,

    /// Bill payer or item owner
    pub person: Option<String>,

    /// Bill an item belongs to
    pub bill: Option<String>,

    /// Bill total or item amount
    pub amount: Option<String>,

    /// Bill date, `YYYY-MM-DD` or RFC 3339
    pub date: Option<String>,
}

impl LedgerRecord {
    /// Parses the raw CSV record into a typed entry.
    ///
    /// Returns `None` if the record is invalid (unknown type, missing or
    /// malformed required field).
    pub fn parse(&self) -> Option<LedgerEntry> {
        let id = non_empty(Some(&self.id))?;

        match self.kind.trim().to_lowercase().as_str() {
            "participant" => Some(LedgerEntry::Participant {
                id: ParticipantId::new(id),
                name: non_empty(self.name.as_ref())?.to_string(),
            }),
            "bill" => {
                let date = match non_empty(self.date.as_ref()) {
                    Some(raw) => Some(parse_date(raw)?),
                    None => None,
                };
                Some(LedgerEntry::Bill {
                    id: BillId::new(id),
                    payer_id: ParticipantId::new(non_empty(self.person.as_ref())?),
                    total_amount: self.parse_amount()?,
                    description: non_empty(self.name.as_ref())?.to_string(),
                    date,
                })
            }
            "item" => Some(LedgerEntry::Item {
                id: ItemId::new(id),
                bill_id: BillId::new(non_empty(self.bill.as_ref())?),
                owner_id: ParticipantId::new(non_empty(self.person.as_ref())?),
                name: non_empty(self.name.as_ref())?.to_string(),
                amount: self.parse_amount()?,
            }),
            _ => None,
        }
    }

    /// Parses the amount field into `Money`.
    fn parse_amount(&self) -> Option<Money> {
        Money::from_str(non_empty(self.amount.as_ref())?).ok()
    }
}

fn non_empty(field: Option<&String>) -> Option<&str> {
    let trimmed = field?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Parses a calendar date (taken as midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

/// A parsed ledger row ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// Adds a participant.
    Participant { id: ParticipantId, name: String },

    /// Adds a bill with no items yet.
    Bill {
        id: BillId,
        payer_id: ParticipantId,
        total_amount: Money,
        description: String,
        /// Defaults to the time of ingestion when absent.
        date: Option<DateTime<Utc>>,
    },

    /// Attaches an item to a previously added bill.
    Item {
        id: ItemId,
        bill_id: BillId,
        owner_id: ParticipantId,
        name: String,
        amount: Money,
    },
}
