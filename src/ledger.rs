//! The ledger: canonical participant and bill lists.
//!
//! Owns the data the settlement engine reads and guards its referential
//! integrity. Every bill's payer and item owners exist among the
//! participants, and a participant referenced by a bill cannot be removed.
//! Settlement is recomputed from scratch on every request.

use crate::bill::{Bill, BillDraft, BillItem};
use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::participant::{BillId, IdGenerator, Participant, ParticipantId, UuidGenerator};
use crate::record::{LedgerEntry, LedgerRecord};
use crate::settlement::{self, Balances, Transaction};
use chrono::Utc;
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::io::{Read, Write};

/// Shared-expense ledger for one group.
///
/// # Bill Ordering
///
/// Bills are kept most recent first: each added bill goes to the front.
/// Balances do not depend on this order.
pub struct Ledger {
    participants: Vec<Participant>,
    bills: Vec<Bill>,
    ids: Box<dyn IdGenerator>,
}

impl Ledger {
    /// Creates an empty ledger that assigns UUID v4 ids.
    pub fn new() -> Self {
        Self::with_id_generator(UuidGenerator)
    }

    /// Creates an empty ledger with a caller-supplied id source.
    pub fn with_id_generator(ids: impl IdGenerator + 'static) -> Self {
        Ledger {
            participants: Vec::new(),
            bills: Vec::new(),
            ids: Box::new(ids),
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// All bills, most recent first.
    pub fn bills(&self) -> &[Bill] {
        &self.bills
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn bill(&self, id: &BillId) -> Option<&Bill> {
        self.bills.iter().find(|b| &b.id == id)
    }

    /// Adds a participant under a fresh id. The name is trimmed.
    pub fn add_participant(&mut self, name: &str) -> Result<ParticipantId> {
        let id = ParticipantId::new(self.ids.next_id());
        self.insert_participant(Participant::new(id.clone(), name))?;
        Ok(id)
    }

    /// Adds a participant that already carries an id.
    pub fn insert_participant(&mut self, participant: Participant) -> Result<()> {
        let name = participant.name.trim();
        if name.is_empty() {
            return Err(LedgerError::BlankName);
        }
        if self.participant(&participant.id).is_some() {
            return Err(LedgerError::DuplicateId(participant.id.to_string()));
        }

        debug!("Added participant {} ({})", participant.id, name);
        self.participants.push(Participant {
            id: participant.id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Removes a participant who is not referenced by any bill.
    ///
    /// Fails with [`LedgerError::ParticipantInUse`] if they paid a bill or own
    /// an item; the ledger is left untouched.
    pub fn remove_participant(&mut self, id: &ParticipantId) -> Result<Participant> {
        let idx = self
            .participants
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| LedgerError::UnknownParticipant(id.clone()))?;

        if self.bills.iter().any(|b| b.involves(id)) {
            warn!("Refusing to remove participant {} referenced by bills", id);
            return Err(LedgerError::ParticipantInUse(id.clone()));
        }

        Ok(self.participants.remove(idx))
    }

    /// Saves a draft: new drafts are added, edit drafts replace their bill.
    pub fn submit(&mut self, draft: BillDraft) -> Result<BillId> {
        match draft.editing_id().cloned() {
            Some(id) => {
                self.update_bill(&id, draft)?;
                Ok(id)
            }
            None => self.add_bill(draft),
        }
    }

    /// Validates and normalizes a new bill, returning its id.
    pub fn add_bill(&mut self, draft: BillDraft) -> Result<BillId> {
        if let Some(id) = draft.editing_id() {
            return Err(LedgerError::InvalidBill(format!(
                "draft edits existing bill {}, use update",
                id
            )));
        }
        self.validate(&draft)?;

        let bill = draft.into_bill(self.ids.as_mut());
        let id = bill.id.clone();
        debug!(
            "Added bill {} paid by {}: total {}, shared {}",
            bill.id, bill.payer_id, bill.total_amount, bill.shared_amount
        );
        self.bills.insert(0, bill);
        Ok(id)
    }

    /// Adds a bill that already carries an id, re-deriving its shared pool.
    pub fn insert_bill(&mut self, bill: Bill) -> Result<()> {
        if self.bill(&bill.id).is_some() {
            return Err(LedgerError::DuplicateId(bill.id.to_string()));
        }
        let draft = BillDraft::edit(&bill);
        self.validate(&draft)?;

        self.bills.insert(0, draft.into_bill(self.ids.as_mut()));
        Ok(())
    }

    /// Replaces bill `id` wholesale with the contents of `draft`.
    pub fn update_bill(&mut self, id: &BillId, draft: BillDraft) -> Result<()> {
        let idx = self
            .bills
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| LedgerError::UnknownBill(id.clone()))?;
        self.validate(&draft)?;

        let bill = draft.replacing(id.clone()).into_bill(self.ids.as_mut());
        debug!("Updated bill {}: total {}", bill.id, bill.total_amount);
        self.bills[idx] = bill;
        Ok(())
    }

    pub fn remove_bill(&mut self, id: &BillId) -> Result<Bill> {
        let idx = self
            .bills
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| LedgerError::UnknownBill(id.clone()))?;
        Ok(self.bills.remove(idx))
    }

    /// Attaches an item to an existing bill and re-normalizes it.
    pub fn add_item(&mut self, bill_id: &BillId, item: BillItem) -> Result<()> {
        let bill = self
            .bill(bill_id)
            .ok_or_else(|| LedgerError::UnknownBill(bill_id.clone()))?;
        if bill.items.iter().any(|i| i.id == item.id) {
            return Err(LedgerError::DuplicateId(item.id.to_string()));
        }

        let mut draft = BillDraft::edit(bill);
        draft.push_item(item);
        self.update_bill(bill_id, draft)
    }

    /// Checks a draft against the current participants.
    fn validate(&self, draft: &BillDraft) -> Result<()> {
        if self.participant(&draft.payer_id).is_none() {
            return Err(LedgerError::UnknownParticipant(draft.payer_id.clone()));
        }
        if !draft.total_amount.is_positive() {
            return Err(LedgerError::InvalidBill(format!(
                "total {} must be positive",
                draft.total_amount
            )));
        }
        if draft.description.trim().is_empty() {
            return Err(LedgerError::InvalidBill(
                "description must not be blank".to_string(),
            ));
        }

        for item in &draft.items {
            if self.participant(&item.owner_id).is_none() {
                return Err(LedgerError::UnknownParticipant(item.owner_id.clone()));
            }
            if !item.amount.is_positive() {
                return Err(LedgerError::InvalidBill(format!(
                    "item {} amount {} must be positive",
                    item.id, item.amount
                )));
            }
            if item.name.trim().is_empty() {
                return Err(LedgerError::InvalidBill(format!(
                    "item {} name must not be blank",
                    item.id
                )));
            }
        }

        Ok(())
    }

    /// Net balance of every participant.
    pub fn balances(&self) -> Balances {
        settlement::compute_balances(&self.participants, &self.bills)
    }

    /// Current settlement plan.
    pub fn settle(&self) -> Vec<Transaction> {
        settlement::settle(&self.participants, &self.bills)
    }

    /// Reads ledger records from CSV in streaming fashion.
    ///
    /// Invalid rows, and rows the ledger rejects, are logged at warn level
    /// and skipped.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<LedgerRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => {
                    if let Some(entry) = record.parse() {
                        if let Err(e) = self.apply_entry(entry, row_num) {
                            warn!("Row {}: {}", row_num, e);
                        }
                    } else {
                        let err = LedgerError::InvalidRecord {
                            row: row_num,
                            message: format!("cannot parse {:?} row {:?}", record.kind, record.id),
                        };
                        warn!("{}", err);
                    }
                }
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                }
            }
        }

        Ok(())
    }

    /// Applies a single parsed ledger entry.
    fn apply_entry(&mut self, entry: LedgerEntry, row: usize) -> Result<()> {
        match entry {
            LedgerEntry::Participant { id, name } => {
                self.insert_participant(Participant::new(id, name))?;
            }
            LedgerEntry::Bill {
                id,
                payer_id,
                total_amount,
                description,
                date,
            } => {
                let date = date.unwrap_or_else(|| {
                    debug!("Row {}: Bill {} has no date, using now", row, id);
                    Utc::now()
                });
                let bill = BillDraft::new(payer_id, total_amount, description, date)
                    .replacing(id)
                    .into_bill(self.ids.as_mut());
                self.insert_bill(bill)?;
            }
            LedgerEntry::Item {
                id,
                bill_id,
                owner_id,
                name,
                amount,
            } => {
                self.add_item(
                    &bill_id,
                    BillItem {
                        id,
                        name,
                        amount,
                        owner_id,
                    },
                )?;
            }
        }

        Ok(())
    }

    /// Writes the settlement plan as CSV:
    /// `from,from_name,to,to_name,amount`.
    ///
    /// Amounts are formatted with 2 decimal places.
    pub fn write_settlement<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["from", "from_name", "to", "to_name", "amount"])?;
        for tx in self.settle() {
            let amount = tx.amount.to_string();
            csv_writer.write_record([
                tx.from.as_str(),
                self.name_of(&tx.from),
                tx.to.as_str(),
                self.name_of(&tx.to),
                amount.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes net balances as CSV: `participant,name,balance`, in
    /// participant order.
    pub fn write_balances<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["participant", "name", "balance"])?;
        for (id, balance) in self.balances().iter() {
            let shown = display_balance(balance);
            csv_writer.write_record([id.as_str(), self.name_of(id), shown.as_str()])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn name_of(&self, id: &ParticipantId) -> &str {
        self.participant(id).map(|p| p.name.as_str()).unwrap_or("")
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a balance, folding sub-cent residue into zero.
fn display_balance(balance: Money) -> String {
    if balance.is_negligible() {
        Money::ZERO.to_string()
    } else {
        balance.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::test_support::SequentialIds;
    use chrono::{DateTime, TimeZone};
    use std::io::Cursor;
    use std::str::FromStr;

    fn m(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn ledger_with(names: &[&str]) -> (Ledger, Vec<ParticipantId>) {
        let mut ledger = Ledger::with_id_generator(SequentialIds::new("id"));
        let ids = names
            .iter()
            .map(|n| ledger.add_participant(n).unwrap())
            .collect();
        (ledger, ids)
    }

    fn process_csv_str(csv: &str) -> Ledger {
        let mut ledger = Ledger::with_id_generator(SequentialIds::new("gen"));
        ledger.process_csv(Cursor::new(csv)).unwrap();
        ledger
    }

    #[test]
    fn test_add_participant_trims_and_rejects_blank() {
        let (mut ledger, _) = ledger_with(&[]);
        let id = ledger.add_participant("  Alice ").unwrap();

        assert_eq!(ledger.participant(&id).unwrap().name, "Alice");
        assert!(matches!(
            ledger.add_participant("   "),
            Err(LedgerError::BlankName)
        ));
        assert_eq!(ledger.participants().len(), 1);
    }

    #[test]
    fn test_insert_participant_rejects_duplicate_id() {
        let (mut ledger, _) = ledger_with(&[]);
        ledger
            .insert_participant(Participant::new("alice", "Alice"))
            .unwrap();

        assert!(matches!(
            ledger.insert_participant(Participant::new("alice", "Alicia")),
            Err(LedgerError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_remove_unreferenced_participant() {
        let (mut ledger, ids) = ledger_with(&["Alice", "Bob"]);
        let removed = ledger.remove_participant(&ids[1]).unwrap();

        assert_eq!(removed.name, "Bob");
        assert_eq!(ledger.participants().len(), 1);
    }

    #[test]
    fn test_remove_payer_is_refused() {
        let (mut ledger, ids) = ledger_with(&["Alice", "Bob"]);
        ledger
            .add_bill(BillDraft::new(ids[0].clone(), m("20"), "Lunch", date()))
            .unwrap();

        assert!(matches!(
            ledger.remove_participant(&ids[0]),
            Err(LedgerError::ParticipantInUse(_))
        ));
        assert_eq!(ledger.participants().len(), 2);
    }

    #[test]
    fn test_remove_item_owner_is_refused() {
        let (mut ledger, ids) = ledger_with(&["Alice", "Bob", "Carol"]);
        let mut item_ids = SequentialIds::new("item");
        let mut draft = BillDraft::new(ids[0].clone(), m("30"), "Books", date());
        draft.add_item("Book", m("10"), ids[2].clone(), &mut item_ids);
        ledger.add_bill(draft).unwrap();

        assert!(matches!(
            ledger.remove_participant(&ids[2]),
            Err(LedgerError::ParticipantInUse(_))
        ));
        assert!(ledger.remove_participant(&ids[1]).is_ok());
    }

    #[test]
    fn test_remove_unknown_participant() {
        let (mut ledger, _) = ledger_with(&["Alice"]);
        assert!(matches!(
            ledger.remove_participant(&ParticipantId::new("ghost")),
            Err(LedgerError::UnknownParticipant(_))
        ));
    }

    #[test]
    fn test_add_bill_validates_references() {
        let (mut ledger, ids) = ledger_with(&["Alice"]);

        let unknown_payer = BillDraft::new("ghost", m("20"), "Lunch", date());
        assert!(matches!(
            ledger.add_bill(unknown_payer),
            Err(LedgerError::UnknownParticipant(_))
        ));

        let mut item_ids = SequentialIds::new("item");
        let mut unknown_owner = BillDraft::new(ids[0].clone(), m("20"), "Lunch", date());
        unknown_owner.add_item("Soup", m("5"), "ghost", &mut item_ids);
        assert!(matches!(
            ledger.add_bill(unknown_owner),
            Err(LedgerError::UnknownParticipant(_))
        ));

        assert!(ledger.bills().is_empty());
    }

    #[test]
    fn test_add_bill_validates_amounts_and_description() {
        let (mut ledger, ids) = ledger_with(&["Alice"]);
        let alice = ids[0].clone();

        assert!(matches!(
            ledger.add_bill(BillDraft::new(alice.clone(), Money::ZERO, "Lunch", date())),
            Err(LedgerError::InvalidBill(_))
        ));
        assert!(matches!(
            ledger.add_bill(BillDraft::new(alice.clone(), m("10"), "  ", date())),
            Err(LedgerError::InvalidBill(_))
        ));

        let mut item_ids = SequentialIds::new("item");
        let mut draft = BillDraft::new(alice.clone(), m("10"), "Lunch", date());
        draft.add_item("Refund", m("-2"), alice, &mut item_ids);
        assert!(matches!(
            ledger.add_bill(draft),
            Err(LedgerError::InvalidBill(_))
        ));
    }

    #[test]
    fn test_bills_newest_first() {
        let (mut ledger, ids) = ledger_with(&["Alice", "Bob"]);
        let first = ledger
            .add_bill(BillDraft::new(ids[0].clone(), m("10"), "First", date()))
            .unwrap();
        let second = ledger
            .add_bill(BillDraft::new(ids[1].clone(), m("10"), "Second", date()))
            .unwrap();

        assert_eq!(ledger.bills()[0].id, second);
        assert_eq!(ledger.bills()[1].id, first);
    }

    #[test]
    fn test_update_bill_replaces_wholesale() {
        let (mut ledger, ids) = ledger_with(&["Alice", "Bob"]);
        let bill_id = ledger
            .add_bill(BillDraft::new(ids[0].clone(), m("20"), "Lunch", date()))
            .unwrap();
        assert_eq!(ledger.settle()[0].amount, m("10"));

        let mut draft = BillDraft::edit(ledger.bill(&bill_id).unwrap());
        draft.payer_id = ids[1].clone();
        draft.total_amount = m("50");
        assert_eq!(ledger.submit(draft).unwrap(), bill_id);

        let bill = ledger.bill(&bill_id).unwrap();
        assert_eq!(bill.payer_id, ids[1]);
        assert_eq!(bill.shared_amount, m("50"));
        assert_eq!(ledger.bills().len(), 1);

        let plan = ledger.settle();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].from, ids[0]);
        assert_eq!(plan[0].to, ids[1]);
        assert_eq!(plan[0].amount, m("25"));
    }

    #[test]
    fn test_update_unknown_bill() {
        let (mut ledger, ids) = ledger_with(&["Alice"]);
        let draft = BillDraft::new(ids[0].clone(), m("20"), "Lunch", date());
        assert!(matches!(
            ledger.update_bill(&BillId::new("nope"), draft),
            Err(LedgerError::UnknownBill(_))
        ));
    }

    #[test]
    fn test_add_bill_rejects_edit_draft() {
        let (mut ledger, ids) = ledger_with(&["Alice"]);
        let bill_id = ledger
            .add_bill(BillDraft::new(ids[0].clone(), m("20"), "Lunch", date()))
            .unwrap();

        let draft = BillDraft::edit(ledger.bill(&bill_id).unwrap());
        assert!(matches!(
            ledger.add_bill(draft),
            Err(LedgerError::InvalidBill(_))
        ));
    }

    #[test]
    fn test_remove_bill_frees_participant() {
        let (mut ledger, ids) = ledger_with(&["Alice", "Bob"]);
        let bill_id = ledger
            .add_bill(BillDraft::new(ids[0].clone(), m("20"), "Lunch", date()))
            .unwrap();

        assert!(ledger.remove_participant(&ids[0]).is_err());
        ledger.remove_bill(&bill_id).unwrap();
        assert!(ledger.remove_participant(&ids[0]).is_ok());
        assert!(matches!(
            ledger.remove_bill(&bill_id),
            Err(LedgerError::UnknownBill(_))
        ));
    }

    #[test]
    fn test_csv_participants_bills_and_items() {
        let csv = r#"type,id,name,person,bill,amount,date
participant,alice,Alice,,,,
participant,bob,Bob,,,,
bill,b1,Books,alice,,30.00,2024-05-01
item,i1,Book,bob,b1,10.00,"#;

        let ledger = process_csv_str(csv);
        let bill = ledger.bill(&BillId::new("b1")).unwrap();
        assert_eq!(bill.items.len(), 1);
        assert_eq!(bill.shared_amount, m("20"));

        let plan = ledger.settle();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].from.as_str(), "bob");
        assert_eq!(plan[0].to.as_str(), "alice");
        assert_eq!(plan[0].amount, m("20"));
    }

    #[test]
    fn test_csv_skips_invalid_rows() {
        let csv = r#"type,id,name,person,bill,amount,date
participant,alice,Alice,,,,
participant,bob,Bob,,,,
bill,b1,Lunch,ghost,,30.00,2024-05-01
bill,b2,Dinner,alice,,abc,2024-05-01
item,i1,Wine,bob,missing,5.00,
refund,r1,Oops,alice,,5.00,
bill,b3,Taxi,alice,,20.00,2024-05-02"#;

        let ledger = process_csv_str(csv);
        assert_eq!(ledger.bills().len(), 1);
        assert_eq!(ledger.bills()[0].id.as_str(), "b3");
        assert_eq!(ledger.settle()[0].amount, m("10"));
    }

    #[test]
    fn test_csv_item_keeps_bill_id_and_date() {
        let csv = r#"type,id,name,person,bill,amount,date
participant,alice,Alice,,,,
bill,b1,Market,alice,,12.00,2024-05-03T10:00:00Z
item,i1,Bread,alice,b1,2.00,
item,i1,Bread again,alice,b1,2.00,"#;

        let ledger = process_csv_str(csv);
        let bill = ledger.bill(&BillId::new("b1")).unwrap();
        assert_eq!(bill.items.len(), 1);
        assert_eq!(bill.date.to_rfc3339(), "2024-05-03T10:00:00+00:00");
        assert_eq!(bill.shared_amount, m("10"));
    }

    #[test]
    fn test_write_settlement_format() {
        let csv = r#"type,id,name,person,bill,amount,date
participant,alice,Alice,,,,
participant,bob,Bob,,,,
bill,b1,Lunch,alice,,20,2024-05-01"#;

        let ledger = process_csv_str(csv);
        let mut output = Vec::new();
        ledger.write_settlement(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(
            output_str,
            "from,from_name,to,to_name,amount\nbob,Bob,alice,Alice,10.00\n"
        );
    }

    #[test]
    fn test_write_settlement_resolves_renamed_participants() {
        let mut ledger = Ledger::with_id_generator(SequentialIds::new("p"));
        let host = ledger.add_participant("  Zoë Host ").unwrap();
        let guest = ledger.add_participant("Guest, Jr.").unwrap();
        ledger
            .add_bill(BillDraft::new(host, m("50"), "Cabin", date()))
            .unwrap();
        assert_eq!(guest.as_str(), "p-2");

        let mut output = Vec::new();
        ledger.write_settlement(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(
            output_str,
            "from,from_name,to,to_name,amount\np-2,\"Guest, Jr.\",p-1,Zoë Host,25.00\n"
        );
    }

    #[test]
    fn test_write_balances_format() {
        let csv = r#"type,id,name,person,bill,amount,date
participant,alice,Alice,,,,
participant,bob,Bob,,,,
participant,carol,Carol,,,,
bill,b1,Cake,alice,,10,2024-05-01"#;

        let ledger = process_csv_str(csv);
        let mut output = Vec::new();
        ledger.write_balances(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(
            output_str,
            "participant,name,balance\nalice,Alice,6.67\nbob,Bob,-3.33\ncarol,Carol,-3.33\n"
        );
    }
}
