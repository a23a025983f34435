//! Bill model and normalization.
//!
//! A bill's total is split in two: itemized portions owned by a single
//! participant, and the shared pool covering everything else. The shared pool
//! is derived here and never entered by hand:
//!
//! `shared_amount == max(0, total_amount - sum(items.amount))`

use crate::money::Money;
use crate::participant::{BillId, IdGenerator, ItemId, ParticipantId};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// A cost attributable to exactly one participant, carved out of a bill's
/// total before the remainder is shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillItem {
    pub id: ItemId,
    pub name: String,
    pub amount: Money,
    pub owner_id: ParticipantId,
}

/// A recorded bill.
///
/// Bills are created whole and replaced wholesale on update; nothing mutates
/// one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,

    /// Participant who paid the full total.
    pub payer_id: ParticipantId,

    pub total_amount: Money,

    pub description: String,

    /// When the expense happened. Serialized as RFC 3339.
    pub date: DateTime<Utc>,

    /// Itemized portions, in entry order.
    pub items: Vec<BillItem>,

    /// Part of the total not covered by items. Never negative.
    pub shared_amount: Money,
}

impl Bill {
    /// Sum of the items owned by `participant` on this bill.
    pub fn personal_items_total(&self, participant: &ParticipantId) -> Money {
        self.items
            .iter()
            .filter(|item| &item.owner_id == participant)
            .map(|item| item.amount)
            .sum()
    }

    /// Sum of all itemized portions.
    pub fn items_total(&self) -> Money {
        items_total(&self.items)
    }

    /// Returns `true` if `participant` paid this bill or owns one of its items.
    pub fn involves(&self, participant: &ParticipantId) -> bool {
        &self.payer_id == participant || self.items.iter().any(|i| &i.owner_id == participant)
    }
}

/// Sum of item amounts.
pub fn items_total(items: &[BillItem]) -> Money {
    items.iter().map(|item| item.amount).sum()
}

/// Derives the shared pool of a bill, flooring at zero.
///
/// Items totalling more than the bill are absorbed silently: the pool is
/// simply empty.
pub fn shared_amount(total_amount: Money, items: &[BillItem]) -> Money {
    let remainder = total_amount - items_total(items);
    if remainder.is_positive() {
        remainder
    } else {
        Money::ZERO
    }
}

/// Turns a finished draft into a complete [`Bill`].
///
/// A draft started from an existing bill keeps that bill's id (update is a
/// full replace); a fresh draft gets a new id from `ids`.
pub fn normalize<G: IdGenerator + ?Sized>(draft: BillDraft, ids: &mut G) -> Bill {
    let itemized = draft.items_total();
    let shared = shared_amount(draft.total_amount, &draft.items);
    let id = match draft.editing {
        Some(id) => id,
        None => BillId::new(ids.next_id()),
    };

    if draft.total_amount < itemized {
        debug!(
            "Bill {}: items total {} exceeds bill total {}, shared pool is empty",
            id, itemized, draft.total_amount
        );
    }

    Bill {
        id,
        payer_id: draft.payer_id,
        total_amount: draft.total_amount,
        description: draft.description,
        date: draft.date,
        items: draft.items,
        shared_amount: shared,
    }
}

/// An in-progress bill edit.
///
/// Holds everything a bill entry form collects. Start one with
/// [`BillDraft::new`] for a new bill or [`BillDraft::edit`] to replace an
/// existing bill, add or remove items, then finish with
/// [`BillDraft::into_bill`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillDraft {
    pub payer_id: ParticipantId,
    pub total_amount: Money,
    pub description: String,
    pub date: DateTime<Utc>,
    pub items: Vec<BillItem>,
    editing: Option<BillId>,
}

impl BillDraft {
    /// Starts a draft for a new bill with no items.
    pub fn new(
        payer_id: impl Into<ParticipantId>,
        total_amount: Money,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        BillDraft {
            payer_id: payer_id.into(),
            total_amount,
            description: description.into(),
            date,
            items: Vec::new(),
            editing: None,
        }
    }

    /// Starts a draft pre-populated from an existing bill.
    pub fn edit(bill: &Bill) -> Self {
        BillDraft {
            payer_id: bill.payer_id.clone(),
            total_amount: bill.total_amount,
            description: bill.description.clone(),
            date: bill.date,
            items: bill.items.clone(),
            editing: Some(bill.id.clone()),
        }
    }

    /// Turns the draft into a replacement for bill `id`.
    pub fn replacing(mut self, id: BillId) -> Self {
        self.editing = Some(id);
        self
    }

    /// Id of the bill being replaced, if any.
    pub fn editing_id(&self) -> Option<&BillId> {
        self.editing.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Appends an item with a fresh id and returns that id.
    pub fn add_item<G: IdGenerator + ?Sized>(
        &mut self,
        name: impl Into<String>,
        amount: Money,
        owner_id: impl Into<ParticipantId>,
        ids: &mut G,
    ) -> ItemId {
        let id = ItemId::new(ids.next_id());
        self.items.push(BillItem {
            id: id.clone(),
            name: name.into(),
            amount,
            owner_id: owner_id.into(),
        });
        id
    }

    /// Appends an item that already carries an id.
    pub fn push_item(&mut self, item: BillItem) {
        self.items.push(item);
    }

    /// Removes an item, returning it if it was present.
    pub fn remove_item(&mut self, item_id: &ItemId) -> Option<BillItem> {
        let idx = self.items.iter().position(|i| &i.id == item_id)?;
        Some(self.items.remove(idx))
    }

    pub fn items_total(&self) -> Money {
        items_total(&self.items)
    }

    /// Preview of the shared pool the finished bill will have.
    pub fn shared_amount(&self) -> Money {
        shared_amount(self.total_amount, &self.items)
    }

    /// Finishes the draft. See [`normalize`].
    pub fn into_bill<G: IdGenerator + ?Sized>(self, ids: &mut G) -> Bill {
        normalize(self, ids)
    }
}
