//! Settlement engine.
//!
//! Recomputes everything from the current participants and bills on every
//! call; nothing is cached between runs.
//!
//! 1. Net balances: every participant shares every bill's pool equally, owes
//!    their own items, and the payer is credited the full total.
//! 2. Debt minimization: debtors and creditors are matched greedily, largest
//!    first, until one side runs out.

use crate::bill::Bill;
use crate::money::Money;
use crate::participant::{Participant, ParticipantId};
use log::debug;
use serde::{Deserialize, Serialize};

/// A single payment instruction that reduces outstanding balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub amount: Money,
}

/// Net position of every participant, in participant order.
///
/// Positive means the participant is owed money; negative means they owe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Balances {
    entries: Vec<(ParticipantId, Money)>,
}

impl Balances {
    /// Zero balance for every participant.
    pub fn zeroed(participants: &[Participant]) -> Self {
        Balances {
            entries: participants
                .iter()
                .map(|p| (p.id.clone(), Money::ZERO))
                .collect(),
        }
    }

    pub fn get(&self, id: &ParticipantId) -> Option<Money> {
        self.entries
            .iter()
            .find(|(pid, _)| pid == id)
            .map(|(_, balance)| *balance)
    }

    fn entry_mut(&mut self, id: &ParticipantId) -> Option<&mut Money> {
        self.entries
            .iter_mut()
            .find(|(pid, _)| pid == id)
            .map(|(_, balance)| balance)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, Money)> {
        self.entries.iter().map(|(id, balance)| (id, *balance))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all balances. Zero, up to rounding, for well-formed bills.
    pub fn total(&self) -> Money {
        self.entries.iter().map(|(_, balance)| *balance).sum()
    }

    /// Returns `true` if no participant is a debtor or creditor, i.e. every
    /// balance is within [`Money::TOLERANCE`] of zero inclusive.
    pub fn is_settled(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, balance)| balance.abs() <= Money::TOLERANCE)
    }

    /// Applies a settlement plan: the payer's debt shrinks, the payee's
    /// credit shrinks. Transactions naming unknown participants are skipped.
    pub fn apply(&mut self, transactions: &[Transaction]) {
        for tx in transactions {
            if let Some(balance) = self.entry_mut(&tx.from) {
                *balance += tx.amount;
            }
            if let Some(balance) = self.entry_mut(&tx.to) {
                *balance -= tx.amount;
            }
        }
    }
}

/// How one bill lands on one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLine {
    pub participant_id: ParticipantId,

    /// Items this participant owns on the bill.
    pub items_total: Money,

    /// This participant's slice of the shared pool.
    pub shared_portion: Money,

    /// `items_total + shared_portion`.
    pub total_cost: Money,

    /// Effect on the participant's balance: `total - total_cost` for the
    /// payer, `-total_cost` for everyone else.
    pub net: Money,
}

/// Splits one bill across all participants.
pub fn bill_breakdown(bill: &Bill, participants: &[Participant]) -> Vec<ShareLine> {
    if participants.is_empty() {
        return Vec::new();
    }

    let shared_portion = bill.shared_amount.split(participants.len());

    participants
        .iter()
        .map(|p| {
            let items_total = bill.personal_items_total(&p.id);
            let total_cost = items_total + shared_portion;
            let net = if p.id == bill.payer_id {
                bill.total_amount - total_cost
            } else {
                -total_cost
            };

            ShareLine {
                participant_id: p.id.clone(),
                items_total,
                shared_portion,
                total_cost,
                net,
            }
        })
        .collect()
}

/// Computes every participant's net balance across all bills.
///
/// Each bill's shared pool is divided by the current participant count, so
/// a participant added later still splits earlier bills. An empty participant
/// list yields empty balances.
pub fn compute_balances(participants: &[Participant], bills: &[Bill]) -> Balances {
    let mut balances = Balances::zeroed(participants);

    if participants.is_empty() {
        debug!("No participants, skipping {} bills", bills.len());
        return balances;
    }

    // Breakdown lines come back in participant order, same as the entries.
    for bill in bills {
        for ((_, balance), line) in balances
            .entries
            .iter_mut()
            .zip(bill_breakdown(bill, participants))
        {
            *balance += line.net;
        }
    }

    balances
}

/// Derives payments that settle `balances`, largest debts and credits first.
///
/// Balances within [`Money::TOLERANCE`] of zero are already settled. Each
/// step fully settles at least one side, so at most
/// `debtors + creditors - 1` transactions are emitted. The result is not
/// guaranteed to be the theoretical minimum.
pub fn minimize(balances: &Balances) -> Vec<Transaction> {
    // Stable sorts keep participant order among equal balances.
    let mut debtors: Vec<(ParticipantId, Money)> = balances
        .iter()
        .filter(|(_, balance)| *balance < -Money::TOLERANCE)
        .map(|(id, balance)| (id.clone(), balance.abs()))
        .collect();
    debtors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut creditors: Vec<(ParticipantId, Money)> = balances
        .iter()
        .filter(|(_, balance)| *balance > Money::TOLERANCE)
        .map(|(id, balance)| (id.clone(), balance))
        .collect();
    creditors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut transactions = Vec::with_capacity(debtors.len() + creditors.len());
    let (mut i, mut j) = (0, 0);

    while i < debtors.len() && j < creditors.len() {
        let (debtor, debt) = &mut debtors[i];
        let (creditor, credit) = &mut creditors[j];

        let amount = (*debt).min(*credit);
        transactions.push(Transaction {
            from: debtor.clone(),
            to: creditor.clone(),
            amount,
        });

        *debt -= amount;
        *credit -= amount;

        if debt.is_negligible() {
            i += 1;
        }
        if credit.is_negligible() {
            j += 1;
        }
    }

    debug!(
        "Matched {} debtors with {} creditors in {} transactions",
        debtors.len(),
        creditors.len(),
        transactions.len()
    );

    transactions
}

/// Computes the settlement plan for the given participants and bills.
///
/// Bills must only reference listed participants. See [`compute_balances`]
/// and [`minimize`].
pub fn settle(participants: &[Participant], bills: &[Bill]) -> Vec<Transaction> {
    minimize(&compute_balances(participants, bills))
}
