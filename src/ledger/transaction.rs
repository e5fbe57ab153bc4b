//! The transaction log: one entry per financial event

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::account::types::UserId;
use crate::error::LedgerError;
use crate::storage::Storage;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
    Investment,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
}

/// Admin decision on a pending transaction
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Reject,
}

/// One financial event. `user_name` is a denormalized snapshot taken at
/// creation time and may drift from the account's current name.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Transaction {
    pub id: String,
    pub user_id: UserId,
    pub user_name: String,
    pub kind: TransactionKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub method: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: &str,
        user_name: &str,
        kind: TransactionKind,
        amount: Decimal,
        method: String,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: format!("tx-{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            kind,
            amount,
            method,
            status,
            created_at: Utc::now(),
        }
    }
}

/// Append-only log of transactions. Entries are never deleted; the only
/// state transition is a single Pending -> Approved/Rejected resolution.
pub struct TransactionLog {
    entries: Vec<Transaction>,
    storage: Option<Arc<Storage>>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            storage: None,
        }
    }

    /// Create with storage backend, loading any persisted entries
    pub fn with_storage(storage: Arc<Storage>) -> Result<Self, LedgerError> {
        let mut entries = storage.load_transactions()?;
        entries.sort_by_key(|t| t.created_at);
        Ok(Self {
            entries,
            storage: Some(storage),
        })
    }

    /// Append a PENDING entry (deposit/withdrawal request paths)
    pub fn create_pending(
        &mut self,
        user_id: &str,
        user_name: &str,
        kind: TransactionKind,
        amount: Decimal,
        method: String,
    ) -> Result<Transaction, LedgerError> {
        self.append(user_id, user_name, kind, amount, method, TransactionStatus::Pending)
    }

    /// Append an entry that is APPROVED on creation (transfer/investment
    /// paths, which settle instantly and never pass through PENDING)
    pub fn create_instant(
        &mut self,
        user_id: &str,
        user_name: &str,
        kind: TransactionKind,
        amount: Decimal,
        method: String,
    ) -> Result<Transaction, LedgerError> {
        self.append(user_id, user_name, kind, amount, method, TransactionStatus::Approved)
    }

    fn append(
        &mut self,
        user_id: &str,
        user_name: &str,
        kind: TransactionKind,
        amount: Decimal,
        method: String,
        status: TransactionStatus,
    ) -> Result<Transaction, LedgerError> {
        let tx = Transaction::new(user_id, user_name, kind, amount, method, status);
        self.persist(&tx)?;
        self.entries.push(tx.clone());
        Ok(tx)
    }

    /// Add an entry whose row has already been written by the caller
    pub(crate) fn commit(&mut self, tx: Transaction) {
        self.entries.push(tx);
    }

    /// Record a resolution whose row has already been written by the caller
    pub(crate) fn commit_resolution(&mut self, resolved: &Transaction) -> Result<(), LedgerError> {
        let tx = self
            .entries
            .iter_mut()
            .find(|t| t.id == resolved.id)
            .ok_or(LedgerError::TransactionNotFound)?;
        tx.status = resolved.status;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.entries.iter().find(|t| t.id == id)
    }

    /// All entries still awaiting an admin decision
    pub fn list_pending(&self) -> Vec<Transaction> {
        self.entries
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .cloned()
            .collect()
    }

    /// A user's history, newest first
    pub fn list_for_user(&self, user_id: &str) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .entries
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Apply the one allowed state transition, exactly once.
    ///
    /// A second resolution attempt fails with `AlreadyResolved` so an
    /// approval can never credit an account twice. The row is written before
    /// the in-memory entry flips, so a failed write leaves the entry PENDING.
    pub fn resolve(&mut self, id: &str, decision: Decision) -> Result<Transaction, LedgerError> {
        let pos = self
            .entries
            .iter()
            .position(|t| t.id == id)
            .ok_or(LedgerError::TransactionNotFound)?;

        if self.entries[pos].status != TransactionStatus::Pending {
            return Err(LedgerError::AlreadyResolved);
        }

        let mut resolved = self.entries[pos].clone();
        resolved.status = match decision {
            Decision::Approve => TransactionStatus::Approved,
            Decision::Reject => TransactionStatus::Rejected,
        };

        self.persist(&resolved)?;
        self.entries[pos] = resolved.clone();
        Ok(resolved)
    }

    fn persist(&self, tx: &Transaction) -> Result<(), LedgerError> {
        if let Some(storage) = &self.storage {
            storage.save_transaction(tx)?;
        }
        Ok(())
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}
