//! Row-level persistence on top of sled.
//!
//! Every record is written individually (`user:<id>`, `tx:<id>`) so a
//! mutation only touches the rows it changed; there is no whole-table
//! overwrite. A schema version key is checked on open.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::account::types::User;
use crate::ledger::transaction::Transaction;

const SCHEMA_VERSION: u32 = 1;
const SCHEMA_KEY: &str = "meta:schema_version";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Codec(String),
    #[error("unsupported schema version: {0}")]
    SchemaVersion(u32),
}

pub struct Storage {
    db: sled::Db,
}

impl Storage {
    /// Open (or create) a database at the given path
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let storage = Storage { db };
        storage.check_schema()?;
        Ok(storage)
    }

    /// In-memory database, dropped on close. Used by tests and `serve`
    /// without a `--db` path.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        let storage = Storage { db };
        storage.check_schema()?;
        Ok(storage)
    }

    fn check_schema(&self) -> Result<(), StorageError> {
        match self.get::<u32>(SCHEMA_KEY)? {
            None => self.put(SCHEMA_KEY, &SCHEMA_VERSION),
            Some(v) if v == SCHEMA_VERSION => Ok(()),
            Some(v) => Err(StorageError::SchemaVersion(v)),
        }
    }

    // Generic helper: put
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let serialized = bincode::serialize(value).map_err(|e| StorageError::Codec(e.to_string()))?;
        self.db.insert(key.as_bytes(), serialized)?;
        Ok(())
    }

    // Generic helper: get
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.db.get(key.as_bytes())? {
            Some(data) => {
                let deserialized =
                    bincode::deserialize(&data).map_err(|e| StorageError::Codec(e.to_string()))?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    fn load_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StorageError> {
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, data) = entry?;
            let value =
                bincode::deserialize(&data).map_err(|e| StorageError::Codec(e.to_string()))?;
            out.push(value);
        }
        Ok(out)
    }

    // --- Specific accessors ---

    pub fn save_user(&self, user: &User) -> Result<(), StorageError> {
        self.put(&format!("user:{}", user.id), user)
    }

    pub fn load_users(&self) -> Result<Vec<User>, StorageError> {
        self.load_prefix("user:")
    }

    pub fn save_transaction(&self, tx: &Transaction) -> Result<(), StorageError> {
        self.put(&format!("tx:{}", tx.id), tx)
    }

    /// Write a user row and a transaction row in one atomic batch; either
    /// both land or neither does.
    pub fn save_user_and_transaction(
        &self,
        user: &User,
        tx: &Transaction,
    ) -> Result<(), StorageError> {
        let user_bytes =
            bincode::serialize(user).map_err(|e| StorageError::Codec(e.to_string()))?;
        let tx_bytes = bincode::serialize(tx).map_err(|e| StorageError::Codec(e.to_string()))?;

        let mut batch = sled::Batch::default();
        batch.insert(format!("user:{}", user.id).into_bytes(), user_bytes);
        batch.insert(format!("tx:{}", tx.id).into_bytes(), tx_bytes);
        self.db.apply_batch(batch)?;
        Ok(())
    }

    pub fn load_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        self.load_prefix("tx:")
    }

    /// Flush buffered writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::{TransactionKind, TransactionStatus};
    use rust_decimal::Decimal;

    #[test]
    fn test_saved_transaction_rows_load_back() {
        let storage = Storage::temporary().unwrap();
        let tx = Transaction::new(
            "user-1",
            "Alice",
            TransactionKind::Deposit,
            Decimal::new(125050, 2),
            "USDT (TRC20)".to_string(),
            TransactionStatus::Pending,
        );
        storage.save_transaction(&tx).unwrap();

        let loaded = storage.load_transactions().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, tx.id);
        assert_eq!(loaded[0].amount, Decimal::new(125050, 2));
        assert_eq!(loaded[0].status, TransactionStatus::Pending);
    }

    #[test]
    fn test_put_get_roundtrip() {
        let storage = Storage::temporary().unwrap();
        storage.put("k", &42u64).unwrap();
        assert_eq!(storage.get::<u64>("k").unwrap(), Some(42));
        assert_eq!(storage.get::<u64>("missing").unwrap(), None);
    }

    #[test]
    fn test_schema_version_written_on_create() {
        let storage = Storage::temporary().unwrap();
        assert_eq!(
            storage.get::<u32>(SCHEMA_KEY).unwrap(),
            Some(SCHEMA_VERSION)
        );
    }
}
