//! Account storage and management

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::hash_password;
use super::types::{
    AccountStatus, KycDossier, KycStatus, Nft, Role, User, UserId,
};
use crate::error::LedgerError;
use crate::storage::Storage;

/// Account store for all user records.
///
/// A plain in-memory table with optional row-level persistence; callers own
/// the locking. Never a process-wide singleton, so tests construct isolated
/// instances.
pub struct AccountStore {
    users: HashMap<UserId, User>,
    storage: Option<Arc<Storage>>,
}

impl AccountStore {
    /// Create a new empty account store
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            storage: None,
        }
    }

    /// Create with storage backend, loading any persisted users
    pub fn with_storage(storage: Arc<Storage>) -> Result<Self, LedgerError> {
        let users = storage
            .load_users()?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        Ok(Self {
            users,
            storage: Some(storage),
        })
    }

    /// Register a new user account.
    ///
    /// All wallets start at zero; funds arrive only through admin credits or
    /// approved deposits. Role is forced to USER and KYC to UNVERIFIED.
    pub fn create_user(
        &mut self,
        name: String,
        email: String,
        password: &str,
    ) -> Result<User, LedgerError> {
        if self.find_by_email(&email).is_some() {
            return Err(LedgerError::DuplicateEmail);
        }

        let password_hash = hash_password(password).map_err(|e| LedgerError::Auth(e.to_string()))?;

        let user = User {
            id: format!("user-{}", Uuid::new_v4()),
            name,
            email,
            role: Role::User,
            status: AccountStatus::Active,
            password_hash,
            withdrawal_pin_hash: None,
            capital: Decimal::ZERO,
            profit: Decimal::ZERO,
            bonus: Decimal::ZERO,
            accumulating_balance: Decimal::ZERO,
            total_won: 0,
            total_loss: 0,
            kyc_status: KycStatus::Unverified,
            kyc_data: None,
            nfts: Vec::new(),
            investments: Vec::new(),
            created_at: Utc::now(),
        };

        self.users.insert(user.id.clone(), user.clone());
        self.persist(&user)?;

        Ok(user)
    }

    /// Insert a fully-formed user record (seeding)
    pub fn insert(&mut self, user: User) -> Result<(), LedgerError> {
        self.persist(&user)?;
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Get user by id
    pub fn get(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// Get mutable user by id
    pub fn get_mut(&mut self, id: &str) -> Result<&mut User, LedgerError> {
        self.users.get_mut(id).ok_or(LedgerError::UserNotFound)
    }

    /// Case-insensitive email lookup
    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    /// All user records
    pub fn all_users(&self) -> Vec<&User> {
        self.users.values().collect()
    }

    /// Suspend, lock or reactivate an account
    pub fn set_status(&mut self, id: &str, status: AccountStatus) -> Result<User, LedgerError> {
        let user = self.get_mut(id)?;
        user.status = status;
        let snapshot = user.clone();
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    /// Admin decision on a pending KYC submission
    pub fn set_kyc_status(&mut self, id: &str, status: KycStatus) -> Result<User, LedgerError> {
        let user = self.get_mut(id)?;
        user.kyc_status = status;
        let snapshot = user.clone();
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    /// Attach a KYC dossier and move the account to PENDING review
    pub fn submit_kyc(&mut self, id: &str, dossier: KycDossier) -> Result<User, LedgerError> {
        let user = self.get_mut(id)?;
        user.kyc_status = KycStatus::Pending;
        user.kyc_data = Some(dossier);
        let snapshot = user.clone();
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    /// Mint an NFT into a user's collection. NFTs are never removed.
    pub fn add_nft(
        &mut self,
        id: &str,
        name: String,
        eth_amount: Decimal,
        image_url: String,
    ) -> Result<Nft, LedgerError> {
        let user = self.get_mut(id)?;
        let nft = Nft {
            id: format!("nft-{}", Uuid::new_v4()),
            name,
            eth_amount,
            image_url,
            owner_id: user.id.clone(),
        };
        user.nfts.push(nft.clone());
        let snapshot = user.clone();
        self.persist(&snapshot)?;
        Ok(nft)
    }

    /// Set (or replace) the withdrawal PIN, stored hashed
    pub fn set_withdrawal_pin(&mut self, id: &str, pin: &str) -> Result<(), LedgerError> {
        let pin_hash = hash_password(pin).map_err(|e| LedgerError::Auth(e.to_string()))?;
        let user = self.get_mut(id)?;
        user.withdrawal_pin_hash = Some(pin_hash);
        let snapshot = user.clone();
        self.persist(&snapshot)?;
        Ok(())
    }

    /// Persist one user row if a storage backend is attached
    pub fn persist(&self, user: &User) -> Result<(), LedgerError> {
        if let Some(storage) = &self.storage {
            storage.save_user(user)?;
        }
        Ok(())
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}
