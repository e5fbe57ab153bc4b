//! Account type definitions: users, wallets, KYC, NFTs, investments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier
pub type UserId = String;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    Locked,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Locked => "locked",
        };
        write!(f, "{}", s)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum KycStatus {
    Unverified,
    Pending,
    Verified,
    Rejected,
}

/// One of the four named balance fields on a user account.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Wallet {
    Capital,
    Profit,
    Bonus,
    #[serde(rename = "accumulating_balance")]
    Accumulating,
}

impl Wallet {
    /// Display label used in transaction method strings
    pub fn label(&self) -> &'static str {
        match self {
            Wallet::Capital => "CAPITAL",
            Wallet::Profit => "PROFIT",
            Wallet::Bonus => "BONUS",
            Wallet::Accumulating => "ACCUMULATING BALANCE",
        }
    }
}

/// KYC dossier attached to an account once submitted
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct KycDossier {
    pub full_name: String,
    pub dob: String,
    pub country: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub occupation: String,
    pub source_of_funds: String,
    pub tax_id: Option<String>,
    pub wallet_address: String,

    pub id_type: String,
    pub id_number: String,

    pub front_image_url: Option<String>,
    pub back_image_url: Option<String>,
    pub proof_of_address_url: Option<String>,
    pub selfie_image_url: Option<String>,

    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Nft {
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub eth_amount: Decimal,
    pub image_url: String,
    pub owner_id: UserId,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvestmentStatus {
    Active,
    Completed,
}

/// Investment subscription, child of a user account.
///
/// `accrued_interest` is carried for display but nothing accrues it; the
/// platform never ran an accrual process.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Investment {
    pub id: String,
    pub package_id: String,
    pub package_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub daily_interest_rate: Decimal,
    pub status: InvestmentStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub accrued_interest: Decimal,
}

/// Main user account structure
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    // Identity
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,

    // Authentication (Argon2id PHC strings, never plaintext)
    pub password_hash: String,
    pub withdrawal_pin_hash: Option<String>,

    // Wallets. Balances ride as plain numbers both in storage rows and on
    // the wire; `rust_decimal::serde::float` keeps the codec self-contained
    // so bincode can read the rows back.
    #[serde(with = "rust_decimal::serde::float")]
    pub capital: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub bonus: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub accumulating_balance: Decimal,

    // Trading stats, monotonically incremented
    pub total_won: u32,
    pub total_loss: u32,

    pub kyc_status: KycStatus,
    pub kyc_data: Option<KycDossier>,

    // Owned collections
    pub nfts: Vec<Nft>,
    pub investments: Vec<Investment>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Read a wallet balance
    pub fn balance(&self, wallet: Wallet) -> Decimal {
        match wallet {
            Wallet::Capital => self.capital,
            Wallet::Profit => self.profit,
            Wallet::Bonus => self.bonus,
            Wallet::Accumulating => self.accumulating_balance,
        }
    }

    /// Mutable access to a wallet balance
    pub fn balance_mut(&mut self, wallet: Wallet) -> &mut Decimal {
        match wallet {
            Wallet::Capital => &mut self.capital,
            Wallet::Profit => &mut self.profit,
            Wallet::Bonus => &mut self.bonus,
            Wallet::Accumulating => &mut self.accumulating_balance,
        }
    }

    /// Sum across all four wallets, conserved by transfers
    pub fn wallet_total(&self) -> Decimal {
        self.capital + self.profit + self.bonus + self.accumulating_balance
    }
}
