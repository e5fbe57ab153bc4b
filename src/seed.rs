//! Demo fixtures: the seed accounts and pending transactions the dashboard
//! ships with.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::account::auth::hash_password;
use crate::account::types::{AccountStatus, KycDossier, KycStatus, Role, User};
use crate::error::LedgerError;
use crate::ledger::Ledger;

fn demo_user(
    id: &str,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    kyc_status: KycStatus,
) -> Result<User, LedgerError> {
    Ok(User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        status: AccountStatus::Active,
        password_hash: hash_password(password).map_err(|e| LedgerError::Auth(e.to_string()))?,
        withdrawal_pin_hash: None,
        capital: Decimal::ZERO,
        profit: Decimal::ZERO,
        bonus: Decimal::ZERO,
        accumulating_balance: Decimal::ZERO,
        total_won: 0,
        total_loss: 0,
        kyc_status,
        kyc_data: None,
        nfts: Vec::new(),
        investments: Vec::new(),
        created_at: Utc::now(),
    })
}

/// Load the demo accounts and their two pending transactions
pub fn seed_demo(ledger: &mut Ledger) -> Result<(), LedgerError> {
    let mut alex = demo_user(
        "user-1",
        "Alex Trader",
        "alex@scalperhub.com",
        "password123",
        Role::User,
        KycStatus::Unverified,
    )?;
    alex.capital = Decimal::new(500000, 2);
    alex.accumulating_balance = Decimal::new(125050, 2);
    alex.bonus = Decimal::new(10000, 2);
    alex.profit = Decimal::new(45000, 2);
    alex.total_won = 15;
    alex.total_loss = 4;
    alex.withdrawal_pin_hash =
        Some(hash_password("1234").map_err(|e| LedgerError::Auth(e.to_string()))?);

    let mut sarah = demo_user(
        "user-2",
        "Sarah Whale",
        "sarah@whale.capital",
        "password123",
        Role::User,
        KycStatus::Pending,
    )?;
    sarah.capital = Decimal::new(2500000, 2);
    sarah.accumulating_balance = Decimal::new(500000, 2);
    sarah.bonus = Decimal::new(50000, 2);
    sarah.profit = Decimal::new(820000, 2);
    sarah.total_won = 42;
    sarah.total_loss = 8;
    sarah.withdrawal_pin_hash =
        Some(hash_password("5678").map_err(|e| LedgerError::Auth(e.to_string()))?);
    sarah.kyc_data = Some(KycDossier {
        full_name: "Sarah Whale".to_string(),
        dob: "1985-04-12".to_string(),
        country: "US".to_string(),
        address: "88 Wall St, New York, NY".to_string(),
        email: "sarah@whale.capital".to_string(),
        phone: "+1 555-0123-456".to_string(),
        occupation: "Investment Banker".to_string(),
        source_of_funds: "Salary & Investments".to_string(),
        tax_id: Some("999-00-1111".to_string()),
        wallet_address: "0x1234...abcd".to_string(),
        id_type: "passport".to_string(),
        id_number: "P99887766".to_string(),
        front_image_url: None,
        back_image_url: None,
        proof_of_address_url: None,
        selfie_image_url: None,
        submitted_at: Utc.with_ymd_and_hms(2025, 5, 12, 10, 0, 0).unwrap(),
    });

    let admin = demo_user(
        "admin-1",
        "Master Admin",
        "admin@scalperhub.com",
        "admin",
        Role::Admin,
        KycStatus::Verified,
    )?;

    ledger.accounts_mut().insert(alex)?;
    ledger.accounts_mut().insert(sarah)?;
    ledger.accounts_mut().insert(admin)?;

    ledger.request_deposit("user-2", Decimal::from(5000), "USDT (TRC20)".to_string(), None)?;
    ledger.request_withdrawal("user-1", Decimal::from(200), "BTC Wallet".to_string(), None)?;

    info!("seeded demo accounts and pending transactions");
    Ok(())
}
