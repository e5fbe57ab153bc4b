// RPC types for the JSON-RPC 2.0 protocol
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::types::{
    AccountStatus, Investment, KycDossier, KycStatus, Nft, Role, User,
};
use crate::ledger::transaction::Decision;
use crate::ledger::{AdjustDirection, TradeOutcome};
use crate::account::types::Wallet;
use crate::platform::DepositAsset;

#[derive(Deserialize, Debug)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: u64,
}

#[derive(Serialize, Debug)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// User record as shown to clients: everything except credential hashes
#[derive(Serialize, Debug, Clone)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub capital: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub bonus: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub accumulating_balance: Decimal,
    pub total_won: u32,
    pub total_loss: u32,
    pub kyc_status: KycStatus,
    pub kyc_data: Option<KycDossier>,
    pub nfts: Vec<Nft>,
    pub investments: Vec<Investment>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            status: u.status,
            capital: u.capital,
            profit: u.profit,
            bonus: u.bonus,
            accumulating_balance: u.accumulating_balance,
            total_won: u.total_won,
            total_loss: u.total_loss,
            kyc_status: u.kyc_status,
            kyc_data: u.kyc_data.clone(),
            nfts: u.nfts.clone(),
            investments: u.investments.clone(),
            created_at: u.created_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

// Method-specific parameter types

#[derive(Deserialize, Debug)]
pub struct LoginParams {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct RegisterParams {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct TokenParams {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub struct GetUserParams {
    pub token: String,
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TransferParams {
    pub token: String,
    pub user_id: Option<String>,
    pub from: Wallet,
    pub to: Wallet,
    pub amount: Decimal,
    pub idempotency_key: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AdminAdjustParams {
    pub token: String,
    pub user_id: String,
    pub wallet: Wallet,
    pub amount: Decimal,
    pub direction: AdjustDirection,
}

#[derive(Deserialize, Debug)]
pub struct RequestTransactionParams {
    pub token: String,
    pub user_id: Option<String>,
    pub amount: Decimal,
    pub method: String,
    pub idempotency_key: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ApproveTransactionParams {
    pub token: String,
    pub tx_id: String,
    pub decision: Decision,
}

#[derive(Deserialize, Debug)]
pub struct SubscribeInvestmentParams {
    pub token: String,
    pub user_id: Option<String>,
    pub package_id: String,
    pub amount: Decimal,
    pub duration_months: u32,
    pub daily_rate: Decimal,
}

#[derive(Deserialize, Debug)]
pub struct VerifyPinParams {
    pub token: String,
    pub pin: String,
}

#[derive(Deserialize, Debug)]
pub struct SetPinParams {
    pub token: String,
    pub pin: String,
}

#[derive(Deserialize, Debug)]
pub struct SettleTradeParams {
    pub token: String,
    pub amount: Decimal,
    pub outcome: TradeOutcome,
}

#[derive(Deserialize, Debug)]
pub struct ListUserTransactionsParams {
    pub token: String,
    pub user_id: Option<String>,
}

/// KYC dossier as submitted by the client; the server stamps the time
#[derive(Deserialize, Debug)]
pub struct SubmitKycParams {
    pub token: String,
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
}

#[derive(Deserialize, Debug)]
pub struct UpdateKycStatusParams {
    pub token: String,
    pub user_id: String,
    pub status: KycStatus,
}

#[derive(Deserialize, Debug)]
pub struct SetUserStatusParams {
    pub token: String,
    pub user_id: String,
    pub status: AccountStatus,
}

#[derive(Deserialize, Debug)]
pub struct CreateNftParams {
    pub token: String,
    pub user_id: String,
    pub name: String,
    pub eth_amount: Decimal,
    pub image_url: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateDepositAddressParams {
    pub token: String,
    pub asset: DepositAsset,
    pub address: String,
}

#[derive(Deserialize, Debug)]
pub struct SendChatMessageParams {
    pub token: String,
    pub message: String,
    #[serde(default)]
    pub is_issue: bool,
}
