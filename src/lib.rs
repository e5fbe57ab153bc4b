//! ScalperHub ledger service: accounts, wallets, transaction approval,
//! investments, and the support desk behind the trading dashboard.

pub mod account;
pub mod cli;
pub mod error;
pub mod ledger;
pub mod platform;
pub mod rpc;
pub mod seed;
pub mod storage;
pub mod support;
