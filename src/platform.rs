//! Platform configuration: per-asset deposit addresses

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LedgerError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DepositAsset {
    Btc,
    Eth,
    Usdt,
}

pub struct PlatformConfig {
    deposit_addresses: HashMap<DepositAsset, String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        let mut deposit_addresses = HashMap::new();
        deposit_addresses.insert(
            DepositAsset::Btc,
            "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh".to_string(),
        );
        deposit_addresses.insert(
            DepositAsset::Eth,
            "0x71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string(),
        );
        deposit_addresses.insert(
            DepositAsset::Usdt,
            "TMuA6YqfCeX8EhBFYEg5y7S4DqzSJzpZ5".to_string(),
        );
        Self { deposit_addresses }
    }
}

impl PlatformConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit_addresses(&self) -> &HashMap<DepositAsset, String> {
        &self.deposit_addresses
    }

    /// Replace the deposit address shown for an asset
    pub fn update_deposit_address(
        &mut self,
        asset: DepositAsset,
        address: &str,
    ) -> Result<&HashMap<DepositAsset, String>, LedgerError> {
        if address.trim().len() < 5 {
            return Err(LedgerError::InvalidAddress);
        }
        self.deposit_addresses.insert(asset, address.to_string());
        Ok(&self.deposit_addresses)
    }
}
