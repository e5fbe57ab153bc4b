//! User accounts: data model, storage, authentication

pub mod auth;
pub mod store;
pub mod types;

pub use store::AccountStore;
pub use types::{AccountStatus, KycStatus, Role, User, UserId, Wallet};
