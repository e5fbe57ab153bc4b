//! Ledger operations: every function that moves money between wallets
//! and/or appends to the transaction log.
//!
//! A `Ledger` owns the account store and the transaction log together, so a
//! caller holding the ledger lock gets each operation as one atomic unit:
//! validation happens before any mutation, and the debit+credit+log triple
//! either fully applies or not at all.

pub mod transaction;

use chrono::{Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::account::auth::verify_password;
use crate::account::types::{Investment, InvestmentStatus, User, Wallet};
use crate::account::AccountStore;
use crate::error::LedgerError;
use crate::storage::Storage;
use transaction::{Decision, Transaction, TransactionKind, TransactionLog, TransactionStatus};

/// Profit paid out on a winning trade, as a fraction of the stake
const PROFIT_MULTIPLIER: Decimal = Decimal::from_parts(85, 0, 0, false, 2);

/// Retained idempotency keys; the oldest are evicted past this point
const IDEMPOTENCY_CAP: usize = 10_000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustDirection {
    Credit,
    Debit,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeOutcome {
    Win,
    Loss,
}

/// Result of settling one trade against the ledger
#[derive(Serialize, Clone, Debug)]
pub struct TradeSettlement {
    pub won: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit_delta: Decimal,
    pub message: String,
}

pub struct Ledger {
    accounts: AccountStore,
    transactions: TransactionLog,
    storage: Option<Arc<Storage>>,
    // idempotency key -> transaction id, so client retries never double-apply;
    // bounded, oldest-first eviction
    idempotency: HashMap<String, String>,
    idempotency_order: VecDeque<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: AccountStore::new(),
            transactions: TransactionLog::new(),
            storage: None,
            idempotency: HashMap::new(),
            idempotency_order: VecDeque::new(),
        }
    }

    /// Create with storage backend, loading persisted users and transactions
    pub fn with_storage(storage: Arc<Storage>) -> Result<Self, LedgerError> {
        Ok(Self {
            accounts: AccountStore::with_storage(storage.clone())?,
            transactions: TransactionLog::with_storage(storage.clone())?,
            storage: Some(storage),
            idempotency: HashMap::new(),
            idempotency_order: VecDeque::new(),
        })
    }

    /// Persist a user row and a transaction row as one atomic write
    fn persist_pair(&self, user: &User, tx: &Transaction) -> Result<(), LedgerError> {
        if let Some(storage) = &self.storage {
            storage.save_user_and_transaction(user, tx)?;
        }
        Ok(())
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut AccountStore {
        &mut self.accounts
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    // --- Session/Auth ---

    /// Register a new user with zeroed wallets
    pub fn register(
        &mut self,
        name: String,
        email: String,
        password: &str,
    ) -> Result<User, LedgerError> {
        let user = self.accounts.create_user(name, email, password)?;
        info!(user_id = %user.id, "registered new user");
        Ok(user)
    }

    /// Authenticate by email + password. Non-ACTIVE accounts may not log in;
    /// the error names the current status.
    pub fn login(&self, email: &str, password: &str) -> Result<User, LedgerError> {
        let user = self
            .accounts
            .find_by_email(email)
            .ok_or(LedgerError::UserNotFound)?;

        verify_password(password, &user.password_hash)
            .map_err(|_| LedgerError::InvalidCredentials)?;

        if !user.is_active() {
            return Err(LedgerError::AccountNotActive(user.status));
        }

        Ok(user.clone())
    }

    // --- Ledger operations ---

    /// Move funds between two wallets of the same account and log an
    /// APPROVED transfer. The wallet sum is conserved.
    pub fn transfer(
        &mut self,
        user_id: &str,
        from: Wallet,
        to: Wallet,
        amount: Decimal,
        idempotency_key: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        if let Some(tx) = self.replay(idempotency_key.as_deref()) {
            return Ok(tx);
        }

        let user = self.accounts.get_mut(user_id)?;

        if from == to {
            return Err(LedgerError::SameWallet);
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if user.balance(from) < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        *user.balance_mut(from) -= amount;
        *user.balance_mut(to) += amount;
        let snapshot = user.clone();

        let tx = Transaction::new(
            user_id,
            &snapshot.name,
            TransactionKind::Transfer,
            amount,
            format!("{} -> {}", from.label(), to.label()),
            TransactionStatus::Approved,
        );

        // both rows land in one batch; a failed write undoes the move
        if let Err(e) = self.persist_pair(&snapshot, &tx) {
            let user = self.accounts.get_mut(user_id)?;
            *user.balance_mut(from) += amount;
            *user.balance_mut(to) -= amount;
            return Err(e);
        }
        self.transactions.commit(tx.clone());
        self.remember(idempotency_key, &tx);

        info!(user_id, %amount, ?from, ?to, "wallet transfer");
        Ok(tx)
    }

    /// Unconditional admin credit or debit of a named wallet.
    ///
    /// DEBIT applies no floor check and can drive the balance negative;
    /// that is long-standing platform behavior and is covered by a test.
    pub fn admin_adjust_funds(
        &mut self,
        user_id: &str,
        wallet: Wallet,
        amount: Decimal,
        direction: AdjustDirection,
    ) -> Result<User, LedgerError> {
        let user = self.accounts.get_mut(user_id)?;
        let prior = user.clone();

        match direction {
            AdjustDirection::Credit => *user.balance_mut(wallet) += amount,
            AdjustDirection::Debit => *user.balance_mut(wallet) -= amount,
        }

        let snapshot = user.clone();
        if let Err(e) = self.accounts.persist(&snapshot) {
            *self.accounts.get_mut(user_id)? = prior;
            return Err(e);
        }
        info!(user_id, %amount, ?wallet, ?direction, "admin fund adjustment");
        Ok(snapshot)
    }

    /// File a deposit request. No balance changes until approval.
    pub fn request_deposit(
        &mut self,
        user_id: &str,
        amount: Decimal,
        method: String,
        idempotency_key: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        self.request(user_id, TransactionKind::Deposit, amount, method, idempotency_key)
    }

    /// File a withdrawal request. No balance check happens here; funds are
    /// only verified (via the waterfall) at approval time.
    pub fn request_withdrawal(
        &mut self,
        user_id: &str,
        amount: Decimal,
        method: String,
        idempotency_key: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        self.request(user_id, TransactionKind::Withdrawal, amount, method, idempotency_key)
    }

    fn request(
        &mut self,
        user_id: &str,
        kind: TransactionKind,
        amount: Decimal,
        method: String,
        idempotency_key: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        if let Some(tx) = self.replay(idempotency_key.as_deref()) {
            return Ok(tx);
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let user = self.accounts.get(user_id).ok_or(LedgerError::UserNotFound)?;
        let user_name = user.name.clone();

        let tx = self
            .transactions
            .create_pending(user_id, &user_name, kind, amount, method)?;
        self.remember(idempotency_key, &tx);

        info!(user_id, %amount, ?kind, tx_id = %tx.id, "transaction requested");
        Ok(tx)
    }

    /// Admin decision on a pending deposit/withdrawal. Exactly-once: a
    /// transaction that already left PENDING fails with `AlreadyResolved`
    /// and no balance moves, so double approval can never double-credit.
    /// On APPROVE the balance row and the resolved row are written as one
    /// atomic batch; a retry after a crash or restart sees the resolved row
    /// and is refused.
    ///
    /// On APPROVE of a withdrawal, profit is drained first and any shortfall
    /// comes out of capital (waterfall). The waterfall applies no floor
    /// check beyond its ordering, so capital can go negative when
    /// profit + capital < amount.
    pub fn approve_transaction(
        &mut self,
        tx_id: &str,
        decision: Decision,
    ) -> Result<Transaction, LedgerError> {
        let tx = self
            .transactions
            .get(tx_id)
            .ok_or(LedgerError::TransactionNotFound)?
            .clone();

        if tx.status != TransactionStatus::Pending {
            return Err(LedgerError::AlreadyResolved);
        }

        let resolved = match decision {
            Decision::Approve => {
                let mut resolved = tx.clone();
                resolved.status = TransactionStatus::Approved;

                let user = self.accounts.get_mut(&tx.user_id)?;
                let prior = user.clone();
                match tx.kind {
                    TransactionKind::Deposit => {
                        user.capital += tx.amount;
                    }
                    TransactionKind::Withdrawal => {
                        let from_profit = tx.amount.min(user.profit);
                        user.profit -= from_profit;
                        user.capital -= tx.amount - from_profit;
                    }
                    // transfers/investments settle at creation and never sit
                    // in PENDING, so there is nothing to move here
                    TransactionKind::Transfer | TransactionKind::Investment => {}
                }
                let snapshot = user.clone();

                if let Err(e) = self.persist_pair(&snapshot, &resolved) {
                    *self.accounts.get_mut(&tx.user_id)? = prior;
                    return Err(e);
                }
                self.transactions.commit_resolution(&resolved)?;
                resolved
            }
            Decision::Reject => self.transactions.resolve(tx_id, decision)?,
        };

        info!(tx_id, ?decision, "transaction resolved");
        Ok(resolved)
    }

    /// Subscribe to an investment package, deducting the principal from
    /// capital and logging an APPROVED investment transaction.
    pub fn subscribe_investment(
        &mut self,
        user_id: &str,
        package_id: &str,
        amount: Decimal,
        duration_months: u32,
        daily_rate: Decimal,
    ) -> Result<Investment, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let start_date = Utc::now();
        let end_date = start_date
            .checked_add_months(Months::new(duration_months))
            .ok_or(LedgerError::InvalidDuration)?;

        let user = self.accounts.get_mut(user_id)?;
        if user.capital < amount {
            return Err(LedgerError::InsufficientCapital);
        }

        user.capital -= amount;

        let investment = Investment {
            id: format!("inv-{}", Uuid::new_v4()),
            package_id: package_id.to_string(),
            package_name: format!("Tier {}", package_id),
            amount,
            start_date,
            end_date,
            daily_interest_rate: daily_rate,
            status: InvestmentStatus::Active,
            accrued_interest: Decimal::ZERO,
        };
        user.investments.push(investment.clone());
        let snapshot = user.clone();

        let tx = Transaction::new(
            user_id,
            &snapshot.name,
            TransactionKind::Investment,
            amount,
            format!("Investment Plan (Tier {})", package_id),
            TransactionStatus::Approved,
        );

        if let Err(e) = self.persist_pair(&snapshot, &tx) {
            let user = self.accounts.get_mut(user_id)?;
            user.capital += amount;
            user.investments.pop();
            return Err(e);
        }
        self.transactions.commit(tx);

        info!(user_id, %amount, package_id, "investment subscribed");
        Ok(investment)
    }

    /// Check a withdrawal PIN. False when no PIN has been set.
    pub fn verify_withdrawal_pin(&self, user_id: &str, pin: &str) -> Result<bool, LedgerError> {
        let user = self.accounts.get(user_id).ok_or(LedgerError::UserNotFound)?;
        Ok(match &user.withdrawal_pin_hash {
            Some(hash) => verify_password(pin, hash).is_ok(),
            None => false,
        })
    }

    /// Apply a trade outcome to the ledger. A win credits profit with
    /// stake x 0.85; a loss debits capital by the stake. Counters only
    /// ever increase.
    pub fn settle_trade(
        &mut self,
        user_id: &str,
        stake: Decimal,
        outcome: TradeOutcome,
    ) -> Result<TradeSettlement, LedgerError> {
        if stake <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let user = self.accounts.get_mut(user_id)?;
        if !user.is_active() {
            return Err(LedgerError::AccountNotActive(user.status));
        }
        if user.capital < stake {
            return Err(LedgerError::InsufficientCapital);
        }
        let prior = user.clone();

        let settlement = match outcome {
            TradeOutcome::Win => {
                let payout = stake * PROFIT_MULTIPLIER;
                user.profit += payout;
                user.total_won += 1;
                TradeSettlement {
                    won: true,
                    profit_delta: payout,
                    message: "Trade Won! Profit added.".to_string(),
                }
            }
            TradeOutcome::Loss => {
                user.capital -= stake;
                user.total_loss += 1;
                TradeSettlement {
                    won: false,
                    profit_delta: -stake,
                    message: "Trade Lost. Capital deducted.".to_string(),
                }
            }
        };

        let snapshot = user.clone();
        if let Err(e) = self.accounts.persist(&snapshot) {
            *self.accounts.get_mut(user_id)? = prior;
            return Err(e);
        }
        info!(user_id, %stake, ?outcome, "trade settled");
        Ok(settlement)
    }

    // --- Idempotency ---

    fn replay(&self, key: Option<&str>) -> Option<Transaction> {
        let key = key?;
        let tx_id = self.idempotency.get(key)?;
        self.transactions.get(tx_id).cloned()
    }

    fn remember(&mut self, key: Option<String>, tx: &Transaction) {
        if let Some(key) = key {
            if self.idempotency.insert(key.clone(), tx.id.clone()).is_none() {
                self.idempotency_order.push_back(key);
            }
            while self.idempotency.len() > IDEMPOTENCY_CAP {
                match self.idempotency_order.pop_front() {
                    Some(oldest) => {
                        self.idempotency.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::types::AccountStatus;

    fn funded_user(
        ledger: &mut Ledger,
        email: &str,
        capital: i64,
        profit: i64,
        bonus: i64,
    ) -> String {
        let user = ledger
            .register("Test User".to_string(), email.to_string(), "password123")
            .unwrap();
        let u = ledger.accounts_mut().get_mut(&user.id).unwrap();
        u.capital = Decimal::from(capital);
        u.profit = Decimal::from(profit);
        u.bonus = Decimal::from(bonus);
        user.id
    }

    #[test]
    fn test_transfer_conserves_wallet_sum() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 50, 20);

        let before = ledger.accounts().get(&id).unwrap().wallet_total();
        ledger
            .transfer(&id, Wallet::Capital, Wallet::Profit, Decimal::from(60), None)
            .unwrap();
        let after = ledger.accounts().get(&id).unwrap().wallet_total();

        assert_eq!(before, after);
    }

    #[test]
    fn test_transfer_rejections() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 0, 0);

        assert_eq!(
            ledger
                .transfer(&id, Wallet::Capital, Wallet::Capital, Decimal::from(10), None)
                .unwrap_err(),
            LedgerError::SameWallet
        );
        assert_eq!(
            ledger
                .transfer(&id, Wallet::Capital, Wallet::Profit, Decimal::ZERO, None)
                .unwrap_err(),
            LedgerError::InvalidAmount
        );
        assert_eq!(
            ledger
                .transfer(&id, Wallet::Profit, Wallet::Capital, Decimal::from(1), None)
                .unwrap_err(),
            LedgerError::InsufficientFunds
        );
        assert_eq!(
            ledger
                .transfer("user-missing", Wallet::Profit, Wallet::Capital, Decimal::from(1), None)
                .unwrap_err(),
            LedgerError::UserNotFound
        );
    }

    #[test]
    fn test_transfer_bonus_to_capital_logs_approved_entry() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 0, 0, 20);

        let tx = ledger
            .transfer(&id, Wallet::Bonus, Wallet::Capital, Decimal::from(20), None)
            .unwrap();

        let user = ledger.accounts().get(&id).unwrap();
        assert_eq!(user.bonus, Decimal::ZERO);
        assert_eq!(user.capital, Decimal::from(20));
        assert_eq!(tx.status, TransactionStatus::Approved);
        assert_eq!(tx.kind, TransactionKind::Transfer);
        assert_eq!(tx.method, "BONUS -> CAPITAL");
    }

    #[test]
    fn test_deposit_approval_credits_capital_exactly() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 10, 0, 0);

        let tx = ledger
            .request_deposit(&id, Decimal::from(500), "USDT (TRC20)".to_string(), None)
            .unwrap();
        assert_eq!(ledger.accounts().get(&id).unwrap().capital, Decimal::from(10));

        ledger.approve_transaction(&tx.id, Decision::Approve).unwrap();
        assert_eq!(ledger.accounts().get(&id).unwrap().capital, Decimal::from(510));
    }

    #[test]
    fn test_deposit_rejection_moves_nothing() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 10, 5, 0);

        let tx = ledger
            .request_deposit(&id, Decimal::from(500), "BTC".to_string(), None)
            .unwrap();
        let before = ledger.accounts().get(&id).unwrap().wallet_total();

        ledger.approve_transaction(&tx.id, Decision::Reject).unwrap();

        let user = ledger.accounts().get(&id).unwrap();
        assert_eq!(user.wallet_total(), before);
    }

    #[test]
    fn test_withdrawal_waterfall_drains_profit_then_capital() {
        // capital=100, profit=50; withdraw 120 -> profit=0, capital=30
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 50, 0);

        let tx = ledger
            .request_withdrawal(&id, Decimal::from(120), "BTC Wallet".to_string(), None)
            .unwrap();
        ledger.approve_transaction(&tx.id, Decision::Approve).unwrap();

        let user = ledger.accounts().get(&id).unwrap();
        assert_eq!(user.profit, Decimal::ZERO);
        assert_eq!(user.capital, Decimal::from(30));
    }

    #[test]
    fn test_withdrawal_covered_by_profit_leaves_capital_untouched() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 50, 0);

        let tx = ledger
            .request_withdrawal(&id, Decimal::from(40), "BTC Wallet".to_string(), None)
            .unwrap();
        ledger.approve_transaction(&tx.id, Decision::Approve).unwrap();

        let user = ledger.accounts().get(&id).unwrap();
        assert_eq!(user.profit, Decimal::from(10));
        assert_eq!(user.capital, Decimal::from(100));
    }

    #[test]
    fn test_double_approval_never_double_credits() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 0, 0, 0);

        let tx = ledger
            .request_deposit(&id, Decimal::from(100), "ETH".to_string(), None)
            .unwrap();
        ledger.approve_transaction(&tx.id, Decision::Approve).unwrap();

        assert_eq!(
            ledger.approve_transaction(&tx.id, Decision::Approve).unwrap_err(),
            LedgerError::AlreadyResolved
        );
        assert_eq!(ledger.accounts().get(&id).unwrap().capital, Decimal::from(100));
    }

    #[test]
    fn test_admin_debit_can_go_negative() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 10, 0, 0);

        let user = ledger
            .admin_adjust_funds(&id, Wallet::Capital, Decimal::from(25), AdjustDirection::Debit)
            .unwrap();
        assert_eq!(user.capital, Decimal::from(-15));

        let user = ledger
            .admin_adjust_funds(&id, Wallet::Bonus, Decimal::from(5), AdjustDirection::Credit)
            .unwrap();
        assert_eq!(user.bonus, Decimal::from(5));
    }

    #[test]
    fn test_investment_subscription() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 1000, 0, 0);

        assert_eq!(
            ledger
                .subscribe_investment(&id, "2", Decimal::from(2000), 3, Decimal::new(15, 3))
                .unwrap_err(),
            LedgerError::InsufficientCapital
        );

        let inv = ledger
            .subscribe_investment(&id, "2", Decimal::from(400), 3, Decimal::new(15, 3))
            .unwrap();

        let user = ledger.accounts().get(&id).unwrap();
        assert_eq!(user.capital, Decimal::from(600));
        assert_eq!(inv.status, InvestmentStatus::Active);
        assert_eq!(inv.accrued_interest, Decimal::ZERO);
        assert_eq!(
            inv.end_date,
            inv.start_date.checked_add_months(Months::new(3)).unwrap()
        );
        assert_eq!(inv.package_name, "Tier 2");

        // one APPROVED INVESTMENT entry logged
        let history = ledger.transactions().list_for_user(&id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Investment);
        assert_eq!(history[0].status, TransactionStatus::Approved);
    }

    #[test]
    fn test_idempotent_replay_returns_original_transaction() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 0, 0);

        let key = Some("req-1".to_string());
        let first = ledger
            .request_deposit(&id, Decimal::from(50), "BTC".to_string(), key.clone())
            .unwrap();
        let second = ledger
            .request_deposit(&id, Decimal::from(50), "BTC".to_string(), key)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(ledger.transactions().list_for_user(&id).len(), 1);
    }

    #[test]
    fn test_settle_trade() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 0, 0);

        let win = ledger
            .settle_trade(&id, Decimal::from(40), TradeOutcome::Win)
            .unwrap();
        assert!(win.won);
        {
            let user = ledger.accounts().get(&id).unwrap();
            assert_eq!(user.profit, Decimal::from(34)); // 40 * 0.85
            assert_eq!(user.capital, Decimal::from(100));
            assert_eq!(user.total_won, 1);
        }

        let loss = ledger
            .settle_trade(&id, Decimal::from(30), TradeOutcome::Loss)
            .unwrap();
        assert!(!loss.won);
        {
            let user = ledger.accounts().get(&id).unwrap();
            assert_eq!(user.capital, Decimal::from(70));
            assert_eq!(user.total_loss, 1);
        }

        assert_eq!(
            ledger
                .settle_trade(&id, Decimal::from(1000), TradeOutcome::Win)
                .unwrap_err(),
            LedgerError::InsufficientCapital
        );
    }

    #[test]
    fn test_settle_trade_requires_active_account() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 0, 0);
        ledger
            .accounts_mut()
            .set_status(&id, AccountStatus::Suspended)
            .unwrap();

        assert_eq!(
            ledger
                .settle_trade(&id, Decimal::from(10), TradeOutcome::Win)
                .unwrap_err(),
            LedgerError::AccountNotActive(AccountStatus::Suspended)
        );
    }

    #[test]
    fn test_login_flow() {
        let mut ledger = Ledger::new();
        let user = ledger
            .register("Alice".to_string(), "alice@b.com".to_string(), "password123")
            .unwrap();

        assert_eq!(ledger.login("ALICE@B.COM", "password123").unwrap().id, user.id);
        assert_eq!(
            ledger.login("alice@b.com", "nope").unwrap_err(),
            LedgerError::InvalidCredentials
        );
        assert_eq!(
            ledger.login("missing@b.com", "password123").unwrap_err(),
            LedgerError::UserNotFound
        );

        ledger
            .accounts_mut()
            .set_status(&user.id, AccountStatus::Locked)
            .unwrap();
        let err = ledger.login("alice@b.com", "password123").unwrap_err();
        assert_eq!(err, LedgerError::AccountNotActive(AccountStatus::Locked));
        assert_eq!(err.to_string(), "account is locked");
    }

    #[test]
    fn test_approved_deposit_survives_restart() {
        let storage = Arc::new(Storage::temporary().unwrap());
        let mut ledger = Ledger::with_storage(storage.clone()).unwrap();
        let user = ledger
            .register("Test User".to_string(), "a@b.com".to_string(), "password123")
            .unwrap();
        ledger
            .admin_adjust_funds(
                &user.id,
                Wallet::Capital,
                Decimal::new(10050, 2),
                AdjustDirection::Credit,
            )
            .unwrap();

        let tx = ledger
            .request_deposit(&user.id, Decimal::new(25025, 2), "BTC".to_string(), None)
            .unwrap();
        ledger.approve_transaction(&tx.id, Decision::Approve).unwrap();

        // a freshly loaded ledger sees the credited balance and the resolved
        // row together, so a retried approval is refused
        let mut reloaded = Ledger::with_storage(storage).unwrap();
        assert_eq!(
            reloaded.accounts().get(&user.id).unwrap().capital,
            Decimal::new(35075, 2)
        );
        assert!(reloaded.transactions().list_pending().is_empty());
        assert_eq!(
            reloaded
                .approve_transaction(&tx.id, Decision::Approve)
                .unwrap_err(),
            LedgerError::AlreadyResolved
        );
        assert_eq!(
            reloaded.accounts().get(&user.id).unwrap().capital,
            Decimal::new(35075, 2)
        );
    }

    #[test]
    fn test_transfer_rows_reload_together() {
        let storage = Arc::new(Storage::temporary().unwrap());
        let mut ledger = Ledger::with_storage(storage.clone()).unwrap();
        let user = ledger
            .register("Test User".to_string(), "a@b.com".to_string(), "password123")
            .unwrap();
        ledger
            .admin_adjust_funds(
                &user.id,
                Wallet::Bonus,
                Decimal::new(2000, 2),
                AdjustDirection::Credit,
            )
            .unwrap();
        ledger
            .transfer(&user.id, Wallet::Bonus, Wallet::Capital, Decimal::from(20), None)
            .unwrap();

        let reloaded = Ledger::with_storage(storage).unwrap();
        let u = reloaded.accounts().get(&user.id).unwrap();
        assert_eq!(u.bonus, Decimal::ZERO);
        assert_eq!(u.capital, Decimal::from(20));

        let history = reloaded.transactions().list_for_user(&user.id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Transfer);
        assert_eq!(history[0].status, TransactionStatus::Approved);
    }

    #[test]
    fn test_idempotency_keys_are_bounded() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 100, 0, 0);

        let first = ledger
            .request_deposit(&id, Decimal::ONE, "BTC".to_string(), Some("k-0".to_string()))
            .unwrap();
        let mut last = first.clone();
        for i in 1..=IDEMPOTENCY_CAP {
            last = ledger
                .request_deposit(&id, Decimal::ONE, "BTC".to_string(), Some(format!("k-{}", i)))
                .unwrap();
        }

        // a recent key still replays the original entry
        let replay = ledger
            .request_deposit(
                &id,
                Decimal::ONE,
                "BTC".to_string(),
                Some(format!("k-{}", IDEMPOTENCY_CAP)),
            )
            .unwrap();
        assert_eq!(replay.id, last.id);

        // the oldest key has been evicted, so it files a fresh request
        let fresh = ledger
            .request_deposit(&id, Decimal::ONE, "BTC".to_string(), Some("k-0".to_string()))
            .unwrap();
        assert_ne!(fresh.id, first.id);
    }

    #[test]
    fn test_withdrawal_pin() {
        let mut ledger = Ledger::new();
        let id = funded_user(&mut ledger, "a@b.com", 0, 0, 0);

        // no PIN set yet
        assert!(!ledger.verify_withdrawal_pin(&id, "1234").unwrap());

        ledger.accounts_mut().set_withdrawal_pin(&id, "1234").unwrap();
        assert!(ledger.verify_withdrawal_pin(&id, "1234").unwrap());
        assert!(!ledger.verify_withdrawal_pin(&id, "4321").unwrap());
    }
}
