use super::types::*;
use crate::account::types::{KycDossier, User};
use crate::error::LedgerError;
use crate::rpc::RpcState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Main dispatcher: routes incoming JSON-RPC requests to the correct handler.
pub async fn handle_rpc_request(
    State(state): State<RpcState>,
    Json(req): Json<RpcRequest>,
) -> Json<RpcResponse> {
    debug!("RPC Request: method={}, id={}", req.method, req.id);

    let result = match req.method.as_str() {
        // Session/Auth
        "login" => handle_login(state.clone(), req.params).await,
        "register" => handle_register(state.clone(), req.params).await,
        "logout" => handle_logout(state.clone(), req.params).await,
        // Accounts
        "getUser" => handle_get_user(state.clone(), req.params).await,
        "listUsers" => handle_list_users(state.clone(), req.params).await,
        "setUserStatus" => handle_set_user_status(state.clone(), req.params).await,
        "submitKyc" => handle_submit_kyc(state.clone(), req.params).await,
        "updateKycStatus" => handle_update_kyc_status(state.clone(), req.params).await,
        "createNft" => handle_create_nft(state.clone(), req.params).await,
        "setWithdrawalPin" => handle_set_withdrawal_pin(state.clone(), req.params).await,
        "verifyWithdrawalPin" => handle_verify_withdrawal_pin(state.clone(), req.params).await,
        // Ledger operations
        "transfer" => handle_transfer(state.clone(), req.params).await,
        "adminAdjustFunds" => handle_admin_adjust_funds(state.clone(), req.params).await,
        "requestDeposit" => handle_request_deposit(state.clone(), req.params).await,
        "requestWithdrawal" => handle_request_withdrawal(state.clone(), req.params).await,
        "approveTransaction" => handle_approve_transaction(state.clone(), req.params).await,
        "subscribeInvestment" => handle_subscribe_investment(state.clone(), req.params).await,
        "settleTrade" => handle_settle_trade(state.clone(), req.params).await,
        // Transaction log
        "listPendingTransactions" => handle_list_pending(state.clone(), req.params).await,
        "listUserTransactions" => handle_list_user_transactions(state.clone(), req.params).await,
        // Platform config
        "getDepositAddresses" => handle_get_deposit_addresses(state.clone(), req.params).await,
        "updateDepositAddress" => handle_update_deposit_address(state.clone(), req.params).await,
        // Support chat
        "sendChatMessage" => handle_send_chat_message(state.clone(), req.params).await,
        "getChatSession" => handle_get_chat_session(state.clone(), req.params).await,
        "markChatRead" => handle_mark_chat_read(state.clone(), req.params).await,
        "listSupportLog" => handle_list_support_log(state.clone(), req.params).await,
        "getVersion" => handle_get_version().await,
        _ => Err(RpcError {
            code: -32601,
            message: format!("Method not found: {}", req.method),
        }),
    };

    match result {
        Ok(val) => Json(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(val),
            error: None,
            id: req.id,
        }),
        Err(err) => Json(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(err),
            id: req.id,
        }),
    }
}

//
// === Helper Functions ===
//

/// Safely acquire a mutex lock, recovering from poison
fn safe_lock<T>(mutex: &Arc<Mutex<T>>) -> Result<std::sync::MutexGuard<'_, T>, RpcError> {
    mutex.lock().map_err(|e| {
        tracing::error!("Mutex poisoned: {}", e);
        RpcError {
            code: -32603,
            message: "Internal error: mutex poisoned".to_string(),
        }
    })
}

/// Safely serialize to JSON value
fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError {
        code: -32603,
        message: format!("Serialization error: {}", e),
    })
}

fn parse<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError {
        code: -32602,
        message: format!("Invalid params: {}", e),
    })
}

fn domain(e: LedgerError) -> RpcError {
    RpcError {
        code: -32001,
        message: e.to_string(),
    }
}

/// Resolve a bearer token to the stored user record. Role and identity
/// always come from the store, never from anything client-supplied.
fn authenticate(state: &RpcState, token: &str) -> Result<User, RpcError> {
    let user_id = {
        let sessions = safe_lock(&state.sessions)?;
        sessions.resolve(token)
    };
    let user_id = user_id.ok_or_else(|| domain(LedgerError::Unauthorized))?;

    let ledger = safe_lock(&state.ledger)?;
    ledger
        .accounts()
        .get(&user_id)
        .map(|u| u.clone())
        .ok_or_else(|| domain(LedgerError::Unauthorized))
}

fn require_admin(caller: &User) -> Result<(), RpcError> {
    if caller.is_admin() {
        Ok(())
    } else {
        warn!(caller = %caller.id, "admin-gated method refused");
        Err(domain(LedgerError::Unauthorized))
    }
}

/// A user may act on their own account; admins may act on anyone's.
fn ensure_self_or_admin(caller: &User, user_id: &str) -> Result<(), RpcError> {
    if caller.id == user_id || caller.is_admin() {
        Ok(())
    } else {
        warn!(caller = %caller.id, target = user_id, "cross-account access refused");
        Err(domain(LedgerError::Unauthorized))
    }
}

//
// === Session/Auth ===
//

async fn handle_login(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: LoginParams = parse(params)?;

    let user = {
        let ledger = safe_lock(&state.ledger)?;
        ledger.login(&p.email, &p.password).map_err(domain)?
    };

    let token = {
        let mut sessions = safe_lock(&state.sessions)?;
        sessions.issue(&user.id)
    };

    to_json(&LoginResponse {
        token,
        user: UserView::from(&user),
    })
}

async fn handle_register(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: RegisterParams = parse(params)?;

    let user = {
        let mut ledger = safe_lock(&state.ledger)?;
        ledger
            .register(p.name, p.email, &p.password)
            .map_err(domain)?
    };

    let token = {
        let mut sessions = safe_lock(&state.sessions)?;
        sessions.issue(&user.id)
    };

    to_json(&LoginResponse {
        token,
        user: UserView::from(&user),
    })
}

async fn handle_logout(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TokenParams = parse(params)?;
    let mut sessions = safe_lock(&state.sessions)?;
    let revoked = sessions.revoke(&p.token);
    Ok(serde_json::json!({ "revoked": revoked }))
}

//
// === Accounts ===
//

async fn handle_get_user(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: GetUserParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    let target = p.user_id.unwrap_or_else(|| caller.id.clone());
    ensure_self_or_admin(&caller, &target)?;

    let ledger = safe_lock(&state.ledger)?;
    let user = ledger
        .accounts()
        .get(&target)
        .ok_or_else(|| domain(LedgerError::UserNotFound))?;
    to_json(&UserView::from(user))
}

async fn handle_list_users(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TokenParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let ledger = safe_lock(&state.ledger)?;
    let users: Vec<UserView> = ledger
        .accounts()
        .all_users()
        .into_iter()
        .map(UserView::from)
        .collect();
    to_json(&users)
}

async fn handle_set_user_status(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: SetUserStatusParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let user = ledger
        .accounts_mut()
        .set_status(&p.user_id, p.status)
        .map_err(domain)?;
    to_json(&UserView::from(&user))
}

async fn handle_submit_kyc(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: SubmitKycParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;

    let dossier = KycDossier {
        full_name: p.full_name,
        dob: p.dob,
        country: p.country,
        address: p.address,
        email: p.email,
        phone: p.phone,
        occupation: p.occupation,
        source_of_funds: p.source_of_funds,
        tax_id: p.tax_id,
        wallet_address: p.wallet_address,
        id_type: p.id_type,
        id_number: p.id_number,
        front_image_url: p.front_image_url,
        back_image_url: p.back_image_url,
        proof_of_address_url: p.proof_of_address_url,
        selfie_image_url: p.selfie_image_url,
        submitted_at: Utc::now(),
    };

    let mut ledger = safe_lock(&state.ledger)?;
    let user = ledger
        .accounts_mut()
        .submit_kyc(&caller.id, dossier)
        .map_err(domain)?;
    to_json(&UserView::from(&user))
}

async fn handle_update_kyc_status(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: UpdateKycStatusParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let user = ledger
        .accounts_mut()
        .set_kyc_status(&p.user_id, p.status)
        .map_err(domain)?;
    to_json(&UserView::from(&user))
}

async fn handle_create_nft(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: CreateNftParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let nft = ledger
        .accounts_mut()
        .add_nft(&p.user_id, p.name, p.eth_amount, p.image_url)
        .map_err(domain)?;
    to_json(&nft)
}

async fn handle_set_withdrawal_pin(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: SetPinParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;

    let mut ledger = safe_lock(&state.ledger)?;
    ledger
        .accounts_mut()
        .set_withdrawal_pin(&caller.id, &p.pin)
        .map_err(domain)?;
    Ok(serde_json::json!({ "ok": true }))
}

async fn handle_verify_withdrawal_pin(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: VerifyPinParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;

    let ledger = safe_lock(&state.ledger)?;
    let valid = ledger
        .verify_withdrawal_pin(&caller.id, &p.pin)
        .map_err(domain)?;
    Ok(serde_json::json!({ "valid": valid }))
}

//
// === Ledger operations ===
//

async fn handle_transfer(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TransferParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    let target = p.user_id.unwrap_or_else(|| caller.id.clone());
    ensure_self_or_admin(&caller, &target)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let tx = ledger
        .transfer(&target, p.from, p.to, p.amount, p.idempotency_key)
        .map_err(domain)?;
    to_json(&tx)
}

async fn handle_admin_adjust_funds(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: AdminAdjustParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let user = ledger
        .admin_adjust_funds(&p.user_id, p.wallet, p.amount, p.direction)
        .map_err(domain)?;
    to_json(&UserView::from(&user))
}

async fn handle_request_deposit(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: RequestTransactionParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    let target = p.user_id.unwrap_or_else(|| caller.id.clone());
    ensure_self_or_admin(&caller, &target)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let tx = ledger
        .request_deposit(&target, p.amount, p.method, p.idempotency_key)
        .map_err(domain)?;
    to_json(&tx)
}

async fn handle_request_withdrawal(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: RequestTransactionParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    let target = p.user_id.unwrap_or_else(|| caller.id.clone());
    ensure_self_or_admin(&caller, &target)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let tx = ledger
        .request_withdrawal(&target, p.amount, p.method, p.idempotency_key)
        .map_err(domain)?;
    to_json(&tx)
}

async fn handle_approve_transaction(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: ApproveTransactionParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let tx = ledger
        .approve_transaction(&p.tx_id, p.decision)
        .map_err(domain)?;
    to_json(&tx)
}

async fn handle_subscribe_investment(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: SubscribeInvestmentParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    let target = p.user_id.unwrap_or_else(|| caller.id.clone());
    ensure_self_or_admin(&caller, &target)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let investment = ledger
        .subscribe_investment(&target, &p.package_id, p.amount, p.duration_months, p.daily_rate)
        .map_err(domain)?;
    to_json(&investment)
}

async fn handle_settle_trade(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: SettleTradeParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;

    let mut ledger = safe_lock(&state.ledger)?;
    let settlement = ledger
        .settle_trade(&caller.id, p.amount, p.outcome)
        .map_err(domain)?;
    to_json(&settlement)
}

//
// === Transaction log ===
//

async fn handle_list_pending(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TokenParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let ledger = safe_lock(&state.ledger)?;
    to_json(&ledger.transactions().list_pending())
}

async fn handle_list_user_transactions(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: ListUserTransactionsParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    let target = p.user_id.unwrap_or_else(|| caller.id.clone());
    ensure_self_or_admin(&caller, &target)?;

    let ledger = safe_lock(&state.ledger)?;
    to_json(&ledger.transactions().list_for_user(&target))
}

//
// === Platform config ===
//

async fn handle_get_deposit_addresses(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TokenParams = parse(params)?;
    authenticate(&state, &p.token)?;

    let platform = safe_lock(&state.platform)?;
    to_json(platform.deposit_addresses())
}

async fn handle_update_deposit_address(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: UpdateDepositAddressParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let mut platform = safe_lock(&state.platform)?;
    let addresses = platform
        .update_deposit_address(p.asset, &p.address)
        .map_err(domain)?;
    to_json(addresses)
}

//
// === Support chat ===
//

async fn handle_send_chat_message(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: SendChatMessageParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;

    let mut support = safe_lock(&state.support)?;
    let session = support.send_message(
        &caller.id,
        &caller.name,
        &p.message,
        p.is_issue,
        state.classifier.as_ref(),
    );
    to_json(&session)
}

async fn handle_get_chat_session(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TokenParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;

    let mut support = safe_lock(&state.support)?;
    to_json(support.session_for(&caller.id))
}

async fn handle_mark_chat_read(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TokenParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;

    let mut support = safe_lock(&state.support)?;
    support.mark_read(&caller.id);
    Ok(serde_json::json!({ "ok": true }))
}

async fn handle_list_support_log(
    state: RpcState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: TokenParams = parse(params)?;
    let caller = authenticate(&state, &p.token)?;
    require_admin(&caller)?;

    let support = safe_lock(&state.support)?;
    to_json(&support.list_log())
}

async fn handle_get_version() -> Result<serde_json::Value, RpcError> {
    Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::auth::SessionManager;
    use crate::ledger::Ledger;
    use crate::platform::PlatformConfig;
    use crate::seed::seed_demo;
    use crate::support::{CannedClassifier, SupportDesk};
    use serde_json::json;

    fn test_state() -> RpcState {
        let mut ledger = Ledger::new();
        seed_demo(&mut ledger).unwrap();
        RpcState {
            ledger: Arc::new(Mutex::new(ledger)),
            sessions: Arc::new(Mutex::new(SessionManager::new())),
            support: Arc::new(Mutex::new(SupportDesk::new())),
            platform: Arc::new(Mutex::new(PlatformConfig::new())),
            classifier: Arc::new(CannedClassifier),
        }
    }

    async fn call(state: &RpcState, method: &str, params: serde_json::Value) -> RpcResponse {
        let req = RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };
        handle_rpc_request(State(state.clone()), Json(req)).await.0
    }

    async fn login(state: &RpcState, email: &str, password: &str) -> String {
        let resp = call(state, "login", json!({ "email": email, "password": password })).await;
        resp.result.unwrap()["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_strips_credential_hashes() {
        let state = test_state();
        let resp = call(
            &state,
            "login",
            json!({ "email": "alex@scalperhub.com", "password": "password123" }),
        )
        .await;

        let result = resp.result.unwrap();
        assert_eq!(result["user"]["id"], "user-1");
        assert!(result["user"].get("password_hash").is_none());
        assert!(result["user"].get("withdrawal_pin_hash").is_none());
    }

    #[tokio::test]
    async fn test_admin_methods_refuse_non_admin_sessions() {
        let state = test_state();
        let token = login(&state, "alex@scalperhub.com", "password123").await;

        // role comes from the stored account, not from anything in the request
        let resp = call(
            &state,
            "adminAdjustFunds",
            json!({
                "token": token.as_str(),
                "user_id": "user-1",
                "wallet": "capital",
                "amount": 1000,
                "direction": "CREDIT",
                "role": "ADMIN"
            }),
        )
        .await;

        assert_eq!(resp.error.unwrap().message, "not authorized");
    }

    #[tokio::test]
    async fn test_admin_adjust_and_approve_via_rpc() {
        let state = test_state();
        let token = login(&state, "admin@scalperhub.com", "admin").await;

        let resp = call(
            &state,
            "adminAdjustFunds",
            json!({
                "token": token.as_str(),
                "user_id": "user-1",
                "wallet": "bonus",
                "amount": 50,
                "direction": "CREDIT"
            }),
        )
        .await;
        assert_eq!(resp.result.unwrap()["bonus"], json!(150.0));

        // resolve the seeded pending deposit, then a retry must fail
        let pending = call(&state, "listPendingTransactions", json!({ "token": token.as_str() })).await;
        let tx_id = pending.result.unwrap()[0]["id"].as_str().unwrap().to_string();

        let resp = call(
            &state,
            "approveTransaction",
            json!({ "token": token.as_str(), "tx_id": tx_id.as_str(), "decision": "APPROVE" }),
        )
        .await;
        assert_eq!(resp.result.unwrap()["status"], "APPROVED");

        let resp = call(
            &state,
            "approveTransaction",
            json!({ "token": token.as_str(), "tx_id": tx_id.as_str(), "decision": "APPROVE" }),
        )
        .await;
        assert_eq!(resp.error.unwrap().message, "transaction already resolved");
    }

    #[tokio::test]
    async fn test_cross_account_access_refused() {
        let state = test_state();
        let token = login(&state, "alex@scalperhub.com", "password123").await;

        let resp = call(
            &state,
            "listUserTransactions",
            json!({ "token": token.as_str(), "user_id": "user-2" }),
        )
        .await;
        assert!(resp.error.is_some());

        let resp = call(
            &state,
            "listUserTransactions",
            json!({ "token": token.as_str() }),
        )
        .await;
        assert!(resp.result.is_some());
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_token() {
        let state = test_state();

        let resp = call(&state, "mintGold", json!({})).await;
        assert_eq!(resp.error.unwrap().code, -32601);

        let resp = call(&state, "listUsers", json!({ "token": "bogus" })).await;
        assert_eq!(resp.error.unwrap().message, "not authorized");
    }
}
