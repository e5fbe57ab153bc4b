use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::info;

use scalperhub::account::auth::SessionManager;
use scalperhub::cli::{Cli, Commands};
use scalperhub::ledger::Ledger;
use scalperhub::platform::PlatformConfig;
use scalperhub::rpc::RpcServer;
use scalperhub::seed::seed_demo;
use scalperhub::storage::Storage;
use scalperhub::support::{CannedClassifier, SupportDesk};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { rpc_port, db, seed } => run_server(rpc_port, db, seed).await,
    }
}

async fn run_server(rpc_port: u16, db: Option<String>, seed: bool) {
    let storage = match &db {
        Some(path) => Storage::open(path),
        None => Storage::temporary(),
    }
    .expect("Failed to open storage");
    let storage = Arc::new(storage);

    let mut ledger = Ledger::with_storage(storage.clone()).expect("Failed to load ledger");

    if seed {
        if ledger.accounts().all_users().is_empty() {
            seed_demo(&mut ledger).expect("Failed to seed demo data");
        } else {
            info!("database already populated, skipping seed");
        }
    }

    info!(
        users = ledger.accounts().all_users().len(),
        db = db.as_deref().unwrap_or("<memory>"),
        "ledger loaded"
    );

    let server = RpcServer::new(
        Arc::new(Mutex::new(ledger)),
        Arc::new(Mutex::new(SessionManager::new())),
        Arc::new(Mutex::new(SupportDesk::new())),
        Arc::new(Mutex::new(PlatformConfig::new())),
        Arc::new(CannedClassifier),
        rpc_port,
    );

    server.start().await;
}
