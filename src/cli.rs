use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "scalperhub", about = "ScalperHub ledger service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the JSON-RPC server
    Serve {
        /// Port for the RPC server
        #[arg(long, default_value_t = 8545)]
        rpc_port: u16,

        /// Database directory; omit for an in-memory database
        #[arg(long)]
        db: Option<String>,

        /// Load the demo accounts and pending transactions
        #[arg(long, default_value_t = false)]
        seed: bool,
    },
}
