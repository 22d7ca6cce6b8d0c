pub mod bridge;
pub mod chain;
pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod operations;
pub mod proxy;
pub mod types;
pub mod utils;
pub mod wallet;

pub use bridge::BridgeOrchestrator;
pub use chain::ChainClient;
pub use error::{Result, WalletError};
pub use types::{Direction, Network, OperationOutcome, TxResult};
pub use wallet::{ExecutionManager, WalletSession};
