pub mod execution;
pub mod keys;
pub mod progress;

use std::sync::Arc;

use alloy::{network::EthereumWallet, primitives::Address, signers::local::PrivateKeySigner};
use tracing::debug;

use crate::{
    chain::{ChainClient, RpcConnector},
    config::Settings,
    error::Result,
    proxy::ProxyPool,
    types::Network,
};

pub use self::{execution::ExecutionManager, progress::ProgressStats};

/// One private key and its pair of chain clients.
///
/// Lives for a single wallet's operation cycle and owns both clients
/// exclusively.
#[derive(Debug)]
pub struct WalletSession {
    address: Address,
    home: ChainClient,
    companion: ChainClient,
}

impl WalletSession {
    /// Creates a new WalletSession
    ///
    /// # Arguments
    /// * `signer` - Key used for every transaction in this session
    /// * `settings` - Resolved configuration (network parameters, gas policy)
    /// * `pool` - Process-wide proxy pool
    /// * `connector` - Builds the RPC transport for each network
    ///
    /// # Returns
    /// * `Result<Self>` - Session with one connected client per network
    pub fn new(
        signer: PrivateKeySigner,
        settings: &Settings,
        pool: Arc<ProxyPool>,
        connector: Arc<dyn RpcConnector>,
    ) -> Result<Self> {
        let address = signer.address();
        let wallet = EthereumWallet::new(signer);

        let connect = |network: Network| {
            ChainClient::new(
                network,
                settings.network(network).clone(),
                settings.gas.clone(),
                address,
                Some(wallet.clone()),
                pool.clone(),
                connector.clone(),
            )
        };
        let home = connect(Network::Home)?;
        let companion = connect(Network::Companion)?;

        debug!(address = %address, "Wallet session ready");
        Ok(Self {
            address,
            home,
            companion,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn client(&self, network: Network) -> &ChainClient {
        match network {
            Network::Home => &self.home,
            Network::Companion => &self.companion,
        }
    }

    pub fn client_mut(&mut self, network: Network) -> &mut ChainClient {
        match network {
            Network::Home => &mut self.home,
            Network::Companion => &mut self.companion,
        }
    }

    /// Forces the next nonce lookup on both networks to go to the chain.
    pub fn reset_nonces(&mut self) {
        self.home.reset_nonce();
        self.companion.reset_nonce();
    }
}
