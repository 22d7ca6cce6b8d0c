//! Bridge routes and the static fallback table.
//!
//! The fallback routes go straight to the OP Stack standard bridges, so a
//! route is always available even when the quoting service is down.

use alloy::{
    primitives::{address, Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};

use crate::types::Direction;

sol! {
    /// L1StandardBridge: bridge native ETH to the caller on L2.
    function depositETH(uint32 _minGasLimit, bytes _extraData);

    /// L2StandardBridge: withdraw `_amount` of `_l2Token` back to L1.
    function withdraw(address _l2Token, uint256 _amount, uint32 _minGasLimit, bytes _extraData);
}

/// L1StandardBridge proxy on the home network.
pub const L1_STANDARD_BRIDGE: Address = address!("ea58fcA6849d79EAd1f26608855c2D6407d54Ce2");

/// L2StandardBridge predeploy on the companion network.
pub const L2_STANDARD_BRIDGE: Address = address!("4200000000000000000000000000000000000010");

/// Legacy ERC20 address the L2 bridge uses for native ETH.
pub const L2_LEGACY_ETH: Address = address!("DeadDeAddeAddEAddeadDEaDDEAdDeaDDeAD0000");

pub const FALLBACK_MIN_GAS_LIMIT: u32 = 200_000;

/// Where and how to send the funding transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRoute {
    pub destination: Address,
    pub call_data: Bytes,
    /// Value the route asks for. The funding transaction always sends the drawn amount.
    pub declared_value: U256,
    pub declared_chain_id: Option<u64>,
    /// True for routes from the static table.
    pub is_fallback: bool,
}

/// Static route for `direction`, for sending `amount` wei.
pub fn fallback_route(direction: Direction, amount: U256) -> BridgeRoute {
    let (destination, call_data) = match direction {
        Direction::HomeToCompanion => (
            L1_STANDARD_BRIDGE,
            depositETHCall {
                _minGasLimit: FALLBACK_MIN_GAS_LIMIT,
                _extraData: Bytes::new(),
            }
            .abi_encode(),
        ),
        Direction::CompanionToHome => (
            L2_STANDARD_BRIDGE,
            withdrawCall {
                _l2Token: L2_LEGACY_ETH,
                _amount: amount,
                _minGasLimit: FALLBACK_MIN_GAS_LIMIT,
                _extraData: Bytes::new(),
            }
            .abi_encode(),
        ),
    };

    BridgeRoute {
        destination,
        call_data: call_data.into(),
        declared_value: amount,
        declared_chain_id: None,
        is_fallback: true,
    }
}
