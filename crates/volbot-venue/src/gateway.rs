use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use volbot_models::{AccountId, AssetId};

use crate::error::VenueError;

/// An account able to hold a non-native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAccount {
    pub address: String,
    pub owner: AccountId,
    pub asset: AssetId,
    /// Balance in raw units.
    pub balance: u64,
}

/// A quoted swap path. Amounts are raw units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub from: AssetId,
    pub to: AssetId,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Least output the execution may accept under the requested slippage.
    pub min_out_amount: u64,
    pub slippage_bps: u16,
}

/// Outcome of a state-changing venue call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub transaction_id: String,
}

/// Capabilities the trading core needs from a venue client.
///
/// Implementations own connection handling, signing and timeouts. Every amount is in raw units.
#[async_trait]
pub trait VenueGateway: Send + Sync {
    async fn native_balance(&self, account: &AccountId) -> Result<u64, VenueError>;

    async fn asset_account(
        &self,
        account: &AccountId,
        asset: &AssetId,
    ) -> Result<Option<AssetAccount>, VenueError>;

    async fn provision_asset_account(
        &self,
        account: &AccountId,
        asset: &AssetId,
    ) -> Result<AssetAccount, VenueError>;

    async fn find_route(
        &self,
        from: &AssetId,
        to: &AssetId,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Route, VenueError>;

    async fn execute_route(
        &self,
        account: &AccountId,
        route: &Route,
    ) -> Result<Execution, VenueError>;

    /// Test networks only.
    async fn request_faucet_funds(
        &self,
        account: &AccountId,
        amount: u64,
    ) -> Result<Execution, VenueError>;

    async fn transfer_native(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<Execution, VenueError>;

    async fn transfer_asset(
        &self,
        from: &AccountId,
        to: &AccountId,
        asset: &AssetId,
        amount: u64,
    ) -> Result<Execution, VenueError>;
}
