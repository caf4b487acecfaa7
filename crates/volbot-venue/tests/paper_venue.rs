//! Integration tests for the paper venue and the retry executor running against it.
//!
//! The pool is seeded at 1000 native / 1e9 tokens, i.e. 0.000001 native per token.

use std::time::Duration;

use rust_decimal_macros::dec;
use volbot_models::{AccountId, AssetId, RetryPolicy, TrackedAsset};
use volbot_venue::{execute_with_retry, PaperVenue, RetryError, VenueError, VenueGateway};

const LAMPORTS: u64 = 1_000_000_000;

fn token() -> TrackedAsset {
    TrackedAsset::new("TokenMint1111111111111111111111111111111111", 6)
}

fn venue() -> PaperVenue {
    PaperVenue::new()
        .with_pool(&token(), dec!(1000), dec!(1000000000))
        .unwrap()
}

#[tokio::test]
async fn buy_route_moves_balances_and_reserves() {
    let venue = venue();
    let account = AccountId::new("agent-1");
    venue.set_native_balance(&account, 2 * LAMPORTS);

    let route = venue
        .find_route(&AssetId::native(), &token().id, LAMPORTS, 50)
        .await
        .unwrap();
    // 1 native into a 1000 native pool returns slightly less than 1e6 tokens
    assert!(route.out_amount < 1_000_000 * 1_000_000);
    assert!(route.out_amount > 990_000 * 1_000_000);
    assert!(route.min_out_amount < route.out_amount);

    let execution = venue.execute_route(&account, &route).await.unwrap();
    assert!(execution.transaction_id.starts_with("paper_"));
    assert_eq!(venue.native_balance_of(&account), LAMPORTS);
    assert_eq!(venue.asset_balance_of(&account, &token().id), route.out_amount);

    // The pool moved: the same size now buys fewer tokens
    let next = venue
        .find_route(&AssetId::native(), &token().id, LAMPORTS, 50)
        .await
        .unwrap();
    assert!(next.out_amount < route.out_amount);
}

#[tokio::test]
async fn sell_route_returns_native() {
    let venue = venue();
    let account = AccountId::new("agent-1");
    venue.set_asset_balance(&account, &token().id, 1_000_000 * 1_000_000);

    let route = venue
        .find_route(&token().id, &AssetId::native(), 500_000 * 1_000_000, 100)
        .await
        .unwrap();
    venue.execute_route(&account, &route).await.unwrap();

    assert_eq!(
        venue.asset_balance_of(&account, &token().id),
        500_000 * 1_000_000
    );
    assert_eq!(venue.native_balance_of(&account), route.out_amount);
}

#[tokio::test]
async fn unknown_asset_has_no_route() {
    let venue = venue();
    let other = AssetId::new("Unlisted");
    let result = venue
        .find_route(&AssetId::native(), &other, LAMPORTS, 50)
        .await;
    assert!(matches!(result, Err(VenueError::NoRoute { .. })));
}

#[tokio::test]
async fn disabled_routes_and_rejections() {
    let venue = venue();
    let account = AccountId::new("agent-1");
    venue.set_native_balance(&account, LAMPORTS);

    let route = venue
        .find_route(&AssetId::native(), &token().id, LAMPORTS / 2, 50)
        .await
        .unwrap();

    venue.reject_executions(Some("blockhash expired"));
    let result = venue.execute_route(&account, &route).await;
    assert_eq!(
        result,
        Err(VenueError::Rejected("blockhash expired".to_string()))
    );
    assert_eq!(venue.native_balance_of(&account), LAMPORTS);

    venue.set_routes_enabled(false);
    let result = venue
        .find_route(&AssetId::native(), &token().id, LAMPORTS / 2, 50)
        .await;
    assert!(matches!(result, Err(VenueError::NoRoute { .. })));
}

#[tokio::test]
async fn swap_without_funds_is_rejected() {
    let venue = venue();
    let account = AccountId::new("broke");
    let route = venue
        .find_route(&AssetId::native(), &token().id, LAMPORTS, 50)
        .await
        .unwrap();

    let result = venue.execute_route(&account, &route).await;
    assert_eq!(
        result,
        Err(VenueError::InsufficientFunds {
            required: LAMPORTS,
            available: 0
        })
    );
}

#[tokio::test]
async fn provisioning_and_transfers() {
    let venue = venue();
    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");

    assert!(venue
        .asset_account(&alice, &token().id)
        .await
        .unwrap()
        .is_none());
    let account = venue
        .provision_asset_account(&alice, &token().id)
        .await
        .unwrap();
    assert_eq!(account.balance, 0);

    venue.request_faucet_funds(&alice, 3 * LAMPORTS).await.unwrap();
    venue.transfer_native(&alice, &bob, LAMPORTS).await.unwrap();
    assert_eq!(venue.native_balance_of(&alice), 2 * LAMPORTS);
    assert_eq!(venue.native_balance_of(&bob), LAMPORTS);

    venue.set_asset_balance(&alice, &token().id, 10);
    venue
        .transfer_asset(&alice, &bob, &token().id, 4)
        .await
        .unwrap();
    assert_eq!(venue.asset_balance_of(&bob, &token().id), 4);

    let result = venue.transfer_asset(&bob, &alice, &AssetId::new("x"), 1).await;
    assert!(matches!(result, Err(VenueError::AccountNotFound(_))));
}

#[tokio::test]
async fn failed_provisioning() {
    let venue = venue();
    venue.set_provisioning_fails(true);
    let result = venue
        .provision_asset_account(&AccountId::new("a"), &token().id)
        .await;
    assert!(matches!(result, Err(VenueError::Unavailable(_))));
}

#[tokio::test]
async fn retry_rides_out_injected_rate_limits() {
    let venue = venue();
    let account = AccountId::new("agent-1");
    venue.set_native_balance(&account, 7);
    venue.fail_next_with_rate_limit(2);

    let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0);
    let balance = execute_with_retry(&policy, || venue.native_balance(&account))
        .await
        .unwrap();

    assert_eq!(balance, 7);
    assert_eq!(venue.balance_requests(), 3);
}

#[tokio::test]
async fn retry_exhaustion_carries_last_error() {
    let venue = venue();
    venue.fail_next_with_rate_limit(10);

    let native = AssetId::native();
    let asset = token().id;
    let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0);
    let result = execute_with_retry(&policy, || {
        venue.find_route(&native, &asset, LAMPORTS, 50)
    })
    .await;

    assert_eq!(
        result,
        Err(RetryError::Exhausted {
            attempts: 3,
            last: VenueError::RateLimited
        })
    );
    assert_eq!(venue.route_requests(), 3);
}
