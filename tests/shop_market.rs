//! Integration tests for the global shop and the player marketplace.

use chrono::{Duration, Utc};
use pixelrpg::game::{GameError, GameStoreBuilder, STAMINA_POTION};
use tempfile::tempdir;

#[test]
fn seeded_shop_lists_three_entries() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();

    let shop = store.list_global_shop().unwrap();
    assert_eq!(shop.len(), 3);
    let potion = shop
        .iter()
        .find(|(item, _)| item.name == STAMINA_POTION)
        .expect("stamina potion stocked");
    assert_eq!(potion.1.price, 50);
    assert_eq!(potion.1.stock, Some(100));
}

#[test]
fn buy_global_checks_funds_before_anything_moves() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();
    let potion = store.find_item_by_name(STAMINA_POTION).unwrap().unwrap();

    let err = store.buy_global(1, potion.id, now).unwrap_err();
    assert!(matches!(
        err,
        GameError::InsufficientFunds { have: 0, need: 50 }
    ));
    assert_eq!(store.item_quantity(1, potion.id).unwrap(), 0);

    store.grant_coins(1, 120).unwrap();
    store.buy_global(1, potion.id, now).unwrap();
    store.buy_global(1, potion.id, now).unwrap();

    let player = store.get_player(1).unwrap().unwrap();
    assert_eq!(player.coins, 20);
    assert_eq!(store.item_quantity(1, potion.id).unwrap(), 2);

    let shop = store.list_global_shop().unwrap();
    let entry = shop
        .iter()
        .find(|(item, _)| item.id == potion.id)
        .unwrap();
    assert_eq!(entry.1.stock, Some(98));
}

#[test]
fn buy_global_rejects_unknown_entries() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();
    store.grant_coins(1, 1000).unwrap();

    // A catalog item that is not stocked in the shop.
    let sword = store.find_item_by_name("Wooden Sword").unwrap().unwrap();
    let err = store.buy_global(1, sword.id, now).unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)));
}

#[test]
fn depleted_stock_blocks_purchases() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();
    let key = store.find_item_by_name("Dungeon Key").unwrap().unwrap();
    store.grant_coins(1, 150 * 51).unwrap();

    for _ in 0..50 {
        store.buy_global(1, key.id, now).unwrap();
    }
    assert_eq!(store.item_quantity(1, key.id).unwrap(), 50);

    let err = store.buy_global(1, key.id, now).unwrap_err();
    assert!(matches!(err, GameError::OutOfStock));
    let player = store.get_player(1).unwrap().unwrap();
    assert_eq!(player.coins, 150, "no charge on a failed purchase");
}

#[test]
fn restock_resets_to_baseline_after_the_interval() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();
    let potion = store.find_item_by_name(STAMINA_POTION).unwrap().unwrap();
    store.grant_coins(1, 500).unwrap();
    for _ in 0..5 {
        store.buy_global(1, potion.id, now).unwrap();
    }

    // Default interval is a day; an early sweep changes nothing.
    assert_eq!(store.run_restock_sweep(now + Duration::hours(1)).unwrap(), 0);

    let restocked = store
        .run_restock_sweep(now + Duration::minutes(1441))
        .unwrap();
    assert_eq!(restocked, 1);
    let shop = store.list_global_shop().unwrap();
    let entry = shop
        .iter()
        .find(|(item, _)| item.id == potion.id)
        .unwrap();
    assert_eq!(entry.1.stock, Some(100), "back to the seeded baseline");
}

#[test]
fn create_listing_escrows_the_items() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();
    let sword = store.find_item_by_name("Iron Sword").unwrap().unwrap();
    store.add_item(1, sword.id, 3).unwrap();

    let listing = store.create_listing(1, sword.id, 2, 120, now).unwrap();
    assert_eq!(listing.quantity, 2);
    assert_eq!(listing.price, 120);
    assert_eq!(store.item_quantity(1, sword.id).unwrap(), 1, "escrowed out");
    assert_eq!(store.list_listings().unwrap().len(), 1);
}

#[test]
fn listing_requires_owned_items_and_positive_quantity() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();
    let sword = store.find_item_by_name("Iron Sword").unwrap().unwrap();
    store.add_item(1, sword.id, 1).unwrap();

    assert!(matches!(
        store.create_listing(1, sword.id, 2, 50, now).unwrap_err(),
        GameError::InsufficientItems
    ));
    assert!(matches!(
        store.create_listing(1, sword.id, 0, 50, now).unwrap_err(),
        GameError::InvalidListing(_)
    ));
    assert_eq!(store.item_quantity(1, sword.id).unwrap(), 1, "nothing escrowed");
}

#[test]
fn buying_a_listing_moves_coins_and_items_atomically() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Seller", now).unwrap();
    store.ensure_player(2, "Buyer", now).unwrap();
    let sword = store.find_item_by_name("Iron Sword").unwrap().unwrap();
    store.add_item(1, sword.id, 2).unwrap();
    store.grant_coins(2, 150).unwrap();

    let listing = store.create_listing(1, sword.id, 2, 120, now).unwrap();
    let bought = store.buy_listing(2, listing.id, now).unwrap();
    assert_eq!(bought.id, listing.id);

    assert_eq!(store.get_player(1).unwrap().unwrap().coins, 120);
    assert_eq!(store.get_player(2).unwrap().unwrap().coins, 30);
    assert_eq!(store.item_quantity(2, sword.id).unwrap(), 2);
    assert_eq!(store.item_quantity(1, sword.id).unwrap(), 0);
    assert!(store.list_listings().unwrap().is_empty(), "listing deleted");

    // The listing is gone; buying it again fails.
    assert!(matches!(
        store.buy_listing(2, listing.id, now).unwrap_err(),
        GameError::NotFound(_)
    ));
}

#[test]
fn underfunded_buyer_leaves_the_listing_intact() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Seller", now).unwrap();
    store.ensure_player(2, "Buyer", now).unwrap();
    let sword = store.find_item_by_name("Iron Sword").unwrap().unwrap();
    store.add_item(1, sword.id, 1).unwrap();
    let listing = store.create_listing(1, sword.id, 1, 500, now).unwrap();

    let err = store.buy_listing(2, listing.id, now).unwrap_err();
    assert!(matches!(err, GameError::InsufficientFunds { .. }));
    assert_eq!(store.list_listings().unwrap().len(), 1);
    assert_eq!(store.item_quantity(2, sword.id).unwrap(), 0);
}

#[test]
fn sellers_cannot_buy_their_own_listings() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Seller", now).unwrap();
    let sword = store.find_item_by_name("Iron Sword").unwrap().unwrap();
    store.add_item(1, sword.id, 1).unwrap();
    store.grant_coins(1, 1000).unwrap();
    let listing = store.create_listing(1, sword.id, 1, 100, now).unwrap();

    let err = store.buy_listing(1, listing.id, now).unwrap_err();
    assert!(matches!(err, GameError::InvalidListing(_)));
    assert_eq!(store.list_listings().unwrap().len(), 1);
}

#[test]
fn cancelling_returns_the_escrow_to_the_seller() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Seller", now).unwrap();
    store.ensure_player(2, "Other", now).unwrap();
    let sword = store.find_item_by_name("Iron Sword").unwrap().unwrap();
    store.add_item(1, sword.id, 2).unwrap();
    let listing = store.create_listing(1, sword.id, 2, 80, now).unwrap();

    // Only the seller may cancel.
    assert!(matches!(
        store.cancel_listing(2, listing.id).unwrap_err(),
        GameError::InvalidListing(_)
    ));

    store.cancel_listing(1, listing.id).unwrap();
    assert_eq!(store.item_quantity(1, sword.id).unwrap(), 2);
    assert!(store.list_listings().unwrap().is_empty());
}
