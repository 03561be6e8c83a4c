//! Integration tests for stamina regeneration and the stamina potion.

use chrono::{Duration, Utc};
use pixelrpg::game::{GameError, GameStoreBuilder, STAMINA_POTION};
use tempfile::tempdir;

#[test]
fn sweep_skips_players_with_no_regen_clock() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();

    // A fresh player has never spent stamina; hours later the sweep still
    // has nothing to credit.
    let credited = store.run_stamina_sweep(now + Duration::hours(10)).unwrap();
    assert_eq!(credited, 0);
    assert_eq!(store.get_player(1).unwrap().unwrap().stamina, 5);
}

#[test]
fn spending_stamina_starts_the_clock() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let start = Utc::now();
    store.ensure_player(1, "Alice", start).unwrap();
    store.commit_dungeon_at_tier(1, 3, 1, start).unwrap();

    let player = store.get_player(1).unwrap().unwrap();
    assert_eq!(player.stamina, 2);
    assert_eq!(player.last_stamina_time, Some(start));
}

#[test]
fn whole_intervals_credit_one_point_each() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let start = Utc::now();
    store.ensure_player(1, "Alice", start).unwrap();
    store.commit_dungeon_at_tier(1, 3, 1, start).unwrap();

    // 61 minutes: two whole intervals, one minute of fractional progress.
    let credited = store
        .run_stamina_sweep(start + Duration::minutes(61))
        .unwrap();
    assert_eq!(credited, 1);
    let player = store.get_player(1).unwrap().unwrap();
    assert_eq!(player.stamina, 4);
    assert_eq!(player.last_stamina_time, Some(start + Duration::minutes(60)));
}

#[test]
fn fractional_progress_survives_sweep_jitter() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let start = Utc::now();
    store.ensure_player(1, "Alice", start).unwrap();
    store.commit_dungeon_at_tier(1, 4, 1, start).unwrap();

    store.run_stamina_sweep(start + Duration::minutes(45)).unwrap();
    assert_eq!(store.get_player(1).unwrap().unwrap().stamina, 2);

    // 29 minutes after the credited tick: nothing yet.
    let credited = store
        .run_stamina_sweep(start + Duration::minutes(59))
        .unwrap();
    assert_eq!(credited, 0);

    // The tick lands at start+60 exactly because the clock advanced by the
    // credited interval, not to the sweep time.
    let credited = store
        .run_stamina_sweep(start + Duration::minutes(60))
        .unwrap();
    assert_eq!(credited, 1);
    assert_eq!(store.get_player(1).unwrap().unwrap().stamina, 3);
}

#[test]
fn stamina_never_exceeds_the_cap() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let start = Utc::now();
    store.ensure_player(1, "Alice", start).unwrap();
    store.commit_dungeon_at_tier(1, 3, 1, start).unwrap();

    // A week away: far more elapsed intervals than missing points.
    store.run_stamina_sweep(start + Duration::days(7)).unwrap();
    let player = store.get_player(1).unwrap().unwrap();
    assert_eq!(player.stamina, 5);

    let credited = store
        .run_stamina_sweep(start + Duration::days(7))
        .unwrap();
    assert_eq!(credited, 0, "at-cap players are skipped");
    assert_eq!(store.get_player(1).unwrap().unwrap().stamina, 5);
}

#[test]
fn rerunning_the_sweep_immediately_is_a_noop() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let start = Utc::now();
    store.ensure_player(1, "Alice", start).unwrap();
    store.commit_dungeon_at_tier(1, 2, 1, start).unwrap();

    let later = start + Duration::minutes(30);
    assert_eq!(store.run_stamina_sweep(later).unwrap(), 1);
    assert_eq!(store.run_stamina_sweep(later).unwrap(), 0);
    assert_eq!(store.get_player(1).unwrap().unwrap().stamina, 4);
}

#[test]
fn sweep_covers_multiple_players_independently() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let start = Utc::now();
    store.ensure_player(1, "Alice", start).unwrap();
    store.ensure_player(2, "Bob", start).unwrap();
    store.ensure_player(3, "Carol", start).unwrap();
    store.commit_dungeon_at_tier(1, 2, 1, start).unwrap();
    store.commit_dungeon_at_tier(2, 1, 1, start).unwrap();
    // Carol never spends; her clock stays unset.

    let credited = store
        .run_stamina_sweep(start + Duration::minutes(35))
        .unwrap();
    assert_eq!(credited, 2);
    assert_eq!(store.get_player(1).unwrap().unwrap().stamina, 4);
    assert_eq!(store.get_player(2).unwrap().unwrap().stamina, 5);
    assert_eq!(store.get_player(3).unwrap().unwrap().stamina, 5);
}

#[test]
fn stamina_potion_restores_one_point() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();
    store.commit_dungeon_at_tier(1, 2, 1, now).unwrap();

    let potion = store.find_item_by_name(STAMINA_POTION).unwrap().unwrap();
    store.add_item(1, potion.id, 1).unwrap();

    assert_eq!(store.use_stamina_potion(1).unwrap(), 4);
    assert_eq!(store.item_quantity(1, potion.id).unwrap(), 0);

    // The empty inventory is an error, not a negative quantity.
    let err = store.use_stamina_potion(1).unwrap_err();
    assert!(matches!(err, GameError::InsufficientItems));
}

#[test]
fn stamina_potion_rejected_at_full_stamina() {
    let tmp = tempdir().unwrap();
    let store = GameStoreBuilder::new(tmp.path()).open().unwrap();
    let now = Utc::now();
    store.ensure_player(1, "Alice", now).unwrap();

    let potion = store.find_item_by_name(STAMINA_POTION).unwrap().unwrap();
    store.add_item(1, potion.id, 1).unwrap();

    let err = store.use_stamina_potion(1).unwrap_err();
    assert!(matches!(err, GameError::StaminaFull));
    assert_eq!(store.item_quantity(1, potion.id).unwrap(), 1, "potion kept");
}
