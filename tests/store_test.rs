use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use matcha_stockbot::db;
use matcha_stockbot::store::{SqliteStateStore, StateStore, StoreError};

async fn memory_store(table: &str) -> SqliteStateStore {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    SqliteStateStore::open(pool, table).await.unwrap()
}

fn items(titles: &[&str]) -> Vec<String> {
    titles.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn get_missing_date_is_absent() {
    let store = memory_store("notification_state").await;
    assert!(store.get("2024-06-01").await.unwrap().is_none());
}

#[tokio::test]
async fn put_then_get_returns_record() {
    let store = memory_store("notification_state").await;
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 1, 2, 3).unwrap();
    store
        .put("2024-06-01", at, &items(&["Wako", "Aoarashi"]))
        .await
        .unwrap();

    let state = store.get("2024-06-01").await.unwrap().unwrap();
    assert_eq!(state.date, "2024-06-01");
    assert_eq!(state.notified_at, at);
    assert_eq!(state.in_stock_items, items(&["Wako", "Aoarashi"]));
    assert!(store.get("2024-06-02").await.unwrap().is_none());
}

#[tokio::test]
async fn put_replaces_instead_of_merging() {
    let store = memory_store("notification_state").await;
    let first = Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap();
    store
        .put("2024-06-01", first, &items(&["A", "B"]))
        .await
        .unwrap();
    store.put("2024-06-01", second, &items(&["C"])).await.unwrap();

    let state = store.get("2024-06-01").await.unwrap().unwrap();
    assert_eq!(state.notified_at, second);
    assert_eq!(state.in_stock_items, items(&["C"]));
    assert_eq!(
        db::count_state_rows(store.pool(), store.table()).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = memory_store("notification_state").await;
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap();
    store.put("2024-06-01", at, &items(&["A"])).await.unwrap();

    store.delete("2024-06-01").await.unwrap();
    assert!(store.get("2024-06-01").await.unwrap().is_none());
    store.delete("2024-06-01").await.unwrap();
    store.delete("1999-01-01").await.unwrap();
}

#[tokio::test]
async fn empty_item_list_round_trips() {
    let store = memory_store("notification_state").await;
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap();
    store.put("2024-06-01", at, &[]).await.unwrap();
    let state = store.get("2024-06-01").await.unwrap().unwrap();
    assert!(state.in_stock_items.is_empty());
}

#[tokio::test]
async fn tables_are_isolated() {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    let a = SqliteStateStore::open(pool.clone(), "shop_a").await.unwrap();
    let b = SqliteStateStore::open(pool, "shop_b").await.unwrap();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap();

    a.put("2024-06-01", at, &items(&["A"])).await.unwrap();
    assert!(b.get("2024-06-01").await.unwrap().is_none());
}

#[tokio::test]
async fn rejects_unsafe_table_name() {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    let err = SqliteStateStore::open(pool, "state; DROP TABLE users")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTableName(_)));
}

#[tokio::test]
async fn read_failure_is_an_error_not_absent() {
    let store = memory_store("notification_state").await;
    sqlx::query("DROP TABLE notification_state")
        .execute(store.pool())
        .await
        .unwrap();

    let err = store.get("2024-06-01").await.unwrap_err();
    assert!(matches!(err, StoreError::Read(_)));
    let err = store.delete("2024-06-01").await.unwrap_err();
    assert!(matches!(err, StoreError::Delete(_)));
}

#[tokio::test]
async fn undecodable_row_is_corrupt() {
    let store = memory_store("notification_state").await;
    sqlx::query(
        "INSERT INTO notification_state (date, notified_at, in_stock_items) VALUES (?, ?, ?)",
    )
    .bind("2024-06-01")
    .bind("2024-06-01T00:00:00Z")
    .bind("not json")
    .execute(store.pool())
    .await
    .unwrap();

    match store.get("2024-06-01").await {
        Err(StoreError::Corrupt { date, reason }) => {
            assert_eq!(date, "2024-06-01");
            assert!(reason.contains("in_stock_items"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn file_backed_state_survives_reopen() {
    let td = tempdir().unwrap();
    let url = format!("sqlite://{}", td.path().join("data/state.db").display());
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap();

    {
        let pool = db::init_pool(&url).await.unwrap();
        let store = SqliteStateStore::open(pool.clone(), "notification_state")
            .await
            .unwrap();
        store.put("2024-06-01", at, &items(&["Unkaku"])).await.unwrap();
        pool.close().await;
    }

    let pool = db::init_pool(&url).await.unwrap();
    let store = SqliteStateStore::open(pool, "notification_state")
        .await
        .unwrap();
    let state = store.get("2024-06-01").await.unwrap().unwrap();
    assert_eq!(state.in_stock_items, items(&["Unkaku"]));
}
