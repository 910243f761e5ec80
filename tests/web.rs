#![cfg(target_arch = "wasm32")]

use chrono::NaiveDate;
use liftlog::cache::LocalCache;
use liftlog::storage::LocalStorage;
use liftlog::{Config, KeyValueStore, UserId, WorkoutRecord};
use std::rc::Rc;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn local_storage_round_trips_a_cached_day() {
    let store = Rc::new(LocalStorage::open().unwrap());
    let config = Rc::new(Config::default().with_key_prefix("liftlog_test"));
    let cache = LocalCache::new(store.clone(), config.clone());
    let user = UserId::new("web");
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

    let record = WorkoutRecord::draft(&user, date, "Squat");
    cache.put(&user, date, &[record.clone()]).unwrap();
    assert_eq!(cache.get(&user, date).unwrap(), vec![record]);

    cache.remove(&user, date).unwrap();
    assert_eq!(store.get_item(&config.cache_key(&user, date)).unwrap(), None);
}
