use std::rc::Rc;

use chrono::NaiveDate;

use crate::config::Config;
use crate::error::PersistenceError;
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::types::{UserId, WorkoutRecord};

/// Last-known record list per (user, date), persisted in the key-value substrate.
pub struct LocalCache<S> {
    store: Rc<S>,
    config: Rc<Config>,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(store: Rc<S>, config: Rc<Config>) -> Self {
        Self { store, config }
    }

    /// Replaces whatever was stored for the day.
    pub fn put(
        &self,
        user: &UserId,
        date: NaiveDate,
        records: &[WorkoutRecord],
    ) -> Result<(), PersistenceError> {
        save_json(self.store.as_ref(), &self.config.cache_key(user, date), records)
    }

    /// A never-visited day is an empty list, not an error.
    pub fn get(&self, user: &UserId, date: NaiveDate) -> Result<Vec<WorkoutRecord>, PersistenceError> {
        let records: Option<Vec<WorkoutRecord>> =
            load_json(self.store.as_ref(), &self.config.cache_key(user, date))?;
        Ok(records.unwrap_or_default())
    }

    pub fn remove(&self, user: &UserId, date: NaiveDate) -> Result<(), PersistenceError> {
        self.store.remove_item(&self.config.cache_key(user, date))
    }
}
