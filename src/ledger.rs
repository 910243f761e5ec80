use std::collections::BTreeSet;
use std::rc::Rc;

use chrono::NaiveDate;

use crate::config::Config;
use crate::error::PersistenceError;
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::types::UserId;

/// Dates per user whose local records still wait for a confirmed remote write.
///
/// Stored as one sorted JSON array per user next to the cache entries.
pub struct PendingLedger<S> {
    store: Rc<S>,
    config: Rc<Config>,
}

impl<S: KeyValueStore> PendingLedger<S> {
    pub fn new(store: Rc<S>, config: Rc<Config>) -> Self {
        Self { store, config }
    }

    fn load(&self, user: &UserId) -> Result<BTreeSet<NaiveDate>, PersistenceError> {
        let dates: Option<BTreeSet<NaiveDate>> =
            load_json(self.store.as_ref(), &self.config.pending_key(user))?;
        Ok(dates.unwrap_or_default())
    }

    fn save(&self, user: &UserId, dates: &BTreeSet<NaiveDate>) -> Result<(), PersistenceError> {
        let key = self.config.pending_key(user);
        if dates.is_empty() {
            self.store.remove_item(&key)
        } else {
            save_json(self.store.as_ref(), &key, dates)
        }
    }

    pub fn mark_pending(&self, user: &UserId, date: NaiveDate) -> Result<(), PersistenceError> {
        let mut dates = self.load(user)?;
        if dates.insert(date) {
            self.save(user, &dates)?;
        }
        Ok(())
    }

    pub fn clear_pending(&self, user: &UserId, date: NaiveDate) -> Result<(), PersistenceError> {
        let mut dates = self.load(user)?;
        if dates.remove(&date) {
            self.save(user, &dates)?;
        }
        Ok(())
    }

    pub fn is_pending(&self, user: &UserId, date: NaiveDate) -> Result<bool, PersistenceError> {
        Ok(self.load(user)?.contains(&date))
    }

    /// Pending dates in calendar order, read at call time. Call again for a fresh view.
    pub fn list_pending(
        &self,
        user: &UserId,
    ) -> Result<impl Iterator<Item = NaiveDate>, PersistenceError> {
        Ok(self.load(user)?.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn ledger(store: &MemoryStore) -> PendingLedger<MemoryStore> {
        PendingLedger::new(Rc::new(store.clone()), Rc::new(Config::default()))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_mark_pending_is_idempotent() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");
        let l = ledger(&store);

        l.mark_pending(&user, day(5)).unwrap();
        let once = store.get_item(&Config::default().pending_key(&user)).unwrap();
        l.mark_pending(&user, day(5)).unwrap();
        let twice = store.get_item(&Config::default().pending_key(&user)).unwrap();

        assert_eq!(once, twice);
        assert_eq!(l.list_pending(&user).unwrap().collect::<Vec<_>>(), vec![day(5)]);
    }

    #[test]
    fn test_clear_pending_is_idempotent_and_drops_empty_key() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");
        let l = ledger(&store);

        l.clear_pending(&user, day(5)).unwrap();
        l.mark_pending(&user, day(5)).unwrap();
        l.clear_pending(&user, day(5)).unwrap();
        l.clear_pending(&user, day(5)).unwrap();

        assert!(!l.is_pending(&user, day(5)).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_pending_is_ordered_and_restartable() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");
        let l = ledger(&store);
        l.mark_pending(&user, day(9)).unwrap();
        l.mark_pending(&user, day(2)).unwrap();

        let first: Vec<_> = l.list_pending(&user).unwrap().collect();
        assert_eq!(first, vec![day(2), day(9)]);

        l.clear_pending(&user, day(2)).unwrap();
        let second: Vec<_> = l.list_pending(&user).unwrap().collect();
        assert_eq!(second, vec![day(9)]);
    }

    #[test]
    fn test_ledger_is_per_user() {
        let store = MemoryStore::new();
        let l = ledger(&store);
        l.mark_pending(&UserId::new("alice"), day(5)).unwrap();
        assert_eq!(l.list_pending(&UserId::new("bob")).unwrap().count(), 0);
    }
}
