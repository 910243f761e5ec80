use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::RemoteStore;
use crate::error::RemoteError;
use crate::types::{RecordId, SetMap, UserId, WorkoutRecord};

/// One request as seen by [`MemoryRemote`].
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteCall {
    Create { date: NaiveDate, exercise: String },
    Update(i64),
    Upsert(Option<i64>),
    List(NaiveDate),
    Delete(i64),
}

struct Table {
    next_id: i64,
    rows: BTreeMap<i64, WorkoutRecord>,
    calls: Vec<RemoteCall>,
    reachable: bool,
    failing_dates: HashSet<NaiveDate>,
}

/// In-process remote store with a request log and injectable transport failures.
///
/// Ids are handed out in ascending order, like a serial primary key.
pub struct MemoryRemote {
    table: RefCell<Table>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first_id: i64) -> Self {
        Self {
            table: RefCell::new(Table {
                next_id: first_id,
                rows: BTreeMap::new(),
                calls: Vec::new(),
                reachable: true,
                failing_dates: HashSet::new(),
            }),
        }
    }

    /// Every request fails with a transport error while unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.table.borrow_mut().reachable = reachable;
    }

    /// Requests touching `date` fail with a transport error until healed.
    pub fn fail_date(&self, date: NaiveDate) {
        self.table.borrow_mut().failing_dates.insert(date);
    }

    pub fn heal_date(&self, date: NaiveDate) {
        self.table.borrow_mut().failing_dates.remove(&date);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.table.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.table.borrow_mut().calls.clear();
    }

    pub fn rows(&self) -> Vec<WorkoutRecord> {
        self.table.borrow().rows.values().cloned().collect()
    }

    pub fn row(&self, id: i64) -> Option<WorkoutRecord> {
        self.table.borrow().rows.get(&id).cloned()
    }

    /// Writes a row directly, as another device would. Returns its id.
    pub fn seed(&self, user: &UserId, date: NaiveDate, exercise_name: &str, sets: SetMap) -> i64 {
        let mut table = self.table.borrow_mut();
        let id = table.next_id;
        table.next_id += 1;
        table.rows.insert(id, row(id, user, date, exercise_name, sets));
        id
    }

    pub fn drop_row(&self, id: i64) {
        self.table.borrow_mut().rows.remove(&id);
    }

    fn check(table: &Table, date: Option<NaiveDate>) -> Result<(), RemoteError> {
        if !table.reachable {
            return Err(RemoteError::Transport("remote unreachable".into()));
        }
        match date {
            Some(d) if table.failing_dates.contains(&d) => {
                Err(RemoteError::Transport(format!("request for {} failed", d)))
            }
            _ => Ok(()),
        }
    }
}

fn row(id: i64, user: &UserId, date: NaiveDate, exercise_name: &str, sets: SetMap) -> WorkoutRecord {
    WorkoutRecord {
        id: RecordId::Remote(id),
        user_id: user.clone(),
        date,
        exercise_name: exercise_name.to_string(),
        sets,
        pending: false,
    }
}

#[async_trait(?Send)]
impl RemoteStore for MemoryRemote {
    async fn create_record(
        &self,
        user: &UserId,
        date: NaiveDate,
        exercise_name: &str,
        sets: &SetMap,
    ) -> Result<i64, RemoteError> {
        let mut table = self.table.borrow_mut();
        table.calls.push(RemoteCall::Create {
            date,
            exercise: exercise_name.to_string(),
        });
        Self::check(&table, Some(date))?;
        let id = table.next_id;
        table.next_id += 1;
        table.rows.insert(id, row(id, user, date, exercise_name, sets.clone()));
        Ok(id)
    }

    async fn update_record(&self, id: i64, sets: &SetMap) -> Result<(), RemoteError> {
        let mut table = self.table.borrow_mut();
        table.calls.push(RemoteCall::Update(id));
        let date = table.rows.get(&id).map(|r| r.date);
        Self::check(&table, date)?;
        match table.rows.get_mut(&id) {
            Some(existing) => {
                existing.sets = sets.clone();
                Ok(())
            }
            None => Err(RemoteError::NotFound(id)),
        }
    }

    async fn upsert_record(
        &self,
        id: Option<i64>,
        user: &UserId,
        date: NaiveDate,
        exercise_name: &str,
        sets: &SetMap,
    ) -> Result<i64, RemoteError> {
        let mut table = self.table.borrow_mut();
        table.calls.push(RemoteCall::Upsert(id));
        Self::check(&table, Some(date))?;
        let id = match id {
            Some(id) => {
                if id >= table.next_id {
                    table.next_id = id + 1;
                }
                id
            }
            None => {
                let id = table.next_id;
                table.next_id += 1;
                id
            }
        };
        table.rows.insert(id, row(id, user, date, exercise_name, sets.clone()));
        Ok(id)
    }

    async fn list_records(&self, user: &UserId, date: NaiveDate) -> Result<Vec<WorkoutRecord>, RemoteError> {
        let mut table = self.table.borrow_mut();
        table.calls.push(RemoteCall::List(date));
        Self::check(&table, Some(date))?;
        Ok(table
            .rows
            .values()
            .filter(|r| &r.user_id == user && r.date == date)
            .cloned()
            .collect())
    }

    async fn delete_record(&self, id: i64) -> Result<(), RemoteError> {
        let mut table = self.table.borrow_mut();
        table.calls.push(RemoteCall::Delete(id));
        let date = table.rows.get(&id).map(|r| r.date);
        Self::check(&table, date)?;
        table
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(RemoteError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SetEntry;
    use futures::executor::block_on;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn sets(reps: u32, weight: f64) -> SetMap {
        SetMap::from([(0, SetEntry { reps, weight })])
    }

    #[test]
    fn test_ids_ascend_and_list_is_ordered() {
        let remote = MemoryRemote::starting_at(40);
        let user = UserId::new("u1");
        block_on(async {
            let a = remote.create_record(&user, day(5), "Squat", &sets(5, 60.0)).await.unwrap();
            let b = remote.create_record(&user, day(5), "Bench", &sets(8, 40.0)).await.unwrap();
            assert_eq!((a, b), (40, 41));

            let listed = remote.list_records(&user, day(5)).await.unwrap();
            let names: Vec<_> = listed.iter().map(|r| r.exercise_name.as_str()).collect();
            assert_eq!(names, vec!["Squat", "Bench"]);
            assert!(remote.list_records(&UserId::new("u2"), day(5)).await.unwrap().is_empty());
        });
    }

    #[test]
    fn test_update_and_delete_missing_row() {
        let remote = MemoryRemote::new();
        block_on(async {
            assert_eq!(remote.update_record(9, &sets(1, 1.0)).await, Err(RemoteError::NotFound(9)));
            assert_eq!(remote.delete_record(9).await, Err(RemoteError::NotFound(9)));
        });
    }

    #[test]
    fn test_upsert_with_explicit_id_reserves_it() {
        let remote = MemoryRemote::new();
        let user = UserId::new("u1");
        block_on(async {
            let id = remote.upsert_record(Some(10), &user, day(5), "Squat", &sets(5, 60.0)).await.unwrap();
            assert_eq!(id, 10);
            let next = remote.upsert_record(None, &user, day(5), "Bench", &sets(8, 40.0)).await.unwrap();
            assert_eq!(next, 11);
            remote.upsert_record(Some(10), &user, day(5), "Squat", &sets(6, 60.0)).await.unwrap();
            assert_eq!(remote.row(10).unwrap().sets[&0].reps, 6);
            assert_eq!(remote.rows().len(), 2);
        });
    }

    #[test]
    fn test_injected_failures_are_logged_as_calls() {
        let remote = MemoryRemote::new();
        let user = UserId::new("u1");
        remote.fail_date(day(6));
        block_on(async {
            assert!(remote.create_record(&user, day(5), "Squat", &sets(5, 60.0)).await.is_ok());
            let err = remote.create_record(&user, day(6), "Squat", &sets(5, 60.0)).await.unwrap_err();
            assert!(matches!(err, RemoteError::Transport(_)));

            remote.set_reachable(false);
            assert!(remote.list_records(&user, day(5)).await.is_err());
        });
        assert_eq!(remote.calls().len(), 3);
        assert_eq!(remote.rows().len(), 1);
    }
}
