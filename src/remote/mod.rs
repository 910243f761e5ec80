use std::rc::Rc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::RemoteError;
use crate::types::{SetMap, UserId, WorkoutRecord};

mod memory;

pub use memory::{MemoryRemote, RemoteCall};

/// Request/response access to the authoritative workout table.
///
/// Futures are `?Send`: in the browser they are driven by `spawn_local` on the one UI thread.
#[async_trait(?Send)]
pub trait RemoteStore {
    /// Inserts a new record and returns its server id.
    async fn create_record(
        &self,
        user: &UserId,
        date: NaiveDate,
        exercise_name: &str,
        sets: &SetMap,
    ) -> Result<i64, RemoteError>;

    async fn update_record(&self, id: i64, sets: &SetMap) -> Result<(), RemoteError>;

    /// Insert-or-replace. Without an id this behaves like `create_record`.
    async fn upsert_record(
        &self,
        id: Option<i64>,
        user: &UserId,
        date: NaiveDate,
        exercise_name: &str,
        sets: &SetMap,
    ) -> Result<i64, RemoteError>;

    /// Records for the day in creation order (ascending id).
    async fn list_records(&self, user: &UserId, date: NaiveDate) -> Result<Vec<WorkoutRecord>, RemoteError>;

    async fn delete_record(&self, id: i64) -> Result<(), RemoteError>;
}

#[async_trait(?Send)]
impl<R: RemoteStore + ?Sized> RemoteStore for Rc<R> {
    async fn create_record(
        &self,
        user: &UserId,
        date: NaiveDate,
        exercise_name: &str,
        sets: &SetMap,
    ) -> Result<i64, RemoteError> {
        (**self).create_record(user, date, exercise_name, sets).await
    }

    async fn update_record(&self, id: i64, sets: &SetMap) -> Result<(), RemoteError> {
        (**self).update_record(id, sets).await
    }

    async fn upsert_record(
        &self,
        id: Option<i64>,
        user: &UserId,
        date: NaiveDate,
        exercise_name: &str,
        sets: &SetMap,
    ) -> Result<i64, RemoteError> {
        (**self).upsert_record(id, user, date, exercise_name, sets).await
    }

    async fn list_records(&self, user: &UserId, date: NaiveDate) -> Result<Vec<WorkoutRecord>, RemoteError> {
        (**self).list_records(user, date).await
    }

    async fn delete_record(&self, id: i64) -> Result<(), RemoteError> {
        (**self).delete_record(id).await
    }
}
