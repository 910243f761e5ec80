use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use chrono::NaiveDate;

use crate::cache::LocalCache;
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::{RemoteError, Result, SyncError};
use crate::ledger::PendingLedger;
use crate::remote::RemoteStore;
use crate::storage::KeyValueStore;
use crate::types::{RecordId, SetEntry, SetMap, UserId, WorkoutRecord, MAX_SETS};

/// What happened to a set edit after it landed in the local cache.
#[derive(Clone, Debug, PartialEq)]
pub enum EditOutcome {
    /// Written through; the record now carries this server id.
    Synced(i64),
    /// Offline, or a create for this record is already in flight. Left for the next sweep.
    Queued,
    /// Write-through failed; the date stays pending.
    Deferred(RemoteError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Pending,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconcileReport {
    pub synced: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
    pub writes: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Upload {
    Confirmed(i64),
    /// A create for this record is still in flight; its owner re-sends newer sets.
    InFlight,
    /// The record was removed locally before it could be sent.
    Gone,
}

fn check_set(set_index: u32, weight: f64) -> Result<()> {
    if set_index >= MAX_SETS {
        return Err(SyncError::InvalidInput(format!(
            "set index {} out of range, at most {} sets",
            set_index, MAX_SETS
        )));
    }
    if !weight.is_finite() || weight < 0.0 {
        return Err(SyncError::InvalidInput(format!("weight out of range: {}", weight)));
    }
    Ok(())
}

/// Transient failures log as warnings; rejections that will repeat log as errors.
fn log_failure(context: &str, e: &RemoteError) {
    if e.is_retryable() {
        log::warn!("{}: {}", context, e);
    } else {
        log::error!("{}, will not succeed as sent: {}", context, e);
    }
}

/// Keeps one user's local workout log and the remote table converging.
///
/// Day lists are held in memory for the session and mirrored to the cache on every change,
/// so a failing cache write costs durability, never the edit itself.
pub struct SyncEngine<S, R, C> {
    user: UserId,
    cache: LocalCache<S>,
    ledger: PendingLedger<S>,
    remote: R,
    connectivity: C,
    days: RefCell<HashMap<NaiveDate, Vec<WorkoutRecord>>>,
    creating: RefCell<HashSet<String>>,
}

impl<S, R, C> SyncEngine<S, R, C>
where
    S: KeyValueStore,
    R: RemoteStore,
    C: Connectivity,
{
    pub fn new(user: UserId, store: Rc<S>, config: Rc<Config>, remote: R, connectivity: C) -> Self {
        Self {
            user,
            cache: LocalCache::new(store.clone(), config.clone()),
            ledger: PendingLedger::new(store, config),
            remote,
            connectivity,
            days: RefCell::new(HashMap::new()),
            creating: RefCell::new(HashSet::new()),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &C {
        &self.connectivity
    }

    /// Current local view of a day, cache-backed.
    pub fn records(&self, date: NaiveDate) -> Vec<WorkoutRecord> {
        self.with_day(date, |records| records.clone())
    }

    pub fn status(&self, date: NaiveDate) -> SyncStatus {
        match self.ledger.is_pending(&self.user, date) {
            Ok(false) if !self.day_has_pending(date) => SyncStatus::Synced,
            Ok(_) => SyncStatus::Pending,
            Err(e) => {
                log::error!("reading pending ledger failed: {}", e);
                SyncStatus::Pending
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        match self.ledger.list_pending(&self.user) {
            Ok(dates) => dates.count(),
            Err(e) => {
                log::error!("reading pending ledger failed: {}", e);
                0
            }
        }
    }

    pub async fn record_set_edit(
        &self,
        date: NaiveDate,
        exercise_name: &str,
        set_index: u32,
        reps: u32,
        weight: f64,
    ) -> Result<EditOutcome> {
        check_set(set_index, weight)?;
        let user = self.user.clone();
        self.with_day_mut(date, |records| {
            let record = match records.iter().position(|r| r.exercise_name == exercise_name) {
                Some(pos) => &mut records[pos],
                None => {
                    records.push(WorkoutRecord::draft(&user, date, exercise_name));
                    let last = records.len() - 1;
                    &mut records[last]
                }
            };
            record.merge_set(set_index, SetEntry { reps, weight });
            record.pending = true;
        });
        self.mark_pending(date);

        if !self.connectivity.is_online() {
            log::debug!("offline, queued {} set {} on {}", exercise_name, set_index, date);
            return Ok(EditOutcome::Queued);
        }

        let outcome = match self.upload(date, exercise_name, false).await {
            Ok(Upload::Confirmed(id)) => {
                log::debug!("wrote {} on {} through as {}", exercise_name, date, id);
                EditOutcome::Synced(id)
            }
            Ok(Upload::InFlight) => EditOutcome::Queued,
            Ok(Upload::Gone) => {
                log::debug!("{} on {} removed before upload", exercise_name, date);
                EditOutcome::Queued
            }
            Err(e) => {
                log_failure(&format!("write-through for {} on {} deferred", exercise_name, date), &e);
                EditOutcome::Deferred(e)
            }
        };
        Ok(outcome)
    }

    /// Uploads every pending date. Failures are per date; the rest of the sweep continues.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let dates: Vec<NaiveDate> = match self.ledger.list_pending(&self.user) {
            Ok(dates) => dates.collect(),
            Err(e) => {
                log::error!("reconcile could not read pending ledger: {}", e);
                return report;
            }
        };

        for date in dates {
            if self.reconcile_date(date, &mut report.writes).await {
                self.clear_pending(date);
                report.synced.push(date);
            } else {
                report.failed.push(date);
            }
        }

        log::info!(
            "reconcile for {}: {} synced, {} still pending, {} writes",
            self.user,
            report.synced.len(),
            report.failed.len(),
            report.writes
        );
        report
    }

    async fn reconcile_date(&self, date: NaiveDate, writes: &mut usize) -> bool {
        // Pull first so remote edits to other set indices survive the upload.
        match self.remote.list_records(&self.user, date).await {
            Ok(remote) => self.merge_remote(date, remote),
            Err(e) => {
                log::warn!("reconcile of {} skipped: {}", date, e);
                return false;
            }
        }

        let exercises: Vec<String> = self
            .records(date)
            .into_iter()
            .map(|r| r.exercise_name)
            .collect();

        let mut complete = true;
        for exercise in exercises {
            match self.upload(date, &exercise, true).await {
                Ok(Upload::Confirmed(_)) => *writes += 1,
                Ok(Upload::Gone) => {}
                // the in-flight write-through clears the date when it lands
                Ok(Upload::InFlight) => complete = false,
                Err(e) => {
                    log_failure(&format!("reconcile of {} on {} failed", exercise, date), &e);
                    complete = false;
                }
            }
        }
        complete && !self.day_has_pending(date)
    }

    /// Replaces the local day with the remote list, keeping unconfirmed local sets on top.
    pub async fn refresh(&self, date: NaiveDate) -> Result<Vec<WorkoutRecord>> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }
        let remote = self.remote.list_records(&self.user, date).await?;
        self.merge_remote(date, remote);
        Ok(self.records(date))
    }

    pub async fn delete_record(&self, date: NaiveDate, exercise_name: &str) -> Result<()> {
        let record = self
            .find(date, exercise_name)
            .ok_or_else(|| SyncError::UnknownExercise(exercise_name.to_string()))?;

        if let Some(id) = record.id.remote() {
            if !self.connectivity.is_online() {
                return Err(SyncError::Offline);
            }
            match self.remote.delete_record(id).await {
                Ok(()) => {}
                Err(RemoteError::NotFound(_)) => {
                    log::info!("record {} already gone remotely", id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.with_day_mut(date, |records| records.retain(|r| r.id != record.id));
        if !self.day_has_pending(date) {
            self.clear_pending(date);
        }
        Ok(())
    }

    async fn upload(&self, date: NaiveDate, exercise_name: &str, upsert: bool) -> Result<Upload, RemoteError> {
        loop {
            let Some(record) = self.find(date, exercise_name) else {
                return Ok(Upload::Gone);
            };
            let sent = record.sets.clone();

            let id = match &record.id {
                RecordId::Temp(tmp) => {
                    if !self.creating.borrow_mut().insert(tmp.clone()) {
                        return Ok(Upload::InFlight);
                    }
                    let created = self
                        .remote
                        .create_record(&self.user, date, exercise_name, &sent)
                        .await;
                    self.creating.borrow_mut().remove(tmp);
                    let id = created?;
                    self.promote(date, &record.id, id);
                    id
                }
                RecordId::Remote(id) => {
                    let id = *id;
                    let written = if upsert {
                        self.remote
                            .upsert_record(Some(id), &self.user, date, exercise_name, &sent)
                            .await
                    } else {
                        self.remote.update_record(id, &sent).await.map(|()| id)
                    };
                    match written {
                        Ok(new_id) => {
                            if new_id != id {
                                self.promote(date, &record.id, new_id);
                            }
                            new_id
                        }
                        Err(RemoteError::NotFound(_)) => {
                            log::warn!("record {} vanished remotely, recreating {}", id, exercise_name);
                            let new_id = self
                                .remote
                                .create_record(&self.user, date, exercise_name, &sent)
                                .await?;
                            self.promote(date, &record.id, new_id);
                            new_id
                        }
                        Err(e) => return Err(e),
                    }
                }
            };

            if self.confirm(date, id, &sent) {
                return Ok(Upload::Confirmed(id));
            }
            // edited while the request was in flight: push the newer sets
        }
    }

    fn merge_remote(&self, date: NaiveDate, remote: Vec<WorkoutRecord>) {
        self.with_day_mut(date, |local| {
            let mut remaining = std::mem::take(local);
            let mut merged = Vec::with_capacity(remote.len() + remaining.len());

            for mut theirs in remote {
                theirs.pending = false;
                let matched = remaining
                    .iter()
                    .position(|ours| ours.id == theirs.id)
                    .or_else(|| {
                        remaining.iter().position(|ours| {
                            ours.id.is_temporary() && ours.exercise_name == theirs.exercise_name
                        })
                    });
                if let Some(pos) = matched {
                    let ours = remaining.remove(pos);
                    if ours.pending {
                        theirs.sets.extend(ours.sets);
                        theirs.pending = true;
                    }
                }
                merged.push(theirs);
            }

            for ours in remaining {
                if ours.pending || ours.id.is_temporary() {
                    merged.push(ours);
                } else {
                    log::info!("dropping {} on {}, deleted remotely", ours.exercise_name, date);
                }
            }
            *local = merged;
        });
    }

    /// Swaps `old` for the server id. If a refresh already brought in that id,
    /// the two entries are folded into one.
    fn promote(&self, date: NaiveDate, old: &RecordId, id: i64) {
        let new = RecordId::Remote(id);
        self.with_day_mut(date, |records| {
            let Some(pos) = records.iter().position(|r| &r.id == old) else {
                return;
            };
            if let Some(dup) = records.iter().position(|r| r.id == new) {
                let ours = records.remove(pos);
                let dup = if dup > pos { dup - 1 } else { dup };
                records[dup].sets.extend(ours.sets);
                records[dup].pending |= ours.pending;
            } else {
                records[pos].id = new;
            }
        });
    }

    /// Marks the record clean if its sets still match what was sent, and clears the date
    /// once nothing on it is pending.
    fn confirm(&self, date: NaiveDate, id: i64, sent: &SetMap) -> bool {
        let confirmed = self.with_day_mut(date, |records| {
            match records.iter_mut().find(|r| r.id == RecordId::Remote(id)) {
                Some(record) if &record.sets == sent => {
                    record.pending = false;
                    true
                }
                _ => false,
            }
        });
        if confirmed && !self.day_has_pending(date) {
            self.clear_pending(date);
        }
        confirmed
    }

    fn find(&self, date: NaiveDate, exercise_name: &str) -> Option<WorkoutRecord> {
        self.with_day(date, |records| {
            records
                .iter()
                .find(|r| r.exercise_name == exercise_name)
                .cloned()
        })
    }

    fn day_has_pending(&self, date: NaiveDate) -> bool {
        self.with_day(date, |records| records.iter().any(|r| r.pending))
    }

    fn with_day<T>(&self, date: NaiveDate, f: impl FnOnce(&Vec<WorkoutRecord>) -> T) -> T {
        let mut days = self.days.borrow_mut();
        let records = days.entry(date).or_insert_with(|| self.load_cached(date));
        f(records)
    }

    fn with_day_mut<T>(&self, date: NaiveDate, f: impl FnOnce(&mut Vec<WorkoutRecord>) -> T) -> T {
        let mut days = self.days.borrow_mut();
        let records = days.entry(date).or_insert_with(|| self.load_cached(date));
        let out = f(records);
        if let Err(e) = self.cache.put(&self.user, date, records) {
            log::error!("cache write for {} failed, edit kept for this session: {}", date, e);
        }
        out
    }

    fn load_cached(&self, date: NaiveDate) -> Vec<WorkoutRecord> {
        self.cache.get(&self.user, date).unwrap_or_else(|e| {
            log::error!("cache read for {} failed: {}", date, e);
            Vec::new()
        })
    }

    fn mark_pending(&self, date: NaiveDate) {
        if let Err(e) = self.ledger.mark_pending(&self.user, date) {
            log::error!("could not mark {} pending: {}", date, e);
        }
    }

    fn clear_pending(&self, date: NaiveDate) {
        if let Err(e) = self.ledger.clear_pending(&self.user, date) {
            log::error!("could not clear pending {}: {}", date, e);
        }
    }
}
