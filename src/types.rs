use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Owner of every record, ledger entry and cache key. Supabase hands these out as UUID strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a workout record.
///
/// Serialized untagged so the cache stays plain JSON: a number is a server id,
/// a string is a temporary id minted on this device.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RecordId {
    Remote(i64),
    Temp(String),
}

impl RecordId {
    pub fn temporary() -> Self {
        RecordId::Temp(format!("tmp-{}", uuid::Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, RecordId::Temp(_))
    }

    pub fn remote(&self) -> Option<i64> {
        match self {
            RecordId::Remote(id) => Some(*id),
            RecordId::Temp(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Remote(id) => write!(f, "{}", id),
            RecordId::Temp(tmp) => f.write_str(tmp),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetEntry {
    pub reps: u32,
    pub weight: f64,
}

/// Sparse set index -> performance. A missing index means "not done yet", never zero.
pub type SetMap = BTreeMap<u32, SetEntry>;

/// Set indices run from 0 to `MAX_SETS - 1`.
pub const MAX_SETS: u32 = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub exercise_name: String,
    #[serde(default)]
    pub sets: SetMap,
    /// Local edits not yet confirmed by the remote store.
    #[serde(default)]
    pub pending: bool,
}

impl WorkoutRecord {
    pub fn draft(user_id: &UserId, date: NaiveDate, exercise_name: &str) -> Self {
        Self {
            id: RecordId::temporary(),
            user_id: user_id.clone(),
            date,
            exercise_name: exercise_name.to_string(),
            sets: SetMap::new(),
            pending: true,
        }
    }

    /// Overwrites a single set; other indices are untouched.
    pub fn merge_set(&mut self, set_index: u32, entry: SetEntry) {
        self.sets.insert(set_index, entry);
    }

    /// Number of set rows needed to show every recorded index, never more than `MAX_SETS`.
    pub fn set_span(&self) -> u32 {
        self.sets
            .keys()
            .next_back()
            .map(|last| last.saturating_add(1).min(MAX_SETS))
            .unwrap_or(0)
    }
}

/// One prescribed exercise for a training day.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseTemplate {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default)]
    pub weight: f64,
}

impl ExerciseTemplate {
    pub fn new(name: &str, sets: u32, reps: u32, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            sets,
            reps,
            weight,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn user_id(&self) -> UserId {
        UserId::new(self.user.id.clone())
    }
}
