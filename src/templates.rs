use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;

use crate::config::Config;
use crate::error::SyncError;
use crate::storage::KeyValueStore;
use crate::types::ExerciseTemplate;

/// Month key that applies to every month without its own plan.
pub const ANY_MONTH: &str = "*";

/// Prescribed exercises per (month, weekday), read-only once loaded.
///
/// JSON shape: `{ "2024-03": { "Tue": [ {name, sets, reps, weight} ] }, "*": { ... } }`.
#[derive(Clone, Debug, Default)]
pub struct TemplateBook {
    plans: HashMap<(String, Weekday), Vec<ExerciseTemplate>>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct RawBook(BTreeMap<String, BTreeMap<String, Vec<ExerciseTemplate>>>);

impl TemplateBook {
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let RawBook(raw) = serde_json::from_str(json)
            .map_err(|e| SyncError::InvalidInput(format!("template book: {}", e)))?;

        let mut plans = HashMap::new();
        for (month, days) in raw {
            if month != ANY_MONTH && !is_year_month(&month) {
                return Err(SyncError::InvalidInput(format!("bad month key {:?}", month)));
            }
            for (day, exercises) in days {
                let weekday: Weekday = day
                    .parse()
                    .map_err(|_| SyncError::InvalidInput(format!("bad weekday {:?}", day)))?;
                plans.insert((month.clone(), weekday), exercises);
            }
        }
        Ok(Self { plans })
    }

    /// Book saved under the templates key, or the built-in one when absent or unreadable.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S, config: &Config) -> Self {
        let key = config.templates_key();
        match store.get_item(&key) {
            Ok(Some(json)) => Self::from_json(&json).unwrap_or_else(|e| {
                log::warn!("ignoring stored templates: {}", e);
                Self::builtin()
            }),
            Ok(None) => Self::builtin(),
            Err(e) => {
                log::warn!("could not read {}: {}", key, e);
                Self::builtin()
            }
        }
    }

    /// Upper/lower split on a Tue/Thu/Sat schedule, used when nothing is configured.
    pub fn builtin() -> Self {
        let mut plans = HashMap::new();
        let any = ANY_MONTH.to_string();
        plans.insert(
            (any.clone(), Weekday::Tue),
            vec![
                ExerciseTemplate::new("Squat", 3, 5, 60.0),
                ExerciseTemplate::new("Bench", 3, 8, 40.0),
                ExerciseTemplate::new("Row", 3, 10, 35.0),
            ],
        );
        plans.insert(
            (any.clone(), Weekday::Thu),
            vec![
                ExerciseTemplate::new("Deadlift", 3, 5, 80.0),
                ExerciseTemplate::new("Overhead Press", 3, 8, 30.0),
                ExerciseTemplate::new("Pull-up", 3, 6, 0.0),
            ],
        );
        plans.insert(
            (any, Weekday::Sat),
            vec![
                ExerciseTemplate::new("Front Squat", 3, 6, 50.0),
                ExerciseTemplate::new("Incline Bench", 3, 8, 35.0),
                ExerciseTemplate::new("Hip Thrust", 3, 10, 60.0),
            ],
        );
        Self { plans }
    }

    /// The month's own plan for that weekday wins over the `*` plan. Rest days are empty.
    pub fn for_date(&self, date: NaiveDate) -> &[ExerciseTemplate] {
        let month = date.format("%Y-%m").to_string();
        let weekday = date.weekday();
        self.plans
            .get(&(month, weekday))
            .or_else(|| self.plans.get(&(ANY_MONTH.to_string(), weekday)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, date: NaiveDate, exercise_name: &str) -> Option<&ExerciseTemplate> {
        self.for_date(date).iter().find(|t| t.name == exercise_name)
    }
}

fn is_year_month(key: &str) -> bool {
    NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").is_ok()
}
