use std::rc::Rc;

use chrono::NaiveDate;

use crate::connectivity::Connectivity;
use crate::error::{Result, SyncError};
use crate::remote::RemoteStore;
use crate::storage::KeyValueStore;
use crate::sync::{EditOutcome, SyncEngine, SyncStatus};
use crate::templates::TemplateBook;
use crate::types::{ExerciseTemplate, WorkoutRecord, MAX_SETS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetField {
    Reps,
    Weight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewSource {
    Cache,
    Remote,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetRow {
    pub index: u32,
    pub reps: Option<u32>,
    pub weight: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseRow {
    pub name: String,
    /// `None` for exercises logged on a day whose template does not list them.
    pub target: Option<ExerciseTemplate>,
    pub sets: Vec<SetRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DayView {
    pub date: NaiveDate,
    pub exercises: Vec<ExerciseRow>,
    pub status: SyncStatus,
    pub source: ViewSource,
}

impl DayView {
    pub fn exercise(&self, name: &str) -> Option<&ExerciseRow> {
        self.exercises.iter().find(|e| e.name == name)
    }
}

/// Turns template + records into editable rows and routes field edits to the engine.
pub struct RecordEditor<S, R, C> {
    engine: Rc<SyncEngine<S, R, C>>,
    templates: Rc<TemplateBook>,
}

impl<S, R, C> Clone for RecordEditor<S, R, C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            templates: self.templates.clone(),
        }
    }
}

impl<S, R, C> RecordEditor<S, R, C>
where
    S: KeyValueStore,
    R: RemoteStore,
    C: Connectivity,
{
    pub fn new(engine: Rc<SyncEngine<S, R, C>>, templates: Rc<TemplateBook>) -> Self {
        Self { engine, templates }
    }

    pub fn engine(&self) -> &Rc<SyncEngine<S, R, C>> {
        &self.engine
    }

    /// Instant view from the local cache.
    pub fn cached_view(&self, date: NaiveDate) -> DayView {
        let records = self.engine.records(date);
        self.build_view(date, &records, ViewSource::Cache)
    }

    /// Authoritative view, or `None` while offline.
    pub async fn fetch_view(&self, date: NaiveDate) -> Result<Option<DayView>> {
        if !self.engine.is_online() {
            return Ok(None);
        }
        let records = self.engine.refresh(date).await?;
        Ok(Some(self.build_view(date, &records, ViewSource::Remote)))
    }

    /// Renders the cached view, then the remote one when reachable. Never the other way round.
    pub async fn load(&self, date: NaiveDate, mut render: impl FnMut(DayView)) {
        render(self.cached_view(date));
        match self.fetch_view(date).await {
            Ok(Some(view)) => render(view),
            Ok(None) => {}
            Err(e) => log::warn!("could not refresh {} from remote: {}", date, e),
        }
    }

    /// Handles a blurred reps/weight input. Empty input is ignored so untouched
    /// fields are never written as zero.
    pub async fn blur(
        &self,
        date: NaiveDate,
        exercise_name: &str,
        set_index: u32,
        field: SetField,
        raw: &str,
    ) -> Result<Option<EditOutcome>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let existing = self
            .engine
            .records(date)
            .into_iter()
            .find(|r| r.exercise_name == exercise_name)
            .and_then(|r| r.sets.get(&set_index).copied());
        let target = self.templates.find(date, exercise_name);

        let (reps, weight) = match field {
            SetField::Reps => {
                let reps = parse_reps(raw)?;
                let weight = existing
                    .map(|s| s.weight)
                    .or(target.map(|t| t.weight))
                    .unwrap_or(0.0);
                (reps, weight)
            }
            SetField::Weight => {
                let weight = parse_weight(raw)?;
                let reps = existing
                    .map(|s| s.reps)
                    .or(target.map(|t| t.reps))
                    .unwrap_or(0);
                (reps, weight)
            }
        };

        let outcome = self
            .engine
            .record_set_edit(date, exercise_name, set_index, reps, weight)
            .await?;
        Ok(Some(outcome))
    }

    fn build_view(&self, date: NaiveDate, records: &[WorkoutRecord], source: ViewSource) -> DayView {
        let templates = self.templates.for_date(date);
        let mut exercises: Vec<ExerciseRow> = templates
            .iter()
            .map(|t| {
                let record = records.iter().find(|r| r.exercise_name == t.name);
                row(&t.name, Some(t.clone()), record)
            })
            .collect();

        for record in records {
            if !templates.iter().any(|t| t.name == record.exercise_name) {
                exercises.push(row(&record.exercise_name, None, Some(record)));
            }
        }

        DayView {
            date,
            exercises,
            status: self.engine.status(date),
            source,
        }
    }
}

fn row(name: &str, target: Option<ExerciseTemplate>, record: Option<&WorkoutRecord>) -> ExerciseRow {
    let planned = target.as_ref().map(|t| t.sets.min(MAX_SETS)).unwrap_or(0);
    let span = record.map(|r| r.set_span()).unwrap_or(0).max(planned);
    let sets = (0..span)
        .map(|index| {
            let entry = record.and_then(|r| r.sets.get(&index));
            SetRow {
                index,
                reps: entry.map(|s| s.reps),
                weight: entry.map(|s| s.weight),
            }
        })
        .collect();
    ExerciseRow {
        name: name.to_string(),
        target,
        sets,
    }
}

fn parse_reps(raw: &str) -> Result<u32> {
    raw.parse::<u32>()
        .map_err(|_| SyncError::InvalidInput(format!("reps must be a whole number, got {:?}", raw)))
}

fn parse_weight(raw: &str) -> Result<f64> {
    let weight: f64 = raw
        .replace(',', ".")
        .parse()
        .map_err(|_| SyncError::InvalidInput(format!("weight must be a number, got {:?}", raw)))?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(SyncError::InvalidInput(format!("weight out of range: {}", raw)));
    }
    Ok(weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connectivity::ManualConnectivity;
    use crate::remote::{MemoryRemote, RemoteCall};
    use crate::storage::MemoryStore;
    use crate::types::{SetEntry, SetMap, UserId};
    use futures::executor::block_on;

    type Editor = RecordEditor<MemoryStore, Rc<MemoryRemote>, ManualConnectivity>;

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn editor(online: bool) -> (Editor, Rc<MemoryRemote>, ManualConnectivity) {
        let remote = Rc::new(MemoryRemote::new());
        let conn = ManualConnectivity::new(online);
        let engine = SyncEngine::new(
            UserId::new("u1"),
            Rc::new(MemoryStore::new()),
            Rc::new(Config::default()),
            remote.clone(),
            conn.clone(),
        );
        let editor = RecordEditor::new(Rc::new(engine), Rc::new(TemplateBook::builtin()));
        (editor, remote, conn)
    }

    #[test]
    fn test_empty_blur_never_reaches_engine() {
        let (editor, remote, _) = editor(true);
        let outcome = block_on(editor.blur(tuesday(), "Squat", 0, SetField::Reps, "  ")).unwrap();
        assert_eq!(outcome, None);
        assert!(remote.calls().is_empty());
        assert!(editor.engine().records(tuesday()).is_empty());
    }

    #[test]
    fn test_blur_fills_other_field_from_template() {
        let (editor, _, _) = editor(false);
        block_on(editor.blur(tuesday(), "Squat", 0, SetField::Reps, "4")).unwrap();
        let sets = &editor.engine().records(tuesday())[0].sets;
        assert_eq!(sets[&0], SetEntry { reps: 4, weight: 60.0 });
    }

    #[test]
    fn test_blur_keeps_recorded_value_of_other_field() {
        let (editor, _, _) = editor(false);
        block_on(async {
            editor.blur(tuesday(), "Bench", 1, SetField::Weight, "42,5").await.unwrap();
            editor.blur(tuesday(), "Bench", 1, SetField::Reps, "6").await.unwrap();
            editor.blur(tuesday(), "Bench", 1, SetField::Weight, "45").await.unwrap();
        });
        let sets = &editor.engine().records(tuesday())[0].sets;
        assert_eq!(sets[&1], SetEntry { reps: 6, weight: 45.0 });
    }

    #[test]
    fn test_blur_rejects_garbage() {
        let (editor, _, _) = editor(false);
        assert!(matches!(
            block_on(editor.blur(tuesday(), "Squat", 0, SetField::Reps, "five")),
            Err(SyncError::InvalidInput(_))
        ));
        assert!(block_on(editor.blur(tuesday(), "Squat", 0, SetField::Weight, "-5")).is_err());
        assert!(editor.engine().records(tuesday()).is_empty());
    }

    #[test]
    fn test_blur_rejects_set_index_past_limit() {
        let (editor, remote, _) = editor(true);
        let result = block_on(editor.blur(tuesday(), "Squat", u32::MAX, SetField::Reps, "5"));
        assert!(matches!(result, Err(SyncError::InvalidInput(_))));
        assert!(remote.calls().is_empty());
        assert_eq!(editor.cached_view(tuesday()).exercise("Squat").unwrap().sets.len(), 3);
    }

    #[test]
    fn test_view_merges_template_and_records() {
        let (editor, _, _) = editor(false);
        block_on(async {
            editor.blur(tuesday(), "Squat", 4, SetField::Reps, "3").await.unwrap();
            editor.blur(tuesday(), "Farmer Carry", 0, SetField::Weight, "30").await.unwrap();
        });

        let view = editor.cached_view(tuesday());
        let names: Vec<_> = view.exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Squat", "Bench", "Row", "Farmer Carry"]);

        let squat = view.exercise("Squat").unwrap();
        assert_eq!(squat.sets.len(), 5);
        assert_eq!(squat.sets[0].reps, None);
        assert_eq!(squat.sets[4].reps, Some(3));
        assert!(view.exercise("Farmer Carry").unwrap().target.is_none());
        assert_eq!(view.status, SyncStatus::Pending);
        assert_eq!(view.source, ViewSource::Cache);
    }

    #[test]
    fn test_load_renders_cache_then_remote() {
        let (editor, remote, _) = editor(true);
        remote.seed(
            &UserId::new("u1"),
            tuesday(),
            "Squat",
            SetMap::from([(0, SetEntry { reps: 5, weight: 60.0 })]),
        );

        let mut renders = Vec::new();
        block_on(editor.load(tuesday(), |view| renders.push(view)));

        assert_eq!(renders.len(), 2);
        assert_eq!(renders[0].source, ViewSource::Cache);
        assert_eq!(renders[0].exercise("Squat").unwrap().sets[0].reps, None);
        assert_eq!(renders[1].source, ViewSource::Remote);
        assert_eq!(renders[1].exercise("Squat").unwrap().sets[0].reps, Some(5));
        assert_eq!(remote.calls(), vec![RemoteCall::List(tuesday())]);
    }

    #[test]
    fn test_load_offline_renders_cache_only() {
        let (editor, remote, _) = editor(false);
        let mut renders = Vec::new();
        block_on(editor.load(tuesday(), |view| renders.push(view)));
        assert_eq!(renders.len(), 1);
        assert!(remote.calls().is_empty());
    }
}
