pub mod cache;
pub mod config;
pub mod connectivity;
pub mod editor;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod remote;
pub mod session;
pub mod storage;
pub mod supabase;
pub mod sync;
pub mod templates;
pub mod types;

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
mod pages;

pub use config::Config;
pub use connectivity::{Connectivity, ManualConnectivity};
pub use editor::{DayView, RecordEditor, SetField};
pub use error::{PersistenceError, RemoteError, Result, SyncError};
pub use remote::{MemoryRemote, RemoteStore};
pub use session::Session;
pub use storage::{KeyValueStore, MemoryStore};
pub use sync::{EditOutcome, ReconcileReport, SyncEngine, SyncStatus};
pub use templates::TemplateBook;
pub use types::{AuthSession, ExerciseTemplate, RecordId, SetEntry, SetMap, UserId, WorkoutRecord};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init();
    leptos::mount_to_body(app::App);
}
