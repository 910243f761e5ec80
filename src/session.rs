use std::future::Future;
use std::rc::Rc;

use futures::StreamExt;

use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::editor::RecordEditor;
use crate::remote::RemoteStore;
use crate::storage::KeyValueStore;
use crate::supabase;
use crate::sync::{ReconcileReport, SyncEngine};
use crate::templates::TemplateBook;
use crate::types::{AuthSession, UserId};

/// Everything that belongs to one signed-in user. Built on login, dropped on logout,
/// so no in-memory day state outlives the user it was loaded for.
pub struct Session<S, R, C> {
    auth: AuthSession,
    store: Rc<S>,
    config: Rc<Config>,
    engine: Rc<SyncEngine<S, R, C>>,
    editor: RecordEditor<S, R, C>,
}

impl<S, R, C> Session<S, R, C>
where
    S: KeyValueStore,
    R: RemoteStore,
    C: Connectivity,
{
    pub fn open(
        auth: AuthSession,
        store: Rc<S>,
        config: Rc<Config>,
        remote: R,
        connectivity: C,
        templates: Rc<TemplateBook>,
    ) -> Self {
        supabase::save_auth_session(store.as_ref(), &config, &auth);
        let engine = Rc::new(SyncEngine::new(
            auth.user_id(),
            store.clone(),
            config.clone(),
            remote,
            connectivity,
        ));
        let editor = RecordEditor::new(engine.clone(), templates);
        log::info!("session opened for {}", auth.user.email);
        Self {
            auth,
            store,
            config,
            engine,
            editor,
        }
    }

    pub fn user(&self) -> UserId {
        self.auth.user_id()
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn engine(&self) -> &Rc<SyncEngine<S, R, C>> {
        &self.engine
    }

    pub fn editor(&self) -> RecordEditor<S, R, C> {
        self.editor.clone()
    }

    /// Sweep on app load, for edits left pending by an earlier run.
    pub async fn sync_now(&self) -> Option<ReconcileReport> {
        if !self.engine.is_online() {
            return None;
        }
        Some(self.engine.reconcile().await)
    }

    /// Future that reconciles once per connectivity-restored event. The host spawns it.
    /// It ends when the observer goes away or at the first event after the session closed.
    pub fn reconciler<F>(&self, mut on_sweep: F) -> impl Future<Output = ()>
    where
        F: FnMut(ReconcileReport),
    {
        let engine = Rc::downgrade(&self.engine);
        let mut restored = self.engine.connectivity().subscribe_restored();
        async move {
            while restored.next().await.is_some() {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                let report = engine.reconcile().await;
                on_sweep(report);
            }
        }
    }

    /// Logout. Forgets the stored auth session; in-memory state goes with the last handle.
    /// Cached days and the pending ledger stay on disk under this user's keys,
    /// to be uploaded after the next login.
    pub fn close(&self) {
        log::info!("session closed for {}", self.auth.user.email);
        supabase::sign_out(self.store.as_ref(), &self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ManualConnectivity;
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryStore;
    use crate::types::AuthUser;
    use chrono::NaiveDate;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use std::cell::RefCell;

    type TestSession = Session<MemoryStore, Rc<MemoryRemote>, ManualConnectivity>;

    fn auth(id: &str) -> AuthSession {
        AuthSession {
            access_token: "tok".into(),
            user: AuthUser {
                id: id.into(),
                email: format!("{}@example.com", id),
            },
        }
    }

    fn open(store: &MemoryStore, id: &str, remote: &Rc<MemoryRemote>, conn: &ManualConnectivity) -> TestSession {
        Session::open(
            auth(id),
            Rc::new(store.clone()),
            Rc::new(Config::default()),
            remote.clone(),
            conn.clone(),
            Rc::new(TemplateBook::builtin()),
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_restoration_event_triggers_reconcile() {
        let store = MemoryStore::new();
        let remote = Rc::new(MemoryRemote::new());
        let conn = ManualConnectivity::new(false);
        let session = open(&store, "u1", &remote, &conn);

        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        let mut pool = LocalPool::new();
        pool.spawner()
            .spawn_local(session.reconciler(move |r| sink.borrow_mut().push(r)))
            .unwrap();

        block_on(session.engine().record_set_edit(day(), "Squat", 0, 5, 60.0)).unwrap();
        pool.run_until_stalled();
        assert!(reports.borrow().is_empty());

        conn.set_online(true);
        pool.run_until_stalled();

        assert_eq!(reports.borrow().len(), 1);
        assert_eq!(reports.borrow()[0].synced, vec![day()]);
        assert_eq!(session.engine().pending_count(), 0);
        assert_eq!(remote.rows().len(), 1);
    }

    #[test]
    fn test_reconciler_stops_after_close() {
        let store = MemoryStore::new();
        let remote = Rc::new(MemoryRemote::new());
        let conn = ManualConnectivity::new(false);
        let session = open(&store, "u1", &remote, &conn);

        let sweeps = Rc::new(RefCell::new(0));
        let counter = sweeps.clone();
        let mut pool = LocalPool::new();
        pool.spawner()
            .spawn_local(session.reconciler(move |_| *counter.borrow_mut() += 1))
            .unwrap();

        session.close();
        drop(session);
        conn.set_online(true);
        pool.run_until_stalled();
        assert_eq!(*sweeps.borrow(), 0);
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn test_pending_work_survives_logout_and_is_not_shared() {
        let store = MemoryStore::new();
        let remote = Rc::new(MemoryRemote::new());
        let conn = ManualConnectivity::new(false);

        let alice = open(&store, "alice", &remote, &conn);
        block_on(alice.engine().record_set_edit(day(), "Squat", 0, 5, 60.0)).unwrap();
        alice.close();
        drop(alice);
        assert!(supabase::load_auth_session(&store, &Config::default()).is_none());

        let bob = open(&store, "bob", &remote, &conn);
        assert!(bob.engine().records(day()).is_empty());
        assert_eq!(bob.engine().pending_count(), 0);
        bob.close();
        drop(bob);

        conn.set_online(true);
        let alice = open(&store, "alice", &remote, &conn);
        assert_eq!(alice.user(), UserId::new("alice"));
        let report = block_on(alice.sync_now()).unwrap();
        assert_eq!(report.synced, vec![day()]);
        assert_eq!(remote.rows()[0].user_id, UserId::new("alice"));
    }

    #[test]
    fn test_sync_now_offline_does_nothing() {
        let store = MemoryStore::new();
        let remote = Rc::new(MemoryRemote::new());
        let session = open(&store, "u1", &remote, &ManualConnectivity::new(false));
        assert!(block_on(session.sync_now()).is_none());
        assert!(remote.calls().is_empty());
    }
}
