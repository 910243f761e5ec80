use std::rc::Rc;

use leptos::*;

use crate::config::Config;
use crate::connectivity::BrowserConnectivity;
use crate::error::SyncError;
use crate::pages::{Login, WorkoutDay};
use crate::session::Session;
use crate::storage::LocalStorage;
use crate::supabase::{self, SupabaseRemote};
use crate::templates::TemplateBook;
use crate::types::AuthSession;

pub type BrowserSession = Session<LocalStorage, SupabaseRemote, BrowserConnectivity>;

/// Page-lifetime pieces shared by every session.
struct Shell {
    config: Rc<Config>,
    store: Rc<LocalStorage>,
    connectivity: BrowserConnectivity,
    templates: Rc<TemplateBook>,
}

impl Shell {
    fn install() -> Result<Self, SyncError> {
        let config = Rc::new(Config::from_env());
        let store = Rc::new(LocalStorage::open()?);
        let templates = Rc::new(TemplateBook::load(store.as_ref(), &config));
        Ok(Self {
            config,
            store,
            connectivity: BrowserConnectivity::install(),
            templates,
        })
    }

    fn open(&self, auth: AuthSession) -> Rc<BrowserSession> {
        let remote = SupabaseRemote::new(self.config.clone(), &auth);
        Rc::new(Session::open(
            auth,
            self.store.clone(),
            self.config.clone(),
            remote,
            self.connectivity.clone(),
            self.templates.clone(),
        ))
    }
}

#[component]
pub fn App() -> impl IntoView {
    let shell = match Shell::install() {
        Ok(shell) => Rc::new(shell),
        Err(e) => {
            log::error!("cannot start: {}", e);
            return view! { <div class="loading">"Local storage is unavailable"</div> }.into_view();
        }
    };

    let resumed = supabase::load_auth_session(shell.store.as_ref(), &shell.config).map(|auth| shell.open(auth));
    let (session, set_session) = create_signal(resumed);
    let (auth, set_auth) = create_signal(Option::<AuthSession>::None);
    let config = shell.config.clone();

    create_effect(move |_| {
        if let Some(auth) = auth.get() {
            set_session.set(Some(shell.open(auth)));
        }
    });

    let on_logout = Callback::new(move |_: ()| {
        if let Some(current) = session.get_untracked() {
            current.close();
        }
        set_auth.set(None);
        set_session.set(None);
    });

    view! {
        <div class="app">
            {move || match session.get() {
                Some(current) => view! { <WorkoutDay session=current on_logout=on_logout /> }.into_view(),
                None => view! { <Login config=config.clone() set_auth=set_auth /> }.into_view(),
            }}
        </div>
    }
    .into_view()
}
