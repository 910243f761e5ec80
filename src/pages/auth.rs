use std::rc::Rc;

use leptos::*;

use crate::config::Config;
use crate::error::RemoteError;
use crate::supabase;
use crate::types::AuthSession;

#[derive(Clone)]
struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    fn missing_field(&self) -> Option<&'static str> {
        if self.email.trim().is_empty() {
            Some("Enter your email")
        } else if self.password.is_empty() {
            Some("Enter your password")
        } else {
            None
        }
    }
}

/// Password sign-in against Supabase auth. Hands the new session to `set_auth`.
#[component]
pub fn Login(config: Rc<Config>, set_auth: WriteSignal<Option<AuthSession>>) -> impl IntoView {
    let (email, set_email) = create_signal(String::new());
    let (password, set_password) = create_signal(String::new());
    let (hint, set_hint) = create_signal(Option::<&'static str>::None);

    let sign_in = create_action(move |creds: &Credentials| {
        let config = config.clone();
        let creds = creds.clone();
        async move { supabase::sign_in(&config, creds.email.trim(), &creds.password).await }
    });
    let busy = sign_in.pending();
    let result = sign_in.value();

    create_effect(move |_| match result.get() {
        Some(Ok(session)) => {
            log::info!("signed in as {}", session.user.email);
            set_password.set(String::new());
            set_auth.set(Some(session));
        }
        Some(Err(e)) => log::warn!("sign-in failed: {}", e),
        None => {}
    });

    let failure = move || {
        hint.get().map(str::to_string).or_else(|| match result.get() {
            Some(Err(RemoteError::Rejected { status: 400, .. })) => Some("Wrong email or password".to_string()),
            Some(Err(e)) => Some(format!("Could not sign in: {}", e)),
            _ => None,
        })
    };

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        let creds = Credentials {
            email: email.get_untracked(),
            password: password.get_untracked(),
        };
        set_hint.set(creds.missing_field());
        if hint.get_untracked().is_none() {
            sign_in.dispatch(creds);
        }
    };

    view! {
        <div class="auth-container">
            <div class="auth-logo">"LIFTLOG"</div>
            <form class="auth-card" on:submit=on_submit>
                <h2 class="auth-title">"Sign in"</h2>
                {move || failure().map(|e| view! { <div class="auth-error">{e}</div> })}
                <input
                    type="email"
                    class="auth-input"
                    placeholder="Email"
                    autocomplete="username"
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                    prop:value=email
                />
                <input
                    type="password"
                    class="auth-input"
                    placeholder="Password"
                    autocomplete="current-password"
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                    prop:value=password
                />
                <button type="submit" class="auth-button" disabled=move || busy.get()>
                    {move || if busy.get() { "Signing in..." } else { "Sign in" }}
                </button>
            </form>
        </div>
    }
}
