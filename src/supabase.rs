use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::RemoteError;
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::types::{AuthSession, RecordId, SetMap, UserId, WorkoutRecord};

#[cfg(target_arch = "wasm32")]
pub use client::{sign_in, SupabaseRemote};

// ============ ROWS ============

/// One row of the `workouts` table.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct WorkoutRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    user_id: String,
    date: NaiveDate,
    exercise_name: String,
    #[serde(default)]
    sets: SetMap,
}

impl WorkoutRow {
    fn new(id: Option<i64>, user: &UserId, date: NaiveDate, exercise_name: &str, sets: &SetMap) -> Self {
        Self {
            id,
            user_id: user.to_string(),
            date,
            exercise_name: exercise_name.to_string(),
            sets: sets.clone(),
        }
    }

    fn into_record(self) -> Option<WorkoutRecord> {
        Some(WorkoutRecord {
            id: RecordId::Remote(self.id?),
            user_id: UserId::new(self.user_id),
            date: self.date,
            exercise_name: self.exercise_name,
            sets: self.sets,
            pending: false,
        })
    }
}

#[derive(Serialize)]
struct SetsPatch<'a> {
    sets: &'a SetMap,
}

#[derive(Deserialize, Debug)]
struct SupabaseError {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

fn parse_rows(body: &str) -> Result<Vec<WorkoutRow>, RemoteError> {
    serde_json::from_str(body)
        .map_err(|e| RemoteError::Transport(format!("unexpected response body: {}", e)))
}

/// Id of the single row PostgREST echoes back with `return=representation`.
fn returned_id(body: &str) -> Result<Option<i64>, RemoteError> {
    Ok(parse_rows(body)?.into_iter().next().and_then(|row| row.id))
}

fn rejection(status: u16, body: &str) -> RemoteError {
    let message = serde_json::from_str::<SupabaseError>(body)
        .ok()
        .and_then(|e| e.error_description.or(e.message).or(e.msg).or(e.error))
        .unwrap_or_else(|| format!("HTTP error: {}", status));
    RemoteError::Rejected { status, message }
}

fn day_query(user: &UserId, date: NaiveDate) -> String {
    format!(
        "select=*&user_id=eq.{}&date=eq.{}&order=id.asc",
        user,
        date.format("%Y-%m-%d")
    )
}

// ============ AUTH SESSION ============

pub fn save_auth_session<S: KeyValueStore + ?Sized>(store: &S, config: &Config, session: &AuthSession) {
    if let Err(e) = save_json(store, &config.auth_session_key(), session) {
        log::error!("could not persist auth session: {}", e);
    }
}

pub fn load_auth_session<S: KeyValueStore + ?Sized>(store: &S, config: &Config) -> Option<AuthSession> {
    match load_json(store, &config.auth_session_key()) {
        Ok(session) => session,
        Err(e) => {
            log::warn!("discarding unreadable auth session: {}", e);
            None
        }
    }
}

pub fn sign_out<S: KeyValueStore + ?Sized>(store: &S, config: &Config) {
    if let Err(e) = store.remove_item(&config.auth_session_key()) {
        log::error!("could not remove auth session: {}", e);
    }
}

#[derive(Deserialize, Debug)]
struct SupabaseAuthResponse {
    access_token: String,
    user: SupabaseUser,
}

#[derive(Deserialize, Debug)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: String,
}

fn parse_auth(body: &str) -> Result<AuthSession, RemoteError> {
    let resp: SupabaseAuthResponse = serde_json::from_str(body)
        .map_err(|e| RemoteError::Transport(format!("invalid auth response: {}", e)))?;
    Ok(AuthSession {
        access_token: resp.access_token,
        user: crate::types::AuthUser {
            id: resp.user.id,
            email: resp.user.email,
        },
    })
}

// ============ HTTP ============

#[cfg(target_arch = "wasm32")]
mod client {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

    use super::{day_query, parse_auth, parse_rows, rejection, returned_id, SetsPatch, WorkoutRow};
    use crate::config::Config;
    use crate::error::RemoteError;
    use crate::remote::RemoteStore;
    use crate::types::{AuthSession, SetMap, UserId, WorkoutRecord};

    const RETURN_ROWS: &str = "return=representation";
    const UPSERT_ROWS: &str = "resolution=merge-duplicates,return=representation";

    fn transport(context: &'static str) -> impl Fn(JsValue) -> RemoteError {
        move |e| RemoteError::Transport(format!("{}: {:?}", context, e))
    }

    fn get_headers(config: &Config, token: Option<&str>, prefer: Option<&str>) -> Result<Headers, JsValue> {
        let headers = Headers::new()?;
        headers.set("apikey", &config.supabase_key)?;
        let bearer = token.unwrap_or(&config.supabase_key);
        headers.set("Authorization", &format!("Bearer {}", bearer))?;
        headers.set("Content-Type", "application/json")?;
        if let Some(prefer) = prefer {
            headers.set("Prefer", prefer)?;
        }
        Ok(headers)
    }

    fn create_request_init(method: &str, body: Option<&str>, headers: &Headers) -> RequestInit {
        let opts = RequestInit::new();
        opts.set_method(method);
        opts.set_mode(RequestMode::Cors);
        if let Some(b) = body {
            opts.set_body(&JsValue::from_str(b));
        }
        opts.set_headers(&JsValue::from(headers));
        opts
    }

    /// Sends the request and returns the response body; non-2xx becomes `Rejected`.
    async fn send(url: &str, opts: &RequestInit) -> Result<String, RemoteError> {
        let window = web_sys::window().ok_or_else(|| RemoteError::Transport("no window".into()))?;
        let request = Request::new_with_str_and_init(url, opts).map_err(transport("bad request"))?;
        let resp_value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(transport("fetch failed"))?;
        let resp: Response = resp_value.dyn_into().map_err(transport("invalid response"))?;

        let text = JsFuture::from(resp.text().map_err(transport("no body"))?)
            .await
            .map_err(transport("body read failed"))?
            .as_string()
            .unwrap_or_default();

        if !resp.ok() {
            return Err(rejection(resp.status(), &text));
        }
        Ok(text)
    }

    /// Password sign-in against Supabase auth.
    pub async fn sign_in(config: &Config, email: &str, password: &str) -> Result<AuthSession, RemoteError> {
        let body = serde_json::json!({
            "email": email,
            "password": password
        })
        .to_string();
        let headers = get_headers(config, None, None).map_err(transport("headers"))?;
        let opts = create_request_init("POST", Some(&body), &headers);
        let text = send(&config.auth_url("token?grant_type=password"), &opts).await?;
        parse_auth(&text)
    }

    /// PostgREST access to the workouts table with the signed-in user's token.
    pub struct SupabaseRemote {
        config: Rc<Config>,
        access_token: String,
    }

    impl SupabaseRemote {
        pub fn new(config: Rc<Config>, session: &AuthSession) -> Self {
            Self {
                config,
                access_token: session.access_token.clone(),
            }
        }

        async fn request(
            &self,
            method: &str,
            query: Option<&str>,
            body: Option<&str>,
            prefer: Option<&str>,
        ) -> Result<String, RemoteError> {
            let headers = get_headers(&self.config, Some(&self.access_token), prefer)
                .map_err(transport("headers"))?;
            let opts = create_request_init(method, body, &headers);
            let url = match query {
                Some(q) => format!("{}?{}", self.config.rest_url(), q),
                None => self.config.rest_url(),
            };
            send(&url, &opts).await
        }

        fn encode<T: serde::Serialize>(value: &T) -> Result<String, RemoteError> {
            serde_json::to_string(value).map_err(|e| RemoteError::Transport(e.to_string()))
        }
    }

    #[async_trait(?Send)]
    impl RemoteStore for SupabaseRemote {
        async fn create_record(
            &self,
            user: &UserId,
            date: NaiveDate,
            exercise_name: &str,
            sets: &SetMap,
        ) -> Result<i64, RemoteError> {
            let body = Self::encode(&WorkoutRow::new(None, user, date, exercise_name, sets))?;
            let text = self.request("POST", None, Some(&body), Some(RETURN_ROWS)).await?;
            returned_id(&text)?.ok_or_else(|| RemoteError::Transport("insert returned no row".into()))
        }

        async fn update_record(&self, id: i64, sets: &SetMap) -> Result<(), RemoteError> {
            let body = Self::encode(&SetsPatch { sets })?;
            let query = format!("id=eq.{}", id);
            let text = self
                .request("PATCH", Some(&query), Some(&body), Some(RETURN_ROWS))
                .await?;
            match returned_id(&text)? {
                Some(_) => Ok(()),
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
            let body = Self::encode(&WorkoutRow::new(id, user, date, exercise_name, sets))?;
            let text = self.request("POST", None, Some(&body), Some(UPSERT_ROWS)).await?;
            returned_id(&text)?.ok_or_else(|| RemoteError::Transport("upsert returned no row".into()))
        }

        async fn list_records(&self, user: &UserId, date: NaiveDate) -> Result<Vec<WorkoutRecord>, RemoteError> {
            let text = self
                .request("GET", Some(&day_query(user, date)), None, None)
                .await?;
            Ok(parse_rows(&text)?
                .into_iter()
                .filter_map(WorkoutRow::into_record)
                .collect())
        }

        async fn delete_record(&self, id: i64) -> Result<(), RemoteError> {
            let query = format!("id=eq.{}", id);
            let text = self
                .request("DELETE", Some(&query), None, Some(RETURN_ROWS))
                .await?;
            match returned_id(&text)? {
                Some(_) => Ok(()),
                None => Err(RemoteError::NotFound(id)),
            }
        }
    }
}
