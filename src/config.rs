use chrono::NaiveDate;

use crate::types::UserId;

const DEFAULT_SUPABASE_URL: &str = "https://localhost.supabase.co";
const DEFAULT_KEY_PREFIX: &str = "liftlog";
const DEFAULT_WORKOUTS_TABLE: &str = "workouts";

/// Deployment settings. Baked in at build time since the bundle has no runtime environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_key: String,
    pub key_prefix: String,
    pub workouts_table: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: DEFAULT_SUPABASE_URL.to_string(),
            supabase_key: String::new(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            workouts_table: DEFAULT_WORKOUTS_TABLE.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            supabase_url: option_env!("LIFTLOG_SUPABASE_URL")
                .map(str::to_string)
                .unwrap_or(defaults.supabase_url),
            supabase_key: option_env!("LIFTLOG_SUPABASE_KEY")
                .map(str::to_string)
                .unwrap_or(defaults.supabase_key),
            key_prefix: option_env!("LIFTLOG_KEY_PREFIX")
                .map(str::to_string)
                .unwrap_or(defaults.key_prefix),
            workouts_table: defaults.workouts_table,
        }
    }

    pub fn with_supabase(mut self, url: &str, key: &str) -> Self {
        self.supabase_url = url.trim_end_matches('/').to_string();
        self.supabase_key = key.to_string();
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn cache_key(&self, user: &UserId, date: NaiveDate) -> String {
        format!("{}_cache:{}:{}", self.key_prefix, user, date.format("%Y-%m-%d"))
    }

    pub fn pending_key(&self, user: &UserId) -> String {
        format!("{}_pending:{}", self.key_prefix, user)
    }

    pub fn templates_key(&self) -> String {
        format!("{}_templates", self.key_prefix)
    }

    pub fn auth_session_key(&self) -> String {
        format!("{}_auth_session", self.key_prefix)
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, self.workouts_table)
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced_per_user() {
        let config = Config::default().with_key_prefix("t");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        assert_eq!(config.cache_key(&alice, date), "t_cache:alice:2024-03-05");
        assert_eq!(config.pending_key(&alice), "t_pending:alice");
        assert_ne!(config.pending_key(&alice), config.pending_key(&bob));
        assert_ne!(config.cache_key(&alice, date), config.pending_key(&alice));
    }

    #[test]
    fn test_urls() {
        let config = Config::default().with_supabase("https://abc.supabase.co/", "key");
        assert_eq!(config.rest_url(), "https://abc.supabase.co/rest/v1/workouts");
        assert_eq!(
            config.auth_url("token?grant_type=password"),
            "https://abc.supabase.co/auth/v1/token?grant_type=password"
        );
    }
}
