use std::env;

use crate::access::AccessRules;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared immutably through `AppState` via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects the log format and fail-fast rules.
    pub env: Env,
    // Address the HTTP server binds to.
    pub bind_addr: String,
    // Base URL of the Supabase project (e.g. https://abcd.supabase.co).
    pub supabase_url: String,
    // Public anon key sent as `apikey` on every Auth API call.
    pub supabase_anon_key: String,
    // Project reference used to name the session cookie `sb-<ref>-auth-token`.
    pub project_ref: String,
    // A stored session closer than this to expiry is refreshed before use.
    pub refresh_margin_secs: i64,
    // Upper bound for a single round-trip to the Supabase Auth API.
    pub supabase_timeout_secs: u64,
    // Route table consumed by the guard.
    pub access: AccessRules,
}

/// Env
///
/// Defines the runtime context: `Local` for development against the Supabase CLI
/// stack, `Production` for the hosted project.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_SUPABASE_URL: &str = "http://127.0.0.1:54321";
const LOCAL_ANON_KEY: &str = "local-anon-key";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_REFRESH_MARGIN_SECS: i64 = 90;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            supabase_url: LOCAL_SUPABASE_URL.to_string(),
            supabase_anon_key: LOCAL_ANON_KEY.to_string(),
            project_ref: project_ref_from_url(LOCAL_SUPABASE_URL),
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            supabase_timeout_secs: DEFAULT_TIMEOUT_SECS,
            access: AccessRules::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and implements the
    /// **fail-fast** principle for production.
    ///
    /// # Panics
    /// Panics in `Production` if `SUPABASE_URL` or `SUPABASE_ANON_KEY` is missing, or
    /// if a numeric variable is set but does not parse.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (supabase_url, supabase_anon_key) = match env {
            Env::Production => (
                env::var("SUPABASE_URL").expect("FATAL: SUPABASE_URL required in prod"),
                env::var("SUPABASE_ANON_KEY").expect("FATAL: SUPABASE_ANON_KEY required in prod"),
            ),
            Env::Local => (
                env::var("SUPABASE_URL").unwrap_or_else(|_| LOCAL_SUPABASE_URL.to_string()),
                env::var("SUPABASE_ANON_KEY").unwrap_or_else(|_| LOCAL_ANON_KEY.to_string()),
            ),
        };
        let supabase_url = supabase_url.trim_end_matches('/').to_string();

        let project_ref = env::var("SUPABASE_PROJECT_REF")
            .unwrap_or_else(|_| project_ref_from_url(&supabase_url));

        let refresh_margin_secs = env::var("SESSION_REFRESH_MARGIN_SECS")
            .map(|v| {
                v.parse()
                    .expect("FATAL: SESSION_REFRESH_MARGIN_SECS must be an integer")
            })
            .unwrap_or(DEFAULT_REFRESH_MARGIN_SECS);

        let supabase_timeout_secs = env::var("SUPABASE_TIMEOUT_SECS")
            .map(|v| {
                v.parse()
                    .expect("FATAL: SUPABASE_TIMEOUT_SECS must be a positive integer")
            })
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            env,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            supabase_url,
            supabase_anon_key,
            project_ref,
            refresh_margin_secs,
            supabase_timeout_secs,
            access: AccessRules::default(),
        }
    }

    /// Name of the cookie (or cookie chunk prefix) holding the stored session.
    pub fn session_storage_key(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref)
    }
}

/// Derives the project reference the same way the Supabase client libraries do:
/// the first DNS label of the project URL's host.
pub fn project_ref_from_url(supabase_url: &str) -> String {
    let without_scheme = supabase_url
        .split_once("://")
        .map_or(supabase_url, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or(without_scheme);
    host.split('.').next().unwrap_or(host).to_string()
}
