//! Server configuration, loaded from environment variables at startup.

use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEV_FRONTEND_ORIGIN: &str = "http://localhost:5173";

/// Which [`crate::db::ConversationStore`] backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    /// Required for [`StoreKind::Postgres`].
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    /// Generation-service credential. Its absence is reported per request,
    /// not at startup.
    pub google_api_key: Option<String>,
    pub default_model: String,
    pub model_timeout: Duration,

    pub upload_dir: String,
    pub allowed_origins: Vec<String>,
    /// Bearer token → owner id.
    pub auth_tokens: HashMap<String, String>,
    pub port: u16,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            store: match env_or("CHAT_STORE", "postgres").to_lowercase().as_str() {
                "memory" => StoreKind::Memory,
                _ => StoreKind::Postgres,
            },
            database_url: non_empty_env("DATABASE_URL"),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
            google_api_key: non_empty_env("GOOGLE_API_KEY"),
            default_model: env_or("DEFAULT_MODEL", DEFAULT_MODEL),
            model_timeout: Duration::from_secs(parse_env("MODEL_TIMEOUT_SECS", 120)),
            upload_dir: env_or("UPLOAD_DIR", "uploads"),
            allowed_origins: parse_origins(&env_or("FRONTEND_URL", DEV_FRONTEND_ORIGIN)),
            auth_tokens: parse_auth_tokens(&env_or("AUTH_TOKENS", "")),
            port: parse_env("PORT", 5000),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Comma-separated origins; the local dev frontend is always allowed.
fn parse_origins(raw: &str) -> Vec<String> {
    let mut origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    if !origins.iter().any(|o| o == DEV_FRONTEND_ORIGIN) {
        origins.push(DEV_FRONTEND_ORIGIN.to_owned());
    }
    origins
}

/// `token=owner` pairs separated by commas. Malformed pairs are skipped.
fn parse_auth_tokens(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (token, owner) = pair.split_once('=')?;
            let (token, owner) = (token.trim(), owner.trim());
            (!token.is_empty() && !owner.is_empty()).then(|| (token.to_owned(), owner.to_owned()))
        })
        .collect()
}
