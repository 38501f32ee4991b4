use std::path::PathBuf;

use crate::ai::DEFAULT_MODEL;
use crate::db::Database;
use crate::error::IntelResult;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Settings resolved once at startup. Flags and environment variables are
/// merged by clap before they get here.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub model: String,
}

impl Config {
    pub fn resolve(db: Option<PathBuf>, model: Option<String>) -> Self {
        Self {
            db_path: db.unwrap_or_else(default_db_path),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

fn default_db_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "intel") {
        proj_dirs.data_dir().join("intel.db")
    } else {
        PathBuf::from("intel.db")
    }
}

/// Where the API credential came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    Stored(String),
    Env(String),
}

impl ApiKeySource {
    pub fn key(&self) -> &str {
        match self {
            ApiKeySource::Stored(k) | ApiKeySource::Env(k) => k,
        }
    }
}

/// Stored key first, then the environment. `None` means the user has to
/// go through `prompt` + `paste` instead of a direct call.
pub fn resolve_api_key(db: &Database, env_value: Option<String>) -> IntelResult<Option<ApiKeySource>> {
    if let Some(key) = db.api_key()? {
        return Ok(Some(ApiKeySource::Stored(key)));
    }
    Ok(env_value
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .map(ApiKeySource::Env))
}
