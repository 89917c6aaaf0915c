use std::{env, fmt::Display, str::FromStr};

use crate::mealdb::DEFAULT_MEALDB_URL;
use crate::remix::{
    RemixSettings, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_OPENAI_URL, DEFAULT_TEMPERATURE,
};

pub const DEFAULT_DB_PATH: &str = "cooking-remix.sqlite";

/// Everything but the bot token, which teloxide reads from `TELOXIDE_TOKEN` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mealdb_url: String,
    pub openai_url: String,
    pub openai_api_key: Option<String>,
    pub remix: RemixSettings,
    pub db_path: String,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        if openai_api_key.is_none() {
            log::warn!("OPENAI_API_KEY not set, remixes will fail");
        }

        Self {
            mealdb_url: try_load(&lookup, "MEALDB_API_URL", DEFAULT_MEALDB_URL.to_string()),
            openai_url: try_load(&lookup, "OPENAI_API_URL", DEFAULT_OPENAI_URL.to_string()),
            openai_api_key,
            remix: RemixSettings {
                model: try_load(&lookup, "REMIX_MODEL", DEFAULT_MODEL.to_string()),
                max_tokens: try_load(&lookup, "REMIX_MAX_TOKENS", DEFAULT_MAX_TOKENS),
                temperature: try_load(&lookup, "REMIX_TEMPERATURE", DEFAULT_TEMPERATURE),
            },
            db_path: try_load(&lookup, "SAVED_DB_PATH", DEFAULT_DB_PATH.to_string()),
        }
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            log::info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
    }
}
