//! Bot config, loaded from environment variables (with `.env` via dotenvy in
//! main). Only connection, storage, and model-gateway settings live here; all
//! tuning constants stay with the components that own them.

use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// BOT_TOKEN
    pub bot_token: String,
    /// DATABASE_URL (SQLite file path or sqlx URL)
    pub database_url: String,
    /// LOG_FILE
    pub log_file: String,
    /// MODEL_API_KEY (falls back to OPENAI_API_KEY)
    pub model_api_key: String,
    /// MODEL_BASE_URL: OpenAI-compatible gateway endpoint, default upstream when unset
    pub model_base_url: Option<String>,
    /// EXPORT_DIR for transcript files
    pub export_dir: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token =
            env::var("BOT_TOKEN").map_err(|_| anyhow::anyhow!("BOT_TOKEN not set"))?;
        let model_api_key = env::var("MODEL_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .map_err(|_| anyhow::anyhow!("MODEL_API_KEY (or OPENAI_API_KEY) not set"))?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "relay_bot.db".to_string());
        let log_file =
            env::var("LOG_FILE").unwrap_or_else(|_| "logs/relay-bot.log".to_string());
        let model_base_url = env::var("MODEL_BASE_URL").ok();
        let export_dir = env::var("EXPORT_DIR").unwrap_or_else(|_| "exports".to_string());

        Ok(Self {
            bot_token,
            database_url,
            log_file,
            model_api_key,
            model_base_url,
            export_dir,
        })
    }
}
