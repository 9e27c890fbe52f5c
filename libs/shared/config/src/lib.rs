use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub doctor_seed_path: String,
    pub max_extraction_retries: u32,
    pub session_timeout_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            openai_api_key: env::var("OPENAI_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("OPENAI_API_KEY not set, using empty value");
                    String::new()
                }),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            doctor_seed_path: env::var("DOCTOR_SEED_PATH")
                .unwrap_or_else(|_| "demo_db.json".to_string()),
            max_extraction_retries: env::var("MAX_EXTRACTION_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            session_timeout_minutes: env::var("SESSION_TIMEOUT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.openai_api_key.is_empty() && !self.openai_base_url.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            doctor_seed_path: "demo_db.json".to_string(),
            max_extraction_retries: 3,
            session_timeout_minutes: 30,
        }
    }
}
