use std::sync::Arc;
use std::time::Instant;

use crate::auth::OtpStore;
use crate::config::Config;
use crate::db::Database;
use crate::services::llm_provider::LLMProvider;
use crate::services::mastery_engine::MasteryParams;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    config: Arc<Config>,
    db: Option<Arc<Database>>,
    llm: Arc<LLMProvider>,
    otp_store: Arc<OtpStore>,
    mastery_params: MasteryParams,
}

impl AppState {
    pub fn new(config: Config, db: Option<Arc<Database>>) -> Self {
        Self {
            started_at: Instant::now(),
            config: Arc::new(config),
            db,
            llm: Arc::new(LLMProvider::from_env()),
            otp_store: Arc::new(OtpStore::new()),
            mastery_params: MasteryParams::from_env(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> Option<Arc<Database>> {
        self.db.clone()
    }

    pub fn llm(&self) -> Arc<LLMProvider> {
        Arc::clone(&self.llm)
    }

    pub fn otp_store(&self) -> Arc<OtpStore> {
        Arc::clone(&self.otp_store)
    }

    pub fn mastery_params(&self) -> MasteryParams {
        self.mastery_params
    }
}
