use std::env;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use url::Url;

use crate::progress::{ProgressSettings, COMPLETE};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct IntakeConfig {
    pub api_url: Url,
    pub max_upload_bytes: u64,
    pub progress_step: u8,
    pub progress_tick_ms: u64,
    pub progress_ceiling: u8,
}

impl IntakeConfig {
    pub fn from_env() -> Result<Self> {
        let raw_api_url = env::var("INTAKE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&raw_api_url).context("INTAKE_API_URL must be a valid URL")?;
        let max_upload_bytes = env::var("INTAKE_MAX_UPLOAD_BYTES")
            .ok()
            .map(|value| value.parse::<u64>())
            .transpose()
            .context("INTAKE_MAX_UPLOAD_BYTES must be a byte count")?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let progress_step = env::var("INTAKE_PROGRESS_STEP")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("INTAKE_PROGRESS_STEP must be an integer between 0 and 255")?;
        let progress_tick_ms = env::var("INTAKE_PROGRESS_TICK_MS")
            .unwrap_or_else(|_| "200".to_string())
            .parse()
            .context("INTAKE_PROGRESS_TICK_MS must be an integer")?;
        let progress_ceiling: u8 = env::var("INTAKE_PROGRESS_CEILING")
            .unwrap_or_else(|_| "90".to_string())
            .parse()
            .context("INTAKE_PROGRESS_CEILING must be an integer")?;
        ensure!(
            progress_ceiling < COMPLETE,
            "INTAKE_PROGRESS_CEILING must be below {COMPLETE}"
        );

        Ok(Self {
            api_url,
            max_upload_bytes,
            progress_step,
            progress_tick_ms,
            progress_ceiling,
        })
    }

    pub fn progress_settings(&self) -> ProgressSettings {
        ProgressSettings {
            step: self.progress_step,
            ceiling: self.progress_ceiling,
            tick: Duration::from_millis(self.progress_tick_ms),
        }
    }

    /// The API URL with any embedded password masked, for logs.
    pub fn redacted_api_url(&self) -> String {
        let mut url = self.api_url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("*****"));
        }
        url.to_string()
    }
}
