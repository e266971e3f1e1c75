//! Environment-backed configuration
//!
//! All external handles (registry directory, store path, SMTP account)
//! are collected into one `Settings` value at process start and passed
//! down explicitly; no component reaches for the environment itself.

use std::env;
use std::path::PathBuf;

/// SMTP account used for alert email
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
    pub recipient: String,
}

/// Pipeline-wide settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Main index symbol
    pub ticker: String,
    /// Auxiliary index joined into the features
    pub aux_ticker: String,
    pub data_dir: PathBuf,
    pub registry_dir: PathBuf,
    pub store_path: PathBuf,
    pub reports_dir: PathBuf,
    /// Bind address for the serving layer
    pub bind_addr: String,
    /// SMTP account; None disables alert email
    pub smtp: Option<SmtpSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ticker: "^GSPC".to_string(),
            aux_ticker: "^IXIC".to_string(),
            data_dir: PathBuf::from("data"),
            registry_dir: PathBuf::from("models/registry"),
            store_path: PathBuf::from("data/store.db"),
            reports_dir: PathBuf::from("reports"),
            bind_addr: "0.0.0.0:8000".to_string(),
            smtp: None,
        }
    }
}

impl Settings {
    /// Load settings from the environment, reading `.env` if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let smtp = match (
            env::var("SMTP_HOST"),
            env::var("SMTP_USERNAME"),
            env::var("SMTP_PASSWORD"),
            env::var("ALERT_FROM"),
            env::var("ALERT_RECIPIENT"),
        ) {
            (Ok(host), Ok(username), Ok(password), Ok(from), Ok(recipient)) => Some(SmtpSettings {
                host,
                username,
                password,
                from,
                recipient,
            }),
            _ => None,
        };

        Self {
            ticker: env::var("SP500_TICKER").unwrap_or(defaults.ticker),
            aux_ticker: env::var("SP500_AUX_TICKER").unwrap_or(defaults.aux_ticker),
            data_dir: env::var("SP500_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            registry_dir: env::var("SP500_REGISTRY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_dir),
            store_path: env::var("SP500_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            reports_dir: env::var("SP500_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            bind_addr: env::var("SP500_BIND_ADDR").unwrap_or(defaults.bind_addr),
            smtp,
        }
    }

    /// Raw OHLCV CSV appended by the fetch stage
    pub fn raw_data_path(&self, name: &str) -> PathBuf {
        self.data_dir.join("raw").join(format!("{name}.csv"))
    }

    /// Feature frame written by the process stage
    pub fn current_data_path(&self) -> PathBuf {
        self.data_dir.join("current_data.csv")
    }

    /// Reference frame the drift validator compares against
    pub fn reference_data_path(&self) -> PathBuf {
        self.data_dir.join("reference_data.csv")
    }

    pub fn train_path(&self) -> PathBuf {
        self.data_dir.join("validation").join("train.csv")
    }

    pub fn test_path(&self) -> PathBuf {
        self.data_dir.join("validation").join("test.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let settings = Settings::default();
        assert_eq!(
            settings.raw_data_path("sp500"),
            PathBuf::from("data/raw/sp500.csv")
        );
        assert_eq!(
            settings.train_path(),
            PathBuf::from("data/validation/train.csv")
        );
        assert!(settings.smtp.is_none());
    }
}
