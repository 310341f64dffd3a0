use crate::error::{Error, Result};
use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Longest session lifetime accepted, one year.
pub const MAX_SESSION_HOURS: i64 = 24 * 365;

/// Runtime settings.
///
/// Sources, later ones winning: built-in defaults, an optional
/// `predictables.{toml,yaml,json}` in the working directory (or the file given
/// to [`Settings::from_file`]), then `PREDICTABLES_*` environment variables,
/// e.g. `PREDICTABLES_CHUNK_DIR=/srv/chunks`.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Where chunk files are written and read.
    pub chunk_dir: PathBuf,
    /// Where named datasets (and uploads) live.
    pub data_dir: PathBuf,
    pub users_file: PathBuf,
    pub bind_addr: String,
    /// Session lifetime, between 1 and [`MAX_SESSION_HOURS`].
    pub session_hours: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            chunk_dir: PathBuf::from("."),
            data_dir: PathBuf::from("data"),
            users_file: PathBuf::from("database/users.json"),
            bind_addr: "127.0.0.1:5000".to_string(),
            session_hours: 24,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self> {
        Self::load(File::with_name("predictables").required(false))
    }

    /// Like [`Settings::new`] but reading an explicit, required config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(File::from(path).required(true))
    }

    fn load<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        dotenv().ok();

        let defaults = Settings::default();
        let builder = Config::builder()
            .set_default("chunk_dir", defaults.chunk_dir.to_string_lossy().into_owned())?
            .set_default("data_dir", defaults.data_dir.to_string_lossy().into_owned())?
            .set_default("users_file", defaults.users_file.to_string_lossy().into_owned())?
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("session_hours", defaults.session_hours)?
            .add_source(file)
            .add_source(Environment::with_prefix("PREDICTABLES"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would break the server at run time.
    pub fn validate(&self) -> Result<()> {
        self.session_ttl().map(|_| ())
    }

    /// Session lifetime as a duration.
    pub fn session_ttl(&self) -> Result<Duration> {
        if !(1..=MAX_SESSION_HOURS).contains(&self.session_hours) {
            return Err(Error::Config(ConfigError::Message(format!(
                "session_hours must be between 1 and {MAX_SESSION_HOURS}, got {}",
                self.session_hours
            ))));
        }
        Duration::try_hours(self.session_hours).ok_or_else(|| {
            Error::Config(ConfigError::Message(format!(
                "session_hours {} is out of range",
                self.session_hours
            )))
        })
    }
}
