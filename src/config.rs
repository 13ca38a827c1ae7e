//! Configuration types for background-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Background session settings
///
/// Mirrors the knobs an OS-level background transfer session exposes. The
/// coordinator itself only uses `temp_dir`; the remaining fields are read by the
/// engine the host wires up (see [`HttpTransferEngine`](crate::engine::HttpTransferEngine)).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the background session (default: "background-dl.session")
    #[serde(default = "default_session_identifier")]
    pub identifier: String,

    /// Router-owned staging directory for completed payloads (default: "temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Let the engine defer transfers to a convenient time (default: false)
    #[serde(default)]
    pub discretionary: bool,

    /// Relaunch the host when events arrive for a terminated process (default: true)
    #[serde(default = "default_true")]
    pub sends_launch_events: bool,

    /// Earliest start offset applied to new transfers (default: none)
    #[serde(default, with = "optional_duration_serde")]
    pub begin_delay: Option<Duration>,

    /// Per-request timeout for the reference HTTP engine (default: none)
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identifier: default_session_identifier(),
            temp_dir: default_temp_dir(),
            discretionary: false,
            sends_launch_events: true,
            begin_delay: None,
            request_timeout: None,
        }
    }
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "background-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Batch drain settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrainConfig {
    /// Upper bound on waiting for tracked jobs before signalling the host
    /// (default: 30 seconds, None = wait indefinitely)
    #[serde(default = "default_drain_timeout", with = "optional_duration_serde")]
    pub timeout: Option<Duration>,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            timeout: default_drain_timeout(),
        }
    }
}

/// What `schedule()` does when the identity already has an outstanding request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Refuse the new request with [`Error::Duplicate`] (default)
    #[default]
    Reject,
    /// Cancel the outstanding request, then schedule the new one
    Replace,
}

/// File collision handling at the final move
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Replace the existing file (default)
    #[default]
    Overwrite,
    /// Append (1), (2), etc. to the filename
    Rename,
    /// Fail the request with a file system error
    Skip,
}

/// Main configuration for the download coordinator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Background session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Batch drain settings
    #[serde(default)]
    pub drain: DrainConfig,

    /// Policy for scheduling an identity that is already outstanding
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Collision handling when the destination already exists
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Config {
    /// Router-owned staging directory
    pub fn temp_dir(&self) -> &PathBuf {
        &self.session.temp_dir
    }

    /// Check settings that would make the coordinator unusable
    pub fn validate(&self) -> Result<()> {
        if self.session.identifier.trim().is_empty() {
            return Err(Error::Config {
                message: "session identifier must not be empty".to_string(),
                key: Some("session.identifier".to_string()),
            });
        }
        if self.session.temp_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "temp_dir must not be empty".to_string(),
                key: Some("session.temp_dir".to_string()),
            });
        }
        Ok(())
    }
}

fn default_session_identifier() -> String {
    "background-dl.session".to_string()
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("background-dl.db")
}

fn default_drain_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_true() -> bool {
    true
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
