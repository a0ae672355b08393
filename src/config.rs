use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::markers::RetryPolicy;
use crate::telemetry::ByteOrder;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub footprint: FootprintConfig,
    #[serde(default)]
    pub markers: MarkersConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            byte_order: ByteOrder::default(),
            topics: default_topics(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "data2groundmark".to_string()
}

fn default_topics() -> Vec<String> {
    [
        "aipov/altitude/alt_imu1_m/synchro",
        "aipov/attitude/thead_imu1_deg/synchro",
        "aipov/attitude/pitch_imu1_deg/synchro",
        "aipov/attitude/roll_imu1_deg/synchro",
        "aipov/position_horizontale/lat_imu1/synchro",
        "aipov/position_horizontale/lon_imu1/synchro",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
        }
    }
}

fn default_period() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize)]
pub struct FootprintConfig {
    #[serde(default = "default_min_altitude")]
    pub min_altitude_m: f64,
    #[serde(default)]
    pub ground_elevation_m: f64,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub attitude_correction_deg: AttitudeCorrection,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            min_altitude_m: default_min_altitude(),
            ground_elevation_m: 0.0,
            camera: CameraConfig::default(),
            attitude_correction_deg: AttitudeCorrection::default(),
        }
    }
}

fn default_min_altitude() -> f64 {
    200.0
}

/// Field of view of the downward looking camera, in degrees.
/// `hfov_deg` spans the cross-track (wing to wing) axis.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CameraConfig {
    pub hfov_deg: f64,
    pub vfov_deg: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            hfov_deg: 60.0,
            vfov_deg: 45.0,
        }
    }
}

/// Boresight misalignment added to the measured attitude.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AttitudeCorrection {
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub heading: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_mission_id")]
    pub mission_id: String,
    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_eviction_window", with = "humantime_serde")]
    pub eviction_window: Duration,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_current_color")]
    pub current_color: String,
    #[serde(default = "default_superseded_color")]
    pub superseded_color: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            mission_id: default_mission_id(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            eviction_window: default_eviction_window(),
            group: default_group(),
            current_color: default_current_color(),
            superseded_color: default_superseded_color(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://safire.atmosphere.aero".to_string()
}

fn default_mission_id() -> String {
    "SILEX".to_string()
}

fn default_username_env() -> String {
    "planete_username".to_string()
}

fn default_password_env() -> String {
    "planete_username_passwd".to_string()
}

fn default_eviction_window() -> Duration {
    Duration::from_secs(900)
}

fn default_group() -> String {
    "footprint".to_string()
}

fn default_current_color() -> String {
    "#ff0000".to_string()
}

fn default_superseded_color() -> String {
    "#000000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("save_footPrint")
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.into()));

        if self.schedule.period.is_zero() {
            return invalid("schedule.period must be greater than zero");
        }
        if self.markers.eviction_window.is_zero() {
            return invalid("markers.eviction_window must be greater than zero");
        }
        let fov_ok = |v: f64| v > 0.0 && v < 180.0;
        if !fov_ok(self.footprint.camera.hfov_deg) || !fov_ok(self.footprint.camera.vfov_deg) {
            return invalid("footprint.camera field of view must lie in (0, 180) degrees");
        }
        if self.markers.retry.max_attempts == 0 {
            return invalid("markers.retry.max_attempts must be at least 1");
        }
        if self.telemetry.topics.is_empty() {
            return invalid("telemetry.topics must not be empty");
        }
        Ok(())
    }
}

impl MarkersConfig {
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let read = |var: &str| {
            std::env::var(var).map_err(|_| ConfigError::MissingCredential(var.to_string()))
        };
        Ok(Credentials {
            username: read(&self.username_env)?,
            password: read(&self.password_env)?,
        })
    }
}

pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_str("{}").unwrap();
        assert_eq!(config.schedule.period, Duration::from_secs(10));
        assert_eq!(config.markers.eviction_window, Duration::from_secs(900));
        assert_eq!(config.footprint.min_altitude_m, 200.0);
        assert_eq!(config.telemetry.topics.len(), 6);
        assert_eq!(config.markers.retry.max_attempts, 1);
        assert!(config.history.enabled);
    }

    #[test]
    fn durations_use_humantime_notation() {
        let yaml = "schedule:\n  period: 2s\nmarkers:\n  eviction_window: 5m\n";
        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.schedule.period, Duration::from_secs(2));
        assert_eq!(config.markers.eviction_window, Duration::from_secs(300));
    }

    #[test]
    fn zero_period_is_rejected() {
        let err = Config::from_str("schedule:\n  period: 0s\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_field_of_view_is_rejected() {
        let yaml = "footprint:\n  camera:\n    hfov_deg: 180\n    vfov_deg: 40\n";
        assert!(matches!(
            Config::from_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let markers = MarkersConfig {
            username_env: "GROUNDMARK_TEST_SURELY_UNSET_USER".into(),
            ..MarkersConfig::default()
        };
        match markers.credentials() {
            Err(ConfigError::MissingCredential(var)) => {
                assert_eq!(var, "GROUNDMARK_TEST_SURELY_UNSET_USER")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
