//! Environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use doorkeep_controller::ControllerConfig;
use doorkeep_core::constants::{
    CODE_INPUT_TIMEOUT, COMMAND_POLL_INTERVAL, DOOR_OPEN_WAIT, LIGHTS_OFF_CODE, LIGHTS_ON_CODE,
    MAX_CODE_LENGTH, OPEN_WAIT, RESET_TO_IDLE, SENSOR_POLL_INTERVAL,
};
use doorkeep_core::{Error, Result};
use doorkeep_storage::{DatabaseConfig, PolicyConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub codebook_path: String,
    /// Master code; empty selects the default code.
    pub admin_code: String,
    pub open_wait: Duration,
    pub door_open_wait: Duration,
    pub reset_idle: Duration,
    pub code_input_timeout: Duration,
    pub max_code_length: usize,
    pub sensor_poll: Duration,
    pub command_poll: Duration,
    /// Inbound command directory; remote commands are disabled when unset.
    pub command_spool_dir: Option<PathBuf>,
    pub lights_on_code: String,
    pub lights_off_code: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            codebook_path: "doorkeep.db".to_string(),
            admin_code: String::new(),
            open_wait: OPEN_WAIT,
            door_open_wait: DOOR_OPEN_WAIT,
            reset_idle: RESET_TO_IDLE,
            code_input_timeout: CODE_INPUT_TIMEOUT,
            max_code_length: MAX_CODE_LENGTH,
            sensor_poll: SENSOR_POLL_INTERVAL,
            command_poll: COMMAND_POLL_INTERVAL,
            command_spool_dir: None,
            lights_on_code: LIGHTS_ON_CODE.to_string(),
            lights_off_code: LIGHTS_OFF_CODE.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from process environment variables and validate.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup and validate. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = get("CODEBOOK_PATH") {
            config.codebook_path = path;
        }
        if let Some(code) = get("ADMIN_CODE") {
            config.admin_code = code;
        }
        if let Some(raw) = get("OPEN_WAIT_SECS") {
            config.open_wait = Duration::from_secs(parse_number("OPEN_WAIT_SECS", &raw)?);
        }
        if let Some(raw) = get("DOOR_OPEN_SECS") {
            config.door_open_wait = Duration::from_secs(parse_number("DOOR_OPEN_SECS", &raw)?);
        }
        if let Some(raw) = get("RESET_IDLE_SECS") {
            config.reset_idle = Duration::from_secs(parse_number("RESET_IDLE_SECS", &raw)?);
        }
        if let Some(raw) = get("CODE_INPUT_TIMEOUT_SECS") {
            config.code_input_timeout =
                Duration::from_secs(parse_number("CODE_INPUT_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = get("MAX_CODE_LENGTH") {
            config.max_code_length = parse_number("MAX_CODE_LENGTH", &raw)?;
        }
        if let Some(raw) = get("SENSOR_POLL_MILLIS") {
            config.sensor_poll = Duration::from_millis(parse_number("SENSOR_POLL_MILLIS", &raw)?);
        }
        if let Some(raw) = get("COMMAND_POLL_SECS") {
            config.command_poll = Duration::from_secs(parse_number("COMMAND_POLL_SECS", &raw)?);
        }
        if let Some(dir) = get("COMMAND_SPOOL_DIR") {
            config.command_spool_dir = Some(PathBuf::from(dir));
        }
        if let Some(code) = get("LIGHTS_ON_CODE") {
            config.lights_on_code = code;
        }
        if let Some(code) = get("LIGHTS_OFF_CODE") {
            config.lights_off_code = code;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("OPEN_WAIT_SECS", self.open_wait),
            ("DOOR_OPEN_SECS", self.door_open_wait),
            ("RESET_IDLE_SECS", self.reset_idle),
            ("CODE_INPUT_TIMEOUT_SECS", self.code_input_timeout),
            ("SENSOR_POLL_MILLIS", self.sensor_poll),
            ("COMMAND_POLL_SECS", self.command_poll),
        ];
        if let Some((key, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::Config(format!("{key} must be greater than zero")));
        }

        if self.max_code_length == 0 {
            return Err(Error::Config("MAX_CODE_LENGTH must be greater than zero".into()));
        }

        if !self.admin_code.is_empty() {
            check_code("ADMIN_CODE", &self.admin_code)?;
            if self.admin_code.len() > self.max_code_length {
                return Err(Error::Config(format!(
                    "ADMIN_CODE is longer than MAX_CODE_LENGTH ({})",
                    self.max_code_length
                )));
            }
        }
        check_code("LIGHTS_ON_CODE", &self.lights_on_code)?;
        check_code("LIGHTS_OFF_CODE", &self.lights_off_code)?;

        Ok(())
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.codebook_path.clone())
    }

    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig::new(self.admin_code.clone())
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig::default()
            .with_open_wait(self.open_wait)
            .with_close_wait(self.door_open_wait)
            .with_reset_idle(self.reset_idle)
            .with_sensor_poll(self.sensor_poll)
            .with_lights_codes(self.lights_on_code.clone(), self.lights_off_code.clone())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{key}: expected a whole number, got {raw:?}")))
}

fn check_code(key: &str, code: &str) -> Result<()> {
    if code.is_empty() {
        return Err(Error::MissingConfig(key.to_string()));
    }
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Config(format!("{key} must contain digits only")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.policy().master_code(), "1234");
        assert!(config.command_spool_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CODEBOOK_PATH", "/var/lib/doorkeep/codes.db"),
            ("ADMIN_CODE", "908172"),
            ("OPEN_WAIT_SECS", "30"),
            ("RESET_IDLE_SECS", "5"),
            ("SENSOR_POLL_MILLIS", "250"),
            ("COMMAND_SPOOL_DIR", "/var/spool/doorkeep"),
            ("LIGHTS_ON_CODE", " 999999 "),
        ])
        .unwrap();

        assert_eq!(config.open_wait, Duration::from_secs(30));
        assert_eq!(config.reset_idle, Duration::from_secs(5));
        assert_eq!(config.sensor_poll, Duration::from_millis(250));
        assert_eq!(config.lights_on_code, "999999");
        assert_eq!(config.policy().master_code(), "908172");
        assert_eq!(config.controller().open_wait, Duration::from_secs(30));
        assert_eq!(
            config.command_spool_dir,
            Some(PathBuf::from("/var/spool/doorkeep"))
        );
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config = load(&[("ADMIN_CODE", ""), ("OPEN_WAIT_SECS", "  ")]).unwrap();
        assert_eq!(config.admin_code, "");
        assert_eq!(config.open_wait, OPEN_WAIT);
    }

    #[rstest]
    #[case("OPEN_WAIT_SECS", "0")]
    #[case("DOOR_OPEN_SECS", "sixty")]
    #[case("RESET_IDLE_SECS", "-3")]
    #[case("MAX_CODE_LENGTH", "0")]
    #[case("SENSOR_POLL_MILLIS", "0")]
    #[case("ADMIN_CODE", "12ab")]
    #[case("ADMIN_CODE", "1234567")]
    #[case("LIGHTS_OFF_CODE", "lights")]
    fn test_invalid_values(#[case] key: &str, #[case] value: &str) {
        let err = load(&[(key, value)]).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{key}={value}: {err}");
        assert!(err.to_string().contains(key), "{err}");
    }
}
