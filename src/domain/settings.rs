use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "sn60plus_tracker".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    TwentyFourHour,
    AmPm,
}

/// Wearer profile pushed to the device in the user-data frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub height_cm: u8,
    pub weight_kg: u8,
    pub age: u8,
    pub gender: Gender,
    pub steps_goal: u16,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            height_cm: 0,
            weight_kg: 70,
            age: 30,
            gender: Gender::Male,
            steps_goal: 10_000,
        }
    }
}

impl UserProfile {
    /// Stride length estimate the vendor app uses: height × 0.415 (male) or
    /// 0.413 (female), rounded up, with fixed fallbacks when height is
    /// unknown.
    pub fn step_length_cm(&self) -> u8 {
        let (factor, fallback) = match self.gender {
            Gender::Male => (0.415, 78),
            Gender::Female => (0.413, 70),
        };
        if self.height_cm == 0 {
            fallback
        } else {
            (self.height_cm as f64 * factor).ceil() as u8
        }
    }
}

/// Per-device preferences pushed in the settings/display frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePreferences {
    #[serde(default = "default_true")]
    pub metric_units: bool,
    #[serde(default = "default_time_format")]
    pub time_format: TimeFormat,
    #[serde(default = "default_false")]
    pub lift_wrist: bool,
    #[serde(default = "default_false")]
    pub inactivity_alarm: bool,
}

impl Default for DevicePreferences {
    fn default() -> Self {
        Self {
            metric_units: true,
            time_format: default_time_format(),
            lift_wrist: false,
            inactivity_alarm: false,
        }
    }
}

fn default_time_format() -> TimeFormat {
    TimeFormat::TwentyFourHour
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub user_profile: UserProfile,
    #[serde(default)]
    pub device_preferences: DevicePreferences,

    /// Period of the realtime differencing tick.
    #[serde(default = "default_realtime_tick_ms")]
    pub realtime_tick_ms: u64,

    /// Fetch is considered finished after this long without activity frames;
    /// the protocol has no end-of-transfer marker.
    #[serde(default = "default_fetch_idle_timeout_ms")]
    pub fetch_idle_timeout_ms: u64,

    pub known_device_addresses: Vec<String>,
    pub last_connected_address: Option<String>,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_profile: UserProfile::default(),
            device_preferences: DevicePreferences::default(),
            realtime_tick_ms: default_realtime_tick_ms(),
            fetch_idle_timeout_ms: default_fetch_idle_timeout_ms(),
            known_device_addresses: Vec::new(),
            last_connected_address: None,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_realtime_tick_ms() -> u64 {
    1000
}
fn default_fetch_idle_timeout_ms() -> u64 {
    3000
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    /// A service backed by defaults that never touches the filesystem.
    /// `save` still works if a path is set later via `new`.
    pub fn in_memory() -> Self {
        Self {
            settings: Settings::default(),
            settings_path: PathBuf::new(),
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("Sn60PlusTracker");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if self.settings_path.as_os_str().is_empty() {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn add_known_address(&mut self, address: &str) -> anyhow::Result<()> {
        if !self
            .settings
            .known_device_addresses
            .iter()
            .any(|a| a == address)
        {
            self.settings.known_device_addresses.push(address.to_string());
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_length_uses_height_heuristic() {
        let profile = UserProfile {
            height_cm: 180,
            gender: Gender::Male,
            ..Default::default()
        };
        assert_eq!(profile.step_length_cm(), 75); // ceil(180 * 0.415)

        let profile = UserProfile {
            height_cm: 165,
            gender: Gender::Female,
            ..Default::default()
        };
        assert_eq!(profile.step_length_cm(), 69); // ceil(165 * 0.413)
    }

    #[test]
    fn step_length_falls_back_when_height_unknown() {
        let mut profile = UserProfile {
            height_cm: 0,
            ..Default::default()
        };
        profile.gender = Gender::Male;
        assert_eq!(profile.step_length_cm(), 78);
        profile.gender = Gender::Female;
        assert_eq!(profile.step_length_cm(), 70);
    }

    #[test]
    fn known_addresses_are_deduplicated() {
        let mut service = SettingsService::in_memory();
        service.add_known_address("aa:bb:cc").unwrap();
        service.add_known_address("aa:bb:cc").unwrap();
        service.add_known_address("dd:ee:ff").unwrap();
        assert_eq!(
            service.get().known_device_addresses,
            vec!["aa:bb:cc", "dd:ee:ff"]
        );
    }

    #[test]
    fn settings_survive_a_json_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.realtime_tick_ms, 1000);
        assert_eq!(back.user_profile.steps_goal, 10_000);
    }
}
