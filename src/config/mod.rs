//! Application Configuration
//!
//! Locator thresholds, polling behaviour and debug dumps stored in TOML format.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Text localization thresholds
    pub locator: LocatorConfig,
    /// Live session polling
    pub polling: PollingConfig,
    /// Diagnostic image dumps
    pub dump: DumpConfig,
}

/// Thresholds consumed by every stage of the text localization pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Language seen on the screen as 3-character ISO 639-2 code (eng, deu, fra ...)
    pub lang: String,
    /// Resize factor applied to every region before OCR
    pub img_resize: f64,
    /// Maximum height a detected box can have
    pub box_max_height: u32,
    /// Minimum height a detected box must have
    pub box_min_height: u32,
    /// Minimum width a detected box must have
    pub box_min_width: u32,
    /// Maximum distance of the end points of two lines for being detected as box corner
    pub box_corner_points_max_distance: f64,
    /// Minimum length a detected line must have
    pub line_min_length: u32,
    /// Variance ratio a pixel cluster must exceed to count as a line rather than a blob
    pub line_segment_min_covariance: f64,
    /// Minimum gradient value for pixels to be included into a line segment
    pub line_segment_low_threshold: f32,
    /// Minimum gradient value for pixels to initiate a line segmentation
    pub line_segment_high_threshold: f32,
    /// Minimum score a word sequence match needs to have
    pub min_str_match_score: f64,
    /// Maximum number of OCR calls in flight for one screen
    pub ocr_concurrency: usize,
    /// Tesseract executable
    pub tesseract_path: PathBuf,
    /// Invert predominantly dark screens before analysis
    pub invert_dark_screens: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            lang: "eng".to_string(),
            img_resize: 2.0,
            box_max_height: 200,
            box_min_height: 15,
            box_min_width: 40,
            box_corner_points_max_distance: 10.0,
            line_min_length: 15,
            line_segment_min_covariance: 5.0,
            line_segment_low_threshold: 20.0,
            line_segment_high_threshold: 20.0,
            min_str_match_score: 0.7,
            ocr_concurrency: 8,
            tesseract_path: PathBuf::from("tesseract"),
            invert_dark_screens: true,
        }
    }
}

impl LocatorConfig {
    /// Check the thresholds for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.img_resize.is_finite() && self.img_resize > 0.0,
            "img_resize must be positive, got {}",
            self.img_resize
        );
        ensure!(
            self.line_segment_low_threshold <= self.line_segment_high_threshold,
            "line_segment_low_threshold ({}) must not exceed line_segment_high_threshold ({})",
            self.line_segment_low_threshold,
            self.line_segment_high_threshold
        );
        ensure!(
            self.line_segment_min_covariance >= 1.0,
            "line_segment_min_covariance must be at least 1, got {}",
            self.line_segment_min_covariance
        );
        ensure!(
            self.box_min_height < self.box_max_height,
            "box_min_height ({}) must be below box_max_height ({})",
            self.box_min_height,
            self.box_max_height
        );
        ensure!(self.ocr_concurrency > 0, "ocr_concurrency must be at least 1");
        ensure!(!self.lang.is_empty(), "lang must not be empty");
        Ok(())
    }
}

/// Live session polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Give up after this many seconds (0 = never)
    pub timeout_secs: f64,
    /// Delay between two screen captures
    pub poll_interval_ms: u64,
    /// Only analyse screens that have been seen unchanged on a previous tick
    pub wait_for_stability: bool,
    /// Number of recent screen fingerprints remembered for stability checks
    pub stability_history: usize,
    /// Press the keep-alive key after every unsuccessful attempt
    pub prevent_screen_saver: bool,
    /// Key sent to wake up blank screens
    pub keep_alive_key: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            poll_interval_ms: 10,
            wait_for_stability: false,
            stability_history: 5,
            prevent_screen_saver: false,
            keep_alive_key: "ctrl".to_string(),
        }
    }
}

impl PollingConfig {
    /// Timeout as a duration, `None` when polling forever
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0.0).then(|| Duration::from_secs_f64(self.timeout_secs))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.timeout_secs.is_finite() && self.timeout_secs >= 0.0,
            "timeout_secs must be zero or positive, got {}",
            self.timeout_secs
        );
        ensure!(self.stability_history > 0, "stability_history must be at least 1");
        Ok(())
    }
}

/// Diagnostic dumps. Purely observational, never affect results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Image of detected lines and boxes
    pub boxes: Option<PathBuf>,
    /// The captured screen
    pub screen: Option<PathBuf>,
    /// Gradients along the x-axis
    pub x_gradients: Option<PathBuf>,
    /// Gradients along the y-axis
    pub y_gradients: Option<PathBuf>,
    /// Directory receiving every analysed screen
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.locator.validate()?;
        self.polling.validate()
    }
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "screentext", "screentext")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_locator_config() {
        let config = LocatorConfig::default();

        assert_eq!(config.lang, "eng");
        assert!((config.img_resize - 2.0).abs() < 1e-9);
        assert_eq!(config.box_max_height, 200);
        assert_eq!(config.box_min_height, 15);
        assert_eq!(config.box_min_width, 40);
        assert!((config.box_corner_points_max_distance - 10.0).abs() < 1e-9);
        assert_eq!(config.line_min_length, 15);
        assert!((config.line_segment_min_covariance - 5.0).abs() < 1e-9);
        assert!((config.line_segment_low_threshold - 20.0).abs() < 1e-6);
        assert!((config.line_segment_high_threshold - 20.0).abs() < 1e-6);
        assert!((config.min_str_match_score - 0.7).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_polling_config() {
        let config = PollingConfig::default();

        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert!(!config.wait_for_stability);
        assert_eq!(config.stability_history, 5);
        assert_eq!(config.keep_alive_key, "ctrl");
    }

    #[test]
    fn test_zero_timeout_polls_forever() {
        let config = PollingConfig {
            timeout_secs: 0.0,
            ..Default::default()
        };
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.locator.lang = "deu".to_string();
        config.locator.img_resize = 3.0;
        config.dump.boxes = Some(PathBuf::from("/tmp/boxes.png"));

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.locator.lang, "deu");
        assert!((parsed.locator.img_resize - 3.0).abs() < 1e-9);
        assert_eq!(parsed.dump.boxes, Some(PathBuf::from("/tmp/boxes.png")));
        assert_eq!(parsed.polling.stability_history, config.polling.stability_history);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str("[locator]\nbox_min_width = 10\n").unwrap();

        assert_eq!(parsed.locator.box_min_width, 10);
        assert_eq!(parsed.locator.box_min_height, 15);
        assert_eq!(parsed.locator.lang, "eng");
        assert!((parsed.polling.timeout_secs - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.locator.lang, loaded.locator.lang);
        assert_eq!(config.polling.poll_interval_ms, loaded.polling.poll_interval_ms);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[locator]\nimg_resize = 0.0").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_threshold_order() {
        let config = LocatorConfig {
            line_segment_low_threshold: 30.0,
            line_segment_high_threshold: 10.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
