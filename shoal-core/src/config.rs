// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::annotation::AnnotationColumns;
use crate::constant;
use crate::error::ShoalError;

fn default_sample_rate() -> f64 {
    constant::DEFAULT_SAMPLE_RATE
}

fn default_sidecar_command() -> Vec<String> {
    vec![
        "python3".to_string(),
        "-m".to_string(),
        "sam2_sidecar".to_string(),
    ]
}

/// Settings of a tracking run, read from a YAML file
///
/// Required keys have no default. `SAM2_start` keeps the capitalisation used
/// by existing configuration files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackConfig {
    #[serde(default)]
    pub frame_tar_file: Option<PathBuf>,
    pub extracted_tar_dir: PathBuf,
    pub sam2_install_dir: PathBuf,
    pub model_cfg: String,
    pub sam2_checkpoint: PathBuf,
    pub non_overlap_masks: bool,
    pub offload_video_to_cpu: bool,
    pub offload_state_to_cpu: bool,
    pub annotations_file: PathBuf,
    pub fps: f64,
    #[serde(rename = "SAM2_start")]
    pub sam2_start: i64,
    pub frame_idx_name: String,
    pub labels_name: String,
    pub obj_id_name: String,
    pub points_name: String,
    pub save_masks: bool,
    pub masks_dict_file: PathBuf,
    pub font_size: f32,
    pub font_color: String,
    pub alpha: f32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default = "default_sidecar_command")]
    pub sidecar_command: Vec<String>,
    #[serde(default)]
    pub allow_cpu: bool,
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

impl TrackConfig {
    /// Load and validate a configuration file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a YAML configuration file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shoal_core::config::TrackConfig;
    /// let config = TrackConfig::open("reef_07.yaml");
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TrackConfig, ShoalError> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path)
            .map_err(|err| ShoalError::NoFileError(format!("{}: {}", path.display(), err)))?;

        TrackConfig::from_yaml(&text)
    }

    /// Parse and validate a configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<TrackConfig, ShoalError> {
        let config: TrackConfig =
            serde_yaml::from_str(text).map_err(|err| ShoalError::ConfigError(err.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the YAML types alone do not enforce
    pub fn validate(&self) -> Result<(), ShoalError> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(ShoalError::ConfigError(format!(
                "fps must be a positive number, found {}",
                self.fps
            )));
        }

        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ShoalError::ConfigError(format!(
                "sample_rate must be a positive number, found {}",
                self.sample_rate
            )));
        }

        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ShoalError::ConfigError(format!(
                "alpha must be in [0, 1], found {}",
                self.alpha
            )));
        }

        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ShoalError::ConfigError(format!(
                "font_size must be positive, found {}",
                self.font_size
            )));
        }

        if self.sidecar_command.is_empty() {
            return Err(ShoalError::ConfigError(
                "sidecar_command must name a program".to_string(),
            ));
        }

        Ok(())
    }

    /// Field names used to read the annotation file
    pub fn annotation_columns(&self) -> AnnotationColumns {
        AnnotationColumns {
            frame: self.frame_idx_name.clone(),
            click_type: self.labels_name.clone(),
            label: self.obj_id_name.clone(),
            location: self.points_name.clone(),
            ..AnnotationColumns::default()
        }
    }
}
