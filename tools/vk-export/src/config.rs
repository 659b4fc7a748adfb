//! Export configuration (export.toml)
//!
//! Every key is optional. Relative paths resolve against the directory that
//! holds the config file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::animation::{FrameRangeSource, SampleOptions};
use crate::coords::CoordinateSystem;
use crate::error::ConfigError;
use crate::export::AnimationSettings;
use crate::mesh::MeshOptions;
use crate::scene::gltf::DEFAULT_FRAME_RATE;

/// Root config structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// glTF/GLB scene to export
    pub input: Option<PathBuf>,
    pub coordinate_system: String,
    pub apply_object_transform: bool,
    pub only_selected: bool,
    /// Object names treated as selected
    pub selected: Vec<String>,
    pub mesh: MeshConfig,
    pub animation: AnimationConfig,

    /// Directory of the config file, set by `load_config`
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            input: None,
            coordinate_system: "+X+Y+Z".to_string(),
            apply_object_transform: false,
            only_selected: false,
            selected: Vec::new(),
            mesh: MeshConfig::default(),
            animation: AnimationConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub output_dir: PathBuf,
    pub export_tangents: bool,
    pub reverse_winding: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Meshes"),
            export_tangents: true,
            reverse_winding: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub output_dir: PathBuf,
    /// Only sample clips on this armature object
    pub armature: Option<String>,
    pub frame_step: i32,
    pub frame_range: FrameRangeSource,
    /// Only export clips whose name starts with this
    pub clip_prefix: Option<String>,
    /// glTF seconds to frames
    pub frame_rate: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Animations"),
            armature: None,
            frame_step: 1,
            frame_range: FrameRangeSource::Clip,
            clip_prefix: None,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl ExportConfig {
    /// Check every value that would otherwise abort a run halfway through
    pub fn validate(&self) -> Result<CoordinateSystem, ConfigError> {
        let coords = CoordinateSystem::parse(&self.coordinate_system)?;
        if self.animation.frame_step < 1 {
            return Err(ConfigError::InvalidFrameStep(self.animation.frame_step));
        }
        if !(self.animation.frame_rate.is_finite() && self.animation.frame_rate > 0.0) {
            return Err(ConfigError::InvalidFrameRate(self.animation.frame_rate));
        }
        Ok(coords)
    }

    /// Resolve `path` against the config file's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn input_path(&self) -> Option<PathBuf> {
        self.input.as_deref().map(|p| self.resolve(p))
    }

    pub fn mesh_dir(&self) -> PathBuf {
        self.resolve(&self.mesh.output_dir)
    }

    pub fn animation_dir(&self) -> PathBuf {
        self.resolve(&self.animation.output_dir)
    }

    pub fn mesh_options(&self) -> MeshOptions {
        MeshOptions {
            apply_object_transform: self.apply_object_transform,
            export_tangents: self.mesh.export_tangents,
            reverse_winding: self.mesh.reverse_winding,
            ..Default::default()
        }
    }

    pub fn animation_settings(&self) -> AnimationSettings {
        AnimationSettings {
            options: SampleOptions {
                frame_step: self.animation.frame_step,
                apply_object_transform: self.apply_object_transform,
                ..Default::default()
            },
            range: self.animation.frame_range,
            armature: self.animation.armature.clone(),
            clip_prefix: self.animation.clip_prefix.clone(),
            only_selected: self.only_selected,
        }
    }
}

/// Load and parse a config file
pub fn load_config(path: &Path) -> Result<ExportConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let mut config: ExportConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {:?}", path))?;
    config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(config)
}
