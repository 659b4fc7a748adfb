//! Export orchestration
//!
//! Runs every mesh object and every clip through the pipeline, one unit at a
//! time. A failing unit is recorded and the run moves on; only configuration
//! errors stop a run.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hashbrown::HashMap;

use crate::animation::{self, AnimationHost, FrameRangeSource, SampleOptions};
use crate::config::ExportConfig;
use crate::coords::CoordinateSystem;
use crate::error::{AnimationError, ConfigError, ExportError};
use crate::VK_ASSET_FORMAT;
use crate::formats::{write_animation, write_asset_file, write_mesh};
use crate::mesh::{self, MeshOptions};
use crate::scene::{ObjectId, ObjectKind, Scene};

/// One unit of work that did not produce a file
#[derive(Debug)]
pub struct ExportFailure {
    pub unit: String,
    pub error: ExportError,
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.error)
    }
}

/// Best-effort result of an export run
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    /// Objects that cannot produce the requested asset kind
    pub skipped: Vec<String>,
    pub failures: Vec<ExportFailure>,
}

impl ExportSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: ExportSummary) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, unit: String, error: ExportError) {
        tracing::warn!("Failed to export {}: {}", unit, error);
        self.failures.push(ExportFailure { unit, error });
    }

    /// Log a one-line summary plus every failure
    pub fn report(&self) {
        tracing::info!(
            "Export finished: {} written, {} skipped, {} failed",
            self.written.len(),
            self.skipped.len(),
            self.failures.len()
        );
        for failure in &self.failures {
            tracing::error!("  {}", failure);
        }
    }
}

/// Object or clip name turned into a file stem that stays inside the output
/// directory
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        stem.replace('.', "_") + "_"
    } else {
        stem
    }
}

/// Output paths written so far in one export call, with the unit that wrote
/// each. Distinct names can sanitize to the same stem, and hosts may allow
/// duplicate names outright.
#[derive(Default)]
struct OutputClaims {
    owners: HashMap<PathBuf, String>,
}

impl OutputClaims {
    fn check(&self, path: &Path) -> Result<(), ExportError> {
        match self.owners.get(path) {
            Some(first) => Err(ExportError::OutputCollision {
                path: path.to_path_buf(),
                first: first.clone(),
            }),
            None => Ok(()),
        }
    }

    fn claim(&mut self, path: &Path, unit: &str) {
        self.owners.insert(path.to_path_buf(), unit.to_string());
    }
}

/// Write `<output_dir>/<object>.mesh` for every mesh object
pub fn export_meshes(
    scene: &Scene,
    output_dir: &Path,
    options: &MeshOptions,
    only_selected: bool,
    coords: &CoordinateSystem,
) -> ExportSummary {
    let mut summary = ExportSummary::default();
    let mut claims = OutputClaims::default();

    for (id, object) in scene.objects.iter().enumerate() {
        if only_selected && !object.selected {
            continue;
        }
        if !matches!(object.kind, ObjectKind::Mesh(_)) {
            tracing::debug!(
                "Skipping {} object '{}'",
                object.kind.type_name(),
                object.name
            );
            summary.skipped.push(object.name.clone());
            continue;
        }

        let unit = format!("mesh '{}'", object.name);
        let path = output_dir.join(format!(
            "{}.{}",
            sanitize_file_stem(&object.name),
            VK_ASSET_FORMAT.mesh_ext
        ));

        let result = claims.check(&path).and_then(|()| {
            let mesh = mesh::convert_mesh(scene, id, options, coords)?;
            let bytes = write_asset_file(&path, |buf| write_mesh(buf, &mesh))?;
            tracing::info!(
                "Exported {}: {} vertices, {} triangles, {} joints ({} bytes) -> {:?}",
                unit,
                mesh.verts.len(),
                mesh.tris.len(),
                mesh.joints.len(),
                bytes,
                path
            );
            Ok(())
        });

        match result {
            Ok(()) => {
                claims.claim(&path, &unit);
                summary.written.push(path);
            }
            Err(e) => summary.fail(unit, e),
        }
    }

    summary
}

/// Clip selection and sampling settings for `export_animations`
#[derive(Debug, Clone, Default)]
pub struct AnimationSettings {
    pub options: SampleOptions,
    pub range: FrameRangeSource,
    /// Restrict sampling to this armature object
    pub armature: Option<String>,
    /// Restrict export to clips whose name starts with this
    pub clip_prefix: Option<String>,
    pub only_selected: bool,
}

/// Armatures to sample, or a failure when a named target is unusable
fn target_armatures(
    scene: &Scene,
    settings: &AnimationSettings,
) -> Result<Vec<ObjectId>, AnimationError> {
    match &settings.armature {
        Some(name) => {
            let id = scene
                .find(name)
                .ok_or_else(|| AnimationError::NotAnArmature(name.clone()))?;
            scene
                .armature(id)
                .map(|_| vec![id])
                .ok_or_else(|| AnimationError::NotAnArmature(name.clone()))
        }
        None => Ok(scene
            .armatures()
            .filter(|(_, object, _)| !settings.only_selected || object.selected)
            .map(|(id, _, _)| id)
            .collect()),
    }
}

/// Sample every matching clip on every target armature and write
/// `<output_dir>/<clip>.anim`.
///
/// A clip belongs to an armature when it animates at least one of its bones.
/// When several armatures are exported, file stems are prefixed with the
/// armature name so clips shared between rigs do not collide.
pub fn export_animations<H: AnimationHost + ?Sized>(
    host: &mut H,
    output_dir: &Path,
    settings: &AnimationSettings,
    coords: &CoordinateSystem,
) -> Result<ExportSummary, ConfigError> {
    if settings.options.frame_step < 1 {
        return Err(ConfigError::InvalidFrameStep(settings.options.frame_step));
    }

    let mut summary = ExportSummary::default();
    let targets = match target_armatures(host.scene(), settings) {
        Ok(targets) => targets,
        Err(e) => {
            let unit = format!("armature '{}'", settings.armature.as_deref().unwrap_or(""));
            summary.fail(unit, e.into());
            return Ok(summary);
        }
    };
    let prefix_with_armature = targets.len() > 1;
    let mut claims = OutputClaims::default();

    for armature in targets {
        let (rig_name, bone_names) = match host.scene().object(armature).map(|o| &o.kind) {
            Some(ObjectKind::Armature(rig)) => (
                host.scene().objects[armature].name.clone(),
                rig.bones.iter().map(|b| b.name.clone()).collect::<Vec<_>>(),
            ),
            _ => continue,
        };
        let scene_range = host.scene().frame_range;

        let clips: Vec<(String, (i32, i32))> = host
            .clips()
            .iter()
            .filter(|clip| {
                settings
                    .clip_prefix
                    .as_deref()
                    .is_none_or(|prefix| clip.name.starts_with(prefix))
            })
            .filter(|clip| bone_names.iter().any(|b| clip.tracks.contains_key(b)))
            .map(|clip| {
                let range = match settings.range {
                    FrameRangeSource::Clip => clip.frame_range,
                    FrameRangeSource::Scene => scene_range,
                };
                (clip.name.clone(), range)
            })
            .collect();

        if clips.is_empty() {
            tracing::debug!("No clips to export for armature '{}'", rig_name);
        }

        for (clip_name, range) in clips {
            let unit = format!("clip '{}' on '{}'", clip_name, rig_name);
            let stem = if prefix_with_armature {
                sanitize_file_stem(&format!("{}_{}", rig_name, clip_name))
            } else {
                sanitize_file_stem(&clip_name)
            };
            let path = output_dir.join(format!("{}.{}", stem, VK_ASSET_FORMAT.animation_ext));

            let result = claims.check(&path).and_then(|()| {
                let anim = animation::sample_clip(
                    host,
                    armature,
                    &clip_name,
                    range,
                    &settings.options,
                    coords,
                )?;
                let bytes = write_asset_file(&path, |buf| write_animation(buf, &anim))?;
                tracing::info!(
                    "Exported {}: {} poses x {} joints, frames {}..={} ({} bytes) -> {:?}",
                    unit,
                    anim.poses.len(),
                    anim.joint_count(),
                    range.0,
                    range.1,
                    bytes,
                    path
                );
                Ok(())
            });

            match result {
                Ok(()) => {
                    claims.claim(&path, &unit);
                    summary.written.push(path);
                }
                Err(e) => summary.fail(unit, e),
            }
        }
    }

    Ok(summary)
}

/// Mark objects named in `names` as selected and everything else as not
pub fn apply_selection(scene: &mut Scene, names: &[String]) {
    for object in &mut scene.objects {
        object.selected = names.iter().any(|n| *n == object.name);
    }
}

/// Load the configured scene and export meshes and animations.
///
/// Configuration problems are returned as errors before anything is written;
/// per-unit failures are collected in the summary.
pub fn run(config: &ExportConfig) -> Result<ExportSummary> {
    let coords = config.validate()?;
    let input = config
        .input_path()
        .context("No input scene configured (set `input` in the config or pass --input)")?;

    let mut host = crate::scene::gltf::load_gltf(&input, config.animation.frame_rate)?;
    if !config.selected.is_empty() {
        apply_selection(&mut host.scene, &config.selected);
    } else if config.only_selected {
        tracing::warn!("only_selected is set but no objects are listed in `selected`");
    }

    let mut summary = export_meshes(
        &host.scene,
        &config.mesh_dir(),
        &config.mesh_options(),
        config.only_selected,
        &coords,
    );
    summary.merge(export_animations(
        &mut host,
        &config.animation_dir(),
        &config.animation_settings(),
        &coords,
    )?);

    Ok(summary)
}
