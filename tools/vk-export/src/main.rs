//! vk-export - Vk-Engine asset export tool
//!
//! Converts glTF/GLB scenes to engine binary formats (.mesh, .anim)

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use vk_export::animation::{AnimationHost, FrameRangeSource};
use vk_export::config::{self, ExportConfig};
use vk_export::export::{self, ExportSummary};
use vk_export::formats::{read_animation, read_mesh};
use vk_export::VK_ASSET_FORMAT;
use vk_export::scene::ObjectKind;
use vk_export::scene::gltf::{DEFAULT_FRAME_RATE, load_gltf};

#[derive(Parser)]
#[command(name = "vk-export")]
#[command(about = "Vk-Engine asset export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export meshes and animations described by a config file
    Build {
        /// Path to export.toml
        #[arg(default_value = "export.toml")]
        config: PathBuf,

        /// Input scene (overrides config)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Target axes (overrides config)
        #[arg(short, long)]
        coords: Option<String>,

        /// Base directory for mesh and animation output (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a config file without exporting
    Check {
        /// Path to export.toml
        #[arg(default_value = "export.toml")]
        config: PathBuf,
    },

    /// Export every mesh object in a scene
    Mesh {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "Meshes")]
        output: PathBuf,

        /// Target axes, e.g. +X+Z-Y
        #[arg(short, long, default_value = "+X+Y+Z")]
        coords: String,

        /// Bake each object's world transform into its vertices
        #[arg(long)]
        apply_transform: bool,

        /// Write meshes without tangents
        #[arg(long)]
        no_tangents: bool,

        /// Flip triangle winding
        #[arg(long)]
        reverse_winding: bool,

        /// Only export these objects
        #[arg(short, long)]
        selected: Vec<String>,
    },

    /// Sample every clip in a scene
    Animation {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "Animations")]
        output: PathBuf,

        /// Target axes, e.g. +X+Z-Y
        #[arg(short, long, default_value = "+X+Y+Z")]
        coords: String,

        /// Sample every Nth frame
        #[arg(long, default_value_t = 1)]
        frame_step: i32,

        /// Frames per second used to convert key times (default: 30)
        #[arg(short, long)]
        frame_rate: Option<f32>,

        /// Only sample this armature
        #[arg(short, long)]
        armature: Option<String>,

        /// Only export clips whose name starts with this
        #[arg(long)]
        clip_prefix: Option<String>,

        /// Use the scene's frame range instead of each clip's
        #[arg(long)]
        scene_range: bool,

        /// Bake the armature's world transform into root joints
        #[arg(long)]
        apply_transform: bool,
    },

    /// List objects and clips in a scene
    List {
        /// Input glTF/GLB file
        input: PathBuf,
    },

    /// Print the header and counts of an exported file
    Inspect {
        /// .mesh or .anim file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            input,
            coords,
            output,
            verbose,
        } => {
            if verbose {
                tracing::info!("Exporting from {:?}", config);
            }
            let mut cfg = config::load_config(&config)?;
            let cwd = std::env::current_dir()?;
            if let Some(input) = input {
                cfg.input = Some(cwd.join(input));
            }
            if let Some(coords) = coords {
                cfg.coordinate_system = coords;
            }
            if let Some(output) = output {
                let base = cwd.join(output);
                cfg.mesh.output_dir = base.join(&cfg.mesh.output_dir);
                cfg.animation.output_dir = base.join(&cfg.animation.output_dir);
            }
            finish(export::run(&cfg)?)?;
        }

        Commands::Check { config } => {
            tracing::info!("Checking config {:?}", config);
            let cfg = config::load_config(&config)?;
            cfg.validate()?;
            match cfg.input_path() {
                Some(input) if !input.exists() => {
                    anyhow::bail!("Input scene not found: {:?}", input)
                }
                Some(_) => {}
                None => tracing::warn!("No input scene configured"),
            }
            tracing::info!("Config is valid!");
        }

        Commands::Mesh {
            input,
            output,
            coords,
            apply_transform,
            no_tangents,
            reverse_winding,
            selected,
        } => {
            let mut cfg = ExportConfig {
                input: Some(input),
                coordinate_system: coords,
                apply_object_transform: apply_transform,
                only_selected: !selected.is_empty(),
                selected,
                ..Default::default()
            };
            cfg.mesh.output_dir = output;
            cfg.mesh.export_tangents = !no_tangents;
            cfg.mesh.reverse_winding = reverse_winding;

            let coords = cfg.validate()?;
            let mut host = load_input(&cfg)?;
            export::apply_selection(&mut host.scene, &cfg.selected);
            finish(export::export_meshes(
                &host.scene,
                &cfg.mesh_dir(),
                &cfg.mesh_options(),
                cfg.only_selected,
                &coords,
            ))?;
        }

        Commands::Animation {
            input,
            output,
            coords,
            frame_step,
            frame_rate,
            armature,
            clip_prefix,
            scene_range,
            apply_transform,
        } => {
            let mut cfg = ExportConfig {
                input: Some(input),
                coordinate_system: coords,
                apply_object_transform: apply_transform,
                ..Default::default()
            };
            cfg.animation.output_dir = output;
            cfg.animation.frame_step = frame_step;
            cfg.animation.frame_rate = frame_rate.unwrap_or(DEFAULT_FRAME_RATE);
            cfg.animation.armature = armature;
            cfg.animation.clip_prefix = clip_prefix;
            if scene_range {
                cfg.animation.frame_range = FrameRangeSource::Scene;
            }

            let coords = cfg.validate()?;
            let mut host = load_input(&cfg)?;
            finish(export::export_animations(
                &mut host,
                &cfg.animation_dir(),
                &cfg.animation_settings(),
                &coords,
            )?)?;
        }

        Commands::List { input } => list_scene(&input)?,

        Commands::Inspect { file } => inspect(&file)?,
    }

    Ok(())
}

fn load_input(cfg: &ExportConfig) -> Result<vk_export::animation::SceneHost> {
    let input = cfg
        .input_path()
        .ok_or_else(|| anyhow::anyhow!("No input scene"))?;
    tracing::info!("Loading {:?}", input);
    load_gltf(&input, cfg.animation.frame_rate)
}

/// Log the summary and turn any unit failure into a non-zero exit
fn finish(summary: ExportSummary) -> Result<()> {
    summary.report();
    if !summary.is_success() {
        anyhow::bail!("{} export(s) failed", summary.failures.len());
    }
    tracing::info!("Done!");
    Ok(())
}

fn list_scene(input: &Path) -> Result<()> {
    let host = load_gltf(input, DEFAULT_FRAME_RATE)?;
    let scene = host.scene();

    println!("Objects in {:?}:", input);
    for (id, object) in scene.objects.iter().enumerate() {
        let detail = match &object.kind {
            ObjectKind::Mesh(mesh) => format!(
                "{} vertices, {} triangles{}",
                mesh.positions.len(),
                mesh.triangles.len(),
                if mesh.armature.is_some() { ", skinned" } else { "" }
            ),
            ObjectKind::Armature(rig) => format!("{} bones", rig.bones.len()),
            _ => String::new(),
        };
        println!("  [{}] {} ({}) {}", id, object.name, object.kind.type_name(), detail);
    }

    println!("Clips (frames {}..={}):", scene.frame_range.0, scene.frame_range.1);
    for (i, clip) in host.clips().iter().enumerate() {
        println!(
            "  [{}] {} frames {}..={}, {} tracks",
            i,
            clip.name,
            clip.frame_range.0,
            clip.frame_range.1,
            clip.tracks.len()
        );
    }
    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let bytes = std::fs::read(file)?;

    if bytes.starts_with(VK_ASSET_FORMAT.animation_magic) {
        let anim = read_animation(&bytes)?;
        println!("ARMATURE_ANIMATION {:?}", file);
        println!("  poses:  {}", anim.poses.len());
        println!("  joints: {}", anim.joint_count());
        for (i, name) in anim.joint_names.iter().enumerate() {
            println!("    [{}] {}", i, name);
        }
    } else {
        let mesh = read_mesh(&bytes)?;
        println!("{:?} mesh {:?}", mesh.kind(), file);
        println!("  vertices:  {}", mesh.verts.len());
        println!("  triangles: {}", mesh.tris.len());
        println!("  tangents:  {}", mesh.has_tangents);
        for (i, joint) in mesh.joints.iter().enumerate() {
            println!("    [{}] {} (parent {})", i, joint.name, joint.parent_index);
        }
    }
    Ok(())
}
