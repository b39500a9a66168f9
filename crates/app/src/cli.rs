//! Command line options.

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

use asset::{AssetRoots, FormatRevision};
use clap::Parser;

/// Extra search roots, in OS path-list syntax.
pub const ASSETS_ENV: &str = "SVAROG_ASSETS";

/// Root used when neither `--assets` nor the environment names one.
pub const DEFAULT_ASSETS_DIR: &str = "assets";

/// Svarog3D mesh viewer.
#[derive(Parser, Debug)]
#[command(
    name = "svarog3d",
    about = "Loads a chunked .bin mesh and draws it rotating",
    long_about = "Loads meshes/<NAME>.bin from the asset roots and draws it with a WGSL program.\n\n\
        Asset roots come from every --assets flag, then the SVAROG_ASSETS path list,\n\
        falling back to ./assets.\n\
        \n\
        EXAMPLES:\n\
          svarog3d --mesh cube --format revised\n\
          svarog3d --headless --frames 10 --assets ../runtime",
    version
)]
pub struct Args {
    /// Asset search root (repeatable, searched in order).
    #[arg(long = "assets", value_name = "DIR")]
    pub assets: Vec<PathBuf>,

    /// Mesh name, resolved as meshes/<NAME>.bin.
    #[arg(long, default_value = "cube")]
    pub mesh: String,

    /// Vertex declaration revision of the mesh file: legacy|revised.
    #[arg(long, default_value = "revised")]
    pub format: FormatRevision,

    /// Vertex shader, resolved as shaders/wgsl/<NAME>.wgsl.
    #[arg(long, default_value = "vs_mesh")]
    pub vs: String,

    /// Fragment shader, resolved as shaders/wgsl/<NAME>.wgsl.
    #[arg(long, default_value = "fs_mesh")]
    pub fs: String,

    /// Print a summary and run frames without opening a window.
    #[arg(long)]
    pub headless: bool,

    /// Frames to run in headless mode.
    #[arg(long, default_value_t = 3, requires = "headless")]
    pub frames: u32,

    /// GPU API for wgpu.
    #[arg(long, default_value = "auto", value_enum)]
    pub gpu_backend: CliGpuApi,

    /// Window size, WIDTHxHEIGHT.
    #[arg(long, default_value = "1280x720")]
    pub size: WindowSize,

    /// Log frame rate once per second.
    #[arg(long)]
    pub show_stats: bool,
}

impl Args {
    /// `--assets` roots, then `env` (an OS path list), else [`DEFAULT_ASSETS_DIR`].
    pub fn asset_roots(&self, env: Option<OsString>) -> AssetRoots {
        let mut roots = AssetRoots::new(&self.assets);
        if let Some(list) = env {
            roots = roots.with_path_list(&list);
        }
        if roots.is_empty() {
            roots.push(DEFAULT_ASSETS_DIR);
        }
        roots
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliGpuApi {
    /// Let wgpu pick.
    #[default]
    Auto,
    #[value(alias = "vk")]
    Vulkan,
    #[value(alias = "d3d12")]
    Dx12,
    #[value(alias = "mtl")]
    Metal,
    #[value(alias = "opengl", alias = "gles")]
    Gl,
}

impl From<CliGpuApi> for wgpu::Backends {
    fn from(api: CliGpuApi) -> Self {
        match api {
            CliGpuApi::Auto => wgpu::Backends::all(),
            CliGpuApi::Vulkan => wgpu::Backends::VULKAN,
            CliGpuApi::Dx12 => wgpu::Backends::DX12,
            CliGpuApi::Metal => wgpu::Backends::METAL,
            CliGpuApi::Gl => wgpu::Backends::GL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for WindowSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|e| format!("bad size component '{v}': {e}"))
        };
        Ok(Self {
            width: parse(w)?.max(1),
            height: parse(h)?.max(1),
        })
    }
}
