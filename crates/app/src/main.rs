//! Entry point for Svarog3D: the `.bin` mesh viewer.

mod cli;
mod viewer;

use anyhow::Result;
use asset::{AssetRoots, load_mesh};
use clap::Parser;
use platform::RunConfig;
use renderer::HeadlessBackend;

use crate::cli::{ASSETS_ENV, Args};
use crate::viewer::MeshViewer;

/// Seconds per simulated frame in headless mode.
const HEADLESS_FRAME_TIME: f32 = 1.0 / 60.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let roots = args.asset_roots(std::env::var_os(ASSETS_ENV));
    log::info!(
        "Starting Svarog3D. Mesh: '{}' ({:?}), roots: {:?}, backend: {:?}, window_size={}x{}",
        args.mesh,
        args.format,
        roots.roots(),
        args.gpu_backend,
        args.size.width,
        args.size.height
    );

    if args.headless {
        summarize(&args, &roots)?;
    } else {
        let config = RunConfig {
            title: format!("Svarog3D - {}", args.mesh),
            width: args.size.width,
            height: args.size.height,
            backends: args.gpu_backend.into(),
            show_stats: args.show_stats,
        };
        let viewer = MeshViewer::new(roots, &args.mesh, args.format, &args.vs, &args.fs);
        platform::run(config, Box::new(viewer))?;
    }

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

/// Print the decoded mesh layout, then drive the viewer against the
/// recording backend.
fn summarize(args: &Args, roots: &AssetRoots) -> Result<()> {
    let data = load_mesh(roots, &args.mesh, args.format)?;
    println!(
        "{}: {} groups, {} primitives, {} vertices, {} indices",
        args.mesh,
        data.groups.len(),
        data.num_primitives(),
        data.num_vertices(),
        data.num_indices()
    );
    for (i, g) in data.groups.iter().enumerate() {
        println!(
            "  group {i}: {} vertices x {} bytes, {} indices, {} primitives, sphere r={:.3}",
            g.num_vertices(),
            g.decl.stride(),
            g.indices.len(),
            g.primitives.len(),
            g.bounds.sphere.radius
        );
        for a in g.decl.attributes() {
            println!(
                "    {:?} {}x{:?} @{}{}{}",
                a.attrib,
                a.num,
                a.ty,
                a.offset,
                if a.normalized { " normalized" } else { "" },
                if a.as_int { " as_int" } else { "" }
            );
        }
    }
    for d in &data.diagnostics {
        println!("  skipped: {d}");
    }

    let mut viewer = MeshViewer::new(
        roots.clone(),
        &args.mesh,
        args.format,
        &args.vs,
        &args.fs,
    );
    let mut backend = HeadlessBackend::new();
    platform::run_headless(
        &mut viewer,
        &mut backend,
        args.frames,
        HEADLESS_FRAME_TIME,
        (args.size.width, args.size.height),
    )?;
    println!(
        "ran {} frames; buffers still alive: {} vertex, {} index",
        backend.frames(),
        backend.live_vertex_buffers(),
        backend.live_index_buffers()
    );
    Ok(())
}
