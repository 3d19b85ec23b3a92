//! Pages every far chunk of a world and reports what each chunk contains.
//!
//! Usage: cargo run --release --bin page_world -- --world <PATH> [OPTIONS]
//!
//! Options:
//!   --world <PATH>    World JSON (cells, contexts, object records)
//!   --config <PATH>   Paging config JSON (default: built-in defaults)
//!   --size <CELLS>    Chunk size in cells (default: 4)
//!   --jobs <N>        Parallel chunk builds (default: 4)
//!
//! Meshes are not read from disk: every model path gets a box template whose
//! size is derived from the path, so runs are repeatable.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use glam::{Vec2, Vec3};

use objpaging::core::error::Error;
use objpaging::core::types::Result;
use objpaging::paging::ChunkRequest;
use objpaging::records::MemoryWorld;
use objpaging::resource::{IncrementalCompileQueue, TemplateCache};
use objpaging::scene::{Geometry, Node};
use objpaging::{ObjectPaging, PagingConfig};

fn main() -> ExitCode {
    objpaging::core::logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let world_path = parse_str_arg(&args, "--world")
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("--world <PATH> is required".to_string()))?;
    let config_path = parse_str_arg(&args, "--config").map(PathBuf::from);
    let size = parse_f32_arg(&args, "--size").unwrap_or(4.0);
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);

    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .map_err(|e| Error::Config(format!("thread pool: {e}")))?;

    let config = match &config_path {
        Some(path) => PagingConfig::load(path)?,
        None => PagingConfig::default(),
    };
    let world = Arc::new(MemoryWorld::load(&world_path)?);
    let Some(((min_x, min_y), (max_x, max_y))) = world.cell_range() else {
        println!("World has no cells");
        return Ok(());
    };

    println!("=== Object Paging ===");
    println!("World:  {}", world_path.display());
    println!("Cells:  ({}, {}) to ({}, {})", min_x, min_y, max_x, max_y);
    println!("Chunk:  {} cells", size);
    println!("Jobs:   {} parallel", jobs);
    println!("Merge factor {}, min size {}", config.merge_factor, config.min_size);
    println!();

    let queue = Arc::new(IncrementalCompileQueue::new());
    let templates = Arc::new(TemplateCache::new(box_template).with_compile_queue(queue.clone()));
    let cell_size = config.cell_size;
    let paging = ObjectPaging::new(world.clone(), world, templates.clone(), config)
        .with_compile_queue(queue.clone());

    let requests = chunk_requests(size, (min_x, min_y), (max_x, max_y), cell_size);
    let start = Instant::now();
    let chunks = paging.prefetch(&requests)?;
    let elapsed = start.elapsed();

    let mut instances = 0;
    let mut merged = 0;
    for chunk in chunks.iter().flatten() {
        if chunk.is_empty() {
            continue;
        }
        instances += chunk.instance_count();
        merged += chunk.merged_count();
        let drawables = chunk
            .merge_stats
            .map(|s| format!("{} -> {} drawables", s.drawables_before, s.drawables_after))
            .unwrap_or_else(|| "no merge group".to_string());
        println!(
            "  {}: {} instances, {} merged, {} templates, {}",
            chunk.id,
            chunk.instance_count(),
            chunk.merged_count(),
            chunk.templates().len(),
            drawables
        );
    }

    let stats = paging.stats();
    println!();
    println!("=== Paging Complete ===");
    println!(
        "Chunks:    {} built in {:.2}s ({:.0} chunks/sec)",
        stats.builds,
        elapsed.as_secs_f64(),
        stats.builds as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!("Instances: {} ({} merged)", instances, merged);
    println!("Templates: {} loaded", templates.len());
    println!(
        "Compile:   {} groups pending, {:.1} KB vertex data",
        queue.len(),
        queue.pending_bytes() as f64 / 1024.0
    );
    Ok(())
}

/// One far request per chunk tiling the cell range, viewed from its own center.
fn chunk_requests(
    size: f32,
    min: (i32, i32),
    max: (i32, i32),
    cell_size: f32,
) -> Vec<ChunkRequest> {
    let step = size.max(f32::EPSILON);
    let mut requests = Vec::new();
    let mut x = min.0 as f32 + size / 2.0;
    while x - size / 2.0 <= max.0 as f32 {
        let mut y = min.1 as f32 + size / 2.0;
        while y - size / 2.0 <= max.1 as f32 {
            let view_point = Vec3::new(x * cell_size, y * cell_size, 0.0);
            requests.push(ChunkRequest {
                compile: true,
                ..ChunkRequest::far(size, Vec2::new(x, y), view_point)
            });
            y += step;
        }
        x += step;
    }
    requests
}

/// Box mesh standing in for the model at `path`.
fn box_template(path: &str) -> Result<Node> {
    let spread = path.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let half = 50.0 + (spread % 400) as f32;
    Ok(Node::drawable(Geometry::cuboid(Vec3::splat(half))).with_name(path))
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
