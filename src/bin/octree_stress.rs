//! Concurrent octree stress driver
//!
//! Spawns worker threads that each own a set of moving objects. Every frame
//! the workers move their objects through `Octree::update` and query the
//! neighbourhood of one of them, then the main thread feeds the measured
//! frame rate back into the capacity controller.
//!
//! Usage:
//!     octree_stress [OPTIONS]
//!
//! Options:
//!     -t, --threads <N>       Worker threads (default: 4)
//!     -n, --objects <N>       Objects per thread (default: 500)
//!     -f, --frames <N>        Frames to simulate (default: 120)
//!     -c, --capacity <N>      Initial leaf capacity (overrides config)
//!     --config <PATH>         JSON octree config
//!     -h, --help              Show this help message

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use glam::Vec3;

use spatial_octree::core::logging;
use spatial_octree::core::time::FrameTimer;
use spatial_octree::math::Aabb;
use spatial_octree::spatial::{Octree, OctreeConfig};

fn print_help() {
    eprintln!("octree_stress - Concurrent octree stress driver");
    eprintln!();
    eprintln!("Usage: octree_stress [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -t, --threads <N>       Worker threads (default: 4)");
    eprintln!("    -n, --objects <N>       Objects per thread (default: 500)");
    eprintln!("    -f, --frames <N>        Frames to simulate (default: 120)");
    eprintln!("    -c, --capacity <N>      Initial leaf capacity (overrides config)");
    eprintln!("    --config <PATH>         JSON octree config");
    eprintln!("    -h, --help              Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    octree_stress -t 8 -n 1000 -f 300");
    eprintln!("    RUST_LOG=debug octree_stress --config octree.json");
}

#[derive(Debug)]
struct Args {
    threads: usize,
    objects: usize,
    frames: u32,
    capacity: Option<usize>,
    config: Option<PathBuf>,
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut threads: usize = 4;
    let mut objects: usize = 500;
    let mut frames: u32 = 120;
    let mut capacity: Option<usize> = None;
    let mut config: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-t" | "--threads" => {
                let value = next_value(&args, &mut i, "--threads")?;
                threads = value.parse().map_err(|_| format!("Invalid thread count: {}", value))?;
            }
            "-n" | "--objects" => {
                let value = next_value(&args, &mut i, "--objects")?;
                objects = value.parse().map_err(|_| format!("Invalid object count: {}", value))?;
            }
            "-f" | "--frames" => {
                let value = next_value(&args, &mut i, "--frames")?;
                frames = value.parse().map_err(|_| format!("Invalid frame count: {}", value))?;
            }
            "-c" | "--capacity" => {
                let value = next_value(&args, &mut i, "--capacity")?;
                capacity = Some(value.parse().map_err(|_| format!("Invalid capacity: {}", value))?);
            }
            "--config" => {
                config = Some(PathBuf::from(next_value(&args, &mut i, "--config")?));
            }
            other => return Err(format!("Unknown option: {}", other)),
        }
        i += 1;
    }

    if threads == 0 {
        return Err("--threads must be at least 1".to_string());
    }

    Ok(Args {
        threads,
        objects,
        frames,
        capacity,
        config,
    })
}

/// Object identity plus the velocity it drifts with.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Mover {
    id: u64,
    velocity: Vec3,
}

fn spawn_position(id: u64, extent: f32) -> Vec3 {
    let h = id.wrapping_mul(0x517cc1b727220a95);
    let axis = |shift: u32| ((h >> shift) & 0xFFFF) as f32 / 65535.0 * 2.0 - 1.0;
    Vec3::new(axis(0), axis(16), axis(32)) * extent
}

fn spawn_velocity(id: u64) -> Vec3 {
    let h = id.wrapping_mul(0x2545F4914F6CDD1D);
    let axis = |shift: u32| ((h >> shift) & 0xFF) as f32 / 255.0 * 2.0 - 1.0;
    Vec3::new(axis(0), axis(8), axis(16)) * 0.5
}

/// One worker's objects and their last known positions.
struct Worker {
    movers: Vec<(Vec3, Mover)>,
}

impl Worker {
    fn step(&mut self, tree: &Octree<Mover>) -> spatial_octree::Result<usize> {
        let moves: Vec<(Vec3, Vec3, Mover)> = self
            .movers
            .iter_mut()
            .map(|(position, mover)| {
                let from = *position;
                *position += mover.velocity;
                (from, *position, *mover)
            })
            .collect();
        tree.update(moves)?;

        let Some((probe, _)) = self.movers.first() else {
            return Ok(0);
        };
        let neighbours = tree.query(&Aabb::from_center_half_extent(*probe, Vec3::splat(4.0)))?;
        Ok(neighbours.len())
    }
}

fn run(args: &Args) -> spatial_octree::Result<()> {
    let mut config = match &args.config {
        Some(path) => OctreeConfig::load(path)?,
        None => OctreeConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }

    let tree: Octree<Mover> = Octree::from_config(&config)?;
    let extent = config.half_extent[0];

    let mut workers: Vec<Worker> = (0..args.threads)
        .map(|t| Worker {
            movers: (0..args.objects)
                .map(|k| {
                    let id = (t * args.objects + k) as u64;
                    (spawn_position(id, extent), Mover { id, velocity: spawn_velocity(id) })
                })
                .collect(),
        })
        .collect();

    let populate_start = Instant::now();
    for worker in &workers {
        for (position, mover) in &worker.movers {
            tree.insert(*position, *mover)?;
        }
    }
    log::info!(
        "Inserted {} objects in {:.2}ms",
        args.threads * args.objects,
        populate_start.elapsed().as_secs_f64() * 1000.0
    );

    let mut timer = FrameTimer::new();
    let total_start = Instant::now();
    let mut neighbours_seen = 0usize;

    for frame in 0..args.frames {
        let results: Vec<spatial_octree::Result<usize>> = std::thread::scope(|scope| {
            let handles: Vec<_> = workers
                .iter_mut()
                .map(|worker| {
                    let tree = &tree;
                    scope.spawn(move || worker.step(tree))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });
        for result in results {
            neighbours_seen += result?;
        }

        timer.tick();
        let capacity = tree.manage_performance(&timer)?;
        if (frame + 1) % 30 == 0 {
            let fps = timer.fps_window();
            log::debug!(
                "Frame {}: {:.1} fps (min {:.1}, max {:.1}), root capacity {}",
                frame + 1,
                fps.avg,
                fps.min,
                fps.max,
                capacity
            );
        }
    }

    let total_elapsed = total_start.elapsed();
    let stats = tree.stats()?;
    let bounds = tree.bounds()?;

    println!();
    println!("Summary:");
    println!("  Frames simulated: {}", args.frames);
    println!("  Average frame rate: {:.1} fps", timer.fps());
    println!("  Objects stored: {}", stats.entries);
    println!("  Nodes: {} ({} leaves, max depth {})", stats.nodes, stats.leaves, stats.max_depth);
    println!("  Root bounds: {} .. {}", bounds.min, bounds.max);
    println!("  Neighbours seen: {}", neighbours_seen);
    println!("  Total time: {:.2}s", total_elapsed.as_secs_f64());

    let released = tree.close()?;
    log::debug!("Released {} objects", released.len());
    Ok(())
}

fn main() {
    logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    println!("Octree Stress Driver");
    println!("====================");
    println!("Threads: {}", args.threads);
    println!("Objects per thread: {}", args.objects);
    println!("Frames: {}", args.frames);
    if let Some(path) = &args.config {
        println!("Config: {}", path.display());
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
