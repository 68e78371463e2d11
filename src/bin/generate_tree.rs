//! Batch tree generation utility
//!
//! Generates trees from a preset or a JSON parameter file and writes each one
//! as a JSON primitive list.
//!
//! Usage:
//!     generate_tree [OPTIONS]
//!
//! Options:
//!     -p, --params <FILE>     JSON parameter file (camelCase keys, any subset)
//!     -s, --style <STYLE>     Preset: broadleaf, willow, sapling, bare (default: broadleaf)
//!     -n, --count <N>         Number of trees (default: 1)
//!     --seed <SEED>           Base seed; tree i uses seed + i (default: from params)
//!     -o, --out <DIR>         Write tree_<seed>.json files into DIR
//!     -h, --help              Show this help message

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use arborist::core::logging;
use arborist::core::types::Result;
use arborist::procgen::{
    generate_batch_with_stats, GenerationParams, GenerationStats, Primitive, TreeMaterials, TreeStyle,
};

fn print_help() {
    eprintln!("generate_tree - Batch tree generation utility");
    eprintln!();
    eprintln!("Usage: generate_tree [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -p, --params <FILE>     JSON parameter file (camelCase keys, any subset)");
    eprintln!("    -s, --style <STYLE>     Preset: broadleaf, willow, sapling, bare (default: broadleaf)");
    eprintln!("    -n, --count <N>         Number of trees (default: 1)");
    eprintln!("    --seed <SEED>           Base seed; tree i uses seed + i (default: from params)");
    eprintln!("    -o, --out <DIR>         Write tree_<seed>.json files into DIR");
    eprintln!("    -h, --help              Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    generate_tree -s willow -n 8 -o ./trees");
    eprintln!("    generate_tree -p params.json --seed 42");
}

#[derive(Debug)]
struct Args {
    params_file: Option<PathBuf>,
    style: TreeStyle,
    count: u32,
    seed: Option<u32>,
    out_dir: Option<PathBuf>,
}

fn parse_style(name: &str) -> std::result::Result<TreeStyle, String> {
    match name.to_lowercase().as_str() {
        "broadleaf" => Ok(TreeStyle::Broadleaf),
        "willow" => Ok(TreeStyle::Willow),
        "sapling" => Ok(TreeStyle::Sapling),
        "bare" => Ok(TreeStyle::Bare),
        other => Err(format!("Unknown style: {}. Valid styles: broadleaf, willow, sapling, bare", other)),
    }
}

fn parse_args() -> std::result::Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut params_file = None;
    let mut style = TreeStyle::default();
    let mut count: u32 = 1;
    let mut seed = None;
    let mut out_dir = None;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        if matches!(flag, "-h" | "--help") {
            print_help();
            std::process::exit(0);
        }
        i += 1;
        let value = args.get(i).ok_or_else(|| format!("Missing value for {}", flag));
        match flag {
            "-p" | "--params" => params_file = Some(PathBuf::from(value?)),
            "-s" | "--style" => style = parse_style(value?)?,
            "-n" | "--count" => {
                let value = value?;
                count = value.parse().map_err(|_| format!("Invalid count: {}", value))?;
            }
            "--seed" => {
                let value = value?;
                seed = Some(value.parse().map_err(|_| format!("Invalid seed: {}", value))?);
            }
            "-o" | "--out" => out_dir = Some(PathBuf::from(value?)),
            other => return Err(format!("Unknown option: {}", other)),
        }
        i += 1;
    }

    if count == 0 {
        return Err("Count must be at least 1".to_string());
    }

    Ok(Args { params_file, style, count, seed, out_dir })
}

/// On-disk form of one generated tree
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeExport<'a> {
    seed: u32,
    stats: &'a GenerationStats,
    primitives: &'a [Primitive],
}

fn write_tree(dir: &Path, seed: u32, stats: &GenerationStats, primitives: &[Primitive]) -> Result<PathBuf> {
    let path = dir.join(format!("tree_{}.json", seed));
    let json = serde_json::to_string_pretty(&TreeExport { seed, stats, primitives })?;
    std::fs::write(&path, json)?;
    Ok(path)
}

fn run(args: &Args) -> Result<()> {
    let base = match &args.params_file {
        Some(path) => GenerationParams::load(path)?,
        None => GenerationParams::from_style(args.style),
    };
    let base_seed = args.seed.unwrap_or(base.seed);
    let seeds: Vec<u32> = (0..args.count).map(|i| base_seed.wrapping_add(i)).collect();
    let materials = TreeMaterials::default();

    log::info!("Generating {} tree(s) from seed {}", seeds.len(), base_seed);
    let start = Instant::now();

    let trees = generate_batch_with_stats(&base, &seeds, &materials);

    let elapsed = start.elapsed();

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
    }

    for (seed, (primitives, stats)) in seeds.iter().zip(&trees) {
        let bounds = primitives.iter().find_map(Primitive::as_mesh).map(|m| m.bounds);
        println!(
            "  seed {:>10}: {:>4} branches, {:>4} continuations, {:>5} leaves, {:>7} vertices, {:>7} triangles",
            seed, stats.branches, stats.continuations, stats.leaves, stats.vertices, stats.triangles
        );
        if let Some(b) = bounds.filter(|b| !b.is_empty()) {
            let size = b.size();
            println!("               bounds {:.2} x {:.2} x {:.2} m", size.x, size.y, size.z);
        }
        if stats.omitted_branches > 0 {
            log::debug!("Seed {}: {} branch slots had no viable direction", seed, stats.omitted_branches);
        }
        if let Some(dir) = &args.out_dir {
            let path = write_tree(dir, *seed, stats, primitives)?;
            log::debug!("Wrote {}", path.display());
        }
    }

    println!();
    println!("Summary:");
    println!("  Trees generated: {}", trees.len());
    println!(
        "  Total time: {:.2}s ({:.1} trees/sec)",
        elapsed.as_secs_f64(),
        trees.len() as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    if let Some(dir) = &args.out_dir {
        println!("  Output: {}", dir.display());
    }
    Ok(())
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    logging::init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
