//! CLI commands for butterfly-path

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::builder::{synthetic_grid, GridSpec};
use crate::config::EngineConfig;
use crate::cost::TravelMode;
use crate::formats::TileFile;
use crate::graph_id::GraphId;
use crate::router::{RouteRequest, Router};
use crate::search::Algorithm;

#[derive(Parser)]
#[command(name = "butterfly-path")]
#[command(about = "Path search over hierarchical graph tiles", long_about = None)]
pub struct Cli {
    /// Engine configuration (TOML); BUTTERFLY__* variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a synthetic two-level street grid as a tile directory
    Synth {
        /// Output tile directory
        #[arg(short, long)]
        outdir: PathBuf,

        /// Grid rows
        #[arg(long, default_value = "20")]
        rows: usize,

        /// Grid columns
        #[arg(long, default_value = "20")]
        cols: usize,

        /// Distance between neighbouring junctions, in degrees
        #[arg(long, default_value = "0.01")]
        spacing: f64,

        /// Every n-th row and column also gets an arterial road
        #[arg(long, default_value = "5")]
        arterial_stride: usize,

        /// South-west corner as lat,lon
        #[arg(long, default_value = "50.80,4.30")]
        origin: String,
    },

    /// Print the header of one tile
    TileInfo {
        /// Tile directory (defaults to store.tile_dir)
        #[arg(long)]
        tiles: Option<PathBuf>,

        /// Any id inside the tile, as level/tile/index
        tile: GraphId,
    },

    /// Search the cheapest path between two edge positions
    Route {
        /// Tile directory (defaults to store.tile_dir)
        #[arg(long)]
        tiles: Option<PathBuf>,

        /// Origin as level/tile/index@fraction
        #[arg(long)]
        from: String,

        /// Destination as level/tile/index@fraction
        #[arg(long)]
        to: String,

        /// car, bike or foot (defaults to search.mode)
        #[arg(short, long)]
        mode: Option<TravelMode>,

        /// dijkstra, astar or bidirectional (defaults to search.algorithm)
        #[arg(short, long)]
        algorithm: Option<Algorithm>,
    },
}

/// `level/tile/index@fraction`; the fraction defaults to 0
fn parse_anchor(s: &str) -> Result<(GraphId, f32)> {
    let (id, pct) = match s.split_once('@') {
        Some((id, pct)) => (id, pct.trim().parse::<f32>().with_context(|| format!("bad fraction in '{s}'"))?),
        None => (s, 0.0),
    };
    let id: GraphId = id.trim().parse()?;
    if !(0.0..=1.0).contains(&pct) {
        bail!("fraction in '{s}' must lie in [0, 1]");
    }
    Ok((id, pct))
}

fn parse_coord(s: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        bail!("Coordinate must be in format 'lat,lon'");
    }
    let lat = parts[0].trim().parse::<f64>()?;
    let lon = parts[1].trim().parse::<f64>()?;
    Ok((lat, lon))
}

#[derive(Serialize)]
struct SegmentOutput {
    edge: String,
    begin_pct: f32,
    end_pct: f32,
}

#[derive(Serialize)]
struct RouteOutput {
    algorithm: &'static str,
    mode: TravelMode,
    cost: f32,
    secs: f32,
    expansions: u64,
    elapsed_ms: f64,
    segments: Vec<SegmentOutput>,
}

#[derive(Serialize)]
struct TileInfoOutput {
    path: PathBuf,
    graph_id: String,
    level: u8,
    tile: u32,
    nodes: u32,
    edges: u32,
    transitions: u32,
    edge_infos: u32,
}

pub fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    crate::logging::init(&config.logging);

    match cli.command {
        Commands::Synth {
            outdir,
            rows,
            cols,
            spacing,
            arterial_stride,
            origin,
        } => synth(&outdir, rows, cols, spacing, arterial_stride, &origin),
        Commands::TileInfo { tiles, tile } => {
            let root = tiles.unwrap_or_else(|| config.store.tile_dir.clone());
            tile_info(&root, tile)
        }
        Commands::Route {
            tiles,
            from,
            to,
            mode,
            algorithm,
        } => {
            let mut config = config;
            if let Some(root) = tiles {
                config.store.tile_dir = root;
            }
            route(&config, &from, &to, mode, algorithm)
        }
    }
}

fn synth(outdir: &Path, rows: usize, cols: usize, spacing: f64, stride: usize, origin: &str) -> Result<()> {
    if rows < 2 || cols < 2 {
        bail!("grid needs at least 2 rows and 2 columns");
    }
    let grid = GridSpec {
        rows,
        cols,
        origin: parse_coord(origin)?,
        spacing_deg: spacing,
        arterial_stride: stride,
    };
    let start = Instant::now();
    let (builder, _) = synthetic_grid(&grid);
    let paths = builder
        .write_dir(outdir)
        .with_context(|| format!("writing tiles to {}", outdir.display()))?;
    println!(
        "Wrote {} tiles ({} nodes, {} edges) to {} in {:.1?}",
        paths.len(),
        builder.node_count(),
        builder.edge_count(),
        outdir.display(),
        start.elapsed()
    );
    Ok(())
}

fn tile_info(root: &Path, id: GraphId) -> Result<()> {
    let base = id.tile_base();
    let path = TileFile::path_for(root, base);
    let tile = TileFile::read(root, base)
        .with_context(|| format!("reading {}", path.display()))?
        .with_context(|| format!("no tile {base} under {}", root.display()))?;
    let h = &tile.header;
    let out = TileInfoOutput {
        path,
        graph_id: h.graph_id.to_string(),
        level: h.graph_id.level(),
        tile: h.graph_id.tile(),
        nodes: h.node_count,
        edges: h.edge_count,
        transitions: h.transition_count,
        edge_infos: h.edge_info_count,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn route(
    config: &EngineConfig,
    from: &str,
    to: &str,
    mode: Option<TravelMode>,
    algorithm: Option<Algorithm>,
) -> Result<()> {
    let (from_edge, from_pct) = parse_anchor(from).context("parsing --from")?;
    let (to_edge, to_pct) = parse_anchor(to).context("parsing --to")?;
    let router = Router::from_config(config);
    let origin = router.locate(from_edge, from_pct).context("locating origin")?;
    let destination = router.locate(to_edge, to_pct).context("locating destination")?;

    let mode = mode.unwrap_or(config.search.mode);
    let mut request = RouteRequest::new(origin, destination).with_mode(mode);
    if let Some(algorithm) = algorithm {
        request = request.with_algorithm(algorithm);
    }

    let start = Instant::now();
    let path = router
        .route(&request)
        .with_context(|| format!("routing {from} -> {to}"))?;
    let out = RouteOutput {
        algorithm: path.algorithm,
        mode,
        cost: path.cost.cost,
        secs: path.cost.secs,
        expansions: path.expansions,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        segments: path
            .segments
            .iter()
            .map(|s| SegmentOutput {
                edge: s.edge_id.to_string(),
                begin_pct: s.begin_pct,
                end_pct: s.end_pct,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
