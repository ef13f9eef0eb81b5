//! POI Quest - command line driver
//!
//! `walk` replays a recorded track against the catalog and prints every
//! point of interest reached. `puzzle` builds a board from an image and
//! prints its layout and scrambled order.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use poi_quest::catalog::PoiCatalog;
use poi_quest::core::config::{config, set_config};
use poi_quest::core::error::{QuestError, Result};
use poi_quest::core::QuestConfig;
use poi_quest::location::{load_track_toml, AlwaysSatisfied, ReplayLocationSource};
use poi_quest::proximity::ProximityMonitor;
use poi_quest::puzzle::{DirectoryImageSource, GridLayout, PuzzleRequest, PuzzleSession, PuzzleState};

/// Location-triggered mini-games for a walking tour
#[derive(Parser, Debug)]
#[command(name = "poi-quest")]
#[command(about = "Replay walks against a POI catalog and build image puzzles")]
struct Args {
    /// Config file (TOML); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded track and report nearby points of interest
    Walk {
        /// Track file with `[[fixes]]` entries
        #[arg(long)]
        track: PathBuf,

        /// POI catalog file; the built-in tour is used when omitted
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Replay speed multiplier
        #[arg(long, default_value_t = 1.0)]
        speedup: f64,
    },
    /// Generate a scrambled board from an image
    Puzzle {
        /// Image file
        #[arg(long)]
        image: PathBuf,

        /// Available width in layout units
        #[arg(long, default_value_t = 900.0)]
        width: f32,

        /// Available height in layout units
        #[arg(long, default_value_t = 700.0)]
        height: f32,
    },
}

#[derive(Serialize)]
struct ReachedPoi {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
struct BoardSummary {
    layout: GridLayout,
    order: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("poi_quest=info")),
        )
        .init();

    let args = Args::parse();

    if let Some(path) = &args.config {
        let loaded = QuestConfig::load_from_toml(path)?;
        if set_config(loaded).is_err() {
            tracing::warn!("Config already initialized, ignoring {}", path.display());
        }
    }

    let rt = Runtime::new()?;
    match args.command {
        Command::Walk {
            track,
            catalog,
            speedup,
        } => rt.block_on(walk(&track, catalog.as_deref(), speedup, args.json)),
        Command::Puzzle {
            image,
            width,
            height,
        } => rt.block_on(puzzle(&image, width, height, args.json)),
    }
}

async fn walk(track: &Path, catalog: Option<&Path>, speedup: f64, json: bool) -> Result<()> {
    let catalog = match catalog {
        Some(path) => PoiCatalog::load_from_toml(path)?,
        None => PoiCatalog::with_defaults(),
    };
    let fixes = load_track_toml(track)?;
    tracing::info!("Replaying {} fixes against {} POIs", fixes.len(), catalog.len());

    let source = Arc::new(
        ReplayLocationSource::new(fixes, &config().location).with_speedup(speedup),
    );
    let monitor = ProximityMonitor::new(
        Arc::new(catalog),
        source.clone(),
        Arc::new(AlwaysSatisfied),
        &config().location,
    );

    let mut nearby_rx = monitor.subscribe_nearby();
    let status = monitor.resume();
    if !status.is_satisfied() {
        return Err(QuestError::LocationUnavailable(format!("{:?}", status)));
    }

    let mut reached = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_millis(250), nearby_rx.changed()).await {
            Ok(Ok(())) => {
                let event = nearby_rx.borrow_and_update().clone();
                if let Some(event) = event {
                    let poi = event.poi;
                    if event.first_visit {
                        if !json {
                            println!("Reached {} ({})", poi.name, poi.id);
                        }
                        reached.push(ReachedPoi {
                            id: poi.id.to_string(),
                            name: poi.name.clone(),
                            latitude: poi.coordinate.latitude,
                            longitude: poi.coordinate.longitude,
                        });
                    }
                    monitor.clear_nearby();
                }
            }
            Ok(Err(_)) => break,
            Err(_) => {
                if source.position() >= source.len() {
                    break;
                }
            }
        }
    }
    monitor.pause();

    if json {
        println!("{}", to_json(&reached)?);
    } else {
        println!("{} of {} points of interest reached", reached.len(), monitor.catalog().len());
    }
    Ok(())
}

async fn puzzle(image: &Path, width: f32, height: f32, json: bool) -> Result<()> {
    let root = image.parent().map(Path::to_path_buf).unwrap_or_default();
    let image_ref = image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| QuestError::ImageLoad(format!("not a file: {}", image.display())))?;

    let puzzle_config = config().puzzle.clone();
    let request = PuzzleRequest::new(image_ref, width, height, &puzzle_config);
    let session = PuzzleSession::new(Arc::new(DirectoryImageSource::new(root)), puzzle_config);

    if let Some(job) = session.init_puzzle(request) {
        job.await
            .map_err(|e| QuestError::Task(e.to_string()))?;
    }

    let (pieces, layout) = match session.state() {
        PuzzleState::Ready { pieces, layout } => (pieces, layout),
        PuzzleState::Error { message } => return Err(QuestError::ImageLoad(message)),
        _ => {
            return Err(QuestError::DegenerateLayout {
                cell_width: width,
                cell_height: height,
            })
        }
    };

    let summary = BoardSummary {
        layout,
        order: pieces.iter().map(|p| p.title.clone()).collect(),
    };
    if json {
        println!("{}", to_json(&summary)?);
    } else {
        println!(
            "{} x {} board, cells {:.1} x {:.1}",
            layout.columns, layout.rows, layout.cell_width, layout.cell_height
        );
        for row in summary.order.chunks(layout.columns.max(1) as usize) {
            println!("  {}", row.join(" | "));
        }
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
