use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gtfs_atlas_core::progress::ProgressHandler;
use gtfs_atlas_core::{
    plot_table_geojson, to_geo_table, FeedLoader, GtfsFeed, LayoutMode, LoadOptions,
    LookupPolicy, NoticeContainer, StopIndex, TripSegmenter,
};

#[derive(Debug, Parser)]
#[command(name = "gtfs-atlas")]
#[command(about = "Explore GTFS feeds: stop routes, segment durations and trip paths")]
struct Args {
    /// Feed directory (flat or one subfolder per area) or .zip archive
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    #[arg(long = "layout", value_enum, default_value_t = Layout::Auto)]
    layout: Layout,

    /// Skip shapes.txt
    #[arg(long = "no-shapes", alias = "no_shapes")]
    no_shapes: bool,

    #[arg(short = 'p', long = "pretty")]
    pretty: bool,

    /// Hide the loading progress bar
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Layout {
    Auto,
    Flat,
    Subfolders,
}

impl From<Layout> for LayoutMode {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Auto => LayoutMode::Auto,
            Layout::Flat => LayoutMode::Flat,
            Layout::Subfolders => LayoutMode::Subfolders,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Table and column overview, followed by load notices
    Info,
    /// Stop coordinates as JSON
    Positions,
    /// Routes serving a stop, with the neighbouring stops on each
    Routes {
        #[arg(short = 's', long = "stop")]
        stop: String,
        /// Report unresolved routes individually instead of failing
        #[arg(long = "lenient")]
        lenient: bool,
    },
    /// Stop positions with the names of the routes serving them
    Plot {
        #[arg(long = "lenient")]
        lenient: bool,
        #[arg(long = "geojson")]
        geojson: bool,
    },
    /// Stop times of a trip with the duration to the next stop
    Segments {
        #[arg(short = 't', long = "trip")]
        trip: String,
    },
    /// Segments of a trip placed along its shape, as GeoJSON
    Interpolate {
        #[arg(short = 't', long = "trip")]
        trip: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let options = LoadOptions::default()
        .with_layout(args.layout.into())
        .with_shapes(!args.no_shapes);
    let mut loader = FeedLoader::with_options(options);
    let progress = (!args.quiet).then(IndicatifHandler::new);
    if let Some(progress) = &progress {
        loader = loader.with_progress(progress.clone());
    }

    let started = Instant::now();
    let mut notices = NoticeContainer::new();
    let feed = loader
        .load_with_notices(&args.input, &mut notices)
        .with_context(|| format!("load feed from {}", args.input.display()))?;
    if let Some(progress) = &progress {
        progress.finish();
    }
    info!(
        "loaded {} in {:.2?} with {} notice(s)",
        args.input.display(),
        started.elapsed(),
        notices.len()
    );

    run(&args, &feed, &notices)
}

fn run(args: &Args, feed: &GtfsFeed, notices: &NoticeContainer) -> anyhow::Result<()> {
    match &args.command {
        Command::Info => {
            print!("{}", feed.summary());
            if !notices.is_empty() {
                println!();
                println!("notices:");
                for notice in notices.iter() {
                    println!("  {notice}");
                }
            }
            Ok(())
        }
        Command::Positions => print_json(&StopIndex::new(feed).positions(), args.pretty),
        Command::Routes { stop, lenient } => {
            let index = StopIndex::new(feed);
            if *lenient {
                let entries: Vec<serde_json::Value> = index
                    .routes_through_partial(stop)
                    .into_iter()
                    .map(|entry| match entry {
                        Ok(route) => serde_json::to_value(route),
                        Err(err) => {
                            warn!(stop_id = %stop, "{err}");
                            Ok(json!({ "error": err.to_string() }))
                        }
                    })
                    .collect::<Result<_, _>>()
                    .context("serialize routes")?;
                print_json(&entries, args.pretty)
            } else {
                let routes = index
                    .routes_through(stop)
                    .with_context(|| format!("routes through stop {stop}"))?;
                print_json(&routes, args.pretty)
            }
        }
        Command::Plot { lenient, geojson } => {
            let policy = if *lenient {
                LookupPolicy::SkipUnresolved
            } else {
                LookupPolicy::Strict
            };
            let rows = StopIndex::new(feed)
                .plot_table(policy)
                .context("build plot table")?;
            if *geojson {
                print_json(&plot_table_geojson(&rows), args.pretty)
            } else {
                print_json(&rows, args.pretty)
            }
        }
        Command::Segments { trip } => {
            let rows = TripSegmenter::new(feed).segment_durations(trip);
            if rows.is_empty() {
                bail!("trip {trip} has no stop times");
            }
            print_json(&rows, args.pretty)
        }
        Command::Interpolate { trip } => {
            let segments = TripSegmenter::new(feed)
                .interpolate_trip(trip)
                .with_context(|| format!("interpolate trip {trip}"))?;
            print_json(&to_geo_table(&segments).to_feature_collection(), args.pretty)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("serialize output")?;
    println!("{json}");
    Ok(())
}

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Clone)]
struct IndicatifHandler {
    loading_pb: ProgressBar,
}

impl IndicatifHandler {
    fn new() -> Self {
        let loading_pb = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        loading_pb.set_style(style);
        loading_pb.set_message("Waiting to load files...");
        Self { loading_pb }
    }

    fn finish(&self) {
        self.loading_pb.finish_and_clear();
    }
}

impl ProgressHandler for IndicatifHandler {
    fn set_total_files(&self, count: usize) {
        self.loading_pb.set_length(count as u64);
        self.loading_pb.set_message("Starting load...");
    }

    fn on_start_file_load(&self, file: &str) {
        self.loading_pb.set_message(format!("Loading {}", file));
    }

    fn on_finish_file_load(&self, _file: &str) {
        self.loading_pb.inc(1);
    }
}
