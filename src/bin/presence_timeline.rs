//! presence_timeline - render a presence table as a timeline
//!
//! Reads a CSV written by `castwatch --stats` and draws one bar row per top
//! actor, bucketed over the movie's length.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use castwatch::timeline::{PresenceTimeline, TimelineEvent, TimelineVisualizer};
use castwatch::ui::Ui;
use castwatch::PresenceTable;

#[derive(Parser, Debug)]
#[command(
    name = "presence_timeline",
    about = "Render a castwatch presence table as a timeline image"
)]
struct Args {
    /// Presence table CSV
    #[arg(value_name = "STATS")]
    stats: PathBuf,

    /// Movie length in seconds
    #[arg(value_name = "MOVIE_LENGTH")]
    movie_length: u64,

    /// Output image path
    #[arg(short, long, default_value = "timeline.png", value_name = "PATH")]
    output: PathBuf,

    /// Number of actors to show, by screen time
    #[arg(long, default_value_t = 5, value_name = "N")]
    top: usize,

    /// Marker, HH:MM:SS=label (repeatable)
    #[arg(long = "event", value_name = "HH:MM:SS=LABEL")]
    events: Vec<String>,

    /// Image width in pixels
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 500)]
    height: u32,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let events = args
        .events
        .iter()
        .map(|e| TimelineEvent::parse(e))
        .collect::<Result<Vec<_>>>()?;

    let table = {
        let _stage = ui.stage("Load presence table");
        PresenceTable::load(&args.stats)?
    };
    println!(
        "presence_timeline: {} rows, {} actors",
        table.len(),
        table.actors().count()
    );

    let timeline = {
        let _stage = ui.stage("Bucket presence");
        PresenceTimeline::from_table(&table, args.movie_length, args.top)?
    };
    for actor in &timeline.actors {
        println!(
            "  {:<24} {:>6} frames, {} intervals",
            actor.name,
            actor.total,
            actor.intervals.len()
        );
    }

    {
        let _stage = ui.stage("Render timeline");
        TimelineVisualizer::new(args.width, args.height).save(&args.output, &timeline, &events)?;
    }
    println!("timeline written to {}", args.output.display());
    Ok(())
}
