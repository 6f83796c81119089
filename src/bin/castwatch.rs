//! castwatch - track who is on screen
//!
//! Reads a video, matches every sampled frame's faces against the movie's
//! cast, and optionally writes annotated frames, the presence table (CSV) and
//! a presence timeline (PNG).

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use castwatch::cast::{additional_identities, lookup_or_empty, split_additional_identity};
use castwatch::timeline::{PresenceTimeline, TimelineEvent, TimelineVisualizer};
use castwatch::ui::Ui;
use castwatch::{
    encode_cast, open_sink, open_source, BackendRegistry, Cast, CastProvider, CastwatchConfig,
    DirectoryCastProvider, LogDiagnostics, ManifestCastProvider, Pipeline,
    PipelineOptions, SinkConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "castwatch",
    about = "Match the faces in a video against a movie's cast"
)]
struct Args {
    /// Video file, or a stub:// synthetic stream
    #[arg(value_name = "FILE_NAME")]
    file_name: String,

    /// Movie title used for the cast lookup
    #[arg(value_name = "MOVIE_TITLE", default_value = "")]
    movie_title: String,

    /// Directory for annotated frames
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Draw a box and name on every face instead of a single caption
    #[arg(short = 'f', long = "faces")]
    faces: bool,

    /// Write the presence table to this CSV file
    #[arg(long, value_name = "PATH")]
    stats: Option<PathBuf>,

    /// Cast directory: one sub-directory of photos per actor
    #[arg(long, value_name = "DIR", conflicts_with = "cast_manifest")]
    cast_dir: Option<PathBuf>,

    /// Cast manifest (JSON list of titles with their cast)
    #[arg(long, value_name = "PATH")]
    cast_manifest: Option<PathBuf>,

    /// Extra identity to match, NAME=PHOTO[,PHOTO...] (repeatable)
    #[arg(long = "add", value_name = "NAME=PHOTOS", action = ArgAction::Append)]
    add: Vec<String>,

    /// Render the presence timeline to this PNG file
    #[arg(long, value_name = "PATH")]
    timeline: Option<PathBuf>,

    /// Movie length in seconds for the timeline (default: from the source)
    #[arg(long, value_name = "SECONDS")]
    movie_length: Option<u64>,

    /// Timeline marker, HH:MM:SS=label (repeatable)
    #[arg(long = "event", value_name = "HH:MM:SS=LABEL")]
    events: Vec<String>,

    /// Stop after this many seconds of video
    #[arg(long, value_name = "SECONDS")]
    max_seconds: Option<f64>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,

    /// Face backend (stub, or tract with --detector-model/--embedder-model)
    #[arg(long, value_name = "NAME")]
    backend: Option<String>,

    /// Frames analyzed per second of video
    #[arg(long, value_name = "FPS")]
    analyzed_fps: Option<f64>,

    /// ONNX face detector for the tract backend
    #[arg(long, value_name = "PATH", requires = "embedder_model")]
    detector_model: Option<PathBuf>,

    /// ONNX face embedder for the tract backend
    #[arg(long, value_name = "PATH", requires = "detector_model")]
    embedder_model: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Malformed identities end the run before anything is opened.
    let entries: Vec<Vec<String>> = args
        .add
        .iter()
        .map(|value| split_additional_identity(value))
        .collect();
    let added = additional_identities(&entries)?;
    let events = args
        .events
        .iter()
        .map(|e| TimelineEvent::parse(e))
        .collect::<Result<Vec<_>>>()?;

    let mut config = CastwatchConfig::load()?;
    apply_args(&mut config, &args);
    config.validate()?;

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);
    let diagnostics = LogDiagnostics;

    let cast = {
        let _stage = ui.stage("Look up cast");
        let mut cast = lookup_cast(&config, &args.movie_title)?;
        cast.merge(added);
        cast
    };
    log::info!(
        "cast: {} actors, {} photos",
        cast.members().len(),
        cast.photo_count()
    );

    let registry = build_registry(&args)?;
    let shared = registry.select(Some(config.analysis.backend.as_str()))?;
    let mut backend = shared
        .lock()
        .map_err(|_| anyhow!("face backend lock poisoned"))?;
    {
        let _stage = ui.stage(&format!("Warm up {} backend", backend.name()));
        backend.warm_up()?;
    }

    let encodings = {
        let _stage = ui.stage("Encode cast photos");
        encode_cast(&cast, &mut *backend, &diagnostics)?
    };
    log::info!("{} known face encodings", encodings.len());

    let mut source = open_source(&args.file_name)?;
    let descriptor = source.descriptor();
    let sink_config = SinkConfig::for_source(&descriptor, &config.output.codec);
    let mut sink = open_sink(
        args.output.as_deref(),
        sink_config,
        config.output.image_format,
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })?;
    }

    let progress = ui.frame_progress(descriptor.frame_count);
    let output = Pipeline::new(
        &mut *backend,
        &encodings,
        cast.names(),
        &diagnostics,
        PipelineOptions::from_config(&config),
    )
    .with_stop_flag(stop)
    .run(source.as_mut(), sink.as_mut(), &progress)?;

    println!("castwatch: {}", output.summary);

    if let Some(path) = &args.stats {
        let _stage = ui.stage("Write presence table");
        output.table.save(path)?;
        println!("presence table written to {}", path.display());
    }

    if let Some(path) = &args.timeline {
        let movie_length = args
            .movie_length
            .or_else(|| descriptor.video_length())
            .ok_or_else(|| {
                anyhow!("source length is unknown; pass --movie-length to render a timeline")
            })?;
        let _stage = ui.stage("Render timeline");
        let timeline =
            PresenceTimeline::from_table(&output.table, movie_length, config.timeline.top_actors)?;
        TimelineVisualizer::default().save(path, &timeline, &events)?;
        println!("timeline written to {}", path.display());
    }

    Ok(())
}

fn apply_args(config: &mut CastwatchConfig, args: &Args) {
    if let Some(dir) = &args.cast_dir {
        config.cast.dir = Some(dir.clone());
        config.cast.manifest = None;
    }
    if let Some(manifest) = &args.cast_manifest {
        config.cast.manifest = Some(manifest.clone());
        config.cast.dir = None;
    }
    if let Some(backend) = &args.backend {
        config.analysis.backend = backend.clone();
    }
    if let Some(fps) = args.analyzed_fps {
        config.analysis.analyzed_fps = fps;
    }
    if args.max_seconds.is_some() {
        config.limits.max_seconds = args.max_seconds;
    }
    if args.max_frames.is_some() {
        config.limits.max_frames = args.max_frames;
    }
    if args.faces {
        config.output.highlight_faces = true;
    }
}

fn lookup_cast(config: &CastwatchConfig, title: &str) -> Result<Cast> {
    let provider: Box<dyn CastProvider> = if let Some(dir) = &config.cast.dir {
        Box::new(DirectoryCastProvider::new(dir, config.cast.photos_per_actor))
    } else if let Some(manifest) = &config.cast.manifest {
        Box::new(ManifestCastProvider::load(
            manifest,
            config.cast.photos_per_actor,
        )?)
    } else {
        log::warn!("no cast directory or manifest configured; every face will be Unknown");
        return Ok(Cast::new());
    };
    lookup_or_empty(provider.as_ref(), title)
}

#[cfg(feature = "backend-tract")]
fn build_registry(args: &Args) -> Result<BackendRegistry> {
    use castwatch::detect::backends::{TractBackend, TractModelPaths};

    let mut registry = BackendRegistry::with_defaults();
    if let (Some(detector), Some(embedder)) = (&args.detector_model, &args.embedder_model) {
        registry.register(TractBackend::new(&TractModelPaths {
            detector: detector.clone(),
            embedder: embedder.clone(),
        })?);
    }
    Ok(registry)
}

#[cfg(not(feature = "backend-tract"))]
fn build_registry(args: &Args) -> Result<BackendRegistry> {
    if args.detector_model.is_some() {
        log::warn!("model paths ignored: built without the backend-tract feature");
    }
    Ok(BackendRegistry::with_defaults())
}
