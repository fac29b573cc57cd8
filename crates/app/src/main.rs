use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use delve_core::{
    ContentCategory, GameLifecycle, LifecycleState, LoadReport, ManifestSource, RuntimeConfig,
    RuntimeError,
};
use tracing_subscriber::EnvFilter;

mod host;

use host::{FileLoader, JsonTemplateLoader, LogDisplay, LogWorld, ManifestFile, TimerFrameSource};

/// Frames played when neither the config nor the command line sets a limit.
const DEFAULT_FRAMES: u64 = 300;

fn main() -> delve_core::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Play {
            config,
            root,
            frames,
            fps,
        } => {
            let mut config = match config {
                Some(path) => RuntimeConfig::load(path)?,
                None => RuntimeConfig::default(),
            };
            if let Some(root) = root {
                config.content.root = root;
            }
            if let Some(frames) = frames {
                config.frames.max_frames = Some(frames);
            }
            if let Some(fps) = fps {
                config.frames.target_fps = fps;
            }
            run_play(config).map(|_| ())
        }
        Commands::Manifest { root } => {
            let mut config = RuntimeConfig::default();
            if let Some(root) = root {
                config.content.root = root;
            }
            run_manifest(&config)
        }
    }
}

/// What a finished `play` session did.
#[derive(Debug)]
struct PlaySummary {
    state: LifecycleState,
    report: LoadReport,
    frames: u64,
    updates: u64,
}

fn run_play(config: RuntimeConfig) -> delve_core::Result<PlaySummary> {
    let root = config.content.root.clone();
    tracing::info!(root = %root.display(), fps = config.frames.target_fps, "starting session");

    let world = Rc::new(RefCell::new(LogWorld::default()));
    let screen = Rc::new(RefCell::new(LogDisplay::new(u64::from(
        config.frames.target_fps,
    ))));
    let max_frames = config.frames.max_frames.unwrap_or(DEFAULT_FRAMES);
    let loading_timeout = config.loading.timeout();

    let mut game = GameLifecycle::builder(config.clone())
        .with_manifest(ManifestFile::new(config.manifest_path()))
        .with_loader(ContentCategory::Model, FileLoader::new(&root))
        .with_loader(ContentCategory::Texture, FileLoader::new(&root))
        .with_loader(ContentCategory::Audio, FileLoader::new(&root))
        .with_template_loader(JsonTemplateLoader::new(&root))
        .with_frame_source(TimerFrameSource::new(config.frame_interval()))
        .with_world(world.clone())
        .with_display(screen.clone())
        .build()?;

    game.load();
    if let Some(error) = game.manifest_error() {
        return Err(RuntimeError::ManifestUnavailable(error.clone()));
    }

    let deadline = Instant::now() + loading_timeout;
    while game.state() == LifecycleState::Loading {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!(progress = %game.progress(), "loading timed out");
            game.abandon_pending();
            break;
        }
        game.wait_and_pump(remaining);
    }

    let report = game.report();
    tracing::info!(
        progress = %report.progress,
        failed = report.failed,
        document = ?report.document,
        "content loaded"
    );

    game.play();
    game.refresh_display();
    while game.state() == LifecycleState::Running && game.scheduler().frames() < max_frames {
        game.wait_and_pump(Duration::from_secs(1));
    }
    game.finalize();

    let summary = PlaySummary {
        state: game.state(),
        report,
        frames: screen.borrow().frames(),
        updates: world.borrow().updates(),
    };
    let elapsed = world.borrow().elapsed();
    tracing::info!(
        frames = summary.frames,
        updates = summary.updates,
        failed = summary.report.failed,
        elapsed,
        state = %summary.state,
        "session finished"
    );
    Ok(summary)
}

fn run_manifest(config: &RuntimeConfig) -> delve_core::Result<()> {
    let mut manifest = ManifestFile::new(config.manifest_path());
    manifest.begin();
    tracing::info!(path = %manifest.path().display(), "reading manifest");

    for category in ContentCategory::LOADABLE {
        let names = manifest.list(category)?;
        println!("{} ({})", category.store(), names.len());
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless host for the Delve game runtime", long_about = None)]
struct Cli {
    /// Log filter, e.g. `debug` or `delve_core=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a content directory and play a fixed number of frames.
    Play {
        /// JSON runtime configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Content root directory, overriding the configuration.
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Number of frames to play before finalizing.
        #[arg(short, long)]
        frames: Option<u64>,
        /// Target frame rate.
        #[arg(long)]
        fps: Option<u32>,
    },
    /// Print the content manifest per category.
    Manifest {
        /// Content root directory.
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}
