use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use palette_player_core::{
    load_animation, AnsiTerminalSink, AppConfig, AudioDriver, AudioLauncher, DisplaySink,
    MemorySink, ProcessAudioDriver, Scheduler, SilentAudio, Transform,
};
use tracing_subscriber::EnvFilter;

fn main() -> palette_player_core::Result<()> {
    // The soundtrack offset is measured from here, not from the first tick.
    let origin = Instant::now();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args, origin),
        Commands::Config { config } => print_config(config.as_deref()),
    }
}

fn run_play(args: PlayArgs, origin: Instant) -> palette_player_core::Result<()> {
    let config = args.resolve_config()?;
    tracing::info!(input = ?args.input, audio = ?args.audio, "loading animation");

    let animation = load_animation(&args.input)?;
    config.validate_for_canvas(animation.bounds())?;

    let audio: Box<dyn AudioDriver> = match &args.audio {
        Some(track) => Box::new(ProcessAudioDriver::new(&config.audio, track)?),
        None => Box::new(SilentAudio),
    };
    let sink: Box<dyn DisplaySink> = if args.dry_run {
        Box::new(MemorySink::new())
    } else {
        Box::new(AnsiTerminalSink::stdout())
    };

    let scheduler = Scheduler::new(
        Transform::new(config.width, config.height, config.palette.clone()),
        config.pacing(),
    );
    let launcher = AudioLauncher::spawn(audio, origin, config.audio_start_offset())?;

    let played = scheduler.run(&animation, sink);
    if let Ok(report) = &played {
        tracing::info!(
            ticks = report.ticks.len(),
            overruns = report.overruns(),
            elapsed_ms = report.elapsed().as_millis() as u64,
            "stopped playing"
        );
        std::thread::sleep(args.hold(&config));
    }
    launcher.finish()?;
    played?;
    Ok(())
}

fn print_config(path: Option<&Path>) -> palette_player_core::Result<()> {
    let config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn init_tracing() {
    // Stdout belongs to the grid display.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Plays animated GIFs on a palette-colored terminal grid", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play an animation, optionally alongside a soundtrack.
    Play(PlayArgs),
    /// Print the effective configuration as JSON.
    Config {
        /// Configuration file to merge over the defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Animated GIF to play.
    input: PathBuf,
    /// Soundtrack handed to the external audio player.
    #[arg(short, long)]
    audio: Option<PathBuf>,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Grid columns.
    #[arg(long)]
    width: Option<u32>,
    /// Grid rows.
    #[arg(long)]
    height: Option<u32>,
    /// Scale applied to every authored frame delay.
    #[arg(long)]
    multiplier: Option<f64>,
    /// Milliseconds between process start and soundtrack start.
    #[arg(long)]
    audio_offset_ms: Option<u64>,
    /// Run the full pipeline without drawing to the terminal.
    #[arg(long)]
    dry_run: bool,
}

impl PlayArgs {
    fn resolve_config(&self) -> palette_player_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(multiplier) = self.multiplier {
            config.frame_delay_multiplier = multiplier;
        }
        if let Some(offset) = self.audio_offset_ms {
            config.audio_start_offset_ms = offset;
        }
        config.validate()?;
        Ok(config)
    }

    /// Pause between the last frame and exit; skipped for dry runs.
    fn hold(&self, config: &AppConfig) -> Duration {
        if self.dry_run {
            Duration::ZERO
        } else {
            config.hold_after_end()
        }
    }
}
