mod console;
mod core;
mod download;
mod media;
mod mpv;
mod view;

use std::path::{Path, PathBuf};

use anyhow::Context;
use calldesk_proto::config::Config;
use calldesk_proto::{resolve, CallRecord};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

/// calldesk - inspect calls answered by the voice assistant
#[derive(Parser, Debug)]
#[command(name = "calldesk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved details of one call
    Show {
        /// JSON file with one call, an array of calls, or a `calls`/`data` envelope
        file: PathBuf,
        /// Which call in the file, starting at 1
        #[arg(short, long, default_value = "1")]
        index: usize,
        /// Print the resolved summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every call in the file
    List {
        file: PathBuf,
    },

    /// Open a call and play its recording interactively
    Inspect {
        file: PathBuf,
        #[arg(short, long, default_value = "1")]
        index: usize,
        /// Do not start mpv; downloads still work
        #[arg(long)]
        no_audio: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit --config must load; the default location falls back to
    // defaults and the error is logged once tracing is up.
    let (config, config_error) = match &cli.config {
        Some(path) => (Config::load_from(path)?, None),
        None => Config::load_or_default(),
    };

    let data_dir = calldesk_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("calldesk.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins over the configured filter.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.filter.clone());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    tracing::info!("calldesk starting: {:?}", cli.command);
    if let Some(e) = config_error {
        tracing::warn!(
            "config {} not loaded, using defaults: {:#}",
            Config::config_path().display(),
            e
        );
        eprintln!("calldesk: ignoring config: {:#}", e);
    }

    match cli.command {
        Commands::Show { file, index, json } => {
            let calls = load_calls(&file)?;
            let record = pick(&calls, index)?;
            let summary = resolve(record);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", view::render_summary(&summary));
            }
        }

        Commands::List { file } => {
            let calls = load_calls(&file)?;
            if calls.is_empty() {
                println!("no calls in {}", file.display());
            }
            for row in view::history_rows(&calls) {
                println!("{}", row);
            }
        }

        Commands::Inspect {
            file,
            index,
            no_audio,
        } => {
            eprintln!("calldesk log: {}", log_path.display());
            let calls = load_calls(&file)?;
            pick(&calls, index)?;
            inspect(config, calls, index - 1, no_audio).await?;
        }
    }

    Ok(())
}

async fn inspect(
    config: Config,
    calls: Vec<CallRecord>,
    index: usize,
    no_audio: bool,
) -> anyhow::Result<()> {
    // Event channel: all external inputs funnel into InspectorCore
    let (event_tx, event_rx) = mpsc::channel::<core::InspectorEvent>(256);

    let generation = media::Generation::default();
    let (media, media_task) = if no_audio || !config.mpv.enabled {
        tracing::info!("audio disabled");
        let silent: core::BoxedMedia =
            Box::new(media::SilentMedia::new(generation.clone(), event_tx.clone()));
        (silent, None)
    } else {
        let (mpv_media, task) =
            media::MpvMedia::spawn(config.mpv.clone(), generation.clone(), event_tx.clone());
        let boxed: core::BoxedMedia = Box::new(mpv_media);
        (boxed, Some(task))
    };

    let downloader =
        download::Downloader::new(config.paths.downloads_dir.clone(), &config.download)?;

    tokio::spawn(console::read_stdin(event_tx.clone()));

    let inspector = core::InspectorCore::new(
        calls,
        media,
        generation,
        media_task,
        downloader,
        event_tx,
        std::io::stdout(),
    );
    inspector.run(index, event_rx).await
}

fn load_calls(path: &Path) -> anyhow::Result<Vec<CallRecord>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {} as JSON", path.display()))?;
    let calls = CallRecord::many_from_value(value);
    tracing::info!("loaded {} calls from {}", calls.len(), path.display());
    Ok(calls)
}

/// `index` counts from 1.
fn pick(calls: &[CallRecord], index: usize) -> anyhow::Result<&CallRecord> {
    if calls.is_empty() {
        anyhow::bail!("no calls in file");
    }
    index
        .checked_sub(1)
        .and_then(|i| calls.get(i))
        .with_context(|| format!("no call #{} (file has {})", index, calls.len()))
}
