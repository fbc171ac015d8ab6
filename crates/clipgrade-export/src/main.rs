//! `clipgrade` command-line front end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipgrade_export::{plan_export, AppContext, ClipStore, ExportConfig, ManifestStore};
use clipgrade_media::{check_ffmpeg, check_ffprobe};
use clipgrade_models::{BatchMessage, LutId};

#[derive(Debug, Parser)]
#[command(name = "clipgrade", version, about = "Trim, grade and export camera clips")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply the changes in a manifest
    Apply {
        manifest: PathBuf,
        /// Write exports into this folder instead of replacing sources
        #[arg(long)]
        destination: Option<PathBuf>,
    },
    /// Print the export plan for every clip in a manifest
    Plan { manifest: PathBuf },
    /// Manage LUTs
    #[command(subcommand)]
    Luts(LutCommand),
    /// Inspect and teach the auto-mapper
    #[command(subcommand)]
    Automap(AutomapCommand),
    /// Render a graded still of a clip
    Preview {
        video: PathBuf,
        /// LUT id or name
        lut: String,
        output: PathBuf,
        /// Frame position in seconds
        #[arg(long, default_value_t = 0.0)]
        at: f64,
    },
    /// Check that FFmpeg and FFprobe are installed
    Check,
}

#[derive(Debug, Subcommand)]
enum LutCommand {
    /// List bundled and imported LUTs
    List {
        #[arg(long)]
        json: bool,
    },
    /// Import a .cube file
    Import {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete an imported LUT
    Delete { id: String },
}

#[derive(Debug, Args)]
struct Signature {
    #[arg(long, default_value = "")]
    gamma: String,
    #[arg(long = "color-space", default_value = "")]
    color_space: String,
}

#[derive(Debug, Subcommand)]
enum AutomapCommand {
    /// Show the LUT picked for a metadata signature
    Resolve {
        #[command(flatten)]
        signature: Signature,
    },
    /// Remember a LUT for a metadata signature
    Learn {
        #[command(flatten)]
        signature: Signature,
        /// LUT id or name
        lut: String,
    },
    /// Forget the remembered LUT for a metadata signature
    Forget {
        #[command(flatten)]
        signature: Signature,
    },
    /// List remembered mappings
    List,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clipgrade=info,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ExportConfig::from_env();

    match cli.command {
        Command::Check => {
            let ffmpeg = check_ffmpeg()?;
            let ffprobe = check_ffprobe()?;
            println!("ffmpeg:  {}", ffmpeg.display());
            println!("ffprobe: {}", ffprobe.display());
            Ok(())
        }
        Command::Apply {
            manifest,
            destination,
        } => {
            let config = ExportConfig {
                destination_folder: destination.or(config.destination_folder),
                ..config
            };
            apply(AppContext::open(config).await?, manifest).await
        }
        Command::Plan { manifest } => plan(AppContext::open(config).await?, manifest).await,
        Command::Luts(cmd) => luts(AppContext::open(config).await?, cmd).await,
        Command::Automap(cmd) => automap(AppContext::open(config).await?, cmd).await,
        Command::Preview { video, lut, output, at } => {
            let ctx = AppContext::open(config).await?;
            let lut = ctx
                .registry
                .find(&lut)
                .await
                .ok_or_else(|| anyhow!("unknown LUT: {}", lut))?;
            let transform = ctx.registry.load_transform(&lut.id).await?;
            transform.render_preview(&video, at, &output).await?;
            println!("{}", output.display());
            Ok(())
        }
    }
}

async fn apply(ctx: AppContext, manifest_path: PathBuf) -> anyhow::Result<()> {
    let manifest = Arc::new(
        ManifestStore::open(&manifest_path)
            .await
            .with_context(|| format!("opening manifest {}", manifest_path.display()))?,
    );
    let changes = manifest.changes().await;
    let store: Arc<dyn ClipStore> = manifest.clone();
    let runner = ctx.batch_runner(ctx.executor(), store);

    let (tx, mut rx) = mpsc::channel::<BatchMessage>(64);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancellation requested; stopping after the current clip");
            let _ = cancel_tx.send(true);
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                BatchMessage::Status { message, .. } => println!("{}", message),
                BatchMessage::Progress {
                    current_index,
                    total,
                    file_name,
                } => println!("[{}/{}] {}", current_index, total, file_name),
                BatchMessage::Warning { file_name, message } => println!("  warning ({}): {}", file_name, message),
                BatchMessage::ClipProgress { .. } | BatchMessage::Done { .. } => {}
            }
        }
    });

    let report = runner.run(changes, tx, cancel_rx).await;
    printer.await.ok();

    if report.cancelled {
        return Err(anyhow!("cancelled; {} clip(s) not started", report.not_started));
    }
    if report.aborted || !report.failed.is_empty() {
        return Err(anyhow!("{} clip(s) failed", report.failed.len()));
    }
    Ok(())
}

async fn plan(ctx: AppContext, manifest_path: PathBuf) -> anyhow::Result<()> {
    let manifest = ManifestStore::open(&manifest_path).await?;
    let executor = ctx.executor();

    for change in manifest.changes().await.into_iter().filter(|c| !c.delete) {
        let source = executor.probe(change.source()).await?;
        let lut = match &change.request.lut_id {
            Some(id) => ctx.registry.get(id).await,
            None => None,
        };
        let plan = plan_export(&change.request, &source, lut.as_ref())?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }
    Ok(())
}

async fn luts(ctx: AppContext, cmd: LutCommand) -> anyhow::Result<()> {
    match cmd {
        LutCommand::List { json } => {
            let luts = ctx.registry.list().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&luts)?);
            } else {
                for lut in luts {
                    println!("{:<10} {:<40} {}", lut.source.as_str(), lut.name, lut.id);
                }
            }
        }
        LutCommand::Import { path, name } => {
            let lut = ctx.registry.import(&path, name.as_deref()).await?;
            println!("Imported {} as {}", lut.name, lut.id);
        }
        LutCommand::Delete { id } => {
            ctx.registry.delete(&LutId::from_string(id)).await?;
        }
    }
    Ok(())
}

async fn automap(ctx: AppContext, cmd: AutomapCommand) -> anyhow::Result<()> {
    match cmd {
        AutomapCommand::Resolve { signature } => {
            let candidates = ctx.registry.list().await;
            match ctx
                .automapper
                .resolve(&signature.gamma, &signature.color_space, &candidates)
                .await
            {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => println!("No LUT matches"),
            }
        }
        AutomapCommand::Learn { signature, lut } => {
            let lut = ctx
                .registry
                .find(&lut)
                .await
                .ok_or_else(|| anyhow!("unknown LUT: {}", lut))?;
            ctx.automapper
                .learn(&signature.gamma, &signature.color_space, &lut)
                .await?;
            println!("Learned {} for {}/{}", lut.name, signature.gamma, signature.color_space);
        }
        AutomapCommand::Forget { signature } => {
            if !ctx
                .automapper
                .forget(&signature.gamma, &signature.color_space)
                .await?
            {
                println!("Nothing learned for {}/{}", signature.gamma, signature.color_space);
            }
        }
        AutomapCommand::List => {
            println!("{}", serde_json::to_string_pretty(&ctx.learning.all().await)?);
        }
    }
    Ok(())
}
