use std::path::PathBuf;
use std::time::Instant;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_img::selector::select_paths;
use upload_img::utils::{format_duration, format_file_size};
use upload_img::{ApiConfig, Settings, UploadApp, UploadEvent};

#[derive(Parser)]
#[command(name = "upload-img", version, about = "Batch upload images to an image hosting endpoint")]
struct Cli {
    /// Settings file (defaults to $UPLOAD_IMG_CONFIG or ./upload-img.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show or change the upload endpoint
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Upload images one by one
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Upload in parallel groups without recording history
        #[arg(long)]
        batch: bool,
    },
    /// Browse upload history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set { api_url: String },
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Delete { id: String },
    Export {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_img=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load settings")?;

    let app = UploadApp::from_settings(&settings)?;
    let configured = app.init().await.context("failed to load upload endpoint")?;

    match cli.command {
        Command::Config { action: ConfigAction::Show } => match app.config.current().await {
            Some(config) => println!("{}", config.api_url),
            None => println!("(not configured)"),
        },
        Command::Config { action: ConfigAction::Set { api_url } } => {
            app.config.save(ApiConfig::new(api_url)).await?;
            println!("saved");
        }
        Command::Upload { files, batch } => {
            if !configured {
                bail!("please configure the upload endpoint first: upload-img config set <url>");
            }
            upload(&app, files, batch).await?;
        }
        Command::History { action } => history(&app, action).await?,
    }

    Ok(())
}

async fn upload(app: &UploadApp, files: Vec<PathBuf>, batch: bool) -> anyhow::Result<()> {
    let selection = select_paths(&files).await;
    if let Some(notice) = selection.notice() {
        eprintln!("{}", notice);
    }
    if selection.accepted.is_empty() {
        return Ok(());
    }

    let started = Instant::now();
    if batch {
        let outcome = app.orchestrator.upload_batch(selection.accepted).await?;
        for (name, url) in &outcome.urls {
            println!("{}\t{}", name, url);
        }
        for (file, err) in &outcome.failures {
            eprintln!("{}\tfailed: {}", file.name, err.message());
        }
    } else {
        let events = app.orchestrator.subscribe_events();
        let printer = tokio::spawn(follow_run(events, |event| match event {
            UploadEvent::Completed { result, .. } => {
                println!("{}\t{}\t{}", result.file_name, format_file_size(result.file_size), result.upload_url);
            }
            UploadEvent::Failed { error, .. } => eprintln!("failed: {}", error),
            _ => {}
        }));

        app.orchestrator.enqueue(selection.accepted).await;
        let report = app.orchestrator.start().await?;
        let _ = printer.await;

        for (result, error) in &report.persist_failures {
            eprintln!("{}\tuploaded but not saved to history: {}", result.file_name, error);
        }

        eprintln!(
            "{} uploaded, {} failed",
            report.succeeded.len() + report.persist_failures.len(),
            report.failed.len()
        );
    }

    eprintln!("done in {}", format_duration(started.elapsed()));
    Ok(())
}

/// 转发事件直到本轮上传结束，接收落后时跳过丢失的事件继续接收
async fn follow_run(mut events: broadcast::Receiver<UploadEvent>, mut on_event: impl FnMut(UploadEvent)) {
    loop {
        match events.recv().await {
            Ok(UploadEvent::RunFinished { .. }) | Err(RecvError::Closed) => break,
            Ok(event) => on_event(event),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "upload events dropped"),
        }
    }
}

async fn history(app: &UploadApp, action: HistoryAction) -> anyhow::Result<()> {
    match action {
        HistoryAction::List => {
            let records = app.history.list().await?;
            if records.is_empty() {
                println!("no upload history");
            }
            for record in records {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id,
                    record.file_name,
                    format_file_size(record.file_size),
                    record.uploaded_at.to_rfc3339(),
                    record.upload_url
                );
            }
        }
        HistoryAction::Delete { id } => {
            app.history.list().await?;
            app.history.delete(&id).await.context("failed to delete record")?;
            println!("deleted {}", id);
        }
        HistoryAction::Export { dir } => {
            app.history.list().await?;
            let path = app.history.export_to(&dir).await?;
            println!("{}", path.display());
        }
        HistoryAction::Clear => {
            app.history.clear().await?;
            println!("history cleared");
        }
    }

    Ok(())
}
