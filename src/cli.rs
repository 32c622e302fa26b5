//! CLI definitions, tracing setup, and command dispatch.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use content_pipeline::events::{EventHandler, TracingEventHandler};
use content_pipeline::publish::{GoogleDocsPublisher, LocalFilePublisher};
use content_pipeline::source::{HttpFetcher, VideoSource, WebSource, YoutubeTranscripts};
use content_pipeline::tokenizer::{tokenizer_for_model, Tokenizer};
use content_pipeline::{
    ArtifactKind, Cancellation, Pipeline, PipelineConfig, PipelineShape, SourceRequest,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Summarize YouTube transcripts and web pages with an LLM and publish the result.
#[derive(Debug, Parser)]
#[command(
    name = "content-pipeline",
    version,
    about = "Turn a video transcript or web page into a summary or article and publish it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// What to produce.
    #[arg(long, value_enum, default_value = "summary", global = true)]
    pub shape: ShapeArg,

    /// Directory for local artifact files.
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    /// Save locally instead of uploading to the document store.
    #[arg(long, global = true)]
    pub no_upload: bool,

    /// Optional TOML config file.
    #[arg(long, global = true, env = "CONTENT_PIPELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ShapeArg {
    /// One-pass summary.
    Summary,
    /// Outline, then a full article written from it.
    Article,
}

impl From<ShapeArg> for PipelineShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Summary => PipelineShape::Summarize,
            ShapeArg::Article => PipelineShape::OutlineThenArticle,
        }
    }
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub(crate) enum Command {
    /// Process a YouTube video transcript.
    Video {
        /// Video URL (`watch?v=` or `/shorts/` form).
        url: String,
    },
    /// Scrape a web page.
    Web {
        /// Page URL.
        url: String,
    },
    /// Choose a source from a menu (default).
    Interactive,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` wins when set.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "content_pipeline=info",
        1 => "content_pipeline=debug",
        _ => "content_pipeline=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(ref dir) = cli.out_dir {
        config.output_dir = dir.clone();
    }
    config.validate()?;
    debug!(config = ?config, "configuration resolved");

    let request = match cli.command {
        Some(Command::Video { ref url }) => SourceRequest::Video(url.clone()),
        Some(Command::Web { ref url }) => SourceRequest::Web(url.clone()),
        Some(Command::Interactive) | None => match prompt_for_request().await? {
            Some(request) => request,
            None => {
                println!("Invalid choice.");
                return Ok(());
            }
        },
    };

    let cancel = Cancellation::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    let pipeline = build_pipeline(&config, cli.no_upload, cancel)?;
    let shape = PipelineShape::from(cli.shape);

    match pipeline.run(request, shape).await {
        Ok(run) => {
            let label = run
                .artifact
                .as_ref()
                .map(|a| saved_label(a.kind))
                .unwrap_or("Summary");
            match run.reference() {
                Some(reference) => println!("{} saved: {}", label, reference),
                None => {
                    if let Some(artifact) = run.artifact {
                        println!("{}", artifact.body);
                    }
                }
            }
            Ok(())
        }
        Err(failure) => {
            if let Some(reference) = failure.run.reference() {
                eprintln!("Upload failed; artifact saved locally: {}", reference);
            }
            Err(failure.error.into())
        }
    }
}

fn saved_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Summary => "Summary",
        ArtifactKind::Outline => "Outline",
        ArtifactKind::Article => "Article",
    }
}

/// Wire sources, publishers and the completion client from configuration.
fn build_pipeline(config: &PipelineConfig, no_upload: bool, cancel: Cancellation) -> Result<Pipeline> {
    let handler: Arc<dyn EventHandler> = Arc::new(TracingEventHandler);
    let client = config.completion_client(Some(cancel), Some(handler))?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .build()
        .context("failed to build HTTP client")?;
    let tokenizer: Arc<dyn Tokenizer> = Arc::from(tokenizer_for_model(&config.model));
    let local = Arc::new(LocalFilePublisher::new(&config.output_dir));

    let mut builder = Pipeline::builder(client)
        .tokenizer(tokenizer.clone())
        .video_source(Arc::new(VideoSource::new(
            YoutubeTranscripts::new(http.clone()),
            tokenizer.clone(),
        )))
        .web_source(Arc::new(WebSource::new(HttpFetcher::new(http.clone()), tokenizer)))
        .token_limit(config.token_limit)
        .output_budgets(config.output_budgets());

    if no_upload {
        info!(dir = %config.output_dir.display(), "upload disabled, saving locally");
        builder = builder.publisher(local);
    } else {
        let credentials = config
            .credentials_path()
            .map_err(|e| anyhow!("{} (or pass --no-upload)", e))?;
        let docs = GoogleDocsPublisher::new(http, credentials)
            .with_batch_size(config.docs_batch_size);
        builder = builder.publisher(Arc::new(docs)).local_fallback(local);
    }

    Ok(builder.build()?)
}

// ---------------------------------------------------------------------------
// Interactive menu
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Video,
    Web,
}

fn parse_choice(input: &str) -> Option<MenuChoice> {
    match input.trim() {
        "1" => Some(MenuChoice::Video),
        "2" => Some(MenuChoice::Web),
        _ => None,
    }
}

async fn prompt_for_request() -> Result<Option<SourceRequest>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Choose an option:");
    println!("1. Process a YouTube transcript");
    println!("2. Scrape a website and summarize");
    let choice = ask(&mut lines, "Enter 1 or 2: ").await?;

    let request = match parse_choice(&choice) {
        Some(MenuChoice::Video) => {
            SourceRequest::Video(ask(&mut lines, "Enter YouTube video URL: ").await?)
        }
        Some(MenuChoice::Web) => SourceRequest::Web(ask(&mut lines, "Enter website URL: ").await?),
        None => return Ok(None),
    };
    Ok(Some(request))
}

async fn ask<R>(lines: &mut tokio::io::Lines<R>, prompt: &str) -> Result<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("stdin closed before an answer was given"))?;
    Ok(line.trim().to_string())
}
