use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use layered_transcript::layers::DirectFetchLayer;
use layered_transcript::page::html::load_har;
use layered_transcript::page::UnreachablePage;
use layered_transcript::utils::{format_duration, resolve_video_id, watch_url};
use layered_transcript::{
    output, CancelToken, CaptionFetcher, Cli, Commands, Config, ExtractionError, ExtractionLayer,
    HtmlPage, HttpFetcher, LayerKind, PageInspector, TranscriptPipeline, TranscriptStatus,
    VideoContext,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "layered_transcript=debug,transcriptor=debug"
    } else {
        "layered_transcript=info,transcriptor=info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Fetch {
            video,
            page,
            har,
            output,
            format,
            timestamps,
            lang,
        } => {
            if !lang.is_empty() {
                config.extraction.languages = lang;
            }
            config.validate()?;

            let video_id = resolve_video_id(&video)?;
            let fetcher: Arc<dyn CaptionFetcher> = Arc::new(HttpFetcher::new(&config.http)?);
            let page = load_page(
                &config,
                fetcher.as_ref(),
                &video_id,
                page.as_deref(),
                har.as_deref(),
            )
            .await?;
            let ctx = VideoContext::new(video_id.clone(), page);
            let pipeline = TranscriptPipeline::from_config(&config, fetcher);

            let cancel = CancelToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });

            let spinner = spinner(cli.quiet, &format!("Extracting transcript for {}", video_id))?;
            let outcome = pipeline.extract_transcript_cancellable(&ctx, &cancel).await;
            spinner.finish_and_clear();

            let result = match outcome {
                Ok(result) => result,
                Err(ExtractionError::Cancelled) => {
                    eprintln!("{}", style("Cancelled").yellow());
                    return Ok(ExitCode::from(130));
                }
                Err(e) => return Err(e.into()),
            };

            match result.status {
                TranscriptStatus::Success | TranscriptStatus::Partial => {
                    if !cli.quiet {
                        let marker = if result.is_success() {
                            style("✓").green()
                        } else {
                            style("~").yellow()
                        };
                        eprintln!(
                            "{} {} segments ({}) from {}",
                            marker,
                            result.segments.len(),
                            format_duration(result.duration_seconds()),
                            result.extraction_layer
                        );
                        if let Some(note) = &result.error {
                            eprintln!("  {}", style(note).dim());
                        }
                    }

                    match output {
                        Some(path) => {
                            output::save_to_file(&result, &path, &format, timestamps).await?;
                            eprintln!("Transcript saved to: {}", path.display());
                        }
                        None => output::print_to_console(&result, &format, timestamps)?,
                    }
                    Ok(ExitCode::SUCCESS)
                }
                TranscriptStatus::Unavailable => {
                    eprintln!(
                        "{} {}",
                        style("No transcript available:").yellow().bold(),
                        result.error.as_deref().unwrap_or("unknown reason")
                    );
                    Ok(ExitCode::from(1))
                }
                TranscriptStatus::Error => {
                    eprintln!(
                        "{} {}",
                        style("Transcript extraction failed:").red().bold(),
                        result.error.as_deref().unwrap_or("unknown reason")
                    );
                    eprintln!("Try again once the video page is reachable.");
                    Ok(ExitCode::from(2))
                }
            }
        }
        Commands::Tracks { video } => {
            config.validate()?;
            let video_id = resolve_video_id(&video)?;
            let fetcher: Arc<dyn CaptionFetcher> = Arc::new(HttpFetcher::new(&config.http)?);
            let layer = DirectFetchLayer::new(&config, fetcher);

            let tracks = layer
                .list_tracks(&video_id)
                .await
                .with_context(|| format!("Failed to list caption tracks for {}", video_id))?;

            println!("Caption tracks for {}:", style(&video_id).bold());
            for track in tracks {
                let kind = if track.is_generated { "generated" } else { "manual" };
                let translatable = if track.is_translatable { ", translatable" } else { "" };
                println!(
                    "  • {:<8} {} ({}{})",
                    track.language_code,
                    track.name.as_deref().unwrap_or("-"),
                    kind,
                    translatable
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Edit it to change languages, time budgets and selectors.");
                println!("Run `transcriptor config --show` to review it.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Layers => {
            let fetcher: Arc<dyn CaptionFetcher> = Arc::new(HttpFetcher::new(&config.http)?);
            let pipeline = TranscriptPipeline::from_config(&config, fetcher);

            println!("Extraction layers, in order:");
            for layer in pipeline.layers() {
                println!("  • {} (budget {}ms)", layer.kind(), layer.time_budget().as_millis());
            }
            println!(
                "  • {} (runs only when every layer fails)",
                LayerKind::UnavailabilityConfirmer
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Page surface for the run: a saved snapshot, or the live watch page
async fn load_page(
    config: &Config,
    fetcher: &dyn CaptionFetcher,
    video_id: &str,
    snapshot: Option<&Path>,
    har: Option<&Path>,
) -> Result<Arc<dyn PageInspector>> {
    let requests = match har {
        Some(path) => load_har(path)?,
        None => Vec::new(),
    };

    if let Some(path) = snapshot {
        let page = HtmlPage::load(path)?.with_observed_requests(requests);
        return Ok(Arc::new(page));
    }

    let url = watch_url(&config.http.base_url, video_id);
    let policy = config.extraction.fetch_policy();
    match policy.get_text(fetcher, &url).await {
        Ok(html) => Ok(Arc::new(HtmlPage::from_html(html).with_observed_requests(requests))),
        Err(e) => {
            tracing::warn!(%url, error = %e, "watch page could not be loaded");
            Ok(Arc::new(UnreachablePage::new(e.to_string())))
        }
    }
}

fn spinner(quiet: bool, message: &str) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]")?,
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}
