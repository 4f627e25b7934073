// ABOUTME: Main entry point for the termgrid application
// ABOUTME: Resolves config and terminal capabilities, then renders items as grids or streams

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures_util::{Stream, StreamExt, future, stream};
use std::io::{self, IsTerminal, Write};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use termgrid::cli::{self, Cli, Commands, OutputMode, SourceArgs};
use termgrid::config::Config;
use termgrid::error::RenderError;
use termgrid::image_protocols::{
    ImageDownloader, ProtocolTarget, RenderConfig, RenderSession, RenderSummary,
};
use termgrid::items::{self, MediaItem};
use termgrid::output::{JsonFormatter, OutputFormat, UrlFormatter};

/// Conventional exit status after SIGINT.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let config = Config::load().context("Failed to load configuration")?;
    let mut render_config = RenderConfig::detect(&cli.render_overrides(), &config.render_overrides());
    log::debug!(
        "Protocol {} with cell aspect {}",
        render_config.protocol,
        render_config.cell_aspect
    );

    let requested = cli
        .requested_format()
        .or_else(|| config.format.as_deref().and_then(|f| OutputMode::from_str(f, true).ok()))
        .unwrap_or(OutputMode::Auto);
    let mode = cli::resolve_mode(requested, io::stdout().is_terminal(), render_config.protocol);
    let include_videos = !cli.no_videos && config.include_videos.unwrap_or(true);
    if !cli.command.opens_session(mode) {
        for notice in render_config.notices.drain(..) {
            eprintln!("[termgrid] {}", notice);
        }
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let summary = match &cli.command {
        Commands::Urls { source } => {
            let list = load_items(source, include_videos).await?;
            let output = match mode {
                OutputMode::Json => JsonFormatter::new(cli.pretty).format_items(&list)?,
                _ => UrlFormatter.format_items(&list)?,
            };
            write_stdout(&output)?;
            None
        }
        Commands::Grid {
            source,
            cols,
            thumb_cols,
            thumb_px,
            padding_px,
            page_size,
        } => {
            let list = load_items(source, include_videos).await?;
            match mode {
                OutputMode::Inline => {
                    let options = cli::apply_grid_flags(
                        config.grid_options(),
                        *cols,
                        *thumb_cols,
                        *thumb_px,
                        *padding_px,
                        *page_size,
                    );
                    let downloader = ImageDownloader::new(config.max_image_size.as_deref())?;
                    let mut session = RenderSession::new(render_config, io::stdout(), io::stderr());
                    let summary = session
                        .render_grid(&list, &downloader, &options, &cancel)
                        .await?;
                    session.into_parts()?;
                    Some(summary)
                }
                OutputMode::Json => {
                    write_stdout(&JsonFormatter::new(cli.pretty).format_items(&list)?)?;
                    None
                }
                _ => {
                    write_stdout(&UrlFormatter.format_items(&list)?)?;
                    None
                }
            }
        }
        Commands::Stream {
            source,
            cols,
            no_text,
        } => {
            let options = cli::apply_stream_flags(config.stream_options(), *cols, *no_text);
            let items = item_source(source, include_videos).await?;
            match mode {
                OutputMode::Json => {
                    print_json_lines(items, &cancel).await?;
                    None
                }
                mode => {
                    let mut render_config = render_config;
                    if mode == OutputMode::Url {
                        render_config.protocol = ProtocolTarget::None;
                    }
                    let downloader = ImageDownloader::new(config.max_image_size.as_deref())?;
                    let mut session = RenderSession::new(render_config, io::stdout(), io::stderr());
                    let summary = session
                        .render_stream(items, &downloader, &options, &cancel)
                        .await?;
                    session.into_parts()?;
                    Some(summary)
                }
            }
        }
    };

    if let Some(summary) = summary {
        report(&summary);
    }
    if cancel.is_cancelled() {
        eprintln!("[termgrid] {}", RenderError::Cancelled);
        std::process::exit(EXIT_CANCELLED);
    }

    Ok(())
}

async fn load_items(source: &SourceArgs, include_videos: bool) -> Result<Vec<MediaItem>> {
    let list = match &source.input {
        Some(_) if source.reads_stdin() => {
            items::read_items(tokio::io::stdin())
                .await
                .context("Failed to read items from stdin")?
        }
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read item file: {}", path.display()))?;
            items::parse_items(&content)
                .with_context(|| format!("Failed to parse item file: {}", path.display()))?
        }
        None => source.urls.iter().map(MediaItem::from_url).collect(),
    };
    Ok(items::filter_videos(list, include_videos))
}

type ItemStream = std::pin::Pin<Box<dyn Stream<Item = termgrid::error::Result<MediaItem>>>>;

/// Items in arrival order; stdin is read incrementally, one line at a time.
async fn item_source(source: &SourceArgs, include_videos: bool) -> Result<ItemStream> {
    let stream: ItemStream = match &source.input {
        Some(_) if source.reads_stdin() => {
            Box::pin(items::item_stream(BufReader::new(tokio::io::stdin())))
        }
        Some(_) => {
            // Files may hold a JSON array, so they are parsed whole
            let list = load_items(source, true).await?;
            Box::pin(stream::iter(list.into_iter().map(Ok)))
        }
        None => Box::pin(stream::iter(
            source.urls.iter().map(MediaItem::from_url).map(Ok).collect::<Vec<_>>(),
        )),
    };

    if include_videos {
        Ok(stream)
    } else {
        Ok(Box::pin(stream.filter(|item| {
            future::ready(!matches!(item, Ok(item) if item.is_video))
        })))
    }
}

async fn print_json_lines(mut items: ItemStream, cancel: &CancellationToken) -> Result<()> {
    let mut stdout = io::stdout().lock();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = items.next() => next,
        };
        let Some(item) = next else {
            break;
        };
        writeln!(stdout, "{}", serde_json::to_string(&item?)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn write_stdout(output: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn report(summary: &RenderSummary) {
    log::debug!(
        "Rendered {} items in {} placements, skipped {}",
        summary.rendered,
        summary.placements,
        summary.skipped
    );
}
