// ABOUTME: CLI argument definitions for the termgrid application
// ABOUTME: Defines the command-line interface structure using clap derive macros

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::image_protocols::{GridOptions, ProtocolTarget, RenderOverrides, StreamOptions};

#[derive(Parser, Debug)]
#[command(name = "termgrid")]
#[command(about = "Render remote images inline in kitty and iTerm2 compatible terminals", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output format (auto renders inline only on a capable terminal)
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputMode>,

    /// Shorthand for --format inline
    #[arg(long, global = true, conflicts_with_all = ["url", "json", "format"])]
    pub inline: bool,

    /// Shorthand for --format url
    #[arg(long, global = true, conflicts_with_all = ["json", "format"])]
    pub url: bool,

    /// Shorthand for --format json
    #[arg(long, global = true, conflicts_with = "format")]
    pub json: bool,

    /// Pretty print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Override protocol detection
    #[arg(long, global = true, value_parser = ["kitty", "iterm2", "none"])]
    pub protocol: Option<String>,

    /// Width:height ratio of one terminal cell
    #[arg(long, global = true, value_parser = parse_positive_f64)]
    pub cell_aspect: Option<f64>,

    /// Drop video thumbnails from the input
    #[arg(long, global = true)]
    pub no_videos: bool,

    /// Enable verbose output for debugging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render items as paged contact sheets
    Grid {
        #[command(flatten)]
        source: SourceArgs,

        /// Tiles per row
        #[arg(long)]
        cols: Option<u32>,

        /// Tile width in terminal cells (0 = fit the terminal)
        #[arg(long)]
        thumb_cols: Option<u32>,

        /// Tile edge in pixels (minimum 64)
        #[arg(long)]
        thumb_px: Option<u32>,

        /// Gap between tiles in pixels
        #[arg(long)]
        padding_px: Option<u32>,

        /// Items per page (0 = fit the terminal height)
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Render items one at a time as they arrive
    Stream {
        #[command(flatten)]
        source: SourceArgs,

        /// Image width in terminal cells (0 = fit the terminal)
        #[arg(long)]
        cols: Option<u32>,

        /// Hide usernames and captions
        #[arg(long)]
        no_text: bool,
    },
    /// Print item URLs without fetching anything
    Urls {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Image URLs to render
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// JSON or JSON-lines item file ("-" reads stdin)
    #[arg(long, short, value_name = "FILE", conflicts_with = "urls")]
    pub input: Option<PathBuf>,
}

impl SourceArgs {
    pub fn reads_stdin(&self) -> bool {
        self.input.as_deref().is_some_and(|path| path.as_os_str() == "-")
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Auto,
    Inline,
    Url,
    Json,
}

impl Cli {
    /// Format requested on the command line, shorthands included.
    pub fn requested_format(&self) -> Option<OutputMode> {
        if self.inline {
            Some(OutputMode::Inline)
        } else if self.url {
            Some(OutputMode::Url)
        } else if self.json {
            Some(OutputMode::Json)
        } else {
            self.format
        }
    }

    /// Render settings given on the command line.
    pub fn render_overrides(&self) -> RenderOverrides {
        RenderOverrides {
            protocol: self.protocol.clone(),
            cell_aspect: self.cell_aspect,
        }
    }
}

impl Commands {
    /// Whether this command renders through a session in `mode`.
    pub fn opens_session(&self, mode: OutputMode) -> bool {
        match self {
            Commands::Grid { .. } => mode == OutputMode::Inline,
            Commands::Stream { .. } => mode != OutputMode::Json,
            Commands::Urls { .. } => false,
        }
    }
}

/// Settle `auto` into a concrete mode for this run.
pub fn resolve_mode(requested: OutputMode, stdout_is_terminal: bool, protocol: ProtocolTarget) -> OutputMode {
    match requested {
        OutputMode::Auto if stdout_is_terminal && !protocol.is_none() => OutputMode::Inline,
        OutputMode::Auto => OutputMode::Url,
        other => other,
    }
}

/// Apply grid flags over configured options.
pub fn apply_grid_flags(
    mut options: GridOptions,
    cols: Option<u32>,
    thumb_cols: Option<u32>,
    thumb_px: Option<u32>,
    padding_px: Option<u32>,
    page_size: Option<u32>,
) -> GridOptions {
    options.grid_cols = cols.unwrap_or(options.grid_cols);
    options.thumb_cols = thumb_cols.unwrap_or(options.thumb_cols);
    options.thumb_px = thumb_px.unwrap_or(options.thumb_px);
    options.padding_px = padding_px.unwrap_or(options.padding_px);
    options.page_size = page_size.unwrap_or(options.page_size);
    options
}

pub fn apply_stream_flags(mut options: StreamOptions, cols: Option<u32>, no_text: bool) -> StreamOptions {
    options.cols = cols.unwrap_or(options.cols);
    if no_text {
        options.text = false;
    }
    options
}

fn parse_positive_f64(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("'{}' must be a positive number", raw))
    }
}
