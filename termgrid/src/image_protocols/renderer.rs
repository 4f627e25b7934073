// ABOUTME: Render session orchestrating fetch, compose, encode and cursor advancement
// ABOUTME: Implements paged contact-sheet rendering and incremental stream rendering

use super::conversion::{decode_image, ensure_png, image_dimensions};
use super::detection::{FORCE_PROTOCOL_ENV, ProtocolTarget, TerminalCapabilities};
use super::downloader::ImageFetcher;
use super::grid::{MIN_THUMB_PX, bounded_canvas_size, compose_grid};
use super::layout::{self, CELL_ASPECT_ENV, CellGeometry, DEFAULT_CELL_ASPECT, TerminalSize};
use super::{ImageProtocol, Placement, protocol_for};
use crate::error::{RenderError, Result};
use crate::items::MediaItem;
use futures_util::{Stream, StreamExt, stream};
use std::env;
use std::fmt::Display;
use std::io::{BufWriter, Write};
use tokio_util::sync::CancellationToken;

const DIAGNOSTIC_PREFIX: &str = "[termgrid]";
const GRID_IMAGE_NAME: &str = "termgrid-grid.png";
/// Concurrent downloads while filling one grid page.
const PAGE_FETCH_CONCURRENCY: usize = 4;
pub const MAX_GRID_COLS: u32 = 64;
pub const MAX_THUMB_COLS: u32 = 1000;

/// Explicitly chosen render settings from one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOverrides {
    pub protocol: Option<String>,
    pub cell_aspect: Option<f64>,
}

/// Environment-derived settings, resolved once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub protocol: ProtocolTarget,
    pub cell_aspect: f64,
    pub terminal: Option<TerminalSize>,
    /// Diagnostics raised while resolving, printed when rendering starts
    pub notices: Vec<String>,
}

impl RenderConfig {
    /// Resolve against the process environment and the controlling terminal.
    pub fn detect(cli: &RenderOverrides, configured: &RenderOverrides) -> Self {
        Self::resolve(cli, configured, |key| env::var(key).ok(), TerminalSize::query())
    }

    /// Command line beats the environment, which beats the config file.
    pub fn resolve<F>(
        cli: &RenderOverrides,
        configured: &RenderOverrides,
        lookup: F,
        terminal: Option<TerminalSize>,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let capabilities = TerminalCapabilities::detect_with(|key| {
            if key == FORCE_PROTOCOL_ENV {
                cli.protocol
                    .clone()
                    .or_else(|| lookup(key))
                    .or_else(|| configured.protocol.clone())
            } else {
                lookup(key)
            }
        });

        let env_aspect = lookup(CELL_ASPECT_ENV).and_then(|raw| {
            let parsed = layout::parse_cell_aspect(&raw);
            if parsed.is_none() {
                log::debug!("Ignoring {}={:?}", CELL_ASPECT_ENV, raw);
            }
            parsed
        });
        let cell_aspect = cli
            .cell_aspect
            .or(env_aspect)
            .or(configured.cell_aspect)
            .unwrap_or(DEFAULT_CELL_ASPECT);

        Self {
            protocol: capabilities.target(),
            cell_aspect,
            terminal,
            notices: capabilities.rejected_override_notice().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridOptions {
    pub grid_cols: u32,
    /// Tile width in cells, 0 derives it from the terminal width
    pub thumb_cols: u32,
    pub thumb_px: u32,
    pub padding_px: u32,
    /// Items per composite page, 0 derives it from the terminal height
    pub page_size: u32,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            grid_cols: 4,
            thumb_cols: 0,
            thumb_px: 256,
            padding_px: 8,
            page_size: 0,
        }
    }
}

/// Grid options with every automatic value filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub grid_cols: u32,
    pub thumb_cols: u32,
    pub thumb_px: u32,
    pub padding_px: u32,
    pub page_size: usize,
}

impl GridOptions {
    /// Fill in automatic values and reject sizes that cannot be composed.
    pub fn resolve(&self, config: &RenderConfig, item_count: usize) -> Result<GridLayout> {
        if self.grid_cols > MAX_GRID_COLS {
            return Err(RenderError::Configuration(format!(
                "grid cols {} exceeds the maximum of {}",
                self.grid_cols, MAX_GRID_COLS
            )));
        }
        if self.thumb_cols > MAX_THUMB_COLS {
            return Err(RenderError::Configuration(format!(
                "thumb cols {} exceeds the maximum of {}",
                self.thumb_cols, MAX_THUMB_COLS
            )));
        }

        let thumb_px = self.thumb_px.max(MIN_THUMB_PX);
        // Auto width is derived before grid_cols is normalized
        let thumb_cols = if self.thumb_cols == 0 {
            layout::auto_thumb_cols(self.grid_cols, config.terminal)
        } else {
            self.thumb_cols
        };
        let grid_cols = self.grid_cols.max(1);
        let page_size = if self.page_size == 0 {
            layout::auto_page_size(
                grid_cols,
                thumb_cols,
                thumb_px,
                config.cell_aspect,
                config.terminal,
            ) as usize
        } else {
            self.page_size as usize
        };
        let page_size = if page_size == 0 { item_count } else { page_size };
        let page_size = page_size.max(1);

        // The fullest page is the largest canvas this run will allocate
        let fullest = page_size.min(item_count).max(1);
        let fullest_cols = grid_cols.min(u32::try_from(fullest).unwrap_or(u32::MAX));
        bounded_canvas_size(fullest, fullest_cols, thumb_px, self.padding_px)?;

        Ok(GridLayout {
            grid_cols,
            thumb_cols,
            thumb_px,
            padding_px: self.padding_px,
            page_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Image width in cells, 0 derives it from the terminal width
    pub cols: u32,
    /// Print `@user` and caption above each image
    pub text: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { cols: 0, text: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Items shown, as an image or as a fallback URL line
    pub rendered: usize,
    /// Items dropped after a fetch or decode failure
    pub skipped: usize,
    /// Protocol units written (grid pages or stream images)
    pub placements: usize,
    pub cancelled: bool,
}

/// One render invocation: owns the output sink, diagnostics and image ids.
pub struct RenderSession<W: Write, D: Write> {
    config: RenderConfig,
    out: BufWriter<W>,
    diagnostics: D,
    next_id: u32,
}

impl<W: Write, D: Write> RenderSession<W, D> {
    pub fn new(config: RenderConfig, out: W, diagnostics: D) -> Self {
        Self {
            config,
            out: BufWriter::new(out),
            diagnostics,
            next_id: 1,
        }
    }

    /// Flush and hand back the sinks.
    pub fn into_parts(self) -> Result<(W, D)> {
        let out = self
            .out
            .into_inner()
            .map_err(|e| RenderError::Io(e.into_error()))?;
        Ok((out, self.diagnostics))
    }

    /// Render items as paged contact sheets.
    pub async fn render_grid(
        &mut self,
        items: &[MediaItem],
        fetcher: &dyn ImageFetcher,
        options: &GridOptions,
        cancel: &CancellationToken,
    ) -> Result<RenderSummary> {
        self.report_notices();
        let result = self.render_grid_pages(items, fetcher, options, cancel).await;
        let flushed = self.out.flush();
        let summary = result?;
        flushed?;
        Ok(summary)
    }

    /// Render items one at a time in arrival order.
    pub async fn render_stream<S>(
        &mut self,
        items: S,
        fetcher: &dyn ImageFetcher,
        options: &StreamOptions,
        cancel: &CancellationToken,
    ) -> Result<RenderSummary>
    where
        S: Stream<Item = Result<MediaItem>>,
    {
        self.report_notices();
        let result = self.render_stream_items(items, fetcher, options, cancel).await;
        let flushed = self.out.flush();
        let summary = result?;
        flushed?;
        Ok(summary)
    }

    async fn render_grid_pages(
        &mut self,
        items: &[MediaItem],
        fetcher: &dyn ImageFetcher,
        options: &GridOptions,
        cancel: &CancellationToken,
    ) -> Result<RenderSummary> {
        let mut summary = RenderSummary::default();
        let grid = options.resolve(&self.config, items.len())?;

        let Some(protocol) = protocol_for(self.config.protocol) else {
            for item in items {
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    break;
                }
                self.write_url_line(item)?;
                summary.rendered += 1;
            }
            return Ok(summary);
        };

        log::debug!(
            "Grid layout: {} columns x {} cells, {}px thumbs, {} items per page via {}",
            grid.grid_cols,
            grid.thumb_cols,
            grid.thumb_px,
            grid.page_size,
            protocol.name()
        );

        for page in items.chunks(grid.page_size) {
            let fetches = stream::iter(page)
                .map(|item| async move { (item, fetcher.fetch(&item.url).await) })
                .buffered(PAGE_FETCH_CONCURRENCY)
                .collect::<Vec<_>>();
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                fetched = fetches => fetched,
            };

            let mut images = Vec::with_capacity(fetched.len());
            for (item, result) in fetched {
                match result.and_then(|data| decode_image(&data)) {
                    Ok(img) => images.push(img),
                    Err(err) if err.is_item_local() => {
                        log::debug!("Skipping {}: {}", item.url, err);
                        self.warn(err);
                        summary.skipped += 1;
                    }
                    Err(err) => return Err(err),
                }
            }

            // A page where nothing decoded is dropped without a page-level notice
            if images.is_empty() {
                continue;
            }

            let page_cols = grid.grid_cols.min(images.len() as u32);
            let composite = match compose_grid(&images, page_cols, grid.thumb_px, grid.padding_px) {
                Ok(composite) => composite,
                Err(err) if err.is_item_local() => {
                    self.warn(err);
                    summary.skipped += images.len();
                    continue;
                }
                Err(err) => return Err(err),
            };
            let geometry = layout::cell_geometry(
                page_cols * grid.thumb_cols,
                composite.width,
                composite.height,
                self.config.cell_aspect,
            );

            self.emit(&*protocol, &composite.png, GRID_IMAGE_NAME, geometry)?;
            self.out.flush()?;
            summary.rendered += images.len();
            summary.placements += 1;
        }

        Ok(summary)
    }

    async fn render_stream_items<S>(
        &mut self,
        items: S,
        fetcher: &dyn ImageFetcher,
        options: &StreamOptions,
        cancel: &CancellationToken,
    ) -> Result<RenderSummary>
    where
        S: Stream<Item = Result<MediaItem>>,
    {
        let mut summary = RenderSummary::default();
        let protocol = protocol_for(self.config.protocol);
        let cols = if options.cols == 0 {
            layout::auto_stream_cols(self.config.terminal)
        } else {
            options.cols
        };
        let mut items = std::pin::pin!(items);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                next = items.next() => next,
            };
            let item = match next {
                None => break,
                Some(Ok(item)) => item,
                Some(Err(err)) => {
                    if summary.rendered == 0 {
                        return Err(err);
                    }
                    self.warn(format!("item source warning: {}", err));
                    break;
                }
            };
            if item.url.trim().is_empty() {
                continue;
            }

            let Some(protocol) = protocol.as_deref() else {
                self.write_url_line(&item)?;
                self.out.flush()?;
                summary.rendered += 1;
                continue;
            };

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                fetched = fetcher.fetch(&item.url) => fetched,
            };

            // A cancelled fetch leaves no annotation behind
            if options.text {
                if let Some(annotation) = item.annotation() {
                    writeln!(self.out, "{}\n", annotation)?;
                }
            }

            match self.place_stream_item(protocol, &item, fetched, cols) {
                Ok(()) => {
                    summary.rendered += 1;
                    summary.placements += 1;
                }
                Err(err) if err.is_item_local() => {
                    log::debug!("Skipping {}: {}", item.url, err);
                    self.warn(err);
                    summary.skipped += 1;
                }
                Err(err) => return Err(err),
            }
            self.out.flush()?;
        }

        if summary.rendered == 0 && !summary.cancelled {
            self.warn("no images to render");
        }
        Ok(summary)
    }

    fn place_stream_item(
        &mut self,
        protocol: &dyn ImageProtocol,
        item: &MediaItem,
        fetched: Result<Vec<u8>>,
        cols: u32,
    ) -> Result<()> {
        let mut data = fetched?;
        if protocol.requires_png() {
            data = ensure_png(&data)?;
        }

        let (width, height) = image_dimensions(&data)
            .or_else(|| item.reported_dimensions())
            .unwrap_or((1, 1));
        let geometry = CellGeometry {
            width_cells: cols,
            height_cells: layout::estimate_rows(cols, width, height, self.config.cell_aspect).max(1),
        };

        self.emit(protocol, &data, &item.inline_name(), geometry)?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Encode one placement and move the cursor below it.
    fn emit(
        &mut self,
        protocol: &dyn ImageProtocol,
        data: &[u8],
        name: &str,
        geometry: CellGeometry,
    ) -> Result<()> {
        let placement = Placement {
            data,
            name,
            width_cells: geometry.width_cells,
            height_cells: geometry.height_cells,
            stretch: true,
            id: self.next_image_id(),
        };
        protocol.encode(&placement, &mut self.out)?;
        for _ in 0..layout::advance_lines(geometry.height_cells) {
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn next_image_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn write_url_line(&mut self, item: &MediaItem) -> Result<()> {
        writeln!(self.out, "{}", item.url)?;
        Ok(())
    }

    fn report_notices(&mut self) {
        for notice in std::mem::take(&mut self.config.notices) {
            self.warn(notice);
        }
    }

    fn warn(&mut self, message: impl Display) {
        // Diagnostics are best effort and must never abort rendering
        let _ = writeln!(self.diagnostics, "{} {}", DIAGNOSTIC_PREFIX, message);
        let _ = self.diagnostics.flush();
    }
}
