// ABOUTME: Character-cell geometry for inline images
// ABOUTME: Converts pixel sizes into cell footprints and derives grid and page sizes

use crossterm::terminal::size as terminal_size;

/// Assumed width:height ratio of one terminal character cell.
pub const DEFAULT_CELL_ASPECT: f64 = 0.5;

pub const CELL_ASPECT_ENV: &str = "TERMGRID_CELL_ASPECT";

const FALLBACK_THUMB_COLS: u32 = 12;
const MIN_THUMB_COLS: u32 = 6;
const FALLBACK_TILE_ROWS: u32 = 8;
const FALLBACK_STREAM_COLS: u32 = 80;
const MAX_STREAM_COLS: u32 = 100;

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    /// Query the controlling terminal; `None` when stdout is not a tty.
    pub fn query() -> Option<Self> {
        match terminal_size() {
            Ok((cols, rows)) if cols > 0 && rows > 0 => Some(Self { cols, rows }),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Terminal size unavailable: {}", e);
                None
            }
        }
    }
}

/// Cell footprint of one placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGeometry {
    pub width_cells: u32,
    pub height_cells: u32,
}

/// Parse a cell aspect ratio; `None` unless it is a finite positive number.
pub fn parse_cell_aspect(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|aspect| aspect.is_finite() && *aspect > 0.0)
}

/// Rows needed to show an image `cols_cells` wide without distortion.
///
/// Returns 0 when any dimension is zero, meaning the image cannot be placed.
/// Every caller that needs a footprint goes through here so grid and stream
/// output stay visually consistent.
pub fn estimate_rows(cols_cells: u32, width_px: u32, height_px: u32, cell_aspect: f64) -> u32 {
    if cols_cells == 0 || width_px == 0 || height_px == 0 {
        return 0;
    }
    let aspect = f64::from(height_px) / f64::from(width_px);
    let rows = (f64::from(cols_cells) * aspect * cell_aspect).max(1.0);
    rows.round() as u32
}

pub fn cell_geometry(cols_cells: u32, width_px: u32, height_px: u32, cell_aspect: f64) -> CellGeometry {
    CellGeometry {
        width_cells: cols_cells,
        height_cells: estimate_rows(cols_cells, width_px, height_px, cell_aspect),
    }
}

/// Per-tile width in cells when the user leaves it unset.
pub fn auto_thumb_cols(grid_cols: u32, term: Option<TerminalSize>) -> u32 {
    if grid_cols == 0 {
        return FALLBACK_THUMB_COLS;
    }
    match term {
        Some(size) if size.cols > 0 => (u32::from(size.cols) / grid_cols).max(MIN_THUMB_COLS),
        _ => FALLBACK_THUMB_COLS,
    }
}

/// How many tiles fit on one screen before a new page is flushed.
///
/// Returns 0 for `grid_cols == 0`; callers then put every item on one page.
pub fn auto_page_size(
    grid_cols: u32,
    thumb_cols: u32,
    thumb_px: u32,
    cell_aspect: f64,
    term: Option<TerminalSize>,
) -> u32 {
    if grid_cols == 0 {
        return 0;
    }
    let Some(size) = term.filter(|size| size.rows > 0) else {
        return grid_cols * FALLBACK_TILE_ROWS;
    };
    let thumb_rows = estimate_rows(thumb_cols, thumb_px, thumb_px, cell_aspect);
    if thumb_rows == 0 {
        return grid_cols * FALLBACK_TILE_ROWS;
    }
    let max_tile_rows = (u32::from(size.rows) / thumb_rows).max(1);
    grid_cols * max_tile_rows
}

/// Image width in cells for stream mode.
pub fn auto_stream_cols(term: Option<TerminalSize>) -> u32 {
    match term {
        Some(size) if size.cols > 0 => u32::from(size.cols).min(MAX_STREAM_COLS),
        _ => FALLBACK_STREAM_COLS,
    }
}

/// Newlines to write after an image so later output never overdraws it.
pub fn advance_lines(rows: u32) -> usize {
    rows.max(1) as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(cols: u16, rows: u16) -> Option<TerminalSize> {
        Some(TerminalSize { cols, rows })
    }

    #[test]
    fn test_estimate_rows_portrait() {
        assert_eq!(estimate_rows(10, 100, 200, 0.5), 10);
    }

    #[test]
    fn test_estimate_rows_zero_sentinel() {
        assert_eq!(estimate_rows(0, 100, 200, 0.5), 0);
        assert_eq!(estimate_rows(10, 0, 200, 0.5), 0);
        assert_eq!(estimate_rows(10, 100, 0, 0.5), 0);
        assert_eq!(estimate_rows(40, 0, 0, 2.0), 0);
    }

    #[test]
    fn test_estimate_rows_floors_at_one() {
        // 1 * (1/1000) * 0.5 is far below a single row
        assert_eq!(estimate_rows(1, 1000, 1, 0.5), 1);
        assert_eq!(estimate_rows(3, 400, 100, 0.5), 1);
    }

    #[test]
    fn test_estimate_rows_rounds() {
        // 10 * 0.75 * 0.5 = 3.75
        assert_eq!(estimate_rows(10, 400, 300, 0.5), 4);
        // 10 * 0.5 * 0.5 = 2.5 rounds away from zero
        assert_eq!(estimate_rows(10, 200, 100, 0.5), 3);
    }

    #[test]
    fn test_estimate_rows_monotonic_in_height() {
        for cols in [1u32, 7, 40, 120] {
            for width in [1u32, 33, 640] {
                let mut previous = 0;
                for height in 1..400u32 {
                    let rows = estimate_rows(cols, width, height, DEFAULT_CELL_ASPECT);
                    assert!(rows >= 1);
                    assert!(rows >= previous, "rows decreased at {}x{}", width, height);
                    previous = rows;
                }
            }
        }
    }

    #[test]
    fn test_cell_geometry() {
        let geometry = cell_geometry(20, 300, 300, 0.5);
        assert_eq!(
            geometry,
            CellGeometry {
                width_cells: 20,
                height_cells: 10
            }
        );
    }

    #[test]
    fn test_auto_thumb_cols() {
        assert_eq!(auto_thumb_cols(4, term(120, 40)), 30);
        assert_eq!(auto_thumb_cols(4, term(20, 40)), 6);
        assert_eq!(auto_thumb_cols(4, None), 12);
        assert_eq!(auto_thumb_cols(0, term(120, 40)), 12);
    }

    #[test]
    fn test_auto_page_size() {
        // 30 cols of a square thumb at 0.5 aspect is 15 rows; 40 / 15 = 2 tile rows
        assert_eq!(auto_page_size(4, 30, 256, 0.5, term(120, 40)), 8);
        // Terminal shorter than one tile still shows one row of tiles
        assert_eq!(auto_page_size(4, 30, 256, 0.5, term(120, 5)), 4);
        assert_eq!(auto_page_size(4, 30, 256, 0.5, None), 32);
        assert_eq!(auto_page_size(4, 0, 256, 0.5, term(120, 40)), 32);
        assert_eq!(auto_page_size(0, 30, 256, 0.5, term(120, 40)), 0);
    }

    #[test]
    fn test_auto_stream_cols() {
        assert_eq!(auto_stream_cols(term(80, 24)), 80);
        assert_eq!(auto_stream_cols(term(240, 60)), 100);
        assert_eq!(auto_stream_cols(term(12, 60)), 12);
        assert_eq!(auto_stream_cols(None), 80);
    }

    #[test]
    fn test_advance_lines() {
        assert_eq!(advance_lines(0), 2);
        assert_eq!(advance_lines(1), 2);
        assert_eq!(advance_lines(10), 11);
    }

    #[test]
    fn test_parse_cell_aspect() {
        assert_eq!(parse_cell_aspect("0.45"), Some(0.45));
        assert_eq!(parse_cell_aspect(" 1 "), Some(1.0));
        assert_eq!(parse_cell_aspect("wide"), None);
        assert_eq!(parse_cell_aspect("-2"), None);
        assert_eq!(parse_cell_aspect("0"), None);
        assert_eq!(parse_cell_aspect("NaN"), None);
    }
}
