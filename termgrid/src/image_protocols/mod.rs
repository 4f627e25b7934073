// ABOUTME: Image protocol implementations for terminal inline image display
// ABOUTME: Wires detection, layout, compositing, encoding and the render session together

use std::io::{self, Write};

/// One image placement handed to an encoder and discarded afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub data: &'a [u8],
    pub name: &'a str,
    pub width_cells: u32,
    pub height_cells: u32,
    /// Stretch to the declared cell box instead of preserving aspect ratio
    pub stretch: bool,
    /// Session-unique image id, used by protocols that can address images later
    pub id: u32,
}

pub trait ImageProtocol {
    /// Serialize a placement as terminal escape sequences.
    fn encode(&self, placement: &Placement<'_>, out: &mut dyn Write) -> io::Result<()>;

    /// Whether payloads must be PNG before encoding
    fn requires_png(&self) -> bool;

    fn name(&self) -> &'static str;
}

pub mod conversion;
pub mod detection;
pub mod downloader;
pub mod grid;
pub mod iterm2;
pub mod kitty;
pub mod layout;
pub mod renderer;

pub use detection::{ProtocolTarget, TerminalCapabilities};
pub use downloader::{ImageDownloader, ImageFetcher};
pub use grid::{GridImage, compose_grid};
pub use layout::{CellGeometry, TerminalSize, estimate_rows};
pub use renderer::{
    GridOptions, RenderConfig, RenderOverrides, RenderSession, RenderSummary, StreamOptions,
};

/// Encoder for a detected protocol; `None` means plain-text fallback.
pub fn protocol_for(target: ProtocolTarget) -> Option<Box<dyn ImageProtocol + Send + Sync>> {
    match target {
        ProtocolTarget::ChunkedGraphics => Some(Box::new(kitty::KittyProtocol)),
        ProtocolTarget::InlineFile => Some(Box::new(iterm2::ITerm2Protocol)),
        ProtocolTarget::None => None,
    }
}
