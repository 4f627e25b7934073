// ABOUTME: Kitty terminal graphics protocol implementation
// ABOUTME: Base64-encodes the payload and transmits it in ordered 4096-byte chunks

use super::{ImageProtocol, Placement};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::io::{self, Write};

/// Maximum base64 bytes per escape sequence (a multiple of 4).
pub const CHUNK_SIZE: usize = 4096;

/// PNG payload format code.
const FORMAT_PNG: u32 = 100;

pub struct KittyProtocol;

impl ImageProtocol for KittyProtocol {
    fn encode(&self, placement: &Placement<'_>, out: &mut dyn Write) -> io::Result<()> {
        let base64_data = STANDARD.encode(placement.data);
        let bytes = base64_data.as_bytes();

        // An empty payload still needs a terminating chunk carrying the metadata
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![bytes]
        } else {
            bytes.chunks(CHUNK_SIZE).collect()
        };

        for (i, chunk) in chunks.iter().enumerate() {
            let more = u8::from(i + 1 < chunks.len());
            if i == 0 {
                write!(
                    out,
                    "\x1b_Ga=T,f={},i={},c={},r={},q=2,m={};",
                    FORMAT_PNG,
                    placement.id,
                    placement.width_cells,
                    placement.height_cells,
                    more
                )?;
            } else {
                write!(out, "\x1b_Gm={};", more)?;
            }
            out.write_all(chunk)?;
            out.write_all(b"\x1b\\")?;
        }

        Ok(())
    }

    fn requires_png(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "kitty"
    }
}
