// ABOUTME: iTerm2 terminal inline image protocol implementation
// ABOUTME: Emits a single OSC 1337 File sequence with cell size and stretch flag

use super::{ImageProtocol, Placement};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::io::{self, Write};

pub struct ITerm2Protocol;

impl ImageProtocol for ITerm2Protocol {
    fn encode(&self, placement: &Placement<'_>, out: &mut dyn Write) -> io::Result<()> {
        // ESC ] 1337 ; File=name=..;size=..;width=..;height=..;preserveAspectRatio=..;inline=1 : data BEL
        write!(
            out,
            "\x1b]1337;File=name={};size={};width={};height={};preserveAspectRatio={};inline=1:",
            STANDARD.encode(placement.name.as_bytes()),
            placement.data.len(),
            placement.width_cells,
            placement.height_cells,
            u8::from(!placement.stretch),
        )?;
        out.write_all(STANDARD.encode(placement.data).as_bytes())?;
        out.write_all(b"\x07")
    }

    fn requires_png(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "iterm2"
    }
}
