// ABOUTME: Terminal capability detection for inline image protocol support
// ABOUTME: Resolves the environment once into a ProtocolTarget for the whole run

use std::fmt;

pub const FORCE_PROTOCOL_ENV: &str = "TERMGRID_FORCE_PROTOCOL";

/// Wire protocol used to place images, fixed for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolTarget {
    /// No inline image support; every item degrades to its URL.
    None,
    /// iTerm2 file-transfer protocol (OSC 1337).
    InlineFile,
    /// kitty graphics protocol with chunked transmission (APC G).
    ChunkedGraphics,
}

impl ProtocolTarget {
    pub fn is_none(&self) -> bool {
        matches!(self, ProtocolTarget::None)
    }
}

impl fmt::Display for ProtocolTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolTarget::None => "none",
            ProtocolTarget::InlineFile => "iterm2",
            ProtocolTarget::ChunkedGraphics => "kitty",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct TerminalCapabilities {
    pub supports_kitty_images: bool,
    pub supports_iterm2_images: bool,
    pub terminal_name: String,
    /// Forced protocol value that was not recognized
    pub rejected_override: Option<String>,
}

impl TerminalCapabilities {
    /// Detect capabilities through an environment lookup function.
    pub fn detect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rejected_override = None;
        if let Some(forced_protocol) = lookup(FORCE_PROTOCOL_ENV) {
            if let Some(caps) = Self::from_forced_protocol(&forced_protocol) {
                return caps;
            }
            log::debug!("Ignoring forced protocol '{}'", forced_protocol);
            rejected_override = Some(forced_protocol);
        }

        let term_program = lookup("TERM_PROGRAM").unwrap_or_default();
        let term = lookup("TERM").unwrap_or_default();
        let wezterm_exe = lookup("WEZTERM_EXECUTABLE");
        let kitty_window_id = lookup("KITTY_WINDOW_ID");

        let caps = Self {
            supports_kitty_images: detect_kitty_support(
                &term_program,
                &term,
                wezterm_exe.as_deref(),
                kitty_window_id.as_deref(),
            ),
            supports_iterm2_images: detect_iterm2_support(&term_program, &term),
            terminal_name: determine_terminal_name(&term_program, &term),
            rejected_override,
        };
        log::debug!(
            "Detected terminal '{}' (kitty: {}, iterm2: {})",
            caps.terminal_name,
            caps.supports_kitty_images,
            caps.supports_iterm2_images
        );
        caps
    }

    /// Capabilities from a user override; `None` for unrecognized values.
    fn from_forced_protocol(protocol: &str) -> Option<Self> {
        let terminal_name = format!("forced-{}", protocol);

        let (kitty, iterm2) = match protocol.trim().to_lowercase().as_str() {
            "kitty" => (true, false),
            "iterm2" | "iterm" => (false, true),
            "none" | "disable" | "disabled" => (false, false),
            _ => return None,
        };

        Some(Self {
            supports_kitty_images: kitty,
            supports_iterm2_images: iterm2,
            terminal_name,
            rejected_override: None,
        })
    }

    /// Diagnostic for an unrecognized forced protocol, if there was one.
    pub fn rejected_override_notice(&self) -> Option<String> {
        self.rejected_override.as_ref().map(|value| {
            format!(
                "unknown protocol '{}' in {}, valid values: kitty, iterm2, none",
                value, FORCE_PROTOCOL_ENV
            )
        })
    }

    pub fn supports_inline_images(&self) -> bool {
        self.supports_kitty_images || self.supports_iterm2_images
    }

    /// Preferred protocol; kitty wins when a terminal speaks both.
    pub fn target(&self) -> ProtocolTarget {
        if self.supports_kitty_images {
            ProtocolTarget::ChunkedGraphics
        } else if self.supports_iterm2_images {
            ProtocolTarget::InlineFile
        } else {
            ProtocolTarget::None
        }
    }
}

fn detect_kitty_support(
    term_program: &str,
    term: &str,
    wezterm_exe: Option<&str>,
    kitty_window_id: Option<&str>,
) -> bool {
    if term_program == "kitty" || kitty_window_id.is_some() {
        return true;
    }

    if term_program == "WezTerm" || wezterm_exe.is_some() {
        return true;
    }

    if term_program == "ghostty" {
        return true;
    }

    term.contains("kitty") || term.contains("ghostty")
}

fn detect_iterm2_support(term_program: &str, term: &str) -> bool {
    if term_program == "iTerm.app" {
        return true;
    }

    if matches!(
        term_program,
        "WezTerm" | "mintty" | "Hyper" | "Warp" | "Tabby" | "Terminus"
    ) {
        return true;
    }

    term.contains("iterm")
}

fn determine_terminal_name(term_program: &str, term: &str) -> String {
    if !term_program.is_empty() {
        term_program.to_string()
    } else if !term.is_empty() {
        term.to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn detect_from(vars: &[(&str, &str)]) -> TerminalCapabilities {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TerminalCapabilities::detect_with(|key| map.get(key).cloned())
    }

    #[test]
    fn test_kitty_terminal_detection() {
        let caps = detect_from(&[("TERM_PROGRAM", "kitty")]);
        assert!(caps.supports_kitty_images);
        assert_eq!(caps.target(), ProtocolTarget::ChunkedGraphics);

        let caps = detect_from(&[("KITTY_WINDOW_ID", "1")]);
        assert!(caps.supports_kitty_images);

        let caps = detect_from(&[("TERM", "xterm-kitty")]);
        assert_eq!(caps.target(), ProtocolTarget::ChunkedGraphics);
    }

    #[test]
    fn test_wezterm_prefers_kitty() {
        let caps = detect_from(&[("TERM_PROGRAM", "WezTerm")]);
        assert!(caps.supports_kitty_images);
        assert!(caps.supports_iterm2_images);
        assert_eq!(caps.target(), ProtocolTarget::ChunkedGraphics);
    }

    #[test]
    fn test_iterm2_detection() {
        let caps = detect_from(&[("TERM_PROGRAM", "iTerm.app"), ("TERM", "xterm-256color")]);
        assert!(caps.supports_iterm2_images);
        assert!(!caps.supports_kitty_images);
        assert_eq!(caps.target(), ProtocolTarget::InlineFile);

        let caps = detect_from(&[("TERM_PROGRAM", "Warp")]);
        assert_eq!(caps.target(), ProtocolTarget::InlineFile);

        let caps = detect_from(&[("TERM", "xterm-iterm2")]);
        assert_eq!(caps.target(), ProtocolTarget::InlineFile);
    }

    #[test]
    fn test_no_support_detection() {
        let caps = detect_from(&[("TERM_PROGRAM", "unsupported"), ("TERM", "dumb")]);
        assert!(!caps.supports_inline_images());
        assert_eq!(caps.target(), ProtocolTarget::None);
        assert_eq!(caps.terminal_name, "unsupported");

        let caps = detect_from(&[]);
        assert_eq!(caps.target(), ProtocolTarget::None);
        assert_eq!(caps.terminal_name, "unknown");
    }

    #[test]
    fn test_force_protocol() {
        let caps = detect_from(&[(FORCE_PROTOCOL_ENV, "kitty"), ("TERM_PROGRAM", "unsupported")]);
        assert_eq!(caps.target(), ProtocolTarget::ChunkedGraphics);
        assert_eq!(caps.terminal_name, "forced-kitty");

        let caps = detect_from(&[(FORCE_PROTOCOL_ENV, "iTerm2"), ("TERM_PROGRAM", "kitty")]);
        assert_eq!(caps.target(), ProtocolTarget::InlineFile);

        let caps = detect_from(&[(FORCE_PROTOCOL_ENV, "none"), ("TERM_PROGRAM", "kitty")]);
        assert_eq!(caps.target(), ProtocolTarget::None);
        assert_eq!(caps.terminal_name, "forced-none");
    }

    #[test]
    fn test_unknown_forced_protocol_falls_back() {
        let caps = detect_from(&[(FORCE_PROTOCOL_ENV, "sixel"), ("TERM_PROGRAM", "iTerm.app")]);
        assert_eq!(caps.target(), ProtocolTarget::InlineFile);
        assert_eq!(caps.terminal_name, "iTerm.app");
        assert_eq!(caps.rejected_override.as_deref(), Some("sixel"));
        assert_eq!(
            caps.rejected_override_notice().unwrap(),
            "unknown protocol 'sixel' in TERMGRID_FORCE_PROTOCOL, valid values: kitty, iterm2, none"
        );

        let caps = detect_from(&[(FORCE_PROTOCOL_ENV, "kitty")]);
        assert_eq!(caps.rejected_override_notice(), None);
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(ProtocolTarget::ChunkedGraphics.to_string(), "kitty");
        assert_eq!(ProtocolTarget::InlineFile.to_string(), "iterm2");
        assert_eq!(ProtocolTarget::None.to_string(), "none");
        assert!(ProtocolTarget::None.is_none());
    }
}
