// ABOUTME: Text output formats used when images are not rendered inline
// ABOUTME: Provides a plain URL list formatter and a JSON formatter over media items

use anyhow::Result;

use crate::items::MediaItem;

pub trait OutputFormat {
    fn format_items(&self, items: &[MediaItem]) -> Result<String>;
}

/// One URL per line, matching the renderer's no-protocol fallback.
pub struct UrlFormatter;

impl OutputFormat for UrlFormatter {
    fn format_items(&self, items: &[MediaItem]) -> Result<String> {
        let mut output = String::new();
        for item in items.iter().filter(|item| !item.url.trim().is_empty()) {
            output.push_str(&item.url);
            output.push('\n');
        }
        Ok(output)
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormat for JsonFormatter {
    fn format_items(&self, items: &[MediaItem]) -> Result<String> {
        let mut output = if self.pretty {
            serde_json::to_string_pretty(items)?
        } else {
            serde_json::to_string(items)?
        };
        output.push('\n');
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_items() -> Vec<MediaItem> {
        vec![
            MediaItem {
                url: "https://cdn.example.com/a.jpg".to_string(),
                username: "alice".to_string(),
                ..Default::default()
            },
            MediaItem::from_url(""),
            MediaItem::from_url("https://cdn.example.com/b.jpg"),
        ]
    }

    #[test]
    fn test_url_formatter() {
        let output = UrlFormatter.format_items(&sample_items()).unwrap();
        assert_eq!(
            output,
            "https://cdn.example.com/a.jpg\nhttps://cdn.example.com/b.jpg\n"
        );
        assert_eq!(UrlFormatter.format_items(&[]).unwrap(), "");
    }

    #[test]
    fn test_json_formatter_compact() {
        let items = vec![MediaItem::from_url("https://a")];
        let output = JsonFormatter::new(false).format_items(&items).unwrap();
        assert_eq!(output, "[{\"url\":\"https://a\",\"is_video\":false}]\n");
    }

    #[test]
    fn test_json_formatter_pretty_round_trips() {
        let items = sample_items();
        let output = JsonFormatter::new(true).format_items(&items).unwrap();
        assert!(output.contains("\n  {"));
        let parsed: Vec<MediaItem> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, items);
    }
}
