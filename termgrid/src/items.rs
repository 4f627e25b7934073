// ABOUTME: Media item model and loaders for JSON, JSON-lines and plain URL input
// ABOUTME: Provides the ordered item sequence the renderer consumes, batch or streaming

use crate::error::{RenderError, Result};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub taken_at: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shortcode: String,
    /// Source-reported pixel width, 0 when unknown
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub width: u32,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub height: u32,
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

impl MediaItem {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Text block shown above an image: `@user`, then the caption on one line.
    pub fn annotation(&self) -> Option<String> {
        let username = self.username.trim();
        let caption = compact_whitespace(&self.caption);
        let mut lines = Vec::new();
        if !username.is_empty() {
            lines.push(format!("@{}", username));
        }
        if !caption.is_empty() {
            lines.push(caption);
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    /// Display name for the inline-file protocol.
    pub fn inline_name(&self) -> String {
        let trimmed = self.shortcode.trim();
        let base = if trimmed.is_empty() { "image" } else { trimmed };
        let name = format!("{}.img", base);
        name.rsplit('/').next().unwrap_or("image.img").to_string()
    }

    /// Source-reported dimensions when both are known.
    pub fn reported_dimensions(&self) -> Option<(u32, u32)> {
        (self.width > 0 && self.height > 0).then_some((self.width, self.height))
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn compact_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a JSON array of items, or JSON-lines with one item per line.
pub fn parse_items(input: &str) -> Result<Vec<MediaItem>> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| RenderError::Source(format!("invalid item list: {}", e)));
    }
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_line(line, index + 1))
        .collect()
}

fn parse_line(line: &str, line_number: usize) -> Result<MediaItem> {
    let line = line.trim();
    // Bare URLs are accepted alongside JSON objects
    if !line.starts_with('{') {
        return Ok(MediaItem::from_url(line));
    }
    serde_json::from_str(line)
        .map_err(|e| RenderError::Source(format!("line {}: {}", line_number, e)))
}

/// Read a whole item document from `reader` and parse it.
pub async fn read_items<R>(mut reader: R) -> Result<Vec<MediaItem>>
where
    R: AsyncRead + Unpin,
{
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .await
        .map_err(|e| RenderError::Source(format!("read items: {}", e)))?;
    parse_items(&content)
}

/// Keep or drop video thumbnails.
pub fn filter_videos(items: Vec<MediaItem>, include_videos: bool) -> Vec<MediaItem> {
    if include_videos {
        items
    } else {
        items.into_iter().filter(|item| !item.is_video).collect()
    }
}

/// Incremental item stream over JSON-lines input; yields as lines arrive.
///
/// A read or parse error is yielded once and ends the stream.
pub fn item_stream<R>(reader: R) -> impl Stream<Item = Result<MediaItem>>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold(
        (reader.lines(), 0usize, false),
        |(mut lines, mut line_number, failed)| async move {
            if failed {
                return None;
            }
            loop {
                line_number += 1;
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        let parsed = parse_line(&line, line_number);
                        let failed = parsed.is_err();
                        return Some((parsed, (lines, line_number, failed)));
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        let err = RenderError::Source(format!("read items: {}", e));
                        return Some((Err(err), (lines, line_number, true)));
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn test_compact_whitespace() {
        assert_eq!(compact_whitespace("hello \n  world\t\tfoo"), "hello world foo");
        assert_eq!(compact_whitespace("   "), "");
    }

    #[test]
    fn test_inline_name() {
        assert_eq!(MediaItem::default().inline_name(), "image.img");
        let item = MediaItem {
            shortcode: "abc".to_string(),
            ..Default::default()
        };
        assert_eq!(item.inline_name(), "abc.img");
        let item = MediaItem {
            shortcode: " foo/bar ".to_string(),
            ..Default::default()
        };
        assert_eq!(item.inline_name(), "bar.img");
    }

    #[test]
    fn test_annotation() {
        let item = MediaItem {
            username: " tester ".to_string(),
            caption: "sunset\n\nat   the beach".to_string(),
            ..Default::default()
        };
        assert_eq!(
            item.annotation(),
            Some("@tester\nsunset at the beach".to_string())
        );

        let caption_only = MediaItem {
            caption: "just words".to_string(),
            ..Default::default()
        };
        assert_eq!(caption_only.annotation(), Some("just words".to_string()));
        assert_eq!(MediaItem::from_url("https://x").annotation(), None);
    }

    #[test]
    fn test_parse_json_array() {
        let input = r#"[
            {"url": "https://cdn.example.com/a.jpg", "username": "alice", "taken_at": 123},
            {"url": "https://cdn.example.com/b.jpg", "is_video": true, "width": 640, "height": 480}
        ]"#;
        let items = parse_items(input).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].username, "alice");
        assert_eq!(items[0].taken_at, 123);
        assert!(items[1].is_video);
        assert_eq!(items[1].reported_dimensions(), Some((640, 480)));
        assert_eq!(items[0].reported_dimensions(), None);
    }

    #[test]
    fn test_parse_json_lines_and_urls() {
        let input = "https://cdn.example.com/a.jpg\n\n{\"url\": \"https://cdn.example.com/b.jpg\", \"shortcode\": \"b\"}\n";
        let items = parse_items(input).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], MediaItem::from_url("https://cdn.example.com/a.jpg"));
        assert_eq!(items[1].shortcode, "b");
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse_items("https://a\n{\"url\": 5}\n").unwrap_err();
        assert!(matches!(err, RenderError::Source(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_filter_videos() {
        let items = vec![
            MediaItem::from_url("a"),
            MediaItem {
                url: "b".to_string(),
                is_video: true,
                ..Default::default()
            },
        ];
        assert_eq!(filter_videos(items.clone(), true).len(), 2);
        let photos = filter_videos(items, false);
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].url, "a");
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let json = serde_json::to_string(&MediaItem::from_url("https://a")).unwrap();
        assert_eq!(json, r#"{"url":"https://a","is_video":false}"#);
    }

    #[tokio::test]
    async fn test_read_items_whole_document() {
        let input: &[u8] = br#"[{"url": "https://a", "is_video": true}, {"url": "https://b"}]"#;
        let items = read_items(input).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_video);
        assert_eq!(items[1].url, "https://b");

        let input: &[u8] = &[0xFF, 0xFE, 0x00];
        assert!(matches!(read_items(input).await, Err(RenderError::Source(_))));
    }

    #[tokio::test]
    async fn test_item_stream_yields_in_order() {
        let input: &[u8] = b"https://a\n\n{\"url\": \"https://b\", \"username\": \"u\"}\nhttps://c\n";
        let items: Vec<_> = item_stream(input).collect().await;
        let urls: Vec<_> = items
            .into_iter()
            .map(|item| item.unwrap().url)
            .collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
    }

    #[tokio::test]
    async fn test_item_stream_stops_after_error() {
        let input: &[u8] = b"https://a\n{broken\nhttps://c\n";
        let items: Vec<_> = item_stream(input).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(RenderError::Source(_))));
    }
}
