//! YouTube links in replies become clickable thumbnails.

use regex::Regex;
use std::sync::LazyLock;

/// Matches watch, short-link, shorts, and embed URLs. Operates on escaped
/// text, so extra query parameters are separated by `&amp;`.
static YOUTUBE_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:www\.|m\.)?(?:youtube\.com/(?:watch\?v=|shorts/|embed/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:(?:\?|&amp;|&)[\w%.-]+=[\w%.-]*)*",
    )
    .ok()
});

/// The 11-character video id in a YouTube URL, if it is one.
pub fn extract_video_id(url: &str) -> Option<String> {
    let re = YOUTUBE_URL.as_ref()?;
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn thumbnail_html(video_id: &str) -> String {
    format!(
        r#"<a class="youtube-link" href="https://www.youtube.com/watch?v={id}" target="_blank" rel="noopener noreferrer"><img class="youtube-thumbnail" src="https://img.youtube.com/vi/{id}/hqdefault.jpg" alt="YouTube video {id}"></a>"#,
        id = video_id
    )
}

/// Replace every YouTube URL in already-escaped text with a thumbnail link.
pub fn linkify(escaped: &str) -> String {
    match YOUTUBE_URL.as_ref() {
        Some(re) if re.is_match(escaped) => re
            .replace_all(escaped, |caps: &regex::Captures| thumbnail_html(&caps[1]))
            .into_owned(),
        _ => escaped.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_variants() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://vimeo.com/12345"), None);
    }

    #[test]
    fn test_linkify_consumes_query_but_not_trailing_text() {
        let out = linkify("see https://www.youtube.com/watch?v=dQw4w9WgXcQ&amp;t=42s now");
        assert!(out.starts_with("see <a class=\"youtube-link\""));
        assert!(out.contains("vi/dQw4w9WgXcQ/hqdefault.jpg"));
        assert!(out.ends_with("</a> now"));
        assert!(!out.contains("t=42s"));
    }

    #[test]
    fn test_linkify_leaves_plain_text() {
        assert_eq!(linkify("no links here"), "no links here");
    }
}
