//! Source admission probe
//!
//! Checks that an HTTP(S) URL is reachable and actually serves video before
//! the demuxer opens it.

use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(8);

const VIDEO_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/x-flv",
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "video/mp2t",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/webm",
];

/// True when the URL responds 200 with a known video content type.
///
/// HEAD first; some servers block HEAD or answer generically, so a GET
/// follows when the content type is missing or HTML.
pub async fn is_video_url(url: &str) -> bool {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(_) => return false,
    };

    let head = client.head(url).send().await;
    let (status, content_type) = match head {
        Ok(response) => (response.status(), content_type_of(&response)),
        Err(_) => (reqwest::StatusCode::NOT_FOUND, String::new()),
    };

    if status.is_success() && is_video_content_type(&content_type) {
        return true;
    }

    if content_type.is_empty() || content_type.contains("text/html") || !status.is_success() {
        if let Ok(response) = client.get(url).send().await {
            let content_type = content_type_of(&response);
            return response.status().is_success() && is_video_content_type(&content_type);
        }
    }

    false
}

fn content_type_of(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase()
}

fn is_video_content_type(content_type: &str) -> bool {
    VIDEO_CONTENT_TYPES
        .iter()
        .any(|known| content_type.contains(known))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_video_content_types() {
        assert!(is_video_content_type("video/mp4"));
        assert!(is_video_content_type("application/vnd.apple.mpegurl"));
        assert!(is_video_content_type("video/mp4; charset=binary"));
    }

    #[test]
    fn test_non_video_content_types() {
        assert!(!is_video_content_type("text/html"));
        assert!(!is_video_content_type("application/json"));
        assert!(!is_video_content_type(""));
    }
}
