//! `User-Agent` parsing.
//!
//! A small rules table, checked in order — not a full UA database. Good
//! enough for analytics and feature-gating, not for browser sniffing that
//! needs to be exact.

/// Parsed `{browser, os, device, is_mobile, is_bot}` fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: String,
    pub os: String,
    pub device: String,
    pub is_mobile: bool,
    pub is_bot: bool,
}

const BOT_MARKERS: &[&str] = &["bot", "crawler", "spider", "curl", "wget", "postmanruntime", "httpclient"];

const BROWSER_RULES: &[(&str, &str)] = &[
    ("edg/", "Edge"),
    ("opr/", "Opera"),
    ("chrome/", "Chrome"),
    ("crios", "Chrome"),
    ("firefox/", "Firefox"),
    ("fxios", "Firefox"),
    ("safari/", "Safari"),
];

const OS_RULES: &[(&str, &str)] = &[
    ("windows nt", "Windows"),
    ("mac os x", "macOS"),
    ("android", "Android"),
    ("iphone", "iOS"),
    ("ipad", "iOS"),
    ("cros", "Chrome OS"),
    ("linux", "Linux"),
];

/// Parses a raw `User-Agent` header value.
pub fn parse(ua: &str) -> UserAgentInfo {
    let lower = ua.to_ascii_lowercase();

    let is_bot = BOT_MARKERS.iter().any(|marker| lower.contains(marker));
    let is_mobile = lower.contains("mobi") || lower.contains("android") || lower.contains("iphone");

    let browser = BROWSER_RULES
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let os = OS_RULES
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let device = if lower.contains("ipad") || lower.contains("tablet") {
        "Tablet".to_string()
    } else if is_mobile {
        "Mobile".to_string()
    } else {
        "Desktop".to_string()
    };

    UserAgentInfo { browser, os, device, is_mobile, is_bot }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_desktop_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        let info = parse(ua);
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "Windows");
        assert_eq!(info.device, "Desktop");
        assert!(!info.is_mobile);
        assert!(!info.is_bot);
    }

    #[test]
    fn parses_mobile_safari() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Safari/604.1 Mobile/15E148";
        let info = parse(ua);
        assert_eq!(info.os, "iOS");
        assert!(info.is_mobile);
        assert_eq!(info.device, "Mobile");
    }

    #[test]
    fn recognizes_bots() {
        let info = parse("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)");
        assert!(info.is_bot);
    }

    #[test]
    fn recognizes_cli_clients_as_bots() {
        assert!(parse("curl/8.4.0").is_bot);
    }
}
