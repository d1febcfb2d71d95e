//! Content-type aliases, extension → MIME mapping, and `Accept` negotiation
//! for `Request::is`/`Request::accepts`.

/// Recognizes the short aliases `Request::is` accepts, like `"json"` or
/// `"html"`, against a raw `Content-Type` header value.
pub fn alias_matches(content_type: &str, alias: &str) -> bool {
    let ct = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match alias {
        "json" => ct == "application/json" || ct.ends_with("+json"),
        "html" => ct == "text/html",
        "xml" => ct == "application/xml" || ct == "text/xml" || ct.ends_with("+xml"),
        "text" => ct.starts_with("text/"),
        "form" => ct == "application/x-www-form-urlencoded",
        "multipart" => ct.starts_with("multipart/"),
        other => ct == other,
    }
}

/// The MIME type `alias` maps to, for building an `Accept` comparison and for
/// setting `Content-Type` from a short name.
pub fn alias_to_mime(alias: &str) -> &'static str {
    match alias {
        "json" => "application/json",
        "html" => "text/html; charset=utf-8",
        "xml" => "application/xml",
        "text" => "text/plain; charset=utf-8",
        "form" => "application/x-www-form-urlencoded",
        "multipart" => "multipart/form-data",
        _ => "application/octet-stream",
    }
}

/// Returns the first of `types` whose MIME maps into the `accept` header's
/// accepted set, or `None` if `*/*` is absent and nothing matches.
pub fn negotiate<'a>(accept: &str, types: &[&'a str]) -> Option<&'a str> {
    let accept = accept.to_ascii_lowercase();
    let wildcard = accept.split(',').any(|p| p.trim().starts_with("*/*"));

    for ty in types {
        let mime = alias_to_mime(ty);
        let mime_type = mime.split(';').next().unwrap_or(mime);
        let (major, _) = mime_type.split_once('/').unwrap_or((mime_type, ""));

        let matches = accept.split(',').any(|part| {
            let part = part.split(';').next().unwrap_or("").trim();
            part == mime_type || part == format!("{major}/*")
        });

        if matches {
            return Some(ty);
        }
    }

    if wildcard { types.first().copied() } else { None }
}

/// Maps a file extension (without the leading dot) to a MIME type for
/// `sendFile`/`download`. Grounded on the same technique
/// `eze-works-vintage`'s static file pipe uses, trimmed to common web types.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_aliases() {
        assert!(alias_matches("application/json; charset=utf-8", "json"));
        assert!(alias_matches("multipart/form-data; boundary=x", "multipart"));
        assert!(!alias_matches("text/plain", "json"));
    }

    #[test]
    fn negotiates_first_acceptable() {
        let accept = "text/html, application/json;q=0.9";
        assert_eq!(negotiate(accept, &["xml", "json"]), Some("json"));
        assert_eq!(negotiate("application/xml", &["json", "html"]), None);
        assert_eq!(negotiate("*/*", &["json", "html"]), Some("json"));
    }

    #[test]
    fn extension_mime_lookup() {
        assert_eq!(mime_for_extension("PNG"), "image/png");
        assert_eq!(mime_for_extension("unknown-ext"), "application/octet-stream");
    }
}
