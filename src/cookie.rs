//! Cookie parsing, serialization, and HMAC signing.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `Set-Cookie`'s `SameSite` attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// `cookie(name, value, opts?)` options. Any field left `None`
/// falls back to the production-mode-aware default described there.
#[derive(Clone, Debug, Default)]
pub struct CookieOptions {
    pub max_age: Option<i64>,
    pub expires: Option<jiff::Timestamp>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    pub same_site: Option<SameSite>,
}

/// Builds the `Set-Cookie` header value for `name=value`, or `None` if
/// `name` contains characters RFC 6265 forbids in a cookie-name token —
/// reserved characters cause a validation failure rather than a silent
/// mangling of the header.
pub fn serialize(name: &str, value: &str, opts: &CookieOptions, production: bool) -> Option<String> {
    if !is_valid_cookie_name(name) {
        return None;
    }

    let mut out = format!("{name}={}", percent_encode(value));

    if let Some(max_age) = opts.max_age {
        out.push_str(&format!("; Max-Age={max_age}"));
    }
    if let Some(expires) = &opts.expires {
        out.push_str(&format!("; Expires={}", expires.strftime("%a, %d %b %Y %H:%M:%S GMT")));
    }
    out.push_str(&format!("; Path={}", opts.path.as_deref().unwrap_or("/")));
    if let Some(domain) = &opts.domain {
        out.push_str(&format!("; Domain={domain}"));
    }

    let secure = opts.secure.unwrap_or(production);
    let http_only = opts.http_only.unwrap_or(production);
    let same_site = opts.same_site.unwrap_or(if production { SameSite::Strict } else { SameSite::Lax });

    if secure {
        out.push_str("; Secure");
    }
    if http_only {
        out.push_str("; HttpOnly");
    }
    out.push_str(&format!("; SameSite={}", same_site.as_str()));

    Some(out)
}

/// `clearCookie(name, opts?)`: a `Set-Cookie` that expires the cookie
/// immediately.
pub fn serialize_clear(name: &str, opts: &CookieOptions, production: bool) -> Option<String> {
    let mut opts = opts.clone();
    opts.max_age = Some(0);
    opts.expires = jiff::Timestamp::from_second(0).ok();
    serialize(name, "", &opts, production)
}

/// Parses a `Cookie` request header: splits on `;`, trims, URL-decodes
/// values, and skips malformed entries.
pub fn parse(header: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in header.split(';') {
        let pair = pair.trim();
        let Some((name, value)) = pair.split_once('=') else { continue };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        map.insert(name.to_string(), percent_decode(value.trim()));
    }
    map
}

fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}')
        })
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""), 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `sign(value, secret)` — `value.base64url(hmac-sha256)`.
pub fn sign(value: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(value.as_bytes());
    let sig = mac.finalize().into_bytes();
    format!("{value}.{}", URL_SAFE_NO_PAD.encode(sig))
}

/// `unsign(signed, secret)` — constant-time verified via [`hmac::Mac::verify_slice`].
/// Returns `None` on a malformed or tampered signature.
pub fn unsign(signed: &str, secret: &str) -> Option<String> {
    let (value, sig_b64) = signed.rsplit_once('.')?;
    let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(value.as_bytes());
    mac.verify_slice(&sig).ok()?;
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_tolerates_malformed_entries() {
        let parsed = parse("a=1; b=2 %26 3; ; =orphan; c=hello%20world");
        assert_eq!(parsed.get("a").map(String::as_str), Some("1"));
        assert_eq!(parsed.get("b").map(String::as_str), Some("2 & 3"));
        assert_eq!(parsed.get("c").map(String::as_str), Some("hello world"));
        assert!(!parsed.contains_key(""));
    }

    #[test]
    fn production_defaults_are_locked_down() {
        let out = serialize("sid", "abc", &CookieOptions::default(), true).unwrap();
        assert!(out.contains("Secure"));
        assert!(out.contains("HttpOnly"));
        assert!(out.contains("SameSite=Strict"));
    }

    #[test]
    fn invalid_name_is_rejected() {
        assert!(serialize("bad name", "v", &CookieOptions::default(), false).is_none());
        assert!(serialize("bad;name", "v", &CookieOptions::default(), false).is_none());
    }

    #[test]
    fn sign_and_unsign_round_trip() {
        let signed = sign("user-42", "secret");
        assert_eq!(unsign(&signed, "secret"), Some("user-42".to_string()));
    }

    #[test]
    fn tampered_signature_fails() {
        let mut signed = sign("user-42", "secret");
        signed.push('x');
        assert_eq!(unsign(&signed, "secret"), None);
        assert_eq!(unsign(&signed, "wrong-secret"), None);
    }
}
