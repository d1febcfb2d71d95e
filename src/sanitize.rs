//! Value sanitization: string transforms applied to request data before
//! validation or storage.

/// One sanitization step, applied in the order listed: `trim`,
/// case folding, HTML stripping/escaping, then special-character removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SanitizeStep {
    Trim,
    Lowercase,
    Uppercase,
    RemoveHtml,
    Escape,
    RemoveSpecialChars,
}

/// Applies `steps` to `value` in order.
pub fn sanitize(value: &str, steps: &[SanitizeStep]) -> String {
    let mut out = value.to_string();
    for step in steps {
        out = match step {
            SanitizeStep::Trim => out.trim().to_string(),
            SanitizeStep::Lowercase => out.to_lowercase(),
            SanitizeStep::Uppercase => out.to_uppercase(),
            SanitizeStep::RemoveHtml => remove_html(&out),
            SanitizeStep::Escape => escape_html(&out),
            SanitizeStep::RemoveSpecialChars => remove_special_chars(&out),
        };
    }
    out
}

/// Strips `<...>` tags without interpreting their contents.
fn remove_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for c in value.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// HTML-entity-encodes `& < > " '`.
fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keeps only alphanumerics and whitespace.
fn remove_special_chars(value: &str) -> String {
    value.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect()
}
