//! Sanitizers for source-provided strings.
//!
//! Source field values are entered by remote users and may carry markup,
//! control characters, or junk schemes; everything here is
//! strip-don't-escape, shaped for storage rather than rendering.

/// Strip markup and control characters, preserving line breaks.
///
/// Tabs survive; `\r\n` and lone `\r` normalize to `\n`; the result is
/// trimmed.
#[must_use]
pub fn sanitize_text(raw: &str) -> String {
    let stripped = strip_tags(raw);
    let mut out = String::with_capacity(stripped.len());
    let mut chars = stripped.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\n' | '\t' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.trim().to_string()
}

/// Single-line variant of [`sanitize_text`]: whitespace runs collapse to
/// one space.
#[must_use]
pub fn sanitize_line(raw: &str) -> String {
    let text = sanitize_text(raw);
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out.trim().to_string()
}

/// Sanitize a URL for storage.
///
/// Absolute `http(s)` URLs, protocol-relative `//host` forms, and
/// site-relative `/`, `#`, `?` forms pass through (with control
/// characters, quotes, and angle brackets removed and spaces encoded).
/// Bare hostnames get an `http://` prefix. Anything with another scheme
/// (`javascript:`, `data:`, ...) yields an empty string.
#[must_use]
pub fn sanitize_url(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | '"' | '\''))
        .collect();
    let cleaned = cleaned.replace(' ', "%20");
    if cleaned.is_empty() {
        return String::new();
    }

    let lower = cleaned.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || cleaned.starts_with("//") {
        return cleaned;
    }
    if cleaned.starts_with('/') || cleaned.starts_with('#') || cleaned.starts_with('?') {
        return cleaned;
    }
    if has_scheme(&cleaned) {
        return String::new();
    }

    format!("http://{cleaned}")
}

/// Whether the string opens with a scheme-shaped prefix (`name:`).
///
/// Dots are excluded from the prefix charset so `host.tld:8080` reads as
/// a hostname with a port, not a scheme.
fn has_scheme(candidate: &str) -> bool {
    match candidate.find(':') {
        Some(colon) if colon > 0 => candidate[..colon]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-'),
        _ => false,
    }
}

/// Validate and normalize an email address; invalid input yields an
/// empty string.
#[must_use]
pub fn sanitize_email(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();

    let Some((local, domain)) = cleaned.split_once('@') else {
        return String::new();
    };
    if local.is_empty() {
        return String::new();
    }

    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c));
    let domain_ok = domain.contains('.')
        && domain.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    if local_ok && domain_ok {
        cleaned
    } else {
        String::new()
    }
}

/// Remove `<...>` tag spans. A `<` without a closing `>` is kept as-is.
fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
