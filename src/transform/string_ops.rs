use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern compiles"));

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Returns an uppercase representation, avoiding allocation when unnecessary.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

/// Drops anything that looks like a markup tag (`<b>`, `</i>`, `<br/>`).
pub fn strip_tags(input: &str) -> Cow<'_, str> {
    regex_replace(input, &TAG_PATTERN, "")
}

/// Escapes the characters that are significant in HTML text and attributes.
///
/// Only `&`, `<`, `>`, `"` and `'` are replaced. Other characters, non-ASCII
/// included, pass through unchanged since output is always UTF-8.
pub fn html_encode(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }
    let mut encoded = String::with_capacity(input.len() + 16);
    for ch in input.chars() {
        match ch {
            '&' => encoded.push_str("&amp;"),
            '<' => encoded.push_str("&lt;"),
            '>' => encoded.push_str("&gt;"),
            '"' => encoded.push_str("&quot;"),
            '\'' => encoded.push_str("&#039;"),
            other => encoded.push(other),
        }
    }
    Cow::Owned(encoded)
}

/// Removes single and double quote characters.
pub fn strip_quotes(input: &str) -> Cow<'_, str> {
    if input.contains(['"', '\'']) {
        Cow::Owned(input.chars().filter(|ch| !matches!(ch, '"' | '\'')).collect())
    } else {
        Cow::Borrowed(input)
    }
}

/// Form-encodes the value: spaces become `+`, reserved bytes become `%XX`.
pub fn url_encode(input: &str) -> Cow<'_, str> {
    let encoded: String = url::form_urlencoded::byte_serialize(input.as_bytes()).collect();
    if encoded == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(encoded)
    }
}

/// Applies a regex replacement while avoiding allocation when there are no matches.
pub fn regex_replace<'a>(value: &'a str, regex: &Regex, replacement: &str) -> Cow<'a, str> {
    if regex.is_match(value) {
        Cow::Owned(regex.replace_all(value, replacement).to_string())
    } else {
        Cow::Borrowed(value)
    }
}
