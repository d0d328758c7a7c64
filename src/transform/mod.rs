//! Text transforms applied to column values before validation.
//!
//! Transforms always run in the fixed order of [`Transform`]'s variants,
//! regardless of the order they were declared in a column's rule list.

pub mod string_ops;

use std::{borrow::Cow, fmt};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Lowercase,
    Uppercase,
    StripTags,
    HtmlEncode,
    StripQuotes,
    UrlEncode,
}

impl Transform {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "lowercase" => Some(Transform::Lowercase),
            "uppercase" => Some(Transform::Uppercase),
            "strip_tags" => Some(Transform::StripTags),
            "htmlentities" | "html_encode" => Some(Transform::HtmlEncode),
            "strip_quotes" => Some(Transform::StripQuotes),
            "urlencode" | "url_encode" => Some(Transform::UrlEncode),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::Lowercase => "lowercase",
            Transform::Uppercase => "uppercase",
            Transform::StripTags => "strip_tags",
            Transform::HtmlEncode => "htmlentities",
            Transform::StripQuotes => "strip_quotes",
            Transform::UrlEncode => "urlencode",
        }
    }

    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            Transform::Lowercase => string_ops::lowercase(value),
            Transform::Uppercase => string_ops::uppercase(value),
            Transform::StripTags => string_ops::strip_tags(value),
            Transform::HtmlEncode => string_ops::html_encode(value),
            Transform::StripQuotes => string_ops::strip_quotes(value),
            Transform::UrlEncode => string_ops::url_encode(value),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs every transform over `value`; `transforms` must already be in evaluation order.
pub fn apply_all(transforms: &[Transform], value: &str) -> String {
    let mut current = value.to_string();
    for transform in transforms {
        current = transform.apply(&current).into_owned();
    }
    current
}
