//! Conditional repair of malformed markup.
//!
//! AEM pages carry tags that are never closed (`<img ...">`, `<input ...>`)
//! and bare `< 0` comparisons inside inline scripts, which a strict XML
//! parser rejects. Which of these appear depends on the AEM version, so a
//! pattern is only substituted when it actually matches.
//!
//! HTML named entities such as `&nbsp;` are undeclared in XML, so they are
//! rewritten as numeric character references before parsing.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, NoExpand, Regex};

/// Known malformed fragments in AEM HTML responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// `<img ...">` without a closing slash
    UnterminatedImg,
    /// `<input ...>` without a closing slash
    UnterminatedInput,
    /// literal `< 0` inside script text
    LessThanZero,
}

impl Malformed {
    pub fn regex(self) -> &'static Regex {
        static IMG: OnceLock<Regex> = OnceLock::new();
        static INPUT: OnceLock<Regex> = OnceLock::new();
        static LT_ZERO: OnceLock<Regex> = OnceLock::new();

        let (cell, pattern) = match self {
            Malformed::UnterminatedImg => (&IMG, r#"<img.+">"#),
            Malformed::UnterminatedInput => (&INPUT, r"<input.+>"),
            Malformed::LessThanZero => (&LT_ZERO, r"< 0"),
        };
        cell.get_or_init(|| Regex::new(pattern).expect("static sanitize pattern"))
    }

    pub fn replacement(self) -> &'static str {
        match self {
            Malformed::UnterminatedImg | Malformed::UnterminatedInput => "",
            Malformed::LessThanZero => "&lt; 0",
        }
    }

    /// Repair every occurrence of this fragment in `body`.
    pub fn strip(self, body: &str) -> Cow<'_, str> {
        sanitize(body, self.regex(), self.replacement())
    }
}

/// Replace every match of `pattern` with `replacement`, but only when the
/// pattern occurs at all. Clean input comes back borrowed and unchanged.
///
/// `replacement` is taken literally (no `$name` expansion).
pub fn sanitize<'a>(body: &'a str, pattern: &Regex, replacement: &str) -> Cow<'a, str> {
    if pattern.is_match(body) {
        pattern.replace_all(body, NoExpand(replacement))
    } else {
        Cow::Borrowed(body)
    }
}

/// Code point of an HTML named entity that XML does not predeclare.
fn html_entity(name: &str) -> Option<u32> {
    let code = match name {
        "nbsp" => 160,
        "laquo" => 171,
        "copy" => 169,
        "reg" => 174,
        "middot" => 183,
        "raquo" => 187,
        "ndash" => 8211,
        "mdash" => 8212,
        "lsquo" => 8216,
        "rsquo" => 8217,
        "ldquo" => 8220,
        "rdquo" => 8221,
        "bull" => 8226,
        "hellip" => 8230,
        "euro" => 8364,
        "trade" => 8482,
        _ => return None,
    };
    Some(code)
}

/// Rewrite known HTML named entities as numeric references (`&nbsp;` to
/// `&#160;`). XML's own entities and unknown names are left as written.
pub fn numeric_entities(body: &str) -> Cow<'_, str> {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    let pattern = ENTITY
        .get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("static entity pattern"));

    pattern.replace_all(body, |caps: &Captures| match html_entity(&caps[1]) {
        Some(code) => format!("&#{};", code),
        None => caps[0].to_string(),
    })
}
