use std::collections::BTreeSet;

/// Longest title MediaWiki accepts, in bytes.
pub const MAX_TITLE_BYTES: usize = 255;

const ILLEGAL_TITLE_CHARS: &[char] = &['#', '<', '>', '[', ']', '|', '{', '}'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleProblem {
    Empty,
    IllegalCharacter(char),
    UrlEscape,
    RelativePath,
    Signature,
    TooLong(usize),
    Interwiki(String),
}

/// Title well-formedness rules for the target wiki, including the prefixes
/// that would turn a title into an interwiki (external) link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleRules {
    interwiki_prefixes: BTreeSet<String>,
}

impl TitleRules {
    pub fn new<I, S>(interwiki_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let interwiki_prefixes = interwiki_prefixes
            .into_iter()
            .map(|prefix| prefix.as_ref().trim().to_lowercase())
            .filter(|prefix| !prefix.is_empty())
            .collect();
        Self { interwiki_prefixes }
    }

    /// Normalize `raw` and check it is a title the target wiki can hold locally.
    pub fn parse(&self, raw: &str) -> Result<String, TitleProblem> {
        let title = normalize_title(raw);
        let title = title
            .strip_prefix(':')
            .map(str::trim)
            .unwrap_or(title.as_str())
            .to_string();
        if title.is_empty() {
            return Err(TitleProblem::Empty);
        }
        if let Some(ch) = title
            .chars()
            .find(|ch| ILLEGAL_TITLE_CHARS.contains(ch) || ch.is_control())
        {
            return Err(TitleProblem::IllegalCharacter(ch));
        }
        if has_url_escape(&title) {
            return Err(TitleProblem::UrlEscape);
        }
        if is_relative_path(&title) {
            return Err(TitleProblem::RelativePath);
        }
        if title.contains("~~~") {
            return Err(TitleProblem::Signature);
        }
        if title.len() > MAX_TITLE_BYTES {
            return Err(TitleProblem::TooLong(title.len()));
        }
        if let Some((prefix, _)) = title.split_once(':') {
            let prefix = prefix.trim().to_lowercase();
            if self.interwiki_prefixes.contains(&prefix) {
                return Err(TitleProblem::Interwiki(prefix));
            }
        }
        Ok(title)
    }

    pub fn is_valid(&self, raw: &str) -> bool {
        self.parse(raw).is_ok()
    }
}

/// Underscores become spaces, whitespace runs collapse, ends are trimmed.
pub fn normalize_title(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_url_escape(title: &str) -> bool {
    let bytes = title.as_bytes();
    bytes.windows(3).any(|window| {
        window[0] == b'%' && window[1].is_ascii_hexdigit() && window[2].is_ascii_hexdigit()
    })
}

fn is_relative_path(title: &str) -> bool {
    title == "."
        || title == ".."
        || title.starts_with("./")
        || title.starts_with("../")
        || title.contains("/./")
        || title.contains("/../")
        || title.ends_with("/.")
        || title.ends_with("/..")
}
