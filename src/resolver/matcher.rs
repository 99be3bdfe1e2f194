use regex::Regex;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Text test applied to accessible names and element text
///
/// Serialized as a plain string (case-insensitive substring) or as
/// `{ "regex": "<pattern>" }`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "MatcherRepr", into = "MatcherRepr")]
pub enum Matcher {
    /// Case-insensitive substring
    Text(String),
    Pattern(Regex),
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
enum MatcherRepr {
    /// Case-insensitive substring
    Text(String),
    /// Regular expression tested against the text
    Regex { regex: String },
}

impl Matcher {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Compile a regex matcher
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Text(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
            Self::Pattern(re) => re.is_match(haystack),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Pattern(re) => re.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }
}

impl From<&str> for Matcher {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl TryFrom<MatcherRepr> for Matcher {
    type Error = regex::Error;

    fn try_from(repr: MatcherRepr) -> Result<Self, Self::Error> {
        match repr {
            MatcherRepr::Text(text) => Ok(Self::Text(text)),
            MatcherRepr::Regex { regex } => Self::pattern(&regex),
        }
    }
}

impl From<Matcher> for MatcherRepr {
    fn from(matcher: Matcher) -> Self {
        match matcher {
            Matcher::Text(text) => Self::Text(text),
            Matcher::Pattern(re) => Self::Regex {
                regex: re.as_str().to_string(),
            },
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.is_regex() == other.is_regex() && self.as_str() == other.as_str()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "Text({:?})", text),
            Self::Pattern(re) => write!(f, "Pattern(/{}/)", re.as_str()),
        }
    }
}

impl JsonSchema for Matcher {
    fn schema_name() -> Cow<'static, str> {
        "Matcher".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        MatcherRepr::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_case_insensitive_substring() {
        let m = Matcher::text("next");
        assert!(m.is_match("Next page"));
        assert!(m.is_match("NEXT"));
        assert!(!m.is_match("Previous"));
    }

    #[test]
    fn test_pattern() {
        let m = Matcher::pattern(r"^Page \d+$").unwrap();
        assert!(m.is_match("Page 12"));
        assert!(!m.is_match("page 12"));
        assert!(Matcher::pattern("(").is_err());
    }

    #[test]
    fn test_quotes_are_plain_text() {
        let m = Matcher::text(r#"Don't "click""#);
        assert!(m.is_match(r#"Please don't "click" me"#));
    }

    #[test]
    fn test_serde_shapes() {
        let text: Matcher = serde_json::from_str(r#""Next""#).unwrap();
        assert_eq!(text, Matcher::text("Next"));

        let re: Matcher = serde_json::from_str(r#"{"regex":"^Next$"}"#).unwrap();
        assert!(re.is_regex());
        assert_eq!(serde_json::to_string(&re).unwrap(), r#"{"regex":"^Next$"}"#);

        let bad = serde_json::from_str::<Matcher>(r#"{"regex":"("}"#);
        assert!(bad.is_err());
    }
}
