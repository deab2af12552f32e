//! Wildcard path patterns.
//!
//! `*` matches any run of characters (including `/`), `\*` matches a literal
//! asterisk. Matching is case-insensitive and covers the whole path.

use regex::{Regex, RegexBuilder};

use super::AccessControlError;

#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    pub fn new(raw: &str) -> Result<Self, AccessControlError> {
        let mut pattern = String::from("^");
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'*') => {
                    chars.next();
                    pattern.push_str(r"\*");
                }
                '*' => pattern.push_str(".*"),
                other => pattern.push_str(&regex::escape(&other.to_string())),
            }
        }
        pattern.push('$');

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| AccessControlError::InvalidPattern {
                pattern: raw.to_string(),
                source,
            })?;

        Ok(Self {
            raw: raw.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard() {
        let pattern = PathPattern::new("/configs/elasticsearch/*").unwrap();
        assert!(pattern.matches("/configs/elasticsearch/elasticsearch.yml"));
        assert!(pattern.matches("/configs/elasticsearch/nested/jvm.options"));
        assert!(!pattern.matches("/configs/other/x"));
        assert!(!pattern.matches("/prefix/configs/elasticsearch/x"));
    }

    #[test]
    fn test_case_insensitive() {
        let pattern = PathPattern::new("/configs/App.yml").unwrap();
        assert!(pattern.matches("/CONFIGS/app.YML"));
    }

    #[test]
    fn test_anchored_and_literal() {
        let pattern = PathPattern::new("/configs/a.yml").unwrap();
        assert!(!pattern.matches("/configs/a.yml.bak"));
        assert!(!pattern.matches("/configs/axyml"));
    }

    #[test]
    fn test_escaped_asterisk() {
        let pattern = PathPattern::new(r"/configs/\*.yml").unwrap();
        assert!(pattern.matches("/configs/*.yml"));
        assert!(!pattern.matches("/configs/app.yml"));
    }
}
