//! Route templates with named placeholders.
//!
//! # Syntax
//! - Literal text matches itself (regex metacharacters are escaped)
//! - `{name}` captures a variable using the template's default pattern
//! - `{name:regex}` captures a variable using a custom pattern
//! - Braces may nest inside a custom pattern (`{id:[0-9]{2,4}}`)
//!
//! # Design Decisions
//! - Templates compile to one anchored regex at startup; matching never re-parses
//! - Capture groups are named positionally (`v0`, `v1`, ...) so variable names
//!   like `*?` need not be valid regex group names

use regex::Regex;
use thiserror::Error;

/// Default variable pattern inside path templates: one path segment.
pub const PATH_SEGMENT: &str = "[^/]+";

/// Default variable pattern inside query value templates: anything.
pub const ANY_VALUE: &str = ".*";

/// Errors produced while compiling a template.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A `{` without its `}` or a stray `}`.
    #[error("unbalanced braces in template `{0}`")]
    UnbalancedBraces(String),

    /// A placeholder with an empty name, e.g. `{}` or `{:[0-9]+}`.
    #[error("missing variable name in template `{0}`")]
    MissingName(String),

    /// The custom pattern of a placeholder is not a valid regex.
    #[error("invalid pattern for `{name}` in template `{template}`: {source}")]
    Regex {
        template: String,
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    regex: Regex,
    /// (capture group name, variable name)
    vars: Vec<(String, String)>,
}

impl Template {
    /// Compile a path template (`/item/{id}`).
    pub fn path(raw: &str) -> Result<Self, PatternError> {
        Self::parse(raw, PATH_SEGMENT)
    }

    /// Compile a query value template (`{id:[0-9]+}` or a literal value).
    pub fn query_value(raw: &str) -> Result<Self, PatternError> {
        Self::parse(raw, ANY_VALUE)
    }

    fn parse(raw: &str, default_pattern: &str) -> Result<Self, PatternError> {
        let mut expr = String::from("^");
        let mut vars = Vec::new();
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            let literal = &rest[..open];
            if literal.contains('}') {
                return Err(PatternError::UnbalancedBraces(raw.to_string()));
            }
            let close = closing_brace(rest, open)
                .ok_or_else(|| PatternError::UnbalancedBraces(raw.to_string()))?;

            let placeholder = &rest[open + 1..close];
            let (name, pattern) = placeholder
                .split_once(':')
                .unwrap_or((placeholder, default_pattern));
            if name.is_empty() {
                return Err(PatternError::MissingName(raw.to_string()));
            }
            Regex::new(pattern).map_err(|source| PatternError::Regex {
                template: raw.to_string(),
                name: name.to_string(),
                source,
            })?;

            let group = format!("v{}", vars.len());
            expr.push_str(&regex::escape(literal));
            expr.push_str(&format!("(?P<{group}>{pattern})"));
            vars.push((group, name.to_string()));
            rest = &rest[close + 1..];
        }

        if rest.contains('}') {
            return Err(PatternError::UnbalancedBraces(raw.to_string()));
        }
        expr.push_str(&regex::escape(rest));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| PatternError::Regex {
            template: raw.to_string(),
            name: String::new(),
            source,
        })?;

        Ok(Self {
            raw: raw.to_string(),
            regex,
            vars,
        })
    }

    /// The template as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable names in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(_, name)| name.as_str())
    }

    /// Returns true if the whole input matches.
    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    /// Match the whole input and return the captured variables.
    pub fn captures(&self, input: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(input)?;
        Some(
            self.vars
                .iter()
                .filter_map(|(group, name)| {
                    caps.name(group)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

/// Index of the `}` closing the `{` at `open`, honoring nesting.
fn closing_brace(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_path() {
        let t = Template::path("/endpoint1").unwrap();
        assert!(t.is_match("/endpoint1"));
        assert!(!t.is_match("/endpoint1/extra"));
        assert!(!t.is_match("/endpoint"));
    }

    #[test]
    fn test_literal_is_escaped() {
        let t = Template::path("/file.txt").unwrap();
        assert!(t.is_match("/file.txt"));
        assert!(!t.is_match("/fileXtxt"));
    }

    #[test]
    fn test_path_variables() {
        let t = Template::path("/endpoint5/{key}/{*?}").unwrap();
        let vars = t.captures("/endpoint5/foo/bar").unwrap();
        assert_eq!(
            vars,
            vec![
                ("key".to_string(), "foo".to_string()),
                ("*?".to_string(), "bar".to_string()),
            ]
        );
        // default pattern is a single segment
        assert!(t.captures("/endpoint5/foo/bar/baz").is_none());
    }

    #[test]
    fn test_custom_pattern_with_nested_braces() {
        let t = Template::path("/year/{year:[0-9]{4}}").unwrap();
        assert!(t.is_match("/year/2024"));
        assert!(!t.is_match("/year/24"));
        assert_eq!(t.variables().collect::<Vec<_>>(), vec!["year"]);
    }

    #[test]
    fn test_query_value_template() {
        let t = Template::query_value("{id:[0-9]+}").unwrap();
        assert_eq!(
            t.captures("42").unwrap(),
            vec![("id".to_string(), "42".to_string())]
        );
        assert!(t.captures("abc").is_none());

        let literal = Template::query_value("bar").unwrap();
        assert!(literal.is_match("bar"));
        assert!(!literal.is_match("bart"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Template::path("/item/{id"),
            Err(PatternError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            Template::path("/item/id}"),
            Err(PatternError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            Template::path("/item/{:[0-9]+}"),
            Err(PatternError::MissingName(_))
        ));
        assert!(matches!(
            Template::path("/item/{id:[0-9}"),
            Err(PatternError::Regex { .. })
        ));
    }
}
