//! Declarative route metadata attached to endpoint components.
//!
//! Each key is optional and holds a single string:
//! - `methods`: comma-separated HTTP methods, case-insensitive
//! - `path`: a path template (required for a routable endpoint)
//! - `queries`: comma-separated key/value list, values may be templates
//! - `headers`: comma-separated name/value list
//! - `matcher`: registry id of a [`MatcherFn`](super::MatcherFn)

use super::router::RouteError;

/// Route declaration for an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSpec {
    pub methods: Option<String>,
    pub path: Option<String>,
    pub queries: Option<String>,
    pub headers: Option<String>,
    pub matcher: Option<String>,
}

impl RouteSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn methods(mut self, methods: impl Into<String>) -> Self {
        self.methods = Some(methods.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn queries(mut self, queries: impl Into<String>) -> Self {
        self.queries = Some(queries.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<String>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn matcher(mut self, matcher: impl Into<String>) -> Self {
        self.matcher = Some(matcher.into());
        self
    }

    /// Declared methods, trimmed and uppercased.
    pub fn method_list(&self) -> Vec<String> {
        self.methods
            .as_deref()
            .map(|methods| {
                methods
                    .split(',')
                    .map(|m| m.trim().to_uppercase())
                    .filter(|m| !m.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, RouteError> {
        self.queries
            .as_deref()
            .map(|q| split_pairs("queries", q))
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    pub fn header_pairs(&self) -> Result<Vec<(String, String)>, RouteError> {
        self.headers
            .as_deref()
            .map(|h| split_pairs("headers", h))
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Split `k1,v1,k2,v2` into pairs. Commas inside `{...}` belong to the template.
fn split_pairs(key: &'static str, value: &str) -> Result<Vec<(String, String)>, RouteError> {
    let items = split_top_level(value);
    if items.len() % 2 != 0 {
        return Err(RouteError::OddPairs {
            key,
            count: items.len(),
        });
    }
    Ok(items
        .chunks(2)
        .map(|pair| (pair[0].trim().to_string(), pair[1].trim().to_string()))
        .collect())
}

fn split_top_level(value: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&value[start..]);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_list() {
        let spec = RouteSpec::new().methods("post, patch");
        assert_eq!(spec.method_list(), vec!["POST", "PATCH"]);
        assert!(RouteSpec::new().method_list().is_empty());
    }

    #[test]
    fn test_query_pairs() {
        let spec = RouteSpec::new().queries("foo,bar,id,{id:[0-9]+}");
        assert_eq!(
            spec.query_pairs().unwrap(),
            vec![
                ("foo".to_string(), "bar".to_string()),
                ("id".to_string(), "{id:[0-9]+}".to_string()),
            ]
        );
    }

    #[test]
    fn test_commas_inside_templates() {
        let spec = RouteSpec::new().queries("year,{year:[0-9]{2,4}}");
        assert_eq!(
            spec.query_pairs().unwrap(),
            vec![("year".to_string(), "{year:[0-9]{2,4}}".to_string())]
        );
    }

    #[test]
    fn test_odd_pairs_rejected() {
        let spec = RouteSpec::new().headers("Content-Type");
        assert!(matches!(
            spec.header_pairs(),
            Err(RouteError::OddPairs { key: "headers", count: 1 })
        ));
    }
}
