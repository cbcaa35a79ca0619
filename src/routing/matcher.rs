//! Route matching logic.
//!
//! # Responsibilities
//! - Match HTTP method (exact, declared methods are uppercased up front)
//! - Match the percent-decoded path against a compiled template and capture
//!   its variables
//! - Match query parameters (first value of a key) and header values
//! - Run registry-provided predicates
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Matchers see only the request head; the body is never touched
//! - Captured variables are written into a per-attempt [`RouteMatch`],
//!   so a failed route leaves nothing behind for the next one
//! - Empty expected value = presence check (query key or header name)

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::header::HeaderName;
use axum::http::request::Parts;

use super::pattern::Template;

/// Variables captured while matching a single route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    pub vars: HashMap<String, String>,
}

impl RouteMatch {
    fn extend(&mut self, vars: Vec<(String, String)>) {
        self.vars.extend(vars);
    }
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Parts, state: &mut RouteMatch) -> bool;
}

/// Matches the request method against an allowed set.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<String>,
}

impl MethodMatcher {
    /// Methods are normalized to uppercase.
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().trim().to_uppercase())
                .collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Parts, _state: &mut RouteMatch) -> bool {
        self.methods.iter().any(|m| m == req.method.as_str())
    }
}

/// Matches the full request path against a template.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    template: Template,
}

impl PathMatcher {
    pub fn new(template: Template) -> Self {
        Self { template }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &Parts, state: &mut RouteMatch) -> bool {
        let raw = req.uri.path();
        // A path that does not decode to UTF-8 is matched as sent.
        let path = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
        match self.template.captures(&path) {
            Some(vars) => {
                state.extend(vars);
                true
            }
            None => false,
        }
    }
}

/// Matches the first value of a query parameter.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    key: String,
    value: Option<Template>,
}

impl QueryMatcher {
    /// `None` only requires the key to be present.
    pub fn new(key: impl Into<String>, value: Option<Template>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl Matcher for QueryMatcher {
    fn matches(&self, req: &Parts, state: &mut RouteMatch) -> bool {
        let Some(query) = req.uri.query() else {
            return false;
        };
        let Some(actual) = url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == self.key.as_str())
            .map(|(_, v)| v.into_owned())
        else {
            return false;
        };

        match &self.value {
            None => true,
            Some(template) => match template.captures(&actual) {
                Some(vars) => {
                    state.extend(vars);
                    true
                }
                None => false,
            },
        }
    }
}

/// Matches a request header value exactly.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<String>,
}

impl HeaderMatcher {
    /// `None` only requires the header to be present.
    pub fn new(name: HeaderName, value: Option<String>) -> Self {
        Self { name, value }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &Parts, _state: &mut RouteMatch) -> bool {
        let mut values = req.headers.get_all(&self.name).iter().peekable();
        match &self.value {
            None => values.peek().is_some(),
            Some(expected) => values.any(|v| v.as_bytes() == expected.as_bytes()),
        }
    }
}

/// A request predicate that can be stored in the component registry.
#[derive(Clone)]
pub struct MatcherFn(Arc<dyn Fn(&Parts, &mut RouteMatch) -> bool + Send + Sync>);

impl MatcherFn {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Parts, &mut RouteMatch) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn call(&self, req: &Parts, state: &mut RouteMatch) -> bool {
        (self.0)(req, state)
    }
}

impl fmt::Debug for MatcherFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MatcherFn(..)")
    }
}

/// Runs a named [`MatcherFn`].
#[derive(Debug, Clone)]
pub struct FnMatcher {
    name: String,
    predicate: MatcherFn,
}

impl FnMatcher {
    pub fn new(name: impl Into<String>, predicate: MatcherFn) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Matcher for FnMatcher {
    fn matches(&self, req: &Parts, state: &mut RouteMatch) -> bool {
        self.predicate.call(req, state)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn push(&mut self, matcher: Box<dyn Matcher>) {
        self.matchers.push(matcher);
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Parts, state: &mut RouteMatch) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(req, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn parts(method: &str, uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[test]
    fn test_method_matcher() {
        let matcher = MethodMatcher::new(["post", " Patch "]);
        let mut state = RouteMatch::default();

        assert!(matcher.matches(&parts("POST", "/", &[]), &mut state));
        assert!(matcher.matches(&parts("PATCH", "/", &[]), &mut state));
        assert!(!matcher.matches(&parts("GET", "/", &[]), &mut state));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathMatcher::new(Template::path("/api/{version}").unwrap());

        let mut state = RouteMatch::default();
        assert!(matcher.matches(&parts("GET", "http://example.com/api/v1", &[]), &mut state));
        assert_eq!(state.vars.get("version").map(String::as_str), Some("v1"));

        let mut state = RouteMatch::default();
        assert!(!matcher.matches(&parts("GET", "http://example.com/images", &[]), &mut state));
        assert!(state.vars.is_empty());
    }

    #[test]
    fn test_path_matcher_decodes_before_matching() {
        let matcher = PathMatcher::new(Template::path("/files/{name:[a-z ]+}").unwrap());

        let mut state = RouteMatch::default();
        assert!(matcher.matches(&parts("GET", "/files/two%20words", &[]), &mut state));
        assert_eq!(state.vars["name"], "two words");

        // not valid UTF-8 once decoded: matched as sent, and the literal `%` fails the pattern
        let mut state = RouteMatch::default();
        assert!(!matcher.matches(&parts("GET", "/files/%FF", &[]), &mut state));
    }

    #[test]
    fn test_query_matcher_uses_first_value() {
        let matcher = QueryMatcher::new("id", Some(Template::query_value("{id:[0-9]+}").unwrap()));

        let mut state = RouteMatch::default();
        assert!(matcher.matches(&parts("GET", "/q?id=42&id=x", &[]), &mut state));
        assert_eq!(state.vars.get("id").map(String::as_str), Some("42"));

        let mut state = RouteMatch::default();
        assert!(!matcher.matches(&parts("GET", "/q?id=x&id=42", &[]), &mut state));
        assert!(!matcher.matches(&parts("GET", "/q", &[]), &mut state));
    }

    #[test]
    fn test_query_matcher_presence() {
        let matcher = QueryMatcher::new("debug", None);
        let mut state = RouteMatch::default();
        assert!(matcher.matches(&parts("GET", "/q?debug=", &[]), &mut state));
        assert!(!matcher.matches(&parts("GET", "/q?other=1", &[]), &mut state));
    }

    #[test]
    fn test_header_matcher() {
        let matcher = HeaderMatcher::new(
            HeaderName::from_static("content-type"),
            Some("text/plain".to_string()),
        );
        let mut state = RouteMatch::default();

        assert!(matcher.matches(
            &parts("GET", "/", &[("Content-Type", "text/plain")]),
            &mut state
        ));
        assert!(!matcher.matches(
            &parts("GET", "/", &[("Content-Type", "application/json")]),
            &mut state
        ));
        assert!(!matcher.matches(&parts("GET", "/", &[]), &mut state));
    }

    #[test]
    fn test_fn_and_and_matchers() {
        let suffix = FnMatcher::new(
            "matcher",
            MatcherFn::new(|req, _| req.uri.path().ends_with("bar")),
        );
        let combined = AndMatcher::new(vec![
            Box::new(MethodMatcher::new(["GET"])),
            Box::new(suffix),
        ]);
        let mut state = RouteMatch::default();

        assert!(combined.matches(&parts("GET", "/foo/bar", &[]), &mut state));
        assert!(!combined.matches(&parts("GET", "/foo/baz", &[]), &mut state));
        assert!(!combined.matches(&parts("POST", "/foo/bar", &[]), &mut state));
    }
}
