//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route whose matchers all pass
//! - Return matched route plus captured variables, or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over routes (acceptable for typical route counts)
//! - Route names are unique; a duplicate is a build error, not a silent shadow

use std::collections::HashSet;

use axum::http::header::HeaderName;
use axum::http::request::Parts;
use thiserror::Error;

use super::matcher::{
    AndMatcher, FnMatcher, HeaderMatcher, Matcher, MatcherFn, MethodMatcher, PathMatcher,
    QueryMatcher, RouteMatch,
};
use super::pattern::{PatternError, Template};

/// Errors raised while building routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A comma-separated key/value declaration has an odd item count.
    #[error("`{key}` declares {count} items; expected key/value pairs")]
    OddPairs { key: &'static str, count: usize },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("invalid header name `{0}`")]
    HeaderName(String),

    #[error("route `{0}` is already registered")]
    DuplicateName(String),
}

/// A compiled route: matchers plus the handler they guard.
#[derive(Debug)]
pub struct Route<H> {
    name: String,
    methods: Vec<String>,
    path: Option<String>,
    queries: Vec<String>,
    matchers: AndMatcher,
    handler: H,
}

impl<H> Route<H> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared methods; empty means any method.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn path_template(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Query templates rendered as `key=value`.
    pub fn query_templates(&self) -> &[String] {
        &self.queries
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Accumulates the conditions of one route.
#[derive(Debug)]
pub struct RouteBuilder {
    name: String,
    methods: Vec<String>,
    path: Option<String>,
    queries: Vec<String>,
    matchers: AndMatcher,
}

impl RouteBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            path: None,
            queries: Vec::new(),
            matchers: AndMatcher::default(),
        }
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let methods: Vec<String> = methods
            .into_iter()
            .map(|m| m.as_ref().trim().to_uppercase())
            .filter(|m| !m.is_empty())
            .collect();
        if !methods.is_empty() {
            self.matchers.push(Box::new(MethodMatcher::new(&methods)));
            self.methods.extend(methods);
        }
        self
    }

    pub fn path(mut self, template: &str) -> Result<Self, RouteError> {
        let compiled = Template::path(template)?;
        self.matchers.push(Box::new(PathMatcher::new(compiled)));
        self.path = Some(template.to_string());
        Ok(self)
    }

    /// An empty value only requires the key to be present.
    pub fn query(mut self, key: &str, value: &str) -> Result<Self, RouteError> {
        let compiled = if value.is_empty() {
            None
        } else {
            Some(Template::query_value(value)?)
        };
        self.matchers.push(Box::new(QueryMatcher::new(key, compiled)));
        self.queries.push(format!("{key}={value}"));
        Ok(self)
    }

    /// An empty value only requires the header to be present.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, RouteError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RouteError::HeaderName(name.to_string()))?;
        let value = (!value.is_empty()).then(|| value.to_string());
        self.matchers.push(Box::new(HeaderMatcher::new(name, value)));
        Ok(self)
    }

    pub fn matcher_fn(mut self, name: &str, predicate: MatcherFn) -> Self {
        self.matchers.push(Box::new(FnMatcher::new(name, predicate)));
        self
    }

    fn build<H>(self, handler: H) -> Route<H> {
        Route {
            name: self.name,
            methods: self.methods,
            path: self.path,
            queries: self.queries,
            matchers: self.matchers,
            handler,
        }
    }
}

/// Ordered route table; first match wins.
#[derive(Debug)]
pub struct Router<H> {
    routes: Vec<Route<H>>,
    names: HashSet<String>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            names: HashSet::new(),
        }
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Routes added earlier take precedence.
    pub fn add(&mut self, builder: RouteBuilder, handler: H) -> Result<(), RouteError> {
        if !self.names.insert(builder.name.clone()) {
            return Err(RouteError::DuplicateName(builder.name));
        }
        self.routes.push(builder.build(handler));
        Ok(())
    }

    /// Find the first route matching the request head.
    pub fn match_request(&self, req: &Parts) -> Option<(&Route<H>, RouteMatch)> {
        self.routes.iter().find_map(|route| {
            let mut state = RouteMatch::default();
            route
                .matchers
                .matches(req, &mut state)
                .then_some((route, state))
        })
    }

    /// Walk all routes in precedence order.
    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
