//! Handler signature descriptors.
//!
//! Every parameter and return type of a handler method declares a kind.
//! The kinds are recorded at registration so route compilation can log and
//! check a handler's shape without calling it.

use std::fmt;

/// How a value without a built-in kind is converted to or from bytes.
///
/// Precedence when several apply: binary, then text, then the registered
/// serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Binary,
    Text,
    Serializer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Binary => f.write_str("binary"),
            Capability::Text => f.write_str("text"),
            Capability::Serializer => f.write_str("serializer"),
        }
    }
}

/// What a handler parameter binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Request-scoped context (values, deadline, cancellation).
    Context,
    /// The live response writer.
    ResponseWriter,
    /// The full request.
    Request,
    /// Request headers.
    Headers,
    /// A streaming reader over the body.
    Reader,
    /// The fully read body as bytes.
    Bytes,
    /// The fully read body as UTF-8 text.
    Text,
    /// Path and query template variables.
    PathVars,
    /// Query parameters.
    Query,
    /// The body decoded through a capability.
    Body(Capability),
}

impl ParamKind {
    /// Whether binding this parameter reads the request body.
    pub fn consumes_body(self) -> bool {
        matches!(
            self,
            ParamKind::Request | ParamKind::Reader | ParamKind::Bytes | ParamKind::Text | ParamKind::Body(_)
        )
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Body(capability) => write!(f, "Body<{capability}>"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// What a handler return value writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    /// A status code.
    Status,
    /// Headers merged into the response.
    Headers,
    /// A complete body.
    Body,
    /// A stream copied into the body.
    Stream,
    /// A template rendered with the following value.
    Template,
    /// A value encoded through a capability.
    Encoded(Capability),
}

impl ReplyKind {
    /// Terminal kinds end the write; anything after them is skipped.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReplyKind::Status | ReplyKind::Headers)
    }
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyKind::Encoded(capability) => write!(f, "Encoded<{capability}>"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Parameter and return kinds of a handler method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamKind>,
    pub returns: Vec<ReplyKind>,
}

impl Signature {
    pub fn new(params: Vec<ParamKind>, returns: Vec<ReplyKind>) -> Self {
        Self { params, returns }
    }

    /// Number of parameters that read the request body.
    pub fn body_consumers(&self) -> usize {
        self.params.iter().filter(|p| p.consumes_body()).count()
    }

    /// Return positions that can never be written because an earlier one is terminal.
    pub fn unreachable_returns(&self) -> usize {
        self.returns
            .iter()
            .position(|r| r.is_terminal())
            .map(|first| {
                let skip = match self.returns[first] {
                    ReplyKind::Template => 2,
                    _ => 1,
                };
                self.returns.len().saturating_sub(first + skip)
            })
            .unwrap_or(0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(") -> (")?;
        for (i, r) in self.returns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{r}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let sig = Signature::new(
            vec![ParamKind::PathVars, ParamKind::Body(Capability::Serializer)],
            vec![ReplyKind::Headers, ReplyKind::Status, ReplyKind::Encoded(Capability::Text)],
        );
        assert_eq!(
            sig.to_string(),
            "(PathVars, Body<serializer>) -> (Headers, Status, Encoded<text>)"
        );
    }

    #[test]
    fn test_body_consumers() {
        let sig = Signature::new(
            vec![ParamKind::Context, ParamKind::Text, ParamKind::Bytes, ParamKind::Headers],
            vec![],
        );
        assert_eq!(sig.body_consumers(), 2);
    }

    #[test]
    fn test_unreachable_returns() {
        let sig = Signature::new(vec![], vec![ReplyKind::Status, ReplyKind::Body, ReplyKind::Status]);
        assert_eq!(sig.unreachable_returns(), 1);

        let sig = Signature::new(
            vec![],
            vec![ReplyKind::Template, ReplyKind::Encoded(Capability::Serializer)],
        );
        assert_eq!(sig.unreachable_returns(), 0);

        let sig = Signature::new(vec![], vec![ReplyKind::Headers, ReplyKind::Status]);
        assert_eq!(sig.unreachable_returns(), 0);
    }
}
