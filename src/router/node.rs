//! Radix tree node, segment parsing, and the insertion algorithm.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::BoxedHandler;
use crate::middleware::BoxedMiddleware;

/// The method key under which a handler registered for every method is stored.
pub const ALL_METHODS: &str = "ALL";

/// A single `/`-delimited piece of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    Wildcard,
}

/// Errors [`Router::register`](super::Router::register) can return.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("conflicting parameter name at `{at}`: existing `:{existing}`, new `:{new}`")]
    ConflictingParameterName { at: String, existing: String, new: String },

    #[error("wildcard `*` must be the terminal segment of `{at}`")]
    WildcardNotTerminal { at: String },

    #[error("route template `{0}` must begin with `/`")]
    TemplateMustBeAbsolute(String),
}

/// A registered `{handler, middleware?}` pair for one method on one route.
#[derive(Clone)]
pub struct RouteRecord {
    pub handler: BoxedHandler,
    pub middleware: Option<Vec<BoxedMiddleware>>,
}

/// One node of the radix tree.
///
/// Holds its segment string for diagnostics, a method → record map, a static
/// literal → child map, and at most one parameter child and one wildcard
/// child.
pub struct Node {
    pub segment: String,
    pub methods: HashMap<String, Arc<RouteRecord>>,
    pub static_children: HashMap<String, Node>,
    pub param_child: Option<Box<Node>>,
    pub param_name: Option<String>,
    pub wildcard_child: Option<Box<Node>>,
}

impl Node {
    fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            methods: HashMap::new(),
            static_children: HashMap::new(),
            param_child: None,
            param_name: None,
            wildcard_child: None,
        }
    }

    pub fn root() -> Self {
        Self::new("")
    }

    /// Parses a `/`-prefixed template into its segments. Applied here to a
    /// registration template rather than a request path — both use the
    /// same single-pass split on `/`, empty pieces skipped.
    pub fn parse_template(template: &str) -> Result<Vec<Segment>, RouterError> {
        if !template.starts_with('/') {
            return Err(RouterError::TemplateMustBeAbsolute(template.to_string()));
        }

        let mut segments = Vec::new();
        for raw in template.split('/') {
            if raw.is_empty() {
                continue;
            }
            if raw == "*" {
                segments.push(Segment::Wildcard);
            } else if let Some(name) = raw.strip_prefix(':') {
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Static(raw.to_string()));
            }
        }
        Ok(segments)
    }

    /// Walks/creates nodes for `segments`, installing `record` at the terminal
    /// node under `method` (and under `"ALL"` too, when `method` already is
    /// `"ALL"` or `"*"`).
    pub fn insert(
        &mut self,
        template: &str,
        segments: &[Segment],
        method: &str,
        record: RouteRecord,
    ) -> Result<(), RouterError> {
        let method = if method == "*" { ALL_METHODS } else { method };

        let mut node = self;
        for (i, seg) in segments.iter().enumerate() {
            match seg {
                Segment::Static(s) => {
                    node = node
                        .static_children
                        .entry(s.clone())
                        .or_insert_with(|| Node::new(s.clone()));
                }
                Segment::Param(name) => {
                    if let Some(existing) = &node.param_name {
                        if existing != name {
                            return Err(RouterError::ConflictingParameterName {
                                at: template.to_string(),
                                existing: existing.clone(),
                                new: name.clone(),
                            });
                        }
                    } else {
                        node.param_name = Some(name.clone());
                    }
                    node = node
                        .param_child
                        .get_or_insert_with(|| Box::new(Node::new(format!(":{name}"))));
                }
                Segment::Wildcard => {
                    if i != segments.len() - 1 {
                        return Err(RouterError::WildcardNotTerminal { at: template.to_string() });
                    }
                    node = node.wildcard_child.get_or_insert_with(|| Box::new(Node::new("*")));
                }
            }
        }

        node.methods.insert(method.to_string(), Arc::new(record));
        Ok(())
    }

    /// Walks `segments` with prioritized matching: static > parameter >
    /// wildcard, no backtracking.
    ///
    /// Captured parameters are written into `params`, which the caller
    /// acquires from the [`super::pool::ParamPool`] so a miss never leaks a
    /// partially filled map into the cache.
    pub fn find(
        &self,
        segments: &[&str],
        method: &str,
        params: &mut HashMap<String, String>,
    ) -> Option<Arc<RouteRecord>> {
        let mut node = self;

        for (i, seg) in segments.iter().enumerate() {
            if let Some(child) = node.static_children.get(*seg) {
                node = child;
                continue;
            }
            if let Some(child) = &node.param_child {
                params.insert(node.param_name.clone().unwrap_or_default(), (*seg).to_string());
                node = child;
                continue;
            }
            if let Some(child) = &node.wildcard_child {
                let rest = segments[i..].join("/");
                params.insert("*".to_string(), rest);
                node = child;
                return node.method_record(method);
            }
            return None;
        }

        node.method_record(method)
    }

    /// Resolves `method` at this (terminal) node: exact match, else the
    /// `"ALL"` catch-all, else — boundary behavior — `OPTIONS`/
    /// `HEAD` fall back to a registered `GET`.
    fn method_record(&self, method: &str) -> Option<Arc<RouteRecord>> {
        if let Some(record) = self.methods.get(method) {
            return Some(Arc::clone(record));
        }
        if let Some(record) = self.methods.get(ALL_METHODS) {
            return Some(Arc::clone(record));
        }
        if method == "HEAD" || method == "OPTIONS" {
            return self.methods.get("GET").cloned();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_template() {
        let segs = Node::parse_template("/users/:id/posts/*").unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Static("users".into()),
                Segment::Param("id".into()),
                Segment::Static("posts".into()),
                Segment::Wildcard,
            ]
        );
    }

    #[test]
    fn rejects_relative_template() {
        assert!(Node::parse_template("users/:id").is_err());
    }

    #[test]
    fn rejects_non_terminal_wildcard() {
        let segs = Node::parse_template("/files/*/extra").unwrap();
        let mut root = Node::root();
        let record = RouteRecord { handler: crate::handler::test_support::noop_handler(), middleware: None };
        let err = root.insert("/files/*/extra", &segs, "GET", record).unwrap_err();
        assert!(matches!(err, RouterError::WildcardNotTerminal { .. }));
    }

    #[test]
    fn rejects_conflicting_param_names() {
        let mut root = Node::root();
        let segs_a = Node::parse_template("/users/:id").unwrap();
        let segs_b = Node::parse_template("/users/:slug").unwrap();
        root.insert(
            "/users/:id",
            &segs_a,
            "GET",
            RouteRecord { handler: crate::handler::test_support::noop_handler(), middleware: None },
        )
        .unwrap();

        let err = root
            .insert(
                "/users/:slug",
                &segs_b,
                "POST",
                RouteRecord { handler: crate::handler::test_support::noop_handler(), middleware: None },
            )
            .unwrap_err();
        assert!(matches!(err, RouterError::ConflictingParameterName { .. }));
    }

    fn insert_get(root: &mut Node, template: &str) {
        let segs = Node::parse_template(template).unwrap();
        let record = RouteRecord { handler: crate::handler::test_support::noop_handler(), middleware: None };
        root.insert(template, &segs, "GET", record).unwrap();
    }

    #[test]
    fn static_beats_param_beats_wildcard() {
        let mut root = Node::root();
        insert_get(&mut root, "/users/new");
        insert_get(&mut root, "/users/:id");

        let mut params = HashMap::new();
        let hit = root.find(&["users", "new"], "GET", &mut params);
        assert!(hit.is_some());
        assert!(params.is_empty(), "the static route must win, capturing no parameter");

        let mut params = HashMap::new();
        let hit = root.find(&["users", "7"], "GET", &mut params);
        assert!(hit.is_some());
        assert_eq!(params.get("id"), Some(&"7".to_string()));
    }

    #[test]
    fn wildcard_captures_remaining_segments() {
        let mut root = Node::root();
        insert_get(&mut root, "/files/*");

        let mut params = HashMap::new();
        let hit = root.find(&["files", "a", "b", "c.txt"], "GET", &mut params);
        assert!(hit.is_some());
        assert_eq!(params.get("*"), Some(&"a/b/c.txt".to_string()));
    }

    #[test]
    fn head_and_options_fall_back_to_get() {
        let mut root = Node::root();
        insert_get(&mut root, "/ping");

        let mut params = HashMap::new();
        assert!(root.find(&["ping"], "HEAD", &mut params).is_some());
        assert!(root.find(&["ping"], "OPTIONS", &mut params).is_some());
        assert!(root.find(&["ping"], "DELETE", &mut params).is_none());
    }
}
