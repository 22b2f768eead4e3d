use std::ops::Range;

use ::weggli::builder::build_query_tree;
use ::weggli::query::QueryTree;
use ::weggli::RegexMap;
use tree_sitter::{Node, Tree};

use crate::error::SearchError;
use crate::model::Dialect;
use crate::query::{MatchResult, QueryFrontend, VariableConstraints};

/// Node kinds a query may be rooted in. Anything else gets wrapped in `{}`.
const QUERY_ROOT_KINDS: &[&str] = &[
    "compound_statement",
    "function_definition",
    "struct_specifier",
    "enum_specifier",
    "union_specifier",
    "class_specifier",
];

/// [`QueryFrontend`] backed by the weggli structural matcher.
#[derive(Debug, Clone, Default)]
pub struct WeggliFrontend {
    force: bool,
    constraints: VariableConstraints,
}

/// Parsed weggli query together with the dialect its text must be parsed in.
pub struct WeggliQuery {
    tree: QueryTree,
    dialect: Dialect,
}

impl std::fmt::Debug for WeggliQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeggliQuery").field("dialect", &self.dialect).finish_non_exhaustive()
    }
}

impl WeggliFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept patterns that contain syntax errors.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn constraints(mut self, constraints: VariableConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    fn build(&self, pattern: &str, cpp: bool) -> Result<QueryTree, String> {
        let (normalized, tree) = normalize_pattern(pattern, cpp);
        if tree.root_node().has_error() && !self.force {
            return Err(syntax_error_message(&tree, &normalized));
        }
        let regexes =
            (!self.constraints.is_empty()).then(|| RegexMap::new(self.constraints.to_map()));
        let mut cursor = tree.walk();
        Ok(build_query_tree(&normalized, &mut cursor, cpp, regexes))
    }
}

/// Parse `pattern`, completing a missing trailing `;` and wrapping bare
/// statements in `{}` when that yields a clean parse.
fn normalize_pattern(pattern: &str, cpp: bool) -> (String, Tree) {
    let mut text = pattern.to_string();
    let mut tree = ::weggli::parse(&text, cpp);

    if tree.root_node().has_error() && !text.ends_with(';') {
        let candidate = format!("{text};");
        let fixed = ::weggli::parse(&candidate, cpp);
        if !fixed.root_node().has_error() {
            log::debug!("normalizing query: add missing ;");
            text = candidate;
            tree = fixed;
        }
    }

    let needs_braces = !tree.root_node().has_error()
        && tree.root_node().child(0).is_some_and(|n| !QUERY_ROOT_KINDS.contains(&n.kind()));
    if needs_braces {
        let candidate = format!("{{{text}}}");
        let fixed = ::weggli::parse(&candidate, cpp);
        if !fixed.root_node().has_error() {
            log::debug!("normalizing query: add {{}}");
            text = candidate;
            tree = fixed;
        }
    }
    (text, tree)
}

fn syntax_error_message(tree: &Tree, pattern: &str) -> String {
    match first_error(tree.root_node()) {
        Some(node) if node.is_missing() => format!(
            "Query parsing failed: missing {} after `{}`",
            node.kind(),
            &pattern[..node.start_byte()]
        ),
        Some(node) => format!(
            "Query parsing failed: unexpected `{}` after `{}`",
            &pattern[node.byte_range()],
            &pattern[..node.start_byte()]
        ),
        None => "Query parsing failed".to_string(),
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error);
    found
}

/// Byte range of the function definition enclosing `offset`, if any.
fn enclosing_function(root: Node<'_>, offset: usize) -> Option<Range<usize>> {
    let mut node = root.descendant_for_byte_range(offset, offset);
    while let Some(n) = node {
        if n.kind() == "function_definition" {
            return Some(n.byte_range());
        }
        node = n.parent();
    }
    None
}

impl QueryFrontend for WeggliFrontend {
    type Query = WeggliQuery;

    fn parse(&self, pattern: &str, dialect: Dialect) -> Result<WeggliQuery, SearchError> {
        let tree = match self.build(pattern, dialect.is_cpp()) {
            Ok(tree) => tree,
            Err(message) => {
                let valid_in_cpp = !dialect.is_cpp() && self.build(pattern, true).is_ok();
                return Err(SearchError::QuerySyntax { message, valid_in_cpp });
            }
        };

        let known = tree.variables();
        if let Some(var) = self.constraints.variables().find(|v| !known.contains(*v)) {
            return Err(SearchError::UnknownVariable(var.clone()));
        }
        log::debug!("parsed query {pattern:?} ({} variables)", known.len());
        Ok(WeggliQuery { tree, dialect })
    }

    fn identifiers(&self, query: &WeggliQuery) -> Vec<String> {
        query.tree.identifiers()
    }

    fn find_matches(&self, query: &WeggliQuery, text: &str) -> Vec<MatchResult> {
        let source = ::weggli::parse(text, query.dialect.is_cpp());
        query
            .tree
            .matches(source.root_node(), text)
            .into_iter()
            .map(|m| {
                let spans: Vec<_> = m.captures.iter().map(|c| c.range.clone()).collect();
                let vars = m
                    .vars
                    .iter()
                    .filter_map(|(var, idx)| Some((var.clone(), spans.get(*idx)?.clone())))
                    .collect();
                let start = m.start_offset();
                MatchResult {
                    start,
                    function: enclosing_function(source.root_node(), start),
                    spans,
                    vars,
                }
            })
            .collect()
    }
}
