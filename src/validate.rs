//! Validation of an XML document tree against an RNG pattern tree.
//!
//! The matcher is a direct recursive function over a pattern list and a
//! context of remaining children and attributes. Backtracking is a pure
//! try-in-order with context snapshots; nothing in the document is mutated
//! during a try except committed element annotations. A reported mismatch
//! marks the outcome not-ok and matching continues with the remaining
//! patterns, so a single run surfaces as many distinct problems as possible.
//! "Plausible" (`true`) means the shape could be matched; the tree may still
//! carry diagnostics.

use std::collections::{BTreeMap, HashMap};

use crate::{
    ast::{NodeKind, PatternTree},
    error::RngError,
    xml::{XmlDocument, XmlNodeKind},
};

// The diagnostic vocabulary. Annotations are exactly these strings.

fn expected_text(found: &str) -> String {
    format!("Expected text but found {found}")
}

fn no_text() -> String {
    "Unexpected text in element".to_owned()
}

fn expected_element(name: &str, found: &str) -> String {
    format!("Expected element {name} but found {found}")
}

fn expected_attribute(name: &str) -> String {
    format!("Expected attribute: {name}")
}

fn expected_attribute_text(name: &str, found: &str) -> String {
    format!("Expected attribute value for {name} to be text but was {found}")
}

fn no_children(count: usize) -> String {
    format!("Expected no contents but found {count} children")
}

fn unexpected_element(name: &str) -> String {
    format!("Unexpected element: {name}")
}

fn unexpected_attribute(name: &str) -> String {
    format!("Unexpected attribute: {name}")
}

fn no_match() -> String {
    "Could not find matching choice".to_owned()
}

/// Remaining children and attributes of the element currently being matched.
#[derive(Debug, Clone)]
struct Context {
    children: Vec<usize>,
    attributes: BTreeMap<String, String>,
}

impl Context {
    /// Whether matching `self` down to `after` consumed anything. Guards the
    /// repetition combinators against non-advancing iterations.
    fn advanced_to(&self, after: &Context) -> bool {
        after.children.len() < self.children.len()
            || after.attributes.len() < self.attributes.len()
    }
}

struct Outcome {
    ok: bool,
    problems: Vec<String>,
    remaining: Context,
}

impl Outcome {
    fn passed(remaining: Context) -> Self {
        Self {
            ok: true,
            problems: vec![],
            remaining,
        }
    }
}

/// Matches document subtrees against patterns, annotating problematic nodes.
///
/// The validator caches the grammar's define table and `start` pattern on
/// construction and never mutates the pattern tree.
pub struct Validator<'a> {
    tree: &'a PatternTree,
    defines: HashMap<&'a str, usize>,
    start: Option<usize>,
}

impl<'a> Validator<'a> {
    pub fn new(grammar: &'a PatternTree) -> Result<Self, RngError> {
        if grammar.nodes.is_empty() {
            return Err(RngError::start_not_found());
        }

        let root = grammar.root();
        if !matches!(grammar.kind(root), NodeKind::Grammar) {
            // a bare pattern tree: the root itself is the start pattern
            return Ok(Self {
                tree: grammar,
                defines: HashMap::new(),
                start: Some(root),
            });
        }

        let mut defines = HashMap::new();
        let mut start = None;
        for &ch in grammar.children(root) {
            match grammar.kind(ch) {
                NodeKind::Start(_) => {
                    if start.is_none() {
                        start = grammar.children(ch).first().copied();
                    }
                }
                NodeKind::Define { name, .. } => {
                    defines.insert(name.as_ref(), ch);
                }
                _ => {}
            }
        }
        if start.is_none() {
            return Err(RngError::start_not_found());
        }
        Ok(Self {
            tree: grammar,
            defines,
            start,
        })
    }

    /// Match the document root against the `start` pattern. Returns the
    /// plausibility verdict; diagnostics land on the document's nodes.
    pub fn validate(&self, document: &mut XmlDocument) -> Result<bool, RngError> {
        let start = self.start.ok_or_else(RngError::start_not_found)?;
        let root = document.root();
        self.validate_node(document, root, start)
    }

    /// Match a single target node against a single pattern, annotating the
    /// tree. Outermost mismatches attach to the target itself.
    pub fn validate_node(
        &self,
        document: &mut XmlDocument,
        target: usize,
        pattern: usize,
    ) -> Result<bool, RngError> {
        let context = Context {
            children: vec![target],
            attributes: BTreeMap::new(),
        };
        let outcome = self.match_patterns(document, context, &[pattern])?;

        let mut ok = outcome.ok;
        let mut reports = outcome.problems;
        for &leftover in &outcome.remaining.children {
            match document.node(leftover).kind {
                XmlNodeKind::Element { ref name, .. } => {
                    ok = false;
                    reports.push(unexpected_element(name));
                }
                XmlNodeKind::Text(_) => {
                    ok = false;
                    reports.push(no_text());
                }
                XmlNodeKind::Other => {}
            }
        }
        for name in outcome.remaining.attributes.keys() {
            ok = false;
            reports.push(unexpected_attribute(name));
        }
        for report in reports {
            document.add_problem(target, report);
        }
        Ok(ok)
    }

    /// The core matcher: dispatch on the head pattern, thread the rest.
    fn match_patterns(
        &self,
        document: &mut XmlDocument,
        context: Context,
        patterns: &[usize],
    ) -> Result<Outcome, RngError> {
        let Some((&head, rest)) = patterns.split_first() else {
            return Ok(Outcome::passed(context));
        };

        match self.tree.kind(head) {
            NodeKind::Empty => {
                if context.children.is_empty() {
                    self.match_patterns(document, context, rest)
                } else {
                    let problem = no_children(context.children.len());
                    self.report_and_continue(document, context, rest, problem)
                }
            }
            // datatype semantics are out of scope; value and data match like
            // text, shape only
            NodeKind::Text | NodeKind::Value(_) | NodeKind::Data(_) => {
                match context.children.first().copied() {
                    Some(head_child) if document.is_text(head_child) => {
                        let mut context = context;
                        context.children.remove(0);
                        self.match_patterns(document, context, rest)
                    }
                    found => {
                        let found = found.map_or_else(
                            || "nothing".to_owned(),
                            |ch| document.describe(ch).to_owned(),
                        );
                        let problem = expected_text(&found);
                        self.report_and_continue(document, context, rest, problem)
                    }
                }
            }
            NodeKind::NotAllowed => Ok(Outcome {
                ok: false,
                problems: vec![],
                remaining: context,
            }),
            NodeKind::Element(_) => self.match_element(document, context, head, rest),
            NodeKind::Attribute(_) => self.match_attribute(document, context, head, rest),
            NodeKind::Ref(name) => {
                let &define = self
                    .defines
                    .get(name.as_ref())
                    .ok_or_else(|| RngError::unknown_definition(name))?;
                let spliced: Vec<usize> = self
                    .tree
                    .children(define)
                    .iter()
                    .chain(rest)
                    .copied()
                    .collect();
                self.match_patterns(document, context, &spliced)
            }
            NodeKind::Group => {
                let spliced: Vec<usize> = self
                    .tree
                    .children(head)
                    .iter()
                    .chain(rest)
                    .copied()
                    .collect();
                self.match_patterns(document, context, &spliced)
            }
            NodeKind::Optional => {
                let spliced: Vec<usize> = self
                    .tree
                    .children(head)
                    .iter()
                    .chain(rest)
                    .copied()
                    .collect();
                let attempt = self.match_patterns(document, context.clone(), &spliced)?;
                if attempt.ok {
                    Ok(attempt)
                } else {
                    // the skipped branch's problems are discarded
                    self.match_patterns(document, context, rest)
                }
            }
            NodeKind::Choice => {
                for &alternative in self.tree.children(head) {
                    let mut branch = vec![alternative];
                    branch.extend_from_slice(rest);
                    let attempt = self.match_patterns(document, context.clone(), &branch)?;
                    if attempt.ok {
                        return Ok(attempt);
                    }
                }
                Ok(Outcome {
                    ok: false,
                    problems: vec![no_match()],
                    remaining: context,
                })
            }
            NodeKind::ZeroOrMore => {
                let inner = self.tree.children(head);
                let once = self.match_patterns(document, context.clone(), inner)?;
                if once.ok && context.advanced_to(&once.remaining) {
                    let mut again = vec![head];
                    again.extend_from_slice(rest);
                    let more = self.match_patterns(document, once.remaining.clone(), &again)?;
                    if more.ok {
                        let mut problems = once.problems;
                        problems.extend(more.problems);
                        return Ok(Outcome {
                            ok: true,
                            problems,
                            remaining: more.remaining,
                        });
                    }
                }
                self.match_patterns(document, context, rest)
            }
            NodeKind::OneOrMore => {
                let inner = self.tree.children(head);
                let first = self.match_patterns(document, context.clone(), inner)?;
                if !first.ok {
                    // the mandatory iteration failed; its problems are kept
                    // and matching continues with the remaining patterns
                    let after = self.match_patterns(document, first.remaining, rest)?;
                    let mut problems = first.problems;
                    problems.extend(after.problems);
                    return Ok(Outcome {
                        ok: false,
                        problems,
                        remaining: after.remaining,
                    });
                }
                if context.advanced_to(&first.remaining) {
                    // greedy: prefer another iteration over the tail
                    let mut again = vec![head];
                    again.extend_from_slice(rest);
                    let more = self.match_patterns(document, first.remaining.clone(), &again)?;
                    if more.ok {
                        let mut problems = first.problems;
                        problems.extend(more.problems);
                        return Ok(Outcome {
                            ok: true,
                            problems,
                            remaining: more.remaining,
                        });
                    }
                }
                let after = self.match_patterns(document, first.remaining, rest)?;
                let mut problems = first.problems;
                problems.extend(after.problems);
                Ok(Outcome {
                    ok: after.ok,
                    problems,
                    remaining: after.remaining,
                })
            }
            NodeKind::Interleave | NodeKind::Mixed => Err(RngError::unsupported_pattern(
                "interleave matching is not implemented",
            )),
            NodeKind::ParentRef(_) => Err(RngError::unsupported_pattern(
                "parentRef must be resolved before validation",
            )),
            kind => Err(RngError::unexpected_node_kind(kind.kind_name())),
        }
    }

    fn match_element(
        &self,
        document: &mut XmlDocument,
        context: Context,
        head: usize,
        rest: &[usize],
    ) -> Result<Outcome, RngError> {
        let (name, inner_patterns) = self.element_parts(head)?;

        let head_child = context.children.first().copied();
        let Some(child) = head_child.filter(|&ch| document.is_element(ch)) else {
            let found = head_child.map_or_else(
                || "nothing".to_owned(),
                |ch| document.describe(ch).to_owned(),
            );
            let problem = expected_element(name, &found);
            return self.report_and_continue(document, context, rest, problem);
        };

        let (child_name, attributes, children) = document.element_parts(child);
        if child_name != name {
            let problem = expected_element(name, &child_name);
            return self.report_and_continue(document, context, rest, problem);
        }

        // commit: the shape matched, so the element's interior diagnostics
        // are written to it regardless of the overall outcome
        let inner_context = Context {
            children,
            attributes,
        };
        let inner = self.match_patterns(document, inner_context, inner_patterns)?;
        let mut annotations = inner.problems;
        for &leftover in &inner.remaining.children {
            match document.node(leftover).kind {
                XmlNodeKind::Element { ref name, .. } => annotations.push(unexpected_element(name)),
                XmlNodeKind::Text(_) => annotations.push(no_text()),
                XmlNodeKind::Other => {}
            }
        }
        for attr_name in inner.remaining.attributes.keys() {
            annotations.push(unexpected_attribute(attr_name));
        }
        for annotation in annotations {
            document.add_problem(child, annotation);
        }

        let mut context = context;
        context.children.remove(0);
        self.match_patterns(document, context, rest)
    }

    fn match_attribute(
        &self,
        document: &mut XmlDocument,
        context: Context,
        head: usize,
        rest: &[usize],
    ) -> Result<Outcome, RngError> {
        let (name, inner) = self.attribute_parts(head)?;
        if context.attributes.contains_key(name) {
            let problem = self.attribute_value_problem(inner, name)?;
            let mut context = context;
            context.attributes.remove(name);
            let mut outcome = self.match_patterns(document, context, rest)?;
            if let Some(problem) = problem {
                outcome.ok = false;
                outcome.problems.insert(0, problem);
            }
            Ok(outcome)
        } else {
            let problem = expected_attribute(name);
            self.report_and_continue(document, context, rest, problem)
        }
    }

    /// The attribute sub-matcher accepts `text` (any string), dereferenced
    /// single-pattern defines, and `value`/`data`/`choice` as shape-only.
    fn attribute_value_problem(
        &self,
        pattern: Option<usize>,
        name: &str,
    ) -> Result<Option<String>, RngError> {
        let Some(pattern) = pattern else {
            return Ok(None);
        };
        match self.tree.kind(pattern) {
            NodeKind::Text | NodeKind::Value(_) | NodeKind::Data(_) | NodeKind::Choice => Ok(None),
            NodeKind::Ref(ref_name) => {
                let &define = self
                    .defines
                    .get(ref_name.as_ref())
                    .ok_or_else(|| RngError::unknown_definition(ref_name))?;
                self.attribute_value_problem(self.tree.children(define).first().copied(), name)
            }
            kind => Ok(Some(expected_attribute_text(name, kind.kind_name()))),
        }
    }

    /// Report a mismatch on the head pattern and keep matching the remaining
    /// patterns on the same context.
    fn report_and_continue(
        &self,
        document: &mut XmlDocument,
        context: Context,
        rest: &[usize],
        problem: String,
    ) -> Result<Outcome, RngError> {
        let mut outcome = self.match_patterns(document, context, rest)?;
        outcome.ok = false;
        outcome.problems.insert(0, problem);
        Ok(outcome)
    }

    fn element_parts(&self, id: usize) -> Result<(&'a str, &'a [usize]), RngError> {
        let node = self.tree.node(id);
        match &node.kind {
            NodeKind::Element(Some(name)) => Ok((name.as_ref(), &node.children[..])),
            NodeKind::Element(None) => match node.children.split_first() {
                Some((&name_class, patterns)) => match self.tree.kind(name_class) {
                    NodeKind::Name(name) => Ok((name.as_ref(), patterns)),
                    _ => Err(RngError::unsupported_pattern(
                        "name class matching beyond literal names is not implemented",
                    )),
                },
                None => Err(RngError::unexpected_node_kind("element")),
            },
            _ => Err(RngError::unexpected_node_kind("element")),
        }
    }

    fn attribute_parts(&self, id: usize) -> Result<(&'a str, Option<usize>), RngError> {
        let node = self.tree.node(id);
        match &node.kind {
            NodeKind::Attribute(Some(name)) => Ok((name.as_ref(), node.children.first().copied())),
            NodeKind::Attribute(None) => match node.children.split_first() {
                Some((&name_class, patterns)) => match self.tree.kind(name_class) {
                    NodeKind::Name(name) => Ok((name.as_ref(), patterns.first().copied())),
                    _ => Err(RngError::unsupported_pattern(
                        "name class matching beyond literal names is not implemented",
                    )),
                },
                None => Err(RngError::unexpected_node_kind("attribute")),
            },
            _ => Err(RngError::unexpected_node_kind("attribute")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_element_name_is_plausible_without_problems() {
        let mut tree = PatternTree::new();
        let pattern = tree.element_named("x", vec![]);
        tree.set_root(pattern);

        let mut document = XmlDocument::new();
        let target = document.element("x", &[], vec![]);
        document.set_root(target);

        let validator = Validator::new(&tree).unwrap();
        assert!(validator.validate_node(&mut document, target, pattern).unwrap());
        assert!(document.collect_problems(target, true).is_empty());
    }

    #[test]
    fn mismatching_element_name_reports_both_sides() {
        let mut tree = PatternTree::new();
        let pattern = tree.element_named("y", vec![]);
        tree.set_root(pattern);

        let mut document = XmlDocument::new();
        let target = document.element("x", &[], vec![]);
        document.set_root(target);

        let validator = Validator::new(&tree).unwrap();
        assert!(!validator.validate_node(&mut document, target, pattern).unwrap());
        let problems: Vec<String> = document
            .collect_problems(target, true)
            .into_iter()
            .map(|(_, message)| message)
            .collect();
        assert_eq!(
            problems,
            ["Expected element y but found x", "Unexpected element: x"]
        );
    }

    #[test]
    fn text_in_an_implicitly_empty_element_is_reported_twice() {
        let mut tree = PatternTree::new();
        let pattern = tree.element_named("x", vec![]);
        tree.set_root(pattern);

        let mut document = XmlDocument::new();
        let text = document.text("stray");
        let target = document.element("x", &[], vec![text]);
        document.set_root(target);

        let validator = Validator::new(&tree).unwrap();
        assert!(validator.validate_node(&mut document, target, pattern).unwrap());
        let problems: Vec<String> = document
            .collect_problems(target, true)
            .into_iter()
            .map(|(_, message)| message)
            .collect();
        assert_eq!(
            problems,
            [
                "Expected no contents but found 1 children",
                "Unexpected text in element"
            ]
        );
    }

    #[test]
    fn interleave_is_rejected_as_unimplemented() {
        let mut tree = PatternTree::new();
        let a = tree.text();
        let b = tree.empty();
        let pattern = tree.interleave(vec![a, b]);
        tree.set_root(pattern);

        let mut document = XmlDocument::new();
        let target = document.element("x", &[], vec![]);
        document.set_root(target);

        let validator = Validator::new(&tree).unwrap();
        let err = validator
            .validate_node(&mut document, target, pattern)
            .unwrap_err();
        assert_eq!(err.to_string(), "interleave matching is not implemented");
    }
}
