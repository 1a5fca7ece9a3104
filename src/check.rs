//! Certification of the simplified canonical form.
//!
//! [`is_simple_form`] is a pure predicate over the invariants the simplifier
//! establishes; consumers use it as an assertion between simplification and
//! validation. Each violated invariant short-circuits to `false`. The checker
//! is structural only: it does not trace which parents a `notAllowed` may
//! legally appear under.

use crate::ast::{NodeKind, PatternTree};

/// Returns `true` iff `tree` satisfies every simple-form invariant.
pub fn is_simple_form(tree: &PatternTree) -> bool {
    if tree.nodes.is_empty() || !matches!(tree.kind(tree.root()), NodeKind::Grammar) {
        return false;
    }

    let Some((&start, defines)) = tree.children(tree.root()).split_first() else {
        return false;
    };
    if !matches!(tree.kind(start), NodeKind::Start(_)) {
        return false;
    }
    if tree.children(start).len() != 1 || !check_top(tree, tree.children(start)[0]) {
        return false;
    }

    for &define in defines {
        if !matches!(tree.kind(define), NodeKind::Define { .. }) {
            return false;
        }
        let [element] = tree.children(define) else {
            return false;
        };
        if !check_element(tree, *element) {
            return false;
        }
    }

    true
}

/// A top pattern: the child of `start` or the second child of `element`.
/// `notAllowed` is permitted here and nowhere below.
fn check_top(tree: &PatternTree, id: usize) -> bool {
    matches!(tree.kind(id), NodeKind::NotAllowed) || check_pattern(tree, id)
}

fn check_element(tree: &PatternTree, id: usize) -> bool {
    if !matches!(tree.kind(id), NodeKind::Element(None)) {
        return false;
    }
    let [name_class, top] = tree.children(id) else {
        return false;
    };
    check_name_class(tree, *name_class) && check_top(tree, *top)
}

fn check_pattern(tree: &PatternTree, id: usize) -> bool {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::Empty | NodeKind::Text | NodeKind::Value(_) | NodeKind::Data(_) => {
            node.children.is_empty()
        }
        NodeKind::Ref(_) => node.children.is_empty(),
        // notAllowed survives only in top-pattern position; the structural
        // walk treats it as a bare leaf there (see check_top).
        NodeKind::NotAllowed => node.children.is_empty(),
        NodeKind::Attribute(None) => {
            let [name_class, pattern] = node.children[..] else {
                return false;
            };
            check_name_class(tree, name_class) && check_pattern(tree, pattern)
        }
        NodeKind::OneOrMore => {
            let [child] = node.children[..] else {
                return false;
            };
            !matches!(tree.kind(child), NodeKind::Empty) && check_pattern(tree, child)
        }
        NodeKind::Choice => {
            let [first, second] = node.children[..] else {
                return false;
            };
            !matches!(tree.kind(second), NodeKind::Empty)
                && check_pattern(tree, first)
                && check_pattern(tree, second)
        }
        NodeKind::Group | NodeKind::Interleave => {
            let [first, second] = node.children[..] else {
                return false;
            };
            !matches!(tree.kind(first), NodeKind::Empty)
                && !matches!(tree.kind(second), NodeKind::Empty)
                && check_pattern(tree, first)
                && check_pattern(tree, second)
        }
        // Elements live only under define; the full-syntax shorthands and
        // every construct the simplifier eliminates must be gone.
        NodeKind::Element(_)
        | NodeKind::Attribute(Some(_))
        | NodeKind::Optional
        | NodeKind::ZeroOrMore
        | NodeKind::Mixed
        | NodeKind::ParentRef(_)
        | NodeKind::Grammar
        | NodeKind::Start(_)
        | NodeKind::Define { .. }
        | NodeKind::Name(_)
        | NodeKind::AnyName
        | NodeKind::NameChoice
        | NodeKind::ExceptNameClass => false,
    }
}

fn check_name_class(tree: &PatternTree, id: usize) -> bool {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::Name(_) => node.children.is_empty(),
        NodeKind::AnyName => match node.children[..] {
            [] => true,
            [except] => {
                matches!(tree.kind(except), NodeKind::ExceptNameClass)
                    && tree.children(except).len() == 1
                    && check_name_class(tree, tree.children(except)[0])
            }
            _ => false,
        },
        NodeKind::NameChoice => {
            let [left, right] = node.children[..] else {
                return false;
            };
            check_name_class(tree, left) && check_name_class(tree, right)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PatternTree;

    fn canonical_tree() -> PatternTree {
        let mut tree = PatternTree::new();
        let reference = tree.ref_to("elem__1");
        let start = tree.start(None, reference);
        let nc = tree.name("doc");
        let empty = tree.empty();
        let element = tree.element(nc, vec![empty]);
        let define = tree.define("elem__1", None, vec![element]);
        let grammar = tree.grammar(vec![start, define]);
        tree.set_root(grammar);
        tree
    }

    #[test]
    fn accepts_canonical_grammar() {
        assert!(is_simple_form(&canonical_tree()));
    }

    #[test]
    fn rejects_non_grammar_root() {
        let mut tree = PatternTree::new();
        let elem = tree.element_named("doc", vec![]);
        tree.set_root(elem);
        assert!(!is_simple_form(&tree));
    }

    #[test]
    fn rejects_empty_as_second_choice_child() {
        let mut tree = PatternTree::new();
        let text = tree.text();
        let empty = tree.empty();
        let choice = tree.choice(vec![text, empty]);
        let start = tree.start(None, choice);
        let grammar = tree.grammar(vec![start]);
        tree.set_root(grammar);
        assert!(!is_simple_form(&tree));
    }

    #[test]
    fn rejects_surviving_optional() {
        let mut tree = PatternTree::new();
        let text = tree.text();
        let optional = tree.optional(vec![text]);
        let start = tree.start(None, optional);
        let grammar = tree.grammar(vec![start]);
        tree.set_root(grammar);
        assert!(!is_simple_form(&tree));
    }
}
