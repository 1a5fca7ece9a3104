//! Reduction of a full-syntax grammar to the simplified canonical form.
//!
//! The eight passes run in a fixed total order; each assumes its
//! predecessors' postconditions and the order is load-bearing (`optional`
//! elimination must precede `empty` removal, `combine` elimination must
//! precede grammar flattening). Top-down passes visit parents before
//! children; the `notAllowed` and `empty` passes are post-order so a parent
//! only sees already-normalized children.
//!
//! # Reference
//! RELAX NG specification (2001-12-03), §4 "Simplification".

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    ast::{Combine, NodeKind, PatternTree},
    check,
    error::RngError,
};

/// Working state of the canonical define/element pass.
struct Canonical {
    /// name -> define node, old and canonical names both kept live
    defines: HashMap<Box<str>, usize>,
    /// renames applied to pre-existing defines, swept over refs afterwards
    rename: HashMap<Box<str>, Box<str>>,
    /// element-wrapping defines in visit order
    ordered: Vec<usize>,
    reached: HashSet<usize>,
    queue: VecDeque<usize>,
    /// defines created by this pass; their element is the lift target itself
    fresh: HashSet<usize>,
    counter: usize,
}

impl PatternTree {
    /// Run all simplification passes and certify the result.
    pub fn simplify(&mut self) -> Result<(), RngError> {
        if self.nodes.is_empty() {
            return Err(RngError::not_simplified());
        }
        self.lift_name_attribute(self.root);
        self.normalize_arity(self.root);
        self.replace_shorthand(self.root);
        self.combine_start_and_define(self.root)?;
        self.flatten_grammars()?;
        self.canonical_define_element()?;
        self.limit_not_allowed(self.root);
        self.remove_unreachable_defines();
        self.avoid_empty(self.root);
        if !check::is_simple_form(self) {
            return Err(RngError::not_simplified());
        }
        Ok(())
    }

    /// Pass 1: replace the `name` scalar of `elementNamed`/`attributeNamed`
    /// with a leading `name` child.
    fn lift_name_attribute(&mut self, current: usize) {
        let lifted = match &mut self.nodes[current].kind {
            NodeKind::Element(name) | NodeKind::Attribute(name) => name.take(),
            _ => None,
        };
        if let Some(name) = lifted {
            let id = self.push_node(NodeKind::Name(name), vec![]);
            self.nodes[current].children.insert(0, id);
        }

        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.lift_name_attribute(ch);
        }
    }

    /// Pass 2: restrict arities. Wrapping containers fold down to one child,
    /// connectives to exactly two, and a content-less `attribute` gains its
    /// implicit `text`.
    fn normalize_arity(&mut self, current: usize) {
        // a connective with a single child is replaced by that child
        loop {
            let node = &self.nodes[current];
            if matches!(
                node.kind,
                NodeKind::Choice | NodeKind::Group | NodeKind::Interleave
            ) && node.children.len() == 1
            {
                let ch = node.children[0];
                self.nodes.swap(current, ch);
            } else {
                break;
            }
        }

        match self.nodes[current].kind {
            NodeKind::Define { .. }
            | NodeKind::OneOrMore
            | NodeKind::ZeroOrMore
            | NodeKind::Optional
            | NodeKind::Mixed => {
                if self.nodes[current].children.len() > 1 {
                    let children = std::mem::take(&mut self.nodes[current].children);
                    let group = self.push_node(NodeKind::Group, children);
                    self.nodes[current].children.push(group);
                }
            }
            NodeKind::Element(_) => {
                if self.nodes[current].children.len() > 2 {
                    let tail = self.nodes[current].children.split_off(1);
                    let group = self.push_node(NodeKind::Group, tail);
                    self.nodes[current].children.push(group);
                }
            }
            NodeKind::Attribute(_) => {
                if self.nodes[current].children.len() == 1 {
                    let text = self.push_node(NodeKind::Text, vec![]);
                    self.nodes[current].children.push(text);
                }
            }
            NodeKind::Choice | NodeKind::Group | NodeKind::Interleave => {
                self.fold_left_pairs(current);
            }
            _ => {}
        }

        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.normalize_arity(ch);
        }
    }

    /// Left-fold surplus children pairwise with the node's own constructor
    /// until exactly two remain: `[a, b, c]` becomes `[k(a, b), c]`.
    fn fold_left_pairs(&mut self, current: usize) {
        while self.nodes[current].children.len() > 2 {
            let first = self.nodes[current].children.remove(0);
            let second = self.nodes[current].children.remove(0);
            let kind = self.nodes[current].kind.clone();
            let folded = self.push_node(kind, vec![first, second]);
            self.nodes[current].children.insert(0, folded);
        }
    }

    /// Pass 3: rewrite the shorthands. Post-arity each carries a single
    /// child C: `mixed(C)` -> `interleave(C, text)`, `optional(C)` ->
    /// `choice(C, empty)`, `zeroOrMore(C)` -> `choice(oneOrMore(C), empty)`.
    fn replace_shorthand(&mut self, current: usize) {
        match self.nodes[current].kind {
            NodeKind::Mixed => {
                self.nodes[current].kind = NodeKind::Interleave;
                let text = self.push_node(NodeKind::Text, vec![]);
                self.nodes[current].children.push(text);
            }
            NodeKind::Optional => {
                self.nodes[current].kind = NodeKind::Choice;
                let empty = self.push_node(NodeKind::Empty, vec![]);
                self.nodes[current].children.push(empty);
            }
            NodeKind::ZeroOrMore => {
                self.nodes[current].kind = NodeKind::Choice;
                let children = std::mem::take(&mut self.nodes[current].children);
                let one_or_more = self.push_node(NodeKind::OneOrMore, children);
                let empty = self.push_node(NodeKind::Empty, vec![]);
                self.nodes[current].children = vec![one_or_more, empty];
            }
            _ => {}
        }

        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.replace_shorthand(ch);
        }
    }

    /// Pass 4: eliminate `combine`. Inside each grammar, same-name `start`s
    /// and `define`s are folded into one node each; the grammar's children
    /// become one `start` followed by one `define` per name.
    fn combine_start_and_define(&mut self, current: usize) -> Result<(), RngError> {
        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.combine_start_and_define(ch)?;
        }

        if !matches!(self.nodes[current].kind, NodeKind::Grammar) {
            return Ok(());
        }

        let mut starts = vec![];
        let mut define_order: Vec<Box<str>> = vec![];
        let mut define_groups: HashMap<Box<str>, Vec<usize>> = HashMap::new();
        let mut others = vec![];
        for ch in self.nodes[current].children.clone() {
            match &self.nodes[ch].kind {
                NodeKind::Start(_) => starts.push(ch),
                NodeKind::Define { name, .. } => {
                    let name = name.clone();
                    if !define_groups.contains_key(&name) {
                        define_order.push(name.clone());
                    }
                    define_groups.entry(name).or_default().push(ch);
                }
                _ => others.push(ch),
            }
        }

        if starts.is_empty() {
            return Err(RngError::start_not_found());
        }

        let mut children = vec![self.merge_starts(starts)?];
        for name in define_order {
            let group = define_groups.remove(&name).unwrap();
            children.push(self.merge_defines(&name, group)?);
        }
        children.extend(others);
        self.nodes[current].children = children;
        Ok(())
    }

    fn merge_starts(&mut self, mut starts: Vec<usize>) -> Result<usize, RngError> {
        if starts.len() == 1 {
            return Ok(starts[0]);
        }

        let combine = self.merge_combine(&starts, |kind| match kind {
            NodeKind::Start(combine) => *combine,
            _ => unreachable!(),
        });
        let combine = match combine {
            Ok(combine) => combine,
            Err(Inconsistency::Missing) => {
                return Err(RngError::multiple_starts_without_combine());
            }
            Err(Inconsistency::Conflicting) => {
                return Err(RngError::multiple_starts_with_different_combine());
            }
        };

        starts.sort_by_key(|&s| !matches!(self.nodes[s].kind, NodeKind::Start(None)) as usize);
        let pattern = self.fold_payloads(&starts, combine);
        Ok(self.push_node(NodeKind::Start(Some(combine)), vec![pattern]))
    }

    fn merge_defines(&mut self, name: &str, mut defines: Vec<usize>) -> Result<usize, RngError> {
        if defines.len() == 1 {
            return Ok(defines[0]);
        }

        let combine = self.merge_combine(&defines, |kind| match kind {
            NodeKind::Define { combine, .. } => *combine,
            _ => unreachable!(),
        });
        let combine = match combine {
            Ok(combine) => combine,
            Err(Inconsistency::Missing) => {
                return Err(RngError::multiple_defines_without_combine(name));
            }
            Err(Inconsistency::Conflicting) => {
                return Err(RngError::multiple_defines_with_different_combine(name));
            }
        };

        defines.sort_by_key(|&d| {
            !matches!(self.nodes[d].kind, NodeKind::Define { combine: None, .. }) as usize
        });
        let pattern = self.fold_payloads(&defines, combine);
        Ok(self.push_node(
            NodeKind::Define {
                name: name.into(),
                combine: Some(combine),
            },
            vec![pattern],
        ))
    }

    /// The shared `combine` of a same-name group: all non-absent values must
    /// agree and at most one member may leave it absent (inheriting).
    fn merge_combine(
        &self,
        group: &[usize],
        combine_of: impl Fn(&NodeKind) -> Option<Combine>,
    ) -> Result<Combine, Inconsistency> {
        let mut value = None;
        let mut absent = 0usize;
        for &member in group {
            match combine_of(&self.nodes[member].kind) {
                Some(combine) => {
                    if *value.get_or_insert(combine) != combine {
                        return Err(Inconsistency::Conflicting);
                    }
                }
                None => absent += 1,
            }
        }
        if absent >= 2 { Err(Inconsistency::Missing) } else { value.ok_or(Inconsistency::Missing) }
    }

    /// Left reduction of the members' single patterns, so the resulting tree
    /// is `combine(combine(a, b), c)`.
    fn fold_payloads(&mut self, members: &[usize], combine: Combine) -> usize {
        let kind = match combine {
            Combine::Choice => NodeKind::Choice,
            Combine::Interleave => NodeKind::Interleave,
        };
        let mut acc = self.nodes[members[0]].children[0];
        for &member in &members[1..] {
            let rhs = self.nodes[member].children[0];
            acc = self.push_node(kind.clone(), vec![acc, rhs]);
        }
        acc
    }

    /// Pass 5: reduce to a single top-level grammar. A bare pattern root is
    /// wrapped as `grammar(start(pattern))`; nested grammars have their
    /// conflicting define names freshened, their references resolved through
    /// the enclosing-grammar stack, their defines hoisted to the top and
    /// their node replaced by the `start` payload.
    fn flatten_grammars(&mut self) -> Result<(), RngError> {
        let root = self.root;
        if !matches!(self.nodes[root].kind, NodeKind::Grammar) {
            let grammar = self.nodes.len();
            self.push_node(NodeKind::Grammar, vec![grammar + 1]);
            self.push_node(NodeKind::Start(None), vec![grammar]);
            self.nodes.swap(root, grammar);
        }

        let mut all_names = HashSet::new();
        self.collect_define_names(root, &mut all_names);
        let mut claimed = HashSet::new();
        let mut renames = HashMap::new();
        self.rename_conflicting_defines(root, &all_names, &mut claimed, &mut renames);

        self.resolve_references(root, &mut vec![], &renames)?;

        let mut hoisted = vec![];
        self.splice_nested_grammars(root, root, &mut hoisted);
        self.nodes[root].children.extend(hoisted);
        Ok(())
    }

    fn collect_define_names(&self, current: usize, names: &mut HashSet<Box<str>>) {
        if let NodeKind::Define { name, .. } = &self.nodes[current].kind {
            names.insert(name.clone());
        }
        for &ch in &self.nodes[current].children {
            self.collect_define_names(ch, names);
        }
    }

    /// First grammar to use a define name keeps it; later grammars get the
    /// least `name__k` unused across all grammars.
    fn rename_conflicting_defines(
        &mut self,
        current: usize,
        all_names: &HashSet<Box<str>>,
        claimed: &mut HashSet<Box<str>>,
        renames: &mut HashMap<usize, HashMap<Box<str>, Box<str>>>,
    ) {
        if matches!(self.nodes[current].kind, NodeKind::Grammar) {
            for ch in self.nodes[current].children.clone() {
                let NodeKind::Define { name, .. } = &self.nodes[ch].kind else {
                    continue;
                };
                let name = name.clone();
                if claimed.insert(name.clone()) {
                    continue;
                }
                let mut k = 1usize;
                let fresh = loop {
                    let candidate: Box<str> = format!("{name}__{k}").into();
                    if !all_names.contains(&candidate) && !claimed.contains(&candidate) {
                        break candidate;
                    }
                    k += 1;
                };
                if let NodeKind::Define { name, .. } = &mut self.nodes[ch].kind {
                    *name = fresh.clone();
                }
                claimed.insert(fresh.clone());
                renames.entry(current).or_default().insert(name, fresh);
            }
        }

        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.rename_conflicting_defines(ch, all_names, claimed, renames);
        }
    }

    /// Rewrite every `ref`/`parentRef` whose resolved grammar renamed its
    /// target; `parentRef` resolves one grammar level up and becomes `ref`.
    fn resolve_references(
        &mut self,
        current: usize,
        stack: &mut Vec<usize>,
        renames: &HashMap<usize, HashMap<Box<str>, Box<str>>>,
    ) -> Result<(), RngError> {
        let entered = matches!(self.nodes[current].kind, NodeKind::Grammar);
        if entered {
            stack.push(current);
        }

        match self.nodes[current].kind.clone() {
            NodeKind::Ref(name) => {
                let Some(&grammar) = stack.last() else {
                    return Err(RngError::ref_outside_grammar());
                };
                if let Some(new) = renames.get(&grammar).and_then(|map| map.get(&name)) {
                    self.nodes[current].kind = NodeKind::Ref(new.clone());
                }
            }
            NodeKind::ParentRef(name) => {
                if stack.is_empty() {
                    return Err(RngError::ref_outside_grammar());
                }
                if stack.len() < 2 {
                    return Err(RngError::parent_ref_without_parent_grammar());
                }
                let grammar = stack[stack.len() - 2];
                let new = renames
                    .get(&grammar)
                    .and_then(|map| map.get(&name))
                    .cloned()
                    .unwrap_or(name);
                self.nodes[current].kind = NodeKind::Ref(new);
            }
            _ => {}
        }

        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.resolve_references(ch, stack, renames)?;
        }

        if entered {
            stack.pop();
        }
        Ok(())
    }

    fn splice_nested_grammars(&mut self, current: usize, root: usize, hoisted: &mut Vec<usize>) {
        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.splice_nested_grammars(ch, root, hoisted);
        }

        if current != root && matches!(self.nodes[current].kind, NodeKind::Grammar) {
            // post-combine the children are one start followed by defines
            let mut content = std::mem::take(&mut self.nodes[current].children);
            let start = content.remove(0);
            hoisted.append(&mut content);
            let payload = self.nodes[start].children[0];
            self.nodes.swap(current, payload);
        }
    }

    /// Pass 6: canonical define/element. Visits `ref` targets transitively
    /// from `start`; every element reached in pattern position moves into
    /// (or renames) an `elem__N` define, non-element defines are inlined by
    /// structural copy at each use site and dropped, and the grammar keeps
    /// `start` plus the reached element defines in visit order.
    ///
    /// Inlining performs no cycle detection; acyclicity among non-element
    /// defines is assumed.
    fn canonical_define_element(&mut self) -> Result<(), RngError> {
        let root = self.root;
        let start = self.nodes[root].children[0];

        let mut defines = HashMap::new();
        for ch in self.nodes[root].children[1..].to_vec() {
            if let NodeKind::Define { name, .. } = &self.nodes[ch].kind {
                defines.insert(name.clone(), ch);
            }
        }
        let mut st = Canonical {
            defines,
            rename: HashMap::new(),
            ordered: vec![],
            reached: HashSet::new(),
            queue: VecDeque::new(),
            fresh: HashSet::new(),
            counter: 0,
        };

        let start_pattern = self.nodes[start].children[0];
        self.canonical_visit(start_pattern, &mut st)?;
        while let Some(define) = st.queue.pop_front() {
            let body = self.nodes[define].children[0];
            if st.fresh.contains(&define) {
                // the element is the lift target itself; only its content
                // patterns remain to visit
                for pattern in self.nodes[body].children[1..].to_vec() {
                    self.canonical_visit(pattern, &mut st)?;
                }
            } else if matches!(self.nodes[body].kind, NodeKind::Element(_)) {
                // a define already wrapping a single element keeps its shape
                // under a canonical elem__N name
                st.counter += 1;
                let alias: Box<str> = format!("elem__{}", st.counter).into();
                let NodeKind::Define { name, .. } = &self.nodes[define].kind else {
                    unreachable!();
                };
                let old = name.clone();
                self.nodes[define].kind = NodeKind::Define {
                    name: alias.clone(),
                    combine: None,
                };
                st.defines.insert(alias.clone(), define);
                st.rename.insert(old, alias);
                st.ordered.push(define);
                for pattern in self.nodes[body].children[1..].to_vec() {
                    self.canonical_visit(pattern, &mut st)?;
                }
            } else {
                self.canonical_visit(body, &mut st)?;
            }
        }

        // rewrite refs to renamed defines
        for id in 0..self.nodes.len() {
            if let NodeKind::Ref(name) = &self.nodes[id].kind
                && let Some(new) = st.rename.get(name)
            {
                self.nodes[id].kind = NodeKind::Ref(new.clone());
            }
        }

        // reached element defines follow start in visit order; everything
        // else is dropped
        let mut children = vec![start];
        children.extend(st.ordered.iter().copied());
        self.nodes[root].children = children;

        self.inline_refs(start, &st.defines);
        for &define in &st.ordered {
            self.inline_refs(define, &st.defines);
        }
        Ok(())
    }

    fn canonical_visit(&mut self, current: usize, st: &mut Canonical) -> Result<(), RngError> {
        match self.nodes[current].kind.clone() {
            NodeKind::Element(_) => {
                // replace the element with ref("elem__N") and append the new
                // define; the define is visited later in the same pass
                st.counter += 1;
                let alias: Box<str> = format!("elem__{}", st.counter).into();
                let define = self.nodes.len();
                self.push_node(
                    NodeKind::Define {
                        name: alias.clone(),
                        combine: None,
                    },
                    vec![define + 1],
                );
                self.push_node(NodeKind::Ref(alias.clone()), vec![]);
                self.nodes.swap(current, define + 1);
                st.defines.insert(alias, define);
                st.fresh.insert(define);
                st.reached.insert(define);
                st.ordered.push(define);
                st.queue.push_back(define);
            }
            NodeKind::Ref(name) => {
                let &define = st
                    .defines
                    .get(&name)
                    .ok_or_else(|| RngError::unknown_definition(&name))?;
                if st.reached.insert(define) {
                    st.queue.push_back(define);
                }
            }
            NodeKind::Attribute(_) => {
                // the name class holds no patterns
                for pattern in self.nodes[current].children[1..].to_vec() {
                    self.canonical_visit(pattern, st)?;
                }
            }
            _ => {
                for ch in self.nodes[current].children.clone() {
                    self.canonical_visit(ch, st)?;
                }
            }
        }
        Ok(())
    }

    /// Substitute each `ref` whose define does not wrap an element by a deep
    /// copy of the define's child, recursively.
    fn inline_refs(&mut self, current: usize, defines: &HashMap<Box<str>, usize>) {
        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            if let NodeKind::Ref(name) = &self.nodes[ch].kind
                && let Some(&define) = defines.get(name)
            {
                let body = self.nodes[define].children[0];
                if !matches!(self.nodes[body].kind, NodeKind::Element(_)) {
                    let copy = self.deep_copy(body);
                    self.nodes[current].children[i] = copy;
                    self.inline_refs(copy, defines);
                    continue;
                }
            }
            self.inline_refs(ch, defines);
        }
    }

    /// Pass 7: confine `notAllowed`. Post-order; any container that cannot
    /// match once a branch is `notAllowed` collapses to `notAllowed`, and a
    /// `choice` sheds a `notAllowed` arm.
    fn limit_not_allowed(&mut self, current: usize) {
        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.limit_not_allowed(ch);
        }

        if self.nodes[current].children.is_empty() {
            return;
        }

        match self.nodes[current].kind {
            NodeKind::Attribute(_) => {
                let pattern = self.nodes[current].children[1];
                if matches!(self.nodes[pattern].kind, NodeKind::NotAllowed) {
                    self.nodes.swap(current, pattern);
                }
            }
            NodeKind::Group | NodeKind::Interleave | NodeKind::OneOrMore => {
                let not_allowed = self.nodes[current]
                    .children
                    .iter()
                    .copied()
                    .find(|&ch| matches!(self.nodes[ch].kind, NodeKind::NotAllowed));
                if let Some(ch) = not_allowed {
                    self.nodes.swap(current, ch);
                }
            }
            NodeKind::Choice => {
                let first = self.nodes[current].children[0];
                let second = self.nodes[current].children[1];
                if matches!(self.nodes[first].kind, NodeKind::NotAllowed) {
                    self.nodes.swap(current, second);
                } else if matches!(self.nodes[second].kind, NodeKind::NotAllowed) {
                    self.nodes.swap(current, first);
                }
            }
            _ => {}
        }
    }

    /// Reachability subset of pass 6, rerun after `notAllowed` elimination:
    /// drop defines no longer referenced from `start`.
    fn remove_unreachable_defines(&mut self) {
        let root = self.root;
        if !matches!(self.nodes[root].kind, NodeKind::Grammar)
            || self.nodes[root].children.is_empty()
        {
            return;
        }
        let start = self.nodes[root].children[0];

        let mut defines = HashMap::new();
        for &ch in &self.nodes[root].children[1..] {
            if let NodeKind::Define { name, .. } = &self.nodes[ch].kind {
                defines.insert(name.clone(), ch);
            }
        }

        let mut stack = vec![start];
        let mut used = HashSet::new();
        while let Some(current) = stack.pop() {
            stack.extend(self.nodes[current].children.iter().copied());
            if let NodeKind::Ref(name) = &self.nodes[current].kind
                && let Some(&define) = defines.get(name)
                && used.insert(define)
            {
                stack.push(define);
            }
        }

        self.nodes[root]
            .children
            .retain(|&ch| ch == start || used.contains(&ch));
    }

    /// Pass 8: remove `empty` where the simple form forbids it. Post-order;
    /// a `choice` keeps its `empty` but always as the first child.
    fn avoid_empty(&mut self, current: usize) {
        let len = self.nodes[current].children.len();
        for i in 0..len {
            let ch = self.nodes[current].children[i];
            self.avoid_empty(ch);
        }

        if self.nodes[current].children.is_empty() {
            return;
        }

        match self.nodes[current].kind {
            NodeKind::Group | NodeKind::Interleave => {
                let first = self.nodes[current].children[0];
                let second = self.nodes[current].children[1];
                if matches!(self.nodes[first].kind, NodeKind::Empty) {
                    self.nodes.swap(current, second);
                } else if matches!(self.nodes[second].kind, NodeKind::Empty) {
                    self.nodes.swap(current, first);
                }
            }
            NodeKind::OneOrMore => {
                let ch = self.nodes[current].children[0];
                if matches!(self.nodes[ch].kind, NodeKind::Empty) {
                    self.nodes.swap(current, ch);
                }
            }
            NodeKind::Choice => {
                let first = self.nodes[current].children[0];
                let second = self.nodes[current].children[1];
                match (
                    matches!(self.nodes[first].kind, NodeKind::Empty),
                    matches!(self.nodes[second].kind, NodeKind::Empty),
                ) {
                    (true, true) => self.nodes.swap(current, first),
                    (_, true) => self.nodes[current].children.swap(0, 1),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

enum Inconsistency {
    Missing,
    Conflicting,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RngErrorCode;

    #[test]
    fn connectives_fold_left() {
        let mut tree = PatternTree::new();
        let a = tree.element_named("a", vec![]);
        let b = tree.element_named("b", vec![]);
        let c = tree.element_named("c", vec![]);
        let choice = tree.choice(vec![a, b, c]);
        tree.set_root(choice);
        tree.lift_name_attribute(choice);
        tree.normalize_arity(choice);
        assert_eq!(
            tree.to_string(),
            "<choice><choice><element><name>a</name><empty/></element>\
             <element><name>b</name><empty/></element></choice>\
             <element><name>c</name><empty/></element></choice>"
        );
    }

    #[test]
    fn single_child_connective_is_spliced() {
        let mut tree = PatternTree::new();
        let text = tree.text();
        let choice = tree.choice(vec![text]);
        tree.set_root(choice);
        tree.normalize_arity(choice);
        assert_eq!(tree.to_string(), "<text/>");
    }

    #[test]
    fn zero_or_more_becomes_choice_of_one_or_more() {
        let mut tree = PatternTree::new();
        let text = tree.text();
        let zom = tree.zero_or_more(vec![text]);
        tree.set_root(zom);
        tree.replace_shorthand(zom);
        assert_eq!(
            tree.to_string(),
            "<choice><oneOrMore><text/></oneOrMore><empty/></choice>"
        );
    }

    #[test]
    fn start_combine_inherits_onto_missing_member() {
        // one start carries combine="choice", the other inherits it
        let mut tree = PatternTree::new();
        let elem_a = tree.element_named("a", vec![]);
        let start_a = tree.start(Some(Combine::Choice), elem_a);
        let elem_b = tree.element_named("b", vec![]);
        let start_b = tree.start(None, elem_b);
        let grammar = tree.grammar(vec![start_a, start_b]);
        tree.set_root(grammar);
        tree.combine_start_and_define(grammar).unwrap();

        let children = tree.children(grammar).to_vec();
        assert_eq!(children.len(), 1);
        assert!(matches!(
            tree.kind(children[0]),
            NodeKind::Start(Some(Combine::Choice))
        ));
        let folded = tree.children(children[0])[0];
        assert!(matches!(tree.kind(folded), NodeKind::Choice));
    }

    #[test]
    fn two_starts_without_combine_is_an_error() {
        let mut tree = PatternTree::new();
        let elem_a = tree.element_named("a", vec![]);
        let start_a = tree.start(None, elem_a);
        let elem_b = tree.element_named("b", vec![]);
        let start_b = tree.start(None, elem_b);
        let grammar = tree.grammar(vec![start_a, start_b]);
        tree.set_root(grammar);

        let err = tree.combine_start_and_define(grammar).unwrap_err();
        assert_eq!(err.code, RngErrorCode::MultipleStartWithoutCombine);
        assert_eq!(
            err.to_string(),
            "Cannot have multiple starts without specifying combine"
        );
    }

    #[test]
    fn conflicting_start_combines_are_an_error() {
        let mut tree = PatternTree::new();
        let elem_a = tree.element_named("a", vec![]);
        let start_a = tree.start(Some(Combine::Choice), elem_a);
        let elem_b = tree.element_named("b", vec![]);
        let start_b = tree.start(Some(Combine::Interleave), elem_b);
        let grammar = tree.grammar(vec![start_a, start_b]);
        tree.set_root(grammar);

        let err = tree.combine_start_and_define(grammar).unwrap_err();
        assert_eq!(err.code, RngErrorCode::MultipleStartWithDifferentCombine);
    }

    #[test]
    fn bare_pattern_root_is_wrapped_into_a_grammar() {
        let mut tree = PatternTree::new();
        let elem = tree.element_named("doc", vec![]);
        tree.set_root(elem);
        tree.lift_name_attribute(elem);
        tree.flatten_grammars().unwrap();
        assert!(matches!(tree.kind(tree.root()), NodeKind::Grammar));
        let start = tree.children(tree.root())[0];
        assert!(matches!(tree.kind(start), NodeKind::Start(None)));
        let payload = tree.children(start)[0];
        assert!(matches!(tree.kind(payload), NodeKind::Element(None)));
    }

    #[test]
    fn parent_ref_in_outermost_grammar_is_an_error() {
        let mut tree = PatternTree::new();
        let pref = tree.parent_ref("a");
        let start = tree.start(None, pref);
        let grammar = tree.grammar(vec![start]);
        tree.set_root(grammar);

        let err = tree.flatten_grammars().unwrap_err();
        assert_eq!(err.code, RngErrorCode::ParentRefWithoutParentGrammar);
        assert_eq!(err.to_string(), "parentRef has no enclosing parent grammar");
    }

    #[test]
    fn unknown_ref_is_an_error() {
        let mut tree = PatternTree::new();
        let reference = tree.ref_to("missing");
        let start = tree.start(None, reference);
        let grammar = tree.grammar(vec![start]);
        tree.set_root(grammar);

        let err = tree.simplify().unwrap_err();
        assert_eq!(err.code, RngErrorCode::UnknownDefinition);
        assert_eq!(
            err.to_string(),
            "Referencing unknown definition: missing"
        );
    }

    #[test]
    fn not_allowed_collapses_containers_and_unreferenced_defines_drop() {
        // group(notAllowed, element) erases the whole branch, leaving only
        // the surviving choice arm; the define referenced from the erased
        // branch must be dropped by the reachability rerun
        let mut tree = PatternTree::new();
        let elem_foo = tree.element_named("foo", vec![]);
        let not_allowed = tree.not_allowed();
        let reference = tree.ref_to("bar");
        let group = tree.group(vec![not_allowed, reference]);
        let choice = tree.choice(vec![elem_foo, group]);
        let start = tree.start(None, choice);
        let elem_bar = tree.element_named("bar", vec![]);
        let define = tree.define("bar", None, vec![elem_bar]);
        let grammar = tree.grammar(vec![start, define]);
        tree.set_root(grammar);

        tree.simplify().unwrap();
        assert_eq!(
            tree.to_string(),
            "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
             <start><ref name=\"elem__1\"/></start>\
             <define name=\"elem__1\"><element><name>foo</name><empty/></element></define>\
             </grammar>"
        );
    }
}
