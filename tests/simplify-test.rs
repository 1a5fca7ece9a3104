use std::collections::HashSet;

use anyrng::{
    Schema,
    ast::{Combine, NodeKind, PatternTree},
    check::is_simple_form,
    error::RngErrorCode,
    xml::parse_grammar_str,
};
use pretty_assertions::assert_eq;

/// Collect every define name of the top grammar plus every `ref` target
/// reachable from the root.
fn defines_and_refs(tree: &PatternTree) -> (Vec<String>, Vec<String>) {
    let mut defines = vec![];
    for &ch in tree.children(tree.root()) {
        if let NodeKind::Define { name, .. } = tree.kind(ch) {
            defines.push(name.to_string());
        }
    }
    let mut refs = vec![];
    let mut stack = vec![tree.root()];
    while let Some(current) = stack.pop() {
        stack.extend(tree.children(current).iter().copied());
        if let NodeKind::Ref(name) = tree.kind(current) {
            refs.push(name.to_string());
        }
    }
    (defines, refs)
}

#[test]
fn optional_ref_grammar_reduces_to_canonical_form() {
    // grammar(start(optional(ref a)), define a = element p) comes out with a
    // single elem__1 define and the empty arm first in the choice
    let mut tree = PatternTree::new();
    let reference = tree.ref_to("a");
    let optional = tree.optional(vec![reference]);
    let start = tree.start(None, optional);
    let element = tree.element_named("p", vec![]);
    let define = tree.define("a", None, vec![element]);
    let grammar = tree.grammar(vec![start, define]);
    tree.set_root(grammar);

    tree.simplify().unwrap();
    assert!(is_simple_form(&tree));
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start><choice><empty/><ref name=\"elem__1\"/></choice></start>\
         <define name=\"elem__1\"><element><name>p</name><empty/></element></define>\
         </grammar>"
    );
}

#[test]
fn wire_form_grammar_reduces_to_the_same_canonical_form() {
    let schema = Schema::parse_str(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <start><optional><ref name="a"/></optional></start>
             <define name="a"><element name="p"><empty/></element></define>
           </grammar>"#,
    )
    .unwrap();
    assert_eq!(
        schema.tree().to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start><choice><empty/><ref name=\"elem__1\"/></choice></start>\
         <define name=\"elem__1\"><element><name>p</name><empty/></element></define>\
         </grammar>"
    );
}

#[test]
fn simplification_is_idempotent() {
    let sources = [
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <start><optional><ref name="a"/></optional></start>
             <define name="a"><element name="p"><empty/></element></define>
           </grammar>"#,
        r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
             <mixed><element name="i"><text/></element></mixed>
           </element>"#,
        r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
             <zeroOrMore><element name="item"><attribute name="id"/></element></zeroOrMore>
           </element>"#,
    ];
    for source in sources {
        let mut once = parse_grammar_str(source).unwrap();
        once.simplify().unwrap();
        let mut twice = once.clone();
        twice.simplify().unwrap();
        assert_eq!(once.to_string(), twice.to_string());
    }
}

#[test]
fn simplifier_postcondition_holds_and_references_stay_intact() {
    let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
         <start><ref name="doc"/></start>
         <define name="doc">
           <element name="doc">
             <optional><attribute name="version"/></optional>
             <zeroOrMore><ref name="section"/></zeroOrMore>
           </element>
         </define>
         <define name="section">
           <element name="section">
             <oneOrMore><element name="p"><text/></element></oneOrMore>
           </element>
         </define>
       </grammar>"#;
    let mut tree = parse_grammar_str(source).unwrap();
    tree.simplify().unwrap();
    assert!(is_simple_form(&tree));

    let (defines, refs) = defines_and_refs(&tree);
    let unique: HashSet<&String> = defines.iter().collect();
    assert_eq!(unique.len(), defines.len(), "define names must be distinct");
    for reference in refs {
        assert!(
            defines.contains(&reference),
            "ref {reference} has no matching define"
        );
    }
}

#[test]
fn mixed_becomes_interleave_with_text() {
    let mut tree = parse_grammar_str(
        r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
             <mixed><element name="i"><text/></element></mixed>
           </element>"#,
    )
    .unwrap();
    tree.simplify().unwrap();
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start><ref name=\"elem__1\"/></start>\
         <define name=\"elem__1\"><element><name>doc</name>\
         <interleave><ref name=\"elem__2\"/><text/></interleave></element></define>\
         <define name=\"elem__2\"><element><name>i</name><text/></element></define>\
         </grammar>"
    );
}

#[test]
fn two_starts_fold_when_one_inherits_combine() {
    let mut tree = parse_grammar_str(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <start combine="choice"><element name="a"><empty/></element></start>
             <start><element name="b"><empty/></element></start>
           </grammar>"#,
    )
    .unwrap();
    tree.simplify().unwrap();
    // the combine-less start sorts first, the fold is a left reduction, and
    // the surviving start keeps combine="choice"
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start combine=\"choice\"><choice><ref name=\"elem__1\"/><ref name=\"elem__2\"/></choice></start>\
         <define name=\"elem__1\"><element><name>b</name><empty/></element></define>\
         <define name=\"elem__2\"><element><name>a</name><empty/></element></define>\
         </grammar>"
    );
}

#[test]
fn two_starts_without_combine_fail() {
    let mut tree = parse_grammar_str(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <start><element name="a"><empty/></element></start>
             <start><element name="b"><empty/></element></start>
           </grammar>"#,
    )
    .unwrap();
    let err = tree.simplify().unwrap_err();
    assert_eq!(err.code, RngErrorCode::MultipleStartWithoutCombine);
    assert_eq!(
        err.to_string(),
        "Cannot have multiple starts without specifying combine"
    );
}

#[test]
fn nested_grammars_flatten_with_conflict_renames() {
    let mut tree = parse_grammar_str(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <start><ref name="item"/></start>
             <define name="item">
               <element name="item">
                 <grammar>
                   <start><ref name="item"/></start>
                   <define name="item">
                     <element name="leaf"><parentRef name="item"/></element>
                   </define>
                 </grammar>
               </element>
             </define>
           </grammar>"#,
    )
    .unwrap();
    tree.simplify().unwrap();
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start><ref name=\"elem__1\"/></start>\
         <define name=\"elem__1\"><element><name>item</name><ref name=\"elem__2\"/></element></define>\
         <define name=\"elem__2\"><element><name>leaf</name><ref name=\"elem__1\"/></element></define>\
         </grammar>"
    );
}

#[test]
fn parent_ref_at_the_outermost_grammar_fails() {
    let mut tree = parse_grammar_str(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <start><element name="doc"><parentRef name="a"/></element></start>
             <define name="a"><element name="p"><empty/></element></define>
           </grammar>"#,
    )
    .unwrap();
    let err = tree.simplify().unwrap_err();
    assert_eq!(err.code, RngErrorCode::ParentRefWithoutParentGrammar);
    assert_eq!(err.to_string(), "parentRef has no enclosing parent grammar");
}

#[test]
fn grammar_without_start_fails() {
    let mut tree = parse_grammar_str(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <define name="a"><element name="p"><empty/></element></define>
           </grammar>"#,
    )
    .unwrap();
    let err = tree.simplify().unwrap_err();
    assert_eq!(err.code, RngErrorCode::StartNotFoundInGrammar);
    assert_eq!(err.to_string(), "Grammar should begin with start");
}

#[test]
fn not_allowed_attribute_erases_the_enclosing_group_branch() {
    let mut tree = parse_grammar_str(
        r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
             <choice>
               <group>
                 <attribute name="bad"><notAllowed/></attribute>
                 <element name="a"><empty/></element>
               </group>
               <element name="b"><empty/></element>
             </choice>
           </element>"#,
    )
    .unwrap();
    tree.simplify().unwrap();
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start><ref name=\"elem__1\"/></start>\
         <define name=\"elem__1\"><element><name>doc</name><ref name=\"elem__3\"/></element></define>\
         <define name=\"elem__3\"><element><name>b</name><empty/></element></define>\
         </grammar>"
    );
}

#[test]
fn one_or_more_of_empty_collapses() {
    let mut tree = parse_grammar_str(
        r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
             <oneOrMore><empty/></oneOrMore>
           </element>"#,
    )
    .unwrap();
    tree.simplify().unwrap();
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start><ref name=\"elem__1\"/></start>\
         <define name=\"elem__1\"><element><name>doc</name><empty/></element></define>\
         </grammar>"
    );
}

#[test]
fn defines_carry_their_combine_fold() {
    let mut tree = parse_grammar_str(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <start><element name="doc"><ref name="inline"/></element></start>
             <define name="inline" combine="choice"><element name="b"><text/></element></define>
             <define name="inline"><element name="i"><text/></element></define>
           </grammar>"#,
    )
    .unwrap();
    tree.simplify().unwrap();
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start><ref name=\"elem__1\"/></start>\
         <define name=\"elem__1\"><element><name>doc</name>\
         <choice><ref name=\"elem__2\"/><ref name=\"elem__3\"/></choice></element></define>\
         <define name=\"elem__2\"><element><name>i</name><text/></element></define>\
         <define name=\"elem__3\"><element><name>b</name><text/></element></define>\
         </grammar>"
    );
}

#[test]
fn builder_combine_values_round_trip_through_display() {
    let mut tree = PatternTree::new();
    let text = tree.text();
    let start = tree.start(Some(Combine::Interleave), text);
    let grammar = tree.grammar(vec![start]);
    tree.set_root(grammar);
    assert_eq!(
        tree.to_string(),
        "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">\
         <start combine=\"interleave\"><text/></start></grammar>"
    );
}
