//! The XML document tree consumed by the validator, and the adapters that
//! produce both trees from wire-form XML.
//!
//! Like the grammar tree, the document is a flat arena addressed by index.
//! Each node carries a `problems` slot where the validator accumulates
//! diagnostics; `collect_problems` reads them back in document order.

use std::collections::BTreeMap;

use crate::{
    ast::{Combine, PatternTree},
    error::RngError,
};

#[derive(Debug, Clone)]
pub enum XmlNodeKind {
    Element {
        name: Box<str>,
        attributes: BTreeMap<String, String>,
    },
    Text(Box<str>),
    /// Comments, processing instructions and the like: not element, not text.
    Other,
}

#[derive(Debug, Clone)]
pub struct XmlNode {
    pub kind: XmlNodeKind,
    pub children: Vec<usize>,
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    nodes: Vec<XmlNode>,
    root: usize,
}

impl XmlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an XML document into the annotated tree. Whitespace-only text
    /// nodes are dropped; comments and processing instructions survive as
    /// `Other` nodes.
    pub fn parse_str(text: &str) -> Result<Self, RngError> {
        let doc =
            roxmltree::Document::parse(text).map_err(|err| RngError::xml_parse_failure(err))?;
        let mut root_elements = doc.root().children().filter(|node| node.is_element());
        let (Some(root), None) = (root_elements.next(), root_elements.next()) else {
            return Err(RngError::multiple_top_level_elements());
        };

        let mut document = Self::new();
        let Some(root) = document.convert(root) else {
            unreachable!("the root element always converts");
        };
        document.root = root;
        Ok(document)
    }

    fn convert(&mut self, node: roxmltree::Node) -> Option<usize> {
        if node.is_element() {
            let name = node.tag_name().name();
            let attributes = node
                .attributes()
                .map(|att| (att.name().to_string(), att.value().to_string()))
                .collect();
            let mut children = vec![];
            for child in node.children() {
                if let Some(id) = self.convert(child) {
                    children.push(id);
                }
            }
            Some(self.push_kind(
                XmlNodeKind::Element {
                    name: name.into(),
                    attributes,
                },
                children,
            ))
        } else if node.is_text() {
            let data = node.text().unwrap_or("");
            if data.chars().all(char::is_whitespace) {
                None
            } else {
                Some(self.text(data))
            }
        } else if node.is_comment() || node.is_pi() {
            Some(self.other())
        } else {
            None
        }
    }

    fn push_kind(&mut self, kind: XmlNodeKind, children: Vec<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(XmlNode {
            kind,
            children,
            problems: vec![],
        });
        id
    }

    pub fn element(&mut self, name: &str, attributes: &[(&str, &str)], children: Vec<usize>) -> usize {
        let attributes = attributes
            .iter()
            .map(|&(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.push_kind(
            XmlNodeKind::Element {
                name: name.into(),
                attributes,
            },
            children,
        )
    }

    pub fn text(&mut self, data: &str) -> usize {
        self.push_kind(XmlNodeKind::Text(data.into()), vec![])
    }

    pub fn other(&mut self) -> usize {
        self.push_kind(XmlNodeKind::Other, vec![])
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn set_root(&mut self, id: usize) {
        assert!(id < self.nodes.len());
        self.root = id;
    }

    pub fn node(&self, id: usize) -> &XmlNode {
        &self.nodes[id]
    }

    pub fn is_element(&self, id: usize) -> bool {
        matches!(self.nodes[id].kind, XmlNodeKind::Element { .. })
    }

    pub fn is_text(&self, id: usize) -> bool {
        matches!(self.nodes[id].kind, XmlNodeKind::Text(_))
    }

    /// Short description of a node for diagnostics: the element's name,
    /// `text`, or `node`.
    pub(crate) fn describe(&self, id: usize) -> &str {
        match &self.nodes[id].kind {
            XmlNodeKind::Element { name, .. } => name,
            XmlNodeKind::Text(_) => "text",
            XmlNodeKind::Other => "node",
        }
    }

    /// Cloned-out name, attribute map and children of an element node.
    pub(crate) fn element_parts(
        &self,
        id: usize,
    ) -> (String, BTreeMap<String, String>, Vec<usize>) {
        let XmlNodeKind::Element { name, attributes } = &self.nodes[id].kind else {
            unreachable!("element_parts on a non-element node");
        };
        (
            name.to_string(),
            attributes.clone(),
            self.nodes[id].children.clone(),
        )
    }

    pub(crate) fn add_problem(&mut self, id: usize, problem: String) {
        self.nodes[id].problems.push(problem);
    }

    pub fn problems(&self, id: usize) -> &[String] {
        &self.nodes[id].problems
    }

    /// Gather `(node, message)` annotations, in document order when
    /// `recursive` is set.
    pub fn collect_problems(&self, id: usize, recursive: bool) -> Vec<(usize, String)> {
        let mut out = vec![];
        self.collect_into(id, recursive, &mut out);
        out
    }

    fn collect_into(&self, id: usize, recursive: bool, out: &mut Vec<(usize, String)>) {
        for problem in &self.nodes[id].problems {
            out.push((id, problem.clone()));
        }
        if recursive {
            for &child in &self.nodes[id].children {
                self.collect_into(child, true, out);
            }
        }
    }
}

fn is_rng(node: &roxmltree::Node) -> bool {
    node.is_element()
        && node
            .tag_name()
            .namespace()
            .is_none_or(|ns| ns == crate::XML_RELAX_NG_NAMESPACE)
}

/// Parse the RNG XML wire form into the full-syntax AST.
///
/// Whitespace-only text and foreign-namespaced elements (documentation
/// annotations included) are stripped; wire constructs outside the supported
/// subset are rejected.
pub fn parse_grammar_str(text: &str) -> Result<PatternTree, RngError> {
    let doc = roxmltree::Document::parse(text).map_err(|err| RngError::xml_parse_failure(err))?;
    let root = doc.root_element();
    if !is_rng(&root) {
        return Err(RngError::unsupported_construct(root.tag_name().name()));
    }

    let mut tree = PatternTree::new();
    let id = build_pattern(&mut tree, root)?;
    tree.set_root(id);
    Ok(tree)
}

fn rng_children<'a, 'input>(node: roxmltree::Node<'a, 'input>) -> Vec<roxmltree::Node<'a, 'input>> {
    node.children().filter(|ch| is_rng(ch)).collect()
}

fn build_patterns(
    tree: &mut PatternTree,
    nodes: &[roxmltree::Node],
) -> Result<Vec<usize>, RngError> {
    let mut patterns = vec![];
    for &node in nodes {
        patterns.push(build_pattern(tree, node)?);
    }
    Ok(patterns)
}

fn build_pattern(tree: &mut PatternTree, node: roxmltree::Node) -> Result<usize, RngError> {
    let local = node.tag_name().name();
    match local {
        "element" => {
            let children = rng_children(node);
            if let Some(name) = node.attribute("name") {
                let patterns = build_patterns(tree, &children)?;
                Ok(tree.element_named(name.trim(), patterns))
            } else {
                let Some((&name_class, rest)) = children.split_first() else {
                    return Err(RngError::xml_parse_failure(
                        "element requires a name attribute or a name class child",
                    ));
                };
                let name_class = build_name_class(tree, name_class)?;
                let patterns = build_patterns(tree, rest)?;
                Ok(tree.element(name_class, patterns))
            }
        }
        "attribute" => {
            let children = rng_children(node);
            if let Some(name) = node.attribute("name") {
                if children.len() > 1 {
                    return Err(RngError::xml_parse_failure(
                        "attribute takes at most one content pattern",
                    ));
                }
                let pattern = match children.first() {
                    Some(&pattern) => Some(build_pattern(tree, pattern)?),
                    None => None,
                };
                Ok(tree.attribute_named(name.trim(), pattern))
            } else {
                let Some((&name_class, rest)) = children.split_first() else {
                    return Err(RngError::xml_parse_failure(
                        "attribute requires a name attribute or a name class child",
                    ));
                };
                if rest.len() > 1 {
                    return Err(RngError::xml_parse_failure(
                        "attribute takes at most one content pattern",
                    ));
                }
                let name_class = build_name_class(tree, name_class)?;
                let pattern = match rest.first() {
                    Some(&pattern) => Some(build_pattern(tree, pattern)?),
                    None => None,
                };
                Ok(tree.attribute(name_class, pattern))
            }
        }
        "group" => {
            let patterns = build_patterns(tree, &rng_children(node))?;
            Ok(tree.group(patterns))
        }
        "interleave" => {
            let patterns = build_patterns(tree, &rng_children(node))?;
            Ok(tree.interleave(patterns))
        }
        "choice" => {
            let patterns = build_patterns(tree, &rng_children(node))?;
            Ok(tree.choice(patterns))
        }
        "optional" => {
            let patterns = build_patterns(tree, &rng_children(node))?;
            Ok(tree.optional(patterns))
        }
        "zeroOrMore" => {
            let patterns = build_patterns(tree, &rng_children(node))?;
            Ok(tree.zero_or_more(patterns))
        }
        "oneOrMore" => {
            let patterns = build_patterns(tree, &rng_children(node))?;
            Ok(tree.one_or_more(patterns))
        }
        "mixed" => {
            let patterns = build_patterns(tree, &rng_children(node))?;
            Ok(tree.mixed(patterns))
        }
        "ref" => match node.attribute("name") {
            Some(name) => Ok(tree.ref_to(name.trim())),
            None => Err(RngError::xml_parse_failure("ref requires a name attribute")),
        },
        "parentRef" => match node.attribute("name") {
            Some(name) => Ok(tree.parent_ref(name.trim())),
            None => Err(RngError::xml_parse_failure(
                "parentRef requires a name attribute",
            )),
        },
        "empty" => Ok(tree.empty()),
        "text" => Ok(tree.text()),
        "notAllowed" => Ok(tree.not_allowed()),
        "value" => Ok(tree.value(node.text().unwrap_or(""))),
        "data" => {
            // datatype parameters and except patterns are out of scope
            if let Some(child) = rng_children(node).first() {
                return Err(RngError::unsupported_construct(child.tag_name().name()));
            }
            Ok(tree.data(node.attribute("type").unwrap_or("")))
        }
        "grammar" => {
            let mut content = vec![];
            for child in rng_children(node) {
                content.push(build_grammar_content(tree, child)?);
            }
            Ok(tree.grammar(content))
        }
        _ => Err(RngError::unsupported_construct(local)),
    }
}

fn build_grammar_content(tree: &mut PatternTree, node: roxmltree::Node) -> Result<usize, RngError> {
    let local = node.tag_name().name();
    match local {
        "start" => {
            let combine = parse_combine(node)?;
            let children = rng_children(node);
            let Some((&pattern, [])) = children.split_first() else {
                return Err(RngError::xml_parse_failure(
                    "start takes exactly one pattern",
                ));
            };
            let pattern = build_pattern(tree, pattern)?;
            Ok(tree.start(combine, pattern))
        }
        "define" => {
            let Some(name) = node.attribute("name") else {
                return Err(RngError::xml_parse_failure(
                    "define requires a name attribute",
                ));
            };
            let combine = parse_combine(node)?;
            let patterns = build_patterns(tree, &rng_children(node))?;
            if patterns.is_empty() {
                return Err(RngError::xml_parse_failure(
                    "define takes at least one pattern",
                ));
            }
            Ok(tree.define(name.trim(), combine, patterns))
        }
        _ => Err(RngError::unsupported_construct(local)),
    }
}

fn parse_combine(node: roxmltree::Node) -> Result<Option<Combine>, RngError> {
    match node.attribute("combine") {
        None => Ok(None),
        Some("choice") => Ok(Some(Combine::Choice)),
        Some("interleave") => Ok(Some(Combine::Interleave)),
        Some(other) => Err(RngError::invalid_combine(other)),
    }
}

fn build_name_class(tree: &mut PatternTree, node: roxmltree::Node) -> Result<usize, RngError> {
    let local = node.tag_name().name();
    match local {
        "name" => Ok(tree.name(node.text().unwrap_or("").trim())),
        "anyName" => {
            let children = rng_children(node);
            let except = match children.first() {
                Some(&except) => {
                    if except.tag_name().name() != "except" {
                        return Err(RngError::unsupported_construct(except.tag_name().name()));
                    }
                    let inner = rng_children(except);
                    let Some((&name_class, [])) = inner.split_first() else {
                        return Err(RngError::xml_parse_failure(
                            "except takes exactly one name class",
                        ));
                    };
                    let name_class = build_name_class(tree, name_class)?;
                    Some(tree.except_name_class(name_class))
                }
                None => None,
            };
            Ok(tree.any_name(except))
        }
        "choice" => {
            let children = rng_children(node);
            let [left, right] = children[..] else {
                return Err(RngError::xml_parse_failure(
                    "name class choice takes exactly two name classes",
                ));
            };
            let left = build_name_class(tree, left)?;
            let right = build_name_class(tree, right)?;
            Ok(tree.name_choice(left, right))
        }
        _ => Err(RngError::unsupported_construct(local)),
    }
}
