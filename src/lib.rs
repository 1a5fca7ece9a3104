//! APIs for simplifying RELAX NG schemas and validating XML document trees
//! against them.
//!
//! A grammar enters as the full-syntax AST ([`ast::PatternTree`]), is reduced
//! to the canonical simple form by [`ast::PatternTree::simplify`] (certified
//! by [`check::is_simple_form`]), and drives [`validate::Validator`] over an
//! [`xml::XmlDocument`], annotating problematic nodes with diagnostics.
//!
//! Schemas using `list`, `externalRef`, `include` or `div`, datatype
//! parameters, and name classes beyond literal names are out of scope and
//! rejected at the adapter.
//!
//! # Reference
//! - RELAX NG specification, committee specification 2001-12-03

pub mod ast;
pub mod check;
pub mod error;
mod simplify;
pub mod validate;
pub mod xml;

use crate::{ast::PatternTree, error::RngError, validate::Validator, xml::XmlDocument};

pub const XML_RELAX_NG_NAMESPACE: &str = "http://relaxng.org/ns/structure/1.0";

/// A parsed, simplified and certified schema.
pub struct Schema {
    tree: PatternTree,
}

impl Schema {
    /// Parse `schema` from the RNG XML wire form and reduce it to simple
    /// form. Returns [`Err`] if the document cannot be parsed or the grammar
    /// cannot be simplified.
    pub fn parse_str(schema: &str) -> Result<Self, RngError> {
        let mut tree = xml::parse_grammar_str(schema)?;
        tree.simplify()?;
        Ok(Self { tree })
    }

    /// Wrap an already-built grammar tree, simplifying it first.
    pub fn from_tree(mut tree: PatternTree) -> Result<Self, RngError> {
        tree.simplify()?;
        Ok(Self { tree })
    }

    pub fn tree(&self) -> &PatternTree {
        &self.tree
    }

    pub fn validator(&self) -> Result<Validator<'_>, RngError> {
        Validator::new(&self.tree)
    }

    /// Validate `document` against this schema's `start` pattern.
    pub fn validate(&self, document: &mut XmlDocument) -> Result<bool, RngError> {
        self.validator()?.validate(document)
    }
}
