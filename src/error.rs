use std::borrow::Cow;

/// Machine-readable classification of a structural error.
///
/// Structural errors indicate a malformed grammar (or an unusable request
/// against one) and abort the operation that raised them. They are distinct
/// from document diagnostics, which are accumulated as strings on the
/// offending XML node and never abort validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RngErrorCode {
    // adapter errors
    XmlParseFailure,
    UnsupportedConstruct,
    MultipleTopLevelElements,
    InvalidCombine,
    // simplifier errors
    StartNotFoundInGrammar,
    MultipleStartWithoutCombine,
    MultipleStartWithDifferentCombine,
    MultipleDefineWithoutCombine,
    MultipleDefineWithDifferentCombine,
    RefOutsideGrammar,
    ParentRefWithoutParentGrammar,
    UnknownDefinition,
    NotSimplified,
    // validator errors
    UnsupportedPattern,
    UnexpectedNodeKind,
}

impl std::fmt::Display for RngErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A structural error: the error code plus the exact human-readable message.
#[derive(Debug, Clone)]
pub struct RngError {
    pub code: RngErrorCode,
    pub message: Cow<'static, str>,
}

impl RngError {
    pub fn new(code: RngErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn xml_parse_failure(detail: impl std::fmt::Display) -> Self {
        Self::new(
            RngErrorCode::XmlParseFailure,
            format!("Failed to parse XML: {detail}"),
        )
    }

    pub fn unsupported_construct(name: &str) -> Self {
        Self::new(
            RngErrorCode::UnsupportedConstruct,
            format!("Unsupported construct: {name}"),
        )
    }

    pub fn multiple_top_level_elements() -> Self {
        Self::new(
            RngErrorCode::MultipleTopLevelElements,
            "Must have exactly one top level element",
        )
    }

    pub fn invalid_combine(value: &str) -> Self {
        Self::new(
            RngErrorCode::InvalidCombine,
            format!("Invalid combine value: {value}"),
        )
    }

    pub fn start_not_found() -> Self {
        Self::new(
            RngErrorCode::StartNotFoundInGrammar,
            "Grammar should begin with start",
        )
    }

    pub fn multiple_starts_without_combine() -> Self {
        Self::new(
            RngErrorCode::MultipleStartWithoutCombine,
            "Cannot have multiple starts without specifying combine",
        )
    }

    pub fn multiple_starts_with_different_combine() -> Self {
        Self::new(
            RngErrorCode::MultipleStartWithDifferentCombine,
            "Cannot have multiple starts with different combine values",
        )
    }

    pub fn multiple_defines_without_combine(name: &str) -> Self {
        Self::new(
            RngErrorCode::MultipleDefineWithoutCombine,
            format!("Cannot have multiple defines named {name} without specifying combine"),
        )
    }

    pub fn multiple_defines_with_different_combine(name: &str) -> Self {
        Self::new(
            RngErrorCode::MultipleDefineWithDifferentCombine,
            format!("Cannot have multiple defines named {name} with different combine values"),
        )
    }

    pub fn ref_outside_grammar() -> Self {
        Self::new(
            RngErrorCode::RefOutsideGrammar,
            "Each ref or parentRef must be within a grammar",
        )
    }

    pub fn parent_ref_without_parent_grammar() -> Self {
        Self::new(
            RngErrorCode::ParentRefWithoutParentGrammar,
            "parentRef has no enclosing parent grammar",
        )
    }

    pub fn unknown_definition(name: &str) -> Self {
        Self::new(
            RngErrorCode::UnknownDefinition,
            format!("Referencing unknown definition: {name}"),
        )
    }

    pub fn not_simplified() -> Self {
        Self::new(
            RngErrorCode::NotSimplified,
            "Not valid as simplified RelaxNG",
        )
    }

    pub fn unsupported_pattern(detail: &'static str) -> Self {
        Self::new(RngErrorCode::UnsupportedPattern, detail)
    }

    pub fn unexpected_node_kind(kind: &str) -> Self {
        Self::new(
            RngErrorCode::UnexpectedNodeKind,
            format!("Cannot match against node kind: {kind}"),
        )
    }
}

impl std::fmt::Display for RngError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RngError {}
