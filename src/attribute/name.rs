//! The attribute-name grammar.
//!
//! ```text
//! attributeNameRef := ("source." | "target.")? baseName ("." param)*
//! baseName, param  := identifier | quotedString
//! ```
//!
//! The leading `$` used inside condition/transform text (§4.3) is stripped
//! by the caller before this parser runs; this module only resolves the
//! *name* grammar itself, shared between condition attribute references and
//! the `using` clause of a transform line.

use crate::error::ParseError;
use crate::lexing::Lexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEndpointPrefix {
    /// No `source.`/`target.` prefix.
    None,
    Source,
    Target,
}

/// A resolved reference to an attribute, possibly qualified by an edge
/// endpoint prefix and/or parameterised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNameRef {
    pub prefix: EdgeEndpointPrefix,
    pub base_name: String,
    pub parameters: Vec<String>,
}

impl AttributeNameRef {
    /// Normalise dots in `base_name` to underscores (dots are reserved as
    /// the parameter separator); uniquification against existing names is
    /// the caller's responsibility (it needs the full registry).
    pub fn dot_normalised_base_name(&self) -> String {
        self.base_name.replace('.', "_")
    }

    /// The canonical textual form, e.g. `source.Label.units`.
    pub fn to_canonical_string(&self) -> String {
        let mut s = String::new();
        match self.prefix {
            EdgeEndpointPrefix::None => {}
            EdgeEndpointPrefix::Source => s.push_str("source."),
            EdgeEndpointPrefix::Target => s.push_str("target."),
        }
        s.push_str(&quote_if_needed(&self.base_name));
        for param in &self.parameters {
            s.push('.');
            s.push_str(&quote_if_needed(param));
        }
        s
    }
}

fn quote_if_needed(s: &str) -> String {
    let plain_identifier = !s.is_empty()
        && s.chars().next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain_identifier {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('"', "\\\""))
    }
}

/// Name validity per §4.2: non-empty, matches `[A-Za-z_][A-Za-z0-9_]*` for
/// the unquoted form. Quoted names may contain arbitrary characters.
pub fn is_valid_unquoted_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses the attribute-name grammar starting at the lexer's current
/// position, leaving the lexer positioned right after it — used by the
/// transform-config/condition parser, which needs to keep consuming the
/// surrounding text afterwards.
pub(crate) fn parse_attribute_name_ref_from_lexer(lexer: &mut Lexer) -> Result<AttributeNameRef, ParseError> {
    let prefix = if lexer.try_consume_literal("source.") {
        EdgeEndpointPrefix::Source
    } else if lexer.try_consume_literal("target.") {
        EdgeEndpointPrefix::Target
    } else {
        EdgeEndpointPrefix::None
    };

    let base_name = lexer.parse_quoted_string_or_identifier()?;

    let mut parameters = Vec::new();
    while lexer.try_consume_char('.') {
        parameters.push(lexer.parse_quoted_string_or_identifier()?);
    }

    Ok(AttributeNameRef { prefix, base_name, parameters })
}

pub fn parse_attribute_name_ref(text: &str) -> Result<AttributeNameRef, ParseError> {
    let mut lexer = Lexer::new(text);
    let name_ref = parse_attribute_name_ref_from_lexer(&mut lexer)?;

    if !lexer.at_end() {
        return Err(ParseError::Malformed { kind: "attribute name", input: text.to_string() });
    }

    Ok(name_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_name() {
        let r = parse_attribute_name_ref("Weight").unwrap();
        assert_eq!(r.prefix, EdgeEndpointPrefix::None);
        assert_eq!(r.base_name, "Weight");
        assert!(r.parameters.is_empty());
    }

    #[test]
    fn parses_source_prefixed_and_parameterised() {
        let r = parse_attribute_name_ref("source.Label.units").unwrap();
        assert_eq!(r.prefix, EdgeEndpointPrefix::Source);
        assert_eq!(r.base_name, "Label");
        assert_eq!(r.parameters, vec!["units".to_string()]);
    }

    #[test]
    fn parses_quoted_parameter_with_spaces() {
        let r = parse_attribute_name_ref(r#"Size."display units""#).unwrap();
        assert_eq!(r.parameters, vec!["display units".to_string()]);
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_attribute_name_ref("Weight extra").is_err());
    }

    #[test]
    fn dot_normalisation_replaces_dots() {
        let r = AttributeNameRef { prefix: EdgeEndpointPrefix::None, base_name: "a.b".into(), parameters: vec![] };
        assert_eq!(r.dot_normalised_base_name(), "a_b");
    }
}
