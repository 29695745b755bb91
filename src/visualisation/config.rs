//! The visualisation-line grammar: `[flags] $"attr" "Channel" with "p" = v`.
//!
//! Grounded on the same source the transform-line grammar comes from
//! (`graphtransformconfigparser.cpp`'s shared `attributeParameter` rule) —
//! the `with` clause here is parsed by [`crate::transform::config::parse_with_clause`],
//! the same routine the transform grammar uses, since both share the
//! identical back-to-back-no-separator parameter syntax.

use crate::attribute::name::parse_attribute_name_ref_from_lexer;
use crate::error::ParseError;
use crate::lexing::Lexer;
use crate::transform::config::{parse_flags, parse_with_clause};
use crate::transform::Parameter;

#[derive(Debug, Clone, PartialEq)]
pub struct VisualisationConfig {
    pub flags: Vec<String>,
    pub attribute_name: String,
    pub channel_name: String,
    pub parameters: Vec<Parameter>,
}

impl VisualisationConfig {
    pub fn is_flag_set(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Parse one visualisation line. Like [`crate::transform::parse_transform_config`],
/// the whole input must be consumed.
pub fn parse_visualisation_config(text: &str) -> Result<VisualisationConfig, ParseError> {
    let mut lexer = Lexer::new(text);

    let flags = parse_flags(&mut lexer)?;

    lexer.skip_ws();
    if !lexer.try_consume_char('$') {
        return Err(ParseError::Expected { expected: "'$' attribute reference", found: lexer.rest().to_string() });
    }
    let name_ref = parse_attribute_name_ref_from_lexer(&mut lexer)?;
    let attribute_name = name_ref.to_canonical_string();

    lexer.skip_ws();
    let channel_name = lexer.parse_quoted_string_or_identifier()?;

    let parameters = parse_with_clause(&mut lexer)?;

    lexer.skip_ws();
    if !lexer.at_end() {
        return Err(ParseError::Malformed { kind: "visualisation config", input: text.to_string() });
    }

    Ok(VisualisationConfig { flags, attribute_name, channel_name, parameters })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_line() {
        let config = parse_visualisation_config("$\"Betweenness\" \"Colour\"").unwrap();
        assert_eq!(config.attribute_name, "Betweenness");
        assert_eq!(config.channel_name, "Colour");
        assert!(config.flags.is_empty());
        assert!(config.parameters.is_empty());
    }

    #[test]
    fn parses_flags_and_parameters() {
        let config = parse_visualisation_config(
            "[invert, component] $\"Degree\" \"Size\" with \"mapping\" = \"exponent\" \"minSize\" = 1.0",
        )
        .unwrap();
        assert!(config.is_flag_set("invert"));
        assert!(config.is_flag_set("component"));
        assert_eq!(config.parameter_by_name("mapping").unwrap().value_as_string(false), "exponent");
        assert_eq!(config.parameter_by_name("minSize").unwrap().value_as_string(false), "1.0");
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_visualisation_config("$\"Degree\" \"Size\" extra").is_err());
    }
}
