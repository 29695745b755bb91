//! The transform-line grammar: `[flags] action using $attr with "p" = v where condition`.
//!
//! Grounded on `graphtransformconfigparser.cpp`'s Boost.Spirit.X3 grammar
//! (`transform_def`, `parameter_def`, `condition_def` and friends) and
//! `graphtransformconfig.cpp`'s `asString`/`equals`. The x3 rule structure
//! becomes ordinary recursive descent here via [`crate::lexing::Lexer`],
//! same as the attribute-name grammar.

use crate::condition::{
    Condition, CompoundCondition, EqualityOp, Literal, LogicalOp, NumericalOp, StringOp, TerminalCondition,
    TerminalOp, UnaryCondition, UnaryOp, ValueOperand,
};
use crate::error::ParseError;
use crate::lexing::Lexer;

pub type ParameterValue = Literal;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
}

impl Parameter {
    /// `valueAsString`; `add_quotes` wraps string values in escaped quotes,
    /// matching the non-display canonical form.
    pub fn value_as_string(&self, add_quotes: bool) -> String {
        match &self.value {
            ParameterValue::Float(f) => format!("{f:?}"),
            ParameterValue::Int(i) => i.to_string(),
            ParameterValue::String(s) if add_quotes => format!("\"{}\"", s.replace('"', "\\\"")),
            ParameterValue::String(s) => s.clone(),
        }
    }
}

/// A single parsed transform line, as it would appear in a `.graphia`
/// document's transform list.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    pub flags: Vec<String>,
    pub action: String,
    /// Attribute names referenced via `using $attr`, without the leading `$`.
    pub attributes: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub condition: Condition,
}

impl TransformConfig {
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name)
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_has_value(&self, name: &str, value: &str) -> bool {
        self.parameter_by_name(name).map(|p| p.value_as_string(false) == value).unwrap_or(false)
    }

    pub fn set_parameter_value(&mut self, name: &str, value: ParameterValue) {
        if let Some(p) = self.parameters.iter_mut().find(|p| p.name == name) {
            p.value = value;
        } else {
            self.parameters.push(Parameter { name: name.to_string(), value });
        }
    }

    pub fn has_condition(&self) -> bool {
        !matches!(self.condition, Condition::None)
    }

    pub fn is_flag_set(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Attribute names referenced anywhere: the `using` list plus any
    /// attribute operands inside the condition.
    pub fn referenced_attribute_names(&self) -> Vec<String> {
        let mut names = self.attributes.clone();
        collect_condition_attribute_names(&self.condition, &mut names);
        names
    }

    /// Structural equality that ignores `locked`/`pinned` flags, which don't
    /// change a transform's effect — only its presentation. Used to decide
    /// whether a transform result can be served from cache.
    pub fn equals(&self, other: &TransformConfig, ignore_inert_flags: bool) -> bool {
        let inert = ["locked", "pinned"];
        let relevant_flags = |flags: &[String]| -> Vec<&str> {
            flags.iter().map(String::as_str).filter(|f| !ignore_inert_flags || !inert.contains(f)).collect()
        };

        self.action == other.action
            && self.parameters == other.parameters
            && relevant_flags(&self.flags) == relevant_flags(&other.flags)
            && self.attributes == other.attributes
            && self.condition == other.condition
    }

    /// The canonical non-display textual form this config would parse back
    /// from, e.g. `[locked] "Filter" using $"Weight" with "min" = 1.0 where $Weight > 1.0`.
    pub fn to_canonical_string(&self) -> String {
        let mut s = String::new();

        if !self.flags.is_empty() {
            s.push('[');
            s.push_str(&self.flags.join(", "));
            s.push_str("] ");
        }

        s.push('"');
        s.push_str(&self.action.replace('"', "\\\""));
        s.push('"');

        if !self.attributes.is_empty() {
            s.push_str(" using");
            for attribute in &self.attributes {
                s.push_str(" $\"");
                s.push_str(attribute);
                s.push('"');
            }
        }

        if !self.parameters.is_empty() {
            s.push_str(" with");
            for parameter in &self.parameters {
                s.push_str(&format!(" \"{}\" = {}", parameter.name, parameter.value_as_string(true)));
            }
        }

        if self.has_condition() {
            s.push_str(" where ");
            s.push_str(&condition_as_string(&self.condition));
        }

        s
    }
}

fn collect_condition_attribute_names(condition: &Condition, names: &mut Vec<String>) {
    let operand_name = |operand: &ValueOperand, names: &mut Vec<String>| {
        if let ValueOperand::AttributeRef(name_ref) = operand {
            names.push(name_ref.base_name.clone());
        }
    };

    match condition {
        Condition::None => {}
        Condition::Terminal(t) => {
            operand_name(&t.lhs, names);
            operand_name(&t.rhs, names);
        }
        Condition::Unary(u) => operand_name(&u.lhs, names),
        Condition::Compound(c) => {
            collect_condition_attribute_names(&c.lhs, names);
            collect_condition_attribute_names(&c.rhs, names);
        }
    }
}

fn operand_as_string(operand: &ValueOperand) -> String {
    match operand {
        ValueOperand::Literal(Literal::Float(f)) => format!("{f:?}"),
        ValueOperand::Literal(Literal::Int(i)) => i.to_string(),
        ValueOperand::Literal(Literal::String(s)) => format!("\"{}\"", s.replace('"', "\\\"")),
        ValueOperand::AttributeRef(name_ref) => format!("${}", name_ref.to_canonical_string()),
    }
}

fn terminal_op_as_string(op: TerminalOp) -> &'static str {
    match op {
        TerminalOp::Equality(EqualityOp::Equal) => "==",
        TerminalOp::Equality(EqualityOp::NotEqual) => "!=",
        TerminalOp::Numerical(NumericalOp::LessThan) => "<",
        TerminalOp::Numerical(NumericalOp::GreaterThan) => ">",
        TerminalOp::Numerical(NumericalOp::LessThanOrEqual) => "<=",
        TerminalOp::Numerical(NumericalOp::GreaterThanOrEqual) => ">=",
        TerminalOp::String(StringOp::Includes) => "includes",
        TerminalOp::String(StringOp::Excludes) => "excludes",
        TerminalOp::String(StringOp::Starts) => "starts",
        TerminalOp::String(StringOp::Ends) => "ends",
        TerminalOp::String(StringOp::MatchesRegex) => "matches",
        TerminalOp::String(StringOp::MatchesRegexCaseInsensitive) => "matchesCaseInsensitive",
    }
}

fn logical_op_as_string(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "and",
        LogicalOp::Or => "or",
    }
}

fn condition_as_string(condition: &Condition) -> String {
    match condition {
        Condition::None => String::new(),
        Condition::Terminal(t) => {
            format!("{} {} {}", operand_as_string(&t.lhs), terminal_op_as_string(t.op), operand_as_string(&t.rhs))
        }
        Condition::Unary(u) => format!("{} hasValue", operand_as_string(&u.lhs)),
        Condition::Compound(c) => {
            format!("{} {} {}", condition_as_string(&c.lhs), logical_op_as_string(c.op), condition_as_string(&c.rhs))
        }
    }
}

const EQUALITY_OPS: &[(&str, EqualityOp)] = &[("==", EqualityOp::Equal), ("!=", EqualityOp::NotEqual)];
const NUMERICAL_OPS: &[(&str, NumericalOp)] = &[
    ("<=", NumericalOp::LessThanOrEqual),
    (">=", NumericalOp::GreaterThanOrEqual),
    ("<", NumericalOp::LessThan),
    (">", NumericalOp::GreaterThan),
];
const STRING_OPS: &[(&str, StringOp)] = &[
    ("matchesCaseInsensitive", StringOp::MatchesRegexCaseInsensitive),
    ("matches", StringOp::MatchesRegex),
    ("includes", StringOp::Includes),
    ("excludes", StringOp::Excludes),
    ("starts", StringOp::Starts),
    ("ends", StringOp::Ends),
];

fn try_consume_terminal_op(lexer: &mut Lexer) -> Option<TerminalOp> {
    lexer.skip_ws();
    for (text, op) in EQUALITY_OPS {
        if lexer.try_consume_symbol(&[*text]).is_some() {
            return Some(TerminalOp::Equality(*op));
        }
    }
    for (text, op) in NUMERICAL_OPS {
        if lexer.try_consume_symbol(&[*text]).is_some() {
            return Some(TerminalOp::Numerical(*op));
        }
    }
    for (text, op) in STRING_OPS {
        if lexer.try_consume_keyword(text) {
            return Some(TerminalOp::String(*op));
        }
    }
    None
}

fn try_consume_logical_op(lexer: &mut Lexer) -> Option<LogicalOp> {
    lexer.skip_ws();
    if lexer.try_consume_keyword("and") || lexer.try_consume_symbol(&["&&"]).is_some() {
        return Some(LogicalOp::And);
    }
    if lexer.try_consume_keyword("or") || lexer.try_consume_symbol(&["||"]).is_some() {
        return Some(LogicalOp::Or);
    }
    None
}

fn parse_value_operand(lexer: &mut Lexer) -> Result<ValueOperand, ParseError> {
    lexer.skip_ws();
    if lexer.try_consume_char('$') {
        let name_ref = crate::attribute::name::parse_attribute_name_ref_from_lexer(lexer)?;
        return Ok(ValueOperand::AttributeRef(name_ref));
    }
    if let Some(f) = lexer.parse_strict_double() {
        return Ok(ValueOperand::Literal(Literal::Float(f)));
    }
    if let Some(i) = lexer.parse_int() {
        return Ok(ValueOperand::Literal(Literal::Int(i)));
    }
    let s = lexer.parse_quoted_string_or_identifier()?;
    Ok(ValueOperand::Literal(Literal::String(s)))
}

fn parse_operand(lexer: &mut Lexer) -> Result<Condition, ParseError> {
    lexer.skip_ws();
    if lexer.try_consume_char('(') {
        let inner = parse_condition(lexer)?;
        lexer.skip_ws();
        if !lexer.try_consume_char(')') {
            return Err(ParseError::Expected { expected: "')'", found: lexer.rest().to_string() });
        }
        return Ok(inner);
    }

    let lhs = parse_value_operand(lexer)?;
    lexer.skip_ws();
    if let Some(op) = try_consume_terminal_op(lexer) {
        let rhs = parse_value_operand(lexer)?;
        return Ok(Condition::Terminal(TerminalCondition { lhs, op, rhs }));
    }
    if lexer.try_consume_keyword("hasValue") {
        return Ok(Condition::Unary(UnaryCondition { lhs, op: UnaryOp::HasValue }));
    }

    Err(ParseError::Expected { expected: "comparison operator or 'hasValue'", found: lexer.rest().to_string() })
}

fn parse_condition(lexer: &mut Lexer) -> Result<Condition, ParseError> {
    let lhs = parse_operand(lexer)?;
    lexer.skip_ws();
    if let Some(op) = try_consume_logical_op(lexer) {
        let rhs = parse_operand(lexer)?;
        return Ok(Condition::Compound(CompoundCondition { lhs: Box::new(lhs), op, rhs: Box::new(rhs) }));
    }
    Ok(lhs)
}

pub(crate) fn parse_flags(lexer: &mut Lexer) -> Result<Vec<String>, ParseError> {
    lexer.skip_ws();
    if !lexer.try_consume_char('[') {
        return Ok(Vec::new());
    }

    let mut flags = Vec::new();
    lexer.skip_ws();
    if lexer.peek() != Some(']') {
        loop {
            flags.push(lexer.parse_identifier().ok_or_else(|| ParseError::Expected {
                expected: "flag identifier",
                found: lexer.rest().to_string(),
            })?);
            lexer.skip_ws();
            if !lexer.try_consume_char(',') {
                break;
            }
        }
    }

    lexer.skip_ws();
    if !lexer.try_consume_char(']') {
        return Err(ParseError::Expected { expected: "']'", found: lexer.rest().to_string() });
    }
    Ok(flags)
}

pub(crate) fn parse_parameter(lexer: &mut Lexer) -> Result<Parameter, ParseError> {
    let name = lexer.parse_quoted_string_or_identifier()?;
    lexer.skip_ws();
    if !lexer.try_consume_char('=') {
        return Err(ParseError::Expected { expected: "'='", found: lexer.rest().to_string() });
    }
    lexer.skip_ws();
    let value = if let Some(f) = lexer.parse_strict_double() {
        ParameterValue::Float(f)
    } else if let Some(i) = lexer.parse_int() {
        ParameterValue::Int(i)
    } else {
        ParameterValue::String(lexer.parse_quoted_string_or_identifier()?)
    };
    Ok(Parameter { name, value })
}

/// Parse a `with "p1" = v1 "p2" = v2 ...` clause, shared by the transform
/// and visualisation line grammars (both reuse the Boost.Spirit
/// `attributeParameter` rule in the original). Parameters are consumed
/// back-to-back with no separator between them; `with` itself appears only
/// once.
pub(crate) fn parse_with_clause(lexer: &mut Lexer) -> Result<Vec<Parameter>, ParseError> {
    let mut parameters = Vec::new();
    if lexer.try_consume_keyword("with") {
        loop {
            parameters.push(parse_parameter(lexer)?);
            lexer.skip_ws();
            let rest = lexer.rest();
            // Another parameter follows unless what's next is the `where`
            // keyword or end of input. A parameter named "where" is not
            // representable — same ambiguity the boost grammar resolves via
            // backtracking, which this recursive-descent parser doesn't have.
            let looks_like_parameter = rest.starts_with('"')
                || rest.chars().next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
            if looks_like_parameter && !rest.starts_with("where") {
                continue;
            }
            break;
        }
    }
    Ok(parameters)
}

/// Parse one transform line. The whole input must be consumed — trailing
/// garbage is a parse failure, matching the `begin != end` check in
/// `GraphTransformConfigParser::parse`.
pub fn parse_transform_config(text: &str) -> Result<TransformConfig, ParseError> {
    let mut lexer = Lexer::new(text);

    let flags = parse_flags(&mut lexer)?;

    lexer.skip_ws();
    let action = lexer.parse_quoted_string_or_identifier()?;

    let mut attributes = Vec::new();
    if lexer.try_consume_keyword("using") {
        loop {
            lexer.skip_ws();
            if !lexer.try_consume_char('$') {
                break;
            }
            let name_ref = crate::attribute::name::parse_attribute_name_ref_from_lexer(&mut lexer)?;
            attributes.push(name_ref.to_canonical_string());
            lexer.skip_ws();
            if lexer.peek() != Some('$') {
                break;
            }
        }
    }

    let parameters = parse_with_clause(&mut lexer)?;

    let condition = if lexer.try_consume_keyword("where") { parse_condition(&mut lexer)? } else { Condition::None };

    lexer.skip_ws();
    if !lexer.at_end() {
        return Err(ParseError::Malformed { kind: "transform config", input: text.to_string() });
    }

    Ok(TransformConfig { flags, action, attributes, parameters, condition })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_action() {
        let config = parse_transform_config("\"Remove Components\"").unwrap();
        assert_eq!(config.action, "Remove Components");
        assert!(config.flags.is_empty());
        assert!(!config.has_condition());
    }

    #[test]
    fn parses_flags_using_with_where() {
        let config =
            parse_transform_config(r#"[locked, pinned] "Filter" using $Weight with "minValue" = 1.5 where $Weight > 1"#)
                .unwrap();
        assert_eq!(config.flags, vec!["locked".to_string(), "pinned".to_string()]);
        assert_eq!(config.action, "Filter");
        assert_eq!(config.attributes, vec!["Weight".to_string()]);
        assert_eq!(config.parameters[0].name, "minValue");
        assert_eq!(config.parameters[0].value, ParameterValue::Float(1.5));
        assert!(config.has_condition());
    }

    #[test]
    fn equals_ignores_locked_and_pinned_flags() {
        let a = parse_transform_config(r#"[locked] "Filter" where $Weight > 1"#).unwrap();
        let b = parse_transform_config(r#"[pinned] "Filter" where $Weight > 1"#).unwrap();
        assert!(a.equals(&b, true));
        assert!(!a.equals(&b, false));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_transform_config(r#""Filter" bogus"#).is_err());
    }

    #[test]
    fn round_trips_through_canonical_string() {
        let config = parse_transform_config(r#"[locked] "Filter" using $Weight with "min" = 1 where $Weight > 1"#)
            .unwrap();
        let rendered = config.to_canonical_string();
        let reparsed = parse_transform_config(&rendered).unwrap();
        assert!(config.equals(&reparsed, false));
    }
}
