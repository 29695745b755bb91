//! Shared low-level lexing primitives for the transform-config,
//! visualisation-config and attribute-name grammars.
//!
//! Grounded on `examples/original_source/source/app/transform/graphtransformconfigparser.cpp`,
//! which defines `quotedString`/`identifier`/`attributeParameter` once and
//! reuses them across the transform and condition grammars via Boost.Spirit
//! rules. No parser-combinator crate appears anywhere in the retrieved
//! corpus at a non-internal-tooling level, so this is a small hand-rolled
//! recursive-descent scanner instead.

use crate::error::ParseError;

pub struct Lexer<'a> {
    input: &'a str,
    chars: std::str::CharIndices<'a>,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.char_indices();
        let peeked = chars.next();
        Self { input, chars, peeked }
    }

    pub fn peek(&self) -> Option<char> {
        self.peeked.map(|(_, c)| c)
    }

    fn pos(&self) -> usize {
        self.peeked.map(|(i, _)| i).unwrap_or(self.input.len())
    }

    pub fn rest(&self) -> &'a str {
        &self.input[self.pos()..]
    }

    fn bump(&mut self) -> Option<char> {
        let current = self.peeked;
        self.peeked = self.chars.next();
        current.map(|(_, c)| c)
    }

    pub fn at_end(&self) -> bool {
        self.peeked.is_none()
    }

    pub fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Consume `literal` verbatim (no identifier-boundary check, unlike
    /// [`Lexer::try_consume_keyword`]) — for punctuation-bearing literals
    /// like `"source."` where a boundary check doesn't apply.
    pub fn try_consume_literal(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            for _ in 0..literal.chars().count() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    /// Consume exactly `c`, returning whether it matched. Does not skip
    /// leading whitespace.
    pub fn try_consume_char(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume a literal keyword only if followed by a non-identifier
    /// character (or end of input), so `using` doesn't prefix-match `user`.
    pub fn try_consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(keyword) {
            let after = &self.rest()[keyword.len()..];
            let boundary = after.chars().next().map_or(true, |c| !is_ident_continue(c));
            if boundary {
                for _ in 0..keyword.chars().count() {
                    self.bump();
                }
                return true;
            }
        }
        false
    }

    /// Try to consume one of a fixed list of operator symbols, longest
    /// match first (so `<=` wins over `<`).
    pub fn try_consume_symbol<'s>(&mut self, symbols: &[&'s str]) -> Option<&'s str> {
        self.skip_ws();
        let mut candidates: Vec<&&str> = symbols.iter().filter(|s| self.rest().starts_with(*s)).collect();
        candidates.sort_by_key(|s| std::cmp::Reverse(s.len()));
        if let Some(&matched) = candidates.first() {
            for _ in 0..matched.chars().count() {
                self.bump();
            }
            Some(matched)
        } else {
            None
        }
    }

    /// `lexeme['"' >> *(escapedQuote | ~char_('"')) >> '"']` — only `\"` is
    /// a recognised escape; any other backslash is literal.
    pub fn parse_quoted_string(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        if !self.try_consume_char('"') {
            return Err(ParseError::Expected { expected: "quoted string", found: self.rest().to_string() });
        }

        let mut result = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString { input: self.input.to_string() }),
                Some('"') => return Ok(result),
                Some('\\') if self.peek() == Some('"') => {
                    self.bump();
                    result.push('"');
                }
                Some(c) => result.push(c),
            }
        }
    }

    /// `char_("a-zA-Z_") >> *char_("a-zA-Z0-9_")`
    pub fn parse_identifier(&mut self) -> Option<String> {
        self.skip_ws();
        let mut chars = self.rest().chars();
        let first = chars.next()?;
        if !is_ident_start(first) {
            return None;
        }

        let mut result = String::new();
        result.push(first);
        self.bump();

        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            result.push(self.bump().unwrap());
        }

        Some(result)
    }

    pub fn parse_quoted_string_or_identifier(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        if self.peek() == Some('"') {
            self.parse_quoted_string()
        } else {
            self.parse_identifier().ok_or_else(|| ParseError::Expected {
                expected: "identifier or quoted string",
                found: self.rest().to_string(),
            })
        }
    }

    /// Only a strict double (requires a decimal point); a bare integer must
    /// be parsed separately via [`Lexer::parse_int`].
    pub fn parse_strict_double(&mut self) -> Option<f64> {
        self.skip_ws();
        let rest = self.rest();
        let mut end = 0;
        let bytes = rest.as_bytes();
        let mut i = 0;
        if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'.' {
            return None;
        }
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start && i == digits_start + 1 {
            return None;
        }
        // optional exponent
        let mantissa_end = i;
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == b'-' || bytes[j] == b'+') {
                j += 1;
            }
            let exp_start = j;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > exp_start {
                end = j;
            } else {
                end = mantissa_end;
            }
        } else {
            end = mantissa_end;
        }

        let text = &rest[..end];
        let value: f64 = text.parse().ok()?;
        for _ in 0..end {
            self.bump();
        }
        Some(value)
    }

    pub fn parse_int(&mut self) -> Option<i64> {
        self.skip_ws();
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut i = 0;
        if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            return None;
        }
        // Don't consume an integer prefix of what is actually a double.
        if i < bytes.len() && bytes[i] == b'.' {
            return None;
        }

        let text = &rest[..i];
        let value: i64 = text.parse().ok()?;
        for _ in 0..i {
            self.bump();
        }
        Some(value)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_double_requires_decimal_point() {
        let mut lex = Lexer::new("5");
        assert_eq!(lex.parse_strict_double(), None);

        let mut lex = Lexer::new("5.0");
        assert_eq!(lex.parse_strict_double(), Some(5.0));
    }

    #[test]
    fn int_does_not_consume_a_double() {
        let mut lex = Lexer::new("5.5");
        assert_eq!(lex.parse_int(), None);
    }

    #[test]
    fn quoted_string_escapes_only_quotes() {
        let mut lex = Lexer::new(r#""a\"b""#);
        assert_eq!(lex.parse_quoted_string().unwrap(), "a\"b");
    }

    #[test]
    fn keyword_does_not_prefix_match() {
        let mut lex = Lexer::new("username");
        assert!(!lex.try_consume_keyword("using"));
    }
}
