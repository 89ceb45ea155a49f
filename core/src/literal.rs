//! Safe evaluator for the literal structures embedded in tool output.
//!
//! Tool output embeds retrieved documents as dictionary literals such as
//! `{'title': 'Upgrade guide', 'text': 'Step one…', 'url': None}`. This
//! module turns such text into a [`serde_json::Value`] without executing
//! anything: only dicts, sets, lists, tuples, strings, numbers, `True`,
//! `False` and `None` are accepted. Names, calls, attribute access and
//! operators other than a leading sign on a number are rejected.

use serde_json::{Map, Number, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid escape sequence at offset {pos}")]
    InvalidEscape { pos: usize },
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("name '{0}' is not a literal")]
    NameNotAllowed(String),
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("trailing input at offset {pos}")]
    TrailingInput { pos: usize },
}

/// Parse a single literal expression, rejecting anything left over.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(input);
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(LiteralError::TrailingInput { pos: parser.pos });
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Result<char, LiteralError> {
        let ch = self.peek().ok_or(LiteralError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(ch)
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos += 1;
            } else if ch == '\\' && self.peek_at(1) == Some('\n') {
                // explicit line continuation
                self.pos += 2;
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        self.skip_ws();
        match self.peek() {
            Some(ch) if ch == want => {
                self.pos += 1;
                Ok(())
            }
            Some(ch) => Err(LiteralError::UnexpectedChar { ch, pos: self.pos }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        self.skip_ws();
        let ch = self.peek().ok_or(LiteralError::UnexpectedEnd)?;
        match ch {
            '{' => self.dict_or_set(depth),
            '[' => self.sequence(']', depth),
            '(' => self.tuple(depth),
            '\'' | '"' => self.strings(),
            '-' | '+' | '.' | '0'..='9' => self.number(),
            c if c.is_alphabetic() || c == '_' => {
                if self.at_string_prefix() {
                    self.strings()
                } else {
                    self.name()
                }
            }
            other => Err(LiteralError::UnexpectedChar {
                ch: other,
                pos: self.pos,
            }),
        }
    }

    fn dict_or_set(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.expect('{')?;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Object(Map::new()));
        }

        let first = self.value(depth + 1)?;
        self.skip_ws();
        if self.peek() != Some(':') {
            let mut items = vec![first];
            self.finish_sequence('}', depth, &mut items)?;
            return Ok(Value::Array(items));
        }

        let mut map = Map::new();
        self.pos += 1;
        let value = self.value(depth + 1)?;
        map.insert(key_string(first), value);

        loop {
            self.skip_ws();
            match self.bump()? {
                '}' => return Ok(Value::Object(map)),
                ',' => {
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.pos += 1;
                        return Ok(Value::Object(map));
                    }
                    let key = self.value(depth + 1)?;
                    self.expect(':')?;
                    let value = self.value(depth + 1)?;
                    map.insert(key_string(key), value);
                }
                other => {
                    return Err(LiteralError::UnexpectedChar {
                        ch: other,
                        pos: self.pos - 1,
                    });
                }
            }
        }
    }

    fn sequence(&mut self, close: char, depth: usize) -> Result<Value, LiteralError> {
        self.pos += 1;
        self.skip_ws();
        let mut items = Vec::new();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        items.push(self.value(depth + 1)?);
        self.finish_sequence(close, depth, &mut items)?;
        Ok(Value::Array(items))
    }

    /// `(x)` is just `x`; `(x,)` and `(x, y)` are tuples.
    fn tuple(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.pos += 1;
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Value::Array(Vec::new()));
        }
        let first = self.value(depth + 1)?;
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(first);
        }
        let mut items = vec![first];
        self.finish_sequence(')', depth, &mut items)?;
        Ok(Value::Array(items))
    }

    fn finish_sequence(
        &mut self,
        close: char,
        depth: usize,
        items: &mut Vec<Value>,
    ) -> Result<(), LiteralError> {
        loop {
            self.skip_ws();
            match self.bump()? {
                c if c == close => return Ok(()),
                ',' => {
                    self.skip_ws();
                    if self.peek() == Some(close) {
                        self.pos += 1;
                        return Ok(());
                    }
                    items.push(self.value(depth + 1)?);
                }
                other => {
                    return Err(LiteralError::UnexpectedChar {
                        ch: other,
                        pos: self.pos - 1,
                    });
                }
            }
        }
    }

    fn at_string_prefix(&self) -> bool {
        let mut offset = 0;
        while offset < 2 {
            match self.peek_at(offset) {
                Some('r' | 'R' | 'b' | 'B' | 'u' | 'U') => offset += 1,
                Some('\'' | '"') => return offset > 0,
                _ => return false,
            }
        }
        matches!(self.peek_at(offset), Some('\'' | '"'))
    }

    /// One or more adjacent string literals, concatenated.
    fn strings(&mut self) -> Result<Value, LiteralError> {
        let mut out = self.string()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('\'' | '"') => out.push_str(&self.string()?),
                Some(c) if c.is_alphabetic() && self.at_string_prefix() => {
                    out.push_str(&self.string()?)
                }
                _ => break,
            }
        }
        Ok(Value::String(out))
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let mut raw = false;
        while let Some(ch) = self.peek() {
            match ch {
                'r' | 'R' => {
                    raw = true;
                    self.pos += 1;
                }
                'b' | 'B' | 'u' | 'U' => self.pos += 1,
                _ => break,
            }
        }

        let quote = self.bump()?;
        if quote != '\'' && quote != '"' {
            return Err(LiteralError::UnexpectedChar {
                ch: quote,
                pos: self.pos - 1,
            });
        }
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let ch = self.bump()?;
            if ch == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    return Ok(out);
                }
                out.push(ch);
                continue;
            }
            if ch == '\n' && !triple {
                return Err(LiteralError::UnexpectedChar {
                    ch,
                    pos: self.pos - 1,
                });
            }
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            if raw {
                out.push('\\');
                out.push(self.bump()?);
                continue;
            }
            self.escape(&mut out)?;
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let start = self.pos - 1;
        let ch = self.bump()?;
        match ch {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut code = ch.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or(LiteralError::InvalidEscape { pos: start })?);
            }
            'x' => out.push(self.hex_escape(2, start)?),
            'u' => out.push(self.hex_escape(4, start)?),
            'U' => out.push(self.hex_escape(8, start)?),
            // Unknown escapes are kept verbatim.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, len: usize, start: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..len {
            let digit = self
                .bump()?
                .to_digit(16)
                .ok_or(LiteralError::InvalidEscape { pos: start })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or(LiteralError::InvalidEscape { pos: start })
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
            self.skip_ws();
        }
        let body_start = self.pos;
        while let Some(ch) = self.peek() {
            let exponent_sign = matches!(ch, '-' | '+')
                && matches!(self.chars.get(self.pos.wrapping_sub(1)), Some('e' | 'E'));
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }

        let negative = self.chars[start] == '-';
        let body: String = self.chars[body_start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let text: String = self.chars[start..self.pos].iter().collect();
        if body.is_empty() {
            return Err(LiteralError::InvalidNumber(text));
        }

        let lower = body.to_ascii_lowercase();
        let radix = match lower.get(..2) {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let magnitude = i64::from_str_radix(&lower[2..], radix)
                .map_err(|_| LiteralError::InvalidNumber(text.clone()))?;
            return Ok(Value::Number(Number::from(if negative {
                -magnitude
            } else {
                magnitude
            })));
        }

        let is_float = lower.contains(['.', 'e']);
        if !is_float {
            if let Ok(parsed) = lower.parse::<i64>() {
                return Ok(Value::Number(Number::from(if negative {
                    -parsed
                } else {
                    parsed
                })));
            }
        }
        let parsed: f64 = lower
            .parse()
            .map_err(|_| LiteralError::InvalidNumber(text.clone()))?;
        let signed = if negative { -parsed } else { parsed };
        Number::from_f64(signed)
            .map(Value::Number)
            .ok_or(LiteralError::InvalidNumber(text))
    }

    fn name(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        match name.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => Err(LiteralError::NameNotAllowed(name)),
        }
    }
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_document_dict() {
        let value = parse_literal(
            "{'title': 'vSphere 8 upgrade', 'text': 'Back up vCenter first.', 'url': None, 'score': 0.82}",
        )
        .unwrap();
        assert_eq!(
            value,
            json!({
                "title": "vSphere 8 upgrade",
                "text": "Back up vCenter first.",
                "url": null,
                "score": 0.82
            })
        );
    }

    #[test]
    fn parses_nested_containers() {
        let value =
            parse_literal("{'meta': {'lang': \"en\", 'tags': ['a', 'b',], 'pair': (1, -2)}, 'ok': True}")
                .unwrap();
        assert_eq!(
            value,
            json!({"meta": {"lang": "en", "tags": ["a", "b"], "pair": [1, -2]}, "ok": true})
        );
    }

    #[test]
    fn handles_escapes_and_quotes() {
        let value = parse_literal(r#"{'text': 'It\'s "quoted"\nnext\x41\u00e9'}"#).unwrap();
        assert_eq!(value["text"], json!("It's \"quoted\"\nnextAé"));
    }

    #[test]
    fn raw_strings_keep_backslashes() {
        let value = parse_literal(r"r'C:\temp\new'").unwrap();
        assert_eq!(value, json!(r"C:\temp\new"));
    }

    #[test]
    fn concatenates_adjacent_strings() {
        let value = parse_literal("{'text': 'part one, ' \"part two\"}").unwrap();
        assert_eq!(value["text"], json!("part one, part two"));
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let value = parse_literal("{1: 'one', None: 'none'}").unwrap();
        assert_eq!(value, json!({"1": "one", "None": "none"}));
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_literal("42").unwrap(), json!(42));
        assert_eq!(parse_literal("-3.5").unwrap(), json!(-3.5));
        assert_eq!(parse_literal("1e3").unwrap(), json!(1000.0));
        assert_eq!(parse_literal("2.5e-1").unwrap(), json!(0.25));
        assert_eq!(parse_literal("1_000").unwrap(), json!(1000));
        assert_eq!(parse_literal("0x1f").unwrap(), json!(31));
    }

    #[test]
    fn set_literal_becomes_array() {
        assert_eq!(parse_literal("{'a', 'b'}").unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn rejects_calls_and_names() {
        assert_eq!(
            parse_literal("__import__('os').system('rm -rf /')"),
            Err(LiteralError::NameNotAllowed("__import__".to_string()))
        );
        assert!(matches!(
            parse_literal("{'title': open('/etc/passwd')}"),
            Err(LiteralError::NameNotAllowed(_))
        ));
        assert!(parse_literal("{'a': 1 + 2}").is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(parse_literal("{'title': 'abc'"), Err(LiteralError::UnexpectedEnd));
        assert_eq!(parse_literal("'open"), Err(LiteralError::UnexpectedEnd));
    }

    #[test]
    fn rejects_trailing_input() {
        assert!(matches!(
            parse_literal("{'a': 1} extra"),
            Err(LiteralError::TrailingInput { .. })
        ));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let deep = format!("{}{}", "[".repeat(200), "]".repeat(200));
        assert_eq!(parse_literal(&deep), Err(LiteralError::TooDeep));
    }
}
