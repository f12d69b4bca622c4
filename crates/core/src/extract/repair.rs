//! Tolerant JSON reader for model output that is almost JSON.
//!
//! Accepts what `serde_json` rejects in practice: trailing commas, raw
//! newlines inside strings, single-quoted strings, unquoted keys, Python
//! literals, bare-word values and unterminated strings or containers.

use serde_json::{Map, Number, Value};

/// Nesting limit for objects and arrays, the same as serde_json's.
pub const MAX_DEPTH: usize = 128;

/// Parse `text` leniently. Returns `None` when no value can be recovered
/// or the input nests deeper than [`MAX_DEPTH`].
pub fn parse(text: &str) -> Option<Value> {
    let mut reader = Reader {
        chars: text.chars().collect(),
        pos: 0,
        depth: 0,
    };
    reader.value()
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '{' => self.nested(Self::object),
            '[' => self.nested(Self::array),
            '"' | '\'' => self.string().map(Value::String),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => Some(self.number()),
            _ => Some(self.word()),
        }
    }

    fn nested(&mut self, read: fn(&mut Self) -> Option<Value>) -> Option<Value> {
        if self.depth >= MAX_DEPTH {
            return None;
        }
        self.depth += 1;
        let value = read(self);
        self.depth -= 1;
        value
    }

    fn object(&mut self) -> Option<Value> {
        self.bump();
        let mut map = Map::new();

        loop {
            self.skip_separators();
            match self.peek() {
                // Missing closing brace
                None => return Some(Value::Object(map)),
                Some('}') => {
                    self.bump();
                    return Some(Value::Object(map));
                }
                Some(_) => {}
            }

            let key = self.key()?;
            self.skip_ws();
            if self.bump() != Some(':') {
                return None;
            }

            self.skip_ws();
            let value = match self.peek() {
                None | Some('}') | Some(',') => Value::Null,
                Some(_) => self.value()?,
            };
            map.insert(key, value);
        }
    }

    fn array(&mut self) -> Option<Value> {
        self.bump();
        let mut items = Vec::new();

        loop {
            self.skip_separators();
            match self.peek() {
                None => return Some(Value::Array(items)),
                Some(']') => {
                    self.bump();
                    return Some(Value::Array(items));
                }
                Some(_) => {}
            }

            let start = self.pos;
            items.push(self.value()?);
            if self.pos == start {
                return None;
            }
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace() || c == ',') {
            self.pos += 1;
        }
    }

    fn key(&mut self) -> Option<String> {
        match self.peek()? {
            '"' | '\'' => self.string(),
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c != ':' && !c.is_whitespace()) {
                    self.pos += 1;
                }
                if self.pos == start {
                    return None;
                }
                Some(self.chars[start..self.pos].iter().collect())
            }
        }
    }

    /// Read a quoted string. An unterminated string runs to the end of input.
    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();

        while let Some(c) = self.bump() {
            match c {
                c if c == quote => return Some(out),
                '\\' => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('b') => out.push('\u{8}'),
                    Some('f') => out.push('\u{c}'),
                    Some('u') => out.push(self.unicode_escape()),
                    Some(other) => out.push(other),
                    None => break,
                },
                other => out.push(other),
            }
        }

        Some(out)
    }

    fn unicode_escape(&mut self) -> char {
        let end = (self.pos + 4).min(self.chars.len());
        let hex: String = self.chars[self.pos..end].iter().collect();
        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
            Some(c) => {
                self.pos = end;
                c
            }
            None => char::REPLACEMENT_CHARACTER,
        }
    }

    fn number(&mut self) -> Value {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let trimmed = text.trim_start_matches('+');

        if let Ok(int) = trimmed.parse::<i64>() {
            return Value::Number(int.into());
        }
        match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(number) => Value::Number(number),
            None => Value::String(text),
        }
    }

    /// Bare identifiers: JSON and Python literals, otherwise text up to the
    /// next delimiter.
    fn word(&mut self) -> Value {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if !matches!(c, ',' | '}' | ']' | '\n')) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();

        match text.trim() {
            "true" | "True" => Value::Bool(true),
            "false" | "False" => Value::Bool(false),
            "null" | "None" => Value::Null,
            other => Value::String(other.to_string()),
        }
    }
}
