//! `[name op value flag]` groups shared by the attribute, test id and role engines.

use crate::errors::{Result, SelectorError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Quoted string; `case_sensitive` is `Some(true)` for `s`, `Some(false)` for `i`.
    Quoted {
        value: String,
        case_sensitive: Option<bool>,
    },
    Bare(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroup {
    pub name: String,
    pub operator: Option<String>,
    pub value: Option<AttributeValue>,
}

struct Cursor<'s> {
    source: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl<'s> Cursor<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}' but found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}' but reached the end", expected))),
        }
    }

    fn error(&self, reason: String) -> SelectorError {
        SelectorError::invalid_selector(self.source, reason)
    }

    fn read_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().map(&accept).unwrap_or(false) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_quoted(&mut self) -> Result<String> {
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated escape".to_string())),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string".to_string())),
            }
        }
    }
}

/// Parses a run of bracketed attribute groups, e.g. `[name="Save"i][level=2]`.
pub fn parse_attribute_groups(source: &str) -> Result<Vec<AttributeGroup>> {
    let mut cursor = Cursor::new(source);
    let mut groups = Vec::new();
    loop {
        cursor.skip_whitespace();
        if cursor.peek().is_none() {
            break;
        }
        cursor.expect('[')?;
        cursor.skip_whitespace();
        let name = cursor.read_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
        if name.is_empty() {
            return Err(cursor.error("attribute name expected".to_string()));
        }
        cursor.skip_whitespace();

        if cursor.peek() == Some(']') {
            cursor.bump();
            groups.push(AttributeGroup {
                name,
                operator: None,
                value: None,
            });
            continue;
        }

        let operator = cursor.read_while(|c| matches!(c, '=' | '*' | '^' | '$' | '|' | '~'));
        if operator.is_empty() {
            return Err(cursor.error(format!("operator expected after \"{}\"", name)));
        }
        cursor.skip_whitespace();

        let value = match cursor.peek() {
            Some('"') | Some('\'') => {
                let value = cursor.read_quoted()?;
                cursor.skip_whitespace();
                let case_sensitive = match cursor.peek() {
                    Some('s') | Some('S') => {
                        cursor.bump();
                        Some(true)
                    }
                    Some('i') | Some('I') => {
                        cursor.bump();
                        Some(false)
                    }
                    _ => None,
                };
                AttributeValue::Quoted { value, case_sensitive }
            }
            _ => {
                let raw = cursor.read_while(|c| c != ']' && !c.is_whitespace());
                if raw.is_empty() {
                    return Err(cursor.error(format!("value expected for \"{}\"", name)));
                }
                AttributeValue::Bare(raw)
            }
        };
        cursor.skip_whitespace();
        cursor.expect(']')?;
        groups.push(AttributeGroup {
            name,
            operator: Some(operator),
            value: Some(value),
        });
    }
    Ok(groups)
}
