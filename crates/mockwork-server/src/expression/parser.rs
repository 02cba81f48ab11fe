//! Template parser.
//!
//! Grammar, per action between `{{` and `}}`:
//!
//! ```text
//! action    := comment | assign | pipeline
//! assign    := "$" ident ":=" pipeline
//! pipeline  := command ("|" command)*
//! command   := ident operand* | operand
//! operand   := string | raw | number | "." | "." ident | "$" ident | ident | "(" pipeline ")"
//! ```
//!
//! `{{- ` and ` -}}` trim whitespace from the neighbouring text.

use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Text(String),
    Action(Pipeline),
    Assign { name: String, pipeline: Pipeline },
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Pipeline(pub Vec<Command>);

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Command {
    Call { name: String, args: Vec<Operand> },
    Value(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Operand {
    Str(String),
    Number(String),
    Dot,
    Field(String),
    Var(String),
    /// Bare identifier used as an argument: a call without arguments
    Ident(String),
    Sub(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Number(String),
    Dot,
    Field(String),
    Var(String),
    Ident(String),
    Declare,
    Pipe,
    LParen,
    RParen,
}

const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

fn error(offset: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Parse {
        offset,
        message: message.into(),
    }
}

pub(super) fn parse(src: &str) -> Result<Vec<Node>, ExpressionError> {
    let mut nodes = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while pos <= src.len() {
        let rest = &src[pos..];
        let Some(open) = rest.find("{{") else {
            let text = if trim_next { rest.trim_start_matches(WHITESPACE) } else { rest };
            if !text.is_empty() {
                nodes.push(Node::Text(text.to_string()));
            }
            break;
        };

        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start_matches(WHITESPACE);
        }
        let mut start = pos + open + 2;
        if src[start..].starts_with('-')
            && src[start + 1..].starts_with(WHITESPACE)
        {
            text = text.trim_end_matches(WHITESPACE);
            start += 1;
        }
        if !text.is_empty() {
            nodes.push(Node::Text(text.to_string()));
        }

        let after_ws = start + (src[start..].len() - src[start..].trim_start_matches(WHITESPACE).len());
        if src[after_ws..].starts_with("/*") {
            let (end, trim) = skip_comment(src, after_ws)?;
            pos = end;
            trim_next = trim;
            continue;
        }

        let (tokens, end, trim) = lex_action(src, start)?;
        nodes.push(parse_action(tokens, start)?);
        pos = end;
        trim_next = trim;
    }

    Ok(nodes)
}

/// Skip `/* ... */` followed by an optional trim marker and `}}`.
fn skip_comment(src: &str, start: usize) -> Result<(usize, bool), ExpressionError> {
    let close = src[start + 2..]
        .find("*/")
        .ok_or_else(|| error(start, "unclosed comment"))?;
    let after = start + 2 + close + 2;
    let tail = &src[after..];
    if tail.starts_with("}}") {
        Ok((after + 2, false))
    } else if tail.starts_with(" -}}") {
        Ok((after + 4, true))
    } else {
        Err(error(after, "comment ends before closing delimiter"))
    }
}

/// Lex one action starting right after `{{` (and any left trim marker).
///
/// Returns the tokens, the offset just past `}}`, and whether the right trim
/// marker was present.
fn lex_action(src: &str, start: usize) -> Result<(Vec<Token>, usize, bool), ExpressionError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = start;

    loop {
        let Some(&b) = bytes.get(i) else {
            return Err(error(start, "unclosed action"));
        };
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                if src[i + 1..].starts_with("-}}") {
                    return Ok((tokens, i + 4, true));
                }
                i += 1;
            }
            b'}' if src[i..].starts_with("}}") => return Ok((tokens, i + 2, false)),
            b'|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b':' if src[i..].starts_with(":=") => {
                tokens.push(Token::Declare);
                i += 2;
            }
            b'"' => {
                let (value, end) = lex_quoted(src, i)?;
                tokens.push(Token::Str(value));
                i = end;
            }
            b'`' => {
                let close = src[i + 1..]
                    .find('`')
                    .ok_or_else(|| error(i, "unterminated raw string"))?;
                tokens.push(Token::Str(src[i + 1..i + 1 + close].to_string()));
                i += close + 2;
            }
            b'.' => {
                let end = ident_end(src, i + 1);
                if end == i + 1 {
                    tokens.push(Token::Dot);
                } else {
                    tokens.push(Token::Field(src[i + 1..end].to_string()));
                }
                i = end;
            }
            b'$' => {
                let end = ident_end(src, i + 1);
                if end == i + 1 {
                    return Err(error(i, "expected variable name after $"));
                }
                tokens.push(Token::Var(src[i + 1..end].to_string()));
                i = end;
            }
            b'0'..=b'9' | b'-' | b'+' => {
                let digits = if b == b'-' || b == b'+' { i + 1 } else { i };
                if !bytes.get(digits).is_some_and(u8::is_ascii_digit) {
                    return Err(error(i, format!("unexpected {:?} in action", b as char)));
                }
                let end = src[digits..]
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
                    .map(|n| digits + n)
                    .unwrap_or(src.len());
                tokens.push(Token::Number(src[i..end].to_string()));
                i = end;
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let end = ident_end(src, i);
                tokens.push(Token::Ident(src[i..end].to_string()));
                i = end;
            }
            _ => {
                let c = src[i..].chars().next().unwrap_or_default();
                return Err(error(i, format!("unexpected {c:?} in action")));
            }
        }
    }
}

fn ident_end(src: &str, start: usize) -> usize {
    src[start..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(|n| start + n)
        .unwrap_or(src.len())
}

/// Decode a double-quoted string starting at `start`; returns the value and
/// the offset past the closing quote.
fn lex_quoted(src: &str, start: usize) -> Result<(String, usize), ExpressionError> {
    let mut value = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => return Ok((value, start + 1 + offset + 1)),
            '\n' => break,
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or_else(|| error(start, "unterminated string"))?;
                match escaped {
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'x' => {
                        let hex: String = (0..2).filter_map(|_| chars.next().map(|(_, c)| c)).collect();
                        // Strings are UTF-8, so only ASCII bytes can stand alone.
                        let byte = u8::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|b| b.is_ascii() && hex.len() == 2)
                            .ok_or_else(|| error(start + 1 + offset, "invalid \\x escape"))?;
                        value.push(char::from(byte));
                    }
                    'u' => {
                        let hex: String = (0..4).filter_map(|_| chars.next().map(|(_, c)| c)).collect();
                        let c = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| error(start + 1 + offset, "invalid \\u escape"))?;
                        value.push(c);
                    }
                    other => {
                        return Err(error(
                            start + 1 + offset,
                            format!("unknown escape sequence \\{other}"),
                        ))
                    }
                }
            }
            _ => value.push(c),
        }
    }
    Err(error(start, "unterminated string"))
}

fn parse_action(tokens: Vec<Token>, offset: usize) -> Result<Node, ExpressionError> {
    if let [Token::Var(name), Token::Declare, ..] = tokens.as_slice() {
        let name = name.clone();
        let mut cursor = Cursor::new(&tokens[2..], offset);
        let pipeline = cursor.pipeline()?;
        cursor.expect_end()?;
        return Ok(Node::Assign { name, pipeline });
    }
    let mut cursor = Cursor::new(&tokens, offset);
    let pipeline = cursor.pipeline()?;
    cursor.expect_end()?;
    Ok(Node::Action(pipeline))
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    offset: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token], offset: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            offset,
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn expect_end(&self) -> Result<(), ExpressionError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(error(self.offset, format!("unexpected {t:?} in action"))),
        }
    }

    fn pipeline(&mut self) -> Result<Pipeline, ExpressionError> {
        let mut commands = vec![self.command()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            commands.push(self.command()?);
        }
        Ok(Pipeline(commands))
    }

    fn command(&mut self) -> Result<Command, ExpressionError> {
        let Some(first) = self.peek() else {
            return Err(error(self.offset, "missing value for command"));
        };
        if let Token::Ident(name) = first {
            self.pos += 1;
            let mut args = Vec::new();
            while let Some(operand) = self.operand()? {
                args.push(operand);
            }
            return Ok(Command::Call {
                name: name.clone(),
                args,
            });
        }
        let value = self
            .operand()?
            .ok_or_else(|| error(self.offset, "missing value for command"))?;
        if self.operand_follows() {
            return Err(ExpressionError::NotAFunction(format!("{value:?}")));
        }
        Ok(Command::Value(value))
    }

    fn operand_follows(&self) -> bool {
        !matches!(
            self.peek(),
            None | Some(Token::Pipe) | Some(Token::RParen)
        )
    }

    /// Next operand, or `None` at a pipe, closing paren or end of action.
    fn operand(&mut self) -> Result<Option<Operand>, ExpressionError> {
        let Some(token) = self.peek() else {
            return Ok(None);
        };
        let operand = match token {
            Token::Pipe | Token::RParen => return Ok(None),
            Token::Str(s) => Operand::Str(s.clone()),
            Token::Number(n) => Operand::Number(n.clone()),
            Token::Dot => Operand::Dot,
            Token::Field(f) => Operand::Field(f.clone()),
            Token::Var(v) => Operand::Var(v.clone()),
            Token::Ident(name) => Operand::Ident(name.clone()),
            Token::LParen => {
                self.pos += 1;
                let inner = self.pipeline()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(error(self.offset, "unclosed left paren"));
                }
                Operand::Sub(inner)
            }
            Token::Declare => return Err(error(self.offset, "unexpected :=")),
        };
        self.pos += 1;
        Ok(Some(operand))
    }
}
