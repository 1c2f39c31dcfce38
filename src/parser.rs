//! Default [`ExprParser`] for filter, projection and path text.
//!
//! Operator names follow the X Protocol spelling (`==`, `&&`, `not_in`, `is_not`,
//! `sign_minus`, ...). Identifiers are document paths in the document model and
//! column names in the table model.

use crate::error::ParseError;
use crate::expr::{ColumnIdentifier, DocumentPathItem, Expr, ExprParser, Identifier, Projection};
use crate::protocol::DataModel;
use crate::value::Scalar;

/// Hand-written tokenizer plus precedence-climbing parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicParser;

impl BasicParser {
  pub fn new() -> Self {
    Self
  }
}

impl ExprParser for BasicParser {
  fn parse_filter(&self, text: &str, model: DataModel) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(text, model)?;
    let expr = parser.parse_expr(0)?;
    parser.expect_end()?;
    Ok(expr)
  }

  fn parse_projection(&self, text: &str, model: DataModel) -> Result<Vec<Projection>, ParseError> {
    let mut parser = Parser::new(text, model)?;
    let mut projection = Vec::new();
    loop {
      let source = parser.parse_expr(0)?;
      let alias = if parser.eat_keyword("as") {
        Some(parser.alias()?)
      } else {
        None
      };
      projection.push(Projection { source, alias });

      if !parser.eat(&TokenKind::Comma) {
        break;
      }
    }
    parser.expect_end()?;
    Ok(projection)
  }

  fn parse_path(&self, text: &str) -> Result<Vec<DocumentPathItem>, ParseError> {
    let mut parser = Parser::new(text, DataModel::Document)?;
    let mut items = Vec::new();
    match parser.next_kind() {
      Some(TokenKind::Dollar) => {}
      Some(TokenKind::Ident(name)) | Some(TokenKind::QuotedIdent(name)) => {
        items.push(DocumentPathItem::Member(name))
      }
      _ => return Err(parser.error_at_previous("expected document path")),
    }
    parser.path_tail(&mut items)?;
    parser.expect_end()?;

    if items.is_empty() {
      return Err(ParseError::new("empty document path", 0));
    }
    Ok(items)
  }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
  Int(u64),
  Float(f64),
  Str(String),
  Ident(String),
  QuotedIdent(String),
  Placeholder(String),
  Dollar,
  Dot,
  Comma,
  LParen,
  RParen,
  LBracket,
  RBracket,
  Star,
  DoubleStar,
  Op(&'static str),
}

#[derive(Debug, Clone)]
struct Token {
  kind: TokenKind,
  pos: usize,
}

fn is_ident_start(c: char) -> bool {
  c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_'
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
  let chars: Vec<(usize, char)> = text.char_indices().collect();
  let mut tokens = Vec::new();
  let mut i = 0;

  let peek = |i: usize| chars.get(i).map(|&(_, c)| c);

  while i < chars.len() {
    let (pos, c) = chars[i];

    if c.is_whitespace() {
      i += 1;
      continue;
    }

    let kind = if c.is_ascii_digit() {
      let start = i;
      while peek(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
      }
      let mut is_float = false;
      if peek(i) == Some('.') && peek(i + 1).is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        i += 1;
        while peek(i).is_some_and(|c| c.is_ascii_digit()) {
          i += 1;
        }
      }
      if matches!(peek(i), Some('e') | Some('E')) {
        let mut j = i + 1;
        if matches!(peek(j), Some('+') | Some('-')) {
          j += 1;
        }
        if peek(j).is_some_and(|c| c.is_ascii_digit()) {
          is_float = true;
          i = j;
          while peek(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
          }
        }
      }
      let literal: String = chars[start..i].iter().map(|&(_, c)| c).collect();
      if is_float {
        let value = literal
          .parse::<f64>()
          .map_err(|_| ParseError::new(format!("invalid number '{}'", literal), pos))?;
        TokenKind::Float(value)
      } else {
        let value = literal
          .parse::<u64>()
          .map_err(|_| ParseError::new(format!("integer literal out of range '{}'", literal), pos))?;
        TokenKind::Int(value)
      }
    } else if c == '\'' || c == '"' {
      let quote = c;
      let mut value = String::new();
      i += 1;
      loop {
        match peek(i) {
          None => return Err(ParseError::new("unterminated quoted string", pos)),
          Some('\\') => {
            let escaped = peek(i + 1)
              .ok_or_else(|| ParseError::new("unterminated quoted string", pos))?;
            value.push(match escaped {
              'n' => '\n',
              't' => '\t',
              'r' => '\r',
              '0' => '\0',
              other => other,
            });
            i += 2;
          }
          Some(c) if c == quote => {
            if peek(i + 1) == Some(quote) {
              value.push(quote);
              i += 2;
            } else {
              i += 1;
              break;
            }
          }
          Some(c) => {
            value.push(c);
            i += 1;
          }
        }
      }
      TokenKind::Str(value)
    } else if c == '`' {
      let mut name = String::new();
      i += 1;
      loop {
        match peek(i) {
          None => return Err(ParseError::new("unterminated quoted identifier", pos)),
          Some('`') if peek(i + 1) == Some('`') => {
            name.push('`');
            i += 2;
          }
          Some('`') => {
            i += 1;
            break;
          }
          Some(c) => {
            name.push(c);
            i += 1;
          }
        }
      }
      TokenKind::QuotedIdent(name)
    } else if is_ident_start(c) {
      let start = i;
      while peek(i).is_some_and(is_ident_char) {
        i += 1;
      }
      TokenKind::Ident(chars[start..i].iter().map(|&(_, c)| c).collect())
    } else if c == ':' && peek(i + 1).is_some_and(is_ident_char) {
      let start = i + 1;
      i = start;
      while peek(i).is_some_and(is_ident_char) {
        i += 1;
      }
      TokenKind::Placeholder(chars[start..i].iter().map(|&(_, c)| c).collect())
    } else {
      let next = peek(i + 1);
      let (kind, width) = match (c, next) {
        ('$', _) => (TokenKind::Dollar, 1),
        ('.', _) => (TokenKind::Dot, 1),
        (',', _) => (TokenKind::Comma, 1),
        ('(', _) => (TokenKind::LParen, 1),
        (')', _) => (TokenKind::RParen, 1),
        ('[', _) => (TokenKind::LBracket, 1),
        (']', _) => (TokenKind::RBracket, 1),
        ('*', Some('*')) => (TokenKind::DoubleStar, 2),
        ('*', _) => (TokenKind::Star, 1),
        ('=', Some('=')) => (TokenKind::Op("=="), 2),
        ('=', _) => (TokenKind::Op("=="), 1),
        ('!', Some('=')) => (TokenKind::Op("!="), 2),
        ('!', _) => (TokenKind::Op("!"), 1),
        ('<', Some('=')) => (TokenKind::Op("<="), 2),
        ('<', Some('>')) => (TokenKind::Op("!="), 2),
        ('<', _) => (TokenKind::Op("<"), 1),
        ('>', Some('=')) => (TokenKind::Op(">="), 2),
        ('>', _) => (TokenKind::Op(">"), 1),
        ('&', Some('&')) => (TokenKind::Op("&&"), 2),
        ('|', Some('|')) => (TokenKind::Op("||"), 2),
        ('+', _) => (TokenKind::Op("+"), 1),
        ('-', _) => (TokenKind::Op("-"), 1),
        ('/', _) => (TokenKind::Op("/"), 1),
        ('%', _) => (TokenKind::Op("%"), 1),
        _ => {
          return Err(ParseError::new(
            format!("unexpected character '{}'", c),
            pos,
          ))
        }
      };
      i += width;
      kind
    };

    tokens.push(Token { kind, pos });
  }

  Ok(tokens)
}

const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_COMPARE: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;

/// Deepest operand nesting accepted before the parser gives up.
const MAX_NESTING: usize = 128;

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
  end: usize,
  model: DataModel,
  placeholders: Vec<String>,
  depth: usize,
}

impl Parser {
  fn new(text: &str, model: DataModel) -> Result<Self, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
      return Err(ParseError::new("empty expression", 0));
    }
    Ok(Self {
      tokens,
      pos: 0,
      end: text.len(),
      model,
      placeholders: Vec::new(),
      depth: 0,
    })
  }

  fn peek(&self) -> Option<&TokenKind> {
    self.tokens.get(self.pos).map(|t| &t.kind)
  }

  fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
    self.tokens.get(self.pos + offset).map(|t| &t.kind)
  }

  fn next_kind(&mut self) -> Option<TokenKind> {
    let kind = self.tokens.get(self.pos).map(|t| t.kind.clone());
    if kind.is_some() {
      self.pos += 1;
    }
    kind
  }

  fn eat(&mut self, kind: &TokenKind) -> bool {
    if self.peek() == Some(kind) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn keyword_at(&self, offset: usize, keyword: &str) -> bool {
    matches!(self.peek_at(offset), Some(TokenKind::Ident(name)) if name.eq_ignore_ascii_case(keyword))
  }

  fn eat_keyword(&mut self, keyword: &str) -> bool {
    if self.keyword_at(0, keyword) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn position(&self) -> usize {
    self.tokens.get(self.pos).map_or(self.end, |t| t.pos)
  }

  fn error(&self, message: impl Into<String>) -> ParseError {
    ParseError::new(message, self.position())
  }

  fn error_at_previous(&self, message: impl Into<String>) -> ParseError {
    let pos = self
      .pos
      .checked_sub(1)
      .and_then(|i| self.tokens.get(i))
      .map_or(self.end, |t| t.pos);
    ParseError::new(message, pos)
  }

  fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
    if self.eat(&kind) {
      Ok(())
    } else {
      Err(self.error(format!("expected {}", what)))
    }
  }

  fn expect_end(&self) -> Result<(), ParseError> {
    if self.pos < self.tokens.len() {
      Err(self.error("unexpected token"))
    } else {
      Ok(())
    }
  }

  fn alias(&mut self) -> Result<String, ParseError> {
    match self.next_kind() {
      Some(TokenKind::Ident(name)) | Some(TokenKind::QuotedIdent(name)) | Some(TokenKind::Str(name)) => {
        Ok(name)
      }
      _ => Err(self.error_at_previous("expected alias")),
    }
  }

  /// Operator name, precedence and token width of the binary operator at the cursor.
  fn peek_binary(&self) -> Option<(&'static str, u8, usize)> {
    if self.keyword_at(0, "or") {
      return Some(("||", PREC_OR, 1));
    }
    if self.keyword_at(0, "and") {
      return Some(("&&", PREC_AND, 1));
    }
    if self.keyword_at(0, "like") {
      return Some(("like", PREC_COMPARE, 1));
    }
    if self.keyword_at(0, "in") {
      return Some(("in", PREC_COMPARE, 1));
    }
    if self.keyword_at(0, "is") {
      return Some(("is", PREC_COMPARE, 1));
    }
    if self.keyword_at(0, "not") {
      if self.keyword_at(1, "like") {
        return Some(("not_like", PREC_COMPARE, 2));
      }
      if self.keyword_at(1, "in") {
        return Some(("not_in", PREC_COMPARE, 2));
      }
      return None;
    }
    match self.peek()? {
      TokenKind::Op("||") => Some(("||", PREC_OR, 1)),
      TokenKind::Op("&&") => Some(("&&", PREC_AND, 1)),
      TokenKind::Op(op @ ("==" | "!=" | "<" | "<=" | ">" | ">=")) => Some((*op, PREC_COMPARE, 1)),
      TokenKind::Op(op @ ("+" | "-")) => Some((*op, PREC_ADD, 1)),
      TokenKind::Op(op @ ("/" | "%")) => Some((*op, PREC_MUL, 1)),
      TokenKind::Star => Some(("*", PREC_MUL, 1)),
      _ => None,
    }
  }

  fn parse_expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
    let mut lhs = self.parse_unary()?;

    while let Some((op, prec, width)) = self.peek_binary() {
      if prec < min_prec {
        break;
      }
      self.pos += width;

      lhs = match op {
        "in" | "not_in" => {
          let mut params = vec![lhs];
          params.extend(self.paren_list()?);
          Expr::operator(op, params)
        }
        "is" => {
          let name = if self.eat_keyword("not") { "is_not" } else { "is" };
          if !self.eat_keyword("null") {
            return Err(self.error("expected null"));
          }
          Expr::operator(name, vec![lhs, Expr::Literal(Scalar::Null)])
        }
        _ => {
          let rhs = self.parse_expr(prec + 1)?;
          Expr::operator(op, vec![lhs, rhs])
        }
      };
    }

    Ok(lhs)
  }

  // Parentheses, argument lists and prefix operators all recurse through here.
  fn parse_unary(&mut self) -> Result<Expr, ParseError> {
    if self.depth >= MAX_NESTING {
      return Err(self.error("expression nested too deeply"));
    }
    self.depth += 1;
    let operand = self.parse_operand();
    self.depth -= 1;
    operand
  }

  fn parse_operand(&mut self) -> Result<Expr, ParseError> {
    if self.eat_keyword("not") || self.eat(&TokenKind::Op("!")) {
      let operand = self.parse_expr(PREC_NOT)?;
      return Ok(Expr::operator("not", vec![operand]));
    }
    if self.eat(&TokenKind::Op("-")) {
      return match self.peek() {
        Some(TokenKind::Int(n)) => {
          let n = *n;
          self.pos += 1;
          if n > i64::MAX as u64 + 1 {
            return Err(self.error_at_previous("integer literal out of range"));
          }
          Ok(Expr::Literal(Scalar::SignedInt((-(n as i128)) as i64)))
        }
        Some(TokenKind::Float(f)) => {
          let f = *f;
          self.pos += 1;
          Ok(Expr::Literal(Scalar::Double(-f)))
        }
        _ => Ok(Expr::operator("sign_minus", vec![self.parse_unary()?])),
      };
    }
    if self.eat(&TokenKind::Op("+")) {
      return Ok(Expr::operator("sign_plus", vec![self.parse_unary()?]));
    }
    self.parse_primary()
  }

  fn parse_primary(&mut self) -> Result<Expr, ParseError> {
    let start = self.position();
    let kind = self
      .next_kind()
      .ok_or_else(|| ParseError::new("unexpected end of expression", self.end))?;

    match kind {
      TokenKind::Int(n) => Ok(Expr::Literal(match i64::try_from(n) {
        Ok(v) => Scalar::SignedInt(v),
        Err(_) => Scalar::UnsignedInt(n),
      })),
      TokenKind::Float(f) => Ok(Expr::Literal(Scalar::Double(f))),
      TokenKind::Str(s) => Ok(Expr::Literal(Scalar::String(s))),
      TokenKind::Placeholder(name) => {
        let index = match self.placeholders.iter().position(|p| *p == name) {
          Some(index) => index,
          None => {
            self.placeholders.push(name);
            self.placeholders.len() - 1
          }
        };
        Ok(Expr::Placeholder(index as u32))
      }
      TokenKind::LParen => {
        let expr = self.parse_expr(0)?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(expr)
      }
      TokenKind::Dollar => {
        let mut items = Vec::new();
        self.path_tail(&mut items)?;
        Ok(Expr::Ident(ColumnIdentifier::path(items)))
      }
      TokenKind::Ident(name) => {
        if name.eq_ignore_ascii_case("true") {
          Ok(Expr::Literal(Scalar::Bool(true)))
        } else if name.eq_ignore_ascii_case("false") {
          Ok(Expr::Literal(Scalar::Bool(false)))
        } else if name.eq_ignore_ascii_case("null") {
          Ok(Expr::Literal(Scalar::Null))
        } else {
          self.identifier(name)
        }
      }
      TokenKind::QuotedIdent(name) => self.identifier(name),
      _ => Err(ParseError::new("unexpected token", start)),
    }
  }

  fn identifier(&mut self, first: String) -> Result<Expr, ParseError> {
    if self.peek() == Some(&TokenKind::LParen) {
      let params = self.paren_list_allow_empty()?;
      return Ok(Expr::FuncCall {
        name: Identifier {
          name: first,
          schema_name: None,
        },
        params,
      });
    }

    match self.model {
      DataModel::Document => {
        let mut items = vec![DocumentPathItem::Member(first)];
        self.path_tail(&mut items)?;
        Ok(Expr::Ident(ColumnIdentifier::path(items)))
      }
      DataModel::Table => {
        let mut parts = vec![first];
        while parts.len() < 3 && self.peek() == Some(&TokenKind::Dot) {
          self.pos += 1;
          match self.next_kind() {
            Some(TokenKind::Ident(name)) | Some(TokenKind::QuotedIdent(name)) => parts.push(name),
            _ => return Err(self.error_at_previous("expected column name")),
          }
        }
        let name = parts.pop();
        let table_name = parts.pop();
        let schema_name = parts.pop();
        Ok(Expr::Ident(ColumnIdentifier {
          document_path: Vec::new(),
          name,
          table_name,
          schema_name,
        }))
      }
    }
  }

  fn path_tail(&mut self, items: &mut Vec<DocumentPathItem>) -> Result<(), ParseError> {
    loop {
      match self.peek() {
        Some(TokenKind::Dot) => {
          self.pos += 1;
          match self.next_kind() {
            Some(TokenKind::Ident(name)) | Some(TokenKind::QuotedIdent(name)) => {
              items.push(DocumentPathItem::Member(name))
            }
            Some(TokenKind::Star) => items.push(DocumentPathItem::MemberAsterisk),
            _ => return Err(self.error_at_previous("expected member name")),
          }
        }
        Some(TokenKind::LBracket) => {
          self.pos += 1;
          match self.next_kind() {
            Some(TokenKind::Int(n)) => {
              let index = u32::try_from(n)
                .map_err(|_| self.error_at_previous("array index out of range"))?;
              items.push(DocumentPathItem::ArrayIndex(index));
            }
            Some(TokenKind::Star) => items.push(DocumentPathItem::ArrayIndexAsterisk),
            _ => return Err(self.error_at_previous("expected array index")),
          }
          self.expect(TokenKind::RBracket, "']'")?;
        }
        Some(TokenKind::DoubleStar) => {
          self.pos += 1;
          items.push(DocumentPathItem::DoubleAsterisk);
        }
        _ => return Ok(()),
      }
    }
  }

  fn paren_list(&mut self) -> Result<Vec<Expr>, ParseError> {
    let items = self.paren_list_allow_empty()?;
    if items.is_empty() {
      return Err(self.error_at_previous("expected at least one value"));
    }
    Ok(items)
  }

  fn paren_list_allow_empty(&mut self) -> Result<Vec<Expr>, ParseError> {
    self.expect(TokenKind::LParen, "'('")?;
    let mut items = Vec::new();
    if self.eat(&TokenKind::RParen) {
      return Ok(items);
    }
    loop {
      items.push(self.parse_expr(0)?);
      if self.eat(&TokenKind::Comma) {
        continue;
      }
      self.expect(TokenKind::RParen, "')'")?;
      return Ok(items);
    }
  }
}
