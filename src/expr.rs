//! Expression tree shapes carried inside CRUD messages, and the parser capability
//! that produces them from text.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::protocol::DataModel;
use crate::value::Scalar;

/// One step of a document path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentPathItem {
  Member(String),
  MemberAsterisk,
  ArrayIndex(u32),
  ArrayIndexAsterisk,
  DoubleAsterisk,
}

/// Column name (table model) or document path (document model)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnIdentifier {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub document_path: Vec<DocumentPathItem>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub table_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schema_name: Option<String>,
}

impl ColumnIdentifier {
  pub fn column(name: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      ..Self::default()
    }
  }

  pub fn path(document_path: Vec<DocumentPathItem>) -> Self {
    Self {
      document_path,
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.document_path.is_empty()
  }
}

/// Function name, optionally schema qualified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schema_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
  Ident(ColumnIdentifier),
  Literal(Scalar),
  Variable(String),
  FuncCall { name: Identifier, params: Vec<Expr> },
  Operator { name: String, params: Vec<Expr> },
  /// Positional placeholder; `:name` placeholders are numbered by first appearance.
  Placeholder(u32),
}

impl Expr {
  pub fn operator(name: impl Into<String>, params: Vec<Expr>) -> Self {
    Expr::Operator {
      name: name.into(),
      params,
    }
  }
}

/// One projected field or column, with its optional alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
  pub source: Expr,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub alias: Option<String>,
}

/// Turns filter, projection and path text into expression trees.
///
/// Implementations must report failures as [`ParseError`]; the statement layer
/// forwards them to callers unchanged.
pub trait ExprParser: Send + Sync {
  /// Parses a search condition (`age < 17`).
  fn parse_filter(&self, text: &str, model: DataModel) -> Result<Expr, ParseError>;

  /// Parses a comma-separated projection list (`name, age as years`).
  fn parse_projection(&self, text: &str, model: DataModel) -> Result<Vec<Projection>, ParseError>;

  /// Parses a document path (`address.city`, `$.tags[0]`).
  fn parse_path(&self, text: &str) -> Result<Vec<DocumentPathItem>, ParseError>;

  /// Parses the text of an expression value. Defaults to the filter grammar.
  fn parse_expression(&self, text: &str, model: DataModel) -> Result<Expr, ParseError> {
    self.parse_filter(text, model)
  }
}
