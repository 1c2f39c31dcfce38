//! Values accepted by statement builders and their wire scalars.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprParser};
use crate::protocol::DataModel;

/// A value supplied to a chain method (`set`, `values`, `bind`, ...).
///
/// Documents accept `SignedInt`, `Double`, `String`, `Octets` and `Expression`.
/// Tables accept every variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  SignedInt(i64),
  UnsignedInt(u64),
  Bool(bool),
  Double(f64),
  Float(f32),
  Null,
  Octets(Vec<u8>),
  String(String),
  /// Expression text, parsed into an expression subtree instead of a literal.
  Expression(String),
}

impl Value {
  /// Serialized JSON document carried as opaque octets.
  pub fn document(doc: &serde_json::Value) -> Self {
    Self::Octets(doc.to_string().into_bytes())
  }

  pub fn kind_name(&self) -> &'static str {
    match self {
      Value::SignedInt(_) => "SignedInt",
      Value::UnsignedInt(_) => "UnsignedInt",
      Value::Bool(_) => "Bool",
      Value::Double(_) => "Double",
      Value::Float(_) => "Float",
      Value::Null => "Null",
      Value::Octets(_) => "Octets",
      Value::String(_) => "String",
      Value::Expression(_) => "Expression",
    }
  }

  pub fn is_supported_by(&self, model: DataModel) -> bool {
    match model {
      DataModel::Table => true,
      DataModel::Document => matches!(
        self,
        Value::SignedInt(_)
          | Value::Double(_)
          | Value::String(_)
          | Value::Octets(_)
          | Value::Expression(_)
      ),
    }
  }
}

/// Wraps expression text so chain methods parse it instead of sending a literal.
pub fn expr(text: impl Into<String>) -> Value {
  Value::Expression(text.into())
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::SignedInt(v)
  }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self {
    Value::SignedInt(v.into())
  }
}

impl From<u64> for Value {
  fn from(v: u64) -> Self {
    Value::UnsignedInt(v)
  }
}

impl From<u32> for Value {
  fn from(v: u32) -> Self {
    Value::UnsignedInt(v.into())
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::Bool(v)
  }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self {
    Value::Double(v)
  }
}

impl From<f32> for Value {
  fn from(v: f32) -> Self {
    Value::Float(v)
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    Value::String(v.to_string())
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::String(v)
  }
}

impl From<Vec<u8>> for Value {
  fn from(v: Vec<u8>) -> Self {
    Value::Octets(v)
  }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self {
    v.map_or(Value::Null, Into::into)
  }
}

/// Leaf scalar field of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
  SignedInt(i64),
  UnsignedInt(u64),
  Null,
  Octets(Vec<u8>),
  Double(f64),
  Float(f32),
  Bool(bool),
  String(String),
}

/// Maps a literal value onto its wire scalar for the given data model.
///
/// `Expression` values have no scalar form; use [`to_expr`] for those.
pub fn to_wire_scalar(value: &Value, model: DataModel) -> Result<Scalar> {
  if !value.is_supported_by(model) {
    return Err(Error::UnsupportedValueKind {
      given: value.kind_name(),
      expected_model: model,
    });
  }

  let scalar = match value {
    Value::SignedInt(v) => Scalar::SignedInt(*v),
    Value::UnsignedInt(v) => Scalar::UnsignedInt(*v),
    Value::Bool(v) => Scalar::Bool(*v),
    Value::Double(v) => Scalar::Double(*v),
    Value::Float(v) => Scalar::Float(*v),
    Value::Null => Scalar::Null,
    Value::Octets(v) => Scalar::Octets(v.clone()),
    Value::String(v) => Scalar::String(v.clone()),
    Value::Expression(_) => {
      return Err(Error::InvalidArgument(
        "expression values have no literal scalar form".to_string(),
      ))
    }
  };

  Ok(scalar)
}

/// Literal values become `Expr::Literal`, expression values are parsed.
pub fn to_expr(value: &Value, model: DataModel, parser: &dyn ExprParser) -> Result<Expr> {
  match value {
    Value::Expression(text) => Ok(parser.parse_expression(text, model)?),
    other => Ok(Expr::Literal(to_wire_scalar(other, model)?)),
  }
}
