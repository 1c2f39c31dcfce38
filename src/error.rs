//! Error types for the xcrud statement layer.

use thiserror::Error;

use crate::protocol::{DataModel, MessageKind};

#[derive(Error, Debug)]
pub enum Error {
  #[error("{kind} statement is not completely initialized: missing {missing}")]
  IncompleteStatement {
    kind: MessageKind,
    missing: &'static str,
  },

  #[error("Unsupported value kind {given} for the {expected_model} data model")]
  UnsupportedValueKind {
    given: &'static str,
    expected_model: DataModel,
  },

  #[error("{method} is not implemented")]
  NotImplemented { method: &'static str },

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error("Transport error: {0}")]
  Transport(String),

  #[error("Server error {code}: {message}")]
  Server { code: u16, message: String },

  #[error("Session closed")]
  SessionClosed,

  #[error("Channel closed")]
  ChannelClosed,

  #[error("Serialization error: {0}")]
  Serialization(String),

  #[error("Message too large: {size} bytes (max {max})")]
  MessageTooLarge { size: usize, max: u32 },

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Failure reported by an expression parser, surfaced to callers unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position}")]
pub struct ParseError {
  pub message: String,
  pub position: usize,
}

impl ParseError {
  pub fn new(message: impl Into<String>, position: usize) -> Self {
    Self {
      message: message.into(),
      position,
    }
  }
}

impl From<rmp_serde::encode::Error> for Error {
  fn from(e: rmp_serde::encode::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

impl From<rmp_serde::decode::Error> for Error {
  fn from(e: rmp_serde::decode::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;
