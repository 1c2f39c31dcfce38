//! Staged statement builders.
//!
//! Every builder carries a stage marker type parameter. A chain method exists on
//! a builder only at the stages where the protocol allows it, and each call
//! consumes the builder and returns the next stage. `execute` consumes the
//! builder too, so a statement is sent at most once.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprParser};
use crate::pipeline;
use crate::protocol::{CrudMessage, DataModel};
use crate::result::CrudResult;
use crate::session::Session;

mod sealed {
  pub trait Sealed {}
}

/// Marker for a builder stage.
pub trait Stage: sealed::Sealed {}

macro_rules! stages {
  ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
    $(
      $(#[$meta])*
      #[derive(Debug)]
      pub struct $name;
      impl crate::statement::sealed::Sealed for $name {}
      impl crate::statement::Stage for $name {}
    )+
  };
}

macro_rules! capability {
  ($capability:ident => $($stage:ident),+ $(,)?) => {
    pub trait $capability: crate::statement::Stage {}
    $(impl $capability for $stage {})+
  };
}

pub(crate) use capability;
pub(crate) use stages;

pub mod collection;
pub mod table;

/// Message under construction plus the session it will be sent through.
#[derive(Debug)]
pub(crate) struct Draft<M> {
  session: Arc<Session>,
  message: M,
}

impl<M: CrudMessage> Draft<M> {
  pub(crate) fn new(session: Arc<Session>, message: M) -> Self {
    Self { session, message }
  }

  pub(crate) fn parser(&self) -> &dyn ExprParser {
    self.session.parser()
  }

  pub(crate) fn message(&self) -> &M {
    &self.message
  }

  pub(crate) fn message_mut(&mut self) -> &mut M {
    &mut self.message
  }

  pub(crate) async fn execute(self) -> Result<CrudResult> {
    pipeline::send_and_await_metadata(&self.session, self.message).await
  }
}

/// Empty condition text means no filter; it is never handed to the parser.
pub(crate) fn parse_condition(
  session: &Session,
  condition: &str,
  model: DataModel,
) -> Result<Option<Expr>> {
  if condition.is_empty() {
    return Ok(None);
  }
  Ok(Some(session.parser().parse_filter(condition, model)?))
}

/// Rejects an empty argument list for a method that needs at least one entry.
pub(crate) fn require_args(method: &str, args: &[&str]) -> Result<()> {
  if args.is_empty() || args.iter().any(|arg| arg.trim().is_empty()) {
    return Err(Error::InvalidArgument(format!(
      "{} requires at least one non-empty argument",
      method
    )));
  }
  Ok(())
}

/// Reserved chain methods: argument errors first, then `NotImplemented`.
pub(crate) fn reserved<T>(method: &'static str, args: &[&str]) -> Result<T> {
  require_args(method, args)?;
  Err(Error::NotImplemented { method })
}
