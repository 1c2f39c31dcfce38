//! Sessions and the transport capability they send through.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::expr::ExprParser;
use crate::parser::BasicParser;
use crate::protocol::{ClientMessage, Encoding, MAX_MESSAGE_SIZE};
use crate::result::PendingResult;
use crate::schema::Schema;

/// Sends complete messages to the server.
///
/// `send` must not block on the response; it hands back a [`PendingResult`]
/// whose metadata the caller awaits. Framing, multiplexing and timeouts are the
/// transport's business.
pub trait Transport: Send + Sync {
  fn send(&self, message: ClientMessage) -> Result<PendingResult>;
}

/// Session options
#[derive(Debug, Clone)]
pub struct SessionOptions {
  pub encoding: Encoding,
  pub max_message_size: u32,
  pub default_schema: Option<String>,
}

impl Default for SessionOptions {
  fn default() -> Self {
    Self {
      encoding: Encoding::default(),
      max_message_size: MAX_MESSAGE_SIZE,
      default_schema: None,
    }
  }
}

impl SessionOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_encoding(mut self, encoding: Encoding) -> Self {
    self.encoding = encoding;
    self
  }

  pub fn with_max_message_size(mut self, size: u32) -> Self {
    self.max_message_size = size;
    self
  }

  pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
    self.default_schema = Some(schema.into());
    self
  }
}

pub struct SessionBuilder {
  transport: Arc<dyn Transport>,
  parser: Arc<dyn ExprParser>,
  options: SessionOptions,
}

impl SessionBuilder {
  pub fn options(mut self, options: SessionOptions) -> Self {
    self.options = options;
    self
  }

  pub fn parser(mut self, parser: Arc<dyn ExprParser>) -> Self {
    self.parser = parser;
    self
  }

  pub fn build(self) -> Arc<Session> {
    Arc::new_cyclic(|me| Session {
      me: me.clone(),
      transport: self.transport,
      parser: self.parser,
      options: self.options,
      schemas: Mutex::new(HashMap::new()),
    })
  }
}

/// A logical connection: owns the transport and the schema cache.
pub struct Session {
  me: Weak<Session>,
  transport: Arc<dyn Transport>,
  parser: Arc<dyn ExprParser>,
  options: SessionOptions,
  schemas: Mutex<HashMap<String, Arc<Schema>>>,
}

impl Session {
  pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
    Self::builder(transport).build()
  }

  pub fn builder(transport: Arc<dyn Transport>) -> SessionBuilder {
    SessionBuilder {
      transport,
      parser: Arc::new(BasicParser),
      options: SessionOptions::default(),
    }
  }

  pub fn options(&self) -> &SessionOptions {
    &self.options
  }

  pub fn parser(&self) -> &dyn ExprParser {
    self.parser.as_ref()
  }

  pub(crate) fn transport(&self) -> &dyn Transport {
    self.transport.as_ref()
  }

  /// Returns the cached schema handle for `name`, creating it on first use.
  pub fn get_schema(&self, name: &str) -> Result<Arc<Schema>> {
    if name.is_empty() {
      return Err(Error::InvalidArgument("schema name must not be empty".to_string()));
    }

    let mut schemas = self.schemas.lock();
    if let Some(schema) = schemas.get(name) {
      return Ok(schema.clone());
    }

    debug!(target: "xcrud::session", schema = %name, "caching schema handle");
    let schema = Schema::new(self.me.clone(), name);
    schemas.insert(name.to_string(), schema.clone());
    Ok(schema)
  }

  pub fn default_schema(&self) -> Result<Arc<Schema>> {
    match &self.options.default_schema {
      Some(name) => self.get_schema(name),
      None => Err(Error::InvalidArgument("no default schema configured".to_string())),
    }
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("options", &self.options)
      .field("schemas", &self.schemas.lock().len())
      .finish()
  }
}
