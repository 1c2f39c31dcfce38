//! Schema, table and collection handles.
//!
//! Handles point back at their owner through weak references: a table or
//! collection never keeps its schema or session alive. Each schema caches the
//! handles it hands out, so asking twice for the same name returns the same
//! `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{DataModel, Locator};
use crate::session::Session;
use crate::statement::collection::{AddStatement, FindStatement, ModifyStatement, RemoveStatement};
use crate::statement::table::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};

pub struct Schema {
  name: String,
  session: Weak<Session>,
  tables: Mutex<HashMap<String, Arc<Table>>>,
  collections: Mutex<HashMap<String, Arc<Collection>>>,
}

impl Schema {
  pub(crate) fn new(session: Weak<Session>, name: &str) -> Arc<Self> {
    Arc::new(Schema {
      name: name.to_string(),
      session,
      tables: Mutex::new(HashMap::new()),
      collections: Mutex::new(HashMap::new()),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn session(&self) -> Result<Arc<Session>> {
    self.session.upgrade().ok_or(Error::SessionClosed)
  }

  pub fn get_table(self: &Arc<Self>, name: &str) -> Result<Arc<Table>> {
    check_name("table", name)?;

    let mut tables = self.tables.lock();
    if let Some(table) = tables.get(name) {
      return Ok(table.clone());
    }

    debug!(target: "xcrud::schema", schema = %self.name, table = %name, "caching table handle");
    let table = Arc::new(Table {
      name: name.to_string(),
      schema_name: self.name.clone(),
      schema: Arc::downgrade(self),
    });
    tables.insert(name.to_string(), table.clone());
    Ok(table)
  }

  pub fn get_collection(self: &Arc<Self>, name: &str) -> Result<Arc<Collection>> {
    check_name("collection", name)?;

    let mut collections = self.collections.lock();
    if let Some(collection) = collections.get(name) {
      return Ok(collection.clone());
    }

    debug!(target: "xcrud::schema", schema = %self.name, collection = %name, "caching collection handle");
    let collection = Arc::new(Collection {
      name: name.to_string(),
      schema_name: self.name.clone(),
      schema: Arc::downgrade(self),
    });
    collections.insert(name.to_string(), collection.clone());
    Ok(collection)
  }
}

impl std::fmt::Debug for Schema {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Schema").field("name", &self.name).finish()
  }
}

fn check_name(what: &str, name: &str) -> Result<()> {
  if name.is_empty() {
    return Err(Error::InvalidArgument(format!("{} name must not be empty", what)));
  }
  Ok(())
}

fn session_of(schema: &Weak<Schema>) -> Result<Arc<Session>> {
  schema.upgrade().ok_or(Error::SessionClosed)?.session()
}

/// Relational table
#[derive(Debug)]
pub struct Table {
  name: String,
  schema_name: String,
  schema: Weak<Schema>,
}

impl Table {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn schema(&self) -> Result<Arc<Schema>> {
    self.schema.upgrade().ok_or(Error::SessionClosed)
  }

  pub fn locator(&self) -> Locator {
    Locator::new(&self.schema_name, &self.name, DataModel::Table)
  }

  /// Select the given columns (`"age as years"` aliases allowed); empty selects all.
  pub fn select(&self, columns: &[&str]) -> Result<SelectStatement> {
    SelectStatement::new(session_of(&self.schema)?, self.locator(), columns)
  }

  /// Insert into the given columns; empty means all columns in table order.
  pub fn insert(&self, columns: &[&str]) -> Result<InsertStatement> {
    InsertStatement::new(session_of(&self.schema)?, self.locator(), columns)
  }

  pub fn update(&self) -> Result<UpdateStatement> {
    Ok(UpdateStatement::new(session_of(&self.schema)?, self.locator()))
  }

  pub fn delete(&self) -> Result<DeleteStatement> {
    Ok(DeleteStatement::new(session_of(&self.schema)?, self.locator()))
  }
}

/// Document collection
#[derive(Debug)]
pub struct Collection {
  name: String,
  schema_name: String,
  schema: Weak<Schema>,
}

impl Collection {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn schema(&self) -> Result<Arc<Schema>> {
    self.schema.upgrade().ok_or(Error::SessionClosed)
  }

  pub fn locator(&self) -> Locator {
    Locator::new(&self.schema_name, &self.name, DataModel::Document)
  }

  /// Find documents matching `condition`; empty means no filter.
  pub fn find(&self, condition: &str) -> Result<FindStatement> {
    FindStatement::new(session_of(&self.schema)?, self.locator(), condition)
  }

  pub fn add(&self, document: serde_json::Value) -> Result<AddStatement> {
    AddStatement::new(session_of(&self.schema)?, self.locator(), document)
  }

  pub fn modify(&self, condition: &str) -> Result<ModifyStatement> {
    ModifyStatement::new(session_of(&self.schema)?, self.locator(), condition)
  }

  pub fn remove(&self, condition: &str) -> Result<RemoveStatement> {
    RemoveStatement::new(session_of(&self.schema)?, self.locator(), condition)
  }
}
