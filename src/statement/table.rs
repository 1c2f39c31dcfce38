//! Builders for relational tables: select, insert, update, delete.

use std::marker::PhantomData;
use std::sync::Arc;

use super::{parse_condition, reserved, Draft, Stage};
use crate::error::{Error, Result};
use crate::expr::ColumnIdentifier;
use crate::protocol::{DataModel, Delete, Find, Insert, Locator, TypedRow, Update, UpdateOperation, UpdateType};
use crate::result::CrudResult;
use crate::session::Session;
use crate::value::{to_expr, to_wire_scalar, Value};

/// Stages of [`SelectStatement`]:
/// `filter → group_by → having → order_by → limit → offset`.
pub mod select {
  use crate::statement::{capability, stages};

  stages!(Start, Filtered, Grouped, Having, Ordered, Limited, Offset);

  capability!(CanGroupBy => Start, Filtered);
  capability!(CanHaving => Start, Filtered, Grouped);
  capability!(CanOrderBy => Start, Filtered, Grouped, Having);
  capability!(CanLimit => Start, Filtered, Grouped, Having, Ordered);
  capability!(CanOffset => Start, Filtered, Grouped, Having, Ordered, Limited);
}

/// Stages of [`UpdateStatement`]: `set*`, then `filter → order_by → limit`.
pub mod update {
  use crate::statement::{capability, stages};

  stages!(Start, Filtered, Ordered, Limited);

  capability!(CanOrderBy => Start, Filtered);
  capability!(CanLimit => Start, Filtered, Ordered);
}

/// Stages of [`DeleteStatement`]: `filter → order_by → limit`.
pub mod delete {
  use crate::statement::{capability, stages};

  stages!(Start, Filtered, Ordered, Limited);

  capability!(CanOrderBy => Start, Filtered);
  capability!(CanLimit => Start, Filtered, Ordered);
}

fn check_column(method: &str, column: &str) -> Result<()> {
  if column.trim().is_empty() {
    return Err(Error::InvalidArgument(format!(
      "{} requires non-empty column names",
      method
    )));
  }
  Ok(())
}

/// `table.select(columns)`
#[derive(Debug)]
pub struct SelectStatement<S: Stage = select::Start> {
  draft: Draft<Find>,
  stage: PhantomData<S>,
}

impl SelectStatement<select::Start> {
  pub(crate) fn new(session: Arc<Session>, locator: Locator, columns: &[&str]) -> Result<Self> {
    let mut projection = Vec::new();
    for column in columns {
      check_column("select", column)?;
      projection.extend(session.parser().parse_projection(column, DataModel::Table)?);
    }

    let mut message = Find::new(locator);
    message.set_projection(projection);
    Ok(Self {
      draft: Draft::new(session, message),
      stage: PhantomData,
    })
  }

  /// The search condition (`where`). Empty means no filter.
  pub fn filter(mut self, condition: &str) -> Result<SelectStatement<select::Filtered>> {
    if let Some(criteria) = parse_condition(&self.draft.session, condition, DataModel::Table)? {
      self.draft.message_mut().set_criteria(criteria);
    }
    Ok(self.advance())
  }
}

impl<S: Stage> SelectStatement<S> {
  fn advance<T: Stage>(self) -> SelectStatement<T> {
    SelectStatement {
      draft: self.draft,
      stage: PhantomData,
    }
  }

  pub fn message(&self) -> &Find {
    self.draft.message()
  }

  pub fn bind(self, name: &str, _value: impl Into<Value>) -> Result<Self> {
    reserved("bind", &[name])
  }

  pub async fn execute(self) -> Result<CrudResult> {
    self.draft.execute().await
  }
}

impl<S: select::CanGroupBy> SelectStatement<S> {
  pub fn group_by(self, columns: &[&str]) -> Result<SelectStatement<select::Grouped>> {
    reserved("group_by", columns)
  }
}

impl<S: select::CanHaving> SelectStatement<S> {
  pub fn having(self, condition: &str) -> Result<SelectStatement<select::Having>> {
    reserved("having", &[condition])
  }
}

impl<S: select::CanOrderBy> SelectStatement<S> {
  pub fn order_by(self, columns: &[&str]) -> Result<SelectStatement<select::Ordered>> {
    reserved("order_by", columns)
  }
}

impl<S: select::CanLimit> SelectStatement<S> {
  pub fn limit(mut self, limit: u64) -> SelectStatement<select::Limited> {
    self.draft.message_mut().set_limit(limit);
    self.advance()
  }
}

impl<S: select::CanOffset> SelectStatement<S> {
  pub fn offset(mut self, offset: u64) -> SelectStatement<select::Offset> {
    self.draft.message_mut().set_offset(offset);
    self.advance()
  }
}

/// `table.insert(columns)` followed by one or more `values(row)`.
#[derive(Debug)]
pub struct InsertStatement {
  draft: Draft<Insert>,
}

impl InsertStatement {
  pub(crate) fn new(session: Arc<Session>, locator: Locator, columns: &[&str]) -> Result<Self> {
    for column in columns {
      check_column("insert", column)?;
    }

    let mut message = Insert::new(locator);
    message.set_projection(columns.iter().map(|c| c.to_string()).collect());
    Ok(Self {
      draft: Draft::new(session, message),
    })
  }

  /// Append one row, one value per projected column.
  pub fn values(mut self, row: Vec<Value>) -> Result<Self> {
    if row.is_empty() {
      return Err(Error::InvalidArgument(
        "values requires at least one value".to_string(),
      ));
    }
    let columns = self.draft.message().projection().len();
    if columns > 0 && row.len() != columns {
      return Err(Error::InvalidArgument(format!(
        "values expects {} values, got {}",
        columns,
        row.len()
      )));
    }

    let fields = row
      .iter()
      .map(|value| to_wire_scalar(value, DataModel::Table))
      .collect::<Result<Vec<_>>>()?;
    self.draft.message_mut().append_row(TypedRow::new(fields));
    Ok(self)
  }

  pub fn message(&self) -> &Insert {
    self.draft.message()
  }

  pub async fn execute(self) -> Result<CrudResult> {
    self.draft.execute().await
  }
}

/// `table.update()`
#[derive(Debug)]
pub struct UpdateStatement<S: Stage = update::Start> {
  draft: Draft<Update>,
  stage: PhantomData<S>,
}

impl UpdateStatement<update::Start> {
  pub(crate) fn new(session: Arc<Session>, locator: Locator) -> Self {
    Self {
      draft: Draft::new(session, Update::new(locator)),
      stage: PhantomData,
    }
  }

  /// Assign a literal, or an expression built with [`expr`](crate::value::expr).
  pub fn set(mut self, column: &str, value: impl Into<Value>) -> Result<Self> {
    check_column("set", column)?;
    let value = to_expr(&value.into(), DataModel::Table, self.draft.parser())?;
    self.draft.message_mut().append_operation(UpdateOperation::new(
      ColumnIdentifier::column(column),
      UpdateType::Set,
      Some(value),
    ));
    Ok(self)
  }

  pub fn filter(mut self, condition: &str) -> Result<UpdateStatement<update::Filtered>> {
    if let Some(criteria) = parse_condition(&self.draft.session, condition, DataModel::Table)? {
      self.draft.message_mut().set_criteria(criteria);
    }
    Ok(self.advance())
  }
}

impl<S: Stage> UpdateStatement<S> {
  fn advance<T: Stage>(self) -> UpdateStatement<T> {
    UpdateStatement {
      draft: self.draft,
      stage: PhantomData,
    }
  }

  pub fn message(&self) -> &Update {
    self.draft.message()
  }

  pub fn bind(self, name: &str, _value: impl Into<Value>) -> Result<Self> {
    reserved("bind", &[name])
  }

  pub async fn execute(self) -> Result<CrudResult> {
    self.draft.execute().await
  }
}

impl<S: update::CanOrderBy> UpdateStatement<S> {
  pub fn order_by(self, columns: &[&str]) -> Result<UpdateStatement<update::Ordered>> {
    reserved("order_by", columns)
  }
}

impl<S: update::CanLimit> UpdateStatement<S> {
  pub fn limit(mut self, limit: u64) -> UpdateStatement<update::Limited> {
    self.draft.message_mut().set_limit(limit);
    self.advance()
  }
}

/// `table.delete()`
#[derive(Debug)]
pub struct DeleteStatement<S: Stage = delete::Start> {
  draft: Draft<Delete>,
  stage: PhantomData<S>,
}

impl DeleteStatement<delete::Start> {
  pub(crate) fn new(session: Arc<Session>, locator: Locator) -> Self {
    Self {
      draft: Draft::new(session, Delete::new(locator)),
      stage: PhantomData,
    }
  }

  pub fn filter(mut self, condition: &str) -> Result<DeleteStatement<delete::Filtered>> {
    if let Some(criteria) = parse_condition(&self.draft.session, condition, DataModel::Table)? {
      self.draft.message_mut().set_criteria(criteria);
    }
    Ok(self.advance())
  }
}

impl<S: Stage> DeleteStatement<S> {
  fn advance<T: Stage>(self) -> DeleteStatement<T> {
    DeleteStatement {
      draft: self.draft,
      stage: PhantomData,
    }
  }

  pub fn message(&self) -> &Delete {
    self.draft.message()
  }

  pub fn bind(self, name: &str, _value: impl Into<Value>) -> Result<Self> {
    reserved("bind", &[name])
  }

  pub async fn execute(self) -> Result<CrudResult> {
    self.draft.execute().await
  }
}

impl<S: delete::CanOrderBy> DeleteStatement<S> {
  pub fn order_by(self, columns: &[&str]) -> Result<DeleteStatement<delete::Ordered>> {
    reserved("order_by", columns)
  }
}

impl<S: delete::CanLimit> DeleteStatement<S> {
  pub fn limit(mut self, limit: u64) -> DeleteStatement<delete::Limited> {
    self.draft.message_mut().set_limit(limit);
    self.advance()
  }
}
