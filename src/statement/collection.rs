//! Builders for document collections: find, add, modify, remove.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use super::{parse_condition, require_args, reserved, Draft, Stage};
use crate::error::{Error, Result};
use crate::expr::ColumnIdentifier;
use crate::protocol::{DataModel, Delete, Find, Insert, Locator, TypedRow, Update, UpdateOperation, UpdateType};
use crate::result::CrudResult;
use crate::session::Session;
use crate::value::{to_expr, to_wire_scalar, Value};

/// Stages of [`FindStatement`]:
/// `fields → group_by → having → sort → limit → skip`.
pub mod find {
  use crate::statement::{capability, stages};

  stages!(Start, Fields, Grouped, Having, Sorted, Limited, Skipped);

  capability!(CanGroupBy => Start, Fields);
  capability!(CanHaving => Start, Fields, Grouped);
  capability!(CanSort => Start, Fields, Grouped, Having);
  capability!(CanLimit => Start, Fields, Grouped, Having, Sorted);
  capability!(CanSkip => Start, Fields, Grouped, Having, Sorted, Limited);
}

/// Stages of [`ModifyStatement`]: operations, then `sort → limit`.
pub mod modify {
  use crate::statement::{capability, stages};

  stages!(Start, Sorted, Limited);

  capability!(CanSort => Start);
  capability!(CanLimit => Start, Sorted);
}

/// Stages of [`RemoveStatement`]: `sort → limit`.
pub mod remove {
  use crate::statement::{capability, stages};

  stages!(Start, Sorted, Limited);

  capability!(CanSort => Start);
  capability!(CanLimit => Start, Sorted);
}

/// `collection.find(condition)`
#[derive(Debug)]
pub struct FindStatement<S: Stage = find::Start> {
  draft: Draft<Find>,
  stage: PhantomData<S>,
}

impl FindStatement<find::Start> {
  pub(crate) fn new(session: Arc<Session>, locator: Locator, condition: &str) -> Result<Self> {
    let mut message = Find::new(locator);
    if let Some(criteria) = parse_condition(&session, condition, DataModel::Document)? {
      message.set_criteria(criteria);
    }
    Ok(Self {
      draft: Draft::new(session, message),
      stage: PhantomData,
    })
  }

  /// Project the result onto the given paths, `"age as years"` style aliases allowed.
  pub fn fields(mut self, fields: &[&str]) -> Result<FindStatement<find::Fields>> {
    require_args("fields", fields)?;
    let mut projection = Vec::new();
    for field in fields {
      projection.extend(
        self
          .draft
          .parser()
          .parse_projection(field, DataModel::Document)?,
      );
    }
    self.draft.message_mut().set_projection(projection);
    Ok(self.advance())
  }
}

impl<S: Stage> FindStatement<S> {
  fn advance<T: Stage>(self) -> FindStatement<T> {
    FindStatement {
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

impl<S: find::CanGroupBy> FindStatement<S> {
  pub fn group_by(self, fields: &[&str]) -> Result<FindStatement<find::Grouped>> {
    reserved("group_by", fields)
  }
}

impl<S: find::CanHaving> FindStatement<S> {
  pub fn having(self, condition: &str) -> Result<FindStatement<find::Having>> {
    reserved("having", &[condition])
  }
}

impl<S: find::CanSort> FindStatement<S> {
  pub fn sort(self, fields: &[&str]) -> Result<FindStatement<find::Sorted>> {
    reserved("sort", fields)
  }
}

impl<S: find::CanLimit> FindStatement<S> {
  pub fn limit(mut self, limit: u64) -> FindStatement<find::Limited> {
    self.draft.message_mut().set_limit(limit);
    self.advance()
  }
}

impl<S: find::CanSkip> FindStatement<S> {
  pub fn skip(mut self, skip: u64) -> FindStatement<find::Skipped> {
    self.draft.message_mut().set_offset(skip);
    self.advance()
  }
}

/// `collection.add(document)`; further documents via [`AddStatement::add`].
#[derive(Debug)]
pub struct AddStatement {
  draft: Draft<Insert>,
  document_ids: Vec<String>,
}

impl AddStatement {
  pub(crate) fn new(
    session: Arc<Session>,
    locator: Locator,
    document: serde_json::Value,
  ) -> Result<Self> {
    let statement = Self {
      draft: Draft::new(session, Insert::new(locator)),
      document_ids: Vec::new(),
    };
    statement.add(document)
  }

  /// Queue one more document. A missing or null `_id` is generated.
  pub fn add(mut self, document: serde_json::Value) -> Result<Self> {
    let serde_json::Value::Object(mut fields) = document else {
      return Err(Error::InvalidArgument(
        "documents must be JSON objects".to_string(),
      ));
    };

    let id = match fields.get("_id") {
      Some(serde_json::Value::String(id)) => id.clone(),
      Some(serde_json::Value::Null) | None => {
        let id = Uuid::new_v4().simple().to_string();
        fields.insert("_id".to_string(), serde_json::Value::String(id.clone()));
        id
      }
      Some(other) => other.to_string(),
    };

    let document = serde_json::Value::Object(fields);
    let field = to_wire_scalar(&Value::document(&document), DataModel::Document)?;
    self.draft.message_mut().append_row(TypedRow::new(vec![field]));
    self.document_ids.push(id);
    Ok(self)
  }

  pub fn document_ids(&self) -> &[String] {
    &self.document_ids
  }

  pub fn message(&self) -> &Insert {
    self.draft.message()
  }

  pub async fn execute(self) -> Result<CrudResult> {
    let result = self.draft.execute().await?;
    Ok(result.with_document_ids(self.document_ids))
  }
}

/// `collection.modify(condition)`
#[derive(Debug)]
pub struct ModifyStatement<S: Stage = modify::Start> {
  draft: Draft<Update>,
  stage: PhantomData<S>,
}

impl ModifyStatement<modify::Start> {
  pub(crate) fn new(session: Arc<Session>, locator: Locator, condition: &str) -> Result<Self> {
    let mut message = Update::new(locator);
    if let Some(criteria) = parse_condition(&session, condition, DataModel::Document)? {
      message.set_criteria(criteria);
    }
    Ok(Self {
      draft: Draft::new(session, message),
      stage: PhantomData,
    })
  }

  /// Set a document member, creating it when absent.
  pub fn set(self, path: &str, value: impl Into<Value>) -> Result<Self> {
    self.operation("set", UpdateType::ItemSet, path, Some(value.into()))
  }

  /// Replace a document member that already exists.
  pub fn change(self, path: &str, value: impl Into<Value>) -> Result<Self> {
    self.operation("change", UpdateType::ItemReplace, path, Some(value.into()))
  }

  pub fn remove(self, path: &str) -> Result<Self> {
    self.operation("remove", UpdateType::ItemRemove, path, None)
  }

  pub fn array_append(self, path: &str, value: impl Into<Value>) -> Result<Self> {
    self.operation("array_append", UpdateType::ArrayAppend, path, Some(value.into()))
  }

  pub fn array_insert(self, path: &str, _index: u32, _value: impl Into<Value>) -> Result<Self> {
    reserved("array_insert", &[path])
  }

  // Only the first segment of the parsed path becomes the target.
  fn operation(
    mut self,
    method: &str,
    kind: UpdateType,
    path: &str,
    value: Option<Value>,
  ) -> Result<Self> {
    if path.trim().is_empty() {
      return Err(Error::InvalidArgument(format!(
        "{} requires a document path",
        method
      )));
    }

    let mut segments = self.draft.parser().parse_path(path)?.into_iter();
    let target = segments.next().ok_or_else(|| {
      Error::InvalidArgument(format!("{} requires a document path", method))
    })?;
    let dropped = segments.len();
    if dropped > 0 {
      warn!(
        target: "xcrud::modify",
        path = %path,
        dropped,
        "update target truncated to its first path segment"
      );
    }

    let value = match value {
      Some(value) => Some(to_expr(&value, DataModel::Document, self.draft.parser())?),
      None => None,
    };

    self.draft.message_mut().append_operation(UpdateOperation::new(
      ColumnIdentifier::path(vec![target]),
      kind,
      value,
    ));
    Ok(self)
  }
}

impl<S: Stage> ModifyStatement<S> {
  fn advance<T: Stage>(self) -> ModifyStatement<T> {
    ModifyStatement {
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

impl<S: modify::CanSort> ModifyStatement<S> {
  pub fn sort(self, fields: &[&str]) -> Result<ModifyStatement<modify::Sorted>> {
    reserved("sort", fields)
  }
}

impl<S: modify::CanLimit> ModifyStatement<S> {
  pub fn limit(mut self, limit: u64) -> ModifyStatement<modify::Limited> {
    self.draft.message_mut().set_limit(limit);
    self.advance()
  }
}

/// `collection.remove(condition)`
#[derive(Debug)]
pub struct RemoveStatement<S: Stage = remove::Start> {
  draft: Draft<Delete>,
  stage: PhantomData<S>,
}

impl RemoveStatement<remove::Start> {
  pub(crate) fn new(session: Arc<Session>, locator: Locator, condition: &str) -> Result<Self> {
    let mut message = Delete::new(locator);
    if let Some(criteria) = parse_condition(&session, condition, DataModel::Document)? {
      message.set_criteria(criteria);
    }
    Ok(Self {
      draft: Draft::new(session, message),
      stage: PhantomData,
    })
  }
}

impl<S: Stage> RemoveStatement<S> {
  fn advance<T: Stage>(self) -> RemoveStatement<T> {
    RemoveStatement {
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

impl<S: remove::CanSort> RemoveStatement<S> {
  pub fn sort(self, fields: &[&str]) -> Result<RemoveStatement<remove::Sorted>> {
    reserved("sort", fields)
  }
}

impl<S: remove::CanLimit> RemoveStatement<S> {
  pub fn limit(mut self, limit: u64) -> RemoveStatement<remove::Limited> {
    self.draft.message_mut().set_limit(limit);
    self.advance()
  }
}
