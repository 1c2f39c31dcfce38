//! In-memory X Protocol server used by the integration tests.
//!
//! Every message goes through the frame codec before it is evaluated, so the
//! tests also cover what a real transport would put on the wire.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Map, Value as Json};
use xcrud::codec::{decode_frame, encode_frame};
use xcrud::result::{ColumnMetadata, FieldType};
use xcrud::{
  ClientMessage, CrudMessage, DataModel, Delete, DocumentPathItem, Encoding, Error, Expr, Find, Insert,
  PendingResult, Projection, Result, ResultMetadata, Row, Scalar, Session, Update, UpdateType,
  MAX_MESSAGE_SIZE,
};

type Key = (String, String);

#[derive(Debug, Clone)]
struct MemTable {
  columns: Vec<String>,
  rows: Vec<Vec<Scalar>>,
}

#[derive(Default)]
struct Store {
  collections: HashMap<Key, Vec<Json>>,
  tables: HashMap<Key, MemTable>,
}

/// Answer produced for one message
struct Reply {
  metadata: ResultMetadata,
  rows: Vec<Row>,
}

pub struct MemoryServer {
  encoding: Encoding,
  store: Mutex<Store>,
  sent: Mutex<Vec<ClientMessage>>,
  refuse: Mutex<Option<String>>,
}

impl MemoryServer {
  pub fn new() -> Arc<Self> {
    Self::with_encoding(Encoding::MessagePack)
  }

  pub fn with_encoding(encoding: Encoding) -> Arc<Self> {
    Arc::new(Self {
      encoding,
      store: Mutex::new(Store::default()),
      sent: Mutex::new(Vec::new()),
      refuse: Mutex::new(None),
    })
  }

  pub fn session(self: &Arc<Self>) -> Arc<Session> {
    Session::new(self.clone())
  }

  pub fn seed_collection(&self, schema: &str, name: &str, docs: Vec<Json>) {
    self
      .store
      .lock()
      .collections
      .insert(key(schema, name), docs);
  }

  pub fn create_table(&self, schema: &str, name: &str, columns: &[&str], rows: Vec<Vec<Json>>) {
    let table = MemTable {
      columns: columns.iter().map(|c| c.to_string()).collect(),
      rows: rows
        .into_iter()
        .map(|row| row.iter().map(json_to_scalar).collect())
        .collect(),
    };
    self.store.lock().tables.insert(key(schema, name), table);
  }

  pub fn documents(&self, schema: &str, name: &str) -> Vec<Json> {
    self
      .store
      .lock()
      .collections
      .get(&key(schema, name))
      .cloned()
      .unwrap_or_default()
  }

  /// Table rows as JSON objects keyed by column name.
  pub fn table_rows(&self, schema: &str, name: &str) -> Vec<Json> {
    let store = self.store.lock();
    match store.tables.get(&key(schema, name)) {
      Some(table) => table.rows.iter().map(|row| row_object(table, row)).collect(),
      None => Vec::new(),
    }
  }

  /// Messages as decoded from their frames, in send order.
  pub fn sent(&self) -> Vec<ClientMessage> {
    self.sent.lock().clone()
  }

  /// Make every following `send` fail at the transport level.
  pub fn refuse_sends(&self, reason: &str) {
    *self.refuse.lock() = Some(reason.to_string());
  }

  fn handle(&self, message: ClientMessage) -> Result<Reply> {
    let mut store = self.store.lock();
    match message {
      ClientMessage::Find(find) => store.find(&find),
      ClientMessage::Insert(insert) => store.insert(&insert),
      ClientMessage::Update(update) => store.update(&update),
      ClientMessage::Delete(delete) => store.delete(&delete),
    }
  }
}

impl xcrud::Transport for MemoryServer {
  fn send(&self, message: ClientMessage) -> Result<PendingResult> {
    if let Some(reason) = self.refuse.lock().clone() {
      return Err(Error::Transport(reason));
    }

    let frame = encode_frame(&message, self.encoding, MAX_MESSAGE_SIZE)?;
    let (decoded, used) = decode_frame(&frame, self.encoding, MAX_MESSAGE_SIZE)?
      .ok_or_else(|| Error::Serialization("short frame".to_string()))?;
    assert_eq!(used, frame.len());
    self.sent.lock().push(decoded.clone());

    let (mut tx, pending) = PendingResult::channel();
    match self.handle(decoded) {
      Ok(reply) => {
        let _ = tx.send_metadata(reply.metadata);
        for row in reply.rows {
          let _ = tx.send_row(row);
        }
      }
      Err(err) => tx.fail(err),
    }
    Ok(pending)
  }
}

fn key(schema: &str, name: &str) -> Key {
  (schema.to_string(), name.to_string())
}

fn no_such(schema: &str, name: &str) -> Error {
  Error::Server {
    code: 1146,
    message: format!("Table '{}.{}' doesn't exist", schema, name),
  }
}

fn affected(count: usize) -> ResultMetadata {
  ResultMetadata {
    affected_rows: Some(count as u64),
    ..Default::default()
  }
}

impl Store {
  fn find(&self, find: &Find) -> Result<Reply> {
    let locator = find.locator();
    let key = key(locator.schema(), locator.name());

    let (names, records): (Vec<String>, Vec<Json>) = match locator.model() {
      DataModel::Document => {
        let docs = self
          .collections
          .get(&key)
          .ok_or_else(|| no_such(locator.schema(), locator.name()))?;
        (vec!["doc".to_string()], docs.clone())
      }
      DataModel::Table => {
        let table = self
          .tables
          .get(&key)
          .ok_or_else(|| no_such(locator.schema(), locator.name()))?;
        let rows = table.rows.iter().map(|row| row_object(table, row)).collect();
        (table.columns.clone(), rows)
      }
    };

    let offset = find.offset().unwrap_or(0) as usize;
    let limit = find.limit().map_or(usize::MAX, |l| l as usize);
    let matched: Vec<Json> = records
      .into_iter()
      .filter(|record| selects(find.criteria(), record))
      .skip(offset)
      .take(limit)
      .collect();

    match locator.model() {
      DataModel::Document => {
        let rows = matched
          .iter()
          .map(|doc| {
            let doc = project_document(find.projection(), doc);
            Row::new(vec![Scalar::Octets(doc.to_string().into_bytes())])
          })
          .collect();
        Ok(Reply {
          metadata: ResultMetadata {
            columns: vec![ColumnMetadata::new("doc", FieldType::Bytes)],
            ..Default::default()
          },
          rows,
        })
      }
      DataModel::Table => {
        let projection: Vec<(String, Expr)> = if find.projection().is_empty() {
          names
            .iter()
            .map(|name| (name.clone(), Expr::Ident(xcrud::ColumnIdentifier::column(name))))
            .collect()
        } else {
          find
            .projection()
            .iter()
            .map(|p| (projection_name(p), p.source.clone()))
            .collect()
        };
        let rows: Vec<Row> = matched
          .iter()
          .map(|record| {
            Row::new(
              projection
                .iter()
                .map(|(_, source)| json_to_scalar(&eval(source, record)))
                .collect(),
            )
          })
          .collect();
        let columns = projection
          .iter()
          .enumerate()
          .map(|(i, (name, _))| {
            let kind = rows
              .first()
              .and_then(|row| row.get(i))
              .map_or(FieldType::Bytes, field_type);
            ColumnMetadata::new(name.clone(), kind)
          })
          .collect();
        Ok(Reply {
          metadata: ResultMetadata {
            columns,
            ..Default::default()
          },
          rows,
        })
      }
    }
  }

  fn insert(&mut self, insert: &Insert) -> Result<Reply> {
    let locator = insert.locator();
    let key = key(locator.schema(), locator.name());

    match locator.model() {
      DataModel::Document => {
        let docs = self.collections.entry(key).or_default();
        for row in insert.rows() {
          let doc = match row.fields.first() {
            Some(Scalar::Octets(bytes)) => serde_json::from_slice(bytes)?,
            other => {
              return Err(Error::Server {
                code: 5115,
                message: format!("Document is not octets: {:?}", other),
              })
            }
          };
          docs.push(doc);
        }
        Ok(Reply {
          metadata: affected(insert.rows().len()),
          rows: Vec::new(),
        })
      }
      DataModel::Table => {
        let table = self
          .tables
          .get_mut(&key)
          .ok_or_else(|| no_such(locator.schema(), locator.name()))?;
        let targets: Vec<String> = if insert.projection().is_empty() {
          table.columns.clone()
        } else {
          insert.projection().to_vec()
        };

        for row in insert.rows() {
          if row.fields.len() != targets.len() {
            return Err(Error::Server {
              code: 1136,
              message: "Column count doesn't match value count".to_string(),
            });
          }
          let mut stored = vec![Scalar::Null; table.columns.len()];
          for (column, value) in targets.iter().zip(&row.fields) {
            let index = table
              .columns
              .iter()
              .position(|c| c == column)
              .ok_or_else(|| Error::Server {
                code: 1054,
                message: format!("Unknown column '{}'", column),
              })?;
            stored[index] = value.clone();
          }
          table.rows.push(stored);
        }
        Ok(Reply {
          metadata: ResultMetadata {
            affected_rows: Some(insert.rows().len() as u64),
            last_insert_id: Some(table.rows.len() as u64),
            ..Default::default()
          },
          rows: Vec::new(),
        })
      }
    }
  }

  fn update(&mut self, update: &Update) -> Result<Reply> {
    let locator = update.locator();
    let key = key(locator.schema(), locator.name());
    let limit = update.limit().map_or(usize::MAX, |l| l as usize);
    let mut count = 0;

    match locator.model() {
      DataModel::Document => {
        let docs = self
          .collections
          .get_mut(&key)
          .ok_or_else(|| no_such(locator.schema(), locator.name()))?;
        for doc in docs.iter_mut() {
          if count == limit {
            break;
          }
          if !selects(update.criteria(), doc) {
            continue;
          }
          for op in update.operations() {
            apply_document_operation(doc, op);
          }
          count += 1;
        }
      }
      DataModel::Table => {
        let table = self
          .tables
          .get_mut(&key)
          .ok_or_else(|| no_such(locator.schema(), locator.name()))?;
        let columns = table.columns.clone();
        for row in table.rows.iter_mut() {
          if count == limit {
            break;
          }
          let record = object_of(&columns, row);
          if !selects(update.criteria(), &record) {
            continue;
          }
          for op in update.operations() {
            let (Some(name), Some(value)) = (&op.source.name, &op.value) else {
              continue;
            };
            if let Some(index) = columns.iter().position(|c| c == name) {
              row[index] = json_to_scalar(&eval(value, &record));
            }
          }
          count += 1;
        }
      }
    }

    Ok(Reply {
      metadata: affected(count),
      rows: Vec::new(),
    })
  }

  fn delete(&mut self, delete: &Delete) -> Result<Reply> {
    let locator = delete.locator();
    let key = key(locator.schema(), locator.name());
    let limit = delete.limit().map_or(usize::MAX, |l| l as usize);
    let mut count = 0;

    match locator.model() {
      DataModel::Document => {
        let docs = self
          .collections
          .get_mut(&key)
          .ok_or_else(|| no_such(locator.schema(), locator.name()))?;
        docs.retain(|doc| {
          if count < limit && selects(delete.criteria(), doc) {
            count += 1;
            false
          } else {
            true
          }
        });
      }
      DataModel::Table => {
        let table = self
          .tables
          .get_mut(&key)
          .ok_or_else(|| no_such(locator.schema(), locator.name()))?;
        let columns = table.columns.clone();
        table.rows.retain(|row| {
          if count < limit && selects(delete.criteria(), &object_of(&columns, row)) {
            count += 1;
            false
          } else {
            true
          }
        });
      }
    }

    Ok(Reply {
      metadata: affected(count),
      rows: Vec::new(),
    })
  }
}

fn apply_document_operation(doc: &mut Json, op: &xcrud::UpdateOperation) {
  let Some(DocumentPathItem::Member(member)) = op.source.document_path.first() else {
    return;
  };
  let value = op.value.as_ref().map(|v| eval(v, doc));
  let Some(fields) = doc.as_object_mut() else {
    return;
  };

  match (op.operation, value) {
    (UpdateType::ItemSet, Some(value)) => {
      fields.insert(member.clone(), value);
    }
    (UpdateType::ItemReplace, Some(value)) => {
      if let Some(slot) = fields.get_mut(member) {
        *slot = value;
      }
    }
    (UpdateType::ItemRemove, _) => {
      fields.remove(member);
    }
    (UpdateType::ArrayAppend, Some(value)) => {
      match fields.entry(member.clone()).or_insert_with(|| json!([])) {
        Json::Array(items) => items.push(value),
        other => *other = json!([other.clone(), value]),
      }
    }
    _ => {}
  }
}

fn row_object(table: &MemTable, row: &[Scalar]) -> Json {
  object_of(&table.columns, row)
}

fn object_of(columns: &[String], row: &[Scalar]) -> Json {
  let mut fields = Map::new();
  for (column, value) in columns.iter().zip(row) {
    fields.insert(column.clone(), scalar_to_json(value));
  }
  Json::Object(fields)
}

fn projection_name(projection: &Projection) -> String {
  if let Some(alias) = &projection.alias {
    return alias.clone();
  }
  match &projection.source {
    Expr::Ident(ident) => ident
      .name
      .clone()
      .or_else(|| match ident.document_path.last() {
        Some(DocumentPathItem::Member(name)) => Some(name.clone()),
        _ => None,
      })
      .unwrap_or_default(),
    _ => "expr".to_string(),
  }
}

fn project_document(projection: &[Projection], doc: &Json) -> Json {
  if projection.is_empty() {
    return doc.clone();
  }
  let mut fields = Map::new();
  for p in projection {
    fields.insert(projection_name(p), eval(&p.source, doc));
  }
  Json::Object(fields)
}

fn selects(criteria: Option<&Expr>, record: &Json) -> bool {
  criteria.map_or(true, |c| truthy(&eval(c, record)))
}

fn truthy(value: &Json) -> bool {
  match value {
    Json::Bool(b) => *b,
    Json::Null => false,
    Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    _ => true,
  }
}

fn compare(a: &Json, b: &Json) -> Option<Ordering> {
  match (a, b) {
    (Json::Number(x), Json::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    (Json::String(x), Json::String(y)) => Some(x.cmp(y)),
    (Json::Bool(x), Json::Bool(y)) => Some(x.cmp(y)),
    (Json::Null, Json::Null) => Some(Ordering::Equal),
    _ => None,
  }
}

fn arithmetic(op: &str, a: &Json, b: &Json) -> Json {
  if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
    return match op {
      "+" => json!(x + y),
      "-" => json!(x - y),
      "*" => json!(x * y),
      "%" if y != 0 => json!(x % y),
      "/" if y != 0 => json!(x as f64 / y as f64),
      _ => Json::Null,
    };
  }
  match (a.as_f64(), b.as_f64()) {
    (Some(x), Some(y)) => match op {
      "+" => json!(x + y),
      "-" => json!(x - y),
      "*" => json!(x * y),
      "/" => json!(x / y),
      "%" => json!(x % y),
      _ => Json::Null,
    },
    _ => Json::Null,
  }
}

fn eval(expr: &Expr, record: &Json) -> Json {
  match expr {
    Expr::Ident(ident) => match &ident.name {
      Some(name) => record.get(name).cloned().unwrap_or(Json::Null),
      None => {
        let mut current = record;
        for item in &ident.document_path {
          let next = match item {
            DocumentPathItem::Member(name) => current.get(name),
            DocumentPathItem::ArrayIndex(i) => current.get(*i as usize),
            _ => None,
          };
          match next {
            Some(next) => current = next,
            None => return Json::Null,
          }
        }
        current.clone()
      }
    },
    Expr::Literal(scalar) => scalar_to_json(scalar),
    Expr::Operator { name, params } => {
      let args: Vec<Json> = params.iter().map(|p| eval(p, record)).collect();
      match (name.as_str(), args.as_slice()) {
        ("&&", [a, b]) => json!(truthy(a) && truthy(b)),
        ("||", [a, b]) => json!(truthy(a) || truthy(b)),
        ("not", [a]) => json!(!truthy(a)),
        ("sign_minus", [a]) => arithmetic("-", &json!(0), a),
        ("sign_plus", [a]) => a.clone(),
        ("==", [a, b]) => json!(compare(a, b) == Some(Ordering::Equal)),
        ("!=", [a, b]) => json!(compare(a, b) != Some(Ordering::Equal)),
        ("<", [a, b]) => json!(compare(a, b) == Some(Ordering::Less)),
        ("<=", [a, b]) => json!(matches!(compare(a, b), Some(Ordering::Less | Ordering::Equal))),
        (">", [a, b]) => json!(compare(a, b) == Some(Ordering::Greater)),
        (">=", [a, b]) => json!(matches!(
          compare(a, b),
          Some(Ordering::Greater | Ordering::Equal)
        )),
        ("is", [a, _]) => json!(a.is_null()),
        ("is_not", [a, _]) => json!(!a.is_null()),
        ("in", [a, rest @ ..]) => json!(rest.iter().any(|b| compare(a, b) == Some(Ordering::Equal))),
        ("not_in", [a, rest @ ..]) => {
          json!(!rest.iter().any(|b| compare(a, b) == Some(Ordering::Equal)))
        }
        (op @ ("+" | "-" | "*" | "/" | "%"), [a, b]) => arithmetic(op, a, b),
        _ => Json::Null,
      }
    }
    _ => Json::Null,
  }
}

fn scalar_to_json(scalar: &Scalar) -> Json {
  match scalar {
    Scalar::SignedInt(v) => json!(v),
    Scalar::UnsignedInt(v) => json!(v),
    Scalar::Null => Json::Null,
    Scalar::Octets(bytes) => serde_json::from_slice(bytes)
      .unwrap_or_else(|_| Json::String(String::from_utf8_lossy(bytes).into_owned())),
    Scalar::Double(v) => json!(v),
    Scalar::Float(v) => json!(v),
    Scalar::Bool(v) => json!(v),
    Scalar::String(v) => json!(v),
  }
}

fn json_to_scalar(value: &Json) -> Scalar {
  match value {
    Json::Null => Scalar::Null,
    Json::Bool(b) => Scalar::Bool(*b),
    Json::Number(n) => match (n.as_i64(), n.as_u64()) {
      (Some(i), _) => Scalar::SignedInt(i),
      (None, Some(u)) => Scalar::UnsignedInt(u),
      _ => Scalar::Double(n.as_f64().unwrap_or_default()),
    },
    Json::String(s) => Scalar::String(s.clone()),
    other => Scalar::Octets(other.to_string().into_bytes()),
  }
}

fn field_type(scalar: &Scalar) -> FieldType {
  match scalar {
    Scalar::SignedInt(_) => FieldType::SignedInt,
    Scalar::UnsignedInt(_) => FieldType::UnsignedInt,
    Scalar::Double(_) => FieldType::Double,
    Scalar::Float(_) => FieldType::Float,
    _ => FieldType::Bytes,
  }
}

/// Seven people aged 17, 15, 14, 13, 14, 16 and 14.
pub fn people() -> Vec<Json> {
  vec![
    json!({"_id": "1", "name": "Alice", "age": 17}),
    json!({"_id": "2", "name": "Bob", "age": 15}),
    json!({"_id": "3", "name": "Carol", "age": 14}),
    json!({"_id": "4", "name": "Dave", "age": 13}),
    json!({"_id": "5", "name": "Eve", "age": 14}),
    json!({"_id": "6", "name": "Frank", "age": 16}),
    json!({"_id": "7", "name": "Grace", "age": 14}),
  ]
}

/// A session over a fresh server with `test.people` seeded as both a
/// collection and a table.
pub fn seeded() -> (Arc<MemoryServer>, Arc<Session>) {
  let server = MemoryServer::new();
  server.seed_collection("test", "people", people());
  server.create_table(
    "test",
    "people",
    &["id", "name", "age"],
    people()
      .iter()
      .enumerate()
      .map(|(i, p)| vec![json!(i as i64 + 1), p["name"].clone(), p["age"].clone()])
      .collect(),
  );
  let session = server.session();
  (server, session)
}
