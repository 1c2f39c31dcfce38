//! CRUD message types for the X Protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{ColumnIdentifier, Expr, Projection};
use crate::value::Scalar;

/// Maximum message size (16MB)
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Frame header: 4 byte little-endian length followed by the message type byte
pub const FRAME_HEADER_SIZE: usize = 5;

/// Client message type ids for the CRUD messages
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
  CrudFind = 17,
  CrudInsert = 18,
  CrudUpdate = 19,
  CrudDelete = 20,
}

impl TryFrom<u8> for MessageType {
  type Error = ();
  fn try_from(v: u8) -> Result<Self, Self::Error> {
    match v {
      17 => Ok(Self::CrudFind),
      18 => Ok(Self::CrudInsert),
      19 => Ok(Self::CrudUpdate),
      20 => Ok(Self::CrudDelete),
      _ => Err(()),
    }
  }
}

/// Payload encoding formats
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Encoding {
  #[default]
  MessagePack = 0x01,
  Json = 0x02,
}

impl TryFrom<u8> for Encoding {
  type Error = ();
  fn try_from(v: u8) -> Result<Self, Self::Error> {
    match v {
      0x01 => Ok(Self::MessagePack),
      0x02 => Ok(Self::Json),
      _ => Err(()),
    }
  }
}

/// Data model a message targets. Serialized as its X Protocol number.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DataModel {
  Document = 1,
  Table = 2,
}

impl From<DataModel> for u8 {
  fn from(model: DataModel) -> u8 {
    model as u8
  }
}

impl TryFrom<u8> for DataModel {
  type Error = String;
  fn try_from(v: u8) -> Result<Self, Self::Error> {
    match v {
      1 => Ok(Self::Document),
      2 => Ok(Self::Table),
      _ => Err(format!("Unknown data model: {}", v)),
    }
  }
}

impl fmt::Display for DataModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DataModel::Document => write!(f, "document"),
      DataModel::Table => write!(f, "table"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
  Find,
  Insert,
  Update,
  Delete,
}

impl fmt::Display for MessageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MessageKind::Find => write!(f, "Find"),
      MessageKind::Insert => write!(f, "Insert"),
      MessageKind::Update => write!(f, "Update"),
      MessageKind::Delete => write!(f, "Delete"),
    }
  }
}

/// Server-side target of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
  schema: String,
  name: String,
  model: DataModel,
}

impl Locator {
  pub fn new(schema: impl Into<String>, name: impl Into<String>, model: DataModel) -> Self {
    Self {
      schema: schema.into(),
      name: name.into(),
      model,
    }
  }

  pub fn schema(&self) -> &str {
    &self.schema
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn model(&self) -> DataModel {
    self.model
  }

  fn missing_field(&self) -> Option<&'static str> {
    if self.schema.is_empty() {
      Some("collection.schema")
    } else if self.name.is_empty() {
      Some("collection.name")
    } else {
      None
    }
  }
}

/// Kind of an update operation. Serialized as its X Protocol number.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UpdateType {
  Set = 1,
  ItemRemove = 2,
  ItemSet = 3,
  ItemReplace = 4,
  ArrayInsert = 6,
  ArrayAppend = 7,
}

impl From<UpdateType> for u8 {
  fn from(kind: UpdateType) -> u8 {
    kind as u8
  }
}

impl TryFrom<u8> for UpdateType {
  type Error = String;
  fn try_from(v: u8) -> Result<Self, Self::Error> {
    match v {
      1 => Ok(Self::Set),
      2 => Ok(Self::ItemRemove),
      3 => Ok(Self::ItemSet),
      4 => Ok(Self::ItemReplace),
      6 => Ok(Self::ArrayInsert),
      7 => Ok(Self::ArrayAppend),
      _ => Err(format!("Unknown update type: {}", v)),
    }
  }
}

impl UpdateType {
  pub fn takes_value(self) -> bool {
    !matches!(self, UpdateType::ItemRemove)
  }
}

/// One entry of an Update message's ordered operation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOperation {
  pub source: ColumnIdentifier,
  pub operation: UpdateType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<Expr>,
}

impl UpdateOperation {
  pub fn new(source: ColumnIdentifier, operation: UpdateType, value: Option<Expr>) -> Self {
    Self {
      source,
      operation,
      value,
    }
  }

  fn is_well_formed(&self) -> bool {
    !self.source.is_empty() && self.operation.takes_value() == self.value.is_some()
  }
}

/// One inserted row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRow {
  pub fields: Vec<Scalar>,
}

impl TypedRow {
  pub fn new(fields: Vec<Scalar>) -> Self {
    Self { fields }
  }
}

/// Shared behaviour of the four CRUD messages.
pub trait CrudMessage: Into<ClientMessage> {
  const KIND: MessageKind;

  fn locator(&self) -> &Locator;

  /// Fixed when the message is created.
  fn data_model(&self) -> DataModel {
    self.locator().model()
  }

  /// First required field that is not yet set, if any.
  fn missing_field(&self) -> Option<&'static str>;

  fn is_complete(&self) -> bool {
    self.missing_field().is_none()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Find {
  collection: Locator,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  projection: Vec<Projection>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  criteria: Option<Expr>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  limit: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  offset: Option<u64>,
}

impl Find {
  pub fn new(collection: Locator) -> Self {
    Self {
      collection,
      projection: Vec::new(),
      criteria: None,
      limit: None,
      offset: None,
    }
  }

  pub fn set_criteria(&mut self, criteria: Expr) {
    self.criteria = Some(criteria);
  }

  pub fn set_projection(&mut self, projection: Vec<Projection>) {
    self.projection = projection;
  }

  pub fn set_limit(&mut self, limit: u64) {
    self.limit = Some(limit);
  }

  pub fn set_offset(&mut self, offset: u64) {
    self.offset = Some(offset);
  }

  pub fn criteria(&self) -> Option<&Expr> {
    self.criteria.as_ref()
  }

  /// Empty means every field or column.
  pub fn projection(&self) -> &[Projection] {
    &self.projection
  }

  pub fn limit(&self) -> Option<u64> {
    self.limit
  }

  pub fn offset(&self) -> Option<u64> {
    self.offset
  }
}

impl CrudMessage for Find {
  const KIND: MessageKind = MessageKind::Find;

  fn locator(&self) -> &Locator {
    &self.collection
  }

  fn missing_field(&self) -> Option<&'static str> {
    self.collection.missing_field()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
  collection: Locator,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  projection: Vec<String>,
  rows: Vec<TypedRow>,
}

impl Insert {
  pub fn new(collection: Locator) -> Self {
    Self {
      collection,
      projection: Vec::new(),
      rows: Vec::new(),
    }
  }

  pub fn set_projection(&mut self, columns: Vec<String>) {
    self.projection = columns;
  }

  pub fn append_row(&mut self, row: TypedRow) {
    self.rows.push(row);
  }

  /// Column names; empty means all columns in table order.
  pub fn projection(&self) -> &[String] {
    &self.projection
  }

  pub fn rows(&self) -> &[TypedRow] {
    &self.rows
  }
}

impl CrudMessage for Insert {
  const KIND: MessageKind = MessageKind::Insert;

  fn locator(&self) -> &Locator {
    &self.collection
  }

  fn missing_field(&self) -> Option<&'static str> {
    if let Some(missing) = self.collection.missing_field() {
      return Some(missing);
    }
    if self.rows.is_empty() {
      return Some("row");
    }
    if self.rows.iter().any(|row| row.fields.is_empty()) {
      return Some("row.field");
    }
    None
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
  collection: Locator,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  criteria: Option<Expr>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  limit: Option<u64>,
  operations: Vec<UpdateOperation>,
}

impl Update {
  pub fn new(collection: Locator) -> Self {
    Self {
      collection,
      criteria: None,
      limit: None,
      operations: Vec::new(),
    }
  }

  pub fn set_criteria(&mut self, criteria: Expr) {
    self.criteria = Some(criteria);
  }

  pub fn set_limit(&mut self, limit: u64) {
    self.limit = Some(limit);
  }

  pub fn append_operation(&mut self, operation: UpdateOperation) {
    self.operations.push(operation);
  }

  pub fn criteria(&self) -> Option<&Expr> {
    self.criteria.as_ref()
  }

  pub fn limit(&self) -> Option<u64> {
    self.limit
  }

  /// Applied by the server in this order.
  pub fn operations(&self) -> &[UpdateOperation] {
    &self.operations
  }
}

impl CrudMessage for Update {
  const KIND: MessageKind = MessageKind::Update;

  fn locator(&self) -> &Locator {
    &self.collection
  }

  fn missing_field(&self) -> Option<&'static str> {
    if let Some(missing) = self.collection.missing_field() {
      return Some(missing);
    }
    if self.operations.is_empty() {
      return Some("operation");
    }
    if !self.operations.iter().all(UpdateOperation::is_well_formed) {
      return Some("operation.value");
    }
    None
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
  collection: Locator,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  criteria: Option<Expr>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  limit: Option<u64>,
}

impl Delete {
  pub fn new(collection: Locator) -> Self {
    Self {
      collection,
      criteria: None,
      limit: None,
    }
  }

  pub fn set_criteria(&mut self, criteria: Expr) {
    self.criteria = Some(criteria);
  }

  pub fn set_limit(&mut self, limit: u64) {
    self.limit = Some(limit);
  }

  pub fn criteria(&self) -> Option<&Expr> {
    self.criteria.as_ref()
  }

  pub fn limit(&self) -> Option<u64> {
    self.limit
  }
}

impl CrudMessage for Delete {
  const KIND: MessageKind = MessageKind::Delete;

  fn locator(&self) -> &Locator {
    &self.collection
  }

  fn missing_field(&self) -> Option<&'static str> {
    self.collection.missing_field()
  }
}

/// Client-to-server CRUD message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
  Find(Find),
  Insert(Insert),
  Update(Update),
  Delete(Delete),
}

impl ClientMessage {
  pub fn kind(&self) -> MessageKind {
    match self {
      ClientMessage::Find(_) => MessageKind::Find,
      ClientMessage::Insert(_) => MessageKind::Insert,
      ClientMessage::Update(_) => MessageKind::Update,
      ClientMessage::Delete(_) => MessageKind::Delete,
    }
  }

  pub fn message_type(&self) -> MessageType {
    match self {
      ClientMessage::Find(_) => MessageType::CrudFind,
      ClientMessage::Insert(_) => MessageType::CrudInsert,
      ClientMessage::Update(_) => MessageType::CrudUpdate,
      ClientMessage::Delete(_) => MessageType::CrudDelete,
    }
  }

  pub fn locator(&self) -> &Locator {
    match self {
      ClientMessage::Find(m) => m.locator(),
      ClientMessage::Insert(m) => m.locator(),
      ClientMessage::Update(m) => m.locator(),
      ClientMessage::Delete(m) => m.locator(),
    }
  }

  pub fn is_complete(&self) -> bool {
    match self {
      ClientMessage::Find(m) => m.is_complete(),
      ClientMessage::Insert(m) => m.is_complete(),
      ClientMessage::Update(m) => m.is_complete(),
      ClientMessage::Delete(m) => m.is_complete(),
    }
  }
}

impl From<Find> for ClientMessage {
  fn from(m: Find) -> Self {
    ClientMessage::Find(m)
  }
}

impl From<Insert> for ClientMessage {
  fn from(m: Insert) -> Self {
    ClientMessage::Insert(m)
  }
}

impl From<Update> for ClientMessage {
  fn from(m: Update) -> Self {
    ClientMessage::Update(m)
  }
}

impl From<Delete> for ClientMessage {
  fn from(m: Delete) -> Self {
    ClientMessage::Delete(m)
  }
}
