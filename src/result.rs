//! Pending and resolved statement results.
//!
//! A transport answers a sent message with a [`PendingResult`] and keeps the
//! matching [`ResultSender`]. Metadata (column shape or the write acknowledgement)
//! arrives once; rows stream afterwards until the sender is dropped.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::value::Scalar;

/// Column type tags as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
  SignedInt,
  UnsignedInt,
  Double,
  Float,
  Bytes,
  Time,
  Datetime,
  Set,
  Enum,
  Bit,
  Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
  pub name: String,
  pub field_type: FieldType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub original_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub table: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schema: Option<String>,
}

impl ColumnMetadata {
  pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
    Self {
      name: name.into(),
      field_type,
      original_name: None,
      table: None,
      schema: None,
    }
  }
}

/// Everything known about a result before its rows are read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
  pub columns: Vec<ColumnMetadata>,
  pub affected_rows: Option<u64>,
  pub last_insert_id: Option<u64>,
  pub warnings: Vec<String>,
}

/// One result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
  pub fields: Vec<Scalar>,
}

impl Row {
  pub fn new(fields: Vec<Scalar>) -> Self {
    Self { fields }
  }

  pub fn get(&self, index: usize) -> Option<&Scalar> {
    self.fields.get(index)
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// Decode a document-model row (one JSON field) into a JSON value.
  pub fn document(&self) -> Result<serde_json::Value> {
    match self.fields.first() {
      Some(Scalar::Octets(bytes)) => Ok(serde_json::from_slice(bytes)?),
      Some(Scalar::String(text)) => Ok(serde_json::from_str(text)?),
      _ => Err(Error::Serialization("Row is not a document".to_string())),
    }
  }
}

/// Transport-side half of a pending result.
#[derive(Debug)]
pub struct ResultSender {
  metadata: Option<oneshot::Sender<Result<ResultMetadata>>>,
  rows: mpsc::UnboundedSender<Result<Row>>,
}

impl ResultSender {
  /// Deliver the metadata. Only the first call has any effect.
  pub fn send_metadata(&mut self, metadata: ResultMetadata) -> Result<()> {
    match self.metadata.take() {
      Some(tx) => tx.send(Ok(metadata)).map_err(|_| Error::ChannelClosed),
      None => Err(Error::InvalidArgument(
        "metadata was already delivered".to_string(),
      )),
    }
  }

  pub fn send_row(&self, row: Row) -> Result<()> {
    self.rows.send(Ok(row)).map_err(|_| Error::ChannelClosed)
  }

  /// Fail the result: before metadata the error is what `execute()` returns,
  /// afterwards it ends the row stream.
  pub fn fail(mut self, error: Error) {
    match self.metadata.take() {
      Some(tx) => {
        let _ = tx.send(Err(error));
      }
      None => {
        let _ = self.rows.send(Err(error));
      }
    }
  }
}

/// Client-side handle to an in-flight response.
#[derive(Debug)]
pub struct PendingResult {
  metadata: oneshot::Receiver<Result<ResultMetadata>>,
  rows: mpsc::UnboundedReceiver<Result<Row>>,
}

impl PendingResult {
  pub fn channel() -> (ResultSender, PendingResult) {
    let (metadata_tx, metadata_rx) = oneshot::channel();
    let (rows_tx, rows_rx) = mpsc::unbounded_channel();
    (
      ResultSender {
        metadata: Some(metadata_tx),
        rows: rows_tx,
      },
      PendingResult {
        metadata: metadata_rx,
        rows: rows_rx,
      },
    )
  }

  /// Wait until metadata arrives; rows stay unread.
  pub async fn wait_for_metadata(self) -> Result<CrudResult> {
    let metadata = self.metadata.await.map_err(|_| Error::ChannelClosed)??;
    Ok(CrudResult {
      metadata,
      rows: self.rows,
      document_ids: Vec::new(),
    })
  }
}

/// Result of an executed statement. Rows are read lazily.
#[derive(Debug)]
pub struct CrudResult {
  metadata: ResultMetadata,
  rows: mpsc::UnboundedReceiver<Result<Row>>,
  document_ids: Vec<String>,
}

impl CrudResult {
  pub(crate) fn with_document_ids(mut self, ids: Vec<String>) -> Self {
    self.document_ids = ids;
    self
  }

  pub fn metadata(&self) -> &ResultMetadata {
    &self.metadata
  }

  pub fn columns(&self) -> &[ColumnMetadata] {
    &self.metadata.columns
  }

  pub fn affected_rows(&self) -> Option<u64> {
    self.metadata.affected_rows
  }

  pub fn last_insert_id(&self) -> Option<u64> {
    self.metadata.last_insert_id
  }

  pub fn warnings(&self) -> &[String] {
    &self.metadata.warnings
  }

  /// `_id`s of the documents sent by an add statement.
  pub fn last_document_ids(&self) -> &[String] {
    &self.document_ids
  }

  /// Next row, or `None` once the transport finished the result.
  pub async fn fetch_one(&mut self) -> Result<Option<Row>> {
    self.rows.recv().await.transpose()
  }

  pub async fn fetch_all(mut self) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = self.fetch_one().await? {
      rows.push(row);
    }
    Ok(rows)
  }

  pub fn into_stream(self) -> impl Stream<Item = Result<Row>> {
    futures::stream::unfold(self.rows, |mut rows| async move {
      rows.recv().await.map(|row| (row, rows))
    })
  }
}
