//! xcrud: CRUD statement builders for X Protocol clients
//!
//! Builds Find, Insert, Update and Delete messages against document
//! collections and relational tables, validates them, and hands them to a
//! [`Transport`] for delivery.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use xcrud::{Session, Transport};
//!
//! async fn run(transport: Arc<dyn Transport>) -> xcrud::Result<()> {
//!     let session = Session::new(transport);
//!     let users = session.get_schema("test")?.get_collection("users")?;
//!
//!     // Add a document; `_id` is generated when missing
//!     let added = users.add(json!({"name": "Alice", "age": 17}))?.execute().await?;
//!     println!("Added: {:?}", added.last_document_ids());
//!
//!     // Query documents
//!     let rows = users
//!         .find("age < 17")?
//!         .fields(&["name", "age as years"])?
//!         .limit(4)
//!         .skip(1)
//!         .execute()
//!         .await?
//!         .fetch_all()
//!         .await?;
//!     for row in rows {
//!         println!("Found: {}", row.document()?);
//!     }
//!
//!     // Relational side
//!     let people = session.get_schema("test")?.get_table("people")?;
//!     people
//!         .update()?
//!         .set("age", xcrud::expr("age + 1"))?
//!         .filter("name = 'Alice'")?
//!         .execute()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
mod error;
pub mod expr;
pub mod parser;
mod pipeline;
pub mod protocol;
pub mod result;
mod schema;
mod session;
pub mod statement;
pub mod value;

pub use error::{Error, ParseError, Result};
pub use expr::{ColumnIdentifier, DocumentPathItem, Expr, ExprParser, Projection};
pub use parser::BasicParser;
pub use protocol::{
  ClientMessage, CrudMessage, DataModel, Delete, Encoding, Find, Insert, Locator, MessageKind,
  MessageType, Update, UpdateOperation, UpdateType, MAX_MESSAGE_SIZE,
};
pub use result::{CrudResult, PendingResult, ResultMetadata, ResultSender, Row};
pub use schema::{Collection, Schema, Table};
pub use session::{Session, SessionBuilder, SessionOptions, Transport};
pub use statement::collection::{AddStatement, FindStatement, ModifyStatement, RemoveStatement};
pub use statement::table::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
pub use value::{expr, Scalar, Value};
