//! Validate, send, wait for metadata.

use tracing::debug;

use crate::codec;
use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, CrudMessage};
use crate::result::CrudResult;
use crate::session::Session;

/// Sends `message` once it is complete and waits for the result metadata.
///
/// The message is framed with the session's encoding first, so a statement
/// over `max_message_size` fails with `MessageTooLarge` before it reaches the
/// transport. Rows are left unread. Transport errors are returned as they
/// come; nothing is retried.
pub(crate) async fn send_and_await_metadata<M: CrudMessage>(
  session: &Session,
  message: M,
) -> Result<CrudResult> {
  if let Some(missing) = message.missing_field() {
    return Err(Error::IncompleteStatement {
      kind: M::KIND,
      missing,
    });
  }

  let message: ClientMessage = message.into();
  let options = session.options();
  let frame = codec::encode_frame(&message, options.encoding, options.max_message_size)?;

  let locator = message.locator();
  debug!(
    target: "xcrud::execute",
    kind = %M::KIND,
    schema = %locator.schema(),
    object = %locator.name(),
    model = %locator.model(),
    frame_len = frame.len(),
    "sending statement"
  );

  let pending = session.transport().send(message)?;
  let result = pending.wait_for_metadata().await?;

  debug!(
    target: "xcrud::execute",
    kind = %M::KIND,
    columns = result.columns().len(),
    affected_rows = ?result.affected_rows(),
    "metadata received"
  );
  Ok(result)
}
