//! Frame encoding for CRUD messages.
//!
//! A frame is a 4 byte little-endian length, a message type byte and the payload.
//! The length counts the type byte plus the payload.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, Encoding, MessageType, FRAME_HEADER_SIZE};

fn encode_payload<T: Serialize>(value: &T, encoding: Encoding) -> Result<Vec<u8>> {
  match encoding {
    Encoding::MessagePack => Ok(rmp_serde::to_vec_named(value)?),
    Encoding::Json => Ok(serde_json::to_vec(value)?),
  }
}

fn decode_payload<T: DeserializeOwned>(bytes: &[u8], encoding: Encoding) -> Result<T> {
  match encoding {
    Encoding::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
    Encoding::Json => Ok(serde_json::from_slice(bytes)?),
  }
}

/// Encode a message into a complete frame
pub fn encode_frame(message: &ClientMessage, encoding: Encoding, max_size: u32) -> Result<Vec<u8>> {
  let payload = match message {
    ClientMessage::Find(m) => encode_payload(m, encoding)?,
    ClientMessage::Insert(m) => encode_payload(m, encoding)?,
    ClientMessage::Update(m) => encode_payload(m, encoding)?,
    ClientMessage::Delete(m) => encode_payload(m, encoding)?,
  };

  let len = payload.len() + 1;
  if len > max_size as usize {
    return Err(Error::MessageTooLarge {
      size: len,
      max: max_size,
    });
  }

  let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
  buf.extend_from_slice(&(len as u32).to_le_bytes());
  buf.push(message.message_type() as u8);
  buf.extend_from_slice(&payload);

  trace!(target: "xcrud::codec", kind = %message.kind(), frame_len = buf.len(), "encoded frame");
  Ok(buf)
}

fn decode_body(message_type: u8, payload: &[u8], encoding: Encoding) -> Result<ClientMessage> {
  let message_type = MessageType::try_from(message_type)
    .map_err(|_| Error::Serialization(format!("Unknown message type: {}", message_type)))?;

  let message = match message_type {
    MessageType::CrudFind => ClientMessage::Find(decode_payload(payload, encoding)?),
    MessageType::CrudInsert => ClientMessage::Insert(decode_payload(payload, encoding)?),
    MessageType::CrudUpdate => ClientMessage::Update(decode_payload(payload, encoding)?),
    MessageType::CrudDelete => ClientMessage::Delete(decode_payload(payload, encoding)?),
  };
  Ok(message)
}

fn frame_len(header: [u8; 4], max_size: u32) -> Result<usize> {
  let len = u32::from_le_bytes(header);
  if len == 0 {
    return Err(Error::Serialization("Empty frame".to_string()));
  }
  if len > max_size {
    return Err(Error::MessageTooLarge {
      size: len as usize,
      max: max_size,
    });
  }
  Ok(len as usize)
}

/// Decode one frame from the front of `buf`.
///
/// Returns `None` when `buf` does not yet hold a whole frame, otherwise the
/// message and the number of bytes consumed.
pub fn decode_frame(
  buf: &[u8],
  encoding: Encoding,
  max_size: u32,
) -> Result<Option<(ClientMessage, usize)>> {
  if buf.len() < 4 {
    return Ok(None);
  }
  let len = frame_len([buf[0], buf[1], buf[2], buf[3]], max_size)?;
  let total = 4 + len;
  if buf.len() < total {
    return Ok(None);
  }

  let message = decode_body(buf[4], &buf[FRAME_HEADER_SIZE..total], encoding)?;
  trace!(target: "xcrud::codec", kind = %message.kind(), frame_len = total, "decoded frame");
  Ok(Some((message, total)))
}

/// Write one message as a frame
pub async fn write_message<W: AsyncWrite + Unpin>(
  writer: &mut W,
  message: &ClientMessage,
  encoding: Encoding,
  max_size: u32,
) -> Result<()> {
  let frame = encode_frame(message, encoding, max_size)?;
  writer.write_all(&frame).await?;
  writer.flush().await?;
  Ok(())
}

/// Read one framed message
pub async fn read_message<R: AsyncRead + Unpin>(
  reader: &mut R,
  encoding: Encoding,
  max_size: u32,
) -> Result<ClientMessage> {
  let mut header = [0u8; 4];
  reader.read_exact(&mut header).await?;
  let len = frame_len(header, max_size)?;

  let mut body = vec![0u8; len];
  reader.read_exact(&mut body).await?;

  decode_body(body[0], &body[1..], encoding)
}
