//! `Content-Length` framing over byte streams.
//!
//! A frame is a header block terminated by an empty line, followed by exactly
//! the announced number of payload bytes:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//! Header names match case-insensitively and unknown headers are ignored.

use std::io::{self, BufRead, Write};

use crate::error::MessageError;

/// Header blocks inspected for a `Content-Length` before giving up on a frame.
pub const MAX_HEADER_ATTEMPTS: usize = 4;

/// Largest header block accepted before the input is treated as garbage.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Largest payload a frame may announce.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length";

/// Prefixes `payload` with its `Content-Length` header.
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    let mut frame = Vec::with_capacity(header.len() + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Writes one frame and flushes the writer.
///
/// # Errors
///
/// Returns `MessageError::Io` if the write or flush fails.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<(), MessageError> {
    writer.write_all(&encode(payload))?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame and returns its payload (blocks until complete).
///
/// # Errors
///
/// Returns `MessageError::Incomplete` if the stream ends mid-frame (with
/// `received == 0` for a clean close between frames), `MessageError::Empty`
/// if no header block within [`MAX_HEADER_ATTEMPTS`] announces a length,
/// `MessageError::InvalidLength` for a non-decimal length, a length above
/// [`MAX_PAYLOAD_BYTES`] or an oversized header block, and
/// `MessageError::Io` for other read failures. A rejected length still
/// consumes its whole header block, so the next call starts on a fresh frame.
pub fn read_frame<R: BufRead + ?Sized>(reader: &mut R) -> Result<Vec<u8>, MessageError> {
    let mut received = 0;
    let length = read_content_length(reader, &mut received)?;
    let mut payload = vec![0_u8; length];
    reader.read_exact(&mut payload).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            MessageError::Incomplete {
                received: received.max(1),
            }
        } else {
            MessageError::Io(error)
        }
    })?;
    Ok(payload)
}

fn read_content_length<R: BufRead + ?Sized>(
    reader: &mut R,
    received: &mut usize,
) -> Result<usize, MessageError> {
    for _ in 0..MAX_HEADER_ATTEMPTS {
        if let Some(length) = read_header_block(reader, received)? {
            return Ok(length);
        }
    }
    Err(MessageError::Empty {
        attempts: MAX_HEADER_ATTEMPTS,
    })
}

/// Consumes one header block and returns the announced length, if any.
fn read_header_block<R: BufRead + ?Sized>(
    reader: &mut R,
    received: &mut usize,
) -> Result<Option<usize>, MessageError> {
    let mut block_bytes = 0;
    let mut content_length = Ok(None);
    let mut line = Vec::new();

    loop {
        line.clear();
        let bytes_read = reader.read_until(b'\n', &mut line)?;
        if bytes_read == 0 {
            return Err(MessageError::Incomplete {
                received: *received,
            });
        }
        *received += bytes_read;
        block_bytes += bytes_read;
        if block_bytes > MAX_HEADER_BYTES {
            return Err(MessageError::InvalidLength {
                value: format!("header block exceeds {MAX_HEADER_BYTES} bytes"),
            });
        }

        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return content_length;
        }
        // The first invalid length wins; the rest of the block is still drained.
        if content_length.is_ok() {
            match parse_content_length(trimmed) {
                Ok(None) => {}
                found => content_length = found,
            }
        }
    }
}

fn parse_content_length(header_line: &str) -> Result<Option<usize>, MessageError> {
    let Some((name, value)) = header_line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
        return Ok(None);
    }
    let value = value.trim();
    match value.parse::<usize>() {
        Ok(length) if length <= MAX_PAYLOAD_BYTES => Ok(Some(length)),
        _ => Err(MessageError::InvalidLength {
            value: value.to_owned(),
        }),
    }
}
