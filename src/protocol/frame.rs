//! Length-prefixed frame codec.
//!
//! A frame is a [`HEADER_LEN`]-byte ASCII header carrying the payload length
//! in decimal, left-justified and padded with spaces, followed by the payload:
//!
//! ```text
//! "5         hello"
//!  └ header ┘└body┘
//! ```
//!
//! Readers always consume exactly the header width and then exactly the
//! declared payload length, however the transport splits the bytes.

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Width of the length header in bytes.
pub const HEADER_LEN: usize = 10;

/// Largest payload length representable in the header.
pub const MAX_PAYLOAD_LEN: u64 = 9_999_999_999;

// ============================================================================
// Encoding
// ============================================================================

/// Encodes `payload` as one frame.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the payload length needs more than
/// [`HEADER_LEN`] digits.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    let length = payload.len();
    if length as u64 > MAX_PAYLOAD_LEN {
        return Err(Error::encoding(length, HEADER_LEN));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + length);
    frame.extend_from_slice(format!("{length:<HEADER_LEN$}").as_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parses a raw header into the payload length.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the header is empty, blank, or not a
/// non-negative decimal integer.
pub fn decode_header(raw: &[u8]) -> Result<u64> {
    if raw.is_empty() {
        return Err(Error::protocol("empty frame header"));
    }

    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::protocol("frame header is not ASCII"))?
        .trim();

    if text.is_empty() {
        return Err(Error::protocol("blank frame header"));
    }

    text.parse::<u64>()
        .map_err(|_| Error::protocol(format!("invalid frame header: {text:?}")))
}

// ============================================================================
// Stream I/O
// ============================================================================

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends cleanly before any header byte,
/// which callers treat as the peer closing the connection.
///
/// # Errors
///
/// - [`Error::Protocol`] if the stream closes mid-frame, the header is
///   malformed, or the payload exceeds `max_len`
/// - [`Error::Receive`] if the underlying read fails
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;

    while filled < HEADER_LEN {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(|e| Error::receive(e.to_string()))?;

        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::protocol(format!(
                "stream closed after {filled} of {HEADER_LEN} header bytes"
            )));
        }
        filled += n;
    }

    let length = decode_header(&header)?;
    if length > max_len as u64 {
        return Err(Error::protocol(format!(
            "frame of {length} bytes exceeds limit of {max_len}"
        )));
    }

    // Bounded by max_len above.
    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::protocol(format!("stream closed inside a {length}-byte payload"))
        } else {
            Error::receive(e.to_string())
        }
    })?;

    trace!(length, "Frame read");
    Ok(Some(payload))
}

/// Encodes `payload` and writes it to `writer`.
///
/// # Errors
///
/// - [`Error::Encoding`] if the payload is too large
/// - [`Error::Send`] if the write fails
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(payload)?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| Error::send(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::send(e.to_string()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use tokio_test::io::Builder;

    const LIMIT: usize = 1024 * 1024;

    #[test]
    fn test_encode_header_layout() {
        let frame = encode(b"hello").expect("encode");
        assert_eq!(&frame[..HEADER_LEN], b"5         ");
        assert_eq!(&frame[HEADER_LEN..], b"hello");
    }

    #[test]
    fn test_encode_counts_bytes_not_chars() {
        let frame = encode("¡hola!".as_bytes()).expect("encode");
        assert_eq!(decode_header(&frame[..HEADER_LEN]).expect("decode"), 7);
    }

    #[test]
    fn test_encode_empty_payload() {
        let frame = encode(b"").expect("encode");
        assert_eq!(frame, b"0         ");
    }

    #[test]
    fn test_decode_header_rejects_garbage() {
        assert!(decode_header(b"").is_err());
        assert!(decode_header(b"          ").is_err());
        assert!(decode_header(b"-1        ").is_err());
        assert!(decode_header(b"abc       ").is_err());
    }

    #[test]
    fn test_decode_header_max_width() {
        assert_eq!(
            decode_header(b"9999999999").expect("decode"),
            MAX_PAYLOAD_LEN
        );
    }

    #[tokio::test]
    async fn test_read_frame_reassembles_partial_reads() {
        let mut mock = Builder::new()
            .read(b"10  ")
            .read(b"      hola")
            .read(b" ")
            .read(b"mundo")
            .build();

        let payload = read_frame(&mut mock, LIMIT).await.expect("read");
        assert_eq!(payload.as_deref(), Some(&b"hola mundo"[..]));
    }

    #[tokio::test]
    async fn test_read_frame_clean_eof() {
        let mut mock = Builder::new().build();
        let payload = read_frame(&mut mock, LIMIT).await.expect("read");
        assert!(payload.is_none());
    }

    #[tokio::test]
    async fn test_read_frame_eof_inside_header() {
        let mut mock = Builder::new().read(b"5   ").build();
        let err = read_frame(&mut mock, LIMIT).await.unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[tokio::test]
    async fn test_read_frame_eof_inside_payload() {
        let mut mock = Builder::new().read(b"5         he").build();
        let err = read_frame(&mut mock, LIMIT).await.unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[tokio::test]
    async fn test_read_frame_over_limit() {
        let mut mock = Builder::new().read(b"2048      ").build();
        let err = read_frame(&mut mock, 1024).await.unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[tokio::test]
    async fn test_read_consecutive_frames() {
        let mut bytes = encode(b"first").expect("encode");
        bytes.extend(encode(b"second").expect("encode"));
        let mut reader = bytes.as_slice();

        let first = read_frame(&mut reader, LIMIT).await.expect("read");
        let second = read_frame(&mut reader, LIMIT).await.expect("read");
        let end = read_frame(&mut reader, LIMIT).await.expect("read");

        assert_eq!(first.as_deref(), Some(&b"first"[..]));
        assert_eq!(second.as_deref(), Some(&b"second"[..]));
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_write_frame() {
        let mut mock = Builder::new().write(b"3         abc").build();
        write_frame(&mut mock, b"abc").await.expect("write");
    }

    proptest! {
        #[test]
        fn prop_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let frame = encode(&payload).expect("encode");
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");

            let decoded = rt.block_on(async {
                let mut reader = frame.as_slice();
                read_frame(&mut reader, LIMIT).await
            });

            prop_assert_eq!(decoded.expect("decode"), Some(payload));
        }
    }
}
