//! Length-prefixed message framing over a byte stream.
//!
//! A frame is a 4-byte big-endian unsigned length followed by exactly that
//! many payload bytes. Stream transports deliver bytes in arbitrary chunks,
//! so both directions loop until the full count has moved: a frame is never
//! considered decodable until every declared byte has arrived, and a write
//! is not complete until every byte has been accepted.
//!
//! A read or write call that moves zero bytes means the peer closed the
//! connection; this surfaces as [`BridgeError::ConnectionBroken`], never as
//! a silently short payload.
//!
//! No maximum frame length is imposed at this layer; the practical limit is
//! available memory.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BridgeError, Result};

/// Size of the length header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Write one frame: the 4-byte big-endian length of `payload`, then
/// `payload` itself.
///
/// Loops on partial writes until every byte has been sent, then flushes.
///
/// # Errors
///
/// - [`BridgeError::ConnectionBroken`] if a write call reports zero bytes
///   sent (peer closed).
/// - [`BridgeError::Serialization`] if the payload exceeds the 32-bit
///   length field.
/// - [`BridgeError::Io`] for other transport failures.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| {
        BridgeError::Serialization(format!(
            "payload of {} bytes exceeds the 32-bit length field",
            payload.len()
        ))
    })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    let mut sent = 0;
    while sent < frame.len() {
        let n = writer.write(&frame[sent..]).await?;
        if n == 0 {
            return Err(BridgeError::ConnectionBroken("sending a frame"));
        }
        sent += n;
    }

    writer.flush().await?;
    Ok(())
}

/// Read one frame: exactly 4 header bytes, then exactly the declared number
/// of payload bytes.
///
/// # Errors
///
/// Returns [`BridgeError::ConnectionBroken`] if the stream ends before the
/// expected count is reached, whether inside the header or the payload.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    read_full(reader, &mut header, "receiving a frame header").await?;

    let len = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload, "receiving a frame payload").await?;

    Ok(payload)
}

/// Fill `buf` completely, looping on partial reads.
async fn read_full<R>(reader: &mut R, buf: &mut [u8], what: &'static str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(BridgeError::ConnectionBroken(what));
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    /// Test timeout to prevent hanging tests.
    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Encode a frame into a plain byte vector.
    async fn frame_bytes(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_frame(&mut buf, payload).await.expect("Write failed");
        buf
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let payload = br#"{"kind":"info","payload":"exit"}"#;
        write_frame(&mut client, payload).await.expect("Write failed");

        let received = timeout(TEST_TIMEOUT, read_frame(&mut server))
            .await
            .expect("Test timed out")
            .expect("Read failed");

        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_header_is_big_endian() {
        let bytes = frame_bytes(b"hello").await;
        assert_eq!(&bytes[..HEADER_SIZE], &[0, 0, 0, 5]);
        assert_eq!(&bytes[HEADER_SIZE..], b"hello");
    }

    #[tokio::test]
    async fn test_empty_payload_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(64);

        write_frame(&mut client, b"").await.expect("Write failed");
        let received = timeout(TEST_TIMEOUT, read_frame(&mut server))
            .await
            .expect("Test timed out")
            .expect("Read failed");

        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_chunked_delivery_matches_single_delivery() {
        // Deliver the frame one byte at a time; the decoder must loop until
        // the declared count has arrived and produce the same payload.
        let payload = b"partial delivery should be invisible";
        let bytes = frame_bytes(payload).await;

        let (mut client, mut server) = tokio::io::duplex(8);
        let writer = tokio::spawn(async move {
            for byte in bytes {
                client.write_all(&[byte]).await.expect("chunk write failed");
                client.flush().await.expect("flush failed");
            }
        });

        let received = timeout(TEST_TIMEOUT, read_frame(&mut server))
            .await
            .expect("Test timed out")
            .expect("Read failed");

        writer.await.expect("writer task failed");
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_truncated_payload_is_connection_broken() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        // Declare 10 bytes but deliver only 4, then close.
        client
            .write_all(&[0, 0, 0, 10])
            .await
            .expect("header write failed");
        client.write_all(b"abcd").await.expect("body write failed");
        drop(client);

        let result = timeout(TEST_TIMEOUT, read_frame(&mut server))
            .await
            .expect("Test timed out");

        match result {
            Err(BridgeError::ConnectionBroken(what)) => {
                assert_eq!(what, "receiving a frame payload")
            }
            other => panic!("Expected ConnectionBroken, got: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_truncated_header_is_connection_broken() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[0, 0]).await.expect("write failed");
        drop(client);

        let result = timeout(TEST_TIMEOUT, read_frame(&mut server))
            .await
            .expect("Test timed out");

        assert!(matches!(
            result,
            Err(BridgeError::ConnectionBroken("receiving a frame header"))
        ));
    }

    #[tokio::test]
    async fn test_back_to_back_frames() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, b"first").await.expect("Write failed");
        write_frame(&mut client, b"second").await.expect("Write failed");

        let one = read_frame(&mut server).await.expect("Read failed");
        let two = read_frame(&mut server).await.expect("Read failed");

        assert_eq!(one, b"first");
        assert_eq!(two, b"second");
    }
}
