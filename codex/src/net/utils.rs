use bincode::{
    config,
    error::{DecodeError, EncodeError},
};
use serde::{Serialize, de::DeserializeOwned};
use std::io::{self, Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::errors::{Result, TransportError};

/// Maximum allowed message size (1MB) to prevent DoS attacks via unbounded allocation
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Serialize a value with the wire configuration.
///
/// # Errors
///
/// Returns an error if the value can't be encoded or is too large to frame.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let bytes = bincode::serde::encode_to_vec(value, config::standard())?;
    check_size(bytes.len())?;
    Ok(bytes)
}

/// Deserialize a value encoded with [`encode`].
///
/// # Errors
///
/// Returns an error if the bytes aren't a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, config::standard())?;
    Ok(value)
}

fn check_size(len: usize) -> Result<()> {
    if len > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge {
            actual: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// Size prefix and payload in one buffer, so a frame is always written
/// with a single call and readers never see a prefix without its data.
fn frame(payload: Vec<u8>) -> Vec<u8> {
    let size = payload.len() as u32;
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend(size.to_le_bytes());
    buf.extend(payload);
    buf
}

fn decode_error_to_io(error: DecodeError) -> io::Error {
    match error {
        DecodeError::UnexpectedEnd { .. } => io::ErrorKind::UnexpectedEof.into(),
        DecodeError::Io { inner, .. } => inner,
        _ => io::ErrorKind::InvalidData.into(),
    }
}

fn encode_error_to_io(error: EncodeError) -> io::Error {
    match error {
        EncodeError::Io { inner, .. } => inner,
        _ => io::ErrorKind::InvalidData.into(),
    }
}

pub fn read_prefixed<T: DeserializeOwned, R: Read>(reader: &mut R) -> io::Result<T> {
    // Read the size as a u32
    let mut len_bytes = [0; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    // Validate message size to prevent DoS attacks
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message size {len} exceeds maximum allowed size of {MAX_MESSAGE_SIZE} bytes"),
        ));
    }

    // A read timeout in the middle of a frame means the sender doesn't
    // follow the prefix protocol. Report it as invalid data so callers
    // drop the peer instead of waiting on it again.
    let mut buf = vec![0; len];
    if let Err(error) = reader.read_exact(&mut buf) {
        let kind = match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => io::ErrorKind::InvalidData,
            error => error,
        };
        return Err(kind.into());
    }

    bincode::serde::decode_from_slice(&buf, config::standard())
        .map(|(value, _)| value)
        .map_err(decode_error_to_io)
}

pub fn write_prefixed<T: Serialize, W: Write>(writer: &mut W, value: &T) -> io::Result<()> {
    let serialized =
        bincode::serde::encode_to_vec(value, config::standard()).map_err(encode_error_to_io)?;

    // Validate message size before sending
    if serialized.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "serialized message size {} exceeds maximum allowed size of {MAX_MESSAGE_SIZE} bytes",
                serialized.len()
            ),
        ));
    }

    writer.write_all(&frame(serialized))?;
    writer.flush()
}

/// Async counterpart of [`read_prefixed`] used by the server tasks.
///
/// # Errors
///
/// Returns an error on I/O failure, an oversized prefix, or a payload
/// that doesn't decode as `T`.
pub async fn read_frame<T, R>(reader: &mut R) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    check_size(len)?;

    let mut buf = vec![0; len];
    reader.read_exact(&mut buf).await?;
    decode(&buf)
}

/// Async counterpart of [`write_prefixed`].
///
/// # Errors
///
/// Returns an error if the value can't be encoded or the write fails.
pub async fn write_frame<T, W>(writer: &mut W, value: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let buf = frame(encode(value)?);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Write},
        net::{TcpListener, TcpStream},
        time::Duration,
    };

    use super::{MAX_MESSAGE_SIZE, read_frame, read_prefixed, write_frame, write_prefixed};
    use crate::net::errors::TransportError;

    fn setup() -> (TcpStream, TcpStream) {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (stream, _) = server.accept().unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        (client, stream)
    }

    #[test]
    fn write_and_read() {
        let (mut client, mut stream) = setup();
        let value = "Hello, World!".to_string();
        assert!(write_prefixed(&mut stream, &value).is_ok());
        assert!(read_prefixed::<String, TcpStream>(&mut client).is_ok_and(|v| v == value));
    }

    #[test]
    fn write_and_read_invalid_data() {
        let (mut client, mut stream) = setup();

        // Writing a size but not having the data to follow it up
        // results in invalid data once the read times out.
        assert!(stream.write_all(&1u32.to_le_bytes()).is_ok());
        assert_eq!(
            read_prefixed::<String, TcpStream>(&mut client).map_err(|e| e.kind()),
            Err(io::ErrorKind::InvalidData)
        );
    }

    #[test]
    fn write_and_read_unexpected_eof() {
        let (mut client, mut stream) = setup();
        let value = "Hello, World!".to_string();
        let buf = value.as_bytes();
        let incorrect_size = buf.len() as u32 - 2;
        assert!(stream.write_all(&incorrect_size.to_le_bytes()).is_ok());
        assert!(stream.write_all(buf).is_ok());
        assert_eq!(
            read_prefixed::<String, TcpStream>(&mut client).map_err(|e| e.kind()),
            Err(io::ErrorKind::UnexpectedEof)
        );
    }

    #[test]
    fn reject_oversized_message() {
        let (mut client, mut stream) = setup();

        // Send a size prefix claiming 2GB of data
        let malicious_size = 2_000_000_000u32;
        assert!(stream.write_all(&malicious_size.to_le_bytes()).is_ok());

        // Should reject with InvalidData, not attempt allocation
        assert_eq!(
            read_prefixed::<String, TcpStream>(&mut client).map_err(|e| e.kind()),
            Err(io::ErrorKind::InvalidData)
        );
    }

    #[test]
    fn write_and_read_multiple_messages() {
        let (mut client, mut stream) = setup();

        let msgs = vec!["first", "second", "third"];
        for msg in &msgs {
            assert!(write_prefixed(&mut stream, &msg.to_string()).is_ok());
        }

        for msg in &msgs {
            let received: String = read_prefixed(&mut client).unwrap();
            assert_eq!(received, *msg);
        }
    }

    #[tokio::test]
    async fn async_frames_roundtrip_in_order() {
        let (mut left, mut right) = tokio::io::duplex(4096);
        for value in [1u32, 2, 3] {
            write_frame(&mut left, &value).await.unwrap();
        }
        for expected in [1u32, 2, 3] {
            let value: u32 = read_frame(&mut right).await.unwrap();
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn async_rejects_oversized_prefix() {
        use tokio::io::AsyncWriteExt;

        let (mut left, mut right) = tokio::io::duplex(64);
        let size = (MAX_MESSAGE_SIZE as u32) + 1;
        left.write_all(&size.to_le_bytes()).await.unwrap();
        let result = read_frame::<String, _>(&mut right).await;
        assert!(matches!(
            result,
            Err(TransportError::MessageTooLarge { actual, .. }) if actual == MAX_MESSAGE_SIZE + 1
        ));
    }

    #[tokio::test]
    async fn async_reports_closed_peer() {
        let (left, mut right) = tokio::io::duplex(64);
        drop(left);
        let result = read_frame::<String, _>(&mut right).await;
        assert!(matches!(result, Err(TransportError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof));
    }
}
