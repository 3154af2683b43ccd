//! Length-prefixed framing
//!
//! Every unit on the wire is `[u16 big-endian length][body]`; the length
//! counts the body only. Reads are all-or-nothing: a stream that ends inside
//! a frame is a protocol violation, not a reason to wait for more data.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::utils::{BrokerError, Result};

pub const HEADER_LEN: usize = 2;
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Read one frame body.
///
/// Fails with `PeerClosed` when the stream ends cleanly before a header and
/// with `PartialFrame` when it ends part-way through one.
pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let received = read_fully(reader, &mut header).await?;
    if received == 0 {
        return Err(BrokerError::PeerClosed);
    }
    if received < HEADER_LEN {
        return Err(BrokerError::PartialFrame {
            expected: HEADER_LEN,
            received,
        });
    }

    let expected = u16::from_be_bytes(header) as usize;
    let mut body = BytesMut::zeroed(expected);
    let received = read_fully(reader, &mut body).await?;
    if received < expected {
        return Err(BrokerError::PartialFrame { expected, received });
    }
    Ok(body.freeze())
}

async fn read_fully<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Prefix `body` with its length.
pub fn encode_frame(body: &[u8]) -> Result<Bytes> {
    let len = u16::try_from(body.len()).map_err(|_| BrokerError::FrameTooLarge(body.len()))?;
    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    frame.put_u16(len);
    frame.extend_from_slice(body);
    Ok(frame.freeze())
}

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(body)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
