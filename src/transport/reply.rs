//! Client-side reading of broker replies.

use tokio::io::AsyncRead;

use crate::broker::message::{Envelope, Method};
use crate::codec::{self, Format};
use crate::transport::frame;
use crate::utils::Result;

/// Read replies up to and including the first one carrying `expected`.
///
/// Replies the broker sends unprompted, such as the `SUBSCRIBE_REP` for a
/// topic that already holds a value, are returned ahead of it.
pub async fn read_replies_until<R>(
    reader: &mut R,
    format: Format,
    expected: Method,
) -> Result<Vec<Envelope>>
where
    R: AsyncRead + Unpin,
{
    let mut replies = Vec::new();
    loop {
        let body = frame::read_frame(reader).await?;
        let reply = codec::decode(&body, format)?;
        let done = reply.method == expected.as_str();
        replies.push(reply);
        if done {
            return Ok(replies);
        }
    }
}
