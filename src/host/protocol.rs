//! Native messaging framing: every message is a 32 bit length in native byte order followed by
//! that many bytes of UTF-8 json.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Messages from the browser are capped at 4 GiB by the browser itself. Anything this large is a
/// corrupted stream rather than a real message.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Reads one frame. Returns `None` when the stream ends cleanly between frames.
pub async fn read_frame(mut input: impl AsyncRead + Unpin) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match input.read(&mut header[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(io::ErrorKind::UnexpectedEof.into()),
            n => filled += n,
        }
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame of {len} bytes exceeds the limit"),
        ));
    }
    let mut data = vec![0u8; len];
    input.read_exact(&mut data).await?;
    Ok(Some(data))
}

pub async fn write_frame(data: &[u8], mut output: impl AsyncWrite + Unpin) -> io::Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Frame too large"))?;
    output.write_all(&len.to_ne_bytes()).await?;
    output.write_all(data).await?;
    output.flush().await
}
