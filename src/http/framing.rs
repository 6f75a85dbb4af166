//! Body framing by declared length.
//!
//! Bodies are delimited only by `Content-Length`; there is no chunked or
//! close-delimited framing. Large bodies move in bounded chunks so neither a
//! cache write nor a relay materializes the whole payload.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProxyError, ProxyResult};

/// Default chunk size for body transfers.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Read exactly `n` bytes into memory.
///
/// `n == 0` returns immediately without touching the reader.
pub async fn read_exact_bytes<R>(reader: &mut R, n: u64) -> ProxyResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::with_capacity(n.min(64 * 1024) as usize);
    copy_exact(reader, &mut body, n, DEFAULT_CHUNK_SIZE).await?;
    Ok(body)
}

/// Move exactly `n` bytes from `reader` to `writer` in chunks of at most
/// `chunk_size` bytes. Returns the number of bytes moved.
pub async fn copy_exact<R, W>(
    reader: &mut R,
    writer: &mut W,
    n: u64,
    chunk_size: usize,
) -> ProxyResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut remaining = n;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let got = reader.read(&mut buf[..want]).await?;
        if got == 0 {
            tracing::debug!(expected = n, received = n - remaining, "Body truncated by peer");
            return Err(ProxyError::ConnectionClosed);
        }
        writer.write_all(&buf[..got]).await?;
        remaining -= got as u64;
    }

    writer.flush().await?;
    Ok(n)
}

/// Read and drop exactly `n` bytes.
pub async fn discard_exact<R>(reader: &mut R, n: u64) -> ProxyResult<()>
where
    R: AsyncRead + Unpin,
{
    copy_exact(reader, &mut tokio::io::sink(), n, DEFAULT_CHUNK_SIZE).await?;
    Ok(())
}

/// Stream an already opened file to `writer` until end of file.
pub async fn write_file<R, W>(writer: &mut W, file: &mut R, chunk_size: usize) -> ProxyResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent = 0u64;

    loop {
        let got = file.read(&mut buf).await?;
        if got == 0 {
            break;
        }
        writer.write_all(&buf[..got]).await?;
        sent += got as u64;
    }

    writer.flush().await?;
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_exactly_declared_length() {
        let mut src = &b"hello world"[..];
        let body = read_exact_bytes(&mut src, 5).await.unwrap();
        assert_eq!(body, b"hello");
        assert_eq!(src, b" world");
    }

    #[tokio::test]
    async fn zero_length_does_not_read() {
        // A reader that would block forever.
        let (mut idle, _keep) = tokio::io::duplex(16);
        let body = read_exact_bytes(&mut idle, 0).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn short_body_is_connection_closed() {
        let mut src = &b"abc"[..];
        let err = read_exact_bytes(&mut src, 10).await.unwrap_err();
        assert!(matches!(err, ProxyError::ConnectionClosed));
    }

    #[tokio::test]
    async fn copy_uses_small_chunks() {
        let data: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        let mut src = &data[..];
        let mut dst = Vec::new();
        let moved = copy_exact(&mut src, &mut dst, 4096, 7).await.unwrap();
        assert_eq!(moved, 4096);
        assert_eq!(dst, &data[..4096]);
        assert_eq!(src.len(), 5000 - 4096);
    }

    #[tokio::test]
    async fn discard_consumes_only_n() {
        let mut src = &b"xxxxNEXT"[..];
        discard_exact(&mut src, 4).await.unwrap();
        assert_eq!(src, b"NEXT");
    }

    #[tokio::test]
    async fn writes_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.bin");
        let data = vec![42u8; 3000];
        std::fs::write(&path, &data).unwrap();

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        let mut out = Vec::new();
        let sent = write_file(&mut out, &mut file, 1024).await.unwrap();
        assert_eq!(sent, 3000);
        assert_eq!(out, data);
    }
}
