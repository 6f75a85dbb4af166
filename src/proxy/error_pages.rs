//! Local error responses.
//!
//! Pages are looked up as `<dir>/<code>.html`; a status without a page on
//! disk gets a small built-in body.

use std::path::PathBuf;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ProxyResult;
use crate::http::response::write_head;
use crate::http::Status;

#[derive(Debug, Clone, Default)]
pub struct ErrorPages {
    dir: Option<PathBuf>,
}

impl ErrorPages {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Body served for `status`.
    pub async fn body(&self, status: Status) -> Vec<u8> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.html", status.code()));
            match tokio::fs::read(&path).await {
                Ok(page) => return page,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Using built-in error page")
                }
            }
        }
        builtin_page(status).into_bytes()
    }

    /// Write a complete `text/html` error response.
    pub async fn send<W>(&self, writer: &mut W, status: Status) -> ProxyResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let body = self.body(status).await;
        write_head(writer, status, Some("text/html"), body.len() as u64).await?;
        writer.write_all(&body).await?;
        writer.flush().await?;
        Ok(())
    }
}

fn builtin_page(status: Status) -> String {
    format!(
        "<html><head><title>{status}</title></head><body><h1>{status}</h1></body></html>\n"
    )
}
