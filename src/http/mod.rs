//! HTTP/1.1 wire handling.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one task per connection)
//!     → line.rs (buffered LF-terminated lines)
//!     → request.rs / response.rs (request and status lines)
//!     → headers.rs (header block → HeaderBlock)
//!     → framing.rs (exactly Content-Length body bytes)
//! ```
//!
//! # Design Decisions
//! - Only GET, only HTTP/1.1, one request per connection
//! - Bodies are framed by Content-Length alone; no chunked encoding
//! - Line reads go through a BufReader so the framer sees leftover bytes

pub mod date;
pub mod framing;
pub mod headers;
pub mod line;
pub mod request;
pub mod response;
pub mod server;

pub use headers::HeaderBlock;
pub use request::RequestLine;
pub use response::{Status, StatusLine};
pub use server::ProxyServer;
