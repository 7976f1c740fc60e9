//! DeepSeek API client with a typed, pull-based Server-Sent Events decoder.
//!
//! # Example
//! ```no_run
//! use deepseek::{Client, Message, ModelId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), deepseek::Error> {
//!     let client = Client::from_env()?;
//!     let messages = vec![Message::user("Hello!")];
//!
//!     let mut stream = client
//!         .chat(ModelId::DEEPSEEK_CHAT, messages)
//!         .max_tokens(256)
//!         .stream()
//!         .await?;
//!
//!     while stream.advance().await {
//!         if let Some(text) = stream.current().and_then(|chunk| chunk.text()) {
//!             print!("{text}");
//!         }
//!     }
//!
//!     if let Some(err) = stream.error() {
//!         eprintln!("\nstream failed: {err}");
//!     }
//!     stream.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod sse;
pub mod stream;
pub mod tokens;
pub mod types;

pub use client::{ChatRequestBuilder, Client, ClientBuilder, ClientConfig, DEFAULT_BASE_URL};
pub use error::Error;
pub use sse::{Frame, FrameReader, SseParser};
pub use stream::{ByteStream, Cursor, SseStream};
pub use tokens::estimate_tokens;
pub use types::*;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
