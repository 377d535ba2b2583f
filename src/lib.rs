//! # Inkflow
//!
//! Live terminal rendering of streamed chat completions.
//!
//! Inkflow reads an OpenAI-style `data:` event stream, shows a small
//! procedural loader until the first text arrives, then re-renders the
//! accumulated markdown in an inline, scrollable viewport as fragments
//! stream in. When the stream ends the frame is erased and the final
//! render is written once to the caller's sink.
//!
//! ## Core Concepts
//!
//! - **Fragment source**: line-oriented parsing of the event stream
//! - **Stream pump**: a worker thread with rendezvous hand-off and a
//!   close-exactly-once handle
//! - **Render loop**: one thread, one `select!`, one event enum
//! - **Cancellation scopes**: a token tree shared by the pump and the loop
//!
//! ## Example
//!
//! ```rust,ignore
//! use inkflow::{CancelToken, ChatCompletionRequest, Client, ClientConfig, Message, StreamOptions};
//!
//! let client = Client::new(ClientConfig::from_env().expect("OPENAI_API_KEY"))?;
//! let request = ChatCompletionRequest::new("gpt-4o-mini", vec![Message::user("Hello")]);
//!
//! let transcript = client.create_chat_completion_stream_with_markdown(
//!     &CancelToken::new(),
//!     &request,
//!     &mut std::io::stdout(),
//!     StreamOptions::default(),
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod cancel;
pub mod client;
pub mod error;
pub mod logging;
pub mod markdown;
pub mod pipeline;
pub mod source;
pub mod terminal;
pub mod view;
pub mod widget;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use client::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Client, ClientConfig,
    Message, OpenStream, StreamReader, Transport,
};
pub use error::{ErrorKind, Result, StreamError, StreamFailure, Transcript};
pub use markdown::{MarkdownRenderer, TermRenderer, Theme};
pub use pipeline::stream_markdown;
pub use source::{Fragment, FragmentSource};
pub use view::{render_stream, InterruptFn, StreamOptions, UiTarget};
pub use widget::LoaderConfig;
