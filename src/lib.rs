//! Line-oriented TCP Chat Relay Library
//!
//! Clients connect with a raw text stream (telnet works), register a unique
//! handle and exchange broadcast or directed messages until they quit or
//! disconnect.
//!
//! # Protocol
//! - plain text line → broadcast to everyone, sender included
//! - `\to:<handle> <text>` → directed message
//! - `\quit` → leave the chat
//! - received messages are rendered as `from: <sender>, to: <target>\r\n<body>\r\n`
//!
//! # Architecture
//! - `Registry` is the only shared state: handle → mailbox behind one mutex
//! - `Dispatcher` routes a message to one or all mailboxes
//! - each session runs a receive task (lines → dispatch) and a send task
//!   (mailbox → socket); removing the registry entry closes the mailbox
//!
//! # Example
//! ```ignore
//! use chat_relay::ChatServer;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = ChatServer::bind("127.0.0.1:2000").await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use codec::ChatCodec;
pub use dispatch::Dispatcher;
pub use error::{AppError, DispatchError, HandleError, LineError, RegistryError};
pub use message::{Command, Message, Origin, Target};
pub use registry::Registry;
pub use server::ChatServer;
pub use session::handle_connection;
pub use types::{Handle, SessionId};
