//! wa-core: WhatsApp relay core library
//!
//! Shared pieces of the relay: configuration, the bot runtime client,
//! trace rendering, the advisory session store and the relay itself.
//! Channel crates (`wa-twilio`, `wa-meta`) only normalize payloads and
//! deliver the text this crate produces.

pub mod config;
pub mod error;
pub mod message;
pub mod relay;
pub mod runtime;
pub mod session;
pub mod trace;

pub use config::{BotRuntimeConfig, Channel, Config, MessagesConfig, MetaConfig, SessionsConfig};
pub use error::{RelayError, Result};
pub use message::{Inbound, InboundMessage};
pub use relay::{Relay, is_reset_command, truncate_for_whatsapp};
pub use runtime::{BotRuntime, BotRuntimeClient};
pub use session::{InMemorySessionStore, SessionStore, UserSession};
pub use trace::{Button, Trace, render, render_or_default};
