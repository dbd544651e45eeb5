pub mod adapter;
pub mod embed;
pub mod error;
pub mod handler;
pub mod transport;

pub use adapter::DiscordAdapter;
pub use error::DiscordError;
pub use transport::DiscordTransport;
