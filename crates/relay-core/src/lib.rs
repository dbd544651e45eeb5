pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use config::{EchoScope, RedirectOptions, RedirectRule, ValidatedConfig};
pub use error::{ConfigError, ListProblem};
pub use types::{ChannelId, EmbedField, GroupId, InboundEmbed, InboundMessage};
pub use validate::validate;
