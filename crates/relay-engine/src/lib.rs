pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod resolver;
pub mod transform;
pub mod transport;

pub use dispatcher::{AuditReport, BranchOutcome, BranchReport, Dispatcher, RelayReport};
pub use echo::{EchoClaim, EchoSuppressor};
pub use error::DeliveryError;
pub use resolver::{mirror_name, ChannelResolver};
pub use transform::{forwarded_units, transform, TransformedText};
pub use transport::{ChannelInfo, GroupInfo, MirrorChannel, OutboundUnit, RelayTransport};
