// Network collaborators of a story: metadata lookups, pairing links and the
// realtime channel that reports media uploaded by a paired device.

pub mod error;
pub mod links;
pub mod local;
pub mod realtime;
pub mod resolver;
pub mod ws;

pub use error::{ChannelError, LinkServiceError, ResolveError};
pub use links::{HttpLinkService, LinkService};
pub use local::{LocalRelay, RelayStats};
pub use realtime::{ChannelCommand, ChannelEndpoints, ChannelNotification, RealtimeConnector};
pub use resolver::{HttpMetadataResolver, MetadataResolver};
pub use ws::WsConnector;
