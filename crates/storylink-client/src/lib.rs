pub mod card;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod pairing;
pub mod registry;
pub mod state;
pub mod story;
pub mod variant;
pub mod view;

#[cfg(test)]
mod testing;

use tracing_subscriber::{fmt, EnvFilter};

pub use card::CardStory;
pub use channel::ChannelState;
pub use config::ClientConfig;
pub use error::{PairingError, RenderError, StoryError};
pub use events::ListenerId;
pub use pairing::{CodeRenderer, PairingEncoder, QrRenderer, RenderedCode};
pub use state::StoryPhase;
pub use story::{Story, StoryOptions, StoryServices};
pub use variant::{Regions, StoryVariant};
pub use view::Element;

/// Install a `fmt` subscriber filtered by `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storylink_client=debug,storylink_net=debug,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
