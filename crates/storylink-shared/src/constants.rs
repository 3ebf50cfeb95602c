/// Application name
pub const APP_NAME: &str = "storylink";

/// Random secret key size in bytes (hex-encoded to twice this length)
pub const SECRET_KEY_SIZE: usize = 32;

/// Number of view key characters used as the name of a freshly minted story
pub const DEFAULT_STORY_NAME_LEN: usize = 20;

/// Key derivation context (BLAKE3) for secret key -> view key
pub const KDF_CONTEXT_VIEW_KEY: &str = "storylink-view-key-v1";

/// Outbound realtime event subscribing to media uploads for a view key
pub const EVENT_SUBSCRIBE_MEDIA: &str = "subscribe_to_story_media";

/// Inbound realtime event signalling that a paired device uploaded media
pub const EVENT_MEDIA: &str = "media";

/// Default realtime service endpoint. Whatever is configured here must accept
/// plain WebSocket text frames of the form `{"event": ..., "data": ...}`; a
/// socket.io deployment needs a frame-translating gateway in front of it.
pub const DEFAULT_REALTIME_URL: &str = "wss://live.gobiapp.com/socket";

/// Default metadata API base URL
pub const DEFAULT_API_URL: &str = "https://api.gobiapp.com";

/// Default link-shortening endpoint
pub const DEFAULT_LINK_API_URL: &str = "https://api2.branch.io/v1/url";

/// Default HTTP request timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
