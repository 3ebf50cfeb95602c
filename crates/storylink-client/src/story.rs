//! Story lifecycle controller.
//!
//! A [`Story`] decides at construction how it acquires its identity and
//! content, then keeps its presentation up to date from background lookups,
//! the pairing flow and the realtime channel:
//!
//! * no id and no view key: mint a secret key, derive the view key, show a
//!   pairing code and wait for a paired device to upload media;
//! * view key: look the story up, fall back to the pairing code when it is
//!   empty and this device holds the secret, and listen for late uploads;
//! * id: look the story up once;
//! * title and avatar both supplied: nothing to fetch.
//!
//! Background work runs on the current Tokio runtime. [`Story::settle`] waits
//! for it and reports failures that have no recovery path.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use storylink_net::{
    ChannelNotification, HttpLinkService, HttpMetadataResolver, MetadataResolver,
    RealtimeConnector, WsConnector,
};
use storylink_shared::constants::DEFAULT_STORY_NAME_LEN;
use storylink_shared::{ImageSource, SecretKey, StoryId, ViewKey};

use crate::channel::{ChannelHandle, ChannelState};
use crate::config::ClientConfig;
use crate::error::{PairingError, StoryError};
use crate::events::{ListenerId, SelectCallback, SelectEmitter};
use crate::pairing::{CodeRenderer, PairingEncoder};
use crate::registry::{ResourceHandle, ResourceRegistry};
use crate::state::{StoryPhase, StoryState};
use crate::variant::{Regions, StoryVariant, REGION_SELECT_AREA};
use crate::view::{ActivationListener, Element};

/// External collaborators a story talks to.
#[derive(Clone)]
pub struct StoryServices {
    pub resolver: Arc<dyn MetadataResolver>,
    pub pairing: PairingEncoder,
    pub realtime: Arc<dyn RealtimeConnector>,
    /// Number of view key characters naming a freshly minted story.
    pub story_name_len: usize,
}

impl StoryServices {
    pub fn new(
        resolver: Arc<dyn MetadataResolver>,
        pairing: PairingEncoder,
        realtime: Arc<dyn RealtimeConnector>,
    ) -> Self {
        Self {
            resolver,
            pairing,
            realtime,
            story_name_len: DEFAULT_STORY_NAME_LEN,
        }
    }

    /// HTTP resolver, HTTP link service and WebSocket realtime channel, as
    /// configured. The code renderer is supplied by the caller.
    pub fn from_config(
        config: &ClientConfig,
        renderer: Arc<dyn CodeRenderer>,
    ) -> Result<Self, StoryError> {
        let resolver = HttpMetadataResolver::new(config.api_url.clone(), config.http_timeout)?;
        let links = HttpLinkService::new(
            config.link_api_url.clone(),
            config.link_key.clone(),
            config.http_timeout,
        )
        .map_err(PairingError::from)?;

        Ok(Self {
            resolver: Arc::new(resolver),
            pairing: PairingEncoder::new(Arc::new(links), renderer),
            realtime: Arc::new(WsConnector::new(config.realtime_url.clone())),
            story_name_len: config.story_name_len,
        })
    }
}

/// Construction options. Empty strings count as absent.
#[derive(Default)]
pub struct StoryOptions {
    pub id: Option<String>,
    pub view_key: Option<String>,
    pub secret_key: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub avatar_image_source: Option<String>,
    pub color: Option<String>,
    /// Parent the story's root is appended to.
    pub container: Option<Element>,
    /// Registered as a "select" observer.
    pub on_select: Option<SelectCallback>,
}

impl StoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn view_key(mut self, view_key: impl Into<String>) -> Self {
        self.view_key = Some(view_key.into());
        self
    }

    pub fn secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn avatar_image_source(mut self, src: impl Into<String>) -> Self {
        self.avatar_image_source = Some(src.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn container(mut self, container: Element) -> Self {
        self.container = Some(container);
        self
    }

    pub fn on_select(mut self, callback: impl Fn(&Story) + Send + Sync + 'static) -> Self {
        self.on_select = Some(Arc::new(callback));
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Job = JoinHandle<Result<(), StoryError>>;

struct Shared {
    state: Mutex<StoryState>,
    emitter: Mutex<SelectEmitter>,
    registry: Mutex<ResourceRegistry>,
    jobs: Mutex<Vec<Job>>,
    services: StoryServices,
}

impl Shared {
    /// Apply `f` unless the story was destroyed. Returns whether it ran.
    fn update(&self, f: impl FnOnce(&mut StoryState)) -> bool {
        let mut state = lock(&self.state);
        if state.destroyed {
            return false;
        }
        f(&mut state);
        true
    }
}

/// Handle on one story. Clones share the same story.
#[derive(Clone)]
pub struct Story {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Story {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("Story")
            .field("id", &state.id)
            .field("view_key", &state.view_key)
            .field("phase", &state.phase)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

impl Story {
    /// Build the story, bind its template regions and start acquiring its
    /// content. Must be called from within a Tokio runtime.
    ///
    /// Fails only when the variant's template lacks a required region.
    pub fn new(
        variant: impl StoryVariant,
        options: StoryOptions,
        services: StoryServices,
    ) -> Result<Self, StoryError> {
        let root = variant.create_template();
        let regions = Regions::bind(&root)?;
        let select_areas = root.take_all_tagged(REGION_SELECT_AREA);

        let title = non_empty(options.title);
        let avatar = non_empty(options.avatar_image_source);
        let fully_presented = title.is_some() && avatar.is_some();

        let id = non_empty(options.id).map(StoryId);
        let view_key = non_empty(options.view_key).and_then(|k| ViewKey::new(k).ok());
        let mut secret_key = non_empty(options.secret_key).and_then(|k| SecretKey::new(k).ok());

        // A story opened purely by id never pairs, so it never holds a secret.
        if let (None, Some(id)) = (&view_key, &id) {
            if secret_key.take().is_some() {
                debug!(story_id = %id, "Ignoring secret key for story opened by id");
            }
        }

        let mut state = StoryState {
            id,
            view_key,
            secret_key,
            avatar: ImageSource::default(),
            variant: Box::new(variant),
            regions,
            phase: StoryPhase::New,
            channel: None,
            destroyed: false,
        };
        if let Some(title) = &title {
            state.set_title(title);
        }
        if let Some(avatar) = avatar {
            state.set_avatar(avatar.into());
        }

        let story = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                emitter: Mutex::new(SelectEmitter::default()),
                registry: Mutex::new(ResourceRegistry::default()),
                jobs: Mutex::new(Vec::new()),
                services,
            }),
        };

        story.acquire_identity(fully_presented);

        {
            let mut state = lock(&story.shared.state);
            if let Some(description) = non_empty(options.description) {
                state.set_description(&description);
            }
            if let Some(color) = non_empty(options.color) {
                state.set_color(&color);
            }
        }

        story.bind_select_areas(select_areas);
        if let Some(callback) = options.on_select {
            lock(&story.shared.emitter).on(callback);
        }
        if let Some(container) = options.container {
            container.append_child(&root);
        }

        Ok(story)
    }

    fn acquire_identity(&self, fully_presented: bool) {
        let mut state = lock(&self.shared.state);

        match (state.view_key.clone(), state.id.clone()) {
            (None, None) => {
                let secret_key = SecretKey::generate();
                let view_key = secret_key.view_key();
                let story_name = view_key.story_name(self.shared.services.story_name_len);
                info!(view_key = %view_key.short(), "Minted new story");

                state.secret_key = Some(secret_key.clone());
                state.view_key = Some(view_key.clone());
                state.phase = StoryPhase::AwaitingPairedMedia;
                drop(state);

                // The user now scans the code with the device that adds media.
                self.spawn_job(show_pairing_code(
                    self.shared.clone(),
                    story_name,
                    secret_key,
                ));
                self.open_channel(view_key);
            }
            _ if fully_presented => {
                debug!("Title and avatar supplied, skipping resolution");
                state.phase = StoryPhase::Resolved;
            }
            (Some(view_key), _) => {
                debug!(view_key = %view_key.short(), "Resolving story by view key");
                state.phase = StoryPhase::ResolvingByViewKey;
                drop(state);

                self.spawn_job(resolve_by_view_key(self.shared.clone(), view_key.clone()));
                self.open_channel(view_key);
            }
            (None, Some(id)) => {
                debug!(story_id = %id, "Resolving story by id");
                state.phase = StoryPhase::ResolvingById;
                drop(state);

                self.spawn_job(resolve_by_id(self.shared.clone(), id));
            }
        }
    }

    fn spawn_job(&self, job: impl Future<Output = Result<(), StoryError>> + Send + 'static) {
        let handle = tokio::spawn(job);
        lock(&self.shared.jobs).push(handle);
    }

    fn open_channel(&self, view_key: ViewKey) {
        let channel = Arc::new(ChannelHandle::new(view_key.clone()));
        lock(&self.shared.state).channel = Some(channel.clone());

        let task = tokio::spawn(listen_for_media(self.shared.clone(), channel.clone()));
        channel.set_task(task.abort_handle());

        lock(&self.shared.registry).register(ResourceHandle::Channel(view_key), move || {
            channel.shutdown()
        });
    }

    fn bind_select_areas(&self, areas: Vec<Element>) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let on_activate: ActivationListener = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                Story { shared }.select();
            }
        });

        let mut registry = lock(&self.shared.registry);
        for area in areas {
            let id = area.add_listener(on_activate.clone());
            registry.register(ResourceHandle::Listener(id), move || {
                area.remove_listener(id);
            });
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StoryState) -> T) -> T {
        f(&lock(&self.shared.state))
    }

    fn mutate(&self, field: &'static str, f: impl FnOnce(&mut StoryState)) {
        if !self.shared.update(f) {
            debug!(field, "Ignoring mutation of destroyed story");
        }
    }

    pub fn id(&self) -> Option<StoryId> {
        self.read(|s| s.id.clone())
    }

    pub fn view_key(&self) -> Option<ViewKey> {
        self.read(|s| s.view_key.clone())
    }

    pub fn secret_key(&self) -> Option<SecretKey> {
        self.read(|s| s.secret_key.clone())
    }

    pub fn phase(&self) -> StoryPhase {
        self.read(|s| s.phase)
    }

    pub fn title(&self) -> String {
        self.read(|s| s.title().to_string())
    }

    pub fn set_title(&self, title: &str) {
        self.mutate("title", |s| s.set_title(title));
    }

    pub fn description(&self) -> String {
        self.read(|s| s.variant.description().to_string())
    }

    pub fn set_description(&self, description: &str) {
        self.mutate("description", |s| s.set_description(description));
    }

    pub fn color(&self) -> String {
        self.read(|s| s.variant.color().to_string())
    }

    pub fn set_color(&self, color: &str) {
        self.mutate("color", |s| s.set_color(color));
    }

    pub fn avatar_image_source(&self) -> ImageSource {
        self.read(|s| s.avatar.clone())
    }

    pub fn set_avatar_image_source(&self, src: impl Into<ImageSource>) {
        let src = src.into();
        self.mutate("avatar", |s| s.set_avatar(src));
    }

    /// Visual root of the story.
    pub fn root(&self) -> Element {
        self.read(|s| s.regions.root.clone())
    }

    pub fn regions(&self) -> Regions {
        self.read(|s| s.regions.clone())
    }

    pub fn is_destroyed(&self) -> bool {
        self.read(|s| s.destroyed)
    }

    /// State of the realtime subscription, if one was opened.
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.read(|s| s.channel.as_ref().map(|c| c.state()))
    }

    pub fn on_select(&self, callback: impl Fn(&Story) + Send + Sync + 'static) -> ListenerId {
        lock(&self.shared.emitter).on(Arc::new(callback))
    }

    pub fn off_select(&self, id: ListenerId) -> bool {
        lock(&self.shared.emitter).off(id)
    }

    pub fn off_all_select(&self) {
        lock(&self.shared.emitter).off_all();
    }

    /// Notify "select" observers, as a user activation of a select region does.
    pub fn select(&self) {
        if self.is_destroyed() {
            return;
        }
        let observers = lock(&self.shared.emitter).observers();
        for observer in observers {
            observer(self);
        }
    }

    /// Wait for every background job, including jobs started by other jobs,
    /// and return the first failure that has no recovery path.
    pub async fn settle(&self) -> Result<(), StoryError> {
        let mut first_error = None;

        loop {
            let pending = std::mem::take(&mut *lock(&self.shared.jobs));
            if pending.is_empty() {
                break;
            }
            for job in pending {
                match job.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(_) => {}
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Wait until the realtime subscription is closed (by media arrival or
    /// `destroy()`), then for the jobs that followed it.
    pub async fn wait_for_channel_close(&self) -> Result<(), StoryError> {
        let channel = self.read(|s| s.channel.clone());
        if let Some(channel) = channel {
            channel.closed().await;
        }
        self.settle().await
    }

    /// Detach the visual root, drop every observer and release every
    /// registered listener and the realtime subscription. Later calls do nothing.
    pub fn destroy(&self) {
        let root = {
            let mut state = lock(&self.shared.state);
            if state.destroyed {
                debug!("Story already destroyed");
                return;
            }
            state.destroyed = true;
            state.regions.root.clone()
        };

        root.detach();
        lock(&self.shared.emitter).off_all();
        let released = lock(&self.shared.registry).release_all();
        info!(released, "Story destroyed");
    }
}

async fn resolve_by_view_key(shared: Arc<Shared>, view_key: ViewKey) -> Result<(), StoryError> {
    let error = match shared.services.resolver.resolve_by_view_key(&view_key).await {
        Ok(metadata) => {
            shared.update(|s| {
                s.fill_missing(metadata);
                s.phase = StoryPhase::Resolved;
            });
            return Ok(());
        }
        Err(e) => e,
    };

    let reported = if error.is_empty() {
        debug!(view_key = %view_key.short(), "Story has no content yet");
        None
    } else {
        warn!(view_key = %view_key.short(), error = %error, "Story lookup by view key failed");
        Some(error)
    };

    let mut secret_key = None;
    if !shared.update(|s| secret_key = s.secret_key.clone()) {
        return Ok(());
    }

    // Only the owning device can offer pairing. The view key stands in for
    // the story name.
    if let Some(secret_key) = secret_key {
        show_pairing_code(shared, view_key.to_string(), secret_key).await?;
    }

    reported.map_or(Ok(()), |e| Err(e.into()))
}

async fn resolve_by_id(shared: Arc<Shared>, id: StoryId) -> Result<(), StoryError> {
    let metadata = shared
        .services
        .resolver
        .resolve_by_id(&id)
        .await
        .map_err(|e| {
            warn!(story_id = %id, error = %e, "Story lookup by id failed");
            e
        })?;

    shared.update(|s| {
        s.fill_missing(metadata);
        s.phase = StoryPhase::Resolved;
    });
    Ok(())
}

/// Create the pairing link, show it as the title, then show its scannable
/// rendering as the avatar.
async fn show_pairing_code(
    shared: Arc<Shared>,
    story_name: String,
    secret_key: SecretKey,
) -> Result<(), StoryError> {
    // Uploaded content is final; a pairing code never replaces it.
    let mut superseded = false;
    let live = shared.update(|s| {
        superseded = s.phase == StoryPhase::Resolved;
        if !superseded {
            s.phase = StoryPhase::AwaitingPairedMedia;
        }
    });
    if !live || superseded {
        debug!(story_name = %story_name, "Pairing code not needed");
        return Ok(());
    }
    info!(story_name = %story_name, "Showing pairing code");

    let pairing = &shared.services.pairing;
    let link = pairing
        .create_link(&story_name, &secret_key)
        .await
        .map_err(|e| {
            warn!(story_name = %story_name, error = %e, "Pairing link failed");
            e
        })?;

    let mut shown = false;
    shared.update(|s| {
        if s.phase != StoryPhase::Resolved {
            s.set_title(&link);
            shown = true;
        }
    });
    if !shown {
        debug!(story_name = %story_name, "Pairing link no longer needed");
        return Ok(());
    }

    let image = pairing.render(&link).await?;
    shared.update(|s| {
        if s.phase != StoryPhase::Resolved {
            s.set_avatar(image);
        }
    });
    Ok(())
}

/// Re-read the story after a paired device uploaded to it. The fresh content
/// replaces whatever placeholder was shown.
async fn refresh_after_media(shared: Arc<Shared>, view_key: ViewKey) -> Result<(), StoryError> {
    match shared.services.resolver.resolve_by_view_key(&view_key).await {
        Ok(metadata) => {
            if shared.update(|s| {
                s.apply(metadata);
                s.phase = StoryPhase::Resolved;
            }) {
                info!(view_key = %view_key.short(), "Story content arrived");
            }
        }
        Err(e) => debug!(view_key = %view_key.short(), error = %e, "No content after media event"),
    }
    Ok(())
}

/// Consecutive failed connections tolerated before the channel is given up.
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(200);

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(6);
    RECONNECT_BASE_DELAY
        .saturating_mul(factor)
        .min(MAX_RECONNECT_DELAY)
}

/// Keep a subscription open until media arrives or the handle is closed.
/// Connections lost in between are re-established with backoff, and every
/// `Connected` re-subscribes.
async fn listen_for_media(shared: Arc<Shared>, channel: Arc<ChannelHandle>) {
    let mut attempts = 0u32;

    loop {
        if attempts > 0 {
            if attempts > MAX_RECONNECT_ATTEMPTS {
                warn!(view_key = %channel.view_key().short(), attempts, "Giving up on realtime channel");
                channel.close();
                return;
            }
            tokio::time::sleep(reconnect_delay(attempts)).await;
        }
        if channel.is_closed() {
            return;
        }
        attempts += 1;

        let (cmd_tx, mut notif_rx) = match shared.services.realtime.connect().await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!(view_key = %channel.view_key().short(), attempt = attempts, error = %e, "Realtime connect failed");
                continue;
            }
        };

        if !channel.attach(cmd_tx) {
            return;
        }

        while let Some(notification) = notif_rx.recv().await {
            match notification {
                ChannelNotification::Connected => {
                    attempts = 0;
                    channel.subscribe().await;
                }
                ChannelNotification::MediaArrived { view_key, .. } if &view_key == channel.view_key() => {
                    media_detected(&shared, &channel);
                    return;
                }
                ChannelNotification::MediaArrived { view_key, .. } => {
                    debug!(view_key = %view_key.short(), "Ignoring media for another story");
                }
                ChannelNotification::Disconnected => break,
            }
        }

        if channel.is_closed() {
            return;
        }
        info!(view_key = %channel.view_key().short(), "Realtime connection lost");
        channel.reconnecting();
        attempts = attempts.max(1);
    }
}

/// React to the first media notification: close the channel, then re-resolve.
/// The job is queued while the job list is held, so a waiter woken by the
/// close always finds it.
fn media_detected(shared: &Arc<Shared>, channel: &ChannelHandle) {
    let mut jobs = lock(&shared.jobs);
    if !channel.close() {
        return;
    }
    info!(view_key = %channel.view_key().short(), "Paired media detected");
    jobs.push(tokio::spawn(refresh_after_media(
        shared.clone(),
        channel.view_key().clone(),
    )));
}
