//! Deterministic collaborators for tests. Nothing here touches the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use storylink_net::{LinkService, LinkServiceError, LocalRelay, MetadataResolver, ResolveError};
use storylink_shared::{ImageSource, PairingLinkRequest, StoryId, StoryMetadata, ViewKey};

use crate::error::RenderError;
use crate::pairing::{CodeRenderer, PairingEncoder, RenderedCode};
use crate::story::StoryServices;

pub fn metadata(src: &str, title: &str) -> StoryMetadata {
    StoryMetadata {
        image_source: src.into(),
        title: title.to_string(),
    }
}

#[derive(Default)]
struct ResolverState {
    by_view_key: HashMap<String, StoryMetadata>,
    by_id: HashMap<String, StoryMetadata>,
    view_key_calls: usize,
    id_calls: usize,
    outage: bool,
}

/// Answers from in-memory tables. Unknown keys resolve to `Empty`.
#[derive(Clone, Default)]
pub struct FakeResolver {
    state: Arc<Mutex<ResolverState>>,
}

impl FakeResolver {
    pub fn with_view_key(self, view_key: &str, src: &str, title: &str) -> Self {
        self.publish(view_key, src, title);
        self
    }

    pub fn with_id(self, id: &str, src: &str, title: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .by_id
            .insert(id.to_string(), metadata(src, title));
        self
    }

    /// Every lookup fails with a server error instead of `Empty`.
    pub fn with_outage(self) -> Self {
        self.state.lock().unwrap().outage = true;
        self
    }

    /// Make content available for a view key, as an upload would.
    pub fn publish(&self, view_key: &str, src: &str, title: &str) {
        self.state
            .lock()
            .unwrap()
            .by_view_key
            .insert(view_key.to_string(), metadata(src, title));
    }

    pub fn view_key_calls(&self) -> usize {
        self.state.lock().unwrap().view_key_calls
    }

    pub fn id_calls(&self) -> usize {
        self.state.lock().unwrap().id_calls
    }
}

#[async_trait]
impl MetadataResolver for FakeResolver {
    async fn resolve_by_view_key(&self, view_key: &ViewKey) -> Result<StoryMetadata, ResolveError> {
        let mut state = self.state.lock().unwrap();
        state.view_key_calls += 1;
        if state.outage {
            return Err(ResolveError::Status(503));
        }
        state
            .by_view_key
            .get(view_key.as_str())
            .cloned()
            .ok_or(ResolveError::Empty)
    }

    async fn resolve_by_id(&self, id: &StoryId) -> Result<StoryMetadata, ResolveError> {
        let mut state = self.state.lock().unwrap();
        state.id_calls += 1;
        if state.outage {
            return Err(ResolveError::Status(503));
        }
        state.by_id.get(&id.0).cloned().ok_or(ResolveError::Empty)
    }
}

/// Links of the form `https://pair.test/<story name>`.
#[derive(Clone, Default)]
pub struct FakeLinks {
    requests: Arc<Mutex<Vec<(String, String)>>>,
    failing: bool,
    gate: Option<Arc<Notify>>,
}

impl FakeLinks {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Links are only handed out once the returned gate is notified.
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let links = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (links, gate)
    }

    pub fn link_for(story_name: &str) -> String {
        format!("https://pair.test/{story_name}")
    }

    /// `(story name, secret key)` of every request, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkService for FakeLinks {
    async fn create_link(&self, request: &PairingLinkRequest) -> Result<String, LinkServiceError> {
        self.requests.lock().unwrap().push((
            request.story_name.clone(),
            request.secret_key.as_str().to_string(),
        ));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failing {
            return Err(LinkServiceError::Status(500));
        }
        Ok(Self::link_for(&request.story_name))
    }
}

/// "Renders" by embedding the text itself as the image payload.
pub struct FakeRenderer;

impl FakeRenderer {
    pub fn expected(data: &str) -> ImageSource {
        ImageSource::data_url("image/png", data.as_bytes())
    }
}

#[async_trait]
impl CodeRenderer for FakeRenderer {
    async fn render(&self, data: &str) -> Result<RenderedCode, RenderError> {
        Ok(RenderedCode {
            mime: "image/png".to_string(),
            bytes: data.as_bytes().to_vec(),
        })
    }
}

/// Fakes wired into a [`StoryServices`], kept around for assertions.
#[derive(Clone, Default)]
pub struct Harness {
    pub resolver: FakeResolver,
    pub links: FakeLinks,
    pub relay: LocalRelay,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: FakeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_links(mut self, links: FakeLinks) -> Self {
        self.links = links;
        self
    }

    pub fn services(&self) -> StoryServices {
        StoryServices::new(
            Arc::new(self.resolver.clone()),
            PairingEncoder::new(Arc::new(self.links.clone()), Arc::new(FakeRenderer)),
            Arc::new(self.relay.clone()),
        )
    }
}
