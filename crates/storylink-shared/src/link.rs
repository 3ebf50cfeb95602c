use serde::Serialize;
use serde_json::{json, Value};

use crate::error::LinkError;
use crate::identity::SecretKey;

/// What a pairing link encodes: the story's name and the secret that lets a
/// second device claim it.
#[derive(Debug, Clone)]
pub struct PairingLinkRequest {
    pub story_name: String,
    pub secret_key: SecretKey,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkData<'a> {
    story_name: &'a str,
    secret_key: &'a str,
    #[serde(rename = "$deeplink_path")]
    deeplink_path: String,
}

impl PairingLinkRequest {
    pub fn new(story_name: impl Into<String>, secret_key: SecretKey) -> Self {
        Self {
            story_name: story_name.into(),
            secret_key,
        }
    }

    /// Body sent to the link-shortening service.
    pub fn query_body(&self, link_key: &str) -> Result<Value, LinkError> {
        let data = serde_json::to_value(LinkData {
            story_name: &self.story_name,
            secret_key: self.secret_key.as_str(),
            deeplink_path: format!("story/{}", self.story_name),
        })?;

        Ok(json!({
            "branch_key": link_key,
            "channel": crate::constants::APP_NAME,
            "feature": "pairing",
            "data": data,
        }))
    }
}
