//! Presentation capability implemented by each concrete kind of story.

use crate::error::StoryError;
use crate::view::Element;

pub const REGION_TITLE: &str = "title";
pub const REGION_DESCRIPTION: &str = "description";
pub const REGION_AVATAR: &str = "avatar";
pub const REGION_AVATAR_CONTAINER: &str = "avatar-container";
pub const REGION_SELECT_AREA: &str = "select-area";

/// The regions of a story template, bound once at construction.
#[derive(Debug, Clone)]
pub struct Regions {
    pub root: Element,
    pub title: Element,
    pub description: Element,
    pub avatar: Element,
    pub avatar_container: Element,
}

impl Regions {
    /// Locate and untag the four required regions under `root`.
    pub fn bind(root: &Element) -> Result<Self, StoryError> {
        let take = |name: &str| {
            root.take_tagged(name)
                .ok_or_else(|| StoryError::MissingRegion(name.to_string()))
        };

        Ok(Self {
            root: root.clone(),
            title: take(REGION_TITLE)?,
            description: take(REGION_DESCRIPTION)?,
            avatar: take(REGION_AVATAR)?,
            avatar_container: take(REGION_AVATAR_CONTAINER)?,
        })
    }
}

/// How a concrete story builds its template and shows its text fields.
///
/// The controller owns identity, avatar and lifecycle; a variant owns the
/// title, description and color and how they appear in its regions.
pub trait StoryVariant: Send + 'static {
    /// Build the visual root. It must contain one element tagged with each of
    /// [`REGION_TITLE`], [`REGION_DESCRIPTION`], [`REGION_AVATAR`] and
    /// [`REGION_AVATAR_CONTAINER`], plus any number tagged [`REGION_SELECT_AREA`].
    fn create_template(&self) -> Element;

    fn title(&self) -> &str;
    fn set_title(&mut self, regions: &Regions, title: &str);

    fn description(&self) -> &str;
    fn set_description(&mut self, regions: &Regions, description: &str);

    fn color(&self) -> &str;
    fn set_color(&mut self, regions: &Regions, color: &str);
}
