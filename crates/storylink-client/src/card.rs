//! Card presentation of a story: avatar on top, linked title, description.

use crate::variant::{
    Regions, StoryVariant, REGION_AVATAR, REGION_AVATAR_CONTAINER, REGION_DESCRIPTION,
    REGION_SELECT_AREA, REGION_TITLE,
};
use crate::view::Element;

#[derive(Debug, Default)]
pub struct CardStory {
    title: String,
    description: String,
    color: String,
}

impl CardStory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoryVariant for CardStory {
    fn create_template(&self) -> Element {
        Element::new("article")
            .with_child(
                Element::new("div")
                    .with_tag(REGION_AVATAR_CONTAINER)
                    .with_tag(REGION_SELECT_AREA)
                    .with_child(Element::new("div").with_tag(REGION_AVATAR)),
            )
            .with_child(
                Element::new("a")
                    .with_tag(REGION_TITLE)
                    .with_tag(REGION_SELECT_AREA),
            )
            .with_child(Element::new("p").with_tag(REGION_DESCRIPTION))
    }

    fn title(&self) -> &str {
        &self.title
    }

    // A pairing link shown as the title stays clickable.
    fn set_title(&mut self, regions: &Regions, title: &str) {
        self.title = title.to_string();
        regions.title.set_text(title);
        if title.starts_with("https://") || title.starts_with("http://") {
            regions.title.set_attribute("href", title);
        } else {
            regions.title.remove_attribute("href");
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn set_description(&mut self, regions: &Regions, description: &str) {
        self.description = description.to_string();
        regions.description.set_text(description);
    }

    fn color(&self) -> &str {
        &self.color
    }

    fn set_color(&mut self, regions: &Regions, color: &str) {
        self.color = color.to_string();
        regions.root.set_style("--story-color", color);
    }
}
