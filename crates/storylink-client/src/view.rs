//! Headless visual container.
//!
//! A small retained element tree standing in for whatever surface renders a
//! story. Elements carry structural tags (the `data-*` markers a template uses
//! to name its regions), a style map, text, attributes and activation
//! listeners. [`Element`] is a cheap shared handle; clones refer to the same node.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::events::ListenerId;

pub type ActivationListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Node {
    name: String,
    tags: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    text: String,
    children: Vec<Element>,
    parent: Weak<Mutex<Node>>,
    listeners: Vec<(ListenerId, ActivationListener)>,
}

#[derive(Clone)]
pub struct Element(Arc<Mutex<Node>>);

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.lock();
        f.debug_struct("Element")
            .field("name", &node.name)
            .field("tags", &node.tags)
            .field("children", &node.children.len())
            .finish()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self(Arc::new(Mutex::new(Node {
            name: name.to_string(),
            ..Node::default()
        })))
    }

    fn lock(&self) -> MutexGuard<'_, Node> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_tag(self, tag: &str) -> Self {
        self.lock().tags.insert(tag.to_string());
        self
    }

    pub fn with_child(self, child: Element) -> Self {
        self.append_child(&child);
        self
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.lock().tags.contains(tag)
    }

    pub fn remove_tag(&self, tag: &str) -> bool {
        self.lock().tags.remove(tag)
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn set_text(&self, text: &str) {
        self.lock().text = text.to_string();
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.lock().attributes.get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.lock()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.lock().attributes.remove(name);
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.lock().style.get(property).cloned()
    }

    pub fn set_style(&self, property: &str, value: &str) {
        self.lock()
            .style
            .insert(property.to_string(), value.to_string());
    }

    pub fn children(&self) -> Vec<Element> {
        self.lock().children.clone()
    }

    pub fn parent(&self) -> Option<Element> {
        self.lock().parent.upgrade().map(Element)
    }

    /// Move `child` under this element, detaching it from any previous parent.
    pub fn append_child(&self, child: &Element) {
        child.detach();
        child.lock().parent = Arc::downgrade(&self.0);
        self.lock().children.push(child.clone());
    }

    /// Remove this element from its parent. Returns whether it was attached.
    pub fn detach(&self) -> bool {
        let parent = {
            let mut node = self.lock();
            let parent = node.parent.upgrade();
            node.parent = Weak::new();
            parent
        };

        match parent {
            Some(parent) => {
                let mut parent = parent.lock().unwrap_or_else(PoisonError::into_inner);
                parent.children.retain(|c| c != self);
                true
            }
            None => false,
        }
    }

    /// Find the first element (self included, depth-first) carrying `tag`,
    /// strip the tag and return it.
    pub fn take_tagged(&self, tag: &str) -> Option<Element> {
        if self.remove_tag(tag) {
            return Some(self.clone());
        }
        self.children()
            .into_iter()
            .find_map(|child| child.take_tagged(tag))
    }

    /// Every element carrying `tag`, in document order, each stripped of it.
    pub fn take_all_tagged(&self, tag: &str) -> Vec<Element> {
        let mut found = Vec::new();
        self.collect_tagged(tag, &mut found);
        found
    }

    fn collect_tagged(&self, tag: &str, found: &mut Vec<Element>) {
        if self.remove_tag(tag) {
            found.push(self.clone());
        }
        for child in self.children() {
            child.collect_tagged(tag, found);
        }
    }

    pub fn add_listener(&self, listener: ActivationListener) -> ListenerId {
        let id = ListenerId::next();
        self.lock().listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut node = self.lock();
        let before = node.listeners.len();
        node.listeners.retain(|(existing, _)| *existing != id);
        node.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Deliver a user activation (click, tap, key press) to this element.
    pub fn activate(&self) {
        let listeners: Vec<ActivationListener> =
            self.lock().listeners.iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener();
        }
    }
}
