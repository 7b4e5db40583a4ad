//! Minimal page model consumed by the click pipeline
//!
//! Templates produce the markup; this module only holds what the tracker
//! needs from it: an element tree with attributes and text, the page URL,
//! and click events that point at a node in the tree.

use reqwest::Url;
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{TrackingError, TrackingResult};

/// Index of a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter. Attribute names are ASCII case-insensitive.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Value of the `data-{key}` attribute
    pub fn data(&self, key: &str) -> Option<&str> {
        self.attr(&format!("data-{key}"))
    }

    pub fn is_anchor(&self) -> bool {
        self.tag == "a"
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Arena-backed element tree
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_element(&mut self, parent: Option<NodeId>, element: Element) -> NodeId {
        self.push(parent, NodeKind::Element(element))
    }

    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.push(Some(parent), NodeKind::Text(text.into()))
    }

    /// A parent that is not an existing node of this document is dropped, so
    /// every parent id is lower than its child's and the tree stays acyclic.
    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = match parent {
            Some(p) if p.0 >= id.0 => {
                warn!(parent = p.0, "unknown parent node, appending as root");
                None
            }
            other => other,
        };
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            parent.children.push(id);
        }
        id
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Text(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Nearest ancestor-or-self element matching `predicate`.
    ///
    /// Text nodes are skipped, so a click reported on a text node resolves
    /// through its enclosing elements.
    pub fn closest<F>(&self, start: NodeId, predicate: F) -> Option<(NodeId, &Element)>
    where
        F: Fn(&Element) -> bool,
    {
        let mut current = Some(start);
        while let Some(id) = current {
            if let Some(element) = self.element(id) {
                if predicate(element) {
                    return Some((id, element));
                }
            }
            current = self.parent(id);
        }
        None
    }

    /// Concatenated descendant text, whitespace-collapsed
    pub fn text_content(&self, id: NodeId) -> String {
        let mut raw = String::new();
        self.collect_text(id, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            NodeKind::Element(_) => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }
}

/// A user-interface click, identified by the node it landed on
#[derive(Debug, Clone, Copy)]
pub struct ClickEvent {
    pub target: NodeId,
}

impl ClickEvent {
    pub fn on(target: NodeId) -> Self {
        Self { target }
    }
}

/// Page state at click time
#[derive(Debug, Clone)]
pub struct PageContext {
    url: Url,
    user_agent: Option<String>,
}

impl PageContext {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            user_agent: None,
        }
    }

    pub fn parse(url: &str) -> TrackingResult<Self> {
        let parsed = Url::parse(url).map_err(|e| TrackingError::InvalidPageUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(parsed))
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}
