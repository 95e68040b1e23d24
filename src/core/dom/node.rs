use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::document::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
}

/// Ordered attribute storage. Most elements carry a handful of attributes,
/// so a linear scan over an inline vector beats hashing.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    map: SmallVec<[(String, String); 8]>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self {
            map: SmallVec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        self.map.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn set(&mut self, name: String, value: String) -> Option<String> {
        if let Some((_, v)) = self.map.iter_mut().find(|(k, _)| k == &name) {
            Some(std::mem::replace(v, value))
        } else {
            self.map.push((name, value));
            None
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.map.iter().position(|(k, _)| k == name)?;
        Some(self.map.remove(pos).1)
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.iter().any(|(k, _)| k == name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Style values resolved by the host's cascade (stylesheets, user agent).
/// Inline declarations are layered on top of these by the document.
#[derive(Debug, Clone, Default)]
pub struct ComputedStyle {
    properties: SmallVec<[(String, String); 4]>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_property(&self, name: &str) -> Option<&String> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn set_property(&mut self, name: String, value: String) {
        if let Some((_, v)) = self.properties.iter_mut().find(|(k, _)| k == &name) {
            *v = value;
        } else {
            self.properties.push((name, value));
        }
    }
}

/// Geometry of a laid-out box. Elements without one (`display: none`,
/// unrendered subtrees) have no offset parent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutData {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutData {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub tag_name: String,
    /// Character data for text/comment nodes, raw text for `<style>` elements.
    pub text_content: String,
    pub attributes: AttributeMap,
    pub computed_style: ComputedStyle,
    pub layout: Option<LayoutData>,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 8]>,
}

impl Node {
    fn with_type(id: NodeId, node_type: NodeType, tag_name: String, text_content: String) -> Self {
        Self {
            id,
            node_type,
            tag_name,
            text_content,
            attributes: AttributeMap::new(),
            computed_style: ComputedStyle::new(),
            layout: None,
            parent: None,
            children: SmallVec::new(),
        }
    }

    pub fn new_element(tag_name: String, id: NodeId) -> Self {
        Self::with_type(id, NodeType::Element, tag_name.to_ascii_lowercase(), String::new())
    }

    pub fn new_text(content: String, id: NodeId) -> Self {
        Self::with_type(id, NodeType::Text, "#text".to_string(), content)
    }

    pub fn new_comment(content: String, id: NodeId) -> Self {
        Self::with_type(id, NodeType::Comment, "#comment".to_string(), content)
    }

    pub fn new_document(id: NodeId) -> Self {
        Self::with_type(id, NodeType::Document, "#document".to_string(), String::new())
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.has(name)
    }

    pub fn class_list(&self) -> Vec<String> {
        self.attributes
            .get("class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
