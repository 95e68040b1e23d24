use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::node::{LayoutData, Node, NodeType};
use crate::core::css::{InlineStyle, USER_AGENT_FONT_FAMILY};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Style access failed: {0}")]
    Style(String),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new() -> Self {
        Self(fastrand::u64(..))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    ChildList,
    Attributes,
    CharacterData,
}

#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target,
            added_nodes: added,
            removed_nodes: removed,
            attribute_name: None,
            old_value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
}

impl ObserverOptions {
    /// Structural changes anywhere below the observed root, nothing else.
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Self::default()
        }
    }
}

pub type MutationCallback = Arc<dyn Fn(&[MutationRecord]) + Send + Sync>;

struct Registration {
    id: ObserverId,
    root: NodeId,
    options: ObserverOptions,
    callback: MutationCallback,
    pending: Vec<MutationRecord>,
}

/// In-memory document tree.
///
/// Mutation records queue up per observer and are handed over in one batch
/// by [`Document::deliver_mutation_records`], the way a browser delivers them
/// at the end of a task.
pub struct Document {
    metadata: RwLock<DocumentMetadata>,
    root_node: NodeId,
    nodes: DashMap<NodeId, Arc<RwLock<Node>>>,
    observers: RwLock<Vec<Registration>>,
    next_observer: AtomicU64,
}

impl Document {
    pub fn new() -> Self {
        let root_node = NodeId::new();
        let nodes = DashMap::new();
        nodes.insert(root_node, Arc::new(RwLock::new(Node::new_document(root_node))));
        Self {
            metadata: RwLock::new(DocumentMetadata::default()),
            root_node,
            nodes,
            observers: RwLock::new(Vec::new()),
            next_observer: AtomicU64::new(1),
        }
    }

    /// `<html><head></head><body></body></html>` at `url`.
    pub fn create_html_document(url: Option<&str>) -> Result<Self> {
        let document = Self::new();
        let html_id = document.create_element("html");
        let head_id = document.create_element("head");
        let body_id = document.create_element("body");
        document.append_child(html_id, head_id)?;
        document.append_child(html_id, body_id)?;
        document.append_child(document.root_node, html_id)?;
        if let Some(url) = url {
            document.set_url(url.to_string());
        }
        Ok(document)
    }

    pub fn root(&self) -> NodeId {
        self.root_node
    }

    pub fn get_url(&self) -> Option<String> {
        self.metadata.read().url.clone()
    }

    pub fn set_url(&self, url: String) {
        self.metadata.write().url = Some(url);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn create_element(&self, tag_name: &str) -> NodeId {
        let node_id = NodeId::new();
        self.nodes.insert(
            node_id,
            Arc::new(RwLock::new(Node::new_element(tag_name.to_string(), node_id))),
        );
        node_id
    }

    pub fn create_text(&self, content: &str) -> NodeId {
        let node_id = NodeId::new();
        self.nodes.insert(
            node_id,
            Arc::new(RwLock::new(Node::new_text(content.to_string(), node_id))),
        );
        node_id
    }

    pub fn create_comment(&self, content: &str) -> NodeId {
        let node_id = NodeId::new();
        self.nodes.insert(
            node_id,
            Arc::new(RwLock::new(Node::new_comment(content.to_string(), node_id))),
        );
        node_id
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<Arc<RwLock<Node>>> {
        self.nodes.get(&node_id).map(|e| e.value().clone())
    }

    fn node(&self, node_id: NodeId) -> Result<Arc<RwLock<Node>>> {
        self.get_node(node_id)
            .ok_or(DocumentError::NodeNotFound(node_id))
    }

    pub fn append_child(&self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        let parent = self.node(parent_id)?;
        let child = self.node(child_id)?;
        if parent_id == child_id || self.is_inclusive_ancestor(child_id, parent_id) {
            return Err(DocumentError::InvalidOperation(
                "cannot insert a node into its own subtree".to_string(),
            ));
        }
        if child.read().node_type == NodeType::Document {
            return Err(DocumentError::InvalidOperation(
                "document nodes cannot be inserted".to_string(),
            ));
        }

        let previous_parent = child.read().parent;
        if let Some(old_parent) = previous_parent {
            self.remove_child(old_parent, child_id)?;
        }

        parent.write().children.push(child_id);
        child.write().parent = Some(parent_id);

        self.record_mutation(MutationRecord::child_list(parent_id, vec![child_id], Vec::new()));
        Ok(())
    }

    pub fn remove_child(&self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        let parent = self.node(parent_id)?;
        let child = self.node(child_id)?;
        {
            let mut parent_guard = parent.write();
            let pos = parent_guard
                .children
                .iter()
                .position(|id| *id == child_id)
                .ok_or_else(|| {
                    DocumentError::InvalidOperation(format!(
                        "{child_id:?} is not a child of {parent_id:?}"
                    ))
                })?;
            parent_guard.children.remove(pos);
        }
        child.write().parent = None;

        self.record_mutation(MutationRecord::child_list(parent_id, Vec::new(), vec![child_id]));
        Ok(())
    }

    /// Detaches `node_id` from its parent; a no-op for detached nodes.
    pub fn remove_node(&self, node_id: NodeId) -> Result<()> {
        let parent = self.node(node_id)?.read().parent;
        match parent {
            Some(parent_id) => self.remove_child(parent_id, node_id),
            None => Ok(()),
        }
    }

    pub fn get_children(&self, node_id: NodeId) -> Vec<NodeId> {
        self.get_node(node_id)
            .map(|node| node.read().children.to_vec())
            .unwrap_or_default()
    }

    pub fn get_parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.get_node(node_id)?.read().parent
    }

    pub fn first_child(&self, node_id: NodeId) -> Option<NodeId> {
        self.get_node(node_id)?.read().children.first().copied()
    }

    pub fn next_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.get_parent(node_id)?;
        let parent = self.get_node(parent)?;
        let guard = parent.read();
        let idx = guard.children.iter().position(|&id| id == node_id)?;
        guard.children.get(idx + 1).copied()
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get_parent(id);
        }
        false
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id) && self.is_inclusive_ancestor(self.root_node, node_id)
    }

    pub fn is_element(&self, node_id: NodeId) -> bool {
        self.get_node(node_id)
            .map(|node| node.read().is_element())
            .unwrap_or(false)
    }

    pub fn tag_name(&self, node_id: NodeId) -> Option<String> {
        let node = self.get_node(node_id)?;
        let guard = node.read();
        guard.is_element().then(|| guard.tag_name.clone())
    }

    pub fn class_list(&self, node_id: NodeId) -> Vec<String> {
        self.get_node(node_id)
            .map(|node| node.read().class_list())
            .unwrap_or_default()
    }

    pub fn get_attribute(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.get_node(node_id)?.read().get_attribute(name)
    }

    pub fn has_attribute(&self, node_id: NodeId, name: &str) -> bool {
        self.get_node(node_id)
            .map(|node| node.read().has_attribute(name))
            .unwrap_or(false)
    }

    pub fn set_attribute(&self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let node = self.node(node_id)?;
        let old_value = {
            let mut guard = node.write();
            if !guard.is_element() {
                return Err(DocumentError::InvalidOperation(format!(
                    "{} has no attributes",
                    guard.tag_name
                )));
            }
            guard
                .attributes
                .set(name.to_ascii_lowercase(), value.to_string())
        };
        self.record_attribute_mutation(node_id, name, old_value);
        Ok(())
    }

    pub fn remove_attribute(&self, node_id: NodeId, name: &str) -> Result<Option<String>> {
        let node = self.node(node_id)?;
        let old_value = node.write().attributes.remove(&name.to_ascii_lowercase());
        if old_value.is_some() {
            self.record_attribute_mutation(node_id, name, old_value.clone());
        }
        Ok(old_value)
    }

    fn record_attribute_mutation(&self, target: NodeId, name: &str, old_value: Option<String>) {
        self.record_mutation(MutationRecord {
            mutation_type: MutationType::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: Some(name.to_ascii_lowercase()),
            old_value,
        });
    }

    pub fn text_content(&self, node_id: NodeId) -> Option<String> {
        Some(self.get_node(node_id)?.read().text_content.clone())
    }

    pub fn set_text_content(&self, node_id: NodeId, text: &str) -> Result<()> {
        let node = self.node(node_id)?;
        let old_value = std::mem::replace(&mut node.write().text_content, text.to_string());
        self.record_mutation(MutationRecord {
            mutation_type: MutationType::CharacterData,
            target: node_id,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value: Some(old_value),
        });
        Ok(())
    }

    /// Sets a property as the host's cascade resolved it, before inline styles.
    pub fn set_computed_property(&self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        self.node(node_id)?
            .write()
            .computed_style
            .set_property(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    /// Resolved `font-family` of an element: inline declarations first, then
    /// the cascaded value, then the nearest ancestor that has either.
    pub fn computed_font_family(&self, node_id: NodeId) -> Result<String> {
        let node = self.node(node_id)?;
        if !node.read().is_element() {
            return Err(DocumentError::Style(format!("{node_id:?} is not an element")));
        }
        if !self.is_connected(node_id) {
            return Err(DocumentError::Style(format!("{node_id:?} is not connected")));
        }

        let mut current = Some(node_id);
        while let Some(id) = current {
            let node = self.node(id)?;
            let guard = node.read();
            if guard.is_element() {
                if let Some(style) = guard.attributes.get("style") {
                    if let Some(value) = InlineStyle::parse(style).effective_value("font-family") {
                        return Ok(value.to_string());
                    }
                }
                if let Some(value) = guard.computed_style.get_property("font-family") {
                    return Ok(value.clone());
                }
            }
            current = guard.parent;
        }
        Ok(USER_AGENT_FONT_FAMILY.to_string())
    }

    pub fn set_layout(&self, node_id: NodeId, layout: Option<LayoutData>) -> Result<()> {
        self.node(node_id)?.write().layout = layout;
        Ok(())
    }

    pub fn layout(&self, node_id: NodeId) -> Option<LayoutData> {
        self.get_node(node_id)?.read().layout
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let candidates: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|entry| {
                let node = entry.value().read();
                node.is_element() && node.attributes.get("id").map(String::as_str) == Some(id)
            })
            .map(|entry| *entry.key())
            .collect();
        candidates.into_iter().find(|&node_id| self.is_connected(node_id))
    }

    fn child_element_by_tag(&self, parent: NodeId, tag_name: &str) -> Option<NodeId> {
        self.get_children(parent)
            .into_iter()
            .find(|&id| self.tag_name(id).as_deref() == Some(tag_name))
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.child_element_by_tag(self.root_node, "html")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_element_by_tag(self.document_element()?, "head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.child_element_by_tag(self.document_element()?, "body")
    }

    pub fn add_mutation_observer(
        &self,
        root: NodeId,
        options: ObserverOptions,
        callback: MutationCallback,
    ) -> Result<ObserverId> {
        self.node(root)?;
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push(Registration {
            id,
            root,
            options,
            callback,
            pending: Vec::new(),
        });
        Ok(id)
    }

    /// Drops the registration and any records it had not been handed yet.
    pub fn disconnect_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|registration| registration.id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn take_records(&self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .write()
            .iter_mut()
            .find(|registration| registration.id == id)
            .map(|registration| std::mem::take(&mut registration.pending))
            .unwrap_or_default()
    }

    /// Hands every observer its queued records as a single batch and returns
    /// how many records went out. Callbacks run without any document lock held.
    pub fn deliver_mutation_records(&self) -> usize {
        let batches: Vec<(MutationCallback, Vec<MutationRecord>)> = self
            .observers
            .write()
            .iter_mut()
            .filter(|registration| !registration.pending.is_empty())
            .map(|registration| {
                (
                    registration.callback.clone(),
                    std::mem::take(&mut registration.pending),
                )
            })
            .collect();

        let mut delivered = 0;
        for (callback, records) in batches {
            delivered += records.len();
            callback(&records);
        }
        delivered
    }

    fn record_mutation(&self, record: MutationRecord) {
        let mut observers = self.observers.write();
        for registration in observers.iter_mut() {
            let wanted = match record.mutation_type {
                MutationType::ChildList => registration.options.child_list,
                MutationType::Attributes => registration.options.attributes,
                MutationType::CharacterData => registration.options.character_data,
            };
            if !wanted {
                continue;
            }
            let in_scope = record.target == registration.root
                || (registration.options.subtree
                    && self.is_inclusive_ancestor(registration.root, record.target));
            if in_scope {
                registration.pending.push(record.clone());
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.get_url())
            .field("node_count", &self.nodes.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}
