pub mod document;
pub mod node;

pub use document::{
    Document, DocumentError, DocumentMetadata, MutationCallback, MutationRecord, MutationType,
    NodeId, ObserverId, ObserverOptions,
};
pub use node::{AttributeMap, ComputedStyle, LayoutData, Node, NodeType};

/// Everything the restyling pipeline needs from a document tree.
///
/// Elements are addressed by [`NodeId`]; the host owns them. Reads on a node
/// that no longer exists return `None`/`false` rather than failing, writes
/// and style reads report a [`DocumentError`].
pub trait DocumentHost: Send + Sync {
    fn url(&self) -> Option<String>;
    /// The document node; every connected node descends from it.
    fn root(&self) -> NodeId;
    fn head(&self) -> Option<NodeId>;
    fn body(&self) -> Option<NodeId>;

    fn is_element(&self, node: NodeId) -> bool;
    fn is_connected(&self, node: NodeId) -> bool;
    fn tag_name(&self, node: NodeId) -> Option<String>;
    fn class_list(&self, node: NodeId) -> Vec<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }
    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError>;
    fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DocumentError>;

    fn computed_font_family(&self, node: NodeId) -> Result<String, DocumentError>;
    /// Whether the element currently has a layout box (a non-null offset parent).
    fn has_layout_box(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn first_child(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    fn element_by_id(&self, id: &str) -> Option<NodeId>;
    /// Appends `<style id="{marker_id}">{css}</style>` to the head.
    fn append_style_element(&self, marker_id: &str, css: &str) -> Result<NodeId, DocumentError>;
    fn text_content(&self, node: NodeId) -> Option<String>;
    fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DocumentError>;
    fn remove_node(&self, node: NodeId) -> Result<(), DocumentError>;

    fn observe(
        &self,
        root: NodeId,
        options: ObserverOptions,
        callback: MutationCallback,
    ) -> Result<ObserverId, DocumentError>;
    fn disconnect(&self, observer: ObserverId);
}

impl DocumentHost for Document {
    fn url(&self) -> Option<String> {
        self.get_url()
    }

    fn root(&self) -> NodeId {
        Document::root(self)
    }

    fn head(&self) -> Option<NodeId> {
        Document::head(self)
    }

    fn body(&self) -> Option<NodeId> {
        Document::body(self)
    }

    fn is_element(&self, node: NodeId) -> bool {
        Document::is_element(self, node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        Document::is_connected(self, node)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        Document::tag_name(self, node)
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        Document::class_list(self, node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.get_attribute(node, name)
    }

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        Document::has_attribute(self, node, name)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError> {
        Document::set_attribute(self, node, name, value)
    }

    fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DocumentError> {
        Document::remove_attribute(self, node, name).map(|_| ())
    }

    fn computed_font_family(&self, node: NodeId) -> Result<String, DocumentError> {
        Document::computed_font_family(self, node)
    }

    fn has_layout_box(&self, node: NodeId) -> bool {
        self.layout(node).is_some() && Document::is_connected(self, node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get_parent(node)
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        Document::first_child(self, node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        Document::next_sibling(self, node)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.get_element_by_id(id)
    }

    fn append_style_element(&self, marker_id: &str, css: &str) -> Result<NodeId, DocumentError> {
        let head = Document::head(self).ok_or_else(|| {
            DocumentError::InvalidOperation("document has no head".to_string())
        })?;
        let style = self.create_element("style");
        Document::set_attribute(self, style, "id", marker_id)?;
        Document::set_text_content(self, style, css)?;
        self.append_child(head, style)?;
        Ok(style)
    }

    fn text_content(&self, node: NodeId) -> Option<String> {
        Document::text_content(self, node)
    }

    fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DocumentError> {
        Document::set_text_content(self, node, text)
    }

    fn remove_node(&self, node: NodeId) -> Result<(), DocumentError> {
        Document::remove_node(self, node)
    }

    fn observe(
        &self,
        root: NodeId,
        options: ObserverOptions,
        callback: MutationCallback,
    ) -> Result<ObserverId, DocumentError> {
        self.add_mutation_observer(root, options, callback)
    }

    fn disconnect(&self, observer: ObserverId) {
        self.disconnect_observer(observer);
    }
}

/// Pre-order walker over the nodes below `root` (the root itself is never
/// returned). With `elements_only`, non-element nodes are skipped but their
/// position in the walk is kept.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: NodeId,
    current_node: NodeId,
    elements_only: bool,
}

impl TreeWalker {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            current_node: root,
            elements_only: false,
        }
    }

    pub fn elements(root: NodeId) -> Self {
        Self {
            elements_only: true,
            ..Self::new(root)
        }
    }

    pub fn get_root(&self) -> NodeId {
        self.root
    }

    pub fn next_node<H: DocumentHost + ?Sized>(&mut self, host: &H) -> Option<NodeId> {
        let mut candidate = self.current_node;
        loop {
            candidate = self.following(host, candidate)?;
            if !self.elements_only || host.is_element(candidate) {
                self.current_node = candidate;
                return Some(candidate);
            }
        }
    }

    fn following<H: DocumentHost + ?Sized>(&self, host: &H, node: NodeId) -> Option<NodeId> {
        if let Some(child) = host.first_child(node) {
            return Some(child);
        }
        let mut current = node;
        while current != self.root {
            if let Some(sibling) = host.next_sibling(current) {
                return Some(sibling);
            }
            current = host.parent(current)?;
        }
        None
    }
}
