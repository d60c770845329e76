use super::node::{dimension_tags, HubNode, NodeId, NodeKind};
use crate::libs::color::ColorAssignment;
use crate::libs::error::{HubError, Result};
use crate::libs::track::TrackRecord;
use std::collections::VecDeque;

/// The materialized hub: root → supertracks → composites → overlays → tracks.
///
/// Nodes live in an arena; the root is always node 0. Sibling names are
/// unique, which [`Hierarchy::add_child`] enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    nodes: Vec<HubNode>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy {
    /// A hierarchy holding only its root.
    ///
    /// ```
    /// use hubr::libs::hierarchy::Hierarchy;
    /// let hier = Hierarchy::new();
    /// assert!(hier.is_empty());
    /// assert_eq!(hier.len(), 1);
    /// ```
    pub fn new() -> Self {
        Self {
            nodes: vec![HubNode::new(0, "root", NodeKind::Root)],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No node besides the root
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn get_node(&self, id: NodeId) -> Option<&HubNode> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut HubNode> {
        self.nodes.get_mut(id)
    }

    /// Node by id; ids handed out by this hierarchy are always valid.
    pub fn node(&self, id: NodeId) -> &HubNode {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name == name)
    }

    /// Attach a new node under `parent`.
    ///
    /// # Errors
    /// [`HubError::DuplicateName`] if a sibling already has `name`.
    pub fn add_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId> {
        if parent >= self.nodes.len() || !self.nodes[parent].kind.is_container() {
            return Err(HubError::InvalidSpec(format!(
                "node {} can't hold children",
                parent
            )));
        }
        if let Some(existing) = self.find_child(parent, name) {
            let second = HubNode::new(0, name, kind);
            return Err(HubError::DuplicateName {
                parent: self.path(parent),
                name: name.to_string(),
                first: self.nodes[existing].describe(),
                second: second.describe(),
            });
        }

        let id = self.nodes.len();
        let mut node = HubNode::new(id, name, kind);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Names from the root (exclusive) down to `id`, joined by `/`. The root
    /// itself is `/`.
    pub fn path(&self, id: NodeId) -> String {
        let names: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .rev()
            .skip(1)
            .chain(std::iter::once(id))
            .filter(|&n| n != self.root())
            .map(|n| self.nodes[n].name.as_str())
            .collect();
        format!("/{}", names.join("/"))
    }

    /// Parents of `id`, nearest first, root last.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(p) = current {
            result.push(p);
            current = self.nodes[p].parent;
        }
        result
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Get node IDs in preorder traversal (Root -> Children)
    pub fn preorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                result.push(id);
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }

        result
    }

    /// Get node IDs in levelorder traversal (BFS)
    pub fn levelorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.nodes.get(id) {
                result.push(id);
                for &child in &node.children {
                    queue.push_back(child);
                }
            }
        }

        result
    }

    /// Track nodes under `start`, in preorder.
    pub fn leaves(&self, start: NodeId) -> Vec<NodeId> {
        self.preorder(start)
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    /// All track records, in preorder.
    pub fn tracks(&self) -> Vec<&TrackRecord> {
        self.leaves(self.root())
            .into_iter()
            .filter_map(|id| self.nodes[id].track())
            .collect()
    }

    pub fn find_track(&self, track_id: &str) -> Option<NodeId> {
        self.leaves(self.root())
            .into_iter()
            .find(|&id| self.nodes[id].track().map(|r| r.id == track_id).unwrap_or(false))
    }

    /// The container whose color table a node draws from: its nearest
    /// supertrack ancestor, or the root.
    pub fn color_scope(&self, id: NodeId) -> NodeId {
        self.ancestors(id)
            .into_iter()
            .find(|&a| matches!(self.nodes[a].kind, NodeKind::SuperTrack { .. }))
            .unwrap_or(self.root())
    }

    /// Leaves whose color scope is `scope`.
    pub fn scope_leaves(&self, scope: NodeId) -> Vec<NodeId> {
        self.leaves(scope)
            .into_iter()
            .filter(|&l| self.color_scope(l) == scope)
            .collect()
    }

    /// Nodes that own a color table: the root and every supertrack.
    pub fn color_scopes(&self) -> Vec<NodeId> {
        self.preorder(self.root())
            .into_iter()
            .filter(|&id| {
                matches!(
                    self.nodes[id].kind,
                    NodeKind::Root | NodeKind::SuperTrack { .. }
                )
            })
            .collect()
    }

    /// Indented text view, one node per line. Tracks show their file and,
    /// when `colors` is given, their `r,g,b` color.
    pub fn outline(&self, colors: Option<&ColorAssignment>) -> String {
        let mut out = String::new();
        for id in self.preorder(self.root()) {
            let node = &self.nodes[id];
            let indent = "  ".repeat(self.depth(id));
            let line = match &node.kind {
                NodeKind::Root => "root".to_string(),
                NodeKind::SuperTrack { .. } => format!("supertrack {}", node.name),
                NodeKind::Composite {
                    dimensions, cells, ..
                } => {
                    let dims = dimension_tags(dimensions.len())
                        .iter()
                        .zip(dimensions)
                        .map(|(tag, d)| format!("{}={}[{}]", tag, d.key, d.values.join(",")))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let shape = if dimensions.len() >= 2 {
                        format!("matrix {} cells", cells.len())
                    } else {
                        "group".to_string()
                    };
                    format!("composite {} ({}) {}", node.name, shape, dims)
                }
                NodeKind::Overlay { key, .. } => format!("overlay {} (by {})", node.name, key),
                NodeKind::Track(rec) => {
                    let mut s = format!("track {} [{}]", node.name, rec.file_ref);
                    if let Some(colors) = colors {
                        if let Some(rgb) = colors.track_color(&rec.id) {
                            s += &format!(" {}", rgb);
                        }
                    }
                    s
                }
            };
            out += &indent;
            out += &line;
            out += "\n";
        }
        out
    }
}
