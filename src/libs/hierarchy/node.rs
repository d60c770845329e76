use crate::libs::track::TrackRecord;

/// NodeId is an index into the Hierarchy's node vector.
pub type NodeId = usize;

/// One display dimension of a composite: a subgroup column and the values
/// observed under the composite, in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    SuperTrack {
        keys: Vec<String>,
        values: Vec<String>,
    },
    /// A single dimension is a plain grouped container; two or more make a
    /// matrix whose occupied cells are listed in `cells`.
    Composite {
        format: String,
        dimensions: Vec<Dimension>,
        cells: Vec<Vec<String>>,
    },
    /// Signal tracks that share every field except `key`.
    Overlay {
        key: String,
        shared: Vec<(String, String)>,
    },
    Track(TrackRecord),
}

impl NodeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::SuperTrack { .. } => "supertrack",
            NodeKind::Composite { .. } => "composite",
            NodeKind::Overlay { .. } => "overlay",
            NodeKind::Track(_) => "track",
        }
    }

    /// What the container itself groups by.
    pub fn signature(&self) -> String {
        match self {
            NodeKind::Root => "root".to_string(),
            NodeKind::SuperTrack { keys, .. } => format!("supertrack:{}", keys.join(",")),
            NodeKind::Composite {
                format, dimensions, ..
            } => format!(
                "composite:{}:{}",
                format,
                dimensions
                    .iter()
                    .map(|d| d.key.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            NodeKind::Overlay { key, .. } => format!("overlay:{}", key),
            NodeKind::Track(rec) => format!("track:{}", rec.format),
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, NodeKind::Track(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Unique among siblings
    pub name: String,
    pub kind: NodeKind,
}

impl HubNode {
    pub fn new(id: NodeId, name: &str, kind: NodeKind) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            name: name.to_string(),
            kind,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Track(_))
    }

    pub fn track(&self) -> Option<&TrackRecord> {
        match &self.kind {
            NodeKind::Track(rec) => Some(rec),
            _ => None,
        }
    }

    /// How this node is named in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Track(rec) => format!("track {} ({})", rec.id, rec.file_ref),
            kind => format!("{} {}", kind.tag(), self.name),
        }
    }
}

/// A composite's dimensions as the browser presents them: the first two
/// are the matrix axes, the rest are filters.
pub fn dimension_tags(count: usize) -> Vec<String> {
    const TAGS: [&str; 2] = ["dimX", "dimY"];
    (0..count)
        .map(|i| {
            if i < TAGS.len() {
                TAGS[i].to_string()
            } else {
                format!("dim{}", (b'A' + (i - TAGS.len()) as u8) as char)
            }
        })
        .collect()
}
