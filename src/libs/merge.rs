use crate::libs::color::{explicit_color, ColorAssigner, ColorAssignment, Rgb};
use crate::libs::design::TrackDesign;
use crate::libs::error::{HubError, Result};
use crate::libs::grouping::GroupingSpec;
use crate::libs::hierarchy::{GroupingEngine, Hierarchy, NodeId, NodeKind};
use crate::libs::sidecar::Sidecar;
use crate::libs::track::{sanitize, TrackRecord, NAME_FIELD};
use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// One hub taking part in a merge: its design, how it was grouped, and the
/// hierarchy and colors that came out.
#[derive(Debug, Clone)]
pub struct HubSource {
    pub label: String,
    pub genome: String,
    pub design: TrackDesign,
    pub spec: GroupingSpec,
    pub hierarchy: Hierarchy,
    pub colors: ColorAssignment,
}

impl HubSource {
    /// Group and color `design`.
    pub fn build(
        label: &str,
        genome: &str,
        design: TrackDesign,
        spec: GroupingSpec,
        default_color: Rgb,
    ) -> Result<Self> {
        let hierarchy = GroupingEngine::new(&design, &spec).build()?;
        let colors = ColorAssigner::new(spec.color_key.as_deref(), spec.palette)
            .with_default(default_color)
            .assign(&hierarchy);
        Ok(Self {
            label: label.to_string(),
            genome: genome.to_string(),
            design,
            spec,
            hierarchy,
            colors,
        })
    }

    pub fn from_sidecar(sidecar: Sidecar) -> Result<Self> {
        Self::build(
            &sidecar.label,
            &sidecar.genome,
            sidecar.design,
            sidecar.spec,
            sidecar.default_color,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Two inputs hold a track with the same id
    TrackId,
    /// Two tracks end up with the same name under one container
    TrackName,
    /// Same container name, different grouping
    Structural,
    /// Same value, different color in one scope
    Color,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictKind::TrackId => "track_id",
            ConflictKind::TrackName => "track_name",
            ConflictKind::Structural => "structural",
            ConflictKind::Color => "color",
        };
        write!(f, "{}", s)
    }
}

/// A disagreement between merge inputs and how it was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub kind: ConflictKind,
    /// Label of the input that lost
    pub hub: String,
    /// Path of the container, or the track id
    pub subject: String,
    pub detail: String,
    pub resolution: String,
}

impl ConflictReport {
    pub const TSV_HEADER: &'static str = "kind\thub\tsubject\tdetail\tresolution";

    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.kind, self.hub, self.subject, self.detail, self.resolution
        )
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} conflict in `{}` at `{}`: {}; {}",
            self.kind, self.hub, self.subject, self.detail, self.resolution
        )
    }
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub hierarchy: Hierarchy,
    pub colors: ColorAssignment,
    /// Every input record, with renamed ids where they collided
    pub design: TrackDesign,
    /// Union of the input specs if it fits the merged design, else the
    /// first input's spec
    pub spec: GroupingSpec,
    pub genome: String,
    pub conflicts: Vec<ConflictReport>,
}

impl MergeResult {
    pub fn conflicts_tsv(&self) -> String {
        let mut out = String::new();
        out += ConflictReport::TSV_HEADER;
        out += "\n";
        for c in &self.conflicts {
            out += &c.to_tsv();
            out += "\n";
        }
        out
    }
}

/// Combines hubs built for the same genome into one.
///
/// Inputs are grafted onto an empty root in order. A container meeting a
/// same-named container with the same grouping merges into it; with a
/// different grouping it is kept apart under a name prefixed by its hub's
/// label. Tracks whose id or name is already taken get the same prefix.
/// Within a color scope the first input's color of a value wins. Every
/// input track ends up in the result.
#[derive(Debug, Clone, Default)]
pub struct HubMerger {
    genome: Option<String>,
}

impl HubMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every input to target `genome`. Without it the first input's
    /// genome is the reference.
    pub fn with_genome(mut self, genome: &str) -> Self {
        self.genome = Some(genome.to_string());
        self
    }

    pub fn merge(&self, sources: &[HubSource]) -> Result<MergeResult> {
        let first = sources.first().ok_or(HubError::EmptyMerge)?;
        let expected = self.genome.clone().unwrap_or_else(|| first.genome.clone());
        for src in sources {
            if src.genome != expected {
                return Err(HubError::GenomeMismatch {
                    expected,
                    found: src.genome.clone(),
                    hub: src.label.clone(),
                });
            }
        }

        let mut state = MergeState::default();
        for (i, src) in sources.iter().enumerate() {
            state.source = i;
            let root = state.hierarchy.root();
            state.graft(src, src.hierarchy.root(), root)?;
        }
        state.recolor(sources);

        let spec = sources
            .iter()
            .skip(1)
            .fold(first.spec.clone(), |acc, s| acc.union(&s.spec));
        let spec = match spec.validate(&state.design) {
            Ok(()) => spec,
            Err(e) => {
                log::warn!(
                    "Combined grouping doesn't fit the merged tracks ({}), keeping `{}`'s",
                    e,
                    first.label
                );
                first.spec.clone()
            }
        };

        for c in &state.conflicts {
            log::warn!("{}", c);
        }
        log::info!(
            "Merged {} hubs: {} tracks, {} conflicts",
            sources.len(),
            state.design.len(),
            state.conflicts.len()
        );

        Ok(MergeResult {
            hierarchy: state.hierarchy,
            colors: state.colors,
            design: state.design,
            spec,
            genome: expected,
            conflicts: state.conflicts,
        })
    }
}

/// Where a source track landed.
struct Placement {
    source: usize,
    old_id: String,
    new_id: String,
    node: NodeId,
}

#[derive(Default)]
struct MergeState {
    hierarchy: Hierarchy,
    design: TrackDesign,
    colors: ColorAssignment,
    used_ids: IndexSet<String>,
    placements: Vec<Placement>,
    conflicts: Vec<ConflictReport>,
    /// Grouping of each merged container, see [`grouping_of`]
    groupings: IndexMap<NodeId, String>,
    source: usize,
}

impl MergeState {
    fn graft(&mut self, src: &HubSource, from: NodeId, to: NodeId) -> Result<()> {
        for &child in src.hierarchy.children(from) {
            let node = src.hierarchy.node(child);
            match &node.kind {
                NodeKind::Track(rec) => self.place_track(src, &node.name, rec.clone(), to)?,
                kind => {
                    let grouping = grouping_of(kind, &src.spec);
                    let target = match self.hierarchy.find_child(to, &node.name) {
                        Some(existing) if self.groupings.get(&existing) == Some(&grouping) => {
                            self.absorb(existing, kind);
                            existing
                        }
                        Some(existing) => {
                            let name = self.free_name(to, &prefixed(&src.label, &node.name));
                            let before = self
                                .groupings
                                .get(&existing)
                                .cloned()
                                .unwrap_or_else(|| self.hierarchy.node(existing).kind.signature());
                            self.conflicts.push(ConflictReport {
                                kind: ConflictKind::Structural,
                                hub: src.label.clone(),
                                subject: self.hierarchy.path(existing),
                                detail: format!("groups by {} here, by {} before", grouping, before),
                                resolution: format!("kept apart as `{}`", name),
                            });
                            self.hierarchy.add_child(to, &name, kind.clone())?
                        }
                        None => self.hierarchy.add_child(to, &node.name, kind.clone())?,
                    };
                    self.groupings.entry(target).or_insert(grouping);
                    self.graft(src, child, target)?;
                }
            }
        }
        Ok(())
    }

    fn place_track(
        &mut self,
        src: &HubSource,
        name: &str,
        mut rec: TrackRecord,
        to: NodeId,
    ) -> Result<()> {
        let old_id = rec.id.clone();
        if self.used_ids.contains(&rec.id) {
            let base = prefixed(&src.label, &rec.id);
            let mut new_id = base.clone();
            let mut i = 2;
            while self.used_ids.contains(&new_id) {
                new_id = format!("{}_{}", base, i);
                i += 1;
            }
            self.conflicts.push(ConflictReport {
                kind: ConflictKind::TrackId,
                hub: src.label.clone(),
                subject: old_id.clone(),
                detail: format!("track id `{}` is taken ({})", old_id, rec.file_ref),
                resolution: format!("renamed to `{}`", new_id),
            });
            rec.id = new_id;
        }

        let mut name = name.to_string();
        if self.hierarchy.find_child(to, &name).is_some() {
            let renamed = self.free_name(to, &prefixed(&src.label, &name));
            self.conflicts.push(ConflictReport {
                kind: ConflictKind::TrackName,
                hub: src.label.clone(),
                subject: self.hierarchy.path(to),
                detail: format!("name `{}` of track `{}` is taken", name, rec.id),
                resolution: format!("renamed to `{}`", renamed),
            });
            name = renamed;
            rec.metadata.insert(NAME_FIELD.to_string(), name.clone());
        }

        self.used_ids.insert(rec.id.clone());
        self.design.push(rec.clone())?;
        let new_id = rec.id.clone();
        let node = self.hierarchy.add_child(to, &name, NodeKind::Track(rec))?;
        self.placements.push(Placement {
            source: self.source,
            old_id,
            new_id,
            node,
        });
        Ok(())
    }

    /// Fold the dimension values and cells of a same-signature composite
    /// into the existing one.
    fn absorb(&mut self, existing: NodeId, incoming: &NodeKind) {
        let (new_dims, new_cells) = match incoming {
            NodeKind::Composite {
                dimensions, cells, ..
            } => (dimensions, cells),
            _ => return,
        };
        if let Some(NodeKind::Composite {
            dimensions, cells, ..
        }) = self.hierarchy.get_node_mut(existing).map(|n| &mut n.kind)
        {
            for (dim, new_dim) in dimensions.iter_mut().zip(new_dims) {
                for v in &new_dim.values {
                    if !dim.values.contains(v) {
                        dim.values.push(v.clone());
                    }
                }
            }
            for cell in new_cells {
                if !cells.contains(cell) {
                    cells.push(cell.clone());
                }
            }
        }
    }

    fn free_name(&self, parent: NodeId, base: &str) -> String {
        let mut name = base.to_string();
        let mut i = 2;
        while self.hierarchy.find_child(parent, &name).is_some() {
            name = format!("{}_{}", base, i);
            i += 1;
        }
        name
    }

    /// Carry every input's track colors over. In each merged scope the first
    /// color seen for a value is kept; later inputs that disagree are
    /// reported once per scope and value.
    fn recolor(&mut self, sources: &[HubSource]) {
        let first = &sources[0];
        self.colors.key = sources.iter().find_map(|s| s.colors.key.clone());
        self.colors.default = first.colors.default;

        let mut reported: IndexSet<(String, String, usize)> = IndexSet::new();
        for p in &self.placements {
            let src = &sources[p.source];
            let color = src
                .colors
                .track_color(&p.old_id)
                .unwrap_or(src.colors.default);

            let rec = self.hierarchy.node(p.node).track();
            if let Some(own) = rec.and_then(explicit_color) {
                self.colors.tracks.insert(p.new_id.clone(), own);
                continue;
            }
            let value = match (&src.colors.key, rec) {
                (Some(key), Some(rec)) => rec.get(key).map(|v| v.to_string()),
                _ => None,
            };
            let value = match value {
                Some(v) => v,
                None => {
                    self.colors.tracks.insert(p.new_id.clone(), color);
                    continue;
                }
            };

            let scope = self.hierarchy.path(self.hierarchy.color_scope(p.node));
            let table = self.colors.scopes.entry(scope.clone()).or_default();
            let kept = *table.entry(value.clone()).or_insert(color);
            if kept != color && reported.insert((scope.clone(), value.clone(), p.source)) {
                self.conflicts.push(ConflictReport {
                    kind: ConflictKind::Color,
                    hub: src.label.clone(),
                    subject: scope,
                    detail: format!("`{}` is {} here, {} in an earlier hub", value, color, kept),
                    resolution: format!("kept {}", kept),
                });
            }
            self.colors.tracks.insert(p.new_id.clone(), kept);
        }
    }
}

/// A container's own keys plus how its children were grouped. Same-named
/// containers merge only when this agrees.
fn grouping_of(kind: &NodeKind, spec: &GroupingSpec) -> String {
    let overlay = spec.overlay_key.as_deref().unwrap_or("-");
    match kind {
        NodeKind::SuperTrack { .. } => format!(
            "{} > subgroups:{} > overlay:{}",
            kind.signature(),
            spec.subgroup_keys.join(","),
            overlay
        ),
        NodeKind::Composite { .. } => format!("{} > overlay:{}", kind.signature(), overlay),
        _ => kind.signature(),
    }
}

fn prefixed(label: &str, name: &str) -> String {
    format!("{}_{}", sanitize(label), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::color::Palette;

    fn source(label: &str, genome: &str, table: &str, spec: GroupingSpec) -> HubSource {
        let design = TrackDesign::from_table(table.as_bytes(), "fn", None).unwrap();
        HubSource::build(label, genome, design, spec, Rgb::BLACK).unwrap()
    }

    fn child_names(hier: &Hierarchy, id: NodeId) -> Vec<String> {
        hier.children(id)
            .iter()
            .map(|&c| hier.node(c).name.clone())
            .collect()
    }

    #[test]
    fn test_empty() {
        assert!(matches!(HubMerger::new().merge(&[]), Err(HubError::EmptyMerge)));
    }

    #[test]
    fn test_genome_mismatch() {
        let a = source("h1", "hg38", "fn\na.bw\n", GroupingSpec::new());
        let b = source("h2", "mm10", "fn\nb.bw\n", GroupingSpec::new());
        match HubMerger::new().merge(&[a.clone(), b]) {
            Err(HubError::GenomeMismatch { expected, found, hub }) => {
                assert_eq!(expected, "hg38");
                assert_eq!(found, "mm10");
                assert_eq!(hub, "h2");
            }
            other => panic!("unexpected {:?}", other.map(|r| r.conflicts)),
        }

        let err = HubMerger::new().with_genome("hg19").merge(&[a]).unwrap_err();
        assert!(matches!(err, HubError::GenomeMismatch { .. }));
    }

    #[test]
    fn test_disjoint_and_shared_supertracks() {
        let spec = GroupingSpec::new().supergroup_by(&["assay"]);
        let a = source("h1", "hg38", "fn,assay\na.bw,ATAC\nb.bw,ATAC\n", spec.clone());
        let b = source("h2", "hg38", "fn,assay\nc.bw,ChIP\nd.bw,ATAC\n", spec);

        let result = HubMerger::new().merge(&[a, b]).unwrap();
        assert!(result.conflicts.is_empty());

        let hier = &result.hierarchy;
        let root = hier.root();
        assert_eq!(child_names(hier, root), vec!["ATAC", "ChIP"]);
        assert_eq!(child_names(hier, hier.children(root)[0]), vec!["a", "b", "d"]);
        assert_eq!(result.design.len(), 4);
        assert_eq!(result.spec.supergroup_keys, vec!["assay"]);
    }

    #[test]
    fn test_track_collisions_keep_everything() {
        let a = source("h1", "hg38", "fn,sample\ndir1/a.bw,S1\n", GroupingSpec::new());
        let b = source("h2", "hg38", "fn,sample\ndir2/a.bw,S1\n", GroupingSpec::new());

        let result = HubMerger::new().merge(&[a, b]).unwrap();
        let kinds: Vec<ConflictKind> = result.conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ConflictKind::TrackId, ConflictKind::TrackName]);

        let hier = &result.hierarchy;
        assert_eq!(child_names(hier, hier.root()), vec!["a", "h2_a"]);
        let ids: Vec<&str> = result.design.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "h2_a"]);
        assert_eq!(result.design.records()[1].file_ref, "dir2/a.bw");
        assert_eq!(result.design.records()[1].name(), "h2_a");
    }

    #[test]
    fn test_structural_conflict() {
        let a = source(
            "h1",
            "hg38",
            "fn,assay,sample\na.bw,ATAC,S1\n",
            GroupingSpec::new().subgroup_by(&["sample"]),
        );
        let b = source(
            "h2",
            "hg38",
            "fn,assay,sample\nb.bw,ATAC,S1\n",
            GroupingSpec::new().subgroup_by(&["assay"]),
        );

        let result = HubMerger::new().merge(&[a, b]).unwrap();
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::Structural);
        assert_eq!(result.conflicts[0].subject, "/bigWig");
        assert_eq!(
            child_names(&result.hierarchy, result.hierarchy.root()),
            vec!["bigWig", "h2_bigWig"]
        );
        assert_eq!(result.hierarchy.tracks().len(), 2);
    }

    #[test]
    fn test_supertracks_grouped_differently() {
        let a = source(
            "h1",
            "hg38",
            "fn,assay,sample\na.bw,ATAC,S1\nb.bw,ATAC,S2\n",
            GroupingSpec::new().supergroup_by(&["assay"]).subgroup_by(&["sample"]),
        );
        let b = source(
            "h2",
            "hg38",
            "fn,assay,sample\nc.bw,ATAC,S1\n",
            GroupingSpec::new().supergroup_by(&["assay"]),
        );

        let result = HubMerger::new().merge(&[a, b]).unwrap();
        assert_eq!(result.conflicts.len(), 1);
        let c = &result.conflicts[0];
        assert_eq!(c.kind, ConflictKind::Structural);
        assert_eq!(c.hub, "h2");
        assert_eq!(c.subject, "/ATAC");

        let hier = &result.hierarchy;
        let root = hier.root();
        assert_eq!(child_names(hier, root), vec!["ATAC", "h2_ATAC"]);
        assert_eq!(child_names(hier, hier.children(root)[0]), vec!["ATAC_bigWig"]);
        assert_eq!(child_names(hier, hier.children(root)[1]), vec!["c"]);
        assert_eq!(hier.tracks().len(), 3);
    }

    #[test]
    fn test_supertracks_with_different_overlays() {
        let a = source(
            "h1",
            "hg38",
            "fn,assay,rep\na.bw,ATAC,1\n",
            GroupingSpec::new().supergroup_by(&["assay"]).overlay_by("rep"),
        );
        let b = source(
            "h2",
            "hg38",
            "fn,assay,rep\nb.bw,ATAC,1\n",
            GroupingSpec::new().supergroup_by(&["assay"]),
        );
        let same = source(
            "h3",
            "hg38",
            "fn,assay,rep\nc.bw,ATAC,2\n",
            GroupingSpec::new().supergroup_by(&["assay"]).overlay_by("rep"),
        );

        let result = HubMerger::new().merge(&[a, b, same]).unwrap();
        let kinds: Vec<ConflictKind> = result.conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ConflictKind::Structural]);
        let hier = &result.hierarchy;
        let root = hier.root();
        assert_eq!(child_names(hier, root), vec!["ATAC", "h2_ATAC"]);
        assert_eq!(child_names(hier, hier.children(root)[0]), vec!["a", "c"]);
    }

    #[test]
    fn test_composite_dimensions_union() {
        let spec = GroupingSpec::new().subgroup_by(&["sample"]);
        let a = source("h1", "hg38", "fn,sample\na.bw,S1\n", spec.clone());
        let b = source("h2", "hg38", "fn,sample\nb.bw,S2\n", spec);

        let result = HubMerger::new().merge(&[a, b]).unwrap();
        assert!(result.conflicts.is_empty());
        let hier = &result.hierarchy;
        let comp = hier.children(hier.root())[0];
        match &hier.node(comp).kind {
            NodeKind::Composite {
                dimensions, cells, ..
            } => {
                assert_eq!(dimensions[0].values, vec!["S1", "S2"]);
                assert_eq!(cells.len(), 2);
            }
            k => panic!("unexpected {:?}", k),
        }
    }

    #[test]
    fn test_first_color_wins() {
        let a = source(
            "h1",
            "hg38",
            "fn,mark\na.bw,CTCF\n",
            GroupingSpec::new().color_by("mark", Palette::Tab10),
        );
        let b = source(
            "h2",
            "hg38",
            "fn,mark\nb.bw,CTCF\nc.bw,CTCF\n",
            GroupingSpec::new().color_by("mark", Palette::Set1),
        );

        let result = HubMerger::new().merge(&[a, b]).unwrap();
        assert_eq!(result.conflicts.len(), 1);
        let c = &result.conflicts[0];
        assert_eq!(c.kind, ConflictKind::Color);
        assert_eq!(c.hub, "h2");
        assert_eq!(c.subject, "/");

        let first = Palette::Tab10.color(0);
        assert_eq!(result.colors.track_color("a"), Some(first));
        assert_eq!(result.colors.track_color("b"), Some(first));
        assert_eq!(result.colors.track_color("c"), Some(first));
        assert_eq!(result.colors.color_of("/", "CTCF"), Some(first));
    }

    #[test]
    fn test_spec_union_falls_back() {
        let a = source(
            "h1",
            "hg38",
            "fn,assay,sample\na.bw,ATAC,S1\n",
            GroupingSpec::new().supergroup_by(&["assay"]),
        );
        let b = source(
            "h2",
            "hg38",
            "fn,assay,sample\nb.bw,ChIP,S1\n",
            GroupingSpec::new().subgroup_by(&["assay"]),
        );
        let result = HubMerger::new().merge(&[a, b]).unwrap();
        assert_eq!(result.spec, GroupingSpec::new().supergroup_by(&["assay"]));

        let tsv = result.conflicts_tsv();
        assert!(tsv.starts_with(ConflictReport::TSV_HEADER));
    }
}
