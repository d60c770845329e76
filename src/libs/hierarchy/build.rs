use super::node::{Dimension, NodeId, NodeKind};
use super::tree::Hierarchy;
use crate::libs::design::TrackDesign;
use crate::libs::error::Result;
use crate::libs::grouping::GroupingSpec;
use crate::libs::track::{COLOR_FIELD, NAME_FIELD};
use indexmap::IndexMap;

/// Separator between the values that make up a container name.
pub const NAME_SEP: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Step {
    Super,
    Composite,
    Overlay,
    Leaf,
}

/// A run of records that ends up as one child of the current level.
/// Record indices are ascending inside each unit.
#[derive(Debug)]
enum Unit {
    Super(Vec<String>, Vec<usize>),
    Composite(String, Vec<usize>),
    Overlay(Vec<(String, String)>, Vec<usize>),
    Leaf(usize),
}

impl Unit {
    fn first(&self) -> usize {
        match self {
            Unit::Super(_, m) | Unit::Composite(_, m) | Unit::Overlay(_, m) => m[0],
            Unit::Leaf(i) => *i,
        }
    }
}

/// Partitions a [`TrackDesign`] into a [`Hierarchy`].
///
/// 1. Supertracks: one per distinct tuple of supergroup values.
/// 2. Composites: records with every subgroup value, one composite per track
///    format, carrying one dimension per subgroup key.
/// 3. Overlays: signal tracks equal on every field but the overlay key.
/// 4. Everything left hangs off the current level as a track.
///
/// Records without a value for a step's keys skip that step. Children of a
/// node are ordered by the first record they hold, so the table's row order
/// is the display order.
pub struct GroupingEngine<'a> {
    design: &'a TrackDesign,
    spec: &'a GroupingSpec,
}

impl<'a> GroupingEngine<'a> {
    pub fn new(design: &'a TrackDesign, spec: &'a GroupingSpec) -> Self {
        Self { design, spec }
    }

    /// Build the hierarchy. The spec is checked against the design first.
    ///
    /// ```
    /// use hubr::libs::design::TrackDesign;
    /// use hubr::libs::grouping::GroupingSpec;
    /// use hubr::libs::hierarchy::GroupingEngine;
    ///
    /// let table = "fn,assay,sample\na.bw,ATAC,S1\nb.bw,ATAC,S2\nc.bw,ChIP,S1\n";
    /// let design = TrackDesign::from_table(table.as_bytes(), "fn", None).unwrap();
    /// let spec = GroupingSpec::new().supergroup_by(&["assay"]);
    ///
    /// let hier = GroupingEngine::new(&design, &spec).build().unwrap();
    /// let root = hier.root();
    /// let names: Vec<_> = hier.children(root).iter().map(|&c| hier.node(c).name.clone()).collect();
    /// assert_eq!(names, vec!["ATAC", "ChIP"]);
    /// ```
    pub fn build(&self) -> Result<Hierarchy> {
        self.spec.validate(self.design)?;

        let mut hier = Hierarchy::new();
        let all: Vec<usize> = (0..self.design.len()).collect();
        let root = hier.root();
        self.fill(&mut hier, root, &all, Step::Super)?;

        log::debug!(
            "{} records grouped into {} nodes",
            self.design.len(),
            hier.len()
        );
        Ok(hier)
    }

    fn fill(&self, hier: &mut Hierarchy, parent: NodeId, members: &[usize], from: Step) -> Result<()> {
        let mut units = self.units(members, from);
        units.sort_by_key(|u| u.first());

        for unit in units {
            match unit {
                Unit::Super(values, group) => {
                    let name = values.join(NAME_SEP);
                    let kind = NodeKind::SuperTrack {
                        keys: self.spec.supergroup_keys.clone(),
                        values,
                    };
                    let id = hier.add_child(parent, &name, kind)?;
                    self.fill(hier, id, &group, Step::Composite)?;
                }
                Unit::Composite(format, group) => {
                    let name = self.child_name(hier, parent, &format);
                    let kind = self.composite_kind(&format, &group);
                    let id = hier.add_child(parent, &name, kind)?;
                    self.fill(hier, id, &group, Step::Overlay)?;
                }
                Unit::Overlay(shared, group) => {
                    let label = shared
                        .iter()
                        .map(|(_, v)| v.as_str())
                        .chain(std::iter::once("overlay"))
                        .collect::<Vec<_>>()
                        .join(NAME_SEP);
                    let name = self.child_name(hier, parent, &label);
                    let kind = NodeKind::Overlay {
                        key: self.spec.overlay_key.clone().unwrap_or_default(),
                        shared,
                    };
                    let id = hier.add_child(parent, &name, kind)?;
                    self.fill(hier, id, &group, Step::Leaf)?;
                }
                Unit::Leaf(i) => {
                    let rec = &self.design.records()[i];
                    hier.add_child(parent, rec.name(), NodeKind::Track(rec.clone()))?;
                }
            }
        }

        Ok(())
    }

    /// Containers below a supertrack or composite carry its name as a prefix,
    /// which keeps container names unique across the whole hub.
    fn child_name(&self, hier: &Hierarchy, parent: NodeId, label: &str) -> String {
        if parent == hier.root() {
            label.to_string()
        } else {
            format!("{}{}{}", hier.node(parent).name, NAME_SEP, label)
        }
    }

    fn units(&self, members: &[usize], from: Step) -> Vec<Unit> {
        let records = self.design.records();
        match from {
            Step::Super if !self.spec.supergroup_keys.is_empty() => {
                let mut groups: IndexMap<Vec<String>, Vec<usize>> = IndexMap::new();
                let mut rest = vec![];
                for &i in members {
                    match records[i].values_of(&self.spec.supergroup_keys) {
                        Some(values) => groups.entry(values).or_default().push(i),
                        None => rest.push(i),
                    }
                }
                let mut units: Vec<Unit> = groups
                    .into_iter()
                    .map(|(values, group)| Unit::Super(values, group))
                    .collect();
                units.extend(self.units(&rest, Step::Composite));
                units
            }
            Step::Super => self.units(members, Step::Composite),
            Step::Composite if !self.spec.subgroup_keys.is_empty() => {
                let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
                let mut rest = vec![];
                for &i in members {
                    if records[i].values_of(&self.spec.subgroup_keys).is_some() {
                        groups.entry(records[i].format.clone()).or_default().push(i);
                    } else {
                        rest.push(i);
                    }
                }
                let mut units: Vec<Unit> = groups
                    .into_iter()
                    .map(|(format, group)| Unit::Composite(format, group))
                    .collect();
                units.extend(self.units(&rest, Step::Overlay));
                units
            }
            Step::Composite => self.units(members, Step::Overlay),
            Step::Overlay if self.spec.overlay_key.is_some() => self.overlay_units(members),
            Step::Overlay | Step::Leaf => members.iter().map(|&i| Unit::Leaf(i)).collect(),
        }
    }

    /// Partition by the complement of the overlay key: signal tracks that
    /// agree on every other field share an overlay. Singletons stay tracks.
    /// Overlays are labelled by their shared values, so two overlays under
    /// one composite differ by their subgroup values.
    fn overlay_units(&self, members: &[usize]) -> Vec<Unit> {
        let records = self.design.records();
        let overlay_key = self.spec.overlay_key.clone().unwrap_or_default();
        let complement: Vec<&String> = self
            .design
            .schema()
            .iter()
            .filter(|f| f.as_str() != NAME_FIELD && f.as_str() != COLOR_FIELD && **f != overlay_key)
            .collect();
        // supergroup values are already part of the parent's name
        let enclosing = &self.spec.supergroup_keys;

        let mut groups: IndexMap<Vec<String>, Vec<usize>> = IndexMap::new();
        let mut units = vec![];
        for &i in members {
            let rec = &records[i];
            if !rec.is_signal() || rec.get(&overlay_key).is_none() {
                units.push(Unit::Leaf(i));
                continue;
            }
            let key: Vec<String> = complement
                .iter()
                .map(|f| rec.get(f).unwrap_or_default().to_string())
                .collect();
            groups.entry(key).or_default().push(i);
        }

        for (key, group) in groups {
            if group.len() < 2 {
                units.push(Unit::Leaf(group[0]));
                continue;
            }
            let shared: Vec<(String, String)> = complement
                .iter()
                .zip(key)
                .filter(|(f, v)| !v.is_empty() && !enclosing.iter().any(|k| k == f.as_str()))
                .map(|(f, v)| (f.to_string(), v))
                .collect();
            units.push(Unit::Overlay(shared, group));
        }

        units
    }

    fn composite_kind(&self, format: &str, group: &[usize]) -> NodeKind {
        let records = self.design.records();
        let keys = &self.spec.subgroup_keys;

        let mut dimensions: Vec<Dimension> = keys
            .iter()
            .map(|k| Dimension {
                key: k.clone(),
                values: vec![],
            })
            .collect();
        let mut cells: Vec<Vec<String>> = vec![];

        for &i in group {
            if let Some(values) = records[i].values_of(keys) {
                for (dim, v) in dimensions.iter_mut().zip(values.iter()) {
                    if !dim.values.contains(v) {
                        dim.values.push(v.clone());
                    }
                }
                if !cells.contains(&values) {
                    cells.push(values);
                }
            }
        }

        NodeKind::Composite {
            format: format.to_string(),
            dimensions,
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::error::HubError;

    fn design(table: &str) -> TrackDesign {
        TrackDesign::from_table(table.as_bytes(), "fn", None).unwrap()
    }

    fn child_names(hier: &Hierarchy, id: NodeId) -> Vec<String> {
        hier.children(id)
            .iter()
            .map(|&c| hier.node(c).name.clone())
            .collect()
    }

    const ROWS: &str = "fn,assay,sample\na.bw,ATAC,S1\nb.bw,ATAC,S2\nc.bw,ChIP,S1\n";

    #[test]
    fn test_empty_design() {
        let design = TrackDesign::new();
        let hier = GroupingEngine::new(&design, &GroupingSpec::new()).build().unwrap();
        assert!(hier.is_empty());
        assert_eq!(hier.len(), 1);
    }

    #[test]
    fn test_flat() {
        let design = design(ROWS);
        let hier = GroupingEngine::new(&design, &GroupingSpec::new()).build().unwrap();
        assert_eq!(child_names(&hier, hier.root()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_supertracks() {
        let design = design(ROWS);
        let spec = GroupingSpec::new().supergroup_by(&["assay"]);
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();

        let root = hier.root();
        assert_eq!(child_names(&hier, root), vec!["ATAC", "ChIP"]);
        let atac = hier.children(root)[0];
        let chip = hier.children(root)[1];
        assert_eq!(child_names(&hier, atac), vec!["a", "b"]);
        assert_eq!(child_names(&hier, chip), vec!["c"]);
    }

    #[test]
    fn test_supertracks_keep_table_order() {
        let design = design("fn,assay\na.bw,Zeta\nb.bw,Alpha\nc.bw,Zeta\n");
        let spec = GroupingSpec::new().supergroup_by(&["assay"]);
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();
        assert_eq!(child_names(&hier, hier.root()), vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_multiple_supergroup_keys() {
        let design = design(ROWS);
        let spec = GroupingSpec::new().supergroup_by(&["assay", "sample"]);
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();
        assert_eq!(
            child_names(&hier, hier.root()),
            vec!["ATAC_S1", "ATAC_S2", "ChIP_S1"]
        );
    }

    #[test]
    fn test_matrix_composite() {
        let design = design(ROWS);
        let spec = GroupingSpec::new().subgroup_by(&["assay", "sample"]);
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();

        let root = hier.root();
        assert_eq!(child_names(&hier, root), vec!["bigWig"]);
        let comp = hier.children(root)[0];
        match &hier.node(comp).kind {
            NodeKind::Composite {
                dimensions, cells, ..
            } => {
                assert_eq!(dimensions.len(), 2);
                assert_eq!(dimensions[0].values, vec!["ATAC", "ChIP"]);
                assert_eq!(dimensions[1].values, vec!["S1", "S2"]);
                assert_eq!(
                    cells,
                    &vec![
                        vec!["ATAC".to_string(), "S1".to_string()],
                        vec!["ATAC".to_string(), "S2".to_string()],
                        vec!["ChIP".to_string(), "S1".to_string()],
                    ]
                );
            }
            k => panic!("unexpected {:?}", k),
        }
        assert_eq!(child_names(&hier, comp), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_single_key_composite_is_group() {
        let design = design(ROWS);
        let spec = GroupingSpec::new().subgroup_by(&["sample"]);
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();
        let comp = hier.children(hier.root())[0];
        match &hier.node(comp).kind {
            NodeKind::Composite { dimensions, .. } => assert_eq!(dimensions.len(), 1),
            k => panic!("unexpected {:?}", k),
        }
    }

    #[test]
    fn test_composites_split_by_format() {
        let design = design("fn,assay,sample\na.bw,ATAC,S1\np.bigBed,ATAC,S1\nb.bw,ChIP,S1\n");
        let spec = GroupingSpec::new()
            .supergroup_by(&["assay"])
            .subgroup_by(&["sample"]);
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();
        let atac = hier.children(hier.root())[0];
        assert_eq!(child_names(&hier, atac), vec!["ATAC_bigWig", "ATAC_bigBed"]);
    }

    #[test]
    fn test_overlay() {
        let design = design("fn,sample,rep\nx.bw,S1,1\ny.bw,S1,2\nz.bw,S2,1\n");
        let spec = GroupingSpec::new().overlay_by("rep");
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();

        let root = hier.root();
        assert_eq!(child_names(&hier, root), vec!["S1_overlay", "z"]);
        let overlay = hier.children(root)[0];
        assert_eq!(child_names(&hier, overlay), vec!["x", "y"]);
    }

    #[test]
    fn test_overlay_skips_non_signal() {
        let design = design("fn,sample,rep\nx.bigBed,S1,1\ny.bigBed,S1,2\n");
        let spec = GroupingSpec::new().overlay_by("rep");
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();
        assert_eq!(child_names(&hier, hier.root()), vec!["x", "y"]);
    }

    #[test]
    fn test_overlay_inside_supertrack() {
        let design = design("fn,assay,sample,rep\nx.bw,ATAC,S1,1\ny.bw,ATAC,S1,2\n");
        let spec = GroupingSpec::new().supergroup_by(&["assay"]).overlay_by("rep");
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();
        let atac = hier.children(hier.root())[0];
        assert_eq!(child_names(&hier, atac), vec!["ATAC_S1_overlay"]);
    }

    #[test]
    fn test_overlays_inside_composite() {
        let design = design("fn,sample,rep\nx1.bw,S1,1\nx2.bw,S1,2\ny1.bw,S2,1\ny2.bw,S2,2\n");
        let spec = GroupingSpec::new().subgroup_by(&["sample"]).overlay_by("rep");
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();

        let comp = hier.children(hier.root())[0];
        assert_eq!(
            child_names(&hier, comp),
            vec!["bigWig_S1_overlay", "bigWig_S2_overlay"]
        );
        let second = hier.children(comp)[1];
        assert_eq!(child_names(&hier, second), vec!["y1", "y2"]);
        assert_eq!(hier.tracks().len(), 4);
    }

    #[test]
    fn test_missing_group_value_stays_at_level() {
        let design = design("fn,assay\na.bw,ATAC\nb.bw,\nc.bw,ATAC\n");
        let spec = GroupingSpec::new().supergroup_by(&["assay"]);
        let hier = GroupingEngine::new(&design, &spec).build().unwrap();
        assert_eq!(child_names(&hier, hier.root()), vec!["ATAC", "b"]);
        assert_eq!(hier.leaves(hier.root()).len(), 3);
    }

    #[test]
    fn test_duplicate_leaf_name() {
        let design = design("fn,name,assay\nr1.bw,S1,ATAC\nr2.bw,S1,ATAC\n");
        let spec = GroupingSpec::new().supergroup_by(&["assay"]);
        let err = GroupingEngine::new(&design, &spec).build().unwrap_err();
        match err {
            HubError::DuplicateName {
                name, first, second, ..
            } => {
                assert_eq!(name, "S1");
                assert!(first.contains("r1"));
                assert!(second.contains("r2"));
            }
            e => panic!("unexpected {}", e),
        }
    }

    #[test]
    fn test_schema_error_first() {
        let design = design(ROWS);
        let spec = GroupingSpec::new().subgroup_by(&["mark"]);
        let err = GroupingEngine::new(&design, &spec).build().unwrap_err();
        assert!(matches!(err, HubError::Schema { .. }));
    }

    #[test]
    fn test_every_record_once_and_idempotent() {
        let design = design(
            "fn,assay,sample,rep\na.bw,ATAC,S1,1\nb.bw,ATAC,S1,2\nc.bigBed,ATAC,S2,1\nd.bw,ChIP,,1\ne.bw,,S1,1\n",
        );
        let spec = GroupingSpec::new()
            .supergroup_by(&["assay"])
            .subgroup_by(&["sample"])
            .overlay_by("rep");
        let engine = GroupingEngine::new(&design, &spec);
        let hier = engine.build().unwrap();

        let mut ids: Vec<String> = hier.tracks().iter().map(|r| r.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);

        let again = engine.build().unwrap();
        assert_eq!(hier, again);
    }

    #[test]
    fn test_every_record_once_across_groupings() {
        let design = design(
            "fn,assay,sample,mark,rep\n\
             a1.bw,ChIP,S1,K4,1\na2.bw,ChIP,S1,K4,2\n\
             b1.bw,ChIP,S1,K27,1\nb2.bw,ChIP,S1,K27,2\n\
             c1.bw,ChIP,S2,K4,1\nc2.bw,ChIP,S2,K4,2\n\
             d1.bw,ATAC,S1,,1\nd2.bw,ATAC,S1,,2\n\
             e1.bw,ATAC,S2,,1\ne2.bw,ATAC,S2,,2\n\
             p.bigBed,ATAC,S2,,1\n",
        );
        let specs = vec![
            GroupingSpec::new().subgroup_by(&["sample"]).overlay_by("rep"),
            GroupingSpec::new().subgroup_by(&["sample", "mark"]).overlay_by("rep"),
            GroupingSpec::new()
                .supergroup_by(&["assay"])
                .subgroup_by(&["sample"])
                .overlay_by("rep"),
            GroupingSpec::new()
                .supergroup_by(&["assay"])
                .subgroup_by(&["mark"])
                .overlay_by("rep"),
            GroupingSpec::new().supergroup_by(&["sample"]).overlay_by("rep"),
            GroupingSpec::new().overlay_by("rep"),
        ];

        let mut expect: Vec<String> = design.records().iter().map(|r| r.id.clone()).collect();
        expect.sort();
        for spec in &specs {
            let hier = GroupingEngine::new(&design, spec).build().unwrap();
            let mut ids: Vec<String> = hier.tracks().iter().map(|r| r.id.clone()).collect();
            ids.sort();
            assert_eq!(ids, expect, "{:?}", spec);
        }
    }
}
