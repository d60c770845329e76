use crate::libs::color::ColorAssignment;
use crate::libs::error::{HubError, Result};
use crate::libs::hierarchy::{dimension_tags, Hierarchy, NodeId, NodeKind};
use crate::libs::io::is_url;
use crate::libs::track::{file_ext, label_of, sanitize, TrackRecord};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Settings of a custom genome (assembly hub).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyConfig {
    pub twobit: PathBuf,
    pub organism: String,
    pub default_pos: String,
}

/// Hub level settings handed to the serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub name: String,
    pub genome: String,
    pub email: String,
    /// HTML page copied next to the tracks and linked from hub.txt
    pub description: Option<PathBuf>,
    pub assembly: Option<AssemblyConfig>,
}

impl HubConfig {
    pub fn new(name: &str, genome: &str) -> Self {
        Self {
            name: name.to_string(),
            genome: genome.to_string(),
            email: String::new(),
            description: None,
            assembly: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    pub fn with_description(mut self, path: &Path) -> Self {
        self.description = Some(path.to_path_buf());
        self
    }

    pub fn with_assembly(mut self, assembly: AssemblyConfig) -> Self {
        self.assembly = Some(assembly);
        self
    }

    pub fn hub_file(&self) -> String {
        format!("{}.hub.txt", self.name)
    }

    pub fn genomes_file(&self) -> String {
        format!("{}.genomes.txt", self.name)
    }
}

/// trackDb text plus the local files it refers to.
#[derive(Debug, Clone, Default)]
pub struct RenderedTrackDb {
    pub text: String,
    /// source file → name inside the genome directory
    pub staged: Vec<(PathBuf, String)>,
}

/// Turns a hierarchy into trackDb stanzas, parents before children.
pub struct TrackDbWriter<'a> {
    hier: &'a Hierarchy,
    colors: &'a ColorAssignment,
    config: &'a HubConfig,
}

impl<'a> TrackDbWriter<'a> {
    pub fn new(hier: &'a Hierarchy, colors: &'a ColorAssignment, config: &'a HubConfig) -> Self {
        Self {
            hier,
            colors,
            config,
        }
    }

    /// `track` identifiers. Containers use their name; tracks append their
    /// parent's identifier. All must be unique across the hub.
    pub fn identifiers(&self) -> Result<IndexMap<NodeId, String>> {
        let hier = self.hier;
        let mut idents: IndexMap<NodeId, String> = IndexMap::new();
        let mut seen: IndexMap<String, NodeId> = IndexMap::new();

        for id in hier.preorder(hier.root()).into_iter().skip(1) {
            let node = hier.node(id);
            let mut ident = sanitize(&node.name);
            if node.is_leaf() {
                if let Some(parent) = node.parent.filter(|&p| p != hier.root()) {
                    ident = format!("{}_{}", ident, idents[&parent]);
                }
            }
            if let Some(&prev) = seen.get(&ident) {
                return Err(HubError::DuplicateName {
                    parent: "trackDb".to_string(),
                    name: ident,
                    first: hier.node(prev).describe(),
                    second: node.describe(),
                });
            }
            seen.insert(ident.clone(), id);
            idents.insert(id, ident);
        }

        Ok(idents)
    }

    pub fn render(&self) -> Result<RenderedTrackDb> {
        let idents = self.identifiers()?;
        let mut rendered = RenderedTrackDb::default();
        let mut stanzas = vec![];

        for (&id, ident) in &idents {
            let node = self.hier.node(id);
            let mut lines: Vec<(String, String)> = vec![("track".to_string(), ident.clone())];
            let mut push = |k: &str, v: String| lines.push((k.to_string(), v));

            let label = label_of(&node.name);
            match &node.kind {
                NodeKind::Root => continue,
                NodeKind::SuperTrack { .. } => {
                    push("superTrack", "on show".to_string());
                    push("shortLabel", label.clone());
                    push("longLabel", label);
                }
                NodeKind::Composite {
                    format, dimensions, ..
                } => {
                    push("compositeTrack", "on".to_string());
                    push("shortLabel", label.clone());
                    push("longLabel", label);
                    push("type", format.clone());
                    push("visibility", "hide".to_string());
                    push("dragAndDrop", "subTracks".to_string());
                    for (i, dim) in dimensions.iter().enumerate() {
                        let values = dim
                            .values
                            .iter()
                            .map(|v| format!("{}={}", sanitize(v), sanitize(v)))
                            .collect::<Vec<_>>()
                            .join(" ");
                        push(
                            &format!("subGroup{}", i + 1),
                            format!("{} {} {}", sanitize(&dim.key), dim.key, values),
                        );
                    }
                    if dimensions.len() >= 2 {
                        let dims = dimension_tags(dimensions.len())
                            .iter()
                            .zip(dimensions)
                            .map(|(tag, d)| format!("{}={}", tag, sanitize(&d.key)))
                            .collect::<Vec<_>>()
                            .join(" ");
                        push("dimensions", dims);
                    }
                    let sort = dimensions
                        .iter()
                        .map(|d| format!("{}=+", sanitize(&d.key)))
                        .collect::<Vec<_>>()
                        .join(" ");
                    push("sortOrder", sort);
                }
                NodeKind::Overlay { .. } => {
                    push("container", "multiWig".to_string());
                    push("aggregate", "transparentOverlay".to_string());
                    push("showSubtrackColorOnUi", "on".to_string());
                    push("shortLabel", label.clone());
                    push("longLabel", label);
                    push("type", "bigWig".to_string());
                    push("visibility", "full".to_string());
                }
                NodeKind::Track(rec) => {
                    let url = if is_url(&rec.file_ref) {
                        rec.file_ref.clone()
                    } else {
                        let ext = match file_ext(&rec.file_ref) {
                            e if e.is_empty() => rec.format.clone(),
                            e => e,
                        };
                        let staged = format!("{}.{}", ident, ext);
                        rendered
                            .staged
                            .push((PathBuf::from(&rec.file_ref), staged.clone()));
                        staged
                    };
                    let color = self
                        .colors
                        .track_color(&rec.id)
                        .unwrap_or(self.colors.default);
                    push("bigDataUrl", url);
                    push("shortLabel", label.clone());
                    push("longLabel", label);
                    push("type", rec.format.clone());
                    push("color", color.to_string());
                    for (k, v) in format_defaults(&rec.format) {
                        push(k, v.to_string());
                    }
                }
            }

            if let Some(parent) = node.parent.filter(|&p| p != self.hier.root()) {
                let on = if matches!(self.hier.node(parent).kind, NodeKind::Composite { .. }) {
                    " on"
                } else {
                    ""
                };
                push("parent", format!("{}{}", idents[&parent], on));
                if let Some(groups) = self.sub_groups(id, parent) {
                    push("subGroups", groups);
                }
            } else if self.config.assembly.is_some() {
                push("group", sanitize(&self.config.name));
            }

            stanzas.push(
                lines
                    .iter()
                    .map(|(k, v)| format!("{} {}", k, v))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }

        rendered.text = stanzas.join("\n\n");
        if !rendered.text.is_empty() {
            rendered.text += "\n";
        }
        Ok(rendered)
    }

    /// Subgroup memberships of a composite's child, taken from its first
    /// track.
    fn sub_groups(&self, id: NodeId, parent: NodeId) -> Option<String> {
        let dimensions = match &self.hier.node(parent).kind {
            NodeKind::Composite { dimensions, .. } => dimensions,
            _ => return None,
        };
        let leaf = self.hier.leaves(id).into_iter().next()?;
        let rec: &TrackRecord = self.hier.node(leaf).track()?;
        let groups = dimensions
            .iter()
            .filter_map(|d| {
                rec.get(&d.key)
                    .map(|v| format!("{}={}", sanitize(&d.key), sanitize(v)))
            })
            .collect::<Vec<_>>()
            .join(" ");
        Some(groups)
    }
}

/// Display settings every track of a format gets.
fn format_defaults(format: &str) -> Vec<(&'static str, &'static str)> {
    match format {
        "bigWig" => vec![
            ("maxHeightPixels", "100:50:11"),
            ("visibility", "full"),
            ("viewLimits", "0:100"),
            ("autoScale", "on"),
            ("windowingFunction", "mean"),
        ],
        "bigBed" | "bigNarrowPeak" | "narrowPeak" | "broadPeak" => vec![("visibility", "pack")],
        "bigGenePred" => vec![
            ("visibility", "pack"),
            ("baseColorDefault", "genomicCodons"),
        ],
        _ => vec![("visibility", "dense")],
    }
}

/// Files written by [`write_hub`].
#[derive(Debug, Clone)]
pub struct HubFiles {
    pub hub_txt: PathBuf,
    pub genomes_txt: PathBuf,
    pub trackdb: PathBuf,
    pub staged: usize,
}

/// Write `<hub>.hub.txt`, `<hub>.genomes.txt`, `<genome>/trackDb.txt` and,
/// for assembly hubs, `<genome>/groups.txt`, then stage local track files
/// into the genome directory.
pub fn write_hub(
    hier: &Hierarchy,
    colors: &ColorAssignment,
    config: &HubConfig,
    outdir: &Path,
) -> Result<HubFiles> {
    let rendered = TrackDbWriter::new(hier, colors, config).render()?;

    let genome_dir = outdir.join(&config.genome);
    std::fs::create_dir_all(&genome_dir)?;

    // hub.txt
    let mut hub = vec![
        format!("hub {}", config.name),
        format!("shortLabel {}", config.name),
        format!("longLabel {}", config.name),
        format!("genomesFile {}", config.genomes_file()),
    ];
    if !config.email.is_empty() {
        hub.push(format!("email {}", config.email));
    }
    if let Some(desc) = &config.description {
        let name = file_name(desc)?;
        stage(desc, &genome_dir.join(&name))?;
        hub.push(format!("descriptionUrl {}/{}", config.genome, name));
    }
    let hub_txt = outdir.join(config.hub_file());
    std::fs::write(&hub_txt, hub.join("\n") + "\n")?;

    // genomes.txt
    let mut genomes = vec![
        format!("genome {}", config.genome),
        format!("trackDb {}/trackDb.txt", config.genome),
    ];
    if let Some(assembly) = &config.assembly {
        let twobit = file_name(&assembly.twobit)?;
        stage(&assembly.twobit, &genome_dir.join(&twobit))?;
        genomes.push(format!("groups {}/groups.txt", config.genome));
        genomes.push(format!("description {}", config.genome));
        genomes.push(format!("twoBitPath {}/{}", config.genome, twobit));
        genomes.push(format!("organism {}", assembly.organism));
        genomes.push(format!("defaultPos {}", assembly.default_pos));

        let groups = [
            format!("name {}", sanitize(&config.name)),
            format!("label {}", config.name),
            "priority 1".to_string(),
            "defaultIsClosed 0".to_string(),
        ];
        std::fs::write(genome_dir.join("groups.txt"), groups.join("\n") + "\n")?;
    }
    let genomes_txt = outdir.join(config.genomes_file());
    std::fs::write(&genomes_txt, genomes.join("\n") + "\n")?;

    let trackdb = genome_dir.join("trackDb.txt");
    std::fs::write(&trackdb, &rendered.text)?;

    for (src, name) in &rendered.staged {
        stage(src, &genome_dir.join(name))?;
    }
    log::info!(
        "Hub {} written to {} ({} files staged)",
        config.name,
        outdir.display(),
        rendered.staged.len()
    );

    Ok(HubFiles {
        hub_txt,
        genomes_txt,
        trackdb,
        staged: rendered.staged.len(),
    })
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            HubError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            ))
        })
}

/// Hard link `src` to `dest`, copying when linking isn't possible.
fn stage(src: &Path, dest: &Path) -> Result<()> {
    if !src.is_file() {
        return Err(HubError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("track file {} not found", src.display()),
        )));
    }
    if dest.exists() {
        std::fs::remove_file(dest)?;
    }
    if std::fs::hard_link(src, dest).is_err() {
        std::fs::copy(src, dest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::color::{ColorAssigner, Palette};
    use crate::libs::design::TrackDesign;
    use crate::libs::grouping::GroupingSpec;
    use crate::libs::hierarchy::GroupingEngine;

    fn build(table: &str, spec: &GroupingSpec) -> (Hierarchy, ColorAssignment) {
        let design = TrackDesign::from_table(table.as_bytes(), "fn", None).unwrap();
        let hier = GroupingEngine::new(&design, spec).build().unwrap();
        let colors = ColorAssigner::new(spec.color_key.as_deref(), spec.palette).assign(&hier);
        (hier, colors)
    }

    #[test]
    fn test_supertrack_stanzas() {
        let spec = GroupingSpec::new()
            .supergroup_by(&["assay"])
            .color_by("assay", Palette::Tab10);
        let (hier, colors) = build("fn,assay\na.bw,ATAC\nhttps://x.org/c.bb,ChIP\n", &spec);
        let config = HubConfig::new("demo", "hg38");

        let rendered = TrackDbWriter::new(&hier, &colors, &config).render().unwrap();
        let text = rendered.text;
        assert!(text.starts_with("track ATAC\nsuperTrack on show\n"));
        assert!(text.contains("track a_ATAC\nbigDataUrl a_ATAC.bw\n"));
        assert!(text.contains("color 31,119,180\n"));
        assert!(text.contains("autoScale on\n"));
        assert!(text.contains("parent ATAC\n"));
        assert!(text.contains("bigDataUrl https://x.org/c.bb\n"));
        assert!(text.contains("type bigBed\n"));
        assert!(!text.contains("group "));
        assert_eq!(rendered.staged, vec![(PathBuf::from("a.bw"), "a_ATAC.bw".to_string())]);
    }

    #[test]
    fn test_composite_stanzas() {
        let spec = GroupingSpec::new().subgroup_by(&["assay", "sample"]);
        let (hier, colors) = build(
            "fn,assay,sample\na.bw,ATAC,S1\nb.bw,ATAC,S2\nc.bw,ChIP,S1\n",
            &spec,
        );
        let config = HubConfig::new("demo", "hg38");
        let text = TrackDbWriter::new(&hier, &colors, &config).render().unwrap().text;

        assert!(text.contains("compositeTrack on\n"));
        assert!(text.contains("subGroup1 assay assay ATAC=ATAC ChIP=ChIP\n"));
        assert!(text.contains("subGroup2 sample sample S1=S1 S2=S2\n"));
        assert!(text.contains("dimensions dimX=assay dimY=sample\n"));
        assert!(text.contains("parent bigWig on\nsubGroups assay=ChIP sample=S1\n"));
        assert!(text.contains("color 0,0,0\n"));
    }

    #[test]
    fn test_single_dimension_has_no_dimensions_line() {
        let spec = GroupingSpec::new().subgroup_by(&["sample"]);
        let (hier, colors) = build("fn,sample\na.bw,S1\nb.bw,S2\n", &spec);
        let config = HubConfig::new("demo", "hg38");
        let text = TrackDbWriter::new(&hier, &colors, &config).render().unwrap().text;
        assert!(text.contains("subGroup1 sample sample S1=S1 S2=S2\n"));
        assert!(!text.contains("dimensions"));
    }

    #[test]
    fn test_overlay_stanzas() {
        let spec = GroupingSpec::new().overlay_by("rep");
        let (hier, colors) = build("fn,sample,rep\nx.bw,S1,1\ny.bw,S1,2\n", &spec);
        let config = HubConfig::new("demo", "hg38");
        let text = TrackDbWriter::new(&hier, &colors, &config).render().unwrap().text;
        assert!(text.contains("track S1_overlay\ncontainer multiWig\naggregate transparentOverlay\n"));
        assert!(text.contains("track x_S1_overlay\n"));
        assert!(text.contains("parent S1_overlay\n"));
    }

    #[test]
    fn test_global_identifiers_unique() {
        // a track named like a top-level container's child identifier
        let spec = GroupingSpec::new().supergroup_by(&["assay"]);
        let (hier, colors) = build("fn,name,assay\na.bw,a,ATAC\nb.bw,a_ATAC,\n", &spec);
        let config = HubConfig::new("demo", "hg38");
        let err = TrackDbWriter::new(&hier, &colors, &config)
            .render()
            .unwrap_err();
        assert!(matches!(err, HubError::DuplicateName { .. }));
    }

    #[test]
    fn test_write_assembly_hub() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let data = tempdir.path().join("a.bw");
        std::fs::write(&data, "bw").unwrap();
        let twobit = tempdir.path().join("genome.2bit");
        std::fs::write(&twobit, "2bit").unwrap();
        let desc = tempdir.path().join("about.html");
        std::fs::write(&desc, "<p>hi</p>").unwrap();

        let table = format!("fn\n{}\n", data.display());
        let (hier, colors) = build(&table, &GroupingSpec::new());
        let config = HubConfig::new("demo", "myGenome")
            .with_email("me@example.org")
            .with_description(&desc)
            .with_assembly(AssemblyConfig {
                twobit: twobit.clone(),
                organism: "Yeast".to_string(),
                default_pos: "chr1:1-100".to_string(),
            });

        let out = tempdir.path().join("hub");
        let files = write_hub(&hier, &colors, &config, &out).unwrap();
        assert_eq!(files.staged, 1);

        let hub = std::fs::read_to_string(&files.hub_txt).unwrap();
        assert!(hub.contains("genomesFile demo.genomes.txt\n"));
        assert!(hub.contains("email me@example.org\n"));
        assert!(hub.contains("descriptionUrl myGenome/about.html\n"));

        let genomes = std::fs::read_to_string(&files.genomes_txt).unwrap();
        assert!(genomes.contains("twoBitPath myGenome/genome.2bit\n"));
        assert!(genomes.contains("groups myGenome/groups.txt\n"));

        let trackdb = std::fs::read_to_string(&files.trackdb).unwrap();
        assert!(trackdb.contains("group demo\n"));

        assert!(out.join("myGenome/a.bw").is_file());
        assert!(out.join("myGenome/genome.2bit").is_file());
        assert!(out.join("myGenome/groups.txt").is_file());
    }

    #[test]
    fn test_missing_track_file() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let (hier, colors) = build("fn\nnowhere/a.bw\n", &GroupingSpec::new());
        let config = HubConfig::new("demo", "hg38");
        assert!(write_hub(&hier, &colors, &config, tempdir.path()).is_err());
    }
}
