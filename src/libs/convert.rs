use crate::libs::design::TrackDesign;
use crate::libs::error::{HubError, Result};
use crate::libs::io::{find_tool, is_url};
use crate::libs::track::{converted_format, needs_conversion};
use indexmap::IndexSet;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// AutoSql definition of the bigGenePred format
pub const BIG_GENE_PRED_AS: &str = r#"table bigGenePred
"bigGenePred gene models"
   (
   string chrom;       "Reference sequence chromosome or scaffold"
   uint   chromStart;  "Start position in chromosome"
   uint   chromEnd;    "End position in chromosome"
   string name;        "Name or ID of item, ideally both human readable and unique"
   uint score;         "Score (0-1000)"
   char[1] strand;     "+ or - for strand"
   uint thickStart;    "Start of where display should be thick (start codon)"
   uint thickEnd;      "End of where display should be thick (stop codon)"
   uint reserved;      "RGB value (use R,G,B string in input file)"
   int blockCount;     "Number of blocks"
   int[blockCount] blockSizes; "Comma separated list of block sizes"
   int[blockCount] chromStarts; "Start positions relative to chromStart"
   string name2;       "Alternative/human readable name"
   string cdsStartStat; "Status of CDS start annotation (none, unknown, incomplete, or complete)"
   string cdsEndStat;   "Status of CDS end annotation (none, unknown, incomplete, or complete)"
   int[blockCount] exonFrames; "Exon frame {0,1,2}, or -1 if no frame for exon"
   string type;        "Transcript type"
   string geneName;    "Primary identifier for gene"
   string geneName2;   "Alternative/human readable gene name"
   string geneType;    "Gene type"
   )
"#;

/// Images used when a tool is not installed but a container engine is.
const CONTAINER_IMAGES: [(&str, &str); 1] = [(
    "bedToBigBed",
    "quay.io/biocontainers/ucsc-bedtobigbed:447--h29774a3_3",
)];

/// A resolved way to run an external tool: a program plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Finds UCSC binaries: `PATH`, then `~/bin`, then a container engine.
#[derive(Debug, Clone, Default)]
pub struct ToolFinder {
    pub no_container: bool,
}

impl ToolFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locate(&self, tool: &str) -> Option<ToolCommand> {
        if let Some(path) = find_tool(tool) {
            return Some(ToolCommand {
                program: path.to_string_lossy().to_string(),
                args: vec![],
            });
        }
        if self.no_container {
            None
        } else {
            Self::container(tool)
        }
    }

    /// Run `tool` from its biocontainers image, if one is known and an
    /// engine is installed.
    pub fn container(tool: &str) -> Option<ToolCommand> {
        let image = CONTAINER_IMAGES
            .iter()
            .find(|(t, _)| *t == tool)
            .map(|(_, i)| *i)?;

        for engine in ["apptainer", "singularity"] {
            if which::which(engine).is_ok() {
                return Some(ToolCommand {
                    program: engine.to_string(),
                    args: vec![
                        "exec".to_string(),
                        format!("docker://{}", image),
                        tool.to_string(),
                    ],
                });
            }
        }

        if which::which("docker").is_ok() {
            let cwd = std::env::current_dir().ok()?.to_string_lossy().to_string();
            return Some(ToolCommand {
                program: "docker".to_string(),
                args: vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    "-v".to_string(),
                    format!("{}:{}", cwd, cwd),
                    "-w".to_string(),
                    cwd,
                    image.to_string(),
                    tool.to_string(),
                ],
            });
        }

        None
    }

    /// [`HubError::CapabilityMissing`] if `tool` can't be run at all.
    pub fn require(&self, tool: &str, operation: &str) -> Result<ToolCommand> {
        self.locate(tool).ok_or_else(|| HubError::CapabilityMissing {
            tool: tool.to_string(),
            operation: operation.to_string(),
        })
    }
}

/// Turns bed and gtf/gff files into the indexed formats a browser reads.
#[derive(Debug, Clone)]
pub struct Converter {
    chrom_sizes: PathBuf,
    outdir: PathBuf,
    finder: ToolFinder,
}

impl Converter {
    /// Converted files go to `outdir`.
    pub fn new(chrom_sizes: &Path, outdir: &Path, finder: ToolFinder) -> Result<Self> {
        if !chrom_sizes.is_file() {
            return Err(HubError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("chrom.sizes {} not found", chrom_sizes.display()),
            )));
        }
        std::fs::create_dir_all(outdir)?;
        Ok(Self {
            chrom_sizes: chrom_sizes.to_path_buf(),
            outdir: outdir.to_path_buf(),
            finder,
        })
    }

    /// `LC_ALL=C sort -k1,1 -k2,2n`, then `bedToBigBed`.
    pub fn bed_to_bigbed(&self, input: &Path, output: &Path) -> Result<()> {
        let tool = self.finder.require("bedToBigBed", "convert bed to bigBed")?;
        let sorted = sort_bed(input)?;

        let mut cmd = tool.command();
        cmd.arg(sorted.path()).arg(&self.chrom_sizes).arg(output);
        run(cmd, input)
    }

    /// gtf (or gff3) → genePred → bigGenePred text → sorted → bigBed.
    pub fn gtf_to_biggenepred(&self, input: &Path, output: &Path) -> Result<()> {
        let is_gff = matches!(
            input.extension().and_then(|e| e.to_str()),
            Some("gff") | Some("gff3")
        );
        let to_gene_pred = if is_gff {
            self.finder.require("gff3ToGenePred", "convert gff to genePred")?
        } else {
            self.finder.require("gtfToGenePred", "convert gtf to genePred")?
        };
        let to_big = self
            .finder
            .require("genePredToBigGenePred", "convert genePred to bigGenePred")?;
        let bed_to_bb = self.finder.require("bedToBigBed", "convert bigGenePred to bigBed")?;

        let gene_pred = NamedTempFile::new()?;
        let mut cmd = to_gene_pred.command();
        if !is_gff {
            cmd.arg("-genePredExt");
        }
        cmd.arg(input).arg(gene_pred.path());
        run(cmd, input)?;

        let big_input = NamedTempFile::new()?;
        let mut cmd = to_big.command();
        cmd.arg(gene_pred.path()).arg(big_input.path());
        run(cmd, input)?;

        let sorted = sort_bed(big_input.path())?;

        let mut autosql = NamedTempFile::new()?;
        autosql.write_all(BIG_GENE_PRED_AS.as_bytes())?;
        autosql.flush()?;

        let mut cmd = bed_to_bb.command();
        cmd.arg("-type=bed12+8")
            .arg("-tab")
            .arg(format!("-as={}", autosql.path().display()))
            .arg(sorted.path())
            .arg(&self.chrom_sizes)
            .arg(output);
        run(cmd, input)
    }

    /// Convert one file by its format; returns the new path and format.
    pub fn convert(&self, file_ref: &str, format: &str, id: &str) -> Result<(PathBuf, String)> {
        if is_url(file_ref) {
            return Err(HubError::Conversion {
                track: id.to_string(),
                message: format!("remote file {} can't be converted", file_ref),
            });
        }
        let target = converted_format(format).ok_or_else(|| HubError::Conversion {
            track: id.to_string(),
            message: format!("no conversion for format {}", format),
        })?;

        let output = self.outdir.join(format!("{}.bb", id));
        let input = Path::new(file_ref);
        match target {
            "bigBed" => self.bed_to_bigbed(input, &output)?,
            _ => self.gtf_to_biggenepred(input, &output)?,
        }
        Ok((output, target.to_string()))
    }
}

fn sort_bed(input: &Path) -> Result<NamedTempFile> {
    let sorted = NamedTempFile::new()?;
    let mut cmd = std::process::Command::new("sort");
    cmd.env("LC_ALL", "C")
        .arg("-k1,1")
        .arg("-k2,2n")
        .arg(input)
        .stdout(sorted.reopen()?);
    run(cmd, input)?;
    Ok(sorted)
}

fn run(mut cmd: std::process::Command, input: &Path) -> Result<()> {
    log::debug!("{:?}", cmd);
    let output = cmd.output().map_err(|e| HubError::Conversion {
        track: input.display().to_string(),
        message: format!("can't run {:?}: {}", cmd.get_program(), e),
    })?;
    if !output.status.success() {
        return Err(HubError::Conversion {
            track: input.display().to_string(),
            message: format!(
                "{:?} exited with {}: {}",
                cmd.get_program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

/// What happened to the tracks that needed converting.
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Track ids now pointing at converted files
    pub converted: Vec<String>,
    /// Track id and reason, removed from the design
    pub failed: Vec<(String, String)>,
    /// Track ids removed because conversion was off
    pub skipped: Vec<String>,
}

/// Convert every track of `design` that needs it, `parallel` at a time.
///
/// Tracks that can't be converted are removed so the hub never points at a
/// file the browser can't read. With `required` the first failure is
/// returned instead. `converter` is `None` when conversion is turned off.
pub fn convert_design(
    design: &mut TrackDesign,
    converter: Option<&Converter>,
    parallel: usize,
    required: bool,
) -> Result<ConversionReport> {
    let pending: Vec<(usize, String, String, String)> = design
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| needs_conversion(&r.format))
        .map(|(i, r)| (i, r.id.clone(), r.file_ref.clone(), r.format.clone()))
        .collect();

    let mut report = ConversionReport::default();
    if pending.is_empty() {
        return Ok(report);
    }

    let converter = match converter {
        Some(c) => c,
        None => {
            if required {
                let (_, id, file_ref, format) = &pending[0];
                return Err(HubError::Conversion {
                    track: id.clone(),
                    message: format!("{} is {} and conversion is off", file_ref, format),
                });
            }
            let ids: IndexSet<String> = pending.iter().map(|p| p.1.clone()).collect();
            for (_, id, file_ref, format) in &pending {
                log::warn!("Skip {}: {} needs conversion from {}", id, file_ref, format);
            }
            design.remove_ids(&ids);
            report.skipped = ids.into_iter().collect();
            return Ok(report);
        }
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallel.max(1))
        .build()
        .map_err(std::io::Error::other)?;

    let results: Vec<(usize, String, Result<(PathBuf, String)>)> = pool.install(|| {
        pending
            .par_iter()
            .map(|(i, id, file_ref, format)| {
                log::info!("Converting {} ({})", file_ref, format);
                (*i, id.clone(), converter.convert(file_ref, format, id))
            })
            .collect()
    });

    let mut failed_ids = IndexSet::new();
    for (i, id, result) in results {
        match result {
            Ok((path, format)) => {
                design.records_mut()[i].set_file(&path.to_string_lossy(), &format);
                report.converted.push(id);
            }
            Err(e) => {
                if required {
                    return Err(match e {
                        HubError::Conversion { message, .. } => HubError::Conversion { track: id, message },
                        other => other,
                    });
                }
                log::error!("Drop track {}: {}", id, e);
                failed_ids.insert(id.clone());
                report.failed.push((id, e.to_string()));
            }
        }
    }
    design.remove_ids(&failed_ids);

    Ok(report)
}
