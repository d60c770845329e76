use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Open `input` for buffered reading. `stdin` reads standard input and
/// `.gz` files are decompressed on the fly.
///
/// ```
/// use std::io::BufRead;
/// let reader = hubr::reader("tests/hubr/design.tsv").unwrap();
/// assert_eq!(reader.lines().count(), 4);
/// ```
pub fn reader(input: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = Path::new(input);
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("could not open {}: {}", path.display(), e))?;

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    Ok(reader)
}

pub fn writer(output: &str) -> anyhow::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        let file = std::fs::File::create(output)
            .map_err(|e| anyhow::anyhow!("could not create {}: {}", output, e))?;
        Box::new(BufWriter::new(file))
    };

    Ok(writer)
}

/// `$HOME/bin/<tool>` if it exists, the second place UCSC binaries are
/// usually dropped into.
pub fn home_bin(tool: &str) -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let path = Path::new(&home).join("bin").join(tool);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// Locate an executable in `PATH`, then in `~/bin`.
pub fn find_tool(tool: &str) -> Option<PathBuf> {
    which::which(tool).ok().or_else(|| home_bin(tool))
}

/// `true` for `http://`, `https://` and `ftp://` references.
pub fn is_url(file_ref: &str) -> bool {
    lazy_static::lazy_static! {
        static ref RE_URL: regex::Regex = regex::Regex::new(r"^(?i)(https?|ftp)://").unwrap();
    }
    RE_URL.is_match(file_ref)
}
