use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;

/// Options shared by every matching mode: the two workbooks, the columns and
/// row ranges to scan, and where the result is written.
#[derive(Args, Debug, Clone)]
pub struct SheetArgs {
    /// Destination document (updated in place unless -o is given)
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,

    /// Source document (opened read-only)
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Output document; bare -o writes <dest>_new.<ext> (default: overwrite the destination)
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub output: Option<PathBuf>,

    /// Column in the destination document used to match the content
    #[arg(long = "dest-match", value_name = "COL", default_value = "B")]
    pub dest_match: String,

    /// Column in the source document used to match the content
    #[arg(long = "source-match", value_name = "COL", default_value = "W")]
    pub source_match: String,

    /// Column in the destination document which will be populated
    #[arg(long = "dest-column", value_name = "COL", default_value = "G")]
    pub dest_column: String,

    /// Column in the source document used as the source of data
    #[arg(long = "source-column", value_name = "COL", default_value = "AE")]
    pub source_column: String,

    /// Min row in the destination document
    #[arg(long = "dest-min-row", value_name = "N", default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub dest_min_row: u32,

    /// Min row in the source document
    #[arg(long = "source-min-row", value_name = "N", default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub source_min_row: u32,

    /// Max row in the destination document (-1: actual max row)
    #[arg(long = "dest-max-row", value_name = "N", default_value_t = -1, allow_hyphen_values = true)]
    pub dest_max_row: i64,

    /// Max row in the source document (-1: actual max row)
    #[arg(long = "source-max-row", value_name = "N", default_value_t = -1, allow_hyphen_values = true)]
    pub source_max_row: i64,

    /// Do not backup the destination document
    #[arg(short = 'n', long = "no-backup")]
    pub no_backup: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    General,
    Info,
    Error,
}

pub fn fancy_message(kind: MessageKind, message: &str) -> String {
    let prefix = match kind {
        MessageKind::General => "[*] ",
        MessageKind::Info => "[i] ",
        MessageKind::Error => "[!] ",
    };
    format!("{prefix}{message}")
}

pub fn info(message: &str) {
    println!("{}", fancy_message(MessageKind::Info, message));
}

/// Per-row progress notifications emitted while scanning a document. The
/// matching logic never depends on what a sink does with them.
pub trait ProgressSink {
    fn row_update(&mut self, message: &str);
}

/// Writes carriage-return progress lines to stdout, overwriting in place.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn row_update(&mut self, message: &str) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "{message}\r");
        let _ = out.flush();
    }
}

/// Converts Excel column letters to a 1-based column number.
pub fn column_number(token: &str) -> Result<u32> {
    let trimmed = token.trim();
    if trimmed.is_empty()
        || trimmed.len() > 3
        || !trimmed.chars().all(|c| c.is_ascii_alphabetic())
    {
        bail!("'{}' is not a valid column reference", token);
    }
    let mut value = 0u32;
    for ch in trimmed.chars() {
        let letter = ch.to_ascii_uppercase() as u8;
        value = value * 26 + u32::from(letter - b'A') + 1;
    }
    Ok(value)
}

/// Derives a sibling file name with a suffix before the extension, e.g.
/// `report.xlsx` + `old` -> `report_old.xlsx`.
pub fn derive_file_name(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(name)
}

/// Resolves where the updated destination document is written: an explicit
/// path wins, a bare -o derives `<dest>_new.<ext>`, otherwise the
/// destination itself is overwritten.
pub fn resolve_output(dest: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        None => dest.to_path_buf(),
        Some(path) if path.as_os_str().is_empty() => derive_file_name(dest, "new"),
        Some(path) => path.to_path_buf(),
    }
}

/// Copies the untouched destination to `<name>_old.<ext>` before an
/// in-place overwrite.
pub fn backup_original(dest: &Path) -> Result<PathBuf> {
    let backup = derive_file_name(dest, "old");
    fs::copy(dest, &backup)
        .with_context(|| format!("failed to back up {} to {}", dest.display(), backup.display()))?;
    Ok(backup)
}

/// Resolves a configured max-row bound: -1 means the sheet's actual last
/// row, anything else must be a 1-based row number.
pub fn resolve_row_bound(requested: i64, actual: u32) -> Result<u32> {
    if requested == -1 {
        return Ok(actual);
    }
    if requested < 1 {
        bail!("row bound {} is not a 1-based row number", requested);
    }
    u32::try_from(requested).with_context(|| format!("row bound {requested} out of range"))
}

pub fn is_valid_color(rgb: &str) -> bool {
    rgb.len() == 6 && rgb.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_convert_to_numbers() {
        assert_eq!(column_number("A").unwrap(), 1);
        assert_eq!(column_number("Z").unwrap(), 26);
        assert_eq!(column_number("AA").unwrap(), 27);
        assert_eq!(column_number("AE").unwrap(), 31);
    }

    #[test]
    fn column_letters_fold_case() {
        assert_eq!(column_number("b").unwrap(), 2);
        assert_eq!(column_number("ae").unwrap(), 31);
    }

    #[test]
    fn reject_invalid_column_references() {
        assert!(column_number("").is_err());
        assert!(column_number("A1").is_err());
        assert!(column_number("-").is_err());
        assert!(column_number("ABCD").is_err());
    }

    #[test]
    fn derive_file_name_inserts_suffix_before_extension() {
        assert_eq!(
            derive_file_name(Path::new("report.xlsx"), "old"),
            PathBuf::from("report_old.xlsx")
        );
        assert_eq!(
            derive_file_name(Path::new("data/report.xlsx"), "new"),
            PathBuf::from("data/report_new.xlsx")
        );
    }

    #[test]
    fn derive_file_name_without_extension_appends() {
        assert_eq!(
            derive_file_name(Path::new("report"), "old"),
            PathBuf::from("report_old")
        );
    }

    #[test]
    fn output_defaults_to_overwriting_the_destination() {
        let dest = Path::new("report.xlsx");
        assert_eq!(resolve_output(dest, None), PathBuf::from("report.xlsx"));
        assert_eq!(
            resolve_output(dest, Some(Path::new(""))),
            PathBuf::from("report_new.xlsx")
        );
        assert_eq!(
            resolve_output(dest, Some(Path::new("out.xlsx"))),
            PathBuf::from("out.xlsx")
        );
    }

    #[test]
    fn max_row_bound_resolution() {
        assert_eq!(resolve_row_bound(-1, 40).unwrap(), 40);
        assert_eq!(resolve_row_bound(5, 40).unwrap(), 5);
        assert!(resolve_row_bound(0, 40).is_err());
        assert!(resolve_row_bound(-2, 40).is_err());
    }

    #[test]
    fn color_validation() {
        assert!(is_valid_color("FFFF00"));
        assert!(is_valid_color("90ee90"));
        assert!(!is_valid_color("FFFF0"));
        assert!(!is_valid_color("FFFF000"));
        assert!(!is_valid_color("GGGGGG"));
        assert!(!is_valid_color(""));
    }
}
