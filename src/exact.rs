use anyhow::{Result, bail};
use clap::Args;

use crate::common::{
    ConsoleProgress, SheetArgs, backup_original, column_number, info, is_valid_color,
    resolve_output, resolve_row_bound,
};
use crate::index::build_index;
use crate::reconcile::{MatchPolicy, reconcile};
use crate::workbook::{DestSheet, SourceSheet};

#[derive(Args, Debug)]
pub struct ExactArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    /// Ignore case and surrounding spaces when matching
    #[arg(short = 'i', long = "ignore-case")]
    pub ignore_case: bool,

    /// Highlight changed cells with the given RGB color (bare -c: FFFF00)
    #[arg(
        short = 'c',
        long = "color-highlight",
        value_name = "RGB",
        num_args = 0..=1,
        default_missing_value = "FFFF00"
    )]
    pub color_highlight: Option<String>,
}

pub fn run(args: ExactArgs) -> Result<()> {
    // Validated before anything is opened or copied: a bad color is a
    // configuration error, not a per-row one.
    let highlight = match args.color_highlight.as_deref() {
        Some(rgb) => {
            let rgb = rgb.trim();
            if !is_valid_color(rgb) {
                bail!("{} is not a valid RGB color", rgb);
            }
            Some(rgb.to_ascii_uppercase())
        }
        None => None,
    };

    let sheet = &args.sheet;
    let dest_match = column_number(&sheet.dest_match)?;
    let dest_column = column_number(&sheet.dest_column)?;
    let source_match = column_number(&sheet.source_match)?;
    let source_column = column_number(&sheet.source_column)?;

    let output = resolve_output(&sheet.dest, sheet.output.as_deref());
    if output == sheet.dest && !sheet.no_backup {
        backup_original(&sheet.dest)?;
    }

    let source = SourceSheet::open(&sheet.source)?;
    let mut dest = DestSheet::open(&sheet.dest)?;

    match &highlight {
        Some(rgb) => info(&format!("Changed cells will be highlighted, color: {rgb}.")),
        None => info("Changed cells will NOT be highlighted."),
    }
    if args.ignore_case {
        info("Case-insensitive match requested.");
    } else {
        info("Case-sensitive match requested.");
    }

    let source_max = resolve_row_bound(sheet.source_max_row, source.max_row())?;
    info(&format!(
        "Source document: using rows {} to {}",
        sheet.source_min_row, source_max
    ));
    let dest_max = resolve_row_bound(sheet.dest_max_row, dest.max_row())?;
    info(&format!(
        "Destination document: using rows {} to {}",
        sheet.dest_min_row, dest_max
    ));

    let mut progress = ConsoleProgress;

    // Both sides fold identically, so the index is built with the same
    // normalization the reconciler applies to destination keys.
    let index = build_index(
        &source,
        source_match,
        source_column,
        sheet.source_min_row,
        source_max,
        args.ignore_case,
        &mut progress,
    );
    info("Source document: all rows processed successfully");

    let policy = MatchPolicy::Exact {
        fold_case: args.ignore_case,
        highlight,
    };
    let stats = reconcile(
        &mut dest,
        dest_match,
        dest_column,
        sheet.dest_min_row,
        dest_max,
        &index,
        &policy,
        &mut progress,
    )?;
    info(&format!(
        "Destination document: all rows updated successfully ({} cells changed)",
        stats.updates()
    ));

    info(&format!("Saving file: {}", output.display()));
    dest.save(&output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::workbook::Payload;

    use super::*;

    fn sheet_args(dest: std::path::PathBuf, source: std::path::PathBuf) -> SheetArgs {
        SheetArgs {
            dest,
            source,
            output: None,
            dest_match: "A".into(),
            source_match: "A".into(),
            dest_column: "C".into(),
            source_column: "B".into(),
            dest_min_row: 2,
            source_min_row: 2,
            dest_max_row: -1,
            source_max_row: -1,
            no_backup: false,
        }
    }

    #[test]
    fn end_to_end_in_place_run_backs_up_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let dest_path = dir.path().join("dest.xlsx");
        let source_path = dir.path().join("source.xlsx");

        let mut source = DestSheet::from_book(umya_spreadsheet::new_file());
        source.write_value(1, 2, &Payload::Text("Widget A".into())).unwrap();
        source.write_value(2, 2, &Payload::Number(100.0)).unwrap();
        source.save(&source_path).unwrap();

        let mut dest = DestSheet::from_book(umya_spreadsheet::new_file());
        dest.write_value(1, 2, &Payload::Text("  widget a ".into())).unwrap();
        dest.save(&dest_path).unwrap();

        run(ExactArgs {
            sheet: sheet_args(dest_path.clone(), source_path),
            ignore_case: true,
            color_highlight: Some("ffff00".into()),
        })
        .unwrap();

        let updated = DestSheet::open(&dest_path).unwrap();
        assert_eq!(updated.value_at(3, 2), "100");
        assert_eq!(updated.fill_color(3, 2).as_deref(), Some("FFFFFF00"));

        // in-place overwrite leaves a backup of the untouched original
        let backup = DestSheet::open(&dir.path().join("dest_old.xlsx")).unwrap();
        assert_eq!(backup.value_at(3, 2), "");
    }

    #[test]
    fn case_sensitive_run_skips_differently_cased_keys() {
        let dir = tempfile::tempdir().unwrap();
        let dest_path = dir.path().join("dest.xlsx");
        let source_path = dir.path().join("source.xlsx");

        let mut source = DestSheet::from_book(umya_spreadsheet::new_file());
        source.write_value(1, 2, &Payload::Text("Widget A".into())).unwrap();
        source.write_value(2, 2, &Payload::Number(100.0)).unwrap();
        source.save(&source_path).unwrap();

        let mut dest = DestSheet::from_book(umya_spreadsheet::new_file());
        dest.write_value(1, 2, &Payload::Text("widget a".into())).unwrap();
        dest.save(&dest_path).unwrap();

        let mut args_sheet = sheet_args(dest_path.clone(), source_path);
        args_sheet.no_backup = true;
        run(ExactArgs {
            sheet: args_sheet,
            ignore_case: false,
            color_highlight: None,
        })
        .unwrap();

        let updated = DestSheet::open(&dest_path).unwrap();
        assert_eq!(updated.value_at(3, 2), "");
        assert_eq!(updated.fill_color(3, 2), None);
    }

    #[test]
    fn invalid_highlight_color_is_fatal_before_any_io() {
        let args = ExactArgs {
            sheet: sheet_args("missing_dest.xlsx".into(), "missing_source.xlsx".into()),
            ignore_case: false,
            color_highlight: Some("XYZ123".into()),
        };
        assert!(run(args).is_err());
    }
}
