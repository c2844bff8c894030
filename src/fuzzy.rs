use anyhow::Result;
use clap::Args;

use crate::common::{
    ConsoleProgress, SheetArgs, backup_original, column_number, info, resolve_output,
    resolve_row_bound,
};
use crate::index::build_index;
use crate::reconcile::{MatchPolicy, reconcile};
use crate::score::Comparator;
use crate::workbook::{DestSheet, SourceSheet};

#[derive(Args, Debug)]
pub struct FuzzyArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    /// Minimum score that will be considered a match
    #[arg(short = 't', long = "threshold", value_name = "SCORE", default_value_t = 90, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub threshold: u32,

    /// Use weighted ratio instead of simple ratio for calculating scores
    #[arg(short = 'w', long = "weighted")]
    pub weighted: bool,
}

pub fn run(args: FuzzyArgs) -> Result<()> {
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

    info(&format!(
        "Minimum score that will be considered a match: {}.",
        args.threshold
    ));
    if args.weighted {
        info("Using weighted ratio to calculate scores.");
    } else {
        info("Using simple ratio to calculate scores.");
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

    // The fuzzy tier tolerates case differences itself, so index keys keep
    // their original case.
    let index = build_index(
        &source,
        source_match,
        source_column,
        sheet.source_min_row,
        source_max,
        false,
        &mut progress,
    );
    info("Source document: all rows read successfully");

    let comparator = if args.weighted {
        Comparator::Weighted
    } else {
        Comparator::Simple
    };
    let policy = MatchPolicy::Fuzzy {
        threshold: args.threshold,
        comparator,
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
            no_backup: true,
        }
    }

    #[test]
    fn end_to_end_fuzzy_run_updates_the_output_document() {
        let dir = tempfile::tempdir().unwrap();
        let dest_path = dir.path().join("dest.xlsx");
        let source_path = dir.path().join("source.xlsx");
        let out_path = dir.path().join("out.xlsx");

        let mut source = DestSheet::from_book(umya_spreadsheet::new_file());
        source.write_value(1, 2, &Payload::Text("Widget A".into())).unwrap();
        source.write_value(2, 2, &Payload::Number(100.0)).unwrap();
        source.write_value(1, 3, &Payload::Text("Widget B".into())).unwrap();
        source.write_value(2, 3, &Payload::Number(200.0)).unwrap();
        source.save(&source_path).unwrap();

        let mut dest = DestSheet::from_book(umya_spreadsheet::new_file());
        dest.write_value(1, 2, &Payload::Text("widget a".into())).unwrap();
        dest.write_value(1, 3, &Payload::Text("Widget B".into())).unwrap();
        dest.save(&dest_path).unwrap();

        let mut args_sheet = sheet_args(dest_path.clone(), source_path);
        args_sheet.output = Some(out_path.clone());
        run(FuzzyArgs {
            sheet: args_sheet,
            threshold: 90,
            weighted: false,
        })
        .unwrap();

        let updated = DestSheet::open(&out_path).unwrap();
        // case mismatch resolved by the fuzzy tier at full score
        assert_eq!(updated.value_at(3, 2), "100");
        assert_eq!(updated.fill_color(3, 2).as_deref(), Some("FFFCE883"));
        // verbatim key resolved by the literal tier
        assert_eq!(updated.value_at(3, 3), "200");
        assert_eq!(updated.fill_color(3, 3).as_deref(), Some("FF90EE90"));

        // the original destination document is untouched
        let original = DestSheet::open(&dest_path).unwrap();
        assert_eq!(original.value_at(3, 2), "");
    }

    #[test]
    fn rejects_invalid_column_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut args_sheet = sheet_args(dir.path().join("d.xlsx"), dir.path().join("s.xlsx"));
        args_sheet.dest_match = "A1".into();
        let result = run(FuzzyArgs {
            sheet: args_sheet,
            threshold: 90,
            weighted: false,
        });
        assert!(result.is_err());
    }
}
