use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use chrono::NaiveTime;
use umya_spreadsheet::{Spreadsheet, Worksheet, reader, writer};

/// A cell value copied verbatim from the source document.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    Int(i64),
    Number(f64),
    Bool(bool),
}

impl Payload {
    fn from_data(data: &Data) -> Payload {
        match data {
            Data::Empty => Payload::Empty,
            Data::String(s) => Payload::Text(s.clone()),
            Data::Int(i) => Payload::Int(*i),
            Data::Float(f) => Payload::Number(*f),
            Data::Bool(b) => Payload::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(datetime) if datetime.time() == NaiveTime::MIN => {
                    Payload::Text(datetime.date().to_string())
                }
                Some(datetime) => Payload::Text(datetime.to_string()),
                None => Payload::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) => Payload::Text(s.clone()),
            Data::DurationIso(s) => Payload::Text(s.clone()),
            Data::Error(err) => Payload::Text(format!("#ERROR:{err:?}")),
        }
    }

    /// Text form of the payload. The written cell and the idempotence
    /// comparison both go through this, so they always agree.
    pub fn render(&self) -> String {
        match self {
            Payload::Empty => String::new(),
            Payload::Text(s) => s.clone(),
            Payload::Int(i) => i.to_string(),
            Payload::Number(f) => format_float(*f),
            Payload::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// The source document: first worksheet, loaded once, read-only.
pub struct SourceSheet {
    range: Range<Data>,
}

impl SourceSheet {
    pub fn open(path: &Path) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("failed to open workbook {}", path.display()))?;
        let name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("workbook {} contains no sheets", path.display()))?;
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| anyhow!("failed loading sheet '{}': {}", name, e))?;
        Ok(SourceSheet { range })
    }

    #[cfg(test)]
    pub fn from_range(range: Range<Data>) -> Self {
        SourceSheet { range }
    }

    /// 1-based number of the last row holding data; 0 for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.range.end().map(|(row, _)| row + 1).unwrap_or(0)
    }

    fn cell(&self, column: u32, row: u32) -> Option<&Data> {
        if column == 0 || row == 0 {
            return None;
        }
        self.range.get_value((row - 1, column - 1))
    }

    /// Cell text at a 1-based (column, row), `None` when the cell is absent
    /// or empty.
    pub fn raw_text(&self, column: u32, row: u32) -> Option<String> {
        match self.cell(column, row) {
            None | Some(Data::Empty) => None,
            Some(data) => Some(Payload::from_data(data).render()),
        }
    }

    pub fn payload(&self, column: u32, row: u32) -> Payload {
        self.cell(column, row)
            .map(Payload::from_data)
            .unwrap_or(Payload::Empty)
    }
}

/// The destination document: first worksheet of an xlsx workbook, mutated
/// cell by cell and saved at the end. Formatting of untouched cells is
/// preserved across the read/save round trip.
pub struct DestSheet {
    book: Spreadsheet,
}

impl DestSheet {
    pub fn open(path: &Path) -> Result<Self> {
        let book = reader::xlsx::read(path)
            .map_err(|e| anyhow!("failed to open workbook {}: {}", path.display(), e))?;
        if book.get_sheet(&0).is_none() {
            bail!("workbook {} contains no sheets", path.display());
        }
        Ok(DestSheet { book })
    }

    #[cfg(test)]
    pub fn from_book(book: Spreadsheet) -> Self {
        DestSheet { book }
    }

    fn sheet(&self) -> Option<&Worksheet> {
        self.book.get_sheet(&0)
    }

    fn sheet_mut(&mut self) -> Result<&mut Worksheet> {
        self.book
            .get_sheet_mut(&0)
            .ok_or_else(|| anyhow!("destination workbook has no sheets"))
    }

    /// 1-based number of the last row holding data; 0 for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.sheet().map(|ws| ws.get_highest_row()).unwrap_or(0)
    }

    /// Current cell text at a 1-based (column, row); empty string when the
    /// cell is absent.
    pub fn value_at(&self, column: u32, row: u32) -> String {
        self.sheet()
            .map(|ws| ws.get_value((column, row)))
            .unwrap_or_default()
    }

    /// Cell text for key extraction, `None` when the cell is absent.
    pub fn raw_text(&self, column: u32, row: u32) -> Option<String> {
        self.sheet()?
            .get_cell((column, row))
            .map(|cell| cell.get_value().to_string())
    }

    pub fn write_value(&mut self, column: u32, row: u32, payload: &Payload) -> Result<()> {
        self.sheet_mut()?
            .get_cell_mut((column, row))
            .set_value(payload.render());
        Ok(())
    }

    /// Applies a solid background fill to a cell. `rgb` is a 6-hex-digit
    /// color; full alpha is added on write.
    pub fn tag(&mut self, column: u32, row: u32, rgb: &str) -> Result<()> {
        self.sheet_mut()?
            .get_style_mut((column, row))
            .set_background_color(format!("FF{}", rgb.to_ascii_uppercase()));
        Ok(())
    }

    /// ARGB fill of a cell, if any. Used to audit tagging.
    pub fn fill_color(&self, column: u32, row: u32) -> Option<String> {
        self.sheet()?
            .get_cell((column, row))?
            .get_style()
            .get_fill()?
            .get_pattern_fill()?
            .get_foreground_color()
            .map(|color| color.get_argb().to_string())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        writer::xlsx::write(&self.book, path)
            .map_err(|e| anyhow!("failed to save workbook {}: {}", path.display(), e))
    }
}
