use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::core::identity::{key_from_parts, IdentityKey, KeyScheme};
use crate::utils::BoxdResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Whitelist,
    Blacklist,
    ZeroReviews,
}

impl SheetKind {
    pub fn headers(&self) -> [&'static str; 4] {
        let value = match self {
            SheetKind::Whitelist => "Information",
            SheetKind::Blacklist => "Reason",
            SheetKind::ZeroReviews => "Blank",
        };
        ["Title", "Year", value, "Link"]
    }
}

/// One spreadsheet row: `Title, Year, <value>, Link`. The value column holds a
/// JSON payload (whitelist), a rejection reason (blacklist) or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideRow {
    pub title: String,
    pub year: String,
    pub value: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    /// The row has no identity under the sheet's key scheme.
    Skipped,
}

/// A spreadsheet-backed override list. Every write rewrites the whole file and
/// reloads it, so the in-memory index always mirrors what is on disk.
///
/// No file locking: only one process may use a given sheet at a time.
#[derive(Debug)]
pub struct OverrideSheet {
    path: PathBuf,
    kind: SheetKind,
    scheme: KeyScheme,
    rows: Vec<OverrideRow>,
    index: HashMap<IdentityKey, usize>,
}

impl OverrideSheet {
    /// Load `path`, creating an empty sheet with headers when it does not exist.
    pub fn load(path: impl AsRef<Path>, kind: SheetKind, scheme: KeyScheme) -> BoxdResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            info!(target: "letterboxd_buckets::overrides", path = %path.display(), "Sheet not found, creating an empty one");
            write_rows(&path, kind, &[])?;
        }
        let mut sheet = Self {
            path,
            kind,
            scheme,
            rows: Vec::new(),
            index: HashMap::new(),
        };
        sheet.reload()?;
        Ok(sheet)
    }

    fn reload(&mut self) -> BoxdResult<()> {
        self.rows = read_rows(&self.path)?;
        self.index = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| self.key_of(row).map(|k| (k, i)))
            .collect();
        debug!(target: "letterboxd_buckets::overrides", path = %self.path.display(), rows = self.rows.len(), indexed = self.index.len(), "Sheet loaded");
        Ok(())
    }

    fn persist(&mut self) -> BoxdResult<()> {
        write_rows(&self.path, self.kind, &self.rows)?;
        self.reload()
    }

    #[cfg(test)]
    pub fn scheme(&self) -> KeyScheme {
        self.scheme
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[OverrideRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn key_of(&self, row: &OverrideRow) -> Option<IdentityKey> {
        key_from_parts(self.scheme, &row.title, &row.year, row.link.as_deref())
    }

    pub fn is_listed(&self, key: &IdentityKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&OverrideRow> {
        self.index.get(key).map(|i| &self.rows[*i])
    }

    /// Insert `row`, or replace the value of the row sharing its key. A link
    /// already on file is never replaced by a missing one.
    pub fn upsert(&mut self, row: OverrideRow) -> BoxdResult<Upsert> {
        let Some(key) = self.key_of(&row) else {
            return Ok(Upsert::Skipped);
        };
        let outcome = match self.index.get(&key) {
            Some(&i) => {
                let existing = &mut self.rows[i];
                existing.value = row.value;
                if row.link.is_some() {
                    existing.link = row.link;
                }
                Upsert::Updated
            }
            None => {
                self.rows.push(row);
                Upsert::Inserted
            }
        };
        self.persist()?;
        Ok(outcome)
    }

    pub fn remove(&mut self, key: &IdentityKey) -> BoxdResult<bool> {
        let Some(&i) = self.index.get(key) else {
            return Ok(false);
        };
        self.rows.remove(i);
        self.persist()?;
        Ok(true)
    }
}

fn normalize_cell(s: &str) -> String {
    s.nfkc().collect::<String>().trim().to_string()
}

/// Render a cell as text. Whole floats lose their ".0" so a year typed into
/// the sheet as a number still reads back as "1995".
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => normalize_cell(s),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => normalize_cell(&other.to_string()),
    }
}

fn read_rows(path: &Path) -> BoxdResult<Vec<OverrideRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range?;

    let rows = range
        .rows()
        .skip(1)
        .map(|cells| {
            let text = |i: usize| cells.get(i).map(cell_text).unwrap_or_default();
            let link = text(3);
            OverrideRow {
                title: text(0),
                year: text(1),
                value: text(2),
                link: if link.is_empty() { None } else { Some(link) },
            }
        })
        .filter(|row| !(row.title.is_empty() && row.link.is_none()))
        .collect();
    Ok(rows)
}

fn write_rows(path: &Path, kind: SheetKind, rows: &[OverrideRow]) -> BoxdResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in kind.headers().iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let cells = [
            row.title.as_str(),
            row.year.as_str(),
            row.value.as_str(),
            row.link.as_deref().unwrap_or(""),
        ];
        for (col, value) in cells.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r, col as u16, *value)?;
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}
