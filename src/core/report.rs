use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use tracing::info;

use crate::core::bucket::{BucketStore, Category};
use crate::core::catalog::{BucketGroup, UnmappedSighting};
use crate::utils::text::ordinal;
use crate::utils::BoxdResult;

pub const LIST_INDEX_LINE: &str = "<a href=https://letterboxd.com/bigbadraj/list/the-official-list-index/> Check out more of the lists I update regularly!</a>";

pub const ELIGIBILITY: [&str; 10] = [
    "Must have a minimum of 1,000 reviews on Letterboxd.",
    "Cannot be a short film (minimum 40 minutes).",
    "Cannot be a television miniseries.",
    "Cannot be a compilation of short serials.",
    "Cannot be a documentary.",
    "Cannot be a non-narrative project (paint drying for 10 hours, a timelapse of the construction of a building, abstract images, etc).",
    "Cannot be a recording of a live performance (stand-up specials, recordings of live theater, concert films, etc).",
    "Cannot be a television special episode, though feature film spin-offs from television shows are allowed.",
    "Feature film spin-offs from television shows must contain original material, not just recap or compilation of existing material.",
    "Entries that have scores inflated because they share a name with a popular television show are removed, as I notice them.",
];

pub const CLOSING_LINE: &str =
    "<strong>If you notice any movies you believe should/should not be included just let me know!</strong>";

/// One line of a Letterboxd import file, as read back.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ImportRow {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "tmdbID", default)]
    pub tmdb_id: String,
    #[serde(rename = "Link", default)]
    pub link: Option<String>,
}

/// File stem for a bucket: "South America" becomes "south_america".
pub fn bucket_stem(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

fn ensure_parent(path: &Path) -> BoxdResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write a bucket's members as import CSV, `chunk_size` rows per file. A
/// single chunk is written to `{stem}.csv`, several to `{stem}1.csv`,
/// `{stem}2.csv` and so on. Returns the written paths in order.
pub fn write_import_csv(
    bucket: &BucketStore,
    dir: &Path,
    stem: &str,
    chunk_size: usize,
    include_link: bool,
) -> BoxdResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<_> = bucket.members().chunks(chunk_size).collect();
    let numbered = chunks.len() > 1;

    let mut written = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.into_iter().enumerate() {
        let path = if numbered {
            dir.join(format!("{stem}{}.csv", i + 1))
        } else {
            dir.join(format!("{stem}.csv"))
        };

        let mut writer = csv::Writer::from_path(&path)?;
        if include_link {
            writer.write_record(["Title", "Year", "tmdbID", "Link"])?;
        } else {
            writer.write_record(["Title", "Year", "tmdbID"])?;
        }
        for record in chunk {
            let tmdb_id = record.tmdb_id.as_deref().unwrap_or("");
            if include_link {
                let link = record.source_url.as_deref().unwrap_or("");
                writer.write_record([record.title.as_str(), record.year.as_str(), tmdb_id, link])?;
            } else {
                writer.write_record([record.title.as_str(), record.year.as_str(), tmdb_id])?;
            }
        }
        writer.flush()?;
        written.push(path);
    }

    info!(target: "letterboxd_buckets::report", bucket = %bucket.name(), files = written.len(), rows = bucket.len(), "Import CSV written");
    Ok(written)
}

#[cfg(test)]
pub fn read_import_csv(path: &Path) -> BoxdResult<Vec<ImportRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// "March 3rd, 2025".
pub fn format_report_date(date: NaiveDate) -> String {
    format!("{} {}, {}", date.format("%B"), ordinal(date.day()), date.year())
}

/// The stats text for one bucket: heading, date, eligibility boilerplate,
/// then the ten most frequent values of every category.
pub fn render_stats(bucket: &BucketStore, heading: &str, date: NaiveDate) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "<strong>{heading}</strong>\n");
    let _ = writeln!(out, "<strong>Last updated: {}</strong>\n", format_report_date(date));
    let _ = writeln!(out, "{LIST_INDEX_LINE}\n");

    out.push_str("<strong>Film eligibility criteria:</strong>\n");
    for line in ELIGIBILITY {
        let _ = writeln!(out, "-- {line}");
    }
    out.push('\n');

    for category in Category::ALL {
        let _ = writeln!(out, "<strong>The ten most appearing {}:</strong>", category.label());
        for (value, count) in bucket.top(category, 10) {
            let _ = writeln!(out, "{value}: {count}");
        }
        out.push('\n');
    }
    out.push_str(CLOSING_LINE);
    out
}

pub fn write_stats(path: &Path, bucket: &BucketStore, heading: &str, date: NaiveDate) -> BoxdResult<()> {
    ensure_parent(path)?;
    fs::write(path, render_stats(bucket, heading, date))?;
    info!(target: "letterboxd_buckets::report", bucket = %bucket.name(), path = %path.display(), "Stats written");
    Ok(())
}

/// Append how many films each capped bucket would have held without its cap.
pub fn append_ceilings(
    path: &Path,
    run_label: &str,
    buckets: &[(BucketGroup, &BucketStore)],
    at: NaiveDateTime,
) -> BoxdResult<()> {
    let rule = "=".repeat(50);
    let mut out = String::new();
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "{} CEILING COUNTS - {}", run_label.to_uppercase(), at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{rule}\n");

    for group in [BucketGroup::Continent, BucketGroup::Mpaa, BucketGroup::Runtime] {
        let _ = writeln!(out, "{group} CEILINGS:");
        for (_, bucket) in buckets.iter().filter(|(g, _)| *g == group) {
            let _ = writeln!(out, "{}: {}", bucket.name(), bucket.ceiling());
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{rule}\n");

    ensure_parent(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    std::io::Write::write_all(&mut file, out.as_bytes())?;
    Ok(())
}

/// Countries with no continent mapping, each with the first film seen carrying it.
pub fn write_unmapped_countries(
    path: &Path,
    unmapped: &IndexMap<String, UnmappedSighting>,
) -> BoxdResult<()> {
    if unmapped.is_empty() {
        return Ok(());
    }
    let mut countries: Vec<_> = unmapped.iter().collect();
    countries.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::from("Countries found in movies that are not mapped to any continent:\n\n");
    for (country, seen) in countries {
        let _ = write!(out, "{country} (from: {} ({})", seen.title, seen.year);
        if let Some(url) = &seen.url {
            let _ = write!(out, " - {url}");
        }
        out.push_str(")\n");
    }

    ensure_parent(path)?;
    fs::write(path, out)?;
    Ok(())
}

/// One approve/reject decision made during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub title: String,
    pub year: String,
    pub url: Option<String>,
    /// `None` for approvals.
    pub reason: Option<String>,
}

/// Append decisions to a running log CSV, writing the header only when the
/// file is new or empty.
pub fn append_decisions(path: &Path, decisions: &[Decision], list_label: &str) -> BoxdResult<()> {
    ensure_parent(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if is_empty {
        writer.write_record(["Title", "Year", "Reason", "URL", "List"])?;
    }
    for d in decisions {
        writer.write_record([
            d.title.as_str(),
            d.year.as_str(),
            d.reason.as_deref().unwrap_or(""),
            d.url.as_deref().unwrap_or(""),
            list_label,
        ])?;
    }
    writer.flush()?;
    Ok(())
}
