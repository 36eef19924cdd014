//! Spreadsheet (CSV) job import

use crate::error::{CatalogError, Result};
use crate::types::{DateLabel, ItemError, ProcessingJob};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

/// Jobs read from a sheet plus the rows that could not become jobs
#[derive(Debug, Clone, Default)]
pub struct SheetImport {
    pub jobs: Vec<ProcessingJob>,
    /// Rows without an identifier or `image_url`
    pub skipped: usize,
    /// Rows that named a product but could not become a job: invalid
    /// identifier or URL, or a SKU already used by an earlier row
    pub rejected: Vec<ItemError>,
}

/// Column positions resolved from the header row
struct Columns {
    identifier: usize,
    image_url: usize,
    name: Option<usize>,
    date: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        let find = |names: &[&str]| names.iter().find_map(|n| index.get(*n).copied());

        let identifier = find(&["sku", "product_sku"])
            .ok_or_else(|| CatalogError::validation("Sheet has no 'sku' or 'product_sku' column"))?;
        let image_url = find(&["image_url"])
            .ok_or_else(|| CatalogError::validation("Sheet has no 'image_url' column"))?;
        Ok(Self {
            identifier,
            image_url,
            name: find(&["name", "product_name"]),
            date: find(&["date"]),
        })
    }
}

fn field(record: &csv::StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Parse CSV rows into remote jobs
///
/// Rows missing the identifier or URL are skipped, not reported. A bad
/// `date` cell drops the label but keeps the row. A row with a malformed URL,
/// an unusable identifier or a repeated SKU is rejected on its own; the rest
/// of the sheet still imports.
///
/// # Errors
/// - Missing required columns
/// - Unreadable CSV
pub fn import_jobs<R: Read>(reader: R, remove_background: bool) -> Result<SheetImport> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv
        .headers()
        .map_err(|e| CatalogError::validation(format!("Unreadable sheet header: {}", e)))?
        .clone();
    let columns = Columns::resolve(&headers)?;

    let mut import = SheetImport::default();
    let mut seen: HashSet<String> = HashSet::new();
    for (row, record) in csv.records().enumerate() {
        let record =
            record.map_err(|e| CatalogError::validation(format!("Unreadable sheet row: {}", e)))?;
        // Header is line 1.
        let line = row + 2;

        let (Some(identifier), Some(url)) = (
            field(&record, Some(columns.identifier)),
            field(&record, Some(columns.image_url)),
        ) else {
            log::warn!("Skipping sheet row {}: missing sku or image_url", line);
            import.skipped += 1;
            continue;
        };

        if seen.contains(identifier) {
            log::warn!("Rejecting sheet row {}: duplicate sku '{}'", line, identifier);
            import.rejected.push(ItemError {
                identifier: identifier.to_string(),
                message: format!("Duplicate sku on sheet row {}", line),
            });
            continue;
        }
        let mut job = match ProcessingJob::remote(identifier, url) {
            Ok(job) => job.with_background_removal(remove_background),
            Err(e) => {
                log::warn!("Rejecting sheet row {}: {}", line, e);
                import.rejected.push(ItemError {
                    identifier: identifier.to_string(),
                    message: e.to_string(),
                });
                continue;
            },
        };
        seen.insert(identifier.to_string());
        if let Some(name) = field(&record, columns.name) {
            job = job.with_product_name(name);
        }
        if let Some(date) = field(&record, columns.date) {
            match DateLabel::parse(date) {
                Ok(label) => job = job.with_date_label(label),
                Err(e) => log::warn!("Ignoring date on sheet row {}: {}", line, e),
            }
        }
        import.jobs.push(job);
    }

    log::info!(
        "Imported {} jobs from sheet ({} rows skipped, {} rejected)",
        import.jobs.len(),
        import.skipped,
        import.rejected.len()
    );
    Ok(import)
}

/// Read a sheet from disk
///
/// # Errors
/// - The file cannot be opened
/// - Any error from [`import_jobs`]
pub fn import_file<P: AsRef<Path>>(path: P, remove_background: bool) -> Result<SheetImport> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| CatalogError::file_io_error("open sheet", path, &e))?;
    import_jobs(file, remove_background)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobSource;

    #[test]
    fn test_headers_are_normalized() {
        let data = " Product_SKU ,IMAGE_URL, Product_Name ,Date\nA1,https://cdn.example.com/a1.jpg,Nike Dunk,04/12\n";
        let import = import_jobs(data.as_bytes(), true).unwrap();
        assert_eq!(import.jobs.len(), 1);
        let job = &import.jobs[0];
        assert_eq!(job.identifier(), "A1");
        assert!(job.remove_background());
        assert_eq!(job.decorations().product_name.as_deref(), Some("Nike Dunk"));
        assert_eq!(job.decorations().date_label.unwrap().month_text(), "APR");
        assert!(matches!(job.source(), JobSource::Remote { url } if url == "https://cdn.example.com/a1.jpg"));
    }

    #[test]
    fn test_row_missing_url_is_skipped_not_reported() {
        let data = "sku,image_url\nA1,https://cdn.example.com/a1.jpg\nA2,\n,https://cdn.example.com/x.jpg\n";
        let import = import_jobs(data.as_bytes(), false).unwrap();
        assert_eq!(import.jobs.len(), 1);
        assert_eq!(import.skipped, 2);
    }

    #[test]
    fn test_bad_date_keeps_row_without_label() {
        let data = "sku,image_url,date\nA1,https://cdn.example.com/a1.jpg,someday\n";
        let import = import_jobs(data.as_bytes(), false).unwrap();
        assert_eq!(import.jobs.len(), 1);
        assert!(import.jobs[0].decorations().date_label.is_none());
    }

    #[test]
    fn test_missing_required_column() {
        let err = import_jobs("name,image_url\nx,https://a/b.jpg\n".as_bytes(), false).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[test]
    fn test_bad_rows_are_rejected_individually() {
        let data = "\
sku,image_url
A1,ftp://host/a.jpg
A2/B,https://cdn.example.com/a2.jpg
A3,https://cdn.example.com/a3.jpg
A3,https://cdn.example.com/a3-alt.jpg
A4,https://cdn.example.com/a4.jpg
";
        let import = import_jobs(data.as_bytes(), false).unwrap();
        let ids: Vec<&str> = import.jobs.iter().map(ProcessingJob::identifier).collect();
        assert_eq!(ids, vec!["A3", "A4"]);
        assert_eq!(import.skipped, 0);

        let rejected: Vec<&str> = import.rejected.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(rejected, vec!["A1", "A2/B", "A3"]);
        assert!(import.rejected[2].message.contains("row 5"));
        // The first A3 row wins
        assert!(matches!(import.jobs[0].source(), JobSource::Remote { url } if url.ends_with("a3.jpg")));
    }
}
