//! Directory scanning and the catalog ETL loop.

pub mod change_detection;
pub mod discovery;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::catalog::RecordBatch;
use crate::db::Database;
use crate::metadata;
use crate::reconcile::{build_record, FileInfo};

pub use change_detection::{effective_mtime, needs_reprocessing};
pub use discovery::discover_images;

/// Outcome of one catalog run.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Image files found under the directory.
    pub total_found: usize,
    /// Files that were extracted and upserted.
    pub processed: usize,
    /// Files skipped because their watermark matched.
    pub skipped: usize,
    /// Files that could not be read at all.
    pub errors: usize,
    /// Batches whose upsert transaction failed.
    pub failed_batches: usize,
}

pub struct Scanner {
    config: Config,
}

impl Scanner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Walk a directory tree and bring the catalog up to date with it.
    ///
    /// Watermarks are fetched once up front; each image is compared against
    /// them and only new or changed files go through extraction. Records are
    /// flushed in batches so memory stays bounded on large archives.
    pub fn scan_directory(&self, directory: &Path, db: &Database, refresh: bool) -> Result<ScanSummary> {
        let watermarks = if refresh {
            info!("full refresh requested, ignoring existing watermarks");
            Default::default()
        } else {
            db.catalog_watermarks()?
        };

        // The catalog is keyed by absolute path; resolve the directory once
        // so relative invocations and aliases like `dir/.` hit the same keys.
        let directory = directory
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", directory.display()))?;

        info!(directory = %directory.display(), "scanning directory");
        let image_paths = discover_images(&directory, &self.config.scanner.image_extensions)?;

        let mut summary = ScanSummary {
            total_found: image_paths.len(),
            ..Default::default()
        };
        let mut batch = RecordBatch::new(self.config.scanner.batch_size);

        for (index, path) in image_paths.iter().enumerate() {
            if (index + 1) % 1000 == 0 {
                info!(scanned = index + 1, "scan progress");
            }

            let mtime = match effective_mtime(path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat file, skipping");
                    summary.errors += 1;
                    continue;
                }
            };

            let filepath = path.to_string_lossy().to_string();
            if !needs_reprocessing(&filepath, mtime, &watermarks, refresh) {
                summary.skipped += 1;
                continue;
            }

            let sources = match metadata::extract_sources(path) {
                Ok(s) => s,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "extraction failed, skipping");
                    summary.errors += 1;
                    continue;
                }
            };

            let file_size = std::fs::metadata(path).map(|m| m.len() as i64).unwrap_or(0);
            let file = FileInfo::from_path(path, file_size, mtime);
            summary.processed += 1;
            if summary.processed % 100 == 0 {
                info!(processed = summary.processed, file = %file.stem, "processing changed image");
            }

            if batch.push(build_record(&file, &sources)) {
                flush(db, &mut batch, &mut summary);
            }
        }

        if !batch.is_empty() {
            flush(db, &mut batch, &mut summary);
        }

        info!(
            total = summary.total_found,
            processed = summary.processed,
            skipped = summary.skipped,
            errors = summary.errors,
            failed_batches = summary.failed_batches,
            "scan finished"
        );
        Ok(summary)
    }
}

/// Flush one batch. A failed transaction is reported and counted; the scan
/// carries on with the next batch, and the affected images keep their old
/// watermarks so the next run retries them.
fn flush(db: &Database, batch: &mut RecordBatch, summary: &mut ScanSummary) {
    let records = batch.drain();
    if let Err(e) = db.upsert_catalog(&records) {
        error!(count = records.len(), error = %e, "batch upsert failed");
        summary.failed_batches += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn test_config() -> Config {
        Config {
            scanner: crate::config::ScannerConfig {
                batch_size: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn write_png(path: &std::path::Path) {
        // Not a decodable image; extraction degrades to file attributes only.
        let mut f = File::create(path).unwrap();
        f.write_all(b"\x89PNG\r\n\x1a\nstub").unwrap();
    }

    #[test]
    fn scan_catalogs_new_files_and_skips_unchanged() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("a.png"));
        write_png(&dir.path().join("b.png"));

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let scanner = Scanner::new(test_config());

        let summary = scanner.scan_directory(dir.path(), &db, false).unwrap();
        assert_eq!(summary.total_found, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 0);

        // Second run finds the same watermarks and touches nothing.
        let summary = scanner.scan_directory(dir.path(), &db, false).unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 2);

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM catalogdata", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn path_aliases_share_watermarks() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("a.png"));

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let scanner = Scanner::new(test_config());

        scanner.scan_directory(dir.path(), &db, false).unwrap();

        // A different spelling of the same directory must hit the same
        // catalog keys, not re-extract and duplicate rows.
        let alias = dir.path().join(".");
        let summary = scanner.scan_directory(&alias, &db, false).unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 1);

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM catalogdata", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn refresh_reprocesses_everything() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("a.png"));

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let scanner = Scanner::new(test_config());

        scanner.scan_directory(dir.path(), &db, false).unwrap();
        let summary = scanner.scan_directory(dir.path(), &db, true).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn batch_boundary_is_respected() {
        let dir = tempdir().unwrap();
        for i in 0..3 {
            write_png(&dir.path().join(format!("img{i}.png")));
        }

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        // batch_size 2: one mid-run flush plus the final partial flush.
        let scanner = Scanner::new(test_config());

        let summary = scanner.scan_directory(dir.path(), &db, false).unwrap();
        assert_eq!(summary.processed, 3);

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM catalogdata", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
