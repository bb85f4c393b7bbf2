//! Gallery synchronization.
//!
//! Publishes metadata for images in the "done" directory, pairing each file
//! with the URLs recorded by the upload step. A general sync only adds
//! images the gallery does not know yet, so manual edits to existing rows
//! are preserved; a refresh or an explicit file list forces re-extraction.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{Database, GalleryRecord};
use crate::metadata;
use crate::reconcile::{build_record, FileInfo};
use crate::scanner::effective_mtime;

/// Published URLs for one uploaded image, keyed by its full filename in
/// photo_urls.json.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUrls {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub thumbnail: String,
}

/// Outcome of one gallery sync.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub processed: usize,
    pub skipped_existing: usize,
    pub missing_urls: usize,
}

pub struct GallerySync {
    config: Config,
}

impl GallerySync {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Sync the gallery table from the done directory.
    ///
    /// With `specific_files` set, exactly those files are processed and
    /// upserted regardless of existing rows. Otherwise every image in the
    /// directory is considered, skipping ones already in the gallery unless
    /// `refresh` is set.
    pub fn sync(&self, db: &Database, refresh: bool, specific_files: &[String]) -> Result<SyncSummary> {
        let done_dir = &self.config.gallery.done_dir;
        let url_mapping = self.load_url_mapping()?;

        let existing: Vec<String> = if specific_files.is_empty() && !refresh {
            db.gallery_filenames()?
        } else {
            if refresh {
                info!("full refresh requested, re-processing all published images");
            }
            Vec::new()
        };

        let candidates = if specific_files.is_empty() {
            self.published_images(done_dir)?
        } else {
            specific_files
                .iter()
                .map(|f| done_dir.join(f))
                .filter(|p| p.exists())
                .collect()
        };

        let mut summary = SyncSummary::default();
        let mut records = Vec::new();

        for path in candidates {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            if specific_files.is_empty() && !refresh && existing.contains(&stem) {
                summary.skipped_existing += 1;
                continue;
            }

            let Some(urls) = url_mapping.get(&filename) else {
                warn!(
                    file = %filename,
                    "published image has no URL mapping, it may need re-uploading"
                );
                summary.missing_urls += 1;
                continue;
            };

            info!(file = %filename, "processing published image");
            let sources = match metadata::extract_sources(&path) {
                Ok(s) => s,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "extraction failed, skipping");
                    continue;
                }
            };

            let file_size = std::fs::metadata(&path).map(|m| m.len() as i64).unwrap_or(0);
            let mtime = effective_mtime(&path).unwrap_or(0.0);
            let file = FileInfo::from_path(&path, file_size, mtime);
            let canonical = build_record(&file, &sources);
            records.push(GalleryRecord::from_canonical(
                &canonical,
                &urls.original,
                &urls.thumbnail,
            ));
            summary.processed += 1;
        }

        if records.is_empty() {
            info!("no gallery rows to update");
        } else {
            db.upsert_gallery(&records)?;
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped_existing,
            missing_urls = summary.missing_urls,
            "gallery sync finished"
        );
        Ok(summary)
    }

    fn load_url_mapping(&self) -> Result<HashMap<String, PhotoUrls>> {
        let path = self.config.gallery.url_mapping_file();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read URL mapping {}", path.display()))?;
        let mapping = serde_json::from_str(&content)
            .with_context(|| format!("invalid URL mapping {}", path.display()))?;
        Ok(mapping)
    }

    /// Image files directly inside the done directory. Non-recursive; the
    /// upload step flattens everything into one folder.
    fn published_images(&self, done_dir: &Path) -> Result<Vec<PathBuf>> {
        let extensions = &self.config.scanner.image_extensions;
        let mut files = Vec::new();
        for entry in std::fs::read_dir(done_dir)
            .with_context(|| format!("cannot read {}", done_dir.display()))?
        {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GalleryConfig;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn setup(dir: &Path, mapping: &str) -> Config {
        fs::write(dir.join("photo_urls.json"), mapping).unwrap();
        Config {
            gallery: GalleryConfig {
                done_dir: dir.to_path_buf(),
                url_mapping: None,
            },
            ..Default::default()
        }
    }

    fn write_image(path: &Path) {
        let mut f = File::create(path).unwrap();
        f.write_all(b"\x89PNG\r\n\x1a\nstub").unwrap();
    }

    #[test]
    fn sync_adds_mapped_images_and_warns_on_unmapped() {
        let dir = tempdir().unwrap();
        write_image(&dir.path().join("sunset.png"));
        write_image(&dir.path().join("orphan.png"));
        let config = setup(
            dir.path(),
            r#"{"sunset.png": {"original": "https://cdn/o.png", "thumbnail": "https://cdn/t.png"}}"#,
        );

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let summary = GallerySync::new(config).sync(&db, false, &[]).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.missing_urls, 1);

        let (title, url): (String, String) = db
            .conn()
            .query_row(
                "SELECT title, original_url FROM gallery WHERE filename = 'sunset'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(title, "sunset");
        assert_eq!(url, "https://cdn/o.png");
    }

    #[test]
    fn general_sync_skips_existing_rows() {
        let dir = tempdir().unwrap();
        write_image(&dir.path().join("sunset.png"));
        let config = setup(
            dir.path(),
            r#"{"sunset.png": {"original": "o", "thumbnail": "t"}}"#,
        );

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let sync = GallerySync::new(config);

        sync.sync(&db, false, &[]).unwrap();
        // Simulate a manual edit that a plain sync must not clobber.
        db.conn()
            .execute("UPDATE gallery SET title = 'Edited' WHERE filename = 'sunset'", [])
            .unwrap();

        let summary = sync.sync(&db, false, &[]).unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped_existing, 1);

        let title: String = db
            .conn()
            .query_row("SELECT title FROM gallery WHERE filename = 'sunset'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(title, "Edited");
    }

    #[test]
    fn specific_files_force_reprocessing() {
        let dir = tempdir().unwrap();
        write_image(&dir.path().join("sunset.png"));
        let config = setup(
            dir.path(),
            r#"{"sunset.png": {"original": "o", "thumbnail": "t"}}"#,
        );

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let sync = GallerySync::new(config);

        sync.sync(&db, false, &[]).unwrap();
        db.conn()
            .execute("UPDATE gallery SET title = 'Edited' WHERE filename = 'sunset'", [])
            .unwrap();

        let summary = sync.sync(&db, false, &["sunset.png".to_string()]).unwrap();
        assert_eq!(summary.processed, 1);

        // Targeted upsert rewrites the row, resetting the title to the stem.
        let title: String = db
            .conn()
            .query_row("SELECT title FROM gallery WHERE filename = 'sunset'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(title, "sunset");
    }

    #[test]
    fn missing_mapping_file_is_an_error() {
        let dir = tempdir().unwrap();
        let config = Config {
            gallery: GalleryConfig {
                done_dir: dir.path().to_path_buf(),
                url_mapping: None,
            },
            ..Default::default()
        };
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        assert!(GallerySync::new(config).sync(&db, false, &[]).is_err());
    }
}
