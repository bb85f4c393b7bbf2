//! Catalog table operations: watermark reads and idempotent batch upserts.

use anyhow::Result;
use rusqlite::params;
use std::collections::HashMap;
use tracing::info;

use super::{clean_text, Database};
use crate::reconcile::CanonicalRecord;

/// Default number of records accumulated before a flush.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Bounded accumulator for canonical records.
///
/// Once the configured capacity is reached the batch reports itself full;
/// the caller flushes and clears it. This bounds peak memory regardless of
/// catalog size and gives each flush its own transaction.
#[derive(Debug)]
pub struct RecordBatch {
    records: Vec<CanonicalRecord>,
    capacity: usize,
}

impl RecordBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add a record; returns true when the batch has reached capacity and
    /// should be flushed.
    pub fn push(&mut self, record: CanonicalRecord) -> bool {
        self.records.push(record);
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take the accumulated records, leaving the batch empty.
    pub fn drain(&mut self) -> Vec<CanonicalRecord> {
        std::mem::take(&mut self.records)
    }
}

impl Database {
    /// Fetch the last-modified watermark for every cataloged image.
    /// Read once at the start of a batch run.
    pub fn catalog_watermarks(&self) -> Result<HashMap<String, f64>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT filepath, last_modified FROM catalogdata")?;
        let map = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(path, mtime)| mtime.map(|m| (path, m)))
            .collect();
        Ok(map)
    }

    /// Upsert one batch of catalog records in a single transaction.
    ///
    /// Inserts are keyed by filepath; on conflict every extracted column is
    /// replaced with the new value. Re-running with identical input leaves
    /// the table unchanged.
    pub fn upsert_catalog(&self, records: &[CanonicalRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let tx = self.conn().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO catalogdata (
                    filepath, filename,
                    camera_model, lens_model, focal_length, shutter, aperture, iso,
                    creation_date, genre, keywords, description,
                    city, sub_location, province_state,
                    software, serial_number, exposure_bias, metering_mode, flash,
                    white_balance, focal_length_35mm, exposure_program, subject_distance,
                    latitude, longitude, altitude,
                    width, height, file_size,
                    rating, artist, copyright, extension, last_modified
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                          ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28,
                          ?29, ?30, ?31, ?32, ?33, ?34, ?35)
                ON CONFLICT(filepath) DO UPDATE SET
                    filename = excluded.filename,
                    camera_model = excluded.camera_model,
                    lens_model = excluded.lens_model,
                    focal_length = excluded.focal_length,
                    shutter = excluded.shutter,
                    aperture = excluded.aperture,
                    iso = excluded.iso,
                    creation_date = excluded.creation_date,
                    genre = excluded.genre,
                    keywords = excluded.keywords,
                    description = excluded.description,
                    city = excluded.city,
                    sub_location = excluded.sub_location,
                    province_state = excluded.province_state,
                    software = excluded.software,
                    serial_number = excluded.serial_number,
                    exposure_bias = excluded.exposure_bias,
                    metering_mode = excluded.metering_mode,
                    flash = excluded.flash,
                    white_balance = excluded.white_balance,
                    focal_length_35mm = excluded.focal_length_35mm,
                    exposure_program = excluded.exposure_program,
                    subject_distance = excluded.subject_distance,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    altitude = excluded.altitude,
                    width = excluded.width,
                    height = excluded.height,
                    file_size = excluded.file_size,
                    rating = excluded.rating,
                    artist = excluded.artist,
                    copyright = excluded.copyright,
                    extension = excluded.extension,
                    last_modified = excluded.last_modified
                "#,
            )?;

            for record in records {
                stmt.execute(params![
                    clean_text(&record.filepath),
                    clean_text(&record.filename),
                    clean_text(&record.camera_model),
                    clean_text(&record.lens_model),
                    clean_text(&record.focal_length),
                    clean_text(&record.shutter),
                    clean_text(&record.aperture),
                    clean_text(&record.iso),
                    clean_text(&record.creation_date),
                    clean_text(&record.genre),
                    clean_text(&record.keywords),
                    clean_text(&record.description),
                    clean_text(&record.city),
                    clean_text(&record.sub_location),
                    clean_text(&record.province_state),
                    clean_text(&record.software),
                    clean_text(&record.serial_number),
                    clean_text(&record.exposure_bias),
                    clean_text(&record.metering_mode),
                    clean_text(&record.flash),
                    clean_text(&record.white_balance),
                    clean_text(&record.focal_length_35mm),
                    clean_text(&record.exposure_program),
                    clean_text(&record.subject_distance),
                    record.latitude,
                    record.longitude,
                    record.altitude,
                    record.width,
                    record.height,
                    record.file_size,
                    clean_text(&record.rating),
                    clean_text(&record.artist),
                    clean_text(&record.copyright),
                    clean_text(&record.extension),
                    record.last_modified,
                ])?;
            }
        }
        tx.commit()?;

        info!(count = records.len(), "catalog batch upserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(filepath: &str) -> CanonicalRecord {
        CanonicalRecord {
            filepath: filepath.to_string(),
            filename: "sample".to_string(),
            camera_model: "NIKON Z 7".to_string(),
            shutter: "1/250".to_string(),
            iso: "400".to_string(),
            latitude: Some(64.1466),
            file_size: 2048,
            last_modified: 1700000000.0,
            ..Default::default()
        }
    }

    fn table_dump(db: &Database) -> Vec<(String, String, Option<f64>)> {
        let mut stmt = db
            .conn()
            .prepare("SELECT filepath, camera_model, latitude FROM catalogdata ORDER BY filepath")
            .unwrap();
        stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    #[test]
    fn upsert_twice_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let records = vec![sample_record("/a.jpg"), sample_record("/b.jpg")];
        db.upsert_catalog(&records).unwrap();
        let first = table_dump(&db);

        db.upsert_catalog(&records).unwrap();
        let second = table_dump(&db);

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn reprocessing_overwrites_extracted_fields() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        db.upsert_catalog(&[sample_record("/a.jpg")]).unwrap();

        let mut updated = sample_record("/a.jpg");
        updated.camera_model = "NIKON Z 8".to_string();
        updated.last_modified = 1700000999.0;
        db.upsert_catalog(&[updated]).unwrap();

        let rows = table_dump(&db);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "NIKON Z 8");
    }

    #[test]
    fn embedded_nul_is_stripped() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let mut record = sample_record("/a.jpg");
        record.description = "before\0after".to_string();
        db.upsert_catalog(&[record]).unwrap();

        let desc: String = db
            .conn()
            .query_row(
                "SELECT description FROM catalogdata WHERE filepath = '/a.jpg'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(desc, "beforeafter");
    }

    #[test]
    fn watermarks_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        db.upsert_catalog(&[sample_record("/a.jpg")]).unwrap();
        let marks = db.catalog_watermarks().unwrap();
        assert_eq!(marks.get("/a.jpg"), Some(&1700000000.0));
    }

    #[test]
    fn batch_reports_full_exactly_at_capacity() {
        let mut batch = RecordBatch::new(3);
        assert!(!batch.push(sample_record("/1.jpg")));
        assert!(!batch.push(sample_record("/2.jpg")));
        assert!(batch.push(sample_record("/3.jpg")));

        let drained = batch.drain();
        assert_eq!(drained.len(), 3);
        assert!(batch.is_empty());

        // One under the threshold never reports full.
        let mut batch = RecordBatch::new(3);
        assert!(!batch.push(sample_record("/1.jpg")));
        assert!(!batch.push(sample_record("/2.jpg")));
        assert_eq!(batch.len(), 2);
    }
}
