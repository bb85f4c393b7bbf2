//! Gallery table operations.
//!
//! Rows are keyed by filename stem. view_count belongs to the web layer:
//! the upsert never writes it, so existing counts survive re-extraction.

use anyhow::Result;
use rusqlite::params;
use tracing::info;

use super::{clean_text, Database};
use crate::reconcile::CanonicalRecord;

/// One presentation row: display metadata plus the published URLs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryRecord {
    /// Filename stem, the table key.
    pub filename: String,
    pub title: String,
    pub original_url: String,
    pub thumbnail_url: String,
    pub camera_model: String,
    pub lens_model: String,
    pub focal_length: String,
    pub shutter: String,
    pub aperture: String,
    pub iso: String,
    pub creation_date: String,
    pub genre: String,
    pub description: String,
    pub city: String,
    pub sub_location: String,
    pub province_state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub keywords: String,
    pub extension: String,
}

impl GalleryRecord {
    /// Project a canonical record down to the display subset. The title
    /// defaults to the filename stem; editors can change it later.
    pub fn from_canonical(record: &CanonicalRecord, original_url: &str, thumbnail_url: &str) -> Self {
        Self {
            filename: record.filename.clone(),
            title: record.filename.clone(),
            original_url: original_url.to_string(),
            thumbnail_url: thumbnail_url.to_string(),
            camera_model: record.camera_model.clone(),
            lens_model: record.lens_model.clone(),
            focal_length: record.focal_length.clone(),
            shutter: record.shutter.clone(),
            aperture: record.aperture.clone(),
            iso: record.iso.clone(),
            creation_date: record.creation_date.clone(),
            genre: record.genre.clone(),
            description: record.description.clone(),
            city: record.city.clone(),
            sub_location: record.sub_location.clone(),
            province_state: record.province_state.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            altitude: record.altitude,
            keywords: record.keywords.clone(),
            extension: record.extension.clone(),
        }
    }
}

impl Database {
    /// All stems currently present in the gallery.
    pub fn gallery_filenames(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare("SELECT filename FROM gallery")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(names)
    }

    /// Upsert gallery rows in one transaction.
    ///
    /// Legacy rows keyed by full filename (stem plus extension) are deleted
    /// first so the stem-keyed row does not end up duplicated. view_count is
    /// excluded from the update set.
    pub fn upsert_gallery(&self, records: &[GalleryRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let tx = self.conn().unchecked_transaction()?;
        {
            let mut delete_stale = tx.prepare_cached("DELETE FROM gallery WHERE filename LIKE ?1")?;
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO gallery (
                    filename, title, original_url, thumbnail_url,
                    camera_model, lens_model, focal_length, shutter, aperture, iso,
                    creation_date, genre, description, city, sub_location, province_state,
                    latitude, longitude, altitude, keywords, extension
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                          ?15, ?16, ?17, ?18, ?19, ?20, ?21)
                ON CONFLICT(filename) DO UPDATE SET
                    title = excluded.title,
                    original_url = excluded.original_url,
                    thumbnail_url = excluded.thumbnail_url,
                    camera_model = excluded.camera_model,
                    lens_model = excluded.lens_model,
                    focal_length = excluded.focal_length,
                    shutter = excluded.shutter,
                    aperture = excluded.aperture,
                    iso = excluded.iso,
                    creation_date = excluded.creation_date,
                    genre = excluded.genre,
                    description = excluded.description,
                    city = excluded.city,
                    sub_location = excluded.sub_location,
                    province_state = excluded.province_state,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    altitude = excluded.altitude,
                    keywords = excluded.keywords,
                    extension = excluded.extension
                "#,
            )?;

            for record in records {
                delete_stale.execute(params![format!("{}.%", record.filename)])?;
                stmt.execute(params![
                    clean_text(&record.filename),
                    clean_text(&record.title),
                    clean_text(&record.original_url),
                    clean_text(&record.thumbnail_url),
                    clean_text(&record.camera_model),
                    clean_text(&record.lens_model),
                    clean_text(&record.focal_length),
                    clean_text(&record.shutter),
                    clean_text(&record.aperture),
                    clean_text(&record.iso),
                    clean_text(&record.creation_date),
                    clean_text(&record.genre),
                    clean_text(&record.description),
                    clean_text(&record.city),
                    clean_text(&record.sub_location),
                    clean_text(&record.province_state),
                    record.latitude,
                    record.longitude,
                    record.altitude,
                    clean_text(&record.keywords),
                    clean_text(&record.extension),
                ])?;
            }
        }
        tx.commit()?;

        info!(count = records.len(), "gallery batch upserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(stem: &str) -> GalleryRecord {
        GalleryRecord {
            filename: stem.to_string(),
            title: stem.to_string(),
            original_url: format!("https://cdn.example/{stem}.jpg"),
            thumbnail_url: format!("https://cdn.example/thumbs/{stem}.jpg"),
            camera_model: "NIKON Z 7".to_string(),
            extension: ".jpg".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn view_count_survives_reupsert() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        db.upsert_gallery(&[sample_record("sunset")]).unwrap();
        db.conn()
            .execute("UPDATE gallery SET view_count = 7 WHERE filename = 'sunset'", [])
            .unwrap();

        let mut updated = sample_record("sunset");
        updated.camera_model = "NIKON Z 8".to_string();
        db.upsert_gallery(&[updated]).unwrap();

        let (model, views): (String, i64) = db
            .conn()
            .query_row(
                "SELECT camera_model, view_count FROM gallery WHERE filename = 'sunset'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(model, "NIKON Z 8");
        assert_eq!(views, 7);
    }

    #[test]
    fn legacy_extension_keyed_row_is_replaced() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        db.conn()
            .execute(
                "INSERT INTO gallery (filename, view_count) VALUES ('sunset.jpg', 3)",
                [],
            )
            .unwrap();

        db.upsert_gallery(&[sample_record("sunset")]).unwrap();

        let names = db.gallery_filenames().unwrap();
        assert_eq!(names, vec!["sunset".to_string()]);
    }

    #[test]
    fn from_canonical_defaults_title_to_stem() {
        let canonical = CanonicalRecord {
            filename: "_EVY2460-HDR".to_string(),
            camera_model: "NIKON Z 7".to_string(),
            latitude: Some(64.1),
            extension: ".jpg".to_string(),
            ..Default::default()
        };
        let record = GalleryRecord::from_canonical(&canonical, "orig", "thumb");
        assert_eq!(record.title, "_EVY2460-HDR");
        assert_eq!(record.original_url, "orig");
        assert_eq!(record.latitude, Some(64.1));
    }
}
