//! Photo metadata catalog ETL.
//!
//! Extracts EXIF, IPTC and XMP metadata from image archives, reconciles the
//! three sources into one canonical record per photo and keeps two SQLite
//! tables in sync: a full working catalog and a presentation gallery.

pub mod config;
pub mod db;
pub mod gallery;
pub mod logging;
pub mod metadata;
pub mod reconcile;
pub mod scanner;
