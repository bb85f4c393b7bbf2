pub const TABLES: &str = r#"
-- Working catalog: full extraction schema, keyed by absolute file path.
CREATE TABLE IF NOT EXISTS catalogdata (
    filepath TEXT PRIMARY KEY,
    filename TEXT,
    camera_model TEXT,
    lens_model TEXT,
    focal_length TEXT,
    shutter TEXT,
    aperture TEXT,
    iso TEXT,
    creation_date TEXT,
    genre TEXT,
    keywords TEXT,
    description TEXT,
    city TEXT,
    sub_location TEXT,
    province_state TEXT,
    software TEXT,
    serial_number TEXT,
    exposure_bias TEXT,
    metering_mode TEXT,
    flash TEXT,
    white_balance TEXT,
    focal_length_35mm TEXT,
    exposure_program TEXT,
    subject_distance TEXT,
    latitude REAL,
    longitude REAL,
    altitude REAL,
    width INTEGER,
    height INTEGER,
    file_size INTEGER,
    rating TEXT,
    artist TEXT,
    copyright TEXT,
    extension TEXT,
    last_modified REAL
);

-- Presentation table for the gallery, keyed by filename stem.
-- view_count is owned by the web layer and must survive re-extraction.
CREATE TABLE IF NOT EXISTS gallery (
    filename TEXT PRIMARY KEY,
    title TEXT,
    original_url TEXT,
    thumbnail_url TEXT,
    camera_model TEXT,
    lens_model TEXT,
    focal_length TEXT,
    shutter TEXT,
    aperture TEXT,
    iso TEXT,
    creation_date TEXT,
    genre TEXT,
    description TEXT,
    city TEXT,
    sub_location TEXT,
    province_state TEXT,
    latitude REAL,
    longitude REAL,
    altitude REAL,
    keywords TEXT,
    extension TEXT,
    view_count INTEGER DEFAULT 0
);
"#;

/// Indexes are created separately from the tables: they reference columns
/// an older live table only gains through migrations, so they must run
/// after the ALTER TABLE pass.
pub const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_catalog_camera_model ON catalogdata(camera_model);
CREATE INDEX IF NOT EXISTS idx_catalog_creation_date ON catalogdata(creation_date);
CREATE INDEX IF NOT EXISTS idx_gallery_genre ON gallery(genre);
"#;

/// One ALTER TABLE per non-key column of the schema of record. Every
/// statement runs on every startup and the "duplicate column" error is
/// ignored, which is the closest SQLite gets to ADD COLUMN IF NOT EXISTS;
/// a live table of any older shape converges on the current schema without
/// touching existing data.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE catalogdata ADD COLUMN filename TEXT",
    "ALTER TABLE catalogdata ADD COLUMN camera_model TEXT",
    "ALTER TABLE catalogdata ADD COLUMN lens_model TEXT",
    "ALTER TABLE catalogdata ADD COLUMN focal_length TEXT",
    "ALTER TABLE catalogdata ADD COLUMN shutter TEXT",
    "ALTER TABLE catalogdata ADD COLUMN aperture TEXT",
    "ALTER TABLE catalogdata ADD COLUMN iso TEXT",
    "ALTER TABLE catalogdata ADD COLUMN creation_date TEXT",
    "ALTER TABLE catalogdata ADD COLUMN genre TEXT",
    "ALTER TABLE catalogdata ADD COLUMN keywords TEXT",
    "ALTER TABLE catalogdata ADD COLUMN description TEXT",
    "ALTER TABLE catalogdata ADD COLUMN city TEXT",
    "ALTER TABLE catalogdata ADD COLUMN sub_location TEXT",
    "ALTER TABLE catalogdata ADD COLUMN province_state TEXT",
    "ALTER TABLE catalogdata ADD COLUMN software TEXT",
    "ALTER TABLE catalogdata ADD COLUMN serial_number TEXT",
    "ALTER TABLE catalogdata ADD COLUMN exposure_bias TEXT",
    "ALTER TABLE catalogdata ADD COLUMN metering_mode TEXT",
    "ALTER TABLE catalogdata ADD COLUMN flash TEXT",
    "ALTER TABLE catalogdata ADD COLUMN white_balance TEXT",
    "ALTER TABLE catalogdata ADD COLUMN focal_length_35mm TEXT",
    "ALTER TABLE catalogdata ADD COLUMN exposure_program TEXT",
    "ALTER TABLE catalogdata ADD COLUMN subject_distance TEXT",
    "ALTER TABLE catalogdata ADD COLUMN latitude REAL",
    "ALTER TABLE catalogdata ADD COLUMN longitude REAL",
    "ALTER TABLE catalogdata ADD COLUMN altitude REAL",
    "ALTER TABLE catalogdata ADD COLUMN width INTEGER",
    "ALTER TABLE catalogdata ADD COLUMN height INTEGER",
    "ALTER TABLE catalogdata ADD COLUMN file_size INTEGER",
    "ALTER TABLE catalogdata ADD COLUMN rating TEXT",
    "ALTER TABLE catalogdata ADD COLUMN artist TEXT",
    "ALTER TABLE catalogdata ADD COLUMN copyright TEXT",
    "ALTER TABLE catalogdata ADD COLUMN extension TEXT",
    "ALTER TABLE catalogdata ADD COLUMN last_modified REAL",
    "ALTER TABLE gallery ADD COLUMN title TEXT",
    "ALTER TABLE gallery ADD COLUMN original_url TEXT",
    "ALTER TABLE gallery ADD COLUMN thumbnail_url TEXT",
    "ALTER TABLE gallery ADD COLUMN camera_model TEXT",
    "ALTER TABLE gallery ADD COLUMN lens_model TEXT",
    "ALTER TABLE gallery ADD COLUMN focal_length TEXT",
    "ALTER TABLE gallery ADD COLUMN shutter TEXT",
    "ALTER TABLE gallery ADD COLUMN aperture TEXT",
    "ALTER TABLE gallery ADD COLUMN iso TEXT",
    "ALTER TABLE gallery ADD COLUMN creation_date TEXT",
    "ALTER TABLE gallery ADD COLUMN genre TEXT",
    "ALTER TABLE gallery ADD COLUMN description TEXT",
    "ALTER TABLE gallery ADD COLUMN city TEXT",
    "ALTER TABLE gallery ADD COLUMN sub_location TEXT",
    "ALTER TABLE gallery ADD COLUMN province_state TEXT",
    "ALTER TABLE gallery ADD COLUMN latitude REAL",
    "ALTER TABLE gallery ADD COLUMN longitude REAL",
    "ALTER TABLE gallery ADD COLUMN altitude REAL",
    "ALTER TABLE gallery ADD COLUMN keywords TEXT",
    "ALTER TABLE gallery ADD COLUMN extension TEXT",
    "ALTER TABLE gallery ADD COLUMN view_count INTEGER DEFAULT 0",
];
