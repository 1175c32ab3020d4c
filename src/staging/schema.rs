//! Database schema definitions for the ingestion tables

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Schema for the ingestion database tables
pub struct StagingSchema;

impl StagingSchema {
    /// Get the DDL for creating all tables (DuckDB syntax)
    pub fn create_tables_duckdb() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key VARCHAR PRIMARY KEY,
    value VARCHAR NOT NULL
);

-- Surrogate key sequences
CREATE SEQUENCE IF NOT EXISTS processed_data_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS processing_log_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS data_quality_metrics_id_seq START 1;

-- Cleaned product listings, one row per retained record
CREATE TABLE IF NOT EXISTS processed_data (
    id BIGINT PRIMARY KEY DEFAULT nextval('processed_data_id_seq'),
    product_id BIGINT,
    sku_id BIGINT,
    product_name VARCHAR,
    brand_name VARCHAR,
    description VARCHAR,
    seller_name VARCHAR,
    seller_url VARCHAR,
    seller_rating DOUBLE,
    business_type VARCHAR,
    business_area VARCHAR,
    availability VARCHAR,
    venture_category1_name_en VARCHAR,
    venture_category2_name_en VARCHAR,
    venture_category3_name_en VARCHAR,
    venture_category_name_local VARCHAR,
    product_url VARCHAR,
    deeplink VARCHAR,
    product_small_img VARCHAR,
    product_medium_img VARCHAR,
    product_big_img VARCHAR,
    image_url_2 VARCHAR,
    image_url_3 VARCHAR,
    image_url_4 VARCHAR,
    image_url_5 VARCHAR,
    price DOUBLE,
    current_price DOUBLE,
    promotion_price DOUBLE,
    discount_percentage DOUBLE,
    platform_commission_rate DOUBLE,
    product_commission_rate DOUBLE,
    bonus_commission_rate DOUBLE,
    rating_avg_value DOUBLE,
    number_of_reviews BIGINT CHECK (number_of_reviews IS NULL OR number_of_reviews >= 0),
    is_free_shipping INTEGER,
    source_file VARCHAR NOT NULL,
    processing_batch VARCHAR NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

-- One row per pipeline run
CREATE TABLE IF NOT EXISTS processing_log (
    id BIGINT PRIMARY KEY DEFAULT nextval('processing_log_id_seq'),
    file_name VARCHAR NOT NULL,
    batch_id VARCHAR NOT NULL,
    total_rows BIGINT,
    processed_rows BIGINT DEFAULT 0,
    status VARCHAR NOT NULL DEFAULT 'pending',
    started_at VARCHAR NOT NULL,
    completed_at VARCHAR,
    error_message VARCHAR,
    processing_time_seconds DOUBLE
);

-- One quality summary per processing batch
CREATE TABLE IF NOT EXISTS data_quality_metrics (
    id BIGINT PRIMARY KEY DEFAULT nextval('data_quality_metrics_id_seq'),
    batch_id VARCHAR NOT NULL,
    total_records BIGINT DEFAULT 0,
    valid_records BIGINT DEFAULT 0,
    invalid_records BIGINT DEFAULT 0,
    null_records BIGINT DEFAULT 0,
    duplicate_records BIGINT DEFAULT 0,
    processing_date VARCHAR NOT NULL
);

-- Create indexes for performance
CREATE INDEX IF NOT EXISTS idx_processed_data_created_at ON processed_data(created_at);
CREATE INDEX IF NOT EXISTS idx_processed_data_source_file ON processed_data(source_file);
CREATE INDEX IF NOT EXISTS idx_processed_data_product_id ON processed_data(product_id);
CREATE INDEX IF NOT EXISTS idx_processed_data_sku_id ON processed_data(sku_id);
CREATE INDEX IF NOT EXISTS idx_processed_data_brand_name ON processed_data(brand_name);
CREATE INDEX IF NOT EXISTS idx_processed_data_seller_name ON processed_data(seller_name);
CREATE INDEX IF NOT EXISTS idx_processing_log_status ON processing_log(status);
CREATE INDEX IF NOT EXISTS idx_processing_log_started_at ON processing_log(started_at);
CREATE INDEX IF NOT EXISTS idx_data_quality_batch_id ON data_quality_metrics(batch_id);
CREATE INDEX IF NOT EXISTS idx_data_quality_date ON data_quality_metrics(processing_date);
"#
    }

    /// Get the INSERT statement for schema version
    pub fn insert_schema_version() -> &'static str {
        "INSERT INTO schema_info (key, value) VALUES ('version', ?1) ON CONFLICT (key) DO UPDATE SET value = ?1"
    }

    /// Get the SELECT statement for schema version
    pub fn select_schema_version() -> &'static str {
        "SELECT value FROM schema_info WHERE key = 'version'"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::record::Field;

    #[test]
    fn test_schema_version() {
        assert!(SCHEMA_VERSION >= 1);
    }

    #[test]
    fn test_duckdb_schema_contains_tables() {
        let ddl = StagingSchema::create_tables_duckdb();
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS processed_data"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS processing_log"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS data_quality_metrics"));
        assert!(ddl.contains("CREATE INDEX IF NOT EXISTS idx_processed_data_seller_name"));
        assert!(ddl.contains("CREATE INDEX IF NOT EXISTS idx_data_quality_date"));
    }

    #[test]
    fn test_processed_data_declares_every_field() {
        let ddl = StagingSchema::create_tables_duckdb();
        for field in Field::ALL {
            assert!(
                ddl.contains(&format!("    {} ", field.name())),
                "missing column {}",
                field.name()
            );
        }
    }
}
