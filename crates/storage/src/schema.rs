//! Embedded schema. Statements are separated by `;` and must not contain one.

pub(crate) const SCHEMA_SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS postgis;

CREATE TABLE IF NOT EXISTS taipei_districts (
    id SERIAL PRIMARY KEY,
    city_name TEXT NOT NULL DEFAULT '臺北市',
    district_name TEXT NOT NULL,
    geom geometry(MULTIPOLYGON, 4326) NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_taipei_districts_geom ON taipei_districts USING GIST (geom);

CREATE TABLE IF NOT EXISTS cooling_sites (
    id SERIAL PRIMARY KEY,
    location_type TEXT,
    name TEXT,
    district_name TEXT,
    address TEXT,
    lon DOUBLE PRECISION,
    lat DOUBLE PRECISION,
    phone TEXT,
    ext TEXT,
    mobile TEXT,
    other_contact TEXT,
    open_hours TEXT,
    fan BOOLEAN,
    ac BOOLEAN,
    toilet BOOLEAN,
    seating BOOLEAN,
    drinking BOOLEAN,
    accessible_seat BOOLEAN,
    features TEXT,
    notes TEXT,
    geom geometry(POINT, 4326)
);

CREATE INDEX IF NOT EXISTS idx_cooling_sites_geom ON cooling_sites USING GIST (geom);

CREATE TABLE IF NOT EXISTS aed_sites (
    id SERIAL PRIMARY KEY,
    name TEXT,
    address TEXT,
    category TEXT,
    type TEXT,
    place TEXT,
    description TEXT,
    lon DOUBLE PRECISION,
    lat DOUBLE PRECISION,
    geom geometry(POINT, 4326)
);

CREATE INDEX IF NOT EXISTS idx_aed_sites_geom ON aed_sites USING GIST (geom);

CREATE TABLE IF NOT EXISTS aqi_measurements (
    id BIGSERIAL PRIMARY KEY,
    slot_utc TIMESTAMPTZ NOT NULL,
    grid_lat DOUBLE PRECISION NOT NULL,
    grid_lon DOUBLE PRECISION NOT NULL,
    pm25_ugm3 DOUBLE PRECISION NOT NULL,
    aqi INTEGER NOT NULL,
    category TEXT NOT NULL,
    reference TEXT NOT NULL,
    fetched_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    UNIQUE(slot_utc, grid_lat, grid_lon)
);

CREATE TABLE IF NOT EXISTS aqi_bucket_index (
    slot_utc TIMESTAMPTZ NOT NULL,
    bucket_lat INTEGER NOT NULL,
    bucket_lon INTEGER NOT NULL,
    decimals SMALLINT NOT NULL,
    measurement_id BIGINT NOT NULL REFERENCES aqi_measurements(id) ON DELETE CASCADE,

    PRIMARY KEY (slot_utc, bucket_lat, bucket_lon, decimals)
);

CREATE INDEX IF NOT EXISTS idx_aqi_bucket_latest
    ON aqi_bucket_index(bucket_lat, bucket_lon, decimals, slot_utc DESC);

CREATE TABLE IF NOT EXISTS device_tokens (
    id BIGSERIAL PRIMARY KEY,
    user_id TEXT,
    fcm_token TEXT NOT NULL UNIQUE,
    platform TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_device_tokens_user ON device_tokens(user_id)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_splits_into_statements() {
        let statements: Vec<&str> = SCHEMA_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        assert!(statements.iter().all(|s| s.starts_with("CREATE")));
        assert!(statements
            .iter()
            .any(|s| s.contains("UNIQUE(slot_utc, grid_lat, grid_lon)")));
    }
}
