//! PostGIS-backed spatial queries.
//!
//! Distances use the `geography` cast so they are meters on the spheroid.
//! Radius queries go through `ST_DWithin`, KNN through the GiST `<->`
//! operator, and the reported distance is always recomputed with
//! `ST_Distance` on geography.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use geo_common::{
    CoolingShelterDetails, DefibrillatorDetails, GeoError, GeoResult, Point, Region, Site,
    SiteCategory, SiteDetails, SiteMatch, SpatialStore,
};

const QUERY_POINT: &str = "ST_SetSRID(ST_Point($1, $2), 4326)";

/// Table, select list and row filters of a site catalog.
struct Catalog {
    table: &'static str,
    columns: &'static str,
    /// Rows included in listings.
    listed: &'static str,
    /// Rows reachable by the geography queries.
    searchable: &'static str,
}

fn catalog(category: SiteCategory) -> Catalog {
    match category {
        SiteCategory::CoolingShelter => Catalog {
            table: "cooling_sites",
            columns: "id, name, ST_Y(geom) AS lat, ST_X(geom) AS lon, location_type, \
                      district_name, address, phone, ext, mobile, other_contact, open_hours, \
                      fan, ac, toilet, seating, drinking, accessible_seat, features, notes",
            listed: "geom IS NOT NULL",
            searchable: "geom IS NOT NULL",
        },
        // AED rows carry their surveyed lon/lat next to the derived geometry.
        SiteCategory::Defibrillator => Catalog {
            table: "aed_sites",
            columns: "id, name, lat, lon, address, category, type, place, description",
            listed: "lon IS NOT NULL AND lat IS NOT NULL",
            searchable: "geom IS NOT NULL AND lon IS NOT NULL AND lat IS NOT NULL",
        },
    }
}

fn site_from_row(category: SiteCategory, row: &PgRow) -> Result<Site, sqlx::Error> {
    let details = match category {
        SiteCategory::CoolingShelter => SiteDetails::CoolingShelter(CoolingShelterDetails {
            location_type: row.try_get("location_type")?,
            district_name: row.try_get("district_name")?,
            address: row.try_get("address")?,
            phone: row.try_get("phone")?,
            ext: row.try_get("ext")?,
            mobile: row.try_get("mobile")?,
            other_contact: row.try_get("other_contact")?,
            open_hours: row.try_get("open_hours")?,
            fan: row.try_get("fan")?,
            ac: row.try_get("ac")?,
            toilet: row.try_get("toilet")?,
            seating: row.try_get("seating")?,
            drinking: row.try_get("drinking")?,
            accessible_seat: row.try_get("accessible_seat")?,
            features: row.try_get("features")?,
            notes: row.try_get("notes")?,
        }),
        SiteCategory::Defibrillator => SiteDetails::Defibrillator(DefibrillatorDetails {
            address: row.try_get("address")?,
            category: row.try_get("category")?,
            kind: row.try_get("type")?,
            place: row.try_get("place")?,
            description: row.try_get("description")?,
        }),
    };

    Ok(Site {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        location: Point::new(row.try_get("lat")?, row.try_get("lon")?),
        details,
    })
}

fn match_from_row(category: SiteCategory, row: &PgRow) -> Result<SiteMatch, sqlx::Error> {
    Ok(SiteMatch {
        site: site_from_row(category, row)?,
        distance_m: row.try_get("distance_m")?,
    })
}

#[derive(sqlx::FromRow)]
struct RegionRow {
    id: i32,
    district_name: String,
    city_name: String,
}

#[derive(sqlx::FromRow)]
struct RegionDistanceRow {
    id: i32,
    district_name: String,
    city_name: String,
    distance_m: f64,
}

impl From<RegionRow> for Region {
    fn from(row: RegionRow) -> Self {
        Region {
            id: row.id,
            name: row.district_name,
            city: row.city_name,
        }
    }
}

impl From<RegionDistanceRow> for (Region, f64) {
    fn from(row: RegionDistanceRow) -> Self {
        (
            Region {
                id: row.id,
                name: row.district_name,
                city: row.city_name,
            },
            row.distance_m,
        )
    }
}

/// [`SpatialStore`] over the district and site tables.
#[derive(Clone)]
pub struct PgSpatialStore {
    pool: PgPool,
}

impl PgSpatialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SpatialStore for PgSpatialStore {
    async fn region_containing(&self, point: &Point) -> GeoResult<Option<Region>> {
        let sql = format!(
            "SELECT id, district_name, city_name FROM taipei_districts \
             WHERE ST_Contains(geom, {QUERY_POINT}) \
             ORDER BY id LIMIT 1"
        );
        let row = sqlx::query_as::<_, RegionRow>(&sql)
            .bind(point.lon)
            .bind(point.lat)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(row.map(Into::into))
    }

    async fn nearest_region_within(
        &self,
        point: &Point,
        max_distance_m: f64,
    ) -> GeoResult<Option<(Region, f64)>> {
        let sql = format!(
            "SELECT id, district_name, city_name, \
             ST_Distance(geom::geography, {QUERY_POINT}::geography) AS distance_m \
             FROM taipei_districts \
             WHERE ST_DWithin(geom::geography, {QUERY_POINT}::geography, $3) \
             ORDER BY distance_m LIMIT 1"
        );
        let row = sqlx::query_as::<_, RegionDistanceRow>(&sql)
            .bind(point.lon)
            .bind(point.lat)
            .bind(max_distance_m)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(row.map(Into::into))
    }

    async fn nearest_region(&self, point: &Point) -> GeoResult<Option<(Region, f64)>> {
        let sql = format!(
            "SELECT id, district_name, city_name, \
             ST_Distance(geom::geography, {QUERY_POINT}::geography) AS distance_m \
             FROM taipei_districts \
             ORDER BY geom <-> {QUERY_POINT} LIMIT 1"
        );
        let row = sqlx::query_as::<_, RegionDistanceRow>(&sql)
            .bind(point.lon)
            .bind(point.lat)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(row.map(Into::into))
    }

    async fn sites_within(
        &self,
        category: SiteCategory,
        point: &Point,
        radius_m: f64,
        limit: usize,
    ) -> GeoResult<Vec<SiteMatch>> {
        let Catalog {
            table,
            columns,
            searchable,
            ..
        } = catalog(category);
        let sql = format!(
            "SELECT {columns}, \
             ST_Distance(geom::geography, {QUERY_POINT}::geography) AS distance_m \
             FROM {table} \
             WHERE {searchable} \
             AND ST_DWithin(geom::geography, {QUERY_POINT}::geography, $3) \
             ORDER BY distance_m LIMIT $4"
        );
        let rows = sqlx::query(&sql)
            .bind(point.lon)
            .bind(point.lat)
            .bind(radius_m)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.iter()
            .map(|row| match_from_row(category, row))
            .collect::<Result<_, _>>()
            .map_err(|e| GeoError::DatabaseError(format!("Decoding {} failed: {}", table, e)))
    }

    async fn nearest_sites(
        &self,
        category: SiteCategory,
        point: &Point,
        limit: usize,
    ) -> GeoResult<Vec<SiteMatch>> {
        let Catalog {
            table,
            columns,
            searchable,
            ..
        } = catalog(category);
        let sql = format!(
            "SELECT {columns}, \
             ST_Distance(geom::geography, {QUERY_POINT}::geography) AS distance_m \
             FROM {table} \
             WHERE {searchable} \
             ORDER BY geom <-> {QUERY_POINT} LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(point.lon)
            .bind(point.lat)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.iter()
            .map(|row| match_from_row(category, row))
            .collect::<Result<_, _>>()
            .map_err(|e| GeoError::DatabaseError(format!("Decoding {} failed: {}", table, e)))
    }

    async fn list_sites(
        &self,
        category: SiteCategory,
        limit: Option<usize>,
        offset: usize,
    ) -> GeoResult<Vec<Site>> {
        let Catalog {
            table,
            columns,
            listed,
            ..
        } = catalog(category);
        // LIMIT NULL is no limit.
        let sql = format!(
            "SELECT {columns} FROM {table} \
             WHERE {listed} \
             ORDER BY id ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit.map(|n| n as i64))
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.iter()
            .map(|row| site_from_row(category, row))
            .collect::<Result<_, _>>()
            .map_err(|e| GeoError::DatabaseError(format!("Decoding {} failed: {}", table, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_tables() {
        assert_eq!(catalog(SiteCategory::CoolingShelter).table, "cooling_sites");
        assert_eq!(catalog(SiteCategory::Defibrillator).table, "aed_sites");
    }

    #[test]
    fn test_shelter_coordinates_come_from_geometry() {
        let shelters = catalog(SiteCategory::CoolingShelter);
        assert!(shelters.columns.contains("ST_Y(geom) AS lat"));
        assert!(shelters.columns.contains("ST_X(geom) AS lon"));
        assert_eq!(shelters.listed, "geom IS NOT NULL");
    }

    #[test]
    fn test_aed_listing_uses_lon_lat_columns() {
        let aeds = catalog(SiteCategory::Defibrillator);
        assert!(aeds.columns.starts_with("id, name, lat, lon,"));
        assert!(!aeds.columns.contains("ST_Y"));
        assert!(!aeds.listed.contains("geom"));
        assert!(aeds.listed.contains("lon IS NOT NULL"));
        assert!(aeds.listed.contains("lat IS NOT NULL"));
        assert!(aeds.searchable.contains("geom IS NOT NULL"));
    }
}
