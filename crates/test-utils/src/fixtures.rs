//! Fixture data around central Taipei.

use geo::{LineString, MultiPolygon, Polygon};
use geo_common::region::DEFAULT_CITY;
use geo_common::{
    CoolingShelterDetails, DefibrillatorDetails, GridCell, Point, PollutantGrid, Region, Site,
    SiteDetails,
};

/// Longitude where the two fixture districts meet.
pub const DISTRICT_EDGE_LON: f64 = 121.53;
/// Southern edge of both fixture districts.
pub const DISTRICT_SOUTH_LAT: f64 = 25.02;
/// Northern edge of both fixture districts.
pub const DISTRICT_NORTH_LAT: f64 = 25.05;
/// Western edge of the western district.
pub const DISTRICT_WEST_LON: f64 = 121.50;
/// Eastern edge of the eastern district.
pub const DISTRICT_EAST_LON: f64 = 121.56;

pub fn region(id: i32, name: &str) -> Region {
    Region {
        id,
        name: name.to_string(),
        city: DEFAULT_CITY.to_string(),
    }
}

/// An axis-aligned rectangle as a single-part multipolygon.
pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygon<f64> {
    let ring = LineString::from(vec![
        (min_lon, min_lat),
        (max_lon, min_lat),
        (max_lon, max_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ]);
    MultiPolygon(vec![Polygon::new(ring, vec![])])
}

/// Two side-by-side districts sharing the `DISTRICT_EDGE_LON` meridian.
pub fn sample_districts() -> Vec<(Region, MultiPolygon<f64>)> {
    vec![
        (
            region(1, "中正區"),
            rectangle(
                DISTRICT_WEST_LON,
                DISTRICT_SOUTH_LAT,
                DISTRICT_EDGE_LON,
                DISTRICT_NORTH_LAT,
            ),
        ),
        (
            region(2, "大安區"),
            rectangle(
                DISTRICT_EDGE_LON,
                DISTRICT_SOUTH_LAT,
                DISTRICT_EAST_LON,
                DISTRICT_NORTH_LAT,
            ),
        ),
    ]
}

pub fn cooling_shelter(id: i32, name: &str, lat: f64, lon: f64) -> Site {
    Site {
        id,
        name: Some(name.to_string()),
        location: Point::new(lat, lon),
        details: SiteDetails::CoolingShelter(CoolingShelterDetails {
            location_type: Some("室內".to_string()),
            ac: Some(true),
            toilet: Some(true),
            ..Default::default()
        }),
    }
}

pub fn defibrillator(id: i32, name: &str, lat: f64, lon: f64) -> Site {
    Site {
        id,
        name: Some(name.to_string()),
        location: Point::new(lat, lon),
        details: SiteDetails::Defibrillator(DefibrillatorDetails {
            place: Some("1F 服務台".to_string()),
            ..Default::default()
        }),
    }
}

/// Cooling shelters spread eastwards from Taipei Main Station.
pub fn sample_cooling_shelters() -> Vec<Site> {
    vec![
        cooling_shelter(10, "Main Station Library", 25.0478, 121.5170),
        cooling_shelter(11, "Huashan Center", 25.0441, 121.5292),
        cooling_shelter(12, "Daan Park Office", 25.0300, 121.5355),
        cooling_shelter(13, "Xinyi Civic Hall", 25.0330, 121.5645),
    ]
}

pub fn sample_defibrillators() -> Vec<Site> {
    vec![
        defibrillator(20, "City Hall", 25.0375, 121.5637),
        defibrillator(21, "Main Station", 25.0478, 121.5171),
    ]
}

/// A 2x2 CAMS-like grid at 0.4 degree spacing over the Taipei area, in kg m-3.
///
/// Cell values in µg m-3 are 8, 20, 40 and 160 going north-west, north-east,
/// south-west, south-east.
pub fn taipei_pm25_grid() -> PollutantGrid {
    let cells = vec![
        GridCell { lat: 25.3, lon: 121.3, value: 8.0e-9 },
        GridCell { lat: 25.3, lon: 121.7, value: 20.0e-9 },
        GridCell { lat: 24.9, lon: 121.3, value: 40.0e-9 },
        GridCell { lat: 24.9, lon: 121.7, value: 160.0e-9 },
    ];
    PollutantGrid::new("kg m**-3", cells)
}
