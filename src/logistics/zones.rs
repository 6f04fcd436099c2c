//! Zone pricing reference data.
//!
//! Five ordered, non-overlapping distance bands from the city-center
//! reference point, each with a base logistics fee and an ETA range.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Reference point for distance computation (Nairobi CBD).
pub const REFERENCE_POINT: Coordinates = Coordinates {
    lat: -1.2921,
    lng: 36.8219,
};

/// A geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A pricing zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    A,
    B,
    C,
    D,
    E,
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" => Ok(Self::E),
            other => Err(format!("unknown zone: {other}")),
        }
    }
}

/// One distance band: `min_km <= distance < max_km`.
#[derive(Debug, Clone, Copy)]
pub struct ZoneBand {
    pub zone: Zone,
    pub min_km: f64,
    pub max_km: f64,
    pub base_fee: Decimal,
    pub eta: &'static str,
    pub areas: &'static [&'static str],
}

/// The band table, ordered by distance.
pub static ZONE_BANDS: &[ZoneBand] = &[
    ZoneBand {
        zone: Zone::A,
        min_km: 0.0,
        max_km: 3.0,
        base_fee: dec!(200),
        eta: "15-30 mins",
        areas: &["Westlands", "Kileleshwa", "Kilimani", "CBD"],
    },
    ZoneBand {
        zone: Zone::B,
        min_km: 3.0,
        max_km: 7.0,
        base_fee: dec!(300),
        eta: "30-45 mins",
        areas: &["South B", "Hurlingham", "Parklands", "Lavington"],
    },
    ZoneBand {
        zone: Zone::C,
        min_km: 7.0,
        max_km: 12.0,
        base_fee: dec!(400),
        eta: "45-60 mins",
        areas: &["Ruaka", "Rongai", "Embakasi", "Donholm"],
    },
    ZoneBand {
        zone: Zone::D,
        min_km: 12.0,
        max_km: 20.0,
        base_fee: dec!(500),
        eta: "1-2 hrs",
        areas: &["Kitengela", "Juja", "Limuru", "Athi River"],
    },
    ZoneBand {
        zone: Zone::E,
        min_km: 20.0,
        max_km: f64::INFINITY,
        base_fee: dec!(600),
        eta: "2+ hrs",
        areas: &["Thika", "Ngong", "Machakos"],
    },
];

/// Fallback when the location cannot be resolved at all. Mid-range by
/// policy: logistics must never halt booking progress.
pub const FALLBACK_ZONE: Zone = Zone::C;
pub const FALLBACK_DISTANCE_KM: f64 = 8.0;

/// Band for a zone.
pub fn band_for_zone(zone: Zone) -> &'static ZoneBand {
    ZONE_BANDS
        .iter()
        .find(|b| b.zone == zone)
        .expect("every zone has a band")
}

/// Map a distance to its band. Distances past the last finite bound land
/// in the farthest band.
pub fn band_for_distance(distance_km: f64) -> &'static ZoneBand {
    ZONE_BANDS
        .iter()
        .find(|b| distance_km >= b.min_km && distance_km < b.max_km)
        .unwrap_or(&ZONE_BANDS[ZONE_BANDS.len() - 1])
}

/// Known neighborhoods with coordinates and their zone.
pub static GAZETTEER: &[(&str, f64, f64, Zone)] = &[
    ("westlands", -1.2531, 36.8172, Zone::A),
    ("kileleshwa", -1.2981, 36.8073, Zone::A),
    ("kilimani", -1.3000, 36.8000, Zone::A),
    ("cbd", -1.2921, 36.8219, Zone::A),
    ("south b", -1.3200, 36.8500, Zone::B),
    ("hurlingham", -1.3100, 36.8300, Zone::B),
    ("parklands", -1.2600, 36.8200, Zone::B),
    ("lavington", -1.2800, 36.8000, Zone::B),
    ("ruaka", -1.1800, 36.8500, Zone::C),
    ("rongai", -1.4000, 36.6500, Zone::C),
    ("embakasi", -1.3000, 36.9000, Zone::C),
    ("donholm", -1.2900, 36.8800, Zone::C),
    ("kitengela", -1.4700, 36.9500, Zone::D),
    ("juja", -1.1000, 37.0100, Zone::D),
    ("limuru", -1.1000, 36.6400, Zone::D),
    ("athi river", -1.4500, 36.9800, Zone::D),
    ("thika", -1.0500, 37.0700, Zone::E),
    ("ngong", -1.3600, 36.6500, Zone::E),
    ("machakos", -1.5200, 37.2600, Zone::E),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_ordered_and_contiguous() {
        for pair in ZONE_BANDS.windows(2) {
            assert_eq!(pair[0].max_km, pair[1].min_km);
        }
        assert_eq!(ZONE_BANDS[0].min_km, 0.0);
        assert!(ZONE_BANDS.last().unwrap().max_km.is_infinite());
    }

    #[test]
    fn distance_maps_to_expected_zone() {
        assert_eq!(band_for_distance(0.0).zone, Zone::A);
        assert_eq!(band_for_distance(2.9).zone, Zone::A);
        assert_eq!(band_for_distance(3.0).zone, Zone::B);
        assert_eq!(band_for_distance(8.0).zone, Zone::C);
        assert_eq!(band_for_distance(12.0).zone, Zone::D);
        assert_eq!(band_for_distance(500.0).zone, Zone::E);
    }

    #[test]
    fn zone_display_roundtrip() {
        for zone in [Zone::A, Zone::B, Zone::C, Zone::D, Zone::E] {
            let parsed: Zone = zone.to_string().parse().unwrap();
            assert_eq!(parsed, zone);
        }
    }
}
