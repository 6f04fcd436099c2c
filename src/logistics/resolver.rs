//! Geo/pricing resolution.
//!
//! Maps free-text locations to a pricing zone, distance, fee, and ETA:
//! gazetteer first, then the external geocoder, then a fallback zone.
//! Resolution never fails the flow — logistics must not halt a booking.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::SurchargeConfig;
use crate::error::LogisticsError;
use crate::logistics::zones::{
    Coordinates, FALLBACK_DISTANCE_KM, FALLBACK_ZONE, GAZETTEER, REFERENCE_POINT, Zone, ZoneBand,
    band_for_distance, band_for_zone,
};

/// A resolved logistics quote for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsQuote {
    /// The location text as the user gave it.
    pub location: String,
    pub zone: Zone,
    pub distance_km: f64,
    pub coordinates: Option<Coordinates>,
    pub base_fee: Decimal,
    pub surcharge: Decimal,
    pub adjustment: Decimal,
    /// `base_fee + surcharge + adjustment`, clamped at zero.
    pub total_fee: Decimal,
    pub eta: String,
}

/// External geocoding seam. Implementations must not panic; unavailability
/// is `Ok(None)` or an error, both of which the resolver absorbs.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, LogisticsError>;
}

/// Geocoder that is always unavailable. Used when no API key is configured
/// and in tests; the resolver falls back to the default zone.
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn geocode(&self, _location: &str) -> Result<Option<Coordinates>, LogisticsError> {
        Ok(None)
    }
}

/// HTTP geocoder against a Google-geocode-style endpoint.
pub struct HttpGeocoder {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    /// Appended to queries to bias results toward the service area.
    region_hint: String,
}

impl HttpGeocoder {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            region_hint: "Nairobi, Kenya".to_string(),
        }
    }

    /// Point at a different geocode endpoint (sandboxes, tests).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, LogisticsError> {
        let address = format!("{location}, {}", self.region_hint);
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address.as_str()), ("key", self.api_key.expose_secret())])
            .send()
            .await
            .map_err(|e| LogisticsError::Geocode(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LogisticsError::Geocode(format!(
                "geocode endpoint returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LogisticsError::Geocode(e.to_string()))?;

        let location = body
            .get("results")
            .and_then(|r| r.get(0))
            .and_then(|r| r.pointer("/geometry/location"));

        match location {
            Some(loc) => {
                let lat = loc.get("lat").and_then(|v| v.as_f64());
                let lng = loc.get("lng").and_then(|v| v.as_f64());
                match (lat, lng) {
                    (Some(lat), Some(lng)) => Ok(Some(Coordinates { lat, lng })),
                    _ => Ok(None),
                }
            }
            None => Ok(None),
        }
    }
}

/// Resolves locations to logistics quotes.
pub struct LogisticsResolver {
    geocoder: Arc<dyn Geocoder>,
    surcharges: SurchargeConfig,
    utc_offset_hours: i32,
    geocode_timeout: Duration,
}

impl LogisticsResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        surcharges: SurchargeConfig,
        utc_offset_hours: i32,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            surcharges,
            utc_offset_hours,
            geocode_timeout,
        }
    }

    /// Resolve a free-text location at a given instant.
    ///
    /// The instant is a parameter (not the process clock) so that fee
    /// computation is deterministic under test.
    pub async fn resolve(&self, location_text: &str, now: DateTime<Utc>) -> LogisticsQuote {
        // 1. Gazetteer of known neighborhoods.
        if let Some((coords, zone)) = lookup_gazetteer(location_text) {
            let distance = haversine_km(coords, REFERENCE_POINT);
            return self.quote(location_text, band_for_zone(zone), distance, Some(coords), now);
        }

        // 2. External geocoding, bounded and absorbed on failure.
        match tokio::time::timeout(self.geocode_timeout, self.geocoder.geocode(location_text)).await
        {
            Ok(Ok(Some(coords))) => {
                let distance = haversine_km(coords, REFERENCE_POINT);
                let band = band_for_distance(distance);
                return self.quote(location_text, band, distance, Some(coords), now);
            }
            Ok(Ok(None)) => {
                tracing::debug!(location = location_text, "Geocoder had no result");
            }
            Ok(Err(e)) => {
                tracing::warn!(location = location_text, "Geocoding failed: {e}");
            }
            Err(_) => {
                tracing::warn!(
                    location = location_text,
                    timeout = ?self.geocode_timeout,
                    "Geocoding timed out"
                );
            }
        }

        // 3. Fallback: mid-range zone, documented default distance.
        self.quote(
            location_text,
            band_for_zone(FALLBACK_ZONE),
            FALLBACK_DISTANCE_KM,
            None,
            now,
        )
    }

    fn quote(
        &self,
        location: &str,
        band: &ZoneBand,
        distance_km: f64,
        coordinates: Option<Coordinates>,
        now: DateTime<Utc>,
    ) -> LogisticsQuote {
        let surcharge = self.time_surcharge(now);
        let adjustment = band_adjustment(band, distance_km);
        let total = (band.base_fee + surcharge + adjustment).max(Decimal::ZERO);

        LogisticsQuote {
            location: location.to_string(),
            zone: band.zone,
            distance_km,
            coordinates,
            base_fee: band.base_fee,
            surcharge,
            adjustment,
            total_fee: total,
            eta: band.eta.to_string(),
        }
    }

    /// Deterministic time-of-day surcharge: weekday rush hours, flat weekend.
    fn time_surcharge(&self, now: DateTime<Utc>) -> Decimal {
        let offset = FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        let local = now.with_timezone(&offset);
        let hour = local.hour();

        match local.weekday() {
            Weekday::Sat | Weekday::Sun => self.surcharges.weekend,
            _ if (7..=9).contains(&hour) || (17..=19).contains(&hour) => self.surcharges.rush_hour,
            _ => Decimal::ZERO,
        }
    }
}

/// Case-insensitive substring match against the gazetteer, both directions
/// (user text contains the known name, or the known name contains the text).
fn lookup_gazetteer(location_text: &str) -> Option<(Coordinates, Zone)> {
    let clean = location_text.trim().to_lowercase();
    if clean.is_empty() {
        return None;
    }
    GAZETTEER
        .iter()
        .find(|(name, _, _, _)| clean.contains(name) || name.contains(clean.as_str()))
        .map(|(_, lat, lng, zone)| (Coordinates { lat: *lat, lng: *lng }, *zone))
}

/// Great-circle distance between two points, in km.
fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    let km = EARTH_RADIUS_KM * c;
    (km * 10.0).round() / 10.0
}

/// Linear adjustment over the upper half of the band: nothing up to the
/// midpoint, then 10 units per km beyond it. Bands with an infinite upper
/// bound have no midpoint and no adjustment.
fn band_adjustment(band: &ZoneBand, distance_km: f64) -> Decimal {
    if band.max_km.is_infinite() {
        return Decimal::ZERO;
    }
    let midpoint = (band.min_km + band.max_km) / 2.0;
    if distance_km <= midpoint {
        return Decimal::ZERO;
    }
    let units = ((distance_km - midpoint) * 10.0).round() as i64;
    Decimal::from(units.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn resolver() -> LogisticsResolver {
        LogisticsResolver::new(
            Arc::new(NoopGeocoder),
            SurchargeConfig::default(),
            3,
            Duration::from_millis(100),
        )
    }

    /// Wednesday 2025-06-11 12:00 local (09:00 UTC) — no surcharge window.
    fn off_peak() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn westlands_resolves_to_zone_a() {
        let quote = resolver().resolve("Westlands", off_peak()).await;
        assert_eq!(quote.zone, Zone::A);
        assert_eq!(quote.base_fee, dec!(200));
        assert_eq!(quote.eta, "15-30 mins");
        assert_eq!(quote.surcharge, Decimal::ZERO);
        assert_eq!(quote.total_fee, quote.base_fee + quote.adjustment);
    }

    #[tokio::test]
    async fn resolution_is_deterministic() {
        let r = resolver();
        let a = r.resolve("Westlands, ABC Street", off_peak()).await;
        let b = r.resolve("Westlands, ABC Street", off_peak()).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn gazetteer_matches_substrings_both_ways() {
        let r = resolver();
        // User text containing a known name.
        let a = r.resolve("near Kilimani, Nairobi", off_peak()).await;
        assert_eq!(a.zone, Zone::A);
        // Known name containing the user text.
        let b = r.resolve("athi", off_peak()).await;
        assert_eq!(b.zone, Zone::D);
    }

    #[tokio::test]
    async fn unknown_location_falls_back_to_mid_range() {
        let quote = resolver().resolve("Atlantis", off_peak()).await;
        assert_eq!(quote.zone, FALLBACK_ZONE);
        assert_eq!(quote.distance_km, FALLBACK_DISTANCE_KM);
        assert!(quote.coordinates.is_none());
        assert_eq!(quote.base_fee, dec!(400));
    }

    #[tokio::test]
    async fn weekday_rush_hour_surcharge() {
        // Wednesday 08:00 local = 05:00 UTC.
        let rush = Utc.with_ymd_and_hms(2025, 6, 11, 5, 0, 0).unwrap();
        let quote = resolver().resolve("Westlands", rush).await;
        assert_eq!(quote.surcharge, dec!(50));
    }

    #[tokio::test]
    async fn weekend_surcharge() {
        // Saturday 2025-06-14, 12:00 local.
        let weekend = Utc.with_ymd_and_hms(2025, 6, 14, 9, 0, 0).unwrap();
        let quote = resolver().resolve("Westlands", weekend).await;
        assert_eq!(quote.surcharge, dec!(100));
    }

    #[tokio::test]
    async fn fee_is_never_negative() {
        let quote = resolver().resolve("cbd", off_peak()).await;
        assert!(quote.total_fee >= Decimal::ZERO);
        assert!(quote.base_fee >= Decimal::ZERO);
    }

    #[test]
    fn adjustment_kicks_in_past_midpoint() {
        let band = band_for_zone(Zone::A); // [0, 3), midpoint 1.5
        assert_eq!(band_adjustment(band, 1.0), Decimal::ZERO);
        assert_eq!(band_adjustment(band, 1.5), Decimal::ZERO);
        assert_eq!(band_adjustment(band, 2.5), dec!(10));
    }

    #[test]
    fn no_adjustment_for_open_ended_band() {
        let band = band_for_zone(Zone::E);
        assert_eq!(band_adjustment(band, 100.0), Decimal::ZERO);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_km(REFERENCE_POINT, REFERENCE_POINT), 0.0);
    }

    #[test]
    fn haversine_known_distance() {
        // CBD to Thika is roughly 38 km as the crow flies.
        let thika = Coordinates {
            lat: -1.05,
            lng: 37.07,
        };
        let d = haversine_km(REFERENCE_POINT, thika);
        assert!((30.0..50.0).contains(&d), "unexpected distance {d}");
    }
}
