//! Geo/pricing resolution: zones, gazetteer, and fee computation.

pub mod resolver;
pub mod zones;

pub use resolver::{Geocoder, HttpGeocoder, LogisticsQuote, LogisticsResolver, NoopGeocoder};
pub use zones::{Coordinates, Zone, ZoneBand, band_for_distance, band_for_zone};
