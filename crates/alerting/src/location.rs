//! Approximate location lookup

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::notifier::LazyClient;
use crate::AlertError;

/// Default IP geolocation endpoint
pub const IPINFO_URL: &str = "https://ipinfo.io/json";

/// Best-effort position of the vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    /// "City, Region, Country" (parts may be missing)
    pub place: String,
}

impl Location {
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            self.lat, self.lon
        )
    }
}

pub trait Geolocator: Send + Sync {
    fn lookup(&self) -> Result<Location, AlertError>;
}

/// Always reports no location
#[derive(Debug, Default)]
pub struct NoLocation;

impl Geolocator for NoLocation {
    fn lookup(&self) -> Result<Location, AlertError> {
        Err(AlertError::LocationUnavailable("lookup disabled".into()))
    }
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    loc: Option<String>,
    #[serde(default)]
    city: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
}

impl IpInfoResponse {
    fn into_location(self) -> Option<Location> {
        let (lat, lon) = self.loc.as_deref()?.split_once(',')?;
        let lat = lat.trim().parse().ok()?;
        let lon = lon.trim().parse().ok()?;
        let place = [self.city, self.region, self.country]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        Some(Location { lat, lon, place })
    }
}

/// IP-based lookup via ipinfo.io
pub struct IpInfoLocator {
    url: String,
    client: LazyClient,
}

impl IpInfoLocator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        Ok(Self {
            url: url.into(),
            client: LazyClient::new(timeout),
        })
    }
}

impl Geolocator for IpInfoLocator {
    fn lookup(&self) -> Result<Location, AlertError> {
        let response = self.client.get()?.get(&self.url).send()?;
        if !response.status().is_success() {
            return Err(AlertError::LocationUnavailable(format!("HTTP {}", response.status())));
        }
        let body: IpInfoResponse = response.json()?;
        let location = body
            .into_location()
            .ok_or_else(|| AlertError::LocationUnavailable("response has no coordinates".into()))?;
        debug!("Located at {} ({})", location.place, location.maps_url());
        Ok(location)
    }
}
