use crate::api::TransitApi;
use crate::cache::SessionCache;
use crate::catalog::load_catalog;
use crate::error::LocateError;
use crate::geo::distance_meters;
use crate::structs::*;

use std::future::Future;

/// One-shot source of the user's position.
pub trait Geolocator {
    fn current_position(&self) -> impl Future<Output = Result<UserPosition, LocateError>> + Send;
}

/// Position last shared by the user in the chat, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedLocation(pub Option<UserPosition>);

impl Geolocator for SharedLocation {
    async fn current_position(&self) -> Result<UserPosition, LocateError> {
        let pos = self.0.ok_or(LocateError::GeolocationUnavailable)?;
        if !(-90.0..=90.0).contains(&pos.lat) || !(-180.0..=180.0).contains(&pos.lon) {
            return Err(LocateError::GeolocationFailed(format!(
                "coordinates out of range ({}, {})",
                pos.lat, pos.lon
            )));
        }
        Ok(pos)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
    Found(Vec<NearbyStop>),
    /// Nothing within the radius. Informational, not a failure.
    Empty,
}

/// Parses a radius the way a numeric form field would: leading integer
/// digits win, anything non-numeric or not strictly positive is rejected.
pub fn parse_radius(input: &str) -> Result<u32, LocateError> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = &rest[..rest.bytes().take_while(u8::is_ascii_digit).count()];

    let invalid = || LocateError::InvalidRadius(input.to_string());
    if digits.is_empty() || negative {
        return Err(invalid());
    }
    // Only overflow can fail here; huge radii clamp to u32::MAX meters.
    match digits.parse::<u32>().unwrap_or(u32::MAX) {
        0 => Err(invalid()),
        r => Ok(r),
    }
}

/// Stops within `radius` meters of `position`, nearest first.
pub fn find_nearby(position: UserPosition, radius: u32, catalog: &[Stop]) -> Vec<NearbyStop> {
    let radius = f64::from(radius);
    let mut nearby: Vec<NearbyStop> = catalog
        .iter()
        .filter_map(|stop| {
            let distance = distance_meters(position.lat, position.lon, stop.lat, stop.long);
            (distance <= radius).then(|| NearbyStop {
                stop: stop.clone(),
                distance,
            })
        })
        .collect();

    // sort_by is stable, equal distances keep catalog order
    nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    nearby
}

/// Runs the whole locate flow: position, radius check, catalog, ranking.
///
/// An invalid radius is reported before any request is issued.
pub async fn locate<G, A, C>(
    geolocator: &G,
    api: &A,
    cache: &C,
    radius_input: &str,
) -> Result<(UserPosition, LocateOutcome), LocateError>
where
    G: Geolocator,
    A: TransitApi,
    C: SessionCache,
{
    log::info!("Finding nearby bus stops...");
    let position = geolocator.current_position().await?;
    log::debug!("Geolocation acquired: {:?}", position);

    let radius = parse_radius(radius_input)?;
    log::debug!("Radius selected: {}", radius);

    let catalog = load_catalog(api, cache).await?;
    let nearby = find_nearby(position, radius, &catalog);

    if nearby.is_empty() {
        log::info!("No nearby bus stops found.");
        return Ok((position, LocateOutcome::Empty));
    }
    log::info!("{} stops within {}m", nearby.len(), radius);
    Ok((position, LocateOutcome::Found(nearby)))
}
