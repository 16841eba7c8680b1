use crate::api::TransitApi;
use crate::cache::SessionCache;
use crate::config::STOP_LIST_CACHE_KEY;
use crate::error::FetchError;
use crate::structs::Stop;

/// Returns the stop catalog, fetching it only when the session cache is empty.
pub async fn load_catalog<A, C>(api: &A, cache: &C) -> Result<Vec<Stop>, FetchError>
where
    A: TransitApi,
    C: SessionCache,
{
    if let Some(cached) = cache.get(STOP_LIST_CACHE_KEY) {
        match serde_json::from_str::<Vec<Stop>>(&cached) {
            Ok(stops) => return Ok(stops),
            Err(e) => log::warn!("Discarding unreadable cached stop list: {}", e),
        }
    }

    let stops = api.stop_list().await?;
    log::info!("Fetched {} stops", stops.len());
    cache.set(STOP_LIST_CACHE_KEY, serde_json::to_string(&stops)?);
    Ok(stops)
}
