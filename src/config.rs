use chrono::FixedOffset;

pub const DEFAULT_API_BASE: &str = "https://data.etabus.gov.hk/v1/transport/kmb";
pub const DEFAULT_RADIUS: u32 = 500;
/// Choices offered on the radius keyboard, in meters.
pub const RADIUS_CHOICES: [u32; 5] = [100, 200, 300, 500, 1000];
/// Telegram rejects inline keyboards with more than 100 buttons.
pub const MAX_LISTED_STOPS: usize = 80;
pub const STOP_LIST_CACHE_KEY: &str = "StopList";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub default_radius: u32,
    /// Offset ETAs are displayed in. `None` keeps the offset each
    /// timestamp arrives with (+08:00 for KMB).
    pub display_offset: Option<FixedOffset>,
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let api_base = std::env::var("KMB_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let default_radius = match std::env::var("DEFAULT_RADIUS") {
            Ok(raw) => match raw.parse::<u32>() {
                Ok(r) if r > 0 => r,
                _ => {
                    log::warn!("Ignoring invalid DEFAULT_RADIUS={:?}", raw);
                    DEFAULT_RADIUS
                }
            },
            Err(_) => DEFAULT_RADIUS,
        };

        let display_offset = match std::env::var("ETA_UTC_OFFSET") {
            Ok(raw) => {
                let parsed = parse_offset(&raw);
                if parsed.is_none() {
                    log::warn!("Ignoring invalid ETA_UTC_OFFSET={:?}", raw);
                }
                parsed
            }
            Err(_) => None,
        };

        Config {
            api_base,
            default_radius,
            display_offset,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base: DEFAULT_API_BASE.to_string(),
            default_radius: DEFAULT_RADIUS,
            display_offset: None,
        }
    }
}

/// Parses `+08:00` / `-05:30` style offsets.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    raw.trim().parse::<FixedOffset>().ok()
}
