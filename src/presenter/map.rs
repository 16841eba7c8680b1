use crate::geo::distance_meters;
use crate::structs::{Stop, UserPosition};

pub const OSM_TILE_SOURCE: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
/// Hong Kong.
pub const DEFAULT_CENTER: (f64, f64) = (22.3193, 114.1694);
pub const DEFAULT_ZOOM: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerIcon {
    BusStop,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub icon: MarkerIcon,
    /// Fraction of the icon (x, y) pinned to the coordinate.
    pub anchor: (f64, f64),
}

/// Drawing surface the map presenter delegates to.
pub trait MapWidget {
    fn init(&mut self, tile_source: &str, center: (f64, f64), zoom: f64);
    fn set_center(&mut self, lat: f64, lon: f64);
    fn set_zoom(&mut self, zoom: f64);
    fn clear_markers(&mut self);
    fn add_marker(&mut self, marker: Marker);
    fn set_visible(&mut self, visible: bool);
}

/// Zoom step for a stop `distance` meters away; closer stops zoom further in.
pub fn zoom_for_distance(distance: f64) -> f64 {
    match distance {
        d if d < 100.0 => 18.0,
        d if d < 200.0 => 17.5,
        d if d < 300.0 => 17.0,
        d if d < 400.0 => 16.5,
        d if d < 500.0 => 16.0,
        _ => 15.0,
    }
}

#[derive(Debug, Clone)]
pub struct MapPresenter<W> {
    widget: W,
    visible: bool,
}

impl<W: MapWidget> MapPresenter<W> {
    pub fn new(mut widget: W) -> Self {
        widget.init(OSM_TILE_SOURCE, DEFAULT_CENTER, DEFAULT_ZOOM);
        widget.set_visible(false);
        Self {
            widget,
            visible: false,
        }
    }

    /// Frames `stop` and `user` together and reveals the map.
    pub fn focus(&mut self, stop: &Stop, user: UserPosition) {
        let mid_lat = (stop.lat + user.lat) / 2.0;
        let mid_lon = (stop.long + user.lon) / 2.0;
        let distance = distance_meters(user.lat, user.lon, stop.lat, stop.long);

        self.widget.set_center(mid_lat, mid_lon);
        self.widget.set_zoom(zoom_for_distance(distance));

        self.widget.clear_markers();
        self.widget.add_marker(Marker {
            lat: stop.lat,
            lon: stop.long,
            icon: MarkerIcon::BusStop,
            anchor: (0.5, 1.0),
        });
        self.widget.add_marker(Marker {
            lat: user.lat,
            lon: user.lon,
            icon: MarkerIcon::User,
            anchor: (0.5, 1.0),
        });

        self.widget.set_visible(true);
        self.visible = true;
    }

    pub fn close(&mut self) {
        self.widget.set_visible(false);
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }
}

//////////////////////////////////////////////////////////
// OpenStreetMap link widget
//////////////////////////////////////////////////////////
/// Map widget for chat clients: the "surface" is an OpenStreetMap link
/// centered on the view with a pin on the bus stop.
#[derive(Debug, Clone, Default)]
pub struct LinkMap {
    center: (f64, f64),
    zoom: f64,
    markers: Vec<Marker>,
    visible: bool,
}

impl MapWidget for LinkMap {
    fn init(&mut self, tile_source: &str, center: (f64, f64), zoom: f64) {
        log::debug!("Map initialized with tiles from {}", tile_source);
        self.center = center;
        self.zoom = zoom;
    }

    fn set_center(&mut self, lat: f64, lon: f64) {
        self.center = (lat, lon);
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    fn clear_markers(&mut self) {
        self.markers.clear();
    }

    fn add_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

impl LinkMap {
    /// `None` while the map is hidden.
    pub fn url(&self) -> Option<String> {
        if !self.visible {
            return None;
        }
        // osm.org only takes whole zoom levels
        let zoom = self.zoom.floor() as u8;
        let (lat, lon) = self.center;
        let pin = self
            .markers
            .iter()
            .find(|m| m.icon == MarkerIcon::BusStop)
            .map(|m| format!("?mlat={:.6}&mlon={:.6}", m.lat, m.lon))
            .unwrap_or_default();
        Some(format!(
            "https://www.openstreetmap.org/{}#map={}/{:.6}/{:.6}",
            pin, zoom, lat, lon
        ))
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }
}
