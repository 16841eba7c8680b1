use crate::error::FetchError;
use crate::presenter::eta::{build_eta_view, EtaView};
use crate::structs::{EtaEntry, NearbyStop, Stop};

use chrono::FixedOffset;
use teloxide::utils::html;

pub const LOADING_TEXT: &str = "Loading...";
pub const UNAVAILABLE_TEXT: &str = "No ETA information available";
pub const FAILED_TEXT: &str = "Failed to load ETA data";
/// Keeps the list message under Telegram's 4096 character cap.
pub const ETA_BLOCK_LIMIT: usize = 3000;

/// Content of the ETA region attached to one list entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EtaRegion {
    Empty,
    Loading,
    /// The stop answered with no data at all.
    Unavailable,
    Failed,
    View(EtaView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub nearby: NearbyStop,
    pub region: EtaRegion,
}

/// What the caller has to do after a click.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickEffect {
    FetchEta { index: usize, stop_id: String },
    CloseMap,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEffect {
    FocusMap(Stop),
    None,
}

/// Ranked stops plus the expand/highlight selection.
///
/// At most one entry is expanded and at most one is highlighted; the
/// highlighted entry, when set, is always the expanded one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    entries: Vec<ListEntry>,
    expanded: Option<usize>,
    highlighted: Option<usize>,
}

impl ListState {
    pub fn new(nearby: Vec<NearbyStop>) -> Self {
        Self {
            entries: nearby
                .into_iter()
                .map(|nearby| ListEntry {
                    nearby,
                    region: EtaRegion::Empty,
                })
                .collect(),
            expanded: None,
            highlighted: None,
        }
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn expanded(&self) -> Option<usize> {
        self.expanded
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded == Some(index)
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        self.highlighted == Some(index)
    }

    /// Toggles the ETA region of entry `index`.
    pub fn click(&mut self, index: usize) -> ClickEffect {
        let Some(entry) = self.entries.get_mut(index) else {
            return ClickEffect::Ignored;
        };

        if self.expanded == Some(index) {
            self.expanded = None;
            self.highlighted = None;
            return ClickEffect::CloseMap;
        }

        // Opening this entry implicitly collapses the previous one.
        entry.region = EtaRegion::Loading;
        let stop_id = entry.nearby.stop.id.clone();
        self.expanded = Some(index);
        self.highlighted = Some(index);
        ClickEffect::FetchEta { index, stop_id }
    }

    /// Renders a finished ETA request into the region of entry `index`.
    ///
    /// Superseded requests are not cancelled: a late answer still lands in
    /// its own entry's region, even if that entry has been collapsed.
    pub fn complete_fetch(
        &mut self,
        index: usize,
        result: Result<Vec<EtaEntry>, FetchError>,
        offset: Option<FixedOffset>,
    ) -> CompletionEffect {
        let Some(entry) = self.entries.get_mut(index) else {
            return CompletionEffect::None;
        };

        match result {
            Ok(etas) if !etas.is_empty() => {
                entry.region = EtaRegion::View(build_eta_view(&etas, offset));
                CompletionEffect::FocusMap(entry.nearby.stop.clone())
            }
            Ok(_) => {
                entry.region = EtaRegion::Unavailable;
                CompletionEffect::None
            }
            Err(e) => {
                log::error!("Error fetching ETA: {}", e);
                entry.region = EtaRegion::Failed;
                if self.highlighted == Some(index) {
                    self.highlighted = None;
                }
                CompletionEffect::None
            }
        }
    }

    /// Button caption, e.g. `123m · CHUK YUEN ESTATE`.
    pub fn entry_label(&self, index: usize) -> Option<String> {
        let entry = self.entries.get(index)?;
        let marker = if self.is_highlighted(index) { "▶ " } else { "" };
        Some(format!(
            "{}{}m · {}",
            marker,
            entry.nearby.distance.round() as u64,
            entry.nearby.stop.name_en
        ))
    }

    /// HTML block for the expanded entry, `None` when nothing is expanded.
    pub fn render_expanded(&self) -> Option<String> {
        let index = self.expanded?;
        let entry = &self.entries[index];
        let body = match &entry.region {
            EtaRegion::Empty | EtaRegion::Loading => LOADING_TEXT.to_string(),
            EtaRegion::Unavailable => UNAVAILABLE_TEXT.to_string(),
            EtaRegion::Failed => FAILED_TEXT.to_string(),
            EtaRegion::View(view) => view.render_html_within(ETA_BLOCK_LIMIT),
        };
        Some(format!(
            "<b>D</b>istance: {}m <b>S</b>top: <b>{}</b>\n\n{}",
            entry.nearby.distance.round() as u64,
            html::escape(&entry.nearby.stop.name_en),
            body
        ))
    }
}
