use crate::structs::{EtaEntry, RouteGroup};

use chrono::{DateTime, FixedOffset};
use teloxide::utils::html;

pub const NO_ROUTES_TEXT: &str = "No bus route information";

#[derive(Debug, Clone, PartialEq)]
pub enum EtaView {
    /// Every entry had a null ETA.
    NoRoutes,
    Routes(Vec<RouteGroup>),
}

/// Drops null ETAs and groups the rest by (route, direction), keeping the
/// order in which each group and each time first appears.
pub fn build_eta_view(entries: &[EtaEntry], offset: Option<FixedOffset>) -> EtaView {
    let mut keys: Vec<(&str, &str)> = vec![];
    let mut groups: Vec<RouteGroup> = vec![];

    for entry in entries {
        let Some(eta) = &entry.eta else { continue };
        let key = (entry.route.as_str(), entry.dir.as_str());
        let idx = match keys.iter().position(|k| *k == key) {
            Some(i) => i,
            None => {
                keys.push(key);
                groups.push(RouteGroup {
                    route: entry.route.clone(),
                    dest: entry.dest_en.clone(),
                    times: vec![],
                });
                groups.len() - 1
            }
        };
        groups[idx].times.push(format_time(eta, offset));
    }

    if groups.is_empty() {
        EtaView::NoRoutes
    } else {
        EtaView::Routes(groups)
    }
}

/// 12-hour clock, e.g. `6:05 PM`. Without `offset` the timestamp's own
/// offset is kept.
pub fn format_time(time: &DateTime<FixedOffset>, offset: Option<FixedOffset>) -> String {
    const FORMAT: &str = "%-I:%M %p";
    match offset {
        Some(offset) => time.with_timezone(&offset).format(FORMAT).to_string(),
        None => time.format(FORMAT).to_string(),
    }
}

impl EtaView {
    pub fn render_html(&self) -> String {
        self.render_html_within(usize::MAX)
    }

    /// Renders whole route blocks while they fit in `max_chars`, then notes
    /// how many routes were left out.
    pub fn render_html_within(&self, max_chars: usize) -> String {
        let groups = match self {
            EtaView::NoRoutes => return NO_ROUTES_TEXT.to_string(),
            EtaView::Routes(groups) => groups,
        };

        let mut out = String::new();
        let mut used = 0;
        for (i, group) in groups.iter().enumerate() {
            let block = render_group(group);
            let sep = if out.is_empty() { 0 } else { 2 };
            let len = block.chars().count();
            if used + sep + len > max_chars {
                out.push_str(&format!("\n\n… {} more routes", groups.len() - i));
                break;
            }
            if sep > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&block);
            used += sep + len;
        }
        out
    }
}

fn render_group(group: &RouteGroup) -> String {
    format!(
        "{}  {}\n<b>ETA:</b> <code>{}</code>",
        html::bold(&html::escape(&group.route)),
        html::escape(&group.dest.to_lowercase()),
        group.times.join("    ")
    )
}
