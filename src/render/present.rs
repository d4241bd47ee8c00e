use serde::Serialize;

use crate::{page_id, DonorView, Position};

/// Shown in place of the ranked list when a donor reported nothing.
pub const NO_DATA_MESSAGE: &str = "No data / no reported TOP10 entries.";

/// Marker radius bounds in pixels. A zero amount still draws at the minimum
/// so every positioned recipient stays visible; outliers clamp to the
/// maximum so one flow cannot blot out the map.
pub const MIN_RADIUS: f64 = 4.0;
pub const MAX_RADIUS: f64 = 24.0;

/// One recipient row, render-ready. The raw amounts ride along with their
/// formatted forms so the renderer can decide overlay membership without
/// reparsing text.
#[derive(Debug, Clone, Serialize)]
pub struct PageItem {
    pub label: String,
    pub commitments: f64,
    pub disbursements: f64,
    pub commitments_formatted: String,
    pub disbursements_formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

/// Presentation model for one donor. `container_id` is the injected target
/// identity; the renderer never resolves containers on its own.
#[derive(Debug, Clone, Serialize)]
pub struct DonorPage {
    pub donor_key: String,
    pub container_id: String,
    pub items: Vec<PageItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

impl DonorPage {
    pub fn build(view: &DonorView) -> DonorPage {
        let items = view
            .items
            .iter()
            .map(|flow| PageItem {
                label: flow.recipient.clone(),
                commitments: flow.commitments,
                disbursements: flow.disbursements,
                commitments_formatted: fmt_usd(flow.commitments),
                disbursements_formatted: fmt_usd(flow.disbursements),
                position: flow.position,
                // Radius only matters for items that reach marker placement.
                radius: flow.position.map(|_| marker_radius(flow.total())),
            })
            .collect();

        DonorPage {
            donor_key: view.donor_key.clone(),
            container_id: page_id(&view.donor_key),
            items,
            empty_message: if view.has_data {
                None
            } else {
                Some(NO_DATA_MESSAGE)
            },
        }
    }
}

/// Header metadata for one rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    pub year: Option<i64>,
    pub updated: Option<String>,
}

/// Integer-rounded, comma-grouped USD amount. Non-finite input renders as a
/// dash, never "NaN" or an empty string.
pub fn fmt_usd(amount: f64) -> String {
    if !amount.is_finite() {
        return String::from("–");
    }

    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded < 0 {
        format!("-{} USD", grouped)
    } else {
        format!("{} USD", grouped)
    }
}

/// Square-root scaling keeps the largest flows from dominating while small
/// ones stay distinguishable, clamped to the visual range above.
pub fn marker_radius(total: f64) -> f64 {
    if !total.is_finite() || total <= 0.0 {
        return MIN_RADIUS;
    }
    (total.sqrt() / 600.0).clamp(MIN_RADIUS, MAX_RADIUS)
}
