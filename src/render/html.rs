use serde_json::{json, Value};

use crate::render::present::{DonorPage, PageMeta};

const LEAFLET_CSS: &str =
    r#"<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">"#;
const LEAFLET_JS: &str =
    r#"<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>"#;

const PAGE_STYLE: &str = r#"<style>
body { max-width: 1200px; margin: 16px auto; padding: 0 12px; font-family: system-ui, -apple-system, "Segoe UI", Roboto, Arial, sans-serif; }
h1 { font-size: 22px; margin: 10px 0 4px 0; }
.meta { margin: 0 0 18px 0; font-size: 16px; opacity: 0.9; }
section { margin: 24px 0; padding: 12px 0; border-top: 1px solid rgba(0,0,0,0.08); }
section h2 { margin: 0 0 10px 0; }
.row { display: grid; grid-template-columns: 1.2fr 1fr; gap: 12px; align-items: start; }
.map { height: 260px; border-radius: 12px; overflow: hidden; border: 1px solid rgba(0,0,0,0.12); }
.list { border: 1px solid rgba(0,0,0,0.12); border-radius: 12px; padding: 10px 12px; min-height: 260px; }
.note { font-size: 13px; opacity: 0.8; margin-bottom: 8px; }
ol { margin: 0; padding-left: 18px; }
li { margin: 6px 0; }
.kind { opacity: 0.85; }
</style>"#;

/// Per-donor map wiring. The base map is always drawn, markers or not, so an
/// empty donor never shows up as a blank white box.
const DRAW_SCRIPT: &str = r#"function drawDonorMap(page) {
  var map = L.map(page.containerId, { zoomControl: true }).setView([20, 0], 2);
  L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
    maxZoom: 6,
    attribution: "&copy; OpenStreetMap"
  }).addTo(map);
  var overlays = {
    "Commitments": L.layerGroup(),
    "Disbursements": L.layerGroup()
  };
  for (var i = 0; i < page.markers.length; i++) {
    var m = page.markers[i];
    var group = m.layer === "commitments" ? overlays["Commitments"] : overlays["Disbursements"];
    L.circleMarker([m.lat, m.lon], { radius: m.radius }).bindPopup(m.popup).addTo(group);
  }
  overlays["Commitments"].addTo(map);
  overlays["Disbursements"].addTo(map);
  if (page.toggle) {
    L.control.layers(null, overlays).addTo(map);
  }
}
for (var p = 0; p < PAGES.length; p++) {
  drawDonorMap(PAGES[p]);
}"#;

/// Escape text destined for HTML bodies and attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// The script-side view of one donor: container identity plus the markers
/// that survived position resolution. Items without a position never reach
/// this point; they only appear in the ranked list.
fn page_script_value(page: &DonorPage) -> Value {
    let mut markers = Vec::new();

    for item in &page.items {
        let (position, radius) = match (item.position, item.radius) {
            (Some(position), Some(radius)) => (position, radius),
            _ => continue,
        };

        let popup = format!(
            "<strong>{}</strong><br>Commitments: {} | Disbursements: {}",
            escape_html(&item.label),
            item.commitments_formatted,
            item.disbursements_formatted
        );
        let marker = |layer: &str| {
            json!({
                "lat": position.lat,
                "lon": position.lon,
                "radius": radius,
                "popup": popup,
                "layer": layer,
            })
        };

        if item.commitments > 0.0 {
            markers.push(marker("commitments"));
        }
        if item.disbursements > 0.0 {
            markers.push(marker("disbursements"));
        }
        // Zero-amount recipients stay visible on the default flow layer.
        if item.commitments <= 0.0 && item.disbursements <= 0.0 {
            markers.push(marker("disbursements"));
        }
    }

    let has_commitments = markers.iter().any(|m| m["layer"] == "commitments");
    let has_disbursements = markers.iter().any(|m| m["layer"] == "disbursements");

    json!({
        "containerId": page.container_id,
        "markers": markers,
        "toggle": has_commitments && has_disbursements,
    })
}

/// Render one self-contained page: header, one section per donor with the
/// map container and the ranked list, and the Leaflet wiring at the bottom.
pub fn render_document(meta: &PageMeta, pages: &[DonorPage]) -> String {
    let title = match meta.year {
        Some(year) => format!("Humanitarian funding TOP10 – {}", year),
        None => String::from("Humanitarian funding TOP10"),
    };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
    html.push_str(LEAFLET_CSS);
    html.push('\n');
    html.push_str(PAGE_STYLE);
    html.push_str("\n</head>\n<body>\n");

    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
    html.push_str(
        "<p class=\"meta\">Data: OCHA Financial Tracking Service (FTS) – humanitarian funding (reported)",
    );
    if let Some(updated) = &meta.updated {
        html.push_str(&format!(". Updated: {}", escape_html(updated)));
    }
    html.push_str("</p>\n");

    for page in pages {
        html.push_str("<section>\n");
        html.push_str(&format!("<h2>{}</h2>\n", escape_html(&page.donor_key)));
        html.push_str("<div class=\"row\">\n");
        html.push_str(&format!(
            "<div id=\"{}\" class=\"map\"></div>\n",
            page.container_id
        ));
        html.push_str("<div class=\"list\">\n");
        html.push_str("<div class=\"note\">Commitments and disbursements as separate values.</div>\n");
        html.push_str("<ol>\n");
        if let Some(message) = page.empty_message {
            html.push_str(&format!("<li>{}</li>\n", escape_html(message)));
        } else {
            for item in &page.items {
                html.push_str(&format!(
                    "<li><strong>{}</strong><br><span class=\"kind\">Commitments:</span> {} &nbsp;|&nbsp; <span class=\"kind\">Disbursements:</span> {}</li>\n",
                    escape_html(&item.label),
                    escape_html(&item.commitments_formatted),
                    escape_html(&item.disbursements_formatted),
                ));
            }
        }
        html.push_str("</ol>\n</div>\n</div>\n</section>\n");
    }

    html.push_str(LEAFLET_JS);
    html.push('\n');

    let page_values: Vec<Value> = pages.iter().map(page_script_value).collect();
    // "</" must not appear verbatim inside a script block; the escaped form
    // is still valid JSON.
    let blob = serde_json::to_string(&page_values)
        .unwrap()
        .replace("</", "<\\/");
    html.push_str("<script>\nvar PAGES = ");
    html.push_str(&blob);
    html.push_str(";\n");
    html.push_str(DRAW_SCRIPT);
    html.push_str("\n</script>\n</body>\n</html>\n");

    html
}
