//! Page metadata read from the DOM at the moment of a connection-type request.

use serde_json::Value;

use crate::protocol::{PageMetadata, RpcRequest};
use crate::window::{IconLink, PageDocument};

/// Leading numeric token of a `sizes` attribute: `"32x32"` → 32.
/// Missing, `"any"` and other non-numeric values count as 0.
fn leading_size(sizes: Option<&str>) -> u32 {
    let Some(sizes) = sizes else { return 0 };
    let digits: String = sizes
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// The href of the largest icon. The first link wins ties; no links yields "".
pub fn largest_icon(links: &[IconLink]) -> String {
    let mut best: Option<(&IconLink, u32)> = None;
    for link in links {
        let size = leading_size(link.sizes.as_deref());
        match best {
            Some((_, current)) if current >= size => {}
            _ => best = Some((link, size)),
        }
    }
    best.map(|(link, _)| link.href.clone()).unwrap_or_default()
}

pub fn page_metadata(document: &dyn PageDocument) -> PageMetadata {
    PageMetadata {
        title: document.title(),
        icon: largest_icon(&document.icon_links()),
    }
}

/// Append `{ title, icon }` as the last param.
pub fn enrich(request: &mut RpcRequest, document: &dyn PageDocument) {
    let metadata = page_metadata(document);
    match serde_json::to_value(&metadata) {
        Ok(value) => request.params.push(value),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode page metadata");
            request.params.push(Value::Null);
        }
    }
}
