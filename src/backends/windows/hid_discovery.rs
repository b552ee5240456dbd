//! Friendly device names via `hidapi`.
//!
//! Raw Input only knows interface paths. `hidapi` enumerates the same HID interfaces with their
//! product strings, so a case-insensitive path match gives most keyboards, mice and HIDs a
//! readable name. Devices hidapi cannot see keep an empty name and get a generated label in the
//! catalog.

#![cfg(target_os = "windows")]

use crate::metadata::DeviceRecord;
use std::collections::HashMap;

/// `lowercase path → product string` for every HID interface hidapi can list.
#[cfg(feature = "hid")]
pub(crate) fn product_names() -> HashMap<String, String> {
    let api = match hidapi::HidApi::new() {
        Ok(api) => api,
        Err(e) => {
            log::warn!("hidapi unavailable, device names fall back to labels: {}", e);
            return HashMap::new();
        }
    };

    let mut names = HashMap::new();
    for info in api.device_list() {
        let Some(product) = info.product_string().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        let path = info.path().to_string_lossy().to_ascii_lowercase();
        names.insert(path, product.to_string());
    }
    log::debug!("hidapi: {} named interface(s)", names.len());
    names
}

#[cfg(not(feature = "hid"))]
pub(crate) fn product_names() -> HashMap<String, String> {
    HashMap::new()
}

/// Fill empty record names from `names`.
pub(crate) fn apply_names(records: &mut [DeviceRecord], names: &HashMap<String, String>) {
    for rec in records.iter_mut().filter(|r| r.name.trim().is_empty()) {
        if let Some(name) = rec.path.as_deref().and_then(|p| names.get(&p.to_ascii_lowercase())) {
            rec.name = name.clone();
        }
    }
}
