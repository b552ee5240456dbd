//! Enumeration records.
//!
//! [`DeviceRecord`] is a lightweight, cloneable description of one enumerable device: display
//! name, class, OS handle and a stable UUID. Backends populate what they know; unknown fields
//! remain `None`.
//!
//! Records are produced fresh on every enumeration pass and replaced wholesale by the next one.
//! [`DeviceCatalog`] is the per-class, name-addressable collection the manager keeps between
//! passes.
//!
//! ## Identity
//! - `uuid` is derived from the device interface path (UUID v5), so the same physical device
//!   keeps its id across passes and process restarts. System devices use the nil UUID.
//! - The composite cache key appends the concrete wrapper type to the UUID, so one physical
//!   device bound through two wrapper types yields two distinct keys.
//!
//! ## Persistence notes
//! - `vid`/`pid` are generally stable and useful for re-identification.
//! - `path` is platform-specific and may change across ports and reconnects; treat it as
//!   diagnostic first, identity second.

use crate::device::{DeviceClass, DeviceHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Metadata describing one enumerable device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Display name, unique within its class after [`DeviceCatalog::from_records`].
    pub name: String,

    pub class: DeviceClass,

    /// Stable id (nil for the system device).
    pub uuid: Uuid,

    /// Raw-input device handle; null for system devices and joysticks.
    pub handle: DeviceHandle,

    /// OS device interface path (e.g. `\\?\HID#VID_046D&PID_C52B...`), if known.
    pub path: Option<String>,

    /// Setup class reported by the OS (`"Mouse"`, `"Keyboard"`, `"HIDClass"`...).
    pub class_name: Option<String>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    /// HID Usage Page (e.g. `0x01` for Generic Desktop), if known.
    pub usage_page: Option<u16>,

    /// HID Usage within the page, if known.
    pub usage: Option<u16>,

    /// Multimedia joystick id (`0..joyGetNumDevs()`), joysticks only.
    pub joystick_id: Option<i32>,
}

impl DeviceRecord {
    /// Bare record with a generated stable UUID (or nil when `path` is `None`).
    pub fn new(class: DeviceClass, name: impl Into<String>, handle: DeviceHandle, path: Option<String>) -> Self {
        let uuid = path
            .as_deref()
            .map(|p| Self::stable_uuid(class, p))
            .unwrap_or_else(Uuid::nil);
        Self {
            name: name.into(),
            class,
            uuid,
            handle,
            path,
            class_name: None,
            vid: None,
            pid: None,
            usage_page: None,
            usage: None,
            joystick_id: None,
        }
    }

    /// Record for the system (composite) device of `class`.
    pub fn system(class: DeviceClass) -> Self {
        let name = match class {
            DeviceClass::Keyboard => "System Keyboard",
            DeviceClass::Pointer => "System Mouse",
            DeviceClass::Joystick => "System Joystick",
            DeviceClass::Hid => "System HID",
        };
        let mut rec = Self::new(class, name, DeviceHandle::SYSTEM, None);
        rec.class_name = Some(
            match class {
                DeviceClass::Keyboard => "Keyboard",
                DeviceClass::Pointer => "Mouse",
                _ => "HIDClass",
            }
            .to_string(),
        );
        rec
    }

    /// Record for multimedia joystick `id`. The id doubles as the interface path, so each slot
    /// gets its own UUID.
    pub fn joystick(name: impl Into<String>, id: i32) -> Self {
        let mut rec = Self::new(DeviceClass::Joystick, name, DeviceHandle::SYSTEM, Some(format!("joystick:{id}")));
        rec.joystick_id = Some(id);
        rec
    }

    /// UUID v5 over `class` + interface path (case-insensitive, paths differ in case across APIs).
    pub fn stable_uuid(class: DeviceClass, path: &str) -> Uuid {
        let seed = format!("{:?}|{}", class, path.to_ascii_lowercase());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
    }

    /// Cache key: `"{uuid}_{wrapper}"`.
    pub fn composite_key(&self, wrapper: &str) -> String {
        format!("{}_{}", self.uuid, wrapper)
    }

    pub fn is_system(&self) -> bool {
        self.handle.is_system() && self.joystick_id.is_none()
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.class)
    }
}

/// Name-addressable collection of records for one class.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceCatalog {
    by_name: BTreeMap<String, DeviceRecord>,
}

impl DeviceCatalog {
    /// Build a catalog, renaming duplicates to `"name #1"`, `"name #2"`, ...
    pub fn from_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let mut by_name = BTreeMap::new();

        for mut rec in records {
            let base = rec.name.trim().to_string();
            let mut name = base.clone();
            let mut counter = 0;
            while name.is_empty() || by_name.contains_key(&name) {
                counter += 1;
                name = if base.is_empty() {
                    format!("{} #{}", rec.class.label(), counter)
                } else {
                    format!("{} #{}", base, counter)
                };
            }
            rec.name = name.clone();
            by_name.insert(name, rec);
        }

        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&DeviceRecord> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
