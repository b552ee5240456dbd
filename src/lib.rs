//! `hookup`: input device enumeration and raw-input dispatch for windowed applications.
//!
//! The crate binds keyboards, pointing devices and custom HIDs to a host-owned window by
//! substituting that window's message procedure, decodes `WM_INPUT` payloads, and feeds them
//! to per-device state machines that raise typed events. Joysticks are polled.
//!
//! Start at [`DeviceManager`]: enumerate, then ask for devices by name.

pub mod backends;
pub mod config;
pub mod decoder;
pub mod device;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod filtered_listener;
pub mod geometry;
pub mod hook;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod registry;
pub mod snapshot;

pub use config::InputSettings;
pub use device::*;
pub use devices::{CustomHid, Joystick, Keyboard, PointingDevice};
pub use error::{InputError, Result};
pub use event::*;
pub use eventbus::{EventBus, InputListener, ListenerId};
pub use manager::DeviceManager;
pub use snapshot::Snapshot;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `m`, taking the guard even if a previous holder panicked.
#[inline]
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
