//! Device objects and the state they share.
//!
//! Every device carries a [`DeviceCore`]: its enumeration record, composite key, access flags
//! and (while bound) the window it is attached to. The class-specific state machines live in
//! the submodules.
//!
//! ## Conventions
//! - Devices are handed out as `Arc<T>`; state sits behind a `Mutex` and the event bus behind
//!   another one. Events are emitted after the state lock is released.
//! - Processing entry points take a [`SampleContext`] (capture time and window status) instead
//!   of querying the clock or the OS themselves.
//! - `Exclusive` + not `Acquired` means samples are dropped until the bound window has focus;
//!   the first sample that arrives with focus re-acquires the device.

pub mod hid;
pub mod joystick;
pub mod keyboard;
pub mod pointer;

pub use hid::{CustomHid, HidReportParser};
pub use joystick::{Joystick, JoystickCapabilities, RawJoystickState};
pub use keyboard::{default_key_mappings, Key, KeyCharMap, Keyboard, Modifiers};
pub use pointer::{MouseButtons, PointingDevice};

use crate::backends::{InputBackend, WindowStatus};
use crate::device::{DeviceHandle, DeviceIdentity, WindowHandle};
use crate::dispatch::InputRouter;
use crate::lock;
use crate::metadata::DeviceRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// What a device needs to know about the moment a sample arrived.
#[derive(Clone, Copy, Debug)]
pub struct SampleContext {
    pub now: Instant,
    pub status: WindowStatus,
}

impl SampleContext {
    pub fn new(now: Instant, status: WindowStatus) -> Self {
        Self { now, status }
    }
}

/// Exclusive / background / acquired flags.
#[derive(Debug, Default)]
pub struct AccessFlags {
    exclusive: AtomicBool,
    allow_background: AtomicBool,
    acquired: AtomicBool,
}

impl AccessFlags {
    pub fn is_exclusive(&self) -> bool {
        self.exclusive.load(Ordering::Acquire)
    }

    pub fn allows_background(&self) -> bool {
        self.allow_background.load(Ordering::Acquire)
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::Acquire)
    }

    pub(crate) fn set_exclusive(&self, on: bool) {
        self.exclusive.store(on, Ordering::Release);
    }

    pub(crate) fn set_allow_background(&self, on: bool) {
        self.allow_background.store(on, Ordering::Release);
    }

    pub(crate) fn set_acquired(&self, on: bool) {
        self.acquired.store(on, Ordering::Release);
    }

    /// Decide whether a sample may be processed, re-acquiring on focus.
    pub(crate) fn admit(&self, focused: bool) -> bool {
        if self.is_exclusive() && !self.is_acquired() {
            if !focused {
                return false;
            }
            self.set_acquired(true);
        }
        focused || self.allows_background()
    }
}

struct Binding {
    window: WindowHandle,
    router: Arc<InputRouter>,
}

/// State every device class carries.
pub struct DeviceCore {
    record: DeviceRecord,
    key: String,
    access: AccessFlags,
    backend: Arc<dyn InputBackend>,
    binding: Mutex<Option<Binding>>,
}

impl DeviceCore {
    pub(crate) fn new(record: DeviceRecord, key: String, backend: Arc<dyn InputBackend>) -> Self {
        Self {
            record,
            key,
            access: AccessFlags::default(),
            backend,
            binding: Mutex::new(None),
        }
    }

    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn access(&self) -> &AccessFlags {
        &self.access
    }

    /// Joysticks have no raw-input handle; their multimedia id (offset past null) stands in.
    pub fn identity(&self) -> DeviceIdentity {
        let handle = match self.record.joystick_id {
            Some(id) => DeviceHandle(id as isize + 1),
            None => self.record.handle,
        };
        DeviceIdentity::new(self.record.class, handle)
    }

    pub fn window(&self) -> Option<WindowHandle> {
        lock(&self.binding).as_ref().map(|b| b.window)
    }

    pub(crate) fn backend(&self) -> &Arc<dyn InputBackend> {
        &self.backend
    }

    /// Current focus/client/cursor state of the bound window.
    pub(crate) fn window_status(&self) -> Option<WindowStatus> {
        self.window().map(|w| self.backend.window_status(w))
    }

    pub(crate) fn bind(&self, window: WindowHandle, router: Arc<InputRouter>) {
        *lock(&self.binding) = Some(Binding { window, router });
        self.access.set_acquired(true);
    }

    pub(crate) fn clear_binding(&self) {
        lock(&self.binding).take();
        self.access.set_acquired(false);
    }

    pub(crate) fn set_allow_background(&self, on: bool) {
        self.access.set_allow_background(on);
        let bound = lock(&self.binding).as_ref().map(|b| (b.window, b.router.clone()));
        if let Some((window, router)) = bound {
            router.update_background(window, self.identity(), &self.record, on);
        }
    }

    /// Detach from the router. Safe to call on an unbound device.
    pub(crate) fn unbind(&self) {
        let taken = lock(&self.binding).take();
        self.access.set_acquired(false);
        if let Some(Binding { window, router }) = taken {
            router.detach(window, self.identity(), &self.record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_unacquired_waits_for_focus() {
        let flags = AccessFlags::default();
        flags.set_exclusive(true);
        flags.set_acquired(false);

        assert!(!flags.admit(false));
        assert!(!flags.is_acquired());

        assert!(flags.admit(true));
        assert!(flags.is_acquired());
    }

    #[test]
    fn background_access_admits_unfocused_samples() {
        let flags = AccessFlags::default();
        flags.set_acquired(true);
        assert!(!flags.admit(false));
        flags.set_allow_background(true);
        assert!(flags.admit(false));

        // Acquired exclusive devices keep receiving in the background too.
        flags.set_exclusive(true);
        assert!(flags.admit(false));
    }
}
