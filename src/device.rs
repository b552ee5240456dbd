//! Device identity and the capability set shared by every device class.
//!
//! A [`DeviceIdentity`] names one physical device as seen by the OS input layer:
//! its [`DeviceClass`] plus the opaque [`DeviceHandle`] the OS stamps on each raw packet.
//! It is the routing key for raw-input dispatch, so within one registry at most one live
//! device object exists per identity.
//!
//! The *composite* key used by [`DeviceManager`](crate::manager::DeviceManager) to cache
//! device objects is different: it combines the record's stable UUID with the concrete
//! wrapper type, see [`DeviceRecord::composite_key`](crate::metadata::DeviceRecord::composite_key).

use crate::devices::DeviceCore;
use crate::metadata::DeviceRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of an input device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceClass {
    Keyboard,
    Pointer,
    Joystick,
    Hid,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 4] = [
        DeviceClass::Pointer,
        DeviceClass::Keyboard,
        DeviceClass::Joystick,
        DeviceClass::Hid,
    ];

    /// Label used for generated names and log lines.
    pub fn label(self) -> &'static str {
        match self {
            DeviceClass::Keyboard => "keyboard",
            DeviceClass::Pointer => "pointing device",
            DeviceClass::Joystick => "joystick",
            DeviceClass::Hid => "human interface device",
        }
    }

    /// `true` for classes whose data arrives through `WM_INPUT` (everything but joysticks).
    pub fn is_raw_input(self) -> bool {
        !matches!(self, DeviceClass::Joystick)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque OS device handle (`hDevice` in a raw input header).
///
/// The null handle stands for the system (composite) device of a class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceHandle(pub isize);

impl DeviceHandle {
    pub const SYSTEM: DeviceHandle = DeviceHandle(0);

    #[inline]
    pub fn is_system(self) -> bool {
        self.0 == 0
    }
}

/// Native window handle owned by the host's window toolkit.
///
/// The input layer never destroys it; it only reads focus/client state and temporarily swaps
/// its message procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hwnd({:#x})", self.0)
    }
}

/// `{class, handle}` routing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub class: DeviceClass,
    pub handle: DeviceHandle,
}

impl DeviceIdentity {
    pub fn new(class: DeviceClass, handle: DeviceHandle) -> Self {
        Self { class, handle }
    }

    /// Identity of the system device for `class`.
    pub fn system(class: DeviceClass) -> Self {
        Self::new(class, DeviceHandle::SYSTEM)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.class, self.handle.0)
    }
}

/// Capability set shared by keyboards, pointing devices, joysticks and custom HIDs.
///
/// Implemented by the concrete device types in [`crate::devices`]; the manager hands them out
/// as `Arc<T>` so a host can keep a device while the hook thread feeds it.
pub trait Device: Send + Sync {
    fn core(&self) -> &DeviceCore;

    /// Enumeration record the device was created from.
    fn info(&self) -> &DeviceRecord {
        self.core().record()
    }

    /// Composite cache key (record UUID + wrapper type).
    fn key(&self) -> &str {
        self.core().key()
    }

    fn identity(&self) -> DeviceIdentity {
        self.core().identity()
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    /// Window the device is bound to, `None` once unbound.
    fn window(&self) -> Option<WindowHandle> {
        self.core().window()
    }

    fn is_bound(&self) -> bool {
        self.window().is_some()
    }

    fn is_exclusive(&self) -> bool {
        self.core().access().is_exclusive()
    }

    fn set_exclusive(&self, on: bool) {
        self.core().access().set_exclusive(on);
    }

    fn allows_background(&self) -> bool {
        self.core().access().allows_background()
    }

    /// Takes effect on the next sample; a bound device re-registers with the OS input layer.
    fn set_allow_background(&self, on: bool) {
        self.core().set_allow_background(on);
    }

    fn is_acquired(&self) -> bool {
        self.core().access().is_acquired()
    }

    fn set_acquired(&self, on: bool) {
        self.core().access().set_acquired(on);
    }

    /// Detach from the window hook and the OS input layer. Never fails; safe to repeat.
    fn unbind(&self) {
        self.core().unbind();
    }
}
