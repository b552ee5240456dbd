//! Identity-keyed device registry.
//!
//! Maps a [`DeviceIdentity`] to the one live device object that receives its raw input.
//! The registry holds weak references: the [`DeviceManager`](crate::manager::DeviceManager)
//! (or the host) owns the devices, and a dropped device simply stops receiving input.
//!
//! Registering under an identity that already holds a live device of the same class wrapper
//! returns that device instead; a live device of a different wrapper is a
//! [`TypeMismatch`](InputError::TypeMismatch).

use crate::device::{Device, DeviceIdentity};
use crate::devices::{CustomHid, Joystick, Keyboard, PointingDevice};
use crate::error::{InputError, Result};
use crate::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// A device object of one of the four classes.
#[derive(Clone)]
pub enum RegisteredDevice {
    Keyboard(Arc<Keyboard>),
    Pointer(Arc<PointingDevice>),
    Joystick(Arc<Joystick>),
    Hid(Arc<CustomHid>),
}

impl RegisteredDevice {
    /// Wrapper type name used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            RegisteredDevice::Keyboard(_) => "Keyboard",
            RegisteredDevice::Pointer(_) => "PointingDevice",
            RegisteredDevice::Joystick(_) => "Joystick",
            RegisteredDevice::Hid(_) => "CustomHid",
        }
    }

    pub fn as_device(&self) -> &dyn Device {
        match self {
            RegisteredDevice::Keyboard(d) => d.as_ref(),
            RegisteredDevice::Pointer(d) => d.as_ref(),
            RegisteredDevice::Joystick(d) => d.as_ref(),
            RegisteredDevice::Hid(d) => d.as_ref(),
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.as_device().identity()
    }

    /// `true` when both hold the same object.
    pub fn same_object(&self, other: &RegisteredDevice) -> bool {
        match (self, other) {
            (RegisteredDevice::Keyboard(a), RegisteredDevice::Keyboard(b)) => Arc::ptr_eq(a, b),
            (RegisteredDevice::Pointer(a), RegisteredDevice::Pointer(b)) => Arc::ptr_eq(a, b),
            (RegisteredDevice::Joystick(a), RegisteredDevice::Joystick(b)) => Arc::ptr_eq(a, b),
            (RegisteredDevice::Hid(a), RegisteredDevice::Hid(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakDevice {
        match self {
            RegisteredDevice::Keyboard(d) => WeakDevice::Keyboard(Arc::downgrade(d)),
            RegisteredDevice::Pointer(d) => WeakDevice::Pointer(Arc::downgrade(d)),
            RegisteredDevice::Joystick(d) => WeakDevice::Joystick(Arc::downgrade(d)),
            RegisteredDevice::Hid(d) => WeakDevice::Hid(Arc::downgrade(d)),
        }
    }
}

impl std::fmt::Debug for RegisteredDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dev = self.as_device();
        write!(f, "{}({} @ {})", self.type_name(), dev.name(), dev.identity())
    }
}

#[derive(Clone)]
pub(crate) enum WeakDevice {
    Keyboard(Weak<Keyboard>),
    Pointer(Weak<PointingDevice>),
    Joystick(Weak<Joystick>),
    Hid(Weak<CustomHid>),
}

impl WeakDevice {
    fn upgrade(&self) -> Option<RegisteredDevice> {
        Some(match self {
            WeakDevice::Keyboard(w) => RegisteredDevice::Keyboard(w.upgrade()?),
            WeakDevice::Pointer(w) => RegisteredDevice::Pointer(w.upgrade()?),
            WeakDevice::Joystick(w) => RegisteredDevice::Joystick(w.upgrade()?),
            WeakDevice::Hid(w) => RegisteredDevice::Hid(w.upgrade()?),
        })
    }
}

#[derive(Default)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<DeviceIdentity, WeakDevice>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device` under its identity and return the live object for that identity.
    pub fn register(&self, device: RegisteredDevice) -> Result<RegisteredDevice> {
        let identity = device.identity();
        let mut map = lock(&self.devices);

        if let Some(existing) = map.get(&identity).and_then(WeakDevice::upgrade) {
            if std::mem::discriminant(&existing) != std::mem::discriminant(&device) {
                return Err(InputError::TypeMismatch {
                    key: identity.to_string(),
                    expected: device.type_name(),
                    found: existing.type_name(),
                });
            }
            return Ok(existing);
        }

        map.insert(identity, device.downgrade());
        Ok(device)
    }

    pub fn lookup(&self, identity: &DeviceIdentity) -> Option<RegisteredDevice> {
        lock(&self.devices).get(identity).and_then(WeakDevice::upgrade)
    }

    /// Remove the entry; returns `true` if one was present.
    pub fn unregister(&self, identity: &DeviceIdentity) -> bool {
        lock(&self.devices).remove(identity).is_some()
    }

    /// Every live device, in no particular order.
    pub fn devices(&self) -> Vec<RegisteredDevice> {
        lock(&self.devices).values().filter_map(WeakDevice::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.devices).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.devices).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualBackend;
    use crate::backends::InputBackend;
    use crate::config::{KeyboardSettings, PointerSettings};
    use crate::device::{DeviceClass, DeviceHandle};
    use crate::metadata::DeviceRecord;

    fn backend() -> Arc<dyn InputBackend> {
        Arc::new(VirtualBackend::new())
    }

    fn keyboard(handle: isize) -> RegisteredDevice {
        let rec = DeviceRecord::new(DeviceClass::Keyboard, "kbd", DeviceHandle(handle), None);
        RegisteredDevice::Keyboard(Arc::new(Keyboard::new(rec, "k".into(), backend(), &KeyboardSettings::default())))
    }

    #[test]
    fn same_identity_returns_the_live_object() {
        let reg = DeviceRegistry::new();
        let first = keyboard(1);
        let second = keyboard(1);

        let a = reg.register(first.clone()).unwrap();
        let b = reg.register(second).unwrap();
        assert!(a.same_object(&first));
        assert!(b.same_object(&first));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn different_wrapper_under_one_identity_is_rejected() {
        let reg = DeviceRegistry::new();
        let kb = keyboard(3);
        reg.register(kb.clone()).unwrap();

        // A pointer whose record claims the keyboard's identity.
        let rec = DeviceRecord::new(DeviceClass::Keyboard, "odd", DeviceHandle(3), None);
        let ptr = RegisteredDevice::Pointer(Arc::new(PointingDevice::new(rec, "p".into(), backend(), &PointerSettings::default())));

        let err = reg.register(ptr).unwrap_err();
        assert!(matches!(err, InputError::TypeMismatch { expected: "PointingDevice", found: "Keyboard", .. }));
    }

    #[test]
    fn dropped_devices_are_not_returned() {
        let reg = DeviceRegistry::new();
        let kb = keyboard(5);
        let id = kb.identity();
        reg.register(kb.clone()).unwrap();
        drop(kb);

        assert!(reg.lookup(&id).is_none());
        // The stale slot is replaced on the next registration.
        let again = keyboard(5);
        assert!(reg.register(again.clone()).unwrap().same_object(&again));
        assert!(reg.unregister(&id));
        assert!(!reg.unregister(&id));
    }
}
