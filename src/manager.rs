//! Device enumeration, creation and lifetime.
//!
//! [`DeviceManager`] is the entry point of the crate. It enumerates the four device classes
//! through an [`InputBackend`], hands out device objects by name and keeps them cached by
//! composite key (`"{uuid}_{wrapper}"`), so asking twice for the same device returns the same
//! `Arc`.
//!
//! # Semantics
//! - A blank keyboard/pointer name means the system device of that class, which receives input
//!   from every physical device of the class that has no object of its own.
//! - Joysticks and custom HIDs must be named. `None` is a missing argument, a blank name is an
//!   empty parameter.
//! - Devices bind to the window passed in, else to the application window given at
//!   construction. With neither, creation fails with [`InputError::NoWindow`].
//! - [`enumerate_devices`](DeviceManager::enumerate_devices) unbinds and forgets every device
//!   created so far. Objects obtained before the call keep existing but no longer receive input;
//!   request them again.
//!
//! # Examples
//! ```no_run
//! use hookup::{DeviceManager, InputSettings, WindowHandle};
//!
//! # fn main() -> hookup::Result<()> {
//! let manager = DeviceManager::for_platform(Some(WindowHandle(0x1234)), InputSettings::default())?;
//! let mouse = manager.create_pointing_device(None, "")?;
//! mouse.add_listener(|e: &hookup::InputEvent<hookup::PointerEvent>| println!("{:?}", e.kind));
//! # Ok(())
//! # }
//! ```

use crate::backends::{self, InputBackend};
use crate::config::InputSettings;
use crate::device::{Device, DeviceClass, WindowHandle};
use crate::devices::{CustomHid, Joystick, Keyboard, PointingDevice};
use crate::dispatch::InputRouter;
use crate::error::{InputError, Result};
use crate::event::{InputEvent, InputKind};
use crate::hook::MessageFilterHook;
use crate::lock;
use crate::metadata::{DeviceCatalog, DeviceRecord};
use crate::registry::RegisteredDevice;
use crate::snapshot::Snapshot;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub struct DeviceManager {
    backend: Arc<dyn InputBackend>,
    hook: Arc<MessageFilterHook>,
    router: Arc<InputRouter>,
    application_window: Option<WindowHandle>,
    settings: InputSettings,
    catalogs: Mutex<BTreeMap<DeviceClass, DeviceCatalog>>,
    devices: Mutex<HashMap<String, RegisteredDevice>>,
}

impl DeviceManager {
    /// Build a manager with its own hook table and enumerate once.
    pub fn new(backend: Arc<dyn InputBackend>, application_window: Option<WindowHandle>, settings: InputSettings) -> Result<Self> {
        let hook = Arc::new(MessageFilterHook::new(backend.procedure_host()));
        Self::with_hook(backend, hook, application_window, settings)
    }

    /// Build a manager that shares `hook` with other users of the same windows.
    pub fn with_hook(
        backend: Arc<dyn InputBackend>,
        hook: Arc<MessageFilterHook>,
        application_window: Option<WindowHandle>,
        settings: InputSettings,
    ) -> Result<Self> {
        let router = InputRouter::new(backend.clone(), hook.clone(), settings.auto_reacquire);
        let manager = Self {
            backend,
            hook,
            router,
            application_window,
            settings,
            catalogs: Mutex::new(BTreeMap::new()),
            devices: Mutex::new(HashMap::new()),
        };
        manager.enumerate_devices()?;
        Ok(manager)
    }

    /// Manager over [`platform_backend`](backends::platform_backend).
    pub fn for_platform(application_window: Option<WindowHandle>, settings: InputSettings) -> Result<Self> {
        Self::new(backends::platform_backend(), application_window, settings)
    }

    pub fn backend(&self) -> &Arc<dyn InputBackend> {
        &self.backend
    }

    pub fn hook(&self) -> &Arc<MessageFilterHook> {
        &self.hook
    }

    pub fn router(&self) -> &Arc<InputRouter> {
        &self.router
    }

    pub fn application_window(&self) -> Option<WindowHandle> {
        self.application_window
    }

    pub fn settings(&self) -> &InputSettings {
        &self.settings
    }

    /// Destroy every cached device, then re-query all four classes.
    pub fn enumerate_devices(&self) -> Result<()> {
        self.destroy_devices();

        let mut fresh = BTreeMap::new();
        for class in DeviceClass::ALL {
            let catalog = DeviceCatalog::from_records(self.backend.enumerate(class)?);
            log::debug!("{}: {} {} device(s)", self.backend.name(), catalog.len(), class);
            fresh.insert(class, catalog);
        }
        *lock(&self.catalogs) = fresh;
        Ok(())
    }

    pub fn catalog(&self, class: DeviceClass) -> DeviceCatalog {
        lock(&self.catalogs).get(&class).cloned().unwrap_or_default()
    }

    pub fn records(&self, class: DeviceClass) -> Vec<DeviceRecord> {
        lock(&self.catalogs)
            .get(&class)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn names(&self, class: DeviceClass) -> Vec<String> {
        lock(&self.catalogs)
            .get(&class)
            .map(|c| c.names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn keyboard_names(&self) -> Vec<String> {
        self.names(DeviceClass::Keyboard)
    }

    pub fn pointing_device_names(&self) -> Vec<String> {
        self.names(DeviceClass::Pointer)
    }

    pub fn joystick_names(&self) -> Vec<String> {
        self.names(DeviceClass::Joystick)
    }

    pub fn custom_hid_names(&self) -> Vec<String> {
        self.names(DeviceClass::Hid)
    }

    /// Keyboard named `name`; blank for the system keyboard.
    pub fn create_keyboard(&self, window: Option<WindowHandle>, name: &str) -> Result<Arc<Keyboard>> {
        let record = self.record_or_system(DeviceClass::Keyboard, name)?;
        let settings = &self.settings.keyboard;
        let (device, _) = self.obtain(window, record, |record, key| {
            Ok(RegisteredDevice::Keyboard(Arc::new(Keyboard::new(record, key, self.backend.clone(), settings))))
        })?;
        match device {
            RegisteredDevice::Keyboard(k) => Ok(k),
            other => Err(mismatch(&other, "Keyboard")),
        }
    }

    /// Pointing device named `name`; blank for the system mouse.
    pub fn create_pointing_device(&self, window: Option<WindowHandle>, name: &str) -> Result<Arc<PointingDevice>> {
        let record = self.record_or_system(DeviceClass::Pointer, name)?;
        let settings = &self.settings.pointer;
        let (device, created) = self.obtain(window, record, |record, key| {
            Ok(RegisteredDevice::Pointer(Arc::new(PointingDevice::new(record, key, self.backend.clone(), settings))))
        })?;
        match device {
            RegisteredDevice::Pointer(p) => {
                if created && settings.exclusive {
                    p.set_exclusive(true);
                }
                Ok(p)
            }
            other => Err(mismatch(&other, "PointingDevice")),
        }
    }

    pub fn create_joystick(&self, window: Option<WindowHandle>, name: Option<&str>) -> Result<Arc<Joystick>> {
        let record = self.named_record(DeviceClass::Joystick, name)?;
        let settings = &self.settings.joystick;
        let (device, _) = self.obtain(window, record, |record, key| {
            Ok(RegisteredDevice::Joystick(Arc::new(Joystick::new(record, key, self.backend.clone(), settings)?)))
        })?;
        match device {
            RegisteredDevice::Joystick(j) => Ok(j),
            other => Err(mismatch(&other, "Joystick")),
        }
    }

    pub fn create_custom_hid(&self, window: Option<WindowHandle>, name: Option<&str>) -> Result<Arc<CustomHid>> {
        let record = self.named_record(DeviceClass::Hid, name)?;
        let settings = &self.settings.hid;
        let (device, _) = self.obtain(window, record, |record, key| {
            Ok(RegisteredDevice::Hid(Arc::new(CustomHid::new(record, key, self.backend.clone(), settings))))
        })?;
        match device {
            RegisteredDevice::Hid(h) => Ok(h),
            other => Err(mismatch(&other, "CustomHid")),
        }
    }

    /// Every cached device.
    pub fn devices(&self) -> Vec<RegisteredDevice> {
        lock(&self.devices).values().cloned().collect()
    }

    pub fn device_count(&self) -> usize {
        lock(&self.devices).len()
    }

    /// Poll every cached joystick and collect the deltas. Stops at the first read error.
    pub fn poll_joysticks(&self) -> Result<Vec<InputEvent<InputKind>>> {
        let joysticks: Vec<Arc<Joystick>> = lock(&self.devices)
            .values()
            .filter_map(|d| match d {
                RegisteredDevice::Joystick(j) => Some(j.clone()),
                _ => None,
            })
            .collect();

        let now = Instant::now();
        let mut out = Vec::new();
        for joystick in joysticks {
            let identity = joystick.identity();
            out.extend(joystick.poll()?.into_iter().map(|kind| InputEvent::new(now, identity, kind)));
        }
        Ok(out)
    }

    /// Unbind and forget every cached device.
    pub fn destroy_devices(&self) {
        let drained: Vec<RegisteredDevice> = lock(&self.devices).drain().map(|(_, d)| d).collect();
        if drained.is_empty() {
            return;
        }
        log::debug!("destroying {} device(s)", drained.len());
        for device in drained {
            device.as_device().unbind();
        }
    }

    /// Owned view of every cached device's state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.devices())
    }

    fn record_or_system(&self, class: DeviceClass, name: &str) -> Result<DeviceRecord> {
        if name.trim().is_empty() {
            return Ok(DeviceRecord::system(class));
        }
        self.lookup(class, name)
    }

    fn named_record(&self, class: DeviceClass, name: Option<&str>) -> Result<DeviceRecord> {
        let name = name.ok_or(InputError::MissingArgument("name"))?;
        if name.trim().is_empty() {
            return Err(InputError::EmptyParameter("name"));
        }
        self.lookup(class, name)
    }

    fn lookup(&self, class: DeviceClass, name: &str) -> Result<DeviceRecord> {
        lock(&self.catalogs)
            .get(&class)
            .and_then(|c| c.get(name))
            .cloned()
            .ok_or_else(|| InputError::DeviceNotFound {
                class,
                name: name.to_string(),
            })
    }

    /// Cached device for `record`, or a freshly built and bound one. The flag is `true` when
    /// the device was built by this call.
    fn obtain<F>(&self, window: Option<WindowHandle>, record: DeviceRecord, build: F) -> Result<(RegisteredDevice, bool)>
    where
        F: FnOnce(DeviceRecord, String) -> Result<RegisteredDevice>,
    {
        let key = record.composite_key(self.backend.wrapper_type(record.class));
        let mut devices = lock(&self.devices);
        if let Some(existing) = devices.get(&key) {
            return Ok((existing.clone(), false));
        }

        let window = window.or(self.application_window).ok_or(InputError::NoWindow)?;
        let device = build(record, key.clone())?;
        let live = self.router.attach(window, device)?;
        devices.insert(key, live.clone());
        Ok((live, true))
    }
}

fn mismatch(found: &RegisteredDevice, expected: &'static str) -> InputError {
    InputError::TypeMismatch {
        key: found.as_device().key().to_string(),
        expected,
        found: found.type_name(),
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.destroy_devices();
    }
}
