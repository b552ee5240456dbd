//! Raw input routing.
//!
//! One [`RawInputFilter`] sits in the hook chain of every window that has bound devices. On
//! `WM_INPUT` it copies the record out through the backend, decodes it, finds the owning
//! device by `{class, handle}` and feeds the sample to that device's state machine. A
//! keyboard or pointer sample from a device nobody bound goes to the system device of that
//! class when one is bound; anything else is dropped quietly.
//!
//! The filter also handles the window-level messages devices care about:
//! - focus changes drop/restore acquisition of exclusive devices and reset keyboards;
//! - `WM_MOUSELEAVE` releases pointer buttons;
//! - legacy mouse/keyboard messages are swallowed while an exclusive device of that class is
//!   acquired (`WM_SYSKEYDOWN` for F4 always passes, so Alt+F4 still works).
//!
//! [`InputRouter`] owns the filters and the per-usage raw-input registrations: the first bound
//! device of a usage registers it with the OS for its window, the last one to leave
//! unregisters it. The OS delivers a usage to one window only, so binding a device of that
//! usage to a different window fails with [`InputError::UsageConflict`] until the first window
//! lets go of it.

use crate::backends::{InputBackend, RawInputRegistration, RawUsage};
use crate::decoder::{self, RawPacket, Sample};
use crate::device::{Device, DeviceClass, DeviceIdentity, WindowHandle};
use crate::devices::SampleContext;
use crate::error::{InputError, Result};
use crate::hook::{wm, MessageFilter, MessageFilterHook, WindowMessage};
use crate::lock;
use crate::metadata::DeviceRecord;
use crate::registry::{DeviceRegistry, RegisteredDevice};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

fn is_legacy_mouse(id: u32) -> bool {
    matches!(
        id,
        wm::MOUSEMOVE
            | wm::LBUTTONDOWN
            | wm::LBUTTONUP
            | wm::LBUTTONDBLCLK
            | wm::RBUTTONDOWN
            | wm::RBUTTONUP
            | wm::RBUTTONDBLCLK
            | wm::MBUTTONDOWN
            | wm::MBUTTONUP
            | wm::MBUTTONDBLCLK
            | wm::MOUSEWHEEL
            | wm::MOUSEHWHEEL
            | wm::XBUTTONDOWN
            | wm::XBUTTONUP
            | wm::XBUTTONDBLCLK
    )
}

fn is_legacy_key(id: u32) -> bool {
    matches!(
        id,
        wm::KEYDOWN
            | wm::KEYUP
            | wm::CHAR
            | wm::DEADCHAR
            | wm::UNICHAR
            | wm::SYSKEYDOWN
            | wm::HOTKEY
            | wm::APPCOMMAND
    )
}

/// Per-window dispatcher.
pub struct RawInputFilter {
    window: WindowHandle,
    backend: Arc<dyn InputBackend>,
    registry: DeviceRegistry,
    auto_reacquire: bool,
}

impl RawInputFilter {
    fn new(window: WindowHandle, backend: Arc<dyn InputBackend>, auto_reacquire: bool) -> Self {
        Self {
            window,
            backend,
            registry: DeviceRegistry::new(),
            auto_reacquire,
        }
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Deliver one decoded packet. Returns `false` when no device took it.
    pub fn route(&self, packet: &RawPacket, now: Instant) -> bool {
        let class = packet.class();
        let identity = DeviceIdentity::new(class, packet.handle);

        let target = self.registry.lookup(&identity).or_else(|| match class {
            DeviceClass::Keyboard | DeviceClass::Pointer => self.registry.lookup(&DeviceIdentity::system(class)),
            _ => None,
        });
        let Some(device) = target else {
            log::trace!("no device bound for {} on {}", identity, self.window);
            return false;
        };

        let ctx = SampleContext::new(now, self.backend.window_status(self.window));
        match (&device, &packet.sample) {
            (RegisteredDevice::Keyboard(k), Sample::Keyboard(s)) => k.process(s, &ctx),
            (RegisteredDevice::Pointer(p), Sample::Pointer(s)) => p.process(s, &ctx),
            (RegisteredDevice::Hid(h), Sample::Hid(s)) => h.process(s, &ctx),
            _ => return false,
        }
        true
    }

    fn on_raw_input(&self, lparam: isize) {
        let Some(bytes) = self.backend.read_raw_input(lparam) else {
            log::trace!("WM_INPUT on {} carried no readable record", self.window);
            return;
        };
        match decoder::decode(&bytes) {
            Some(packet) => {
                self.route(&packet, Instant::now());
            }
            None => log::trace!("undecodable raw input record ({} bytes)", bytes.len()),
        }
    }

    fn on_focus(&self, gained: bool) {
        for device in self.registry.devices() {
            let dev = device.as_device();
            if gained {
                if self.auto_reacquire && dev.is_exclusive() {
                    dev.set_acquired(true);
                }
                continue;
            }
            if dev.is_exclusive() {
                dev.set_acquired(false);
            }
            if let RegisteredDevice::Keyboard(k) = &device {
                k.on_focus_lost();
            }
        }
    }

    fn on_mouse_leave(&self) {
        for device in self.registry.devices() {
            if let RegisteredDevice::Pointer(p) = device {
                p.on_mouse_leave();
            }
        }
    }

    fn exclusive_owner(&self, class: DeviceClass) -> bool {
        self.registry.devices().iter().any(|d| {
            let dev = d.as_device();
            dev.info().class == class && dev.is_exclusive() && dev.is_acquired()
        })
    }
}

impl MessageFilter for RawInputFilter {
    fn filter(&self, msg: &WindowMessage) -> Option<isize> {
        match msg.id {
            wm::INPUT => {
                self.on_raw_input(msg.lparam);
                None
            }
            wm::SETFOCUS => {
                self.on_focus(true);
                None
            }
            wm::KILLFOCUS => {
                self.on_focus(false);
                None
            }
            wm::ACTIVATE => {
                self.on_focus(msg.wparam & 0xFFFF != wm::WA_INACTIVE);
                None
            }
            wm::MOUSELEAVE => {
                self.on_mouse_leave();
                None
            }
            wm::SYSKEYDOWN if msg.wparam == wm::VK_F4 => None,
            id if is_legacy_mouse(id) => self.exclusive_owner(DeviceClass::Pointer).then_some(0),
            id if is_legacy_key(id) => self.exclusive_owner(DeviceClass::Keyboard).then_some(0),
            _ => None,
        }
    }
}

struct UsageRegistration {
    target: WindowHandle,
    background: bool,
    registered: bool,
    members: HashMap<(WindowHandle, DeviceIdentity), bool>,
}

/// Owns the per-window filters and the OS raw-input registrations.
pub struct InputRouter {
    backend: Arc<dyn InputBackend>,
    hook: Arc<MessageFilterHook>,
    auto_reacquire: bool,
    filters: Mutex<HashMap<WindowHandle, Arc<RawInputFilter>>>,
    usages: Mutex<HashMap<RawUsage, UsageRegistration>>,
}

impl InputRouter {
    pub fn new(backend: Arc<dyn InputBackend>, hook: Arc<MessageFilterHook>, auto_reacquire: bool) -> Arc<Self> {
        Arc::new(Self {
            backend,
            hook,
            auto_reacquire,
            filters: Mutex::new(HashMap::new()),
            usages: Mutex::new(HashMap::new()),
        })
    }

    pub fn filter(&self, window: WindowHandle) -> Option<Arc<RawInputFilter>> {
        lock(&self.filters).get(&window).cloned()
    }

    /// Bind `device` to `window` and return the live object for its identity.
    pub(crate) fn attach(self: &Arc<Self>, window: WindowHandle, device: RegisteredDevice) -> Result<RegisteredDevice> {
        let (identity, record, background) = {
            let dev = device.as_device();
            (dev.identity(), dev.info().clone(), dev.allows_background())
        };

        let filter = {
            let mut filters = lock(&self.filters);
            match filters.get(&window) {
                Some(f) => f.clone(),
                None => {
                    let f = Arc::new(RawInputFilter::new(window, self.backend.clone(), self.auto_reacquire));
                    self.hook.add_filter(window, f.clone())?;
                    filters.insert(window, f.clone());
                    f
                }
            }
        };

        let live = match filter.registry.register(device.clone()) {
            Ok(live) => live,
            Err(e) => {
                self.release_filter_if_empty(window);
                return Err(e);
            }
        };
        if !live.same_object(&device) {
            return Ok(live);
        }

        live.as_device().core().bind(window, self.clone());

        if let Some(usage) = RawUsage::for_record(&record) {
            if let Err(e) = self.add_usage_member(usage, window, identity, background) {
                filter.registry.unregister(&identity);
                live.as_device().core().clear_binding();
                self.release_filter_if_empty(window);
                return Err(e);
            }
        }

        log::debug!("bound {} ({}) to {}", record.name, identity, window);
        Ok(live)
    }

    /// Undo [`attach`](Self::attach). Never fails.
    pub(crate) fn detach(&self, window: WindowHandle, identity: DeviceIdentity, record: &DeviceRecord) {
        if let Some(usage) = RawUsage::for_record(record) {
            self.remove_usage_member(usage, window, identity);
        }
        if let Some(filter) = self.filter(window) {
            filter.registry.unregister(&identity);
        }
        self.release_filter_if_empty(window);
        log::debug!("unbound {} ({}) from {}", record.name, identity, window);
    }

    pub(crate) fn update_background(&self, window: WindowHandle, identity: DeviceIdentity, record: &DeviceRecord, on: bool) {
        let Some(usage) = RawUsage::for_record(record) else {
            return;
        };
        let mut usages = lock(&self.usages);
        let Some(reg) = usages.get_mut(&usage) else {
            return;
        };
        if let Some(flag) = reg.members.get_mut(&(window, identity)) {
            *flag = on;
        }
        if let Err(e) = self.sync_usage(usage, reg) {
            log::warn!("could not update raw input registration for {:?}: {}", usage, e);
        }
    }

    fn release_filter_if_empty(&self, window: WindowHandle) {
        let mut filters = lock(&self.filters);
        let Some(filter) = filters.get(&window).cloned() else {
            return;
        };
        if !filter.registry.is_empty() {
            return;
        }
        filters.remove(&window);
        let filter: Arc<dyn MessageFilter> = filter;
        self.hook.remove_filter(window, &filter);
    }

    fn sync_usage(&self, usage: RawUsage, reg: &mut UsageRegistration) -> Result<()> {
        let want = reg.members.values().any(|bg| *bg);
        if reg.registered && want == reg.background {
            return Ok(());
        }
        self.backend.register_raw_input(&RawInputRegistration {
            usage,
            target: reg.target,
            background: want,
        })?;
        log::debug!(
            "registered raw input {:02x}/{:02x} for {} (background: {})",
            usage.page,
            usage.usage,
            reg.target,
            want
        );
        reg.registered = true;
        reg.background = want;
        Ok(())
    }

    fn add_usage_member(&self, usage: RawUsage, window: WindowHandle, identity: DeviceIdentity, background: bool) -> Result<()> {
        let mut usages = lock(&self.usages);
        let reg = usages.entry(usage).or_insert_with(|| UsageRegistration {
            target: window,
            background: false,
            registered: false,
            members: HashMap::new(),
        });
        if reg.target != window {
            return Err(InputError::UsageConflict {
                page: usage.page,
                usage: usage.usage,
                registered: reg.target,
                requested: window,
            });
        }
        reg.members.insert((window, identity), background);

        if let Err(e) = self.sync_usage(usage, reg) {
            reg.members.remove(&(window, identity));
            if reg.members.is_empty() {
                usages.remove(&usage);
            }
            return Err(e);
        }
        Ok(())
    }

    fn remove_usage_member(&self, usage: RawUsage, window: WindowHandle, identity: DeviceIdentity) {
        let mut usages = lock(&self.usages);
        let Some(reg) = usages.get_mut(&usage) else {
            return;
        };
        reg.members.remove(&(window, identity));

        if reg.members.is_empty() {
            let registered = reg.registered;
            usages.remove(&usage);
            if registered {
                if let Err(e) = self.backend.unregister_raw_input(usage) {
                    log::warn!("could not unregister raw input {:?}: {}", usage, e);
                }
            }
            return;
        }

        if let Err(e) = self.sync_usage(usage, reg) {
            log::warn!("could not update raw input registration for {:?}: {}", usage, e);
        }
    }
}
