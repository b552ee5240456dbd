//! Window procedure hook shared by device filters.
//!
//! Several devices may need to see the messages of one window, and none of them owns that
//! window's message loop. [`MessageFilterHook`] keeps one [`HookEntry`] per hooked window:
//! the original procedure, the substitute it installed in its place, and an ordered list of
//! [`MessageFilter`]s.
//!
//! ## Lifecycle
//! - The first [`add_filter`](MessageFilterHook::add_filter) for a window captures the
//!   current procedure and installs the substitute.
//! - Removing the last filter restores the original procedure before `remove_filter`
//!   returns, and the entry is dropped.
//! - Restoring happens at most once per installation and never fails.
//! - If someone subclassed the window after us, restoring would cut them off, so the host
//!   leaves the chain alone. The entry then *lingers*: it stays in the table, unhooked, and
//!   forwards everything to the original. The next `add_filter` for that window re-arms it
//!   instead of installing over the foreign procedure.
//!
//! ## Dispatch
//! Filters are tried in registration order. The first one returning `Some(result)` ends
//! dispatch and `result` goes back to the OS; otherwise the message is forwarded to the
//! original procedure. Filters run without the table lock held.
//!
//! The OS side (swapping `GWLP_WNDPROC`, calling the previous procedure) is behind
//! [`WindowProcHost`], so the bookkeeping above runs the same against the virtual backend.

use crate::device::WindowHandle;
use crate::error::Result;
use crate::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Window message ids used by the input layer.
pub mod wm {
    pub const ACTIVATE: u32 = 0x0006;
    pub const SETFOCUS: u32 = 0x0007;
    pub const KILLFOCUS: u32 = 0x0008;
    pub const INPUT: u32 = 0x00FF;
    pub const KEYDOWN: u32 = 0x0100;
    pub const KEYUP: u32 = 0x0101;
    pub const CHAR: u32 = 0x0102;
    pub const DEADCHAR: u32 = 0x0103;
    pub const SYSKEYDOWN: u32 = 0x0104;
    pub const SYSKEYUP: u32 = 0x0105;
    pub const UNICHAR: u32 = 0x0109;
    pub const MOUSEMOVE: u32 = 0x0200;
    pub const LBUTTONDOWN: u32 = 0x0201;
    pub const LBUTTONUP: u32 = 0x0202;
    pub const LBUTTONDBLCLK: u32 = 0x0203;
    pub const RBUTTONDOWN: u32 = 0x0204;
    pub const RBUTTONUP: u32 = 0x0205;
    pub const RBUTTONDBLCLK: u32 = 0x0206;
    pub const MBUTTONDOWN: u32 = 0x0207;
    pub const MBUTTONUP: u32 = 0x0208;
    pub const MBUTTONDBLCLK: u32 = 0x0209;
    pub const MOUSEWHEEL: u32 = 0x020A;
    pub const XBUTTONDOWN: u32 = 0x020B;
    pub const XBUTTONUP: u32 = 0x020C;
    pub const XBUTTONDBLCLK: u32 = 0x020D;
    pub const MOUSEHWHEEL: u32 = 0x020E;
    pub const HOTKEY: u32 = 0x0312;
    pub const APPCOMMAND: u32 = 0x0319;
    pub const MOUSELEAVE: u32 = 0x02A3;

    /// `LOWORD(wParam)` of `WM_ACTIVATE` when the window is being deactivated.
    pub const WA_INACTIVE: usize = 0;

    /// Virtual key of F4 (`wParam` of the key messages).
    pub const VK_F4: usize = 0x73;
}

/// Address of a window procedure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProcAddress(pub usize);

/// One message as seen by the substitute procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowMessage {
    pub window: WindowHandle,
    pub id: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl WindowMessage {
    pub fn new(window: WindowHandle, id: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            window,
            id,
            wparam,
            lparam,
        }
    }
}

/// Something that wants to look at a window's messages.
pub trait MessageFilter: Send + Sync {
    /// `Some(result)` marks the message handled; `None` passes it on.
    fn filter(&self, msg: &WindowMessage) -> Option<isize>;
}

/// OS side of procedure substitution.
pub trait WindowProcHost: Send + Sync {
    /// Procedure currently installed on `window`.
    fn current(&self, window: WindowHandle) -> ProcAddress;

    /// Address of the substitute procedure this host installs.
    fn substitute(&self) -> ProcAddress;

    /// Attach `entry` to `window` and swap in the substitute procedure.
    fn install(&self, entry: &Arc<HookEntry>) -> Result<()>;

    /// Put `entry.original()` back and detach the entry. Returns `false` when the substitute
    /// had to stay in the chain (another procedure sits on top of it, or the swap failed); the
    /// entry must then stay reachable from the substitute. Problems are logged, never returned.
    fn restore(&self, entry: &HookEntry) -> bool;

    /// Call the original procedure.
    fn forward(&self, original: ProcAddress, msg: &WindowMessage) -> isize;
}

#[inline]
fn same_filter(a: &Arc<dyn MessageFilter>, b: &Arc<dyn MessageFilter>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Hook state for one window.
pub struct HookEntry {
    window: WindowHandle,
    original: ProcAddress,
    installed: ProcAddress,
    filters: Mutex<Vec<Arc<dyn MessageFilter>>>,
    hooked: AtomicBool,
    restored: AtomicBool,
    lingering: AtomicBool,
    host: Arc<dyn WindowProcHost>,
}

impl HookEntry {
    fn new(window: WindowHandle, host: Arc<dyn WindowProcHost>) -> Self {
        Self {
            window,
            original: host.current(window),
            installed: host.substitute(),
            filters: Mutex::new(Vec::new()),
            hooked: AtomicBool::new(false),
            restored: AtomicBool::new(false),
            lingering: AtomicBool::new(false),
            host,
        }
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn original(&self) -> ProcAddress {
        self.original
    }

    pub fn installed(&self) -> ProcAddress {
        self.installed
    }

    pub fn is_hooked(&self) -> bool {
        self.hooked.load(Ordering::Acquire)
    }

    pub fn filter_count(&self) -> usize {
        lock(&self.filters).len()
    }

    /// Unhooked, but the substitute is still in the window's chain.
    pub fn is_lingering(&self) -> bool {
        self.lingering.load(Ordering::Acquire)
    }

    /// Restore the original procedure. Only the first call does anything; the result says
    /// whether the entry lingers.
    fn restore(&self) -> bool {
        self.hooked.store(false, Ordering::Release);
        if !self.restored.swap(true, Ordering::AcqRel) {
            log::debug!("restoring window procedure on {}", self.window);
            if !self.host.restore(self) {
                self.lingering.store(true, Ordering::Release);
            }
        }
        self.is_lingering()
    }

    /// Take a lingering entry back into service.
    fn rearm(&self) {
        self.lingering.store(false, Ordering::Release);
        self.restored.store(false, Ordering::Release);
        self.hooked.store(true, Ordering::Release);
    }

    /// Body of the substitute procedure.
    pub fn dispatch(&self, msg: &WindowMessage) -> isize {
        if !self.is_hooked() {
            // Teardown is in flight.
            self.restore();
            return self.host.forward(self.original, msg);
        }

        let filters: Vec<Arc<dyn MessageFilter>> = lock(&self.filters).clone();
        for filter in &filters {
            if let Some(result) = filter.filter(msg) {
                return result;
            }
        }

        self.host.forward(self.original, msg)
    }
}

/// Table of hooked windows.
pub struct MessageFilterHook {
    host: Arc<dyn WindowProcHost>,
    entries: Mutex<HashMap<WindowHandle, Arc<HookEntry>>>,
}

impl MessageFilterHook {
    pub fn new(host: Arc<dyn WindowProcHost>) -> Self {
        Self {
            host,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn host(&self) -> &Arc<dyn WindowProcHost> {
        &self.host
    }

    /// Register `filter` on `window`, installing the substitute procedure on first use.
    ///
    /// Adding a filter that is already registered for `window` does nothing.
    pub fn add_filter(&self, window: WindowHandle, filter: Arc<dyn MessageFilter>) -> Result<()> {
        let mut entries = lock(&self.entries);

        let entry = match entries.get(&window) {
            Some(entry) if entry.is_hooked() => entry.clone(),
            Some(entry) if entry.is_lingering() => {
                entry.rearm();
                log::debug!("re-armed lingering window procedure hook on {}", window);
                entry.clone()
            }
            _ => {
                let entry = Arc::new(HookEntry::new(window, self.host.clone()));
                self.host.install(&entry)?;
                entry.hooked.store(true, Ordering::Release);
                log::debug!(
                    "installed window procedure hook on {} (original {:#x})",
                    window,
                    entry.original.0
                );
                entries.insert(window, entry.clone());
                entry
            }
        };

        let mut filters = lock(&entry.filters);
        if !filters.iter().any(|f| same_filter(f, &filter)) {
            filters.push(filter);
        }
        Ok(())
    }

    /// Unregister `filter`; removing the last one restores the original procedure.
    ///
    /// Unknown windows and filters are ignored.
    pub fn remove_filter(&self, window: WindowHandle, filter: &Arc<dyn MessageFilter>) {
        let mut entries = lock(&self.entries);
        let Some(entry) = entries.get(&window).cloned() else {
            return;
        };

        let now_empty = {
            let mut filters = lock(&entry.filters);
            let before = filters.len();
            filters.retain(|f| !same_filter(f, filter));
            if filters.len() == before {
                return;
            }
            filters.is_empty()
        };

        if now_empty && !entry.restore() {
            entries.remove(&window);
        }
    }

    pub fn is_hooked(&self, window: WindowHandle) -> bool {
        lock(&self.entries).get(&window).is_some_and(|e| e.is_hooked())
    }

    pub fn filter_count(&self, window: WindowHandle) -> usize {
        lock(&self.entries).get(&window).map_or(0, |e| e.filter_count())
    }

    pub fn entry(&self, window: WindowHandle) -> Option<Arc<HookEntry>> {
        lock(&self.entries).get(&window).cloned()
    }

    /// Restore every hooked window and forget all filters.
    pub fn release_all(&self) {
        let drained: Vec<Arc<HookEntry>> = lock(&self.entries).drain().map(|(_, e)| e).collect();
        for entry in drained {
            lock(&entry.filters).clear();
            entry.restore();
        }
    }
}

impl Drop for MessageFilterHook {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualProcHost;
    use std::sync::atomic::AtomicUsize;

    const W: WindowHandle = WindowHandle(0x100);

    struct Counting {
        seen: AtomicUsize,
        handles: Option<isize>,
    }

    impl Counting {
        fn new(handles: Option<isize>) -> Arc<Self> {
            Arc::new(Self {
                seen: AtomicUsize::new(0),
                handles,
            })
        }
    }

    impl MessageFilter for Counting {
        fn filter(&self, _msg: &WindowMessage) -> Option<isize> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            self.handles
        }
    }

    fn setup() -> (Arc<VirtualProcHost>, MessageFilterHook) {
        let host = Arc::new(VirtualProcHost::new());
        host.create_window(W);
        let hook = MessageFilterHook::new(host.clone());
        (host, hook)
    }

    #[test]
    fn install_once_restore_once() {
        let (host, hook) = setup();
        let original = host.current(W);

        let filters: Vec<Arc<dyn MessageFilter>> = (0..3).map(|_| Counting::new(None) as Arc<dyn MessageFilter>).collect();
        for f in &filters {
            hook.add_filter(W, f.clone()).unwrap();
        }
        assert_eq!(host.install_count(W), 1);
        assert_eq!(host.current(W), host.substitute());
        assert_eq!(hook.filter_count(W), 3);

        for f in &filters {
            hook.remove_filter(W, f);
        }
        assert_eq!(host.restore_count(W), 1);
        assert_eq!(host.current(W), original);
        assert!(!hook.is_hooked(W));
        assert!(hook.entry(W).is_none());
    }

    #[test]
    fn duplicate_add_and_unknown_remove_are_noops() {
        let (host, hook) = setup();
        let a: Arc<dyn MessageFilter> = Counting::new(None);
        let stranger: Arc<dyn MessageFilter> = Counting::new(None);

        hook.add_filter(W, a.clone()).unwrap();
        hook.add_filter(W, a.clone()).unwrap();
        assert_eq!(hook.filter_count(W), 1);

        hook.remove_filter(W, &stranger);
        hook.remove_filter(WindowHandle(0x999), &a);
        assert!(hook.is_hooked(W));
        assert_eq!(host.restore_count(W), 0);
    }

    #[test]
    fn first_registered_handler_wins() {
        let (host, hook) = setup();
        let first = Counting::new(None);
        let second = Counting::new(Some(7));
        let third = Counting::new(Some(9));
        hook.add_filter(W, first.clone()).unwrap();
        hook.add_filter(W, second.clone()).unwrap();
        hook.add_filter(W, third.clone()).unwrap();

        let result = host.send(WindowMessage::new(W, wm::INPUT, 0, 0));
        assert_eq!(result, 7);
        assert_eq!(first.seen.load(Ordering::SeqCst), 1);
        assert_eq!(second.seen.load(Ordering::SeqCst), 1);
        assert_eq!(third.seen.load(Ordering::SeqCst), 0);
        assert!(host.forwarded(W).is_empty());
    }

    #[test]
    fn unhandled_messages_reach_the_original_procedure() {
        let (host, hook) = setup();
        hook.add_filter(W, Counting::new(None)).unwrap();

        let msg = WindowMessage::new(W, wm::KEYDOWN, 0x41, 0);
        host.send(msg);
        assert_eq!(host.forwarded(W), vec![msg]);
    }

    #[test]
    fn unhooked_entry_restores_and_forwards() {
        let (host, hook) = setup();
        let f = Counting::new(Some(1));
        hook.add_filter(W, f.clone()).unwrap();

        let entry = hook.entry(W).unwrap();
        entry.hooked.store(false, Ordering::Release);

        let msg = WindowMessage::new(W, wm::INPUT, 0, 0);
        entry.dispatch(&msg);
        assert_eq!(f.seen.load(Ordering::SeqCst), 0);
        assert_eq!(host.restore_count(W), 1);
        assert_eq!(host.forwarded(W), vec![msg]);

        // A later removal does not restore a second time.
        let f: Arc<dyn MessageFilter> = f;
        hook.remove_filter(W, &f);
        assert_eq!(host.restore_count(W), 1);
    }

    #[test]
    fn entry_lingers_under_a_foreign_subclass_and_is_reused() {
        let (host, hook) = setup();
        let original = host.current(W);
        let foreign = ProcAddress(0xF0F0);
        let a: Arc<dyn MessageFilter> = Counting::new(None);
        hook.add_filter(W, a.clone()).unwrap();
        host.subclass(W, foreign);

        hook.remove_filter(W, &a);
        assert_eq!(host.restore_count(W), 1);
        assert_eq!(host.current(W), foreign);
        let lingering = hook.entry(W).unwrap();
        assert!(lingering.is_lingering());
        assert!(!hook.is_hooked(W));

        let msg = WindowMessage::new(W, wm::KEYDOWN, 0x41, 0);
        host.send(msg);
        assert_eq!(host.forwarded(W), vec![msg]);

        // Adding again reuses the entry still in the chain.
        let b = Counting::new(Some(3));
        hook.add_filter(W, b.clone()).unwrap();
        assert_eq!(host.install_count(W), 1);
        assert!(hook.is_hooked(W));
        let entry = hook.entry(W).unwrap();
        assert!(Arc::ptr_eq(&entry, &lingering));
        assert_eq!(entry.original(), original);
        assert!(!entry.is_lingering());

        assert_eq!(host.send(WindowMessage::new(W, wm::INPUT, 0, 0)), 3);
        assert_eq!(b.seen.load(Ordering::SeqCst), 1);
        assert_eq!(host.forwarded(W).len(), 1);
    }

    #[test]
    fn install_failure_is_reported() {
        let (host, hook) = setup();
        host.fail_next_install(5);
        let err = hook.add_filter(W, Counting::new(None)).unwrap_err();
        assert!(matches!(err, crate::error::InputError::HookInstall { code: 5, .. }));
        assert!(hook.entry(W).is_none());

        // Retrying works.
        hook.add_filter(W, Counting::new(None)).unwrap();
        assert!(hook.is_hooked(W));
    }

    #[test]
    fn dropping_the_hook_restores_every_window() {
        let (host, hook) = setup();
        let w2 = WindowHandle(0x200);
        host.create_window(w2);
        hook.add_filter(W, Counting::new(None)).unwrap();
        hook.add_filter(w2, Counting::new(None)).unwrap();
        drop(hook);
        assert_eq!(host.restore_count(W), 1);
        assert_eq!(host.restore_count(w2), 1);
    }
}
