#![allow(dead_code)]

use hookup::backends::virtual_input::VirtualBackend;
use hookup::{DeviceManager, InputEvent, InputSettings, WindowHandle};
use std::sync::{Arc, Mutex};

pub const W: WindowHandle = WindowHandle(0x500);

pub fn rig(settings: InputSettings) -> (Arc<VirtualBackend>, DeviceManager) {
    rig_with(Arc::new(VirtualBackend::new()), settings)
}

pub fn rig_with(backend: Arc<VirtualBackend>, settings: InputSettings) -> (Arc<VirtualBackend>, DeviceManager) {
    let _ = env_logger::builder().is_test(true).try_init();
    backend.create_window(W);
    let manager = DeviceManager::new(backend.clone(), Some(W), settings).expect("manager");
    (backend, manager)
}

/// Listener that records event kinds, plus the shared log it writes to.
pub fn recorder<K: Clone + Send + 'static>() -> (Arc<Mutex<Vec<K>>>, impl FnMut(&InputEvent<K>) + Send + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, move |e: &InputEvent<K>| sink.lock().unwrap().push(e.kind.clone()))
}

pub fn take<K>(log: &Arc<Mutex<Vec<K>>>) -> Vec<K> {
    std::mem::take(&mut *log.lock().unwrap())
}
