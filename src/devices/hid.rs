//! Custom HID device.
//!
//! The input layer does not interpret HID reports. A [`CustomHid`] keeps the last report block,
//! raises [`HidEvent::DataChanged`] for every accepted sample, and optionally runs a
//! host-supplied [`HidReportParser`] that turns reports into named integer properties.

use super::{DeviceCore, SampleContext};
use crate::backends::InputBackend;
use crate::config::HidSettings;
use crate::decoder::HidSample;
use crate::device::Device;
use crate::event::{HidEvent, InputEvent};
use crate::eventbus::{EventBus, InputListener, ListenerId};
use crate::lock;
use crate::metadata::DeviceRecord;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Turns one HID report into named values.
pub trait HidReportParser: Send {
    fn parse(&mut self, report: &[u8], properties: &mut BTreeMap<String, i64>);
}

impl<F> HidReportParser for F
where
    F: FnMut(&[u8], &mut BTreeMap<String, i64>) + Send,
{
    fn parse(&mut self, report: &[u8], properties: &mut BTreeMap<String, i64>) {
        self(report, properties)
    }
}

#[derive(Default)]
struct HidState {
    last: Option<HidSample>,
    properties: BTreeMap<String, i64>,
    parser: Option<Box<dyn HidReportParser>>,
}

pub struct CustomHid {
    core: DeviceCore,
    state: Mutex<HidState>,
    events: Mutex<EventBus<HidEvent>>,
}

impl CustomHid {
    pub(crate) fn new(record: DeviceRecord, key: String, backend: Arc<dyn InputBackend>, settings: &HidSettings) -> Self {
        let core = DeviceCore::new(record, key, backend);
        core.access().set_allow_background(settings.allow_background);
        Self {
            core,
            state: Mutex::new(HidState::default()),
            events: Mutex::new(EventBus::new()),
        }
    }

    /// Install (or replace) the report parser. Existing properties are kept.
    pub fn set_parser(&self, parser: impl HidReportParser + 'static) {
        lock(&self.state).parser = Some(Box::new(parser));
    }

    pub fn clear_parser(&self) {
        lock(&self.state).parser = None;
    }

    pub fn last_sample(&self) -> Option<HidSample> {
        lock(&self.state).last.clone()
    }

    pub fn property(&self, name: &str) -> Option<i64> {
        lock(&self.state).properties.get(name).copied()
    }

    pub fn properties(&self) -> BTreeMap<String, i64> {
        lock(&self.state).properties.clone()
    }

    pub fn process(&self, sample: &HidSample, ctx: &SampleContext) {
        if !self.core.access().admit(ctx.status.focused) {
            return;
        }

        {
            let mut guard = lock(&self.state);
            let st = &mut *guard;
            if let Some(parser) = st.parser.as_mut() {
                for report in sample.reports() {
                    parser.parse(report, &mut st.properties);
                }
            }
            st.last = Some(sample.clone());
        }

        let event = InputEvent::new(ctx.now, self.core.identity(), HidEvent::DataChanged(sample.clone()));
        lock(&self.events).emit(&event);
    }

    pub fn add_listener(&self, listener: impl InputListener<HidEvent> + 'static) -> ListenerId {
        lock(&self.events).add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        lock(&self.events).remove_listener(id)
    }

    pub fn enable_listener(&self, id: ListenerId) {
        lock(&self.events).enable(id);
    }

    pub fn disable_listener(&self, id: ListenerId) {
        lock(&self.events).disable(id);
    }
}

impl Device for CustomHid {
    fn core(&self) -> &DeviceCore {
        &self.core
    }
}
