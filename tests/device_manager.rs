mod common;

use common::{rig, rig_with, W};
use hookup::backends::virtual_input::VirtualBackend;
use hookup::backends::RawUsage;
use hookup::metadata::DeviceRecord;
use hookup::{Device, DeviceClass, DeviceHandle, InputError, InputSettings};
use std::sync::Arc;

fn backend_with_devices() -> Arc<VirtualBackend> {
    let backend = Arc::new(VirtualBackend::new());
    backend.add_device(DeviceRecord::new(DeviceClass::Keyboard, "Keychron K2", DeviceHandle(0x11), Some(r"\\?\HID#VID_05AC&PID_024F#kb".into())));
    backend.add_device(DeviceRecord::new(DeviceClass::Pointer, "USB Mouse", DeviceHandle(0x21), Some(r"\\?\HID#VID_046D&PID_C077#a".into())));
    backend.add_device(DeviceRecord::new(DeviceClass::Pointer, "USB Mouse", DeviceHandle(0x22), Some(r"\\?\HID#VID_046D&PID_C077#b".into())));
    backend
}

#[test]
fn p1_same_request_returns_the_same_instance() {
    let (_backend, m) = rig_with(backend_with_devices(), InputSettings::default());

    let a = m.create_keyboard(None, "").unwrap();
    let b = m.create_keyboard(Some(W), "").unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let p1 = m.create_pointing_device(None, "USB Mouse #1").unwrap();
    let p2 = m.create_pointing_device(None, "USB Mouse #1").unwrap();
    assert!(Arc::ptr_eq(&p1, &p2));
    assert_eq!(p1.info().handle, DeviceHandle(0x22));

    assert_eq!(m.device_count(), 2);
}

#[test]
fn p1_colliding_key_with_another_type_is_a_mismatch() {
    let (backend, m) = rig(InputSettings::default());
    // Both system devices have the nil UUID; with one wrapper name their keys collide.
    backend.set_wrapper_type(DeviceClass::Pointer, "RawKeyboard");

    let _kb = m.create_keyboard(None, "").unwrap();
    let err = m.create_pointing_device(None, "").err().expect("type mismatch");
    assert!(matches!(
        err,
        InputError::TypeMismatch {
            expected: "PointingDevice",
            found: "Keyboard",
            ..
        }
    ));
    assert_eq!(m.device_count(), 1);
}

#[test]
fn p2_enumeration_tears_down_and_refreshes() {
    let (backend, m) = rig_with(backend_with_devices(), InputSettings::default());
    assert_eq!(m.pointing_device_names(), vec!["USB Mouse".to_string(), "USB Mouse #1".to_string()]);

    let kb = m.create_keyboard(None, "Keychron K2").unwrap();
    let mouse = m.create_pointing_device(None, "USB Mouse").unwrap();
    assert!(kb.is_bound() && mouse.is_bound());
    assert!(m.hook().is_hooked(W));

    backend.remove_device(DeviceClass::Pointer, "USB Mouse");
    backend.add_device(DeviceRecord::new(DeviceClass::Pointer, "Trackball", DeviceHandle(0x23), Some("tb".into())));
    m.enumerate_devices().unwrap();

    assert!(!kb.is_bound());
    assert!(!mouse.is_bound());
    assert_eq!(m.device_count(), 0);
    assert!(!m.hook().is_hooked(W));
    assert!(!backend.is_registered(RawUsage::KEYBOARD));
    assert_eq!(m.pointing_device_names(), vec!["Trackball".to_string()]);

    let again = m.create_keyboard(None, "Keychron K2").unwrap();
    assert!(!Arc::ptr_eq(&kb, &again));
    assert!(again.is_bound());
}

#[test]
fn name_errors() {
    let (_backend, m) = rig_with(backend_with_devices(), InputSettings::default());

    assert!(matches!(
        m.create_pointing_device(None, "Nope"),
        Err(InputError::DeviceNotFound {
            class: DeviceClass::Pointer,
            ..
        })
    ));
    assert!(matches!(m.create_joystick(None, None), Err(InputError::MissingArgument("name"))));
    assert!(matches!(m.create_joystick(None, Some("")), Err(InputError::EmptyParameter("name"))));
    assert!(matches!(m.create_custom_hid(None, Some(" \t")), Err(InputError::EmptyParameter("name"))));
}

#[test]
fn enumeration_failure_is_a_driver_error() {
    let (backend, m) = rig(InputSettings::default());
    backend.set_enumerate_error(Some(0x1F));
    assert!(matches!(m.enumerate_devices(), Err(InputError::Driver { code: 0x1F, .. })));

    backend.set_enumerate_error(None);
    m.enumerate_devices().unwrap();
}

#[test]
fn refused_registration_rolls_the_binding_back() {
    let (backend, m) = rig(InputSettings::default());
    backend.fail_next_registration(0x57);

    let err = m.create_keyboard(None, "").err().expect("registration refused");
    assert!(matches!(err, InputError::Driver { code: 0x57, .. }));
    assert_eq!(m.device_count(), 0);
    assert!(!m.hook().is_hooked(W));

    // A retry goes through.
    let kb = m.create_keyboard(None, "").unwrap();
    assert!(kb.is_bound());
    assert!(backend.is_registered(RawUsage::KEYBOARD));
}

#[test]
fn refused_hook_install_is_reported() {
    let (backend, m) = rig(InputSettings::default());
    backend.proc_host().fail_next_install(5);

    assert!(matches!(m.create_pointing_device(None, ""), Err(InputError::HookInstall { code: 5, .. })));
    assert_eq!(m.device_count(), 0);
    assert!(m.create_pointing_device(None, "").is_ok());
}

#[test]
fn explicit_window_overrides_the_application_window() {
    let (backend, m) = rig(InputSettings::default());
    let other = hookup::WindowHandle(0x777);
    backend.create_window(other);

    let kb = m.create_keyboard(Some(other), "").unwrap();
    assert_eq!(kb.window(), Some(other));
    assert!(m.hook().is_hooked(other));
    assert!(!m.hook().is_hooked(W));
    assert_eq!(backend.active_registration(RawUsage::KEYBOARD).unwrap().target, other);
}
