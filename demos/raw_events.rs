use hookup::backends::virtual_input::VirtualBackend;
use hookup::decoder::{encode, RI_KEY_BREAK, RI_MOUSE_LEFT_BUTTON_DOWN, RI_MOUSE_LEFT_BUTTON_UP};
use hookup::devices::Key;
use hookup::logger::Logger;
use hookup::metadata::DeviceRecord;
use hookup::{DeviceClass, DeviceHandle, DeviceManager, InputSettings, PointerEvent, WindowHandle};
use std::sync::Arc;

fn main() {
    // RUST_LOG=debug cargo run --example raw_events
    env_logger::init();

    let window = WindowHandle(0x1);
    let backend = Arc::new(VirtualBackend::new());
    backend.add_device(DeviceRecord::new(DeviceClass::Pointer, "Demo Mouse", DeviceHandle(0x20), Some("demo:mouse".into())));
    backend.create_window(window);

    let settings = InputSettings::load_or_default("input.toml").expect("load settings");
    let manager = DeviceManager::new(backend.clone(), Some(window), settings).expect("create manager");

    println!("Pointing devices:");
    for name in manager.pointing_device_names() {
        println!("- {}", name);
    }

    let keyboard = manager.create_keyboard(None, "").expect("system keyboard");
    keyboard.add_listener(Logger::with_target("demo::keyboard"));

    let mouse = manager.create_pointing_device(None, "Demo Mouse").expect("demo mouse");
    mouse.add_listener(|e: &hookup::InputEvent<PointerEvent>| {
        if let PointerEvent::DoubleClicked(args) = &e.kind {
            println!("(Virtual) double click at {:?}", args.position);
        }
    });

    // Feed a few records through the hooked window procedure.
    let kb = DeviceHandle(0x10);
    let m = DeviceHandle(0x20);
    backend.send_raw_input(window, encode::keyboard(kb, Key::A, 0x1E, 0));
    backend.send_raw_input(window, encode::keyboard(kb, Key::A, 0x1E, RI_KEY_BREAK));
    backend.send_raw_input(window, encode::mouse_move(m, 40, 25));
    for _ in 0..2 {
        backend.send_raw_input(window, encode::mouse_buttons(m, RI_MOUSE_LEFT_BUTTON_DOWN));
        backend.send_raw_input(window, encode::mouse_buttons(m, RI_MOUSE_LEFT_BUTTON_UP));
    }

    println!("{}", manager.snapshot().to_json().expect("snapshot"));
}
