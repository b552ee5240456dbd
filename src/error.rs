//! Error type shared by the registry, the window hook and the device objects.
//!
//! Errors fall in three groups:
//! - **configuration** errors (`DeviceNotFound`, `EmptyParameter`, `MissingArgument`,
//!   `TypeMismatch`, `NoWindow`, `Config`) are returned synchronously and never retried;
//! - **driver** errors (`Driver`, `HookInstall`) mean the OS refused an operation and the
//!   binding of that device failed. Callers may retry by requesting the device again;
//! - **routing** errors (`UsageConflict`): the OS delivers one usage to a single window per
//!   process, so a device cannot bind to a second window while its usage targets the first;
//! - **joystick read** errors (`JoystickRead`) are fatal poll results. The disconnect code is
//!   *not* reported through this type, it only flips `Joystick::is_connected`.
//!
//! Raw messages for devices nobody registered are not errors at all; they are dropped.

use crate::device::{DeviceClass, WindowHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("{class} device '{name}' was not found")]
    DeviceNotFound { class: DeviceClass, name: String },

    #[error("parameter '{0}' must not be empty")]
    EmptyParameter(&'static str),

    #[error("missing argument '{0}'")]
    MissingArgument(&'static str),

    #[error("device '{key}' already exists as {found}, cannot create it as {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("no window to bind to: pass a window or configure an application window")]
    NoWindow,

    #[error("driver error during {operation} (code {code:#x})")]
    Driver { operation: &'static str, code: u32 },

    #[error("raw input usage {page:#04x}/{usage:#04x} already targets {registered}, cannot also target {requested}")]
    UsageConflict {
        page: u16,
        usage: u16,
        registered: WindowHandle,
        requested: WindowHandle,
    },

    #[error("could not install the window procedure hook on {window} (code {code:#x})")]
    HookInstall { window: WindowHandle, code: u32 },

    #[error("joystick {id} read failed (code {code})")]
    JoystickRead { id: i32, code: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InputError>;

impl From<toml::de::Error> for InputError {
    fn from(e: toml::de::Error) -> Self {
        InputError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for InputError {
    fn from(e: toml::ser::Error) -> Self {
        InputError::Config(e.to_string())
    }
}
