use crate::types::{EntityId, EntityKind};
use std::fmt;

/// Errors that can occur when reading skeleton state or reporting device data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkelError {
    #[error("invalid or stale skeleton handle")]
    InvalidHandle,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("no {0} with id {1}")]
    IdNotFound(EntityKind, EntityId),

    #[error("no {0} named '{1}'")]
    NameNotFound(EntityKind, String),

    #[error("{0} index {1} out of range (count {2})")]
    IndexOutOfRange(EntityKind, u32, u32),

    #[error("name buffer too small: need {needed} bytes, got {capacity}")]
    BufferTooSmall { needed: u32, capacity: u32 },

    #[error("no pose reported yet for {0} {1}")]
    NoPoseYet(EntityKind, EntityId),

    #[error("{0} name '{1}' already in use")]
    DuplicateName(EntityKind, String),

    #[error("no skeleton attached for sensor {0}")]
    UnknownSensor(u32),

    #[error("device interface not configured: {0}")]
    NotConfigured(&'static str),

    #[error("client context disconnected")]
    ConnectionClosed,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &SkelError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
