//! HTTP/2 settings management
//!
//! SETTINGS parameters (RFC 7540 Section 6.5) kept as an ordered list of
//! raw `(identifier, value)` pairs. Known parameters get typed setters and
//! getters, but any identifier and value can be sent; range checks only
//! apply when the session enforces conformance.

use super::codec::MAX_FRAME_SIZE;
use super::error::{Error, Result};
use super::DEFAULT_MAX_FRAME_SIZE;
use std::fmt;

/// Default SETTINGS_MAX_CONCURRENT_STREAMS advertised by the client
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;

/// HTTP/2 settings parameters (RFC 7540 Section 6.5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SettingsParameter {
    /// SETTINGS_HEADER_TABLE_SIZE (0x1)
    HeaderTableSize = 0x1,
    /// SETTINGS_ENABLE_PUSH (0x2)
    EnablePush = 0x2,
    /// SETTINGS_MAX_CONCURRENT_STREAMS (0x3)
    MaxConcurrentStreams = 0x3,
    /// SETTINGS_INITIAL_WINDOW_SIZE (0x4)
    InitialWindowSize = 0x4,
    /// SETTINGS_MAX_FRAME_SIZE (0x5)
    MaxFrameSize = 0x5,
    /// SETTINGS_MAX_HEADER_LIST_SIZE (0x6)
    MaxHeaderListSize = 0x6,
    /// SETTINGS_ENABLE_CONNECT_PROTOCOL (0x8) - RFC 8441
    EnableConnectProtocol = 0x8,
    /// SETTINGS_NO_RFC7540_PRIORITIES (0x9) - RFC 9218
    NoRfc7540Priorities = 0x9,
}

impl SettingsParameter {
    /// Convert to u16
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Create from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1 => Some(SettingsParameter::HeaderTableSize),
            0x2 => Some(SettingsParameter::EnablePush),
            0x3 => Some(SettingsParameter::MaxConcurrentStreams),
            0x4 => Some(SettingsParameter::InitialWindowSize),
            0x5 => Some(SettingsParameter::MaxFrameSize),
            0x6 => Some(SettingsParameter::MaxHeaderListSize),
            0x8 => Some(SettingsParameter::EnableConnectProtocol),
            0x9 => Some(SettingsParameter::NoRfc7540Priorities),
            _ => None,
        }
    }

    /// Get parameter name
    pub fn name(&self) -> &'static str {
        match self {
            SettingsParameter::HeaderTableSize => "HEADER_TABLE_SIZE",
            SettingsParameter::EnablePush => "ENABLE_PUSH",
            SettingsParameter::MaxConcurrentStreams => "MAX_CONCURRENT_STREAMS",
            SettingsParameter::InitialWindowSize => "INITIAL_WINDOW_SIZE",
            SettingsParameter::MaxFrameSize => "MAX_FRAME_SIZE",
            SettingsParameter::MaxHeaderListSize => "MAX_HEADER_LIST_SIZE",
            SettingsParameter::EnableConnectProtocol => "ENABLE_CONNECT_PROTOCOL",
            SettingsParameter::NoRfc7540Priorities => "NO_RFC7540_PRIORITIES",
        }
    }
}

impl fmt::Display for SettingsParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u16())
    }
}

/// HTTP/2 settings, in the order they go on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    params: Vec<(u16, u32)>,
}

impl Settings {
    /// Create empty settings
    pub fn new() -> Self {
        Settings { params: Vec::new() }
    }

    /// What the client advertises unless told otherwise
    pub fn client_default() -> Self {
        SettingsBuilder::new()
            .max_concurrent_streams(DEFAULT_MAX_CONCURRENT_STREAMS)
            .build()
    }

    /// Parse a SETTINGS payload
    ///
    /// Trailing bytes that do not form a whole 6-byte entry are ignored.
    pub fn parse(payload: &[u8]) -> Self {
        let params = payload
            .chunks_exact(6)
            .map(|entry| {
                let id = u16::from_be_bytes([entry[0], entry[1]]);
                let value = u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]);
                (id, value)
            })
            .collect();
        Settings { params }
    }

    /// Set a parameter, replacing an earlier value for the same identifier
    pub fn set(&mut self, id: u16, value: u32) {
        match self.params.iter_mut().find(|(i, _)| *i == id) {
            Some(entry) => entry.1 = value,
            None => self.params.push((id, value)),
        }
    }

    /// Append a parameter even if the identifier is already present
    pub fn push(&mut self, id: u16, value: u32) {
        self.params.push((id, value));
    }

    /// Last value sent for an identifier (later entries win, as on the wire)
    pub fn get(&self, id: u16) -> Option<u32> {
        self.params
            .iter()
            .rev()
            .find(|(i, _)| *i == id)
            .map(|(_, v)| *v)
    }

    /// Maximum concurrent streams, if advertised
    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.get(SettingsParameter::MaxConcurrentStreams.as_u16())
    }

    /// Maximum frame size, if advertised
    pub fn max_frame_size(&self) -> Option<u32> {
        self.get(SettingsParameter::MaxFrameSize.as_u16())
    }

    /// Header table size, if advertised
    pub fn header_table_size(&self) -> Option<u32> {
        self.get(SettingsParameter::HeaderTableSize.as_u16())
    }

    /// All parameters in wire order
    pub fn iter(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.params.iter().copied()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if there are no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Validate settings values
    pub fn validate(&self) -> Result<()> {
        for (id, value) in self.iter() {
            match SettingsParameter::from_u16(id) {
                Some(SettingsParameter::EnablePush)
                | Some(SettingsParameter::EnableConnectProtocol)
                | Some(SettingsParameter::NoRfc7540Priorities)
                    if value > 1 =>
                {
                    return Err(Error::Protocol(format!(
                        "SETTINGS_{} must be 0 or 1, got {}",
                        SettingsParameter::from_u16(id).map(|p| p.name()).unwrap_or("?"),
                        value
                    )));
                }
                Some(SettingsParameter::InitialWindowSize) if value > 0x7FFFFFFF => {
                    return Err(Error::Protocol(format!(
                        "Initial window size {} exceeds maximum (2^31-1)",
                        value
                    )));
                }
                Some(SettingsParameter::MaxFrameSize)
                    if !(DEFAULT_MAX_FRAME_SIZE..=MAX_FRAME_SIZE as u32).contains(&value) =>
                {
                    return Err(Error::Protocol(format!(
                        "Max frame size {} outside valid range ({}-{})",
                        value, DEFAULT_MAX_FRAME_SIZE, MAX_FRAME_SIZE
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (id, value) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            match SettingsParameter::from_u16(id) {
                Some(param) => write!(f, "{}={}", param.name(), value)?,
                None => write!(f, "0x{:x}={}", id, value)?,
            }
        }
        Ok(())
    }
}

/// Builder for HTTP/2 settings
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Create a new settings builder
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings::new(),
        }
    }

    /// Set header table size
    pub fn header_table_size(mut self, size: u32) -> Self {
        self.settings.set(SettingsParameter::HeaderTableSize.as_u16(), size);
        self
    }

    /// Set enable push
    pub fn enable_push(mut self, enable: bool) -> Self {
        self.settings.set(SettingsParameter::EnablePush.as_u16(), enable as u32);
        self
    }

    /// Set max concurrent streams
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.settings.set(SettingsParameter::MaxConcurrentStreams.as_u16(), max);
        self
    }

    /// Set initial window size
    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.settings.set(SettingsParameter::InitialWindowSize.as_u16(), size);
        self
    }

    /// Set max frame size
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.settings.set(SettingsParameter::MaxFrameSize.as_u16(), size);
        self
    }

    /// Set max header list size
    pub fn max_header_list_size(mut self, size: u32) -> Self {
        self.settings.set(SettingsParameter::MaxHeaderListSize.as_u16(), size);
        self
    }

    /// Set an arbitrary parameter, known or not
    pub fn raw(mut self, id: u16, value: u32) -> Self {
        self.settings.set(id, value);
        self
    }

    /// Build the settings
    pub fn build(self) -> Settings {
        self.settings
    }
}
