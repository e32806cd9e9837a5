//! Error types for padpoll-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID device communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// No attached device matched the acceptor.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Raw report shorter than the model's fixed layout.
    #[error("packet too short: expected at least {expected} bytes, received {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    /// Reading from the input event stream failed or returned a partial event.
    #[error("event read failed: {0}")]
    EventRead(String),

    /// Writing the indicator LED event failed.
    #[error("LED write failed: {0}")]
    LedWrite(String),

    /// Channel or button write outside the model's cardinality.
    #[error("{kind} index {index} out of range (device has {len})")]
    SlotOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    /// Configuration value out of its accepted range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of errors for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// State left untouched, next cycle proceeds normally.
    Recoverable,
    /// The current poll cycle was cut short; polling may continue.
    CycleAborted,
    /// Diagnostic only, the operation carried on.
    Diagnostic,
    /// Nothing left to drive; stop polling.
    Fatal,
}

impl ErrorClass {
    /// Classify an error for loop-continuation decisions.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::PacketTooShort { .. } | Error::SlotOutOfRange { .. } => Self::Recoverable,
            Error::EventRead(_) | Error::Hid(_) => Self::CycleAborted,
            Error::LedWrite(_) => Self::Diagnostic,
            Error::DeviceNotFound(_) | Error::OutOfRange { .. } | Error::Config(_) => Self::Fatal,
        }
    }

    /// Whether polling should stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

impl Error {
    /// Shorthand for [`ErrorClass::classify`].
    pub fn class(&self) -> ErrorClass {
        ErrorClass::classify(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_packet_is_recoverable() {
        let err = Error::PacketTooShort {
            expected: 49,
            actual: 12,
        };
        assert_eq!(err.class(), ErrorClass::Recoverable);
        assert!(!err.class().is_fatal());
    }

    #[test]
    fn missing_device_is_fatal() {
        let err = Error::DeviceNotFound("/dev/input/event0..255".into());
        assert!(err.class().is_fatal());
    }

    #[test]
    fn event_read_aborts_cycle() {
        let err = Error::EventRead("short read".into());
        assert_eq!(err.class(), ErrorClass::CycleAborted);
        assert_eq!(
            Error::Hid("read: broken pipe".into()).class(),
            ErrorClass::CycleAborted
        );
    }

    #[test]
    fn led_failure_is_diagnostic() {
        assert_eq!(
            Error::LedWrite("EBADF".into()).class(),
            ErrorClass::Diagnostic
        );
    }

    #[test]
    fn messages_include_lengths() {
        let err = Error::PacketTooShort {
            expected: 49,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "packet too short: expected at least 49 bytes, received 7"
        );
    }
}
