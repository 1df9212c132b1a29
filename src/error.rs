//! Error types for the Modbus master layer
//!
//! Every fallible operation in the crate returns [`ModbusResult`]. The
//! variants fall into four groups:
//!
//! | Group | Variants | Raised |
//! |-------|----------|--------|
//! | Configuration | `ConnectionType`, `RtuParity`, `RegisterType`, `RegisterDataType`, `Encoding`, `Configuration` | before any I/O |
//! | Connection | `ConnectionEstablishing` | by `open()` |
//! | Transaction | `Communication`, `NonSocket`, `QuantityOutOfRange` | by reads/writes |
//! | Value | `Decode` | by the register codec |
//!
//! Nothing inside the crate retries; callers decide their own policy with
//! [`ModbusError::is_retryable`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Modbus master error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModbusError {
    /// Unknown connection type name.
    #[error("invalid modbus type: {value}")]
    ConnectionType { value: String },

    /// Unsupported RTU parity character.
    #[error("invalid rtu parity: {value}")]
    RtuParity { value: String },

    /// Unknown register type, or an operation the register type does not allow.
    #[error("invalid register type: {message}")]
    RegisterType { message: String },

    /// Data type not representable by the register type, or unknown data type name.
    #[error("invalid register data type: {message}")]
    RegisterDataType { message: String },

    /// Invalid encoding parameters.
    #[error("invalid encoding parameters: {message}")]
    Encoding { message: String },

    /// Any other out-of-range configuration value.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    /// The transport could not establish the link.
    #[error("connect failed: {message}")]
    ConnectionEstablishing { message: String },

    /// A read/write transaction failed at the transport.
    #[error("communication failed: {message}")]
    Communication { message: String },

    /// A transaction was issued without a live link.
    #[error("non socket error: {message}")]
    NonSocket { message: String },

    /// Request quantity outside `1..=limit`, or past the end of the address space.
    #[error("quantity {requested} out of range (1..={limit})")]
    QuantityOutOfRange { requested: usize, limit: usize },

    /// Raw words could not be interpreted as the requested type.
    #[error("decode failed: {message}")]
    Decode { message: String },
}

impl ModbusError {
    /// Create a register type error.
    pub fn register_type<S: Into<String>>(message: S) -> Self {
        Self::RegisterType {
            message: message.into(),
        }
    }

    /// Create a register data type error.
    pub fn register_data_type<S: Into<String>>(message: S) -> Self {
        Self::RegisterDataType {
            message: message.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding<S: Into<String>>(message: S) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a generic configuration error.
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection establishing error.
    pub fn connection_establishing<S: Into<String>>(message: S) -> Self {
        Self::ConnectionEstablishing {
            message: message.into(),
        }
    }

    /// Create a communication error.
    pub fn communication<S: Into<String>>(message: S) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Create a non-socket error.
    pub fn non_socket<S: Into<String>>(message: S) -> Self {
        Self::NonSocket {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// True for errors detected before any I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConnectionType { .. }
                | Self::RtuParity { .. }
                | Self::RegisterType { .. }
                | Self::RegisterDataType { .. }
                | Self::Encoding { .. }
                | Self::Configuration { .. }
        )
    }

    /// True when repeating the same call may succeed.
    ///
    /// Transactions leave no partial state behind, so a failed read or write
    /// can be reissued as-is. Establishing the link can also be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Communication { .. } | Self::ConnectionEstablishing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ModbusError::connection_establishing("Connection refused").to_string(),
            "connect failed: Connection refused"
        );
        assert_eq!(
            ModbusError::communication("Connection timed out").to_string(),
            "communication failed: Connection timed out"
        );
        assert_eq!(
            ModbusError::RtuParity {
                value: "X".to_string()
            }
            .to_string(),
            "invalid rtu parity: X"
        );
        assert_eq!(
            ModbusError::QuantityOutOfRange {
                requested: 257,
                limit: 256
            }
            .to_string(),
            "quantity 257 out of range (1..=256)"
        );
    }

    #[test]
    fn test_classification() {
        assert!(ModbusError::register_data_type("coil/float").is_configuration());
        assert!(ModbusError::configuration("data bits").is_configuration());
        assert!(!ModbusError::communication("timeout").is_configuration());

        assert!(ModbusError::communication("timeout").is_retryable());
        assert!(ModbusError::connection_establishing("refused").is_retryable());
        assert!(!ModbusError::decode("short").is_retryable());
        assert!(!ModbusError::non_socket("closed").is_retryable());
    }
}
