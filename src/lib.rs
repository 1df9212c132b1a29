//! # EMS Modbus Master - Register Transaction Layer
//!
//! **License:** MIT
//!
//! Master-side data access for Modbus slaves over TCP or RTU. The crate sits
//! on top of a framing primitive (`tokio-modbus`) and adds the parts a
//! monitoring application needs:
//!
//! - a [`ConnectionSession`] that owns one link and issues bounded bit and
//!   register transactions against a slave
//! - a register codec that turns raw words into typed [`ActualData`] values
//!   and back, honouring the device's byte and word order
//! - validated [`RegisterDescriptor`] point definitions
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Session call |
//! |------|----------|--------------|
//! | 0x01 | Read Coils | `read_coils()` |
//! | 0x02 | Read Discrete Inputs | `read_discrete_inputs()` |
//! | 0x03 | Read Holding Registers | `read_holding_registers()` |
//! | 0x04 | Read Input Registers | `read_input_registers()` |
//! | 0x05 | Write Single Coil | `write_coil()` |
//! | 0x06 | Write Single Register | `write_holding_register()` |
//! | 0x0F | Write Multiple Coils | `write_coils()` |
//! | 0x10 | Write Multiple Registers | `write_holding_registers()` |
//!
//! Each call carries at most [`MAX_REQUEST_LENGTH`] elements.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ems_modbus_master::{ConnectionSession, DataType, ModbusResult, RegisterDescriptor, RegisterType};
//! use ems_modbus_master::config::TcpConfig;
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let mut session = ConnectionSession::new(TcpConfig::new("192.168.1.20", 502).into())?;
//!     session.open().await?;
//!
//!     let power = RegisterDescriptor::new(RegisterType::InputRegister, DataType::Float, 0x0010, 1)?;
//!     let values = session.read_point(&power).await?;
//!     println!("active power: {}", values[0]);
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Error types and result alias
pub mod error;

/// Request limits and function codes
pub mod constants;

/// Connection, timeout and encoding configuration
pub mod config;

/// Transport boundary and the tokio-modbus implementation
pub mod transport;

/// Connection lifecycle and bounded transactions
pub mod session;

// ============================================================================
// Register values
// ============================================================================

/// Register point definitions
pub mod register;

/// Decoded register values
pub mod value;

/// Byte order handling for multi-register data types
pub mod bytes;

/// Conversion between raw words and typed values
pub mod codec;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime ===
pub use tokio;

// === Session API ===
pub use session::{ConnectionSession, SessionState, SessionStats, SharedSession};
pub use transport::{
    ModbusTransport, TokioModbusTransport, TransportError, TransportErrorKind, TransportResult,
};

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Configuration ===
pub use config::{
    ConnectionConfig, ConnectionType, Encoding, Endianness, ModbusConfig, NamedEnum, Parity,
    RtuConfig, TcpConfig, Timeout,
};

// === Register points and values ===
pub use bytes::ByteOrder;
pub use codec::{decode, decode_values, encode, encode_numeric, encode_values};
pub use register::{DataType, RegisterDescriptor, RegisterType, Scaling};
pub use value::ActualData;

// === Limits ===
pub use constants::{DEFAULT_TCP_PORT, MAX_REQUEST_LENGTH};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
