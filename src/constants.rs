//! Limits and function codes used by the transaction layer
//!
//! The per-call limit is set by the session's scratch buffers rather than by
//! the PDU size. A 256-element call is only guaranteed to fit a frame for
//! bit reads and writes. Register reads above 125 and register writes above
//! 123 exceed the PDU: writes are refused by the framing layer before they
//! reach the wire, reads are usually rejected by the device with an
//! exception. Both surface as a communication failure.

// ============================================================================
// Request Limits
// ============================================================================

/// Capacity of each session scratch buffer, and the maximum number of bits or
/// registers a single read/write call may carry.
pub const MAX_REQUEST_LENGTH: usize = 256;

/// Size of the 16-bit Modbus address space.
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// Modbus TCP default port.
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Default response timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1;

/// Largest microsecond component accepted in a timeout.
pub const MAX_TIMEOUT_USEC: u32 = 999_999;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Short human-readable name of a function code, for log lines.
pub fn function_name(code: u8) -> &'static str {
    match code {
        FC_READ_COILS => "read coils",
        FC_READ_DISCRETE_INPUTS => "read discrete inputs",
        FC_READ_HOLDING_REGISTERS => "read holding registers",
        FC_READ_INPUT_REGISTERS => "read input registers",
        FC_WRITE_SINGLE_COIL => "write single coil",
        FC_WRITE_SINGLE_REGISTER => "write single register",
        FC_WRITE_MULTIPLE_COILS => "write multiple coils",
        FC_WRITE_MULTIPLE_REGISTERS => "write multiple registers",
        _ => "unknown",
    }
}
