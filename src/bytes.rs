//! # Register Byte Order
//!
//! Assembly of 16-bit registers into the big-endian byte image of a value,
//! and the inverse. An [`Encoding`] is first reduced to one of four
//! [`ByteOrder`]s using ABCD notation:
//!
//! - A = most significant byte, D = least significant byte
//! - `Little` endianness reverses the whole byte stream
//! - `byte_swap` exchanges the two bytes inside every register
//!
//! For registers `[0x1234, 0x5678]`:
//!
//! | Encoding | Order | Value |
//! |----------|-------|-------|
//! | Big | ABCD | `0x12345678` |
//! | Little | DCBA | `0x78563412` |
//! | Big + swap | BADC | `0x34127856` |
//! | Little + swap | CDAB | `0x56781234` |
//!
//! A single register follows the same rule: it is byte-reversed when exactly
//! one of the two flags is set.

use std::fmt;

use crate::config::{Encoding, Endianness};

/// Canonical byte layout of a multi-register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// ABCD: registers in address order, high byte first.
    #[default]
    Abcd,
    /// DCBA: fully reversed.
    Dcba,
    /// BADC: registers in address order, low byte first.
    Badc,
    /// CDAB: registers reversed, high byte first.
    Cdab,
}

impl ByteOrder {
    /// Parse the common device-manual spellings.
    ///
    /// - "ABCD", "AB-CD", "BE", "BIG_ENDIAN" → Abcd
    /// - "DCBA", "DC-BA", "LE", "LITTLE_ENDIAN" → Dcba
    /// - "BADC", "BA-DC" → Badc
    /// - "CDAB", "CD-AB", "WORD_SWAP" → Cdab
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "BE" | "BIGENDIAN" | "ABCDEFGH" => Some(Self::Abcd),
            "DCBA" | "LE" | "LITTLEENDIAN" | "HGFEDCBA" => Some(Self::Dcba),
            "BADC" | "BYTESWAP" | "BADCFEHG" => Some(Self::Badc),
            "CDAB" | "WORDSWAP" | "GHEFCDAB" => Some(Self::Cdab),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abcd => "ABCD",
            Self::Dcba => "DCBA",
            Self::Badc => "BADC",
            Self::Cdab => "CDAB",
        }
    }

    /// True when each register's two bytes are reversed.
    #[inline]
    pub fn flips_register_bytes(&self) -> bool {
        matches!(self, Self::Dcba | Self::Badc)
    }

    /// True when registers are taken in reverse address order.
    #[inline]
    pub fn reverses_registers(&self) -> bool {
        matches!(self, Self::Dcba | Self::Cdab)
    }
}

impl From<Encoding> for ByteOrder {
    fn from(encoding: Encoding) -> Self {
        match (encoding.endianness, encoding.byte_swap) {
            (Endianness::Big, false) => Self::Abcd,
            (Endianness::Little, false) => Self::Dcba,
            (Endianness::Big, true) => Self::Badc,
            (Endianness::Little, true) => Self::Cdab,
        }
    }
}

impl From<ByteOrder> for Encoding {
    fn from(order: ByteOrder) -> Self {
        match order {
            ByteOrder::Abcd => Encoding::new(Endianness::Big, false),
            ByteOrder::Dcba => Encoding::new(Endianness::Little, false),
            ByteOrder::Badc => Encoding::new(Endianness::Big, true),
            ByteOrder::Cdab => Encoding::new(Endianness::Little, true),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Registers to bytes
// ============================================================================

/// Byte image of one register.
#[inline]
pub fn reg_to_bytes_2(reg: u16, order: ByteOrder) -> [u8; 2] {
    if order.flips_register_bytes() {
        reg.to_le_bytes()
    } else {
        reg.to_be_bytes()
    }
}

/// Big-endian byte image of a 32-bit value held in two registers.
#[inline]
pub fn regs_to_bytes_4(regs: &[u16; 2], order: ByteOrder) -> [u8; 4] {
    let [h0, h1] = [regs[0].to_be_bytes(), regs[1].to_be_bytes()];

    match order {
        ByteOrder::Abcd => [h0[0], h0[1], h1[0], h1[1]],
        ByteOrder::Dcba => [h1[1], h1[0], h0[1], h0[0]],
        ByteOrder::Badc => [h0[1], h0[0], h1[1], h1[0]],
        ByteOrder::Cdab => [h1[0], h1[1], h0[0], h0[1]],
    }
}

/// Big-endian byte image of a 64-bit value held in four registers.
#[inline]
pub fn regs_to_bytes_8(regs: &[u16; 4], order: ByteOrder) -> [u8; 8] {
    let mut ordered = *regs;
    if order.reverses_registers() {
        ordered.reverse();
    }

    let mut out = [0u8; 8];
    for (chunk, reg) in out.chunks_exact_mut(2).zip(ordered) {
        let bytes = if order.flips_register_bytes() {
            reg.to_le_bytes()
        } else {
            reg.to_be_bytes()
        };
        chunk.copy_from_slice(&bytes);
    }
    out
}

// ============================================================================
// Bytes to registers
// ============================================================================

#[inline]
pub fn bytes_2_to_reg(bytes: [u8; 2], order: ByteOrder) -> u16 {
    if order.flips_register_bytes() {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    }
}

/// Registers carrying a 32-bit value whose big-endian image is `bytes`.
#[inline]
pub fn bytes_4_to_regs(bytes: &[u8; 4], order: ByteOrder) -> [u16; 2] {
    match order {
        ByteOrder::Abcd => [
            u16::from_be_bytes([bytes[0], bytes[1]]),
            u16::from_be_bytes([bytes[2], bytes[3]]),
        ],
        ByteOrder::Dcba => [
            u16::from_be_bytes([bytes[3], bytes[2]]),
            u16::from_be_bytes([bytes[1], bytes[0]]),
        ],
        ByteOrder::Badc => [
            u16::from_be_bytes([bytes[1], bytes[0]]),
            u16::from_be_bytes([bytes[3], bytes[2]]),
        ],
        ByteOrder::Cdab => [
            u16::from_be_bytes([bytes[2], bytes[3]]),
            u16::from_be_bytes([bytes[0], bytes[1]]),
        ],
    }
}

/// Registers carrying a 64-bit value whose big-endian image is `bytes`.
#[inline]
pub fn bytes_8_to_regs(bytes: &[u8; 8], order: ByteOrder) -> [u16; 4] {
    let mut regs = [0u16; 4];
    for (reg, chunk) in regs.iter_mut().zip(bytes.chunks_exact(2)) {
        *reg = bytes_2_to_reg([chunk[0], chunk[1]], order);
    }
    if order.reverses_registers() {
        regs.reverse();
    }
    regs
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ORDERS: [ByteOrder; 4] = [
        ByteOrder::Abcd,
        ByteOrder::Dcba,
        ByteOrder::Badc,
        ByteOrder::Cdab,
    ];

    #[test]
    fn test_from_str_valid() {
        assert_eq!(ByteOrder::from_str("ABCD"), Some(ByteOrder::Abcd));
        assert_eq!(ByteOrder::from_str("ab-cd"), Some(ByteOrder::Abcd));
        assert_eq!(ByteOrder::from_str("BE"), Some(ByteOrder::Abcd));
        assert_eq!(ByteOrder::from_str("little_endian"), Some(ByteOrder::Dcba));
        assert_eq!(ByteOrder::from_str("CD AB"), Some(ByteOrder::Cdab));
        assert_eq!(ByteOrder::from_str("BADC"), Some(ByteOrder::Badc));
        assert_eq!(ByteOrder::from_str("word_swap"), Some(ByteOrder::Cdab));
    }

    #[test]
    fn test_from_str_invalid() {
        assert_eq!(ByteOrder::from_str("invalid"), None);
        assert_eq!(ByteOrder::from_str(""), None);
    }

    #[test]
    fn test_encoding_mapping() {
        assert_eq!(ByteOrder::from(Encoding::new(Endianness::Big, false)), ByteOrder::Abcd);
        assert_eq!(ByteOrder::from(Encoding::new(Endianness::Little, false)), ByteOrder::Dcba);
        assert_eq!(ByteOrder::from(Encoding::new(Endianness::Big, true)), ByteOrder::Badc);
        assert_eq!(ByteOrder::from(Encoding::new(Endianness::Little, true)), ByteOrder::Cdab);

        for order in ALL_ORDERS {
            assert_eq!(ByteOrder::from(Encoding::from(order)), order);
        }
    }

    #[test]
    fn test_reg_to_bytes_2() {
        assert_eq!(reg_to_bytes_2(0x1234, ByteOrder::Abcd), [0x12, 0x34]);
        assert_eq!(reg_to_bytes_2(0x1234, ByteOrder::Dcba), [0x34, 0x12]);
        assert_eq!(reg_to_bytes_2(0x1234, ByteOrder::Badc), [0x34, 0x12]);
        assert_eq!(reg_to_bytes_2(0x1234, ByteOrder::Cdab), [0x12, 0x34]);
    }

    #[test]
    fn test_regs_to_bytes_4_all_orders() {
        let regs = [0x1234, 0x5678];

        assert_eq!(regs_to_bytes_4(&regs, ByteOrder::Abcd), [0x12, 0x34, 0x56, 0x78]);
        assert_eq!(regs_to_bytes_4(&regs, ByteOrder::Dcba), [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(regs_to_bytes_4(&regs, ByteOrder::Badc), [0x34, 0x12, 0x78, 0x56]);
        assert_eq!(regs_to_bytes_4(&regs, ByteOrder::Cdab), [0x56, 0x78, 0x12, 0x34]);
    }

    #[test]
    fn test_regs_to_bytes_8_all_orders() {
        let regs = [0x1234, 0x5678, 0x9ABC, 0xDEF0];

        assert_eq!(
            regs_to_bytes_8(&regs, ByteOrder::Abcd),
            [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]
        );
        assert_eq!(
            regs_to_bytes_8(&regs, ByteOrder::Dcba),
            [0xF0, 0xDE, 0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12]
        );
        assert_eq!(
            regs_to_bytes_8(&regs, ByteOrder::Badc),
            [0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A, 0xF0, 0xDE]
        );
        assert_eq!(
            regs_to_bytes_8(&regs, ByteOrder::Cdab),
            [0xDE, 0xF0, 0x9A, 0xBC, 0x56, 0x78, 0x12, 0x34]
        );
    }

    #[test]
    fn test_bytes_to_regs_inverts_assembly() {
        let regs4 = [0x1234, 0x5678];
        let regs8 = [0x1234, 0x5678, 0x9ABC, 0xDEF0];
        for order in ALL_ORDERS {
            assert_eq!(bytes_4_to_regs(&regs_to_bytes_4(&regs4, order), order), regs4);
            assert_eq!(bytes_8_to_regs(&regs_to_bytes_8(&regs8, order), order), regs8);
            assert_eq!(bytes_2_to_reg(reg_to_bytes_2(0xBEEF, order), order), 0xBEEF);
        }
    }
}
