//! Barrel shifter and the ALU carry/overflow helpers shared by the ARM and
//! Thumb instruction sets.

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// Result of an ALU or shift operation, including flags.
///
/// - **carry**: for shifts, the last bit shifted out; for arithmetic, the
///   unsigned carry/not-borrow.
/// - **overflow**: signed overflow.
/// - **sign**: bit 31 of the result.
/// - **zero**: result is exactly zero.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Default)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

impl ArithmeticOpResult {
    fn logical(result: u32, carry: bool) -> Self {
        Self {
            result,
            carry,
            sign: result.get_bit(31),
            zero: result == 0,
            overflow: false,
        }
    }
}

/// Barrel shift with an immediate 5-bit amount.
///
/// The zero amount encodes a special case for every shift type:
/// - `LSL #0` passes the value through and preserves the carry
/// - `LSR #0` encodes `LSR #32` (result 0, carry = bit 31)
/// - `ASR #0` encodes `ASR #32` (result all-sign, carry = bit 31)
/// - `ROR #0` encodes `RRX` (rotate right through carry by one)
pub fn shift_immediate(kind: ShiftKind, amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    match kind {
        ShiftKind::Lsl => match amount {
            0 => ArithmeticOpResult {
                result: rm,
                carry,
                ..Default::default()
            },
            _ => ArithmeticOpResult {
                result: rm << amount,
                carry: rm.get_bit((32 - amount) as u8),
                ..Default::default()
            },
        },
        ShiftKind::Lsr => match amount {
            0 => ArithmeticOpResult {
                result: 0,
                carry: rm.get_bit(31),
                ..Default::default()
            },
            _ => ArithmeticOpResult {
                result: rm >> amount,
                carry: rm.get_bit((amount - 1) as u8),
                ..Default::default()
            },
        },
        ShiftKind::Asr => match amount {
            0 => ArithmeticOpResult {
                result: if rm.get_bit(31) { u32::MAX } else { 0 },
                carry: rm.get_bit(31),
                ..Default::default()
            },
            _ => ArithmeticOpResult {
                result: ((rm as i32) >> amount) as u32,
                carry: rm.get_bit((amount - 1) as u8),
                ..Default::default()
            },
        },
        ShiftKind::Ror => match amount {
            // ROR#0 encodes RRX: the incoming carry becomes bit 31.
            0 => ArithmeticOpResult {
                result: (u32::from(carry) << 31) | (rm >> 1),
                carry: rm.get_bit(0),
                ..Default::default()
            },
            _ => ArithmeticOpResult {
                result: rm.rotate_right(amount),
                carry: rm.get_bit((amount - 1) as u8),
                ..Default::default()
            },
        },
    }
}

/// Barrel shift with a register-specified amount (the bottom byte of Rs).
///
/// Amount 0 passes the value through and preserves the carry for every shift
/// type. Amounts of 32 and above saturate (LSL/LSR to 0, ASR to all-sign)
/// except ROR, which reduces modulo 32.
pub fn shift_register(kind: ShiftKind, amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    if amount == 0 {
        return ArithmeticOpResult {
            result: rm,
            carry,
            ..Default::default()
        };
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => shift_immediate(kind, amount, rm, carry),
            32 => ArithmeticOpResult {
                result: 0,
                carry: rm.get_bit(0),
                ..Default::default()
            },
            _ => ArithmeticOpResult {
                result: 0,
                carry: false,
                ..Default::default()
            },
        },
        ShiftKind::Lsr => match amount {
            1..=31 => shift_immediate(kind, amount, rm, carry),
            32 => ArithmeticOpResult {
                result: 0,
                carry: rm.get_bit(31),
                ..Default::default()
            },
            _ => ArithmeticOpResult {
                result: 0,
                carry: false,
                ..Default::default()
            },
        },
        ShiftKind::Asr => match amount {
            1..=31 => shift_immediate(kind, amount, rm, carry),
            _ => ArithmeticOpResult {
                result: if rm.get_bit(31) { u32::MAX } else { 0 },
                carry: rm.get_bit(31),
                ..Default::default()
            },
        },
        ShiftKind::Ror => {
            let amount = amount % 32;
            if amount == 0 {
                // ROR by a multiple of 32: value unchanged, carry = bit 31.
                ArithmeticOpResult {
                    result: rm,
                    carry: rm.get_bit(31),
                    ..Default::default()
                }
            } else {
                shift_immediate(kind, amount, rm, carry)
            }
        }
    }
}

/// `first + second`, computing all four condition flags.
pub fn add_op(first: u32, second: u32) -> ArithmeticOpResult {
    let result = first.wrapping_add(second);

    ArithmeticOpResult {
        result,
        carry: u64::from(first) + u64::from(second) > u64::from(u32::MAX),
        overflow: ((first ^ result) & (second ^ result)).get_bit(31),
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// `first - second`, computing all four condition flags.
/// Carry is the ARM not-borrow convention.
pub fn sub_op(first: u32, second: u32) -> ArithmeticOpResult {
    let result = first.wrapping_sub(second);

    ArithmeticOpResult {
        result,
        carry: first >= second,
        overflow: ((first ^ second) & (first ^ result)).get_bit(31),
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// `first + second + carry`, computing all four condition flags.
pub fn adc_op(first: u32, second: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = u64::from(first) + u64::from(second) + u64::from(carry_in);
    let result = wide as u32;

    ArithmeticOpResult {
        result,
        carry: wide > u64::from(u32::MAX),
        overflow: ((first ^ result) & (second ^ result)).get_bit(31),
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// `first - second - !carry` (i.e. `first + !second + carry`), all flags.
pub fn sbc_op(first: u32, second: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = u64::from(first) + u64::from(!second) + u64::from(carry_in);
    let result = wide as u32;

    ArithmeticOpResult {
        result,
        carry: wide > u64::from(u32::MAX),
        overflow: ((first ^ second) & (first ^ result)).get_bit(31),
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// Flags for a logical operation: N/Z from the result, C from the shifter.
pub fn logical_op(result: u32, shifter_carry: bool) -> ArithmeticOpResult {
    ArithmeticOpResult::logical(result, shifter_carry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_lsl_immediate() {
        // LSL #0 preserves value and carry.
        let out = shift_immediate(ShiftKind::Lsl, 0, 0xDEAD_BEEF, true);
        assert_eq!(out.result, 0xDEAD_BEEF);
        assert!(out.carry);

        let out = shift_immediate(ShiftKind::Lsl, 1, 0x8000_0001, false);
        assert_eq!(out.result, 0x0000_0002);
        assert!(out.carry);

        let out = shift_immediate(ShiftKind::Lsl, 31, 0x3, false);
        assert_eq!(out.result, 0x8000_0000);
        assert!(out.carry);
    }

    #[test]
    fn check_lsr_immediate() {
        // LSR #0 encodes LSR #32.
        let out = shift_immediate(ShiftKind::Lsr, 0, 0x8000_0000, false);
        assert_eq!(out.result, 0);
        assert!(out.carry);

        let out = shift_immediate(ShiftKind::Lsr, 1, 0x3, false);
        assert_eq!(out.result, 0x1);
        assert!(out.carry);

        let out = shift_immediate(ShiftKind::Lsr, 31, 0x8000_0000, true);
        assert_eq!(out.result, 0x1);
        assert!(!out.carry);
    }

    #[test]
    fn check_asr_immediate() {
        // ASR #0 encodes ASR #32: all-sign result.
        let out = shift_immediate(ShiftKind::Asr, 0, 0x8000_0000, false);
        assert_eq!(out.result, u32::MAX);
        assert!(out.carry);

        let out = shift_immediate(ShiftKind::Asr, 0, 0x7FFF_FFFF, true);
        assert_eq!(out.result, 0);
        assert!(!out.carry);

        let out = shift_immediate(ShiftKind::Asr, 1, 0x8000_0002, false);
        assert_eq!(out.result, 0xC000_0001);
        assert!(!out.carry);
    }

    #[test]
    fn check_rrx() {
        // ROR #0 encodes RRX.
        let out = shift_immediate(ShiftKind::Ror, 0, 0x0000_0001, true);
        assert_eq!(out.result, 0x8000_0000);
        assert!(out.carry);

        let out = shift_immediate(ShiftKind::Ror, 0, 0x0000_0002, false);
        assert_eq!(out.result, 0x0000_0001);
        assert!(!out.carry);
    }

    #[test]
    fn check_register_amount_zero_preserves() {
        for kind in [ShiftKind::Lsl, ShiftKind::Lsr, ShiftKind::Asr, ShiftKind::Ror] {
            let out = shift_register(kind, 0, 0x1234_5678, true);
            assert_eq!(out.result, 0x1234_5678);
            assert!(out.carry);
        }
    }

    #[test]
    fn check_register_amount_32() {
        let out = shift_register(ShiftKind::Lsl, 32, 0x0000_0001, false);
        assert_eq!(out.result, 0);
        assert!(out.carry);

        let out = shift_register(ShiftKind::Lsr, 32, 0x8000_0000, false);
        assert_eq!(out.result, 0);
        assert!(out.carry);

        let out = shift_register(ShiftKind::Asr, 32, 0x8000_0000, false);
        assert_eq!(out.result, u32::MAX);
        assert!(out.carry);

        let out = shift_register(ShiftKind::Ror, 32, 0xA5A5_0000, false);
        assert_eq!(out.result, 0xA5A5_0000);
        assert!(out.carry);
    }

    #[test]
    fn check_register_amount_over_32() {
        for amount in [33, 63] {
            let out = shift_register(ShiftKind::Lsl, amount, u32::MAX, true);
            assert_eq!(out.result, 0);
            assert!(!out.carry);

            let out = shift_register(ShiftKind::Lsr, amount, u32::MAX, true);
            assert_eq!(out.result, 0);
            assert!(!out.carry);

            let out = shift_register(ShiftKind::Asr, amount, 0x8000_0000, false);
            assert_eq!(out.result, u32::MAX);
            assert!(out.carry);
        }

        // ROR reduces modulo 32: 33 behaves as 1.
        let out = shift_register(ShiftKind::Ror, 33, 0x0000_0003, false);
        assert_eq!(out.result, 0x8000_0001);
        assert!(out.carry);

        // ROR by 63 behaves as 31.
        let out = shift_register(ShiftKind::Ror, 63, 0x8000_0000, false);
        assert_eq!(out.result, 0x0000_0001);
        assert_eq!(
            out.result,
            shift_register(ShiftKind::Ror, 31, 0x8000_0000, false).result
        );
    }

    #[test]
    fn check_shift_amount_1_and_31() {
        let out = shift_register(ShiftKind::Lsr, 1, 0x0000_0003, false);
        assert_eq!(out.result, 0x1);
        assert!(out.carry);

        let out = shift_register(ShiftKind::Lsl, 31, 0x0000_0003, false);
        assert_eq!(out.result, 0x8000_0000);
        assert!(out.carry);
    }

    #[test]
    fn check_add_overflow() {
        let out = add_op(0x7FFF_FFFF, 1);
        assert_eq!(out.result, 0x8000_0000);
        assert!(out.sign);
        assert!(!out.zero);
        assert!(!out.carry);
        assert!(out.overflow);
    }

    #[test]
    fn check_sub_borrow() {
        let out = sub_op(0, 1);
        assert_eq!(out.result, u32::MAX);
        assert!(!out.carry);
        assert!(!out.overflow);

        let out = sub_op(5, 5);
        assert!(out.zero);
        assert!(out.carry);
    }

    #[test]
    fn check_adc_sbc() {
        let out = adc_op(u32::MAX, 0, true);
        assert_eq!(out.result, 0);
        assert!(out.carry);
        assert!(out.zero);

        // SBC with carry set behaves as plain SUB.
        let out = sbc_op(10, 4, true);
        assert_eq!(out.result, 6);
        assert!(out.carry);

        // Carry clear borrows one more.
        let out = sbc_op(10, 4, false);
        assert_eq!(out.result, 5);
    }
}
