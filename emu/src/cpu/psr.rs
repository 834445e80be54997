//! # Program Status Registers (CPSR and SPSR)
//!
//! The PSR contains condition flags (N, Z, C, V) and control bits (mode, state, interrupts).
//!
//! ```text
//! 31 30 29 28 27 26      8 7 6 5 4   0
//! ┌──┬──┬──┬──┬──┬────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │Q │Reserved│I│F│T│Mode │
//! └──┴──┴──┴──┴──┴────────┴─┴─┴─┴─────┘
//! ```
//!
//! - **Flags (28-31)**: See [`condition`](super::condition) for how these are tested
//! - **Mode (0-4)**: See [`cpu_modes`](super::cpu_modes) for operating modes
//! - **T bit (5)**: ARM (0) or Thumb (1) state
//! - **I/F bits (6-7)**: IRQ/FIQ disable
//!
//! Each exception mode has a **SPSR** to save the CPSR on exception entry.
//! See [`register_bank`](super::register_bank) for SPSR storage.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::alu::ArithmeticOpResult;
use crate::cpu::{condition::Condition, cpu_modes::Mode};

/// Program Status Register (CPSR or SPSR).
///
/// Wraps the raw 32-bit word and provides type-safe accessors for each
/// field, so MMIO and MSR/MRS observe the exact same bits the accessors do.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    pub(crate) fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match cond {
            EQ => self.zero_flag(),                         // Equal (Z=1)
            NE => !self.zero_flag(),                        // Not equal (Z=0)
            CS => self.carry_flag(),                        // Unsigned higher or same (C=1)
            CC => !self.carry_flag(),                       // Unsigned lower (C=0)
            MI => self.sign_flag(),                         // Negative (N=1)
            PL => !self.sign_flag(),                        // Positive or zero (N=0)
            VS => self.overflow_flag(),                     // Overflow (V=1)
            VC => !self.overflow_flag(),                    // No overflow (V=0)
            HI => self.carry_flag() && !self.zero_flag(),   // Unsigned higher (C=1 and Z=0)
            LS => !self.carry_flag() || self.zero_flag(),   // Unsigned lower or same (C=0 or Z=1)
            GE => self.sign_flag() == self.overflow_flag(), // Greater or equal (N=V)
            LT => self.sign_flag() != self.overflow_flag(), // Less than (N<>V)
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()), // Greater than (Z=0 and N=V)
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()), // Less or equal (Z=1 or N<>V)
            AL => true, // Always (the "AL" suffix can be omitted)
            // 0b1111 is "never" on ARMv1/v2 only; ARMv4 treats it as always.
            NV => true,
        }
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// N => Bit 31, (0=Not Signed, 1=Signed)
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.0.get_bit(31)
    }

    /// Z => Bit 30, (0=Not Zero, 1=Zero)
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.0.get_bit(30)
    }

    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.0.get_bit(29)
    }

    /// V => Bit 28, (0=No Overflow, 1=Overflow)
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.0.get_bit(28)
    }

    /// I => Bit 7, (0=Enable, 1=Disable)
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// F => Bit 6, (0=Enable, 1=Disable)
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.0.get_bit(6)
    }

    /// T => Bit 5, (0=ARM, 1=THUMB) - Do not change manually!
    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(5)
    }

    /// M4-M0 => Bits 4-0
    ///
    /// NOTE: The BIOS sometimes writes invalid mode values (like 0) to SPSR.
    /// This method returns Supervisor mode as a safe default if the mode bits
    /// are invalid.
    #[must_use]
    pub fn mode(self) -> Mode {
        let mode_bits = self.0 & 0b11111;
        Mode::try_from(mode_bits).unwrap_or_else(|_| {
            tracing::debug!(
                "invalid mode bits 0b{:05b} in PSR={:#010X}, defaulting to Supervisor",
                mode_bits,
                self.0
            );
            Mode::Supervisor
        })
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_carry_flag(op_result.carry);
        self.set_zero_flag(op_result.zero);
        self.set_sign_flag(op_result.sign);
        self.set_overflow_flag(op_result.overflow);
    }

    /// The interrupt bit I disables IRQ interrupts when set.
    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    /// The interrupt bit F disables FIQ interrupts when set.
    pub fn set_fiq_disable(&mut self, value: bool) {
        self.0.set_bit(6, value);
    }

    /// The T bit selects ARM (0) or Thumb (1) state.
    pub fn set_state_bit(&mut self, value: bool) {
        self.0.set_bit(5, value);
    }

    /// The Mode Bits M4-M0 contain the current operating mode.
    pub const fn set_mode(&mut self, m: Mode) {
        // Setting mode bits to 0
        self.0 &= 0b1111_1111_1111_1111_1111_1111_1110_0000;

        // Setting mode bits according to the chosen mode
        self.0 |= m as u32;
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.state_bit().into()
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.set_state_bit(state.into());
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        let mut s = Self(0);

        s.set_mode(m);

        s
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

/// The CPU execution state (ARM or Thumb), controlled by the T bit.
/// Switched via `BX Rn`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CpuState {
    /// Thumb: 16-bit instructions.
    Thumb,
    /// ARM: 32-bit instructions.
    Arm,
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}
