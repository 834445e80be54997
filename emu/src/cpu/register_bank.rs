//! Banked register storage for the exception modes.
//!
//! When the CPU switches modes, some registers are physically swapped for
//! private copies. FIQ banks R8-R14, the other exception modes bank only
//! R13/R14, and every exception mode has an SPSR slot that captures the
//! CPSR on entry. The bank holds only the *inactive* modes' registers: the
//! active mode's SP/LR always live in R13/R14 of the register file.
//!
//! The `*_old` slots park the User/System registers while a privileged mode
//! (and for R8-R12, specifically FIQ) is active.

use serde::{Deserialize, Serialize};

use crate::cpu::psr::Psr;

/// Storage for banked registers across all CPU modes.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterBank {
    // User/System registers saved here while another mode is active.
    pub r8_old: u32,
    pub r9_old: u32,
    pub r10_old: u32,
    pub r11_old: u32,
    pub r12_old: u32,
    pub r13_old: u32,
    pub r14_old: u32,

    // FIQ mode banked registers.
    pub r8_fiq: u32,
    pub r9_fiq: u32,
    pub r10_fiq: u32,
    pub r11_fiq: u32,
    pub r12_fiq: u32,
    pub r13_fiq: u32,
    pub r14_fiq: u32,

    // Supervisor mode banked registers.
    pub r13_svc: u32,
    pub r14_svc: u32,

    // Abort mode banked registers.
    pub r13_abt: u32,
    pub r14_abt: u32,

    // IRQ mode banked registers.
    pub r13_irq: u32,
    pub r14_irq: u32,

    // Undefined mode banked registers.
    pub r13_und: u32,
    pub r14_und: u32,

    // Saved Program Status Registers (one per exception mode).
    pub spsr_fiq: Psr,
    pub spsr_svc: Psr,
    pub spsr_abt: Psr,
    pub spsr_irq: Psr,
    pub spsr_und: Psr,
}
