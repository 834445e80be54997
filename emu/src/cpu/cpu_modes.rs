//! The seven ARM7TDMI operating modes.
//!
//! ```text
//! ┌─────────────┬──────────┬───────────────────────────────────────────────┐
//! │    Mode     │  Binary  │                  Purpose                      │
//! ├─────────────┼──────────┼───────────────────────────────────────────────┤
//! │ User        │  10000   │ Normal program execution (unprivileged)       │
//! │ FIQ         │  10001   │ Fast interrupt handling                       │
//! │ IRQ         │  10010   │ General interrupt handling                    │
//! │ Supervisor  │  10011   │ Protected mode for OS (software interrupt)    │
//! │ Abort       │  10111   │ Memory access failures                        │
//! │ Undefined   │  11011   │ Undefined instruction handling                │
//! │ System      │  11111   │ Privileged mode sharing User registers        │
//! └─────────────┴──────────┴───────────────────────────────────────────────┘
//! ```
//!
//! Each exception mode has its own banked registers, swapped in on entry so
//! the handler cannot corrupt the interrupted program's SP/LR. User and
//! System share one register set and have no SPSR.

use serde::{Deserialize, Serialize};

/// The CPU operating mode, stored in bits 0-4 of the CPSR/SPSR.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Mode {
    /// Normal program execution state (unprivileged). Games run here.
    User = 0b10000,

    /// Fast Interrupt Request mode. Banks R8-R14. The GBA has no external
    /// FIQ source, so games rarely enter it.
    Fiq = 0b10001,

    /// Interrupt Request mode. Entered for `VBlank`, `HBlank`, timers, DMA
    /// and keypad interrupts.
    Irq = 0b10010,

    /// Supervisor mode. Entered via Reset or the SWI instruction; the BIOS
    /// call handlers run here.
    Supervisor = 0b10011,

    /// Abort mode, after a data or prefetch abort. On GBA this usually
    /// indicates a bug since there is no virtual memory.
    Abort = 0b10111,

    /// Undefined instruction mode.
    Undefined = 0b11011,

    /// Privileged mode sharing the User register set (no banked SP/LR).
    System = 0b11111,
}

impl Mode {
    /// User and System are the only modes without an SPSR.
    #[must_use]
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(String::from("Unexpected value for Mode")),
        }
    }
}
