use serde::{Deserialize, Serialize};

/// Interrupt source bits shared by IE and IF.
pub mod irq_bits {
    pub const VBLANK: u16 = 1 << 0;
    pub const HBLANK: u16 = 1 << 1;
    pub const VCOUNT: u16 = 1 << 2;
    pub const TIMER0: u16 = 1 << 3;
    pub const TIMER1: u16 = 1 << 4;
    pub const TIMER2: u16 = 1 << 5;
    pub const TIMER3: u16 = 1 << 6;
    pub const SERIAL: u16 = 1 << 7;
    pub const DMA0: u16 = 1 << 8;
    pub const DMA1: u16 = 1 << 9;
    pub const DMA2: u16 = 1 << 10;
    pub const DMA3: u16 = 1 << 11;
    pub const KEYPAD: u16 = 1 << 12;
    pub const GAMEPAK: u16 = 1 << 13;
}

/// IME, IE and IF.
///
/// IF is write-1-to-clear through MMIO; subsystems raise bits via
/// [`InterruptControl::request`].
#[derive(Default, Serialize, Deserialize)]
pub struct InterruptControl {
    /// Master enable. Only bit 0 is significant.
    pub interrupt_master_enable: bool,
    /// IE, 14 significant bits.
    pub interrupt_enable: u16,
    /// IF, the pending flags.
    pub interrupt_request: u16,
}

impl InterruptControl {
    /// Raise pending flags.
    pub fn request(&mut self, bits: u16) {
        self.interrupt_request |= bits;
    }

    /// Acknowledge: a 1 written to a flag clears it.
    pub fn acknowledge(&mut self, bits: u16) {
        self.interrupt_request &= !bits;
    }

    /// An IRQ is pending iff `IME && (IE & IF) != 0`. The CPU adds the
    /// `CPSR.I == 0` term at instruction boundaries.
    #[must_use]
    pub const fn pending(&self) -> bool {
        self.interrupt_master_enable && (self.interrupt_enable & self.interrupt_request) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_one_to_clear() {
        let mut ic = InterruptControl::default();
        ic.request(irq_bits::VBLANK | irq_bits::TIMER0);

        ic.acknowledge(irq_bits::VBLANK);
        assert_eq!(ic.interrupt_request, irq_bits::TIMER0);

        // Acknowledging a clear bit is a no-op.
        ic.acknowledge(irq_bits::DMA3);
        assert_eq!(ic.interrupt_request, irq_bits::TIMER0);
    }

    #[test]
    fn pending_requires_all_three_terms() {
        let mut ic = InterruptControl::default();
        assert!(!ic.pending());

        ic.request(irq_bits::HBLANK);
        assert!(!ic.pending());

        ic.interrupt_enable = irq_bits::HBLANK;
        assert!(!ic.pending());

        ic.interrupt_master_enable = true;
        assert!(ic.pending());
    }
}
