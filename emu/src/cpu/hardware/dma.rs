use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Source/destination address stepping after each transferred unit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressAdjustment {
    #[default]
    Increment = 0,
    Decrement = 1,
    Fixed = 2,
    /// Destination only: increment during the transfer, reload from the
    /// latch when it completes.
    IncrementReload = 3,
}

impl From<u16> for AddressAdjustment {
    fn from(value: u16) -> Self {
        match value & 3 {
            0 => Self::Increment,
            1 => Self::Decrement,
            2 => Self::Fixed,
            3 => Self::IncrementReload,
            _ => unreachable!(),
        }
    }
}

/// When a channel fires.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmaTiming {
    #[default]
    Immediate = 0,
    VBlank = 1,
    HBlank = 2,
    /// Channels 1/2: audio FIFO refill. Channel 3: video capture.
    Special = 3,
}

impl From<u16> for DmaTiming {
    fn from(value: u16) -> Self {
        match value & 3 {
            0 => Self::Immediate,
            1 => Self::VBlank,
            2 => Self::HBlank,
            3 => Self::Special,
            _ => unreachable!(),
        }
    }
}

/// One DMA channel: the MMIO-written latches, the live transfer addresses,
/// and the decoded control fields.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct DmaChannel {
    pub source: u32,
    pub destination: u32,
    pub source_latch: u32,
    pub destination_latch: u32,
    pub word_count: u16,
    /// The raw CNT_H word, kept for MMIO reads.
    pub control: u16,

    pub destination_adjust: AddressAdjustment,
    pub source_adjust: AddressAdjustment,
    pub repeat: bool,
    pub transfer_32: bool,
    pub timing: DmaTiming,
    pub irq_on_done: bool,
    pub enabled: bool,
}

#[derive(Default, Serialize, Deserialize)]
pub struct Dma {
    pub channels: [DmaChannel; 4],
    /// Channels armed and waiting for the next CPU-run boundary.
    pending: u8,
}

impl Dma {
    /// Decode a CNT_H write. On a rising edge of the enable bit the live
    /// addresses latch; an immediate-timing channel is armed right away.
    pub fn write_control(&mut self, channel: usize, value: u16) {
        let ch = &mut self.channels[channel];
        let was_enabled = ch.enabled;

        ch.control = value;
        ch.destination_adjust = (value.get_bits(5..=6) as u16).into();
        ch.source_adjust = (value.get_bits(7..=8) as u16).into();
        ch.repeat = value.get_bit(9);
        ch.transfer_32 = value.get_bit(10);
        ch.timing = (value.get_bits(12..=13) as u16).into();
        ch.irq_on_done = value.get_bit(14);
        ch.enabled = value.get_bit(15);

        if !was_enabled && ch.enabled {
            ch.source = ch.source_latch;
            ch.destination = ch.destination_latch;

            if ch.timing == DmaTiming::Immediate {
                self.pending |= 1 << channel;
            }
        }
    }

    /// Arm every enabled VBlank-timed channel.
    pub fn on_vblank(&mut self) {
        for i in 0..4 {
            if self.channels[i].enabled && self.channels[i].timing == DmaTiming::VBlank {
                self.pending |= 1 << i;
            }
        }
    }

    /// Arm every enabled HBlank-timed channel. Only called during visible
    /// scanlines.
    pub fn on_hblank(&mut self) {
        for i in 0..4 {
            if self.channels[i].enabled && self.channels[i].timing == DmaTiming::HBlank {
                self.pending |= 1 << i;
            }
        }
    }

    /// Arm the FIFO refill channel for the given FIFO (A = DMA1, B = DMA2).
    pub fn on_fifo(&mut self, fifo: usize) {
        let channel = fifo + 1;
        if self.channels[channel].enabled && self.channels[channel].timing == DmaTiming::Special {
            self.pending |= 1 << channel;
        }
    }

    /// Take the set of armed channels, clearing it.
    pub fn take_pending(&mut self) -> u8 {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_edge_latches_addresses_and_arms_immediate() {
        let mut dma = Dma::default();
        dma.channels[0].source_latch = 0x0800_0000;
        dma.channels[0].destination_latch = 0x0300_0000;

        dma.write_control(0, 0x8000);

        assert_eq!(dma.channels[0].source, 0x0800_0000);
        assert_eq!(dma.channels[0].destination, 0x0300_0000);
        assert_eq!(dma.take_pending(), 1);
    }

    #[test]
    fn no_latch_without_rising_edge() {
        let mut dma = Dma::default();
        dma.write_control(0, 0x8000);
        dma.take_pending();

        dma.channels[0].source_latch = 0x0900_0000;
        // Still enabled: no edge, no latch, no arm.
        dma.write_control(0, 0x8000);

        assert_eq!(dma.channels[0].source, 0);
        assert_eq!(dma.take_pending(), 0);
    }

    #[test]
    fn vblank_trigger_arms_only_matching_channels() {
        let mut dma = Dma::default();
        // Channel 1 VBlank-timed, channel 2 HBlank-timed.
        dma.write_control(1, 0x9000);
        dma.write_control(2, 0xA000);

        dma.on_vblank();
        assert_eq!(dma.take_pending(), 1 << 1);

        dma.on_hblank();
        assert_eq!(dma.take_pending(), 1 << 2);
    }

    #[test]
    fn fifo_trigger_maps_to_channels_1_and_2() {
        let mut dma = Dma::default();
        dma.write_control(1, 0xB000);
        dma.write_control(2, 0xB000);

        dma.on_fifo(0);
        assert_eq!(dma.take_pending(), 1 << 1);

        dma.on_fifo(1);
        assert_eq!(dma.take_pending(), 1 << 2);
    }

    #[test]
    fn control_fields_decode() {
        let mut dma = Dma::default();
        // dest dec, src fixed, repeat, 32-bit, special timing, irq.
        dma.write_control(3, 0b1111_0111_0010_0000);

        let ch = &dma.channels[3];
        assert_eq!(ch.destination_adjust, AddressAdjustment::Decrement);
        assert_eq!(ch.source_adjust, AddressAdjustment::Fixed);
        assert!(ch.repeat);
        assert!(ch.transfer_32);
        assert_eq!(ch.timing, DmaTiming::Special);
        assert!(ch.irq_on_done);
        assert!(ch.enabled);
    }
}
