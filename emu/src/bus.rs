//! The memory bus: region decode, the I/O dispatch, and the DMA engine.
//!
//! The 32-bit address space decodes on its top byte into nine regions.
//! Subsystem registers in the 1 KiB I/O page dispatch to the live hardware
//! state; everything unclaimed falls through to a raw byte array so partial
//! register files still read back what was written.

use logger::log;

use crate::bitwise::Bits;
use crate::cartridge::Cartridge;
use crate::cpu::hardware::dma::{AddressAdjustment, Dma, DmaTiming};
use crate::cpu::hardware::interrupt_control::InterruptControl;
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::lcd::Lcd;
use crate::cpu::hardware::sound::Sound;
use crate::cpu::hardware::timers::Timers;

const BIOS_SIZE: usize = 0x4000;
const EWRAM_SIZE: usize = 0x4_0000;
const IWRAM_SIZE: usize = 0x8000;
const IO_SIZE: usize = 0x400;
const PALETTE_SIZE: usize = 0x400;
const VRAM_SIZE: usize = 0x1_8000;
const OAM_SIZE: usize = 0x400;

pub struct Bus {
    bios: Vec<u8>,
    ewram: Vec<u8>,
    iwram: Vec<u8>,
    /// Fallthrough backing store for I/O registers without live dispatch,
    /// and the byte-assembly scratch for multi-byte latched registers.
    io_regs: Vec<u8>,

    pub lcd: Lcd,
    pub sound: Sound,
    pub dma: Dma,
    pub timers: Timers,
    pub keypad: Keypad,
    pub interrupt_control: InterruptControl,
    pub cartridge: Box<dyn Cartridge>,

    /// Last value driven on the bus, served for unmapped reads.
    open_bus: u32,
    /// Last successfully fetched BIOS word, served while the CPU executes
    /// outside the BIOS region.
    last_bios_read: u32,
    /// Mirror of R15, refreshed by the CPU at instruction boundaries; the
    /// BIOS read protection keys off it.
    cpu_pc: u32,
    /// Set by a HALTCNT write, consumed by the CPU run loop.
    halt_requested: bool,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(Box::<crate::cartridge::GamePak>::default())
    }
}

impl Bus {
    #[must_use]
    pub fn new(cartridge: Box<dyn Cartridge>) -> Self {
        Self {
            bios: vec![0; BIOS_SIZE],
            ewram: vec![0; EWRAM_SIZE],
            iwram: vec![0; IWRAM_SIZE],
            io_regs: vec![0; IO_SIZE],
            lcd: Lcd::default(),
            sound: Sound::default(),
            dma: Dma::default(),
            timers: Timers::default(),
            keypad: Keypad::default(),
            interrupt_control: InterruptControl::default(),
            cartridge,
            open_bus: 0,
            last_bios_read: 0,
            cpu_pc: 0,
            halt_requested: false,
        }
    }

    /// Fill the BIOS region. Short images load at offset 0; the remainder
    /// stays zero.
    pub fn load_bios(&mut self, data: &[u8]) {
        let len = data.len().min(BIOS_SIZE);
        self.bios[..len].copy_from_slice(&data[..len]);
        if data.len() != BIOS_SIZE {
            tracing::warn!(
                "BIOS image is {} bytes, expected {BIOS_SIZE}",
                data.len()
            );
        }
    }

    /// Used by the HLE stub installer; regular writes to BIOS are dropped.
    pub(crate) fn write_bios_word(&mut self, address: u32, value: u32) {
        let address = (address as usize & !3) % BIOS_SIZE;
        self.bios[address] = value as u8;
        self.bios[address + 1] = (value >> 8) as u8;
        self.bios[address + 2] = (value >> 16) as u8;
        self.bios[address + 3] = (value >> 24) as u8;
    }

    pub fn set_cpu_pc(&mut self, pc: u32) {
        self.cpu_pc = pc;
    }

    /// Consume the halt request raised by a HALTCNT write.
    pub fn take_halt_request(&mut self) -> bool {
        std::mem::take(&mut self.halt_requested)
    }

    #[must_use]
    pub fn interrupts_pending(&self) -> bool {
        self.interrupt_control.pending()
    }

    /// VRAM mirrors its 96 KiB into a 128 KiB window: the upper 32 KiB
    /// fold back onto the last bank.
    fn vram_offset(address: u32) -> usize {
        let mut offset = (address & 0x1_FFFF) as usize;
        if offset >= VRAM_SIZE {
            offset -= 0x8000;
        }
        offset
    }

    pub fn read_byte(&mut self, address: u32) -> u8 {
        match address >> 24 {
            0x00 => {
                if (address as usize) < BIOS_SIZE {
                    // The BIOS ROM is only readable while the CPU executes
                    // inside it; otherwise the last fetched word leaks out.
                    if self.cpu_pc as usize >= BIOS_SIZE + 8 {
                        (self.last_bios_read >> ((address & 3) * 8)) as u8
                    } else {
                        let aligned = (address as usize) & !3;
                        self.last_bios_read = u32::from_le_bytes([
                            self.bios[aligned],
                            self.bios[aligned + 1],
                            self.bios[aligned + 2],
                            self.bios[aligned + 3],
                        ]);
                        self.bios[address as usize]
                    }
                } else {
                    self.open_bus_byte(address)
                }
            }
            0x02 => self.ewram[(address as usize) & (EWRAM_SIZE - 1)],
            0x03 => self.iwram[(address as usize) & (IWRAM_SIZE - 1)],
            0x04 => {
                if (address & 0x00FF_FFFF) < IO_SIZE as u32 {
                    self.read_io(address & 0x3FF)
                } else {
                    self.open_bus_byte(address)
                }
            }
            0x05 => self.lcd.palette_ram[(address as usize) & (PALETTE_SIZE - 1)],
            0x06 => self.lcd.video_ram[Self::vram_offset(address)],
            0x07 => self.lcd.obj_attributes[(address as usize) & (OAM_SIZE - 1)],
            0x08..=0x0F => self.cartridge.read8(address),
            _ => self.open_bus_byte(address),
        }
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x02 => self.ewram[(address as usize) & (EWRAM_SIZE - 1)] = value,
            0x03 => self.iwram[(address as usize) & (IWRAM_SIZE - 1)] = value,
            0x04 => {
                if (address & 0x00FF_FFFF) < IO_SIZE as u32 {
                    self.write_io(address & 0x3FF, value);
                }
            }
            0x05 => {
                // 8-bit palette writes duplicate the byte into both halves
                // of the aligned halfword.
                let offset = (address as usize) & (PALETTE_SIZE - 1) & !1;
                self.lcd.palette_ram[offset] = value;
                self.lcd.palette_ram[offset + 1] = value;
            }
            0x06 => {
                // Same duplication rule for VRAM.
                let offset = Self::vram_offset(address) & !1;
                self.lcd.video_ram[offset] = value;
                self.lcd.video_ram[offset + 1] = value;
            }
            0x07 => {
                // 8-bit OAM writes are ignored.
            }
            0x08..=0x0F => self.cartridge.write8(address, value),
            _ => {
                log(format!("dropped write to unmapped {address:#010X}"));
            }
        }
    }

    /// Halfword reads are force-aligned. Callers needing the misaligned
    /// rotate-by-8 semantics apply it on top of the aligned value.
    pub fn read_half_word(&mut self, address: u32) -> u16 {
        let address = address & !1;
        u16::from(self.read_byte(address)) | (u16::from(self.read_byte(address + 1)) << 8)
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) {
        let address = address & !1;

        // Palette/VRAM/OAM take direct halfword paths: the 8-bit write
        // rules (duplicate or ignore) would corrupt a decomposed store.
        match address >> 24 {
            0x05 => {
                let offset = (address as usize) & (PALETTE_SIZE - 1);
                self.lcd.palette_ram[offset] = value as u8;
                self.lcd.palette_ram[offset + 1] = (value >> 8) as u8;
            }
            0x06 => {
                let offset = Self::vram_offset(address);
                self.lcd.video_ram[offset] = value as u8;
                self.lcd.video_ram[offset + 1] = (value >> 8) as u8;
            }
            0x07 => {
                let offset = (address as usize) & (OAM_SIZE - 1);
                self.lcd.obj_attributes[offset] = value as u8;
                self.lcd.obj_attributes[offset + 1] = (value >> 8) as u8;
            }
            _ => {
                self.write_byte(address, value as u8);
                self.write_byte(address + 1, (value >> 8) as u8);
            }
        }
    }

    /// Word reads are force-aligned; the CPU applies the rotate-right for
    /// misaligned loads.
    pub fn read_word(&mut self, address: u32) -> u32 {
        let address = address & !3;
        let value = u32::from(self.read_byte(address))
            | (u32::from(self.read_byte(address + 1)) << 8)
            | (u32::from(self.read_byte(address + 2)) << 16)
            | (u32::from(self.read_byte(address + 3)) << 24);

        self.open_bus = value;
        value
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        let address = address & !3;

        match address >> 24 {
            0x05 | 0x06 | 0x07 => {
                self.write_half_word(address, value as u16);
                self.write_half_word(address + 2, (value >> 16) as u16);
            }
            _ => {
                self.write_byte(address, value as u8);
                self.write_byte(address + 1, (value >> 8) as u8);
                self.write_byte(address + 2, (value >> 16) as u8);
                self.write_byte(address + 3, (value >> 24) as u8);
            }
        }
    }

    fn open_bus_byte(&self, address: u32) -> u8 {
        (self.open_bus >> ((address & 3) * 8)) as u8
    }

    // ----- I/O dispatch ---------------------------------------------------

    fn read_io(&mut self, offset: u32) -> u8 {
        match offset {
            0x000..=0x05F => self.read_lcd_io(offset),
            0x060..=0x0AF => self.read_sound_io(offset),
            0x0B0..=0x0FF => self.read_dma_io(offset),
            0x100..=0x10F => self.read_timers_io(offset),
            0x130..=0x133 => self.read_keypad_io(offset),
            0x200..=0x3FF => self.read_system_io(offset),
            _ => self.io_regs[offset as usize],
        }
    }

    fn write_io(&mut self, offset: u32, value: u8) {
        match offset {
            0x000..=0x05F => self.write_lcd_io(offset, value),
            0x060..=0x0AF => self.write_sound_io(offset, value),
            0x0B0..=0x0FF => self.write_dma_io(offset, value),
            0x100..=0x10F => self.write_timers_io(offset, value),
            0x130..=0x133 => self.write_keypad_io(offset, value),
            0x200..=0x3FF => self.write_system_io(offset, value),
            _ => self.io_regs[offset as usize] = value,
        }
    }

    fn read_lcd_io(&self, offset: u32) -> u8 {
        match offset {
            0x00 => self.lcd.dispcnt.get_byte(0),
            0x01 => self.lcd.dispcnt.get_byte(1),
            0x02 => self.lcd.green_swap.get_byte(0),
            0x03 => self.lcd.green_swap.get_byte(1),
            0x04 => self.lcd.dispstat.get_byte(0),
            0x05 => self.lcd.dispstat.get_byte(1),
            0x06 => self.lcd.vcount.get_byte(0),
            0x07 => self.lcd.vcount.get_byte(1),
            0x08..=0x0F => {
                let bg = ((offset - 0x08) / 2) as usize;
                self.lcd.bg_cnt[bg].get_byte((offset & 1) as u8)
            }
            0x48 => self.lcd.winin.get_byte(0),
            0x49 => self.lcd.winin.get_byte(1),
            0x4A => self.lcd.winout.get_byte(0),
            0x4B => self.lcd.winout.get_byte(1),
            0x50 => self.lcd.bldcnt.get_byte(0),
            0x51 => self.lcd.bldcnt.get_byte(1),
            0x52 => self.lcd.bldalpha.get_byte(0),
            0x53 => self.lcd.bldalpha.get_byte(1),
            // Scroll, affine, window bounds, mosaic and BLDY are
            // write-only; reads fall through to the backing array.
            _ => self.io_regs[offset as usize],
        }
    }

    #[allow(clippy::too_many_lines)]
    fn write_lcd_io(&mut self, offset: u32, value: u8) {
        self.io_regs[offset as usize] = value;

        match offset {
            0x00 => self.lcd.dispcnt.set_byte(0, value),
            0x01 => self.lcd.dispcnt.set_byte(1, value),
            0x02 => self.lcd.green_swap.set_byte(0, value),
            0x03 => self.lcd.green_swap.set_byte(1, value),
            0x04 => self.lcd.write_dispstat_low(value),
            0x05 => self.lcd.write_dispstat_high(value),
            // VCOUNT is read-only; writes are silently dropped.
            0x06 | 0x07 => {}
            0x08..=0x0F => {
                let bg = ((offset - 0x08) / 2) as usize;
                self.lcd.bg_cnt[bg].set_byte((offset & 1) as u8, value);
            }
            0x10..=0x1F => {
                // Scroll registers: 4 BGs x (HOFS, VOFS), 2 bytes each.
                let rel = offset - 0x10;
                let bg = (rel / 4) as usize;
                let register = if rel.get_bit(1) {
                    &mut self.lcd.bg_vofs[bg]
                } else {
                    &mut self.lcd.bg_hofs[bg]
                };
                register.set_byte((offset & 1) as u8, value);
            }
            0x20..=0x3F => {
                // Affine parameter and reference blocks for BG2 (0x20) and
                // BG3 (0x30).
                let index = ((offset - 0x20) / 0x10) as usize;
                let base = 0x20 + index as u32 * 0x10;

                match offset - base {
                    0x0 | 0x1 => self.lcd.bg_pa[index] = self.read_io_halfword(base) as i16,
                    0x2 | 0x3 => self.lcd.bg_pb[index] = self.read_io_halfword(base + 2) as i16,
                    0x4 | 0x5 => self.lcd.bg_pc[index] = self.read_io_halfword(base + 4) as i16,
                    0x6 | 0x7 => self.lcd.bg_pd[index] = self.read_io_halfword(base + 6) as i16,
                    0x8..=0xB => {
                        let raw = self.read_io_word(base + 8) as i32;
                        self.lcd.write_affine_reference_x(index, raw);
                    }
                    _ => {
                        let raw = self.read_io_word(base + 0xC) as i32;
                        self.lcd.write_affine_reference_y(index, raw);
                    }
                }
            }
            0x40 => self.lcd.win0h.set_byte(0, value),
            0x41 => self.lcd.win0h.set_byte(1, value),
            0x42 => self.lcd.win1h.set_byte(0, value),
            0x43 => self.lcd.win1h.set_byte(1, value),
            0x44 => self.lcd.win0v.set_byte(0, value),
            0x45 => self.lcd.win0v.set_byte(1, value),
            0x46 => self.lcd.win1v.set_byte(0, value),
            0x47 => self.lcd.win1v.set_byte(1, value),
            0x48 => self.lcd.winin.set_byte(0, value),
            0x49 => self.lcd.winin.set_byte(1, value),
            0x4A => self.lcd.winout.set_byte(0, value),
            0x4B => self.lcd.winout.set_byte(1, value),
            0x4C => self.lcd.mosaic.set_byte(0, value),
            0x4D => self.lcd.mosaic.set_byte(1, value),
            0x50 => self.lcd.bldcnt.set_byte(0, value),
            0x51 => self.lcd.bldcnt.set_byte(1, value),
            0x52 => self.lcd.bldalpha.set_byte(0, value),
            0x53 => self.lcd.bldalpha.set_byte(1, value),
            0x54 => self.lcd.bldy.set_byte(0, value),
            0x55 => self.lcd.bldy.set_byte(1, value),
            _ => {}
        }
    }

    /// Reassemble a halfword from the I/O backing array.
    fn read_io_halfword(&self, offset: u32) -> u16 {
        let offset = offset as usize;
        u16::from(self.io_regs[offset]) | (u16::from(self.io_regs[offset + 1]) << 8)
    }

    /// Reassemble a word from the I/O backing array.
    fn read_io_word(&self, offset: u32) -> u32 {
        let offset = offset as usize;
        u32::from(self.io_regs[offset])
            | (u32::from(self.io_regs[offset + 1]) << 8)
            | (u32::from(self.io_regs[offset + 2]) << 16)
            | (u32::from(self.io_regs[offset + 3]) << 24)
    }

    fn read_sound_io(&self, offset: u32) -> u8 {
        let byte = (offset & 1) as u8;
        match offset {
            0x60 | 0x61 => self.sound.channel1_sweep.get_byte(byte),
            0x62 | 0x63 => self.sound.channel1_duty_length_envelope.get_byte(byte),
            0x64 | 0x65 => self.sound.channel1_frequency_control.get_byte(byte),
            0x68 | 0x69 => self.sound.channel2_duty_length_envelope.get_byte(byte),
            0x6C | 0x6D => self.sound.channel2_frequency_control.get_byte(byte),
            0x70 | 0x71 => self.sound.channel3_stop_wave_ram_select.get_byte(byte),
            0x72 | 0x73 => self.sound.channel3_length_volume.get_byte(byte),
            0x74 | 0x75 => self.sound.channel3_frequency_control.get_byte(byte),
            0x78 | 0x79 => self.sound.channel4_length_envelope.get_byte(byte),
            0x7C | 0x7D => self.sound.channel4_frequency_control.get_byte(byte),
            0x80 | 0x81 => self.sound.control_stereo_volume_enable.get_byte(byte),
            0x82 | 0x83 => self.sound.control_mixing_dma_control.get_byte(byte),
            0x84 | 0x85 => self.sound.control_sound_on_off.get_byte(byte),
            0x88 | 0x89 => self.sound.sound_pwm_control.get_byte(byte),
            0x90..=0x9F => self.sound.channel3_wave_pattern_ram[(offset - 0x90) as usize],
            _ => self.io_regs[offset as usize],
        }
    }

    fn write_sound_io(&mut self, offset: u32, value: u8) {
        self.io_regs[offset as usize] = value;
        let byte = (offset & 1) as u8;

        match offset {
            0x60 | 0x61 => self.sound.channel1_sweep.set_byte(byte, value),
            0x62 | 0x63 => self.sound.channel1_duty_length_envelope.set_byte(byte, value),
            0x64 | 0x65 => {
                self.sound.channel1_frequency_control.set_byte(byte, value);
                // The initial bit in the high byte restarts the channel.
                if byte == 1 && value & 0x80 != 0 {
                    self.sound.trigger_channel(1);
                }
            }
            0x68 | 0x69 => self.sound.channel2_duty_length_envelope.set_byte(byte, value),
            0x6C | 0x6D => {
                self.sound.channel2_frequency_control.set_byte(byte, value);
                if byte == 1 && value & 0x80 != 0 {
                    self.sound.trigger_channel(2);
                }
            }
            0x70 | 0x71 => self.sound.channel3_stop_wave_ram_select.set_byte(byte, value),
            0x72 | 0x73 => self.sound.channel3_length_volume.set_byte(byte, value),
            0x74 | 0x75 => {
                self.sound.channel3_frequency_control.set_byte(byte, value);
                if byte == 1 && value & 0x80 != 0 {
                    self.sound.trigger_channel(3);
                }
            }
            0x78 | 0x79 => self.sound.channel4_length_envelope.set_byte(byte, value),
            0x7C | 0x7D => {
                self.sound.channel4_frequency_control.set_byte(byte, value);
                if byte == 1 && value & 0x80 != 0 {
                    self.sound.trigger_channel(4);
                }
            }
            0x80 | 0x81 => self.sound.control_stereo_volume_enable.set_byte(byte, value),
            0x82 | 0x83 => self.sound.control_mixing_dma_control.set_byte(byte, value),
            0x84 | 0x85 => self.sound.control_sound_on_off.set_byte(byte, value),
            0x88 | 0x89 => self.sound.sound_pwm_control.set_byte(byte, value),
            0x90..=0x9F => {
                self.sound.channel3_wave_pattern_ram[(offset - 0x90) as usize] = value;
            }
            0xA0..=0xA3 => self.sound.fifo_write_byte(0, value),
            0xA4..=0xA7 => self.sound.fifo_write_byte(1, value),
            _ => {}
        }
    }

    /// DMA register blocks are 12 bytes each from 0xB0: SAD, DAD, CNT_L,
    /// CNT_H.
    const fn dma_channel_for_offset(offset: u32) -> (usize, u32) {
        let rel = offset - 0xB0;
        ((rel / 12) as usize, rel % 12)
    }

    fn read_dma_io(&self, offset: u32) -> u8 {
        if offset >= 0xE0 {
            return self.io_regs[offset as usize];
        }

        let (channel, rel) = Self::dma_channel_for_offset(offset);
        match rel {
            // SAD, DAD and the count are write-only.
            10 => self.dma.channels[channel].control.get_byte(0),
            11 => self.dma.channels[channel].control.get_byte(1),
            _ => self.io_regs[offset as usize],
        }
    }

    fn write_dma_io(&mut self, offset: u32, value: u8) {
        self.io_regs[offset as usize] = value;

        if offset >= 0xE0 {
            return;
        }

        let (channel, rel) = Self::dma_channel_for_offset(offset);
        if rel != 11 {
            return;
        }

        // The CNT_H high byte completes the control word: latch the source,
        // destination and count out of the backing array, then let the
        // controller see the rising edge.
        let base = 0xB0 + channel as u32 * 12;
        self.dma.channels[channel].source_latch = self.read_io_word(base);
        self.dma.channels[channel].destination_latch = self.read_io_word(base + 4);
        self.dma.channels[channel].word_count = self.read_io_halfword(base + 8);

        let control = self.read_io_halfword(base + 10);
        self.dma.write_control(channel, control);
    }

    fn read_timers_io(&self, offset: u32) -> u8 {
        let timer = ((offset - 0x100) / 4) as usize;
        let byte = (offset & 1) as u8;

        if offset & 2 == 0 {
            // TMxCNT_L reads the live counter.
            self.timers.read_counter(timer).get_byte(byte)
        } else {
            self.timers.read_control(timer).get_byte(byte)
        }
    }

    fn write_timers_io(&mut self, offset: u32, value: u8) {
        self.io_regs[offset as usize] = value;

        // Act when the high byte completes the 16-bit value.
        if offset & 1 == 0 {
            return;
        }

        let timer = ((offset - 0x100) / 4) as usize;
        let word = self.read_io_halfword(offset & !1);

        if offset & 2 == 0 {
            self.timers.write_reload(timer, word);
        } else {
            self.timers.write_control(timer, word);
        }
    }

    fn read_keypad_io(&self, offset: u32) -> u8 {
        match offset {
            0x130 => self.keypad.key_input.get_byte(0),
            0x131 => self.keypad.key_input.get_byte(1),
            0x132 => self.keypad.key_interrupt_control.get_byte(0),
            _ => self.keypad.key_interrupt_control.get_byte(1),
        }
    }

    fn write_keypad_io(&mut self, offset: u32, value: u8) {
        match offset {
            // KEYINPUT is read-only.
            0x130 | 0x131 => {}
            0x132 => self.keypad.key_interrupt_control.set_byte(0, value),
            _ => self.keypad.key_interrupt_control.set_byte(1, value),
        }
    }

    fn read_system_io(&self, offset: u32) -> u8 {
        match offset {
            0x200 => self.interrupt_control.interrupt_enable.get_byte(0),
            0x201 => self.interrupt_control.interrupt_enable.get_byte(1),
            0x202 => self.interrupt_control.interrupt_request.get_byte(0),
            0x203 => self.interrupt_control.interrupt_request.get_byte(1),
            0x208 => u8::from(self.interrupt_control.interrupt_master_enable),
            0x209 => 0,
            _ => self.io_regs[offset as usize],
        }
    }

    fn write_system_io(&mut self, offset: u32, value: u8) {
        match offset {
            0x200 => self
                .interrupt_control
                .interrupt_enable
                .set_byte(0, value),
            0x201 => self
                .interrupt_control
                .interrupt_enable
                .set_byte(1, value),
            // IF: writing 1 bits acknowledges those interrupts.
            0x202 => self.interrupt_control.acknowledge(value.into()),
            0x203 => self
                .interrupt_control
                .acknowledge(u16::from(value) << 8),
            0x208 => {
                self.io_regs[offset as usize] = value & 1;
                self.interrupt_control.interrupt_master_enable = value & 1 != 0;
            }
            0x209 => {}
            0x301 => {
                // HALTCNT: the CPU sleeps until the next enabled interrupt.
                self.io_regs[offset as usize] = value;
                self.halt_requested = true;
            }
            // WAITCNT (0x204) is carried as a stub; POSTFLG and the rest
            // fall through.
            _ => self.io_regs[offset as usize] = value,
        }
    }

    // ----- DMA engine -----------------------------------------------------

    /// Run every armed DMA channel to completion. Returns the cycles to
    /// charge against the CPU budget.
    pub fn service_pending_dma(&mut self) -> u32 {
        let mut cycles = 0;

        while self.dma.has_pending() {
            let pending = self.dma.take_pending();
            for channel in 0..4 {
                if pending & (1 << channel) != 0 {
                    cycles += self.run_dma_channel(channel);
                }
            }
        }

        cycles
    }

    #[allow(clippy::too_many_lines)]
    fn run_dma_channel(&mut self, index: usize) -> u32 {
        let mut channel = self.dma.channels[index];

        let fifo_mode = channel.timing == DmaTiming::Special && (index == 1 || index == 2);

        if channel.timing == DmaTiming::Special && index == 3 {
            // Video capture is not implemented.
            tracing::warn!("DMA3 video capture transfer requested, skipping");
            return 0;
        }

        // DMA0 sources are 27-bit, DMA1-3 28-bit; DMA0-2 destinations are
        // 27-bit, DMA3 28-bit.
        let source_mask = if index == 0 { 0x07FF_FFFF } else { 0x0FFF_FFFF };
        let destination_mask = if index == 3 { 0x0FFF_FFFF } else { 0x07FF_FFFF };
        channel.source &= source_mask;
        channel.destination &= destination_mask;

        // FIFO transfers are forced to 4 x 32-bit with a fixed destination.
        let transfer_32 = channel.transfer_32 || fifo_mode;
        let units: u32 = if fifo_mode {
            4
        } else if channel.word_count == 0 {
            // A zero count means the full range.
            if index == 3 { 0x1_0000 } else { 0x4000 }
        } else {
            channel.word_count.into()
        };

        let step = if transfer_32 { 4 } else { 2 };

        log(format!(
            "DMA{index}: {units} x {}bit {:#010X} -> {:#010X}",
            if transfer_32 { 32 } else { 16 },
            channel.source,
            channel.destination
        ));

        for _ in 0..units {
            if transfer_32 {
                let value = self.read_word(channel.source & !3);
                self.write_word(channel.destination & !3, value);
            } else {
                let value = self.read_half_word(channel.source & !1);
                self.write_half_word(channel.destination & !1, value);
            }

            match channel.source_adjust {
                AddressAdjustment::Increment | AddressAdjustment::IncrementReload => {
                    channel.source = channel.source.wrapping_add(step);
                }
                AddressAdjustment::Decrement => {
                    channel.source = channel.source.wrapping_sub(step);
                }
                AddressAdjustment::Fixed => {}
            }

            if !fifo_mode {
                match channel.destination_adjust {
                    AddressAdjustment::Increment | AddressAdjustment::IncrementReload => {
                        channel.destination = channel.destination.wrapping_add(step);
                    }
                    AddressAdjustment::Decrement => {
                        channel.destination = channel.destination.wrapping_sub(step);
                    }
                    AddressAdjustment::Fixed => {}
                }
            }
        }

        if channel.destination_adjust == AddressAdjustment::IncrementReload {
            channel.destination = channel.destination_latch;
        }

        if channel.irq_on_done {
            self.interrupt_control.request(1 << (8 + index));
        }

        if !channel.repeat {
            // The enable bit clears and must read back clear.
            channel.enabled = false;
            channel.control.set_bit(15, false);
        }

        self.dma.channels[index] = channel;

        // Rough S/N cost: two cycles per unit plus setup.
        units * 2 + 2
    }

    /// Advance the timers and the audio core by a batch of CPU cycles,
    /// wiring timer overflows into FIFO clocking and FIFO low-water into
    /// refill DMA.
    pub fn tick_peripherals(&mut self, cycles: u32) {
        let output = self.timers.tick(cycles);

        if output.irq_bits != 0 {
            self.interrupt_control.request(output.irq_bits);
        }

        for timer in 0..4 {
            for _ in 0..output.overflows[timer] {
                let refill = self.sound.on_timer_overflow(timer);
                if refill[0] {
                    self.dma.on_fifo(0);
                }
                if refill[1] {
                    self.dma.on_fifo(1);
                }
            }
        }

        self.sound.tick(cycles);
    }
}
