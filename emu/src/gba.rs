//! The top-level GBA system: one CPU, one bus, and the frame scheduler
//! that interleaves them.
//!
//! A frame is 228 scanlines of 1232 cycles each. Per scanline the scheduler
//! runs the CPU (with the timers and the audio core in lockstep) for the
//! 960-cycle HDraw period, renders at the HBlank boundary, runs the
//! 272-cycle HBlank period, then advances VCOUNT and raises the VBlank
//! bookkeeping at line 160.

use logger::log;

use crate::bus::Bus;
use crate::cartridge::{GamePak, SaveType};
use crate::cartridge_header::CartridgeHeader;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::hardware::interrupt_control::irq_bits;
use crate::cpu::hardware::keypad::GbaButton;
use crate::cpu::hardware::lcd::{Color, TOTAL_LINES, VDRAW_LINES};
use crate::cpu::hardware::sound::StereoSample;
use crate::ring_buffer::RingBuffer;

/// Cycles of the visible part of a scanline.
pub const HDRAW_CYCLES: u32 = 960;

/// Cycles of the horizontal blanking interval.
pub const HBLANK_CYCLES: u32 = 272;

/// Total cycles per scanline.
pub const SCANLINE_CYCLES: u64 = (HDRAW_CYCLES + HBLANK_CYCLES) as u64;

pub struct Gba {
    pub cpu: Arm7tdmi,
    pub bus: Bus,
    pub cartridge_header: CartridgeHeader,

    save_type: SaveType,
    frame_complete: bool,
    total_cycles: u64,
}

impl Gba {
    /// Build a system around a ROM image. Passing a BIOS image boots
    /// through it from the reset vector; without one the BIOS is skipped
    /// and the HLE stubs are installed (the missing-BIOS fallback).
    pub fn new(bios: Option<Vec<u8>>, rom: Vec<u8>) -> Result<Self, String> {
        let cartridge_header = CartridgeHeader::new(&rom)?;
        log(format!(
            "loaded \"{}\" [{}] ({} KiB)",
            cartridge_header.game_title,
            cartridge_header.game_code,
            rom.len() / 1024
        ));

        let game_pak = GamePak::new(rom)?;
        let save_type = game_pak.save_type();

        let mut bus = Bus::new(Box::new(game_pak));

        let cpu = match bios {
            Some(image) => {
                bus.load_bios(&image);
                Arm7tdmi::with_bios()
            }
            None => {
                // Missing BIOS: fall back to the skip-BIOS + HLE path.
                let mut cpu = Arm7tdmi::default();
                cpu.skip_bios(&mut bus);
                cpu
            }
        };

        Ok(Self {
            cpu,
            bus,
            cartridge_header,
            save_type,
            frame_complete: false,
            total_cycles: 0,
        })
    }

    /// Jump straight past the BIOS boot sequence.
    pub fn skip_bios(&mut self) {
        self.cpu.skip_bios(&mut self.bus);
    }

    /// The save hardware detected when the ROM loaded.
    #[must_use]
    pub const fn save_type(&self) -> SaveType {
        self.save_type
    }

    /// True after the scanline that entered VBlank, until the next
    /// `run_frame` call.
    #[must_use]
    pub const fn frame_complete(&self) -> bool {
        self.frame_complete
    }

    #[must_use]
    pub const fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// The 240x160 15-bit BGR output image.
    #[must_use]
    pub fn framebuffer(&self) -> &[Color] {
        self.bus.lcd.framebuffer()
    }

    /// The stereo sample ring the host sink drains between frames.
    pub fn audio_ring(&mut self) -> &mut RingBuffer<StereoSample> {
        self.bus.sound.sample_ring()
    }

    pub fn press(&mut self, button: GbaButton) {
        self.bus.keypad.set_button(button, true);
    }

    pub fn release(&mut self, button: GbaButton) {
        self.bus.keypad.set_button(button, false);
    }

    /// Run the CPU, timers and audio core in lockstep for one budget slice.
    fn run_components(&mut self, cycles: u32) {
        self.cpu.run(&mut self.bus, cycles);
        self.bus.tick_peripherals(cycles);
    }

    /// Advance exactly one scanline through its ten-step protocol.
    fn run_scanline(&mut self) {
        self.run_components(HDRAW_CYCLES);

        self.bus.lcd.set_hblank_flag(true);

        if self.bus.lcd.vcount < VDRAW_LINES {
            self.bus.lcd.render_scanline();
            self.bus.dma.on_hblank();
        }

        if self.bus.lcd.hblank_irq_enabled() {
            self.bus.interrupt_control.request(irq_bits::HBLANK);
        }

        self.run_components(HBLANK_CYCLES);

        self.bus.lcd.set_hblank_flag(false);
        self.bus.lcd.increment_vcount();

        if self.bus.lcd.vcount_match() {
            self.bus.interrupt_control.request(irq_bits::VCOUNT);
        }

        if self.bus.lcd.vcount == VDRAW_LINES {
            self.bus.lcd.set_vblank_flag(true);
            if self.bus.lcd.vblank_irq_enabled() {
                self.bus.interrupt_control.request(irq_bits::VBLANK);
            }
            self.bus.dma.on_vblank();
            self.bus.lcd.reload_affine_references();
            self.frame_complete = true;
        }

        if self.bus.lcd.vcount == 0 {
            self.bus.lcd.set_vblank_flag(false);
        }

        self.total_cycles += SCANLINE_CYCLES;
    }

    /// Advance exactly one 228-scanline frame.
    pub fn run_frame(&mut self) {
        self.frame_complete = false;

        for _ in 0..TOTAL_LINES {
            self.run_scanline();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwise::Bits;
    use crate::cpu::cpu_modes::Mode;

    /// A minimal ROM: a valid-enough header and `B .` at the entry point.
    fn test_rom() -> Vec<u8> {
        let mut rom = vec![0; 0x200];
        // B . (branch to self) at the entry point.
        rom[0x000..0x004].copy_from_slice(&0xEAFF_FFFE_u32.to_le_bytes());
        rom[0x004..0x0A0].copy_from_slice(&crate::cartridge_header::NINTENDO_LOGO);
        rom[0x0A0..0x0AC].copy_from_slice(b"IDLE LOOP\0\0\0");
        rom[0x0B2] = 0x96;
        rom
    }

    fn test_gba() -> Gba {
        Gba::new(None, test_rom()).unwrap()
    }

    #[test]
    fn construction_skips_bios_without_image() {
        let gba = test_gba();
        assert_eq!(gba.cpu.registers.program_counter(), 0x0800_0000);
        assert_eq!(gba.cpu.cpsr.mode(), Mode::System);
    }

    #[test]
    fn frame_protocol() {
        let mut gba = test_gba();
        // Enable the VBlank IRQ in DISPSTAT only; IME stays off so the CPU
        // keeps looping and we can observe the raw IF bit.
        gba.bus.lcd.write_dispstat_low(0x08);

        gba.run_frame();

        assert!(gba.frame_complete());
        // VCOUNT wrapped back to zero after 228 lines.
        assert_eq!(gba.bus.lcd.vcount, 0);
        // VBlank status deasserted again at wrap.
        assert!(!gba.bus.lcd.dispstat.get_bit(0));
        // The VBlank interrupt flag was raised.
        assert_ne!(
            gba.bus.interrupt_control.interrupt_request & irq_bits::VBLANK,
            0
        );
        assert_eq!(gba.total_cycles(), 228 * 1232);
    }

    #[test]
    fn vblank_status_observable_mid_frame() {
        let mut gba = test_gba();

        // Run up to scanline 160: VBlank just asserted.
        for _ in 0..VDRAW_LINES {
            gba.run_scanline();
        }
        assert_eq!(gba.bus.lcd.vcount, 160);
        assert!(gba.bus.lcd.dispstat.get_bit(0));
        assert!(gba.frame_complete());

        // HBlank deasserted between scanlines.
        assert!(!gba.bus.lcd.dispstat.get_bit(1));
    }

    #[test]
    fn vcount_match_fires_once_per_frame() {
        let mut gba = test_gba();
        // Match value 100, VCount IRQ enable.
        gba.bus.lcd.write_dispstat_high(100);
        gba.bus.lcd.write_dispstat_low(0x20);

        for line in 1..=101_u16 {
            gba.run_scanline();
            let flag_set = gba.bus.lcd.dispstat.get_bit(2);
            assert_eq!(flag_set, line == 100, "line {line}");
        }

        assert_ne!(
            gba.bus.interrupt_control.interrupt_request & irq_bits::VCOUNT,
            0
        );
    }

    #[test]
    fn timer_irq_enters_handler() {
        let mut gba = test_gba();

        // Timer 0: reload 0xFFFF, prescaler 1, IRQ enable, enable.
        gba.bus.write_half_word(0x0400_0100, 0xFFFF);
        gba.bus.write_half_word(0x0400_0102, 0x00C0);
        // IE: timer 0; IME on.
        gba.bus.write_half_word(0x0400_0200, irq_bits::TIMER0);
        gba.bus.write_byte(0x0400_0208, 1);

        // First slice executes the idle loop and overflows the timer.
        gba.run_components(8);
        assert_ne!(
            gba.bus.interrupt_control.interrupt_request & irq_bits::TIMER0,
            0
        );

        // The next slice takes the interrupt between instructions.
        gba.run_components(8);
        assert_eq!(gba.cpu.cpsr.mode(), Mode::Irq);
        assert!(gba.cpu.cpsr.irq_disable());
        // LR_irq holds the prior R15 (loop address + 8).
        assert_eq!(gba.cpu.registers.register_at(14), 0x0800_0008);
    }

    #[test]
    fn halted_cpu_wakes_on_interrupt() {
        let mut gba = test_gba();

        gba.bus.write_half_word(0x0400_0200, irq_bits::TIMER0);
        gba.bus.write_byte(0x0400_0208, 1);

        // Prime the pipeline, then halt the CPU.
        gba.run_components(8);
        gba.bus.write_byte(0x0400_0301, 0);
        gba.run_components(8);
        assert!(gba.cpu.halted);

        // Arm a fast timer: the overflow IRQ must wake the CPU.
        gba.bus.write_half_word(0x0400_0100, 0xFFFF);
        gba.bus.write_half_word(0x0400_0102, 0x00C0);
        gba.run_components(8);
        gba.run_components(8);

        assert!(!gba.cpu.halted);
        assert_eq!(gba.cpu.cpsr.mode(), Mode::Irq);
    }

    #[test]
    fn keypad_press_release_roundtrip() {
        let mut gba = test_gba();

        gba.press(GbaButton::A);
        gba.press(GbaButton::Start);
        assert_eq!(gba.bus.keypad.key_input, 0x03FF & !0x9);

        gba.release(GbaButton::A);
        assert_eq!(gba.bus.keypad.key_input, 0x03FF & !0x8);
    }

    #[test]
    fn hblank_dma_only_on_visible_lines() {
        let mut gba = test_gba();

        // DMA0: HBlank timing, enabled, one halfword.
        gba.bus.write_word(0x0400_00B0, 0x0300_0000);
        gba.bus.write_word(0x0400_00B4, 0x0300_0100);
        gba.bus.write_half_word(0x0400_00B8, 1);
        gba.bus.write_half_word(0x0400_00BA, 0xA200);

        // Jump to VBlank territory: no HBlank trigger there.
        gba.bus.lcd.vcount = 200;
        gba.run_scanline();
        assert!(!gba.bus.dma.has_pending());
    }

    #[test]
    fn audio_ring_fills_during_frame() {
        let mut gba = test_gba();
        gba.run_frame();

        // 228 scanlines x 1232 cycles / 512 cycles per sample.
        let expected = 228 * 1232 / 512;
        let produced = gba.audio_ring().len();
        assert!((expected - 2..=expected + 2).contains(&produced));
    }
}
