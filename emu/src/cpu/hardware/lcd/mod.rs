mod background;
mod bitmap;
mod effects;
mod sprites;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::bitwise::Bits;

/// GBA display width.
pub const LCD_WIDTH: usize = 240;

/// GBA display height.
pub const LCD_HEIGHT: usize = 160;

/// Visible scanlines per frame.
pub const VDRAW_LINES: u16 = 160;

/// Total scanlines per frame, VBlank included.
pub const TOTAL_LINES: u16 = 228;

/// A 15-bit BGR color as stored in palette RAM (`0BBBBBGGGGGRRRRR`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u16);

impl Color {
    pub const WHITE: Self = Self(0x7FFF);

    #[must_use]
    pub const fn from_palette_color(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        let red = u16::from(red);
        let green = u16::from(green);
        let blue = u16::from(blue);

        Self((blue << 10) | (green << 5) | red)
    }

    #[must_use]
    pub fn red(self) -> u8 {
        self.0.get_bits(0..=4) as u8
    }

    #[must_use]
    pub fn green(self) -> u8 {
        self.0.get_bits(5..=9) as u8
    }

    #[must_use]
    pub fn blue(self) -> u8 {
        self.0.get_bits(10..=14) as u8
    }
}

/// Who owns a composed pixel. The discriminants match the BLDCNT target
/// bit positions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    Bg0 = 0,
    Bg1 = 1,
    Bg2 = 2,
    Bg3 = 3,
    Obj = 4,
    #[default]
    Backdrop = 5,
}

impl Layer {
    const fn bg(index: usize) -> Self {
        match index {
            0 => Self::Bg0,
            1 => Self::Bg1,
            2 => Self::Bg2,
            3 => Self::Bg3,
            _ => unreachable!(),
        }
    }
}

/// The picture processor: LCD registers, the video memories, and the
/// scanline renderer.
///
/// Rendering is scanline-based: the frame scheduler calls
/// [`Lcd::render_scanline`] at each HBlank of a visible line, against the
/// memory state at that boundary. Composition tracks, per column, the top
/// layer and the layer just below it so the blend unit can find its second
/// target afterwards.
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct Lcd {
    /// LCD Control.
    pub dispcnt: u16,
    /// Undocumented - Green Swap.
    pub green_swap: u16,
    /// General LCD Status (VBlank/HBlank/VCount flags and IRQ enables).
    pub dispstat: u16,
    /// Vertical Counter.
    pub vcount: u16,
    /// BG0-BG3 Control.
    pub bg_cnt: [u16; 4],
    /// BG0-BG3 horizontal scroll.
    pub bg_hofs: [u16; 4],
    /// BG0-BG3 vertical scroll.
    pub bg_vofs: [u16; 4],
    /// Affine parameters for BG2/BG3 (8.8 fixed point).
    pub bg_pa: [i16; 2],
    pub bg_pb: [i16; 2],
    pub bg_pc: [i16; 2],
    pub bg_pd: [i16; 2],
    /// Affine reference points as last written (19.8 fixed point).
    pub bg_ref_x_latch: [i32; 2],
    pub bg_ref_y_latch: [i32; 2],
    /// Internal reference accumulators, reloaded from the latches at the
    /// start of VBlank and stepped by (PB, PD) per rendered line.
    bg_ref_x: [i32; 2],
    bg_ref_y: [i32; 2],
    /// Window 0/1 horizontal bounds.
    pub win0h: u16,
    pub win1h: u16,
    /// Window 0/1 vertical bounds.
    pub win0v: u16,
    pub win1v: u16,
    /// Inside-of-window layer masks.
    pub winin: u16,
    /// Outside-of-window layer mask (low byte).
    pub winout: u16,
    /// Mosaic Size.
    pub mosaic: u16,
    /// Color Special Effects Selection.
    pub bldcnt: u16,
    /// Alpha Blending Coefficients.
    pub bldalpha: u16,
    /// Brightness (Fade-In/Out) Coefficient.
    pub bldy: u16,

    /// From 0x05000000: 1 KiB, BG palette then OBJ palette.
    pub palette_ram: Vec<u8>,
    /// From 0x06000000: 96 KiB of video RAM.
    pub video_ram: Vec<u8>,
    /// From 0x07000000: 1 KiB of object attributes.
    pub obj_attributes: Vec<u8>,

    framebuffer: Vec<Color>,

    #[serde_as(as = "[_; LCD_WIDTH]")]
    scanline: [Color; LCD_WIDTH],
    #[serde_as(as = "[_; LCD_WIDTH]")]
    top_layer: [Layer; LCD_WIDTH],
    #[serde_as(as = "[_; LCD_WIDTH]")]
    second_layer: [Layer; LCD_WIDTH],
    #[serde_as(as = "[_; LCD_WIDTH]")]
    second_pixel: [Color; LCD_WIDTH],
    #[serde_as(as = "[_; LCD_WIDTH]")]
    window_layer_mask: [u8; LCD_WIDTH],
    #[serde_as(as = "[_; LCD_WIDTH]")]
    window_effects: [bool; LCD_WIDTH],
}

impl Default for Lcd {
    fn default() -> Self {
        Self {
            dispcnt: 0,
            green_swap: 0,
            dispstat: 0,
            vcount: 0,
            bg_cnt: [0; 4],
            bg_hofs: [0; 4],
            bg_vofs: [0; 4],
            bg_pa: [0; 2],
            bg_pb: [0; 2],
            bg_pc: [0; 2],
            bg_pd: [0; 2],
            bg_ref_x_latch: [0; 2],
            bg_ref_y_latch: [0; 2],
            bg_ref_x: [0; 2],
            bg_ref_y: [0; 2],
            win0h: 0,
            win1h: 0,
            win0v: 0,
            win1v: 0,
            winin: 0,
            winout: 0,
            mosaic: 0,
            bldcnt: 0,
            bldalpha: 0,
            bldy: 0,
            palette_ram: vec![0; 0x400],
            video_ram: vec![0; 0x0001_8000],
            obj_attributes: vec![0; 0x400],
            framebuffer: vec![Color::default(); LCD_WIDTH * LCD_HEIGHT],
            scanline: [Color::default(); LCD_WIDTH],
            top_layer: [Layer::Backdrop; LCD_WIDTH],
            second_layer: [Layer::Backdrop; LCD_WIDTH],
            second_pixel: [Color::default(); LCD_WIDTH],
            window_layer_mask: [0x3F; LCD_WIDTH],
            window_effects: [true; LCD_WIDTH],
        }
    }
}

impl Lcd {
    /// The 240x160 output image, row-major.
    #[must_use]
    pub fn framebuffer(&self) -> &[Color] {
        &self.framebuffer
    }

    /// Video mode, DISPCNT bits 0-2.
    #[must_use]
    pub fn bg_mode(&self) -> u8 {
        self.dispcnt.get_bits(0..=2) as u8
    }

    fn forced_blank(&self) -> bool {
        self.dispcnt.get_bit(7)
    }

    fn bg_enabled(&self, bg: usize) -> bool {
        self.dispcnt.get_bit(8 + bg as u8)
    }

    fn obj_enabled(&self) -> bool {
        self.dispcnt.get_bit(12)
    }

    fn obj_mapping_one_dimensional(&self) -> bool {
        self.dispcnt.get_bit(6)
    }

    fn bitmap_frame_select(&self) -> bool {
        self.dispcnt.get_bit(4)
    }

    fn bg_priority(&self, bg: usize) -> u8 {
        self.bg_cnt[bg].get_bits(0..=1) as u8
    }

    pub fn set_vblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(0, value);
    }

    pub fn set_hblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(1, value);
    }

    fn set_vcount_flag(&mut self, value: bool) {
        self.dispstat.set_bit(2, value);
    }

    #[must_use]
    pub fn vblank_irq_enabled(&self) -> bool {
        self.dispstat.get_bit(3)
    }

    #[must_use]
    pub fn hblank_irq_enabled(&self) -> bool {
        self.dispstat.get_bit(4)
    }

    #[must_use]
    pub fn vcount_irq_enabled(&self) -> bool {
        self.dispstat.get_bit(5)
    }

    fn vcount_setting(&self) -> u8 {
        self.dispstat.get_byte(1)
    }

    /// DISPSTAT writes must preserve the read-only VBlank/HBlank/VCount
    /// flags in bits 0-2.
    pub fn write_dispstat_low(&mut self, value: u8) {
        let flags = self.dispstat & 0x0007;
        self.dispstat = (self.dispstat & 0xFF00) | u16::from(value & 0xF8) | flags;
    }

    pub fn write_dispstat_high(&mut self, value: u8) {
        self.dispstat.set_byte(1, value);
    }

    pub fn increment_vcount(&mut self) {
        self.vcount += 1;
        if self.vcount >= TOTAL_LINES {
            self.vcount = 0;
        }
    }

    /// Update the VCount-match flag. Returns true when the match IRQ
    /// should be requested; the flag itself is observable either way.
    pub fn vcount_match(&mut self) -> bool {
        let matched = self.vcount.get_byte(0) == self.vcount_setting();
        self.set_vcount_flag(matched);

        matched && self.vcount_irq_enabled()
    }

    /// VBlank start: the affine accumulators reload from their latches.
    pub fn reload_affine_references(&mut self) {
        self.bg_ref_x = self.bg_ref_x_latch;
        self.bg_ref_y = self.bg_ref_y_latch;
    }

    /// An affine reference point write lands in the latch and in the
    /// internal accumulator immediately.
    pub fn write_affine_reference_x(&mut self, index: usize, value: i32) {
        // Sign-extend the 28-bit register.
        let value = (value << 4) >> 4;
        self.bg_ref_x_latch[index] = value;
        self.bg_ref_x[index] = value;
    }

    pub fn write_affine_reference_y(&mut self, index: usize, value: i32) {
        let value = (value << 4) >> 4;
        self.bg_ref_y_latch[index] = value;
        self.bg_ref_y[index] = value;
    }

    fn backdrop_color(&self) -> Color {
        Color(u16::from(self.palette_ram[0]) | (u16::from(self.palette_ram[1]) << 8))
    }

    /// Read a 15-bit color from palette RAM (`OBJ` palette starts at 0x200).
    fn palette_color(&self, byte_offset: usize) -> Color {
        Color(
            u16::from(self.palette_ram[byte_offset])
                | (u16::from(self.palette_ram[byte_offset + 1]) << 8),
        )
    }

    /// Deposit a pixel, pushing the previous top pixel down into the
    /// second-layer slot for the blend unit. Window-masked pixels are
    /// dropped.
    fn put_pixel(&mut self, x: usize, layer: Layer, color: Color) {
        if self.window_layer_mask[x] & (1 << layer as u8) == 0 {
            return;
        }

        self.second_pixel[x] = self.scanline[x];
        self.second_layer[x] = self.top_layer[x];
        self.scanline[x] = color;
        self.top_layer[x] = layer;
    }

    /// Render the current scanline into the framebuffer.
    ///
    /// Layers paint back-to-front: priorities 3 down to 0, BG index high to
    /// low inside a priority, and the sprites of each priority above that
    /// priority's backgrounds.
    pub fn render_scanline(&mut self) {
        let line = self.vcount;
        if line >= VDRAW_LINES {
            return;
        }

        if self.forced_blank() {
            self.scanline = [Color::WHITE; LCD_WIDTH];
            self.copy_scanline_to_framebuffer();
            return;
        }

        self.compute_window_tables();

        let backdrop = self.backdrop_color();
        self.scanline = [backdrop; LCD_WIDTH];
        self.top_layer = [Layer::Backdrop; LCD_WIDTH];
        self.second_layer = [Layer::Backdrop; LCD_WIDTH];
        self.second_pixel = [backdrop; LCD_WIDTH];

        let mode = self.bg_mode();
        for priority in (0..4_u8).rev() {
            match mode {
                0 => {
                    for bg in (0..4).rev() {
                        if self.bg_enabled(bg) && self.bg_priority(bg) == priority {
                            self.render_bg_regular(bg);
                        }
                    }
                }
                1 => {
                    // BG0/BG1 text, BG2 affine.
                    if self.bg_enabled(2) && self.bg_priority(2) == priority {
                        self.render_bg_affine(2);
                    }
                    for bg in (0..2).rev() {
                        if self.bg_enabled(bg) && self.bg_priority(bg) == priority {
                            self.render_bg_regular(bg);
                        }
                    }
                }
                2 => {
                    for bg in (2..4).rev() {
                        if self.bg_enabled(bg) && self.bg_priority(bg) == priority {
                            self.render_bg_affine(bg);
                        }
                    }
                }
                3 | 4 | 5 => {
                    if self.bg_enabled(2) && self.bg_priority(2) == priority {
                        match mode {
                            3 => self.render_mode3(),
                            4 => self.render_mode4(),
                            _ => self.render_mode5(),
                        }
                    }
                }
                _ => {
                    tracing::warn!("invalid video mode {mode}");
                }
            }

            if self.obj_enabled() {
                self.render_sprites_at_priority(priority);
            }
        }

        self.apply_blend_scanline();
        self.copy_scanline_to_framebuffer();

        // The row reference of both affine backgrounds advances by (PB, PD)
        // after every rendered line.
        for i in 0..2 {
            self.bg_ref_x[i] += i32::from(self.bg_pb[i]);
            self.bg_ref_y[i] += i32::from(self.bg_pd[i]);
        }
    }

    fn copy_scanline_to_framebuffer(&mut self) {
        let row = usize::from(self.vcount) * LCD_WIDTH;
        self.framebuffer[row..row + LCD_WIDTH].copy_from_slice(&self.scanline);
    }

    /// Mosaic dimensions for backgrounds: (horizontal, vertical), both >= 1.
    fn bg_mosaic_size(&self) -> (u16, u16) {
        (
            self.mosaic.get_bits(0..=3) as u16 + 1,
            self.mosaic.get_bits(4..=7) as u16 + 1,
        )
    }
}
