//! Windowing and color special effects (BLDCNT/BLDALPHA/BLDY).

use crate::bitwise::Bits;

use super::{Color, Layer, Lcd, LCD_WIDTH};

impl Lcd {
    /// Is `layer` a first (top) blend target?
    fn is_first_target(&self, layer: Layer) -> bool {
        self.bldcnt.get_bit(layer as u8)
    }

    /// Is `layer` a second blend target?
    fn is_second_target(&self, layer: Layer) -> bool {
        self.bldcnt.get_bit(8 + layer as u8)
    }

    /// Fill the per-column window tables for the current scanline.
    ///
    /// With no window enabled every layer is visible and effects apply
    /// everywhere. Otherwise each column takes its layer mask and
    /// effects-enable bit from WIN0, WIN1 or WINOUT, in that priority.
    /// The OBJ window is not implemented.
    pub(super) fn compute_window_tables(&mut self) {
        let win0_on = self.dispcnt.get_bit(13);
        let win1_on = self.dispcnt.get_bit(14);

        if !win0_on && !win1_on {
            self.window_layer_mask = [0x3F; LCD_WIDTH];
            self.window_effects = [true; LCD_WIDTH];
            return;
        }

        let line = self.vcount;
        let win0_line = win0_on && Self::window_contains(self.win0v, line);
        let win1_line = win1_on && Self::window_contains(self.win1v, line);

        let win0_mask = self.winin.get_byte(0);
        let win1_mask = self.winin.get_byte(1);
        let winout_mask = self.winout.get_byte(0);

        for x in 0..LCD_WIDTH {
            let column = x as u16;

            let mask = if win0_line && Self::window_contains(self.win0h, column) {
                win0_mask
            } else if win1_line && Self::window_contains(self.win1h, column) {
                win1_mask
            } else {
                winout_mask
            };

            // Bits 0-4 enable BG0-BG3 and OBJ; the backdrop is always
            // visible. Bit 5 gates the color effects.
            self.window_layer_mask[x] = (mask & 0x1F) | (1 << Layer::Backdrop as u8);
            self.window_effects[x] = mask & (1 << 5) != 0;
        }
    }

    /// A window dimension register packs `x2` (exclusive right/bottom) in
    /// the low byte and `x1` in the high byte. `x1 > x2` wraps around.
    fn window_contains(bounds: u16, value: u16) -> bool {
        let high = bounds.get_byte(1);
        let low = bounds.get_byte(0);
        let start = u16::from(high);
        let end = u16::from(low);

        if start <= end {
            (start..end).contains(&value)
        } else {
            value >= start || value < end
        }
    }

    /// Apply the color effect selected by BLDCNT to the composed scanline.
    ///
    /// Runs after BG and OBJ composition, using the per-column layer
    /// tracking to find the first and second targets.
    pub(super) fn apply_blend_scanline(&mut self) {
        let mode = self.bldcnt.get_bits(6..=7);
        if mode == 0 {
            return;
        }

        // Coefficients clamp to the 0..=16 range.
        let eva = (self.bldalpha.get_bits(0..=4) as u32).min(16);
        let evb = (self.bldalpha.get_bits(8..=12) as u32).min(16);
        let evy = (self.bldy.get_bits(0..=4) as u32).min(16);

        for x in 0..LCD_WIDTH {
            if !self.window_effects[x] {
                continue;
            }

            if !self.is_first_target(self.top_layer[x]) {
                continue;
            }

            match mode {
                1 => {
                    // Alpha blend needs a matching second target underneath.
                    if !self.is_second_target(self.second_layer[x]) {
                        continue;
                    }

                    let top = self.scanline[x];
                    let below = self.second_pixel[x];

                    let blend = |a: u32, b: u32| (((a * eva) + (b * evb)) >> 4).min(31);
                    self.scanline[x] = Color::from_rgb(
                        blend(top.red().into(), below.red().into()) as u8,
                        blend(top.green().into(), below.green().into()) as u8,
                        blend(top.blue().into(), below.blue().into()) as u8,
                    );
                }
                2 => {
                    // Brightness increase: fade toward white.
                    let top = self.scanline[x];
                    let brighten = |c: u32| c + (((31 - c) * evy) >> 4);
                    self.scanline[x] = Color::from_rgb(
                        brighten(top.red().into()) as u8,
                        brighten(top.green().into()) as u8,
                        brighten(top.blue().into()) as u8,
                    );
                }
                _ => {
                    // Brightness decrease: fade toward black.
                    let top = self.scanline[x];
                    let darken = |c: u32| c - ((c * evy) >> 4);
                    self.scanline[x] = Color::from_rgb(
                        darken(top.red().into()) as u8,
                        darken(top.green().into()) as u8,
                        darken(top.blue().into()) as u8,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Lcd, LCD_WIDTH};

    fn write_obj_palette(lcd: &mut Lcd, index: usize, color: u16) {
        lcd.palette_ram[0x200 + index * 2] = color as u8;
        lcd.palette_ram[0x200 + index * 2 + 1] = (color >> 8) as u8;
    }

    fn single_obj_pixel_setup(lcd: &mut Lcd) {
        // Mode 3, BG2 + OBJ enabled.
        lcd.dispcnt = 3 | (1 << 10) | (1 << 12);
        lcd.vcount = 0;

        // BG2 bitmap: red at column 10.
        lcd.video_ram[20] = 0x1F;
        lcd.video_ram[21] = 0x00;

        // An 8x8 sprite at (10, 0) painting blue.
        write_obj_palette(lcd, 1, 0x7C00);
        for byte in 0..32 {
            lcd.video_ram[0x10000 + byte] = 0x11;
        }
        lcd.obj_attributes[2] = 10; // attr1 low byte: X = 10
    }

    #[test]
    fn alpha_blend_mixes_top_and_second_target() {
        let mut lcd = Lcd::default();
        single_obj_pixel_setup(&mut lcd);

        // OBJ first target, BG2 second target, alpha mode, EVA = EVB = 8.
        lcd.bldcnt = (1 << 4) | (1 << 10) | (1 << 6);
        lcd.bldalpha = 8 | (8 << 8);

        lcd.render_scanline();

        // Half blue + half red.
        let expected_r = (0x1F * 8) >> 4;
        let expected_b = (0x1F * 8) >> 4;
        let expected = (expected_b << 10) | expected_r;
        assert_eq!(lcd.framebuffer()[10].0, expected as u16);
    }

    #[test]
    fn alpha_blend_requires_second_target_match() {
        let mut lcd = Lcd::default();
        single_obj_pixel_setup(&mut lcd);

        // OBJ first target but BG2 NOT a second target.
        lcd.bldcnt = (1 << 4) | (1 << 6);
        lcd.bldalpha = 8 | (8 << 8);

        lcd.render_scanline();
        assert_eq!(lcd.framebuffer()[10].0, 0x7C00);
    }

    #[test]
    fn brighten_moves_toward_white() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 3 | (1 << 10);
        lcd.vcount = 0;
        lcd.video_ram[0] = 0x1F; // red pixel at column 0

        // BG2 first target, brighten, EVY = 16 (full).
        lcd.bldcnt = (1 << 2) | (2 << 6);
        lcd.bldy = 16;

        lcd.render_scanline();
        assert_eq!(lcd.framebuffer()[0].0, 0x7FFF);
    }

    #[test]
    fn darken_moves_toward_black() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 3 | (1 << 10);
        lcd.vcount = 0;
        lcd.video_ram[0] = 0xFF;
        lcd.video_ram[1] = 0x7F;

        lcd.bldcnt = (1 << 2) | (3 << 6);
        lcd.bldy = 16;

        lcd.render_scanline();
        assert_eq!(lcd.framebuffer()[0].0, 0x0000);
    }

    #[test]
    fn window_masks_layer_outside() {
        let mut lcd = Lcd::default();
        // Mode 3, BG2 on, window 0 on.
        lcd.dispcnt = 3 | (1 << 10) | (1 << 13);
        lcd.vcount = 0;

        // Backdrop green, bitmap red everywhere on the line.
        lcd.palette_ram[0] = 0xE0;
        lcd.palette_ram[1] = 0x03;
        for x in 0..LCD_WIDTH {
            lcd.video_ram[x * 2] = 0x1F;
            lcd.video_ram[x * 2 + 1] = 0;
        }

        // Window 0 covers columns 0..100 and all lines; BG2 visible only
        // inside. Outside (WINOUT) shows nothing but the backdrop.
        lcd.win0h = 100; // x1 = 0, x2 = 100
        lcd.win0v = 160;
        lcd.winin = 1 << 2; // BG2 inside
        lcd.winout = 0;

        lcd.render_scanline();

        assert_eq!(lcd.framebuffer()[50].0, 0x001F);
        assert_eq!(lcd.framebuffer()[150].0, 0x03E0);
    }

    #[test]
    fn window_gates_effects() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 3 | (1 << 10) | (1 << 13);
        lcd.vcount = 0;
        for x in 0..LCD_WIDTH {
            lcd.video_ram[x * 2] = 0x1F;
        }

        lcd.win0h = 100;
        lcd.win0v = 160;
        // BG2 visible inside and outside, but effects only inside.
        lcd.winin = (1 << 2) | (1 << 5);
        lcd.winout = 1 << 2;

        // Darken BG2 fully.
        lcd.bldcnt = (1 << 2) | (3 << 6);
        lcd.bldy = 16;

        lcd.render_scanline();

        assert_eq!(lcd.framebuffer()[50].0, 0x0000);
        assert_eq!(lcd.framebuffer()[150].0, 0x001F);
    }
}
