//! Tiled background rendering, both text (regular) and affine.

use crate::bitwise::Bits;

use super::{Layer, Lcd, LCD_WIDTH};

/// A VRAM screen block holds a 32x32 tile map, 2 KiB.
const SCREEN_BLOCK_SIZE: usize = 0x800;

/// Character data blocks are 16 KiB.
const CHAR_BLOCK_SIZE: usize = 0x4000;

const VRAM_LEN: usize = 0x0001_8000;

impl Lcd {
    /// Render one scanline of a regular (text) background.
    ///
    /// The map wraps at its own size; 512-wide and 512-tall maps span
    /// multiple 32x32 screen blocks laid out row-major.
    pub(super) fn render_bg_regular(&mut self, bg: usize) {
        let control = self.bg_cnt[bg];

        let char_base = control.get_bits(2..=3) as usize * CHAR_BLOCK_SIZE;
        let eight_bpp = control.get_bit(7);
        let screen_base = control.get_bits(8..=12) as usize * SCREEN_BLOCK_SIZE;
        let (map_w, map_h): (u32, u32) = match control.get_bits(14..=15) {
            0 => (256, 256),
            1 => (512, 256),
            2 => (256, 512),
            _ => (512, 512),
        };

        let (mosaic_h, mosaic_v) = if control.get_bit(6) {
            self.bg_mosaic_size()
        } else {
            (1, 1)
        };

        let line = self.vcount - self.vcount % mosaic_v;
        let map_y = (u32::from(line) + u32::from(self.bg_vofs[bg])) % map_h;

        for x in 0..LCD_WIDTH {
            let column = x as u16 - x as u16 % mosaic_h;
            let map_x = (u32::from(column) + u32::from(self.bg_hofs[bg])) % map_w;

            // Which screen block: 512-wide maps put the right half in the
            // next block, 512-tall maps continue below.
            let mut screen_block = 0;
            if map_x >= 256 {
                screen_block += 1;
            }
            if map_y >= 256 {
                screen_block += if map_w == 512 { 2 } else { 1 };
            }

            let tile_x = (map_x % 256) / 8;
            let tile_y = (map_y % 256) / 8;

            let entry_offset = screen_base
                + screen_block * SCREEN_BLOCK_SIZE
                + (tile_y as usize * 32 + tile_x as usize) * 2;
            let entry = u16::from(self.video_ram[entry_offset % VRAM_LEN])
                | (u16::from(self.video_ram[(entry_offset + 1) % VRAM_LEN]) << 8);

            let tile_number = entry.get_bits(0..=9) as usize;
            let h_flip = entry.get_bit(10);
            let v_flip = entry.get_bit(11);

            let mut pixel_x = map_x % 8;
            let mut pixel_y = map_y % 8;
            if h_flip {
                pixel_x = 7 - pixel_x;
            }
            if v_flip {
                pixel_y = 7 - pixel_y;
            }

            let palette_offset = if eight_bpp {
                // 64 bytes per tile, one byte per pixel over the full
                // 256-color palette.
                let offset =
                    char_base + tile_number * 64 + pixel_y as usize * 8 + pixel_x as usize;
                let color_index = self.video_ram[offset % VRAM_LEN];
                if color_index == 0 {
                    continue;
                }
                usize::from(color_index) * 2
            } else {
                // 32 bytes per tile, a nibble per pixel inside the entry's
                // sub-palette.
                let offset =
                    char_base + tile_number * 32 + pixel_y as usize * 4 + pixel_x as usize / 2;
                let byte = self.video_ram[offset % VRAM_LEN];
                let color_index = if pixel_x % 2 == 0 {
                    byte & 0x0F
                } else {
                    byte >> 4
                };
                if color_index == 0 {
                    continue;
                }

                let sub_palette = entry.get_bits(12..=15) as usize;
                (sub_palette * 16 + usize::from(color_index)) * 2
            };

            let color = self.palette_color(palette_offset);
            self.put_pixel(x, Layer::bg(bg), color);
        }
    }

    /// Render one scanline of an affine background.
    ///
    /// Affine maps are 8bpp only and their entries are single bytes with no
    /// flip bits. Texture coordinates start at the internal row reference
    /// and advance by (PA, PC) per screen pixel; out-of-map coordinates
    /// either wrap or drop the pixel, per BGCNT bit 13.
    pub(super) fn render_bg_affine(&mut self, bg: usize) {
        let index = bg - 2;
        let control = self.bg_cnt[bg];

        let char_base = control.get_bits(2..=3) as usize * CHAR_BLOCK_SIZE;
        let screen_base = control.get_bits(8..=12) as usize * SCREEN_BLOCK_SIZE;
        let size: i32 = match control.get_bits(14..=15) {
            0 => 128,
            1 => 256,
            2 => 512,
            _ => 1024,
        };
        let wraparound = control.get_bit(13);
        let tiles_per_row = (size / 8) as usize;

        // 19.8 fixed-point walk along the transformed row.
        let mut tex_x = self.bg_ref_x[index];
        let mut tex_y = self.bg_ref_y[index];
        let pa = i32::from(self.bg_pa[index]);
        let pc = i32::from(self.bg_pc[index]);

        for x in 0..LCD_WIDTH {
            let mut pixel_x = tex_x >> 8;
            let mut pixel_y = tex_y >> 8;
            tex_x += pa;
            tex_y += pc;

            if pixel_x < 0 || pixel_x >= size || pixel_y < 0 || pixel_y >= size {
                if !wraparound {
                    continue;
                }
                pixel_x = pixel_x.rem_euclid(size);
                pixel_y = pixel_y.rem_euclid(size);
            }

            let tile_x = (pixel_x / 8) as usize;
            let tile_y = (pixel_y / 8) as usize;

            let entry_offset = screen_base + tile_y * tiles_per_row + tile_x;
            let tile_number = usize::from(self.video_ram[entry_offset % VRAM_LEN]);

            let in_tile_x = (pixel_x % 8) as usize;
            let in_tile_y = (pixel_y % 8) as usize;
            let offset = char_base + tile_number * 64 + in_tile_y * 8 + in_tile_x;

            let color_index = self.video_ram[offset % VRAM_LEN];
            if color_index == 0 {
                continue;
            }

            let color = self.palette_color(usize::from(color_index) * 2);
            self.put_pixel(x, Layer::bg(bg), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Lcd, LCD_WIDTH};
    use crate::bitwise::Bits;

    fn write_palette(lcd: &mut Lcd, index: usize, color: u16) {
        lcd.palette_ram[index * 2] = color as u8;
        lcd.palette_ram[index * 2 + 1] = (color >> 8) as u8;
    }

    /// Fill tile 1 of charblock 0 with a solid 4bpp color index.
    fn fill_tile_4bpp(lcd: &mut Lcd, tile: usize, color_index: u8) {
        let nibble = color_index & 0x0F;
        for byte in 0..32 {
            lcd.video_ram[tile * 32 + byte] = nibble | (nibble << 4);
        }
    }

    #[test]
    fn regular_bg_renders_tile_colors() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 1 << 8; // mode 0, BG0 on
        lcd.bg_cnt[0] = 8 << 8; // screen block 8, char block 0, 256x256
        lcd.vcount = 0;

        write_palette(&mut lcd, 3, 0x001F);
        fill_tile_4bpp(&mut lcd, 1, 3);

        // Map entry (0, 0) points at tile 1.
        lcd.video_ram[8 * 0x800] = 1;
        lcd.video_ram[8 * 0x800 + 1] = 0;

        lcd.render_scanline();

        // The first 8 columns come from tile 1, the 9th from the (empty)
        // tile 0, i.e. the backdrop.
        assert_eq!(lcd.framebuffer()[0].0, 0x001F);
        assert_eq!(lcd.framebuffer()[7].0, 0x001F);
        assert_eq!(lcd.framebuffer()[8].0, 0x0000);
    }

    #[test]
    fn regular_bg_horizontal_scroll_wraps() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 1 << 8;
        lcd.bg_cnt[0] = 8 << 8;
        lcd.bg_hofs[0] = 8; // skip the painted tile entirely
        lcd.vcount = 0;

        write_palette(&mut lcd, 3, 0x001F);
        fill_tile_4bpp(&mut lcd, 1, 3);
        lcd.video_ram[8 * 0x800] = 1;

        lcd.render_scanline();
        assert_eq!(lcd.framebuffer()[0].0, 0x0000);

        // The tile reappears at the right edge through map wraparound:
        // column 248 maps back to map x = 0.
        assert_eq!(lcd.framebuffer()[248].0, 0x001F);
    }

    #[test]
    fn regular_bg_tile_flips() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 1 << 8;
        lcd.bg_cnt[0] = 8 << 8;
        lcd.vcount = 0;

        write_palette(&mut lcd, 1, 0x001F);
        write_palette(&mut lcd, 2, 0x7C00);

        // Tile 1 row 0: left pixel color 1, the rest color 2.
        lcd.video_ram[32] = 0x21; // pixels 0,1 = colors 1,2
        for byte in 1..4 {
            lcd.video_ram[32 + byte] = 0x22;
        }

        // Entry 0: tile 1 with H-flip.
        let entry: u16 = 1 | (1 << 10);
        lcd.video_ram[8 * 0x800] = entry as u8;
        lcd.video_ram[8 * 0x800 + 1] = (entry >> 8) as u8;

        lcd.render_scanline();

        // Flipped: color 1 lands on the right edge of the tile.
        assert_eq!(lcd.framebuffer()[7].0, 0x001F);
        assert_eq!(lcd.framebuffer()[0].0, 0x7C00);
    }

    #[test]
    fn affine_bg_identity_transform() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 2 | (1 << 10); // mode 2, BG2 on
        lcd.bg_cnt[2] = 8 << 8; // 128x128, screen block 8
        lcd.bg_pa = [0x0100, 0];
        lcd.bg_pd = [0x0100, 0];
        lcd.vcount = 0;

        write_palette(&mut lcd, 9, 0x03E0);

        // Affine map entries are single bytes; point entry 0 at tile 1.
        lcd.video_ram[8 * 0x800] = 1;
        // Tile 1, 8bpp: all pixels color 9.
        for i in 0..64 {
            lcd.video_ram[64 + i] = 9;
        }

        lcd.render_scanline();

        assert_eq!(lcd.framebuffer()[0].0, 0x03E0);
        assert_eq!(lcd.framebuffer()[7].0, 0x03E0);
        assert_eq!(lcd.framebuffer()[8].0, 0x0000);
    }

    #[test]
    fn affine_bg_out_of_bounds_transparent_without_wrap() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 2 | (1 << 10);
        lcd.bg_cnt[2] = 8 << 8; // 128x128, screen block 8, no wrap
        lcd.bg_pa = [0x0100, 0];
        lcd.bg_pd = [0x0100, 0];
        lcd.write_affine_reference_x(0, -(8 << 8)); // start 8 pixels out
        lcd.vcount = 0;

        // Every map entry reads 0: paint tile 0 with color 5.
        write_palette(&mut lcd, 5, 0x7FFF);
        for i in 0..64 {
            lcd.video_ram[i] = 5;
        }

        lcd.render_scanline();

        // First 8 columns fall outside the map: backdrop.
        assert_eq!(lcd.framebuffer()[0].0, 0x0000);
        assert_eq!(lcd.framebuffer()[8].0, 0x7FFF);
    }

    #[test]
    fn affine_bg_wraps_when_enabled() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 2 | (1 << 10);
        let mut control: u16 = 8 << 8;
        control.set_bit(13, true); // wraparound
        lcd.bg_cnt[2] = control;
        lcd.bg_pa = [0x0100, 0];
        lcd.bg_pd = [0x0100, 0];
        lcd.write_affine_reference_x(0, -(8 << 8));
        lcd.vcount = 0;

        write_palette(&mut lcd, 5, 0x7FFF);
        for i in 0..64 {
            lcd.video_ram[i] = 5;
        }

        lcd.render_scanline();
        assert_eq!(lcd.framebuffer()[0].0, 0x7FFF);
    }

    #[test]
    fn all_columns_touched_by_backdrop() {
        let mut lcd = Lcd::default();
        lcd.dispcnt = 0;
        lcd.vcount = 0;
        lcd.render_scanline();
        assert_eq!(lcd.framebuffer()[..LCD_WIDTH].len(), 240);
    }
}
