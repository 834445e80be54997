//! Object (sprite) rendering.
//!
//! OAM holds 128 entries of three attribute halfwords each (the fourth slot
//! interleaves the affine matrices). Regular sprites support flipping, both
//! palette depths and 1D/2D tile mapping; affine objects are skipped at this
//! compatibility tier.

use crate::bitwise::Bits;

use super::{Layer, Lcd, LCD_WIDTH};

const OAM_ENTRY_COUNT: usize = 128;
const OAM_ENTRY_SIZE: usize = 8;

/// OBJ tile data starts at this VRAM offset.
const OBJ_TILE_BASE: usize = 0x10000;

/// OBJ palette starts at this offset in palette RAM.
const OBJ_PALETTE_BASE: usize = 0x200;

const VRAM_LEN: usize = 0x0001_8000;
const VRAM_MIRROR_OFFSET: usize = 0x8000;

/// Sprite dimensions by (shape, size): shape 0 square, 1 horizontal,
/// 2 vertical.
const SPRITE_WIDTH: [[i32; 4]; 3] = [[8, 16, 32, 64], [16, 32, 32, 64], [8, 8, 16, 32]];
const SPRITE_HEIGHT: [[i32; 4]; 3] = [[8, 16, 32, 64], [8, 8, 16, 32], [16, 32, 32, 64]];

impl Lcd {
    /// Render the sprites whose priority field matches `priority` onto the
    /// current scanline.
    ///
    /// OAM is walked from entry 127 down to 0 so that lower-numbered
    /// entries overwrite higher-numbered ones.
    pub(super) fn render_sprites_at_priority(&mut self, priority: u8) {
        let mapping_1d = self.obj_mapping_one_dimensional();
        let scanline = i32::from(self.vcount);

        for entry in (0..OAM_ENTRY_COUNT).rev() {
            let base = entry * OAM_ENTRY_SIZE;

            let attr0 = u16::from(self.obj_attributes[base])
                | (u16::from(self.obj_attributes[base + 1]) << 8);
            let attr1 = u16::from(self.obj_attributes[base + 2])
                | (u16::from(self.obj_attributes[base + 3]) << 8);
            let attr2 = u16::from(self.obj_attributes[base + 4])
                | (u16::from(self.obj_attributes[base + 5]) << 8);

            // OBJ mode: 0 regular, 1 affine, 2 disabled, 3 affine double.
            let obj_mode = attr0.get_bits(8..=9);
            if obj_mode == 2 {
                continue;
            }
            if obj_mode == 1 || obj_mode == 3 {
                // Affine objects are not rendered at this tier.
                continue;
            }

            if attr2.get_bits(10..=11) as u8 != priority {
                continue;
            }

            let shape = attr0.get_bits(14..=15) as usize;
            let size = attr1.get_bits(14..=15) as usize;
            if shape > 2 {
                // Shape 3 is reserved.
                continue;
            }

            let width = SPRITE_WIDTH[shape][size];
            let height = SPRITE_HEIGHT[shape][size];

            // Y wraps: coordinates at 160 and above reach down from the
            // top of the screen.
            let mut sprite_y = attr0.get_bits(0..=7) as i32;
            if sprite_y >= 160 {
                sprite_y -= 256;
            }

            let local_y = scanline - sprite_y;
            if local_y < 0 || local_y >= height {
                continue;
            }

            // X is 9 bits, sign-extended.
            let mut sprite_x = attr1.get_bits(0..=8) as i32;
            if attr1.get_bit(8) {
                sprite_x -= 512;
            }

            let eight_bpp = attr0.get_bit(13);
            let mut base_tile = attr2.get_bits(0..=9) as usize;
            if eight_bpp {
                // The hardware forces bit 0 of the tile number in 8bpp.
                base_tile &= !1;
            }

            let palette_number = attr2.get_bits(12..=15) as usize;
            let h_flip = attr1.get_bit(12);
            let v_flip = attr1.get_bit(13);

            let tex_y = if v_flip { height - 1 - local_y } else { local_y };

            for pixel in 0..width {
                let screen_x = sprite_x + pixel;
                if screen_x < 0 || screen_x >= LCD_WIDTH as i32 {
                    continue;
                }

                let tex_x = if h_flip { width - 1 - pixel } else { pixel };

                let tile_row = (tex_y / 8) as usize;
                let tile_col = (tex_x / 8) as usize;
                let pixel_row = (tex_y % 8) as usize;
                let pixel_col = (tex_x % 8) as usize;

                // 2D mapping sees VRAM as a 32-tile-wide sheet; 1D mapping
                // packs each sprite's tiles consecutively. 8bpp tiles
                // consume two tile numbers each.
                let row_stride = if mapping_1d {
                    (width / 8) as usize * if eight_bpp { 2 } else { 1 }
                } else {
                    32
                };
                let tile_number = base_tile
                    + tile_row * row_stride
                    + tile_col * if eight_bpp { 2 } else { 1 };

                let tile_address = OBJ_TILE_BASE + tile_number * 32;

                let color_index = if eight_bpp {
                    let mut offset = tile_address + pixel_row * 8 + pixel_col;
                    if offset >= VRAM_LEN {
                        offset -= VRAM_MIRROR_OFFSET;
                    }
                    self.video_ram[offset]
                } else {
                    let mut offset = tile_address + pixel_row * 4 + pixel_col / 2;
                    if offset >= VRAM_LEN {
                        offset -= VRAM_MIRROR_OFFSET;
                    }
                    let byte = self.video_ram[offset];
                    if pixel_col % 2 == 0 {
                        byte & 0x0F
                    } else {
                        byte >> 4
                    }
                };

                // Index 0 is transparent in both depths.
                if color_index == 0 {
                    continue;
                }

                let palette_offset = if eight_bpp {
                    OBJ_PALETTE_BASE + usize::from(color_index) * 2
                } else {
                    OBJ_PALETTE_BASE + (palette_number * 16 + usize::from(color_index)) * 2
                };

                let color = self.palette_color(palette_offset);
                self.put_pixel(screen_x as usize, Layer::Obj, color);
            }
        }
    }
}
