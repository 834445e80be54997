//! Game Pak header parsing.
//!
//! Every ROM starts with a 192-byte header: an ARM branch over the header,
//! the compressed Nintendo logo bitmap, the title and game/maker codes and
//! a complement checksum. The BIOS refuses to boot a cartridge whose logo,
//! checksum or fixed byte fail validation, so mismatches are worth a
//! warning even though the emulator boots the ROM anyway.

/// The logo bitmap the BIOS compares against its internal copy during boot.
#[rustfmt::skip]
pub const NINTENDO_LOGO: [u8; 156] = [
    0x24, 0xFF, 0xAE, 0x51, 0x69, 0x9A, 0xA2, 0x21, 0x3D, 0x84, 0x82, 0x0A,
    0x84, 0xE4, 0x09, 0xAD, 0x11, 0x24, 0x8B, 0x98, 0xC0, 0x81, 0x7F, 0x21,
    0xA3, 0x52, 0xBE, 0x19, 0x93, 0x09, 0xCE, 0x20, 0x10, 0x46, 0x4A, 0x4A,
    0xF8, 0x27, 0x31, 0xEC, 0x58, 0xC7, 0xE8, 0x33, 0x82, 0xE3, 0xCE, 0xBF,
    0x85, 0xF4, 0xDF, 0x94, 0xCE, 0x4B, 0x09, 0xC1, 0x94, 0x56, 0x8A, 0xC0,
    0x13, 0x72, 0xA7, 0xFC, 0x9F, 0x84, 0x4D, 0x73, 0xA3, 0xCA, 0x9A, 0x61,
    0x58, 0x97, 0xA3, 0x27, 0xFC, 0x03, 0x98, 0x76, 0x23, 0x1D, 0xC7, 0x61,
    0x03, 0x04, 0xAE, 0x56, 0xBF, 0x38, 0x84, 0x00, 0x40, 0xA7, 0x0E, 0xFD,
    0xFF, 0x52, 0xFE, 0x03, 0x6F, 0x95, 0x30, 0xF1, 0x97, 0xFB, 0xC0, 0x85,
    0x60, 0xD6, 0x80, 0x25, 0xA9, 0x63, 0xBE, 0x03, 0x01, 0x4E, 0x38, 0xE2,
    0xF9, 0xA2, 0x34, 0xFF, 0xBB, 0x3E, 0x03, 0x44, 0x78, 0x00, 0x90, 0xCB,
    0x88, 0x11, 0x3A, 0x94, 0x65, 0xC0, 0x7C, 0x63, 0x87, 0xF0, 0x3C, 0xAF,
    0xD6, 0x25, 0xE4, 0x8B, 0x38, 0x0A, 0xAC, 0x72, 0x21, 0xD4, 0xF8, 0x07,
];

const HEADER_SIZE: usize = 0xC0;

/// Parsed Game Pak header.
pub struct CartridgeHeader {
    /// The ARM branch at the very start of the ROM.
    pub rom_entry_point: [u8; 4],
    /// Game title, up to 12 uppercase ASCII characters.
    pub game_title: String,
    /// Game code, e.g. "BPEE" for Pokemon Emerald.
    pub game_code: String,
    /// Publisher code, e.g. "01" for Nintendo.
    pub maker_code: String,
    /// Must be 0x96 on a valid cartridge.
    pub fixed_value: u8,
    /// Software revision.
    pub software_version: u8,
    /// Header checksum as stored in the ROM.
    pub complement_check: u8,

    /// Whether the logo bitmap matches the BIOS copy.
    pub logo_valid: bool,
    /// Whether the stored checksum matches the computed one.
    pub checksum_valid: bool,
    /// Whether the fixed byte holds 0x96.
    pub fixed_value_valid: bool,
}

impl CartridgeHeader {
    /// Parse and validate the header at the start of `data`.
    pub fn new(data: &[u8]) -> Result<Self, String> {
        if data.len() < HEADER_SIZE {
            return Err(format!(
                "ROM of {} bytes is too short for the {HEADER_SIZE}-byte header",
                data.len()
            ));
        }

        let fixed_value = data[0x0B2];
        let complement_check = data[0x0BD];
        let calculated_checksum = Self::calculate_checksum(data);

        let logo_valid = data[0x004..0x0A0] == NINTENDO_LOGO;
        let checksum_valid = complement_check == calculated_checksum;
        let fixed_value_valid = fixed_value == 0x96;

        if !logo_valid {
            tracing::warn!("Nintendo logo does not match the expected bitmap");
        }
        if !checksum_valid {
            tracing::warn!(
                "header checksum mismatch: stored {complement_check:#04X}, calculated {calculated_checksum:#04X}"
            );
        }
        if !fixed_value_valid {
            tracing::warn!("fixed header byte is {fixed_value:#04X}, expected 0x96");
        }

        Ok(Self {
            rom_entry_point: data[0x000..0x004].try_into().unwrap(),
            game_title: Self::ascii_field(&data[0x0A0..0x0AC]),
            game_code: Self::ascii_field(&data[0x0AC..0x0B0]),
            maker_code: Self::ascii_field(&data[0x0B0..0x0B2]),
            fixed_value,
            software_version: data[0x0BC],
            complement_check,
            logo_valid,
            checksum_valid,
            fixed_value_valid,
        })
    }

    /// `checksum = -(sum of bytes 0xA0..=0xBC) - 0x19`
    fn calculate_checksum(data: &[u8]) -> u8 {
        data[0xA0..0xBD]
            .iter()
            .fold(0u8, |acc, &byte| acc.wrapping_sub(byte))
            .wrapping_sub(0x19)
    }

    fn ascii_field(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes)
            .trim_end_matches('\0')
            .to_string()
    }

    /// All three boot-critical fields pass; the real BIOS would refuse to
    /// start otherwise.
    #[must_use]
    pub const fn is_bootable(&self) -> bool {
        self.logo_valid && self.checksum_valid && self.fixed_value_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_header_rom() -> Vec<u8> {
        let mut rom = vec![0; 0x100];
        rom[0x004..0x0A0].copy_from_slice(&NINTENDO_LOGO);
        rom[0x0A0..0x0AC].copy_from_slice(b"POKEMON EMER");
        rom[0x0AC..0x0B0].copy_from_slice(b"BPEE");
        rom[0x0B0..0x0B2].copy_from_slice(b"01");
        rom[0x0B2] = 0x96;
        rom[0x0BD] = CartridgeHeader::calculate_checksum(&rom);
        rom
    }

    #[test]
    fn parses_valid_header() {
        let rom = valid_header_rom();
        let header = CartridgeHeader::new(&rom).unwrap();

        assert_eq!(header.game_title, "POKEMON EMER");
        assert_eq!(header.game_code, "BPEE");
        assert_eq!(header.maker_code, "01");
        assert!(header.is_bootable());
    }

    #[test]
    fn bad_checksum_is_flagged_not_fatal() {
        let mut rom = valid_header_rom();
        rom[0x0BD] ^= 0xFF;

        let header = CartridgeHeader::new(&rom).unwrap();
        assert!(!header.checksum_valid);
        assert!(!header.is_bootable());
    }

    #[test]
    fn short_rom_is_an_error() {
        assert!(CartridgeHeader::new(&[0; 16]).is_err());
    }
}
