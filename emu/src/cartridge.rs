//! The Game Pak interface.
//!
//! The core reaches the cartridge only through the byte-level [`Cartridge`]
//! trait for the 0x08000000-0x0FFFFFFF range. [`GamePak`] is the plain
//! ROM-plus-SRAM implementation; dedicated flash/EEPROM chip emulation can
//! slot in behind the same trait.

use logger::log;

/// The maximum Game Pak ROM size, 32 MiB.
pub const MAX_ROM_SIZE: usize = 0x0200_0000;

const SRAM_SIZE: usize = 0x1_0000;

/// Byte-level access to the Game Pak regions (ROM wait states 0-2 and the
/// SRAM/Flash window).
pub trait Cartridge {
    fn read8(&mut self, address: u32) -> u8;
    fn write8(&mut self, address: u32, value: u8);
}

/// The save hardware detected from the ROM image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SaveType {
    #[default]
    None,
    Sram,
    Eeprom,
    Flash64k,
    Flash128k,
}

impl std::fmt::Display for SaveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Sram => f.write_str("SRAM"),
            Self::Eeprom => f.write_str("EEPROM"),
            Self::Flash64k => f.write_str("Flash 64K"),
            Self::Flash128k => f.write_str("Flash 128K"),
        }
    }
}

/// Detect the save type by scanning for the library ID strings the official
/// SDK embeds in every ROM.
#[must_use]
pub fn detect_save_type(rom: &[u8]) -> SaveType {
    const MARKERS: [(&[u8], SaveType); 5] = [
        (b"FLASH1M_V", SaveType::Flash128k),
        (b"FLASH512_V", SaveType::Flash64k),
        (b"FLASH_V", SaveType::Flash64k),
        (b"SRAM_V", SaveType::Sram),
        (b"EEPROM_V", SaveType::Eeprom),
    ];

    for (marker, save_type) in MARKERS {
        if rom.windows(marker.len()).any(|window| window == marker) {
            return save_type;
        }
    }

    SaveType::None
}

/// A Game Pak backed by the loaded ROM image and a 64 KiB SRAM.
pub struct GamePak {
    rom: Vec<u8>,
    sram: Vec<u8>,
    save_type: SaveType,
}

impl Default for GamePak {
    /// An empty Game Pak, used by tests and as a placeholder before a ROM
    /// loads. All ROM reads produce the open Game Pak bus pattern.
    fn default() -> Self {
        Self {
            rom: Vec::new(),
            sram: vec![0xFF; SRAM_SIZE],
            save_type: SaveType::None,
        }
    }
}

impl GamePak {
    /// Wrap a ROM image. Oversized images are rejected before any frame
    /// can run.
    pub fn new(rom: Vec<u8>) -> Result<Self, String> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(format!(
                "ROM size {} exceeds the 32 MiB Game Pak limit",
                rom.len()
            ));
        }

        let save_type = detect_save_type(&rom);
        log(format!("detected save type: {save_type}"));

        Ok(Self {
            rom,
            sram: vec![0xFF; SRAM_SIZE],
            save_type,
        })
    }

    #[must_use]
    pub const fn save_type(&self) -> SaveType {
        self.save_type
    }

    /// The SRAM contents, for the host to persist on shutdown.
    #[must_use]
    pub fn save_data(&self) -> &[u8] {
        &self.sram
    }

    pub fn load_save_data(&mut self, data: &[u8]) {
        let len = data.len().min(SRAM_SIZE);
        self.sram[..len].copy_from_slice(&data[..len]);
    }

    fn read_rom(&self, offset: usize) -> u8 {
        if offset < self.rom.len() {
            return self.rom[offset];
        }

        // Past the end of the image the 16-bit Game Pak bus keeps driving
        // the halfword address it was handed, so that is what reads back.
        let halfword = ((offset >> 1) & 0xFFFF) as u16;
        (halfword >> ((offset & 1) * 8)) as u8
    }
}

impl Cartridge for GamePak {
    fn read8(&mut self, address: u32) -> u8 {
        match address >> 24 {
            // The three ROM wait-state mirrors all map the same image.
            0x08..=0x0D => self.read_rom((address & 0x01FF_FFFF) as usize),
            _ => self.sram[(address as usize) & (SRAM_SIZE - 1)],
        }
    }

    fn write8(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x08..=0x0D => {
                // ROM is read-only; GPIO-mapped hardware would live here.
                tracing::debug!("dropped write to ROM at {address:#010X}");
            }
            _ => self.sram[(address as usize) & (SRAM_SIZE - 1)] = value,
        }
    }
}
