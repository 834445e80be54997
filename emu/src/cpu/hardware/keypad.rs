use serde::{Deserialize, Serialize};

/// GBA button bit positions in the KEYINPUT register (pressed bits read 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GbaButton {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

#[derive(Serialize, Deserialize)]
pub struct Keypad {
    pub key_input: u16,
    pub key_interrupt_control: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad {
    /// All ten buttons released (active-low, so bits 0-9 set).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key_input: 0x03FF,
            key_interrupt_control: 0,
        }
    }

    /// Press or release a button. Active-low: 0 means pressed.
    pub const fn set_button(&mut self, button: GbaButton, pressed: bool) {
        if pressed {
            self.key_input &= !(button as u16);
        } else {
            self.key_input |= button as u16;
        }
    }
}
