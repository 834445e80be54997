pub mod instructions;
pub mod operations;

use instructions::ThumbInstruction;

/// A raw 16-bit opcode together with its decoded instruction.
pub struct ThumbOpcode {
    pub instruction: ThumbInstruction,
    pub raw: u16,
}

impl From<u16> for ThumbOpcode {
    fn from(op_code: u16) -> Self {
        Self {
            instruction: ThumbInstruction::from(op_code),
            raw: op_code,
        }
    }
}

impl std::ops::Deref for ThumbOpcode {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl std::fmt::Display for ThumbOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.instruction)
    }
}
