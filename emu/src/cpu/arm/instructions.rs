use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind,
    ShiftKind,
};

/// The 16 data processing opcodes encoded in bits 24-21.
///
/// Operations are divided into:
/// - **Logical**: AND, EOR, TST, TEQ, ORR, MOV, BIC, MVN
/// - **Arithmetic**: SUB, RSB, ADD, ADC, SBC, RSC, CMP, CMN
///
/// The distinction matters for the carry flag: logical operations take it
/// from the barrel shifter, arithmetic operations from the ALU itself.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AluInstruction {
    /// Logical AND: `Rd = Rn AND Op2`
    And = 0x0,
    /// Exclusive OR: `Rd = Rn XOR Op2`
    Eor = 0x1,
    /// Subtract: `Rd = Rn - Op2`
    Sub = 0x2,
    /// Reverse Subtract: `Rd = Op2 - Rn`
    Rsb = 0x3,
    /// Add: `Rd = Rn + Op2`
    Add = 0x4,
    /// Add with Carry: `Rd = Rn + Op2 + C`
    Adc = 0x5,
    /// Subtract with Carry: `Rd = Rn - Op2 - !C`
    Sbc = 0x6,
    /// Reverse Subtract with Carry: `Rd = Op2 - Rn - !C`
    Rsc = 0x7,
    /// Test bits (AND, flags only, no result written)
    Tst = 0x8,
    /// Test Equivalence (XOR, flags only, no result written)
    Teq = 0x9,
    /// Compare (SUB, flags only, no result written)
    Cmp = 0xA,
    /// Compare Negative (ADD, flags only, no result written)
    Cmn = 0xB,
    /// Logical OR: `Rd = Rn OR Op2`
    Orr = 0xC,
    /// Move: `Rd = Op2` (Rn is ignored)
    Mov = 0xD,
    /// Bit Clear: `Rd = Rn AND NOT Op2`
    Bic = 0xE,
    /// Move Not: `Rd = NOT Op2` (Rn is ignored)
    Mvn = 0xF,
}

impl AluInstruction {
    /// The test instructions discard the result and always set flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for AluInstruction {
    fn from(alu_op_code: u32) -> Self {
        match alu_op_code {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Sub,
            0x3 => Self::Rsb,
            0x4 => Self::Add,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Rsc,
            0x8 => Self::Tst,
            0x9 => Self::Teq,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mov,
            0xE => Self::Bic,
            0xF => Self::Mvn,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for AluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Sub => f.write_str("SUB"),
            Self::Rsb => f.write_str("RSB"),
            Self::Add => f.write_str("ADD"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Rsc => f.write_str("RSC"),
            Self::Tst => f.write_str("TST"),
            Self::Teq => f.write_str("TEQ"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mov => f.write_str("MOV"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

/// How the shift amount of a register operand is specified.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ShiftOperator {
    /// Fixed 5-bit amount.
    Immediate(u32),
    /// Amount taken from the bottom byte of a register.
    Register(u32),
}

impl std::fmt::Display for ShiftOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(amount) => write!(f, "#{amount}"),
            Self::Register(reg) => write!(f, "R{reg}"),
        }
    }
}

/// The second operand of a data processing instruction.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AluSecondOperandInfo {
    /// 8-bit immediate rotated right by twice the 4-bit amount.
    Immediate { base: u32, shift_amount: u32 },
    /// Register shifted by the barrel shifter.
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: u32,
    },
}

impl std::fmt::Display for AluSecondOperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { base, shift_amount } => {
                write!(f, "#{}", base.rotate_right(shift_amount * 2))
            }
            Self::Register {
                shift_op,
                shift_kind,
                register,
            } => write!(f, "R{register}, {shift_kind} {shift_op}"),
        }
    }
}

/// Which status register an MSR/MRS accesses.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl std::fmt::Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpsr => f.write_str("CPSR"),
            Self::Spsr => f.write_str("SPSR"),
        }
    }
}

/// The PSR transfer operations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PsrOpKind {
    /// Move PSR to register.
    Mrs { destination_register: u32 },
    /// Move register to PSR under a field mask.
    Msr { source_register: u32, field_mask: u32 },
    /// Move rotated immediate to PSR under a field mask.
    MsrImmediate { immediate: u32, field_mask: u32 },
}

/// The long multiply variants.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl std::fmt::Display for MultiplyLongVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Umull => f.write_str("UMULL"),
            Self::Umlal => f.write_str("UMLAL"),
            Self::Smull => f.write_str("SMULL"),
            Self::Smlal => f.write_str("SMLAL"),
        }
    }
}

/// Offset source of a halfword/signed transfer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HalfwordOffsetKind {
    Immediate { offset: u32 },
    Register { register: u32 },
}

/// Offset source of a single data transfer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    /// Register offset shifted by an immediate amount (register-specified
    /// amounts do not exist for LDR/STR).
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: u32,
    },
}

impl std::fmt::Display for SingleDataTransferOffsetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { offset } => write!(f, "#{offset}"),
            Self::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => write!(f, "R{reg_offset}, {shift_kind} #{shift_amount}"),
        }
    }
}

/// A decoded ARM (32-bit) instruction.
///
/// Decoding follows a fixed priority order, most specific bit pattern first;
/// see [`From<u32>`](#impl-From<u32>-for-ArmInstruction). Reordering the
/// checks mis-decodes real code, because the later patterns overlap the
/// earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmInstruction {
    DataProcessing {
        alu_instruction: AluInstruction,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    },
    MultiplyLong {
        variant: MultiplyLongVariant,
        set_conditions: bool,
        rd_hi: u32,
        rd_lo: u32,
        rs: u32,
        rm: u32,
    },
    PsrTransfer {
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    SingleDataSwap {
        quantity: ReadWriteKind,
        base_register: u32,
        destination: u32,
        source: u32,
    },
    BranchAndExchange {
        register: u32,
    },
    HalfwordDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_kind: HalfwordOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        kind: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        offsetting: Offsetting,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
    },
    Undefined,
    BlockDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: u32,
        register_list: u16,
    },
    Branch {
        link: bool,
        offset: i32,
    },
    SoftwareInterrupt {
        comment: u32,
    },
}

impl From<u32> for ArmInstruction {
    fn from(op_code: u32) -> Self {
        // Decode in strict priority order, most specific patterns first.

        // 1. SWI: bits[27:24] = 1111
        if op_code & 0x0F00_0000 == 0x0F00_0000 {
            Self::SoftwareInterrupt {
                comment: op_code.get_bits(0..=23),
            }
        }
        // 2. Branch B/BL: bits[27:25] = 101
        else if op_code & 0x0E00_0000 == 0x0A00_0000 {
            Self::Branch {
                link: op_code.get_bit(24),
                // Sign-extend the 24-bit word offset and convert to bytes.
                offset: ((op_code << 8) as i32) >> 6,
            }
        }
        // 3. Block data transfer LDM/STM: bits[27:25] = 100
        else if op_code & 0x0E00_0000 == 0x0800_0000 {
            Self::BlockDataTransfer {
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                base_register: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15) as u16,
            }
        }
        // 4. Undefined: bits[27:25] = 011, bit4 = 1
        else if op_code & 0x0E00_0010 == 0x0600_0010 {
            Self::Undefined
        }
        // 5. Single data transfer LDR/STR: bits[27:26] = 01
        else if op_code & 0x0C00_0000 == 0x0400_0000 {
            let offset_info = if op_code.get_bit(25) {
                SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: op_code.get_bits(7..=11),
                    shift_kind: op_code.get_bits(5..=6).into(),
                    reg_offset: op_code.get_bits(0..=3),
                }
            } else {
                SingleDataTransferOffsetInfo::Immediate {
                    offset: op_code.get_bits(0..=11),
                }
            };

            Self::SingleDataTransfer {
                kind: op_code.get_bit(20).into(),
                quantity: op_code.get_bit(22).into(),
                write_back: op_code.get_bit(21),
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                rd: op_code.get_bits(12..=15),
                base_register: op_code.get_bits(16..=19),
                offset_info,
            }
        }
        // 6. BX: 0001 0010 1111 1111 1111 0001 Rm
        else if op_code & 0x0FFF_FFF0 == 0x012F_FF10 {
            Self::BranchAndExchange {
                register: op_code.get_bits(0..=3),
            }
        }
        // 7. SWP/SWPB
        else if op_code & 0x0FB0_0FF0 == 0x0100_0090 {
            Self::SingleDataSwap {
                quantity: op_code.get_bit(22).into(),
                base_register: op_code.get_bits(16..=19),
                destination: op_code.get_bits(12..=15),
                source: op_code.get_bits(0..=3),
            }
        }
        // 8. Multiply long (UMULL/UMLAL/SMULL/SMLAL)
        else if op_code & 0x0F80_00F0 == 0x0080_0090 {
            let variant = match (op_code.get_bit(22), op_code.get_bit(21)) {
                (false, false) => MultiplyLongVariant::Umull,
                (false, true) => MultiplyLongVariant::Umlal,
                (true, false) => MultiplyLongVariant::Smull,
                (true, true) => MultiplyLongVariant::Smlal,
            };

            Self::MultiplyLong {
                variant,
                set_conditions: op_code.get_bit(20),
                rd_hi: op_code.get_bits(16..=19),
                rd_lo: op_code.get_bits(12..=15),
                rs: op_code.get_bits(8..=11),
                rm: op_code.get_bits(0..=3),
            }
        }
        // 9. Multiply (MUL/MLA)
        else if op_code & 0x0FC0_00F0 == 0x0000_0090 {
            Self::Multiply {
                accumulate: op_code.get_bit(21),
                set_conditions: op_code.get_bit(20),
                rd: op_code.get_bits(16..=19),
                rn: op_code.get_bits(12..=15),
                rs: op_code.get_bits(8..=11),
                rm: op_code.get_bits(0..=3),
            }
        }
        // 10. Halfword/signed-byte transfer: bit7 = 1, bit4 = 1, SH != 00
        else if op_code & 0x0E00_0090 == 0x0000_0090 && op_code.get_bits(5..=6) != 0 {
            let offset_kind = if op_code.get_bit(22) {
                HalfwordOffsetKind::Immediate {
                    offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                }
            } else {
                HalfwordOffsetKind::Register {
                    register: op_code.get_bits(0..=3),
                }
            };

            Self::HalfwordDataTransfer {
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                offset_kind,
                base_register: op_code.get_bits(16..=19),
                source_destination_register: op_code.get_bits(12..=15),
                transfer_kind: (op_code.get_bits(5..=6) as u8).into(),
            }
        }
        // 11. MSR immediate
        else if op_code & 0x0FB0_F000 == 0x0320_F000 {
            Self::PsrTransfer {
                psr_kind: if op_code.get_bit(22) {
                    PsrKind::Spsr
                } else {
                    PsrKind::Cpsr
                },
                kind: PsrOpKind::MsrImmediate {
                    immediate: op_code
                        .get_bits(0..=7)
                        .rotate_right(op_code.get_bits(8..=11) * 2),
                    field_mask: op_code.get_bits(16..=19),
                },
            }
        }
        // 12. MRS
        else if op_code & 0x0FBF_0FFF == 0x010F_0000 {
            Self::PsrTransfer {
                psr_kind: if op_code.get_bit(22) {
                    PsrKind::Spsr
                } else {
                    PsrKind::Cpsr
                },
                kind: PsrOpKind::Mrs {
                    destination_register: op_code.get_bits(12..=15),
                },
            }
        }
        // 13. MSR register
        else if op_code & 0x0FB0_FFF0 == 0x0120_F000 {
            Self::PsrTransfer {
                psr_kind: if op_code.get_bit(22) {
                    PsrKind::Spsr
                } else {
                    PsrKind::Cpsr
                },
                kind: PsrOpKind::Msr {
                    source_register: op_code.get_bits(0..=3),
                    field_mask: op_code.get_bits(16..=19),
                },
            }
        }
        // 14. Data processing, the catch-all of bits[27:26] = 00
        else {
            let op_kind: OperandKind = op_code.get_bit(25).into();
            let op2 = if op_kind == OperandKind::Immediate {
                AluSecondOperandInfo::Immediate {
                    base: op_code.get_bits(0..=7),
                    shift_amount: op_code.get_bits(8..=11),
                }
            } else {
                AluSecondOperandInfo::Register {
                    shift_op: if op_code.get_bit(4) {
                        ShiftOperator::Register(op_code.get_bits(8..=11))
                    } else {
                        ShiftOperator::Immediate(op_code.get_bits(7..=11))
                    },
                    shift_kind: op_code.get_bits(5..=6).into(),
                    register: op_code.get_bits(0..=3),
                }
            };

            Self::DataProcessing {
                alu_instruction: op_code.get_bits(21..=24).into(),
                set_conditions: op_code.get_bit(20),
                op_kind,
                rn: op_code.get_bits(16..=19),
                destination: op_code.get_bits(12..=15),
                op2,
            }
        }
    }
}

// The disassembly strings live behind Display so they are only paid for
// when a logger sink is installed.
impl std::fmt::Display for ArmInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::DataProcessing {
                    alu_instruction,
                    set_conditions,
                    rn,
                    destination,
                    op2,
                    ..
                } => {
                    let s = if *set_conditions { "S" } else { "" };
                    if alu_instruction.is_test() {
                        write!(f, "{alu_instruction} R{rn}, {op2}")
                    } else if matches!(
                        alu_instruction,
                        AluInstruction::Mov | AluInstruction::Mvn
                    ) {
                        write!(f, "{alu_instruction}{s} R{destination}, {op2}")
                    } else {
                        write!(f, "{alu_instruction}{s} R{destination}, R{rn}, {op2}")
                    }
                }
                Self::Multiply {
                    accumulate,
                    rd,
                    rn,
                    rs,
                    rm,
                    ..
                } => {
                    if *accumulate {
                        write!(f, "MLA R{rd}, R{rm}, R{rs}, R{rn}")
                    } else {
                        write!(f, "MUL R{rd}, R{rm}, R{rs}")
                    }
                }
                Self::MultiplyLong {
                    variant,
                    rd_hi,
                    rd_lo,
                    rs,
                    rm,
                    ..
                } => write!(f, "{variant} R{rd_lo}, R{rd_hi}, R{rm}, R{rs}"),
                Self::PsrTransfer { psr_kind, kind } => match kind {
                    PsrOpKind::Mrs {
                        destination_register,
                    } => write!(f, "MRS R{destination_register}, {psr_kind}"),
                    PsrOpKind::Msr {
                        source_register, ..
                    } => write!(f, "MSR {psr_kind}, R{source_register}"),
                    PsrOpKind::MsrImmediate { immediate, .. } => {
                        write!(f, "MSR {psr_kind}, #{immediate:#X}")
                    }
                },
                Self::SingleDataSwap {
                    quantity,
                    base_register,
                    destination,
                    source,
                } => {
                    let b = match quantity {
                        ReadWriteKind::Byte => "B",
                        ReadWriteKind::Word => "",
                    };
                    write!(f, "SWP{b} R{destination}, R{source}, [R{base_register}]")
                }
                Self::BranchAndExchange { register } => write!(f, "BX R{register}"),
                Self::HalfwordDataTransfer {
                    load_store,
                    base_register,
                    source_destination_register,
                    transfer_kind,
                    ..
                } => {
                    let op = match load_store {
                        LoadStoreKind::Load => "LDR",
                        LoadStoreKind::Store => "STR",
                    };
                    write!(
                        f,
                        "{op}{transfer_kind} R{source_destination_register}, [R{base_register}]"
                    )
                }
                Self::SingleDataTransfer {
                    kind,
                    quantity,
                    rd,
                    base_register,
                    offset_info,
                    ..
                } => {
                    let op = match kind {
                        LoadStoreKind::Load => "LDR",
                        LoadStoreKind::Store => "STR",
                    };
                    let b = match quantity {
                        ReadWriteKind::Byte => "B",
                        ReadWriteKind::Word => "",
                    };
                    write!(f, "{op}{b} R{rd}, [R{base_register}, {offset_info}]")
                }
                Self::Undefined => f.write_str("UNDEFINED"),
                Self::BlockDataTransfer {
                    load_store,
                    base_register,
                    register_list,
                    write_back,
                    ..
                } => {
                    let op = match load_store {
                        LoadStoreKind::Load => "LDM",
                        LoadStoreKind::Store => "STM",
                    };
                    let wb = if *write_back { "!" } else { "" };
                    write!(f, "{op} R{base_register}{wb}, {register_list:#06X}")
                }
                Self::Branch { link, offset } => {
                    let l = if *link { "L" } else { "" };
                    write!(f, "B{l} {offset:+}")
                }
                Self::SoftwareInterrupt { comment } => write!(f, "SWI {comment:#X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_branch() {
        // B +8 (offset field 0x000002)
        let instr = ArmInstruction::from(0xEA00_0002);
        assert_eq!(
            instr,
            ArmInstruction::Branch {
                link: false,
                offset: 8
            }
        );

        // BL with negative offset
        let instr = ArmInstruction::from(0xEBFF_FFFE);
        assert_eq!(
            instr,
            ArmInstruction::Branch {
                link: true,
                offset: -8
            }
        );
    }

    #[test]
    fn decode_swi_beats_branch_pattern() {
        let instr = ArmInstruction::from(0xEF00_00AB);
        assert_eq!(instr, ArmInstruction::SoftwareInterrupt { comment: 0xAB });
    }

    #[test]
    fn decode_bx() {
        let instr = ArmInstruction::from(0xE12F_FF13);
        assert_eq!(instr, ArmInstruction::BranchAndExchange { register: 3 });
    }

    #[test]
    fn decode_data_processing_immediate() {
        // ADDS R0, R1, #1
        let instr = ArmInstruction::from(0xE291_0001);
        assert_eq!(
            instr,
            ArmInstruction::DataProcessing {
                alu_instruction: AluInstruction::Add,
                set_conditions: true,
                op_kind: OperandKind::Immediate,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Immediate {
                    base: 1,
                    shift_amount: 0
                },
            }
        );
    }

    #[test]
    fn decode_multiply_beats_data_processing() {
        // MUL R2, R0, R1 has bit7=bit4=1 which overlaps data processing.
        let instr = ArmInstruction::from(0xE002_0190);
        assert_eq!(
            instr,
            ArmInstruction::Multiply {
                accumulate: false,
                set_conditions: false,
                rd: 2,
                rn: 0,
                rs: 1,
                rm: 0,
            }
        );
    }

    #[test]
    fn decode_umull() {
        let instr = ArmInstruction::from(0xE083_2190);
        assert_eq!(
            instr,
            ArmInstruction::MultiplyLong {
                variant: MultiplyLongVariant::Umull,
                set_conditions: false,
                rd_hi: 3,
                rd_lo: 2,
                rs: 1,
                rm: 0,
            }
        );
    }

    #[test]
    fn decode_swp() {
        let instr = ArmInstruction::from(0xE101_0092);
        assert_eq!(
            instr,
            ArmInstruction::SingleDataSwap {
                quantity: ReadWriteKind::Word,
                base_register: 1,
                destination: 0,
                source: 2,
            }
        );
    }

    #[test]
    fn decode_ldrh() {
        // LDRH R0, [R1, #2]
        let instr = ArmInstruction::from(0xE1D1_00B2);
        assert_eq!(
            instr,
            ArmInstruction::HalfwordDataTransfer {
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store: LoadStoreKind::Load,
                offset_kind: HalfwordOffsetKind::Immediate { offset: 2 },
                base_register: 1,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfword,
            }
        );
    }

    #[test]
    fn decode_mrs_msr() {
        // MRS R0, CPSR
        let instr = ArmInstruction::from(0xE10F_0000);
        assert_eq!(
            instr,
            ArmInstruction::PsrTransfer {
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::Mrs {
                    destination_register: 0
                },
            }
        );

        // MSR SPSR_fc, R1
        let instr = ArmInstruction::from(0xE169_F001);
        assert_eq!(
            instr,
            ArmInstruction::PsrTransfer {
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Msr {
                    source_register: 1,
                    field_mask: 0b1001
                },
            }
        );
    }

    #[test]
    fn decode_undefined() {
        let instr = ArmInstruction::from(0xE7F0_00F0);
        assert_eq!(instr, ArmInstruction::Undefined);
    }

    #[test]
    fn decode_block_transfer() {
        // STMFD SP!, {R0-R3, R12, LR}
        let instr = ArmInstruction::from(0xE92D_500F);
        assert_eq!(
            instr,
            ArmInstruction::BlockDataTransfer {
                indexing: Indexing::Pre,
                offsetting: Offsetting::Down,
                load_psr: false,
                write_back: true,
                load_store: LoadStoreKind::Store,
                base_register: 13,
                register_list: 0x500F,
            }
        );
    }
}
