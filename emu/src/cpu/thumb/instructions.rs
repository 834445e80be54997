use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, Operation, ReadWriteKind, ShiftKind};

/// The 16 ALU opcodes of the Thumb register-to-register format.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ThumbAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Lsl = 0x2,
    Lsr = 0x3,
    Asr = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Ror = 0x7,
    Tst = 0x8,
    Neg = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mul = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl From<u16> for ThumbAluInstruction {
    fn from(op: u16) -> Self {
        match op & 0xF {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Lsl,
            0x3 => Self::Lsr,
            0x4 => Self::Asr,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Ror,
            0x8 => Self::Tst,
            0x9 => Self::Neg,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mul,
            0xE => Self::Bic,
            0xF => Self::Mvn,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for ThumbAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Ror => f.write_str("ROR"),
            Self::Tst => f.write_str("TST"),
            Self::Neg => f.write_str("NEG"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mul => f.write_str("MUL"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

/// The high-register format operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ThumbHighRegisterOperation {
    Add,
    Cmp,
    Mov,
    BranchExchange,
}

impl From<u16> for ThumbHighRegisterOperation {
    fn from(op: u16) -> Self {
        match op & 0b11 {
            0b00 => Self::Add,
            0b01 => Self::Cmp,
            0b10 => Self::Mov,
            0b11 => Self::BranchExchange,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for ThumbHighRegisterOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => f.write_str("ADD"),
            Self::Cmp => f.write_str("CMP"),
            Self::Mov => f.write_str("MOV"),
            Self::BranchExchange => f.write_str("BX"),
        }
    }
}

/// A decoded Thumb (16-bit) instruction, one variant per format.
///
/// Decoding walks the discriminators in strict priority order, most specific
/// pattern first. The order is load-bearing: the long-BL, SWI and
/// conditional-branch patterns all overlap the looser masks below them.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ThumbInstruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
        offset5: u32,
        source_register: u32,
        destination_register: u32,
    },
    AddSubtract {
        operand_kind: OperandKind,
        subtract: bool,
        rn_offset3: u32,
        source_register: u32,
        destination_register: u32,
    },
    MoveCompareAddSubtractImm {
        operation: Operation,
        destination_register: u32,
        offset: u32,
    },
    AluOp {
        alu_operation: ThumbAluInstruction,
        source_register: u32,
        destination_register: u32,
    },
    HiRegisterOpBx {
        operation: ThumbHighRegisterOperation,
        source_register: u32,
        destination_register: u32,
    },
    PcRelativeLoad {
        destination_register: u32,
        immediate_value: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset_register: u32,
        base_register: u32,
        source_destination_register: u32,
    },
    LoadStoreSignExtended {
        halfword: bool,
        sign_extend: bool,
        offset_register: u32,
        base_register: u32,
        source_destination_register: u32,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset: u32,
        base_register: u32,
        source_destination_register: u32,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        base_register: u32,
        source_destination_register: u32,
    },
    SpRelativeLoadStore {
        load_store: LoadStoreKind,
        destination_register: u32,
        word8: u32,
    },
    LoadAddress {
        sp: bool,
        destination_register: u32,
        offset: u32,
    },
    AddOffsetToStackPointer {
        negative: bool,
        word7: u32,
    },
    PushPopRegisters {
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        base_register: u32,
        register_list: u16,
    },
    CondBranch {
        condition: Condition,
        offset: i32,
    },
    Swi {
        comment: u32,
    },
    UncondBranch {
        offset: i32,
    },
    LongBranchLink {
        high: bool,
        offset: u32,
    },
}

impl From<u16> for ThumbInstruction {
    fn from(op_code: u16) -> Self {
        use ThumbInstruction::*;

        // Format 19: long branch with link.
        if op_code & 0xF000 == 0xF000 {
            LongBranchLink {
                high: op_code.get_bit(11),
                offset: op_code.get_bits(0..=10),
            }
        }
        // Format 17: software interrupt.
        else if op_code & 0xFF00 == 0xDF00 {
            Swi {
                comment: op_code.get_bits(0..=7),
            }
        }
        // Format 16: conditional branch.
        else if op_code & 0xF000 == 0xD000 {
            CondBranch {
                condition: Condition::from(op_code.get_bits(8..=11) as u8),
                offset: i32::from(op_code.get_bits(0..=7) as u8 as i8) << 1,
            }
        }
        // Format 18: unconditional branch.
        else if op_code & 0xF800 == 0xE000 {
            let mut offset = op_code.get_bits(0..=10) as i32;
            if op_code.get_bit(10) {
                offset |= !0x7FF;
            }
            UncondBranch { offset: offset << 1 }
        }
        // Format 14: push/pop registers.
        else if op_code & 0xF600 == 0xB400 {
            PushPopRegisters {
                load_store: op_code.get_bit(11).into(),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7) as u16,
            }
        }
        // Format 13: add offset to stack pointer.
        else if op_code & 0xFF00 == 0xB000 {
            AddOffsetToStackPointer {
                negative: op_code.get_bit(7),
                word7: op_code.get_bits(0..=6) << 2,
            }
        }
        // Format 15: multiple load/store.
        else if op_code & 0xF000 == 0xC000 {
            MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                base_register: op_code.get_bits(8..=10),
                register_list: op_code.get_bits(0..=7) as u16,
            }
        }
        // Format 12: load address.
        else if op_code & 0xF000 == 0xA000 {
            LoadAddress {
                sp: op_code.get_bit(11),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7) << 2,
            }
        }
        // Format 11: SP-relative load/store.
        else if op_code & 0xF000 == 0x9000 {
            SpRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                destination_register: op_code.get_bits(8..=10),
                word8: op_code.get_bits(0..=7) << 2,
            }
        }
        // Format 10: load/store halfword.
        else if op_code & 0xF000 == 0x8000 {
            LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset: op_code.get_bits(6..=10) << 1,
                base_register: op_code.get_bits(3..=5),
                source_destination_register: op_code.get_bits(0..=2),
            }
        }
        // Format 9: load/store with immediate offset.
        else if op_code & 0xE000 == 0x6000 {
            let byte_word: ReadWriteKind = op_code.get_bit(12).into();
            let offset5 = op_code.get_bits(6..=10);
            let offset = match byte_word {
                ReadWriteKind::Byte => offset5,
                ReadWriteKind::Word => offset5 << 2,
            };

            LoadStoreImmOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word,
                offset,
                base_register: op_code.get_bits(3..=5),
                source_destination_register: op_code.get_bits(0..=2),
            }
        }
        // Format 8: load/store sign-extended byte/halfword.
        else if op_code & 0xF200 == 0x5200 {
            LoadStoreSignExtended {
                halfword: op_code.get_bit(11),
                sign_extend: op_code.get_bit(10),
                offset_register: op_code.get_bits(6..=8),
                base_register: op_code.get_bits(3..=5),
                source_destination_register: op_code.get_bits(0..=2),
            }
        }
        // Format 7: load/store with register offset.
        else if op_code & 0xF200 == 0x5000 {
            LoadStoreRegisterOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word: op_code.get_bit(10).into(),
                offset_register: op_code.get_bits(6..=8),
                base_register: op_code.get_bits(3..=5),
                source_destination_register: op_code.get_bits(0..=2),
            }
        }
        // Format 6: PC-relative load.
        else if op_code & 0xF800 == 0x4800 {
            PcRelativeLoad {
                destination_register: op_code.get_bits(8..=10),
                immediate_value: op_code.get_bits(0..=7) << 2,
            }
        }
        // Format 5: high register operations / branch exchange.
        else if op_code & 0xFC00 == 0x4400 {
            let h1 = op_code.get_bit(7);
            let h2 = op_code.get_bit(6);

            HiRegisterOpBx {
                operation: (op_code.get_bits(8..=9) as u16).into(),
                source_register: op_code.get_bits(3..=5) | if h2 { 1 << 3 } else { 0 },
                destination_register: op_code.get_bits(0..=2) | if h1 { 1 << 3 } else { 0 },
            }
        }
        // Format 4: ALU operations.
        else if op_code & 0xFC00 == 0x4000 {
            AluOp {
                alu_operation: (op_code.get_bits(6..=9) as u16).into(),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        }
        // Format 3: move/compare/add/subtract immediate.
        else if op_code & 0xE000 == 0x2000 {
            MoveCompareAddSubtractImm {
                operation: (op_code.get_bits(11..=12) as u16).into(),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7),
            }
        }
        // Format 2: add/subtract.
        else if op_code & 0xF800 == 0x1800 {
            AddSubtract {
                operand_kind: op_code.get_bit(10).into(),
                subtract: op_code.get_bit(9),
                rn_offset3: op_code.get_bits(6..=8),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        }
        // Format 1: move shifted register.
        else {
            MoveShiftedRegister {
                shift_operation: op_code.get_bits(11..=12).into(),
                offset5: op_code.get_bits(6..=10),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        }
    }
}

impl std::fmt::Display for ThumbInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => write!(
                f,
                "{shift_operation} R{destination_register}, R{source_register}, #{offset5}"
            ),
            Self::AddSubtract {
                operand_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => {
                let op = if *subtract { "SUB" } else { "ADD" };
                match operand_kind {
                    OperandKind::Immediate => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, #{rn_offset3}"
                    ),
                    OperandKind::Register => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, R{rn_offset3}"
                    ),
                }
            }
            Self::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => write!(f, "{operation} R{destination_register}, #{offset}"),
            Self::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => write!(
                f,
                "{alu_operation} R{destination_register}, R{source_register}"
            ),
            Self::HiRegisterOpBx {
                operation,
                source_register,
                destination_register,
            } => match operation {
                ThumbHighRegisterOperation::BranchExchange => write!(f, "BX R{source_register}"),
                op => write!(f, "{op} R{destination_register}, R{source_register}"),
            },
            Self::PcRelativeLoad {
                destination_register,
                immediate_value,
            } => write!(f, "LDR R{destination_register}, [PC, #{immediate_value}]"),
            Self::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                offset_register,
                base_register,
                source_destination_register,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let b = match byte_word {
                    ReadWriteKind::Byte => "B",
                    ReadWriteKind::Word => "",
                };
                write!(
                    f,
                    "{op}{b} R{source_destination_register}, [R{base_register}, R{offset_register}]"
                )
            }
            Self::LoadStoreSignExtended {
                halfword,
                sign_extend,
                offset_register,
                base_register,
                source_destination_register,
            } => {
                let op = match (sign_extend, halfword) {
                    (false, false) => "STRH",
                    (false, true) => "LDRH",
                    (true, false) => "LDSB",
                    (true, true) => "LDSH",
                };
                write!(
                    f,
                    "{op} R{source_destination_register}, [R{base_register}, R{offset_register}]"
                )
            }
            Self::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                source_destination_register,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let b = match byte_word {
                    ReadWriteKind::Byte => "B",
                    ReadWriteKind::Word => "",
                };
                write!(
                    f,
                    "{op}{b} R{source_destination_register}, [R{base_register}, #{offset}]"
                )
            }
            Self::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDRH",
                    LoadStoreKind::Store => "STRH",
                };
                write!(
                    f,
                    "{op} R{source_destination_register}, [R{base_register}, #{offset}]"
                )
            }
            Self::SpRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                write!(f, "{op} R{destination_register}, [SP, #{word8}]")
            }
            Self::LoadAddress {
                sp,
                destination_register,
                offset,
            } => {
                let base = if *sp { "SP" } else { "PC" };
                write!(f, "ADD R{destination_register}, {base}, #{offset}")
            }
            Self::AddOffsetToStackPointer { negative, word7 } => {
                let sign = if *negative { "-" } else { "" };
                write!(f, "ADD SP, #{sign}{word7}")
            }
            Self::PushPopRegisters {
                load_store,
                pc_lr,
                register_list,
            } => match load_store {
                LoadStoreKind::Store => {
                    let lr = if *pc_lr { ", LR" } else { "" };
                    write!(f, "PUSH {register_list:#04X}{lr}")
                }
                LoadStoreKind::Load => {
                    let pc = if *pc_lr { ", PC" } else { "" };
                    write!(f, "POP {register_list:#04X}{pc}")
                }
            },
            Self::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDMIA",
                    LoadStoreKind::Store => "STMIA",
                };
                write!(f, "{op} R{base_register}!, {register_list:#04X}")
            }
            Self::CondBranch { condition, offset } => write!(f, "B{condition} {offset:+}"),
            Self::Swi { comment } => write!(f, "SWI {comment:#X}"),
            Self::UncondBranch { offset } => write!(f, "B {offset:+}"),
            Self::LongBranchLink { high, offset } => write!(f, "BL[{high}] {offset:#X}"),
        }
    }
}
