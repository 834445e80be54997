use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::cpu::alu;
use crate::cpu::arm::instructions::{
    AluInstruction, AluSecondOperandInfo, ArmInstruction, HalfwordOffsetKind, MultiplyLongVariant,
    PsrKind, PsrOpKind, ShiftOperator, SingleDataTransferOffsetInfo,
};
use crate::cpu::arm::ArmOpcode;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, ReadWriteKind};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

pub const SIZE_OF_INSTRUCTION: u32 = 4;

impl Arm7tdmi {
    /// Execute one decoded ARM instruction. The condition field has already
    /// been checked by the caller. Returns the cycles spent.
    pub fn execute_arm(&mut self, bus: &mut Bus, op_code: &ArmOpcode) -> u32 {
        match op_code.instruction {
            ArmInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                op_kind: _,
                rn,
                destination,
                op2,
            } => self.data_processing(alu_instruction, set_conditions, rn, destination, op2),
            ArmInstruction::Multiply {
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => self.multiply(accumulate, set_conditions, rd, rn, rs, rm),
            ArmInstruction::MultiplyLong {
                variant,
                set_conditions,
                rd_hi,
                rd_lo,
                rs,
                rm,
            } => self.multiply_long(variant, set_conditions, rd_hi, rd_lo, rs, rm),
            ArmInstruction::PsrTransfer { psr_kind, kind } => self.psr_transfer(psr_kind, kind),
            ArmInstruction::SingleDataSwap {
                quantity,
                base_register,
                destination,
                source,
            } => self.single_data_swap(bus, quantity, base_register, destination, source),
            ArmInstruction::BranchAndExchange { register } => self.branch_and_exchange(register),
            ArmInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => self.half_word_data_transfer(
                bus,
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            ),
            ArmInstruction::SingleDataTransfer {
                kind,
                quantity,
                write_back,
                indexing,
                offsetting,
                rd,
                base_register,
                offset_info,
            } => self.single_data_transfer(
                bus,
                kind,
                quantity,
                write_back,
                indexing,
                offsetting,
                rd,
                base_register,
                offset_info,
            ),
            ArmInstruction::Undefined => {
                // Real hardware would take the UND exception; logging and
                // skipping is an accepted approximation for this tier.
                tracing::warn!(
                    "undefined ARM instruction {:#010X} at PC={:#010X}",
                    op_code.raw,
                    self.registers.program_counter().wrapping_sub(8)
                );
                1
            }
            ArmInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                base_register,
                register_list,
            } => self.block_data_transfer(
                bus,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                base_register,
                register_list,
            ),
            ArmInstruction::Branch { link, offset } => self.branch(link, offset),
            ArmInstruction::SoftwareInterrupt { comment } => self.software_interrupt(comment),
        }
    }

    /// Resolve operand 2 of a data processing instruction through the barrel
    /// shifter, producing the value and the shifter carry output.
    fn get_operand2(&self, op2: AluSecondOperandInfo) -> (u32, bool) {
        let carry = self.cpsr.carry_flag();

        match op2 {
            AluSecondOperandInfo::Immediate { base, shift_amount } => {
                if shift_amount == 0 {
                    // Rotate 0 keeps the current carry.
                    (base, carry)
                } else {
                    let result = base.rotate_right(shift_amount * 2);
                    (result, result.get_bit(31))
                }
            }
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind,
                register,
            } => {
                let mut rm = self.registers.register_at(register);

                let out = match shift_op {
                    ShiftOperator::Immediate(amount) => {
                        alu::shift_immediate(shift_kind, amount, rm, carry)
                    }
                    ShiftOperator::Register(rs) => {
                        // With a register-specified shift the prefetch has
                        // advanced one more step: R15 reads as PC + 4.
                        if register == REG_PROGRAM_COUNTER {
                            rm = rm.wrapping_add(4);
                        }
                        let amount = self.registers.register_at(rs) & 0xFF;
                        alu::shift_register(shift_kind, amount, rm, carry)
                    }
                };

                (out.result, out.carry)
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    pub fn data_processing(
        &mut self,
        alu_instruction: AluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    ) -> u32 {
        let register_shift = matches!(
            op2,
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        );

        let mut op1 = self.registers.register_at(rn);
        // Rn = R15 under a register-specified shift reads PC + 4.
        if rn == REG_PROGRAM_COUNTER && register_shift {
            op1 = op1.wrapping_add(4);
        }

        let (op2, shifter_carry) = self.get_operand2(op2);
        let carry_in = self.cpsr.carry_flag();

        let set_flags = set_conditions || alu_instruction.is_test();

        use AluInstruction::*;
        let result = match alu_instruction {
            And | Tst => alu::logical_op(op1 & op2, shifter_carry),
            Eor | Teq => alu::logical_op(op1 ^ op2, shifter_carry),
            Sub | Cmp => alu::sub_op(op1, op2),
            Rsb => alu::sub_op(op2, op1),
            Add | Cmn => alu::add_op(op1, op2),
            Adc => alu::adc_op(op1, op2, carry_in),
            Sbc => alu::sbc_op(op1, op2, carry_in),
            Rsc => alu::sbc_op(op2, op1, carry_in),
            Orr => alu::logical_op(op1 | op2, shifter_carry),
            Mov => alu::logical_op(op2, shifter_carry),
            Bic => alu::logical_op(op1 & !op2, shifter_carry),
            Mvn => alu::logical_op(!op2, shifter_carry),
        };
        let write_result = !alu_instruction.is_test();

        if set_flags {
            match alu_instruction {
                // Logical opcodes leave V unchanged.
                And | Eor | Tst | Teq | Orr | Mov | Bic | Mvn => {
                    self.cpsr.set_sign_flag(result.sign);
                    self.cpsr.set_zero_flag(result.zero);
                    self.cpsr.set_carry_flag(result.carry);
                }
                _ => self.cpsr.set_flags(&result),
            }
        }

        let mut cycles = 1;
        if register_shift {
            cycles += 1;
        }

        if write_result {
            self.registers.set_register_at(destination, result.result);

            if destination == REG_PROGRAM_COUNTER {
                if set_conditions {
                    // S = 1 with Rd = R15 is the exception return idiom.
                    self.exception_return();
                }
                self.align_program_counter();
                self.flush_pipeline();
                cycles += 2;
            }
        }

        cycles
    }

    pub fn psr_transfer(&mut self, psr_kind: PsrKind, kind: PsrOpKind) -> u32 {
        match kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    // In User/System the SPSR does not exist; reading it
                    // yields the CPSR, matching observed hardware.
                    PsrKind::Spsr if self.cpsr.mode().has_spsr() => self.spsr,
                    PsrKind::Spsr => self.cpsr,
                };

                self.registers
                    .set_register_at(destination_register, psr.into());
            }
            PsrOpKind::Msr {
                source_register,
                field_mask,
            } => {
                let operand = self.registers.register_at(source_register);
                self.write_psr(psr_kind, operand, field_mask);
            }
            PsrOpKind::MsrImmediate {
                immediate,
                field_mask,
            } => self.write_psr(psr_kind, immediate, field_mask),
        }

        1
    }

    fn write_psr(&mut self, psr_kind: PsrKind, operand: u32, field_mask: u32) {
        let mut write_mask = 0_u32;
        if field_mask.get_bit(3) {
            write_mask |= 0xFF00_0000; // f: flags
        }
        if field_mask.get_bit(2) {
            write_mask |= 0x00FF_0000; // s: status
        }
        if field_mask.get_bit(1) {
            write_mask |= 0x0000_FF00; // x: extension
        }
        if field_mask.get_bit(0) {
            write_mask |= 0x0000_00FF; // c: control
        }

        match psr_kind {
            PsrKind::Spsr => {
                if self.cpsr.mode().has_spsr() {
                    let new_value = (self.spsr.raw() & !write_mask) | (operand & write_mask);
                    self.spsr = crate::cpu::psr::Psr::from_raw(new_value);
                }
            }
            PsrKind::Cpsr => {
                let current_mode = self.cpsr.mode();

                // User code may only touch the flag field.
                let write_mask = if current_mode == Mode::User {
                    write_mask & 0xFF00_0000
                } else {
                    write_mask
                };

                let new_value = (self.cpsr.raw() & !write_mask) | (operand & write_mask);
                let new_mode = Mode::try_from(new_value & 0b11111).unwrap_or(current_mode);

                if new_mode != current_mode {
                    // Bank before the mode bits change hands.
                    self.swap_mode(new_mode);
                }

                self.cpsr = crate::cpu::psr::Psr::from_raw(new_value);
            }
        }
    }

    pub fn branch_and_exchange(&mut self, register: u32) -> u32 {
        let address = self.registers.register_at(register);

        // Bit 0 of the target selects the new state: 1 = Thumb, 0 = ARM.
        let thumb = address.get_bit(0);
        self.cpsr.set_state_bit(thumb);
        self.registers
            .set_program_counter(address & if thumb { !1 } else { !3 });

        self.flush_pipeline();
        3
    }

    pub fn branch(&mut self, link: bool, offset: i32) -> u32 {
        let pc = self.registers.program_counter();

        if link {
            // PC reads as executing address + 8; the return address is + 4.
            self.registers
                .set_register_at(REG_LR, pc.wrapping_sub(4));
        }

        self.registers
            .set_program_counter(pc.wrapping_add(offset as u32));
        self.flush_pipeline();
        3
    }

    fn software_interrupt(&mut self, comment: u32) -> u32 {
        self.handle_swi(comment);
        3
    }

    pub fn multiply(
        &mut self,
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) -> u32 {
        let mut result = self
            .registers
            .register_at(rm)
            .wrapping_mul(self.registers.register_at(rs));
        if accumulate {
            result = result.wrapping_add(self.registers.register_at(rn));
        }

        self.registers.set_register_at(rd, result);

        if set_conditions {
            // C is destroyed on ARM7TDMI; leave it unchanged.
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }

        if accumulate { 3 } else { 2 }
    }

    pub fn multiply_long(
        &mut self,
        variant: MultiplyLongVariant,
        set_conditions: bool,
        rd_hi: u32,
        rd_lo: u32,
        rs: u32,
        rm: u32,
    ) -> u32 {
        let rm_val = self.registers.register_at(rm);
        let rs_val = self.registers.register_at(rs);

        let mut result = match variant {
            MultiplyLongVariant::Umull | MultiplyLongVariant::Umlal => {
                u64::from(rm_val).wrapping_mul(u64::from(rs_val))
            }
            MultiplyLongVariant::Smull | MultiplyLongVariant::Smlal => {
                (i64::from(rm_val as i32).wrapping_mul(i64::from(rs_val as i32))) as u64
            }
        };

        if matches!(
            variant,
            MultiplyLongVariant::Umlal | MultiplyLongVariant::Smlal
        ) {
            let accumulator = (u64::from(self.registers.register_at(rd_hi)) << 32)
                | u64::from(self.registers.register_at(rd_lo));
            result = result.wrapping_add(accumulator);
        }

        self.registers.set_register_at(rd_lo, result as u32);
        self.registers.set_register_at(rd_hi, (result >> 32) as u32);

        if set_conditions {
            // N is bit 63, Z reflects the whole 64-bit result, C/V destroyed.
            self.cpsr.set_sign_flag((result >> 63) != 0);
            self.cpsr.set_zero_flag(result == 0);
        }

        if matches!(
            variant,
            MultiplyLongVariant::Umlal | MultiplyLongVariant::Smlal
        ) {
            5
        } else {
            4
        }
    }

    pub fn single_data_swap(
        &mut self,
        bus: &mut Bus,
        quantity: ReadWriteKind,
        base_register: u32,
        destination: u32,
        source: u32,
    ) -> u32 {
        let address = self.registers.register_at(base_register);

        match quantity {
            ReadWriteKind::Byte => {
                let old = bus.read_byte(address);
                let src = self.registers.register_at(source) as u8;
                bus.write_byte(address, src);
                self.registers.set_register_at(destination, old.into());
            }
            ReadWriteKind::Word => {
                let old = Self::read_word_rotated(bus, address);
                let src = self.registers.register_at(source);
                bus.write_word(address & !3, src);
                self.registers.set_register_at(destination, old);
            }
        }

        4
    }

    /// A word load at an unaligned address returns the aligned word rotated
    /// right by `(addr & 3) * 8`.
    pub(crate) fn read_word_rotated(bus: &mut Bus, address: u32) -> u32 {
        let word = bus.read_word(address & !3);
        word.rotate_right((address & 3) * 8)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn half_word_data_transfer(
        &mut self,
        bus: &mut Bus,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_kind: HalfwordOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    ) -> u32 {
        let base = self.registers.register_at(base_register);
        let offset = match offset_kind {
            HalfwordOffsetKind::Immediate { offset } => offset,
            HalfwordOffsetKind::Register { register } => self.registers.register_at(register),
        };

        let offset_address = match offsetting {
            Offsetting::Up => base.wrapping_add(offset),
            Offsetting::Down => base.wrapping_sub(offset),
        };
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };

        let mut cycles;

        match load_store {
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfword => {
                        if address.get_bit(0) {
                            // Misaligned halfword load: rotated read.
                            u32::from(bus.read_half_word(address & !1)).rotate_right(8)
                        } else {
                            bus.read_half_word(address).into()
                        }
                    }
                    HalfwordTransferKind::SignedByte => bus.read_byte(address) as i8 as u32,
                    HalfwordTransferKind::SignedHalfword => {
                        if address.get_bit(0) {
                            // Misaligned LDRSH degrades to a sign-extended
                            // byte load.
                            bus.read_byte(address) as i8 as u32
                        } else {
                            bus.read_half_word(address) as i16 as u32
                        }
                    }
                };

                self.registers
                    .set_register_at(source_destination_register, value);
                cycles = 3;

                if source_destination_register == REG_PROGRAM_COUNTER {
                    self.align_program_counter();
                    self.flush_pipeline();
                    cycles += 2;
                }
            }
            LoadStoreKind::Store => {
                debug_assert!(matches!(
                    transfer_kind,
                    HalfwordTransferKind::UnsignedHalfword
                ));

                let mut value = self.registers.register_at(source_destination_register);
                if source_destination_register == REG_PROGRAM_COUNTER {
                    value = value.wrapping_add(4);
                }
                bus.write_half_word(address & !1, value as u16);
                cycles = 2;
            }
        }

        // Post-indexing always writes back; pre-indexing only with W set.
        // LDR into the base register wins over the writeback.
        let base_loaded = matches!(load_store, LoadStoreKind::Load)
            && base_register == source_destination_register;
        if !base_loaded {
            match indexing {
                Indexing::Post => self.registers.set_register_at(base_register, offset_address),
                Indexing::Pre if write_back => {
                    self.registers.set_register_at(base_register, address);
                }
                Indexing::Pre => {}
            }
        }

        cycles
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn single_data_transfer(
        &mut self,
        bus: &mut Bus,
        kind: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        offsetting: Offsetting,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
    ) -> u32 {
        let base = self.registers.register_at(base_register);

        let offset = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                // Register offsets shift by immediate amounts only.
                let rm = self.registers.register_at(reg_offset);
                alu::shift_immediate(shift_kind, shift_amount, rm, self.cpsr.carry_flag()).result
            }
        };

        let offset_address = match offsetting {
            Offsetting::Up => base.wrapping_add(offset),
            Offsetting::Down => base.wrapping_sub(offset),
        };
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };

        let mut cycles;

        match kind {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Byte => bus.read_byte(address).into(),
                    ReadWriteKind::Word => Self::read_word_rotated(bus, address),
                };
                self.registers.set_register_at(rd, value);
                cycles = 3;

                if rd == REG_PROGRAM_COUNTER {
                    // Loading PC forces word alignment.
                    let pc = self.registers.program_counter() & !3;
                    self.registers.set_program_counter(pc);
                    self.flush_pipeline();
                    cycles += 2;
                }
            }
            LoadStoreKind::Store => {
                let mut value = self.registers.register_at(rd);
                // STR with Rd = R15 stores PC + 4 (executing address + 12).
                if rd == REG_PROGRAM_COUNTER {
                    value = value.wrapping_add(4);
                }

                match quantity {
                    ReadWriteKind::Byte => bus.write_byte(address, value as u8),
                    ReadWriteKind::Word => bus.write_word(address & !3, value),
                }
                cycles = 2;
            }
        }

        let base_loaded = matches!(kind, LoadStoreKind::Load) && base_register == rd;
        if !base_loaded {
            match indexing {
                Indexing::Post => self.registers.set_register_at(base_register, offset_address),
                Indexing::Pre if write_back => {
                    self.registers.set_register_at(base_register, address);
                }
                Indexing::Pre => {}
            }
        }

        cycles
    }

    #[allow(clippy::too_many_arguments)]
    #[allow(clippy::too_many_lines)]
    pub(crate) fn block_data_transfer(
        &mut self,
        bus: &mut Bus,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: u32,
        register_list: u16,
    ) -> u32 {
        let base = self.registers.register_at(base_register);

        let mut register_list = register_list;
        let mut count = register_list.count_ones();

        // Empty register list quirk: R15 is transferred and the base moves
        // by 0x40, as if all 16 registers were named.
        if count == 0 {
            register_list = 0x8000;
            count = 16;
        }

        // Start address by addressing mode:
        //   IA (P=0,U=1) base        IB (P=1,U=1) base + 4
        //   DA (P=0,U=0) base - n*4 + 4   DB (P=1,U=0) base - n*4
        let mut address = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => base,
            (Offsetting::Up, Indexing::Pre) => base.wrapping_add(4),
            (Offsetting::Down, Indexing::Post) => base.wrapping_sub(count * 4).wrapping_add(4),
            (Offsetting::Down, Indexing::Pre) => base.wrapping_sub(count * 4),
        };

        let new_base = match offsetting {
            Offsetting::Up => base.wrapping_add(count * 4),
            Offsetting::Down => base.wrapping_sub(count * 4),
        };

        let pc_in_list = register_list.get_bit(15);

        // The S bit without R15 in an LDM (and always for STM) forces a
        // user-bank transfer. S with R15 loaded is an exception return.
        let load_pc = matches!(load_store, LoadStoreKind::Load) && pc_in_list;
        let user_bank_transfer = load_psr && !load_pc;

        let old_mode = self.cpsr.mode();
        if user_bank_transfer && !matches!(old_mode, Mode::User | Mode::System) {
            self.swap_mode(Mode::User);
        }

        // Is the base register the first (lowest) register in the list?
        let below_base_mask = (1_u16 << base_register).wrapping_sub(1);
        let base_is_first =
            register_list.get_bit(base_register as u8) && register_list & below_base_mask == 0;

        let mut cycles = 0;
        let mut first_transfer = true;
        let mut pc_loaded = false;

        for i in 0..16_u32 {
            if !register_list.get_bit(i as u8) {
                continue;
            }

            match load_store {
                LoadStoreKind::Load => {
                    let value = bus.read_word(address & !3);
                    if i == REG_PROGRAM_COUNTER {
                        self.registers.set_program_counter(value);
                        pc_loaded = true;
                    } else {
                        self.registers.set_register_at(i, value);
                    }
                }
                LoadStoreKind::Store => {
                    let value = if i == REG_PROGRAM_COUNTER {
                        // PC stores as executing address + 12.
                        self.registers.program_counter().wrapping_add(4)
                    } else if i == base_register && !base_is_first && write_back {
                        // Rn in the list but not first stores the
                        // written-back base value.
                        new_base
                    } else {
                        self.registers.register_at(i)
                    };
                    bus.write_word(address & !3, value);
                }
            }

            cycles += if first_transfer { 2 } else { 1 };
            address = address.wrapping_add(4);
            first_transfer = false;
        }

        if user_bank_transfer && !matches!(old_mode, Mode::User | Mode::System) {
            self.swap_mode(old_mode);
        }

        // LDM with Rn in the list suppresses the writeback; the loaded
        // value wins.
        if write_back {
            let base_in_list = register_list.get_bit(base_register as u8);
            let suppressed = matches!(load_store, LoadStoreKind::Load) && base_in_list;
            if !suppressed {
                self.registers.set_register_at(base_register, new_base);
            }
        }

        if pc_loaded {
            if load_psr {
                self.exception_return();
            }
            self.align_program_counter();
            self.flush_pipeline();
        }

        cycles
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::Bus;
    use crate::cpu::arm::ArmOpcode;
    use crate::cpu::arm7tdmi::Arm7tdmi;
    use crate::cpu::cpu_modes::Mode;

    fn execute(cpu: &mut Arm7tdmi, bus: &mut Bus, raw: u32) -> u32 {
        let op = ArmOpcode::from(raw);
        cpu.execute_arm(bus, &op)
    }

    #[test]
    fn check_add_sets_overflow() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(1, 0x7FFF_FFFF);
        cpu.registers.set_register_at(2, 1);

        // ADDS R0, R1, R2
        execute(&mut cpu, &mut bus, 0xE091_0002);

        assert_eq!(cpu.registers.register_at(0), 0x8000_0000);
        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
        assert!(!cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.overflow_flag());
    }

    #[test]
    fn check_cmp_equal_values() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, 42);
        cpu.registers.set_register_at(1, 42);

        // CMP R0, R1
        execute(&mut cpu, &mut bus, 0xE150_0001);

        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.overflow_flag());
    }

    #[test]
    fn check_mov_with_shifter_carry() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(1, 0x8000_0001);

        // MOVS R0, R1, LSL #1
        execute(&mut cpu, &mut bus, 0xE1B0_0081);

        assert_eq!(cpu.registers.register_at(0), 0x0000_0002);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn check_branch_and_link() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_program_counter(0x0800_0008);

        // BL +8
        execute(&mut cpu, &mut bus, 0xEB00_0002);

        assert_eq!(cpu.registers.register_at(14), 0x0800_0004);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0010);
        assert!(!cpu.pipeline_valid());
    }

    #[test]
    fn check_bx_enters_thumb() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, 0x0300_0101);

        // BX R0
        execute(&mut cpu, &mut bus, 0xE12F_FF10);

        assert!(cpu.cpsr.state_bit());
        assert_eq!(cpu.registers.program_counter(), 0x0300_0100);
    }

    #[test]
    fn check_ldr_rotated_load() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        bus.write_byte(0x0300_0000, 0x11);
        bus.write_byte(0x0300_0001, 0x22);
        bus.write_byte(0x0300_0002, 0x33);
        bus.write_byte(0x0300_0003, 0x44);
        cpu.registers.set_register_at(1, 0x0300_0002);

        // LDR R0, [R1]
        execute(&mut cpu, &mut bus, 0xE591_0000);

        assert_eq!(cpu.registers.register_at(0), 0x2211_4433);
    }

    #[test]
    fn check_str_byte() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, 0x1234_56AB);
        cpu.registers.set_register_at(1, 0x0300_0010);

        // STRB R0, [R1]
        execute(&mut cpu, &mut bus, 0xE5C1_0000);

        assert_eq!(bus.read_byte(0x0300_0010), 0xAB);
    }

    #[test]
    fn check_ldrh_strh() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, 0xCAFE);
        cpu.registers.set_register_at(1, 0x0300_0020);

        // STRH R0, [R1]
        execute(&mut cpu, &mut bus, 0xE1C1_00B0);
        assert_eq!(bus.read_half_word(0x0300_0020), 0xCAFE);

        // LDRH R2, [R1]
        execute(&mut cpu, &mut bus, 0xE1D1_20B0);
        assert_eq!(cpu.registers.register_at(2), 0xCAFE);
    }

    #[test]
    fn check_ldrsb_sign_extends() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        bus.write_byte(0x0300_0030, 0x80);
        cpu.registers.set_register_at(1, 0x0300_0030);

        // LDRSB R0, [R1]
        execute(&mut cpu, &mut bus, 0xE1D1_00D0);

        assert_eq!(cpu.registers.register_at(0), 0xFFFF_FF80);
    }

    #[test]
    fn check_stm_base_first_in_list() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(4, 0x0300_0000);
        cpu.registers.set_register_at(5, 0x1111_1111);

        // STMIA R4!, {R4, R5}: R4 is first in the list, so its
        // pre-writeback value is stored.
        execute(&mut cpu, &mut bus, 0xE8A4_0030);

        assert_eq!(bus.read_word(0x0300_0000), 0x0300_0000);
        assert_eq!(bus.read_word(0x0300_0004), 0x1111_1111);
        assert_eq!(cpu.registers.register_at(4), 0x0300_0008);
    }

    #[test]
    fn check_stm_base_not_first_stores_new_base() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(3, 0xAAAA_AAAA);
        cpu.registers.set_register_at(4, 0x0300_0000);

        // STMIA R4!, {R3, R4}: R4 is not first, the written-back base
        // is stored.
        execute(&mut cpu, &mut bus, 0xE8A4_0018);

        assert_eq!(bus.read_word(0x0300_0000), 0xAAAA_AAAA);
        assert_eq!(bus.read_word(0x0300_0004), 0x0300_0008);
    }

    #[test]
    fn check_ldm_base_in_list_suppresses_writeback() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        bus.write_word(0x0300_0000, 0xDEAD_BEEF);
        bus.write_word(0x0300_0004, 0x0000_0042);
        cpu.registers.set_register_at(4, 0x0300_0000);

        // LDMIA R4!, {R4, R5}
        execute(&mut cpu, &mut bus, 0xE8B4_0030);

        assert_eq!(cpu.registers.register_at(4), 0xDEAD_BEEF);
        assert_eq!(cpu.registers.register_at(5), 0x0000_0042);
    }

    #[test]
    fn check_ldm_empty_rlist_quirk() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        bus.write_word(0x0300_0000, 0x0800_0000);
        cpu.registers.set_register_at(0, 0x0300_0000);

        // LDMIA R0!, {} transfers R15 and moves the base by 0x40.
        execute(&mut cpu, &mut bus, 0xE8B0_0000);

        assert_eq!(cpu.registers.program_counter(), 0x0800_0000);
        assert_eq!(cpu.registers.register_at(0), 0x0300_0040);
    }

    #[test]
    fn check_swp() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        bus.write_word(0x0300_0040, 0x0BAD_F00D);
        cpu.registers.set_register_at(1, 0x0300_0040);
        cpu.registers.set_register_at(2, 0x1234_5678);

        // SWP R0, R2, [R1]
        execute(&mut cpu, &mut bus, 0xE101_0092);

        assert_eq!(cpu.registers.register_at(0), 0x0BAD_F00D);
        assert_eq!(bus.read_word(0x0300_0040), 0x1234_5678);
    }

    #[test]
    fn check_mul_and_mla() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, 7);
        cpu.registers.set_register_at(1, 6);

        // MUL R2, R0, R1
        execute(&mut cpu, &mut bus, 0xE002_0190);
        assert_eq!(cpu.registers.register_at(2), 42);

        // MLA R3, R0, R1, R2
        cpu.registers.set_register_at(2, 8);
        execute(&mut cpu, &mut bus, 0xE023_2190);
        assert_eq!(cpu.registers.register_at(3), 50);
    }

    #[test]
    fn check_umull() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, 0xFFFF_FFFF);
        cpu.registers.set_register_at(1, 2);

        // UMULL R2, R3, R0, R1
        execute(&mut cpu, &mut bus, 0xE083_2190);

        assert_eq!(cpu.registers.register_at(2), 0xFFFF_FFFE);
        assert_eq!(cpu.registers.register_at(3), 1);
    }

    #[test]
    fn check_smull_negative() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, (-2_i32) as u32);
        cpu.registers.set_register_at(1, 3);

        // SMULL R2, R3, R0, R1
        execute(&mut cpu, &mut bus, 0xE0C3_2190);

        assert_eq!(cpu.registers.register_at(2) as i32, -6);
        assert_eq!(cpu.registers.register_at(3), 0xFFFF_FFFF);
    }

    #[test]
    fn check_mrs_and_msr() {
        use crate::bitwise::Bits;

        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.cpsr.set_carry_flag(true);

        // MRS R0, CPSR
        execute(&mut cpu, &mut bus, 0xE10F_0000);
        assert!(cpu.registers.register_at(0).get_bit(29));

        // MSR CPSR_f, R1 with N set
        cpu.registers.set_register_at(1, 0x8000_0000);
        execute(&mut cpu, &mut bus, 0xE128_F001);
        assert!(cpu.cpsr.sign_flag());
        // Control field untouched.
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
    }

    #[test]
    fn check_msr_mode_switch_banks_registers() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(13, 0x1111);

        // MSR CPSR_c, R0 with IRQ mode bits
        cpu.registers.set_register_at(0, 0b10010);
        execute(&mut cpu, &mut bus, 0xE121_F000);

        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        // SVC's SP is parked in the bank, IRQ's (zero) SP is live.
        assert_eq!(cpu.register_bank.r13_svc, 0x1111);
        assert_eq!(cpu.registers.register_at(13), 0);
    }
}
