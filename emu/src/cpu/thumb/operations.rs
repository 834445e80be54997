use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::cpu::alu;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::flags::{LoadStoreKind, OperandKind, Operation, ReadWriteKind, ShiftKind};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::instructions::{
    ThumbAluInstruction, ThumbHighRegisterOperation, ThumbInstruction,
};
use crate::cpu::thumb::ThumbOpcode;

pub const SIZE_OF_INSTRUCTION: u32 = 2;

impl Arm7tdmi {
    /// Execute one decoded Thumb instruction. Returns the cycles spent.
    pub fn execute_thumb(&mut self, bus: &mut Bus, op_code: &ThumbOpcode) -> u32 {
        match op_code.instruction {
            ThumbInstruction::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => self.move_shifted_register(
                shift_operation,
                offset5,
                source_register,
                destination_register,
            ),
            ThumbInstruction::AddSubtract {
                operand_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => self.add_subtract(
                operand_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            ),
            ThumbInstruction::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => self.move_compare_add_sub_imm(operation, destination_register, offset),
            ThumbInstruction::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => self.alu_op(alu_operation, source_register, destination_register),
            ThumbInstruction::HiRegisterOpBx {
                operation,
                source_register,
                destination_register,
            } => self.hi_reg_operation_branch_ex(operation, source_register, destination_register),
            ThumbInstruction::PcRelativeLoad {
                destination_register,
                immediate_value,
            } => self.pc_relative_load(bus, destination_register, immediate_value),
            ThumbInstruction::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                offset_register,
                base_register,
                source_destination_register,
            } => self.load_store_register_offset(
                bus,
                load_store,
                byte_word,
                offset_register,
                base_register,
                source_destination_register,
            ),
            ThumbInstruction::LoadStoreSignExtended {
                halfword,
                sign_extend,
                offset_register,
                base_register,
                source_destination_register,
            } => self.load_store_sign_extended(
                bus,
                halfword,
                sign_extend,
                offset_register,
                base_register,
                source_destination_register,
            ),
            ThumbInstruction::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                source_destination_register,
            } => self.load_store_immediate_offset(
                bus,
                load_store,
                byte_word,
                offset,
                base_register,
                source_destination_register,
            ),
            ThumbInstruction::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => self.load_store_halfword(
                bus,
                load_store,
                offset,
                base_register,
                source_destination_register,
            ),
            ThumbInstruction::SpRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => self.sp_relative_load_store(bus, load_store, destination_register, word8),
            ThumbInstruction::LoadAddress {
                sp,
                destination_register,
                offset,
            } => self.load_address(sp, destination_register, offset),
            ThumbInstruction::AddOffsetToStackPointer { negative, word7 } => {
                self.add_offset_sp(negative, word7)
            }
            ThumbInstruction::PushPopRegisters {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop_register(bus, load_store, pc_lr, register_list),
            ThumbInstruction::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => self.multiple_load_store(bus, load_store, base_register, register_list),
            ThumbInstruction::CondBranch { condition, offset } => {
                self.cond_branch(condition, offset)
            }
            ThumbInstruction::Swi { comment } => {
                self.handle_swi(comment);
                3
            }
            ThumbInstruction::UncondBranch { offset } => self.uncond_branch(offset),
            ThumbInstruction::LongBranchLink { high, offset } => {
                self.long_branch_link(high, offset)
            }
        }
    }

    fn move_shifted_register(
        &mut self,
        shift_operation: ShiftKind,
        offset5: u32,
        source_register: u32,
        destination_register: u32,
    ) -> u32 {
        let source = self.registers.register_at(source_register);
        let out = alu::shift_immediate(shift_operation, offset5, source, self.cpsr.carry_flag());

        self.registers
            .set_register_at(destination_register, out.result);
        self.cpsr.set_sign_flag(out.result.get_bit(31));
        self.cpsr.set_zero_flag(out.result == 0);
        self.cpsr.set_carry_flag(out.carry);

        1
    }

    fn add_subtract(
        &mut self,
        operand_kind: OperandKind,
        subtract: bool,
        rn_offset3: u32,
        source_register: u32,
        destination_register: u32,
    ) -> u32 {
        let first = self.registers.register_at(source_register);
        let second = match operand_kind {
            OperandKind::Immediate => rn_offset3,
            OperandKind::Register => self.registers.register_at(rn_offset3),
        };

        let out = if subtract {
            alu::sub_op(first, second)
        } else {
            alu::add_op(first, second)
        };

        self.registers
            .set_register_at(destination_register, out.result);
        self.cpsr.set_flags(&out);

        1
    }

    fn move_compare_add_sub_imm(
        &mut self,
        operation: Operation,
        destination_register: u32,
        offset: u32,
    ) -> u32 {
        let rd_value = self.registers.register_at(destination_register);

        match operation {
            Operation::Mov => {
                self.registers.set_register_at(destination_register, offset);
                self.cpsr.set_sign_flag(false);
                self.cpsr.set_zero_flag(offset == 0);
            }
            Operation::Cmp => {
                let out = alu::sub_op(rd_value, offset);
                self.cpsr.set_flags(&out);
            }
            Operation::Add => {
                let out = alu::add_op(rd_value, offset);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.cpsr.set_flags(&out);
            }
            Operation::Sub => {
                let out = alu::sub_op(rd_value, offset);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.cpsr.set_flags(&out);
            }
        }

        1
    }

    #[allow(clippy::too_many_lines)]
    fn alu_op(
        &mut self,
        alu_operation: ThumbAluInstruction,
        source_register: u32,
        destination_register: u32,
    ) -> u32 {
        let rd_value = self.registers.register_at(destination_register);
        let rs_value = self.registers.register_at(source_register);
        let carry = self.cpsr.carry_flag();

        let mut cycles = 1;

        use ThumbAluInstruction::*;
        match alu_operation {
            And => {
                let result = rd_value & rs_value;
                self.registers.set_register_at(destination_register, result);
                self.set_nz(result);
            }
            Eor => {
                let result = rd_value ^ rs_value;
                self.registers.set_register_at(destination_register, result);
                self.set_nz(result);
            }
            Lsl => {
                let out = alu::shift_register(ShiftKind::Lsl, rs_value & 0xFF, rd_value, carry);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.set_nz(out.result);
                self.cpsr.set_carry_flag(out.carry);
            }
            Lsr => {
                let out = alu::shift_register(ShiftKind::Lsr, rs_value & 0xFF, rd_value, carry);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.set_nz(out.result);
                self.cpsr.set_carry_flag(out.carry);
            }
            Asr => {
                let out = alu::shift_register(ShiftKind::Asr, rs_value & 0xFF, rd_value, carry);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.set_nz(out.result);
                self.cpsr.set_carry_flag(out.carry);
            }
            Adc => {
                let out = alu::adc_op(rd_value, rs_value, carry);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.cpsr.set_flags(&out);
            }
            Sbc => {
                let out = alu::sbc_op(rd_value, rs_value, carry);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.cpsr.set_flags(&out);
            }
            Ror => {
                let out = alu::shift_register(ShiftKind::Ror, rs_value & 0xFF, rd_value, carry);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.set_nz(out.result);
                self.cpsr.set_carry_flag(out.carry);
            }
            Tst => {
                self.set_nz(rd_value & rs_value);
            }
            Neg => {
                let out = alu::sub_op(0, rs_value);
                self.registers
                    .set_register_at(destination_register, out.result);
                self.cpsr.set_flags(&out);
            }
            Cmp => {
                let out = alu::sub_op(rd_value, rs_value);
                self.cpsr.set_flags(&out);
            }
            Cmn => {
                let out = alu::add_op(rd_value, rs_value);
                self.cpsr.set_flags(&out);
            }
            Orr => {
                let result = rd_value | rs_value;
                self.registers.set_register_at(destination_register, result);
                self.set_nz(result);
            }
            Mul => {
                let result = rd_value.wrapping_mul(rs_value);
                self.registers.set_register_at(destination_register, result);
                self.set_nz(result);
                // C is destroyed on ARMv4; clear it as a stable default.
                self.cpsr.set_carry_flag(false);
                cycles = 4;
            }
            Bic => {
                let result = rd_value & !rs_value;
                self.registers.set_register_at(destination_register, result);
                self.set_nz(result);
            }
            Mvn => {
                let result = !rs_value;
                self.registers.set_register_at(destination_register, result);
                self.set_nz(result);
            }
        }

        cycles
    }

    fn set_nz(&mut self, result: u32) {
        self.cpsr.set_sign_flag(result.get_bit(31));
        self.cpsr.set_zero_flag(result == 0);
    }

    fn hi_reg_operation_branch_ex(
        &mut self,
        operation: ThumbHighRegisterOperation,
        source_register: u32,
        destination_register: u32,
    ) -> u32 {
        let rs_value = self.registers.register_at(source_register);

        match operation {
            ThumbHighRegisterOperation::Add => {
                let result = self
                    .registers
                    .register_at(destination_register)
                    .wrapping_add(rs_value);
                self.registers.set_register_at(destination_register, result);

                if destination_register == REG_PROGRAM_COUNTER {
                    let pc = self.registers.program_counter() & !1;
                    self.registers.set_program_counter(pc);
                    self.flush_pipeline();
                    return 3;
                }
                1
            }
            ThumbHighRegisterOperation::Cmp => {
                let out = alu::sub_op(self.registers.register_at(destination_register), rs_value);
                self.cpsr.set_flags(&out);
                1
            }
            ThumbHighRegisterOperation::Mov => {
                self.registers
                    .set_register_at(destination_register, rs_value);

                if destination_register == REG_PROGRAM_COUNTER {
                    let pc = self.registers.program_counter() & !1;
                    self.registers.set_program_counter(pc);
                    self.flush_pipeline();
                    return 3;
                }
                1
            }
            ThumbHighRegisterOperation::BranchExchange => {
                // Bit 0 selects the new state, as in the ARM BX.
                let thumb = rs_value.get_bit(0);
                self.cpsr.set_state_bit(thumb);
                self.registers
                    .set_program_counter(rs_value & if thumb { !1 } else { !3 });
                self.flush_pipeline();
                3
            }
        }
    }

    fn pc_relative_load(
        &mut self,
        bus: &mut Bus,
        destination_register: u32,
        immediate_value: u32,
    ) -> u32 {
        // PC reads as executing address + 4, with bit 1 forced to zero.
        let address = (self.registers.program_counter() & !2).wrapping_add(immediate_value);
        let value = bus.read_word(address & !3);

        self.registers.set_register_at(destination_register, value);
        3
    }

    fn load_store_register_offset(
        &mut self,
        bus: &mut Bus,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset_register: u32,
        base_register: u32,
        source_destination_register: u32,
    ) -> u32 {
        let address = self
            .registers
            .register_at(base_register)
            .wrapping_add(self.registers.register_at(offset_register));

        self.load_store_at(
            bus,
            load_store,
            byte_word,
            address,
            source_destination_register,
        )
    }

    fn load_store_immediate_offset(
        &mut self,
        bus: &mut Bus,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset: u32,
        base_register: u32,
        source_destination_register: u32,
    ) -> u32 {
        let address = self
            .registers
            .register_at(base_register)
            .wrapping_add(offset);

        self.load_store_at(
            bus,
            load_store,
            byte_word,
            address,
            source_destination_register,
        )
    }

    /// Shared body of the Thumb byte/word load-store formats.
    fn load_store_at(
        &mut self,
        bus: &mut Bus,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        address: u32,
        source_destination_register: u32,
    ) -> u32 {
        match load_store {
            LoadStoreKind::Load => {
                let value = match byte_word {
                    ReadWriteKind::Byte => bus.read_byte(address).into(),
                    ReadWriteKind::Word => Self::read_word_rotated(bus, address),
                };
                self.registers
                    .set_register_at(source_destination_register, value);
                3
            }
            LoadStoreKind::Store => {
                let value = self.registers.register_at(source_destination_register);
                match byte_word {
                    ReadWriteKind::Byte => bus.write_byte(address, value as u8),
                    ReadWriteKind::Word => bus.write_word(address & !3, value),
                }
                2
            }
        }
    }

    fn load_store_sign_extended(
        &mut self,
        bus: &mut Bus,
        halfword: bool,
        sign_extend: bool,
        offset_register: u32,
        base_register: u32,
        source_destination_register: u32,
    ) -> u32 {
        let address = self
            .registers
            .register_at(base_register)
            .wrapping_add(self.registers.register_at(offset_register));

        match (sign_extend, halfword) {
            (false, false) => {
                // STRH
                let value = self.registers.register_at(source_destination_register);
                bus.write_half_word(address & !1, value as u16);
                2
            }
            (false, true) => {
                // LDRH with rotated misaligned read.
                let value = if address.get_bit(0) {
                    u32::from(bus.read_half_word(address & !1)).rotate_right(8)
                } else {
                    bus.read_half_word(address).into()
                };
                self.registers
                    .set_register_at(source_destination_register, value);
                3
            }
            (true, false) => {
                // LDSB
                let value = bus.read_byte(address) as i8 as u32;
                self.registers
                    .set_register_at(source_destination_register, value);
                3
            }
            (true, true) => {
                // LDSH; a misaligned address degrades to a sign-extended
                // byte load.
                let value = if address.get_bit(0) {
                    bus.read_byte(address) as i8 as u32
                } else {
                    bus.read_half_word(address) as i16 as u32
                };
                self.registers
                    .set_register_at(source_destination_register, value);
                3
            }
        }
    }

    fn load_store_halfword(
        &mut self,
        bus: &mut Bus,
        load_store: LoadStoreKind,
        offset: u32,
        base_register: u32,
        source_destination_register: u32,
    ) -> u32 {
        let address = self
            .registers
            .register_at(base_register)
            .wrapping_add(offset);

        match load_store {
            LoadStoreKind::Load => {
                let value = if address.get_bit(0) {
                    u32::from(bus.read_half_word(address & !1)).rotate_right(8)
                } else {
                    bus.read_half_word(address).into()
                };
                self.registers
                    .set_register_at(source_destination_register, value);
                3
            }
            LoadStoreKind::Store => {
                let value = self.registers.register_at(source_destination_register);
                bus.write_half_word(address & !1, value as u16);
                2
            }
        }
    }

    fn sp_relative_load_store(
        &mut self,
        bus: &mut Bus,
        load_store: LoadStoreKind,
        destination_register: u32,
        word8: u32,
    ) -> u32 {
        let address = self.registers.register_at(REG_SP).wrapping_add(word8);

        match load_store {
            LoadStoreKind::Load => {
                let value = Self::read_word_rotated(bus, address);
                self.registers.set_register_at(destination_register, value);
                3
            }
            LoadStoreKind::Store => {
                let value = self.registers.register_at(destination_register);
                bus.write_word(address & !3, value);
                2
            }
        }
    }

    fn load_address(&mut self, sp: bool, destination_register: u32, offset: u32) -> u32 {
        let base = if sp {
            self.registers.register_at(REG_SP)
        } else {
            self.registers.program_counter() & !2
        };

        self.registers
            .set_register_at(destination_register, base.wrapping_add(offset));
        1
    }

    fn add_offset_sp(&mut self, negative: bool, word7: u32) -> u32 {
        let sp = self.registers.register_at(REG_SP);
        let new_sp = if negative {
            sp.wrapping_sub(word7)
        } else {
            sp.wrapping_add(word7)
        };

        self.registers.set_register_at(REG_SP, new_sp);
        1
    }

    fn push_pop_register(
        &mut self,
        bus: &mut Bus,
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    ) -> u32 {
        let count = register_list.count_ones() + u32::from(pc_lr);

        match load_store {
            LoadStoreKind::Load => {
                // POP: loads from SP upward, SP ends past the block.
                let mut address = self.registers.register_at(REG_SP);

                for i in 0..8 {
                    if register_list.get_bit(i) {
                        let value = bus.read_word(address & !3);
                        self.registers.set_register_at(i.into(), value);
                        address = address.wrapping_add(4);
                    }
                }

                let mut cycles = count + 2;

                if pc_lr {
                    let value = bus.read_word(address & !3);
                    self.registers.set_program_counter(value & !1);
                    address = address.wrapping_add(4);
                    self.flush_pipeline();
                    cycles += 1;
                }

                self.registers.set_register_at(REG_SP, address);
                cycles
            }
            LoadStoreKind::Store => {
                // PUSH: pre-decrements SP by the block size.
                let mut address = self
                    .registers
                    .register_at(REG_SP)
                    .wrapping_sub(count * 4);
                self.registers.set_register_at(REG_SP, address);

                for i in 0..8 {
                    if register_list.get_bit(i) {
                        bus.write_word(address & !3, self.registers.register_at(i.into()));
                        address = address.wrapping_add(4);
                    }
                }

                if pc_lr {
                    bus.write_word(address & !3, self.registers.register_at(REG_LR));
                }

                count.max(1) + 1
            }
        }
    }

    fn multiple_load_store(
        &mut self,
        bus: &mut Bus,
        load_store: LoadStoreKind,
        base_register: u32,
        register_list: u16,
    ) -> u32 {
        let mut address = self.registers.register_at(base_register);
        let count = register_list.count_ones();

        // Empty register list quirk: R15 is transferred and the base
        // advances by 0x40.
        if count == 0 {
            match load_store {
                LoadStoreKind::Load => {
                    let value = bus.read_word(address & !3);
                    self.registers.set_program_counter(value & !1);
                    self.flush_pipeline();
                }
                LoadStoreKind::Store => {
                    // PC stores as executing address + 6.
                    let value = self.registers.program_counter().wrapping_add(2);
                    bus.write_word(address & !3, value);
                }
            }
            self.registers
                .set_register_at(base_register, address.wrapping_add(0x40));
            return 3;
        }

        match load_store {
            LoadStoreKind::Load => {
                let base_in_list = register_list.get_bit(base_register as u8);

                for i in 0..8 {
                    if register_list.get_bit(i) {
                        let value = bus.read_word(address & !3);
                        self.registers.set_register_at(i.into(), value);
                        address = address.wrapping_add(4);
                    }
                }

                // Writeback only when the base is not in the list.
                if !base_in_list {
                    self.registers.set_register_at(base_register, address);
                }

                count + 2
            }
            LoadStoreKind::Store => {
                let new_base = address.wrapping_add(count * 4);

                // If the base is in the list but not the first entry, the
                // written-back base value is stored.
                let below_base_mask = (1_u16 << base_register).wrapping_sub(1);
                let base_is_first = register_list.get_bit(base_register as u8)
                    && register_list & below_base_mask == 0;

                for i in 0..8_u32 {
                    if !register_list.get_bit(i as u8) {
                        continue;
                    }

                    let value = if i == base_register && !base_is_first {
                        new_base
                    } else {
                        self.registers.register_at(i)
                    };
                    bus.write_word(address & !3, value);
                    address = address.wrapping_add(4);
                }

                self.registers.set_register_at(base_register, new_base);

                count.max(1) + 1
            }
        }
    }

    fn cond_branch(&mut self, condition: crate::cpu::condition::Condition, offset: i32) -> u32 {
        if !self.cpsr.can_execute(condition) {
            return 1;
        }

        let pc = self.registers.program_counter();
        self.registers
            .set_program_counter(pc.wrapping_add(offset as u32));
        self.flush_pipeline();
        3
    }

    fn uncond_branch(&mut self, offset: i32) -> u32 {
        let pc = self.registers.program_counter();
        self.registers
            .set_program_counter(pc.wrapping_add(offset as u32));
        self.flush_pipeline();
        3
    }

    fn long_branch_link(&mut self, high: bool, offset: u32) -> u32 {
        if high {
            // Second half: jump to LR + (offset << 1), LR takes the return
            // address with bit 0 set.
            let next_instruction = self.registers.program_counter().wrapping_sub(2);
            let target = self
                .registers
                .register_at(REG_LR)
                .wrapping_add(offset << 1);

            self.registers.set_program_counter(target & !1);
            self.registers
                .set_register_at(REG_LR, next_instruction | 1);
            self.flush_pipeline();
            3
        } else {
            // First half: LR accumulates the sign-extended upper offset.
            let mut upper = offset as i32;
            if offset.get_bit(10) {
                upper |= !0x7FF;
            }

            let lr = self
                .registers
                .program_counter()
                .wrapping_add((upper << 12) as u32);
            self.registers.set_register_at(REG_LR, lr);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::Bus;
    use crate::cpu::arm7tdmi::Arm7tdmi;
    use crate::cpu::psr::CpuState;
    use crate::cpu::thumb::ThumbOpcode;

    fn execute(cpu: &mut Arm7tdmi, bus: &mut Bus, raw: u16) -> u32 {
        let op = ThumbOpcode::from(raw);
        cpu.execute_thumb(bus, &op)
    }

    #[test]
    fn check_lsl_carry_out() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(1, 0x8000_0001);

        // LSL R0, R1, #1
        execute(&mut cpu, &mut bus, 0x0048);

        assert_eq!(cpu.registers.register_at(0), 0x0000_0002);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn check_add_subtract_flags() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(1, 5);
        cpu.registers.set_register_at(2, 5);

        // SUB R0, R1, R2
        execute(&mut cpu, &mut bus, 0x1A88);

        assert_eq!(cpu.registers.register_at(0), 0);
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn check_mov_imm() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();

        // MOV R3, #0xFF
        execute(&mut cpu, &mut bus, 0x23FF);

        assert_eq!(cpu.registers.register_at(3), 0xFF);
        assert!(!cpu.cpsr.zero_flag());
        assert!(!cpu.cpsr.sign_flag());
    }

    #[test]
    fn check_alu_neg() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(1, 1);

        // NEG R0, R1
        execute(&mut cpu, &mut bus, 0x4248);

        assert_eq!(cpu.registers.register_at(0), u32::MAX);
        assert!(cpu.cpsr.sign_flag());
    }

    #[test]
    fn check_hi_reg_add_to_pc_flushes() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_program_counter(0x0800_0004);
        cpu.registers.set_register_at(0, 0x10);

        // ADD PC, R0
        execute(&mut cpu, &mut bus, 0x4487);

        assert_eq!(cpu.registers.program_counter(), 0x0800_0014);
        assert!(!cpu.pipeline_valid());
    }

    #[test]
    fn check_bx_to_arm() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.registers.set_register_at(0, 0x0800_0100);

        // BX R0
        execute(&mut cpu, &mut bus, 0x4700);

        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0100);
    }

    #[test]
    fn check_pc_relative_load() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        bus.write_word(0x0300_0008, 0x1234_5678);
        cpu.registers.set_program_counter(0x0300_0002);

        // LDR R0, [PC, #8]
        execute(&mut cpu, &mut bus, 0x4802);

        assert_eq!(cpu.registers.register_at(0), 0x1234_5678);
    }

    #[test]
    fn check_push_pop_roundtrip() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(13, 0x0300_0100);
        cpu.registers.set_register_at(0, 0xAAAA);
        cpu.registers.set_register_at(1, 0xBBBB);

        // PUSH {R0, R1}
        execute(&mut cpu, &mut bus, 0xB403);
        assert_eq!(cpu.registers.register_at(13), 0x0300_00F8);

        cpu.registers.set_register_at(0, 0);
        cpu.registers.set_register_at(1, 0);

        // POP {R0, R1}
        execute(&mut cpu, &mut bus, 0xBC03);
        assert_eq!(cpu.registers.register_at(0), 0xAAAA);
        assert_eq!(cpu.registers.register_at(1), 0xBBBB);
        assert_eq!(cpu.registers.register_at(13), 0x0300_0100);
    }

    #[test]
    fn check_pop_pc_flushes() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(13, 0x0300_0200);
        bus.write_word(0x0300_0200, 0x0800_0101);

        // POP {PC}
        execute(&mut cpu, &mut bus, 0xBD00);

        assert_eq!(cpu.registers.program_counter(), 0x0800_0100);
        assert!(!cpu.pipeline_valid());
        assert_eq!(cpu.registers.register_at(13), 0x0300_0204);
    }

    #[test]
    fn check_stmia_base_not_first_stores_new_base() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(0, 0x4242);
        cpu.registers.set_register_at(1, 0x0300_0000);

        // STMIA R1!, {R0, R1}
        execute(&mut cpu, &mut bus, 0xC103);

        assert_eq!(bus.read_word(0x0300_0000), 0x4242);
        assert_eq!(bus.read_word(0x0300_0004), 0x0300_0008);
        assert_eq!(cpu.registers.register_at(1), 0x0300_0008);
    }

    #[test]
    fn check_long_branch_link_pair() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_program_counter(0x0800_0004);

        // BL part one: upper offset 0.
        execute(&mut cpu, &mut bus, 0xF000);
        assert_eq!(cpu.registers.register_at(14), 0x0800_0004);

        // Simulate the pipeline advance between the two halves.
        cpu.registers.set_program_counter(0x0800_0006);

        // BL part two: low offset 4 words.
        execute(&mut cpu, &mut bus, 0xF804);

        assert_eq!(cpu.registers.program_counter(), 0x0800_000C);
        assert_eq!(cpu.registers.register_at(14), 0x0800_0005);
        assert!(!cpu.pipeline_valid());
    }

    #[test]
    fn check_cond_branch_not_taken_cost() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        // Z clear: BEQ not taken.
        let cycles = execute(&mut cpu, &mut bus, 0xD0FE);
        assert_eq!(cycles, 1);
    }

    #[test]
    fn check_sp_relative_store() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_register_at(13, 0x0300_0080);
        cpu.registers.set_register_at(2, 0xFEED);

        // STR R2, [SP, #4]
        execute(&mut cpu, &mut bus, 0x9201);
        assert_eq!(bus.read_word(0x0300_0084), 0xFEED);
    }
}
