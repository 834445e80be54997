use logger::log;
use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::cpu::arm::ArmOpcode;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{Registers, REG_LR, REG_SP};
use crate::cpu::thumb::ThumbOpcode;

/// IRQ exception vector.
const IRQ_VECTOR: u32 = 0x0000_0018;

/// SWI exception vector.
const SWI_VECTOR: u32 = 0x0000_0008;

/// Fixed cost of refilling the two-slot prefetch after a flush.
const PIPELINE_REFILL_CYCLES: u32 = 2;

/// The ARM7TDMI interpreter.
///
/// The prefetch is modeled as a two-slot pipeline: `pipeline[0]` is the
/// instruction about to execute, `pipeline[1]` the prefetched next one, and
/// R15 points at the *next fetch* address (executing address + 8 in ARM
/// state, + 4 in Thumb). A flush invalidates both slots; the next step
/// refills them before anything executes.
#[derive(Serialize, Deserialize)]
pub struct Arm7tdmi {
    pub cpsr: Psr,
    /// The active mode's saved program status register. The inactive modes'
    /// copies live in [`RegisterBank`]; `swap_mode` moves them around.
    pub spsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,

    pipeline: [u32; 2],
    pipeline_valid: bool,

    /// Set by a HALTCNT write; cleared when an enabled interrupt arrives.
    pub halted: bool,

    /// Whether a real BIOS image is loaded. Without one, SWIs run against
    /// the HLE stub vectors installed by [`Self::skip_bios`].
    has_bios: bool,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        let mut cpsr = Psr::from(Mode::Supervisor);
        cpsr.set_cpu_state(CpuState::Arm);
        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);

        let mut registers = Registers::default();
        // Default SVC stack; the BIOS (or skip_bios) overwrites it.
        registers.set_register_at(REG_SP, 0x0300_7FE0);

        Self {
            cpsr,
            spsr: Psr::default(),
            registers,
            register_bank: RegisterBank::default(),
            pipeline: [0; 2],
            pipeline_valid: false,
            halted: false,
            has_bios: false,
        }
    }
}

impl Arm7tdmi {
    #[must_use]
    pub fn with_bios() -> Self {
        Self {
            has_bios: true,
            ..Self::default()
        }
    }

    pub fn flush_pipeline(&mut self) {
        self.pipeline_valid = false;
    }

    #[must_use]
    pub const fn pipeline_valid(&self) -> bool {
        self.pipeline_valid
    }

    /// Re-align R15 to the current state's instruction size.
    pub(crate) fn align_program_counter(&mut self) {
        let mask = match self.cpsr.cpu_state() {
            CpuState::Arm => !3,
            CpuState::Thumb => !1,
        };
        let pc = self.registers.program_counter();
        self.registers.set_program_counter(pc & mask);
    }

    /// Run until at least `budget` cycles are consumed, checking for pending
    /// interrupts between instruction boundaries. A halted CPU fast-forwards
    /// the remaining budget unless an interrupt wakes it.
    pub fn run(&mut self, bus: &mut Bus, budget: u32) -> u32 {
        let mut executed = 0;

        while executed < budget {
            bus.set_cpu_pc(self.registers.program_counter());

            // DMA armed by the previous instruction runs before the next
            // instruction starts; its cost lands on this slice.
            executed += bus.service_pending_dma();

            if bus.take_halt_request() {
                self.halted = true;
            }

            let irq_pending = !self.cpsr.irq_disable() && bus.interrupts_pending();

            if self.halted {
                if irq_pending {
                    // Wake up; the interrupt is taken at the next valid
                    // instruction boundary below.
                    self.halted = false;
                } else {
                    // Stay halted: burn the rest of the budget.
                    executed = budget;
                    break;
                }
            }

            // Interrupt entry needs a valid pipeline so LR_irq gets the
            // documented value; right after a flush the refill step runs
            // first and the interrupt is taken one boundary later.
            if irq_pending && self.pipeline_valid {
                self.handle_irq();
            }

            executed += self.step(bus);
        }

        executed
    }

    /// Execute a single pipeline step: either a refill after a flush, or
    /// one instruction followed by the prefetch advance.
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        if !self.pipeline_valid {
            self.refill_pipeline(bus);
            return PIPELINE_REFILL_CYCLES;
        }

        match self.cpsr.cpu_state() {
            CpuState::Thumb => {
                let op_code = ThumbOpcode::from(self.pipeline[0] as u16);
                log(format!(
                    "{:#010X}: {op_code}",
                    self.registers.program_counter().wrapping_sub(4)
                ));

                let cycles = self.execute_thumb(bus, &op_code);

                if self.pipeline_valid {
                    self.pipeline[0] = self.pipeline[1];
                    self.pipeline[1] = bus
                        .read_half_word(self.registers.program_counter())
                        .into();
                    self.registers
                        .advance_program_counter(super::thumb::operations::SIZE_OF_INSTRUCTION);
                }

                cycles
            }
            CpuState::Arm => {
                let op_code = ArmOpcode::from(self.pipeline[0]);

                let cycles = if self.cpsr.can_execute(op_code.condition) {
                    log(format!(
                        "{:#010X}: {op_code}",
                        self.registers.program_counter().wrapping_sub(8)
                    ));
                    self.execute_arm(bus, &op_code)
                } else {
                    // A failed predicate costs one sequential cycle.
                    1
                };

                if self.pipeline_valid {
                    self.pipeline[0] = self.pipeline[1];
                    self.pipeline[1] = bus.read_word(self.registers.program_counter());
                    self.registers
                        .advance_program_counter(super::arm::operations::SIZE_OF_INSTRUCTION);
                }

                cycles
            }
        }
    }

    fn refill_pipeline(&mut self, bus: &mut Bus) {
        match self.cpsr.cpu_state() {
            CpuState::Thumb => {
                let pc = self.registers.program_counter() & !1;
                self.pipeline[0] = bus.read_half_word(pc).into();
                self.pipeline[1] = bus.read_half_word(pc.wrapping_add(2)).into();
                self.registers.set_program_counter(pc.wrapping_add(4));
            }
            CpuState::Arm => {
                let pc = self.registers.program_counter() & !3;
                self.pipeline[0] = bus.read_word(pc);
                self.pipeline[1] = bus.read_word(pc.wrapping_add(4));
                self.registers.set_program_counter(pc.wrapping_add(8));
            }
        }

        self.pipeline_valid = true;
    }

    /// Switch operating mode, saving the outgoing mode's banked registers
    /// and loading the incoming mode's. No-op when the mode is unchanged.
    pub fn swap_mode(&mut self, new_mode: Mode) {
        if self.cpsr.mode() == new_mode {
            return;
        }

        match self.cpsr.mode() {
            // Leaving FIQ stores r8-r14 and the SPSR, and brings back the
            // parked user r8-r12.
            Mode::Fiq => {
                self.register_bank.r8_fiq = self.registers.register_at(8);
                self.register_bank.r9_fiq = self.registers.register_at(9);
                self.register_bank.r10_fiq = self.registers.register_at(10);
                self.register_bank.r11_fiq = self.registers.register_at(11);
                self.register_bank.r12_fiq = self.registers.register_at(12);
                self.register_bank.r13_fiq = self.registers.register_at(13);
                self.register_bank.r14_fiq = self.registers.register_at(14);
                self.register_bank.spsr_fiq = self.spsr;

                self.registers.set_register_at(8, self.register_bank.r8_old);
                self.registers.set_register_at(9, self.register_bank.r9_old);
                self.registers
                    .set_register_at(10, self.register_bank.r10_old);
                self.registers
                    .set_register_at(11, self.register_bank.r11_old);
                self.registers
                    .set_register_at(12, self.register_bank.r12_old);
            }
            // Leaving System or User parks r13-r14.
            Mode::System | Mode::User => {
                self.register_bank.r13_old = self.registers.register_at(13);
                self.register_bank.r14_old = self.registers.register_at(14);
            }
            Mode::Supervisor => {
                self.register_bank.r13_svc = self.registers.register_at(13);
                self.register_bank.r14_svc = self.registers.register_at(14);
                self.register_bank.spsr_svc = self.spsr;
            }
            Mode::Abort => {
                self.register_bank.r13_abt = self.registers.register_at(13);
                self.register_bank.r14_abt = self.registers.register_at(14);
                self.register_bank.spsr_abt = self.spsr;
            }
            Mode::Irq => {
                self.register_bank.r13_irq = self.registers.register_at(13);
                self.register_bank.r14_irq = self.registers.register_at(14);
                self.register_bank.spsr_irq = self.spsr;
            }
            Mode::Undefined => {
                self.register_bank.r13_und = self.registers.register_at(13);
                self.register_bank.r14_und = self.registers.register_at(14);
                self.register_bank.spsr_und = self.spsr;
            }
        }

        match new_mode {
            // Entering FIQ parks user r8-r12 and restores the FIQ bank.
            Mode::Fiq => {
                self.register_bank.r8_old = self.registers.register_at(8);
                self.register_bank.r9_old = self.registers.register_at(9);
                self.register_bank.r10_old = self.registers.register_at(10);
                self.register_bank.r11_old = self.registers.register_at(11);
                self.register_bank.r12_old = self.registers.register_at(12);

                self.registers.set_register_at(8, self.register_bank.r8_fiq);
                self.registers.set_register_at(9, self.register_bank.r9_fiq);
                self.registers
                    .set_register_at(10, self.register_bank.r10_fiq);
                self.registers
                    .set_register_at(11, self.register_bank.r11_fiq);
                self.registers
                    .set_register_at(12, self.register_bank.r12_fiq);
                self.registers
                    .set_register_at(13, self.register_bank.r13_fiq);
                self.registers
                    .set_register_at(14, self.register_bank.r14_fiq);

                self.spsr = self.register_bank.spsr_fiq;
            }
            Mode::System | Mode::User => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_old);
                self.registers
                    .set_register_at(14, self.register_bank.r14_old);
            }
            Mode::Supervisor => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_svc);
                self.registers
                    .set_register_at(14, self.register_bank.r14_svc);
                self.spsr = self.register_bank.spsr_svc;
            }
            Mode::Abort => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_abt);
                self.registers
                    .set_register_at(14, self.register_bank.r14_abt);
                self.spsr = self.register_bank.spsr_abt;
            }
            Mode::Irq => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_irq);
                self.registers
                    .set_register_at(14, self.register_bank.r14_irq);
                self.spsr = self.register_bank.spsr_irq;
            }
            Mode::Undefined => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_und);
                self.registers
                    .set_register_at(14, self.register_bank.r14_und);
                self.spsr = self.register_bank.spsr_und;
            }
        }

        self.cpsr.set_mode(new_mode);
    }

    /// Enter the IRQ exception.
    ///
    /// LR_irq takes the current R15 (executing address + 8 in ARM, + 4 in
    /// Thumb) so the handler returns with `SUBS PC, LR, #4`.
    pub fn handle_irq(&mut self) {
        let old_cpsr = self.cpsr;

        self.swap_mode(Mode::Irq);
        self.spsr = old_cpsr;

        self.registers
            .set_register_at(REG_LR, self.registers.program_counter());

        self.cpsr.set_irq_disable(true);
        self.cpsr.set_cpu_state(CpuState::Arm);
        self.registers.set_program_counter(IRQ_VECTOR);
        self.flush_pipeline();
    }

    /// Enter the SWI exception.
    ///
    /// LR_svc takes the address of the instruction after the SWI
    /// (R15 - 4 in ARM, R15 - 2 in Thumb).
    pub fn handle_swi(&mut self, comment: u32) {
        if !self.has_bios {
            // With no BIOS loaded the call lands on the HLE stub vector,
            // which returns straight to the caller.
            tracing::warn!("SWI {comment:#04X} with no BIOS loaded, the stub handler returns");
        }

        let old_cpsr = self.cpsr;
        let return_address = match self.cpsr.cpu_state() {
            CpuState::Arm => self.registers.program_counter().wrapping_sub(4),
            CpuState::Thumb => self.registers.program_counter().wrapping_sub(2),
        };

        self.swap_mode(Mode::Supervisor);
        self.spsr = old_cpsr;

        self.registers.set_register_at(REG_LR, return_address);
        self.cpsr.set_irq_disable(true);
        self.cpsr.set_cpu_state(CpuState::Arm);
        self.registers.set_program_counter(SWI_VECTOR);
        self.flush_pipeline();
    }

    /// Restore the CPSR from the current mode's SPSR (exception return).
    /// Silently skipped in User/System, which have no SPSR.
    pub(crate) fn exception_return(&mut self) {
        if !self.cpsr.mode().has_spsr() {
            return;
        }

        let spsr = self.spsr;
        self.swap_mode(spsr.mode());
        self.cpsr = spsr;
    }

    /// Put the CPU in the state the BIOS hands a cartridge: System mode,
    /// per-mode stacks installed, PC at the ROM entry point. Without a real
    /// BIOS image this also installs the HLE IRQ trampoline.
    pub fn skip_bios(&mut self, bus: &mut Bus) {
        // System mode, ARM state, interrupts enabled.
        self.swap_mode(Mode::System);
        self.cpsr = Psr::from(Mode::System);

        self.swap_mode(Mode::Irq);
        self.registers.set_register_at(REG_SP, 0x0300_7FA0);

        self.swap_mode(Mode::Supervisor);
        self.registers.set_register_at(REG_SP, 0x0300_7FE0);

        self.swap_mode(Mode::System);
        self.registers.set_register_at(REG_SP, 0x0300_7F00);

        self.registers.set_program_counter(0x0800_0000);

        if !self.has_bios {
            install_hle_bios_stubs(bus);
        }

        self.flush_pipeline();
        log("bios skipped, starting at 0x08000000");
    }
}

/// Install a minimal IRQ trampoline and SWI fallback into BIOS memory.
///
/// The IRQ vector must contain working ARM code when no BIOS image is
/// loaded: games expect the BIOS dispatcher to call their handler through
/// the pointer at 0x03FFFFFC and to return with `SUBS PC, LR, #4`.
fn install_hle_bios_stubs(bus: &mut Bus) {
    // SWI vector: return to the caller immediately.
    bus.write_bios_word(0x08, 0xE1B0_F00E); // MOVS PC, R14

    // IRQ vector: branch to the handler body.
    bus.write_bios_word(0x18, 0xEA00_0042); // B 0x128

    // Handler body. LDR PC (not BX) keeps the CPU in ARM state; game
    // handlers start in ARM, possibly with their own veneer to Thumb.
    let mut p = 0x128;
    for word in [
        0xE92D_500F, // STMFD SP!, {R0-R3, R12, LR}
        0xE3A0_0301, // MOV R0, #0x04000000
        0xE28F_E000, // ADD LR, PC, #0
        0xE510_F004, // LDR PC, [R0, #-4]
        0xE8BD_500F, // LDMFD SP!, {R0-R3, R12, LR}
        0xE25E_F004, // SUBS PC, LR, #4
    ] {
        bus.write_bios_word(p, word);
        p += 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::arm::ArmOpcode;

    #[test]
    fn check_default_state() {
        let cpu = Arm7tdmi::default();
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert!(cpu.cpsr.irq_disable());
        assert!(cpu.cpsr.fiq_disable());
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert!(!cpu.pipeline_valid());
    }

    #[test]
    fn check_pipeline_refill_cost_and_pc() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.registers.set_program_counter(0x0300_0000);

        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 2);
        assert!(cpu.pipeline_valid());
        // PC points at the next fetch: executing address + 8.
        assert_eq!(cpu.registers.program_counter(), 0x0300_0008);
    }

    #[test]
    fn check_fiq_banking_roundtrip() {
        let mut cpu = Arm7tdmi::default();
        cpu.swap_mode(Mode::System);

        for r in 8..=14_u32 {
            cpu.registers.set_register_at(r, 0x100 + r);
        }

        cpu.swap_mode(Mode::Fiq);
        for r in 8..=14_u32 {
            cpu.registers.set_register_at(r, 0xF00 + r);
        }

        cpu.swap_mode(Mode::System);
        for r in 8..=14_u32 {
            assert_eq!(cpu.registers.register_at(r), 0x100 + r);
        }

        // The FIQ values survive in the bank.
        cpu.swap_mode(Mode::Fiq);
        for r in 8..=14_u32 {
            assert_eq!(cpu.registers.register_at(r), 0xF00 + r);
        }
    }

    #[test]
    fn check_privileged_banking_roundtrip() {
        let mut cpu = Arm7tdmi::default();
        cpu.swap_mode(Mode::System);
        cpu.registers.set_register_at(13, 0xCAFE);
        cpu.registers.set_register_at(14, 0xBABE);

        for mode in [Mode::Supervisor, Mode::Abort, Mode::Irq, Mode::Undefined] {
            cpu.swap_mode(mode);
            cpu.registers.set_register_at(13, 0xDEAD);
            cpu.registers.set_register_at(14, 0xBEEF);
            cpu.swap_mode(Mode::System);

            assert_eq!(cpu.registers.register_at(13), 0xCAFE);
            assert_eq!(cpu.registers.register_at(14), 0xBABE);
        }
    }

    #[test]
    fn check_mode_switch_identity_on_low_registers() {
        let mut cpu = Arm7tdmi::default();
        for r in 0..8_u32 {
            cpu.registers.set_register_at(r, r * 3 + 1);
        }

        cpu.swap_mode(Mode::Fiq);
        cpu.swap_mode(Mode::Irq);
        cpu.swap_mode(Mode::Supervisor);

        for r in 0..8_u32 {
            assert_eq!(cpu.registers.register_at(r), r * 3 + 1);
        }
    }

    #[test]
    fn check_irq_entry_and_return() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();

        // Pretend we're a game running in System mode with flags set.
        cpu.swap_mode(Mode::System);
        cpu.cpsr.set_irq_disable(false);
        cpu.cpsr.set_carry_flag(true);
        cpu.registers.set_program_counter(0x0800_0108);
        let old_cpsr = cpu.cpsr;

        cpu.handle_irq();

        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert_eq!(cpu.spsr, old_cpsr);
        assert_eq!(cpu.registers.register_at(14), 0x0800_0108);
        assert!(cpu.cpsr.irq_disable());
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.registers.program_counter(), IRQ_VECTOR);
        assert!(!cpu.pipeline_valid());

        // SUBS PC, LR, #4 returns to the interrupted instruction and
        // restores the CPSR.
        let op = ArmOpcode::from(0xE25E_F004);
        cpu.execute_arm(&mut bus, &op);

        assert_eq!(cpu.registers.program_counter(), 0x0800_0104);
        assert_eq!(cpu.cpsr, old_cpsr);
        assert_eq!(cpu.cpsr.mode(), Mode::System);
    }

    #[test]
    fn check_swi_entry() {
        let mut cpu = Arm7tdmi::default();
        cpu.swap_mode(Mode::System);
        cpu.cpsr.set_irq_disable(false);
        cpu.registers.set_program_counter(0x0800_0208);

        cpu.handle_swi(0x0B);

        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.registers.register_at(14), 0x0800_0204);
        assert!(cpu.cpsr.irq_disable());
        assert_eq!(cpu.registers.program_counter(), SWI_VECTOR);
    }

    #[test]
    fn check_skip_bios_state() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();

        cpu.skip_bios(&mut bus);

        assert_eq!(cpu.cpsr.mode(), Mode::System);
        assert!(!cpu.cpsr.irq_disable());
        assert_eq!(cpu.registers.program_counter(), 0x0800_0000);
        assert_eq!(cpu.registers.register_at(13), 0x0300_7F00);
        assert_eq!(cpu.register_bank.r13_irq, 0x0300_7FA0);
        assert_eq!(cpu.register_bank.r13_svc, 0x0300_7FE0);

        // The HLE trampoline sits at the IRQ vector.
        bus.set_cpu_pc(0);
        assert_eq!(bus.read_word(0x18), 0xEA00_0042);
        assert_eq!(bus.read_word(0x128), 0xE92D_500F);
    }

    #[test]
    fn check_halted_cpu_consumes_budget() {
        let mut cpu = Arm7tdmi::default();
        let mut bus = Bus::default();
        cpu.halted = true;

        let executed = cpu.run(&mut bus, 960);
        assert_eq!(executed, 960);
        assert!(cpu.halted);
        // Nothing executed: PC untouched.
        assert_eq!(cpu.registers.program_counter(), 0);
    }
}
