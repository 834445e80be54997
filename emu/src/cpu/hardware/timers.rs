use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::irq_bits;

const PRESCALER_VALUES: [u32; 4] = [1, 64, 256, 1024];

const TIMER_IRQ_BITS: [u16; 4] = [
    irq_bits::TIMER0,
    irq_bits::TIMER1,
    irq_bits::TIMER2,
    irq_bits::TIMER3,
];

/// One of the four 16-bit timers.
#[derive(Serialize, Deserialize)]
pub struct Timer {
    pub counter: u16,
    pub reload: u16,
    /// The raw TMxCNT_H word, kept for MMIO reads.
    pub control: u16,
    prescaler: u32,
    cascade: bool,
    irq_enable: bool,
    enabled: bool,
    prescaler_counter: u32,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            counter: 0,
            reload: 0,
            control: 0,
            prescaler: 1,
            cascade: false,
            irq_enable: false,
            enabled: false,
            prescaler_counter: 0,
        }
    }
}

/// What a batch of timer ticks produced: IF bits to raise and, for the
/// audio FIFO clocking, how many times each timer overflowed.
#[derive(Default)]
pub struct TimersTickOutput {
    pub irq_bits: u16,
    pub overflows: [u16; 4],
}

#[derive(Default, Serialize, Deserialize)]
pub struct Timers {
    timers: [Timer; 4],
}

impl Timers {
    /// The live counter value, read through TMxCNT_L.
    #[must_use]
    pub fn read_counter(&self, index: usize) -> u16 {
        self.timers[index].counter
    }

    #[must_use]
    pub fn read_control(&self, index: usize) -> u16 {
        self.timers[index].control
    }

    /// A TMxCNT_L write sets the reload value, not the counter.
    pub fn write_reload(&mut self, index: usize, value: u16) {
        self.timers[index].reload = value;
    }

    /// On a rising edge of the enable bit the counter restarts from the
    /// reload value and the prescaler accumulator clears.
    pub fn write_control(&mut self, index: usize, value: u16) {
        let timer = &mut self.timers[index];
        let was_enabled = timer.enabled;

        timer.control = value;
        timer.prescaler = PRESCALER_VALUES[(value & 3) as usize];
        timer.cascade = value.get_bit(2);
        timer.irq_enable = value.get_bit(6);
        timer.enabled = value.get_bit(7);

        if !was_enabled && timer.enabled {
            timer.counter = timer.reload;
            timer.prescaler_counter = 0;
        }
    }

    /// Deliver a batch of CPU cycles to the non-cascade timers.
    pub fn tick(&mut self, cycles: u32) -> TimersTickOutput {
        let mut output = TimersTickOutput::default();

        for i in 0..4 {
            if !self.timers[i].enabled || self.timers[i].cascade {
                continue;
            }

            self.timers[i].prescaler_counter += cycles;

            while self.timers[i].prescaler_counter >= self.timers[i].prescaler {
                self.timers[i].prescaler_counter -= self.timers[i].prescaler;

                let (counter, overflowed) = self.timers[i].counter.overflowing_add(1);
                self.timers[i].counter = counter;

                if overflowed {
                    self.overflow(i, &mut output);
                }
            }
        }

        output
    }

    /// Handle an overflow of timer `index`: reload, raise the IRQ flag,
    /// record the event for the audio mixer, then walk the cascade chain.
    fn overflow(&mut self, index: usize, output: &mut TimersTickOutput) {
        self.timers[index].counter = self.timers[index].reload;

        if self.timers[index].irq_enable {
            output.irq_bits |= TIMER_IRQ_BITS[index];
        }

        output.overflows[index] += 1;

        // The chain stops at the first timer that is not enabled-and-cascade.
        let mut next = index + 1;
        while next < 4 && self.timers[next].enabled && self.timers[next].cascade {
            let (counter, overflowed) = self.timers[next].counter.overflowing_add(1);
            self.timers[next].counter = counter;

            if !overflowed {
                break;
            }

            self.timers[next].counter = self.timers[next].reload;
            if self.timers[next].irq_enable {
                output.irq_bits |= TIMER_IRQ_BITS[next];
            }
            output.overflows[next] += 1;

            next += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_rising_edge_reloads_counter() {
        let mut timers = Timers::default();
        timers.write_reload(0, 0xFF00);

        timers.write_control(0, 0x0080);
        assert_eq!(timers.read_counter(0), 0xFF00);

        // Writing control again with enable still set does not reload.
        timers.tick(4);
        let before = timers.read_counter(0);
        timers.write_control(0, 0x0080);
        assert_eq!(timers.read_counter(0), before);
    }

    #[test]
    fn prescaler_divides_cycles() {
        let mut timers = Timers::default();
        timers.write_reload(0, 0);
        // Prescaler 64, enabled.
        timers.write_control(0, 0x0081);

        timers.tick(63);
        assert_eq!(timers.read_counter(0), 0);

        timers.tick(1);
        assert_eq!(timers.read_counter(0), 1);
    }

    #[test]
    fn overflow_raises_irq_bit() {
        let mut timers = Timers::default();
        timers.write_reload(0, 0xFFFF);
        // Prescaler 1, IRQ enable, enable.
        timers.write_control(0, 0x00C0);

        let output = timers.tick(3);
        assert!(output.irq_bits & irq_bits::TIMER0 != 0);
        assert_eq!(output.overflows[0], 3);
        assert_eq!(timers.read_counter(0), 0xFFFF);
    }

    #[test]
    fn cascade_counts_overflows_of_previous_timer() {
        let mut timers = Timers::default();
        timers.write_reload(0, 0xFFFE);
        timers.write_control(0, 0x0080);
        // Timer 1: cascade + enable.
        timers.write_control(1, 0x0084);

        // Timer 0 overflows every 2 cycles, so 4 cycles bump timer 1 twice.
        timers.tick(4);
        assert_eq!(timers.read_counter(1), 2);
    }

    #[test]
    fn cascade_chain_stops_at_non_cascade_timer() {
        let mut timers = Timers::default();
        timers.write_reload(0, 0xFFFF);
        timers.write_control(0, 0x0080);
        timers.write_reload(1, 0xFFFF);
        timers.write_control(1, 0x0084);
        // Timer 2 enabled but NOT cascade: the chain must not touch it.
        timers.write_control(2, 0x0080);

        timers.tick(1);
        assert_eq!(timers.read_counter(1), 0xFFFF);
        // Timer 2 ran on its own prescaler instead.
        assert_eq!(timers.read_counter(2), 1);
    }

    #[test]
    fn cascade_timer_ignores_direct_cycles() {
        let mut timers = Timers::default();
        timers.write_control(1, 0x0084);

        timers.tick(1000);
        assert_eq!(timers.read_counter(1), 0);
    }
}
