//! The ARM7TDMI processor and the memory-mapped hardware it drives.
//!
//! - [`arm7tdmi`] - the CPU itself: fetch/decode/execute, modes, exceptions
//! - [`arm`] / [`thumb`] - the two instruction sets
//! - [`psr`], [`condition`], [`cpu_modes`], [`registers`], [`register_bank`] -
//!   processor state
//! - [`alu`] - the barrel shifter and flag arithmetic
//! - [`hardware`] - LCD, sound, DMA, timers, keypad and interrupt controller

pub mod alu;
pub mod arm;

#[allow(clippy::cast_possible_truncation)]
pub mod arm7tdmi;
pub mod condition;
pub mod cpu_modes;
pub mod flags;

#[allow(clippy::cast_possible_truncation)]
pub mod hardware;
pub mod psr;
pub mod register_bank;
pub mod registers;
pub mod thumb;
