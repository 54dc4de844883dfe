//! CHIP-8 core.
//!
//! Interpreter, assembler and disassembler for the CHIP-8 virtual
//! machine: 4 KiB of memory, sixteen 8-bit registers, a 16-level call
//! stack, two 60 Hz timers, a 64x32 XOR-sprite framebuffer and a
//! 16-key hex keypad. Front-ends drive the machine exclusively through
//! the CPU's public state and lifecycle operations.

#![warn(missing_docs)]

pub mod asm;
pub mod core;
pub mod debugger;
pub mod disassembler;
pub mod emulator;
pub mod errors;
pub mod peripherals;
