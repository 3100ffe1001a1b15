// Instruction set
mod isa;
pub use isa::{BinOp, JumpCond, Op, Operand, Register, Slot, UnOp, MEMORY_SIZE, NOP};

// Assembling
mod parser;
pub use parser::{parse_hex, Span};
mod assembler;
pub use assembler::{assemble, Assembly, LabelTable, ListingLine};

// Running
mod runtime;
pub use runtime::{Flag, RunState};
mod output;
pub use output::{format_dump, format_listing, report, DumpRange};

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
