//! Two-pass assembler: the first pass resolves label addresses by fully
//! sizing every instruction, the second pass encodes bytes into a 256-byte
//! memory image and builds the source-correlated listing.
//!
//! Instruction size depends on the matched addressing mode, which depends
//! on operand kinds, so the first pass performs full operand parsing
//! rather than token counting.

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::{bail, LabeledSpan, Result, Severity};

use crate::isa::{JumpCond, Op, Operand, BINARY_MODES, MEMORY_SIZE, NOP, UNARY_MODES};
use crate::parser::{self, ParsedLine, Span};

/// Label table in definition order: name -> resolved byte address.
pub type LabelTable = IndexMap<String, u8, FxBuildHasher>;

/// One instruction of the listing: where it was placed, the bytes it
/// encoded to, and the source line it came from. Consumed by drivers for
/// human-facing output only.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ListingLine {
    pub addr: u8,
    pub bytes: Vec<u8>,
    pub source: String,
}

/// Result of a successful assembly. Immutable from here on; the runtime
/// takes its own copy of the image, so repeated runs never observe a
/// previous run's writes.
pub struct Assembly {
    pub image: [u8; MEMORY_SIZE],
    pub labels: LabelTable,
    pub listing: Vec<ListingLine>,
    /// First address past the assembled code. Execution halts here.
    pub code_end: u16,
}

/// Assemble source text into a memory image, label table and listing.
/// Any syntax or semantic error aborts the whole assembly; no partial
/// image is ever produced.
pub fn assemble(src: &str) -> Result<Assembly> {
    assemble_inner(src).map_err(|e| e.with_source_code(src.to_string()))
}

fn assemble_inner(src: &str) -> Result<Assembly> {
    let lines = parser::preprocess(src);
    let parsed: Vec<ParsedLine> = lines.iter().map(parser::parse_line).collect();
    let labels = first_pass(&parsed)?;
    second_pass(&parsed, labels)
}

/// Walk lines in program order, recording each label at the running
/// address and advancing by each instruction's encoded size.
fn first_pass(parsed: &[ParsedLine]) -> Result<LabelTable> {
    let mut addr: u16 = 0;
    let mut labels = LabelTable::default();
    for line in parsed {
        if let Some(name) = line.label {
            if labels.contains_key(name) {
                bail!(
                    severity = Severity::Error,
                    code = "asm::duplicate_label",
                    help = "labels may only be defined once per program",
                    labels = vec![LabeledSpan::at(line.span, "duplicate label")],
                    "Duplicate label `{name}`",
                );
            }
            let Ok(pos) = u8::try_from(addr) else {
                bail!(
                    severity = Severity::Error,
                    code = "asm::too_large",
                    help = "the last addressable byte is FFH",
                    labels = vec![LabeledSpan::at(line.span, "out of range")],
                    "Label `{name}` falls outside the address space",
                );
            };
            labels.insert(name.to_string(), pos);
        }
        if let Some(mnemonic) = line.mnemonic.as_deref() {
            let size = instr_size(mnemonic, line)?;
            if addr + size > MEMORY_SIZE as u16 {
                bail!(
                    severity = Severity::Error,
                    code = "asm::too_large",
                    help = "the OKTO-8 address space is 256 bytes, shared by code and data",
                    labels = vec![LabeledSpan::at(line.span, "does not fit")],
                    "Program does not fit in {MEMORY_SIZE} bytes of memory",
                );
            }
            addr += size;
        }
    }
    Ok(labels)
}

/// Encoded size in bytes: jumps are always 2, nop is 1, everything else is
/// 1 plus a trailing byte when the matched addressing mode carries one.
fn instr_size(mnemonic: &str, line: &ParsedLine) -> Result<u16> {
    if JumpCond::from_mnemonic(mnemonic).is_some() {
        return Ok(2);
    }
    if mnemonic == "nop" {
        return Ok(1);
    }
    let (_, dst, src) = operands(mnemonic, line)?;
    let (_, extra) = find_mode(dst, src, line.span)?;
    Ok(1 + extra.is_some() as u16)
}

/// Resolve a line's argument tokens against its mnemonic's arity.
fn operands(mnemonic: &str, line: &ParsedLine) -> Result<(Op, Operand, Option<Operand>)> {
    let Some(op) = Op::from_mnemonic(mnemonic) else {
        bail!(
            severity = Severity::Error,
            code = "asm::unknown_mnemonic",
            help = "valid mnemonics are add, sub, cmp, and, or, mov, inc, dec, not, shr, shl, \
                    nop and the jump family jmp/jz/js/jc/jo/jp",
            labels = vec![LabeledSpan::at(line.span, "unknown mnemonic")],
            "Unknown instruction `{mnemonic}`",
        );
    };
    let expected = match op {
        Op::Unary(_) => 1,
        Op::Binary(_) => 2,
    };
    if line.args.len() != expected {
        bail!(
            severity = Severity::Error,
            code = "asm::arg_count",
            help = "check the number of operands for this instruction",
            labels = vec![LabeledSpan::at(line.span, "wrong operand count")],
            "`{mnemonic}` expects {expected} operand(s), found {}",
            line.args.len(),
        );
    }
    let dst = parser::parse_arg(line.args[0], line.span)?;
    let src = match op {
        Op::Binary(_) => Some(parser::parse_arg(line.args[1], line.span)?),
        Op::Unary(_) => None,
    };
    Ok((op, dst, src))
}

/// Scan the addressing-mode tables for a row matching the resolved
/// operands. The matching row's extra slot, if any, is filled with the
/// operand's value and becomes the instruction's trailing byte. Operand
/// combinations with no table row (e.g. two memory operands) fail here.
pub fn find_mode(dst: Operand, src: Option<Operand>, span: Span) -> Result<(u8, Option<u8>)> {
    match src {
        None => {
            for (mode, slot) in UNARY_MODES {
                if slot.matches(dst) {
                    return Ok((mode, None));
                }
            }
        }
        Some(src) => {
            for (mode, (d, s)) in BINARY_MODES.iter().enumerate() {
                if d.matches(dst) && s.matches(src) {
                    let extra = if d.has_extra() {
                        operand_value(dst)
                    } else if s.has_extra() {
                        operand_value(src)
                    } else {
                        None
                    };
                    return Ok((mode as u8, extra));
                }
            }
        }
    }
    let found = match src {
        Some(src) => format!("`{dst}`, `{src}`"),
        None => format!("`{dst}`"),
    };
    bail!(
        severity = Severity::Error,
        code = "asm::no_mode",
        help = "not every operand combination is encodable; \
                in particular two memory operands never are",
        labels = vec![LabeledSpan::at(span, "no matching addressing mode")],
        "No addressing mode matches {found}",
    )
}

/// Inline value of an operand destined for the trailing byte.
fn operand_value(operand: Operand) -> Option<u8> {
    match operand {
        Operand::Const(val) | Operand::Direct(val) => Some(val),
        Operand::Reg(_) | Operand::IndirectI => None,
    }
}

/// Re-walk the lines with a fresh address counter, encoding each
/// instruction into the image and appending its listing entry.
fn second_pass(parsed: &[ParsedLine], labels: LabelTable) -> Result<Assembly> {
    let mut image = [0u8; MEMORY_SIZE];
    let mut listing = Vec::new();
    let mut addr: u16 = 0;
    for line in parsed {
        let Some(mnemonic) = line.mnemonic.as_deref() else {
            continue;
        };
        let bytes = encode(mnemonic, line, &labels)?;
        let start = addr;
        for &byte in &bytes {
            // Bounds hold: the first pass sized this exact program
            image[addr as usize] = byte;
            addr += 1;
        }
        listing.push(ListingLine {
            addr: start as u8,
            bytes,
            source: line.text.to_string(),
        });
    }
    Ok(Assembly {
        image,
        labels,
        listing,
        code_end: addr,
    })
}

/// Encode one instruction to its concrete bytes.
fn encode(mnemonic: &str, line: &ParsedLine, labels: &LabelTable) -> Result<Vec<u8>> {
    if let Some(cond) = JumpCond::from_mnemonic(mnemonic) {
        let [target] = line.args.as_slice() else {
            bail!(
                severity = Severity::Error,
                code = "asm::arg_count",
                help = "jumps take exactly one label operand",
                labels = vec![LabeledSpan::at(line.span, "wrong operand count")],
                "`{mnemonic}` expects a single label operand",
            );
        };
        let Some(&addr) = labels.get(*target) else {
            bail!(
                severity = Severity::Error,
                code = "asm::undefined_label",
                help = "jump targets must be labels defined somewhere in the program",
                labels = vec![LabeledSpan::at(line.span, "undefined label")],
                "Undefined label `{target}`",
            );
        };
        return Ok(vec![cond.opcode(), addr]);
    }
    if mnemonic == "nop" {
        if !line.args.is_empty() {
            bail!(
                severity = Severity::Error,
                code = "asm::arg_count",
                help = "nop takes no operands",
                labels = vec![LabeledSpan::at(line.span, "unexpected operands")],
                "`nop` takes no operands",
            );
        }
        return Ok(vec![NOP]);
    }
    let (op, dst, src) = operands(mnemonic, line)?;
    let (mode, extra) = find_mode(dst, src, line.span)?;
    let mut bytes = vec![op.nibble() << 4 | mode];
    if let Some(extra) = extra {
        bytes.push(extra);
    }
    Ok(bytes)
}
