//! Text rendering of machine state: the register/flag report, memory
//! dumps with their ASCII companion row, and the assembly listing.

use lazy_static::lazy_static;
use miette::{bail, Result, Severity};
use regex::Regex;

use crate::assembler::ListingLine;
use crate::parser::parse_hex;
use crate::runtime::{Flag, RunState};
use crate::Register;

lazy_static! {
    /// Two dash-separated addresses of up to three hex digits, each with
    /// an optional trailing `H`/`h`.
    static ref DUMP_RE: Regex =
        Regex::new(r"^[0-9A-Fa-f]{1,3}[Hh]?-[0-9A-Fa-f]{1,3}[Hh]?$").unwrap();
}

/// An inclusive memory range for dumping. The range may wrap past the top
/// of memory, so `F0H-10H` covers F0H..FFH then 00H..10H.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DumpRange {
    pub start: u8,
    pub end: u8,
}

impl DumpRange {
    pub fn parse(arg: &str) -> Result<DumpRange> {
        if !DUMP_RE.is_match(arg) {
            bail!(
                severity = Severity::Error,
                code = "dump::range",
                help = "ranges are two hex addresses separated by a dash, like 10H-2FH",
                "Invalid dump range `{arg}`",
            );
        }
        let Some((start, end)) = arg.split_once('-') else {
            unreachable!("checked by DUMP_RE");
        };
        let (Some(start), Some(end)) = (parse_hex(start), parse_hex(end)) else {
            unreachable!("checked by DUMP_RE");
        };
        Ok(DumpRange { start, end })
    }

    /// Addresses covered by the range, in dump order.
    pub fn addrs(self) -> Vec<u8> {
        if self.start <= self.end {
            (self.start..=self.end).collect()
        } else {
            (self.start..=0xFF).chain(0..=self.end).collect()
        }
    }
}

pub fn format_regs(state: &RunState) -> String {
    format!(
        "A={:02X}H B={:02X}H I={:02X}H PC={:02X}H",
        state.reg(Register::A),
        state.reg(Register::B),
        state.reg(Register::I),
        state.pc(),
    )
}

pub fn format_flags(state: &RunState) -> String {
    format!(
        "OF={} CF={} ZF={} PF={} SF={}",
        state.flag(Flag::OF) as u8,
        state.flag(Flag::CF) as u8,
        state.flag(Flag::ZF) as u8,
        state.flag(Flag::PF) as u8,
        state.flag(Flag::SF) as u8,
    )
}

/// The end-of-run machine state report.
pub fn report(state: &RunState) -> String {
    format!("REGS:  {}\nFLAGS: {}", format_regs(state), format_flags(state))
}

/// A memory dump over the given range: one row of `addr:value` pairs and
/// one row of the same cells as ASCII, with `.` standing in for bytes
/// outside the printable range.
pub fn format_dump(state: &RunState, range: DumpRange) -> String {
    let addrs = range.addrs();
    let cells: Vec<String> = addrs
        .iter()
        .map(|&addr| format!("{:02X}H:{:02X}H", addr, state.mem(addr)))
        .collect();
    let ascii: String = addrs
        .iter()
        .map(|&addr| {
            let byte = state.mem(addr);
            if (0x20..=0x7E).contains(&byte) {
                byte as char
            } else {
                '.'
            }
        })
        .collect();
    format!("DUMP: {}\nASCII: {}", cells.join(" "), ascii)
}

/// One listing line: address and encoded bytes padded to a fixed-width
/// column, then the source text.
pub fn format_listing_line(line: &ListingLine) -> String {
    let mut code = format!("{:02X}H", line.addr);
    for byte in &line.bytes {
        code.push_str(&format!(" {byte:02X}H"));
    }
    format!("{code:<18}{}", line.source)
}

pub fn format_listing(listing: &[ListingLine]) -> String {
    listing
        .iter()
        .map(format_listing_line)
        .collect::<Vec<_>>()
        .join("\n")
}
