//! Source-line grammar: comment stripping, label/mnemonic/argument
//! splitting and the operand grammar shared by both assembler passes.

use std::ops::Range;

use lazy_static::lazy_static;
use miette::{bail, LabeledSpan, Result, Severity, SourceSpan};
use regex::Regex;

use crate::isa::{Operand, Register};

lazy_static! {
    /// Optional sign, one or more hex digits, optional trailing `H`/`h`.
    static ref HEX_RE: Regex = Regex::new(r"^-?[0-9A-Fa-f]+[Hh]?$").unwrap();
}

/// Location of a line within the original source text, for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    offs: usize,
    len: usize,
}

impl Span {
    pub fn new(offs: usize, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn offs(&self) -> usize {
        self.offs
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn end(&self) -> usize {
        self.offs + self.len
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs.into(), value.len)
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.offs..value.end()
    }
}

/// A surviving preprocessed line: comment-stripped, trimmed, non-empty.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SrcLine<'a> {
    pub text: &'a str,
    pub span: Span,
}

/// Strip `//` comments, trim whitespace and drop blank lines. Original
/// line numbers are not preserved; only surviving lines matter from here.
pub fn preprocess(src: &str) -> Vec<SrcLine<'_>> {
    let mut lines = Vec::new();
    let mut offs = 0;
    for raw in src.split('\n') {
        let code = match raw.find("//") {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let text = code.trim();
        if !text.is_empty() {
            let lead = code.len() - code.trim_start().len();
            lines.push(SrcLine {
                text,
                span: Span::new(offs + lead, text.len()),
            });
        }
        offs += raw.len() + 1;
    }
    lines
}

/// One source line split into its parts. A line may carry a label, an
/// instruction, or both; label-only lines have no mnemonic.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParsedLine<'a> {
    /// Case-sensitive label name, without the trailing colon.
    pub label: Option<&'a str>,
    /// Lower-cased mnemonic.
    pub mnemonic: Option<String>,
    /// Comma-separated argument tokens, trimmed.
    pub args: Vec<&'a str>,
    /// Original text, kept for the listing.
    pub text: &'a str,
    pub span: Span,
}

pub fn parse_line<'a>(line: &SrcLine<'a>) -> ParsedLine<'a> {
    let (label, instr_part) = match line.text.split_once(':') {
        Some((label, rest)) => {
            let label = label.trim();
            // A bare colon carries no label
            ((!label.is_empty()).then_some(label), rest.trim())
        }
        None => (None, line.text),
    };

    let (mnemonic, args) = if instr_part.is_empty() {
        (None, Vec::new())
    } else {
        let (mnemonic, rest) = match instr_part.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest),
            None => (instr_part, ""),
        };
        let args = rest
            .split(',')
            .map(str::trim)
            .filter(|arg| !arg.is_empty())
            .collect();
        (Some(mnemonic.to_lowercase()), args)
    };

    ParsedLine {
        label,
        mnemonic,
        args,
        text: line.text,
        span: line.span,
    }
}

/// Parse a hex token (optional `-`, hex digits, optional trailing `H`/`h`)
/// to a byte, or None if the token is not in the hex grammar. Values wider
/// than 8 bits are masked; negatives are two's-complement encoded, so `-1`
/// becomes FFH.
pub fn parse_hex(token: &str) -> Option<u8> {
    if !HEX_RE.is_match(token) {
        return None;
    }
    let (neg, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let digits = digits.strip_suffix(['H', 'h']).unwrap_or(digits);
    let mut val: u8 = 0;
    for ch in digits.chars() {
        // Digits are guaranteed by HEX_RE
        let digit = ch.to_digit(16)? as u8;
        val = (val << 4) | digit;
    }
    Some(if neg { val.wrapping_neg() } else { val })
}

/// Resolve one argument token to an operand descriptor.
///
/// Grammar: `A`/`B`/`I` are registers, `[I]` is indirect-via-I, `[hex]` is
/// a direct memory address, a bare hex token is an immediate constant.
pub fn parse_arg(arg: &str, span: Span) -> Result<Operand> {
    let arg = arg.trim();
    match arg {
        "A" => return Ok(Operand::Reg(Register::A)),
        "B" => return Ok(Operand::Reg(Register::B)),
        "I" => return Ok(Operand::Reg(Register::I)),
        "[I]" => return Ok(Operand::IndirectI),
        _ => {}
    }
    if let Some(inner) = arg.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        match parse_hex(inner.trim()) {
            Some(addr) => return Ok(Operand::Direct(addr)),
            None => bail!(
                severity = Severity::Error,
                code = "parse::operand",
                help = "direct memory operands hold a hex address, like [1FH]",
                labels = vec![LabeledSpan::at(span, "invalid operand")],
                "Invalid direct memory operand `{arg}`",
            ),
        }
    }
    if let Some(val) = parse_hex(arg) {
        return Ok(Operand::Const(val));
    }
    bail!(
        severity = Severity::Error,
        code = "parse::operand",
        help = "operands are A, B, I, [I], a hex constant like 2AH, or a direct address like [2AH]",
        labels = vec![LabeledSpan::at(span, "invalid operand")],
        "Invalid operand `{arg}`",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<&str> {
        preprocess(src).iter().map(|l| l.text).collect()
    }

    #[test]
    fn preproc_strips_comments_and_blanks() {
        let src = "mov A, 05H // load A\n\n  // whole-line comment\n  nop  \n";
        assert_eq!(lines(src), vec!["mov A, 05H", "nop"]);
    }

    #[test]
    fn preproc_spans_point_at_source() {
        let src = "  mov A, B\nloop: dec A // down";
        for line in preprocess(src) {
            assert_eq!(&src[Range::from(line.span)], line.text);
        }
    }

    #[test]
    fn parse_line_full() {
        let src = preprocess("LOOP: mov A, 05H");
        let parsed = parse_line(&src[0]);
        assert_eq!(parsed.label, Some("LOOP"));
        assert_eq!(parsed.mnemonic.as_deref(), Some("mov"));
        assert_eq!(parsed.args, vec!["A", "05H"]);
        assert_eq!(parsed.text, "LOOP: mov A, 05H");
    }

    #[test]
    fn parse_line_label_only() {
        let src = preprocess("END:");
        let parsed = parse_line(&src[0]);
        assert_eq!(parsed.label, Some("END"));
        assert_eq!(parsed.mnemonic, None);
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn parse_line_mnemonic_lowercased() {
        let src = preprocess("MOV A, B");
        let parsed = parse_line(&src[0]);
        assert_eq!(parsed.mnemonic.as_deref(), Some("mov"));
        // Labels stay case-sensitive
        let src = preprocess("Loop: nop");
        assert_eq!(parse_line(&src[0]).label, Some("Loop"));
    }

    #[test]
    fn parse_line_ragged_spacing() {
        let src = preprocess("add   A ,  B");
        let parsed = parse_line(&src[0]);
        assert_eq!(parsed.mnemonic.as_deref(), Some("add"));
        assert_eq!(parsed.args, vec!["A", "B"]);
    }

    #[test]
    fn hex_values() {
        assert_eq!(parse_hex("0"), Some(0x00));
        assert_eq!(parse_hex("7F"), Some(0x7F));
        assert_eq!(parse_hex("ffH"), Some(0xFF));
        assert_eq!(parse_hex("0Ah"), Some(0x0A));
        // Masked to 8 bits
        assert_eq!(parse_hex("1FF"), Some(0xFF));
        // Two's complement encoding
        assert_eq!(parse_hex("-1"), Some(0xFF));
        assert_eq!(parse_hex("-80H"), Some(0x80));
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("G1"), None);
        assert_eq!(parse_hex("-"), None);
    }

    #[test]
    fn arg_registers_and_indirect() {
        let span = Span::new(0, 0);
        assert_eq!(parse_arg("A", span).unwrap(), Operand::Reg(Register::A));
        assert_eq!(parse_arg("B", span).unwrap(), Operand::Reg(Register::B));
        assert_eq!(parse_arg("I", span).unwrap(), Operand::Reg(Register::I));
        assert_eq!(parse_arg("[I]", span).unwrap(), Operand::IndirectI);
    }

    #[test]
    fn arg_constants_and_direct() {
        let span = Span::new(0, 0);
        assert_eq!(parse_arg("05H", span).unwrap(), Operand::Const(0x05));
        assert_eq!(parse_arg("-1", span).unwrap(), Operand::Const(0xFF));
        // Only the upper-case names are registers; a lone hex digit like
        // `a` is a constant
        assert_eq!(parse_arg("a", span).unwrap(), Operand::Const(0x0A));
        assert_eq!(parse_arg("b", span).unwrap(), Operand::Const(0x0B));
        assert_eq!(parse_arg("[10H]", span).unwrap(), Operand::Direct(0x10));
        assert_eq!(parse_arg("[ FF ]", span).unwrap(), Operand::Direct(0xFF));
    }

    #[test]
    fn arg_invalid() {
        let span = Span::new(0, 0);
        assert!(parse_arg("Q", span).is_err());
        assert!(parse_arg("[Q]", span).is_err());
        assert!(parse_arg("g", span).is_err());
        assert!(parse_arg("0x10", span).is_err());
    }
}
