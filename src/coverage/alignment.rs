use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::{Op, op::Kind};

use super::span::reference_span;

/// The fields of an aligned read that depth computation needs.
///
/// `start` is 0-based. Readers of 1-based formats convert on the way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub reference_name: Option<String>,
    pub start: Option<u64>,
    pub ops: Vec<Op>,
    pub flags: Flags,
    pub mapping_quality: Option<u8>,
}

impl Alignment {
    /// A mapped, primary alignment with no other flags set.
    pub fn mapped(reference_name: impl Into<String>, start: u64, ops: Vec<Op>) -> Self {
        Self {
            reference_name: Some(reference_name.into()),
            start: Some(start),
            ops,
            flags: Flags::empty(),
            mapping_quality: None,
        }
    }

    pub fn unmapped() -> Self {
        Self {
            reference_name: None,
            start: None,
            ops: Vec::new(),
            flags: Flags::UNMAPPED,
            mapping_quality: None,
        }
    }

    /// Reference name and 0-based start, if the read is linearly placed.
    pub fn placement(&self) -> Option<(&str, u64)> {
        if self.flags.is_unmapped() {
            return None;
        }

        match (&self.reference_name, self.start) {
            (Some(name), Some(start)) => Some((name.as_str(), start)),
            _ => None,
        }
    }

    pub fn reference_span(&self) -> Option<u64> {
        reference_span(&self.ops)
    }
}

/// Longest operation a BAM record can encode (28-bit length field).
pub const MAX_OP_LEN: usize = (1 << 28) - 1;

/// Parse a SAM CIGAR string, keeping only well-formed `<len><op>` pairs.
///
/// Unknown operation letters, pairs without a length and lengths above
/// [`MAX_OP_LEN`] are dropped so a single bad record cannot stop a bulk
/// scan. `*` yields no operations.
pub fn parse_ops(s: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut len: Option<usize> = None;
    let mut oversized = false;

    for c in s.chars() {
        if let Some(digit) = c.to_digit(10) {
            match len
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit as usize))
                .filter(|&n| n <= MAX_OP_LEN)
            {
                Some(n) => len = Some(n),
                None => oversized = true,
            }
            continue;
        }

        let kind = match c {
            'M' => Some(Kind::Match),
            'I' => Some(Kind::Insertion),
            'D' => Some(Kind::Deletion),
            'N' => Some(Kind::Skip),
            'S' => Some(Kind::SoftClip),
            'H' => Some(Kind::HardClip),
            'P' => Some(Kind::Pad),
            '=' => Some(Kind::SequenceMatch),
            'X' => Some(Kind::SequenceMismatch),
            _ => None,
        };

        if let (Some(kind), Some(n), false) = (kind, len, oversized) {
            ops.push(Op::new(kind, n));
        }
        len = None;
        oversized = false;
    }

    ops
}

/// Decides which records contribute depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFilter {
    /// Records with any of these flags set are skipped.
    pub exclude_flags: Flags,
    pub min_mapping_quality: u8,
}

impl ReadFilter {
    /// Unmapped, secondary, QC-fail and duplicate (0x704). Supplementary
    /// records still count.
    pub const DEFAULT_EXCLUDE: u16 = 0x704;

    pub fn new(exclude_flags: u16, min_mapping_quality: u8) -> Self {
        Self {
            exclude_flags: Flags::from(exclude_flags),
            min_mapping_quality,
        }
    }

    pub fn accepts(&self, alignment: &Alignment) -> bool {
        if alignment.flags.intersects(self.exclude_flags) {
            return false;
        }

        // A missing mapping quality only passes when no floor is set.
        self.min_mapping_quality == 0
            || alignment
                .mapping_quality
                .is_some_and(|q| q >= self.min_mapping_quality)
    }
}

impl Default for ReadFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXCLUDE, 0)
    }
}
