use noodles::sam::alignment::record::cigar::{Op, op::Kind};

/// Whether an operation of this kind advances along the reference.
pub fn consumes_reference(kind: Kind) -> bool {
    match kind {
        Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => true,
        Kind::Deletion | Kind::Skip => true,
        // insertion, soft clip, hard clip, pad
        _ => false,
    }
}

/// Number of reference positions an alignment covers, from first to last
/// reference-consuming base.
///
/// Insertions, clips and padding contribute nothing. No operations means a
/// span of zero. Returns `None` if the total does not fit in a `u64`.
pub fn reference_span(ops: &[Op]) -> Option<u64> {
    ops.iter()
        .filter(|op| consumes_reference(op.kind()))
        .try_fold(0u64, |span, op| {
            u64::try_from(op.len())
                .ok()
                .and_then(|len| span.checked_add(len))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::parse_ops;
    use rstest::rstest;

    #[rstest]
    #[case("100M", 100)]
    #[case("5S90M5S", 90)]
    #[case("10M5I10M", 20)]
    #[case("10M5D10M", 25)]
    #[case("10M1000N10M", 1020)]
    #[case("3H4=2X4=3H", 10)]
    #[case("2P10M", 10)]
    #[case("*", 0)]
    #[case("", 0)]
    #[case("99999999999999999999999M10M", 10)]
    #[case("10M268435456M", 10)]
    fn test_reference_span(#[case] cigar: &str, #[case] expected: u64) {
        assert_eq!(reference_span(&parse_ops(cigar)), Some(expected));
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        // `Q` is not a CIGAR operation; the pair is dropped, not an error.
        assert_eq!(reference_span(&parse_ops("10M4Q10M")), Some(20));
    }

    #[test]
    fn test_only_non_consuming() {
        let ops = [
            Op::new(Kind::SoftClip, 5),
            Op::new(Kind::Insertion, 3),
            Op::new(Kind::HardClip, 2),
        ];
        assert_eq!(reference_span(&ops), Some(0));
    }

    #[test]
    fn test_span_overflow_is_none() {
        let ops = [
            Op::new(Kind::Match, usize::MAX),
            Op::new(Kind::Deletion, usize::MAX),
        ];
        assert_eq!(reference_span(&ops), None);
    }
}
