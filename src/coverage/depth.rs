use super::span::consumes_reference;
use super::{Alignment, Depth, DepthPolicy, DepthRegion};

/// Build the depth array for a single read over its reference span.
///
/// Returns the empty sentinel for reads without linear placement, with a
/// zero-length span, or with a span too long to address. Positions the `policy` does not count stay at zero but
/// still occupy a slot, so `size` always equals the reference span.
/// `chunk_index` is left at zero; the splitter assigns it.
pub fn build_depth(alignment: &Alignment, policy: DepthPolicy) -> DepthRegion {
    let Some((chromosome, start)) = alignment.placement() else {
        return DepthRegion::empty();
    };

    let Some(size) = alignment
        .reference_span()
        .and_then(|span| usize::try_from(span).ok())
        .filter(|&span| span > 0)
    else {
        return DepthRegion::empty();
    };

    let mut values: Vec<Depth> = vec![0; size];
    let mut offset = 0;

    for op in &alignment.ops {
        let kind = op.kind();
        if !consumes_reference(kind) {
            continue;
        }

        let end = offset + op.len();
        if policy.counts(kind) {
            for depth in &mut values[offset..end] {
                *depth = depth.saturating_add(1);
            }
        }
        offset = end;
    }

    DepthRegion::new(chromosome, start, 0, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::parse_ops;

    #[test]
    fn test_simple_match() {
        let alignment = Alignment::mapped("chr1", 2500, parse_ops("500M"));
        let region = build_depth(&alignment, DepthPolicy::Span);
        assert_eq!(region.chromosome, "chr1");
        assert_eq!(region.position, 2500);
        assert_eq!(region.size(), 500);
        assert!(region.values.iter().all(|&v| v == 1));
    }

    #[test]
    fn test_clips_and_insertions_do_not_occupy_positions() {
        let alignment = Alignment::mapped("chr1", 10, parse_ops("4S6M3I4M2H"));
        let region = build_depth(&alignment, DepthPolicy::Span);
        assert_eq!(region.position, 10);
        assert_eq!(region.size(), 10);
        assert_eq!(region.total_depth(), 10);
    }

    #[test]
    fn test_deletion_under_each_policy() {
        let alignment = Alignment::mapped("chr2", 0, parse_ops("3M2D3M"));

        let span = build_depth(&alignment, DepthPolicy::Span);
        assert_eq!(span.values, vec![1, 1, 1, 1, 1, 1, 1, 1]);

        let aligned = build_depth(&alignment, DepthPolicy::Aligned);
        assert_eq!(aligned.values, vec![1, 1, 1, 0, 0, 1, 1, 1]);
        assert_eq!(aligned.size(), span.size());
    }

    #[test]
    fn test_skip_under_aligned_policy() {
        let alignment = Alignment::mapped("chr2", 100, parse_ops("2M3N2M"));
        let region = build_depth(&alignment, DepthPolicy::Aligned);
        assert_eq!(region.values, vec![1, 1, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_unplaced_is_empty() {
        let region = build_depth(&Alignment::unmapped(), DepthPolicy::Span);
        assert!(region.is_empty());

        let mut no_name = Alignment::mapped("chr1", 5, parse_ops("10M"));
        no_name.reference_name = None;
        assert!(build_depth(&no_name, DepthPolicy::Span).is_empty());
    }

    #[test]
    fn test_zero_span_is_empty() {
        let alignment = Alignment::mapped("chr1", 5, parse_ops("10S"));
        assert_eq!(build_depth(&alignment, DepthPolicy::Span).size(), 0);

        let no_ops = Alignment::mapped("chr1", 5, Vec::new());
        assert_eq!(build_depth(&no_ops, DepthPolicy::Span).size(), 0);
    }

    #[test]
    fn test_oversized_length_is_dropped() {
        let alignment = Alignment::mapped("chr1", 5, parse_ops("99999999999999999999999M"));
        assert!(build_depth(&alignment, DepthPolicy::Span).is_empty());

        let alignment = Alignment::mapped("chr1", 5, parse_ops("4M99999999999999999999999M6M"));
        let region = build_depth(&alignment, DepthPolicy::Span);
        assert_eq!(region.size(), 10);
    }
}
