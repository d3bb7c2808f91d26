//! Excerpt selection.
//!
//! Rules, first match wins:
//! 1. Short sources (60 s or less) are used whole.
//! 2. No detected shots yields nothing; the driver then uses its fallback window.
//! 3. Up to `desired` shots are kept as they are.
//! 4. Otherwise `desired` shots are sampled uniformly without replacement and
//!    returned in chronological order.

use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::debug;

use reelcut_models::Segment;

/// Sources at or below this length are used whole.
pub const SHORT_SOURCE_SECS: f64 = 60.0;

/// Choose the excerpts to render.
pub fn select<R: Rng + ?Sized>(
    segments: &[Segment],
    desired: usize,
    total_duration: Option<f64>,
    rng: &mut R,
) -> Vec<Segment> {
    if let Some(total) = total_duration {
        if total <= SHORT_SOURCE_SECS {
            if let Ok(whole) = Segment::whole(total) {
                debug!(total, "Short source, using it whole");
                return vec![whole];
            }
        }
    }

    if segments.is_empty() {
        return Vec::new();
    }

    if segments.len() <= desired {
        return segments.to_vec();
    }

    let mut chosen: Vec<Segment> = segments.choose_multiple(rng, desired).copied().collect();
    chosen.sort_by(|a, b| a.start().total_cmp(&b.start()));
    debug!(detected = segments.len(), chosen = chosen.len(), "Sampled excerpts");
    chosen
}

/// The first `window` seconds of the source, clamped to its length.
pub fn fallback_window(total_duration: f64, window: f64) -> Option<Segment> {
    Segment::new(0.0, window.min(total_duration)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn shots(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment::new(i as f64 * 10.0, i as f64 * 10.0 + 8.0).unwrap())
            .collect()
    }

    #[test]
    fn test_short_source_used_whole() {
        let mut rng = StdRng::seed_from_u64(1);
        let chosen = select(&shots(5), 2, Some(45.0), &mut rng);
        assert_eq!(chosen, vec![Segment::new(0.0, 45.0).unwrap()]);

        let chosen = select(&[], 2, Some(60.0), &mut rng);
        assert_eq!(chosen, vec![Segment::new(0.0, 60.0).unwrap()]);
    }

    #[test]
    fn test_no_segments_yields_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select(&[], 4, Some(600.0), &mut rng).is_empty());
        assert!(select(&[], 4, None, &mut rng).is_empty());
    }

    #[test]
    fn test_few_segments_kept_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let input = shots(3);
        assert_eq!(select(&input, 4, Some(600.0), &mut rng), input);
        assert_eq!(select(&input, 3, None, &mut rng), input);
    }

    #[test]
    fn test_sample_is_sorted_subset() {
        let input = shots(12);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let chosen = select(&input, 4, Some(600.0), &mut rng);
            assert_eq!(chosen.len(), 4);
            assert!(chosen.iter().all(|s| input.contains(s)));
            assert!(chosen.windows(2).all(|w| w[0].start() < w[1].start()));
        }
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let input = shots(12);
        let a = select(&input, 4, None, &mut StdRng::seed_from_u64(99));
        let b = select(&input, 4, None, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fallback_window_clamped() {
        assert_eq!(fallback_window(600.0, 60.0), Segment::new(0.0, 60.0).ok());
        assert_eq!(fallback_window(30.0, 60.0), Segment::new(0.0, 30.0).ok());
        assert_eq!(fallback_window(0.0, 60.0), None);
    }
}
