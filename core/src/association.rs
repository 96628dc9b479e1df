//! Greedy nearest-neighbor data association.
//!
//! Observations are processed in input order. Each one takes the closest landmark that has not
//! already been claimed by an earlier observation, so the result is one-to-one but not a globally
//! optimal assignment. Claimed candidates are tracked with an availability mask rather than being
//! removed from the candidate list, so candidate indices stay stable for the whole pass.
use crate::map::Landmark;
use crate::{LandmarkObs, MapFrame};

/// Associate map-frame `observations` with `candidates` (also in the map frame).
///
/// Sets each observation's `id` to the id of its matched candidate, or `None` once every
/// candidate has been claimed. Distance ties go to the candidate with the lowest index.
///
/// # Returns
/// For every observation, the index into `candidates` of its match.
///
/// # Example
/// ```rust
/// use mcl::association::associate;
/// use mcl::{Landmark, LandmarkObs, MapFrame};
///
/// let candidates = [Landmark::new(1, 0.0, 0.0), Landmark::new(2, 10.0, 10.0)];
/// let mut observations = [LandmarkObs::<MapFrame>::new(0.1, 0.1)];
/// let matches = associate(&candidates, &mut observations);
/// assert_eq!(observations[0].id, Some(1));
/// assert_eq!(matches, vec![Some(0)]);
/// ```
pub fn associate(
    candidates: &[Landmark],
    observations: &mut [LandmarkObs<MapFrame>],
) -> Vec<Option<usize>> {
    let mut available = vec![true; candidates.len()];
    let mut matches = Vec::with_capacity(observations.len());
    for obs in observations.iter_mut() {
        let mut nearest: Option<(usize, f64)> = None;
        for (j, candidate) in candidates.iter().enumerate() {
            if !available[j] {
                continue;
            }
            // Squared distance orders candidates the same way as the Euclidean distance.
            let d2 = (candidate.x - obs.x).powi(2) + (candidate.y - obs.y).powi(2);
            if nearest.is_none_or(|(_, best)| d2 < best) {
                nearest = Some((j, d2));
            }
        }
        match nearest {
            Some((j, _)) => {
                available[j] = false;
                obs.id = Some(candidates[j].id);
                matches.push(Some(j));
            }
            None => {
                obs.id = None;
                matches.push(None);
            }
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(x: f64, y: f64) -> LandmarkObs<MapFrame> {
        LandmarkObs::new(x, y)
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let candidates = [Landmark::new(1, 0.0, 0.0), Landmark::new(2, 10.0, 10.0)];
        let mut observations = [obs(0.1, 0.1)];
        associate(&candidates, &mut observations);
        assert_eq!(observations[0].id, Some(1));
    }

    #[test]
    fn test_one_to_one_falls_back_to_next_nearest() {
        let candidates = [Landmark::new(1, 0.0, 0.0), Landmark::new(2, 5.0, 0.0)];
        let mut observations = [obs(0.2, 0.0), obs(0.1, 0.0)];
        let matches = associate(&candidates, &mut observations);
        // First observation claims landmark 1 even though the second one is closer to it.
        assert_eq!(observations[0].id, Some(1));
        assert_eq!(observations[1].id, Some(2));
        assert_eq!(matches, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_exhausted_pool_leaves_unmatched() {
        let candidates = [Landmark::new(7, 1.0, 1.0)];
        let mut observations = [obs(1.0, 1.0), obs(1.1, 1.0)];
        let matches = associate(&candidates, &mut observations);
        assert_eq!(observations[0].id, Some(7));
        assert_eq!(observations[1].id, None);
        assert_eq!(matches, vec![Some(0), None]);
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let candidates = [Landmark::new(4, -1.0, 0.0), Landmark::new(5, 1.0, 0.0)];
        let mut observations = [obs(0.0, 0.0)];
        associate(&candidates, &mut observations);
        assert_eq!(observations[0].id, Some(4));
    }

    #[test]
    fn test_empty_inputs() {
        let mut none: [LandmarkObs<MapFrame>; 0] = [];
        assert!(associate(&[Landmark::new(1, 0.0, 0.0)], &mut none).is_empty());

        let mut observations = [obs(3.0, 4.0)];
        observations[0].id = Some(99);
        let matches = associate(&[], &mut observations);
        assert_eq!(matches, vec![None]);
        assert_eq!(observations[0].id, None);
    }

    #[test]
    fn test_candidate_order_is_stable_after_claims() {
        let candidates = [
            Landmark::new(1, 0.0, 0.0),
            Landmark::new(2, 3.0, 0.0),
            Landmark::new(3, 6.0, 0.0),
        ];
        let mut observations = [obs(3.1, 0.0), obs(6.2, 0.0), obs(0.3, 0.0)];
        let matches = associate(&candidates, &mut observations);
        assert_eq!(matches, vec![Some(1), Some(2), Some(0)]);
        let ids: Vec<_> = observations.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![Some(2), Some(3), Some(1)]);
    }
}
