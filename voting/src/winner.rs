//! Winner resolution.

use clipvote_types::{CandidateId, VoteTally};

/// The candidate with the unique maximum count.
///
/// Returns `None` when no votes were cast or when two or more candidates
/// share the maximum. No tie-break is applied: two of three clips tied at
/// the top means no winner.
pub fn resolve(tally: &VoteTally) -> Option<CandidateId> {
    let max = tally.iter().map(|(_, n)| n).max()?;
    if max == 0 {
        return None;
    }

    let mut leaders = tally.iter().filter(|&(_, n)| n == max).map(|(c, _)| c);
    match (leaders.next(), leaders.next()) {
        (Some(winner), None) => Some(winner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(counts: [u64; 3]) -> VoteTally {
        VoteTally::from_counts(
            counts
                .iter()
                .enumerate()
                .map(|(i, &n)| (CandidateId::new(i as u8 + 1), n)),
        )
    }

    #[test]
    fn all_zero_has_no_winner() {
        assert_eq!(resolve(&tally([0, 0, 0])), None);
    }

    #[test]
    fn unique_max_wins() {
        assert_eq!(resolve(&tally([3, 1, 0])), Some(CandidateId::new(1)));
        assert_eq!(resolve(&tally([0, 0, 1])), Some(CandidateId::new(3)));
    }

    #[test]
    fn two_way_tie_has_no_winner() {
        assert_eq!(resolve(&tally([1, 1, 0])), None);
        assert_eq!(resolve(&tally([0, 4, 4])), None);
    }

    #[test]
    fn three_way_tie_has_no_winner() {
        assert_eq!(resolve(&tally([2, 2, 2])), None);
    }

    #[test]
    fn empty_tally_has_no_winner() {
        assert_eq!(resolve(&VoteTally::default()), None);
    }
}
