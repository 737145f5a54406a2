//! Splits or combines token ranges into repair tasks sized around a
//! target number of tokens per task.
//!
//! Mode is decided from the *first* input range only: if it is larger
//! than `tokens_per_task`, every range is independently split to size;
//! otherwise consecutive ranges are greedily combined up to the target.
//! This is a deliberate simplification carried over unchanged -- a
//! cluster's ranges are close enough in size in practice that the first
//! range is representative, and changing the rule would change the
//! number of tasks produced for existing deployments.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;

use crate::error::PartitionError;
use crate::token::{TokenRange, TokenRangeSize, TokenRing};

pub struct RangePartitioner;

impl RangePartitioner {
    /// Partitions `ranges` into task-sized groups of sub-ranges.
    ///
    /// - `tokens_per_task == 0`: one task per input range, unmodified.
    /// - Split mode (first range's size exceeds `tokens_per_task`): every
    ///   range, independently, is cut into sub-ranges of size
    ///   `tokens_per_task` (the last sub-range absorbing the remainder).
    /// - Combine mode (otherwise): consecutive ranges are greedily packed
    ///   into a task until adding the next one would exceed
    ///   `tokens_per_task`, then a new task is started. A single range
    ///   larger than `tokens_per_task` sits alone in its task.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::PartitionInvariant`] if the total token
    /// size of the emitted sub-ranges does not match the total size of
    /// the input ranges -- a bug in this function, never a caller error.
    pub fn partition(
        ranges: &[TokenRange],
        tokens_per_task: &TokenRangeSize,
    ) -> Result<Vec<Vec<TokenRange>>, PartitionError> {
        let total_size: TokenRangeSize = ranges.iter().map(|r| TokenRing::range_size(*r)).sum();

        if tokens_per_task.is_zero() {
            let tasks: Vec<Vec<TokenRange>> = ranges.iter().map(|r| vec![*r]).collect();
            Self::verify_total(&tasks, &total_size)?;
            return Ok(tasks);
        }

        let split_mode = ranges
            .first()
            .is_some_and(|first| TokenRing::range_size(*first) > *tokens_per_task);

        let tasks = if split_mode {
            let mut tasks = Vec::with_capacity(ranges.len());
            for range in ranges {
                for sub in Self::split_range(*range, tokens_per_task)? {
                    tasks.push(vec![sub]);
                }
            }
            tasks
        } else {
            Self::combine_ranges(ranges, tokens_per_task)
        };

        Self::verify_total(&tasks, &total_size)?;
        Ok(tasks)
    }

    /// Cuts a single range into sub-ranges of size `tokens_per_task`,
    /// stepping forward from `range.start` and letting the last sub-range
    /// absorb whatever remainder doesn't divide evenly.
    fn split_range(range: TokenRange, tokens_per_task: &TokenRangeSize) -> Result<Vec<TokenRange>, PartitionError> {
        let size = TokenRing::range_size(range);

        let remainder = size.clone() % tokens_per_task.clone();
        let quotient = size / tokens_per_task.clone();
        let sub_count = if remainder.is_zero() { quotient } else { quotient + BigUint::from(1u8) };

        let start = BigInt::from(range.start);
        let step = BigInt::from_biguint(Sign::Plus, tokens_per_task.clone());

        let mut subs = Vec::new();
        let mut prev_end = range.start;
        let mut k = BigUint::zero();
        let steps_before_last = sub_count - BigUint::from(1u8);

        while k < steps_before_last {
            let step_index = BigInt::from_biguint(Sign::Plus, k.clone());
            let sub_start_big = &start + &step_index * &step;
            let sub_end_big = &sub_start_big + &step;

            let sub_start = TokenRing::wrap_to_i64(&sub_start_big)?;
            let sub_end = TokenRing::wrap_to_i64(&sub_end_big)?;

            subs.push(TokenRange::new(sub_start, sub_end));
            prev_end = sub_end;
            k += BigUint::from(1u8);
        }

        subs.push(TokenRange::new(prev_end, range.end));
        Ok(subs)
    }

    /// Greedily packs consecutive ranges into tasks, sealing the current
    /// task and starting a new one whenever adding the next range would
    /// push the accumulated size past `tokens_per_task`.
    fn combine_ranges(ranges: &[TokenRange], tokens_per_task: &TokenRangeSize) -> Vec<Vec<TokenRange>> {
        let mut tasks = Vec::new();
        let mut current: Vec<TokenRange> = Vec::new();
        let mut accumulated = BigUint::zero();

        for &range in ranges {
            let size = TokenRing::range_size(range);
            if !current.is_empty() && &accumulated + &size > *tokens_per_task {
                tasks.push(std::mem::take(&mut current));
                accumulated = BigUint::zero();
            }
            current.push(range);
            accumulated += size;
        }

        if !current.is_empty() {
            tasks.push(current);
        }

        tasks
    }

    fn verify_total(tasks: &[Vec<TokenRange>], expected: &TokenRangeSize) -> Result<(), PartitionError> {
        let actual: TokenRangeSize = tasks.iter().flatten().map(|r| TokenRing::range_size(*r)).sum();
        if &actual != expected {
            return Err(PartitionError::PartitionInvariant { expected: expected.clone(), actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn ranges(pairs: &[(i64, i64)]) -> Vec<TokenRange> {
        pairs.iter().map(|&(s, e)| TokenRange::new(s, e)).collect()
    }

    fn flat(pairs: &[Vec<(i64, i64)>]) -> Vec<Vec<TokenRange>> {
        pairs.iter().map(|task| ranges(task)).collect()
    }

    #[test_case(
        &[(1, 4), (4, 7), (7, 10), (10, 13), (13, 16)], 9,
        &[vec![(1, 4), (4, 7), (7, 10)], vec![(10, 13), (13, 16)]];
        "combine mode seals on exceeding nine"
    )]
    #[test_case(
        &[(1, 4), (4, 7), (7, 10), (10, 13), (13, 16)], 6,
        &[vec![(1, 4), (4, 7)], vec![(7, 10), (10, 13)], vec![(13, 16)]];
        "combine mode seals on exceeding six"
    )]
    fn combine_mode_matches_expected_tasks(input: &[(i64, i64)], target: u64, expected: &[Vec<(i64, i64)>]) {
        let input = ranges(input);
        let result = RangePartitioner::partition(&input, &BigUint::from(target)).unwrap();
        assert_eq!(result, flat(expected));
    }

    #[test]
    fn split_mode_divides_evenly() {
        let input = ranges(&[(0, 100)]);
        let result = RangePartitioner::partition(&input, &BigUint::from(10u8)).unwrap();
        let expected: Vec<Vec<TokenRange>> =
            (0..10).map(|i| vec![TokenRange::new(i * 10, i * 10 + 10)]).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn split_mode_last_sub_range_absorbs_remainder() {
        let input = ranges(&[(0, 134)]);
        let result = RangePartitioner::partition(&input, &BigUint::from(44u8)).unwrap();
        let expected = flat(&[vec![(0, 44)], vec![(44, 88)], vec![(88, 132)], vec![(132, 134)]]);
        assert_eq!(result, expected);
    }

    #[test]
    fn split_mode_crosses_the_wrap_seam() {
        let input = ranges(&[(5, -5)]);
        let full_range = TokenRing::full_range_size();
        let target = full_range / BigUint::from(2u8);
        let result = RangePartitioner::partition(&input, &target).unwrap();
        let expected = flat(&[vec![(5, i64::MIN + 5)], vec![(i64::MIN + 5, -5)]]);
        assert_eq!(result, expected);
    }

    #[test]
    fn zero_target_emits_one_task_per_range() {
        let input = ranges(&[(0, 10), (10, 20), (20, 30)]);
        let result = RangePartitioner::partition(&input, &BigUint::zero()).unwrap();
        assert_eq!(result, flat(&[vec![(0, 10)], vec![(10, 20)], vec![(20, 30)]]));
    }

    #[test]
    fn oversized_range_sits_alone_in_combine_mode() {
        // First range smaller than target keeps us in combine mode; a
        // later oversized range must still end up alone.
        let input = ranges(&[(0, 2), (2, 100), (100, 102)]);
        let result = RangePartitioner::partition(&input, &BigUint::from(10u8)).unwrap();
        assert_eq!(result, flat(&[vec![(0, 2)], vec![(2, 100)], vec![(100, 102)]]));
    }

    proptest! {
        /// Property (P1): partitioning never changes the total token
        /// size covered by the input ranges.
        #[test]
        fn prop_partition_preserves_total_size(
            starts in proptest::collection::vec(0i64..1_000_000, 1..8),
            target in 1u64..10_000,
        ) {
            let input: Vec<TokenRange> = starts
                .windows(2)
                .filter(|w| w[0] < w[1])
                .map(|w| TokenRange::new(w[0], w[1]))
                .collect();
            prop_assume!(!input.is_empty());

            let total_before: TokenRangeSize = input.iter().map(|r| r.size()).sum();
            let result = RangePartitioner::partition(&input, &BigUint::from(target)).unwrap();
            let total_after: TokenRangeSize = result.iter().flatten().map(|r| r.size()).sum();
            prop_assert_eq!(total_before, total_after);
        }

        /// Property (P2): zero target is always a strict identity
        /// (one task per input range, ranges unmodified).
        #[test]
        fn prop_zero_target_is_identity(
            starts in proptest::collection::vec(0i64..1_000_000, 1..8),
        ) {
            let input: Vec<TokenRange> = starts
                .windows(2)
                .filter(|w| w[0] < w[1])
                .map(|w| TokenRange::new(w[0], w[1]))
                .collect();
            prop_assume!(!input.is_empty());

            let result = RangePartitioner::partition(&input, &BigUint::zero()).unwrap();
            let expected: Vec<Vec<TokenRange>> = input.iter().map(|r| vec![*r]).collect();
            prop_assert_eq!(result, expected);
        }

        /// Property (P3): in combine mode, no task (except one holding a
        /// single oversized range) exceeds the target size.
        #[test]
        fn prop_combine_mode_respects_target(
            starts in proptest::collection::vec(0i64..1_000, 2..10),
            target in 5u64..200,
        ) {
            let mut sorted = starts.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assume!(sorted.len() >= 2);

            let input: Vec<TokenRange> = sorted.windows(2).map(|w| TokenRange::new(w[0], w[1])).collect();
            let target_big = BigUint::from(target);
            prop_assume!(input.first().unwrap().size() <= target_big);

            let result = RangePartitioner::partition(&input, &target_big).unwrap();
            for task in &result {
                let task_size: TokenRangeSize = task.iter().map(|r| r.size()).sum();
                if task.len() > 1 {
                    prop_assert!(task_size <= target_big);
                }
            }
        }
    }
}
