use crate::services::detailed_grading::QUESTIONS_PER_IMAGE;

const ASSUMED_CORRECT_RATIO: f64 = 0.8;

/// Counts are stored in `INTEGER` columns.
const MAX_COUNT: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ReconciledScore {
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) score: f64,
}

/// Derives the persisted score from the counts. The stated score only survives when no
/// question total can be established (no images and no usable count). Counts are
/// clamped to the storable range before the score is computed from them.
pub(crate) fn reconcile(
    stated_score: Option<f64>,
    total_questions: Option<i64>,
    correct_answers: Option<i64>,
    image_count: usize,
) -> ReconciledScore {
    let total = total_questions
        .filter(|total| *total > 0)
        .unwrap_or_else(|| (image_count as i64).saturating_mul(QUESTIONS_PER_IMAGE))
        .min(MAX_COUNT);
    let correct = correct_answers
        .unwrap_or_else(|| (total as f64 * ASSUMED_CORRECT_RATIO).floor() as i64)
        .clamp(0, total.max(0));

    let score = if total > 0 {
        score_from_counts(correct, total)
    } else {
        stated_score.filter(|score| score.is_finite()).unwrap_or(0.0).clamp(0.0, 100.0)
    };

    // Both values are within 0..=MAX_COUNT here.
    ReconciledScore {
        total_questions: i32::try_from(total).unwrap_or(i32::MAX),
        correct_answers: i32::try_from(correct).unwrap_or(i32::MAX),
        score,
    }
}

/// `correct / total * 100`, rounded to one decimal place.
pub(crate) fn score_from_counts(correct: i64, total: i64) -> f64 {
    (correct as f64 / total as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stated_score_is_discarded_when_counts_exist() {
        let reconciled = reconcile(Some(95.0), Some(20), Some(18), 2);
        assert_eq!(reconciled, ReconciledScore { total_questions: 20, correct_answers: 18, score: 90.0 });
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(score_from_counts(2, 3), 66.7);
        assert_eq!(score_from_counts(1, 3), 33.3);
        assert_eq!(score_from_counts(7, 10), 70.0);
    }

    #[test]
    fn score_matches_counts_for_every_split() {
        for total in 1..=40 {
            for correct in 0..=total {
                let reconciled = reconcile(None, Some(total), Some(correct), 1);
                let expected = (correct as f64 / total as f64 * 1000.0).round() / 10.0;
                assert_eq!(reconciled.score, expected);
            }
        }
    }

    #[test]
    fn missing_total_uses_five_per_image() {
        let reconciled = reconcile(Some(50.0), None, None, 2);
        assert_eq!(reconciled.total_questions, 10);
        assert_eq!(reconciled.correct_answers, 8);
        assert_eq!(reconciled.score, 80.0);
    }

    #[test]
    fn zero_total_is_treated_as_missing() {
        let reconciled = reconcile(None, Some(0), Some(3), 1);
        assert_eq!(reconciled.total_questions, 5);
        assert_eq!(reconciled.score, 60.0);
    }

    #[test]
    fn explicit_zero_correct_is_kept() {
        let reconciled = reconcile(Some(40.0), Some(10), Some(0), 2);
        assert_eq!(reconciled.correct_answers, 0);
        assert_eq!(reconciled.score, 0.0);
    }

    #[test]
    fn correct_is_clamped_to_total() {
        let reconciled = reconcile(None, Some(10), Some(12), 2);
        assert_eq!(reconciled.correct_answers, 10);
        assert_eq!(reconciled.score, 100.0);
    }

    #[test]
    fn oversized_counts_are_clamped_before_scoring() {
        let reconciled = reconcile(Some(50.0), Some(3_000_000_000), Some(1_500_000_000), 1);
        assert_eq!(reconciled.total_questions, i32::MAX);
        assert_eq!(reconciled.correct_answers, 1_500_000_000);
        assert_eq!(
            reconciled.score,
            score_from_counts(
                i64::from(reconciled.correct_answers),
                i64::from(reconciled.total_questions)
            )
        );
        assert_eq!(reconciled.score, 69.8);
    }

    #[test]
    fn correct_beyond_storable_range_is_capped_with_total() {
        let reconciled = reconcile(None, Some(i64::MAX), Some(i64::MAX), 1);
        assert_eq!(reconciled.total_questions, i32::MAX);
        assert_eq!(reconciled.correct_answers, i32::MAX);
        assert_eq!(reconciled.score, 100.0);
    }

    #[test]
    fn stated_score_survives_only_without_any_total() {
        let reconciled = reconcile(Some(130.0), None, None, 0);
        assert_eq!(reconciled.total_questions, 0);
        assert_eq!(reconciled.score, 100.0);
    }
}
