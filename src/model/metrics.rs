//! Classification metrics computed on host-side label vectors.

/// Fraction of exact label matches.
pub fn accuracy(y_true: &[i64], y_pred: &[i64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// F1 score averaged over classes, weighted by true-class support.
///
/// Classes with zero precision+recall contribute an F1 of zero, matching
/// the usual convention for degenerate classes.
pub fn weighted_f1(y_true: &[i64], y_pred: &[i64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }

    let classes: std::collections::BTreeSet<i64> = y_true.iter().copied().collect();
    let total = y_true.len() as f64;
    let mut weighted = 0.0;

    for &class in &classes {
        let tp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(&t, &p)| t == class && p == class)
            .count() as f64;
        let pred_pos = y_pred.iter().filter(|&&p| p == class).count() as f64;
        let actual_pos = y_true.iter().filter(|&&t| t == class).count() as f64;

        let precision = if pred_pos > 0.0 { tp / pred_pos } else { 0.0 };
        let recall = if actual_pos > 0.0 { tp / actual_pos } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        weighted += f1 * actual_pos / total;
    }

    weighted
}
