use crate::models::metric::MetricType;

/// Percentage of `goal` achieved by `actual` for the given metric direction.
///
/// Returns `None` when either side is missing. Results are unrounded;
/// higher-is-better metrics are uncapped so over-achievement stays visible,
/// while `Maintain` is capped at 100.
pub fn calculate_progress(
    actual: Option<f64>,
    goal: Option<f64>,
    metric_type: MetricType,
) -> Option<f64> {
    let actual = actual.filter(|v| v.is_finite())?;
    let goal = goal.filter(|v| v.is_finite())?;

    let progress = match metric_type {
        MetricType::Decrease => {
            if actual == 0.0 {
                100.0
            } else if goal == 0.0 && actual > 0.0 {
                0.0
            } else {
                (goal / actual) * 100.0
            }
        }
        MetricType::Maintain => {
            if goal == 0.0 {
                if actual == 0.0 {
                    100.0
                } else {
                    0.0
                }
            } else {
                ((actual / goal) * 100.0).min(100.0)
            }
        }
        MetricType::Increase | MetricType::Plus | MetricType::Minus => {
            if goal == 0.0 {
                100.0
            } else {
                (actual / goal) * 100.0
            }
        }
    };

    Some(progress)
}

/// Weighted mean of child progress values.
///
/// Children without progress are skipped. A child without a positive weight
/// counts as weight zero, so it drops out once any sibling is weighted:
/// `[(80, None), (20, Some(1))]` rolls up to 20. When no remaining child
/// carries a positive weight the plain mean is used instead.
pub fn weighted_progress<I>(items: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    let scored: Vec<(f64, f64)> = items
        .into_iter()
        .filter_map(|(progress, weight)| {
            let progress = progress.filter(|v| v.is_finite())?;
            let weight = weight.filter(|w| w.is_finite() && *w > 0.0).unwrap_or(0.0);
            Some((progress, weight))
        })
        .collect();

    if scored.is_empty() {
        return None;
    }

    let total_weight: f64 = scored.iter().map(|(_, weight)| weight).sum();
    if total_weight > 0.0 {
        let weighted: f64 = scored
            .iter()
            .map(|(progress, weight)| progress * weight)
            .sum();
        Some(weighted / total_weight)
    } else {
        let sum: f64 = scored.iter().map(|(progress, _)| progress).sum();
        Some(sum / scored.len() as f64)
    }
}
