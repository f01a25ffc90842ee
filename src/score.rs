/// Maps a non-negative distance into `(0, 1]`, exact matches scoring `1.0`.
/// A NaN distance is treated as infinitely far.
pub fn similarity(distance: f32) -> f64 {
    if distance.is_nan() {
        return 0.0;
    }
    let distance = f64::from(distance.max(0.0));
    1.0 / (1.0 + distance)
}

const MIN_REPORTED: f64 = 0.0001;

/// Similarity rounded to four decimal places for reporting. Never rounds down
/// to zero, so reported scores stay inside `(0, 1]`.
pub fn reported_score(distance: f32) -> f64 {
    ((similarity(distance) * 10_000.0).round() / 10_000.0).max(MIN_REPORTED)
}
