// Gap repair for metric value sequences

/// Returns a copy of `values` with every gap filled.
///
/// Gaps take the nearest preceding present value. Leading gaps, which have
/// no preceding value, take the nearest following one. A sequence of gaps
/// only stays all gaps.
pub fn fill_missing(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut filled = values.to_vec();

    let mut prev = None;
    for value in filled.iter_mut() {
        if value.is_none() {
            *value = prev;
        }
        prev = *value;
    }

    let mut next = None;
    for value in filled.iter_mut().rev() {
        if value.is_none() {
            *value = next;
        }
        next = *value;
    }

    filled
}
