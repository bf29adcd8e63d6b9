pub mod control;
pub mod cross;
pub mod momentum;

/// "Now" index for a days-ago offset: `len - offset - 1`. None when the
/// offset reaches outside the series.
pub(crate) fn now_index(len: usize, offset: usize) -> Option<usize> {
    len.checked_sub(offset + 1)
}

/// Indices for a two-point check: now and the bar before it. None when
/// either falls outside the series.
pub(crate) fn adjacent_indices(len: usize, offset: usize) -> Option<(usize, usize)> {
    let now = now_index(len, offset)?;
    let prev = now.checked_sub(1)?;
    Some((now, prev))
}
