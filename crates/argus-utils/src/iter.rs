//! Iterator helpers.

/// Zips two iterators, panicking if they don't yield the same number of elements.
///
/// The standard library's [`Iterator::zip`] silently truncates to the shorter iterator, which
/// hides bugs where two parallel arrays (e.g. keypoints and their filter states) have drifted out
/// of sync. Use this whenever the two iterators are expected to always have equal length.
///
/// # Panics
///
/// Panics as soon as one iterator yields a value while the other is exhausted.
pub fn zip_exact<A: IntoIterator, B: IntoIterator>(
    a: A,
    b: B,
) -> impl Iterator<Item = (A::Item, B::Item)>
where
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let a = a.into_iter();
    let b = b.into_iter();
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called with iterators of different length ({} vs {})",
        a.len(),
        b.len(),
    );
    a.zip(b)
}
