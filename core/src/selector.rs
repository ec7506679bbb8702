//! Current-room selection.
//!
//! Reduces the live room set to the single room the beacon most likely
//! occupies: the one with the numerically greatest filtered RSSI.

/// Pick the current room from `(room_key, filtered_rssi)` pairs.
///
/// Returns `None` for an empty set. Ties on filtered signal strength are
/// broken toward the lexicographically smallest room key so the result
/// is stable across runs regardless of map iteration order.
pub fn select_current_room<'a, I>(readings: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    readings
        .into_iter()
        .max_by(|(key_a, rssi_a), (key_b, rssi_b)| {
            rssi_a.cmp(rssi_b).then_with(|| key_b.cmp(key_a))
        })
        .map(|(key, _)| key)
}
