//! Compact vibrations display: 950, 1.5K, 2.3M

/// Format a vibrations total with a K/M suffix and one decimal, rounding
/// halves up
pub fn format_vibrations(vibrations: u64) -> String {
    match vibrations {
        v if v >= 1_000_000 => with_suffix(v, 1_000_000, 'M'),
        v if v >= 1_000 => with_suffix(v, 1_000, 'K'),
        v => v.to_string(),
    }
}

fn with_suffix(vibrations: u64, unit: u64, suffix: char) -> String {
    let unit = u128::from(unit);
    let tenths = (u128::from(vibrations) * 10 + unit / 2) / unit;
    format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
}
