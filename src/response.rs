//! Parsing of drive response lines.

/// Find the first run of ASCII digits in `line`, optionally preceded by `-`, and parse it.
///
/// Returns `None` when the line has no digits or the number does not fit an `i32`.
pub fn parse_value(line: &[u8]) -> Option<i32> {
    let start = line.iter().position(u8::is_ascii_digit)?;
    let negative = start > 0 && line[start - 1] == b'-';

    let mut magnitude: i64 = 0;
    for &byte in line[start..].iter().take_while(|byte| byte.is_ascii_digit()) {
        magnitude = magnitude
            .checked_mul(10)?
            .checked_add((byte - b'0') as i64)?;
    }

    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}
