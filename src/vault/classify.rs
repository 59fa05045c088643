//! Text/binary classification of file content.

/// Number of leading bytes inspected for null and control characters.
pub const INSPECT_LIMIT: usize = 8192;

/// Content at or below this length is text once it is valid UTF-8.
const SHORT_CONTENT: usize = 100;

/// Decide whether `content` should be shown as text.
///
/// Invalid UTF-8 is binary. Content longer than 100 bytes is binary when
/// null bytes exceed 1% or control characters (other than tab, LF and CR)
/// exceed 5% of the total length. Nulls count as control characters.
pub fn is_text(content: &[u8]) -> bool {
    if content.is_empty() {
        return true;
    }
    if std::str::from_utf8(content).is_err() {
        return false;
    }
    if content.len() <= SHORT_CONTENT {
        return true;
    }

    let inspected = &content[..content.len().min(INSPECT_LIMIT)];
    let (nulls, controls) = inspected.iter().fold((0usize, 0usize), |(n, c), &b| {
        let is_control = b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r');
        (n + usize::from(b == 0), c + usize::from(is_control))
    });

    let total = content.len() as f64;
    let null_ratio = nulls as f64 / total;
    let control_ratio = controls as f64 / total;

    null_ratio <= 0.01 && control_ratio <= 0.05
}
