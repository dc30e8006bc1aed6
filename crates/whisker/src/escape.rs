//! HTML escaping for variable output.

use std::fmt;

/// Writes `input` to `out`, replacing `&`, `<`, `>`, `"` and `'` with their
/// HTML entities.
///
/// ```rust
/// let mut out = String::new();
/// whisker::escape_html("<b>\"Tom\" & 'Jerry'</b>", &mut out).unwrap();
/// assert_eq!(out, "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
/// ```
pub fn escape_html(input: &str, out: &mut dyn fmt::Write) -> fmt::Result {
    let mut last = 0;
    for (i, byte) in input.bytes().enumerate() {
        let entity = match byte {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            b'\'' => "&#39;",
            _ => continue,
        };
        out.write_str(&input[last..i])?;
        out.write_str(entity)?;
        last = i + 1;
    }
    out.write_str(&input[last..])
}
