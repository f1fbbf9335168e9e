//! JSON output helpers.

/// Replace every non-ASCII character in serialized JSON with `\uXXXX`
/// escapes, using surrogate pairs outside the Basic Multilingual Plane.
///
/// Serialized JSON only carries non-ASCII text inside string literals, so
/// the result is equivalent JSON that is safe for ASCII-only consumers.
pub(crate) fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
