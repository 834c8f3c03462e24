/// Percent-encode everything outside the RFC 3986 unreserved set.
///
/// Used for the path and label parts of subscription links, so `/` becomes
/// `%2F` and `@` in an email label becomes `%40`.
pub fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());

    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }

    encoded
}
