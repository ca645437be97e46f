//! Payload fixes applied to object assets on read.

const DOUBLED_PREFIX: &str = "xmlns:xmlns:";
const PREFIX: &str = "xmlns:";

/// Collapse repeated `xmlns:` prefixes left by an old serializer.
///
/// Payloads that are not UTF-8 are returned unchanged.
pub(crate) fn fix_object_payload(data: Vec<u8>) -> Vec<u8> {
    let mut text = match String::from_utf8(data) {
        Ok(text) => text,
        Err(e) => return e.into_bytes(),
    };
    while text.contains(DOUBLED_PREFIX) {
        text = text.replace(DOUBLED_PREFIX, PREFIX);
    }
    text.into_bytes()
}
