//! Content-type detection
//!
//! Retrieval responses report a content-type derived from the stored
//! bytes themselves, never from anything the uploader claimed. Magic-byte
//! detection first, then a UTF-8 heuristic for plain text, with
//! `application/octet-stream` as the floor.

/// How much of a blob the sniffer looks at.
pub const SNIFF_LEN: usize = 8192;

/// Classify the head of a blob.
pub fn detect(head: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }

    if !head.is_empty() && is_utf8_prefix(head) {
        return "text/plain";
    }

    "application/octet-stream"
}

/// True when `head` is valid UTF-8, allowing one multibyte character cut
/// off at the sniff boundary.
fn is_utf8_prefix(head: &[u8]) -> bool {
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}
