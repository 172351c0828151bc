//! Decoding LaTeX sources that are not always UTF-8.

use encoding_rs::Encoding;
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Read `path` as text, trying each encoding label in order.
///
/// A byte-order mark wins over the configured list. When no listed encoding
/// decodes the bytes without errors, the encoding is guessed with `chardetng`
/// and decoded lossily. Returns the text and the name of the encoding used.
pub fn read_with_encodings(
    path: &Path,
    encodings: &[String],
) -> io::Result<(String, &'static str)> {
    let bytes = fs::read(path)?;
    Ok(decode_with_encodings(&bytes, encodings, path))
}

pub(crate) fn decode_with_encodings(
    bytes: &[u8],
    encodings: &[String],
    path: &Path,
) -> (String, &'static str) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), encoding.name());
    }

    for label in encodings {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            warn!("Unknown encoding label '{label}', skipping");
            continue;
        };
        match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            Some(Cow::Borrowed(text)) => return (text.to_string(), encoding.name()),
            Some(Cow::Owned(text)) => return (text, encoding.name()),
            None => debug!("{} is not valid {}", path.display(), encoding.name()),
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(None, true);
    warn!(
        "Unable to read {} with encodings [{}]; guessed {} (pass --encodings to override)",
        path.display(),
        encodings.join(", "),
        guessed.name()
    );
    let (text, _, _) = guessed.decode(bytes);
    (text.into_owned(), guessed.name())
}
