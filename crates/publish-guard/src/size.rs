//! Decoded-size estimation for base64 attachments.
//!
//! Four encoded characters carry three bytes; every trailing `=` stands for
//! one byte that is not there. The estimate is exact for well-formed input
//! and never needs the decoded bytes.

use thiserror::Error;

/// Attachment size rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SizeError {
    #[error("Attachment data is empty.")]
    Empty,

    #[error("File is too large.")]
    TooLarge { size: u64, max: u64 },
}

/// Decoded size of a base64 payload of `encoded_len` characters ending in
/// `padding` `=` characters.
pub fn estimated_decoded_size(encoded_len: u64, padding: u8) -> u64 {
    (encoded_len.saturating_mul(3) / 4).saturating_sub(u64::from(padding))
}

/// Admit an attachment by its encoded shape alone.
///
/// Returns the decoded size on success.
pub fn check_attachment_size(encoded_len: u64, padding: u8, max_size: u64) -> Result<u64, SizeError> {
    if encoded_len == 0 {
        return Err(SizeError::Empty);
    }

    let size = estimated_decoded_size(encoded_len, padding);
    if size > max_size {
        return Err(SizeError::TooLarge { size, max: max_size });
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use proptest::prelude::*;

    fn padding_of(encoded: &str) -> u8 {
        encoded.bytes().rev().take(2).filter(|b| *b == b'=').count() as u8
    }

    #[test]
    fn test_known_vectors() {
        // "Hello!", "Hello", "Hell"
        for (encoded, expected) in [("SGVsbG8h", 6), ("SGVsbG8=", 5), ("SGVsbA==", 4), ("aGVsbG8K", 6)] {
            let size = estimated_decoded_size(encoded.len() as u64, padding_of(encoded));
            assert_eq!(size, expected, "decoded size of {}", encoded);
        }
    }

    #[test]
    fn test_empty_is_its_own_rejection() {
        assert_eq!(estimated_decoded_size(0, 0), 0);
        assert_eq!(check_attachment_size(0, 0, 100), Err(SizeError::Empty));
        assert_eq!(check_attachment_size(0, 0, 0), Err(SizeError::Empty));
    }

    #[test]
    fn test_too_large() {
        assert_eq!(
            check_attachment_size(8, 0, 5),
            Err(SizeError::TooLarge { size: 6, max: 5 })
        );
        assert_eq!(
            check_attachment_size(8, 1, 4),
            Err(SizeError::TooLarge { size: 5, max: 4 })
        );
        assert_eq!(
            check_attachment_size(8, 2, 3),
            Err(SizeError::TooLarge { size: 4, max: 3 })
        );
    }

    #[test]
    fn test_at_limit_is_accepted() {
        assert_eq!(check_attachment_size(8, 0, 6), Ok(6));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(SizeError::Empty.to_string(), "Attachment data is empty.");
        assert_eq!(SizeError::TooLarge { size: 6, max: 5 }.to_string(), "File is too large.");
    }

    proptest! {
        #[test]
        fn prop_matches_real_decoding(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = STANDARD.encode(&bytes);
            let size = estimated_decoded_size(encoded.len() as u64, padding_of(&encoded));
            prop_assert_eq!(size, bytes.len() as u64);
        }

        #[test]
        fn prop_identity_holds(len in 0u64..1_000_000, padding in 0u8..=2) {
            let expected = ((len * 3) / 4).saturating_sub(u64::from(padding));
            prop_assert_eq!(estimated_decoded_size(len, padding), expected);
        }
    }
}
