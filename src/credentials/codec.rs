//! Reversible mapping between registry server URLs and backend keys.
//!
//! Chamber lowercases keys and only accepts word characters, dashes and dots,
//! so the URL bytes are base32 encoded (a case-free alphabet once folded to
//! lowercase) and the `=` padding is swapped for [`FILLER`].

use std::fmt;

use data_encoding::BASE32;

/// Stand-in for base32 padding inside a storage key.
pub const FILLER: char = '_';

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid storage key {key:?}: unexpected character {character:?}")]
    InvalidCharacter { key: String, character: char },

    #[error("Invalid storage key {key:?}: {reason}")]
    InvalidPayload { key: String, reason: String },

    #[error("Invalid storage key {key:?}: decoded server URL is not valid UTF-8")]
    InvalidUtf8 { key: String },
}

/// Encode a server URL as a backend-safe storage key.
pub fn encode(server_url: &str) -> String {
    BASE32
        .encode(server_url.as_bytes())
        .to_ascii_lowercase()
        .replace('=', &FILLER.to_string())
}

/// Decode a storage key back into the server URL it was produced from.
pub fn decode(key: &str) -> Result<String, DecodeError> {
    if let Some(character) = key.chars().find(|c| !is_key_char(*c)) {
        return Err(DecodeError::InvalidCharacter {
            key: key.to_string(),
            character,
        });
    }

    let payload = key.to_ascii_uppercase().replace(FILLER, "=");
    let bytes = BASE32
        .decode(payload.as_bytes())
        .map_err(|e| DecodeError::InvalidPayload {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
        key: key.to_string(),
    })
}

/// Returns true for characters that may appear in an encoded key.
///
/// Only the lowercase form is accepted, so every server URL has exactly one
/// key that decodes to it.
pub fn is_key_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '2'..='7') || c == FILLER
}

/// Encoded key for a single server URL.
///
/// Only constructible from a server URL, so the store can never be handed a
/// raw backend key in place of one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn for_server(server_url: &str) -> Self {
        Self(encode(server_url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_roundtrip_registry_urls() {
        for url in [
            "http://www.example.org:433",
            "https://index.docker.io/v1/",
            "123456789012.dkr.ecr.us-east-1.amazonaws.com",
            "localhost:5000",
            "a",
            "ab",
            "abc",
            "abcd",
            "abcde",
        ] {
            let key = encode(url);
            assert_eq!(decode(&key).unwrap(), url, "key {key}");
        }
    }

    #[test]
    fn test_roundtrip_unicode() {
        let url = "https://régistre.example/ünïcode/日本";
        assert_eq!(decode(&encode(url)).unwrap(), url);
    }

    #[test]
    fn test_empty_url_is_empty_key() {
        assert_eq!(encode(""), "");
        assert_eq!(decode("").unwrap(), "");
    }

    #[test]
    fn test_key_alphabet_is_lowercase_and_filler() {
        let key = encode("HTTPS://Reg.Example.COM:8443/Path?q=1");
        assert!(!key.is_empty());
        assert_eq!(key.to_lowercase(), key);
        assert!(key
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c) || c == FILLER));
    }

    #[test]
    fn test_padding_replaced_with_filler() {
        // One byte needs six padding characters in base32.
        assert_eq!(encode("a"), "me______");
    }

    #[test]
    fn test_case_differences_in_url_produce_distinct_keys() {
        assert_ne!(encode("Registry"), encode("registry"));
    }

    #[test]
    fn test_decode_rejects_uppercased_key() {
        let key = encode("localhost:5000").to_uppercase();
        assert!(matches!(
            decode(&key),
            Err(DecodeError::InvalidCharacter { .. })
        ));
        assert_eq!(
            decode("ME______"),
            Err(DecodeError::InvalidCharacter {
                key: "ME______".to_string(),
                character: 'M',
            })
        );
        assert!(decode("mE______").is_err());
        assert_eq!(decode("me______").unwrap(), "a");
    }

    #[test]
    fn test_decode_rejects_foreign_characters() {
        let err = decode("aHR0cDovL2V4YW1wbGUub3Jn").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidCharacter { character: '0', .. }
        ));

        let err = decode("me====").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidCharacter { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let err = decode("mea").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload { .. }));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let key = BASE32.encode(&[0xff, 0xfe]).to_ascii_lowercase().replace('=', "_");
        assert_eq!(
            decode(&key),
            Err(DecodeError::InvalidUtf8 { key: key.clone() })
        );
    }

    #[test]
    fn test_storage_key_matches_encode() {
        let key = StorageKey::for_server("https://reg.example.com");
        assert_eq!(key.as_str(), encode("https://reg.example.com"));
        assert_eq!(key.to_string(), key.as_str());
    }

    fn printable_ascii() -> impl Strategy<Value = String> {
        "[ -~]{0,64}"
    }

    fn in_key_alphabet(key: &str) -> bool {
        key.chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c) || c == FILLER)
    }

    proptest! {
        #[test]
        fn roundtrip_any_string(url in any::<String>()) {
            prop_assert_eq!(decode(&encode(&url)).unwrap(), url);
        }

        #[test]
        fn roundtrip_printable_ascii(url in printable_ascii()) {
            prop_assert_eq!(decode(&encode(&url)).unwrap(), url);
        }

        #[test]
        fn key_alphabet_any_string(url in any::<String>()) {
            prop_assert!(in_key_alphabet(&encode(&url)));
        }

        #[test]
        fn key_alphabet_printable_ascii(url in printable_ascii()) {
            let key = encode(&url);
            prop_assert!(in_key_alphabet(&key), "key {}", key);
        }
    }
}
