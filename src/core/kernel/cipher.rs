use crate::core::errors::SourceError;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// Blowfish block size in bytes.
const BLOCK_SIZE: usize = 8;

/// Blowfish-ECB codec producing the hex-on-the-wire encoding the radio
/// protocol uses for request signing and server-time decoding.
///
/// Plaintext is NUL-padded up to a block boundary before encryption;
/// decryption strips the trailing NULs again. ECB with fixed keys is what the
/// upstream protocol mandates - this is request obfuscation, not
/// confidentiality.
pub struct BlowfishCodec {
    cipher: blowfish::Blowfish,
}

impl BlowfishCodec {
    /// Create a codec from a raw key (4 to 56 bytes).
    pub fn new(key: &[u8]) -> Result<Self, SourceError> {
        let cipher = blowfish::Blowfish::new_from_slice(key)
            .map_err(|e| SourceError::Cipher(format!("invalid key length: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Encrypt UTF-8 text and hex-encode the ciphertext (lowercase).
    pub fn encrypt_hex(&self, plaintext: &str) -> Result<String, SourceError> {
        let mut bytes = plaintext.as_bytes().to_vec();
        let remainder = bytes.len() % BLOCK_SIZE;
        if remainder != 0 {
            bytes.resize(bytes.len() + BLOCK_SIZE - remainder, 0);
        }

        for chunk in bytes.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            self.cipher.encrypt_block(block);
        }

        Ok(hex::encode(bytes))
    }

    /// Hex-decode and decrypt ciphertext back to the original UTF-8 text.
    pub fn decrypt_hex(&self, hex_ciphertext: &str) -> Result<String, SourceError> {
        let mut bytes = hex::decode(hex_ciphertext.trim())
            .map_err(|e| SourceError::Cipher(format!("invalid hex ciphertext: {}", e)))?;

        if bytes.len() % BLOCK_SIZE != 0 {
            return Err(SourceError::Cipher(format!(
                "ciphertext length {} is not block aligned",
                bytes.len()
            )));
        }

        for chunk in bytes.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            self.cipher.decrypt_block(block);
        }

        while bytes.last() == Some(&0) {
            bytes.pop();
        }

        String::from_utf8(bytes)
            .map_err(|e| SourceError::Cipher(format!("plaintext is not valid UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"unit-test-key";

    #[test]
    fn encrypt_then_decrypt_restores_text() {
        let codec = BlowfishCodec::new(KEY).unwrap();
        // Deliberately not block aligned (21 bytes) to exercise padding.
        let text = r#"{"loginType":"user"}x"#;
        let ct = codec.encrypt_hex(text).unwrap();
        assert_ne!(ct, text);
        assert_eq!(ct.len() % (BLOCK_SIZE * 2), 0);
        assert_eq!(codec.decrypt_hex(&ct).unwrap(), text);
    }

    #[test]
    fn decrypt_rejects_bad_input() {
        let codec = BlowfishCodec::new(KEY).unwrap();
        assert!(matches!(
            codec.decrypt_hex("zz-not-hex"),
            Err(SourceError::Cipher(_))
        ));
        // Valid hex but not a multiple of the block size.
        assert!(matches!(
            codec.decrypt_hex("aabbcc"),
            Err(SourceError::Cipher(_))
        ));
    }

    #[test]
    fn rejects_invalid_key() {
        assert!(matches!(
            BlowfishCodec::new(b"abc"),
            Err(SourceError::Cipher(_))
        ));
    }

    #[test]
    fn keys_are_not_interchangeable() {
        let enc = BlowfishCodec::new(b"key-one!").unwrap();
        let dec = BlowfishCodec::new(b"key-two!").unwrap();
        let ct = enc.encrypt_hex("1234567890").unwrap();
        let wrong = dec.decrypt_hex(&ct);
        // Either fails UTF-8 validation or yields different text.
        match wrong {
            Ok(text) => assert_ne!(text, "1234567890"),
            Err(SourceError::Cipher(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
