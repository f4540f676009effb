//! AES payload decryption.
//!
//! Both variants fail closed: a bad key, bad padding or a tag mismatch is an
//! error, never a buffer of garbage.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce, Tag};
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};

use super::base64::{decode_url_safe, join_decoded};
use super::error::DecodeError;

const BLOCK_SIZE: usize = 16;
const GCM_TAG_SIZE: usize = 16;
const GCM_NONCE_SIZE: usize = 12;

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-CBC with PKCS7 padding. The first 16 bytes of `payload` are the IV.
pub fn decrypt_aes_cbc(key: &[u8], payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if payload.len() < BLOCK_SIZE * 2 {
        return Err(DecodeError::PayloadTooShort(payload.len()));
    }
    let (iv, ciphertext) = payload.split_at(BLOCK_SIZE);
    let init_err = |e: aes::cipher::InvalidLength| DecodeError::Decryption(e.to_string());

    let plaintext = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(init_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(init_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(init_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        n => return Err(DecodeError::InvalidKeyLength(n)),
    };

    plaintext.map_err(|e| DecodeError::Decryption(e.to_string()))
}

/// Hex encoded key and `iv || ciphertext` payload, decrypted to text.
pub fn decrypt_aes_cbc_hex(key_hex: &str, payload_hex: &str) -> Result<String, DecodeError> {
    let key = hex::decode(key_hex.trim())?;
    let payload = hex::decode(payload_hex.trim())?;
    Ok(String::from_utf8(decrypt_aes_cbc(&key, &payload)?)?)
}

/// AES-GCM where `payload` is `ciphertext || tag` with a 16 byte tag.
pub fn decrypt_aes_gcm(key: &[u8], iv: &[u8], payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if iv.len() != GCM_NONCE_SIZE {
        return Err(DecodeError::InvalidIvLength(iv.len()));
    }
    if payload.len() < GCM_TAG_SIZE {
        return Err(DecodeError::PayloadTooShort(payload.len()));
    }

    let (ciphertext, tag) = payload.split_at(payload.len() - GCM_TAG_SIZE);
    let nonce = Nonce::from_slice(iv);
    let tag = Tag::from_slice(tag);
    let mut buffer = ciphertext.to_vec();
    let init_err = |_| DecodeError::InvalidKeyLength(key.len());

    let verified = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(init_err)?
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(init_err)?
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag),
        n => return Err(DecodeError::InvalidKeyLength(n)),
    };

    verified.map_err(|_| DecodeError::Authentication)?;
    Ok(buffer)
}

/// AES-GCM with key fragments, IV and payload all delivered as URL-safe base64.
pub fn decrypt_aes_gcm_encoded<S: AsRef<str>>(
    key_parts: &[S],
    iv: &str,
    payload: &str,
) -> Result<Vec<u8>, DecodeError> {
    let key = join_decoded(key_parts)?;
    let iv = decode_url_safe(iv)?;
    let payload = decode_url_safe(payload)?;
    decrypt_aes_gcm(&key, &iv, &payload)
}
