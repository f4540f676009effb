use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packed script signature not found")]
    PackerSignatureMissing,
    #[error("packed script symbol table has {actual} entries, {declared} declared")]
    SymbolTableMismatch { declared: usize, actual: usize },
    #[error("unsupported radix: {0}")]
    UnsupportedRadix(u32),
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
    #[error("base64 error: {0}")]
    Base64(String),
    #[error("hex error: {0}")]
    Hex(String),
    #[error("invalid key length: {0} bytes")]
    InvalidKeyLength(usize),
    #[error("invalid iv length: {0} bytes")]
    InvalidIvLength(usize),
    #[error("payload too short: {0} bytes")]
    PayloadTooShort(usize),
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("authentication tag mismatch")]
    Authentication,
    #[error("shifted code point {0:#x} is not a valid character")]
    InvalidCharacter(u32),
    #[error("decoded payload is not valid utf-8")]
    Utf8,
}

impl From<::base64::DecodeError> for DecodeError {
    fn from(err: ::base64::DecodeError) -> Self {
        DecodeError::Base64(err.to_string())
    }
}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        DecodeError::Hex(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        DecodeError::Utf8
    }
}
