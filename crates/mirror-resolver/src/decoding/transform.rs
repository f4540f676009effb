//! Character level transforms found in home-grown obfuscation schemes.

use super::error::DecodeError;

/// ROT13 over ASCII letters; everything else passes through.
pub fn rot13(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            _ => c,
        })
        .collect()
}

/// Shifts every code point by `delta`.
pub fn shift_chars(input: &str, delta: i32) -> Result<String, DecodeError> {
    input
        .chars()
        .map(|c| {
            let shifted = (c as i64) + i64::from(delta);
            u32::try_from(shifted)
                .ok()
                .and_then(char::from_u32)
                .ok_or(DecodeError::InvalidCharacter(shifted.max(0) as u32))
        })
        .collect()
}

pub fn reverse(input: &str) -> String {
    input.chars().rev().collect()
}

/// Rotates printable ASCII (`!`..=`~`) by 47 positions, the scheme CDA uses
/// for its obfuscated file keys.
pub fn rotate_printable(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            let code = c as u32;
            if (33..=126).contains(&code) {
                char::from_u32(33 + (code + 14) % 94).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rot13() {
        assert_eq!(rot13("Hello, World!"), "Uryyb, Jbeyq!");
        assert_eq!(rot13(&rot13("abcXYZ")), "abcXYZ");
    }

    #[test]
    fn test_shift_chars() {
        assert_eq!(shift_chars("def", -3).unwrap(), "abc");
        assert_eq!(shift_chars("abc", 7).unwrap(), "hij");
        assert!(shift_chars("\u{1}", -3).is_err());
    }

    #[test]
    fn test_reverse() {
        assert_eq!(reverse("abc"), "cba");
    }

    #[test]
    fn test_rotate_printable_is_an_involution() {
        let original = "cda.pl/video/abc_XYZ~!";
        assert_eq!(rotate_printable(&rotate_printable(original)), original);
        assert_eq!(rotate_printable("!"), "P");
    }
}
