//! Unpacker for `eval(function(p,a,c,k,e,d){...})` packed scripts.
//!
//! The packer replaces every identifier of the original script with its
//! index into a symbol table, written in base `a`. Unpacking captures the
//! payload, radix, declared symbol count and the `|`-joined table, then
//! substitutes every word of the payload back.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rustc_hash::FxHashMap;

use super::error::DecodeError;

static SIGNATURE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eval\s*\(\s*function\s*\(\s*p\s*,\s*a\s*,\s*c\s*,\s*k\s*,\s*e\s*,").unwrap()
});

static ARGS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\}\s*\('(.*)'\s*,\s*(.*?)\s*,\s*(\d+)\s*,\s*'(.*?)'\.split\('\|'\)").unwrap()
});

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

const ALPHABET_62: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHABET_95: &str = " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Returns `true` when `source` contains a packed script.
pub fn detect(source: &str) -> bool {
    SIGNATURE_REGEX.is_match(source)
}

/// Unpacks the first packed script found in `source`.
///
/// The declared symbol count must equal the table length; anything else is
/// treated as a corrupted script and rejected.
pub fn unpack(source: &str) -> Result<String, DecodeError> {
    let args = PackedArgs::parse(source)?;

    if args.count != args.symtab.len() {
        return Err(DecodeError::SymbolTableMismatch {
            declared: args.count,
            actual: args.symtab.len(),
        });
    }

    let unbaser = Unbaser::new(args.radix)?;
    let payload = args.payload.replace("\\\\", "\\").replace("\\'", "'");

    let unpacked = WORD_REGEX.replace_all(&payload, |caps: &Captures<'_>| {
        let word = &caps[0];
        unbaser
            .unbase(word)
            .and_then(|index| args.symtab.get(index))
            .filter(|symbol| !symbol.is_empty())
            .map(|symbol| symbol.to_string())
            .unwrap_or_else(|| word.to_string())
    });

    Ok(unpacked.into_owned())
}

struct PackedArgs<'a> {
    payload: &'a str,
    radix: u32,
    count: usize,
    symtab: Vec<&'a str>,
}

impl<'a> PackedArgs<'a> {
    fn parse(source: &'a str) -> Result<Self, DecodeError> {
        let caps = ARGS_REGEX
            .captures(source)
            .ok_or(DecodeError::PackerSignatureMissing)?;

        let payload = caps.get(1).map_or("", |m| m.as_str());
        let radix_raw = caps.get(2).map_or("", |m| m.as_str());
        // `[]` and similar expressions stand for the default radix
        let radix = if !radix_raw.is_empty() && radix_raw.chars().all(|c| c.is_ascii_digit()) {
            radix_raw
                .parse()
                .map_err(|_| DecodeError::UnsupportedRadix(u32::MAX))?
        } else {
            36
        };
        let symtab: Vec<&str> = caps.get(4).map_or("", |m| m.as_str()).split('|').collect();
        let count = caps
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or(DecodeError::SymbolTableMismatch {
                declared: usize::MAX,
                actual: symtab.len(),
            })?;

        Ok(Self {
            payload,
            radix,
            count,
            symtab,
        })
    }
}

/// Converts radix-N words back to symbol table indices.
enum Unbaser {
    Native(u32),
    Table {
        base: u64,
        digits: FxHashMap<char, u64>,
    },
}

impl Unbaser {
    fn new(radix: u32) -> Result<Self, DecodeError> {
        match radix {
            2..=36 => Ok(Unbaser::Native(radix)),
            37..=62 => Ok(Self::table(&ALPHABET_62[..radix as usize], radix)),
            63..=95 => Ok(Self::table(&ALPHABET_95[..radix as usize], radix)),
            _ => Err(DecodeError::UnsupportedRadix(radix)),
        }
    }

    fn table(alphabet: &str, radix: u32) -> Self {
        let digits = alphabet
            .chars()
            .enumerate()
            .map(|(index, c)| (c, index as u64))
            .collect();
        Unbaser::Table {
            base: u64::from(radix),
            digits,
        }
    }

    fn unbase(&self, word: &str) -> Option<usize> {
        match self {
            Unbaser::Native(radix) => u64::from_str_radix(word, *radix)
                .ok()
                .and_then(|v| usize::try_from(v).ok()),
            Unbaser::Table { base, digits } => {
                let mut value: u64 = 0;
                for c in word.chars() {
                    let digit = digits.get(&c)?;
                    value = value.checked_mul(*base)?.checked_add(*digit)?;
                }
                usize::try_from(value).ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKED: &str = r#"<script>eval(function(p,a,c,k,e,d){e=function(c){return c.toString(36)};if(!''.replace(/^/,String)){while(c--){d[c.toString(a)]=k[c]||c.toString(a)}k=[function(e){return d[e]}];e=function(){return'\\w+'};c=1};while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}return p}('0 1=\'2://3.4/5.6\';7.8({9:[{a:1}]})',36,11,'var|src|https|cdn|example|hls|m3u8|jwplayer|setup|sources|file'.split('|'),0,{}))</script>"#;

    #[test]
    fn test_detect() {
        assert!(detect(PACKED));
        assert!(detect("eval (function( p, a, c, k, e, d) {}"));
        assert!(!detect("<script>jwplayer.setup({})</script>"));
    }

    #[test]
    fn test_unpack_fixture() {
        assert_eq!(
            unpack(PACKED).unwrap(),
            "var src='https://cdn.example/hls.m3u8';jwplayer.setup({sources:[{file:src}]})"
        );
    }

    #[test]
    fn test_unpack_rejects_symbol_count_mismatch() {
        let corrupted = PACKED.replace(",36,11,", ",36,12,");
        assert_eq!(
            unpack(&corrupted),
            Err(DecodeError::SymbolTableMismatch {
                declared: 12,
                actual: 11
            })
        );
        // deterministic: same input, same failure
        assert_eq!(unpack(&corrupted), unpack(&corrupted));
    }

    #[test]
    fn test_unpack_without_signature() {
        assert_eq!(
            unpack("var a = 1;"),
            Err(DecodeError::PackerSignatureMissing)
        );
    }

    #[test]
    fn test_empty_symbol_keeps_word() {
        let source = "}('0 1 2',10,3,'a||c'.split('|'))";
        assert_eq!(unpack(source).unwrap(), "a 1 c");
    }

    #[test]
    fn test_non_numeric_radix_defaults_to_36() {
        let source = "}('a b',[],11,'0|1|2|3|4|5|6|7|8|9|ten'.split('|'))";
        assert_eq!(unpack(source).unwrap(), "ten b");
    }

    #[test]
    fn test_radix_62_alphabet() {
        let symtab = (0..37).map(|i| format!("s{i}")).collect::<Vec<_>>().join("|");
        let source = format!("}}('A b',62,37,'{symtab}'.split('|'))");
        assert_eq!(unpack(&source).unwrap(), "s36 s11");
    }

    #[test]
    fn test_unsupported_radix() {
        let source = "}('0',200,1,'x'.split('|'))";
        assert_eq!(unpack(source), Err(DecodeError::UnsupportedRadix(200)));
    }
}
