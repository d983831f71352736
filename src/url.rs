//! Eddystone-URL compression: a scheme prefix byte followed by printable
//! ASCII, with common top-level domains folded into single expansion bytes.

use thiserror::Error;

use crate::constants::MAX_URI_DATA_LEN;

const SCHEMES: [&str; 4] = ["http://www.", "https://www.", "http://", "https://"];

const EXPANSIONS: [&str; 14] = [
    ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/",
    ".com", ".org", ".edu", ".net", ".info", ".biz", ".gov",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("empty URI data")]
    Empty,
    #[error("unsupported URL scheme")]
    UnsupportedScheme,
    #[error("unknown scheme prefix 0x{0:02x}")]
    UnknownSchemePrefix(u8),
    #[error("character 0x{0:02x} cannot be encoded")]
    InvalidCharacter(u8),
    #[error("encoded URL is {0} bytes, limit is {max}", max = MAX_URI_DATA_LEN)]
    TooLong(usize),
}

pub fn encode(url: &str) -> Result<Vec<u8>, UrlError> {
    // "http://www." must win over "http://"
    let (prefix, scheme) = SCHEMES
        .iter()
        .enumerate()
        .filter(|(_, scheme)| url.starts_with(*scheme))
        .max_by_key(|(_, scheme)| scheme.len())
        .ok_or(UrlError::UnsupportedScheme)?;

    let mut encoded = vec![prefix as u8];
    let mut rest = &url[scheme.len()..];
    'outer: while !rest.is_empty() {
        for (code, expansion) in EXPANSIONS.iter().enumerate() {
            if let Some(tail) = rest.strip_prefix(expansion) {
                encoded.push(code as u8);
                rest = tail;
                continue 'outer;
            }
        }
        let byte = rest.as_bytes()[0];
        if !is_url_char(byte) {
            return Err(UrlError::InvalidCharacter(byte));
        }
        encoded.push(byte);
        rest = &rest[1..];
    }

    if encoded.len() > MAX_URI_DATA_LEN {
        return Err(UrlError::TooLong(encoded.len()));
    }
    Ok(encoded)
}

pub fn decode(data: &[u8]) -> Result<String, UrlError> {
    let (&prefix, body) = data.split_first().ok_or(UrlError::Empty)?;
    if data.len() > MAX_URI_DATA_LEN {
        return Err(UrlError::TooLong(data.len()));
    }
    let scheme = SCHEMES
        .get(prefix as usize)
        .ok_or(UrlError::UnknownSchemePrefix(prefix))?;

    let mut url = String::from(*scheme);
    for &byte in body {
        match EXPANSIONS.get(byte as usize) {
            Some(expansion) => url.push_str(expansion),
            None if is_url_char(byte) => url.push(byte as char),
            None => return Err(UrlError::InvalidCharacter(byte)),
        }
    }
    Ok(url)
}

fn is_url_char(byte: u8) -> bool {
    (0x21..=0x7e).contains(&byte)
}
