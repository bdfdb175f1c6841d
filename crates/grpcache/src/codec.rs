//! Text codec for cache state, parsed with nom
//!
//! Format:
//! ```text
//! <capacity:8 hex> SP <seed:8|16 hex> SP <entries>
//! entries := entry (SP entry)*
//! entry   := <hash:8 hex> "=" <digit>
//! ```
//!
//! Entries are listed MRU first. The header always ends in a space, so an
//! empty cache of capacity 50 with seed `0x6523abcd` is `"00000032 6523abcd "`.
//!
//! Older writers padded the 8-wide fields with spaces instead of zeros and
//! stored a trailing NUL; both are accepted on decode.

use std::fmt::{self, Write};

use nom::{
    branch::alt,
    bytes::complete::{tag, take, take_while_m_n},
    character::complete::{anychar, char, space0},
    combinator::{eof, map_res},
    sequence::{preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::cache::GroupCache;
use crate::error::{Error, Result};

/// Width of capacity and hash fields
const FIELD_WIDTH: usize = 8;

/// Width of one serialized entry, `hhhhhhhh=d`
const ENTRY_WIDTH: usize = FIELD_WIDTH + 2;

/// Serialize `cache` with entries in recency order
pub fn encode(cache: &GroupCache) -> String {
    let mut out = String::with_capacity(encoded_len(cache));
    // fmt::Write for String never errors
    write_encoded(cache, &mut out).map(|()| out).unwrap_or_default()
}

/// Write the serialized form of `cache` into `out`
///
/// Shared by [`encode`] and the `Display` impl of [`GroupCache`].
pub fn write_encoded<W: Write>(cache: &GroupCache, out: &mut W) -> fmt::Result {
    write!(out, "{:08x} ", cache.capacity())?;
    let seed = cache.seed();
    if seed > u32::MAX as u64 {
        write!(out, "{:016x} ", seed)?;
    } else {
        write!(out, "{:08x} ", seed)?;
    }

    for (i, (hash, value)) in cache.entries().enumerate() {
        if i > 0 {
            out.write_char(' ')?;
        }
        write!(out, "{:08x}={}", hash, value)?;
    }

    Ok(())
}

/// Exact length of `encode(cache)`
pub fn encoded_len(cache: &GroupCache) -> usize {
    let seed_width = if cache.seed() > u32::MAX as u64 { 16 } else { 8 };
    let entries = cache.len();
    let separators = entries.saturating_sub(1);

    FIELD_WIDTH + 1 + seed_width + 1 + entries * ENTRY_WIDTH + separators
}

/// Rebuild a cache from `blob`
///
/// Entries past the declared capacity are ignored. A repeated hash keeps its
/// first (most recent) position.
///
/// # Returns
/// * `Result<GroupCache>` - `Error::Parse` for malformed input,
///   `Error::InvalidCapacity` for a zero capacity header
pub fn decode(blob: &str) -> Result<GroupCache> {
    let input = blob.trim_end_matches('\0');

    let (mut rest, (capacity, seed)) = header(input)?;
    let mut cache = GroupCache::with_seed(capacity, seed)?;

    while !rest.is_empty() && !cache.is_full() {
        let (after, (hash, digit)) = entry(rest)?;
        let value = digit
            .to_digit(10)
            .ok_or_else(|| Error::Parse(format!("value {:?} is not a digit 0-9", digit)))?;
        cache.restore_entry(hash, value as u8);

        rest = separator(after)?.0;
    }

    Ok(cache)
}

/// Parse `<capacity> SP <seed> SP`, tolerating a missing final space at end of input
fn header(input: &str) -> IResult<&str, (u32, u64)> {
    terminated(
        separated_pair(hex_field, char(' '), seed),
        alt((tag(" "), eof)),
    )(input)
}

/// Parse one fixed-width `hash=d` entry; the digit is validated by the caller
fn entry(input: &str) -> IResult<&str, (u32, char)> {
    let (rest, (hash, _, digit)) = tuple((hex_field, char('='), anychar))(input)?;
    Ok((rest, (hash, digit)))
}

/// Consume the space between entries, or accept end of input
fn separator(input: &str) -> IResult<&str, &str> {
    alt((tag(" "), eof))(input)
}

/// 8-character hex field, optionally left-padded with spaces
fn hex_field(input: &str) -> IResult<&str, u32> {
    map_res(take(FIELD_WIDTH), |field: &str| {
        let digits = field.trim_start_matches(' ');
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Parse(format!("bad hex field {:?}", field)));
        }
        u32::from_str_radix(digits, 16).map_err(|e| Error::Parse(e.to_string()))
    })(input)
}

/// Seed of up to 16 hex digits, optionally left-padded with spaces
fn seed(input: &str) -> IResult<&str, u64> {
    map_res(
        preceded(space0, take_while_m_n(1, 16, |c: char| c.is_ascii_hexdigit())),
        |digits: &str| u64::from_str_radix(digits, 16),
    )(input)
}
