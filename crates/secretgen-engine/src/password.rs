//! Uniform sampling of password characters from a byte stream
//!
//! Indices are drawn by rejection sampling over the smallest number of bytes
//! that covers the charset, so the consumed entropy depends only on the
//! charset size and the replayed stream reproduces the same password.

use std::io::{self, Read};
use zeroize::Zeroizing;

/// Draw `length` characters uniformly from `charset`
pub fn generate_password(
    entropy: &mut impl Read,
    charset: &[u8],
    length: usize,
) -> io::Result<Zeroizing<Vec<u8>>> {
    let mut password = Zeroizing::new(Vec::with_capacity(length));

    for _ in 0..length {
        let index = uniform_index(entropy, charset.len())?;
        password.push(charset[index]);
    }

    Ok(password)
}

/// Uniform integer in `[0, bound)`. `bound` must be positive.
pub fn uniform_index(entropy: &mut impl Read, bound: usize) -> io::Result<usize> {
    if bound == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot sample from an empty range",
        ));
    }

    let max = (bound - 1) as u64;
    let bits = u64::BITS - max.leading_zeros();
    if bits == 0 {
        return Ok(0);
    }

    let len = bits.div_ceil(8) as usize;
    let top_bits = match bits % 8 {
        0 => 8,
        b => b,
    };
    let mask = ((1u16 << top_bits) - 1) as u8;

    let mut buf = [0u8; 8];
    loop {
        let bytes = &mut buf[..len];
        entropy.read_exact(bytes)?;
        bytes[0] &= mask;

        let candidate = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        if candidate <= max {
            return Ok(candidate as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_character_consumes_nothing() {
        let mut empty: &[u8] = &[];
        let password = generate_password(&mut empty, b"x", 5).unwrap();
        assert_eq!(password.as_slice(), b"xxxxx");
    }

    #[test]
    fn test_rejection_sampling() {
        // bound 3: max 2, two bits, mask 0b11
        // 0xff -> 3 rejected, 0x02 -> 2 accepted
        let mut stream: &[u8] = &[0xff, 0x02];
        assert_eq!(uniform_index(&mut stream, 3).unwrap(), 2);
        assert!(stream.is_empty());
    }

    #[test]
    fn test_multi_byte_index() {
        // bound 300: max 299, nine bits, two bytes with the top byte masked to one bit
        let mut stream: &[u8] = &[0xfe, 0x2b];
        assert_eq!(uniform_index(&mut stream, 300).unwrap(), 0x2b);
    }

    #[test]
    fn test_zero_stream_picks_first_character() {
        let password = generate_password(&mut io::repeat(0), b"abc", 4).unwrap();
        assert_eq!(password.as_slice(), b"aaaa");
    }

    #[test]
    fn test_exhausted_stream() {
        let mut stream: &[u8] = &[0x00];
        let err = generate_password(&mut stream, b"abcd", 2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_empty_charset() {
        let err = uniform_index(&mut io::repeat(0), 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_distribution_covers_charset() {
        let stream: Vec<u8> = (0..=255u8).collect();
        let password = generate_password(&mut &stream[..], b"0123456789", 100).unwrap();
        for c in b"0123456789" {
            assert!(password.contains(c), "missing {}", *c as char);
        }
    }
}
