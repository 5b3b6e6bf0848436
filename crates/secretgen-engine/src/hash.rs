//! Password hashes with salts drawn from the generation entropy

use crate::entropy::Entropy;
use crate::error::GenerateError;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

pub const SALT_LEN: usize = 16;
pub const ARGON2_KEY_LEN: usize = 32;

/// Cost parameters of an Argon2id hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2idCost {
    /// Memory in KiB
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// Argon2id hash of `password` in PHC string format
pub fn hash_argon2id(
    entropy: &mut Entropy,
    password: &[u8],
    cost: Argon2idCost,
) -> Result<String, GenerateError> {
    let mut salt = [0u8; SALT_LEN];
    entropy.fill(&mut salt)?;

    let params = Params::new(
        cost.memory,
        cost.iterations,
        cost.parallelism,
        Some(ARGON2_KEY_LEN),
    )
    .map_err(|e| GenerateError::Hash(format!("invalid argon2id parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let salt = SaltString::encode_b64(&salt).map_err(|e| GenerateError::Hash(e.to_string()))?;
    let hash = argon2
        .hash_password(password, &salt)
        .map_err(|e| GenerateError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// bcrypt hash of `password` with a `$2a$` prefix
pub fn hash_bcrypt(
    entropy: &mut Entropy,
    password: &[u8],
    rounds: u32,
) -> Result<String, GenerateError> {
    let mut salt = [0u8; SALT_LEN];
    entropy.fill(&mut salt)?;

    let parts = bcrypt::hash_with_salt(password, rounds, salt)
        .map_err(|e| GenerateError::Hash(e.to_string()))?;
    Ok(parts.format_for_version(bcrypt::Version::TwoA))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    use std::io;

    const COST: Argon2idCost = Argon2idCost {
        memory: 64,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn test_argon2id_format_and_verify() {
        let hash = hash_argon2id(&mut Entropy::from_reader(io::repeat(0)), b"pw", COST).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=64,t=1,p=1$"), "{hash}");

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"pw", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"other", &parsed).is_err());
    }

    #[test]
    fn test_argon2id_is_deterministic_for_fixed_entropy() {
        let a = hash_argon2id(&mut Entropy::from_reader(io::repeat(1)), b"pw", COST).unwrap();
        let b = hash_argon2id(&mut Entropy::from_reader(io::repeat(1)), b"pw", COST).unwrap();
        let c = hash_argon2id(&mut Entropy::from_reader(io::repeat(2)), b"pw", COST).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_argon2id_invalid_cost() {
        let cost = Argon2idCost {
            parallelism: 0,
            ..COST
        };
        let err = hash_argon2id(&mut Entropy::from_reader(io::repeat(0)), b"pw", cost).unwrap_err();
        assert!(matches!(err, GenerateError::Hash(_)));
    }

    #[test]
    fn test_bcrypt_format_and_verify() {
        let hash = hash_bcrypt(&mut Entropy::from_reader(io::repeat(0)), b"pw", 5).unwrap();
        assert!(hash.starts_with("$2a$05$"), "{hash}");
        assert_eq!(hash.len(), 60);
        assert!(bcrypt::verify(b"pw", &hash).unwrap());
    }

    #[test]
    fn test_bcrypt_known_answers() {
        // jBCrypt test vector, salt "If6bvum7DFjUnE9p2uDeDu"
        let salt = vec![
            42, 31, 29, 199, 10, 61, 20, 121, 86, 164, 111, 235, 227, 1, 96, 23,
        ];
        let hash = hash_bcrypt(&mut Entropy::replay(zeroize::Zeroizing::new(salt)), b"abc", 6)
            .unwrap();
        assert_eq!(
            hash,
            "$2a$06$If6bvum7DFjUnE9p2uDeDu0YHzrHM6tf.iqN8.yx.jNN1ILEf7h0i"
        );

        let salt: Vec<u8> = (0..16).collect();
        let hash = hash_bcrypt(
            &mut Entropy::replay(zeroize::Zeroizing::new(salt)),
            b"hunter2",
            5,
        )
        .unwrap();
        assert_eq!(
            hash,
            "$2a$05$..CA.uOD/eaGAOmJB.yMBug2q2CK1LPMlnGrOl3jjoYwsl5.AMMFW"
        );
    }

    #[test]
    fn test_salt_needs_entropy() {
        let mut short = Entropy::replay(zeroize::Zeroizing::new(vec![0u8; 4]));
        let err = hash_bcrypt(&mut short, b"pw", 5).unwrap_err();
        assert!(matches!(err, GenerateError::EntropyExhausted));
    }
}
