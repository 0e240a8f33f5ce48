//! Short, human-shareable room keys

use crate::{error::SignalingError, protocol::RoomKey};
use rand::Rng;

/// Number of characters in a room key
pub const KEY_LEN: usize = 6;

/// Characters a room key is drawn from
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Upper bound on draws before giving up. With 36^6 keys this is only hit
/// when nearly every key is live.
pub const MAX_ATTEMPTS: usize = 1024;

/// Draw a single candidate key
pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> RoomKey {
    let key = (0..KEY_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    RoomKey(key)
}

/// Draw keys until one is not live
pub fn generate<R, F>(rng: &mut R, is_live: F) -> Result<RoomKey, SignalingError>
where
    R: Rng + ?Sized,
    F: Fn(&RoomKey) -> bool,
{
    for _ in 0..MAX_ATTEMPTS {
        let key = draw(rng);
        if !is_live(&key) {
            return Ok(key);
        }
    }
    Err(SignalingError::CapacityExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    #[test]
    fn keys_are_six_uppercase_alphanumerics() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let key = draw(&mut rng);
            assert_eq!(key.0.len(), KEY_LEN);
            assert!(
                key.0
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn skips_live_keys() {
        let taken = draw(&mut StdRng::seed_from_u64(42));
        let mut rng = StdRng::seed_from_u64(42);
        let key = generate(&mut rng, |k| *k == taken).unwrap();
        assert_ne!(key, taken);
    }

    #[test]
    fn generated_keys_avoid_everything_already_live() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut live = HashSet::new();
        for _ in 0..500 {
            let key = generate(&mut rng, |k| live.contains(k)).unwrap();
            assert!(live.insert(key));
        }
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = generate(&mut rng, |_| true).unwrap_err();
        assert!(matches!(
            err,
            SignalingError::CapacityExhausted {
                attempts: MAX_ATTEMPTS
            }
        ));
    }
}
