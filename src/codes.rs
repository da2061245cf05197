use rand::Rng;
use sqids::Sqids;
use uuid::Uuid;

/// Length of a game join code.
pub const GAME_CODE_LEN: usize = 6;

/// Alphabet for join codes. Excludes 0/O and 1/I to keep codes readable
/// when shouted across a field.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random 6-character join code. Collision checking against
/// existing games is the caller's responsibility.
pub fn generate_game_code<R: Rng>(rng: &mut R) -> String {
    (0..GAME_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_game_code(code: &str) -> bool {
    code.len() == GAME_CODE_LEN
        && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

fn sqids_instance() -> Sqids {
    Sqids::builder()
        .min_length(6)
        .build()
        .expect("valid sqids config")
}

/// Compact, URL-safe form of a player id for share links.
pub fn uuid_to_short_id(uuid: Uuid) -> String {
    let bytes = uuid.as_bytes();
    let high = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let low = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    sqids_instance().encode(&[high, low]).expect("sqids encode")
}

pub fn short_id_to_uuid(short_id: &str) -> Option<Uuid> {
    let nums = sqids_instance().decode(short_id);
    if nums.len() != 2 {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&nums[0].to_be_bytes());
    bytes[8..16].copy_from_slice(&nums[1].to_be_bytes());
    Some(Uuid::from_bytes(bytes))
}
