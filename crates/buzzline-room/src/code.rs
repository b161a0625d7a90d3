use buzzline_protocol::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode};
use rand::Rng;

/// Draws a random 5-character room code from the unambiguous alphabet.
///
/// Uniqueness is not checked here; the manager retries on collision.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    let indices: [usize; ROOM_CODE_LEN] = std::array::from_fn(|_| rng.random_range(0..ROOM_CODE_ALPHABET.len()));
    RoomCode::from_alphabet_indices(indices)
}
