//! Random byte generation for challenges, user handles and credential ids.

use rand::RngCore;

/// Generate `len` bytes from the thread-local CSPRNG.
pub fn random_vec(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}
