//! Public device id generation.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of a generated public device id.
pub const PUBLIC_ID_LEN: usize = 12;

/// Generate a random alphanumeric public device id.
///
/// Uniqueness against existing ids is the registry's job.
pub fn generate_public_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_ID_LEN)
        .map(char::from)
        .collect()
}
