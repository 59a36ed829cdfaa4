use rand::{distributions::Alphanumeric, Rng};

pub const SESSION_TOKEN_LENGTH: usize = 32;

/// A fresh, unguessable token that a client presents to answer a two-factor challenge.
pub fn new_session_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(SESSION_TOKEN_LENGTH).map(char::from).collect()
}
