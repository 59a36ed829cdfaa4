mod session_token;

pub use session_token::{new_session_token, SESSION_TOKEN_LENGTH};

/// Renders a list of SKUs (or any names) for a user-facing message.
pub fn name_list<S: AsRef<str>>(names: &[S]) -> String {
    names.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", ")
}
