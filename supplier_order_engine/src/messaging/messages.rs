use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages pushed to a user over the two-factor channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    TwoFaRequired { session_token: String, prompt_message: String, expires_at: DateTime<Utc>, supplier_name: String },
    CodeResult { success: bool, error: Option<String>, can_retry: bool, attempts_remaining: i64 },
    Cancelled { session_token: String },
    Error { message: String },
}

impl ServerMessage {
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error { message: message.into() }
    }

    pub fn code_accepted() -> Self {
        Self::CodeResult { success: true, error: None, can_retry: false, attempts_remaining: 0 }
    }

    pub fn code_rejected<S: Into<String>>(error: S, attempts_remaining: i64) -> Self {
        Self::CodeResult {
            success: false,
            error: Some(error.into()),
            can_retry: attempts_remaining > 0,
            attempts_remaining,
        }
    }
}

/// Actions a client sends over the two-factor channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    SubmitCode { session_token: String, code: String },
    Cancel { session_token: String },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_format() {
        let msg = ServerMessage::code_rejected("Invalid code", 2);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "code_result");
        assert_eq!(json["can_retry"], true);
        assert_eq!(json["attempts_remaining"], 2);

        let action: ClientAction =
            serde_json::from_str(r#"{"action":"submit_code","session_token":"abc","code":"123456"}"#).unwrap();
        assert_eq!(action, ClientAction::SubmitCode { session_token: "abc".into(), code: "123456".into() });
    }

    #[test]
    fn last_attempt_cannot_retry() {
        let ServerMessage::CodeResult { can_retry, .. } = ServerMessage::code_rejected("nope", 0) else {
            panic!("expected a code result");
        };
        assert!(!can_retry);
    }
}
