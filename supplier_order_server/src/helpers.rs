use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use bytes::Bytes;
use futures::{stream, Stream};
use log::*;
use supplier_order_engine::messaging::ServerMessage;
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "sog_user_id";

/// The caller's user id, as set by the authenticating proxy in front of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SogUserId(pub i64);

impl SogUserId {
    pub fn from_request_headers(req: &HttpRequest) -> Result<Self, ServerError> {
        let value = req.headers().get(USER_ID_HEADER).ok_or(ServerError::MissingUserId)?;
        let value = value.to_str().map_err(|e| ServerError::InvalidUserId(e.to_string()))?;
        let id = value.trim().parse::<i64>().map_err(|e| ServerError::InvalidUserId(format!("{value}: {e}")))?;
        if id <= 0 {
            return Err(ServerError::InvalidUserId(format!("{id} is not a valid user id")));
        }
        Ok(Self(id))
    }
}

impl FromRequest for SogUserId {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = Self::from_request_headers(req);
        if let Err(e) = &result {
            debug!("💻️ Rejecting request to {}. {e}", req.path());
        }
        ready(result)
    }
}

/// Formats a message as a single Server-Sent Events frame.
pub fn sse_frame(message: &ServerMessage) -> Bytes {
    match serde_json::to_string(message) {
        Ok(json) => Bytes::from(format!("data: {json}\n\n")),
        Err(e) => {
            error!("💻️ Could not serialize {message:?}. {e}");
            Bytes::from_static(b": dropped\n\n")
        },
    }
}

/// Turns a user's message subscription into an SSE body. The stream ends when the topic closes. A subscriber that falls
/// behind skips the messages it missed.
pub fn sse_stream(receiver: Receiver<ServerMessage>) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    stream::unfold(receiver, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(message) => return Some((Ok(sse_frame(&message)), rx)),
                Err(RecvError::Lagged(n)) => warn!("💻️ Event stream fell behind and skipped {n} messages"),
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;
    use futures::StreamExt;
    use tokio::sync::broadcast;

    use super::*;

    #[test]
    fn user_id_header() {
        let req = TestRequest::default().insert_header((USER_ID_HEADER, "42")).to_http_request();
        assert_eq!(SogUserId::from_request_headers(&req).unwrap(), SogUserId(42));

        let req = TestRequest::default().to_http_request();
        assert!(matches!(SogUserId::from_request_headers(&req), Err(ServerError::MissingUserId)));

        let req = TestRequest::default().insert_header((USER_ID_HEADER, "alice")).to_http_request();
        assert!(matches!(SogUserId::from_request_headers(&req), Err(ServerError::InvalidUserId(_))));

        let req = TestRequest::default().insert_header((USER_ID_HEADER, "0")).to_http_request();
        assert!(matches!(SogUserId::from_request_headers(&req), Err(ServerError::InvalidUserId(_))));
    }

    #[tokio::test]
    async fn messages_become_sse_frames() {
        let (tx, rx) = broadcast::channel(4);
        tx.send(ServerMessage::error("Supplier unavailable")).unwrap();
        drop(tx);
        let frames = sse_stream(rx).collect::<Vec<_>>().await;
        assert_eq!(frames.len(), 1);
        let frame = frames[0].as_ref().unwrap();
        assert_eq!(frame, &Bytes::from("data: {\"type\":\"error\",\"message\":\"Supplier unavailable\"}\n\n"));
    }
}
