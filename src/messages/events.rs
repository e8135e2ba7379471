//! JSON frames exchanged over a chat channel.

use serde::{Deserialize, Serialize};

use crate::scope::ChatScope;

use super::message::Message;

/// Frames a client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    SendMessageToUser {
        receiver: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<ChatScope>,
    },
}

/// Frames the relay pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A stored message, delivered to its receiver and echoed to its sender.
    ReceiveMessage { scope: ChatScope, message: Message },
    /// Sent to the calling channel only.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_is_optional_on_send() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"SendMessageToUser","receiver":"b","content":"hi"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::SendMessageToUser {
                receiver: "b".to_owned(),
                content: "hi".to_owned(),
                scope: None,
            }
        );

        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type":"SendMessageToUser","receiver":"c1","content":"hi","scope":"guest"}"#,
        )
        .unwrap();
        assert!(matches!(cmd, ClientCommand::SendMessageToUser { scope: Some(ChatScope::Guest), .. }));
    }

    #[test]
    fn unknown_frames_are_rejected() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"Retract","id":"x"}"#).is_err());
    }

    #[test]
    fn receive_event_parses_back() {
        let raw = r#"{"type":"ReceiveMessage","scope":"internal","message":{"id":"01890a5d-ac96-774b-bcce-b302099a8057","sender":"a","receiver":"b","content":"hi","timestamp":"2025-01-01T00:00:00.000Z"}}"#;
        let ServerEvent::ReceiveMessage { scope, message } = serde_json::from_str(raw).unwrap() else {
            panic!("expected ReceiveMessage");
        };
        assert_eq!(scope, ChatScope::Internal);
        assert_eq!(message.sender, "a");
        assert!(message.id.is_some());
    }
}
