use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SessionError;
use crate::session::{ChunkAck, CompletionRecord, SessionStarted};

/// Frame as sent by the client
///
/// Any `sessionId`/`connectionId` the client includes is ignored; identity
/// always comes from the connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundFrame {
    action: Option<String>,
    meta_data: Option<MetaData>,
    meta_id: Option<String>,
    chunk: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaData {
    user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Data,
    End,
    Heartbeat,
}

impl FromStr for Action {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" | "record-start" => Ok(Self::Start),
            "data" | "record-idle" => Ok(Self::Data),
            "end" | "record-end" => Ok(Self::End),
            "heartbeat" => Ok(Self::Heartbeat),
            other => Err(SessionError::InvalidFrame(format!(
                "unknown action {:?} (expected start, data, end, or heartbeat)",
                other
            ))),
        }
    }
}

/// What the client asked for, validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        user_id: String,
        meta_id: Option<String>,
    },
    Data {
        chunk: String,
    },
    End,
    Heartbeat,
}

/// A parsed frame bound to the connection it arrived on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedFrame {
    pub session_id: String,
    pub command: Command,
}

impl RoutedFrame {
    pub fn parse(session_id: &str, text: &str) -> Result<Self, SessionError> {
        let frame: InboundFrame = serde_json::from_str(text)
            .map_err(|e| SessionError::InvalidFrame(format!("malformed JSON frame: {}", e)))?;

        let action: Action = frame
            .action
            .as_deref()
            .ok_or_else(|| SessionError::InvalidFrame("missing \"action\" field".to_string()))?
            .parse()?;

        let command = match action {
            Action::Start => {
                let user_id = frame
                    .meta_data
                    .and_then(|m| m.user_id)
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        SessionError::InvalidFrame("start requires metaData.userId".to_string())
                    })?;
                Command::Start {
                    user_id,
                    meta_id: frame.meta_id,
                }
            }
            Action::Data => {
                let chunk = frame.chunk.ok_or_else(|| {
                    SessionError::InvalidFrame("data requires a \"chunk\" field".to_string())
                })?;
                Command::Data { chunk }
            }
            Action::End => Command::End,
            Action::Heartbeat => Command::Heartbeat,
        };

        Ok(Self {
            session_id: session_id.to_string(),
            command,
        })
    }
}

/// Reply sent back over the connection for every inbound frame
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundFrame {
    Started(SessionStarted),
    Ack(ChunkAck),
    Ended(CompletionRecord),
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        session_id: String,
        /// False when no recording is open for this connection
        tracked: bool,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

impl OutboundFrame {
    pub fn error(err: &SessionError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","code":"INTERNAL","message":"failed to encode reply: {}"}}"#,
                e
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_with_meta_id() {
        let frame = RoutedFrame::parse(
            "conn-1",
            r#"{"action":"start","metaData":{"userId":"u1"},"metaId":"standup"}"#,
        )
        .unwrap();
        assert_eq!(frame.session_id, "conn-1");
        assert_eq!(
            frame.command,
            Command::Start {
                user_id: "u1".to_string(),
                meta_id: Some("standup".to_string())
            }
        );
    }

    #[test]
    fn test_client_session_id_is_ignored() {
        let frame = RoutedFrame::parse(
            "conn-1",
            r#"{"action":"end","sessionId":"someone-else","connectionId":"someone-else"}"#,
        )
        .unwrap();
        assert_eq!(frame.session_id, "conn-1");
        assert_eq!(frame.command, Command::End);
    }

    #[test]
    fn test_legacy_action_names() {
        assert_eq!("record-start".parse::<Action>().unwrap(), Action::Start);
        assert_eq!("record-idle".parse::<Action>().unwrap(), Action::Data);
        assert_eq!("record-end".parse::<Action>().unwrap(), Action::End);
    }

    #[test]
    fn test_start_without_user_is_invalid() {
        let err = RoutedFrame::parse("c", r#"{"action":"start","metaData":{}}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_FRAME");

        let err = RoutedFrame::parse("c", r#"{"action":"start"}"#).unwrap_err();
        assert!(err.to_string().contains("metaData.userId"));
    }

    #[test]
    fn test_missing_action() {
        let err = RoutedFrame::parse("c", r#"{"chunk":"data:,AAA="}"#).unwrap_err();
        assert!(err.to_string().contains("action"));
    }

    #[test]
    fn test_error_frame_shape() {
        let frame = OutboundFrame::error(&SessionError::NotFound("c".to_string()));
        let json: serde_json::Value = serde_json::from_str(&frame.to_text()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[test]
    fn test_heartbeat_frame_shape() {
        let frame = OutboundFrame::Heartbeat {
            session_id: "c".to_string(),
            tracked: true,
        };
        let json: serde_json::Value = serde_json::from_str(&frame.to_text()).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert_eq!(json["sessionId"], "c");
        assert_eq!(json["tracked"], true);
    }
}
