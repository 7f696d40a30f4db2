//! Log indexer DTOs

use serde::{Deserialize, Serialize};

/// Single console line as expected by the ElasTest log indexer
///
/// Field order matters: the indexer's input filter matches on the serialized
/// form `{"component":...,"exec":...,"stream":...,"message":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    pub component: String,
    pub exec: String,
    pub stream: String,
    pub message: String,
}

impl LogPayload {
    pub const COMPONENT: &'static str = "test";
    pub const STREAM: &'static str = "default_log";

    /// Builds the payload for one console line of the given execution
    ///
    /// Trailing line terminators are stripped from the message.
    pub fn for_line(t_job_exec_id: i64, line: &str) -> Self {
        Self {
            component: Self::COMPONENT.to_string(),
            exec: t_job_exec_id.to_string(),
            stream: Self::STREAM.to_string(),
            message: line.trim_end_matches(['\r', '\n']).to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = LogPayload::for_line(42, "hello");
        assert_eq!(
            payload.to_json().unwrap(),
            r#"{"component":"test","exec":"42","stream":"default_log","message":"hello"}"#
        );
    }

    #[test]
    fn test_payload_strips_line_terminators() {
        let payload = LogPayload::for_line(1, "build ok\r\n");
        assert_eq!(payload.message, "build ok");
    }

    #[test]
    fn test_payload_escapes_message() {
        let payload = LogPayload::for_line(1, r#"say "hi""#);
        assert_eq!(
            payload.to_json().unwrap(),
            r#"{"component":"test","exec":"1","stream":"default_log","message":"say \"hi\""}"#
        );
    }
}
