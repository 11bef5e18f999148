use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    /// Answer the trailing user entry again, e.g. after a failed stream.
    #[serde(rename = "regenerate")]
    Regenerate,
    #[serde(rename = "reset")]
    Reset,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "transcript")] Transcript {
        session_id: String,
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "partial")] Partial {
        content: String,
    },
    #[serde(rename = "done")] Done {
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_use_type_tag() {
        let chat: ClientMessage = serde_json
            ::from_str(r#"{"type":"chat","content":"What is the leave policy?"}"#)
            .unwrap();
        assert_eq!(chat, ClientMessage::Chat { content: "What is the leave policy?".into() });

        let reset: ClientMessage = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(reset, ClientMessage::Reset);
    }

    #[test]
    fn server_partial_frame_shape() {
        let json = serde_json::to_value(ServerMessage::Partial { content: "Hi".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "partial", "content": "Hi" }));

        let json = serde_json::to_value(ServerMessage::Processing).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "processing" }));
    }
}
