/// Client behaviour against a local mock of the Messages endpoint.
#[cfg(test)]
mod unit {
    use std::time::Duration;

    use crate::types::{ContentBlock, MessagesResponse};
    use crate::{ClaudeAgentError, ClaudeClient, ClientConfig};

    fn client_for(server: &mockito::Server) -> ClaudeClient {
        let mut config = ClientConfig::new("test-key");
        config.api_url = format!("{}/v1/messages", server.url());
        config.timeout = Duration::from_secs(5);
        ClaudeClient::new(config).expect("client")
    }

    #[test]
    fn complete_joins_text_blocks() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"system":"be brief","messages":[{"role":"user","content":"hi"}]}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "msg_1",
                    "model": "claude-sonnet-4-20250514",
                    "content": [
                        {"type": "text", "text": "{\"overview\":"},
                        {"type": "thinking", "thinking": "hm"},
                        {"type": "text", "text": "\"x\"}"}
                    ],
                    "stop_reason": "end_turn",
                    "usage": {"input_tokens": 10, "output_tokens": 4}
                }"#,
            )
            .create();

        let text = client_for(&server).complete("be brief", "hi").unwrap();
        assert_eq!(text, r#"{"overview":"x"}"#);
        mock.assert();
    }

    #[test]
    fn api_errors_carry_status_and_message() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create();

        let err = client_for(&server).complete("", "hi").unwrap_err();
        match err {
            ClaudeAgentError::Api { status, message } => {
                assert_eq!(status, 529);
                assert_eq!(message, "overloaded_error: Overloaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_is_kept() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/v1/messages")
            .with_status(502)
            .with_body("bad gateway")
            .create();

        let err = client_for(&server).complete("", "hi").unwrap_err();
        assert_eq!(err.to_string(), "API error 502: bad gateway");
    }

    #[test]
    fn empty_text_is_an_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"id":"msg_2","content":[{"type":"text","text":"  "}]}"#)
            .create();

        let err = client_for(&server).complete("", "hi").unwrap_err();
        assert!(matches!(err, ClaudeAgentError::EmptyResponse));
    }

    #[test]
    fn garbage_success_body_is_a_parse_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body("<html>")
            .create();

        let err = client_for(&server).complete("", "hi").unwrap_err();
        assert!(matches!(err, ClaudeAgentError::Parse { .. }));
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = ClaudeClient::new(ClientConfig::new("  ")).err().unwrap();
        assert_eq!(err.to_string(), "no API key configured (set CLAUDE_API_KEY)");
    }

    #[test]
    fn unknown_blocks_deserialize() {
        let resp: MessagesResponse = serde_json::from_str(
            r#"{"id":"m","content":[{"type":"tool_use","id":"t","name":"x","input":{}}]}"#,
        )
        .unwrap();
        assert!(matches!(resp.content[0], ContentBlock::Other));
        assert_eq!(resp.text(), "");
    }
}
