use futures::StreamExt;
use kaiwa::chat::api::{ApiTarget, ChatError};
use kaiwa::chat::client::complete;
use kaiwa::chat::message::MessageContent;
use kaiwa::chat::request::{ChatRequest, GenerationParams};
use kaiwa::chat::session::{ChatSession, STREAM_ERROR_MARKER};
use kaiwa::chat::stream::{StreamEvent, stream_chat_completions};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| format!("data: {line}\n\n"))
        .collect()
}

fn target_for(server: &MockServer) -> ApiTarget {
    ApiTarget::new(server.uri(), "test-key")
}

fn text(value: &str) -> MessageContent {
    MessageContent::Text(value.to_string())
}

async fn mount_sse(server: &MockServer, lines: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(lines), "text/event-stream"))
        .mount(server)
        .await;
}

/// Drives one full streaming turn through the session reducer, the way the
/// chat command does.
async fn drive_streaming_turn(
    server: &MockServer,
    session: &mut ChatSession,
    prompt: &str,
) -> Option<ChatError> {
    let client = reqwest::Client::new();
    let target = target_for(server);
    let params = GenerationParams::new("gpt-4o-mini");

    let turn = session.begin_turn(text(prompt));
    let request = ChatRequest::from_transcript("be brief", session.transcript(), &params, true);

    let mut events = match stream_chat_completions(&client, &target, &request).await {
        Ok(events) => events,
        Err(err) => {
            session.fail_turn(turn, STREAM_ERROR_MARKER);
            return Some(err);
        }
    };

    while let Some(event) = events.next().await {
        match event {
            Ok(StreamEvent::Delta(delta)) => {
                assert!(session.apply_delta(turn, &delta));
            }
            Ok(StreamEvent::Completed) => break,
            Err(err) => {
                session.cancel_turn(turn);
                return Some(err);
            }
        }
    }
    session.finish_turn(turn);
    None
}

#[tokio::test]
async fn streaming_deltas_fold_into_one_assistant_message() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        &[
            r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
            "[DONE]",
        ],
    )
    .await;

    let mut session = ChatSession::new();
    let failure = drive_streaming_turn(&server, &mut session, "hi").await;

    assert!(failure.is_none());
    let messages = session.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, text("Hello"));
    assert!(session.live_buffer().is_none());
}

#[tokio::test]
async fn stream_without_deltas_commits_an_empty_message() {
    let server = MockServer::start().await;
    mount_sse(&server, &["[DONE]"]).await;

    let mut session = ChatSession::new();
    let failure = drive_streaming_turn(&server, &mut session, "hi").await;

    assert!(failure.is_none());
    assert_eq!(session.transcript().messages()[1].content, text(""));
}

#[tokio::test]
async fn failed_call_start_appends_the_error_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let mut session = ChatSession::new();
    let failure = drive_streaming_turn(&server, &mut session, "hi").await;

    assert!(matches!(failure, Some(ChatError::Api { .. })));
    let messages = session.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, text(STREAM_ERROR_MARKER));
    assert!(session.live_buffer().is_none());
}

#[tokio::test]
async fn malformed_event_cancels_the_turn_without_salvage() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        &[r#"{"choices":[{"delta":{"content":"par"}}]}"#, "not json"],
    )
    .await;

    let mut session = ChatSession::new();
    let failure = drive_streaming_turn(&server, &mut session, "hi").await;

    assert!(matches!(failure, Some(ChatError::Stream(_))));
    // Only the user message survives the failed attempt.
    assert_eq!(session.transcript().len(), 1);
    assert!(session.live_buffer().is_none());
}

#[tokio::test]
async fn consecutive_turns_accumulate_the_transcript() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        &[r#"{"choices":[{"delta":{"content":"ok"}}]}"#, "[DONE]"],
    )
    .await;

    let mut session = ChatSession::new();
    assert!(drive_streaming_turn(&server, &mut session, "one").await.is_none());
    assert!(drive_streaming_turn(&server, &mut session, "two").await.is_none());

    let roles: Vec<_> = session
        .transcript()
        .messages()
        .iter()
        .map(|message| message.role)
        .collect();
    assert_eq!(roles.len(), 4);
}

#[tokio::test]
async fn non_streaming_success_appends_exactly_one_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "four"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let target = target_for(&server);
    let params = GenerationParams::new("gpt-4o-mini");

    let mut session = ChatSession::new();
    let turn = session.begin_turn(text("2+2?"));
    let request = ChatRequest::from_transcript("be brief", session.transcript(), &params, false);

    let completion = complete(&client, &target, &request, None)
        .await
        .expect("call should succeed");
    assert_eq!(completion.content, "four");
    assert_eq!(completion.model.as_deref(), Some("gpt-4o-mini"));
    let usage = completion.usage.expect("usage should be echoed");
    assert_eq!(usage.prompt_tokens, Some(12));
    assert_eq!(usage.completion_tokens, Some(3));

    assert!(session.push_assistant(turn, completion.content));
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.transcript().messages()[1].content, text("four"));
}

#[tokio::test]
async fn non_streaming_failure_embeds_the_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "model not found"}})),
        )
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let target = target_for(&server);
    let params = GenerationParams::new("nope");

    let mut session = ChatSession::new();
    let turn = session.begin_turn(text("hi"));
    let request = ChatRequest::from_transcript("be brief", session.transcript(), &params, false);

    let err = complete(&client, &target, &request, None)
        .await
        .expect_err("call should fail");
    let reply = err.to_string();
    assert!(reply.contains("model not found"));

    assert!(session.push_assistant(turn, reply));
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn missing_completion_content_reads_as_empty_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {}}]
        })))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let target = target_for(&server);
    let params = GenerationParams::new("gpt-4o-mini");
    let request = ChatRequest::single_turn(
        "be brief",
        kaiwa::chat::message::Message::user("hi"),
        &params,
        false,
    );

    let completion = complete(&client, &target, &request, None)
        .await
        .expect("call should succeed");
    assert_eq!(completion.content, "");
    assert!(completion.usage.is_none());
}

#[tokio::test]
async fn streaming_request_carries_the_stream_flag_and_snapshot() {
    let server = MockServer::start().await;
    mount_sse(&server, &["[DONE]"]).await;

    let mut session = ChatSession::new();
    drive_streaming_turn(&server, &mut session, "hi").await;

    let requests = server
        .received_requests()
        .await
        .expect("request recording is on");
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request body is JSON");
    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["model"], json!("gpt-4o-mini"));
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hi"},
        ])
    );
}
