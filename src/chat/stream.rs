use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::chat::api::{ApiTarget, ChatError, chat_post, ensure_success};
use crate::chat::request::ChatRequest;

/// Literal termination marker of a chat-completions SSE stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One observable step of a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental fragment of assistant text.
    Delta(String),
    /// Clean termination: the sentinel, or the transport closing.
    Completed,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// Live delta sequence for one assistant turn, fed by a background task.
pub struct CompletionStream {
    rx: mpsc::Receiver<Result<StreamEvent, ChatError>>,
}

impl Stream for CompletionStream {
    type Item = Result<StreamEvent, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Issues the streaming completion call and returns the delta sequence.
///
/// A non-success status fails here, before any accumulation starts; the
/// caller is expected to append its error marker directly.
pub async fn stream_chat_completions(
    client: &reqwest::Client,
    target: &ApiTarget,
    request: &ChatRequest,
) -> Result<CompletionStream, ChatError> {
    let response = chat_post(client, target, request, None)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(ChatError::Request)?;
    let response = ensure_success(response).await?;

    let (tx, rx) = mpsc::channel(16);
    let bytes = response
        .bytes_stream()
        .map_err(|err| ChatError::Stream(err.to_string()));
    tokio::spawn(process_sse(bytes, tx));
    Ok(CompletionStream { rx })
}

/// Folds the raw SSE byte stream into delta events.
///
/// Per event: the sentinel ends the stream; otherwise the data field is
/// parsed as JSON and every choice's non-empty `delta.content` is emitted in
/// array order. Absent or empty deltas are skipped. Malformed JSON is fatal
/// for the turn. Transport close without the sentinel still completes.
async fn process_sse<S>(stream: S, tx: mpsc::Sender<Result<StreamEvent, ChatError>>)
where
    S: Stream<Item = Result<Bytes, ChatError>> + Unpin,
{
    let mut events = stream.eventsource();

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                let _ = tx.send(Err(ChatError::Stream(err.to_string()))).await;
                return;
            }
        };

        if event.data.trim() == DONE_SENTINEL {
            let _ = tx.send(Ok(StreamEvent::Completed)).await;
            return;
        }

        let chunk: ChatChunk = match serde_json::from_str(&event.data) {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = tx
                    .send(Err(ChatError::Stream(format!(
                        "malformed event payload: {err}"
                    ))))
                    .await;
                return;
            }
        };

        for choice in chunk.choices {
            let Some(content) = choice.delta.content else {
                continue;
            };
            if content.is_empty() {
                continue;
            }
            if tx.send(Ok(StreamEvent::Delta(content))).await.is_err() {
                return;
            }
        }
    }

    let _ = tx.send(Ok(StreamEvent::Completed)).await;
}

#[cfg(test)]
mod tests {
    use super::{ChatError, StreamEvent, process_sse};
    use bytes::Bytes;
    use tokio::sync::mpsc;

    async fn run(chunks: Vec<&'static [u8]>) -> Vec<Result<StreamEvent, ChatError>> {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<Bytes, ChatError>(Bytes::from_static(chunk))),
        );
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(process_sse(stream, tx));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn deltas(events: &[Result<StreamEvent, ChatError>]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                Ok(StreamEvent::Delta(delta)) => Some(delta.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn emits_deltas_in_arrival_order_until_sentinel() {
        let events = run(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(deltas(&events), vec!["Hel", "lo"]);
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Completed))));
    }

    #[tokio::test]
    async fn choices_within_one_event_keep_array_order() {
        let events = run(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"A\"}},{\"delta\":{\"content\":\"B\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(deltas(&events), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn absent_and_empty_deltas_are_skipped() {
        let events = run(vec![
            b"data: {\"choices\":[{\"delta\":{}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(deltas(&events), vec!["x"]);
    }

    #[tokio::test]
    async fn events_after_the_sentinel_are_not_processed() {
        let events = run(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"keep\"}}]}\n\n",
            b"data: [DONE]\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        ])
        .await;

        assert_eq!(deltas(&events), vec!["keep"]);
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Completed))));
    }

    #[tokio::test]
    async fn an_event_split_across_transport_chunks_reassembles() {
        let events = run(vec![
            b"data: {\"choices\":[{\"del",
            b"ta\":{\"content\":\"joined\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await;

        assert_eq!(deltas(&events), vec!["joined"]);
    }

    #[tokio::test]
    async fn transport_close_without_sentinel_still_completes() {
        let events = run(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}\n\n",
        ])
        .await;

        assert_eq!(deltas(&events), vec!["tail"]);
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Completed))));
    }

    #[tokio::test]
    async fn malformed_json_is_fatal_for_the_turn() {
        let events = run(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            b"data: not json\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"after\"}}]}\n\n",
        ])
        .await;

        assert_eq!(deltas(&events), vec!["ok"]);
        assert!(matches!(events.last(), Some(Err(ChatError::Stream(_)))));
    }
}
