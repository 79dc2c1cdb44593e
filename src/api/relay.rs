//! Streaming relay.
//!
//! Drains a [`TokenStream`] into an [`SseTransport`]:
//!
//! ```text
//! STARTED -> STREAMING -> COMPLETED | FAILED | CLIENT_GONE
//! ```
//!
//! Every session that still has a client ends with exactly one terminal
//! message (`done` or `error`), written last. A disconnected client gets
//! nothing more and no error is reported.

use crate::api::sse::{SseTransport, TransportError, WireMessage};
use crate::core::cancel::cancelled;
use crate::core::config::AppConfig;
use crate::core::error_types::{STREAMING_INTERRUPTED, STREAM_TIMED_OUT};
use crate::core::metrics::get_metrics;
use crate::services::token_source::TokenStream;
use futures::stream::StreamExt;
use std::time::Duration;
use tokio::time::Instant;

const STATE_STARTED: &str = "started";
const STATE_STREAMING: &str = "streaming";
const STATE_COMPLETED: &str = "completed";
const STATE_FAILED: &str = "failed";
const STATE_CLIENT_GONE: &str = "client_gone";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Started,
    Streaming,
    Completed,
    Failed,
    ClientGone,
}

impl RelayState {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Started => STATE_STARTED,
            Self::Streaming => STATE_STREAMING,
            Self::Completed => STATE_COMPLETED,
            Self::Failed => STATE_FAILED,
            Self::ClientGone => STATE_CLIENT_GONE,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::ClientGone)
    }
}

/// Per-session relay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Pause after each written non-final token
    pub token_delay: Duration,
    /// Upper bound on the whole session, if any
    pub timeout: Option<Duration>,
}

impl RelayOptions {
    pub fn new(token_delay: Duration) -> Self {
        Self {
            token_delay,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<&AppConfig> for RelayOptions {
    fn from(config: &AppConfig) -> Self {
        Self::new(config.token_delay()).with_timeout(config.stream_timeout())
    }
}

/// Outcome of one relay session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySummary {
    pub state: RelayState,
    /// Token frames written
    pub tokens_sent: usize,
    pub bytes_written: usize,
}

enum Interrupt {
    Disconnected,
    TimedOut,
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Write the single terminal message and close.
///
/// Returns `on_success` if the message went out, otherwise the state the
/// failed write implies.
fn finish<T: SseTransport>(
    transport: &mut T,
    message: WireMessage,
    on_success: RelayState,
) -> RelayState {
    let state = match transport.write_frame(&message) {
        Ok(()) => on_success,
        Err(TransportError::Closed) => RelayState::ClientGone,
        Err(TransportError::Write(e)) => {
            tracing::error!(error = %e, "Failed to write terminal message");
            RelayState::Failed
        }
    };
    transport.close();
    state
}

/// Relay `tokens` into `transport` until the sequence finishes, breaks, the
/// client disconnects, or the optional timeout fires.
pub async fn relay<T: SseTransport>(
    transport: &mut T,
    mut tokens: TokenStream,
    options: RelayOptions,
) -> RelaySummary {
    let started = Instant::now();
    let deadline = options.timeout.map(|t| started + t);
    let mut disconnect = transport.disconnect_signal();
    let mut state = RelayState::Started;
    let mut tokens_sent = 0usize;

    let final_state = loop {
        let next = tokio::select! {
            biased;
            _ = cancelled(&mut disconnect) => break RelayState::ClientGone,
            _ = deadline_reached(deadline) => {
                tracing::warn!(tokens_sent, "Relay timed out");
                break finish(transport, WireMessage::error(STREAM_TIMED_OUT), RelayState::Failed);
            }
            next = tokens.next() => next,
        };

        let token = match next {
            Some(Ok(token)) => token,
            Some(Err(e)) => {
                tracing::error!(error = %e, tokens_sent, "Token sequence broke mid-stream");
                break finish(transport, WireMessage::error(STREAMING_INTERRUPTED), RelayState::Failed);
            }
            // Sequence ended without a finished token
            None => break finish(transport, WireMessage::Done, RelayState::Completed),
        };

        if transport.is_closed() {
            break RelayState::ClientGone;
        }

        if token.has_content() {
            match transport.write_frame(&WireMessage::token(&token)) {
                Ok(()) => {
                    tokens_sent += 1;
                    state = RelayState::Streaming;
                }
                Err(TransportError::Closed) => break RelayState::ClientGone,
                Err(TransportError::Write(e)) => {
                    tracing::error!(error = %e, "Failed to write token frame");
                    let _ = finish(transport, WireMessage::error(STREAMING_INTERRUPTED), RelayState::Failed);
                    break RelayState::Failed;
                }
            }
        }

        if token.finished {
            break finish(transport, WireMessage::Done, RelayState::Completed);
        }

        if token.has_content() && !options.token_delay.is_zero() {
            let interrupt = tokio::select! {
                biased;
                _ = cancelled(&mut disconnect) => Some(Interrupt::Disconnected),
                _ = deadline_reached(deadline) => Some(Interrupt::TimedOut),
                _ = tokio::time::sleep(options.token_delay) => None,
            };
            match interrupt {
                Some(Interrupt::Disconnected) => break RelayState::ClientGone,
                Some(Interrupt::TimedOut) => {
                    tracing::warn!(tokens_sent, "Relay timed out");
                    break finish(transport, WireMessage::error(STREAM_TIMED_OUT), RelayState::Failed);
                }
                None => {}
            }
        }
    };

    // Stop pulling; dropping the sequence releases any upstream connection
    drop(tokens);

    let elapsed = started.elapsed();
    let metrics = get_metrics();
    metrics
        .relay_sessions
        .with_label_values(&[final_state.as_label()])
        .inc();
    metrics
        .relay_duration
        .with_label_values(&[final_state.as_label()])
        .observe(elapsed.as_secs_f64());
    metrics.tokens_relayed.inc_by(tokens_sent as u64);

    match final_state {
        RelayState::ClientGone => {
            metrics.client_disconnects.inc();
            tracing::info!(
                tokens_sent,
                last_state = state.as_label(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Client disconnected from stream"
            );
        }
        RelayState::Failed => tracing::warn!(
            tokens_sent,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stream finished with error"
        ),
        _ => tracing::debug!(
            tokens_sent,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stream completed"
        ),
    }

    RelaySummary {
        state: final_state,
        tokens_sent,
        bytes_written: transport.bytes_written(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StreamCancelHandle;
    use crate::services::token_source::{SourceError, Token};
    use futures::stream;
    use pretty_assertions::assert_eq;
    use tokio::sync::watch;

    /// In-memory transport recording every message.
    struct RecordingTransport {
        messages: Vec<WireMessage>,
        closed: bool,
        cancel: StreamCancelHandle,
        /// Fail with a write error on this write index
        fail_at: Option<usize>,
        /// Report closed (client gone) from this write index on
        gone_at: Option<usize>,
        writes: usize,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                messages: Vec::new(),
                closed: false,
                cancel: StreamCancelHandle::new(),
                fail_at: None,
                gone_at: None,
                writes: 0,
            }
        }

        fn terminal_count(&self) -> usize {
            self.messages.iter().filter(|m| m.is_terminal()).count()
        }
    }

    impl SseTransport for RecordingTransport {
        fn write_frame(&mut self, message: &WireMessage) -> Result<(), TransportError> {
            let index = self.writes;
            self.writes += 1;
            if self.closed || self.gone_at.is_some_and(|g| index >= g) {
                return Err(TransportError::Closed);
            }
            if self.fail_at == Some(index) {
                return Err(TransportError::Write("broken pipe".to_string()));
            }
            self.messages.push(message.clone());
            Ok(())
        }

        fn close(&mut self) {
            self.closed = true;
            self.cancel.mark_completed();
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        fn disconnect_signal(&self) -> watch::Receiver<bool> {
            self.cancel.subscribe()
        }

        fn bytes_written(&self) -> usize {
            self.messages
                .iter()
                .map(|m| m.to_frame().map(|f| f.len()).unwrap_or(0))
                .sum()
        }
    }

    fn tokens(items: Vec<Result<Token, SourceError>>) -> TokenStream {
        stream::iter(items).boxed()
    }

    fn token_msg(content: &str, finished: bool) -> WireMessage {
        WireMessage::Token {
            content: content.to_string(),
            finished,
        }
    }

    fn no_delay() -> RelayOptions {
        RelayOptions::new(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_successful_run_ends_with_done() {
        let mut transport = RecordingTransport::new();
        let summary = relay(
            &mut transport,
            tokens(vec![
                Ok(Token::partial("Hello ")),
                Ok(Token::last("world")),
            ]),
            no_delay(),
        )
        .await;

        assert_eq!(summary.state, RelayState::Completed);
        assert_eq!(summary.tokens_sent, 2);
        assert_eq!(
            transport.messages,
            vec![
                token_msg("Hello ", false),
                token_msg("world", true),
                WireMessage::Done
            ]
        );
        assert!(transport.closed);
    }

    #[tokio::test]
    async fn test_empty_tokens_are_suppressed() {
        let mut transport = RecordingTransport::new();
        relay(
            &mut transport,
            tokens(vec![
                Ok(Token::partial("")),
                Ok(Token::partial("a")),
                Ok(Token::last("")),
            ]),
            no_delay(),
        )
        .await;

        assert_eq!(
            transport.messages,
            vec![token_msg("a", false), WireMessage::Done]
        );
    }

    #[tokio::test]
    async fn test_nothing_pulled_after_finished() {
        let mut transport = RecordingTransport::new();
        relay(
            &mut transport,
            tokens(vec![Ok(Token::last("end")), Ok(Token::partial("late"))]),
            no_delay(),
        )
        .await;

        assert_eq!(
            transport.messages,
            vec![token_msg("end", true), WireMessage::Done]
        );
    }

    #[tokio::test]
    async fn test_exhausted_sequence_still_gets_done() {
        let mut transport = RecordingTransport::new();
        let summary = relay(
            &mut transport,
            tokens(vec![Ok(Token::partial("only"))]),
            no_delay(),
        )
        .await;

        assert_eq!(summary.state, RelayState::Completed);
        assert_eq!(
            transport.messages,
            vec![token_msg("only", false), WireMessage::Done]
        );
    }

    #[tokio::test]
    async fn test_broken_sequence_ends_with_error() {
        let mut transport = RecordingTransport::new();
        let summary = relay(
            &mut transport,
            tokens(vec![
                Ok(Token::partial("partial ")),
                Err(SourceError("connection reset".to_string())),
                Ok(Token::last("never")),
            ]),
            no_delay(),
        )
        .await;

        assert_eq!(summary.state, RelayState::Failed);
        assert_eq!(
            transport.messages,
            vec![
                token_msg("partial ", false),
                WireMessage::error(STREAMING_INTERRUPTED)
            ]
        );
        assert_eq!(transport.terminal_count(), 1);
    }

    #[tokio::test]
    async fn test_token_write_failure_reports_error_once() {
        let mut transport = RecordingTransport::new();
        transport.fail_at = Some(1);
        let summary = relay(
            &mut transport,
            tokens(vec![
                Ok(Token::partial("a ")),
                Ok(Token::partial("b ")),
                Ok(Token::last("c")),
            ]),
            no_delay(),
        )
        .await;

        assert_eq!(summary.state, RelayState::Failed);
        assert_eq!(
            transport.messages,
            vec![token_msg("a ", false), WireMessage::error(STREAMING_INTERRUPTED)]
        );
    }

    #[tokio::test]
    async fn test_closed_transport_is_silent() {
        let mut transport = RecordingTransport::new();
        transport.gone_at = Some(1);
        let summary = relay(
            &mut transport,
            tokens(vec![
                Ok(Token::partial("a ")),
                Ok(Token::partial("b ")),
                Ok(Token::last("c")),
            ]),
            no_delay(),
        )
        .await;

        assert_eq!(summary.state, RelayState::ClientGone);
        assert_eq!(transport.messages, vec![token_msg("a ", false)]);
        assert_eq!(transport.terminal_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_tokens() {
        let mut transport = RecordingTransport::new();
        let start = Instant::now();
        relay(
            &mut transport,
            tokens(vec![
                Ok(Token::partial("a ")),
                Ok(Token::partial("b ")),
                Ok(Token::partial("c ")),
                Ok(Token::last("d")),
            ]),
            RelayOptions::new(Duration::from_millis(20)),
        )
        .await;

        // Three pauses, none after the finished token
        assert_eq!(start.elapsed(), Duration::from_millis(60));
        assert_eq!(transport.messages.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_during_pacing_stops_relay() {
        let mut transport = RecordingTransport::new();
        let cancel = transport.cancel.clone();
        let endless = stream::repeat_with(|| Ok(Token::partial("tick "))).boxed();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(55)).await;
            cancel.cancel();
        });

        let summary = relay(
            &mut transport,
            endless,
            RelayOptions::new(Duration::from_millis(20)),
        )
        .await;

        assert_eq!(summary.state, RelayState::ClientGone);
        // Writes at t=0, 20, 40; cancelled at 55
        assert_eq!(summary.tokens_sent, 3);
        assert_eq!(transport.terminal_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_waiting_for_token() {
        let mut transport = RecordingTransport::new();
        let cancel = transport.cancel.clone();
        let stalled = stream::iter(vec![Ok(Token::partial("first "))])
            .chain(stream::pending())
            .boxed();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cancel.cancel();
        });

        let summary = relay(&mut transport, stalled, no_delay()).await;
        assert_eq!(summary.state, RelayState::ClientGone);
        assert_eq!(transport.messages, vec![token_msg("first ", false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_sends_single_error() {
        let mut transport = RecordingTransport::new();
        let stalled = stream::iter(vec![Ok(Token::partial("slow "))])
            .chain(stream::pending())
            .boxed();

        let summary = relay(
            &mut transport,
            stalled,
            RelayOptions::new(Duration::ZERO).with_timeout(Some(Duration::from_secs(2))),
        )
        .await;

        assert_eq!(summary.state, RelayState::Failed);
        assert_eq!(
            transport.messages,
            vec![token_msg("slow ", false), WireMessage::error(STREAM_TIMED_OUT)]
        );
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AppConfig::default();
        config.streaming.token_delay_ms = 5;
        config.streaming.stream_timeout_secs = Some(30);

        let options = RelayOptions::from(&config);
        assert_eq!(options.token_delay, Duration::from_millis(5));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(RelayState::ClientGone.as_label(), "client_gone");
        assert!(RelayState::Completed.is_terminal());
        assert!(!RelayState::Streaming.is_terminal());
    }
}
