use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use socket_resilience_reconnect::{
    close_code, BinaryType, Message, ReadyState, Transport, TransportError, TransportEvents,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::client::{Request, Response};
use tokio_tungstenite::tungstenite::http::header::{
    HeaderName, SEC_WEBSOCKET_EXTENSIONS, SEC_WEBSOCKET_PROTOCOL,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Longest close reason a control frame can carry.
const MAX_CLOSE_REASON: usize = 123;

enum Command {
    Send(Message),
    Close { code: u16, reason: String },
}

struct Status {
    ready_state: ReadyState,
    protocol: String,
    extensions: String,
    binary_type: BinaryType,
}

struct State {
    status: Mutex<Status>,
    buffered: AtomicUsize,
}

impl State {
    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns false if a close was requested during the handshake.
    fn opened(&self, protocol: String, extensions: String) -> bool {
        let mut status = self.status();
        status.protocol = protocol;
        status.extensions = extensions;
        if status.ready_state != ReadyState::Connecting {
            return false;
        }
        status.ready_state = ReadyState::Open;
        true
    }

    fn finish(&self, events: &TransportEvents, code: u16, reason: String, was_clean: bool) {
        self.status().ready_state = ReadyState::Closed;
        self.buffered.store(0, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::debug!(transport = %events.id(), code, %reason, was_clean, "websocket closed");

        events.closed(code, reason, was_clean);
    }
}

/// One WebSocket connection driven by a background task.
///
/// `send` is rejected with [`TransportError::NotOpen`] unless the handshake
/// has completed; nothing is queued for later.
pub struct TungsteniteTransport {
    url: String,
    state: Arc<State>,
    commands: mpsc::UnboundedSender<Command>,
}

impl TungsteniteTransport {
    pub(crate) fn spawn(
        runtime: &Handle,
        url: String,
        request: Request,
        events: TransportEvents,
        close_timeout: Duration,
    ) -> Self {
        let state = Arc::new(State {
            status: Mutex::new(Status {
                ready_state: ReadyState::Connecting,
                protocol: String::new(),
                extensions: String::new(),
                binary_type: BinaryType::default(),
            }),
            buffered: AtomicUsize::new(0),
        });
        let (commands, receiver) = mpsc::unbounded_channel();

        runtime.spawn(drive(
            Arc::clone(&state),
            request,
            events,
            receiver,
            close_timeout,
        ));

        Self {
            url,
            state,
            commands,
        }
    }
}

impl Transport for TungsteniteTransport {
    fn send(&self, data: Message) -> Result<(), TransportError> {
        if self.state.status().ready_state != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }

        let len = data.len();
        self.state.buffered.fetch_add(len, Ordering::AcqRel);
        self.commands.send(Command::Send(data)).map_err(|_| {
            self.state.buffered.fetch_sub(len, Ordering::AcqRel);
            TransportError::Closed
        })
    }

    fn close(&self, code: u16, reason: Option<&str>) -> Result<(), TransportError> {
        if !close_code::is_valid_application_code(code) {
            return Err(TransportError::InvalidCloseCode(code));
        }

        {
            let mut status = self.state.status();
            match status.ready_state {
                ReadyState::Closed => return Err(TransportError::Closed),
                ReadyState::Closing => return Ok(()),
                ReadyState::Connecting | ReadyState::Open => {
                    status.ready_state = ReadyState::Closing;
                }
            }
        }

        let reason = truncate_reason(reason.unwrap_or_default());
        self.commands
            .send(Command::Close { code, reason })
            .map_err(|_| TransportError::Closed)
    }

    fn ready_state(&self) -> ReadyState {
        self.state.status().ready_state
    }

    fn buffered_amount(&self) -> usize {
        self.state.buffered.load(Ordering::Acquire)
    }

    fn extensions(&self) -> String {
        self.state.status().extensions.clone()
    }

    fn protocol(&self) -> String {
        self.state.status().protocol.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn binary_type(&self) -> BinaryType {
        self.state.status().binary_type
    }

    fn set_binary_type(&self, binary_type: BinaryType) {
        self.state.status().binary_type = binary_type;
    }
}

impl std::fmt::Debug for TungsteniteTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteTransport")
            .field("url", &self.url)
            .field("ready_state", &self.ready_state())
            .field("buffered_amount", &self.buffered_amount())
            .finish()
    }
}

async fn drive(
    state: Arc<State>,
    request: Request,
    events: TransportEvents,
    mut commands: mpsc::UnboundedReceiver<Command>,
    close_timeout: Duration,
) {
    let mut connect = std::pin::pin!(tokio_tungstenite::connect_async(request));

    let (stream, response) = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(pair) => break pair,
                Err(error) => {
                    events.error(error.to_string());
                    state.finish(&events, close_code::ABNORMAL, String::new(), false);
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Close { code, reason }) => {
                    state.finish(&events, code, reason, false);
                    return;
                }
                Some(Command::Send(_)) => {}
                None => return,
            },
        }
    };

    let protocol = header(&response, SEC_WEBSOCKET_PROTOCOL);
    if state.opened(protocol.clone(), header(&response, SEC_WEBSOCKET_EXTENSIONS)) {
        events.opened(protocol);
    }

    let (mut sink, mut stream) = stream.split();
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    events.message(Message::Text(text));
                }
                Some(Ok(Frame::Binary(bytes))) => {
                    events.message(Message::Binary(bytes));
                }
                Some(Ok(Frame::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((close_code::NO_STATUS, String::new()));
                    // Push out the close reply tungstenite queued.
                    let _ = sink.flush().await;
                    state.finish(&events, code, reason, true);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    events.error(error.to_string());
                    state.finish(&events, close_code::ABNORMAL, String::new(), false);
                    return;
                }
                None => {
                    state.finish(&events, close_code::ABNORMAL, String::new(), false);
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Send(message)) => {
                    let len = message.len();
                    let result = sink.send(into_frame(message)).await;
                    state.buffered.fetch_sub(len, Ordering::AcqRel);
                    if let Err(error) = result {
                        events.error(error.to_string());
                        state.finish(&events, close_code::ABNORMAL, String::new(), false);
                        return;
                    }
                }
                Some(Command::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    let sent = sink.send(Frame::Close(Some(frame))).await.is_ok();
                    let was_clean = sent && await_close_reply(&mut stream, close_timeout).await;
                    state.finish(&events, code, reason, was_clean);
                    return;
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
        }
    }
}

/// Waits for the peer to answer a close frame.
async fn await_close_reply(stream: &mut SplitStream<WsStream>, timeout: Duration) -> bool {
    let reply = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Frame::Close(_)) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        false
    };
    tokio::time::timeout(timeout, reply).await.unwrap_or(false)
}

fn into_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text),
        Message::Binary(bytes) => Frame::Binary(bytes),
    }
}

fn header(response: &Response, name: HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason.to_string();
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}
