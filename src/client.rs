//! Chat client
//!
//! Connects to a server, negotiates a name from console input, then relays
//! console lines out and server lines to the display. Runs four tasks:
//! - display: single writer to the local output
//! - writer: outbound queue -> connection
//! - remote listener: connection -> display, handshake replies -> console task
//! - console: login loop, then console -> outbound queue tagged with the name

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{Framed, FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::config::{CLOSE_GRACE, MAX_LINE_LENGTH, OUTBOUND_BUFFER_SIZE};
use crate::console::{display, next_line};
use crate::error::AppError;
use crate::protocol::{format_delivery, is_exit, parse_inbound, Ack, Inbound, EXIT_SENTINEL};
use crate::types::DisplayName;

type Display = mpsc::UnboundedSender<String>;

/// Which task ended the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finished {
    Console,
    Remote,
    Writer,
}

/// Run a client session over `stream`
///
/// Reads user lines from `input` and writes everything the user should see
/// to `output`. Returns when the user types `exit`, the console closes, or
/// the server closes the connection.
pub async fn run<S, I, O>(stream: S, input: I, output: O) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let (net_sink, net_stream) = framed.split();

    let (display_tx, display_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER_SIZE);
    let (ack_tx, ack_rx) = mpsc::channel::<Ack>(1);

    let display_task = tokio::spawn(display(output, display_rx));
    let mut writer_task = tokio::spawn(write_outbound(net_sink, outbound_rx));
    let mut remote_task = tokio::spawn(listen_remote(net_stream, ack_tx, display_tx.clone()));
    let mut console_task = tokio::spawn(listen_console(input, outbound_tx, ack_rx, display_tx));

    let finished = tokio::select! {
        _ = &mut console_task => Finished::Console,
        _ = &mut remote_task => Finished::Remote,
        _ = &mut writer_task => Finished::Writer,
    };
    debug!("Client stopping: {:?} task ended", finished);

    if finished == Finished::Console {
        // The console dropped the outbound queue; let the writer flush `exit`
        if timeout(CLOSE_GRACE, &mut writer_task).await.is_err() {
            debug!("Writer did not flush within {:?}", CLOSE_GRACE);
        }
    }

    console_task.abort();
    remote_task.abort();
    writer_task.abort();

    // Ends once the aborted tasks drop their display handles
    let _ = display_task.await;
    Ok(())
}

/// Writer task: outbound queue -> connection
async fn write_outbound<S>(
    mut net_sink: SplitSink<Framed<S, LinesCodec>, String>,
    mut outbound_rx: mpsc::Receiver<String>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(line) = outbound_rx.recv().await {
        if let Err(e) = net_sink.send(line).await {
            warn!("Failed to send to server: {}", e);
            return;
        }
    }
    let _ = net_sink.close().await;
}

/// Remote listener: parse server lines, hide handshake replies
async fn listen_remote<S>(
    mut net_stream: SplitStream<Framed<S, LinesCodec>>,
    ack_tx: mpsc::Sender<Ack>,
    display: Display,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = net_stream.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("Server sent a line over {} bytes", MAX_LINE_LENGTH);
                break;
            }
            Err(LinesCodecError::Io(e)) => {
                warn!("Connection error: {}", e);
                break;
            }
        };

        if is_exit(&line) {
            break;
        }

        match parse_inbound(&line) {
            Some(Inbound::Ack(ack)) => {
                // Only the console task's login loop waits for these
                let _ = ack_tx.try_send(ack);
            }
            Some(Inbound::Chat { sender, body }) => {
                let _ = display.send(format_delivery(&sender, &body));
            }
            None => debug!("Ignoring unrecognized line: {}", line),
        }
    }

    let _ = display.send("Connection to the server is closed.".to_string());
}

/// Console task: login, then forward tagged lines
async fn listen_console<I>(
    input: I,
    outbound_tx: mpsc::Sender<String>,
    mut ack_rx: mpsc::Receiver<Ack>,
    display: Display,
) where
    I: AsyncRead + Unpin,
{
    let mut input = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    let Some(name) = login(&mut input, &outbound_tx, &mut ack_rx, &display).await else {
        return;
    };
    let _ = display.send(format!("Welcome, {}!", name));

    while let Some(line) = next_line(&mut input).await {
        if is_exit(&line) {
            let _ = outbound_tx.send(EXIT_SENTINEL.to_string()).await;
            return;
        }
        if line.trim().is_empty() {
            continue;
        }
        if outbound_tx
            .send(format_delivery(name.as_str(), &line))
            .await
            .is_err()
        {
            return;
        }
    }

    // Console closed: leave the server cleanly
    let _ = outbound_tx.send(EXIT_SENTINEL.to_string()).await;
}

/// Name negotiation loop
///
/// Returns `None` if the user quits, the console closes, or the server
/// goes away before accepting a name.
async fn login<I>(
    input: &mut FramedRead<I, LinesCodec>,
    outbound_tx: &mpsc::Sender<String>,
    ack_rx: &mut mpsc::Receiver<Ack>,
    display: &Display,
) -> Option<DisplayName>
where
    I: AsyncRead + Unpin,
{
    let _ = display.send("Please, introduce yourself. Enter your name: ".to_string());

    loop {
        let line = next_line(input).await?;
        if is_exit(&line) {
            let _ = outbound_tx.send(EXIT_SENTINEL.to_string()).await;
            return None;
        }

        let name = match DisplayName::parse(&line) {
            Ok(name) => name,
            Err(e) => {
                let _ = display.send(format!("{}. Please, choose another username: ", e));
                continue;
            }
        };

        outbound_tx.send(name.to_string()).await.ok()?;
        debug!("Name '{}' sent, waiting for the server", name);

        match ack_rx.recv().await? {
            Ack::Accepted => return Some(name),
            Ack::Taken => {
                let _ = display
                    .send("Username is taken. Please, choose another username: ".to_string());
            }
            Ack::Invalid => {
                let _ = display.send(format!(
                    "Username '{}' is not allowed. Please, choose another username: ",
                    name
                ));
            }
        }
    }
}

/// Connect over TCP and run until the session ends
pub async fn connect_and_run<I, O>(addr: &str, input: I, output: O) -> Result<(), AppError>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let stream = tokio::net::TcpStream::connect(addr).await?;
    run(stream, input, output).await
}
