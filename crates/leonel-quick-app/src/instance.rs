//! Single-instance enforcement over a loopback socket.
//!
//! The first process binds `127.0.0.1:<port>`. A later launch fails to bind
//! and connects instead. On every connection the primary speaks first with the
//! acknowledgement line `{"app":"leonel-quick","ok":true}`; only after reading
//! it does the later launch write its `{"args":[...]}` line, which the primary
//! acknowledges again. A peer that does not identify itself never receives the
//! arguments.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use leonel_quick_core::DEEP_LINK_SCHEME;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_MESSAGE_BYTES: u64 = 64 * 1024;

/// Message a secondary launch sends to the primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMessage {
    /// Full argument vector of the secondary launch.
    pub args: Vec<String>,
}

/// Line the primary sends before reading and after accepting a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAck {
    /// Application identifier; always the scheme name.
    pub app: String,
    /// Whether the primary accepts the exchange.
    pub ok: bool,
}

/// Outcome of [`acquire`].
pub enum InstanceRole {
    /// This process owns the lock and must serve forwarded launches.
    Primary(InstanceListener),
    /// Another process owns the lock; the arguments were handed to it.
    Secondary,
}

/// Bound single-instance socket of the primary process.
pub struct InstanceListener {
    listener: TcpListener,
}

/// Claims the single-instance lock or forwards `args` to its owner.
///
/// # Errors
/// Returns [`InstanceError::Bind`] when the port is unusable for reasons
/// other than another process holding it, and [`InstanceError::Forward`]
/// when the holder cannot be reached or is not a leonel-quick instance.
pub fn acquire(port: u16, args: &[String]) -> Result<InstanceRole, InstanceError> {
    match InstanceListener::bind(port) {
        Ok(listener) => Ok(InstanceRole::Primary(listener)),
        Err(InstanceError::Bind(error)) if error.kind() == io::ErrorKind::AddrInUse => {
            forward_args(port, args)?;
            Ok(InstanceRole::Secondary)
        }
        Err(error) => Err(error),
    }
}

/// Sends `args` to the primary instance listening on `port`.
///
/// Nothing is written until the peer has identified itself.
///
/// # Errors
/// Returns [`InstanceError::Forward`] when the connection fails, when the peer
/// does not send the acknowledgement within the read timeout, or when the
/// write fails.
pub fn forward_args(port: u16, args: &[String]) -> Result<(), InstanceError> {
    let address = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let stream =
        TcpStream::connect_timeout(&address, CONNECT_TIMEOUT).map_err(InstanceError::Forward)?;
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(InstanceError::Forward)?;
    stream
        .set_write_timeout(Some(READ_TIMEOUT))
        .map_err(InstanceError::Forward)?;
    let mut reader = BufReader::new((&stream).take(MAX_MESSAGE_BYTES));

    expect_ack(&mut reader)?;

    let mut line = encode_message(args)?;
    line.push('\n');
    let mut writer = &stream;
    writer
        .write_all(line.as_bytes())
        .map_err(InstanceError::Forward)?;
    writer.flush().map_err(InstanceError::Forward)?;

    expect_ack(&mut reader)?;
    info!(
        event = "instance.forwarded",
        arg_count = args.len(),
        "launch arguments handed to running instance"
    );
    Ok(())
}

/// Serializes the acknowledgement line, without the trailing newline.
///
/// # Errors
/// Returns [`InstanceError::Message`] when encoding fails.
pub fn encode_ack() -> Result<String, InstanceError> {
    serde_json::to_string(&InstanceAck {
        app: DEEP_LINK_SCHEME.to_string(),
        ok: true,
    })
    .map_err(|error| InstanceError::Message(error.to_string()))
}

/// Returns `true` for a positive acknowledgement from a leonel-quick peer.
pub fn is_ack(line: &str) -> bool {
    serde_json::from_str::<InstanceAck>(line.trim())
        .is_ok_and(|ack| ack.ok && ack.app == DEEP_LINK_SCHEME)
}

fn expect_ack<R: BufRead>(reader: &mut R) -> Result<(), InstanceError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(InstanceError::Forward)?;
    if is_ack(&line) {
        return Ok(());
    }
    warn!(
        event = "instance.foreign_peer",
        "port holder did not identify as leonel-quick"
    );
    Err(InstanceError::Forward(io::Error::new(
        io::ErrorKind::InvalidData,
        "port holder is not a leonel-quick instance",
    )))
}

/// Serializes a forwarded argument list.
///
/// # Errors
/// Returns [`InstanceError::Message`] when encoding fails.
pub fn encode_message(args: &[String]) -> Result<String, InstanceError> {
    serde_json::to_string(&InstanceMessage {
        args: args.to_vec(),
    })
    .map_err(|error| InstanceError::Message(error.to_string()))
}

/// Parses one forwarded line.
///
/// # Errors
/// Returns [`InstanceError::Message`] for anything but `{"args":[...]}`.
pub fn decode_message(line: &str) -> Result<Vec<String>, InstanceError> {
    serde_json::from_str::<InstanceMessage>(line.trim())
        .map(|message| message.args)
        .map_err(|error| InstanceError::Message(error.to_string()))
}

impl InstanceListener {
    /// Binds the loopback port. Port `0` picks a free one.
    ///
    /// # Errors
    /// Returns [`InstanceError::Bind`] when the port cannot be bound.
    pub fn bind(port: u16) -> Result<Self, InstanceError> {
        let listener =
            TcpListener::bind((Ipv4Addr::LOCALHOST, port)).map_err(InstanceError::Bind)?;
        Ok(Self { listener })
    }

    /// Port actually bound.
    pub fn port(&self) -> Option<u16> {
        self.listener.local_addr().ok().map(|address| address.port())
    }

    /// Serves forwarded launches on a background thread until the process ends.
    ///
    /// # Errors
    /// Returns [`InstanceError::Spawn`] when the OS refuses to start a thread.
    pub fn spawn<F>(self, on_args: F) -> Result<JoinHandle<()>, InstanceError>
    where
        F: Fn(Vec<String>) + Send + 'static,
    {
        std::thread::Builder::new()
            .name("leonel-quick-instance".to_string())
            .spawn(move || {
                for stream in self.listener.incoming() {
                    match stream {
                        Ok(stream) => match serve_connection(&stream) {
                            Ok(args) => {
                                debug!(
                                    event = "instance.received",
                                    arg_count = args.len(),
                                    "second launch received"
                                );
                                on_args(args);
                            }
                            Err(error) => {
                                warn!(event = "instance.bad_message", %error, "ignoring message");
                            }
                        },
                        Err(error) => {
                            warn!(event = "instance.accept_failed", %error, "accept failed");
                        }
                    }
                }
            })
            .map_err(InstanceError::Spawn)
    }
}

fn serve_connection(stream: &TcpStream) -> Result<Vec<String>, InstanceError> {
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(InstanceError::Read)?;
    stream
        .set_write_timeout(Some(READ_TIMEOUT))
        .map_err(InstanceError::Reply)?;
    write_ack(stream)?;

    let mut reader = BufReader::new(stream.take(MAX_MESSAGE_BYTES));
    let mut line = String::new();
    reader.read_line(&mut line).map_err(InstanceError::Read)?;
    let args = decode_message(&line)?;

    write_ack(stream)?;
    Ok(args)
}

fn write_ack(mut stream: &TcpStream) -> Result<(), InstanceError> {
    let mut line = encode_ack()?;
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .map_err(InstanceError::Reply)?;
    stream.flush().map_err(InstanceError::Reply)
}

/// Single-instance error type.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The loopback port could not be bound.
    #[error("instance port bind failed: {0}")]
    Bind(std::io::Error),
    /// The running instance could not be reached.
    #[error("forward to running instance failed: {0}")]
    Forward(std::io::Error),
    /// A forwarded message could not be read.
    #[error("instance message read failed: {0}")]
    Read(std::io::Error),
    /// The acknowledgement could not be written back.
    #[error("instance reply failed: {0}")]
    Reply(std::io::Error),
    /// A forwarded message was malformed.
    #[error("instance message malformed: {0}")]
    Message(String),
    /// The listener thread could not start.
    #[error("instance listener spawn failed: {0}")]
    Spawn(std::io::Error),
}
