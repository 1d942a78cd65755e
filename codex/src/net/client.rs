//! A low-level blocking client for the stream transport.
//!
//! This client is blocking and so is primarily used as a testing utility
//! rather than an actual game client.

use anyhow::{Error, bail};
use std::{
    net::{SocketAddr, TcpStream},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use super::{
    messages::{Message, MessageKind, Payload},
    utils,
};
use crate::game::entities::{CardId, Cell, DrawChoice};

/// Default timeout for reading from the server.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for writing to the server.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// The server's answer to a login attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoginReply {
    pub nickname_accepted: bool,
    pub connection_established: bool,
    /// Error text the server sent along with a rejection.
    pub reason: Option<String>,
}

/// A blocking TCP client for connecting to a match server.
///
/// Reads happen on the caller's thread. Writes go through a shared lock
/// so the optional heartbeat thread never interleaves with a command.
pub struct Client {
    /// The identity this client logs in with.
    pub identity: String,
    reader: TcpStream,
    writer: Arc<Mutex<TcpStream>>,
}

impl Client {
    /// Open a connection to a match server without logging in.
    ///
    /// This method attempts to connect with exponential backoff, trying
    /// three times with decreasing timeouts (1s, 500ms, 100ms).
    ///
    /// # Errors
    ///
    /// Returns an error if unable to connect.
    pub fn connect(identity: impl Into<String>, addr: &SocketAddr) -> Result<Self, Error> {
        let identity = identity.into();
        let mut connect_timeouts = vec![
            Duration::from_secs(1),
            Duration::from_millis(500),
            Duration::from_millis(100),
        ];
        while let Some(connect_timeout) = connect_timeouts.pop() {
            match TcpStream::connect_timeout(addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                    let writer = stream.try_clone()?;
                    return Ok(Self {
                        identity,
                        reader: stream,
                        writer: Arc::new(Mutex::new(writer)),
                    });
                }
                _ => thread::sleep(connect_timeout),
            }
        }
        bail!("couldn't connect to {addr} as {identity}")
    }

    /// Connect and log in, failing unless the nickname is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if unable to connect or if the server rejects the login.
    pub fn join(identity: impl Into<String>, addr: &SocketAddr) -> Result<Self, Error> {
        let mut client = Self::connect(identity, addr)?;
        let reply = client.login()?;
        if !reply.nickname_accepted {
            bail!(
                "login as {} rejected: {}",
                client.identity,
                reply.reason.unwrap_or_default()
            );
        }
        Ok(client)
    }

    /// Send the login request and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request can't be sent or no reply arrives.
    pub fn login(&mut self) -> Result<LoginReply, Error> {
        self.send(Payload::LoginRequest)?;
        let mut reason = None;
        loop {
            match self.recv()?.payload {
                Payload::ErrorMessage { text } => reason = Some(text),
                Payload::LoginReply {
                    nickname_accepted,
                    connection_established,
                } => {
                    return Ok(LoginReply {
                        nickname_accepted,
                        connection_established,
                        reason,
                    });
                }
                _ => {}
            }
        }
    }

    /// Send a payload as this client's identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn send(&self, payload: Payload) -> Result<(), Error> {
        let msg = Message::new(self.identity.clone(), payload);
        write_locked(&self.writer, &msg)
    }

    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn choose_color(&self, color: &str) -> Result<(), Error> {
        self.send(Payload::ColorRequest {
            color: color.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn set_players_number(&self, count: u8) -> Result<(), Error> {
        self.send(Payload::PlayersNumberReply { count })
    }

    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn choose_secret(&self, secret_target: CardId, starting_front: bool) -> Result<(), Error> {
        self.send(Payload::SecretStartingResponse {
            secret_target,
            starting_front,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn place_card(&self, slot: u8, cell: Cell, front: bool) -> Result<(), Error> {
        self.send(Payload::PlaceCardResponse {
            slot,
            row: cell.row,
            col: cell.col,
            front,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn draw_card(&self, choice: DrawChoice) -> Result<(), Error> {
        self.send(Payload::DrawCardResponse {
            choice: choice.index(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn chat(&self, to: &str, text: &str) -> Result<(), Error> {
        self.send(Payload::ChatMessage {
            from: self.identity.clone(),
            to: to.to_string(),
            text: text.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the message cannot be sent to the server.
    pub fn ping(&self) -> Result<(), Error> {
        self.send(Payload::Ping)
    }

    /// Next message that isn't a probe.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing arrives within [`READ_TIMEOUT`] or the
    /// connection is closed.
    pub fn recv(&mut self) -> Result<Message, Error> {
        loop {
            match utils::read_prefixed::<Message, TcpStream>(&mut self.reader) {
                Ok(msg) if msg.is_ping() => {}
                Ok(msg) => return Ok(msg),
                Err(error) => bail!(error),
            }
        }
    }

    /// Skip messages until one of `kind` arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails before a matching message.
    pub fn recv_kind(&mut self, kind: MessageKind) -> Result<Message, Error> {
        loop {
            let msg = self.recv()?;
            if msg.kind() == kind {
                return Ok(msg);
            }
        }
    }

    /// Probe the server from a background thread until the returned
    /// handle is dropped.
    pub fn start_heartbeat(&self, interval: Duration) -> HeartbeatHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let writer = self.writer.clone();
        let msg = Message::ping(self.identity.clone());
        let thread_stop = stop.clone();
        let thread = thread::spawn(move || {
            while !thread_stop.load(Ordering::Acquire) {
                thread::park_timeout(interval);
                if thread_stop.load(Ordering::Acquire) {
                    break;
                }
                if write_locked(&writer, &msg).is_err() {
                    break;
                }
            }
        });
        HeartbeatHandle {
            stop,
            thread: Some(thread),
        }
    }
}

fn write_locked(writer: &Mutex<TcpStream>, msg: &Message) -> Result<(), Error> {
    let mut stream = writer.lock().unwrap_or_else(PoisonError::into_inner);
    utils::write_prefixed(&mut *stream, msg)?;
    Ok(())
}

/// Stops the client heartbeat thread when dropped.
pub struct HeartbeatHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}
