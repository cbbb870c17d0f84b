//! Connection handler and session lifecycle
//!
//! Drives one accepted connection through
//! `Connecting → Registering → Active → Leaving → Removed`:
//! banner, handle registration, then a receive task and a send task running
//! concurrently until the user quits or the connection fails.

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::ChatCodec;
use crate::dispatch::Dispatcher;
use crate::error::{AppError, HandleError, LineError, RegistryError};
use crate::message::{
    registration_error, welcome_banner, Command, Message, Origin, USERNAME_PROMPT,
};
use crate::registry::{mailbox, MailboxReceiver};
use crate::types::{Handle, SessionId};

type LineReader = FramedRead<OwnedReadHalf, ChatCodec>;
type LineWriter = FramedWrite<OwnedWriteHalf, ChatCodec>;

/// Why the receive loop stopped
#[derive(Debug)]
enum LeaveReason {
    Quit,
    Disconnected,
    ReadError(LineError),
}

/// Handle a new TCP connection
///
/// Sends the banner, registers a handle and runs the session until it is
/// removed. Errors before registration completes only affect this connection.
pub async fn handle_connection(stream: TcpStream, dispatcher: Dispatcher) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, ChatCodec::new());
    let mut writer = FramedWrite::new(write_half, ChatCodec::new());

    let online = dispatcher.registry().snapshot().await;
    writer.send(welcome_banner(&online)).await?;

    let session_id = SessionId::new();
    let (handle, inbox) = register(&mut reader, &mut writer, &dispatcher, session_id).await?;
    info!("{} joined the chat as {}", peer_addr, handle);

    let session = Session {
        handle,
        session_id,
        peer_addr,
        dispatcher,
    };
    session.announce().await;
    session.run(reader, writer, inbox).await;

    Ok(())
}

/// Prompt until a free, valid handle is registered
///
/// A read failure aborts the connection; invalid or taken names re-prompt.
async fn register(
    reader: &mut LineReader,
    writer: &mut LineWriter,
    dispatcher: &Dispatcher,
    session_id: SessionId,
) -> Result<(Handle, MailboxReceiver), AppError> {
    loop {
        writer.send(USERNAME_PROMPT.to_string()).await?;

        let line = match reader.next().await {
            Some(line) => line?,
            None => return Err(AppError::ClosedDuringRegistration),
        };

        let handle = match Handle::parse(line) {
            Ok(handle) => handle,
            Err(HandleError::Empty) => {
                writer.send(registration_error("username cannot be empty")).await?;
                continue;
            }
            Err(HandleError::Reserved(name)) => {
                debug!("Rejected reserved username {}", name);
                writer.send(registration_error("this username is reserved")).await?;
                continue;
            }
        };

        let (tx, rx) = mailbox();
        match dispatcher.registry().register(handle.clone(), session_id, tx).await {
            Ok(()) => return Ok((handle, rx)),
            Err(RegistryError::AlreadyExists(handle)) => {
                debug!("Username {} is taken", handle);
                writer.send(registration_error("this username is occupied")).await?;
            }
        }
    }
}

/// One registered user
struct Session {
    handle: Handle,
    session_id: SessionId,
    peer_addr: String,
    dispatcher: Dispatcher,
}

impl Session {
    /// Public join notice followed by the private greeting
    async fn announce(&self) {
        for msg in [Message::entered(&self.handle), Message::greeting(&self.handle)] {
            if let Err(e) = self.dispatcher.dispatch(msg).await {
                debug!("Join notice for {} failed: {}", self.handle, e);
            }
        }
    }

    /// Run the receive and send tasks until the session ends
    async fn run(self, reader: LineReader, writer: LineWriter, inbox: MailboxReceiver) {
        let mut receive_task = tokio::spawn(receive_loop(
            self.handle.clone(),
            reader,
            self.dispatcher.clone(),
        ));
        let mut send_task = tokio::spawn(send_loop(self.handle.clone(), inbox, writer));

        // Wait for either task to complete
        let send_finished = tokio::select! {
            result = &mut receive_task => {
                match result {
                    Ok(LeaveReason::Quit) => debug!("{} quit", self.handle),
                    Ok(LeaveReason::Disconnected) => debug!("{} disconnected", self.handle),
                    Ok(LeaveReason::ReadError(e)) => {
                        warn!("Read error from {}: {}", self.handle, e)
                    }
                    Err(e) => warn!("Receive task for {} failed: {}", self.handle, e),
                }
                false
            }
            _ = &mut send_task => {
                debug!("Send task completed first for {}", self.handle);
                receive_task.abort();
                true
            }
        };

        self.teardown().await;

        // Removal closed the mailbox; let the send task flush what was queued
        if !send_finished {
            if let Err(e) = send_task.await {
                warn!("Send task for {} failed: {}", self.handle, e);
            }
        }
    }

    /// Remove the session and announce the departure
    ///
    /// Only the call that actually removes the registry entry broadcasts.
    async fn teardown(&self) {
        let registry = self.dispatcher.registry();
        if !registry.remove_session(&self.handle, self.session_id).await {
            return;
        }
        info!("{} ({}) has left the chat", self.handle, self.peer_addr);
        if let Err(e) = self.dispatcher.dispatch(Message::departed(&self.handle)).await {
            debug!("Departure notice for {} failed: {}", self.handle, e);
        }
    }
}

/// Read lines and turn them into dispatched messages
async fn receive_loop(
    handle: Handle,
    mut reader: LineReader,
    dispatcher: Dispatcher,
) -> LeaveReason {
    while let Some(frame) = reader.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(e) => return LeaveReason::ReadError(e),
        };

        let msg = match Command::parse(&line) {
            Command::Empty => continue,
            Command::Say(body) => Message::broadcast(&handle, body),
            Command::Direct { target, body } => {
                Message::new(Origin::User(handle.clone()), target, body)
            }
            Command::Quit => return LeaveReason::Quit,
            Command::Unknown(command) => {
                debug!("Unknown command from {}: {}", handle, command);
                Message::unknown_command(&handle)
            }
        };

        if let Err(e) = dispatcher.dispatch(msg).await {
            debug!("Dispatch from {} failed: {}", handle, e);
        }
    }
    LeaveReason::Disconnected
}

/// Drain the mailbox to the connection in FIFO order
///
/// Ends when the mailbox is closed, then shuts the write half down.
async fn send_loop(handle: Handle, mut inbox: MailboxReceiver, mut writer: LineWriter) {
    while let Some(msg) = inbox.recv().await {
        if let Err(e) = writer.send(msg).await {
            debug!("Write to {} failed: {}", handle, e);
            return;
        }
    }
    if let Err(e) = writer.get_mut().shutdown().await {
        debug!("Shutdown for {} failed: {}", handle, e);
    }
    debug!("Send task ended for {}", handle);
}
