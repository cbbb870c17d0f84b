//! ChatServer acceptor
//!
//! Owns the listening socket and the shared registry. Every accepted
//! connection gets its own task; a failing connection never stops the loop.

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info};

use crate::dispatch::Dispatcher;
use crate::error::AppError;
use crate::registry::Registry;
use crate::session::handle_connection;

/// The chat relay server
pub struct ChatServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl ChatServer {
    /// Bind the listening socket with an empty registry
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher: Dispatcher::new(Registry::new()),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared registry of this server
    pub fn registry(&self) -> Registry {
        self.dispatcher.registry().clone()
    }

    /// Accept connections forever
    pub async fn run(self) {
        info!("ChatServer started");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("{} connected", addr);
                    let dispatcher = self.dispatcher.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        match handle_connection(stream, dispatcher).await {
                            Ok(()) => debug!("Connection from {} finished", addr),
                            Err(AppError::ClosedDuringRegistration) => {
                                info!("{} left before registering", addr)
                            }
                            Err(e) => error!("Connection handler error for {}: {}", addr, e),
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
