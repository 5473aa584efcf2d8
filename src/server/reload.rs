//! WebSocket hub for live reload.
//!
//! Transform tasks call [`ReloadHub::reload`]/[`ReloadHub::refresh_css`]
//! after writing; every connected browser receives the message. Dead
//! clients are dropped on the next broadcast.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tungstenite::{Message, WebSocket};

use super::message::ReloadMessage;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Connected browser clients plus the port the hub bound to.
pub struct ReloadHub {
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
    port: u16,
}

impl ReloadHub {
    /// Bind the WebSocket listener (retrying on port conflicts) and spawn
    /// the acceptor thread.
    pub fn start(base_port: u16) -> Result<Arc<Self>> {
        let (listener, port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
        listener.set_nonblocking(true)?;

        let hub = Arc::new(Self {
            clients: Arc::new(Mutex::new(Vec::new())),
            port,
        });

        let clients = Arc::clone(&hub.clients);
        std::thread::spawn(move || accept_loop(&listener, &clients));

        debug!("reload"; "ws://localhost:{}", port);
        Ok(hub)
    }

    /// Port the hub actually bound (may differ from the configured one).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Ask all connected browsers for a full page reload.
    pub fn reload(&self, reason: &str) {
        self.broadcast(&ReloadMessage::reload(reason));
    }

    /// Ask all connected browsers to refresh the stylesheet in place.
    pub fn refresh_css(&self, target: &str) {
        self.broadcast(&ReloadMessage::css(target));
    }

    fn broadcast(&self, msg: &ReloadMessage) {
        let json = msg.to_json();
        let mut clients = self.clients.lock();
        clients.retain_mut(|ws| ws.send(Message::Text(json.clone().into())).is_ok());
        debug!("reload"; "sent to {} client(s): {}", clients.len(), json);
    }
}

fn accept_loop(listener: &TcpListener, clients: &Mutex<Vec<WebSocket<TcpStream>>>) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                crate::debug!("reload"; "client connected: {}", addr);

                // Set blocking for the WebSocket handshake and writes
                let _ = stream.set_nonblocking(false);
                match tungstenite::accept(stream) {
                    Ok(mut ws) => {
                        let hello = ReloadMessage::connected().to_json();
                        if ws.send(Message::Text(hello.into())).is_ok() {
                            clients.lock().push(ws);
                        }
                    }
                    Err(e) => log!("reload"; "handshake failed: {}", e),
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if crate::state::is_shutdown() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
        }
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(format!("127.0.0.1:{}", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
