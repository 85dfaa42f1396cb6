//! Server supervisor: owns the reactor, the listeners, and the
//! connection table, and drives every connection through its
//! read → route → write lifecycle.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mio::net::TcpListener;
use mio::{Interest, Token};

use weblog::{debug, error, info, warn};

use crate::config::{AppConfig, ServerConfig};
use crate::error::Result;
use crate::http::connection::{ConnState, Connection, FlushOutcome};
use crate::http::parser::ParseStatus;
use crate::http::response::error_response;
use crate::prelude::{HTTP_BAD_REQUEST, HTTP_INTERNAL_SERVER_ERROR, LISTEN_BACKLOG, READ_BUF_SIZE};
use crate::reactor::{Reactor, Readiness};
use crate::router::{self, RouteOutcome};
use crate::timeouts;

pub struct Server {
    reactor: Reactor,
    listeners: Vec<(TcpListener, u16)>,
    servers: Vec<Arc<ServerConfig>>,
    pub connections: HashMap<Token, Connection>,
    next_token: usize,
    /// Set from the signal handler or by a flushed `/stop` response.
    shutdown: Arc<AtomicBool>,
}

impl Server {
    pub fn new(config: AppConfig, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let mut reactor = Reactor::new()?;
        let mut listeners = Vec::new();
        let servers: Vec<Arc<ServerConfig>> =
            config.servers.into_iter().map(Arc::new).collect();

        for (index, server) in servers.iter().enumerate() {
            let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;
            let mut listener = bind_listener(addr)?;
            reactor.bind(&mut listener, Token(index), Interest::READABLE)?;
            info!("listening on {}:{}", server.host, server.port);
            listeners.push((listener, server.port));
        }

        let next_token = listeners.len();
        Ok(Server {
            reactor,
            listeners,
            servers,
            connections: HashMap::new(),
            next_token,
            shutdown,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        info!("server running");

        while !self.shutdown.load(Ordering::Relaxed) {
            let ready = self.reactor.poll_once()?;
            for event in ready {
                self.dispatch(event);
            }
            timeouts::sweep(&mut self.reactor, &mut self.connections);
        }

        self.stop();
        Ok(())
    }

    fn dispatch(&mut self, event: Readiness) {
        if event.token.0 < self.listeners.len() {
            if event.readable {
                self.accept_loop(event.token.0);
            }
            return;
        }

        if event.error {
            self.drop_connection(event.token);
            return;
        }

        let state = match self.connections.get(&event.token) {
            Some(conn) => conn.state,
            None => return,
        };

        if event.readable && state == ConnState::ReadingRequest {
            self.on_readable(event.token);
        }

        // Re-check: routing may have moved the connection on.
        if event.writable {
            if let Some(conn) = self.connections.get(&event.token) {
                if conn.state == ConnState::SendingResponse {
                    self.on_writable(event.token);
                }
            }
        }
    }

    fn accept_loop(&mut self, listener_index: usize) {
        loop {
            let accepted = self.listeners[listener_index].0.accept();
            match accepted {
                Ok((stream, addr)) => {
                    debug!("new client connection from {}", addr);
                    let port = self.listeners[listener_index].1;
                    self.add_client(stream, port);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn add_client(&mut self, stream: mio::net::TcpStream, port: u16) {
        let token = Token(self.next_token);
        self.next_token += 1;

        let mut conn = Connection::new(stream, port);
        if let Err(e) = self
            .reactor
            .bind(&mut conn.stream, token, Interest::READABLE)
        {
            warn!("failed to register client: {}", e);
            return;
        }

        self.connections.insert(token, conn);
    }

    fn on_readable(&mut self, token: Token) {
        let mut peer_gone = false;
        let mut parse_failed = false;
        let mut request_complete = false;
        let mut server_port = 0;

        if let Some(conn) = self.connections.get_mut(&token) {
            server_port = conn.server_port;
            let mut buf = [0u8; READ_BUF_SIZE];

            loop {
                match conn.read_chunk(&mut buf) {
                    Ok(0) => {
                        peer_gone = true;
                        break;
                    }
                    Ok(n) => match conn.parser.feed(&mut conn.request, &buf[..n]) {
                        Ok(ParseStatus::Complete) => {
                            request_complete = true;
                            break;
                        }
                        Ok(ParseStatus::NeedMore) => {}
                        Err(e) => {
                            warn!("parse error on {:?}: {}", token, e);
                            parse_failed = true;
                            break;
                        }
                    },
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => {
                        peer_gone = true;
                        break;
                    }
                }
            }
        } else {
            return;
        }

        let server = self.server_for_port(server_port);

        if parse_failed {
            // One 400 goes out, then the connection closes; no pipelining.
            if let Some(conn) = self.connections.get_mut(&token) {
                conn.reset_after_error();
            }
            let response = error_response(HTTP_BAD_REQUEST, server.as_deref());
            self.send_response(token, response.to_bytes(), false);
            return;
        }

        if request_complete {
            self.process_request(token, server);
            return;
        }

        if peer_gone {
            self.drop_connection(token);
        }
    }

    fn process_request(&mut self, token: Token, server: Option<Arc<ServerConfig>>) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        conn.state = ConnState::ProcessingRequest;

        let peer = conn.stream.peer_addr().ok();
        let outcome = match &server {
            Some(server) => router::route(&conn.request, server, peer),
            None => RouteOutcome::Respond(error_response(HTTP_INTERNAL_SERVER_ERROR, None)),
        };

        info!(
            "{} {} -> {}",
            conn.request.method,
            conn.request.uri,
            outcome.response().status
        );

        let (response, stop_after) = match outcome {
            RouteOutcome::Respond(r) => (r, false),
            RouteOutcome::RespondThenShutdown(r) => (r, true),
        };

        self.send_response(token, response.to_bytes(), stop_after);
    }

    /// Frames the response and flips interest to WRITE before the read
    /// callback returns.
    fn send_response(&mut self, token: Token, bytes: Vec<u8>, stop_after: bool) {
        let Server {
            reactor,
            connections,
            ..
        } = self;

        let Some(conn) = connections.get_mut(&token) else {
            return;
        };

        conn.set_response(bytes);
        conn.shutdown_on_done = stop_after;

        if reactor
            .bind(&mut conn.stream, token, Interest::WRITABLE)
            .is_err()
        {
            self.drop_connection(token);
        }
    }

    fn on_writable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        match conn.flush() {
            FlushOutcome::Partial => {}
            FlushOutcome::Finished => {
                conn.state = ConnState::Done;
                let stop = conn.shutdown_on_done;
                self.drop_connection(token);
                if stop {
                    self.shutdown.store(true, Ordering::Relaxed);
                }
            }
            FlushOutcome::Gone => self.drop_connection(token),
        }
    }

    fn drop_connection(&mut self, token: Token) {
        let Server {
            reactor,
            connections,
            ..
        } = self;

        if let Some(mut conn) = connections.remove(&token) {
            let _ = reactor.unbind(&mut conn.stream, token, None);
            let _ = conn.stream.shutdown(Shutdown::Both);
            debug!("client {:?} removed", token);
        }
    }

    fn server_for_port(&self, port: u16) -> Option<Arc<ServerConfig>> {
        self.servers
            .iter()
            .find(|s| s.port == port)
            .map(Arc::clone)
    }

    /// Clients first, then listeners.
    fn stop(&mut self) {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.drop_connection(token);
        }

        for (index, (listener, _)) in self.listeners.iter_mut().enumerate() {
            let _ = self.reactor.unbind(listener, Token(index), None);
        }
        self.listeners.clear();

        info!("server stopped");
    }
}

/// Non-blocking listener with SO_REUSEADDR and the configured backlog.
fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        socket2::Domain::IPV4
    } else {
        socket2::Domain::IPV6
    };
    let socket = socket2::Socket::new(domain, socket2::Type::STREAM, Some(socket2::Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG as i32)?;
    socket.set_nonblocking(true)?;

    Ok(TcpListener::from_std(socket.into()))
}
