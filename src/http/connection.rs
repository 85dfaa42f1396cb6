use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use mio::net::TcpStream;

use crate::http::parser::HttpParser;
use crate::http::request::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    ReadingRequest,
    ProcessingRequest,
    SendingResponse,
    Done,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The socket backed off; write interest stays on.
    Partial,
    /// Every byte of the response is on the wire.
    Finished,
    /// Hard write error; the connection is unusable.
    Gone,
}

/// One accepted client. Owned by value in the supervisor's token map;
/// the stream is non-blocking from the moment `accept` returned it.
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    /// Port of the listener that accepted this client; routing selects
    /// the server config through it.
    pub server_port: u16,
    pub state: ConnState,
    pub parser: HttpParser,
    pub request: HttpRequest,
    pub write_buf: Vec<u8>,
    pub write_offset: usize,
    pub last_activity: Instant,
    /// Set by the `/stop` route: stop the server once this response is
    /// fully flushed.
    pub shutdown_on_done: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, server_port: u16) -> Self {
        Connection {
            stream,
            server_port,
            state: ConnState::ReadingRequest,
            parser: HttpParser::new(),
            request: HttpRequest::new(),
            write_buf: Vec::new(),
            write_offset: 0,
            last_activity: Instant::now(),
            shutdown_on_done: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_activity) > timeout
    }

    /// Frames a fully built response and flips the connection into the
    /// sending state.
    pub fn set_response(&mut self, bytes: Vec<u8>) {
        self.write_buf = bytes;
        self.write_offset = 0;
        self.state = ConnState::SendingResponse;
    }

    /// Pushes pending response bytes, advancing the offset on partial
    /// writes.
    pub fn flush(&mut self) -> FlushOutcome {
        while self.write_offset < self.write_buf.len() {
            match self.stream.write(&self.write_buf[self.write_offset..]) {
                Ok(n) => {
                    self.write_offset += n;
                    self.touch();
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return FlushOutcome::Partial,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return FlushOutcome::Gone,
            }
        }
        FlushOutcome::Finished
    }

    /// Raw non-blocking read into `buf`; error mapping is left to the
    /// caller.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.stream.read(buf)?;
        if n > 0 {
            self.touch();
        }
        Ok(n)
    }

    /// 400-path reset: drop any parse state and start a fresh request so
    /// the error response is the only thing left on this connection.
    pub fn reset_after_error(&mut self) {
        self.parser.reset();
        self.request.clear();
    }
}
