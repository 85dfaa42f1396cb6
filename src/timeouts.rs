use std::collections::HashMap;
use std::net::Shutdown;
use std::time::Instant;

use mio::Token;

use weblog::debug;

use crate::http::connection::Connection;
use crate::prelude::CLIENT_TIMEOUT;
use crate::reactor::Reactor;

/// Drops every connection that has been silent past `CLIENT_TIMEOUT`.
/// Runs after each reactor tick.
pub fn sweep(reactor: &mut Reactor, connections: &mut HashMap<Token, Connection>) {
    let now = Instant::now();

    connections.retain(|token, conn| {
        if !conn.is_timed_out(now, CLIENT_TIMEOUT) {
            return true;
        }

        debug!("client {:?} timed out", token);
        let _ = reactor.unbind(&mut conn.stream, *token, None);
        let _ = conn.stream.shutdown(Shutdown::Both);
        false
    });
}
