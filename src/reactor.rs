use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

/// One drained multiplexer event, decoupled from the `Events` buffer so
/// the supervisor can mutate its tables while dispatching.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
}

/// Level-triggered readiness multiplexer over `mio::Poll`.
///
/// Interest is tracked per token so that `bind` merges with whatever is
/// already subscribed (binding an existing (token, interest) pair is a
/// no-op) and `unbind` can peel off a single event or drop the
/// registration entirely. The state machine that reacts to events lives
/// in the supervisor, not here.
pub struct Reactor {
    poll: Poll,
    events: Events,
    tracked: HashMap<Token, Interest>,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        Ok(Reactor {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            tracked: HashMap::new(),
        })
    }

    pub fn is_tracked(&self, token: Token) -> bool {
        self.tracked.contains_key(&token)
    }

    pub fn bind<S>(&mut self, source: &mut S, token: Token, interest: Interest) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        match self.tracked.get(&token) {
            Some(current) => {
                let merged = current.add(interest);
                if merged == *current {
                    return Ok(());
                }
                self.poll.registry().reregister(source, token, merged)?;
                self.tracked.insert(token, merged);
            }
            None => {
                self.poll.registry().register(source, token, interest)?;
                self.tracked.insert(token, interest);
            }
        }
        Ok(())
    }

    /// Removes one event subscription, or the whole registration when
    /// `interest` is `None`.
    pub fn unbind<S>(
        &mut self,
        source: &mut S,
        token: Token,
        interest: Option<Interest>,
    ) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        let Some(current) = self.tracked.get(&token).copied() else {
            return Ok(());
        };

        match interest {
            None => {
                self.tracked.remove(&token);
                self.poll.registry().deregister(source)
            }
            Some(interest) => match current.remove(interest) {
                Some(rest) => {
                    self.poll.registry().reregister(source, token, rest)?;
                    self.tracked.insert(token, rest);
                    Ok(())
                }
                None => {
                    self.tracked.remove(&token);
                    self.poll.registry().deregister(source)
                }
            },
        }
    }

    /// Single non-blocking multiplexer wait. Events for tokens that were
    /// unbound since they queued are dropped.
    pub fn poll_once(&mut self) -> io::Result<Vec<Readiness>> {
        match self.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        let mut ready = Vec::with_capacity(self.events.iter().count());
        for event in self.events.iter() {
            if !self.tracked.contains_key(&event.token()) {
                continue;
            }
            ready.push(Readiness {
                token: event.token(),
                readable: event.is_readable(),
                writable: event.is_writable(),
                error: event.is_error(),
            });
        }
        Ok(ready)
    }
}
