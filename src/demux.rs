//! Split one decoded unit stream into an event stream and everything else.
//!
//! A dispatch thread reads the source sequentially and classifies each unit:
//!
//! - outside an event, a non-`Event` unit goes to [`Demux::other`];
//! - an `Event` unit goes to [`Demux::events`] and starts an event with nesting 0;
//! - inside an event every unit goes to `events`; container openings increment the nesting,
//!   `Term` decrements it, and the event ends once the nesting is back at zero or below.
//!
//! Both hand-offs are rendezvous channels: the dispatch thread only moves on once a consumer
//! has taken the previous unit. A slow consumer therefore throttles the source instead of
//! losing units, but a branch nobody reads will stall the other one. Within a branch, units
//! keep the source order.
//!
//! A `BinStream` unit carries the source decoder's lock, so the dispatch thread cannot decode
//! past it until the consumer has drained or fast-forwarded the stream.
//!
//! When the source reports end of input or any error, both branches close and every later read
//! from either of them returns that error.

use crate::decode::UnitReader;
use crate::error::{CodecError, Result};
use crate::unit::Unit;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io;
use std::sync::{Arc, OnceLock};
use std::thread;
use tracing::{debug, trace};

/// Handle to a running demultiplexer.
#[derive(Debug)]
pub struct Demux {
    events: DemuxBranch,
    other: DemuxBranch,
}

impl Demux {
    /// Start the dispatch thread over `source`. The thread runs until the source fails or ends,
    /// or until both branches have been dropped.
    pub fn new<U>(source: U) -> Result<Self>
    where
        U: UnitReader + Send + 'static,
    {
        let (events_tx, events_rx) = bounded(0);
        let (other_tx, other_rx) = bounded(0);
        let terminal = Arc::new(OnceLock::new());

        let dispatcher = Dispatcher {
            source,
            events: Some(events_tx),
            other: Some(other_tx),
            terminal: Arc::clone(&terminal),
        };
        thread::Builder::new()
            .name("binproto-demux".to_string())
            .spawn(move || dispatcher.run())
            .map_err(CodecError::from)?;

        Ok(Demux {
            events: DemuxBranch {
                rx: events_rx,
                terminal: Arc::clone(&terminal),
            },
            other: DemuxBranch {
                rx: other_rx,
                terminal,
            },
        })
    }

    /// Event units: each `Event` together with the units that make up its body.
    pub fn events(&self) -> DemuxBranch {
        self.events.clone()
    }

    /// Every unit that is not part of an event.
    pub fn other(&self) -> DemuxBranch {
        self.other.clone()
    }

    /// Split into `(events, other)`.
    pub fn into_branches(self) -> (DemuxBranch, DemuxBranch) {
        (self.events, self.other)
    }
}

/// One logical stream of a [`Demux`].
#[derive(Debug, Clone)]
pub struct DemuxBranch {
    rx: Receiver<Unit>,
    terminal: Arc<OnceLock<CodecError>>,
}

impl UnitReader for DemuxBranch {
    fn read_unit(&self) -> Result<Unit> {
        match self.rx.recv() {
            Ok(unit) => Ok(unit),
            Err(_) => Err(self
                .terminal
                .get()
                .cloned()
                .unwrap_or(CodecError::EndOfInput)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Events,
    Other,
}

/// Event-tracking state of the dispatch thread.
#[derive(Debug, Default)]
struct Classifier {
    in_event: bool,
    nesting: i64,
}

impl Classifier {
    fn route(&mut self, unit: &Unit) -> Route {
        if self.in_event {
            if unit.is_opening() {
                self.nesting += 1;
            } else if let Unit::Term = unit {
                self.nesting -= 1;
            }
            if self.nesting <= 0 {
                self.in_event = false;
            }
            Route::Events
        } else if let Unit::Event(_) = unit {
            self.in_event = true;
            self.nesting = 0;
            Route::Events
        } else {
            Route::Other
        }
    }
}

struct Dispatcher<U> {
    source: U,
    events: Option<Sender<Unit>>,
    other: Option<Sender<Unit>>,
    terminal: Arc<OnceLock<CodecError>>,
}

impl<U: UnitReader> Dispatcher<U> {
    fn run(mut self) {
        let mut classifier = Classifier::default();
        loop {
            let unit = match self.source.read_unit() {
                Ok(u) => u,
                Err(e) => {
                    debug!(error = %e, "demux source finished");
                    let _ = self.terminal.set(e);
                    // Dropping the senders closes both branches.
                    return;
                }
            };

            let route = classifier.route(&unit);
            trace!(unit = unit.unit_type().name(), ?route, "demux routing");
            let slot = match route {
                Route::Events => &mut self.events,
                Route::Other => &mut self.other,
            };
            let undelivered = match slot.as_ref() {
                Some(tx) => tx.send(unit).err().map(|e| e.into_inner()),
                None => Some(unit),
            };
            if let Some(unit) = undelivered {
                if slot.take().is_some() {
                    debug!(?route, "demux branch dropped by all readers");
                }
                discard(unit);
            }

            if self.events.is_none() && self.other.is_none() {
                debug!("both demux branches dropped, stopping dispatch");
                let _ = self.terminal.set(CodecError::from(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "demux stopped",
                )));
                return;
            }
        }
    }
}

/// Drop a unit nobody will read, draining a stream so the source stays positioned.
fn discard(unit: Unit) {
    if let Unit::BinStream(mut stream) = unit {
        if let Err(e) = stream.fast_forward() {
            debug!(error = %e, "fast-forwarding discarded binstream failed");
        }
    }
}
