//! Port handoff between the control thread and the process thread
//!
//! The control thread registers ports on the running client and queues
//! them for the process thread, which installs them at the start of its
//! next cycle. Whatever they replace travels back on a second ring, so
//! ports are only unregistered once the process thread has let go of
//! them. The client is never deactivated for a layout change, so the
//! group that is not changing keeps running and keeps its connections.

use std::time::{Duration, Instant};

/// Changes that can be queued before the process thread catches up
const CAPACITY: usize = 8;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// New contents for one port group; `None` removes the group
pub enum PortChange<A, M> {
    Audio(Option<A>),
    Midi(Option<M>),
}

/// Ports the process thread is currently using
pub struct LivePorts<A, M> {
    pub audio: Option<A>,
    pub midi: Option<M>,
}

impl<A, M> Default for LivePorts<A, M> {
    fn default() -> Self {
        Self {
            audio: None,
            midi: None,
        }
    }
}

/// Create both ends of a port handoff
pub fn port_exchange<A, M>() -> (PortSender<A, M>, PortReceiver<A, M>) {
    let (changes_tx, changes_rx) = rtrb::RingBuffer::new(CAPACITY);
    let (retired_tx, retired_rx) = rtrb::RingBuffer::new(CAPACITY);
    (
        PortSender {
            changes: changes_tx,
            retired: retired_rx,
            in_flight: 0,
        },
        PortReceiver {
            changes: changes_rx,
            retired: retired_tx,
            live: LivePorts::default(),
        },
    )
}

/// Control-thread end
pub struct PortSender<A, M> {
    changes: rtrb::Producer<PortChange<A, M>>,
    retired: rtrb::Consumer<PortChange<A, M>>,
    /// Sent changes whose replaced ports have not come back yet
    in_flight: usize,
}

impl<A, M> PortSender<A, M> {
    /// Queue `change`; it is handed back if the queue is full
    pub fn send(&mut self, change: PortChange<A, M>) -> Result<(), PortChange<A, M>> {
        match self.changes.push(change) {
            Ok(()) => {
                self.in_flight += 1;
                Ok(())
            }
            Err(rtrb::PushError::Full(change)) => Err(change),
        }
    }

    /// Wait until every sent change is installed
    ///
    /// Each replaced group is passed to `release` as it comes back. Returns
    /// `false` if `timeout` ran out first; the stragglers are released by a
    /// later call or by [`drain`](Self::drain).
    pub fn settle(&mut self, timeout: Duration, mut release: impl FnMut(PortChange<A, M>)) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            while let Ok(old) = self.retired.pop() {
                self.in_flight = self.in_flight.saturating_sub(1);
                release(old);
            }
            if self.in_flight == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Replaced groups not collected yet, once the process thread is gone
    pub fn drain(&mut self) -> Vec<PortChange<A, M>> {
        let mut drained = Vec::new();
        while let Ok(old) = self.retired.pop() {
            drained.push(old);
        }
        self.in_flight = 0;
        drained
    }
}

/// Process-thread end
pub struct PortReceiver<A, M> {
    changes: rtrb::Consumer<PortChange<A, M>>,
    retired: rtrb::Producer<PortChange<A, M>>,
    live: LivePorts<A, M>,
}

impl<A, M> PortReceiver<A, M> {
    /// Install queued changes and return the ports for this cycle
    ///
    /// Never blocks or allocates. A change stays queued while the return
    /// ring is full.
    pub fn update(&mut self) -> &LivePorts<A, M> {
        while !self.retired.is_full() {
            let Ok(change) = self.changes.pop() else {
                break;
            };
            let old = match change {
                PortChange::Audio(ports) => {
                    PortChange::Audio(std::mem::replace(&mut self.live.audio, ports))
                }
                PortChange::Midi(port) => {
                    PortChange::Midi(std::mem::replace(&mut self.live.midi, port))
                }
            };
            // Checked for room above
            if let Err(rtrb::PushError::Full(_)) = self.retired.push(old) {
                break;
            }
        }
        &self.live
    }

    pub fn live(&self) -> &LivePorts<A, M> {
        &self.live
    }

    /// Every port this end still holds, installed or queued
    pub fn drain(mut self) -> Vec<PortChange<A, M>> {
        let mut drained = Vec::new();
        if let Some(audio) = self.live.audio.take() {
            drained.push(PortChange::Audio(Some(audio)));
        }
        if let Some(midi) = self.live.midi.take() {
            drained.push(PortChange::Midi(Some(midi)));
        }
        while let Ok(change) = self.changes.pop() {
            drained.push(change);
        }
        drained
    }
}
