//! Per-module issue-order gate
//!
//! Reorders of one module are sent strictly in the order they were issued,
//! however their futures are scheduled. Each submission takes a numbered
//! ticket and waits until the gate serves its number.
//!
//! A failed reorder reverts the module and bumps the gate epoch, so tickets
//! issued before the failure know their optimistic state is gone and stand
//! down instead of persisting an order the user no longer sees.
//!
//! A reorder sends the complete member list of its module, so it cannot
//! overlap with a change to who the members are (a lesson moving in or out,
//! created or deleted). Such changes hold a [`MembershipReservation`] on the
//! modules they touch. The gate refuses tickets while one is held and refuses
//! reservations while tickets are outstanding.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::domain::ModuleId;
use crate::store::{lock, SharedStore};

#[derive(Debug, Default)]
struct GateState {
    next_ticket: u64,
    /// Ticket currently allowed to talk to the server
    serving: u64,
    epoch: u64,
    /// Tickets dropped before their turn came
    abandoned: BTreeSet<u64>,
    /// Outstanding membership changes
    reservations: usize,
}

#[derive(Debug)]
pub(crate) struct SequenceGate {
    state: Mutex<GateState>,
    turn: watch::Sender<u64>,
}

impl SequenceGate {
    pub fn new() -> Self {
        let (turn, _) = watch::channel(0);
        Self {
            state: Mutex::new(GateState::default()),
            turn,
        }
    }

    /// Take the next ticket; returns its number and the current epoch.
    /// None while a membership change of the module is outstanding.
    pub fn issue(&self) -> Option<(u64, u64)> {
        let mut state = lock(&self.state);
        if state.reservations > 0 {
            return None;
        }
        let number = state.next_ticket;
        state.next_ticket += 1;
        Some((number, state.epoch))
    }

    fn reserve(&self) -> bool {
        let mut state = lock(&self.state);
        if state.serving < state.next_ticket {
            return false;
        }
        state.reservations += 1;
        true
    }

    fn release(&self) {
        let mut state = lock(&self.state);
        state.reservations = state.reservations.saturating_sub(1);
    }

    pub fn epoch(&self) -> u64 {
        lock(&self.state).epoch
    }

    pub async fn wait_turn(&self, number: u64) {
        let mut turn = self.turn.subscribe();
        // The sender lives as long as the gate, so this cannot error
        let _ = turn.wait_for(|serving| *serving >= number).await;
    }

    /// Mark every ticket issued so far as stale
    pub fn invalidate(&self) {
        lock(&self.state).epoch += 1;
    }

    /// Called by the ticket being served once it is done
    pub fn finish(&self, number: u64) {
        let mut state = lock(&self.state);
        if state.serving == number {
            self.advance(&mut state);
        }
    }

    /// Give up a ticket, whether or not it is being served
    pub fn abandon(&self, number: u64) {
        let mut state = lock(&self.state);
        if state.serving == number {
            self.advance(&mut state);
        } else if number > state.serving {
            state.abandoned.insert(number);
        }
    }

    fn advance(&self, state: &mut GateState) {
        state.serving += 1;
        while state.abandoned.remove(&state.serving) {
            state.serving += 1;
        }
        self.turn.send_replace(state.serving);
    }
}

/// A place in a module's queue. Dropping it without settling (for example
/// when the confirming future is cancelled) reverts the module and lets the
/// queue move on.
#[derive(Debug)]
pub(crate) struct Ticket {
    gate: Arc<SequenceGate>,
    number: u64,
    epoch: u64,
    store: SharedStore,
    module_id: Option<ModuleId>,
    settled: bool,
}

impl Ticket {
    pub fn issue(gate: Arc<SequenceGate>, store: SharedStore, module_id: Option<ModuleId>) -> Option<Self> {
        let (number, epoch) = gate.issue()?;
        Some(Self {
            gate,
            number,
            epoch,
            store,
            module_id,
            settled: false,
        })
    }

    pub async fn wait_turn(&self) {
        self.gate.wait_turn(self.number).await;
    }

    /// False once an earlier ticket of the same module failed
    pub fn is_current(&self) -> bool {
        self.gate.epoch() == self.epoch
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.gate.finish(self.number);
    }

    /// The request was rejected: put the module back and stale the queue
    pub fn fail(mut self) {
        self.settled = true;
        self.revert();
        self.gate.finish(self.number);
    }

    /// Stand down without contacting the server
    pub fn skip(mut self) {
        self.settled = true;
        self.gate.finish(self.number);
    }

    fn revert(&self) {
        lock(&self.store).revert_module(self.module_id.as_ref());
        self.gate.invalidate();
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        log::warn!(
            "[Engine] Reorder of module {:?} abandoned before it was confirmed",
            self.module_id
        );
        self.revert();
        self.gate.abandon(self.number);
    }
}

/// Blocks reorders of the held modules until dropped
#[derive(Debug, Default)]
pub(crate) struct MembershipReservation {
    gates: Vec<Arc<SequenceGate>>,
}

impl MembershipReservation {
    /// Add a module's gate. False (and nothing held for it) when the
    /// module has reorders queued.
    pub fn hold(&mut self, gate: Arc<SequenceGate>) -> bool {
        if self.gates.iter().any(|held| Arc::ptr_eq(held, &gate)) {
            return true;
        }
        if !gate.reserve() {
            return false;
        }
        self.gates.push(gate);
        true
    }
}

impl Drop for MembershipReservation {
    fn drop(&mut self) {
        for gate in &self.gates {
            gate.release();
        }
    }
}
