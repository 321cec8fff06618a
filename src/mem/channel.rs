//! One memory channel.
//!
//! A channel is an independent memory path: one controller, its ranks, and
//! its command and data buses. This wrapper pins the channel id to the
//! controller and forwards the small public surface the front end needs.

use crate::config::Config;
use crate::mem::controller::{CommandHook, CompletionCallback, MemoryController};
use crate::mem::transaction::{Completion, Transaction};
use std::sync::Arc;

pub struct Channel {
    pub id: usize,
    controller: MemoryController,
}

impl Channel {
    pub fn new(id: usize, cfg: Arc<Config>) -> Self {
        Self {
            id,
            controller: MemoryController::new(id, cfg),
        }
    }

    pub fn will_accept(&self) -> bool {
        self.controller.will_accept()
    }

    /// Hands a transaction to the controller; on rejection the caller gets
    /// it back and retries a later cycle.
    pub fn add_transaction(&mut self, txn: Transaction) -> Result<(), Transaction> {
        self.controller.enqueue(txn)
    }

    /// Advances the channel by one DRAM cycle.
    pub fn update(&mut self) {
        self.controller.tick();
    }

    pub fn register_callbacks(
        &mut self,
        on_read_complete: CompletionCallback,
        on_write_complete: CompletionCallback,
    ) {
        self.controller
            .register_callbacks(on_read_complete, on_write_complete);
    }

    pub fn set_command_hook(&mut self, hook: CommandHook) {
        self.controller.set_command_hook(hook);
    }

    pub fn drain_completions(&mut self) -> Vec<Completion> {
        self.controller.drain_completions()
    }

    pub fn controller(&self) -> &MemoryController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MemoryController {
        &mut self.controller
    }
}
