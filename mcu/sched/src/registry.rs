//! Ordered handler lists for startup, background tasks and shutdown
//!
//! Populated during startup, before the main loop runs; iterated in
//! registration order.

use heapless::Vec;
use mcu_core::{Flow, McuError, McuResult};

use crate::{Scheduler, MAX_HANDLERS};

/// One-time initializer
pub type InitFn = fn(&Scheduler) -> Flow;

/// Background task, run once per main-loop pass
pub type TaskFn = fn(&Scheduler) -> Flow;

/// Emergency-stop handler, run once per shutdown.
///
/// A handler that forces another shutdown returns the token; the remaining
/// handlers are skipped and the list starts over.
pub type ShutdownFn = fn(&Scheduler) -> Flow;

pub(crate) struct HandlerRegistry {
    init: Vec<InitFn, MAX_HANDLERS>,
    tasks: Vec<TaskFn, MAX_HANDLERS>,
    shutdown: Vec<ShutdownFn, MAX_HANDLERS>,
}

impl HandlerRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            init: Vec::new(),
            tasks: Vec::new(),
            shutdown: Vec::new(),
        }
    }
}

impl Scheduler {
    /// Add a one-time initializer
    pub fn register_init(&self, handler: InitFn) -> McuResult<()> {
        critical_section::with(|cs| self.handlers.borrow_ref_mut(cs).init.push(handler))
            .map_err(|_| McuError::HandlerTableFull)
    }

    /// Add a background task
    pub fn register_task(&self, handler: TaskFn) -> McuResult<()> {
        critical_section::with(|cs| self.handlers.borrow_ref_mut(cs).tasks.push(handler))
            .map_err(|_| McuError::HandlerTableFull)
    }

    /// Add a shutdown handler
    pub fn register_shutdown(&self, handler: ShutdownFn) -> McuResult<()> {
        critical_section::with(|cs| self.handlers.borrow_ref_mut(cs).shutdown.push(handler))
            .map_err(|_| McuError::HandlerTableFull)
    }

    // Handlers run on a copy so they may themselves reach the registry

    /// Initializers in registration order
    pub fn init_handlers(&self) -> Vec<InitFn, MAX_HANDLERS> {
        critical_section::with(|cs| self.handlers.borrow_ref(cs).init.clone())
    }

    /// Tasks in registration order
    pub fn task_handlers(&self) -> Vec<TaskFn, MAX_HANDLERS> {
        critical_section::with(|cs| self.handlers.borrow_ref(cs).tasks.clone())
    }

    /// Shutdown handlers in registration order
    pub fn shutdown_handlers(&self) -> Vec<ShutdownFn, MAX_HANDLERS> {
        critical_section::with(|cs| self.handlers.borrow_ref(cs).shutdown.clone())
    }
}
