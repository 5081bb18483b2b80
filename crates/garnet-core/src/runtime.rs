//! Runtime front end
//!
//! [`Runtime`] is the multi-context entry point: it owns the memory manager
//! behind a mutex, the safepoint coordinator, and the interrupt flags. An
//! execution context attaches once, then funnels its allocations and
//! checkpoints through here; collection always runs with the world stopped.
//!
//! Single-context embeddings that never share the heap can skip this layer
//! and drive a [`MemoryManager`] directly.

use crate::heap::HeapConfig;
use crate::memory::MemoryManager;
use crate::safepoint::{ContextId, InterruptFlags, PreemptTicker, SafepointCoordinator};
use crate::types::{TypeId, TypeRegistry};
use crate::value::Value;
use crate::MemoryResult;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Shared runtime: memory manager, safepoints, interrupts
pub struct Runtime {
    memory: Arc<Mutex<MemoryManager>>,
    safepoint: Arc<SafepointCoordinator>,
    flags: Arc<InterruptFlags>,
    ticker: Option<PreemptTicker>,
}

impl Runtime {
    /// Create a runtime over a fresh heap; preemption starts disabled
    pub fn new(types: Arc<TypeRegistry>, config: HeapConfig) -> Self {
        Self {
            memory: Arc::new(Mutex::new(MemoryManager::new(types, config))),
            safepoint: Arc::new(SafepointCoordinator::new()),
            flags: Arc::new(InterruptFlags::default()),
            ticker: None,
        }
    }

    /// Start the preemption ticker
    pub fn enable_preemption(&mut self) {
        if self.ticker.is_none() {
            self.ticker = Some(PreemptTicker::start(Arc::clone(&self.flags)));
        }
    }

    /// Attach the calling execution context
    pub fn attach_context(&self) -> ContextId {
        self.safepoint.register()
    }

    /// Detach a context; it stops being waited for at safepoints
    pub fn detach_context(&self, ctx: ContextId) {
        self.safepoint.unregister(ctx);
    }

    /// Lock the memory manager (roots, field access, diagnostics)
    pub fn memory(&self) -> MutexGuard<'_, MemoryManager> {
        self.memory.lock()
    }

    /// The interrupt flags, for embedding-driven wakeups
    pub fn interrupt_flags(&self) -> &Arc<InterruptFlags> {
        &self.flags
    }

    /// The safepoint coordinator
    pub fn safepoint(&self) -> &Arc<SafepointCoordinator> {
        &self.safepoint
    }

    /// Checkpoint: park if the world is stopping, run any requested cycle
    pub fn checkpoint(&self, ctx: ContextId) {
        self.safepoint.poll(ctx);
        if self.flags.check_and_clear() && self.flags.take_perform_gc() {
            self.collect(ctx);
        }
    }

    /// Allocate a reference-bodied instance on behalf of `ctx`
    ///
    /// The fast path allocates under the lock without collecting; on
    /// pressure the world is stopped and the manager collects and retries.
    pub fn allocate(&self, ctx: ContextId, type_id: TypeId, fields: usize) -> MemoryResult<Value> {
        self.checkpoint(ctx);
        {
            let mut memory = self.memory.lock();
            if let Some(value) = memory.try_allocate(type_id, fields)? {
                return Ok(value);
            }
        }
        let _world = self.safepoint.stop_the_world(ctx);
        let mut memory = self.memory.lock();
        memory.allocate(type_id, fields)
    }

    /// Allocate a byte-bodied instance on behalf of `ctx`
    pub fn allocate_bytes(&self, ctx: ContextId, type_id: TypeId, len: usize) -> MemoryResult<Value> {
        self.checkpoint(ctx);
        {
            let mut memory = self.memory.lock();
            if let Some(value) = memory.try_allocate_bytes(type_id, len)? {
                return Ok(value);
            }
        }
        let _world = self.safepoint.stop_the_world(ctx);
        let mut memory = self.memory.lock();
        memory.allocate_bytes(type_id, len)
    }

    /// Stop the world and run a young cycle (plus a full one if requested)
    pub fn collect(&self, ctx: ContextId) {
        let _world = self.safepoint.stop_the_world(ctx);
        let mut memory = self.memory.lock();
        memory.collect_young();
        if memory.heap().collect_mature_now {
            memory.collect_full();
        }
    }

    /// Stop the world and run a full cycle
    pub fn collect_full(&self, ctx: ContextId) {
        let _world = self.safepoint.stop_the_world(ctx);
        self.memory.lock().collect_full();
    }

    /// Ask every context to run a collection at its next checkpoint
    pub fn request_collection(&self) {
        self.flags.set_perform_gc();
    }
}
