//! Tracing, compacting garbage collection with pointer relocation.
//!
//! Three phases run back to back between two dispatch steps:
//!
//! 1. **Mark** walks the root set (every layer of the live stack plus the
//!    value register), recording each reachable heap address. Closures expose
//!    their captured environment; continuations expose every captured layer's
//!    environment, accumulated arguments, and callee.
//! 2. **Sweep** left-packs the live cells in address order, truncates the
//!    heap, and records where each cell moved.
//! 3. **Relocate** re-walks the same graph, rewriting every environment entry
//!    through the forwarding map. Entries are patched before their targets are
//!    followed, so recursion always descends through new addresses.
//!
//! Both traversals key their visited sets on identity: aggregate values by
//! their shared pointer, environments by their cell pointer. The env-cell set
//! is what makes patching idempotent: layers of one live scope share a cell,
//! and rewriting it twice would corrupt the addresses. No value is allocated
//! between sweep and relocate.

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use crate::{
    heap::Heap,
    stack::{EnvCell, EnvEntry, Layer},
    value::Value,
    vm::Machine,
};

impl Machine {
    /// Runs a full collection cycle and returns the number of cells reclaimed.
    pub(crate) fn collect(&mut self) -> usize {
        let mut marker = Marker {
            heap: &self.heap,
            seen_values: AHashSet::new(),
            seen_envs: AHashSet::new(),
            live: AHashSet::new(),
        };
        marker.mark_stack(&self.stack);
        marker.mark_value(&self.value);
        let live = marker.live;

        let (forwarding, removed) = self.heap.compact(&live);

        let mut patcher = Patcher {
            heap: &self.heap,
            forwarding: &forwarding,
            seen_values: AHashSet::new(),
            seen_envs: AHashSet::new(),
            seen_addrs: AHashSet::new(),
        };
        patcher.patch_stack(&self.stack);
        patcher.patch_value(&self.value);

        removed
    }
}

fn env_identity(env: &EnvCell) -> usize {
    Rc::as_ptr(env).cast::<()>() as usize
}

struct Marker<'heap> {
    heap: &'heap Heap,
    seen_values: AHashSet<usize>,
    seen_envs: AHashSet<usize>,
    live: AHashSet<usize>,
}

impl Marker<'_> {
    fn mark_stack(&mut self, stack: &[Layer]) {
        for layer in stack {
            self.mark_env(&layer.env);
            for arg in &layer.args {
                self.mark_value(arg);
            }
            if let Some(callee) = &layer.callee {
                self.mark_value(callee);
            }
        }
    }

    fn mark_env(&mut self, env: &EnvCell) {
        if !self.seen_envs.insert(env_identity(env)) {
            return;
        }
        // snapshot the entries so no borrow is held while recursing
        let entries: Vec<EnvEntry> = env.borrow().clone();
        for entry in entries {
            self.mark_address(entry.addr);
        }
    }

    fn mark_address(&mut self, addr: usize) {
        if !self.live.insert(addr) {
            return;
        }
        let heap = self.heap;
        if let Some(value) = heap.get(addr) {
            self.mark_value(value);
        }
    }

    fn mark_value(&mut self, value: &Value) {
        match value {
            Value::Closure(closure) => {
                let Some(id) = value.identity() else { return };
                if !self.seen_values.insert(id) {
                    return;
                }
                let entries: Vec<EnvEntry> = closure.env.borrow().clone();
                for entry in entries {
                    self.mark_address(entry.addr);
                }
            }
            Value::Continuation(continuation) => {
                let Some(id) = value.identity() else { return };
                if !self.seen_values.insert(id) {
                    return;
                }
                self.mark_stack(&continuation.stack);
            }
            Value::Void | Value::Rational(_) | Value::Text(_) => {}
        }
    }
}

struct Patcher<'gc> {
    heap: &'gc Heap,
    forwarding: &'gc AHashMap<usize, usize>,
    seen_values: AHashSet<usize>,
    seen_envs: AHashSet<usize>,
    seen_addrs: AHashSet<usize>,
}

impl Patcher<'_> {
    fn patch_stack(&mut self, stack: &[Layer]) {
        for layer in stack {
            self.patch_env(&layer.env);
            for arg in &layer.args {
                self.patch_value(arg);
            }
            if let Some(callee) = &layer.callee {
                self.patch_value(callee);
            }
        }
    }

    /// Rewrites the entries of one environment exactly once, then follows the
    /// rewritten addresses.
    fn patch_env(&mut self, env: &EnvCell) {
        if !self.seen_envs.insert(env_identity(env)) {
            return;
        }
        let patched = self.patch_entries(&mut env.borrow_mut());
        for addr in patched {
            self.patch_address(addr);
        }
    }

    fn patch_entries(&self, entries: &mut [EnvEntry]) -> Vec<usize> {
        let mut addrs = Vec::with_capacity(entries.len());
        for entry in entries.iter_mut() {
            // addresses missing from the map were dangling before collection
            // (values escaped from an `eval` sub-state) and stay untouched
            if let Some(&new_addr) = self.forwarding.get(&entry.addr) {
                entry.addr = new_addr;
            }
            addrs.push(entry.addr);
        }
        addrs
    }

    fn patch_address(&mut self, addr: usize) {
        if !self.seen_addrs.insert(addr) {
            return;
        }
        let heap = self.heap;
        if let Some(value) = heap.get(addr) {
            self.patch_value(value);
        }
    }

    fn patch_value(&mut self, value: &Value) {
        match value {
            Value::Closure(closure) => {
                let Some(id) = value.identity() else { return };
                if !self.seen_values.insert(id) {
                    return;
                }
                let patched = self.patch_entries(&mut closure.env.borrow_mut());
                for addr in patched {
                    self.patch_address(addr);
                }
            }
            Value::Continuation(continuation) => {
                let Some(id) = value.identity() else { return };
                if !self.seen_values.insert(id) {
                    return;
                }
                self.patch_stack(&continuation.stack);
            }
            Value::Void | Value::Rational(_) | Value::Text(_) => {}
        }
    }
}
