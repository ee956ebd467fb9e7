//! Environments and the explicit control stack.
//!
//! An environment is an ordered sequence of `(name, address)` entries; lookup
//! scans from the right so the most recent binding wins. Environments are held
//! in shared cells (`Rc<RefCell<…>>`): a layer that starts a new lexical scope
//! gets a fresh cell, and every non-frame layer pushed under it shares that
//! cell, so letrec extensions are visible to the whole scope.
//!
//! A [`Layer`] is one element of the control stack: the node being evaluated,
//! its per-node program counter, and the values accumulated so far. The bottom
//! layer is a sentinel with no expression; the driver loop stops when it
//! surfaces.

use std::{cell::RefCell, rc::Rc};

use smallvec::SmallVec;

use crate::{expressions::Expr, value::Value};

/// One `(name, heap address)` binding.
#[derive(Debug, Clone)]
pub(crate) struct EnvEntry {
    pub name: Rc<str>,
    pub addr: usize,
}

pub(crate) type Env = Vec<EnvEntry>;

/// A shared environment cell. Layers of one lexical scope all hold the same
/// cell; continuation snapshots give every copied layer its own.
pub(crate) type EnvCell = Rc<RefCell<Env>>;

pub(crate) fn new_env_cell(env: Env) -> EnvCell {
    Rc::new(RefCell::new(env))
}

/// One frame of the control stack.
#[derive(Debug)]
pub(crate) struct Layer {
    pub env: EnvCell,
    /// True when this layer starts a new lexical scope (function entry or the
    /// root sentinel). Dynamic lookup walks only frame layers.
    pub frame: bool,
    /// The node under evaluation; `None` only on the sentinel.
    pub expr: Option<Rc<Expr>>,
    /// Program counter within this node's state machine.
    pub pc: usize,
    /// Argument values accumulated while evaluating a call.
    pub args: SmallVec<[Value; 4]>,
    /// The evaluated callee, held until argument evaluation completes.
    pub callee: Option<Value>,
}

impl Layer {
    /// The root sentinel terminating the driver loop.
    pub fn sentinel(env: EnvCell) -> Self {
        Self {
            env,
            frame: true,
            expr: None,
            pc: 0,
            args: SmallVec::new(),
            callee: None,
        }
    }

    /// A layer sharing its parent's scope.
    pub fn child(env: EnvCell, expr: Rc<Expr>) -> Self {
        Self {
            env,
            frame: false,
            expr: Some(expr),
            pc: 0,
            args: SmallVec::new(),
            callee: None,
        }
    }

    /// A layer opening a new lexical scope (function entry).
    pub fn new_frame(env: EnvCell, expr: Rc<Expr>) -> Self {
        Self {
            frame: true,
            ..Self::child(env, expr)
        }
    }
}

/// Rightmost match in a single environment.
pub(crate) fn lookup_env(name: &str, env: &Env) -> Option<usize> {
    env.iter()
        .rev()
        .find(|entry| entry.name.as_ref() == name)
        .map(|entry| entry.addr)
}

/// Dynamic-scope lookup: walks the stack from the top, considering only frame
/// layers, and within each frame scans right to left.
pub(crate) fn lookup_stack(name: &str, stack: &[Layer]) -> Option<usize> {
    stack
        .iter()
        .rev()
        .filter(|layer| layer.frame)
        .find_map(|layer| lookup_env(name, &layer.env.borrow()))
}

/// Retains only lexical bindings (lower-case names), preserving order.
/// Applied to the enclosing environment when a closure is built.
pub(crate) fn filter_lexical(env: &Env) -> Env {
    env.iter()
        .filter(|entry| entry.name.chars().next().is_some_and(char::is_lowercase))
        .cloned()
        .collect()
}

/// Deep-copies a stack for continuation capture and restore.
///
/// Every copied layer gets its own environment cell holding a fresh copy of
/// the entries; scalar fields, accumulated arguments, and the callee are
/// cloned as values (aggregates keep their shared identity). The copy is
/// independent: nothing that later extends a live environment can reach it.
pub(crate) fn deep_copy_stack(stack: &[Layer]) -> Vec<Layer> {
    stack
        .iter()
        .map(|layer| Layer {
            env: new_env_cell(layer.env.borrow().clone()),
            frame: layer.frame,
            expr: layer.expr.clone(),
            pc: layer.pc,
            args: layer.args.clone(),
            callee: layer.callee.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, addr: usize) -> EnvEntry {
        EnvEntry {
            name: Rc::from(name),
            addr,
        }
    }

    #[test]
    fn rightmost_binding_wins() {
        let env = vec![entry("x", 0), entry("y", 1), entry("x", 2)];
        assert_eq!(lookup_env("x", &env), Some(2));
        assert_eq!(lookup_env("y", &env), Some(1));
        assert_eq!(lookup_env("z", &env), None);
    }

    #[test]
    fn dynamic_lookup_skips_non_frame_layers() {
        let outer = new_env_cell(vec![entry("Depth", 7)]);
        let inner = new_env_cell(vec![entry("Depth", 9)]);
        let stack = vec![
            Layer::sentinel(outer),
            Layer {
                frame: false,
                ..Layer::sentinel(inner.clone())
            },
        ];
        // the inner layer holds a binding, but only frame layers are consulted
        assert_eq!(lookup_stack("Depth", &stack), Some(7));
    }

    #[test]
    fn lexical_filter_drops_dynamic_names() {
        let env = vec![entry("keep", 0), entry("Drop", 1), entry("also", 2)];
        let filtered = filter_lexical(&env);
        let names: Vec<&str> = filtered.iter().map(|e| e.name.as_ref()).collect();
        assert_eq!(names, ["keep", "also"]);
    }

    #[test]
    fn deep_copy_breaks_env_sharing() {
        let shared = new_env_cell(vec![entry("x", 3)]);
        let stack = vec![Layer::sentinel(shared.clone())];
        let copy = deep_copy_stack(&stack);

        shared.borrow_mut().push(entry("late", 4));
        assert_eq!(copy[0].env.borrow().len(), 1, "snapshot must not see later extensions");
        assert_eq!(lookup_env("x", &copy[0].env.borrow()), Some(3));
    }
}
