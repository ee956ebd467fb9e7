//! The evaluator: a flat driver loop over the explicit control stack.
//!
//! Each iteration dispatches on the node kind of the top layer. A dispatch
//! either finishes the node (writes the value register, pops the layer) or
//! pushes a child layer and advances the node's program counter, reading the
//! value register the previously completed child left behind. There is no host
//! recursion anywhere in evaluation, which is what makes `callcc` capturable:
//! the whole state is the stack, the heap, and one register.
//!
//! The collector may run between any two dispatch steps, governed by the
//! configured trigger.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;

use crate::{
    builtins,
    config::Config,
    error::{Error, ErrorKind, RunResult, SourceLocation},
    expressions::{Expr, ExprKind, Intrinsic, LambdaExpr, ScopeKind, Variable},
    heap::Heap,
    io::Console,
    object::NativeFn,
    stack::{EnvEntry, Layer, deep_copy_stack, filter_lexical, lookup_env, lookup_stack, new_env_cell},
    value::{Closure, Rational, Value},
};

/// The complete mutable state of one interpreter: control stack, value heap,
/// value register, and the host's native-function registry.
pub(crate) struct Machine {
    pub(crate) stack: Vec<Layer>,
    pub(crate) heap: Heap,
    pub(crate) value: Value,
    pub(crate) natives: AHashMap<String, NativeFn>,
}

impl Machine {
    /// A machine holding only the root sentinel; programs are pushed onto it.
    pub fn new() -> Self {
        let root = new_env_cell(Vec::new());
        Self {
            stack: vec![Layer::sentinel(root)],
            heap: Heap::new(),
            value: Value::Void,
            natives: AHashMap::new(),
        }
    }

    /// Pushes a program sharing the root environment cell, so its letrec
    /// extensions and `reg` registrations persist across pushes.
    pub fn push_program(&mut self, program: Rc<Expr>) {
        let env = Rc::clone(&self.stack[0].env);
        self.stack.push(Layer::child(env, program));
    }

    /// Pushes a host-initiated call under a fresh copy of the root env.
    pub fn push_call(&mut self, call: Rc<Expr>) {
        let env = self.stack[0].env.borrow().clone();
        self.stack.push(Layer::child(new_env_cell(env), call));
    }

    /// Drops every layer above the sentinel, recovering from a failed run.
    pub fn reset_to_root(&mut self) {
        self.stack.truncate(1);
    }

    fn top(&self) -> &Layer {
        self.stack.last().expect("control stack always holds the sentinel layer")
    }

    fn top_mut(&mut self) -> &mut Layer {
        self.stack
            .last_mut()
            .expect("control stack always holds the sentinel layer")
    }

    fn read_heap(&self, addr: usize, location: SourceLocation) -> RunResult<Value> {
        self.heap
            .get(addr)
            .cloned()
            .ok_or_else(|| Error::new(location, ErrorKind::DanglingAddress))
    }

    /// Drives the stack until the sentinel surfaces. On error the value
    /// register holds `Void` and the stack is left where the failure occurred.
    pub fn run<C: Console>(&mut self, config: &mut Config, console: &mut C) -> RunResult<()> {
        loop {
            let expr = {
                let top = self.top();
                match &top.expr {
                    Some(expr) => Rc::clone(expr),
                    None => return Ok(()),
                }
            };
            if let Err(err) = self.dispatch(&expr, console) {
                self.value = Value::Void;
                return Err(err);
            }
            if config.trigger.should_collect() {
                let removed = self.collect();
                if config.enable_debug {
                    console.stdout_write(&format!("[DEBUG] GC collect {removed} cells\n"));
                }
            }
        }
    }

    fn dispatch<C: Console>(&mut self, expr: &Rc<Expr>, console: &mut C) -> RunResult<()> {
        match &expr.kind {
            ExprKind::Number { num, den } => {
                self.value = Value::Rational(Rational::new(*num, *den));
                self.stack.pop();
                Ok(())
            }
            ExprKind::Str(text) => {
                self.value = Value::Text(Rc::clone(text));
                self.stack.pop();
                Ok(())
            }
            ExprKind::Variable(variable) => self.eval_variable(variable),
            ExprKind::Lambda(lambda) => {
                self.eval_lambda(lambda);
                Ok(())
            }
            ExprKind::Letrec { bindings, body } => self.eval_letrec(bindings, body),
            ExprKind::If { cond, then, otherwise } => self.eval_if(cond, then, otherwise),
            ExprKind::Call { callee, args } => match &callee.kind {
                ExprKind::Intrinsic(intrinsic) => self.eval_intrinsic_call(expr, callee, *intrinsic, args, console),
                _ => self.eval_ordinary_call(expr, callee, args),
            },
            ExprKind::Sequence(exprs) => {
                self.eval_sequence(exprs);
                Ok(())
            }
            ExprKind::Access { var, expr: target } => self.eval_access(var, target),
            ExprKind::Intrinsic(_) => unreachable!("intrinsic nodes are dispatched only as call callees"),
        }
    }

    fn eval_variable(&mut self, variable: &Variable) -> RunResult<()> {
        let addr = match variable.kind {
            ScopeKind::Lexical => lookup_env(&variable.name, &self.top().env.borrow()),
            ScopeKind::Dynamic => lookup_stack(&variable.name, &self.stack),
            ScopeKind::Unknown => lookup_env(&variable.name, &self.top().env.borrow())
                .or_else(|| lookup_stack(&variable.name, &self.stack)),
        };
        let Some(addr) = addr else {
            return Err(Error::new(variable.location, ErrorKind::UndefinedVariable));
        };
        self.value = self.read_heap(addr, variable.location)?;
        self.stack.pop();
        Ok(())
    }

    fn eval_lambda(&mut self, lambda: &Rc<LambdaExpr>) {
        let env = filter_lexical(&self.top().env.borrow());
        self.value = Value::Closure(Rc::new(Closure {
            env: RefCell::new(env),
            fun: Rc::clone(lambda),
        }));
        self.stack.pop();
    }

    fn eval_letrec(&mut self, bindings: &[(Variable, Rc<Expr>)], body: &Rc<Expr>) -> RunResult<()> {
        let pc = self.top().pc;

        // the value register carries the most recently finished initialiser;
        // store it into the cell pre-allocated for its binding
        if pc > 1 && pc <= bindings.len() + 1 {
            let (variable, _) = &bindings[pc - 2];
            let env = Rc::clone(&self.top().env);
            let addr = lookup_env(&variable.name, &env.borrow());
            let Some(addr) = addr else {
                unreachable!("letrec binding `{}` vanished from its scope", variable.name)
            };
            self.heap.write(addr, self.value.clone());
        }

        if pc == 0 {
            let env = Rc::clone(&self.top().env);
            for (variable, _) in bindings {
                let addr = self.heap.alloc(Value::Void);
                env.borrow_mut().push(EnvEntry {
                    name: Rc::clone(&variable.name),
                    addr,
                });
            }
            self.top_mut().pc += 1;
        } else if pc <= bindings.len() {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(&bindings[pc - 1].1)));
        } else if pc == bindings.len() + 1 {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(body)));
        } else {
            let env = Rc::clone(&self.top().env);
            let mut env = env.borrow_mut();
            let keep = env.len() - bindings.len();
            env.truncate(keep);
            drop(env);
            self.stack.pop();
        }
        Ok(())
    }

    fn eval_if(&mut self, cond: &Rc<Expr>, then: &Rc<Expr>, otherwise: &Rc<Expr>) -> RunResult<()> {
        let pc = self.top().pc;
        if pc == 0 {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(cond)));
        } else if pc == 1 {
            let condition = match &self.value {
                Value::Rational(condition) => *condition,
                _ => return Err(Error::new(cond.location, ErrorKind::WrongConditionType)),
            };
            let branch = if condition.is_true() { then } else { otherwise };
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(branch)));
        } else {
            self.stack.pop();
        }
        Ok(())
    }

    fn eval_sequence(&mut self, exprs: &[Rc<Expr>]) {
        let pc = self.top().pc;
        if pc < exprs.len() {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(&exprs[pc])));
        } else {
            self.stack.pop();
        }
    }

    fn eval_access(&mut self, variable: &Variable, target: &Rc<Expr>) -> RunResult<()> {
        let pc = self.top().pc;
        if pc == 0 {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(target)));
            return Ok(());
        }

        let Value::Closure(closure) = &self.value else {
            return Err(Error::new(target.location, ErrorKind::AccessNonClosure));
        };
        let addr = lookup_env(&variable.name, &closure.env.borrow());
        let Some(addr) = addr else {
            return Err(Error::new(variable.location, ErrorKind::UndefinedVariable));
        };
        self.value = self.read_heap(addr, variable.location)?;
        self.stack.pop();
        Ok(())
    }

    fn eval_intrinsic_call<C: Console>(
        &mut self,
        call: &Rc<Expr>,
        callee: &Rc<Expr>,
        intrinsic: Intrinsic,
        args: &[Rc<Expr>],
        console: &mut C,
    ) -> RunResult<()> {
        let pc = self.top().pc;
        if pc > 1 && pc <= args.len() + 1 {
            let value = self.value.clone();
            self.top_mut().args.push(value);
        }

        if pc == 0 {
            self.top_mut().pc += 1;
        } else if pc <= args.len() {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(&args[pc - 1])));
        } else {
            builtins::apply(self, intrinsic, call.location, callee.location, console)?;
        }
        Ok(())
    }

    fn eval_ordinary_call(&mut self, call: &Rc<Expr>, callee: &Rc<Expr>, args: &[Rc<Expr>]) -> RunResult<()> {
        let pc = self.top().pc;
        if pc > 2 && pc <= args.len() + 2 {
            let value = self.value.clone();
            self.top_mut().args.push(value);
        }

        if pc == 0 {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(callee)));
        } else if pc == 1 {
            let value = self.value.clone();
            let top = self.top_mut();
            top.callee = Some(value);
            top.pc += 1;
        } else if pc <= args.len() + 1 {
            let env = Rc::clone(&self.top().env);
            self.top_mut().pc += 1;
            self.stack.push(Layer::child(env, Rc::clone(&args[pc - 2])));
        } else if pc == args.len() + 2 {
            let callee_value = self
                .top()
                .callee
                .clone()
                .expect("callee evaluated before arguments");
            match callee_value {
                Value::Closure(closure) => {
                    if self.top().args.len() != closure.fun.params.len() {
                        return Err(Error::new(call.location, ErrorKind::WrongArgumentCount));
                    }
                    // fresh scope: a copy of the captured env extended with one
                    // newly allocated cell per parameter
                    let mut env = closure.env.borrow().clone();
                    let arg_values = self.top().args.clone();
                    for (param, arg) in closure.fun.params.iter().zip(arg_values) {
                        let addr = self.heap.alloc(arg);
                        env.push(EnvEntry {
                            name: Rc::clone(&param.name),
                            addr,
                        });
                    }
                    self.top_mut().pc += 1;
                    self.stack
                        .push(Layer::new_frame(new_env_cell(env), Rc::clone(&closure.fun.body)));
                }
                Value::Continuation(continuation) => {
                    // the value register already holds the argument passed to
                    // the continuation; it becomes the captured call's result
                    self.stack = deep_copy_stack(&continuation.stack);
                }
                _ => return Err(Error::new(callee.location, ErrorKind::NotCallable)),
            }
        } else {
            self.stack.pop();
        }
        Ok(())
    }
}
