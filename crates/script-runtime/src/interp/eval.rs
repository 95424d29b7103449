//! Tree-walking evaluator.
//!
//! A program runs as the body of `async (ui, workflow, repo, context)`. Its
//! root scope holds exactly those four parameters plus inert builtins; there
//! is no global object, no prototype chain and no way to define functions,
//! so capability objects are the only authority a script can reach.

use super::Program;
use super::ast::{AssignOp, BinaryOp, DeclKind, Expr, LogicalOp, Stmt, UnaryOp, UpdateOp};
use super::value::{Builtin, Callable, ErrorName, Value};
use crate::capability::{CapabilitySurface, Namespace, invoke};
use crate::monitor::ExecutionMonitor;
use std::collections::HashMap;
use tenant_script_core::{Error, ExecutionContext, Result};

/// Longest string a script may build, in bytes.
const MAX_STRING_BYTES: usize = 1 << 20;

/// Runs `program` against `surface`.
///
/// # Errors
///
/// An uncaught throw becomes [`Error::RuntimeError`] carrying `String(error)`.
/// Cancellation and an exhausted step budget are reported as the monitor
/// raised them and cannot be caught by the script.
pub fn execute(
    program: &Program,
    surface: &dyn CapabilitySurface,
    context: &ExecutionContext,
    monitor: &ExecutionMonitor,
) -> Result<()> {
    let max_depth = program.max_depth();
    let context = Value::from_json(&serde_json::to_value(context)?, max_depth)
        .ok_or_else(|| Error::runtime(format!("RangeError: {}", nesting_message(max_depth))))?;
    let mut interpreter = Interpreter::new(surface, monitor, context, max_depth);
    match interpreter.run(program.ast()) {
        Ok(()) => Ok(()),
        Err(Interrupt::Throw(value)) => Err(Error::runtime(value.to_js_string())),
        Err(Interrupt::Abort(err)) => Err(err),
    }
}

enum Interrupt {
    /// A script-level exception; `try`/`catch` can handle it.
    Throw(Value),
    /// Cancellation or budget exhaustion; unwinds everything.
    Abort(Error),
}

type Eval<T> = std::result::Result<T, Interrupt>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return,
}

struct Binding {
    value: Value,
    mutable: bool,
}

struct Interpreter<'a> {
    surface: &'a dyn CapabilitySurface,
    monitor: &'a ExecutionMonitor,
    scopes: Vec<HashMap<String, Binding>>,
    max_depth: usize,
}

fn throw<T>(name: ErrorName, message: impl Into<String>) -> Eval<T> {
    Err(Interrupt::Throw(Value::error(name, message)))
}

fn nesting_message(max_depth: usize) -> String {
    format!("Maximum value nesting depth of {max_depth} exceeded")
}

impl<'a> Interpreter<'a> {
    fn new(
        surface: &'a dyn CapabilitySurface,
        monitor: &'a ExecutionMonitor,
        context: Value,
        max_depth: usize,
    ) -> Self {
        let mut root = HashMap::new();
        let constant = |value| Binding {
            value,
            mutable: false,
        };
        for namespace in Namespace::ALL {
            root.insert(
                namespace.as_str().to_string(),
                constant(Value::Namespace(namespace)),
            );
        }
        root.insert("context".to_string(), constant(context));

        let builtins = [
            Builtin::ErrorCtor(ErrorName::Error),
            Builtin::ErrorCtor(ErrorName::TypeError),
            Builtin::ErrorCtor(ErrorName::RangeError),
            Builtin::String,
            Builtin::Number,
            Builtin::Boolean,
        ];
        for builtin in builtins {
            root.insert(
                builtin.name().to_string(),
                constant(Value::Function(Callable::Builtin(builtin))),
            );
        }
        root.insert("NaN".to_string(), constant(Value::Number(f64::NAN)));
        root.insert("Infinity".to_string(), constant(Value::Number(f64::INFINITY)));

        Self {
            surface,
            monitor,
            // Root scope plus the function-body scope that owns `var`s.
            scopes: vec![root, HashMap::new()],
            max_depth,
        }
    }

    fn run(&mut self, program: &super::ast::Program) -> Eval<()> {
        for stmt in &program.body {
            if let Flow::Return = self.statement(stmt)? {
                break;
            }
        }
        Ok(())
    }

    fn tick(&self) -> Eval<()> {
        self.monitor.tick().map_err(Interrupt::Abort)
    }

    /// Rejects arrays and objects nested deeper than the program allows.
    fn bounded(&self, value: Value) -> Eval<Value> {
        if value.depth() > self.max_depth {
            return throw(ErrorName::RangeError, nesting_message(self.max_depth));
        }
        Ok(value)
    }

    fn scoped<T>(&mut self, body: impl FnOnce(&mut Self) -> Eval<T>) -> Eval<T> {
        self.scopes.push(HashMap::new());
        let result = body(self);
        self.scopes.pop();
        result
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn declare(&mut self, kind: DeclKind, name: &str, value: Value) -> Eval<()> {
        if kind == DeclKind::Var {
            let scope = &mut self.scopes[1];
            match scope.get_mut(name) {
                Some(binding) if binding.mutable => binding.value = value,
                Some(_) => {
                    return throw(
                        ErrorName::SyntaxError,
                        format!("Identifier '{name}' has already been declared"),
                    );
                }
                None => {
                    scope.insert(
                        name.to_string(),
                        Binding {
                            value,
                            mutable: true,
                        },
                    );
                }
            }
            return Ok(());
        }

        let depth = self.scopes.len() - 1;
        let scope = &mut self.scopes[depth];
        if scope.contains_key(name) {
            return throw(
                ErrorName::SyntaxError,
                format!("Identifier '{name}' has already been declared"),
            );
        }
        scope.insert(
            name.to_string(),
            Binding {
                value,
                mutable: kind != DeclKind::Const,
            },
        );
        Ok(())
    }

    fn assign(&mut self, name: &str, value: Value) -> Eval<Value> {
        let Some(binding) = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        else {
            return throw(ErrorName::ReferenceError, format!("{name} is not defined"));
        };
        if !binding.mutable {
            return throw(ErrorName::TypeError, "Assignment to constant variable.");
        }
        binding.value = value.clone();
        Ok(value)
    }

    fn block(&mut self, body: &[Stmt]) -> Eval<Flow> {
        self.scoped(|this| {
            for stmt in body {
                match this.statement(stmt)? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        })
    }

    fn statement(&mut self, stmt: &Stmt) -> Eval<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.expression(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Declare { kind, bindings } => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(expr) => self.expression(expr)?,
                        None => Value::Undefined,
                    };
                    self.declare(*kind, name, value)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(body) => self.block(body),
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                if self.expression(test)?.truthy() {
                    self.scoped(|this| this.statement(then))
                } else if let Some(otherwise) = otherwise {
                    self.scoped(|this| this.statement(otherwise))
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                loop {
                    self.tick()?;
                    if !self.expression(test)?.truthy() {
                        break;
                    }
                    match self.scoped(|this| this.statement(body))? {
                        Flow::Break => break,
                        Flow::Return => return Ok(Flow::Return),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.statement(init)?;
                }
                loop {
                    this.tick()?;
                    if let Some(test) = test
                        && !this.expression(test)?.truthy()
                    {
                        break;
                    }
                    match this.scoped(|inner| inner.statement(body))? {
                        Flow::Break => break,
                        Flow::Return => return Ok(Flow::Return),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        this.expression(update)?;
                    }
                }
                Ok(Flow::Normal)
            }),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Return(value) => {
                if let Some(expr) = value {
                    self.expression(expr)?;
                }
                Ok(Flow::Return)
            }
            Stmt::Throw(expr) => {
                let value = self.expression(expr)?;
                Err(Interrupt::Throw(value))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => self.try_statement(block, handler.as_ref(), finalizer.as_deref()),
        }
    }

    fn try_statement(
        &mut self,
        block: &[Stmt],
        handler: Option<&(Option<String>, Vec<Stmt>)>,
        finalizer: Option<&[Stmt]>,
    ) -> Eval<Flow> {
        let outcome = match (self.block(block), handler) {
            (Err(Interrupt::Throw(thrown)), Some((param, body))) => self.scoped(|this| {
                if let Some(param) = param {
                    this.declare(DeclKind::Let, param, thrown)?;
                }
                this.block(body)
            }),
            (outcome, _) => outcome,
        };

        if let Some(finalizer) = finalizer {
            if matches!(outcome, Err(Interrupt::Abort(_))) {
                return outcome;
            }
            match self.block(finalizer)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        outcome
    }

    fn expression(&mut self, expr: &Expr) -> Eval<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident { name, .. } => match self.lookup(name) {
                Some(binding) => Ok(binding.value.clone()),
                None => throw(ErrorName::ReferenceError, format!("{name} is not defined")),
            },
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.expression(item))
                    .collect::<Eval<Vec<_>>>()?;
                self.bounded(Value::Array(values))
            }
            Expr::Object(entries) => {
                let mut map = std::collections::BTreeMap::new();
                for (key, value) in entries {
                    let value = self.expression(value)?;
                    map.insert(key.clone(), value);
                }
                self.bounded(Value::Object(map))
            }
            Expr::Member { object, property } => {
                let target = self.expression(object)?;
                get_property(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.expression(object)?;
                let key = self.expression(index)?;
                get_index(&target, &key)
            }
            Expr::Call { callee, args, .. } => {
                let function = self.expression(callee)?;
                let args = self.arguments(args)?;
                self.call(&function, callee, args)
            }
            Expr::New { callee, args, .. } => {
                let constructor = self.expression(callee)?;
                let args = self.arguments(args)?;
                match constructor {
                    Value::Function(Callable::Builtin(builtin)) => call_builtin(builtin, &args),
                    _ => throw(
                        ErrorName::TypeError,
                        format!("{} is not a constructor", callee.callee_text()),
                    ),
                }
            }
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Binary { op, left, right } => {
                let left = self.expression(left)?;
                let right = self.expression(right)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.expression(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.expression(right)
                }
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.expression(test)?.truthy() {
                    self.expression(then)
                } else {
                    self.expression(otherwise)
                }
            }
            Expr::Assign {
                op, target, value, ..
            } => {
                let value = self.expression(value)?;
                let value = match op {
                    AssignOp::Assign => value,
                    AssignOp::Add => {
                        let current = self.read(target)?;
                        binary(BinaryOp::Add, &current, &value)?
                    }
                    AssignOp::Sub => {
                        let current = self.read(target)?;
                        binary(BinaryOp::Sub, &current, &value)?
                    }
                };
                self.assign(target, value)
            }
            Expr::Update {
                op, prefix, target, ..
            } => {
                let old = self.read(target)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.assign(target, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
        }
    }

    fn read(&self, name: &str) -> Eval<Value> {
        match self.lookup(name) {
            Some(binding) => Ok(binding.value.clone()),
            None => throw(ErrorName::ReferenceError, format!("{name} is not defined")),
        }
    }

    fn arguments(&mut self, args: &[Expr]) -> Eval<Vec<Value>> {
        args.iter().map(|arg| self.expression(arg)).collect()
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Eval<Value> {
        if op == UnaryOp::Typeof
            && let Expr::Ident { name, .. } = operand
            && self.lookup(name).is_none()
        {
            return Ok(Value::Str("undefined".to_string()));
        }
        let value = self.expression(operand)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::Typeof => Value::Str(value.type_of().to_string()),
            // Capabilities settle synchronously, so awaiting yields the value.
            UnaryOp::Await => value,
        })
    }

    fn call(&self, function: &Value, callee: &Expr, args: Vec<Value>) -> Eval<Value> {
        self.tick()?;
        match function {
            Value::Function(Callable::Capability(namespace, method)) => {
                self.capability_call(*namespace, method, &args)
            }
            Value::Function(Callable::Builtin(builtin)) => call_builtin(*builtin, &args),
            Value::Function(Callable::Method { receiver, name }) => {
                call_method(receiver, name, &args)
            }
            _ => throw(
                ErrorName::TypeError,
                format!("{} is not a function", callee.callee_text()),
            ),
        }
    }

    fn capability_call(&self, namespace: Namespace, method: &str, args: &[Value]) -> Eval<Value> {
        self.monitor.record_capability_call();
        tracing::debug!(namespace = %namespace, method, "capability call");

        let json_args: Vec<_> = args.iter().map(Value::to_json).collect();
        match invoke(self.surface, namespace, method, &json_args) {
            Ok(result) => match Value::from_json(&result, self.max_depth) {
                Some(value) => Ok(value),
                None => throw(ErrorName::RangeError, nesting_message(self.max_depth)),
            },
            Err(err) => {
                tracing::debug!(namespace = %namespace, method, error = %err, "capability call rejected");
                let message = err.to_string();
                // `TypeError: ...` messages are already rendered.
                match message.strip_prefix("TypeError: ") {
                    Some(rest) => throw(ErrorName::TypeError, rest),
                    None => throw(ErrorName::Error, message),
                }
            }
        }
    }
}

fn get_property(target: &Value, property: &str) -> Eval<Value> {
    match target {
        Value::Undefined | Value::Null => throw(
            ErrorName::TypeError,
            format!(
                "Cannot read properties of {} (reading '{property}')",
                target.to_js_string()
            ),
        ),
        Value::Namespace(namespace) => Ok(if namespace.has_method(property) {
            Value::Function(Callable::Capability(*namespace, property.to_string()))
        } else {
            Value::Undefined
        }),
        Value::Str(s) => Ok(match property {
            "length" => Value::Number(utf16_len(s)),
            "trim" | "toUpperCase" | "toLowerCase" | "includes" | "startsWith"
            | "endsWith" | "indexOf" => bound_method(target, property),
            _ => Value::Undefined,
        }),
        Value::Array(items) => Ok(match property {
            "length" => Value::Number(len_as_number(items.len())),
            "includes" | "indexOf" | "join" => bound_method(target, property),
            _ => Value::Undefined,
        }),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Undefined)),
        Value::Error { name, message } => Ok(match property {
            "name" => Value::Str(name.clone()),
            "message" => Value::Str(message.clone()),
            _ => Value::Undefined,
        }),
        Value::Bool(_) | Value::Number(_) | Value::Function(_) => Ok(Value::Undefined),
    }
}

fn get_index(target: &Value, key: &Value) -> Eval<Value> {
    if let Value::Number(n) = key
        && n.fract() == 0.0
        && *n >= 0.0
    {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = *n as usize;
        match target {
            Value::Array(items) => return Ok(items.get(index).cloned().unwrap_or(Value::Undefined)),
            Value::Str(s) => {
                return Ok(s
                    .chars()
                    .nth(index)
                    .map_or(Value::Undefined, |c| Value::Str(c.to_string())));
            }
            _ => {}
        }
    }
    get_property(target, &key.to_js_string())
}

fn bound_method(receiver: &Value, name: &str) -> Value {
    Value::Function(Callable::Method {
        receiver: Box::new(receiver.clone()),
        name: name.to_string(),
    })
}

#[allow(clippy::cast_precision_loss)]
const fn len_as_number(len: usize) -> f64 {
    len as f64
}

fn utf16_len(s: &str) -> f64 {
    len_as_number(s.encode_utf16().count())
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn call_builtin(builtin: Builtin, args: &[Value]) -> Eval<Value> {
    Ok(match builtin {
        Builtin::ErrorCtor(name) => {
            let message = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(value) => value.to_js_string(),
            };
            Value::error(name, message)
        }
        Builtin::String => Value::Str(args.first().map_or_else(String::new, Value::to_js_string)),
        Builtin::Number => Value::Number(args.first().map_or(0.0, Value::to_number)),
        Builtin::Boolean => Value::Bool(args.first().is_some_and(Value::truthy)),
    })
}

fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Eval<Value> {
    match (receiver, name) {
        (Value::Str(s), "trim") => Ok(Value::Str(s.trim().to_string())),
        (Value::Str(s), "toUpperCase") => Ok(Value::Str(s.to_uppercase())),
        (Value::Str(s), "toLowerCase") => Ok(Value::Str(s.to_lowercase())),
        (Value::Str(s), "includes") => Ok(Value::Bool(s.contains(&arg(args, 0).to_js_string()))),
        (Value::Str(s), "startsWith") => {
            Ok(Value::Bool(s.starts_with(&arg(args, 0).to_js_string())))
        }
        (Value::Str(s), "endsWith") => Ok(Value::Bool(s.ends_with(&arg(args, 0).to_js_string()))),
        (Value::Str(s), "indexOf") => {
            let needle = arg(args, 0).to_js_string();
            Ok(Value::Number(s.find(&needle).map_or(-1.0, |byte| {
                len_as_number(s[..byte].chars().count())
            })))
        }
        (Value::Array(items), "includes") => {
            let needle = arg(args, 0);
            Ok(Value::Bool(items.iter().any(|item| item.same_value_zero(&needle))))
        }
        (Value::Array(items), "indexOf") => {
            let needle = arg(args, 0);
            Ok(Value::Number(
                items
                    .iter()
                    .position(|item| item.strict_equals(&needle))
                    .map_or(-1.0, len_as_number),
            ))
        }
        (Value::Array(items), "join") => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(value) => value.to_js_string(),
            };
            let joined = items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(&separator);
            checked_string(joined)
        }
        _ => throw(ErrorName::TypeError, format!("{name} is not a function")),
    }
}

fn checked_string(s: String) -> Eval<Value> {
    if s.len() > MAX_STRING_BYTES {
        return throw(ErrorName::RangeError, "Invalid string length");
    }
    Ok(Value::Str(s))
}

fn converts_to_string(value: &Value) -> bool {
    !matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Eval<Value> {
    let numeric = |f: fn(f64, f64) -> f64| Ok(Value::Number(f(left.to_number(), right.to_number())));
    match op {
        BinaryOp::Add => {
            if converts_to_string(left) || converts_to_string(right) {
                let mut joined = left.to_js_string();
                joined.push_str(&right.to_js_string());
                checked_string(joined)
            } else {
                numeric(|a, b| a + b)
            }
        }
        BinaryOp::Sub => numeric(|a, b| a - b),
        BinaryOp::Mul => numeric(|a, b| a * b),
        BinaryOp::Div => numeric(|a, b| a / b),
        BinaryOp::Rem => numeric(|a, b| a % b),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Ok(Value::Bool(compare(op, left, right)))
        }
        BinaryOp::Eq => Ok(Value::Bool(left.loose_equals(right))),
        BinaryOp::NotEq => Ok(Value::Bool(!left.loose_equals(right))),
        BinaryOp::StrictEq => Ok(Value::Bool(left.strict_equals(right))),
        BinaryOp::StrictNotEq => Ok(Value::Bool(!left.strict_equals(right))),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = if let (Value::Str(a), Value::Str(b)) = (left, right) {
        Some(a.encode_utf16().cmp(b.encode_utf16()))
    } else {
        left.to_number().partial_cmp(&right.to_number())
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::LtEq => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    }
}
