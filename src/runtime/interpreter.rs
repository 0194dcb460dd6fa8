use crate::language::{parser::parse_source, token::Location};
use crate::runtime::{
    builtins::{Call, Registry},
    cell::{format_real, Cell, CellRef, CellValue, Lambda},
    environment::{Env, Environment},
    error::{RuntimeError, RuntimeResult},
    loader::{FileSystemLoader, ModuleLoader},
};
use std::sync::Arc;

/// Outcome of evaluating one cell. `Break` and `Yield` travel outward until a
/// loop or lambda application consumes them.
#[derive(Debug)]
pub enum Flow {
    Value(CellRef),
    Break,
    Yield(CellRef),
}

impl Flow {
    /// Collapse a control outcome at a boundary: a stray break becomes nil.
    pub fn into_value(self) -> CellRef {
        match self {
            Flow::Value(cell) | Flow::Yield(cell) => cell,
            Flow::Break => Cell::nil(),
        }
    }
}

/// Unwrap `Flow::Value`, returning any control outcome from the enclosing handler.
macro_rules! value {
    ($flow:expr) => {
        match $flow? {
            $crate::runtime::interpreter::Flow::Value(cell) => cell,
            other => return Ok(other),
        }
    };
}
pub(crate) use value;

/// Evaluate every cell of a slice in order, stopping at the first control outcome.
macro_rules! eval_args {
    ($interp:expr, $args:expr, $env:expr) => {{
        let mut values = Vec::with_capacity($args.len());
        for arg in $args.iter() {
            match $interp.eval(arg, $env)? {
                $crate::runtime::interpreter::Flow::Value(cell) => values.push(cell),
                other => return Ok(other),
            }
        }
        values
    }};
}
pub(crate) use eval_args;

/// Tree-walking evaluator. Cheap to clone: clones share the builtin registry
/// and the module loader.
#[derive(Clone)]
pub struct Interpreter {
    registry: Arc<Registry>,
    loader: Arc<dyn ModuleLoader>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_loader(Arc::new(FileSystemLoader::default()))
    }

    pub fn with_loader(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            loader,
        }
    }

    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    pub fn evaluate(&self, cell: &CellRef, env: &Env) -> RuntimeResult<CellRef> {
        Ok(self.eval(cell, env)?.into_value())
    }

    pub fn eval(&self, cell: &CellRef, env: &Env) -> RuntimeResult<Flow> {
        match &cell.value {
            CellValue::Symbol(name) => Ok(Flow::Value(self.resolve_symbol(
                name,
                cell.location.as_ref(),
                env,
            )?)),
            CellValue::Encoded(builtin) => Ok(Flow::Value(self.registry.get(*builtin))),
            CellValue::List(items) => {
                let items = items.read().clone();
                let Some((head, args)) = items.split_first() else {
                    return Ok(Flow::Value(Cell::nil()));
                };
                let callee = value!(self.eval(head, env));
                self.apply(cell, &callee, args, env)
            }
            _ => Ok(Flow::Value(Arc::clone(cell))),
        }
    }

    /// Invoke an already evaluated head against the unevaluated tail of `site`.
    pub fn apply(
        &self,
        site: &CellRef,
        callee: &CellRef,
        args: &[CellRef],
        env: &Env,
    ) -> RuntimeResult<Flow> {
        match &callee.value {
            CellValue::Lambda(lambda) => self.apply_lambda(site, lambda, args, env),
            CellValue::Procedure(procedure) => {
                (procedure.func)(self, Call::new(&procedure.name, site, args), env)
            }
            _ => Ok(Flow::Value(Arc::clone(callee))),
        }
    }

    fn apply_lambda(
        &self,
        site: &CellRef,
        lambda: &Lambda,
        args: &[CellRef],
        env: &Env,
    ) -> RuntimeResult<Flow> {
        let values = eval_args!(self, args, env);
        if values.len() != lambda.params.len() {
            return Err(RuntimeError::runtime(
                format!(
                    "lambda expected {} arguments but received {}",
                    lambda.params.len(),
                    values.len()
                ),
                site.location.as_ref(),
            ));
        }
        let frame = Environment::child(&lambda.captured);
        for (param, value) in lambda.params.iter().zip(values) {
            frame.set(param.clone(), Cell::bind_copy(&value));
        }
        match self.eval(&lambda.body, &frame)? {
            Flow::Value(cell) | Flow::Yield(cell) => Ok(Flow::Value(cell)),
            Flow::Break => Ok(Flow::Value(Cell::nil())),
        }
    }

    /// Resolve a plain or dotted symbol. Segments after the first are only
    /// looked up in the member table of the preceding box.
    pub fn resolve_symbol(
        &self,
        name: &str,
        location: Option<&Location>,
        env: &Env,
    ) -> RuntimeResult<CellRef> {
        let mut segments = name.split('.');
        let first = segments.next().unwrap_or(name);
        let mut current = env
            .lookup(first)
            .ok_or_else(|| RuntimeError::unknown(name, location))?;
        for segment in segments {
            let members = current.members().ok_or_else(|| {
                RuntimeError::runtime(
                    format!("unable to resolve `{name}`: `{segment}` is not reachable through a box"),
                    location,
                )
            })?;
            current = members
                .get(segment)
                .ok_or_else(|| RuntimeError::unknown(name, location))?;
        }
        Ok(current)
    }

    /// Rebind an existing name in the scope that owns it. A dotted name
    /// rebinds a member of the box its path resolves to.
    pub fn assign(
        &self,
        name: &str,
        cell: CellRef,
        location: Option<&Location>,
        env: &Env,
    ) -> RuntimeResult<()> {
        let Some((path, member)) = name.rsplit_once('.') else {
            return env.assign(name, cell, location);
        };
        let holder = self.resolve_symbol(path, location, env)?;
        let members = holder.members().ok_or_else(|| {
            RuntimeError::runtime(format!("`{path}` is not a box"), location)
        })?;
        if !members.contains_local(member) {
            return Err(RuntimeError::unknown(name, location));
        }
        members.set(member, cell);
        Ok(())
    }

    pub fn stringify(&self, cell: &CellRef, env: &Env, show_space: bool) -> RuntimeResult<String> {
        let mut out = String::new();
        self.write_cell(&mut out, cell, env)?;
        if show_space {
            out.push(' ');
        }
        Ok(out)
    }

    fn write_cell(&self, out: &mut String, cell: &CellRef, env: &Env) -> RuntimeResult<()> {
        match &cell.value {
            CellValue::Integer(value) => out.push_str(&value.to_string()),
            CellValue::Real(value) => out.push_str(&format_real(*value)),
            CellValue::String(text) => out.push_str(text),
            CellValue::Symbol(name) => {
                let resolved = self.resolve_symbol(name, cell.location.as_ref(), env)?;
                self.write_cell(out, &resolved, env)?;
            }
            CellValue::Encoded(builtin) => out.push_str(builtin.name()),
            CellValue::Procedure(procedure) => out.push_str(&procedure.name),
            CellValue::List(items) => {
                let items = items.read().clone();
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push(' ');
                    }
                    self.write_cell(out, item, env)?;
                }
                out.push(']');
            }
            CellValue::Lambda(_) => out.push_str("<lambda>"),
            CellValue::Box(_) => out.push_str("<box>"),
            CellValue::Variant(_) => out.push_str("<variant>"),
        }
        Ok(())
    }

    /// Parse `text` and evaluate each expression in `env`, returning the last value.
    pub fn run_source(&self, origin: Option<&str>, text: &str, env: &Env) -> RuntimeResult<CellRef> {
        let expressions = parse_source(origin, text)?;
        let mut last = Cell::nil();
        for expression in &expressions {
            last = self.evaluate(expression, env)?;
        }
        Ok(last)
    }
}

/// Render a cell back to source text that parses to an equivalent tree.
pub fn quote(cell: &CellRef) -> String {
    let mut out = String::new();
    write_quoted(&mut out, cell);
    out
}

fn write_quoted(out: &mut String, cell: &CellRef) {
    match &cell.value {
        CellValue::Integer(value) => out.push_str(&value.to_string()),
        CellValue::Real(value) => out.push_str(&format_real(*value)),
        CellValue::String(text) => {
            out.push('"');
            for ch in text.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    '\x07' => out.push_str("\\a"),
                    '\x08' => out.push_str("\\b"),
                    '\x0b' => out.push_str("\\v"),
                    other => out.push(other),
                }
            }
            out.push('"');
        }
        CellValue::Symbol(name) => out.push_str(name),
        CellValue::Encoded(builtin) => out.push_str(builtin.name()),
        CellValue::Procedure(procedure) => out.push_str(&procedure.name),
        CellValue::List(items) => {
            out.push('[');
            for (index, item) in items.read().iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                write_quoted(out, item);
            }
            out.push(']');
        }
        CellValue::Lambda(lambda) => {
            out.push_str("[lambda [");
            out.push_str(&lambda.params.join(" "));
            out.push_str("] ");
            write_quoted(out, &lambda.body);
            out.push(']');
        }
        CellValue::Box(_) => out.push_str("<box>"),
        CellValue::Variant(_) => out.push_str("<variant>"),
    }
}
