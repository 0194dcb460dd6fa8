use crate::language::{encoding::Builtin, token::Location};
use crate::runtime::{
    builtins::Call,
    environment::Env,
    error::RuntimeResult,
    interpreter::{Flow, Interpreter},
};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub type CellRef = Arc<Cell>;

/// Host function signature. Receives the unevaluated argument cells.
pub type NativeFn = dyn Fn(&Interpreter, Call<'_>, &Env) -> RuntimeResult<Flow> + Send + Sync;

pub const NIL_TEXT: &str = "#nil";

pub struct Cell {
    pub value: CellValue,
    pub location: Option<Location>,
}

pub enum CellValue {
    Integer(i64),
    Real(f64),
    String(String),
    Symbol(String),
    Encoded(Builtin),
    List(RwLock<Vec<CellRef>>),
    Lambda(Lambda),
    Box(Env),
    Variant(Variant),
    Procedure(Procedure),
}

pub struct Lambda {
    pub params: Vec<String>,
    pub body: CellRef,
    pub captured: Env,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantKind {
    Async,
    Thread,
    Channel,
    Ref,
}

impl VariantKind {
    pub fn name(self) -> &'static str {
        match self {
            VariantKind::Async => "async",
            VariantKind::Thread => "thread",
            VariantKind::Channel => "chan",
            VariantKind::Ref => "ref",
        }
    }
}

/// A box-like handle whose members are native methods over shared state.
pub struct Variant {
    pub kind: VariantKind,
    pub members: Env,
}

#[derive(Clone)]
pub struct Procedure {
    pub name: Arc<str>,
    pub func: Arc<NativeFn>,
}

impl Procedure {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&Interpreter, Call<'_>, &Env) -> RuntimeResult<Flow> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Integer,
    Real,
    String,
    Symbol,
    EncodedSymbol,
    List,
    Lambda,
    Box,
    Variant,
}

impl CellKind {
    pub fn name(self) -> &'static str {
        match self {
            CellKind::Integer => "integer",
            CellKind::Real => "real",
            CellKind::String => "string",
            CellKind::Symbol => "symbol",
            CellKind::EncodedSymbol => "encoded_symbol",
            CellKind::List => "list",
            CellKind::Lambda => "lambda",
            CellKind::Box => "box",
            CellKind::Variant => "variant",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Cell {
    pub fn new(value: CellValue) -> CellRef {
        Arc::new(Self {
            value,
            location: None,
        })
    }

    pub fn located(value: CellValue, location: Location) -> CellRef {
        Arc::new(Self {
            value,
            location: Some(location),
        })
    }

    pub fn integer(value: i64) -> CellRef {
        Self::new(CellValue::Integer(value))
    }

    pub fn real(value: f64) -> CellRef {
        Self::new(CellValue::Real(value))
    }

    pub fn string(value: impl Into<String>) -> CellRef {
        Self::new(CellValue::String(value.into()))
    }

    pub fn list(items: Vec<CellRef>) -> CellRef {
        Self::new(CellValue::List(RwLock::new(items)))
    }

    pub fn boxed(env: Env) -> CellRef {
        Self::new(CellValue::Box(env))
    }

    pub fn variant(kind: VariantKind, members: Env) -> CellRef {
        Self::new(CellValue::Variant(Variant { kind, members }))
    }

    pub fn procedure(procedure: Procedure) -> CellRef {
        Self::new(CellValue::Procedure(procedure))
    }

    pub fn truth() -> CellRef {
        Self::integer(1)
    }

    pub fn falsity() -> CellRef {
        Self::integer(0)
    }

    pub fn nil() -> CellRef {
        Self::string(NIL_TEXT)
    }

    pub fn from_bool(value: bool) -> CellRef {
        if value {
            Self::truth()
        } else {
            Self::falsity()
        }
    }

    pub fn kind(&self) -> CellKind {
        match &self.value {
            CellValue::Integer(_) => CellKind::Integer,
            CellValue::Real(_) => CellKind::Real,
            CellValue::String(_) => CellKind::String,
            CellValue::Symbol(_) | CellValue::Procedure(_) => CellKind::Symbol,
            CellValue::Encoded(_) => CellKind::EncodedSymbol,
            CellValue::List(_) => CellKind::List,
            CellValue::Lambda(_) => CellKind::Lambda,
            CellValue::Box(_) => CellKind::Box,
            CellValue::Variant(_) => CellKind::Variant,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(&self.value, CellValue::String(text) if text == NIL_TEXT)
    }

    /// Non-empty strings and lists, every lambda, and positive numbers.
    pub fn is_truthy(&self) -> bool {
        match &self.value {
            CellValue::Integer(value) => *value > 0,
            CellValue::Real(value) => *value > 0.0,
            CellValue::String(text) => !text.is_empty(),
            CellValue::List(items) => !items.read().is_empty(),
            CellValue::Lambda(_) => true,
            _ => false,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            CellValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            CellValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn symbol_name(&self) -> Option<&str> {
        match &self.value {
            CellValue::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn list_items(&self) -> Option<&RwLock<Vec<CellRef>>> {
        match &self.value {
            CellValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Member table of a box or variant.
    pub fn members(&self) -> Option<&Env> {
        match &self.value {
            CellValue::Box(env) => Some(env),
            CellValue::Variant(variant) => Some(&variant.members),
            _ => None,
        }
    }

    /// True when `target` is this cell or sits anywhere inside its nested lists.
    pub fn reaches(&self, target: &Cell) -> bool {
        if std::ptr::eq(self, target) {
            return true;
        }
        match &self.value {
            CellValue::List(items) => items.read().iter().any(|item| item.reaches(target)),
            _ => false,
        }
    }

    /// Scalars are copied; lists, lambdas, boxes and variants stay shared.
    pub fn bind_copy(cell: &CellRef) -> CellRef {
        let value = match &cell.value {
            CellValue::Integer(value) => CellValue::Integer(*value),
            CellValue::Real(value) => CellValue::Real(*value),
            CellValue::String(text) => CellValue::String(text.clone()),
            CellValue::Symbol(name) => CellValue::Symbol(name.clone()),
            CellValue::Encoded(builtin) => CellValue::Encoded(*builtin),
            _ => return Arc::clone(cell),
        };
        Arc::new(Self {
            value,
            location: cell.location.clone(),
        })
    }
}

/// Shortest positional form that reads back as the same real. Never uses an
/// exponent, and always carries a `.` for finite values.
pub fn format_real(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            CellValue::Integer(value) => write!(f, "Integer({value})"),
            CellValue::Real(value) => write!(f, "Real({})", format_real(*value)),
            CellValue::String(text) => write!(f, "String({text:?})"),
            CellValue::Symbol(name) => write!(f, "Symbol({name})"),
            CellValue::Encoded(builtin) => write!(f, "Encoded({builtin})"),
            CellValue::List(items) => f.debug_list().entries(items.read().iter()).finish(),
            CellValue::Lambda(lambda) => write!(f, "Lambda({:?})", lambda.params),
            CellValue::Box(_) => write!(f, "Box"),
            CellValue::Variant(variant) => write!(f, "Variant({})", variant.kind.name()),
            CellValue::Procedure(procedure) => write!(f, "Procedure({})", procedure.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::environment::Environment;

    #[test]
    fn truthiness_follows_value_rules() {
        assert!(Cell::integer(3).is_truthy());
        assert!(!Cell::integer(0).is_truthy());
        assert!(!Cell::integer(-2).is_truthy());
        assert!(!Cell::real(0.0).is_truthy());
        assert!(Cell::real(0.5).is_truthy());
        assert!(Cell::string("x").is_truthy());
        assert!(!Cell::string("").is_truthy());
        assert!(!Cell::list(vec![]).is_truthy());
        assert!(Cell::list(vec![Cell::integer(0)]).is_truthy());
        assert!(!Cell::boxed(Environment::new()).is_truthy());
    }

    #[test]
    fn nil_is_a_marked_string() {
        assert!(Cell::nil().is_nil());
        assert_eq!(Cell::nil().kind(), CellKind::String);
        assert!(!Cell::string("nil").is_nil());
    }

    #[test]
    fn binding_copies_scalars_and_shares_lists() {
        let scalar = Cell::integer(4);
        assert!(!Arc::ptr_eq(&scalar, &Cell::bind_copy(&scalar)));
        let list = Cell::list(vec![Cell::integer(1)]);
        assert!(Arc::ptr_eq(&list, &Cell::bind_copy(&list)));
    }

    #[test]
    fn reaches_follows_nested_lists() {
        let inner = Cell::list(vec![Cell::integer(1)]);
        let outer = Cell::list(vec![Cell::integer(0), Arc::clone(&inner)]);
        assert!(outer.reaches(&inner));
        assert!(inner.reaches(&inner));
        assert!(!inner.reaches(&outer));
        assert!(!Cell::integer(1).reaches(&inner));
    }

    #[test]
    fn reals_always_render_with_a_fraction() {
        assert_eq!(format_real(2.0), "2.0");
        assert_eq!(format_real(4.5), "4.5");
        assert_eq!(format_real(-0.25), "-0.25");
        assert_eq!(format_real(1e16), "10000000000000000.0");
        assert_eq!(format_real(0.00001), "0.00001");
        assert_eq!(format_real(-3e-7), "-0.0000003");
    }
}
