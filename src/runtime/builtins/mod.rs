//! Builtin procedures, indexed by their parse-time encoding.

mod arith;
mod convert;
mod forms;
mod lists;

use crate::language::{encoding::Builtin, token::Location};
use crate::runtime::{
    cell::{Cell, CellRef, CellValue, Procedure},
    concurrency,
    environment::Env,
    error::{RuntimeError, RuntimeResult},
    interpreter::{Flow, Interpreter},
};
use std::sync::Arc;

type Handler = fn(&Interpreter, Call<'_>, &Env) -> RuntimeResult<Flow>;

/// Arguments of one procedure invocation, still unevaluated.
#[derive(Clone, Copy)]
pub struct Call<'a> {
    pub name: &'a str,
    pub site: &'a CellRef,
    pub args: &'a [CellRef],
}

impl<'a> Call<'a> {
    pub fn new(name: &'a str, site: &'a CellRef, args: &'a [CellRef]) -> Self {
        Self { name, site, args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn location(&self) -> Option<&'a Location> {
        self.site.location.as_ref()
    }

    pub fn arg(&self, index: usize) -> RuntimeResult<&'a CellRef> {
        self.args.get(index).ok_or_else(|| {
            self.error(format!("`{}` is missing argument {}", self.name, index + 1))
        })
    }

    pub fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::runtime(message, self.location())
    }

    /// Error located at a specific argument when it carries a location.
    pub fn error_at(&self, cell: &CellRef, message: impl Into<String>) -> RuntimeError {
        RuntimeError::runtime(message, cell.location.as_ref().or(self.location()))
    }

    pub fn expect_exactly(&self, count: usize) -> RuntimeResult<()> {
        if self.len() != count {
            return Err(self.error(format!(
                "`{}` expects {} parameters, but {} were given",
                self.name,
                count,
                self.len()
            )));
        }
        Ok(())
    }

    pub fn expect_at_least(&self, count: usize) -> RuntimeResult<()> {
        if self.len() < count {
            return Err(self.error(format!(
                "`{}` expects at least {} parameters, but {} were given",
                self.name,
                count,
                self.len()
            )));
        }
        Ok(())
    }

    pub fn expect_range(&self, min: usize, max: usize) -> RuntimeResult<()> {
        if self.len() < min || self.len() > max {
            return Err(self.error(format!(
                "`{}` expects {} to {} parameters, but {} were given",
                self.name,
                min,
                max,
                self.len()
            )));
        }
        Ok(())
    }

    /// A plain, non-builtin symbol used as a binding name.
    pub fn binding_name(&self, index: usize) -> RuntimeResult<&'a str> {
        let cell = self.arg(index)?;
        match &cell.value {
            CellValue::Symbol(name) if !name.contains('.') => Ok(name),
            CellValue::Symbol(name) => Err(self.error_at(
                cell,
                format!("`{}` cannot define the dotted name `{name}`", self.name),
            )),
            CellValue::Encoded(builtin) => Err(self.error_at(
                cell,
                format!("Attempting to define a key symbol: {builtin}"),
            )),
            _ => Err(self.error_at(cell, format!("`{}` expects a symbol name", self.name))),
        }
    }
}

/// Fixed table of builtin procedures, one slot per encoding.
pub struct Registry {
    slots: Vec<CellRef>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let slots: Vec<CellRef> = Builtin::ALL
            .iter()
            .map(|builtin| {
                let handler = handler_for(*builtin);
                Cell::procedure(Procedure {
                    name: Arc::from(builtin.name()),
                    func: Arc::new(handler),
                })
            })
            .collect();
        tracing::debug!(count = slots.len(), "builtin registry populated");
        Self { slots }
    }

    pub fn get(&self, builtin: Builtin) -> CellRef {
        Arc::clone(&self.slots[builtin.index()])
    }
}

fn handler_for(builtin: Builtin) -> Handler {
    match builtin {
        Builtin::Front => lists::front,
        Builtin::Back => lists::back,
        Builtin::Push => lists::push,
        Builtin::Pop => lists::pop,
        Builtin::List => lists::list,
        Builtin::Set => forms::set,
        Builtin::Lambda => forms::lambda,
        Builtin::Block => forms::block,
        Builtin::Len => lists::len,
        Builtin::Put => forms::put,
        Builtin::Putln => forms::putln,
        Builtin::If => forms::if_else,
        Builtin::Eq => arith::eq,
        Builtin::NotEq => arith::not_eq,
        Builtin::LtEq => arith::lt_eq,
        Builtin::GtEq => arith::gt_eq,
        Builtin::Lt => arith::lt,
        Builtin::Gt => arith::gt,
        Builtin::Seq => arith::seq,
        Builtin::Sneq => arith::sneq,
        Builtin::Assert => forms::assert,
        Builtin::Loop => forms::loop_form,
        Builtin::Type => convert::type_of,
        Builtin::Import => forms::import,
        Builtin::Use => forms::use_package,
        Builtin::Iter => forms::iter,
        Builtin::Not => arith::not,
        Builtin::Or => arith::or,
        Builtin::And => arith::and,
        Builtin::Xor => arith::xor,
        Builtin::Break => forms::break_form,
        Builtin::At => lists::at,
        Builtin::Clear => lists::clear,
        Builtin::Compose => forms::compose,
        Builtin::Decompose => forms::decompose,
        Builtin::Box => forms::box_form,
        Builtin::True => forms::true_value,
        Builtin::False => forms::false_value,
        Builtin::IsNil => forms::is_nil,
        Builtin::Nil => forms::nil_value,
        Builtin::Add => arith::add,
        Builtin::Sub => arith::sub,
        Builtin::Div => arith::div,
        Builtin::Mul => arith::mul,
        Builtin::Mod => arith::rem,
        Builtin::Var => forms::var,
        Builtin::Exit => forms::exit,
        Builtin::Yield => forms::yield_form,
        Builtin::Try => forms::try_form,
        Builtin::AsInt => convert::as_int,
        Builtin::AsStr => convert::as_str,
        Builtin::AsReal => convert::as_real,
        Builtin::Throw => forms::throw,
        Builtin::BwAnd => arith::bw_and,
        Builtin::BwOr => arith::bw_or,
        Builtin::BwLsh => arith::bw_lsh,
        Builtin::BwRsh => arith::bw_rsh,
        Builtin::BwXor => arith::bw_xor,
        Builtin::BwNot => arith::bw_not,
        Builtin::Rev => lists::rev,
        Builtin::SetAt => lists::set_at,
        Builtin::Async => concurrency::spawn_async,
        Builtin::Thread => concurrency::spawn_thread,
        Builtin::Chan => concurrency::channel,
        Builtin::Ref => concurrency::reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_encoding_has_a_named_slot() {
        let registry = Registry::new();
        assert_eq!(registry.slots.len(), Builtin::ALL.len());
        for builtin in Builtin::ALL {
            match &registry.get(*builtin).value {
                CellValue::Procedure(procedure) => assert_eq!(&*procedure.name, builtin.name()),
                _ => panic!("slot for {builtin} is not a procedure"),
            }
        }
    }
}
