use super::Call;
use crate::runtime::{
    cell::{Cell, CellRef, CellValue},
    environment::Env,
    error::RuntimeResult,
    interpreter::{eval_args, value, Flow, Interpreter},
};
use parking_lot::RwLock;

fn list_target<'c>(call: &Call<'_>, cell: &'c CellRef, index: usize) -> RuntimeResult<&'c RwLock<Vec<CellRef>>> {
    cell.list_items().ok_or_else(|| {
        call.error_at(
            &call.args[index],
            format!("`{}` expects a list but was given a {}", call.name, cell.kind()),
        )
    })
}

fn index_arg(call: &Call<'_>, cell: &CellRef, position: usize) -> RuntimeResult<usize> {
    let index = cell.as_integer().ok_or_else(|| {
        call.error_at(&call.args[position], format!("`{}` expects an integer index", call.name))
    })?;
    usize::try_from(index).map_err(|_| {
        call.error_at(&call.args[position], format!("`{}` was given a negative index {index}", call.name))
    })
}

/// Refuse to store a list inside itself, directly or through nesting.
pub(super) fn reject_cycle(call: &Call<'_>, target: &CellRef, value: &CellRef) -> RuntimeResult<()> {
    if value.reaches(target) {
        return Err(call.error(format!("`{}` cannot place a list inside itself", call.name)));
    }
    Ok(())
}

pub fn list(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    let values = eval_args!(interp, call.args, env);
    let items = values.iter().map(Cell::bind_copy).collect();
    Ok(Flow::Value(Cell::list(items)))
}

pub fn push(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_at_least(2)?;
    let target = value!(interp.eval(&call.args[0], env));
    let items = list_target(&call, &target, 0)?;
    let values = eval_args!(interp, call.args[1..], env);
    for value in &values {
        reject_cycle(&call, &target, value)?;
    }
    items.write().extend(values.iter().map(Cell::bind_copy));
    Ok(Flow::Value(Cell::truth()))
}

pub fn pop(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let target = value!(interp.eval(&call.args[0], env));
    list_target(&call, &target, 0)?.write().pop();
    Ok(Flow::Value(Cell::truth()))
}

pub fn clear(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let target = value!(interp.eval(&call.args[0], env));
    list_target(&call, &target, 0)?.write().clear();
    Ok(Flow::Value(Cell::truth()))
}

pub fn front(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let target = value!(interp.eval(&call.args[0], env));
    let first = list_target(&call, &target, 0)?.read().first().cloned();
    Ok(Flow::Value(first.unwrap_or_else(Cell::nil)))
}

pub fn back(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let target = value!(interp.eval(&call.args[0], env));
    let last = list_target(&call, &target, 0)?.read().last().cloned();
    Ok(Flow::Value(last.unwrap_or_else(Cell::nil)))
}

/// `[at index list]`, nil when out of range.
pub fn at(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(2)?;
    let index = value!(interp.eval(&call.args[0], env));
    let index = index_arg(&call, &index, 0)?;
    let target = value!(interp.eval(&call.args[1], env));
    let element = list_target(&call, &target, 1)?.read().get(index).cloned();
    Ok(Flow::Value(element.unwrap_or_else(Cell::nil)))
}

/// `[set_at index list value]`
pub fn set_at(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(3)?;
    let index = value!(interp.eval(&call.args[0], env));
    let index = index_arg(&call, &index, 0)?;
    let target = value!(interp.eval(&call.args[1], env));
    let items = list_target(&call, &target, 1)?;
    let value = value!(interp.eval(&call.args[2], env));
    reject_cycle(&call, &target, &value)?;
    let mut guard = items.write();
    let len = guard.len();
    let slot = guard.get_mut(index).ok_or_else(|| {
        call.error(format!("`set_at` index {index} is out of range for a list of {len}"))
    })?;
    *slot = Cell::bind_copy(&value);
    Ok(Flow::Value(Cell::truth()))
}

pub fn len(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let target = value!(interp.eval(&call.args[0], env));
    let count = match &target.value {
        CellValue::List(items) => items.read().len(),
        CellValue::String(text) => text.chars().count(),
        _ => {
            return Err(call.error_at(
                &call.args[0],
                format!("`len` expects a list or string but was given a {}", target.kind()),
            ))
        }
    };
    Ok(Flow::Value(Cell::integer(count as i64)))
}

pub fn rev(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let target = value!(interp.eval(&call.args[0], env));
    let reversed = match &target.value {
        CellValue::List(items) => Cell::list(items.read().iter().rev().cloned().collect()),
        CellValue::String(text) => Cell::string(text.chars().rev().collect::<String>()),
        _ => {
            return Err(call.error_at(
                &call.args[0],
                format!("`rev` expects a list or string but was given a {}", target.kind()),
            ))
        }
    };
    Ok(Flow::Value(reversed))
}

#[cfg(test)]
mod tests {
    use crate::runtime::{
        environment::Environment,
        error::{RuntimeError, RuntimeResult},
        interpreter::Interpreter,
    };
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> RuntimeResult<String> {
        let interp = Interpreter::new();
        let env = Environment::new();
        let result = interp.run_source(None, source, &env)?;
        interp.stringify(&result, &env, false)
    }

    fn run_ok(source: &str) -> String {
        run(source).unwrap_or_else(|err| panic!("`{source}` failed: {err}"))
    }

    #[test]
    fn push_is_visible_through_aliases() {
        assert_eq!(
            run_ok("[var a [list 1 2]]\n[var b a]\n[push a 3]\n[len b]"),
            "3"
        );
        assert_eq!(
            run_ok("[var a [list]]\n[var f [lambda [l] [push l 9]]]\n[f a]\n[block a]"),
            "[9]"
        );
    }

    #[test]
    fn element_access() {
        assert_eq!(run_ok("[block [var shark [list 1 2 3]] [at 1 shark]]"), "2");
        assert_eq!(run_ok("[front [list 4 5]]"), "4");
        assert_eq!(run_ok("[back [list 4 5]]"), "5");
        assert_eq!(run_ok("[front [list]]"), "#nil");
        assert!(matches!(run("[at -1 [list 1]]"), Err(RuntimeError::Runtime { .. })));
        assert!(matches!(run("[front 3]"), Err(RuntimeError::Runtime { .. })));
    }

    #[test]
    fn in_place_mutation() {
        assert_eq!(run_ok("[var l [list 1 2 3]]\n[pop l]\n[block l]"), "[1 2]");
        assert_eq!(run_ok("[var l [list 1 2 3]]\n[clear l]\n[len l]"), "0");
        assert_eq!(run_ok("[var l [list 1 2 3]]\n[set_at 1 l \"x\"]\n[block l]"), "[1 x 3]");
        assert!(matches!(run("[set_at 3 [list 1] 0]"), Err(RuntimeError::Runtime { .. })));
    }

    #[test]
    fn lists_cannot_contain_themselves() {
        assert!(matches!(run("[var l [list 1]]\n[push l l]"), Err(RuntimeError::Runtime { .. })));
        assert!(matches!(run("[var l [list 1]]\n[set_at 0 l l]"), Err(RuntimeError::Runtime { .. })));
        assert!(matches!(
            run("[var a [list]]\n[var b [list a]]\n[push a b]"),
            Err(RuntimeError::Runtime { .. })
        ));
        assert_eq!(
            run_ok("[var l [list 1]]\n[var r [try [push l l] $]]\n[list [as_str l] r]"),
            "[[1] `push` cannot place a list inside itself]"
        );
        assert_eq!(run_ok("[var a [list 1]]\n[var b [list]]\n[push b a a]\n[block b]"), "[[1] [1]]");
    }

    #[test]
    fn len_and_rev_accept_strings() {
        assert_eq!(run_ok("[len \"héllo\"]"), "5");
        assert_eq!(run_ok("[rev \"abc\"]"), "cba");
        assert_eq!(run_ok("[var l [list 1 2 3]]\n[var r [rev l]]\n[push r 0]\n[block l]"), "[1 2 3]");
    }
}
