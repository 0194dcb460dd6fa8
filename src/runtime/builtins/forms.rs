use super::{lists::reject_cycle, Call};
use crate::runtime::{
    cell::{Cell, CellValue, Lambda},
    environment::{Env, Environment},
    error::{RuntimeError, RuntimeResult},
    interpreter::{eval_args, quote, value, Flow, Interpreter},
};
use std::io::Write;
use std::sync::Arc;

pub fn var(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_range(1, 2)?;
    let name = call.binding_name(0)?;
    let value = match call.args.get(1) {
        Some(expr) => value!(interp.eval(expr, env)),
        None => Cell::list(Vec::new()),
    };
    let bound = Cell::bind_copy(&value);
    env.set(name, Arc::clone(&bound));
    Ok(Flow::Value(bound))
}

pub fn set(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(2)?;
    let target = call.arg(0)?;
    let name = match &target.value {
        CellValue::Symbol(name) => name.as_str(),
        CellValue::Encoded(builtin) => {
            return Err(call.error_at(target, format!("Attempting to set a key symbol: {builtin}")))
        }
        _ => return Err(call.error_at(target, "`set` expects a symbol name")),
    };
    let value = value!(interp.eval(&call.args[1], env));
    let bound = Cell::bind_copy(&value);
    interp.assign(name, Arc::clone(&bound), target.location.as_ref(), env)?;
    Ok(Flow::Value(bound))
}

pub fn lambda(_interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(2)?;
    let params_cell = call.arg(0)?;
    let items = params_cell
        .list_items()
        .ok_or_else(|| call.error_at(params_cell, "lambda parameters must be a list"))?
        .read()
        .clone();
    let mut params = Vec::with_capacity(items.len());
    for item in &items {
        match item.symbol_name() {
            Some(name) if !name.contains('.') => params.push(name.to_string()),
            _ => return Err(call.error_at(item, "lambda parameters must be plain symbols")),
        }
    }
    let lambda = Lambda {
        params,
        body: Arc::clone(&call.args[1]),
        captured: Arc::clone(env),
    };
    Ok(Flow::Value(Cell::new(CellValue::Lambda(lambda))))
}

pub fn block(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    let mut last = Cell::nil();
    for expr in call.args {
        last = value!(interp.eval(expr, env));
    }
    Ok(Flow::Value(last))
}

pub fn if_else(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_range(2, 3)?;
    let condition = value!(interp.eval(&call.args[0], env));
    if condition.is_truthy() {
        interp.eval(&call.args[1], env)
    } else if let Some(otherwise) = call.args.get(2) {
        interp.eval(otherwise, env)
    } else {
        Ok(Flow::Value(Cell::truth()))
    }
}

/// `[loop pre cond post body]`
pub fn loop_form(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(4)?;
    let (pre, condition, post, body) = (&call.args[0], &call.args[1], &call.args[2], &call.args[3]);
    let outer = Environment::child(env);
    value!(interp.eval(pre, &outer));
    loop {
        let scope = Environment::child(&outer);
        if !value!(interp.eval(condition, &scope)).is_truthy() {
            break;
        }
        match interp.eval(body, &scope)? {
            Flow::Value(_) => {}
            Flow::Break => break,
            flow @ Flow::Yield(_) => return Ok(flow),
        }
        match interp.eval(post, &scope)? {
            Flow::Value(_) => {}
            Flow::Break => break,
            flow @ Flow::Yield(_) => return Ok(flow),
        }
    }
    Ok(Flow::Value(Cell::nil()))
}

/// `[iter name list body]`. Rebinding `name` in the body writes back to the list.
pub fn iter(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(3)?;
    let name = call.binding_name(0)?;
    let source = value!(interp.eval(&call.args[1], env));
    let items = source
        .list_items()
        .ok_or_else(|| call.error_at(&call.args[1], "`iter` expects a list to iterate over"))?;
    let mut index = 0;
    loop {
        let Some(element) = items.read().get(index).cloned() else {
            break;
        };
        let scope = Environment::child(env);
        scope.set(name, element);
        let flow = interp.eval(&call.args[2], &scope)?;
        if let Some(current) = scope.get(name) {
            reject_cycle(&call, &source, &current)?;
            let mut guard = items.write();
            if let Some(slot) = guard.get_mut(index) {
                *slot = current;
            }
        }
        match flow {
            Flow::Value(_) => {}
            Flow::Break => break,
            flow @ Flow::Yield(_) => return Ok(flow),
        }
        index += 1;
    }
    Ok(Flow::Value(Cell::nil()))
}

pub fn break_form(_interp: &Interpreter, call: Call<'_>, _env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(0)?;
    Ok(Flow::Break)
}

pub fn yield_form(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    Ok(Flow::Yield(value))
}

/// `[try body handler]`. The handler sees the error text as `$`.
pub fn try_form(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(2)?;
    match interp.eval(&call.args[0], env) {
        Ok(flow) => Ok(flow),
        Err(err) => {
            tracing::debug!(error = %err, "try caught error");
            let scope = Environment::child(env);
            scope.set("$", Cell::string(err.to_string()));
            interp.eval(&call.args[1], &scope)
        }
    }
}

pub fn throw(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    let message = interp.stringify(&value, env, false)?;
    Err(RuntimeError::runtime(message, call.location()))
}

/// `[assert "label" cond...]`
pub fn assert(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_at_least(2)?;
    let label_cell = call.arg(0)?;
    let label = label_cell
        .as_str()
        .ok_or_else(|| call.error_at(label_cell, "assert expects a raw string label"))?;
    for condition in &call.args[1..] {
        let value = value!(interp.eval(condition, env));
        let holds = match &value.value {
            CellValue::String(text) => !text.is_empty(),
            CellValue::Integer(number) => *number >= 1,
            CellValue::Real(number) => *number > 0.0,
            _ => {
                return Err(call.error_at(
                    condition,
                    format!("assert condition evaluated to a {}", value.kind()),
                ))
            }
        };
        if !holds {
            return Err(RuntimeError::Assertion {
                label: label.to_string(),
                location: condition.location.clone().or_else(|| call.location().cloned()),
            });
        }
    }
    Ok(Flow::Value(Cell::truth()))
}

/// `[box name body]`
pub fn box_form(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(2)?;
    let name = call.binding_name(0)?;
    let members = Environment::child(env);
    value!(interp.eval(&call.args[1], &members));
    env.set(name, Cell::boxed(members));
    Ok(Flow::Value(Cell::truth()))
}

pub fn exit(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    let code = value
        .as_integer()
        .ok_or_else(|| call.error("`exit` expects an integer status"))?;
    tracing::info!(code, "exit requested");
    let _ = std::io::stdout().flush();
    std::process::exit(code as i32)
}

fn write_values(interp: &Interpreter, call: Call<'_>, env: &Env, newline: bool) -> RuntimeResult<Flow> {
    let values = eval_args!(interp, call.args, env);
    let mut text = String::new();
    for value in &values {
        text.push_str(&interp.stringify(value, env, false)?);
    }
    if newline {
        text.push('\n');
    }
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|err| call.error(format!("failed to write output: {err}")))?;
    Ok(Flow::Value(Cell::truth()))
}

pub fn put(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    write_values(interp, call, env, false)
}

pub fn putln(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    write_values(interp, call, env, true)
}

/// `[import "path"...]` evaluates each source module into the current scope.
pub fn import(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_at_least(1)?;
    for arg in call.args {
        let name = arg
            .as_str()
            .ok_or_else(|| call.error_at(arg, "Import objects are expected to be raw strings"))?;
        let module = interp
            .loader()
            .resolve_source(name)
            .map_err(|err| call.error_at(arg, format!("Unable to load import: {err}")))?;
        tracing::debug!(module = %module.origin, "importing source module");
        interp.run_source(Some(&module.origin), &module.text, env)?;
    }
    Ok(Flow::Value(Cell::truth()))
}

/// `[use "package"...]` binds a box of the package's procedures under its name.
pub fn use_package(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_at_least(1)?;
    for arg in call.args {
        let name = arg
            .as_str()
            .ok_or_else(|| call.error_at(arg, "`use` expects parameters to be raw strings"))?;
        if env.package_loaded(name) {
            continue;
        }
        let package = interp
            .loader()
            .resolve_package(name)
            .map_err(|err| call.error_at(arg, err.to_string()))?;
        let members = Environment::child(env);
        for (member, procedure) in package.procedures {
            members.set(member, Cell::procedure(procedure));
        }
        tracing::debug!(package = %package.name, "native package loaded");
        env.set(package.name, Cell::boxed(members));
        env.mark_package_loaded(name);
    }
    Ok(Flow::Value(Cell::truth()))
}

pub fn compose(_interp: &Interpreter, call: Call<'_>, _env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    Ok(Flow::Value(Cell::string(quote(&call.args[0]))))
}

pub fn decompose(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    let text = value
        .as_str()
        .ok_or_else(|| call.error("`decompose` expects a string"))?;
    Ok(Flow::Value(interp.run_source(None, text, env)?))
}

pub fn true_value(_interp: &Interpreter, call: Call<'_>, _env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(0)?;
    Ok(Flow::Value(Cell::truth()))
}

pub fn false_value(_interp: &Interpreter, call: Call<'_>, _env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(0)?;
    Ok(Flow::Value(Cell::falsity()))
}

pub fn nil_value(_interp: &Interpreter, call: Call<'_>, _env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(0)?;
    Ok(Flow::Value(Cell::nil()))
}

pub fn is_nil(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    Ok(Flow::Value(Cell::from_bool(value.is_nil())))
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
    fn var_rejects_key_symbols_and_dotted_names() {
        assert!(matches!(run("[var + 1]"), Err(RuntimeError::Runtime { .. })));
        assert!(matches!(run("[var a.b 1]"), Err(RuntimeError::Runtime { .. })));
        assert_eq!(run_ok("[var empty]\n[len empty]"), "0");
    }

    #[test]
    fn var_copies_scalars_but_aliases_lists() {
        assert_eq!(run_ok("[var a 1]\n[var b a]\n[set b 2]\n[block a]"), "1");
        assert_eq!(run_ok("[var a [list 1]]\n[var b a]\n[push b 2]\n[block a]"), "[1 2]");
    }

    #[test]
    fn set_requires_an_existing_binding() {
        let err = run("[set ghost 1]").unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownIdentifier { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn if_without_else_yields_true() {
        assert_eq!(run_ok("[if 0 5]"), "1");
        assert_eq!(run_ok("[if 1 5 6]"), "5");
        assert_eq!(run_ok("[if \"\" 5 6]"), "6");
    }

    #[test]
    fn loop_runs_pre_cond_body_post() {
        assert_eq!(
            run_ok("[var x 0]\n[loop [] [< x 10] [] [[block [set x [+ x 1]]]]]\n[block x]"),
            "10"
        );
        assert_eq!(
            run_ok("[var total 0]\n[loop [var i 0] [< i 5] [set i [+ i 1]] [set total [+ total i]]]\n[block total]"),
            "10"
        );
        assert_eq!(
            run_ok("[var x 0]\n[loop [] [true] [] [block [set x [+ x 1]] [if [== x 3] [break]]]]\n[block x]"),
            "3"
        );
    }

    #[test]
    fn iter_writes_rebinding_back_into_the_list() {
        assert_eq!(
            run_ok("[var l [list 1 2 3]]\n[iter x l [set x [* x 2]]]\n[block l]"),
            "[2 4 6]"
        );
        assert_eq!(
            run_ok("[var seen 0]\n[iter x [list 1 2 3 4] [block [set seen x] [if [== x 2] [break]]]]\n[block seen]"),
            "2"
        );
    }

    #[test]
    fn iter_refuses_to_write_a_list_into_itself() {
        let err = run("[var l [list 1 2]]\n[iter x l [set x l]]").unwrap_err();
        assert!(matches!(err, RuntimeError::Runtime { .. }));
        assert_eq!(run_ok("[var l [list 1 2]]\n[try [iter x l [set x l]] [len l]]"), "2");
    }

    #[test]
    fn try_binds_the_error_message() {
        assert_eq!(run_ok("[try [throw \"boom\"] $]"), "boom");
        assert_eq!(run_ok("[try [+ 1 1] \"unused\"]"), "2");
        assert_eq!(run_ok("[try [assert \"check\" 0] $]"), "assertion failure: check");
        assert_eq!(run_ok("[try [missing] $]"), "Unknown identifier `missing`");
    }

    #[test]
    fn assert_checks_each_condition() {
        assert_eq!(run_ok("[assert \"ok\" 1 2.5 \"text\"]"), "1");
        let err = run("[assert \"zero\" 1 0]").unwrap_err();
        assert!(matches!(err, RuntimeError::Assertion { ref label, .. } if label == "zero"));
        assert!(matches!(run("[assert \"neg\" -0.5]"), Err(RuntimeError::Assertion { .. })));
        assert!(matches!(run("[assert \"empty\" \"\"]"), Err(RuntimeError::Assertion { .. })));
        assert!(matches!(run("[assert \"list\" [list 1]]"), Err(RuntimeError::Runtime { .. })));
        assert!(matches!(run("[assert label 1]"), Err(RuntimeError::Runtime { .. })));
    }

    #[test]
    fn box_members_stay_private_to_the_box() {
        assert_eq!(run_ok("[box o [block [var a 1] [var b 2]]]\n[+ o.a o.b]"), "3");
        assert!(matches!(run("[box o [var a 1]]\n[block a]"), Err(RuntimeError::UnknownIdentifier { .. })));
        assert_eq!(
            run_ok("[box o [block [var n 1] [var bump [lambda [] [set n [+ n 1]]]]]]\n[o.bump]\n[o.n]"),
            "2"
        );
    }

    #[test]
    fn compose_and_decompose_cross_the_text_boundary() {
        assert_eq!(run_ok("[compose [+ 1 [* 2 3]]]"), "[+ 1 [* 2 3]]");
        assert_eq!(run_ok("[decompose [compose [+ 1 [* 2 3]]]]"), "7");
        assert_eq!(run_ok("[decompose \"[var z 4] [+ z 1]\"]"), "5");
    }

    #[test]
    fn nil_helpers() {
        assert_eq!(run_ok("[is_nil [nil]]"), "1");
        assert_eq!(run_ok("[is_nil 0]"), "0");
        assert_eq!(run_ok("[at 5 [list 1]]"), "#nil");
    }
}
