use super::Call;
use crate::runtime::{
    cell::{Cell, CellValue},
    environment::Env,
    error::RuntimeResult,
    interpreter::{value, Flow, Interpreter},
};

pub fn type_of(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    Ok(Flow::Value(Cell::string(value.kind().name())))
}

pub fn as_int(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    let converted = match &value.value {
        CellValue::Integer(number) => Some(*number),
        CellValue::Real(number) => Some(number.trunc() as i64),
        CellValue::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(|n| n.trunc() as i64))
        }
        _ => None,
    };
    converted
        .map(|number| Flow::Value(Cell::integer(number)))
        .ok_or_else(|| call.error(format!("unable to convert {} to an integer", value.kind())))
}

pub fn as_real(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    let converted = match &value.value {
        CellValue::Integer(number) => Some(*number as f64),
        CellValue::Real(number) => Some(*number),
        CellValue::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    converted
        .map(|number| Flow::Value(Cell::real(number)))
        .ok_or_else(|| call.error(format!("unable to convert {} to a real", value.kind())))
}

pub fn as_str(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let value = value!(interp.eval(&call.args[0], env));
    Ok(Flow::Value(Cell::string(interp.stringify(&value, env, false)?)))
}
