use super::Call;
use crate::runtime::{
    cell::{Cell, CellRef, CellValue},
    environment::Env,
    error::RuntimeResult,
    interpreter::{eval_args, Flow, Interpreter},
};

#[derive(Clone, Copy, Debug)]
enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Real(value) => value,
        }
    }
}

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy)]
enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

fn numbers(call: &Call<'_>, values: &[CellRef]) -> RuntimeResult<Vec<Number>> {
    values
        .iter()
        .zip(call.args)
        .map(|(value, arg)| match value.value {
            CellValue::Integer(number) => Ok(Number::Int(number)),
            CellValue::Real(number) => Ok(Number::Real(number)),
            _ => Err(call.error_at(
                arg,
                format!("`{}` expects numeric operands but was given a {}", call.name, value.kind()),
            )),
        })
        .collect()
}

fn integers(call: &Call<'_>, values: &[CellRef]) -> RuntimeResult<Vec<i64>> {
    values
        .iter()
        .zip(call.args)
        .map(|(value, arg)| {
            value.as_integer().ok_or_else(|| {
                call.error_at(arg, format!("`{}` expects integer operands", call.name))
            })
        })
        .collect()
}

fn arithmetic(interp: &Interpreter, call: Call<'_>, env: &Env, op: ArithOp) -> RuntimeResult<Flow> {
    call.expect_at_least(2)?;
    let values = eval_args!(interp, call.args, env);
    let operands = numbers(&call, &values)?;
    let all_integers: Option<Vec<i64>> = operands
        .iter()
        .map(|n| match n {
            Number::Int(value) => Some(*value),
            Number::Real(_) => None,
        })
        .collect();
    let result = match all_integers {
        Some(ints) if !matches!(op, ArithOp::Div) => {
            let mut acc = ints[0];
            for rhs in &ints[1..] {
                acc = match op {
                    ArithOp::Add => acc.wrapping_add(*rhs),
                    ArithOp::Sub => acc.wrapping_sub(*rhs),
                    ArithOp::Mul => acc.wrapping_mul(*rhs),
                    ArithOp::Div | ArithOp::Rem if *rhs == 0 => 0,
                    ArithOp::Div => acc.wrapping_div(*rhs),
                    ArithOp::Rem => acc.wrapping_rem(*rhs),
                };
            }
            Cell::integer(acc)
        }
        _ => {
            let mut acc = operands[0].as_f64();
            for operand in &operands[1..] {
                let rhs = operand.as_f64();
                acc = match op {
                    ArithOp::Add => acc + rhs,
                    ArithOp::Sub => acc - rhs,
                    ArithOp::Mul => acc * rhs,
                    ArithOp::Div | ArithOp::Rem if rhs == 0.0 => 0.0,
                    ArithOp::Div => acc / rhs,
                    ArithOp::Rem => acc % rhs,
                };
            }
            Cell::real(acc)
        }
    };
    Ok(Flow::Value(result))
}

pub fn add(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    arithmetic(interp, call, env, ArithOp::Add)
}

pub fn sub(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    arithmetic(interp, call, env, ArithOp::Sub)
}

pub fn mul(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    arithmetic(interp, call, env, ArithOp::Mul)
}

pub fn div(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    arithmetic(interp, call, env, ArithOp::Div)
}

pub fn rem(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    arithmetic(interp, call, env, ArithOp::Rem)
}

fn compare(interp: &Interpreter, call: Call<'_>, env: &Env, op: CompareOp) -> RuntimeResult<Flow> {
    call.expect_at_least(2)?;
    let values = eval_args!(interp, call.args, env);
    let operands = numbers(&call, &values)?;
    let holds = operands.windows(2).all(|pair| {
        let ordering = match (pair[0], pair[1]) {
            (Number::Int(lhs), Number::Int(rhs)) => lhs.partial_cmp(&rhs),
            (lhs, rhs) => lhs.as_f64().partial_cmp(&rhs.as_f64()),
        };
        let Some(ordering) = ordering else {
            return matches!(op, CompareOp::NotEq);
        };
        match op {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::NotEq => ordering.is_ne(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::LtEq => ordering.is_le(),
            CompareOp::GtEq => ordering.is_ge(),
        }
    });
    Ok(Flow::Value(Cell::from_bool(holds)))
}

pub fn eq(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    compare(interp, call, env, CompareOp::Eq)
}

pub fn not_eq(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    compare(interp, call, env, CompareOp::NotEq)
}

pub fn lt(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    compare(interp, call, env, CompareOp::Lt)
}

pub fn gt(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    compare(interp, call, env, CompareOp::Gt)
}

pub fn lt_eq(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    compare(interp, call, env, CompareOp::LtEq)
}

pub fn gt_eq(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    compare(interp, call, env, CompareOp::GtEq)
}

fn strings_equal(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Result<bool, Flow>> {
    call.expect_exactly(2)?;
    let mut rendered = Vec::with_capacity(2);
    for arg in call.args {
        match interp.eval(arg, env)? {
            Flow::Value(value) => rendered.push(interp.stringify(&value, env, false)?),
            flow => return Ok(Err(flow)),
        }
    }
    Ok(Ok(rendered[0] == rendered[1]))
}

pub fn seq(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    Ok(match strings_equal(interp, call, env)? {
        Ok(equal) => Flow::Value(Cell::from_bool(equal)),
        Err(flow) => flow,
    })
}

pub fn sneq(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    Ok(match strings_equal(interp, call, env)? {
        Ok(equal) => Flow::Value(Cell::from_bool(!equal)),
        Err(flow) => flow,
    })
}

fn logic(
    interp: &Interpreter,
    call: Call<'_>,
    env: &Env,
    fold: fn(bool, bool) -> bool,
) -> RuntimeResult<Flow> {
    call.expect_at_least(2)?;
    let values = eval_args!(interp, call.args, env);
    let operands = numbers(&call, &values)?;
    let mut truths = operands.iter().map(|number| number.as_f64() > 0.0);
    let first = truths.next().unwrap_or(false);
    Ok(Flow::Value(Cell::from_bool(truths.fold(first, fold))))
}

pub fn and(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    logic(interp, call, env, |acc, next| acc && next)
}

pub fn or(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    logic(interp, call, env, |acc, next| acc || next)
}

pub fn xor(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    logic(interp, call, env, |acc, next| acc ^ next)
}

pub fn not(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let values = eval_args!(interp, call.args, env);
    Ok(Flow::Value(Cell::from_bool(!values[0].is_truthy())))
}

fn bitwise_fold(
    interp: &Interpreter,
    call: Call<'_>,
    env: &Env,
    fold: fn(i64, i64) -> i64,
) -> RuntimeResult<Flow> {
    call.expect_at_least(2)?;
    let values = eval_args!(interp, call.args, env);
    let operands = integers(&call, &values)?;
    let result = operands[1..].iter().fold(operands[0], |acc, rhs| fold(acc, *rhs));
    Ok(Flow::Value(Cell::integer(result)))
}

pub fn bw_and(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    bitwise_fold(interp, call, env, |lhs, rhs| lhs & rhs)
}

pub fn bw_or(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    bitwise_fold(interp, call, env, |lhs, rhs| lhs | rhs)
}

pub fn bw_xor(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    bitwise_fold(interp, call, env, |lhs, rhs| lhs ^ rhs)
}

fn shift(interp: &Interpreter, call: Call<'_>, env: &Env, left: bool) -> RuntimeResult<Flow> {
    call.expect_exactly(2)?;
    let values = eval_args!(interp, call.args, env);
    let operands = integers(&call, &values)?;
    let amount = u32::try_from(operands[1])
        .map_err(|_| call.error(format!("`{}` cannot shift by {}", call.name, operands[1])))?;
    let result = if left {
        operands[0].wrapping_shl(amount)
    } else {
        operands[0].wrapping_shr(amount)
    };
    Ok(Flow::Value(Cell::integer(result)))
}

pub fn bw_lsh(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    shift(interp, call, env, true)
}

pub fn bw_rsh(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    shift(interp, call, env, false)
}

pub fn bw_not(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let values = eval_args!(interp, call.args, env);
    let operands = integers(&call, &values)?;
    Ok(Flow::Value(Cell::integer(!operands[0])))
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
    fn arithmetic_promotes_to_real() {
        assert_eq!(run_ok("[* 2 1.5]"), "3.0");
        assert_eq!(run_ok("[- 1.5 0.5]"), "1.0");
        assert_eq!(run_ok("[/ 9 2]"), "4.5");
        assert_eq!(run_ok("[% 7 2]"), "1");
        assert_eq!(run_ok("[% 7.5 2]"), "1.5");
        assert_eq!(run_ok("[- 10 2 0.5]"), "7.5");
        assert_eq!(run_ok("[+ -.5 1]"), "0.5");
        assert_eq!(run_ok("[+ 9223372036854775807 1]"), "-9223372036854775808");
        assert!(matches!(run("[+ 1]"), Err(RuntimeError::Runtime { .. })));
        assert!(matches!(run("[+ 1 \"a\"]"), Err(RuntimeError::Runtime { .. })));
    }

    #[test]
    fn comparisons_chain_pairwise() {
        assert_eq!(run_ok("[< 1 2 3]"), "1");
        assert_eq!(run_ok("[< 1 3 2]"), "0");
        assert_eq!(run_ok("[== 2 2.0]"), "1");
        assert_eq!(run_ok("[!= 1 2]"), "1");
        assert_eq!(run_ok("[>= 3 3 1]"), "1");
        assert_eq!(run_ok("[<= 4 3]"), "0");
    }

    #[test]
    fn logic_folds_numeric_operands() {
        assert_eq!(run_ok("[and 1 2 3]"), "1");
        assert_eq!(run_ok("[and 1 0]"), "0");
        assert_eq!(run_ok("[and 1 0.5]"), "1");
        assert_eq!(run_ok("[or 0 0 5]"), "1");
        assert_eq!(run_ok("[or 0 -2]"), "0");
        assert!(matches!(run("[and 1 \"x\"]"), Err(RuntimeError::Runtime { .. })));
        assert!(matches!(run("[or [list 1] 1]"), Err(RuntimeError::Runtime { .. })));
        assert_eq!(run_ok("[xor 1 1]"), "0");
        assert_eq!(run_ok("[xor 1 0]"), "1");
        assert_eq!(run_ok("[not 0]"), "1");
        assert_eq!(run_ok("[not \"x\"]"), "0");
    }

    #[test]
    fn bitwise_operators() {
        assert_eq!(run_ok("[bw_and 12 10]"), "8");
        assert_eq!(run_ok("[bw_or 12 10 1]"), "15");
        assert_eq!(run_ok("[bw_xor 12 10]"), "6");
        assert_eq!(run_ok("[bw_lsh 1 4]"), "16");
        assert_eq!(run_ok("[bw_rsh 16 2]"), "4");
        assert_eq!(run_ok("[bw_not 0]"), "-1");
        assert!(matches!(run("[bw_and 1.5 1]"), Err(RuntimeError::Runtime { .. })));
    }

    #[test]
    fn string_comparison() {
        assert_eq!(run_ok("[seq \"abc\" \"abc\"]"), "1");
        assert_eq!(run_ok("[sneq \"abc\" \"abd\"]"), "1");
        assert_eq!(run_ok("[seq 1 \"1\"]"), "1");
    }
}
