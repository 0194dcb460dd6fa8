//! Concurrency handles exposed to scripts as variant cells. Each handle owns
//! its shared state behind a lock; methods are native procedures in the
//! variant's member table, reached with dotted names such as `[c.put 1]`.

use crate::runtime::{
    builtins::Call,
    cell::{Cell, CellRef, Procedure, VariantKind},
    environment::{Env, Environment},
    error::RuntimeResult,
    interpreter::{eval_args, value, Flow, Interpreter},
};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Evaluate a task body on a worker. A task has nowhere to report an error,
/// so an unrecovered one ends the process.
fn run_task(worker: &Interpreter, expr: &CellRef, env: &Env) -> CellRef {
    match worker.evaluate(expr, env) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(kind = err.category(), location = ?err.location(), "{err}");
            std::process::exit(1);
        }
    }
}

fn method<F>(members: &Env, name: &str, func: F)
where
    F: Fn(&Interpreter, Call<'_>, &Env) -> RuntimeResult<Flow> + Send + Sync + 'static,
{
    members.set(name, Cell::procedure(Procedure::new(name, func)));
}

#[derive(Default)]
struct Completion {
    result: Mutex<Option<CellRef>>,
    ready: Condvar,
}

impl Completion {
    fn complete(&self, value: CellRef) {
        *self.result.lock() = Some(value);
        self.ready.notify_all();
    }

    fn wait(&self) -> CellRef {
        let mut guard = self.result.lock();
        loop {
            if let Some(value) = guard.as_ref() {
                return Arc::clone(value);
            }
            self.ready.wait(&mut guard);
        }
    }
}

/// `[async expr]`
pub fn spawn_async(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let completion = Arc::new(Completion::default());
    let expr = Arc::clone(&call.args[0]);
    let worker = interp.clone();
    let scope = Environment::child(env);
    let shared = Arc::clone(&completion);
    thread::Builder::new()
        .name("sauros-async".into())
        .spawn(move || shared.complete(run_task(&worker, &expr, &scope)))
        .map_err(|err| call.error(format!("failed to start async task: {err}")))?;
    tracing::debug!("async task spawned");

    let members = Environment::new();
    let waiter = Arc::clone(&completion);
    method(&members, "wait", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        waiter.wait();
        Ok(Flow::Value(Cell::truth()))
    });
    method(&members, "get", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        Ok(Flow::Value(completion.wait()))
    });
    Ok(Flow::Value(Cell::variant(VariantKind::Async, members)))
}

struct ThreadState {
    handle: Mutex<Option<JoinHandle<()>>>,
    id: String,
}

/// `[thread expr]`
pub fn spawn_thread(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(1)?;
    let expr = Arc::clone(&call.args[0]);
    let worker = interp.clone();
    let scope = Environment::child(env);
    let handle = thread::Builder::new()
        .name("sauros-thread".into())
        .spawn(move || {
            run_task(&worker, &expr, &scope);
        })
        .map_err(|err| call.error(format!("failed to start thread: {err}")))?;
    let id = format!("{:?}", handle.thread().id());
    tracing::debug!(thread = %id, "thread spawned");
    let state = Arc::new(ThreadState {
        handle: Mutex::new(Some(handle)),
        id,
    });

    let members = Environment::new();
    let joiner = Arc::clone(&state);
    method(&members, "join", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        let handle = joiner.handle.lock().take();
        let Some(handle) = handle else {
            return Err(call.error("thread is not joinable"));
        };
        handle
            .join()
            .map_err(|_| call.error(format!("thread {} panicked", joiner.id)))?;
        tracing::debug!(thread = %joiner.id, "thread joined");
        Ok(Flow::Value(Cell::truth()))
    });
    let detacher = Arc::clone(&state);
    method(&members, "detach", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        if detacher.handle.lock().take().is_none() {
            return Err(call.error("thread is not joinable"));
        }
        tracing::debug!(thread = %detacher.id, "thread detached");
        Ok(Flow::Value(Cell::truth()))
    });
    let probe = Arc::clone(&state);
    method(&members, "is_joinable", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        Ok(Flow::Value(Cell::from_bool(probe.handle.lock().is_some())))
    });
    method(&members, "get_id", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        Ok(Flow::Value(Cell::string(state.id.clone())))
    });
    Ok(Flow::Value(Cell::variant(VariantKind::Thread, members)))
}

#[derive(Default)]
struct ChannelState {
    queue: Mutex<VecDeque<CellRef>>,
    ready: Condvar,
}

/// `[chan]`
pub fn channel(_interp: &Interpreter, call: Call<'_>, _env: &Env) -> RuntimeResult<Flow> {
    call.expect_exactly(0)?;
    let state = Arc::new(ChannelState::default());
    let members = Environment::new();

    let sender = Arc::clone(&state);
    method(&members, "put", move |interp, call, env| {
        if call.is_empty() {
            return Ok(Flow::Value(Cell::falsity()));
        }
        let values = eval_args!(interp, call.args, env);
        sender
            .queue
            .lock()
            .extend(values.iter().map(Cell::bind_copy));
        sender.ready.notify_all();
        Ok(Flow::Value(Cell::truth()))
    });
    let receiver = Arc::clone(&state);
    method(&members, "get", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        let mut queue = receiver.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                return Ok(Flow::Value(value));
            }
            receiver.ready.wait(&mut queue);
        }
    });
    let probe = Arc::clone(&state);
    method(&members, "has_data", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        Ok(Flow::Value(Cell::from_bool(!probe.queue.lock().is_empty())))
    });
    method(&members, "drain", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        let drained: Vec<CellRef> = state.queue.lock().drain(..).collect();
        Ok(Flow::Value(Cell::list(drained)))
    });
    Ok(Flow::Value(Cell::variant(VariantKind::Channel, members)))
}

/// `[ref]` or `[ref initial]`
pub fn reference(interp: &Interpreter, call: Call<'_>, env: &Env) -> RuntimeResult<Flow> {
    call.expect_range(0, 1)?;
    let initial = match call.args.first() {
        Some(expr) => Some(Cell::bind_copy(&value!(interp.eval(expr, env)))),
        None => None,
    };
    let slot = Arc::new(Mutex::new(initial));
    let members = Environment::new();

    let writer = Arc::clone(&slot);
    method(&members, "put", move |interp, call, env| {
        call.expect_exactly(1)?;
        let value = Cell::bind_copy(&value!(interp.eval(&call.args[0], env)));
        *writer.lock() = Some(Arc::clone(&value));
        Ok(Flow::Value(value))
    });
    method(&members, "get", move |_interp, call, _env| {
        call.expect_exactly(0)?;
        let current = slot.lock().clone();
        Ok(Flow::Value(current.unwrap_or_else(Cell::nil)))
    });
    Ok(Flow::Value(Cell::variant(VariantKind::Ref, members)))
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
    fn async_results_are_awaited() {
        assert_eq!(run_ok("[var t [async [+ 1 2]]]\n[t.wait]\n[t.get]"), "3");
        assert_eq!(run_ok("[var t [async [+ 1 2]]]\n[+ [t.get] [t.get]]"), "6");
    }

    #[test]
    fn async_tasks_see_the_spawning_scope() {
        assert_eq!(
            run_ok("[var base 40]\n[var t [async [+ base 2]]]\n[t.get]"),
            "42"
        );
    }

    #[test]
    fn task_bindings_stay_in_the_task_scope() {
        let err = run("[var t [thread [var local 7]]]\n[t.join]\n[block local]").unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownIdentifier { ref name, .. } if name == "local"));
        let err = run("[var a [async [var local 8]]]\n[a.wait]\n[block local]").unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownIdentifier { ref name, .. } if name == "local"));
        assert_eq!(
            run_ok("[var shared 1]\n[var t [thread [set shared 5]]]\n[t.join]\n[block shared]"),
            "5"
        );
    }

    #[test]
    fn channel_is_fifo() {
        let source = "\
[var c [chan]]
[c.put 1 2]
[c.put 3]
[var first [c.get]]
[list first [c.has_data] [c.drain] [c.has_data]]";
        assert_eq!(run_ok(source), "[1 1 [2 3] 0]");
        assert_eq!(run_ok("[var c [chan]]\n[c.put]"), "0");
    }

    #[test]
    fn channel_get_blocks_until_a_producer_puts() {
        let source = "\
[var c [chan]]
[var producer [thread [loop [var i 0] [< i 3] [set i [+ i 1]] [c.put i]]]]
[var total 0]
[loop [var n 0] [< n 3] [set n [+ n 1]] [set total [+ total [c.get]]]]
[producer.join]
[block total]";
        assert_eq!(run_ok(source), "3");
    }

    #[test]
    fn thread_join_and_detach() {
        assert_eq!(run_ok("[var t [thread [+ 1 1]]]\n[t.is_joinable]"), "1");
        assert_eq!(run_ok("[var t [thread [+ 1 1]]]\n[t.join]\n[t.is_joinable]"), "0");
        assert!(matches!(
            run("[var t [thread [+ 1 1]]]\n[t.join]\n[t.join]"),
            Err(RuntimeError::Runtime { .. })
        ));
        assert_eq!(run_ok("[var t [thread [+ 1 1]]]\n[t.detach]\n[t.is_joinable]"), "0");
        assert_eq!(run_ok("[var t [thread [+ 1 1]]]\n[type [t.get_id]]"), "string");
    }

    #[test]
    fn ref_holds_one_value() {
        assert_eq!(run_ok("[var r [ref]]\n[r.get]"), "#nil");
        assert_eq!(run_ok("[var r [ref 5]]\n[r.get]"), "5");
        assert_eq!(run_ok("[var r [ref]]\n[r.put \"x\"]\n[r.get]"), "x");
    }

    #[test]
    fn ref_is_shared_with_threads() {
        let source = "\
[var r [ref 0]]
[var t [thread [r.put 9]]]
[t.join]
[r.get]";
        assert_eq!(run_ok(source), "9");
    }
}
