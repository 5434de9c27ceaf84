//! Coroutines: one worker thread per started coroutine, with control handed
//! back and forth over rendezvous channels so that only one thread of a VM
//! ever runs at a time.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::LuaError;
use crate::state::{LuaState, ThreadStatus, LUA_MULTRET};
use crate::value::LuaValue;

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    /// Created or yielded; can be resumed.
    Suspended,
    Running,
    /// Resumed another coroutine and waits for it.
    Normal,
    /// Finished or failed.
    Dead,
}

impl CoroutineStatus {
    /// The name reported by `coroutine.status`.
    pub fn name(self) -> &'static str {
        match self {
            CoroutineStatus::Suspended => "suspended",
            CoroutineStatus::Running => "running",
            CoroutineStatus::Normal => "normal",
            CoroutineStatus::Dead => "dead",
        }
    }
}

/// What a coroutine hands back to its resumer.
pub(crate) enum Transfer {
    Yielded(Vec<LuaValue>),
    Returned(Vec<LuaValue>),
    Failed(LuaValue),
}

/// The coroutine side of the handoff channels.
pub(crate) struct CoroutineLink {
    resume_rx: Receiver<Vec<LuaValue>>,
    transfer_tx: Sender<Transfer>,
}

enum CoroutineBody {
    /// The main thread; driven by the host, never resumed.
    Main,
    /// Created but never resumed: the state holds the body function.
    Fresh(Box<LuaState>),
    /// A worker thread is running or parked in `yield`.
    Started {
        resume_tx: Sender<Vec<LuaValue>>,
        transfer_rx: Receiver<Transfer>,
    },
    Finished,
}

/// How `resume` passes control to a suspended coroutine.
enum Handoff {
    Start(LuaState, CoroutineLink, Receiver<Transfer>),
    Continue(Sender<Vec<LuaValue>>, Receiver<Transfer>),
}

// ── Coroutine handle ──────────────────────────────────────────────────────────

/// A coroutine handle, shared by every value that refers to it.
pub struct Coroutine {
    id: u64,
    status: Mutex<CoroutineStatus>,
    body: Mutex<CoroutineBody>,
}

impl Coroutine {
    pub(crate) fn main() -> Self {
        Self {
            id: 0,
            status: Mutex::new(CoroutineStatus::Running),
            body: Mutex::new(CoroutineBody::Main),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_main(&self) -> bool {
        matches!(*self.body.lock(), CoroutineBody::Main)
    }

    pub fn status(&self) -> CoroutineStatus {
        *self.status.lock()
    }

    fn set_status(&self, status: CoroutineStatus) {
        *self.status.lock() = status;
    }

    fn finish(&self) {
        *self.body.lock() = CoroutineBody::Finished;
        self.set_status(CoroutineStatus::Dead);
        debug!(target: "lua::coroutine", id = self.id, "finished");
    }
}

impl std::fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Coroutine({}, {})", self.id, self.status().name())
    }
}

// ── Scheduling ────────────────────────────────────────────────────────────────

impl LuaState {
    /// Pop a function and push a new suspended coroutine that will run it.
    pub fn new_coroutine(&mut self) -> Result<Arc<Coroutine>, LuaError> {
        let body = self.pop_value()?;
        let global = self.global.clone();
        let id = global.next_coroutine_id();
        let co = Arc::new_cyclic(|handle| {
            let mut state = LuaState::for_coroutine(global, handle.clone());
            state.push(body);
            Coroutine {
                id,
                status: Mutex::new(CoroutineStatus::Suspended),
                body: Mutex::new(CoroutineBody::Fresh(Box::new(state))),
            }
        });
        debug!(target: "lua::coroutine", id, "created");
        self.push(LuaValue::Coroutine(co.clone()));
        Ok(co)
    }

    /// Pop `n_args` values and resume `co` with them, blocking until it
    /// yields, returns or fails. Yielded or returned values are pushed with
    /// `Yield`/`Ok`; a failure pushes the error object with `ErrRun` and
    /// leaves `co` dead.
    ///
    /// Resuming a coroutine that is not suspended is an error and leaves the
    /// stack untouched.
    pub fn resume(&mut self, co: &Arc<Coroutine>, n_args: i32) -> Result<ThreadStatus, LuaError> {
        match co.status() {
            CoroutineStatus::Suspended => {}
            CoroutineStatus::Dead => {
                return Err(LuaError::Coroutine("cannot resume dead coroutine".into()))
            }
            _ => return Err(LuaError::Coroutine("cannot resume non-suspended coroutine".into())),
        }
        let args = self.pop_values(n_args)?;
        let stack_size = self.global.config.coroutine_stack_size;

        let plan = {
            let mut body = co.body.lock();
            match std::mem::replace(&mut *body, CoroutineBody::Finished) {
                CoroutineBody::Fresh(state) => {
                    let (resume_tx, resume_rx) = bounded(0);
                    let (transfer_tx, transfer_rx) = bounded(0);
                    *body = CoroutineBody::Started {
                        resume_tx,
                        transfer_rx: transfer_rx.clone(),
                    };
                    Handoff::Start(*state, CoroutineLink { resume_rx, transfer_tx }, transfer_rx)
                }
                CoroutineBody::Started {
                    resume_tx,
                    transfer_rx,
                } => {
                    *body = CoroutineBody::Started {
                        resume_tx: resume_tx.clone(),
                        transfer_rx: transfer_rx.clone(),
                    };
                    Handoff::Continue(resume_tx, transfer_rx)
                }
                other => {
                    *body = other;
                    return Err(LuaError::Coroutine("cannot resume non-suspended coroutine".into()));
                }
            }
        };

        co.set_status(CoroutineStatus::Running);
        self.enter_normal();
        let handed_off = match plan {
            Handoff::Start(state, link, transfer_rx) => {
                debug!(target: "lua::coroutine", id = co.id, "start");
                spawn_worker(state, link, args, co.id, stack_size).map(|()| transfer_rx)
            }
            Handoff::Continue(resume_tx, transfer_rx) => {
                debug!(target: "lua::coroutine", id = co.id, "resume");
                resume_tx
                    .send(args)
                    .map(|()| transfer_rx)
                    .map_err(|_| LuaError::Coroutine("cannot resume dead coroutine".into()))
            }
        };
        let transfer_rx = match handed_off {
            Ok(rx) => rx,
            Err(err) => {
                self.leave_normal();
                co.finish();
                return Err(err);
            }
        };

        let transfer = transfer_rx.recv();
        self.leave_normal();
        match transfer {
            Ok(Transfer::Yielded(vals)) => {
                co.set_status(CoroutineStatus::Suspended);
                debug!(target: "lua::coroutine", id = co.id, count = vals.len(), "yielded");
                self.push_values(vals);
                Ok(ThreadStatus::Yield)
            }
            Ok(Transfer::Returned(vals)) => {
                co.finish();
                self.push_values(vals);
                Ok(ThreadStatus::Ok)
            }
            Ok(Transfer::Failed(err)) => {
                co.finish();
                self.push(err);
                Ok(ThreadStatus::ErrRun)
            }
            Err(_) => {
                co.finish();
                self.push_string("coroutine terminated unexpectedly");
                Ok(ThreadStatus::ErrRun)
            }
        }
    }

    /// Hand the top `n_results` values to the resumer and block until
    /// resumed again. Returns the number of resume arguments, which replace
    /// the yielded values on the stack.
    pub fn yield_values(&mut self, n_results: i32) -> Result<i32, LuaError> {
        let Some(link) = self.link.as_ref() else {
            return Err(LuaError::Coroutine(
                "attempt to yield from outside a coroutine".into(),
            ));
        };
        let transfer_tx = link.transfer_tx.clone();
        let resume_rx = link.resume_rx.clone();
        let vals = self.pop_values(n_results)?;

        if transfer_tx.send(Transfer::Yielded(vals)).is_err() {
            abandon();
        }
        let Ok(args) = resume_rx.recv() else {
            abandon();
        };
        let n = args.len() as i32;
        self.push_values(args);
        Ok(n)
    }

    /// Status of `co` as seen from this thread.
    pub fn status(&self, co: &Coroutine) -> CoroutineStatus {
        co.status()
    }

    /// Whether the running code may yield: true inside any coroutine other
    /// than the main thread.
    pub fn is_yieldable(&self) -> bool {
        self.link.is_some()
    }

    fn enter_normal(&self) {
        if let Some(me) = self.handle.upgrade() {
            me.set_status(CoroutineStatus::Normal);
        }
    }

    fn leave_normal(&self) {
        if let Some(me) = self.handle.upgrade() {
            me.set_status(CoroutineStatus::Running);
        }
    }
}

fn spawn_worker(
    mut state: LuaState,
    link: CoroutineLink,
    args: Vec<LuaValue>,
    id: u64,
    stack_size: usize,
) -> Result<(), LuaError> {
    state.link = Some(link);
    thread::Builder::new()
        .name(format!("lua-coroutine-{id}"))
        .stack_size(stack_size)
        .spawn(move || run_worker(state, args))
        .map(drop)
        .map_err(|err| LuaError::Coroutine(format!("cannot start coroutine: {err}")))
}

/// Unwind payload of a worker whose coroutine handle was dropped while it
/// was suspended.
struct Abandoned;

/// Unwind the worker thread without running any more Lua code. Protected
/// calls only catch `LuaError`s, so nothing between here and `run_worker`
/// can resume execution.
fn abandon() -> ! {
    panic::resume_unwind(Box::new(Abandoned))
}

/// Body of a coroutine worker: call the function with the first resume's
/// arguments and report how it ended.
fn run_worker(mut state: LuaState, args: Vec<LuaValue>) {
    let id = state.handle.upgrade().map_or(0, |co| co.id);
    let ran = panic::catch_unwind(AssertUnwindSafe(|| {
        let transfer = run_body(&mut state, args);
        if let Some(link) = state.link.take() {
            // The resumer is gone only if the whole VM was dropped.
            let _ = link.transfer_tx.send(transfer);
        }
    }));
    match ran {
        Ok(()) => {}
        Err(payload) if payload.is::<Abandoned>() => {
            debug!(target: "lua::coroutine", id, "abandoned while suspended");
        }
        Err(payload) => panic::resume_unwind(payload),
    }
}

fn run_body(state: &mut LuaState, args: Vec<LuaValue>) -> Transfer {
    let n_args = args.len() as i32;
    state.push_values(args);
    match state.call(n_args, LUA_MULTRET) {
        Ok(()) => {
            let top = state.get_top();
            match state.pop_values(top) {
                Ok(vals) => Transfer::Returned(vals),
                Err(err) => Transfer::Failed(err.into_value()),
            }
        }
        Err(err) => Transfer::Failed(err.into_value()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    use super::*;

    fn yield_twice(state: &mut LuaState) -> Result<i32, LuaError> {
        state.push_integer(1);
        state.yield_values(1)?;
        state.push_integer(2);
        let n = state.yield_values(1)?;
        // return the arguments of the last resume
        Ok(n)
    }

    fn fail(state: &mut LuaState) -> Result<i32, LuaError> {
        state.push_string("inner failure");
        Err(state.error())
    }

    fn report_status(state: &mut LuaState) -> Result<i32, LuaError> {
        let running = state.push_coroutine();
        let co = state.to_coroutine(-1);
        state.pop(1)?;
        state.push_boolean(running);
        state.push_string(co.map_or("none", |c| c.status().name()));
        state.push_boolean(state.is_yieldable());
        Ok(3)
    }

    fn create(state: &mut LuaState, f: crate::HostFunction) -> Arc<Coroutine> {
        state.push_host_function(f);
        let co = state.new_coroutine().unwrap();
        state.pop(1).unwrap();
        co
    }

    #[test]
    fn resume_and_yield_round_trip() {
        let mut state = LuaState::new();
        let co = create(&mut state, yield_twice);
        assert_eq!(co.status(), CoroutineStatus::Suspended);

        assert_eq!(state.resume(&co, 0), Ok(ThreadStatus::Yield));
        assert_eq!(state.pop_value().unwrap(), LuaValue::Integer(1));
        assert_eq!(co.status(), CoroutineStatus::Suspended);

        assert_eq!(state.resume(&co, 0), Ok(ThreadStatus::Yield));
        assert_eq!(state.pop_value().unwrap(), LuaValue::Integer(2));

        state.push_string("a");
        state.push_string("b");
        assert_eq!(state.resume(&co, 2), Ok(ThreadStatus::Ok));
        assert_eq!(state.get_top(), 2);
        assert_eq!(state.to_string(1), "a");
        assert_eq!(co.status(), CoroutineStatus::Dead);

        state.set_top(0).unwrap();
        assert_eq!(
            state.resume(&co, 0),
            Err(LuaError::Coroutine("cannot resume dead coroutine".into()))
        );
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn errors_kill_only_the_coroutine() {
        let mut state = LuaState::new();
        let co = create(&mut state, fail);
        assert_eq!(state.resume(&co, 0), Ok(ThreadStatus::ErrRun));
        assert_eq!(state.to_string(-1), "inner failure");
        assert_eq!(co.status(), CoroutineStatus::Dead);
        assert_eq!(state.call_depth(), 1);
    }

    #[test]
    fn statuses_seen_from_inside() {
        let mut state = LuaState::new();
        let co = create(&mut state, report_status);
        assert_eq!(state.resume(&co, 0), Ok(ThreadStatus::Ok));
        assert!(!state.to_boolean(1));
        assert_eq!(state.to_string(2), "running");
        assert!(state.to_boolean(3));
    }

    #[test]
    fn main_thread_cannot_yield() {
        let mut state = LuaState::new();
        assert!(!state.is_yieldable());
        assert!(matches!(state.yield_values(0), Err(LuaError::Coroutine(_))));
    }

    static UNWOUND: AtomicBool = AtomicBool::new(false);

    struct FlagOnDrop;

    impl Drop for FlagOnDrop {
        fn drop(&mut self) {
            UNWOUND.store(true, Ordering::SeqCst);
        }
    }

    /// Ignores a failed yield and keeps going if it can.
    fn ignore_yield_failure(state: &mut LuaState) -> Result<i32, LuaError> {
        let _flag = FlagOnDrop;
        let _ = state.yield_values(0);
        state.push_string("ran after its handle was dropped");
        state.set_global("after_abandon")?;
        Ok(0)
    }

    #[test]
    fn dropped_coroutine_never_runs_again() {
        let mut state = LuaState::new();
        let co = create(&mut state, ignore_yield_failure);
        assert_eq!(state.resume(&co, 0), Ok(ThreadStatus::Yield));
        drop(co);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !UNWOUND.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(UNWOUND.load(Ordering::SeqCst));
        state.get_global("after_abandon").unwrap();
        assert!(state.is_nil(-1));
    }

    #[test]
    fn resumer_is_normal_while_waiting() {
        fn check_main(state: &mut LuaState) -> Result<i32, LuaError> {
            let main = state
                .registry()
                .read()
                .get_int(crate::state::LUA_RIDX_MAINTHREAD);
            let LuaValue::Coroutine(main) = main else {
                return Err(state.error_message("no main thread"));
            };
            state.push_string(main.status().name());
            Ok(1)
        }
        let mut state = LuaState::new();
        let co = create(&mut state, check_main);
        assert_eq!(state.resume(&co, 0), Ok(ThreadStatus::Ok));
        assert_eq!(state.to_string(-1), "normal");
    }
}
