//! `luavm` — runs a precompiled Lua 5.3 chunk.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lua_chunk::{disassemble, undump};
use lua_vm::{LuaState, ThreadStatus, VmConfig, LUA_MULTRET};

#[derive(Parser)]
#[command(name = "luavm", about = "Run a Lua 5.3 binary chunk", version)]
struct Cli {
    /// Print a listing of the chunk instead of running it
    #[arg(short, long)]
    list: bool,

    /// Log filter (e.g. `debug`, `lua::vm::exec=trace`); defaults to RUST_LOG
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Maximum nesting of calls before "stack overflow"
    #[arg(long, value_name = "N")]
    max_call_depth: Option<usize>,

    /// Stack size of each coroutine thread, in KiB
    #[arg(long, value_name = "KIB")]
    coroutine_stack_kb: Option<usize>,

    /// Binary chunk produced by `luac`
    chunk: PathBuf,

    /// Arguments passed to the chunk as `...` and in `arg`
    args: Vec<String>,
}

// ── Setup ─────────────────────────────────────────────────────────────────────

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn vm_config(cli: &Cli) -> VmConfig {
    let mut config = VmConfig::default();
    if let Some(depth) = cli.max_call_depth {
        config = config.with_max_call_depth(depth);
    }
    if let Some(kb) = cli.coroutine_stack_kb {
        config = config.with_coroutine_stack_size(kb * 1024);
    }
    config
}

// ── Listing ───────────────────────────────────────────────────────────────────

fn list_chunk(bytes: &[u8], name: &str) {
    let proto = undump(bytes).unwrap_or_else(|e| {
        eprintln!("luavm: {name}: {e}");
        process::exit(1);
    });
    print!("{}", disassemble(&proto));
}

// ── Runner ────────────────────────────────────────────────────────────────────

/// Set global `arg`: the chunk name at 0, the script arguments from 1.
fn set_arg_table(state: &mut LuaState, name: &str, args: &[String]) -> Result<(), lua_vm::LuaError> {
    state.create_table(args.len() as i32, 1);
    state.push_string(name);
    state.raw_set_i(-2, 0)?;
    for (i, a) in args.iter().enumerate() {
        state.push_string(a.as_str());
        state.raw_set_i(-2, i as i64 + 1)?;
    }
    state.set_global("arg")
}

/// Report the error object on top of the stack and exit.
fn fail(state: &mut LuaState) -> ! {
    let msg = state
        .to_string_meta(-1)
        .unwrap_or_else(|_| format!("(error object is a {} value)", state.type_name_at(-1)));
    eprintln!("luavm: {msg}");
    process::exit(1);
}

fn run_chunk(bytes: &[u8], name: &str, args: &[String], config: VmConfig) {
    let mut state = LuaState::with_config(config);
    if let Err(e) = state.open_libs() {
        eprintln!("luavm: cannot open libraries: {e}");
        process::exit(1);
    }
    if let Err(e) = set_arg_table(&mut state, name, args) {
        eprintln!("luavm: {e}");
        process::exit(1);
    }

    if state.load(bytes, name, "b") != ThreadStatus::Ok {
        fail(&mut state);
    }
    for a in args {
        state.push_string(a.as_str());
    }
    if state.pcall(args.len() as i32, LUA_MULTRET, 0) != ThreadStatus::Ok {
        fail(&mut state);
    }
    tracing::debug!(target: "lua::vm", results = state.get_top(), "chunk finished");
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let name = cli.chunk.display().to_string();
    let bytes = std::fs::read(&cli.chunk).unwrap_or_else(|e| {
        eprintln!("luavm: cannot read '{name}': {e}");
        process::exit(1);
    });

    if cli.list {
        list_chunk(&bytes, &name);
        return;
    }
    let config = vm_config(&cli);
    run_chunk(&bytes, &name, &cli.args, config);
}
