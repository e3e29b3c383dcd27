//! Lua 5.4 script boundary for familiar behaviors.
//!
//! Each definition document runs once in its own sandboxed VM. While it runs,
//! the DSL globals (`pet`, `particle_sequence`, `raycast_animation`,
//! `area_effect`) collect definitions into a registrar stored in the VM's app
//! data. Script functions found in those definitions are wrapped as behavior
//! hooks that keep the VM alive for as long as the definition is published.

mod dsl;
mod hooks;
mod source;

#[cfg(test)]
mod testing;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use familiar_api::DefinitionDocument;
use familiar_core::{DefinitionError, DocumentParser, ParsedDocument};
use mlua::prelude::*;
use mlua::{HookTriggers, VmState};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

pub use source::{ScriptDirectory, DEFAULT_SCRIPT, DEFAULT_SCRIPT_NAME};

/// Resource limits applied to every document VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Lua heap limit in megabytes.
    pub memory_mb: usize,
    /// Instructions one document load or one hook call may execute.
    pub instruction_limit: u32,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            memory_mb: 16,
            instruction_limit: 1_000_000,
        }
    }
}

/// Instructions between two budget checks.
const BUDGET_CHECK_INTERVAL: u32 = 1_000;

/// Instructions spent by the current document load or hook call.
struct InstructionBudget {
    limit: u32,
    used: AtomicU64,
    exhausted: AtomicBool,
}

/// Name of the document a VM was created for, used to prefix script logs.
struct ScriptOrigin(String);

// ─── Parser ──────────────────────────────────────────────────────────────────

/// [`DocumentParser`] for Lua definition scripts.
#[derive(Debug, Clone, Default)]
pub struct LuaDocumentParser {
    limits: ScriptLimits,
}

impl LuaDocumentParser {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ScriptLimits {
        self.limits
    }
}

impl DocumentParser for LuaDocumentParser {
    fn parse(&self, document: &DefinitionDocument) -> Result<ParsedDocument, DefinitionError> {
        let lua = new_vm(&document.name, self.limits)
            .map_err(|e| DefinitionError::Script(format!("{}: {e}", document.name)))?;

        lua.set_app_data(dsl::Registrar::new(&document.name));
        reset_instruction_budget(&lua);
        let result = lua
            .load(document.contents.as_str())
            .set_name(document.name.as_str())
            .exec();
        let registrar = lua.remove_app_data::<dsl::Registrar>();

        if let Err(e) = result {
            return Err(DefinitionError::Script(e.to_string()));
        }

        let parsed = registrar.map(|r| r.parsed).unwrap_or_default();
        debug!(
            "Evaluated {}: {} behaviors, {} animations",
            document.name,
            parsed.behaviors.len(),
            parsed.animations.len()
        );
        Ok(parsed)
    }
}

// ─── Sandbox & API setup ─────────────────────────────────────────────────────

fn new_vm(document: &str, limits: ScriptLimits) -> LuaResult<Lua> {
    let lua = Lua::new();
    setup_sandbox(&lua, limits.memory_mb)?;
    install_instruction_budget(&lua, limits.instruction_limit);
    lua.set_app_data(ScriptOrigin(document.to_string()));
    setup_log_api(&lua)?;
    dsl::setup_definition_api(&lua)?;
    hooks::setup_ctx_api(&lua)?;
    Ok(lua)
}

/// Strip host access from the globals and cap the heap.
fn setup_sandbox(lua: &Lua, memory_mb: usize) -> LuaResult<()> {
    let globals = lua.globals();
    globals.set("os", LuaValue::Nil)?;
    globals.set("io", LuaValue::Nil)?;
    globals.set("debug", LuaValue::Nil)?;
    globals.set("loadfile", LuaValue::Nil)?;
    globals.set("dofile", LuaValue::Nil)?;
    // The instruction budget hook only watches the main thread.
    globals.set("coroutine", LuaValue::Nil)?;

    lua.set_memory_limit(memory_mb * 1024 * 1024)?;
    Ok(())
}

/// Abort the running chunk once it spends more than `limit` instructions.
fn install_instruction_budget(lua: &Lua, limit: u32) {
    lua.set_app_data(InstructionBudget {
        limit,
        used: AtomicU64::new(0),
        exhausted: AtomicBool::new(false),
    });
    arm_budget_hook(lua, limit);
}

fn arm_budget_hook(lua: &Lua, limit: u32) {
    let interval = BUDGET_CHECK_INTERVAL.min(limit.max(1));
    lua.set_hook(HookTriggers::new().every_nth_instruction(interval), move |lua, _debug| {
        let spent = match lua.app_data_ref::<InstructionBudget>() {
            Some(budget) => {
                let used = budget.used.fetch_add(u64::from(interval), Ordering::Relaxed) + u64::from(interval);
                used > u64::from(budget.limit) && !budget.exhausted.swap(true, Ordering::Relaxed)
            }
            None => false,
        };
        if spent {
            // Fail every instruction until the next reset so `pcall` cannot swallow the error.
            lua.set_hook(HookTriggers::new().every_nth_instruction(1), move |_, _| {
                Err(budget_error(limit))
            });
            return Err(budget_error(limit));
        }
        Ok(VmState::Continue)
    });
}

fn budget_error(limit: u32) -> LuaError {
    LuaError::runtime(format!("instruction limit of {limit} exceeded"))
}

/// Give the next document load or hook call a full instruction budget.
pub(crate) fn reset_instruction_budget(lua: &Lua) {
    let rearm = match lua.app_data_ref::<InstructionBudget>() {
        Some(budget) => {
            budget.used.store(0, Ordering::Relaxed);
            budget
                .exhausted
                .swap(false, Ordering::Relaxed)
                .then_some(budget.limit)
        }
        None => None,
    };
    if let Some(limit) = rearm {
        arm_budget_hook(lua, limit);
    }
}

#[derive(Clone, Copy)]
enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

/// `log(msg)`, `log_warn(msg)`, `log_error(msg)`, `log_debug(msg)`.
fn setup_log_api(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    for (name, level) in [
        ("log", LogLevel::Info),
        ("log_warn", LogLevel::Warn),
        ("log_error", LogLevel::Error),
        ("log_debug", LogLevel::Debug),
    ] {
        let function = lua.create_function(move |lua, msg: String| {
            let origin = lua
                .app_data_ref::<ScriptOrigin>()
                .map(|o| o.0.clone())
                .unwrap_or_default();
            match level {
                LogLevel::Info => info!("[{origin}] {msg}"),
                LogLevel::Warn => warn!("[{origin}] {msg}"),
                LogLevel::Error => error!("[{origin}] {msg}"),
                LogLevel::Debug => debug!("[{origin}] {msg}"),
            }
            Ok(())
        })?;
        globals.set(name, function)?;
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
