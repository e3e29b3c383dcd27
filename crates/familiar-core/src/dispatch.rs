//! Failure boundary around user-supplied hook functions.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use familiar_api::CompanionId;
use tracing::warn;

use crate::error::HookError;

/// Runs hook calls so that an error or a panic is logged and swallowed.
///
/// Each companion owns one dispatcher; the failure count is per companion.
#[derive(Debug, Default)]
pub struct HookDispatcher {
    failures: u64,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` inside the boundary. Returns `None` if it failed.
    pub fn invoke<R>(
        &mut self,
        hook: &str,
        behavior: &str,
        companion: CompanionId,
        call: impl FnOnce() -> Result<R, HookError>,
    ) -> Option<R> {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(result) => result,
            Err(payload) => Err(HookError::Panic(panic_message(payload.as_ref()))),
        };
        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                self.failures += 1;
                warn!("Hook error in {hook} for behavior {behavior} ({companion}): {e}");
                None
            }
        }
    }

    /// Failed invocations so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_passes_value_through() {
        let mut dispatcher = HookDispatcher::new();
        let value = dispatcher.invoke("onTick", "wisp", CompanionId(1), || Ok(5));
        assert_eq!(value, Some(5));
        assert_eq!(dispatcher.failures(), 0);
    }

    #[test]
    fn error_is_swallowed_and_counted() {
        let mut dispatcher = HookDispatcher::new();
        let value: Option<()> = dispatcher.invoke("onTick", "wisp", CompanionId(1), || {
            Err(HookError::Script("attempt to index a nil value".into()))
        });
        assert!(value.is_none());
        assert_eq!(dispatcher.failures(), 1);
    }

    #[test]
    fn panic_is_contained() {
        let mut dispatcher = HookDispatcher::new();
        let value: Option<()> =
            dispatcher.invoke("onAttack", "wisp", CompanionId(2), || panic!("boom"));
        assert!(value.is_none());
        // Still usable afterwards.
        assert_eq!(
            dispatcher.invoke("onAttack", "wisp", CompanionId(2), || Ok("ok")),
            Some("ok")
        );
        assert_eq!(dispatcher.failures(), 1);
    }

    #[test]
    fn panic_message_extraction() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
