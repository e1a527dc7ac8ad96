//! Browser `setTimeout` adapter.
//!
//! Off wasm32 there is no host event loop, so scheduling reports failure and callers keep
//! driving their own timers.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{closure::Closure, JsCast};

/// Returns `true` when the host can run timer callbacks.
pub fn host_timers_available() -> bool {
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::window().is_some()
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        false
    }
}

/// Runs `callback` once after `delay_ms` on the browser event loop.
///
/// Returns `false` when no timer was armed; `callback` is then dropped without running.
pub fn set_host_timeout(delay_ms: u64, callback: impl FnOnce() + 'static) -> bool {
    #[cfg(target_arch = "wasm32")]
    {
        let Some(window) = web_sys::window() else {
            return false;
        };
        let callback = Closure::once_into_js(callback);
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
            .is_ok()
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (delay_ms, callback);
        false
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    #[test]
    fn native_fallback_never_arms_a_timer() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        assert!(!host_timers_available());
        assert!(!set_host_timeout(0, move || flag.set(true)));
        assert!(!ran.get());
    }
}
