//! Browser timing and memory sources.

use js_sys::Reflect;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Performance;

use visinfer_core::benchmark::{Clock, MemoryProbe};

fn global_performance() -> Option<Performance> {
    Reflect::get(&js_sys::global(), &JsValue::from_str("performance"))
        .ok()?
        .dyn_into::<Performance>()
        .ok()
}

/// `performance.now()`, falling back to `Date.now()` where the Performance
/// API is missing.
pub struct PerformanceClock {
    performance: Option<Performance>,
}

impl PerformanceClock {
    pub fn new() -> Self {
        Self {
            performance: global_performance(),
        }
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        match &self.performance {
            Some(performance) => performance.now(),
            None => js_sys::Date::now(),
        }
    }
}

/// `performance.memory.usedJSHeapSize`.
///
/// Only Chromium exposes this; other engines report the metric as unavailable.
pub struct HeapMemoryProbe {
    performance: Option<Performance>,
}

impl HeapMemoryProbe {
    pub fn new() -> Self {
        Self {
            performance: global_performance(),
        }
    }
}

impl Default for HeapMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for HeapMemoryProbe {
    fn used_bytes(&self) -> Option<u64> {
        let performance = self.performance.as_ref()?;
        let memory = Reflect::get(performance, &JsValue::from_str("memory")).ok()?;
        if memory.is_undefined() || memory.is_null() {
            return None;
        }
        let used = Reflect::get(&memory, &JsValue::from_str("usedJSHeapSize"))
            .ok()?
            .as_f64()?;
        Some(used as u64)
    }
}
