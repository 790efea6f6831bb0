//! State Aggregator - Composite state flags for the view context.
//!
//! Four independent signal sources feed the flags:
//! - ledger crossings: `valid` (blocking counter) and `errors` (error counter)
//! - the `parsedRules` prop: `required` and `rules`
//! - hidden `state` messages: `blurred`, `dirty`, `submitted`, `failing`, ...
//! - node events: `settled`, and `empty` on every commit
//!
//! Each setter is idempotent; there is no shared lock between sources.
//! Derived flags (`complete`, `invalid`, `passing`) are plain reads over the
//! signals, so they re-derive when read.

use indexmap::IndexMap;
use serde::Serialize;
use spark_signals::{signal, Signal};

use crate::types::Value;

use super::fns::empty;

/// Snapshot of every state flag, as read by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub blurred: bool,
    pub complete: bool,
    pub dirty: bool,
    pub empty: bool,
    pub submitted: bool,
    pub settled: bool,
    pub valid: bool,
    pub invalid: bool,
    pub errors: bool,
    pub rules: bool,
    pub validation_visible: bool,
    pub required: bool,
    pub failing: bool,
    pub passing: bool,
}

/// Reactive state cells.
#[derive(Clone)]
pub struct StateAggregator {
    valid: Signal<bool>,
    errors: Signal<bool>,
    required: Signal<bool>,
    rules: Signal<bool>,
    settled: Signal<bool>,
    empty: Signal<bool>,
    flags: Signal<IndexMap<String, bool>>,
}

impl StateAggregator {
    /// Seed from current node state.
    pub fn new(blocking: usize, errors: usize, parsed_rules: Option<&Value>, settled: bool, value: &Value) -> Self {
        let aggregator = Self {
            valid: signal(blocking == 0),
            errors: signal(errors > 0),
            required: signal(false),
            rules: signal(false),
            settled: signal(settled),
            empty: signal(empty(value)),
            flags: signal(IndexMap::new()),
        };
        aggregator.set_rules(parsed_rules);
        aggregator
    }

    // -------------------------------------------------------------------------
    // Ledger-driven
    // -------------------------------------------------------------------------

    /// `settled:blocking` → true, `unsettled:blocking` → false.
    pub fn set_valid(&self, valid: bool) {
        self.valid.set(valid);
    }

    /// `unsettled:errors` → true, `settled:errors` → false.
    pub fn set_errors(&self, has_errors: bool) {
        self.errors.set(has_errors);
    }

    pub fn valid(&self) -> bool {
        self.valid.get()
    }

    /// Whether any error message is present.
    pub fn errors(&self) -> bool {
        self.errors.get()
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Recompute `required` / `rules` from a parsed rule list
    /// (`[{ "name": "required", ... }, ...]`). Non-arrays count as no rules.
    pub fn set_rules(&self, parsed_rules: Option<&Value>) {
        let rules = parsed_rules.and_then(Value::as_array);
        self.rules.set(rules.is_some_and(|r| !r.is_empty()));
        self.required.set(rules.is_some_and(|r| {
            r.iter()
                .any(|rule| rule.get("name").and_then(Value::as_str) == Some("required"))
        }));
    }

    pub fn required(&self) -> bool {
        self.required.get()
    }

    pub fn rules(&self) -> bool {
        self.rules.get()
    }

    // -------------------------------------------------------------------------
    // Node events
    // -------------------------------------------------------------------------

    pub fn set_settled(&self, settled: bool) {
        self.settled.set(settled);
    }

    pub fn settled(&self) -> bool {
        self.settled.get()
    }

    pub fn set_empty_from(&self, value: &Value) {
        self.empty.set(empty(value));
    }

    pub fn empty(&self) -> bool {
        self.empty.get()
    }

    // -------------------------------------------------------------------------
    // Message-driven flags
    // -------------------------------------------------------------------------

    pub fn set_flag(&self, key: &str, value: bool) {
        let mut flags = self.flags.get();
        if flags.get(key) == Some(&value) {
            return;
        }
        flags.insert(key.to_string(), value);
        self.flags.set(flags);
    }

    pub fn remove_flag(&self, key: &str) {
        let mut flags = self.flags.get();
        if flags.shift_remove(key).is_some() {
            self.flags.set(flags);
        }
    }

    /// Value of a message-driven flag, false when absent.
    pub fn flag(&self, key: &str) -> bool {
        self.flags.get().get(key).copied().unwrap_or(false)
    }

    pub fn clear_flags(&self) {
        self.flags.set(IndexMap::new());
    }

    pub fn blurred(&self) -> bool {
        self.flag("blurred")
    }

    pub fn dirty(&self) -> bool {
        self.flag("dirty")
    }

    pub fn submitted(&self) -> bool {
        self.flag("submitted")
    }

    pub fn failing(&self) -> bool {
        self.flag("failing")
    }

    pub fn passing(&self) -> bool {
        !self.failing()
    }

    // -------------------------------------------------------------------------
    // Derived
    // -------------------------------------------------------------------------

    /// With rules: valid and error-free. Without: changed and non-empty.
    pub fn complete(&self, value: &Value) -> bool {
        if self.rules() {
            self.valid() && !self.errors()
        } else {
            self.dirty() && !empty(value)
        }
    }

    /// Failing, and the failure is on display.
    pub fn invalid(&self, validation_visible: bool) -> bool {
        self.failing() && validation_visible
    }

    /// Collect every flag into a snapshot.
    pub fn snapshot(&self, value: &Value, validation_visible: bool) -> FormState {
        FormState {
            blurred: self.blurred(),
            complete: self.complete(value),
            dirty: self.dirty(),
            empty: self.empty(),
            submitted: self.submitted(),
            settled: self.settled(),
            valid: self.valid(),
            invalid: self.invalid(validation_visible),
            errors: self.errors(),
            rules: self.rules(),
            validation_visible,
            required: self.required(),
            failing: self.failing(),
            passing: self.passing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fresh() -> StateAggregator {
        StateAggregator::new(0, 0, None, true, &json!(""))
    }

    #[test]
    fn test_seeded_from_counts() {
        let state = StateAggregator::new(2, 1, None, false, &json!("x"));
        assert!(!state.valid());
        assert!(state.errors());
        assert!(!state.settled());
        assert!(!state.empty());
    }

    #[test]
    fn test_rules_detection() {
        let state = fresh();
        assert!(!state.rules());
        assert!(!state.required());

        state.set_rules(Some(&json!([{ "name": "email" }])));
        assert!(state.rules());
        assert!(!state.required());

        state.set_rules(Some(&json!([{ "name": "required" }, { "name": "email" }])));
        assert!(state.required());

        state.set_rules(Some(&json!([])));
        assert!(!state.rules());
        assert!(!state.required());

        state.set_rules(Some(&json!("required")));
        assert!(!state.rules());
    }

    #[test]
    fn test_complete_without_rules_uses_presence() {
        let state = fresh();
        assert!(!state.complete(&json!("")));

        state.set_flag("dirty", true);
        assert!(!state.complete(&json!("")));
        assert!(state.complete(&json!("x")));
        assert!(state.complete(&json!(0)));
    }

    #[test]
    fn test_complete_with_rules_uses_validity() {
        let state = fresh();
        state.set_rules(Some(&json!([{ "name": "required" }])));
        assert!(state.complete(&json!("")));

        state.set_valid(false);
        assert!(!state.complete(&json!("x")));

        state.set_valid(true);
        state.set_errors(true);
        assert!(!state.complete(&json!("x")));
    }

    #[test]
    fn test_invalid_requires_visibility() {
        let state = fresh();
        state.set_flag("failing", true);
        assert!(!state.invalid(false));
        assert!(state.invalid(true));
        assert!(!state.passing());

        state.remove_flag("failing");
        assert!(state.passing());
        assert!(!state.invalid(true));
    }

    #[test]
    fn test_snapshot() {
        let state = fresh();
        state.set_flag("blurred", true);
        let snapshot = state.snapshot(&json!(""), true);

        assert!(snapshot.blurred);
        assert!(snapshot.valid);
        assert!(snapshot.passing);
        assert!(snapshot.validation_visible);
        assert!(snapshot.empty);
        assert!(!snapshot.complete);
    }
}
