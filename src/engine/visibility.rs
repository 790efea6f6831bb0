//! Validation Visibility - When validation messages are shown.
//!
//! [`resolve`] is a pure function of the mode and the current state flags.
//! [`VisibilityState`] holds the reactive inputs that belong to visibility
//! itself: the mode and the monotonic "has been shown" latch.

use spark_signals::{signal, Signal};

use crate::types::ValidationVisibility;

/// Inputs to [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityInputs {
    pub mode: ValidationVisibility,
    pub submitted: bool,
    pub has_shown: bool,
    pub settled: bool,
    pub dirty: bool,
    pub blurred: bool,
}

/// Are validation messages visible right now? First match wins:
/// 1. submitted forms always show validation
/// 2. nothing shows before the first settle unless it has been shown before
/// 3. otherwise the mode decides
pub fn resolve(inputs: &VisibilityInputs) -> bool {
    if inputs.submitted {
        return true;
    }
    if !inputs.has_shown && !inputs.settled {
        return false;
    }
    match inputs.mode {
        ValidationVisibility::Live => true,
        ValidationVisibility::Blur => inputs.blurred,
        ValidationVisibility::Dirty => inputs.dirty,
        ValidationVisibility::Unknown => false,
    }
}

/// Reactive mode + latch.
#[derive(Clone)]
pub struct VisibilityState {
    mode: Signal<ValidationVisibility>,
    has_shown: Signal<bool>,
}

impl VisibilityState {
    /// A live field starts out as "already shown".
    pub fn new(mode: ValidationVisibility) -> Self {
        Self {
            mode: signal(mode),
            has_shown: signal(mode == ValidationVisibility::Live),
        }
    }

    pub fn mode(&self) -> ValidationVisibility {
        self.mode.get()
    }

    pub fn set_mode(&self, mode: ValidationVisibility) {
        self.mode.set(mode);
    }

    pub fn has_shown(&self) -> bool {
        self.has_shown.get()
    }

    /// One-way latch: once visible, remembered for the node's lifetime.
    /// Returns true when this call closed the latch.
    pub fn latch(&self, visible: bool) -> bool {
        if visible && !self.has_shown.get() {
            self.has_shown.set(true);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs(mode: ValidationVisibility) -> VisibilityInputs {
        VisibilityInputs {
            mode,
            submitted: false,
            has_shown: true,
            settled: true,
            dirty: false,
            blurred: false,
        }
    }

    #[test]
    fn test_modes() {
        assert!(resolve(&inputs(ValidationVisibility::Live)));
        assert!(!resolve(&inputs(ValidationVisibility::Blur)));
        assert!(resolve(&VisibilityInputs { blurred: true, ..inputs(ValidationVisibility::Blur) }));
        assert!(!resolve(&inputs(ValidationVisibility::Dirty)));
        assert!(resolve(&VisibilityInputs { dirty: true, ..inputs(ValidationVisibility::Dirty) }));
        assert!(!resolve(&VisibilityInputs { dirty: true, blurred: true, ..inputs(ValidationVisibility::Unknown) }));
    }

    #[test]
    fn test_hidden_until_settled_when_never_shown() {
        let unsettled = VisibilityInputs {
            has_shown: false,
            settled: false,
            ..inputs(ValidationVisibility::Live)
        };
        assert!(!resolve(&unsettled));
        assert!(resolve(&VisibilityInputs { has_shown: true, ..unsettled }));
        assert!(resolve(&VisibilityInputs { settled: true, ..unsettled }));
    }

    #[test]
    fn test_latch_is_monotonic() {
        let state = VisibilityState::new(ValidationVisibility::Blur);
        assert!(!state.has_shown());
        assert!(!state.latch(false));
        assert!(!state.has_shown());
        assert!(state.latch(true));
        assert!(!state.latch(true));
        state.latch(false);
        assert!(state.has_shown());
    }

    #[test]
    fn test_live_starts_shown() {
        assert!(VisibilityState::new(ValidationVisibility::Live).has_shown());
    }

    fn any_mode() -> impl Strategy<Value = ValidationVisibility> {
        prop_oneof![
            Just(ValidationVisibility::Live),
            Just(ValidationVisibility::Blur),
            Just(ValidationVisibility::Dirty),
            Just(ValidationVisibility::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn prop_submitted_always_visible(mode in any_mode(), has_shown: bool, settled: bool, dirty: bool, blurred: bool) {
            let visible = resolve(&VisibilityInputs { mode, submitted: true, has_shown, settled, dirty, blurred });
            prop_assert!(visible);
        }

        #[test]
        fn prop_unknown_never_visible_before_submit(has_shown: bool, settled: bool, dirty: bool, blurred: bool) {
            let visible = resolve(&VisibilityInputs {
                mode: ValidationVisibility::Unknown,
                submitted: false,
                has_shown,
                settled,
                dirty,
                blurred,
            });
            prop_assert!(!visible);
        }
    }
}
