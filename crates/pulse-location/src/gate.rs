//! What the location gate shows for each acquisition state.

use pulse_core::LocationError;

use crate::types::AcquisitionState;

/// Gate presentation. Everything but `Open` withholds the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView {
    Open,
    Progress {
        title: &'static str,
        message: &'static str,
    },
    Denied {
        title: &'static str,
        message: &'static str,
        retry_label: Option<&'static str>,
    },
    Unsupported {
        title: &'static str,
        message: &'static str,
    },
}

impl GateView {
    pub fn for_state(state: AcquisitionState, last_error: Option<&LocationError>) -> Self {
        match state {
            AcquisitionState::Resolved => GateView::Open,
            AcquisitionState::Idle => GateView::Progress {
                title: "Initializing CityPulse",
                message: "Please wait while we set up your personalized experience...",
            },
            AcquisitionState::Requesting => GateView::Progress {
                title: "Accessing Your Location",
                message: "Please allow location access when prompted. Location access is required to use CityPulse services.",
            },
            AcquisitionState::Enriching => GateView::Progress {
                title: "Finding Your Area",
                message: "Looking up the name of your current location...",
            },
            AcquisitionState::Denied => {
                let error = last_error.unwrap_or(&LocationError::PermissionDenied);
                GateView::Denied {
                    title: "Location Access Required",
                    message: error.user_message(),
                    retry_label: error.offers_retry().then_some("Grant Location Access"),
                }
            }
            AcquisitionState::Unsupported => GateView::Unsupported {
                title: "Location Not Supported",
                message: LocationError::CapabilityUnsupported.user_message(),
            },
        }
    }

    /// True when the application may render.
    pub fn is_open(&self) -> bool {
        matches!(self, GateView::Open)
    }

    pub fn title(&self) -> Option<&'static str> {
        match self {
            GateView::Open => None,
            GateView::Progress { title, .. }
            | GateView::Denied { title, .. }
            | GateView::Unsupported { title, .. } => Some(*title),
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            GateView::Open => None,
            GateView::Progress { message, .. }
            | GateView::Denied { message, .. }
            | GateView::Unsupported { message, .. } => Some(*message),
        }
    }

    /// Label of the retry action, if the view offers one.
    pub fn retry_action(&self) -> Option<&'static str> {
        match self {
            GateView::Denied { retry_label, .. } => *retry_label,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_resolved_opens_gate() {
        use AcquisitionState::*;
        for state in [Idle, Requesting, Enriching, Denied, Unsupported] {
            assert!(!GateView::for_state(state, None).is_open(), "{} opened the gate", state);
        }
        assert!(GateView::for_state(Resolved, None).is_open());
    }

    #[test]
    fn test_denied_offers_retry_with_error_message() {
        let view = GateView::for_state(AcquisitionState::Denied, Some(&LocationError::Timeout));
        assert_eq!(view.retry_action(), Some("Grant Location Access"));
        assert_eq!(view.message(), Some(LocationError::Timeout.user_message()));
    }

    #[test]
    fn test_denied_without_error_defaults_to_permission_message() {
        let view = GateView::for_state(AcquisitionState::Denied, None);
        assert_eq!(
            view.message(),
            Some(LocationError::PermissionDenied.user_message())
        );
    }

    #[test]
    fn test_denied_without_retryable_error_hides_retry() {
        let error = LocationError::StorageCorruption("truncated".into());
        let view = GateView::for_state(AcquisitionState::Denied, Some(&error));
        assert!(!view.is_open());
        assert!(view.retry_action().is_none());
        assert_eq!(view.message(), Some(error.user_message()));
    }

    #[test]
    fn test_unsupported_has_no_retry() {
        let view = GateView::for_state(AcquisitionState::Unsupported, None);
        assert!(view.retry_action().is_none());
        assert!(view.message().unwrap_or_default().contains("browser"));
    }

    #[test]
    fn test_every_closed_view_explains_itself() {
        use AcquisitionState::*;
        for state in [Idle, Requesting, Enriching, Denied, Unsupported] {
            let view = GateView::for_state(state, None);
            assert!(view.title().is_some());
            assert!(!view.message().unwrap_or_default().is_empty());
        }
        assert!(GateView::Open.title().is_none());
    }
}
