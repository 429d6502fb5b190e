//! Status filter: decides whether an event produces a notification.
//!
//! A subscriber who asked for `FAILURE` notifications also wants to hear when
//! a failing pipeline goes green again, without subscribing to every
//! `SUCCESS`. A successful build flagged as fixed is therefore reported as
//! `FIXED` to those subscribers. Subscribers without `FAILURE` see the raw
//! status and only plain membership applies.

use crate::settings::Subscription;
use crate::status::StatusName;

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether a notification should be sent.
    pub fire: bool,
    /// Status used for filtering and rendering.
    pub effective_status: StatusName,
}

/// Decide whether `status` should notify `subscription`.
///
/// When `is_fixed` is set, `FIXED` counts as subscribed for this decision
/// only. The subscription itself is left untouched.
pub fn decide(status: StatusName, is_fixed: bool, subscription: &Subscription) -> Decision {
    let effective_status = effective_status(status, is_fixed, subscription);
    let fire = subscription.wants(effective_status)
        || (is_fixed && effective_status == StatusName::Fixed);

    tracing::trace!(
        status = %status,
        is_fixed,
        effective_status = %effective_status,
        fire,
        "Status filter decision"
    );

    Decision {
        fire,
        effective_status,
    }
}

fn effective_status(status: StatusName, is_fixed: bool, subscription: &Subscription) -> StatusName {
    if is_fixed && status == StatusName::Success && subscription.wants(StatusName::Failure) {
        StatusName::Fixed
    } else {
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(statuses: &[StatusName]) -> Subscription {
        Subscription {
            addresses: vec!["dev@example.com".to_string()],
            statuses: statuses.to_vec(),
        }
    }

    #[test]
    fn subscribed_status_fires() {
        let sub = subscription(&[StatusName::Success, StatusName::Failure]);
        let decision = decide(StatusName::Failure, false, &sub);
        assert!(decision.fire);
        assert_eq!(decision.effective_status, StatusName::Failure);
    }

    #[test]
    fn unsubscribed_statuses_never_fire() {
        let sub = subscription(&[StatusName::Success, StatusName::Failure]);
        for status in StatusName::ALL {
            if sub.statuses.contains(&status) {
                continue;
            }
            for is_fixed in [false, true] {
                let decision = decide(status, is_fixed, &sub);
                if is_fixed && status == StatusName::Fixed {
                    continue;
                }
                assert!(!decision.fire, "{} (is_fixed={}) should not fire", status, is_fixed);
                assert_eq!(decision.effective_status, status);
            }
        }
    }

    #[test]
    fn fixed_build_is_rewritten_for_failure_subscribers() {
        let sub = subscription(&[StatusName::Failure]);
        let decision = decide(StatusName::Success, true, &sub);
        assert_eq!(decision.effective_status, StatusName::Fixed);
        assert!(decision.fire);
    }

    #[test]
    fn fixed_build_with_success_and_failure_subscribed_reports_fixed() {
        let sub = subscription(&[StatusName::Success, StatusName::Failure]);
        let decision = decide(StatusName::Success, true, &sub);
        assert_eq!(decision.effective_status, StatusName::Fixed);
        assert!(decision.fire);
    }

    #[test]
    fn fixed_build_without_failure_subscription_keeps_success() {
        let sub = subscription(&[StatusName::Success]);
        let decision = decide(StatusName::Success, true, &sub);
        assert_eq!(decision.effective_status, StatusName::Success);
        assert!(decision.fire);

        let sub = subscription(&[StatusName::Aborted]);
        let decision = decide(StatusName::Success, true, &sub);
        assert_eq!(decision.effective_status, StatusName::Success);
        assert!(!decision.fire);
    }

    #[test]
    fn success_without_fixed_flag_is_not_rewritten() {
        let sub = subscription(&[StatusName::Failure]);
        let decision = decide(StatusName::Success, false, &sub);
        assert_eq!(decision.effective_status, StatusName::Success);
        assert!(!decision.fire);
    }

    #[test]
    fn decide_does_not_mutate_subscription() {
        let sub = subscription(&[StatusName::Failure]);
        let before = sub.clone();
        let _ = decide(StatusName::Success, true, &sub);
        assert_eq!(sub, before);
    }

    #[test]
    fn empty_status_list_never_fires() {
        let sub = subscription(&[]);
        for status in StatusName::ALL {
            assert!(!decide(status, false, &sub).fire);
        }
        assert!(!decide(StatusName::Success, true, &sub).fire);
    }
}
