//! Policy decision evaluation — pure classification × policy → decision.
//!
//! No side effects and no failure modes: cancellation, indices, and audit
//! belong to the callers. The restricted-content override requires both
//! sides to opt in — the policy via `allow_restricted_content` and the
//! caller via `include_restricted_content`.

use crate::types::{Classification, ClassificationLevel, Decision, DecisionOptions, Policy};

/// Evaluate a classification against a policy.
///
/// Content at `Restricted` passes only through the override or a policy
/// whose ceiling itself reaches `Restricted`. Below that, the ceiling
/// comparison decides. Disallowed content becomes [`Decision::Redact`]
/// (carrying the ceiling for point-level masking) when the policy permits
/// redaction, [`Decision::Block`] otherwise.
#[must_use]
pub fn decide(
    classification: &Classification,
    policy: &Policy,
    options: &DecisionOptions,
) -> Decision {
    let restricted_override = options.include_restricted_content && policy.allow_restricted_content;

    let allowed = if classification.level == ClassificationLevel::Restricted {
        if options.include_restricted_content {
            policy.allow_restricted_content
        } else {
            policy
                .max_allowed
                .is_some_and(|max| max >= ClassificationLevel::Restricted)
        }
    } else {
        restricted_override
            || policy
                .max_allowed
                .is_some_and(|max| classification.level <= max)
    };

    if allowed {
        Decision::Allow
    } else if policy.redact_disallowed {
        Decision::Redact {
            max_allowed: policy.max_allowed,
        }
    } else {
        Decision::Block
    }
}

/// The more restrictive of two decisions (Block over Redact over Allow).
///
/// Used by two-tier evaluation: when the structured-only and the combined
/// structured-plus-heuristic decisions disagree, the stricter one wins.
#[must_use]
pub fn more_restrictive(a: Decision, b: Decision) -> Decision {
    if severity(&b) > severity(&a) {
        b
    } else {
        a
    }
}

const fn severity(decision: &Decision) -> u8 {
    match decision {
        Decision::Allow => 0,
        Decision::Redact { .. } => 1,
        Decision::Block => 2,
    }
}
