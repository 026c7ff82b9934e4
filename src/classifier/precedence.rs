//! Status assignment from window results.
//!
//! Rules run in a fixed order and every rule that holds overwrites the label
//! before it. Windows go shortest to longest so the longest qualifying zero run
//! wins, and the active check runs last so any positive month is `A`.

use crate::models::{WellStatus, ZeroFlags};

// ---

/// What the status rules may look at for one row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowFacts {
    pub flags: ZeroFlags,
    /// Measured oil volume; `None` when missing or NaN.
    pub oil: Option<f64>,
}

struct StatusRule {
    label: WellStatus,
    applies: fn(&RowFacts) -> bool,
}

fn dry_one_month(facts: &RowFacts) -> bool {
    facts.flags.one_month
}

fn dry_two_months(facts: &RowFacts) -> bool {
    facts.flags.two_months
}

fn dry_three_months(facts: &RowFacts) -> bool {
    facts.flags.three_months
}

fn dry_six_months(facts: &RowFacts) -> bool {
    facts.flags.six_months
}

fn producing(facts: &RowFacts) -> bool {
    facts.oil.is_some_and(|volume| volume > 0.0)
}

const STATUS_RULES: [StatusRule; 5] = [
    StatusRule {
        label: WellStatus::InactiveOneMonth,
        applies: dry_one_month,
    },
    StatusRule {
        label: WellStatus::InactiveTwoMonths,
        applies: dry_two_months,
    },
    StatusRule {
        label: WellStatus::Inactive,
        applies: dry_three_months,
    },
    StatusRule {
        label: WellStatus::Abandoned,
        applies: dry_six_months,
    },
    StatusRule {
        label: WellStatus::Active,
        applies: producing,
    },
];

/// Assign the status for one row; `Unknown` when no rule holds.
pub fn assign_status(facts: &RowFacts) -> WellStatus {
    STATUS_RULES
        .iter()
        .fold(WellStatus::Unknown, |status, rule| {
            if (rule.applies)(facts) {
                rule.label
            } else {
                status
            }
        })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn facts(one: bool, two: bool, three: bool, six: bool, oil: Option<f64>) -> RowFacts {
        // ---
        RowFacts {
            flags: ZeroFlags {
                one_month: one,
                two_months: two,
                three_months: three,
                six_months: six,
            },
            oil,
        }
    }

    #[test]
    fn test_default_is_unknown() {
        // ---
        assert_eq!(assign_status(&RowFacts::default()), WellStatus::Unknown);
        assert_eq!(
            assign_status(&facts(false, false, false, false, None)),
            WellStatus::Unknown
        );
    }

    #[test]
    fn test_longest_zero_run_wins() {
        // ---
        let zero = Some(0.0);
        assert_eq!(
            assign_status(&facts(true, false, false, false, zero)),
            WellStatus::InactiveOneMonth
        );
        assert_eq!(
            assign_status(&facts(true, true, false, false, zero)),
            WellStatus::InactiveTwoMonths
        );
        assert_eq!(
            assign_status(&facts(true, true, true, false, zero)),
            WellStatus::Inactive
        );
        assert_eq!(
            assign_status(&facts(true, true, true, true, zero)),
            WellStatus::Abandoned
        );
    }

    #[test]
    fn test_later_rule_overwrites_even_without_earlier_ones() {
        // ---
        // Last-applied-wins, not first-match: a lone six-month flag still lands on AB
        assert_eq!(
            assign_status(&facts(false, false, false, true, Some(0.0))),
            WellStatus::Abandoned
        );
    }

    #[test]
    fn test_active_overrides_everything() {
        // ---
        assert_eq!(
            assign_status(&facts(false, false, false, false, Some(0.01))),
            WellStatus::Active
        );
        assert_eq!(
            assign_status(&facts(true, true, true, true, Some(250.0))),
            WellStatus::Active
        );
    }

    #[test]
    fn test_non_positive_oil_is_not_active() {
        // ---
        assert_eq!(
            assign_status(&facts(false, false, false, false, Some(0.0))),
            WellStatus::Unknown
        );
        assert_eq!(
            assign_status(&facts(false, false, false, false, Some(-3.0))),
            WellStatus::Unknown
        );
    }
}
