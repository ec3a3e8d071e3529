//! Turn scheduling
//!
//! Stateless: everything it needs lives in the session document.

use std::collections::BTreeSet;

use crate::session::Role;

/// Each role speaks twice: an opening and a rebuttal
pub const SPEECHES_PER_ROLE: usize = 2;

/// Pure speaking-order arithmetic
pub struct TurnScheduler;

impl TurnScheduler {
    pub fn total_speeches(order: &[Role]) -> usize {
        order.len() * SPEECHES_PER_ROLE
    }

    /// Role that speaks at turn `index`, or `None` past the last turn
    pub fn role_at(order: &[Role], index: usize) -> Option<&Role> {
        if order.is_empty() || index >= Self::total_speeches(order) {
            return None;
        }
        order.get(index % order.len())
    }

    /// Index of the turn after `index`, or `None` when the debate is over
    pub fn next_index(order: &[Role], index: usize) -> Option<usize> {
        let next = index + 1;
        (next < Self::total_speeches(order)).then_some(next)
    }

    /// Role speaking after turn `index`
    pub fn next(order: &[Role], index: usize) -> Option<&Role> {
        Self::next_index(order, index).and_then(|i| Self::role_at(order, i))
    }

    /// 1-based speech number shown to participants
    pub fn speech_number(index: usize) -> usize {
        index + 1
    }

    /// Whether turn `index` belongs to the rebuttal round
    pub fn is_rebuttal(order: &[Role], index: usize) -> bool {
        !order.is_empty() && index >= order.len()
    }

    /// Deduplicated roles sorted by key
    pub fn alphabetical(roles: impl IntoIterator<Item = Role>) -> Vec<Role> {
        roles.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn order() -> Vec<Role> {
        vec![Role::proposition(), Role::opposition()]
    }

    #[test]
    fn test_two_role_rotation() {
        let order = order();
        assert_eq!(TurnScheduler::total_speeches(&order), 4);
        assert_eq!(TurnScheduler::next(&order, 0), Some(&Role::opposition()));
        assert_eq!(TurnScheduler::next(&order, 1), Some(&Role::proposition()));
        assert_eq!(TurnScheduler::next(&order, 2), Some(&Role::opposition()));
        assert_eq!(TurnScheduler::next(&order, 3), None);
        assert_eq!(TurnScheduler::role_at(&order, 4), None);
    }

    #[test]
    fn test_rebuttal_round() {
        let order = order();
        assert!(!TurnScheduler::is_rebuttal(&order, 1));
        assert!(TurnScheduler::is_rebuttal(&order, 2));
    }

    #[test]
    fn test_empty_order_has_no_turns() {
        assert_eq!(TurnScheduler::role_at(&[], 0), None);
        assert_eq!(TurnScheduler::next(&[], 0), None);
    }

    proptest! {
        #[test]
        fn prop_next_is_pure_and_rotates(roles in 2usize..6, index in 0usize..16) {
            let order: Vec<Role> = (0..roles).map(|i| Role::new(&format!("role{}", i))).collect();
            let first = TurnScheduler::next(&order, index).cloned();
            let second = TurnScheduler::next(&order, index).cloned();
            prop_assert_eq!(&first, &second);

            if index + 1 < roles * SPEECHES_PER_ROLE {
                prop_assert_eq!(first, Some(order[(index + 1) % roles].clone()));
            } else {
                prop_assert_eq!(first, None);
            }
        }

        #[test]
        fn prop_walk_visits_every_role_twice(roles in 2usize..6) {
            let order: Vec<Role> = (0..roles).map(|i| Role::new(&format!("r{}", i))).collect();
            let mut index = 0;
            let mut seen = vec![TurnScheduler::role_at(&order, 0).cloned()];
            while let Some(next) = TurnScheduler::next_index(&order, index) {
                index = next;
                seen.push(TurnScheduler::role_at(&order, index).cloned());
            }
            prop_assert_eq!(seen.len(), roles * SPEECHES_PER_ROLE);
            for role in &order {
                prop_assert_eq!(seen.iter().filter(|r| r.as_ref() == Some(role)).count(), 2);
            }
        }
    }
}
