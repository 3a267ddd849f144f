//! The layout constraint solver.
//!
//! Distributes an available extent among sibling items along one axis,
//! honoring per-item minimum/maximum/preferred constraints.

use crate::sizing::Constraint;

/// Per-item scratch state for one solve.
struct SolverItem {
    constraint: Constraint,
    size: Option<i32>,
    constrained: bool,
}

impl SolverItem {
    fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            size: None,
            constrained: false,
        }
    }
}

/// The result of a solve: per-item origins and sizes, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solved {
    pub origins: Vec<i32>,
    pub sizes: Vec<i32>,
}

/// Distribute `available` units starting at `origin` among items with the
/// given constraints, separated by `spacing`.
///
/// Preferred sizes are assigned first (clamped into their bounds), the
/// remaining space is split evenly among free items with clamping re-run
/// to a fixed point, then oversize/undersize corrections adjust the
/// unconstrained items. Any residual rounding error lands on the last
/// unconstrained item. Once no unconstrained items remain, no further
/// correction is attempted, so fully-fixed layouts may exceed the budget.
pub fn solve(origin: i32, available: i32, constraints: &[Constraint], spacing: i32) -> Solved {
    let mut items: Vec<SolverItem> = constraints.iter().copied().map(SolverItem::new).collect();
    if items.is_empty() {
        return Solved {
            origins: Vec::new(),
            sizes: Vec::new(),
        };
    }

    // Assign preferred sizes. Items keep their preferred size but are still
    // free to change as long as they don't become constrained.
    for item in &mut items {
        if let Some(preferred) = item.constraint.preferred {
            let mut size = preferred;
            if size < item.constraint.minimum {
                size = item.constraint.minimum;
                item.constrained = true;
            }
            if size > item.constraint.maximum {
                size = item.constraint.maximum;
                item.constrained = true;
            }
            item.size = Some(size);
        }
    }

    // Split the remaining space evenly among free items. Whenever a share
    // violates an item's bounds the item is clamped, flagged, and the
    // distribution re-runs over the smaller free set. The constrained set
    // only grows, so this reaches a fixed point.
    loop {
        let mut finished = true;
        for item in &mut items {
            if !item.constrained && item.constraint.preferred.is_none() {
                item.size = None;
            }
        }
        let mut remaining = available;
        let mut count = items.len() as i32;
        for item in &items {
            if let Some(size) = item.size {
                remaining -= size;
                count -= 1;
            }
        }
        for item in &mut items {
            if item.size.is_none() {
                let mut size = remaining / count;
                if size < item.constraint.minimum {
                    size = item.constraint.minimum;
                    item.constrained = true;
                    finished = false;
                }
                if size > item.constraint.maximum {
                    size = item.constraint.maximum;
                    item.constrained = true;
                    finished = false;
                }
                item.size = Some(size);
                remaining -= size;
                count -= 1;
            }
            if !finished {
                break;
            }
        }
        if finished {
            break;
        }
    }

    // Oversized: shrink unconstrained items, honoring minimums. Once no
    // unconstrained items remain the over-budget sizes stand.
    loop {
        let mut finished = true;
        let actual: i64 = items.iter().map(|i| i64::from(i.size.unwrap_or(0))).sum();
        if actual > i64::from(available) {
            let mut count = items.iter().filter(|i| !i.constrained).count() as i64;
            let mut excess = actual - i64::from(available);
            if count > 0 {
                for item in &mut items {
                    if !item.constrained {
                        let current = item.size.unwrap_or(0);
                        let mut size = current - (excess / count) as i32;
                        if size < item.constraint.minimum {
                            size = item.constraint.minimum;
                            item.constrained = true;
                            finished = false;
                        }
                        excess -= i64::from(current - size);
                        item.size = Some(size);
                        count -= 1;
                    }
                    if !finished {
                        break;
                    }
                }
            }
        }
        if finished {
            break;
        }
    }

    // Undersized: grow unconstrained items, honoring maximums.
    loop {
        let mut finished = true;
        let actual: i64 = items.iter().map(|i| i64::from(i.size.unwrap_or(0))).sum();
        if actual < i64::from(available) {
            let mut count = items.iter().filter(|i| !i.constrained).count() as i64;
            let mut shortfall = i64::from(available) - actual;
            if count > 0 {
                for item in &mut items {
                    if !item.constrained {
                        let current = item.size.unwrap_or(0);
                        let mut size = current + (shortfall / count) as i32;
                        if size > item.constraint.maximum {
                            size = item.constraint.maximum;
                            item.constrained = true;
                            finished = false;
                        }
                        shortfall -= i64::from(size - current);
                        item.size = Some(size);
                        count -= 1;
                    }
                    if !finished {
                        break;
                    }
                }
            }
        }
        if finished {
            break;
        }
    }

    // Integer division leaves a sub-item-count residue; hand it to the
    // last unconstrained item, still within its bounds.
    let actual: i64 = items.iter().map(|i| i64::from(i.size.unwrap_or(0))).sum();
    let residual = i64::from(available) - actual;
    if residual != 0 {
        if let Some(item) = items.iter_mut().rev().find(|i| !i.constrained) {
            let size = (i64::from(item.size.unwrap_or(0)) + residual)
                .clamp(i64::from(item.constraint.minimum), i64::from(item.constraint.maximum))
                as i32;
            item.size = Some(size);
        }
    }

    let sizes: Vec<i32> = items.iter().map(|i| i.size.unwrap_or(0)).collect();
    let mut origins = Vec::with_capacity(sizes.len());
    let mut cursor = origin;
    for size in &sizes {
        origins.push(cursor);
        cursor += size + spacing;
    }
    Solved { origins, sizes }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn c(minimum: i32, maximum: i32, preferred: Option<i32>) -> Constraint {
        Constraint::new(minimum, maximum, preferred)
    }

    #[test]
    fn empty() {
        let solved = solve(0, 100, &[], 0);
        assert!(solved.origins.is_empty());
        assert!(solved.sizes.is_empty());
    }

    #[test]
    fn three_way_even_split() {
        let constraints = vec![c(10, 100, None); 3];
        let solved = solve(0, 90, &constraints, 0);
        assert_eq!(solved.sizes, vec![30, 30, 30]);
        assert_eq!(solved.origins, vec![0, 30, 60]);
    }

    #[test]
    fn preferred_is_clamped_into_bounds() {
        let solved = solve(0, 100, &[c(40, 60, Some(10)), c(0, i32::MAX, None)], 0);
        assert_eq!(solved.sizes, vec![40, 60]);
    }

    #[test]
    fn spacing_accumulates_into_origins() {
        let constraints = vec![c(0, i32::MAX, Some(10)); 3];
        let solved = solve(5, 30, &constraints, 4);
        assert_eq!(solved.origins, vec![5, 19, 33]);
    }

    #[test]
    fn minimums_win_when_overcommitted() {
        // Fixed items summing past the budget keep their sizes.
        let solved = solve(0, 50, &[Constraint::fixed(40), Constraint::fixed(40)], 0);
        assert_eq!(solved.sizes, vec![40, 40]);
    }

    #[test]
    fn shrinks_free_items_before_fixed_ones() {
        let solved = solve(0, 100, &[Constraint::fixed(80), c(10, i32::MAX, Some(60))], 0);
        assert_eq!(solved.sizes, vec![80, 20]);
    }

    #[test]
    fn grows_to_fill_available() {
        let solved = solve(0, 100, &[c(0, 30, None), c(0, i32::MAX, None)], 0);
        assert_eq!(solved.sizes.iter().sum::<i32>(), 100);
        assert_eq!(solved.sizes[0], 30);
    }

    #[test]
    fn residual_lands_on_last_unconstrained() {
        let constraints = vec![c(0, i32::MAX, None); 3];
        let solved = solve(0, 100, &constraints, 0);
        assert_eq!(solved.sizes.iter().sum::<i32>(), 100);
        assert_eq!(solved.sizes, vec![33, 33, 34]);
    }

    proptest! {
        #[test]
        fn sizes_respect_bounds(
            specs in prop::collection::vec((0i32..200, 0i32..200, prop::option::of(0i32..400)), 1..8),
            available in 0i32..2000,
        ) {
            let constraints: Vec<Constraint> = specs
                .iter()
                .map(|&(a, b, preferred)| c(a.min(b), a.max(b), preferred))
                .collect();
            let solved = solve(0, available, &constraints, 0);
            for (size, constraint) in solved.sizes.iter().zip(&constraints) {
                prop_assert!(*size >= constraint.minimum);
                prop_assert!(*size <= constraint.maximum);
            }
        }

        #[test]
        fn satisfiable_layouts_fill_to_rounding(
            specs in prop::collection::vec((0i32..100, 0i32..100), 1..8),
            slack in 0i32..100,
        ) {
            // Build a satisfiable instance: available between sum(min) and sum(max).
            let constraints: Vec<Constraint> = specs
                .iter()
                .map(|&(a, b)| c(a.min(b), a.min(b) + a.max(b) + 1, None))
                .collect();
            let min_sum: i32 = constraints.iter().map(|c| c.minimum).sum();
            let max_sum: i32 = constraints.iter().map(|c| c.maximum).sum();
            let available = (min_sum + slack).min(max_sum);
            let solved = solve(0, available, &constraints, 0);
            let total: i32 = solved.sizes.iter().sum();
            // Exact fill up to the integer-division residue.
            prop_assert!((total - available).abs() < constraints.len() as i32);
        }

        #[test]
        fn origins_accumulate(
            sizes in prop::collection::vec(1i32..50, 1..6),
            spacing in 0i32..10,
        ) {
            let constraints: Vec<Constraint> =
                sizes.iter().map(|&s| Constraint::fixed(s)).collect();
            let available: i32 = sizes.iter().sum();
            let solved = solve(0, available, &constraints, spacing);
            let mut cursor = 0;
            for (i, origin) in solved.origins.iter().enumerate() {
                prop_assert_eq!(*origin, cursor);
                cursor += solved.sizes[i] + spacing;
            }
        }
    }
}
