//! The Valuation Ledger: weighted-average cost arithmetic.
//!
//! Incoming stock re-weights the average cost; outgoing stock is valued at the
//! current average and never changes it. All functions here are pure and
//! deterministic — callers own persistence and concurrency.

use rust_decimal::Decimal;

use yaadbooks_core::rounding::{non_negative, positive, round_cost, round_money, round_quantity};
use yaadbooks_core::{DomainError, DomainResult};

use crate::movement::{Direction, MovementType};

/// A product's current valuation state, as read from storage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ValuationState {
    /// On-hand quantity (never negative).
    pub quantity: Decimal,
    /// Weighted-average unit cost.
    pub average_cost: Decimal,
}

impl ValuationState {
    pub const EMPTY: Self = Self {
        quantity: Decimal::ZERO,
        average_cost: Decimal::ZERO,
    };

    pub fn new(quantity: Decimal, average_cost: Decimal) -> Self {
        Self {
            quantity,
            average_cost,
        }
    }

    /// On-hand value at the current average cost (2 dp).
    pub fn on_hand_value(&self) -> Decimal {
        round_money(self.quantity * self.average_cost)
    }
}

/// The fully computed effect of one movement, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub movement_type: MovementType,
    pub direction: Direction,
    /// Positive magnitude of the movement (4 dp).
    pub magnitude: Decimal,
    /// Magnitude with the direction's sign applied (positive = stock increase).
    pub signed_quantity: Decimal,
    /// Unit cost applied to this movement: the supplied cost for incoming
    /// stock, the current average for outgoing stock (4 dp).
    pub unit_cost: Decimal,
    /// Monetary value of the movement: inventory value added for incoming,
    /// COGS for outgoing (2 dp).
    pub movement_value: Decimal,
    /// Post-movement on-hand quantity (4 dp).
    pub new_quantity: Decimal,
    /// Post-movement weighted-average unit cost (4 dp).
    pub new_average_cost: Decimal,
}

/// Core weighted-average computation for a single movement.
///
/// Rounding is applied once, on the outputs — intermediates stay exact so a
/// run of small movements does not compound rounding drift.
pub(crate) fn value_movement(
    state: &ValuationState,
    direction: Direction,
    magnitude: Decimal,
    unit_cost: Decimal,
) -> DomainResult<(Decimal, Decimal, Decimal)> {
    let quantity = non_negative(state.quantity, "current quantity")?;
    let average_cost = non_negative(state.average_cost, "current average cost")?;
    let magnitude = positive(magnitude, "movement quantity")?;
    let unit_cost = non_negative(unit_cost, "unit cost")?;

    match direction {
        Direction::Incoming => {
            let new_quantity = quantity + magnitude;
            // Degenerates to the incoming unit cost on a zero-stock product;
            // new_quantity > 0 here because magnitude > 0, so no 0/0.
            let new_average_cost = if quantity.is_zero() {
                unit_cost
            } else {
                (quantity * average_cost + magnitude * unit_cost) / new_quantity
            };
            let movement_value = magnitude * unit_cost;
            Ok((
                round_quantity(new_quantity),
                round_cost(new_average_cost),
                round_money(movement_value),
            ))
        }
        Direction::Outgoing => {
            if magnitude > quantity {
                return Err(DomainError::insufficient_stock(quantity, magnitude));
            }
            let new_quantity = quantity - magnitude;
            // Outgoing movements never alter the average.
            let movement_value = magnitude * average_cost;
            Ok((
                round_quantity(new_quantity),
                round_cost(average_cost),
                round_money(movement_value),
            ))
        }
    }
}

/// Derive a movement's direction and compute its full plan.
///
/// `quantity` is a positive magnitude for every movement type except
/// [`MovementType::Adjustment`], where the sign decides the direction
/// (negative = outgoing). A zero quantity is rejected rather than treated as
/// a no-op write, and so is a magnitude below the 4 dp resolution — it would
/// move no stock yet still record a movement.
pub fn plan_movement(
    state: &ValuationState,
    movement_type: MovementType,
    quantity: Decimal,
    unit_cost: Decimal,
) -> DomainResult<MovementPlan> {
    let (direction, magnitude) = match movement_type.fixed_direction() {
        Some(direction) => (direction, positive(quantity, "movement quantity")?),
        None => {
            if quantity.is_zero() {
                return Err(DomainError::invalid_input(
                    "adjustment quantity must not be zero",
                ));
            }
            if quantity.is_sign_negative() {
                (Direction::Outgoing, -quantity)
            } else {
                (Direction::Incoming, quantity)
            }
        }
    };

    // Quantize up front so the persisted magnitude and the ledger math agree;
    // a request that rounds away entirely is not a movement.
    let magnitude = round_quantity(magnitude);
    if magnitude.is_zero() {
        return Err(DomainError::invalid_input(
            "movement quantity rounds to zero at 4 decimal places",
        ));
    }

    let (new_quantity, new_average_cost, movement_value) =
        value_movement(state, direction, magnitude, unit_cost)?;

    let applied_unit_cost = match direction {
        Direction::Incoming => round_cost(unit_cost),
        Direction::Outgoing => round_cost(state.average_cost),
    };
    let signed_quantity = match direction {
        Direction::Incoming => magnitude,
        Direction::Outgoing => -magnitude,
    };

    Ok(MovementPlan {
        movement_type,
        direction,
        magnitude,
        signed_quantity,
        unit_cost: applied_unit_cost,
        movement_value,
        new_quantity,
        new_average_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state(quantity: Decimal, average_cost: Decimal) -> ValuationState {
        ValuationState::new(quantity, average_cost)
    }

    #[test]
    fn incoming_reweights_average() {
        // (10×100 + 10×200) / 20 = 150
        let plan = plan_movement(
            &state(dec!(10), dec!(100)),
            MovementType::Purchase,
            dec!(10),
            dec!(200),
        )
        .unwrap();

        assert_eq!(plan.new_quantity, dec!(20));
        assert_eq!(plan.new_average_cost, dec!(150));
        assert_eq!(plan.movement_value, dec!(2000.00));
        assert_eq!(plan.signed_quantity, dec!(10));
        assert_eq!(plan.unit_cost, dec!(200));
    }

    #[test]
    fn outgoing_preserves_average_and_values_at_it() {
        let plan = plan_movement(
            &state(dec!(20), dec!(150)),
            MovementType::Sale,
            dec!(5),
            dec!(999), // ignored: outgoing stock is valued at the average
        )
        .unwrap();

        assert_eq!(plan.new_quantity, dec!(15));
        assert_eq!(plan.new_average_cost, dec!(150));
        assert_eq!(plan.movement_value, dec!(750.00));
        assert_eq!(plan.signed_quantity, dec!(-5));
        assert_eq!(plan.unit_cost, dec!(150));
    }

    #[test]
    fn zero_stock_bootstrap_takes_incoming_cost() {
        let plan = plan_movement(
            &ValuationState::EMPTY,
            MovementType::Purchase,
            dec!(4),
            dec!(50),
        )
        .unwrap();

        assert_eq!(plan.new_quantity, dec!(4));
        assert_eq!(plan.new_average_cost, dec!(50));
        assert_eq!(plan.movement_value, dec!(200.00));
    }

    #[test]
    fn outgoing_beyond_stock_is_rejected() {
        let err = plan_movement(
            &state(dec!(10), dec!(25)),
            MovementType::Sale,
            dec!(100),
            dec!(0),
        )
        .unwrap_err();

        match err {
            DomainError::InsufficientStock {
                available,
                requested,
            } => {
                assert_eq!(available, dec!(10));
                assert_eq!(requested, dec!(100));
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn outgoing_entire_stock_reaches_exactly_zero() {
        let plan = plan_movement(
            &state(dec!(10), dec!(25)),
            MovementType::TransferOut,
            dec!(10),
            dec!(0),
        )
        .unwrap();

        assert_eq!(plan.new_quantity, Decimal::ZERO);
        assert_eq!(plan.new_average_cost, dec!(25));
    }

    #[test]
    fn adjustment_sign_picks_direction() {
        let up = plan_movement(
            &state(dec!(10), dec!(30)),
            MovementType::Adjustment,
            dec!(2),
            dec!(30),
        )
        .unwrap();
        assert_eq!(up.direction, Direction::Incoming);
        assert_eq!(up.new_quantity, dec!(12));

        let down = plan_movement(
            &state(dec!(10), dec!(30)),
            MovementType::Adjustment,
            dec!(-2),
            dec!(30),
        )
        .unwrap();
        assert_eq!(down.direction, Direction::Outgoing);
        assert_eq!(down.new_quantity, dec!(8));
        assert_eq!(down.signed_quantity, dec!(-2));
    }

    #[test]
    fn zero_quantity_is_rejected_for_every_type() {
        for mt in [
            MovementType::Purchase,
            MovementType::Sale,
            MovementType::Return,
            MovementType::Adjustment,
            MovementType::TransferIn,
            MovementType::TransferOut,
        ] {
            let err =
                plan_movement(&state(dec!(10), dec!(5)), mt, Decimal::ZERO, dec!(1)).unwrap_err();
            assert!(matches!(err, DomainError::InvalidInput(_)), "{mt}: {err:?}");
        }
    }

    #[test]
    fn negative_quantity_is_rejected_outside_adjustment() {
        let err = plan_movement(
            &state(dec!(10), dec!(5)),
            MovementType::Sale,
            dec!(-3),
            dec!(1),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn negative_unit_cost_is_rejected() {
        let err = plan_movement(
            &state(dec!(10), dec!(5)),
            MovementType::Purchase,
            dec!(3),
            dec!(-1),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn fractional_quantities_round_to_four_places() {
        let plan = plan_movement(
            &state(dec!(1.2345), dec!(10)),
            MovementType::Purchase,
            dec!(0.33333),
            dec!(12),
        )
        .unwrap();

        assert_eq!(plan.new_quantity, dec!(1.5678)); // 0.33333 quantizes to 0.3333
        assert!(plan.new_average_cost.scale() <= 4);
    }

    #[test]
    fn sub_resolution_quantity_is_rejected() {
        // 0.00004 survives the positivity check but is less than half a
        // quantity step; accepting it would book value against zero stock.
        for (mt, qty) in [
            (MovementType::Sale, dec!(0.00004)),
            (MovementType::Purchase, dec!(0.00004)),
            (MovementType::Adjustment, dec!(-0.00004)),
        ] {
            let err = plan_movement(&state(dec!(10), dec!(250)), mt, qty, dec!(250)).unwrap_err();
            assert!(matches!(err, DomainError::InvalidInput(_)), "{mt}: {err:?}");
        }
    }

    #[test]
    fn repeated_small_receipts_track_bulk_equivalent() {
        // 1000 receipts of 0.0001 alternating between 10 and 20 per unit must
        // land within rounding tolerance of one bulk receipt of 0.1 at the
        // blended 15 per unit.
        let mut state = ValuationState::EMPTY;
        for i in 0..1000u32 {
            let cost = if i % 2 == 0 { dec!(10) } else { dec!(20) };
            let plan =
                plan_movement(&state, MovementType::Purchase, dec!(0.0001), cost).unwrap();
            state = ValuationState::new(plan.new_quantity, plan.new_average_cost);
        }

        let bulk = plan_movement(
            &ValuationState::EMPTY,
            MovementType::Purchase,
            dec!(0.1),
            dec!(15),
        )
        .unwrap();

        assert_eq!(state.quantity, bulk.new_quantity);
        assert!(
            (state.average_cost - bulk.new_average_cost).abs() <= dec!(0.01),
            "average drifted: {} vs {}",
            state.average_cost,
            bulk.new_average_cost
        );
        assert!(
            (state.on_hand_value() - bulk.new_quantity * bulk.new_average_cost).abs()
                <= dec!(0.01),
            "value drifted: {} vs {}",
            state.on_hand_value(),
            bulk.new_quantity * bulk.new_average_cost
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Decimal with 4 dp in [0, 10_000].
        fn quantity_strategy() -> impl Strategy<Value = Decimal> {
            (0i64..=100_000_000).prop_map(|n| Decimal::new(n, 4))
        }

        /// Decimal with 4 dp in (0, 10_000].
        fn magnitude_strategy() -> impl Strategy<Value = Decimal> {
            (1i64..=100_000_000).prop_map(|n| Decimal::new(n, 4))
        }

        /// Decimal with 4 dp in [0, 100_000].
        fn cost_strategy() -> impl Strategy<Value = Decimal> {
            (0i64..=1_000_000_000).prop_map(|n| Decimal::new(n, 4))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: planning is deterministic (same inputs, same plan).
            #[test]
            fn plan_is_deterministic(
                qty in quantity_strategy(),
                avg in cost_strategy(),
                mag in magnitude_strategy(),
                cost in cost_strategy(),
            ) {
                let state = ValuationState::new(qty, avg);
                let a = plan_movement(&state, MovementType::Purchase, mag, cost);
                let b = plan_movement(&state, MovementType::Purchase, mag, cost);
                prop_assert_eq!(a, b);
            }

            /// Property: a successful outgoing movement never produces a
            /// negative quantity and never touches the average.
            #[test]
            fn outgoing_never_goes_negative(
                qty in quantity_strategy(),
                avg in cost_strategy(),
                mag in magnitude_strategy(),
            ) {
                let state = ValuationState::new(qty, avg);
                match plan_movement(&state, MovementType::Sale, mag, Decimal::ZERO) {
                    Ok(plan) => {
                        prop_assert!(plan.new_quantity >= Decimal::ZERO);
                        prop_assert_eq!(plan.new_average_cost, round_cost(avg));
                    }
                    Err(DomainError::InsufficientStock { available, requested }) => {
                        prop_assert!(requested > available);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
                }
            }

            /// Property: the incoming average lands between the old average
            /// and the incoming unit cost (within one rounding step).
            #[test]
            fn incoming_average_is_bounded(
                qty in quantity_strategy(),
                avg in cost_strategy(),
                mag in magnitude_strategy(),
                cost in cost_strategy(),
            ) {
                let state = ValuationState::new(qty, avg);
                let plan = plan_movement(&state, MovementType::Purchase, mag, cost).unwrap();
                let lo = avg.min(cost) - Decimal::new(1, 4);
                let hi = avg.max(cost) + Decimal::new(1, 4);
                if qty.is_zero() {
                    prop_assert_eq!(plan.new_average_cost, round_cost(cost));
                } else {
                    prop_assert!(plan.new_average_cost >= lo && plan.new_average_cost <= hi,
                        "average {} outside [{}, {}]", plan.new_average_cost, lo, hi);
                }
            }

            /// Property: incoming movements always grow quantity by the magnitude.
            #[test]
            fn incoming_adds_magnitude(
                qty in quantity_strategy(),
                avg in cost_strategy(),
                mag in magnitude_strategy(),
                cost in cost_strategy(),
            ) {
                let state = ValuationState::new(qty, avg);
                let plan = plan_movement(&state, MovementType::TransferIn, mag, cost).unwrap();
                prop_assert_eq!(plan.new_quantity, round_quantity(qty + mag));
            }
        }
    }
}
