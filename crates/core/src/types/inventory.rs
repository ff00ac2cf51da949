//! Stock-level arithmetic for the inventory ledger.
//!
//! Every stock-affecting code path in the service (checkout, webhook
//! reconciliation, the reaper, manual adjustments) computes its next state
//! through [`StockLevels`]. The repository layer only locks, loads, applies
//! one of these transitions, and writes the result back together with a
//! movement row; it never touches the counters directly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Violations of the stock ledger rules.
///
/// All variants are client-correctable: the enclosing transaction aborts and
/// the failure surfaces to the caller as a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Quantity must be strictly positive.
    #[error("quantity must be greater than zero (got {0})")]
    InvalidQuantity(i32),

    /// Not enough physical stock on hand.
    #[error("insufficient stock: on hand {on_hand}, requested {requested}")]
    InsufficientStock { on_hand: i32, requested: i32 },

    /// Not enough unreserved stock to place a hold.
    #[error("insufficient available stock: available {available}, requested {requested}")]
    InsufficientAvailable { available: i32, requested: i32 },

    /// Not enough reserved stock to release or confirm.
    #[error("insufficient reserved stock: reserved {reserved}, requested {requested}")]
    InsufficientReserved { reserved: i32, requested: i32 },
}

/// The two stored counters of a product's inventory record.
///
/// Derived quantities: `available = on_hand - reserved`. The invariant
/// `0 <= reserved <= on_hand` holds after every successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StockLevels {
    /// Physical units in the warehouse, regardless of pending orders.
    pub on_hand: i32,
    /// Units held against pending asynchronous orders.
    pub reserved: i32,
}

impl StockLevels {
    /// Create levels from the two stored counters.
    #[must_use]
    pub const fn new(on_hand: i32, reserved: i32) -> Self {
        Self { on_hand, reserved }
    }

    /// Units sellable right now.
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.on_hand - self.reserved
    }

    /// Receive stock into the warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidQuantity`] if `qty <= 0`.
    pub fn add(self, qty: i32) -> Result<Self, LedgerError> {
        check_qty(qty)?;
        Ok(Self {
            on_hand: self.on_hand + qty,
            reserved: self.reserved,
        })
    }

    /// Remove stock from the warehouse (direct sale, damage, shrinkage).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientStock`] if fewer than `qty` units
    /// are on hand.
    pub fn reduce(self, qty: i32) -> Result<Self, LedgerError> {
        check_qty(qty)?;
        if self.on_hand < qty {
            return Err(LedgerError::InsufficientStock {
                on_hand: self.on_hand,
                requested: qty,
            });
        }
        Ok(Self {
            on_hand: self.on_hand - qty,
            reserved: self.reserved,
        })
    }

    /// Hold units against a pending order without removing them.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientAvailable`] if fewer than `qty`
    /// unreserved units remain.
    pub fn reserve(self, qty: i32) -> Result<Self, LedgerError> {
        check_qty(qty)?;
        if self.available() < qty {
            return Err(LedgerError::InsufficientAvailable {
                available: self.available(),
                requested: qty,
            });
        }
        Ok(Self {
            on_hand: self.on_hand,
            reserved: self.reserved + qty,
        })
    }

    /// Give a reservation back (cancelled or abandoned order).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientReserved`] if fewer than `qty`
    /// units are currently reserved.
    pub fn release(self, qty: i32) -> Result<Self, LedgerError> {
        check_qty(qty)?;
        if self.reserved < qty {
            return Err(LedgerError::InsufficientReserved {
                reserved: self.reserved,
                requested: qty,
            });
        }
        Ok(Self {
            on_hand: self.on_hand,
            reserved: self.reserved - qty,
        })
    }

    /// Turn a reservation into a permanent stock deduction.
    ///
    /// The only transition that shrinks `on_hand` and `reserved` together.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientReserved`] or
    /// [`LedgerError::InsufficientStock`] if either counter is short.
    pub fn confirm_sale(self, qty: i32) -> Result<Self, LedgerError> {
        check_qty(qty)?;
        if self.reserved < qty {
            return Err(LedgerError::InsufficientReserved {
                reserved: self.reserved,
                requested: qty,
            });
        }
        if self.on_hand < qty {
            return Err(LedgerError::InsufficientStock {
                on_hand: self.on_hand,
                requested: qty,
            });
        }
        Ok(Self {
            on_hand: self.on_hand - qty,
            reserved: self.reserved - qty,
        })
    }

    /// Whether the ledger invariant holds.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        0 <= self.reserved && self.reserved <= self.on_hand
    }
}

const fn check_qty(qty: i32) -> Result<(), LedgerError> {
    if qty <= 0 {
        return Err(LedgerError::InvalidQuantity(qty));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_reduce() {
        let levels = StockLevels::default().add(10).unwrap();
        assert_eq!(levels, StockLevels::new(10, 0));

        let levels = levels.reduce(4).unwrap();
        assert_eq!(levels, StockLevels::new(6, 0));
    }

    #[test]
    fn test_invalid_quantities_rejected() {
        let levels = StockLevels::new(10, 0);
        for qty in [0, -1] {
            assert_eq!(levels.add(qty), Err(LedgerError::InvalidQuantity(qty)));
            assert_eq!(levels.reduce(qty), Err(LedgerError::InvalidQuantity(qty)));
            assert_eq!(levels.reserve(qty), Err(LedgerError::InvalidQuantity(qty)));
            assert_eq!(levels.release(qty), Err(LedgerError::InvalidQuantity(qty)));
            assert_eq!(
                levels.confirm_sale(qty),
                Err(LedgerError::InvalidQuantity(qty))
            );
        }
    }

    #[test]
    fn test_reduce_insufficient_stock() {
        let levels = StockLevels::new(3, 0);
        assert_eq!(
            levels.reduce(4),
            Err(LedgerError::InsufficientStock {
                on_hand: 3,
                requested: 4
            })
        );
    }

    #[test]
    fn test_reserve_respects_available() {
        let levels = StockLevels::new(10, 8);
        assert_eq!(levels.available(), 2);
        assert!(levels.reserve(2).is_ok());
        assert_eq!(
            levels.reserve(3),
            Err(LedgerError::InsufficientAvailable {
                available: 2,
                requested: 3
            })
        );
    }

    #[test]
    fn test_release_roundtrip_restores_reserved() {
        let before = StockLevels::new(10, 2);
        let after = before.reserve(5).unwrap().release(5).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn test_confirm_sale_clears_reservation_and_on_hand() {
        let before = StockLevels::new(10, 0);
        let reserved = before.reserve(3).unwrap();
        let after = reserved.confirm_sale(3).unwrap();

        // Net effect of reserve + confirm: on_hand down by qty, reserved back
        // to where it started.
        assert_eq!(after.on_hand, before.on_hand - 3);
        assert_eq!(after.reserved, before.reserved);
    }

    #[test]
    fn test_confirm_sale_requires_reservation() {
        let levels = StockLevels::new(10, 1);
        assert_eq!(
            levels.confirm_sale(2),
            Err(LedgerError::InsufficientReserved {
                reserved: 1,
                requested: 2
            })
        );
    }

    #[test]
    fn test_invariant_holds_across_transitions() {
        let mut levels = StockLevels::default();
        assert!(levels.is_consistent());

        for (op, qty) in [
            ("add", 20),
            ("reserve", 5),
            ("confirm", 3),
            ("release", 2),
            ("reduce", 10),
        ] {
            levels = match op {
                "add" => levels.add(qty).unwrap(),
                "reserve" => levels.reserve(qty).unwrap(),
                "confirm" => levels.confirm_sale(qty).unwrap(),
                "release" => levels.release(qty).unwrap(),
                _ => levels.reduce(qty).unwrap(),
            };
            assert!(levels.is_consistent(), "invariant broken after {op}");
        }
    }
}
