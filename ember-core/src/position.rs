use serde::{Deserialize, Serialize};

/// Mirrors `src/portfolio/position.rs`'s realized/unrealized split, with
/// fees tracked separately so `net_realized` never conflates "realized
/// net of fees" with "realized gross" — the first Open Question in
/// `spec.md` §9.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pos: f64,
    pub avg_px: f64,
    pub mark: f64,
    pub realized_gross: f64,
    pub fees_paid: f64,
}

impl Position {
    pub fn flat() -> Self {
        Self {
            pos: 0.0,
            avg_px: 0.0,
            mark: 0.0,
            realized_gross: 0.0,
            fees_paid: 0.0,
        }
    }

    /// Realized PnL net of fees. Never computed implicitly elsewhere —
    /// `realized_gross` and `fees_paid` stay separate fields everywhere
    /// else in the system.
    pub fn net_realized(&self) -> f64 {
        self.realized_gross - self.fees_paid
    }

    /// Unrealized PnL at the current mark.
    pub fn unrealized(&self) -> f64 {
        self.pos * (self.mark - self.avg_px)
    }

    /// Applies a fill to this position using weighted-average-price
    /// accounting: fills that extend the position update `avg_px`; fills
    /// that reduce or flip it realize PnL on the closed portion.
    pub fn apply_fill(&mut self, signed_qty: f64, px: f64, fee: f64) {
        self.fees_paid += fee;

        if self.pos == 0.0 || self.pos.signum() == signed_qty.signum() {
            let new_pos = self.pos + signed_qty;
            if new_pos != 0.0 {
                self.avg_px = (self.avg_px * self.pos.abs() + px * signed_qty.abs()) / new_pos.abs();
            }
            self.pos = new_pos;
            return;
        }

        // Reducing or flipping: realize PnL on the smaller of |pos| and |signed_qty|.
        let closing_qty = signed_qty.abs().min(self.pos.abs());
        let direction = self.pos.signum();
        self.realized_gross += direction * closing_qty * (px - self.avg_px);

        let remaining = self.pos + signed_qty;
        if remaining.signum() != self.pos.signum() && remaining != 0.0 {
            // Flipped through zero: the excess opens a new position at `px`.
            self.avg_px = px;
        }
        self.pos = remaining;
        if self.pos == 0.0 {
            self.avg_px = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_then_closing_realizes_gross_pnl() {
        let mut p = Position::flat();
        p.apply_fill(10.0, 100.0, 0.5);
        assert_eq!(p.pos, 10.0);
        assert_eq!(p.avg_px, 100.0);

        p.apply_fill(-10.0, 110.0, 0.5);
        assert_eq!(p.pos, 0.0);
        assert_eq!(p.realized_gross, 100.0);
        assert_eq!(p.fees_paid, 1.0);
        assert_eq!(p.net_realized(), 99.0);
    }

    #[test]
    fn flipping_through_zero_opens_new_avg_px() {
        let mut p = Position::flat();
        p.apply_fill(10.0, 100.0, 0.0);
        p.apply_fill(-15.0, 105.0, 0.0);
        assert_eq!(p.pos, -5.0);
        assert_eq!(p.avg_px, 105.0);
        assert_eq!(p.realized_gross, 50.0);
    }
}
