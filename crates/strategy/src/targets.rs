use common::models::{Direction, TargetLevels};

/// Stop and take-profit distances. Each level uses the wider of its ATR
/// multiple and its percentage-of-price floor.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPolicy {
    pub atr_stop: f64,
    pub atr_targets: [f64; 3],
    pub pct_stop: f64,
    pub pct_targets: [f64; 3],
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self {
            atr_stop: 1.5,
            atr_targets: [2.5, 4.0, 6.0],
            pct_stop: 0.015,
            pct_targets: [0.03, 0.05, 0.07],
        }
    }
}

impl TargetPolicy {
    /// A missing, zero or non-finite ATR falls back to the percentage rule.
    /// Short targets also fall back to it when the widest ATR target would
    /// reach zero, so every level stays a positive price.
    pub fn levels(&self, direction: Direction, price: f64, atr: Option<f64>) -> TargetLevels {
        let atr = atr.filter(|a| a.is_finite() && *a > 0.0).unwrap_or(0.0);
        let distance = |atr: f64, atr_mult: f64, pct: f64| (atr * atr_mult).max(price * pct);
        let sign = direction.sign();

        let stop = distance(atr, self.atr_stop, self.pct_stop);
        let widest = distance(atr, self.atr_targets[2], self.pct_targets[2]);
        let target_atr = match direction {
            Direction::Short if widest >= price => 0.0,
            _ => atr,
        };
        let [t1, t2, t3] =
            [0, 1, 2].map(|i| distance(target_atr, self.atr_targets[i], self.pct_targets[i]));

        TargetLevels {
            stop_loss: price - sign * stop,
            take_profit_1: price + sign * t1,
            take_profit_2: price + sign * t2,
            take_profit_3: price + sign * t3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn percentage_floor_for_quiet_markets() {
        let levels = TargetPolicy::default().levels(Direction::Long, 100.0, Some(0.1));
        assert_close(levels.stop_loss, 98.5);
        assert_close(levels.take_profit_1, 103.0);
        assert_close(levels.take_profit_2, 105.0);
        assert_close(levels.take_profit_3, 107.0);
    }

    #[test]
    fn atr_distances_for_volatile_markets() {
        let levels = TargetPolicy::default().levels(Direction::Short, 100.0, Some(2.0));
        assert_close(levels.stop_loss, 103.0);
        assert_close(levels.take_profit_1, 95.0);
        assert_close(levels.take_profit_2, 92.0);
        assert_close(levels.take_profit_3, 88.0);
    }

    #[test]
    fn mixes_per_level() {
        // atr 1.0: the ATR stop ties the floor and every target stays on the floor
        let levels = TargetPolicy::default().levels(Direction::Long, 100.0, Some(1.0));
        assert_close(levels.stop_loss, 98.5);
        assert_close(levels.take_profit_1, 103.0);

        // atr 1.6: every ATR distance is wider than its floor
        let levels = TargetPolicy::default().levels(Direction::Long, 100.0, Some(1.6));
        assert_close(levels.stop_loss, 97.6);
        assert_close(levels.take_profit_1, 104.0);
        assert_close(levels.take_profit_3, 109.6);
    }

    #[test]
    fn missing_atr_uses_percentages() {
        for atr in [None, Some(0.0), Some(f64::NAN)] {
            let levels = TargetPolicy::default().levels(Direction::Short, 200.0, atr);
            assert_close(levels.stop_loss, 203.0);
            assert_close(levels.take_profit_3, 186.0);
        }
    }

    #[test]
    fn levels_are_ordered_around_price() {
        for atr in [None, Some(0.5), Some(3.0), Some(40.0)] {
            let long = TargetPolicy::default().levels(Direction::Long, 150.0, atr);
            assert!(long.stop_loss < 150.0);
            assert!(150.0 < long.take_profit_1);
            assert!(long.take_profit_1 < long.take_profit_2);
            assert!(long.take_profit_2 < long.take_profit_3);

            let short = TargetPolicy::default().levels(Direction::Short, 150.0, atr);
            assert!(short.stop_loss > 150.0);
            assert!(150.0 > short.take_profit_1);
            assert!(short.take_profit_1 > short.take_profit_2);
            assert!(short.take_profit_2 > short.take_profit_3);
        }
    }

    #[test]
    fn short_targets_stay_above_zero_in_wild_markets() {
        // 6 x 40 would put TP3 at -90
        let short = TargetPolicy::default().levels(Direction::Short, 150.0, Some(40.0));
        assert_close(short.stop_loss, 210.0);
        assert_close(short.take_profit_1, 145.5);
        assert_close(short.take_profit_2, 142.5);
        assert_close(short.take_profit_3, 139.5);

        for atr in [Some(24.0), Some(25.0), Some(100.0), Some(1e6)] {
            let short = TargetPolicy::default().levels(Direction::Short, 150.0, atr);
            assert!(short.take_profit_3 > 0.0, "{atr:?}: {short:?}");
            assert!(short.take_profit_1 > short.take_profit_2);
            assert!(short.take_profit_2 > short.take_profit_3);
        }
    }
}
