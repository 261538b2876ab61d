use chrono::{DateTime, Utc};

use crate::book::PositionBook;
use crate::config::Config;
use crate::market::IndicatorSnapshot;
use crate::models::{Direction, IntentAction, Stage};
use crate::strategy::cooldowns::{CooldownKind, CooldownRegistry};

/// Everything the decision function reads for one tick. The function itself
/// is pure: same inputs, same decision.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub price: f64,
    pub indicators: IndicatorSnapshot,
    pub book: &'a PositionBook,
    pub cooldowns: &'a CooldownRegistry,
    pub cfg: &'a Config,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: IntentAction,
    pub direction: Direction,
}

/// SL/TP width multiplier by age of the oldest lot. Bands are half-open at
/// their lower bound: exactly one hour held is already the 2.5 band.
pub fn age_factor(age_secs: i64) -> f64 {
    if age_secs < 60 * 60 {
        3.0
    } else if age_secs < 2 * 60 * 60 {
        2.5
    } else if age_secs < 12 * 60 * 60 {
        2.0
    } else if age_secs < 24 * 60 * 60 {
        1.5
    } else {
        1.0
    }
}

/// Evaluate the strategy for one tick: at most one decision, first matching
/// rule wins. Exits dominate entries; per-lot mechanical stops dominate
/// structural exits; risk reduction dominates risk addition.
pub fn evaluate(ctx: &EvalContext<'_>) -> Option<Decision> {
    if ctx.cooldowns.pending().is_some() {
        return None;
    }

    match ctx.book.direction() {
        Some(direction) => evaluate_open_book(ctx, direction),
        None => evaluate_flat(ctx),
    }
}

fn evaluate_open_book(ctx: &EvalContext<'_>, direction: Direction) -> Option<Decision> {
    let price = ctx.price;
    let ma = ctx.indicators.ma;
    let mom = ctx.indicators.momentum;
    let thr = ctx.cfg.ma_thr_eff;
    let book = ctx.book;
    let long = direction == Direction::Long;

    let oldest = book.oldest()?;
    let newest = book.newest()?;

    // 1) STOP_LOSS on the oldest lot, width scaled down as it ages.
    let factor = age_factor(oldest.age_secs(ctx.now));
    let band = oldest.ma_thr_at_entry * factor;
    let sl_hit = if long {
        price <= oldest.entry_price * (1.0 - band)
    } else {
        price >= oldest.entry_price * (1.0 + band)
    };
    if sl_hit {
        return Some(Decision {
            action: IntentAction::StopLoss {
                target_lot: oldest.id,
            },
            direction,
        });
    }

    // 2) TAKE_PROFIT on the oldest lot, same band.
    let tp_hit = if long {
        price >= oldest.entry_price * (1.0 + band)
    } else {
        price <= oldest.entry_price * (1.0 - band)
    };
    if tp_hit {
        return Some(Decision {
            action: IntentAction::TakeProfit {
                target_lot: oldest.id,
            },
            direction,
        });
    }

    // 3) NORMAL_EXIT: price through the MA band on the profitable side
    // closes everything.
    let normal_hit = if long {
        price >= ma * (1.0 + thr)
    } else {
        price <= ma * (1.0 - thr)
    };
    if normal_hit {
        return Some(Decision {
            action: IntentAction::NormalExit {
                target_lots: book.lot_ids(),
            },
            direction,
        });
    }

    // 4) RISK_CONTROL: near-full book with the average entry favourable.
    if book.len() + 1 == ctx.cfg.max_lots || book.len() == ctx.cfg.max_lots {
        if let Some(avg) = book.avg_entry_price() {
            let rc = ctx.cfg.risk_control_threshold;
            let favourable = if long {
                price >= avg * (1.0 + rc)
            } else {
                price <= avg * (1.0 - rc)
            };
            if favourable {
                let close_all = book.len() == ctx.cfg.max_lots;
                let target_lots = if close_all {
                    book.lot_ids()
                } else {
                    vec![oldest.id]
                };
                return Some(Decision {
                    action: IntentAction::RiskControl {
                        target_lots,
                        close_all,
                    },
                    direction,
                });
            }
        }
    }

    // 5) NEAR_TOUCH: a fresh newest lot exits when price comes back within
    // eps of the MA.
    if newest.age_secs(ctx.now) <= ctx.cfg.near_touch_window_secs as i64
        && (price - ma).abs() <= ctx.cfg.near_touch_eps * ma
    {
        return Some(Decision {
            action: IntentAction::NearTouch {
                target_lot: newest.id,
            },
            direction,
        });
    }

    // 6) SCALE_OUT of the newest lot: recovered past the last remaining
    // entry and half the MA band. No momentum gate. The single-lot case is
    // INIT_OUT's territory.
    if book.len() >= 2 && !ctx.cooldowns.active(CooldownKind::ScaleOut, ctx.now) {
        let prev_entry = book.prev_entry_price()?;
        let hit = if long {
            price >= prev_entry && price >= ma * (1.0 + thr / 2.0)
        } else {
            price <= prev_entry && price <= ma * (1.0 - thr / 2.0)
        };
        if hit {
            return Some(Decision {
                action: IntentAction::ScaleOut {
                    target_lot: newest.id,
                },
                direction,
            });
        }
    }

    // 7) INIT_OUT: a lone lot exits at half band with momentum confirming.
    if book.len() == 1 {
        let hit = if long {
            price >= ma * (1.0 + thr / 2.0) && mom >= ctx.cfg.momentum_threshold
        } else {
            price <= ma * (1.0 - thr / 2.0) && -mom >= ctx.cfg.momentum_threshold
        };
        if hit {
            return Some(Decision {
                action: IntentAction::InitOut {
                    target_lot: oldest.id,
                },
                direction,
            });
        }
    }

    // 8) SCALE_IN: adverse move past the newest entry with momentum still
    // against the book.
    if book.len() < ctx.cfg.max_lots && !ctx.cooldowns.active(CooldownKind::ScaleIn, ctx.now) {
        let hit = if long {
            price < newest.entry_price
                && -mom >= ctx.cfg.momentum_threshold
                && price <= ma * (1.0 - thr / 2.0)
        } else {
            price > newest.entry_price
                && mom >= ctx.cfg.momentum_threshold
                && price >= ma * (1.0 + thr / 2.0)
        };
        if hit {
            return Some(Decision {
                action: IntentAction::ScaleIn,
                direction,
            });
        }
    }

    // 9) INIT2 / INIT3: laddered follow-ups off the INIT entry price while
    // the INIT lot is inside its watch window.
    if oldest.stage.is_init() && oldest.age_secs(ctx.now) <= ctx.cfg.init_window_secs as i64 {
        let follow = match book.len() {
            1 => Some((1.0, IntentAction::Init2 { anchor_lot: oldest.id })),
            2 if newest.stage == Stage::Init2 => {
                Some((2.0, IntentAction::Init3 { anchor_lot: oldest.id }))
            }
            _ => None,
        };
        if let Some((k, action)) = follow {
            let hit = if long {
                price <= oldest.entry_price * (1.0 - thr * k)
            } else {
                price >= oldest.entry_price * (1.0 + thr * k)
            };
            if hit {
                return Some(Decision { action, direction });
            }
        }
    }

    None
}

// 10) INIT: flat book, price stretched past the MA band with momentum
// confirming the move.
fn evaluate_flat(ctx: &EvalContext<'_>) -> Option<Decision> {
    let price = ctx.price;
    let ma = ctx.indicators.ma;
    let mom = ctx.indicators.momentum;
    let thr = ctx.cfg.ma_thr_eff;
    let mom_thr = ctx.cfg.momentum_threshold;

    if price <= ma * (1.0 - thr) && -mom >= mom_thr {
        return Some(Decision {
            action: IntentAction::Init,
            direction: Direction::Long,
        });
    }
    if price >= ma * (1.0 + thr) && mom >= mom_thr {
        return Some(Decision {
            action: IntentAction::Init,
            direction: Direction::Short,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lot;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn cfg() -> Config {
        Config::default()
    }

    fn lot_at(
        direction: Direction,
        entry_price: f64,
        entry_secs: i64,
        stage: Stage,
        ma_thr: f64,
    ) -> Lot {
        Lot {
            id: Uuid::new_v4(),
            symbol: "BTCUSD".to_string(),
            direction,
            entry_price,
            entry_ts: ts(entry_secs),
            size: 1.0,
            stage,
            ma_thr_at_entry: ma_thr,
        }
    }

    fn snap(ma: f64, momentum: f64) -> IndicatorSnapshot {
        IndicatorSnapshot { ma, momentum }
    }

    fn eval(
        price: f64,
        indicators: IndicatorSnapshot,
        book: &PositionBook,
        cooldowns: &CooldownRegistry,
        cfg: &Config,
        now: DateTime<Utc>,
    ) -> Option<Decision> {
        evaluate(&EvalContext {
            price,
            indicators,
            book,
            cooldowns,
            cfg,
            now,
        })
    }

    #[test]
    fn test_age_factor_bands() {
        assert_eq!(age_factor(0), 3.0);
        assert_eq!(age_factor(3599), 3.0);
        assert_eq!(age_factor(3600), 2.5);
        assert_eq!(age_factor(7199), 2.5);
        assert_eq!(age_factor(7200), 2.0);
        assert_eq!(age_factor(43199), 2.0);
        assert_eq!(age_factor(43200), 1.5);
        assert_eq!(age_factor(86399), 1.5);
        assert_eq!(age_factor(86400), 1.0);
    }

    #[test]
    fn test_init_long_fires() {
        let book = PositionBook::new("BTCUSD", 4);
        let cd = CooldownRegistry::new();
        let decision = eval(98.9, snap(100.0, -0.004), &book, &cd, &cfg(), ts(0)).unwrap();
        assert_eq!(decision.action, IntentAction::Init);
        assert_eq!(decision.direction, Direction::Long);
    }

    #[test]
    fn test_init_short_fires() {
        let book = PositionBook::new("BTCUSD", 4);
        let cd = CooldownRegistry::new();
        let decision = eval(101.1, snap(100.0, 0.004), &book, &cd, &cfg(), ts(0)).unwrap();
        assert_eq!(decision.action, IntentAction::Init);
        assert_eq!(decision.direction, Direction::Short);
    }

    #[test]
    fn test_init_needs_momentum() {
        let book = PositionBook::new("BTCUSD", 4);
        let cd = CooldownRegistry::new();
        // Price stretched but momentum flat.
        assert!(eval(98.9, snap(100.0, -0.001), &book, &cd, &cfg(), ts(0)).is_none());
        // Momentum there but price inside the band.
        assert!(eval(99.5, snap(100.0, -0.004), &book, &cd, &cfg(), ts(0)).is_none());
    }

    #[test]
    fn test_pending_intent_blocks_everything() {
        let book = PositionBook::new("BTCUSD", 4);
        let mut cd = CooldownRegistry::new();
        cd.set_pending(Uuid::new_v4(), ts(0));
        assert!(eval(98.9, snap(100.0, -0.004), &book, &cd, &cfg(), ts(1)).is_none());
    }

    #[test]
    fn test_stop_loss_on_oldest() {
        let mut book = PositionBook::new("BTCUSD", 4);
        let lot = lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.01);
        let lot_id = lot.id;
        book.append(lot).unwrap();
        let cd = CooldownRegistry::new();

        // Age 30min -> factor 3.0, band 3% -> trigger at 96.03.
        let now = ts(30 * 60);
        let decision = eval(96.02, snap(100.0, 0.0), &book, &cd, &cfg(), now).unwrap();
        assert_eq!(decision.action, IntentAction::StopLoss { target_lot: lot_id });

        assert!(eval(96.04, snap(100.0, 0.0), &book, &cd, &cfg(), now).is_none());
    }

    #[test]
    fn test_stop_loss_band_narrows_with_age() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.01)).unwrap();
        let cd = CooldownRegistry::new();

        // At 30min the band is 3% and 96.6 does not trigger.
        assert!(eval(96.6, snap(100.0, 0.0), &book, &cd, &cfg(), ts(30 * 60)).is_none());
        // At exactly 1h the band shrinks to 2.5% (96.525); now it does.
        let decision = eval(96.5, snap(100.0, 0.0), &book, &cd, &cfg(), ts(60 * 60)).unwrap();
        assert!(matches!(decision.action, IntentAction::StopLoss { .. }));
    }

    #[test]
    fn test_take_profit_short() {
        let mut book = PositionBook::new("BTCUSD", 4);
        let lot = lot_at(Direction::Short, 101.0, 0, Stage::Init, 0.01);
        let lot_id = lot.id;
        book.append(lot).unwrap();
        let cd = CooldownRegistry::new();

        // factor 3.0 -> band 3% -> TP at 101 * 0.97 = 97.97.
        let decision = eval(97.9, snap(100.0, 0.0), &book, &cd, &cfg(), ts(600)).unwrap();
        assert_eq!(
            decision.action,
            IntentAction::TakeProfit { target_lot: lot_id }
        );
    }

    #[test]
    fn test_normal_exit_closes_all() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05)).unwrap();
        book.append(lot_at(Direction::Long, 98.5, 60, Stage::ScaleIn(2), 0.05)).unwrap();
        let cd = CooldownRegistry::new();

        // Wide per-lot bands keep SL/TP quiet; 101.05 >= 100 * 1.01.
        let decision = eval(101.05, snap(100.0, 0.0), &book, &cd, &cfg(), ts(120)).unwrap();
        match decision.action {
            IntentAction::NormalExit { target_lots } => assert_eq!(target_lots.len(), 2),
            other => panic!("expected NORMAL_EXIT, got {other:?}"),
        }
    }

    #[test]
    fn test_risk_control_three_lots_closes_oldest() {
        let mut book = PositionBook::new("BTCUSD", 4);
        let first = lot_at(Direction::Long, 98.5, 0, Stage::Init, 0.05);
        let oldest_id = first.id;
        book.append(first).unwrap();
        book.append(lot_at(Direction::Long, 98.0, 60, Stage::ScaleIn(2), 0.05)).unwrap();
        book.append(lot_at(Direction::Long, 97.5, 120, Stage::ScaleIn(3), 0.05)).unwrap();
        let cd = CooldownRegistry::new();

        // avg = 98.0; 0.3% above = 98.294.
        let decision = eval(98.3, snap(100.0, 0.0), &book, &cd, &cfg(), ts(180)).unwrap();
        assert_eq!(
            decision.action,
            IntentAction::RiskControl {
                target_lots: vec![oldest_id],
                close_all: false
            }
        );
    }

    #[test]
    fn test_risk_control_four_lots_closes_all() {
        let mut book = PositionBook::new("BTCUSD", 4);
        for (i, price) in [98.5, 98.0, 97.8, 97.7].iter().enumerate() {
            book.append(lot_at(
                Direction::Long,
                *price,
                i as i64 * 60,
                if i == 0 { Stage::Init } else { Stage::ScaleIn(i as u32 + 1) },
                0.05,
            ))
            .unwrap();
        }
        let cd = CooldownRegistry::new();

        // avg = 98.0; tick at 98.3 is favourable by more than 0.3%.
        let decision = eval(98.3, snap(100.0, 0.0), &book, &cd, &cfg(), ts(300)).unwrap();
        match decision.action {
            IntentAction::RiskControl {
                target_lots,
                close_all,
            } => {
                assert!(close_all);
                assert_eq!(target_lots.len(), 4);
            }
            other => panic!("expected RISK_CONTROL, got {other:?}"),
        }
    }

    #[test]
    fn test_near_touch_closes_newest() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 98.0, 0, Stage::Init, 0.05)).unwrap();
        let newest = lot_at(Direction::Long, 97.5, 60, Stage::ScaleIn(2), 0.05);
        let newest_id = newest.id;
        book.append(newest).unwrap();
        let cd = CooldownRegistry::new();

        // Newest is fresh and price is within eps of the MA.
        let decision = eval(99.95, snap(100.0, 0.0), &book, &cd, &cfg(), ts(120)).unwrap();
        assert_eq!(
            decision.action,
            IntentAction::NearTouch {
                target_lot: newest_id
            }
        );
    }

    #[test]
    fn test_near_touch_expires_with_window() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 98.0, 0, Stage::Init, 0.05)).unwrap();
        let cd = CooldownRegistry::new();

        // Newest lot is older than the window; price near MA no longer exits.
        let now = ts(60 * 60 + 1);
        assert!(eval(99.95, snap(100.0, 0.0), &book, &cd, &cfg(), now).is_none());
    }

    #[test]
    fn test_scale_out_newest() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05)).unwrap();
        let newest = lot_at(Direction::Long, 100.4, 60, Stage::ScaleIn(2), 0.05);
        let newest_id = newest.id;
        book.append(newest).unwrap();
        let cd = CooldownRegistry::new();

        // Outside the near-touch eps, above the newest entry and above
        // ma * (1 + thr/2) = 100.5.
        let now = ts(2 * 60 * 60);
        let decision = eval(100.6, snap(100.0, 0.0), &book, &cd, &cfg(), now).unwrap();
        assert_eq!(
            decision.action,
            IntentAction::ScaleOut {
                target_lot: newest_id
            }
        );
    }

    #[test]
    fn test_scale_out_respects_cooldown() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05)).unwrap();
        book.append(lot_at(Direction::Long, 100.4, 60, Stage::ScaleIn(2), 0.05)).unwrap();
        let mut cd = CooldownRegistry::new();
        let now = ts(2 * 60 * 60);
        cd.arm(CooldownKind::ScaleOut, now, 1800);

        assert!(eval(100.6, snap(100.0, 0.0), &book, &cd, &cfg(), now).is_none());
    }

    #[test]
    fn test_init_out_single_lot_with_momentum() {
        let mut book = PositionBook::new("BTCUSD", 4);
        let only = lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05);
        let only_id = only.id;
        book.append(only).unwrap();
        let cd = CooldownRegistry::new();

        let now = ts(2 * 60 * 60);
        let decision = eval(100.6, snap(100.0, 0.004), &book, &cd, &cfg(), now).unwrap();
        assert_eq!(decision.action, IntentAction::InitOut { target_lot: only_id });

        // Without momentum confirmation nothing fires.
        assert!(eval(100.6, snap(100.0, 0.001), &book, &cd, &cfg(), now).is_none());
    }

    #[test]
    fn test_scale_in_long() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 98.9, 0, Stage::Init, 0.05)).unwrap();
        let cd = CooldownRegistry::new();

        // 10 minutes in, price under the newest entry, under ma*(1-thr/2),
        // momentum still falling. INIT2 does not shadow it: price is above
        // the INIT2 ladder at 97.91.
        let decision = eval(98.4, snap(100.0, -0.004), &book, &cd, &cfg(), ts(600)).unwrap();
        assert_eq!(decision.action, IntentAction::ScaleIn);
        assert_eq!(decision.direction, Direction::Long);
    }

    #[test]
    fn test_scale_in_blocked_by_cooldown() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 98.9, 0, Stage::Init, 0.05)).unwrap();
        let mut cd = CooldownRegistry::new();
        cd.arm(CooldownKind::ScaleIn, ts(600), 1800);

        assert!(eval(98.4, snap(100.0, -0.004), &book, &cd, &cfg(), ts(900)).is_none());
    }

    #[test]
    fn test_scale_in_blocked_at_max_lots() {
        let mut book = PositionBook::new("BTCUSD", 4);
        for (i, price) in [99.0, 98.5, 98.0, 97.5].iter().enumerate() {
            book.append(lot_at(
                Direction::Long,
                *price,
                i as i64 * 60,
                if i == 0 { Stage::Init } else { Stage::ScaleIn(i as u32 + 1) },
                0.05,
            ))
            .unwrap();
        }
        let cd = CooldownRegistry::new();
        // Price low enough for a scale-in, but the book is full and the
        // average is unfavourable, so nothing fires.
        assert!(eval(97.0, snap(100.0, -0.004), &book, &cd, &cfg(), ts(300)).is_none());
    }

    #[test]
    fn test_init2_ladder() {
        let mut book = PositionBook::new("BTCUSD", 4);
        let init = lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05);
        let init_id = init.id;
        book.append(init).unwrap();
        let cd = CooldownRegistry::new();

        // Inside the 15-minute window, price at INIT * (1 - thr) = 98.01,
        // momentum quiet so SCALE_IN stays out of the way.
        let decision = eval(98.0, snap(100.0, -0.001), &book, &cd, &cfg(), ts(600)).unwrap();
        assert_eq!(decision.action, IntentAction::Init2 { anchor_lot: init_id });
    }

    #[test]
    fn test_init2_unreachable_after_window() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05)).unwrap();
        let cd = CooldownRegistry::new();

        assert!(eval(98.0, snap(100.0, -0.001), &book, &cd, &cfg(), ts(15 * 60 + 1)).is_none());
    }

    #[test]
    fn test_init3_requires_init2_stage() {
        let mut book = PositionBook::new("BTCUSD", 4);
        let init = lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05);
        let init_id = init.id;
        book.append(init).unwrap();
        book.append(lot_at(Direction::Long, 98.0, 60, Stage::Init2, 0.05)).unwrap();
        let cd = CooldownRegistry::new();

        // INIT * (1 - 2 * thr) = 97.02.
        let decision = eval(97.0, snap(100.0, -0.001), &book, &cd, &cfg(), ts(600)).unwrap();
        assert_eq!(decision.action, IntentAction::Init3 { anchor_lot: init_id });
    }

    #[test]
    fn test_init3_not_after_scale_in() {
        let mut book = PositionBook::new("BTCUSD", 4);
        book.append(lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.05)).unwrap();
        book.append(lot_at(Direction::Long, 98.0, 60, Stage::ScaleIn(2), 0.05)).unwrap();
        let cd = CooldownRegistry::new();

        assert!(eval(97.0, snap(100.0, -0.001), &book, &cd, &cfg(), ts(600)).is_none());
    }

    #[test]
    fn test_init2_short_symmetric() {
        let mut book = PositionBook::new("BTCUSD", 4);
        let init = lot_at(Direction::Short, 101.0, 0, Stage::Init, 0.05);
        let init_id = init.id;
        book.append(init).unwrap();
        let cd = CooldownRegistry::new();

        // INIT * (1 + thr) = 102.01.
        let decision = eval(102.1, snap(100.0, 0.001), &book, &cd, &cfg(), ts(600)).unwrap();
        assert_eq!(decision.action, IntentAction::Init2 { anchor_lot: init_id });
    }

    #[test]
    fn test_exit_dominates_entry() {
        let mut book = PositionBook::new("BTCUSD", 4);
        // Narrow per-lot band so the stop-loss competes with SCALE_IN.
        book.append(lot_at(Direction::Long, 99.0, 0, Stage::Init, 0.001)).unwrap();
        let cd = CooldownRegistry::new();

        // 98.4 satisfies both the stop-loss (band 0.3%) and the scale-in
        // guards; the stop-loss wins.
        let decision = eval(98.4, snap(100.0, -0.004), &book, &cd, &cfg(), ts(600)).unwrap();
        assert!(matches!(decision.action, IntentAction::StopLoss { .. }));
    }
}
