use std::fmt::Write;

use common::models::{Direction, SignalDecision};

/// Decimal places for a quote price: large prices keep cents, sub-cent
/// tokens keep enough digits to stay distinguishable.
pub fn price_precision(price: f64) -> usize {
    let magnitude = price.abs();
    if magnitude >= 1000.0 {
        2
    } else if magnitude >= 1.0 {
        4
    } else if magnitude >= 0.01 {
        6
    } else {
        8
    }
}

/// Renders an actionable decision as the chat message. Returns `None` for a
/// decision without direction or targets.
pub fn format_alert(decision: &SignalDecision) -> Option<String> {
    let direction = decision.direction?;
    let targets = decision.targets?;
    let precision = price_precision(decision.price);

    let header = match direction {
        Direction::Long => "📈",
        Direction::Short => "📉",
    };

    let mut text = format!("{header} {} {direction}\n", decision.symbol);
    let _ = writeln!(text, "Price: {:.*}", precision, decision.price);
    let _ = writeln!(text, "SL: {:.*}", precision, targets.stop_loss);
    let _ = writeln!(text, "TP1: {:.*}", precision, targets.take_profit_1);
    let _ = writeln!(text, "TP2: {:.*}", precision, targets.take_profit_2);
    let _ = writeln!(text, "TP3: {:.*}", precision, targets.take_profit_3);
    let _ = writeln!(
        text,
        "Score: {:.2} / {:.2}",
        decision.long_score, decision.short_score
    );
    let _ = write!(text, "Reasons: {}", decision.reasons.join(", "));

    Some(text)
}
