//! Folds positions and resolved prices into net quantity and signed notional.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::pricing::Resolution;
use crate::types::{NetPosition, Position, PriceSource};

/// One position's contribution to the totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureLine {
    pub symbol: String,
    pub underlying: Option<String>,
    pub root: String,
    pub quantity: i64,
    pub size: f64,
    pub price: Option<f64>,
    pub source: Option<PriceSource>,
    /// `price * size * quantity`, or 0 when unpriced
    pub notional: f64,
}

/// Totals across all positions of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exposure {
    pub net_quantity: i64,
    pub total_notional: f64,
    pub position_count: usize,
    pub unresolved_count: usize,
    pub sources: BTreeSet<PriceSource>,
    pub lines: Vec<ExposureLine>,
}

/// Distinguishes "nothing to price" from "nothing priced" from a real total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NotionalStatus {
    NoPositions,
    Unpriced { unresolved: usize, total: usize },
    Partial { unresolved: usize, total: usize },
    Priced,
}

impl Exposure {
    pub fn status(&self) -> NotionalStatus {
        match (self.position_count, self.unresolved_count) {
            (0, _) => NotionalStatus::NoPositions,
            (_, 0) => NotionalStatus::Priced,
            (total, unresolved) if unresolved == total => {
                NotionalStatus::Unpriced { unresolved, total }
            }
            (total, unresolved) => NotionalStatus::Partial { unresolved, total },
        }
    }

    pub fn net_position(&self) -> NetPosition {
        NetPosition::from_quantity(self.net_quantity)
    }

    /// "(Manual)", "(Live)", "(Proxy)" or "(Mixed)" depending on which sources priced something.
    pub fn source_label(&self) -> Option<String> {
        let mut iter = self.sources.iter();
        match (iter.next(), iter.next()) {
            (None, _) => None,
            (Some(only), None) => Some(format!("({only})")),
            (Some(_), Some(_)) => Some("(Mixed)".to_string()),
        }
    }
}

/// Sum signed quantity and signed notional. Unresolved prices contribute 0 and are counted.
pub fn aggregate<R, S>(positions: &[Position], resolve: R, size_of: S) -> Exposure
where
    R: Fn(&str) -> Resolution,
    S: Fn(&str, Option<f64>) -> f64,
{
    let mut exposure = Exposure {
        net_quantity: 0,
        total_notional: 0.0,
        position_count: positions.len(),
        unresolved_count: 0,
        sources: BTreeSet::new(),
        lines: Vec::with_capacity(positions.len()),
    };

    for position in positions {
        exposure.net_quantity = exposure.net_quantity.saturating_add(position.quantity);

        let size = size_of(&position.root, position.multiplier);
        let (price, source, notional) = match resolve(&position.symbol) {
            Resolution::Resolved { price, source } => {
                let notional = price * size * position.quantity as f64;
                exposure.total_notional += notional;
                exposure.sources.insert(source);
                (Some(price), Some(source), notional)
            }
            Resolution::Unresolved => {
                exposure.unresolved_count += 1;
                (None, None, 0.0)
            }
        };

        exposure.lines.push(ExposureLine {
            symbol: position.symbol.clone(),
            underlying: position.underlying.clone(),
            root: position.root.clone(),
            quantity: position.quantity,
            size,
            price,
            source,
            notional,
        });
    }

    exposure
}
