//! Leverage and the fixed-breakpoint risk scale.

use serde::Serialize;

use crate::exposure::Exposure;

/// Discrete risk classification of a leverage ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskTier {
    Normal,
    Low,
    SlightlyElevated,
    Elevated,
    LimitsBreached,
    Extreme,
    ShortSomeRisk,
    ShortElevated,
    ShortHigh,
    ShortExtreme,
    /// Leverage outside every range (only possible for NaN)
    NotAvailable,
}

/// Background / foreground colour pair for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierColors {
    pub background: &'static str,
    pub foreground: &'static str,
}

const NEUTRAL: TierColors = TierColors {
    background: "#f0f2f5",
    foreground: "#1c1e21",
};
const CAUTION: TierColors = TierColors {
    background: "#fff3cd",
    foreground: "#664d03",
};
const WARNING: TierColors = TierColors {
    background: "#fd7e14",
    foreground: "#ffffff",
};
const DANGER: TierColors = TierColors {
    background: "#dc3545",
    foreground: "#ffffff",
};

impl RiskTier {
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Normal => "Normal Risk (Market Risk)",
            RiskTier::Low => "Low Risk (Below Market Risk)",
            RiskTier::SlightlyElevated => "Slightly Elevated Risk",
            RiskTier::Elevated => "Elevated Risk (Above Market Risk)",
            RiskTier::LimitsBreached => "Risk Limits Breached: CHECK IN",
            RiskTier::Extreme => "EXTREME RISK: CUT ALL POSITIONS.",
            RiskTier::ShortSomeRisk => "Some Risk (Net Short)",
            RiskTier::ShortElevated => "Elevated Risk (Net Short)",
            RiskTier::ShortHigh => "High Risk: CHECK IN (Net Short)",
            RiskTier::ShortExtreme => "EXTREME RISK: CUT ALL POSITIONS. (Net Short)",
            RiskTier::NotAvailable => "N/A",
        }
    }

    pub fn colors(&self) -> TierColors {
        match self {
            RiskTier::Normal | RiskTier::Low | RiskTier::NotAvailable => NEUTRAL,
            RiskTier::SlightlyElevated | RiskTier::ShortSomeRisk => NEUTRAL,
            RiskTier::Elevated | RiskTier::ShortElevated => CAUTION,
            RiskTier::LimitsBreached | RiskTier::ShortHigh => WARNING,
            RiskTier::Extreme | RiskTier::ShortExtreme => DANGER,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Tier plus its display attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub label: &'static str,
    pub colors: TierColors,
}

/// Map a leverage ratio to its tier. First matching range wins; the ranges
/// partition the real line so only NaN falls through.
pub fn classify(leverage: f64) -> RiskAssessment {
    let tier = if (0.8..=1.2).contains(&leverage) {
        RiskTier::Normal
    } else if (0.0..0.8).contains(&leverage) {
        RiskTier::Low
    } else if leverage > 1.2 && leverage <= 1.5 {
        RiskTier::SlightlyElevated
    } else if leverage > 1.5 && leverage <= 2.0 {
        RiskTier::Elevated
    } else if leverage > 2.0 && leverage <= 2.5 {
        RiskTier::LimitsBreached
    } else if leverage > 2.5 {
        RiskTier::Extreme
    } else if (-0.5..0.0).contains(&leverage) {
        RiskTier::ShortSomeRisk
    } else if (-1.0..-0.5).contains(&leverage) {
        RiskTier::ShortElevated
    } else if (-1.5..-1.0).contains(&leverage) {
        RiskTier::ShortHigh
    } else if leverage < -1.5 {
        RiskTier::ShortExtreme
    } else {
        RiskTier::NotAvailable
    };

    RiskAssessment {
        tier,
        label: tier.label(),
        colors: tier.colors(),
    }
}

/// `notional / nlv`, or 0 when the account has no liquidating value.
pub fn leverage(total_notional: f64, net_liquidating_value: f64) -> f64 {
    if net_liquidating_value == 0.0 {
        0.0
    } else {
        total_notional / net_liquidating_value
    }
}

/// Headline numbers for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotionalResult {
    pub net_quantity: i64,
    pub total_notional: f64,
    pub leverage: f64,
    pub risk: RiskAssessment,
}

impl NotionalResult {
    pub fn from_exposure(exposure: &Exposure, net_liquidating_value: f64) -> Self {
        let leverage = leverage(exposure.total_notional, net_liquidating_value);
        Self {
            net_quantity: exposure.net_quantity,
            total_notional: exposure.total_notional,
            leverage,
            risk: classify(leverage),
        }
    }
}
