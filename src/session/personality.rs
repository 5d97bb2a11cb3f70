use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Named personality presets for negotiation agents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PersonalityPreset {
    /// Maximize profit, minimal concessions.
    Aggressive,
    /// Win-win, reasonable concessions.
    #[default]
    Cooperative,
    /// Long-term relationships, strategic pricing.
    Strategic,
    /// Market-driven, flexible.
    Opportunistic,
    /// Value-based, minimal discounts.
    Premium,
    /// Market share, aggressive pricing.
    VolumeFocused,
    /// Customer retention, loyalty-based.
    Relationship,
}

/// The eight-dimensional personality vector. All values live in [0, 1].
///
/// Immutable: context adjustment produces a new record (see
/// [`adjust_for_context`]), never mutates in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    /// 0.0 = no concessions, 1.0 = very flexible.
    pub concession_willingness: f64,

    /// 0.0 = rigid price floor, 1.0 = flexible.
    pub floor_flexibility: f64,

    /// 0.0 = resistant to pressure, 1.0 = accommodating.
    pub pressure_sensitivity: f64,

    /// 0.0 = short-term focus, 1.0 = long-term focus.
    pub relationship_focus: f64,

    /// 0.0 = ignore competition, 1.0 = match aggressively.
    pub competitive_response: f64,

    /// 0.0 = risk-averse, 1.0 = risk-seeking.
    pub risk_tolerance: f64,

    /// 0.0 = quick close, 1.0 = patient.
    pub patience: f64,

    /// 0.0 = price-focused, 1.0 = value-focused.
    pub value_emphasis: f64,
}

impl PersonalityPreset {
    /// The fixed trait table for each preset.
    pub fn traits(self) -> PersonalityTraits {
        match self {
            Self::Aggressive => PersonalityTraits {
                concession_willingness: 0.2,
                floor_flexibility: 0.1,
                pressure_sensitivity: 0.3,
                relationship_focus: 0.2,
                competitive_response: 0.8,
                risk_tolerance: 0.7,
                patience: 0.3,
                value_emphasis: 0.3,
            },
            Self::Cooperative => PersonalityTraits {
                concession_willingness: 0.7,
                floor_flexibility: 0.6,
                pressure_sensitivity: 0.7,
                relationship_focus: 0.8,
                competitive_response: 0.5,
                risk_tolerance: 0.4,
                patience: 0.7,
                value_emphasis: 0.7,
            },
            Self::Strategic => PersonalityTraits {
                concession_willingness: 0.5,
                floor_flexibility: 0.4,
                pressure_sensitivity: 0.4,
                relationship_focus: 0.9,
                competitive_response: 0.6,
                risk_tolerance: 0.5,
                patience: 0.8,
                value_emphasis: 0.8,
            },
            Self::Opportunistic => PersonalityTraits {
                concession_willingness: 0.6,
                floor_flexibility: 0.7,
                pressure_sensitivity: 0.6,
                relationship_focus: 0.4,
                competitive_response: 0.9,
                risk_tolerance: 0.8,
                patience: 0.4,
                value_emphasis: 0.5,
            },
            Self::Premium => PersonalityTraits {
                concession_willingness: 0.3,
                floor_flexibility: 0.2,
                pressure_sensitivity: 0.2,
                relationship_focus: 0.6,
                competitive_response: 0.3,
                risk_tolerance: 0.3,
                patience: 0.6,
                value_emphasis: 0.9,
            },
            Self::VolumeFocused => PersonalityTraits {
                concession_willingness: 0.8,
                floor_flexibility: 0.8,
                pressure_sensitivity: 0.8,
                relationship_focus: 0.5,
                competitive_response: 0.9,
                risk_tolerance: 0.6,
                patience: 0.3,
                value_emphasis: 0.4,
            },
            Self::Relationship => PersonalityTraits {
                concession_willingness: 0.6,
                floor_flexibility: 0.5,
                pressure_sensitivity: 0.6,
                relationship_focus: 1.0,
                competitive_response: 0.4,
                risk_tolerance: 0.4,
                patience: 0.9,
                value_emphasis: 0.8,
            },
        }
    }
}

/// Business context shaping a seller's urgency and pricing pressure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VendorContext {
    /// 0.0 = empty book, 1.0 = fully booked.
    pub capacity_utilization: f64,

    /// 0.0 = no inventory, 1.0 = excess stock.
    pub inventory_level: f64,

    /// 0.0 = quarter start, 1.0 = quarter end.
    pub quarter_position: f64,

    /// 0.0 = year start, 1.0 = year end.
    pub year_position: f64,

    /// 0.0 = weak pipeline, 1.0 = strong.
    pub pipeline_strength: f64,

    /// 0.0 = losing deals, 1.0 = winning.
    pub recent_win_rate: f64,

    /// 0.0 = no competition, 1.0 = fierce.
    pub competitive_pressure: f64,

    /// 0.0 = low demand, 1.0 = high.
    pub market_demand: f64,
}

impl Default for VendorContext {
    fn default() -> Self {
        Self {
            capacity_utilization: 0.7,
            inventory_level: 0.5,
            quarter_position: 0.5,
            year_position: 0.5,
            pipeline_strength: 0.6,
            recent_win_rate: 0.5,
            competitive_pressure: 0.5,
            market_demand: 0.6,
        }
    }
}

impl VendorContext {
    /// Urgency to close. Quarter and year ends weigh quadratically; thin
    /// pipelines and empty books add linearly.
    pub fn urgency_multiplier(&self) -> f64 {
        let quarter_urgency = self.quarter_position * self.quarter_position;
        let year_urgency = self.year_position * self.year_position;
        let pipeline_urgency = 1.0 - self.pipeline_strength;
        let capacity_urgency = 1.0 - self.capacity_utilization;

        quarter_urgency * 0.3
            + year_urgency * 0.2
            + pipeline_urgency * 0.3
            + capacity_urgency * 0.2
    }

    /// Downward pricing pressure from inventory, demand, competition and
    /// the recent win rate.
    pub fn pricing_pressure(&self) -> f64 {
        self.inventory_level * 0.25
            + (1.0 - self.market_demand) * 0.3
            + self.competitive_pressure * 0.3
            + (1.0 - self.recent_win_rate) * 0.15
    }
}

/// Adjust base traits for business context. Pure: returns a new record.
///
/// Urgency raises the traits that make a seller close (concession
/// willingness, pressure sensitivity, risk tolerance) and erodes patience;
/// pricing pressure loosens the floor. Relationship focus and value
/// emphasis are intrinsic and never shift with context.
pub fn adjust_for_context(
    base: &PersonalityTraits,
    context: &VendorContext,
) -> PersonalityTraits {
    let urgency = context.urgency_multiplier();
    let pressure = context.pricing_pressure();

    PersonalityTraits {
        concession_willingness: (base.concession_willingness + urgency * 0.3 + pressure * 0.2)
            .min(1.0),
        floor_flexibility: (base.floor_flexibility + pressure * 0.3).min(1.0),
        pressure_sensitivity: (base.pressure_sensitivity + urgency * 0.2).min(1.0),
        relationship_focus: base.relationship_focus,
        competitive_response: (base.competitive_response + context.competitive_pressure * 0.2)
            .min(1.0),
        risk_tolerance: (base.risk_tolerance + urgency * 0.15).min(1.0),
        patience: (base.patience - urgency * 0.3).max(0.0),
        value_emphasis: base.value_emphasis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn all_presets_stay_in_bounds() {
        for preset in PersonalityPreset::iter() {
            let t = preset.traits();
            for value in [
                t.concession_willingness,
                t.floor_flexibility,
                t.pressure_sensitivity,
                t.relationship_focus,
                t.competitive_response,
                t.risk_tolerance,
                t.patience,
                t.value_emphasis,
            ] {
                assert!((0.0..=1.0).contains(&value), "{preset}: {value}");
            }
        }
    }

    #[test]
    fn aggressive_concedes_less_than_cooperative() {
        let aggressive = PersonalityPreset::Aggressive.traits();
        let cooperative = PersonalityPreset::Cooperative.traits();
        assert!(aggressive.concession_willingness < cooperative.concession_willingness);
        assert!(aggressive.competitive_response > cooperative.competitive_response);
    }

    #[test]
    fn default_context_urgency_matches_the_formula() {
        let ctx = VendorContext::default();
        let expected = 0.25 * 0.3 + 0.25 * 0.2 + 0.4 * 0.3 + 0.3 * 0.2;
        assert!((ctx.urgency_multiplier() - expected).abs() < 1e-12);
    }

    #[test]
    fn quarter_end_is_more_urgent_than_quarter_start() {
        let start = VendorContext {
            quarter_position: 0.1,
            ..VendorContext::default()
        };
        let end = VendorContext {
            quarter_position: 0.95,
            ..VendorContext::default()
        };
        assert!(end.urgency_multiplier() > start.urgency_multiplier());
    }

    #[test]
    fn context_adjustment_moves_the_expected_traits() {
        let base = PersonalityPreset::Cooperative.traits();
        let hot = VendorContext {
            quarter_position: 1.0,
            year_position: 1.0,
            pipeline_strength: 0.1,
            capacity_utilization: 0.2,
            ..VendorContext::default()
        };
        let adjusted = adjust_for_context(&base, &hot);

        assert!(adjusted.concession_willingness > base.concession_willingness);
        assert!(adjusted.pressure_sensitivity > base.pressure_sensitivity);
        assert!(adjusted.risk_tolerance > base.risk_tolerance);
        assert!(adjusted.patience < base.patience);
        // Intrinsic traits never move.
        assert_eq!(adjusted.relationship_focus, base.relationship_focus);
        assert_eq!(adjusted.value_emphasis, base.value_emphasis);
    }

    #[test]
    fn adjustment_clamps_at_the_unit_interval() {
        let base = PersonalityPreset::VolumeFocused.traits();
        let extreme = VendorContext {
            quarter_position: 1.0,
            year_position: 1.0,
            pipeline_strength: 0.0,
            capacity_utilization: 0.0,
            inventory_level: 1.0,
            market_demand: 0.0,
            competitive_pressure: 1.0,
            recent_win_rate: 0.0,
        };
        let adjusted = adjust_for_context(&base, &extreme);
        assert!(adjusted.concession_willingness <= 1.0);
        assert!(adjusted.floor_flexibility <= 1.0);
        assert!(adjusted.patience >= 0.0);
    }
}
