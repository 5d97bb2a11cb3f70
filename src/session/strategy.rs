use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::session::{ConcessionStep, personality::PersonalityTraits};

/// The closed set of bargaining moves.
///
/// Declaration order is the strategy ordinal: when several decision-table
/// rows could fire, the first (lowest ordinal) wins. Adding a strategy means
/// extending this enum, the selector below, and the generator dispatch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Open far from the expected settlement point.
    AnchorHigh,
    /// Small concession wrapped in a value story.
    ValueJustification,
    /// Move decisively toward the counterparty's number.
    CompetitiveMatch,
    /// Trade a bigger order for a lower unit price.
    VolumeIncentive,
    /// Trade a longer commitment for a lower unit price.
    TermPremium,
    /// Large concession to buy the relationship.
    RelationshipInvestment,
    /// Small personality-scaled concession.
    GradualConcession,
    /// Meet exactly in the middle.
    SplitDifference,
    /// Best and final; no further concessions after this.
    FinalOffer,
    /// No movement at all.
    HoldFirm,
    /// Concession contingent on term and payment conditions.
    ConditionalDiscount,
    /// Leave the table.
    WalkAway,
}

impl StrategyKind {
    /// Whether this move ends the proposer's concessions for good.
    pub fn is_one_shot(self) -> bool {
        matches!(self, Self::FinalOffer | Self::WalkAway)
    }
}

/// Negotiation phase, derived from round position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Early,
    Mid,
    Late,
}

impl RoundPhase {
    pub fn of(round: u32, total_rounds: u32) -> Self {
        if round <= 2 {
            Self::Early
        } else if round + 2 <= total_rounds {
            Self::Mid
        } else {
            Self::Late
        }
    }
}

/// Everything the selector looks at for one turn.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext {
    pub round: u32,
    pub total_rounds: u32,

    /// Perceived counterparty aggressiveness, from the opponent model.
    pub counterparty_aggressiveness: f64,

    /// `|own - counter| / own`, as a percentage.
    pub price_gap_pct: f64,

    pub competitive_pressure: f64,

    /// How badly this side wants the deal closed, in [0, 1].
    pub deal_importance: f64,

    pub traits: PersonalityTraits,
}

impl StrategyContext {
    pub fn phase(&self) -> RoundPhase {
        RoundPhase::of(self.round, self.total_rounds)
    }
}

/// Seller-side decision table.
///
/// Early rounds establish position, mid rounds negotiate, late rounds close
/// or walk. Each branch chain is ordered so that the first matching row
/// (the lowest strategy ordinal among the candidates) wins.
pub fn select_seller_strategy(ctx: &StrategyContext) -> StrategyKind {
    let traits = &ctx.traits;

    match ctx.phase() {
        RoundPhase::Early => {
            if traits.value_emphasis > 0.7 {
                StrategyKind::ValueJustification
            } else if traits.competitive_response > 0.7 {
                StrategyKind::CompetitiveMatch
            } else {
                StrategyKind::AnchorHigh
            }
        }

        RoundPhase::Mid => {
            if ctx.competitive_pressure > 0.7 {
                if traits.concession_willingness > 0.6 {
                    return StrategyKind::VolumeIncentive;
                }
                return StrategyKind::CompetitiveMatch;
            }

            if ctx.price_gap_pct > 20.0 {
                if traits.relationship_focus > 0.7 {
                    StrategyKind::RelationshipInvestment
                } else if traits.value_emphasis > 0.6 {
                    StrategyKind::ValueJustification
                } else {
                    StrategyKind::GradualConcession
                }
            } else if traits.concession_willingness > 0.6 {
                StrategyKind::SplitDifference
            } else {
                StrategyKind::ConditionalDiscount
            }
        }

        RoundPhase::Late => {
            if ctx.price_gap_pct < 10.0 {
                if ctx.deal_importance > 0.7 {
                    StrategyKind::SplitDifference
                } else {
                    StrategyKind::FinalOffer
                }
            } else if ctx.price_gap_pct > 30.0 {
                if traits.patience < 0.3 {
                    StrategyKind::WalkAway
                } else {
                    StrategyKind::HoldFirm
                }
            } else if traits.concession_willingness > 0.5 {
                StrategyKind::FinalOffer
            } else {
                StrategyKind::HoldFirm
            }
        }
    }
}

/// Buyer-side selection: the mirror of the seller table, spined by the
/// plan's concession schedule.
///
/// The buyer walks its schedule step by step; mid-game steps pick the
/// concession axis (term, payment, value-adds) while the phase table keeps
/// the close-or-walk endgame symmetric with the seller's.
pub fn select_buyer_strategy(ctx: &StrategyContext, step: Option<ConcessionStep>) -> StrategyKind {
    match ctx.phase() {
        RoundPhase::Early => StrategyKind::AnchorHigh,

        RoundPhase::Mid => match step {
            Some(ConcessionStep::TermTrade) => StrategyKind::TermPremium,
            Some(ConcessionStep::PaymentTrade) => StrategyKind::ConditionalDiscount,
            Some(ConcessionStep::ValueAdd) => StrategyKind::ValueJustification,
            _ => {
                if ctx.price_gap_pct > 20.0 {
                    StrategyKind::GradualConcession
                } else if ctx.traits.concession_willingness > 0.6 {
                    StrategyKind::SplitDifference
                } else {
                    StrategyKind::ConditionalDiscount
                }
            }
        },

        RoundPhase::Late => {
            if ctx.price_gap_pct < 10.0 {
                if ctx.deal_importance > 0.7 {
                    StrategyKind::SplitDifference
                } else {
                    StrategyKind::FinalOffer
                }
            } else if ctx.price_gap_pct > 30.0 {
                if ctx.traits.patience < 0.3 {
                    StrategyKind::WalkAway
                } else {
                    StrategyKind::HoldFirm
                }
            } else if ctx.traits.concession_willingness > 0.5 {
                StrategyKind::FinalOffer
            } else {
                StrategyKind::HoldFirm
            }
        }
    }
}
