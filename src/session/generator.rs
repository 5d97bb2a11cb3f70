use crate::{
    domain::{
        Actor, Money,
        offer::OfferComponents,
        request::Request,
        vendor::VendorProfile,
    },
    session::{opponent::OpponentModel, personality::PersonalityTraits, strategy::StrategyKind},
};

/// Inputs for one generation call. `own` is the proposer's standing offer,
/// `counter` the counterparty's latest.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub actor: Actor,
    pub strategy: StrategyKind,
    pub own: &'a OfferComponents,
    pub counter: &'a OfferComponents,
    pub vendor: &'a VendorProfile,
    pub request: &'a Request,
    pub traits: &'a PersonalityTraits,
    pub opponent: &'a OpponentModel,

    /// Seeded concession jitter, a multiplier around 1.0. Pass 1.0 for the
    /// exact contract values.
    pub jitter: f64,
}

/// A generated counter-offer, or the walk-away sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedMove {
    Counter(CounterOffer),
    WalkAway,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CounterOffer {
    pub components: OfferComponents,

    /// Deterministic rationale for the move. The rationale collaborator may
    /// replace this with synthesized text; this string is the fallback.
    pub rationale: String,

    /// Set when the raw move breached the proposer's own guardrails and was
    /// pulled back to the nearest feasible point.
    pub clamped: bool,
}

/// Construct the concrete counter-offer for a selected strategy.
///
/// Each strategy is a pure function of the inputs: no clock, no ambient
/// randomness (jitter arrives pre-drawn through the context).
pub fn generate(ctx: &GeneratorContext<'_>) -> GeneratedMove {
    let (components, rationale) = match ctx.strategy {
        StrategyKind::AnchorHigh => anchor(ctx),
        StrategyKind::ValueJustification => value_justification(ctx),
        StrategyKind::CompetitiveMatch => competitive_match(ctx),
        StrategyKind::VolumeIncentive => volume_incentive(ctx),
        StrategyKind::TermPremium => term_premium(ctx),
        StrategyKind::RelationshipInvestment => relationship_investment(ctx),
        StrategyKind::GradualConcession => gradual_concession(ctx),
        StrategyKind::SplitDifference => split_difference(ctx),
        StrategyKind::FinalOffer => final_offer(ctx),
        StrategyKind::HoldFirm => hold_firm(ctx),
        StrategyKind::ConditionalDiscount => conditional_discount(ctx),
        StrategyKind::WalkAway => return GeneratedMove::WalkAway,
    };

    GeneratedMove::Counter(clamp_to_own_guardrails(ctx, components, rationale))
}

// ================================================================================================
// Strategy Contracts
// ================================================================================================

fn anchor(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    match ctx.actor {
        Actor::Seller => {
            // Premium anchor above list.
            offer.unit_price = ctx.vendor.list_price_for(offer.quantity) * 1.05;
        }
        Actor::Buyer => {
            // Aggressive anchor just under the per-unit budget.
            offer.unit_price = ctx.request.budget_unit_annual() * 0.90;
        }
    }
    let rationale = match ctx.actor {
        Actor::Seller => {
            "Premium pricing reflects our market-leading solution and comprehensive support."
        }
        Actor::Buyer => "Our budget envelope anchors this engagement well below list.",
    };
    (offer, rationale.to_string())
}

fn value_justification(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    offer.unit_price = concede_by(ctx, 0.15);
    offer.term_months = ctx.own.term_months.max(ctx.counter.term_months);
    // Sweeten with the vendor's cheapest value-add instead of more price.
    if let Some((name, value)) = ctx.vendor.exchange_policy.value_add_offsets.iter().next() {
        offer.value_adds.insert(name.clone(), *value);
    }
    (
        offer,
        "Our solution delivers 3x ROI through increased productivity and reduced operational costs."
            .to_string(),
    )
}

fn competitive_match(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    offer.unit_price = concede_by(ctx, 0.40);
    offer.term_months = ctx.counter.term_months;
    offer.payment_terms = ctx.counter.payment_terms;
    (
        offer,
        "We're matching market rates while providing superior service and support.".to_string(),
    )
}

fn volume_incentive(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    let ratio = (ctx.counter.quantity as f64 / ctx.own.quantity.max(1) as f64).max(1.2);
    let discount = ((ratio - 1.0) * 0.5).min(0.15);

    offer.quantity = (ctx.own.quantity as f64 * ratio).round() as u32;
    offer.unit_price = match ctx.actor {
        Actor::Seller => ctx.own.unit_price * (1.0 - discount),
        // The buyer commits to more volume and moves part of the discount
        // toward the seller's number as the sweetener.
        Actor::Buyer => Money(ctx.own.unit_price.0 + discount * gap_toward(ctx)),
    };
    offer.term_months = ctx.counter.term_months;
    (
        offer,
        format!(
            "Volume discount of {:.1}% for {:.0}% quantity increase.",
            discount * 100.0,
            ratio * 100.0
        ),
    )
}

fn term_premium(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    let term = ctx.counter.term_months.max(24);
    let discount = (((ctx.counter.term_months as f64 / 12.0) - 1.0) * 0.08).clamp(0.0, 0.12);

    offer.term_months = term;
    offer.unit_price = match ctx.actor {
        Actor::Seller => ctx.own.unit_price * (1.0 - discount),
        // The buyer extends commitment and expects the discount back, so its
        // own number barely moves.
        Actor::Buyer => ctx.own.unit_price,
    };
    (
        offer,
        format!(
            "Long-term commitment discount of {:.1}% for {term}-month term.",
            discount * 100.0
        ),
    )
}

fn relationship_investment(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    offer.unit_price = concede_by(ctx, 0.60);
    offer.term_months = ctx.counter.term_months.max(24);
    offer.payment_terms = ctx.counter.payment_terms;
    (
        offer,
        "Strategic partnership pricing with dedicated account management and priority support."
            .to_string(),
    )
}

fn gradual_concession(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    let rate = ctx.traits.concession_willingness * 0.25 * ctx.jitter;
    offer.unit_price = Money(ctx.own.unit_price.0 + rate * gap_toward(ctx));
    (
        offer,
        "Incremental concession to move toward agreement.".to_string(),
    )
}

fn split_difference(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    offer.unit_price = Money((ctx.own.unit_price.0 + effective_counter_price(ctx)) / 2.0);
    offer.term_months = ctx.counter.term_months;
    offer.payment_terms = ctx.counter.payment_terms;
    (
        offer,
        "Let's meet in the middle to close this deal.".to_string(),
    )
}

fn final_offer(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    offer.unit_price = match ctx.actor {
        Actor::Seller => {
            let floor = ctx.vendor.guardrails.price_floor;
            // Never a raise: the final lands between the floor and the
            // current position.
            (floor * 1.02)
                .max(ctx.counter.unit_price * 1.05)
                .min(ctx.own.unit_price)
        }
        Actor::Buyer => {
            let budget = ctx.request.budget_unit_annual();
            Money(ctx.own.unit_price.0 + 0.3 * gap_toward(ctx)).min(budget)
        }
    };
    offer.term_months = ctx.counter.term_months;
    offer.payment_terms = ctx.counter.payment_terms;
    (
        offer,
        "This is our best and final offer. We cannot go lower while maintaining quality."
            .to_string(),
    )
}

fn hold_firm(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    (
        ctx.own.clone(),
        "We believe our current offer represents fair market value and cannot move further."
            .to_string(),
    )
}

fn conditional_discount(ctx: &GeneratorContext<'_>) -> (OfferComponents, String) {
    let mut offer = ctx.own.clone();
    let fraction = match ctx.actor {
        Actor::Seller => 0.30,
        // The buyer's sweetener for demanding NET_15 is smaller.
        Actor::Buyer => 0.10,
    };
    offer.unit_price = concede_by(ctx, fraction);
    offer.term_months = ctx.counter.term_months.max(24);
    offer.payment_terms = crate::domain::PaymentTerms::Net15;
    (
        offer,
        "Conditional discount for a 24-month term and NET_15 payment.".to_string(),
    )
}

// ================================================================================================
// Shared Math & Clamping
// ================================================================================================

/// The counterparty price this side actually negotiates against. The buyer
/// never chases a seller number beyond its own per-unit budget.
fn effective_counter_price(ctx: &GeneratorContext<'_>) -> f64 {
    match ctx.actor {
        Actor::Seller => ctx.counter.unit_price.0,
        Actor::Buyer => ctx
            .counter
            .unit_price
            .min(ctx.request.budget_unit_annual())
            .0,
    }
}

/// Signed distance from own price to the (budget-capped) counter price.
fn gap_toward(ctx: &GeneratorContext<'_>) -> f64 {
    effective_counter_price(ctx) - ctx.own.unit_price.0
}

/// Move the proposer's price the given fraction of the way to the
/// counterparty's (budget-capped) number.
fn concede_by(ctx: &GeneratorContext<'_>, fraction: f64) -> Money {
    Money(ctx.own.unit_price.0 + fraction * gap_toward(ctx))
}

/// Pull a generated offer back inside the proposer's own guardrails.
///
/// The seller clamps to `[floor, list * 1.1]` and to its allowed payment
/// terms; the buyer clamps to its per-unit budget for the offered term.
/// Violations of the *counterparty's* constraints are left intact; they are
/// legal anchors and the policy checker records them.
fn clamp_to_own_guardrails(
    ctx: &GeneratorContext<'_>,
    mut components: OfferComponents,
    rationale: String,
) -> CounterOffer {
    let mut clamped = false;

    match ctx.actor {
        Actor::Seller => {
            let floor = ctx.vendor.guardrails.price_floor;
            let ceiling = ctx.vendor.list_price_for(components.quantity) * 1.1;

            if components.unit_price < floor {
                components.unit_price = floor;
                clamped = true;
            }
            if components.unit_price > ceiling {
                components.unit_price = ceiling;
                clamped = true;
            }
            if !ctx.vendor.guardrails.allows_payment(components.payment_terms) {
                components.payment_terms = ctx.own.payment_terms;
                clamped = true;
            }
            if !ctx.vendor.guardrails.offers_term(components.term_months) {
                components.term_months = ctx.own.term_months;
                clamped = true;
            }
        }
        Actor::Buyer => {
            let budget_unit = ctx.request.budget_unit_annual();
            if components.unit_price > budget_unit {
                components.unit_price = budget_unit;
                clamped = true;
            }
            if components.unit_price.0 < 0.0 {
                components.unit_price = Money::ZERO;
                clamped = true;
            }
        }
    }

    CounterOffer {
        components,
        rationale,
        clamped,
    }
}
