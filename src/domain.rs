use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{impl_abs_primitive, impl_from_primitive, impl_money_ops, impl_string_id};

pub mod offer;
pub mod request;
pub mod vendor;

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// Represents a monetary amount in the session currency.
///
/// Used for: unit prices, budgets, total cost of ownership, savings and
/// value-add credits. Wraps `f64` to provide strong typing against bare
/// ratios and utilities.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Money(pub f64);
impl_from_primitive!(Money, f64);
impl_money_ops!(Money, f64);
impl_abs_primitive!(Money, f64);

impl Money {
    pub const ZERO: Money = Money(0.0);

    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0.0
    }
}

/// Stable identifier of a procurement request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct RequestId(pub String);
impl_string_id!(RequestId);

/// Stable identifier of a vendor (counterparty).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VendorId(pub String);
impl_string_id!(VendorId);

/// Identifier of a single offer within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct OfferId(pub String);
impl_string_id!(OfferId);

/// Unique identifier of one buyer-vendor negotiation session.
///
/// Derived deterministically from the engine seed, the request id and the
/// vendor id, so that two runs with identical inputs produce identical ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SessionId(pub u64);
impl_from_primitive!(SessionId, u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// ================================================================================================
// Closed Vocabularies
// ================================================================================================

/// The side issuing a proposal or occupying a turn.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Buyer,
    Seller,
}

impl Actor {
    pub fn counterparty(self) -> Self {
        match self {
            Self::Buyer => Self::Seller,
            Self::Seller => Self::Buyer,
        }
    }
}

/// Payment terms attached to an offer.
///
/// The enum is ordered from fastest cash-in to slowest; see
/// [`PaymentTerms::speed_rank`] for the ordering used when counting
/// "one step faster payment" trades.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum PaymentTerms {
    #[strum(to_string = "NET_15")]
    #[serde(rename = "NET_15")]
    Net15,

    #[strum(to_string = "NET_30")]
    #[serde(rename = "NET_30")]
    Net30,

    #[strum(to_string = "NET_45")]
    #[serde(rename = "NET_45")]
    Net45,

    #[strum(to_string = "MILESTONES")]
    #[serde(rename = "MILESTONES")]
    Milestones,

    #[strum(to_string = "DEPOSIT")]
    #[serde(rename = "DEPOSIT")]
    Deposit,
}

impl PaymentTerms {
    /// Cash-flow adjustment applied to the monthly payment when computing TCO.
    ///
    /// NET_30 is the baseline; faster payment earns a small discount, slower
    /// payment carries a premium.
    pub fn tco_multiplier(self) -> f64 {
        match self {
            Self::Net15 => 0.995,
            Self::Net30 => 1.000,
            Self::Net45 => 1.015,
            Self::Milestones => 0.990,
            Self::Deposit => 0.985,
        }
    }

    /// How much a seller values this payment schedule (1.0 = cash up front).
    pub fn seller_speed_preference(self) -> f64 {
        match self {
            Self::Net15 => 1.0,
            Self::Net30 => 0.9,
            Self::Net45 => 0.7,
            Self::Milestones => 0.95,
            Self::Deposit => 1.0,
        }
    }

    /// Rank on the payment-speed axis: 0 = fastest. Used by the opponent
    /// model and exchange-policy trade counting.
    pub fn speed_rank(self) -> u8 {
        match self {
            Self::Deposit => 0,
            Self::Net15 => 0,
            Self::Milestones => 1,
            Self::Net30 => 1,
            Self::Net45 => 2,
        }
    }
}

/// Billing cadence of a quoted unit amount or an aggregate budget.
///
/// Monthly figures are annualized with a factor of 12; annual figures pass
/// through unchanged. An absent cadence is treated as already annual.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingCadence {
    PerSeatPerYear,
    PerSeatPerMonth,
    PerUnitPerYear,
    PerUnitPerMonth,
}

impl BillingCadence {
    /// Multiplier converting one unit amount at this cadence to an annual figure.
    pub fn annualization_factor(self) -> f64 {
        match self {
            Self::PerSeatPerYear | Self::PerUnitPerYear => 1.0,
            Self::PerSeatPerMonth | Self::PerUnitPerMonth => 12.0,
        }
    }

    pub fn is_monthly(self) -> bool {
        self.annualization_factor() > 1.0
    }
}

/// ISO-style currency tag. The engine performs no conversion: mixed
/// currencies inside one session are a hard policy violation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

/// Coarse counterparty risk classification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Normalized risk mass used by the scoring service.
    pub fn normalized(self) -> f64 {
        match self {
            Self::Low => 0.1,
            Self::Medium => 0.4,
            Self::High => 0.8,
        }
    }
}
