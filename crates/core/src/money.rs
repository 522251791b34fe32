//! # Money Module
//!
//! Currency and Money backed by `rust_decimal`, never binary floating point.
//! Storage works in integer minor units; see [`Money::to_minor_units`].

use crate::error::{CoreError, CoreResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A currency with a fixed number of minor-unit digits.
///
/// # Examples
/// ```
/// use mobiwallet_core::Currency;
///
/// let rwf = Currency::rwf();
/// assert_eq!(rwf.decimals, 0);
/// assert_eq!(Currency::from_code("usd").unwrap().decimals, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code
    pub code: String,
    /// Display name
    pub name: String,
    /// Minor-unit digits (RWF=0, USD=2)
    pub decimals: u8,
    /// Display symbol
    pub symbol: String,
}

/// Largest minor-unit exponent that fits an `i64` factor
pub const MAX_DECIMALS: u8 = 18;

impl Currency {
    /// `decimals` is capped at [`MAX_DECIMALS`].
    pub fn new(code: &str, name: &str, decimals: u8, symbol: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            name: name.to_string(),
            decimals: decimals.min(MAX_DECIMALS),
            symbol: symbol.to_string(),
        }
    }

    // === Preset currencies ===

    /// Rwandan Franc (0 decimals)
    pub fn rwf() -> Self {
        Self::new("RWF", "Rwandan Franc", 0, "FRw")
    }

    /// Kenyan Shilling (2 decimals)
    pub fn kes() -> Self {
        Self::new("KES", "Kenyan Shilling", 2, "KSh")
    }

    /// Ugandan Shilling (0 decimals)
    pub fn ugx() -> Self {
        Self::new("UGX", "Ugandan Shilling", 0, "USh")
    }

    /// US Dollar (2 decimals)
    pub fn usd() -> Self {
        Self::new("USD", "US Dollar", 2, "$")
    }

    /// Look up a preset currency by code, case-insensitive.
    pub fn from_code(code: &str) -> CoreResult<Self> {
        match code.to_uppercase().as_str() {
            "RWF" => Ok(Self::rwf()),
            "KES" => Ok(Self::kes()),
            "UGX" => Ok(Self::ugx()),
            "USD" => Ok(Self::usd()),
            other => Err(CoreError::UnknownCurrency(other.to_string())),
        }
    }

    /// 10^decimals as a Decimal; `None` past [`MAX_DECIMALS`]
    fn minor_factor(&self) -> Option<Decimal> {
        10i64.checked_pow(u32::from(self.decimals)).map(Decimal::from)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// An amount of a single currency.
///
/// Arithmetic is checked: mixing currencies fails with `CurrencyMismatch`
/// and a subtraction that would go below zero fails with
/// `InsufficientFunds` instead of clamping.
///
/// # Examples
/// ```
/// use mobiwallet_core::{Currency, Money};
/// use rust_decimal::Decimal;
///
/// let a = Money::new(Decimal::from(1000), Currency::rwf());
/// let b = Money::new(Decimal::from(500), Currency::rwf());
/// assert_eq!(a.checked_sub(&b).unwrap().to_string(), "500 RWF");
/// assert!(b.checked_sub(&a).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount (serialized as a string in JSON)
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Build from integer minor units (e.g. cents).
    pub fn from_minor_units(minor: i64, currency: Currency) -> Self {
        Self {
            amount: Decimal::new(minor, currency.decimals as u32),
            currency,
        }
    }

    /// Convert to integer minor units.
    ///
    /// Fails with `InvalidAmount` when the amount carries more fractional
    /// digits than the currency allows or does not fit in an `i64`.
    pub fn to_minor_units(&self) -> CoreResult<i64> {
        let normalized = self.amount.normalize();
        if normalized.scale() > self.currency.decimals as u32 {
            return Err(CoreError::InvalidAmount(format!(
                "{} has more than {} decimal places for {}",
                self.amount, self.currency.decimals, self.currency.code
            )));
        }
        self.currency
            .minor_factor()
            .and_then(|factor| normalized.checked_mul(factor))
            .and_then(|minor| minor.to_i64())
            .ok_or_else(|| CoreError::InvalidAmount(format!("{} is out of range", self.amount)))
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.amount == Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    fn ensure_same_currency(&self, other: &Money) -> CoreResult<()> {
        if self.currency.code != other.currency.code {
            return Err(CoreError::CurrencyMismatch {
                expected: self.currency.code.clone(),
                actual: other.currency.code.clone(),
            });
        }
        Ok(())
    }

    /// Add two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> CoreResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| CoreError::InvalidAmount("addition overflow".to_string()))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Subtract `other`; a negative result is `InsufficientFunds`.
    pub fn checked_sub(&self, other: &Money) -> CoreResult<Money> {
        self.ensure_same_currency(other)?;
        if other.amount > self.amount {
            return Err(CoreError::InsufficientFunds {
                needed: other.amount,
                available: self.amount,
            });
        }
        Ok(Money::new(self.amount - other.amount, self.currency.clone()))
    }

    /// Compare two amounts of the same currency.
    pub fn try_cmp(&self, other: &Money) -> CoreResult<Ordering> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.amount.round_dp(self.currency.decimals as u32);
        write!(
            f,
            "{:.*} {}",
            self.currency.decimals as usize, rounded, self.currency.code
        )
    }
}
