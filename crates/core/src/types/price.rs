//! Product price using decimal arithmetic.
//!
//! Prices are entered by the admin as free text, stored in the document
//! store as a plain number, and shown in the dashboard in naira with
//! thousands separators (e.g. `₦12,500`).

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a [`Price`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Nothing was entered.
    #[error("price cannot be empty")]
    Empty,
    /// The input is not a decimal number.
    #[error("price is not a number: {0}")]
    NotANumber(String),
    /// The number is zero or negative.
    #[error("price must be greater than zero")]
    NotPositive,
    /// The stored number is NaN or infinite.
    #[error("price must be a finite number")]
    NotFinite,
}

/// A positive, finite product price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Currency sign used when displaying prices.
    pub const CURRENCY_SIGN: &'static str = "₦";

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotPositive`] if the amount is zero or negative.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        Ok(Self(amount.normalize()))
    }

    /// Parse a price typed into the upload form.
    ///
    /// Surrounding whitespace is ignored and exponent notation (`1.25e4`)
    /// is accepted. Thousands separators and currency signs are not.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank, not a decimal number, or not
    /// greater than zero.
    pub fn parse(input: &str) -> Result<Self, PriceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PriceError::Empty);
        }
        let amount = if input.contains(['e', 'E']) {
            Decimal::from_scientific(input)
        } else {
            Decimal::from_str(input)
        }
        .map_err(|_| PriceError::NotANumber(input.to_owned()))?;
        Self::new(amount)
    }

    /// Convert a number read back from the document store.
    ///
    /// # Errors
    ///
    /// Returns an error for NaN, infinities, and non-positive values.
    pub fn from_f64(value: f64) -> Result<Self, PriceError> {
        if !value.is_finite() {
            return Err(PriceError::NotFinite);
        }
        let amount = Decimal::from_f64(value).ok_or(PriceError::NotFinite)?;
        Self::new(amount)
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount as a floating point number, as stored in documents.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::MAX)
    }

    /// Format for display, e.g. `₦12,500` or `₦1,250.50`.
    #[must_use]
    pub fn display(&self) -> String {
        let text = self.0.to_string();
        let (whole, fraction) = text.split_once('.').map_or((text.as_str(), None), |(w, f)| (w, Some(f)));

        let digits: Vec<char> = whole.chars().collect();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, digit) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(*digit);
        }

        match fraction {
            Some(fraction) => format!("{}{grouped}.{fraction}", Self::CURRENCY_SIGN),
            None => format!("{}{grouped}", Self::CURRENCY_SIGN),
        }
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
