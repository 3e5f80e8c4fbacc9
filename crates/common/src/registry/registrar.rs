//! Paid registration on top of a [`Registry`].
//!
//! Pricing lives behind [`RentOracle`]; the registrar only checks the
//! payment token, asks for a quote and registers with an expiry of
//! `now + duration` using its own account, which must hold REGISTRAR at the
//! registry root. Commit-reveal front-running protection is left to the
//! caller.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Registry, RegistryError, TransferData};
use crate::access_control::RoleBitmap;
use crate::context::TxContext;
use crate::datastore::Datastore;
use crate::types::{Address, NameId};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RegistrarError {
    #[error("payment token {0} is not accepted")]
    PaymentTokenNotAccepted(Address),
    #[error("duration must be positive")]
    InvalidDuration,
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// The cost of a registration, in units of the payment token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Price {
    pub base: u128,
    pub premium: u128,
}

impl Price {
    pub fn total(&self) -> u128 {
        self.base.saturating_add(self.premium)
    }
}

pub trait RentOracle: Send + Sync + std::fmt::Debug {
    fn quote(&self, label: &str, duration: u64, owner: Address) -> Price;

    fn is_payment_accepted(&self, token: Address) -> bool;
}

/// A flat per-second rate with a premium for short labels
#[derive(Debug, Clone, Default)]
pub struct FlatRentOracle {
    pub rate: u128,
    /// Extra charge per second for labels of at most this many characters
    pub short_label: Option<(usize, u128)>,
    pub accepted_tokens: HashSet<Address>,
}

impl FlatRentOracle {
    pub fn new(rate: u128, accepted_tokens: impl IntoIterator<Item = Address>) -> Self {
        Self {
            rate,
            short_label: None,
            accepted_tokens: accepted_tokens.into_iter().collect(),
        }
    }

    pub fn with_short_label_premium(mut self, max_chars: usize, rate: u128) -> Self {
        self.short_label = Some((max_chars, rate));
        self
    }
}

impl RentOracle for FlatRentOracle {
    fn quote(&self, label: &str, duration: u64, _owner: Address) -> Price {
        let duration = u128::from(duration);
        let premium = match self.short_label {
            Some((max_chars, rate)) if label.chars().count() <= max_chars => {
                rate.saturating_mul(duration)
            }
            _ => 0,
        };
        Price {
            base: self.rate.saturating_mul(duration),
            premium,
        }
    }

    fn is_payment_accepted(&self, token: Address) -> bool {
        self.accepted_tokens.contains(&token)
    }
}

/// A paid registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentRequest {
    pub label: String,
    pub owner: Address,
    /// Seconds the registration lasts
    pub duration: u64,
    pub payment_token: Address,
    pub roles: RoleBitmap,
    pub resolver: Option<Address>,
}

#[derive(Debug)]
pub struct Registrar<O> {
    account: Address,
    oracle: O,
}

impl<O: RentOracle> Registrar<O> {
    pub fn new(account: Address, oracle: O) -> Self {
        Self { account, oracle }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn register<D: Datastore>(
        &self,
        registry: &mut Registry,
        ctx: &mut TxContext<'_, D>,
        request: &RentRequest,
    ) -> Result<(NameId, Price), RegistrarError> {
        if !self.oracle.is_payment_accepted(request.payment_token) {
            return Err(RegistrarError::PaymentTokenNotAccepted(
                request.payment_token,
            ));
        }
        if request.duration == 0 {
            return Err(RegistrarError::InvalidDuration);
        }

        let price = self
            .oracle
            .quote(&request.label, request.duration, request.owner);
        let mut data = TransferData::new(
            request.label.clone(),
            request.owner,
            request.roles,
            ctx.now.saturating_add(request.duration),
        );
        data.resolver = request.resolver;

        let id = registry.register(&mut ctx.as_caller(self.account), &data)?;
        tracing::info!(
            "{} rented {:?} for {}s at {} (+{} premium)",
            request.owner,
            request.label,
            request.duration,
            price.base,
            price.premium
        );
        Ok((id, price))
    }
}
