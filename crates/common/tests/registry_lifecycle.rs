//! Integration tests for the name lifecycle on a single ledger

mod common;

use std::sync::Arc;

use ::common::access_control::{RoleBitmap, Roles};
use ::common::bridge::{BridgeError, ErrorKind};
use ::common::clock::ManualClock;
use ::common::events::Event;
use ::common::ledger::{Ledger, LedgerConfig};
use ::common::registry::{
    FlatRentOracle, Registrar, RegistrarError, RegistryError, RentRequest, TransferData,
};
use ::common::types::{Address, Timestamp};

use self::common::YEAR;

const START: Timestamp = Timestamp(1_000_000);

fn setup() -> (Ledger, LedgerConfig, ManualClock) {
    common::init_tracing();
    let config = LedgerConfig::derived("lifecycle", &["eth"]);
    let clock = ManualClock::new(START);
    let ledger = Ledger::in_memory(&config, Arc::new(clock.clone())).unwrap();
    (ledger, config, clock)
}

fn data(label: &str, owner: Address, expiry: Timestamp) -> TransferData {
    TransferData::new(
        label,
        owner,
        RoleBitmap::full(Roles::RENEW | Roles::SET_RESOLVER | Roles::CAN_TRANSFER),
        expiry,
    )
}

#[test]
fn test_roles_do_not_survive_reregistration() {
    let (ledger, config, clock) = setup();
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    let friend = Address::derive("friend");

    let first = ledger
        .register(config.admin, data("name", alice, START.saturating_add(YEAR)))
        .unwrap();
    // alice delegates resolver management to a friend
    ledger
        .grant_roles(
            alice,
            first.resource(),
            RoleBitmap::owner(Roles::SET_RESOLVER),
            friend,
        )
        .unwrap();

    clock.advance(YEAR);
    let second = ledger
        .register(config.admin, data("name", bob, START.saturating_add(2 * YEAR)))
        .unwrap();

    assert_ne!(first.resource(), second.resource());
    assert!(ledger.roles(second, alice).is_empty());
    assert!(ledger.roles(second, friend).is_empty());
    assert!(ledger.roles(first, friend).is_empty());
    assert!(ledger
        .set_resolver(friend, second, Some(Address::random()))
        .is_err());
    ledger.set_resolver(bob, second, Some(Address::random())).unwrap();
}

#[test]
fn test_availability_follows_expiry() {
    let (ledger, config, clock) = setup();
    let alice = Address::derive("alice");
    assert!(ledger.is_available("name"));

    let id = ledger
        .register(config.admin, data("name", alice, START.saturating_add(100)))
        .unwrap();
    assert!(!ledger.is_available("name"));

    clock.advance(99);
    assert!(!ledger.is_available("name"));
    assert_eq!(ledger.owner_of(id), Some(alice));

    clock.advance(1);
    assert!(ledger.is_available("name"));
    assert_eq!(ledger.owner_of(id), None);
    let record = ledger.name_record("name").unwrap();
    assert!(!record.is_live(ledger.now()));
    assert_eq!(record.owner, None);
}

#[test]
fn test_renewal_is_monotonic() {
    let (ledger, config, _) = setup();
    let alice = Address::derive("alice");
    let expiry = START.saturating_add(YEAR);
    let id = ledger.register(config.admin, data("name", alice, expiry)).unwrap();

    for requested in [expiry, Timestamp(expiry.as_secs() - 1)] {
        assert!(ledger.renew(alice, id, requested).is_err());
    }
    ledger.renew(alice, id, expiry.saturating_add(1)).unwrap();
    assert_eq!(ledger.entry(id).unwrap().expiry, expiry.saturating_add(1));
    assert!(ledger.events_for("name").contains(&Event::ExpiryUpdated {
        id,
        expiry: expiry.saturating_add(1),
    }));
}

#[test]
fn test_renew_without_role_fails() {
    let (ledger, config, _) = setup();
    let alice = Address::derive("alice");
    let id = ledger
        .register(
            config.admin,
            TransferData::new("name", alice, RoleBitmap::EMPTY, START.saturating_add(YEAR)),
        )
        .unwrap();

    let err = ledger
        .renew(alice, id, START.saturating_add(2 * YEAR))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn test_burn_and_register_again() {
    let (ledger, config, _) = setup();
    let alice = Address::derive("alice");
    let id = ledger
        .register(config.admin, data("name", alice, START.saturating_add(YEAR)))
        .unwrap();

    ledger.burn(alice, id, false).unwrap();
    assert!(ledger.is_available("name"));
    assert_eq!(ledger.entry(id), None);
    assert!(ledger.events_for("name").contains(&Event::Transfer {
        operator: alice,
        from: alice,
        to: Address::ZERO,
        id,
    }));

    let again = ledger
        .register(config.admin, data("name", alice, START.saturating_add(YEAR)))
        .unwrap();
    assert_eq!(again.generation, id.generation + 1);
    assert_eq!(
        ledger.renew(alice, id, START.saturating_add(2 * YEAR)).unwrap_err(),
        BridgeError::Registry(RegistryError::NameNotFound(id))
    );
}

#[test]
fn test_subregistry_needs_role() {
    let (ledger, config, _) = setup();
    let alice = Address::derive("alice");
    let sub = Address::derive("sub");
    let id = ledger
        .register(config.admin, data("name", alice, START.saturating_add(YEAR)))
        .unwrap();

    assert!(ledger.set_subregistry(alice, id, Some(sub)).is_err());
    ledger
        .grant_roles(
            config.admin,
            id.resource(),
            RoleBitmap::owner(Roles::SET_SUBREGISTRY),
            alice,
        )
        .unwrap();
    ledger.set_subregistry(alice, id, Some(sub)).unwrap();
    assert_eq!(ledger.entry(id).unwrap().subregistry, Some(sub));

    // another registry on the same ledger sees nothing of this namespace
    assert_eq!(ledger.entry_in(Address::derive("elsewhere"), id), None);
    assert_eq!(
        ledger.entry_in(ledger.registry_id(), id).unwrap().subregistry,
        Some(sub)
    );
}

#[test]
fn test_paid_registration() {
    let (ledger, config, _) = setup();
    let registrar_account = Address::derive("registrar");
    let token = Address::derive("token");
    ledger
        .grant_roles(
            config.admin,
            ::common::types::Resource::Root,
            RoleBitmap::owner(Roles::REGISTRAR),
            registrar_account,
        )
        .unwrap();
    let registrar = Registrar::new(registrar_account, FlatRentOracle::new(3, [token]));

    let mut request = RentRequest {
        label: "name".into(),
        owner: Address::derive("alice"),
        duration: YEAR,
        payment_token: Address::derive("other-token"),
        roles: RoleBitmap::owner(Roles::RENEW),
        resolver: None,
    };
    assert_eq!(
        ledger.rent(&registrar, &request).unwrap_err(),
        RegistrarError::PaymentTokenNotAccepted(request.payment_token)
    );

    request.payment_token = token;
    let (id, price) = ledger.rent(&registrar, &request).unwrap();
    assert_eq!(price.base, 3 * u128::from(YEAR));
    assert_eq!(ledger.entry(id).unwrap().expiry, START.saturating_add(YEAR));
    assert_eq!(ledger.owner_of(id), Some(request.owner));

    assert!(matches!(
        ledger.rent(&registrar, &request),
        Err(RegistrarError::Registry(RegistryError::NameAlreadyRegistered { .. }))
    ));
}
