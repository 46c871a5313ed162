//! Filter engine behavior across registries, wallets and filters.

use assert_matches::assert_matches;
use custos_authorization::{
    authorize_call, authorize_calls, recover_spender, DappRegistry, FilterContext, FilterKind,
    TradableTokens, NATIVE_TOKEN,
};
use custos_core::{
    Address, CustosError, ExternalCall, LedgerTime, PayloadBuilder, RegistryId, U256,
};
use custos_guardians::WalletRecord;
use proptest::prelude::*;

const ADMIN: Address = Address::repeat_byte(0xad);
const WALLET: Address = Address::repeat_byte(0xaa);
const OWNER: Address = Address::repeat_byte(0x01);
const AGGREGATOR: Address = Address::repeat_byte(0x61);
const ADAPTER: Address = Address::repeat_byte(0x62);
const TARGET_EXCHANGE: Address = Address::repeat_byte(0x63);
const UNISWAP_PROXY: Address = Address::repeat_byte(0x64);
const FORK_FACTORY: Address = Address::repeat_byte(0x65);
const WRAPPER: Address = Address::repeat_byte(0xee);
const TRANSFER_PROXY: Address = Address::repeat_byte(0x67);
const TOKEN: Address = Address::repeat_byte(0x70);
const CLAIMS: Address = Address::repeat_byte(0x51);

fn at(t: u64) -> LedgerTime {
    LedgerTime::new(t, t)
}

fn wallet() -> WalletRecord {
    WalletRecord::create(WALLET, OWNER, []).unwrap()
}

fn ctx<'a>(
    wallet: &'a WalletRecord,
    registry: &'a DappRegistry,
    tokens: &'a TradableTokens,
    now: LedgerTime,
) -> FilterContext<'a> {
    FilterContext {
        wallet,
        registry,
        tokens,
        now,
    }
}

fn simple_swap(beneficiary: Address, calls: &[(Address, Vec<u8>)], to_amount: u128) -> Vec<u8> {
    let callees: Vec<Address> = calls.iter().map(|(callee, _)| *callee).collect();
    let mut exchange_data = Vec::new();
    let mut starts = vec![U256::ZERO];
    for (_, data) in calls {
        exchange_data.extend_from_slice(data);
        starts.push(U256::from(exchange_data.len() as u128));
    }
    PayloadBuilder::new(
        "simpleSwap(address,address,uint256,uint256,uint256,address[],bytes,uint256[],address)",
    )
    .address(NATIVE_TOKEN)
    .address(TOKEN)
    .uint(1_000)
    .uint(to_amount)
    .uint(950)
    .address_array(&callees)
    .bytes(&exchange_data)
    .uint256_array(&starts)
    .address(beneficiary)
    .build()
}

fn multi_swap(adapters: &[Address], targets: &[Address]) -> Vec<u8> {
    PayloadBuilder::new("multiSwap(address,address,uint256,uint256,uint256,address[],address[],address)")
        .address(NATIVE_TOKEN)
        .address(TOKEN)
        .uint(1_000)
        .uint(900)
        .uint(950)
        .address_array(adapters)
        .address_array(targets)
        .address(Address::ZERO)
        .build()
}

fn mega_swap(adapters: &[Address], targets: &[Address]) -> Vec<u8> {
    let share = U256::from(10_000 / adapters.len().max(1) as u128);
    PayloadBuilder::new(
        "megaSwap(address,address,uint256,uint256,uint256,uint256[],address[],address[],address)",
    )
    .address(TOKEN)
    .address(NATIVE_TOKEN)
    .uint(1_000)
    .uint(900)
    .uint(950)
    .uint256_array(&vec![share; adapters.len()])
    .address_array(adapters)
    .address_array(targets)
    .address(WALLET)
    .build()
}

fn swap_on_uniswap(path: &[Address]) -> Vec<u8> {
    PayloadBuilder::new("swapOnUniswap(uint256,uint256,address[],uint8)")
        .uint(1_000)
        .uint(0)
        .address_array(path)
        .uint(0)
        .build()
}

fn swap_on_uniswap_fork(factory: Address) -> Vec<u8> {
    PayloadBuilder::new("swapOnUniswapFork(address,bytes32,uint256,uint256,address[],uint8)")
        .address(factory)
        .word([0x5a; 32])
        .uint(1_000)
        .uint(0)
        .address_array(&[NATIVE_TOKEN, TOKEN])
        .uint(0)
        .build()
}

fn aggregator_registry() -> DappRegistry {
    let mut registry = DappRegistry::new(ADMIN, 0, []);
    registry
        .propose_entry(ADMIN, AGGREGATOR, Some(FilterKind::Aggregator), at(0))
        .unwrap();
    registry
}

fn register(registry: &mut DappRegistry, destination: Address, filter: FilterKind) {
    registry
        .propose_entry(ADMIN, destination, Some(filter), at(0))
        .unwrap();
}

fn authorized(registry: &DappRegistry, tokens: &TradableTokens, data: Vec<u8>) -> bool {
    let w = wallet();
    authorize_call(&ctx(&w, registry, tokens, at(1)), &ExternalCall::new(AGGREGATOR, data)).is_ok()
}

#[test]
fn empty_registries_deny_everything() {
    let registry = DappRegistry::new(ADMIN, 0, []);
    let tokens = TradableTokens::default();
    let w = wallet();
    let ctx = ctx(&w, &registry, &tokens, at(1));
    assert_matches!(
        authorize_call(&ctx, &ExternalCall::transfer(TOKEN, 1)),
        Err(CustosError::CallNotAuthorized { destination: TOKEN })
    );
}

#[test]
fn unlimited_approval_is_checked_under_the_spender() {
    let spender = Address::repeat_byte(0x5e);
    let mut registry = DappRegistry::new(ADMIN, 0, []);
    register(&mut registry, spender, FilterKind::OnlyApprove);
    let tokens = TradableTokens::default();
    let w = wallet();

    let approve = |amount: U256| {
        ExternalCall::new(
            TOKEN,
            PayloadBuilder::new("approve(address,uint256)")
                .address(spender)
                .uint256(amount)
                .build(),
        )
    };
    authorize_call(&ctx(&w, &registry, &tokens, at(1)), &approve(U256::from(5))).unwrap();
    authorize_call(&ctx(&w, &registry, &tokens, at(1)), &approve(U256::MAX)).unwrap();

    let unlimited_transfer = ExternalCall::new(
        TOKEN,
        PayloadBuilder::new("transfer(address,uint256)")
            .address(CLAIMS)
            .uint256(U256::MAX)
            .build(),
    );
    assert_eq!(recover_spender(TOKEN, &unlimited_transfer.data), CLAIMS);
    assert_matches!(
        authorize_call(&ctx(&w, &registry, &tokens, at(1)), &unlimited_transfer),
        Err(CustosError::CallNotAuthorized { destination: TOKEN })
    );
}

#[test]
fn simple_swap_checks_beneficiary_and_amounts() {
    let mut registry = aggregator_registry();
    register(&mut registry, WRAPPER, FilterKind::Weth);
    let tokens = TradableTokens::new([TOKEN]);
    let deposit = [(WRAPPER, Vec::new())];

    assert!(authorized(&registry, &tokens, simple_swap(WALLET, &deposit, 900)));
    assert!(authorized(&registry, &tokens, simple_swap(Address::ZERO, &deposit, 900)));
    assert!(!authorized(
        &registry,
        &tokens,
        simple_swap(Address::repeat_byte(0x66), &deposit, 900)
    ));
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &deposit, 951)));
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &deposit, 0)));
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &[], 900)));
    assert!(!authorized(
        &registry,
        &TradableTokens::default(),
        simple_swap(WALLET, &deposit, 900)
    ));
}

#[test]
fn simple_swap_exchange_calls_pass_the_callee_filter() {
    let mut registry = aggregator_registry();
    register(&mut registry, WRAPPER, FilterKind::Weth);
    register(&mut registry, TRANSFER_PROXY, FilterKind::OnlyApprove);
    let tokens = TradableTokens::new([TOKEN]);

    // Unregistered callee.
    let unknown = [(Address::repeat_byte(0x99), PayloadBuilder::new("swap()").build())];
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &unknown, 900)));

    // A registered callee whose filter refuses the method.
    let unsupported = [(TRANSFER_PROXY, PayloadBuilder::new("unauthorisedMethod()").build())];
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &unsupported, 900)));

    // A plain native transfer is only valid towards the wrapper.
    let native_to_proxy = [(TRANSFER_PROXY, Vec::new())];
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &native_to_proxy, 900)));
    let native_to_wrapper = [(WRAPPER, Vec::new())];
    assert!(authorized(&registry, &tokens, simple_swap(WALLET, &native_to_wrapper, 900)));

    // The aggregator calling its own methods.
    let own_method = [(AGGREGATOR, PayloadBuilder::new("paused()").build())];
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &own_method, 900)));

    // Every callee is checked, not just the first.
    let mixed = [
        (WRAPPER, Vec::new()),
        (TRANSFER_PROXY, PayloadBuilder::new("deposit()").build()),
    ];
    assert!(!authorized(&registry, &tokens, simple_swap(WALLET, &mixed, 900)));
}

#[test]
fn routed_swaps_check_adapters_and_target_exchanges() {
    let mut registry = aggregator_registry();
    let tokens = TradableTokens::new([TOKEN]);

    // Adapter not registered yet.
    assert!(!authorized(&registry, &tokens, multi_swap(&[ADAPTER], &[Address::ZERO])));
    register(&mut registry, ADAPTER, FilterKind::OnlyApprove);
    assert!(authorized(&registry, &tokens, multi_swap(&[ADAPTER], &[Address::ZERO])));

    // Target exchange must be registered too.
    assert!(!authorized(&registry, &tokens, multi_swap(&[ADAPTER], &[TARGET_EXCHANGE])));
    assert!(!authorized(
        &registry,
        &tokens,
        mega_swap(&[ADAPTER, ADAPTER], &[Address::ZERO, TARGET_EXCHANGE])
    ));
    register(&mut registry, TARGET_EXCHANGE, FilterKind::OnlyApprove);
    assert!(authorized(&registry, &tokens, multi_swap(&[ADAPTER], &[TARGET_EXCHANGE])));
    assert!(authorized(
        &registry,
        &tokens,
        mega_swap(&[ADAPTER, ADAPTER], &[Address::ZERO, TARGET_EXCHANGE])
    ));

    // Unregistered adapter in any leg.
    let rogue = Address::repeat_byte(0x68);
    assert!(!authorized(
        &registry,
        &tokens,
        mega_swap(&[ADAPTER, rogue], &[Address::ZERO, Address::ZERO])
    ));
    assert!(!authorized(&registry, &tokens, multi_swap(&[], &[])));
}

#[test]
fn uniswap_swaps_need_the_registered_proxy() {
    let tokens = TradableTokens::new([TOKEN]);
    let mut registry = aggregator_registry();
    let path = [NATIVE_TOKEN, TOKEN];

    // The aggregator's proxy is unknown.
    assert!(!authorized(&registry, &tokens, swap_on_uniswap(&path)));

    registry.set_uniswap_proxy(ADMIN, Some(UNISWAP_PROXY)).unwrap();
    assert!(!authorized(&registry, &tokens, swap_on_uniswap(&path)));

    register(&mut registry, UNISWAP_PROXY, FilterKind::OnlyApprove);
    assert!(authorized(&registry, &tokens, swap_on_uniswap(&path)));
    assert!(!authorized(
        &registry,
        &tokens,
        swap_on_uniswap(&[NATIVE_TOKEN, Address::repeat_byte(0x0c)])
    ));

    // The aggregator switched to a proxy nobody registered.
    registry
        .set_uniswap_proxy(ADMIN, Some(Address::repeat_byte(0x69)))
        .unwrap();
    assert!(!authorized(&registry, &tokens, swap_on_uniswap(&path)));
    assert!(!authorized(&registry, &tokens, swap_on_uniswap_fork(FORK_FACTORY)));

    registry.set_uniswap_proxy(ADMIN, Some(UNISWAP_PROXY)).unwrap();
    assert!(!authorized(&registry, &tokens, swap_on_uniswap_fork(FORK_FACTORY)));
    register(&mut registry, FORK_FACTORY, FilterKind::OnlyApprove);
    assert!(authorized(&registry, &tokens, swap_on_uniswap_fork(FORK_FACTORY)));
}

#[test]
fn beneficiary_must_be_the_wallet() {
    let mut registry = DappRegistry::new(ADMIN, 0, []);
    registry
        .propose_entry(ADMIN, CLAIMS, Some(FilterKind::BeneficiaryTransfer), at(0))
        .unwrap();
    let tokens = TradableTokens::default();
    let w = wallet();
    let claim = |beneficiary: Address| {
        ExternalCall::new(
            CLAIMS,
            PayloadBuilder::new("claimRewards(address,uint256)")
                .address(beneficiary)
                .uint(10)
                .build(),
        )
    };
    authorize_call(&ctx(&w, &registry, &tokens, at(1)), &claim(WALLET)).unwrap();
    assert!(authorize_call(&ctx(&w, &registry, &tokens, at(1)), &claim(Address::repeat_byte(0x66))).is_err());
}

#[test]
fn disabling_the_shared_registry_hides_its_entries() {
    let mut registry = DappRegistry::new(ADMIN, 0, [TOKEN]);
    registry.propose_entry(ADMIN, TOKEN, None, at(0)).unwrap();
    let tokens = TradableTokens::default();
    let mut w = wallet();
    let call = ExternalCall::transfer(TOKEN, 5);
    authorize_call(&ctx(&w, &registry, &tokens, at(1)), &call).unwrap();

    registry
        .toggle_registry(&mut w, RegistryId::SHARED, false)
        .unwrap();
    assert!(authorize_call(&ctx(&w, &registry, &tokens, at(1)), &call).is_err());
}

#[test]
fn batch_fails_on_first_refusal() {
    let mut registry = DappRegistry::new(ADMIN, 0, [TOKEN]);
    registry.propose_entry(ADMIN, TOKEN, None, at(0)).unwrap();
    let tokens = TradableTokens::default();
    let w = wallet();
    let calls = [
        ExternalCall::transfer(TOKEN, 5),
        ExternalCall::transfer(CLAIMS, 5),
    ];
    assert_matches!(
        authorize_calls(&ctx(&w, &registry, &tokens, at(1)), &calls),
        Err(CustosError::CallNotAuthorized { destination: CLAIMS })
    );
}

proptest! {
    #[test]
    fn unregistered_destinations_are_never_authorized(
        to in any::<[u8; 20]>(),
        value in any::<u128>(),
        data in proptest::collection::vec(any::<u8>(), 0..200),
    ) {
        let registry = DappRegistry::new(ADMIN, 0, []);
        let tokens = TradableTokens::default();
        let w = wallet();
        let call = ExternalCall { to: Address::new(to), value, data };
        prop_assert!(authorize_call(&ctx(&w, &registry, &tokens, at(1)), &call).is_err());
    }
}
