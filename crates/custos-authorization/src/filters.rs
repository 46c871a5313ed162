//! Filters: structural checks over decoded calls
//!
//! A filter never errors. Anything it cannot decode, or decodes to a shape it
//! does not expect, is simply not valid.

use custos_core::{Address, LedgerTime};
use custos_guardians::WalletRecord;

use crate::calls::{
    AggregatorSwap, Erc20Call, ExchangeCall, Payout, RouterSwap, SwapRoute, SwapTerms, WethCall,
};
use crate::engine::{is_authorized, recover_spender};
use crate::registry::{DappRegistry, FilterKind};
use crate::tokens::{TokenRegistry, NATIVE_TOKEN};

/// Read-only state a filter may consult
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    /// The acting wallet
    pub wallet: &'a WalletRecord,
    /// Registries, for checking referenced sub-addresses
    pub registry: &'a DappRegistry,
    /// Token registry
    pub tokens: &'a dyn TokenRegistry,
    /// Ledger time of the evaluation
    pub now: LedgerTime,
}

impl FilterContext<'_> {
    fn is_enabled(&self, address: &Address) -> bool {
        self.registry.is_enabled_for(self.wallet, address, self.now)
    }

    fn is_tradable(&self, token: &Address) -> bool {
        *token == NATIVE_TOKEN || self.tokens.is_tradable(token)
    }
}

/// The call being evaluated
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    /// Effective spender (see [`crate::engine::recover_spender`])
    pub spender: Address,
    /// Call destination
    pub destination: Address,
    /// Call payload
    pub data: &'a [u8],
}

impl FilterKind {
    /// Whether this filter accepts `call`.
    pub fn accepts(self, ctx: &FilterContext<'_>, call: &CallSite<'_>) -> bool {
        match self {
            FilterKind::OnlyApprove => only_approve(call),
            FilterKind::Weth => weth(call),
            FilterKind::UniswapV2Router => uniswap_v2_router(ctx, call),
            FilterKind::Aggregator => aggregator(ctx, call),
            FilterKind::BeneficiaryTransfer => beneficiary_transfer(ctx, call),
        }
    }
}

fn only_approve(call: &CallSite<'_>) -> bool {
    matches!(
        Erc20Call::decode(call.data),
        Some(Erc20Call::Approve { spender, .. }) if spender != call.destination
    )
}

fn weth(call: &CallSite<'_>) -> bool {
    call.spender == call.destination && WethCall::decode(call.data).is_some()
}

fn uniswap_v2_router(ctx: &FilterContext<'_>, call: &CallSite<'_>) -> bool {
    if let Some(Erc20Call::Approve { .. }) = Erc20Call::decode(call.data) {
        return true;
    }
    let Some(swap) = RouterSwap::decode(call.data) else {
        return false;
    };
    swap.recipient == ctx.wallet.address
        && swap.amount_in.map_or(true, |amount| !amount.is_zero())
        && swap.path.len() >= 2
        && swap.path.iter().all(|token| ctx.tokens.is_tradable(token))
}

fn aggregator(ctx: &FilterContext<'_>, call: &CallSite<'_>) -> bool {
    if let Some(Erc20Call::Approve { .. }) = Erc20Call::decode(call.data) {
        return true;
    }
    match AggregatorSwap::decode(call.data) {
        Some(AggregatorSwap::Simple { terms, calls }) => {
            terms_ok(ctx, &terms)
                && !calls.is_empty()
                && calls
                    .iter()
                    .all(|exchange| exchange_call_ok(ctx, call.destination, exchange))
        }
        Some(AggregatorSwap::Multi { terms, routes })
        | Some(AggregatorSwap::Mega { terms, routes, .. }) => {
            terms_ok(ctx, &terms)
                && !routes.is_empty()
                && routes.iter().all(|route| route_ok(ctx, route))
        }
        Some(AggregatorSwap::Uniswap {
            factory,
            amount_in,
            path,
        }) => {
            let proxy_ok = ctx
                .registry
                .uniswap_proxy()
                .is_some_and(|proxy| ctx.is_enabled(&proxy));
            proxy_ok
                && factory.map_or(true, |factory| ctx.is_enabled(&factory))
                && !amount_in.is_zero()
                && path.len() >= 2
                && path.iter().all(|token| ctx.is_tradable(token))
        }
        None => false,
    }
}

fn terms_ok(ctx: &FilterContext<'_>, terms: &SwapTerms) -> bool {
    let beneficiary_ok = terms.beneficiary.is_zero() || terms.beneficiary == ctx.wallet.address;
    let amounts_ok = !terms.from_amount.is_zero()
        && !terms.to_amount.is_zero()
        && terms.to_amount <= terms.expected_amount;
    beneficiary_ok
        && amounts_ok
        && ctx.is_tradable(&terms.from_token)
        && ctx.is_tradable(&terms.to_token)
}

// An exchange call the aggregator makes for the wallet must itself pass the
// callee's registry entry. The aggregator may not call back into itself.
fn exchange_call_ok(ctx: &FilterContext<'_>, aggregator: Address, exchange: &ExchangeCall) -> bool {
    let callee = exchange.callee;
    if callee == aggregator || callee == ctx.wallet.address {
        return false;
    }
    let spender = recover_spender(callee, &exchange.data);
    spender != ctx.wallet.address && is_authorized(ctx, spender, callee, &exchange.data)
}

fn route_ok(ctx: &FilterContext<'_>, route: &SwapRoute) -> bool {
    ctx.is_enabled(&route.adapter)
        && (route.target_exchange.is_zero() || ctx.is_enabled(&route.target_exchange))
}

fn beneficiary_transfer(ctx: &FilterContext<'_>, call: &CallSite<'_>) -> bool {
    Payout::decode(call.data)
        .is_some_and(|payout| payout.beneficiary == ctx.wallet.address && !payout.amount.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TradableTokens;
    use custos_core::PayloadBuilder;

    const WALLET: Address = Address::repeat_byte(0xaa);
    const ROUTER: Address = Address::repeat_byte(0x40);
    const TOKEN_A: Address = Address::repeat_byte(0x0a);
    const TOKEN_B: Address = Address::repeat_byte(0x0b);

    struct Fixture {
        wallet: WalletRecord,
        registry: DappRegistry,
        tokens: TradableTokens,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                wallet: WalletRecord::create(WALLET, Address::repeat_byte(1), []).unwrap(),
                registry: DappRegistry::new(Address::repeat_byte(0xad), 0, []),
                tokens: TradableTokens::new([TOKEN_A, TOKEN_B]),
            }
        }

        fn ctx(&self) -> FilterContext<'_> {
            FilterContext {
                wallet: &self.wallet,
                registry: &self.registry,
                tokens: &self.tokens,
                now: LedgerTime::new(1, 1),
            }
        }
    }

    fn site(spender: Address, destination: Address, data: &[u8]) -> CallSite<'_> {
        CallSite {
            spender,
            destination,
            data,
        }
    }

    fn approve(spender: Address) -> Vec<u8> {
        PayloadBuilder::new("approve(address,uint256)")
            .address(spender)
            .uint(100)
            .build()
    }

    #[test]
    fn test_only_approve_accepts_unlimited_allowance() {
        let f = Fixture::new();
        let data = PayloadBuilder::new("approve(address,uint256)")
            .address(ROUTER)
            .uint256(custos_core::U256::MAX)
            .build();
        assert!(FilterKind::OnlyApprove.accepts(&f.ctx(), &site(ROUTER, TOKEN_A, &data)));
    }

    #[test]
    fn test_only_approve() {
        let f = Fixture::new();
        let data = approve(ROUTER);
        assert!(FilterKind::OnlyApprove.accepts(&f.ctx(), &site(ROUTER, TOKEN_A, &data)));
        let to_self = approve(TOKEN_A);
        assert!(!FilterKind::OnlyApprove.accepts(&f.ctx(), &site(TOKEN_A, TOKEN_A, &to_self)));
        let transfer = PayloadBuilder::new("transfer(address,uint256)")
            .address(ROUTER)
            .uint(1)
            .build();
        assert!(!FilterKind::OnlyApprove.accepts(&f.ctx(), &site(ROUTER, TOKEN_A, &transfer)));
    }

    #[test]
    fn test_weth_must_target_wrapper() {
        let f = Fixture::new();
        let weth = Address::repeat_byte(0xee);
        let deposit = PayloadBuilder::new("deposit()").build();
        assert!(FilterKind::Weth.accepts(&f.ctx(), &site(weth, weth, &deposit)));
        assert!(FilterKind::Weth.accepts(&f.ctx(), &site(weth, weth, &[])));
        assert!(!FilterKind::Weth.accepts(&f.ctx(), &site(weth, TOKEN_A, &deposit)));
    }

    fn router_swap(recipient: Address, path: &[Address], amount: u128) -> Vec<u8> {
        PayloadBuilder::new("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)")
            .uint(amount)
            .uint(1)
            .address_array(path)
            .address(recipient)
            .uint(u128::from(u64::MAX))
            .build()
    }

    #[test]
    fn test_router_swaps() {
        let f = Fixture::new();
        let ok = router_swap(WALLET, &[TOKEN_A, TOKEN_B], 10);
        assert!(FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &ok)));

        let elsewhere = router_swap(Address::repeat_byte(0x66), &[TOKEN_A, TOKEN_B], 10);
        assert!(!FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &elsewhere)));

        let untradable = router_swap(WALLET, &[TOKEN_A, Address::repeat_byte(0x0c)], 10);
        assert!(!FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &untradable)));

        let short_path = router_swap(WALLET, &[TOKEN_A], 10);
        assert!(!FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &short_path)));

        let zero = router_swap(WALLET, &[TOKEN_A, TOKEN_B], 0);
        assert!(!FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &zero)));

        let approval = approve(ROUTER);
        assert!(FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, TOKEN_A, &approval)));
    }

    #[test]
    fn test_native_input_swaps_accept_zero_minimum_output() {
        let f = Fixture::new();
        let swap = PayloadBuilder::new("swapExactETHForTokens(uint256,address[],address,uint256)")
            .uint(0)
            .address_array(&[TOKEN_A, TOKEN_B])
            .address(WALLET)
            .uint(u128::from(u64::MAX))
            .build();
        assert!(FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &swap)));
    }

    #[test]
    fn test_exact_output_swaps_check_maximum_input() {
        let f = Fixture::new();
        let swap = |amount_in_max: u128| {
            PayloadBuilder::new("swapTokensForExactTokens(uint256,uint256,address[],address,uint256)")
                .uint(10)
                .uint(amount_in_max)
                .address_array(&[TOKEN_A, TOKEN_B])
                .address(WALLET)
                .uint(u128::from(u64::MAX))
                .build()
        };
        assert!(FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &swap(25))));
        assert!(!FilterKind::UniswapV2Router.accepts(&f.ctx(), &site(ROUTER, ROUTER, &swap(0))));
    }

    #[test]
    fn test_beneficiary_transfer() {
        let f = Fixture::new();
        let payout = |to: Address| {
            PayloadBuilder::new("claim(address,uint256)")
                .address(to)
                .uint(5)
                .build()
        };
        let dest = Address::repeat_byte(0x51);
        assert!(FilterKind::BeneficiaryTransfer.accepts(&f.ctx(), &site(dest, dest, &payout(WALLET))));
        assert!(!FilterKind::BeneficiaryTransfer
            .accepts(&f.ctx(), &site(dest, dest, &payout(Address::repeat_byte(0x66)))));
    }

    #[test]
    fn test_garbage_never_accepted() {
        let f = Fixture::new();
        let garbage = [0xffu8; 77];
        for kind in [
            FilterKind::OnlyApprove,
            FilterKind::Weth,
            FilterKind::UniswapV2Router,
            FilterKind::Aggregator,
            FilterKind::BeneficiaryTransfer,
        ] {
            assert!(!kind.accepts(&f.ctx(), &site(ROUTER, ROUTER, &garbage)), "{kind}");
        }
    }
}
