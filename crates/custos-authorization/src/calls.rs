//! Typed call grammar
//!
//! Payloads are decoded into one of a few typed shapes before any filter looks
//! at them. A payload that does not match a shape exactly decodes to `None`;
//! there is no partial decode.

use custos_core::abi::{split_selector, ArgReader, Selector, U256};
use custos_core::Address;

/// ERC-20 token calls that move or delegate a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erc20Call {
    /// `approve(address,uint256)`
    Approve { spender: Address, amount: U256 },
    /// `increaseAllowance(address,uint256)`
    IncreaseAllowance { spender: Address, amount: U256 },
    /// `transfer(address,uint256)`
    Transfer { recipient: Address, amount: U256 },
    /// `transferFrom(address,address,uint256)`
    TransferFrom {
        from: Address,
        recipient: Address,
        amount: U256,
    },
}

impl Erc20Call {
    /// Decode an ERC-20 call. Arguments must fill the payload exactly.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (selector, args) = split_selector(data).ok()?;
        let call = if selector == Selector::of("approve(address,uint256)") {
            exact(&args, 2)?;
            Erc20Call::Approve {
                spender: args.address(0).ok()?,
                amount: args.uint256(1).ok()?,
            }
        } else if selector == Selector::of("increaseAllowance(address,uint256)") {
            exact(&args, 2)?;
            Erc20Call::IncreaseAllowance {
                spender: args.address(0).ok()?,
                amount: args.uint256(1).ok()?,
            }
        } else if selector == Selector::of("transfer(address,uint256)") {
            exact(&args, 2)?;
            Erc20Call::Transfer {
                recipient: args.address(0).ok()?,
                amount: args.uint256(1).ok()?,
            }
        } else if selector == Selector::of("transferFrom(address,address,uint256)") {
            exact(&args, 3)?;
            Erc20Call::TransferFrom {
                from: args.address(0).ok()?,
                recipient: args.address(1).ok()?,
                amount: args.uint256(2).ok()?,
            }
        } else {
            return None;
        };
        Some(call)
    }

    /// The address the call delegates to or pays.
    pub fn counterparty(&self) -> Address {
        match *self {
            Erc20Call::Approve { spender, .. } | Erc20Call::IncreaseAllowance { spender, .. } => {
                spender
            }
            Erc20Call::Transfer { recipient, .. } | Erc20Call::TransferFrom { recipient, .. } => {
                recipient
            }
        }
    }
}

/// Wrapped native token calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WethCall {
    /// Empty payload or `deposit()`
    Deposit,
    /// `withdraw(uint256)`
    Withdraw { amount: U256 },
}

impl WethCall {
    /// Decode a wrapper call.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return Some(WethCall::Deposit);
        }
        let (selector, args) = split_selector(data).ok()?;
        if selector == Selector::of("deposit()") {
            exact(&args, 0)?;
            Some(WethCall::Deposit)
        } else if selector == Selector::of("withdraw(uint256)") {
            exact(&args, 1)?;
            Some(WethCall::Withdraw {
                amount: args.uint256(0).ok()?,
            })
        } else {
            None
        }
    }
}

/// A Uniswap V2 style router swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSwap {
    /// Token input (exact or maximum); `None` when the native value pays
    pub amount_in: Option<U256>,
    /// Token path, input first
    pub path: Vec<Address>,
    /// Recipient of the output
    pub recipient: Address,
}

struct RouterShape {
    signature: &'static str,
    path: usize,
    recipient: usize,
    amount_in: Option<usize>,
}

const ROUTER_SWAPS: [RouterShape; 6] = [
    RouterShape {
        signature: "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)",
        path: 2,
        recipient: 3,
        amount_in: Some(0),
    },
    RouterShape {
        signature: "swapTokensForExactTokens(uint256,uint256,address[],address,uint256)",
        path: 2,
        recipient: 3,
        amount_in: Some(1),
    },
    RouterShape {
        signature: "swapExactTokensForETH(uint256,uint256,address[],address,uint256)",
        path: 2,
        recipient: 3,
        amount_in: Some(0),
    },
    RouterShape {
        signature: "swapTokensForExactETH(uint256,uint256,address[],address,uint256)",
        path: 2,
        recipient: 3,
        amount_in: Some(1),
    },
    RouterShape {
        signature: "swapExactETHForTokens(uint256,address[],address,uint256)",
        path: 1,
        recipient: 2,
        amount_in: None,
    },
    RouterShape {
        signature: "swapETHForExactTokens(uint256,address[],address,uint256)",
        path: 1,
        recipient: 2,
        amount_in: None,
    },
];

impl RouterSwap {
    /// Decode one of the supported router swaps.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (selector, args) = split_selector(data).ok()?;
        let shape = ROUTER_SWAPS
            .iter()
            .find(|shape| Selector::of(shape.signature) == selector)?;
        let amount_in = match shape.amount_in {
            Some(index) => Some(args.uint256(index).ok()?),
            None => None,
        };
        Some(RouterSwap {
            amount_in,
            path: args.address_array(shape.path).ok()?,
            recipient: args.address(shape.recipient).ok()?,
        })
    }
}

const SIMPLE_SWAP: &str =
    "simpleSwap(address,address,uint256,uint256,uint256,address[],bytes,uint256[],address)";
const MULTI_SWAP: &str = "multiSwap(address,address,uint256,uint256,uint256,address[],address[],address)";
const MEGA_SWAP: &str =
    "megaSwap(address,address,uint256,uint256,uint256,uint256[],address[],address[],address)";
const SWAP_ON_UNISWAP: &str = "swapOnUniswap(uint256,uint256,address[],uint8)";
const SWAP_ON_UNISWAP_FORK: &str = "swapOnUniswapFork(address,bytes32,uint256,uint256,address[],uint8)";

/// Price terms shared by the aggregator's routed entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapTerms {
    /// Token sold (native sentinel for the native token)
    pub from_token: Address,
    /// Token bought
    pub to_token: Address,
    /// Amount sold
    pub from_amount: U256,
    /// Minimum amount bought
    pub to_amount: U256,
    /// Quoted amount bought
    pub expected_amount: U256,
    /// Recipient of the output; zero means the caller
    pub beneficiary: Address,
}

impl SwapTerms {
    fn decode(args: &ArgReader<'_>, beneficiary: usize) -> Option<Self> {
        Some(SwapTerms {
            from_token: args.address(0).ok()?,
            to_token: args.address(1).ok()?,
            from_amount: args.uint256(2).ok()?,
            to_amount: args.uint256(3).ok()?,
            expected_amount: args.uint256(4).ok()?,
            beneficiary: args.address(beneficiary).ok()?,
        })
    }
}

/// One call `simpleSwap` makes from the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCall {
    /// Contract called
    pub callee: Address,
    /// Payload, sliced out of the shared exchange data
    pub data: Vec<u8>,
}

/// One leg of a `multiSwap` or `megaSwap`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRoute {
    /// Adapter executing the leg
    pub adapter: Address,
    /// Exchange the adapter trades on; zero means the adapter's default
    pub target_exchange: Address,
}

/// An aggregator swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorSwap {
    /// `simpleSwap`: the aggregator calls the exchanges directly
    Simple {
        terms: SwapTerms,
        calls: Vec<ExchangeCall>,
    },
    /// `multiSwap`: a single path of adapter legs
    Multi {
        terms: SwapTerms,
        routes: Vec<SwapRoute>,
    },
    /// `megaSwap`: legs each taking a share (basis points) of the input
    Mega {
        terms: SwapTerms,
        percents: Vec<U256>,
        routes: Vec<SwapRoute>,
    },
    /// `swapOnUniswap` / `swapOnUniswapFork`, executed by the aggregator's
    /// uniswap proxy on behalf of the caller
    Uniswap {
        /// Pair factory of a fork; `None` for canonical uniswap
        factory: Option<Address>,
        amount_in: U256,
        path: Vec<Address>,
    },
}

impl AggregatorSwap {
    /// Decode any supported aggregator entry point.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (selector, args) = split_selector(data).ok()?;
        if selector == Selector::of(SIMPLE_SWAP) {
            Some(AggregatorSwap::Simple {
                terms: SwapTerms::decode(&args, 8)?,
                calls: exchange_calls(&args)?,
            })
        } else if selector == Selector::of(MULTI_SWAP) {
            Some(AggregatorSwap::Multi {
                terms: SwapTerms::decode(&args, 7)?,
                routes: routes(&args, 5, 6)?,
            })
        } else if selector == Selector::of(MEGA_SWAP) {
            let routes = routes(&args, 6, 7)?;
            let percents = args.uint256_array(5).ok()?;
            (percents.len() == routes.len()).then_some(())?;
            Some(AggregatorSwap::Mega {
                terms: SwapTerms::decode(&args, 8)?,
                percents,
                routes,
            })
        } else if selector == Selector::of(SWAP_ON_UNISWAP) {
            referrer(&args, 3)?;
            Some(AggregatorSwap::Uniswap {
                factory: None,
                amount_in: args.uint256(0).ok()?,
                path: args.address_array(2).ok()?,
            })
        } else if selector == Selector::of(SWAP_ON_UNISWAP_FORK) {
            referrer(&args, 5)?;
            Some(AggregatorSwap::Uniswap {
                factory: Some(args.address(0).ok()?),
                amount_in: args.uint256(2).ok()?,
                path: args.address_array(4).ok()?,
            })
        } else {
            None
        }
    }
}

// Exchange calls of a `simpleSwap`: callee `i` receives the exchange data
// between start indexes `i` and `i + 1`.
fn exchange_calls(args: &ArgReader<'_>) -> Option<Vec<ExchangeCall>> {
    let callees = args.address_array(5).ok()?;
    let exchange_data = args.bytes(6).ok()?;
    let starts = args
        .uint256_array(7)
        .ok()?
        .iter()
        .map(|start| usize::try_from(start.to_u128()?).ok())
        .collect::<Option<Vec<usize>>>()?;
    if starts.len() != callees.len() + 1 {
        return None;
    }
    callees
        .iter()
        .zip(starts.windows(2))
        .map(|(callee, bounds)| {
            let data = exchange_data.get(bounds[0]..bounds[1])?;
            Some(ExchangeCall {
                callee: *callee,
                data: data.to_vec(),
            })
        })
        .collect()
}

fn routes(args: &ArgReader<'_>, adapters: usize, targets: usize) -> Option<Vec<SwapRoute>> {
    let adapters = args.address_array(adapters).ok()?;
    let targets = args.address_array(targets).ok()?;
    if adapters.len() != targets.len() {
        return None;
    }
    Some(
        adapters
            .into_iter()
            .zip(targets)
            .map(|(adapter, target_exchange)| SwapRoute {
                adapter,
                target_exchange,
            })
            .collect(),
    )
}

fn referrer(args: &ArgReader<'_>, index: usize) -> Option<()> {
    (args.uint(index).ok()? <= u128::from(u8::MAX)).then_some(())
}

/// A `(beneficiary, amount)` payout under any selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    /// Who receives the payout
    pub beneficiary: Address,
    /// Amount paid
    pub amount: U256,
}

impl Payout {
    /// Decode a two-word payout.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (_, args) = split_selector(data).ok()?;
        exact(&args, 2)?;
        Some(Payout {
            beneficiary: args.address(0).ok()?,
            amount: args.uint256(1).ok()?,
        })
    }
}

fn exact(args: &ArgReader<'_>, words: usize) -> Option<()> {
    (args.word_count() == words && args.len() == words * 32).then_some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use custos_core::PayloadBuilder;

    fn a(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn test_erc20_shapes() {
        let approve = PayloadBuilder::new("approve(address,uint256)")
            .address(a(1))
            .uint(5)
            .build();
        assert_eq!(
            Erc20Call::decode(&approve),
            Some(Erc20Call::Approve {
                spender: a(1),
                amount: U256::from(5)
            })
        );

        let from = PayloadBuilder::new("transferFrom(address,address,uint256)")
            .address(a(1))
            .address(a(2))
            .uint(9)
            .build();
        assert_eq!(Erc20Call::decode(&from).map(|c| c.counterparty()), Some(a(2)));

        let mut trailing = approve.clone();
        trailing.extend_from_slice(&[0u8; 32]);
        assert_eq!(Erc20Call::decode(&trailing), None);
        assert_eq!(Erc20Call::decode(&approve[..40]), None);
    }

    #[test]
    fn test_unlimited_amounts_decode() {
        let approve = PayloadBuilder::new("approve(address,uint256)")
            .address(a(1))
            .uint256(U256::MAX)
            .build();
        assert_eq!(
            Erc20Call::decode(&approve),
            Some(Erc20Call::Approve {
                spender: a(1),
                amount: U256::MAX
            })
        );

        let transfer = PayloadBuilder::new("transfer(address,uint256)")
            .address(a(2))
            .uint256(U256::MAX)
            .build();
        assert_eq!(Erc20Call::decode(&transfer).map(|c| c.counterparty()), Some(a(2)));
    }

    #[test]
    fn test_weth_shapes() {
        assert_eq!(WethCall::decode(&[]), Some(WethCall::Deposit));
        let withdraw = PayloadBuilder::new("withdraw(uint256)").uint(3).build();
        assert_eq!(
            WethCall::decode(&withdraw),
            Some(WethCall::Withdraw {
                amount: U256::from(3)
            })
        );
        let other = PayloadBuilder::new("approve(address,uint256)")
            .address(a(1))
            .uint(1)
            .build();
        assert_eq!(WethCall::decode(&other), None);
    }

    #[test]
    fn test_router_swap_shapes() {
        let path = [a(1), a(2)];
        let tokens = PayloadBuilder::new(
            "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)",
        )
        .uint(10)
        .uint(1)
        .address_array(&path)
        .address(a(9))
        .uint(99)
        .build();
        let swap = RouterSwap::decode(&tokens).unwrap();
        assert_eq!(swap.amount_in, Some(U256::from(10)));
        assert_eq!(swap.path, path.to_vec());
        assert_eq!(swap.recipient, a(9));

        let exact_out = PayloadBuilder::new(
            "swapTokensForExactETH(uint256,uint256,address[],address,uint256)",
        )
        .uint(10)
        .uint(25)
        .address_array(&path)
        .address(a(9))
        .uint(99)
        .build();
        assert_eq!(
            RouterSwap::decode(&exact_out).and_then(|s| s.amount_in),
            Some(U256::from(25))
        );

        let eth = PayloadBuilder::new("swapExactETHForTokens(uint256,address[],address,uint256)")
            .uint(4)
            .address_array(&path)
            .address(a(8))
            .uint(99)
            .build();
        let swap = RouterSwap::decode(&eth).unwrap();
        assert_eq!(swap.recipient, a(8));
        assert_eq!(swap.amount_in, None);
    }

    fn with_terms(b: PayloadBuilder) -> PayloadBuilder {
        b.address(a(1)).address(a(2)).uint(100).uint(90).uint(95)
    }

    #[test]
    fn test_simple_swap_slices_exchange_data() {
        let first = PayloadBuilder::new("deposit()").build();
        let second = PayloadBuilder::new("approve(address,uint256)")
            .address(a(7))
            .uint(1)
            .build();
        let mut exchange_data = first.clone();
        exchange_data.extend_from_slice(&second);
        let starts = [0, first.len(), exchange_data.len()].map(|i| U256::from(i as u128));

        let data = with_terms(PayloadBuilder::new(SIMPLE_SWAP))
            .address_array(&[a(5), a(6)])
            .bytes(&exchange_data)
            .uint256_array(&starts)
            .address(Address::ZERO)
            .build();
        let Some(AggregatorSwap::Simple { terms, calls }) = AggregatorSwap::decode(&data) else {
            panic!("simpleSwap did not decode");
        };
        assert_eq!(terms.expected_amount, U256::from(95));
        assert_eq!(
            calls,
            vec![
                ExchangeCall {
                    callee: a(5),
                    data: first
                },
                ExchangeCall {
                    callee: a(6),
                    data: second
                },
            ]
        );

        let missing_start = with_terms(PayloadBuilder::new(SIMPLE_SWAP))
            .address_array(&[a(5), a(6)])
            .bytes(&exchange_data)
            .uint256_array(&starts[..2])
            .address(Address::ZERO)
            .build();
        assert_eq!(AggregatorSwap::decode(&missing_start), None);
    }

    #[test]
    fn test_routed_swap_shapes() {
        let multi = with_terms(PayloadBuilder::new(MULTI_SWAP))
            .address_array(&[a(5)])
            .address_array(&[a(0x55)])
            .address(Address::ZERO)
            .build();
        let Some(AggregatorSwap::Multi { terms, routes }) = AggregatorSwap::decode(&multi) else {
            panic!("multiSwap did not decode");
        };
        assert!(terms.beneficiary.is_zero());
        assert_eq!(
            routes,
            vec![SwapRoute {
                adapter: a(5),
                target_exchange: a(0x55)
            }]
        );

        let uneven = with_terms(PayloadBuilder::new(MULTI_SWAP))
            .address_array(&[a(5), a(6)])
            .address_array(&[a(0x55)])
            .address(Address::ZERO)
            .build();
        assert_eq!(AggregatorSwap::decode(&uneven), None);

        let mega = with_terms(PayloadBuilder::new(MEGA_SWAP))
            .uint256_array(&[U256::from(6_000), U256::from(4_000)])
            .address_array(&[a(5), a(6)])
            .address_array(&[Address::ZERO, a(0x66)])
            .address(a(0xaa))
            .build();
        assert!(matches!(
            AggregatorSwap::decode(&mega),
            Some(AggregatorSwap::Mega { ref routes, .. }) if routes.len() == 2
        ));
    }

    #[test]
    fn test_uniswap_proxy_shapes() {
        let path = [a(1), a(2)];
        let direct = PayloadBuilder::new(SWAP_ON_UNISWAP)
            .uint(10)
            .uint(1)
            .address_array(&path)
            .uint(0)
            .build();
        assert_eq!(
            AggregatorSwap::decode(&direct),
            Some(AggregatorSwap::Uniswap {
                factory: None,
                amount_in: U256::from(10),
                path: path.to_vec(),
            })
        );

        let fork = PayloadBuilder::new(SWAP_ON_UNISWAP_FORK)
            .address(a(0xfa))
            .word([0x11; 32])
            .uint(10)
            .uint(1)
            .address_array(&path)
            .uint(3)
            .build();
        assert!(matches!(
            AggregatorSwap::decode(&fork),
            Some(AggregatorSwap::Uniswap { factory: Some(f), .. }) if f == a(0xfa)
        ));

        let bad_referrer = PayloadBuilder::new(SWAP_ON_UNISWAP)
            .uint(10)
            .uint(1)
            .address_array(&path)
            .uint(256)
            .build();
        assert_eq!(AggregatorSwap::decode(&bad_referrer), None);
    }

    #[test]
    fn test_payout_shape() {
        let data = PayloadBuilder::new("claim(address,uint256)")
            .address(a(3))
            .uint(7)
            .build();
        assert_eq!(
            Payout::decode(&data),
            Some(Payout {
                beneficiary: a(3),
                amount: U256::from(7)
            })
        );
        assert_eq!(Payout::decode(&data[..4]), None);
    }
}
