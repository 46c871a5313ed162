//! Outgoing call authorization
//!
//! Deny by default: a call goes through only when the effective spender has an
//! enabled entry in one of the wallet's registries and that entry's filter, if
//! any, accepts the call.

use custos_core::effects::ExternalCall;
use custos_core::{Address, CustosError, Result};

use crate::calls::Erc20Call;
use crate::filters::{CallSite, FilterContext};

/// The address a call effectively hands value or allowance to.
///
/// For ERC-20 balance calls this is the address argument; for anything else
/// it is the destination.
pub fn recover_spender(destination: Address, data: &[u8]) -> Address {
    Erc20Call::decode(data).map_or(destination, |call| call.counterparty())
}

/// Whether `destination`/`data` may be called on behalf of the wallet, given
/// an already recovered `spender`.
pub fn is_authorized(
    ctx: &FilterContext<'_>,
    spender: Address,
    destination: Address,
    data: &[u8],
) -> bool {
    let Some((registry, entry)) = ctx.registry.lookup(ctx.wallet, &spender, ctx.now) else {
        tracing::debug!(%spender, "no registry entry");
        return false;
    };
    if !entry.enabled {
        tracing::debug!(%spender, %registry, "registry entry disabled");
        return false;
    }
    match entry.filter {
        None => true,
        Some(kind) => {
            let accepted = kind.accepts(
                ctx,
                &CallSite {
                    spender,
                    destination,
                    data,
                },
            );
            tracing::debug!(%spender, %registry, filter = %kind, accepted, "filter evaluated");
            accepted
        }
    }
}

/// Authorize one outgoing call, or fail with `CallNotAuthorized`.
pub fn authorize_call(ctx: &FilterContext<'_>, call: &ExternalCall) -> Result<()> {
    let wallet = ctx.wallet.address;
    let spender = recover_spender(call.to, &call.data);
    let allowed = call.to != wallet
        && spender != wallet
        && is_authorized(ctx, spender, call.to, &call.data);
    if allowed {
        Ok(())
    } else {
        Err(CustosError::CallNotAuthorized {
            destination: call.to,
        })
    }
}

/// Authorize every call of a batch, stopping at the first refusal.
pub fn authorize_calls(ctx: &FilterContext<'_>, calls: &[ExternalCall]) -> Result<()> {
    calls.iter().try_for_each(|call| authorize_call(ctx, call))
}
