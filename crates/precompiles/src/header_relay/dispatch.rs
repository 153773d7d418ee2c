use alloy_primitives::U256;
use alloy_sol_types::SolInterface;
use header_relay_contracts::precompiles::{HeaderRelayError, IHeaderRelay::IHeaderRelayCalls};

use crate::{
    CallContext, Precompile, PrecompileResult, dispatch_call, header_relay::HeaderRelay, mutate,
    mutate_void, revert, storage::PrecompileStorageProvider, view,
};

impl<S: PrecompileStorageProvider + ?Sized> Precompile for HeaderRelay<'_, S> {
    fn call(&mut self, calldata: &[u8], ctx: CallContext) -> PrecompileResult {
        if calldata.is_empty() && !ctx.value.is_zero() {
            return revert(HeaderRelayError::direct_payments_not_supported());
        }

        dispatch_call(calldata, IHeaderRelayCalls::abi_decode, |call| {
            // Value only enters the relay as a task reward.
            if !ctx.value.is_zero() && !matches!(call, IHeaderRelayCalls::request(_)) {
                return revert(HeaderRelayError::direct_payments_not_supported());
            }

            match call {
                IHeaderRelayCalls::request(call) => {
                    mutate(call, ctx, |ctx, call| self.request(ctx, call))
                }
                IHeaderRelayCalls::response(call) => {
                    mutate_void(call, ctx, |ctx, call| self.response(ctx, call))
                }
                IHeaderRelayCalls::responseHeader(call) => {
                    mutate_void(call, ctx, |ctx, call| self.response_header(ctx, call))
                }
                IHeaderRelayCalls::refund(call) => {
                    mutate_void(call, ctx, |ctx, call| self.refund(ctx, call))
                }
                IHeaderRelayCalls::isRefundable(call) => {
                    view(call, |call| self.is_refundable(call.taskId))
                }
                IHeaderRelayCalls::commit(call) => {
                    mutate(call, ctx, |_, call| self.commit(call.blockNumber))
                }
                IHeaderRelayCalls::commitMany(call) => mutate(call, ctx, |_, call| {
                    self.commit_many(&call.blockNumbers).map(U256::from)
                }),
                IHeaderRelayCalls::committedHash(call) => {
                    view(call, |call| self.committed_hash(call.blockNumber))
                }
                IHeaderRelayCalls::blockHash(call) => {
                    view(call, |call| self.block_hash(call.blockNumber))
                }
                IHeaderRelayCalls::getTask(call) => view(call, |call| self.get_task(call.taskId)),
                IHeaderRelayCalls::resolvedValue(call) => view(call, |call| {
                    self.resolved_value(call.blockNumber, call.fieldIndex)
                }),
                IHeaderRelayCalls::taskIdOf(call) => view(call, |call| {
                    self.task_id_of(call.blockNumber, call.fieldIndex)
                }),
                IHeaderRelayCalls::totalLocked(call) => view(call, |_| self.total_locked()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        expect_precompile_revert,
        storage::hashmap::HashMapStorageProvider,
        test_util::{assert_full_coverage, check_selector_coverage},
    };
    use alloy_primitives::{Address, Bytes, address};
    use alloy_sol_types::SolCall;
    use header_relay_contracts::precompiles::IHeaderRelay;

    const CONSUMER: Address = address!("0xC0C0000000000000000000000000000000000000");

    #[test]
    fn test_header_relay_selector_coverage() {
        let mut storage = HashMapStorageProvider::new();
        let mut relay = HeaderRelay::new(&mut storage);

        let unsupported = check_selector_coverage(
            &mut relay,
            IHeaderRelayCalls::SELECTORS,
            "IHeaderRelay",
            IHeaderRelayCalls::name_by_selector,
        );

        assert_full_coverage([unsupported]);
    }

    #[test]
    fn test_unknown_and_short_calldata() {
        let mut storage = HashMapStorageProvider::new();
        let mut relay = HeaderRelay::new(&mut storage);
        let ctx = CallContext::contract(CONSUMER);

        let cases: [&[u8]; 3] = [&[], &[0x01, 0x02], &[0xde, 0xad, 0xbe, 0xef]];
        for calldata in cases {
            let result = relay.call(calldata, ctx);
            expect_precompile_revert(&result, HeaderRelayError::function_does_not_exist());
        }
    }

    #[test]
    fn test_direct_payment_is_rejected() {
        let mut storage = HashMapStorageProvider::new();
        let mut relay = HeaderRelay::new(&mut storage);
        let ctx = CallContext::contract(CONSUMER).with_value(U256::from(1));

        let result = relay.call(&[], ctx);
        expect_precompile_revert(&result, HeaderRelayError::direct_payments_not_supported());

        let calldata = IHeaderRelay::commitCall { blockNumber: 1 }.abi_encode();
        let result = relay.call(&calldata, ctx);
        expect_precompile_revert(&result, HeaderRelayError::direct_payments_not_supported());
    }

    #[test]
    fn test_truncated_arguments_revert_without_data() -> eyre::Result<()> {
        let mut storage = HashMapStorageProvider::new();
        let mut relay = HeaderRelay::new(&mut storage);

        let mut calldata = IHeaderRelay::getTaskCall { taskId: 1 }.abi_encode();
        calldata.truncate(4);
        let output = relay.call(&calldata, CallContext::contract(CONSUMER))?;

        assert!(output.reverted);
        assert_eq!(output.bytes, Bytes::new());
        Ok(())
    }

    #[test]
    fn test_views_encode_returns() -> eyre::Result<()> {
        let mut storage = HashMapStorageProvider::new();
        let mut relay = HeaderRelay::new(&mut storage);
        let ctx = CallContext::externally_owned(CONSUMER);

        let calldata = IHeaderRelay::taskIdOfCall {
            blockNumber: 1000,
            fieldIndex: 15,
        }
        .abi_encode();
        let output = relay.call(&calldata, ctx)?;
        assert!(!output.reverted);
        assert_eq!(
            IHeaderRelay::taskIdOfCall::abi_decode_returns(&output.bytes)?,
            (1000 << 8) | 15
        );

        let calldata = IHeaderRelay::totalLockedCall {}.abi_encode();
        let output = relay.call(&calldata, ctx)?;
        assert_eq!(
            IHeaderRelay::totalLockedCall::abi_decode_returns(&output.bytes)?,
            U256::ZERO
        );

        let calldata = IHeaderRelay::blockHashCall { blockNumber: 5 }.abi_encode();
        let result = relay.call(&calldata, ctx);
        expect_precompile_revert(&result, HeaderRelayError::out_of_retention_range());
        Ok(())
    }
}
