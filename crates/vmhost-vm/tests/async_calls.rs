//! Promises, legacy async calls, deployment and upgrade from running code.

mod common;

use common::*;
use num_bigint::{BigInt, BigUint};
use vmhost_types::{Account, Address, CodeMetadata, ReturnCode};
use vmhost_vm::{AsyncCallRequest, Composition, Lifecycle, MockContract, VmError, World};

const CALLER: &[u8] = b"caller-code";
const CALLEE: &[u8] = b"callee-code";
const UPGRADED: &[u8] = b"upgraded-code";
const CHILD: &[u8] = b"child-code";

fn zero() -> BigUint {
    BigUint::default()
}

fn fixture() -> Fixture {
    let fx = Fixture::new(world_with(&[("caller", CALLER), ("callee", CALLEE)]));
    fx.register(
        CALLEE,
        MockContract::new()
            .with_method("double", |host| {
                let rt = host.runtime();
                let n = rt.int64_argument(0)?;
                rt.storage_store(b"doubled", &[1])?;
                rt.int64_finish(n * 2)
            })
            .with_method("explode", |host| {
                host.runtime().storage_store(b"wreckage", &[1])?;
                Err(host.runtime().signal_error(b"boom"))
            })
            .with_method("record", |host| {
                host.runtime().storage_store(b"seen", &[1])?;
                host.runtime().finish(b"ignored".to_vec())
            }),
    );
    fx
}

fn callbacks() -> MockContract {
    MockContract::new()
        .with_method("onOk", |host| {
            let rt = host.runtime();
            let count = rt.num_arguments()?;
            rt.finish(vec![count as u8])?;
            for index in 0..count {
                let argument = rt.argument(index)?;
                rt.finish(argument)?;
            }
            rt.storage_store(b"ok", &[1])?;
            Ok(())
        })
        .with_method("onErr", |host| {
            let rt = host.runtime();
            let code = rt.argument(0)?;
            let message = rt.argument(1)?;
            rt.finish(code)?;
            rt.finish(message)?;
            rt.storage_store(b"err", &[1])?;
            Ok(())
        })
}

fn promise(data: &[u8]) -> AsyncCallRequest {
    AsyncCallRequest::new(contract("callee"), zero(), data.to_vec())
        .with_gas(1_000_000)
        .with_extra_gas(500_000)
        .with_callbacks("onOk", "onErr")
}

#[test_log::test]
fn test_promise_success_runs_success_callback_once() {
    let fx = fixture();
    fx.register(
        CALLER,
        callbacks().with_method("run", |host| {
            let status = host.create_async_call(promise(b"double@05"))?;
            host.runtime().finish(vec![status as u8])
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    // Callback output, then the caller's own status.
    assert_eq!(output.return_data, vec![vec![1], vec![10], vec![0]]);

    let caller = output.account(&contract("caller")).unwrap();
    assert!(caller.storage_updates.contains_key(&b"ok"[..]));
    assert!(!caller.storage_updates.contains_key(&b"err"[..]));
    let callee = output.account(&contract("callee")).unwrap();
    assert!(callee.storage_updates.contains_key(&b"doubled"[..]));
}

#[test_log::test]
fn test_promise_failure_runs_error_callback() {
    let fx = fixture();
    fx.register(
        CALLER,
        callbacks().with_method("run", |host| {
            let status = host.create_async_call(promise(b"explode"))?;
            host.runtime().finish(vec![status as u8])
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(
        output.return_data,
        vec![ReturnCode::UserError.to_bytes(), b"boom".to_vec(), vec![0]]
    );

    let caller = output.account(&contract("caller")).unwrap();
    assert!(caller.storage_updates.contains_key(&b"err"[..]));
    assert!(!caller.storage_updates.contains_key(&b"ok"[..]));
    assert!(output
        .account(&contract("callee"))
        .map_or(true, |callee| callee.storage_updates.is_empty()));
}

#[test_log::test]
fn test_callback_shares_the_caller_handles() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new()
            .with_method("run", |host| {
                host.runtime().big_int_new(41)?;
                host.create_async_call(promise(b"double@01").with_callbacks("bump", ""))?;
                host.runtime().big_int_finish_unsigned(0)
            })
            .with_method("bump", |host| {
                let rt = host.runtime();
                let one = rt.big_int_new(1)?;
                rt.big_int_add(0, 0, one)?;
                rt.finish(one.to_be_bytes().to_vec())
            }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![1i32.to_be_bytes().to_vec(), vec![42]]);
}

#[test_log::test]
fn test_promise_without_callbacks() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let request = AsyncCallRequest::new(contract("callee"), zero(), b"record".to_vec()).with_gas(100_000);
            let status = host.create_async_call(request)?;
            host.runtime().finish(vec![status as u8])
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![0]]);
    let callee = output.account(&contract("callee")).unwrap();
    assert!(callee.storage_updates.contains_key(&b"seen"[..]));
}

#[test_log::test]
fn test_grouped_promise_behaves_like_a_plain_one() {
    let fx = fixture();
    fx.register(
        CALLER,
        callbacks().with_method("run", |host| {
            let request = promise(b"double@03").with_extra_gas(0).with_group(b"batch".to_vec());
            host.create_async_call(request)?;
            Ok(())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![1], vec![6]]);
}

#[test_log::test]
fn test_promise_needs_its_gas_up_front() {
    let fx = fixture();
    fx.register(
        CALLER,
        callbacks().with_method("run", |host| {
            host.create_async_call(promise(b"double@05").with_gas(GAS * 2))?;
            Ok(())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(!output.is_ok());
    assert_eq!(output.return_message, VmError::NotEnoughGas.to_string());
}

#[test_log::test]
fn test_legacy_async_call_runs_after_the_caller() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            host.runtime().storage_store(b"pre", &[1])?;
            host.async_call(&contract("callee"), &zero(), b"record")?;
            host.runtime().storage_store(b"post", &[1])?;
            Ok(())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert!(output.return_data.is_empty());

    let caller = output.account(&contract("caller")).unwrap();
    assert!(caller.storage_updates.contains_key(&b"pre"[..]));
    assert!(!caller.storage_updates.contains_key(&b"post"[..]));
    let callee = output.account(&contract("callee")).unwrap();
    assert!(callee.storage_updates.contains_key(&b"seen"[..]));
}

#[test_log::test]
fn test_only_one_legacy_async_call() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let first = host.async_call(&contract("callee"), &zero(), b"record");
            assert_eq!(first, Err(VmError::AsyncCallBreakpoint));
            host.async_call(&contract("callee"), &zero(), b"record")
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(!output.is_ok());
    assert_eq!(output.return_message, VmError::OnlyOneLegacyAsyncCallAllowed.to_string());
}

#[test_log::test]
fn test_legacy_async_call_to_user_transfers_value() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            host.async_call(&user(), &BigUint::from(100u32), b"thanks")?;
            Ok(())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.account(&user()).unwrap().balance_delta, BigInt::from(100));
    assert_eq!(output.account(&contract("caller")).unwrap().balance_delta, BigInt::from(-100));
}

fn upgrade_world(owner: Address) -> World {
    world_with(&[("caller", CALLER)]).with_account(
        contract("callee"),
        Account::new_contract(CALLEE.to_vec(), owner).with_code_metadata(CodeMetadata::upgradeable()),
    )
}

fn register_upgrade(fx: &Fixture) {
    fx.register(CALLEE, MockContract::new());
    fx.register(
        UPGRADED,
        MockContract::new().with_method("upgrade", |host| {
            let argument = host.runtime().argument(0)?;
            host.runtime().storage_store(b"migrated", &argument)?;
            Ok(())
        }),
    );
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            host.upgrade_contract(
                &contract("callee"),
                &zero(),
                UPGRADED,
                CodeMetadata::upgradeable(),
                vec![b"v2".to_vec()],
            )
        }),
    );
}

#[test_log::test]
fn test_owner_upgrades_contract() {
    let fx = Fixture::new(upgrade_world(contract("caller")));
    register_upgrade(&fx);

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    let callee = output.account(&contract("callee")).unwrap();
    assert_eq!(callee.code.as_deref(), Some(UPGRADED));
    assert_eq!(callee.storage_updates.get(&b"migrated"[..]), Some(&b"v2".to_vec()));
}

#[test_log::test]
fn test_upgrade_by_stranger_is_ignored() {
    let fx = Fixture::new(upgrade_world(user()));
    register_upgrade(&fx);

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert!(output
        .account(&contract("callee"))
        .map_or(true, |callee| callee.code.is_none()));
}

#[test_log::test]
fn test_contract_deploys_contract() {
    let fx = fixture();
    fx.register(
        CHILD,
        MockContract::new().with_method("init", |host| {
            let argument = host.runtime().argument(0)?;
            host.runtime().storage_store(b"setting", &argument)?;
            Ok(())
        }),
    );
    fx.register(
        CALLER,
        MockContract::new()
            .with_method("deploy", |host| {
                let address = host.create_contract(
                    u64::MAX,
                    &zero(),
                    CHILD.to_vec(),
                    CodeMetadata::default(),
                    vec![b"fast".to_vec()],
                )?;
                let address = address.ok_or_else(|| VmError::SignalledError("deploy failed".to_string()))?;
                host.runtime().finish(address.as_bytes().to_vec())
            })
            .with_method("copy", |host| {
                let address =
                    host.deploy_from_source_contract(u64::MAX, &zero(), &contract("callee"), CodeMetadata::default(), vec![])?;
                host.runtime().finish(vec![u8::from(address.is_some())])
            }),
    );

    let output = fx.call("caller", "deploy", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    let expected = Address::new_contract_address(&contract("caller"), 0);
    assert_eq!(output.return_data, vec![expected.as_bytes().to_vec()]);
    let child = output.account(&expected).unwrap();
    assert_eq!(child.code.as_deref(), Some(CHILD));
    assert_eq!(child.owner, Some(contract("caller")));
    assert_eq!(child.storage_updates.get(&b"setting"[..]), Some(&b"fast".to_vec()));
    assert_eq!(output.account(&contract("caller")).unwrap().nonce, Some(1));

    let output = fx.call("caller", "copy", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![1]]);
}

#[test_log::test]
fn test_failed_init_rolls_back_deployment() {
    let fx = fixture();
    fx.register(
        CHILD,
        MockContract::new().with_method("init", |host| Err(host.runtime().signal_error(b"refuse"))),
    );
    fx.register(
        CALLER,
        MockContract::new().with_method("deploy", |host| {
            let address = host.create_contract(u64::MAX, &zero(), CHILD.to_vec(), CodeMetadata::default(), vec![])?;
            host.runtime().finish(vec![u8::from(address.is_some())])
        }),
    );

    let output = fx.call("caller", "deploy", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![0]]);
    let expected = Address::new_contract_address(&contract("caller"), 0);
    assert!(output.account(&expected).is_none());
}
