//! Nested calls between native contracts.

mod common;

use common::*;
use num_bigint::{BigInt, BigUint};
use vmhost_types::ReturnCode;
use vmhost_vm::{Composition, HostConfig, MockContract};

const CALLER: &[u8] = b"caller-code";
const CALLEE: &[u8] = b"callee-code";

fn zero() -> BigUint {
    BigUint::default()
}

fn fixture() -> Fixture {
    Fixture::new(world_with(&[("caller", CALLER), ("callee", CALLEE)]))
}

#[test_log::test]
fn test_same_context_handles_continue() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            for value in 0..3 {
                host.runtime().big_int_new(value)?;
            }
            let status = host.execute_on_same_context(u64::MAX, &contract("callee"), &zero(), "child", vec![])?;
            host.runtime().finish(vec![status as u8])
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new().with_method("child", |host| {
            let handle = host.runtime().big_int_new(7)?;
            host.runtime().finish(handle.to_be_bytes().to_vec())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![3i32.to_be_bytes().to_vec(), vec![0]]);
}

#[test_log::test]
fn test_dest_context_handles_restart_and_are_isolated() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            for value in 0..3 {
                host.runtime().big_int_new(value)?;
                host.runtime().m_buffer_new_from_bytes(vec![value as u8])?;
            }
            let fresh = host.execute_on_dest_context(u64::MAX, &contract("callee"), &zero(), "fresh", vec![])?;
            let peek = host.execute_on_dest_context(u64::MAX, &contract("callee"), &zero(), "peek", vec![])?;
            host.runtime().finish(vec![fresh as u8, peek as u8])
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new()
            .with_method("fresh", |host| {
                let handle = host.runtime().big_int_new(7)?;
                host.runtime().finish(handle.to_be_bytes().to_vec())
            })
            .with_method("peek", |host| {
                // Buffer 2 exists only in the caller's scope.
                host.runtime().m_buffer_get_length(2)?;
                Ok(())
            }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![0i32.to_be_bytes().to_vec(), vec![0, 1]]);
}

#[test_log::test]
fn test_same_context_writes_survive_out_of_gas() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let status = host.execute_on_same_context(20_000, &contract("callee"), &zero(), "burn", vec![])?;
            let len = host.runtime().storage_load_length(b"before")?;
            host.runtime().finish(vec![status as u8, len as u8])
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new().with_method("burn", |host| {
            host.runtime().storage_store(b"before", b"x")?;
            for i in 0u32.. {
                host.runtime().storage_store(&i.to_be_bytes(), b"filler")?;
            }
            Ok(())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![1, 1]]);
    let account = output.account(&contract("caller")).unwrap();
    assert_eq!(account.storage_updates.get(&b"before"[..]), Some(&b"x".to_vec()));
}

#[test_log::test]
fn test_dest_context_keys_stay_with_the_callee() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let status = host.execute_on_dest_context(u64::MAX, &contract("callee"), &zero(), "write", vec![])?;
            let len = host.runtime().storage_load_length(b"only-callee")?;
            host.runtime().finish(vec![status as u8, len as u8])
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new().with_method("write", |host| {
            host.runtime().storage_store(b"only-callee", b"value")?;
            Ok(())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![0, 0]]);
    let callee = output.account(&contract("callee")).unwrap();
    assert_eq!(callee.storage_updates.get(&b"only-callee"[..]), Some(&b"value".to_vec()));
}

#[test_log::test]
fn test_dest_context_failure_rolls_back() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let status = host.execute_on_dest_context(u64::MAX, &contract("callee"), &zero(), "fail", vec![])?;
            host.runtime().finish(vec![status as u8])
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new().with_method("fail", |host| {
            host.runtime().storage_store(b"doomed", b"value")?;
            host.runtime().finish(b"partial".to_vec())?;
            Err(host.runtime().signal_error(b"nope"))
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![1]]);
    assert!(output
        .account(&contract("callee"))
        .map_or(true, |account| account.storage_updates.is_empty()));
}

#[test_log::test]
fn test_call_to_missing_contract_lets_caller_continue() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let missing = contract("nobody");
            let status = host.execute_on_dest_context(u64::MAX, &missing, &zero(), "anything", vec![])?;
            host.runtime().finish(vec![status as u8])?;
            host.runtime().finish(b"after".to_vec())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![1], b"after".to_vec()]);
}

#[test_log::test]
fn test_by_caller_forwards_the_original_caller() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            host.execute_on_dest_context(u64::MAX, &contract("callee"), &zero(), "whoami", vec![])?;
            host.execute_on_dest_context_by_caller(u64::MAX, &contract("callee"), &zero(), "whoami", vec![])?;
            Ok(())
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new().with_method("whoami", |host| {
            let caller = host.runtime().caller()?;
            host.runtime().finish(caller.as_bytes().to_vec())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(
        output.return_data,
        vec![contract("caller").as_bytes().to_vec(), user().as_bytes().to_vec()]
    );
}

#[test_log::test]
fn test_call_value_moves_with_the_call() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let value = BigUint::from(250u32);
            let status = host.execute_on_dest_context(u64::MAX, &contract("callee"), &value, "accept", vec![])?;
            host.runtime().finish(vec![status as u8])
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new().with_method("accept", |host| {
            let value = host.runtime().call_value()?;
            host.runtime().finish(value.to_bytes_be())
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![250], vec![0]]);
    assert_eq!(output.account(&contract("callee")).unwrap().balance_delta, BigInt::from(250));
    assert_eq!(output.account(&contract("caller")).unwrap().balance_delta, BigInt::from(-250));
}

#[test_log::test]
fn test_same_context_recursion() {
    const ITERATIONS: i64 = 2_000;

    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new()
            .with_method("start", |host| {
                let counter = host.runtime().big_int_new(0)?;
                let status = host.execute_on_same_context(
                    u64::MAX,
                    &contract("caller"),
                    &zero(),
                    "recurse",
                    vec![int_bytes(ITERATIONS)],
                )?;
                if status != 0 {
                    return Err(host.runtime().signal_error(b"recursion failed"));
                }
                host.runtime().big_int_finish_unsigned(counter)
            })
            .with_method("recurse", |host| {
                let rt = host.runtime();
                let n = rt.int64_argument(0)?;
                rt.storage_store(format!("key-{}", n).as_bytes(), &int_bytes(n))?;
                let one = rt.big_int_new(1)?;
                rt.big_int_add(0, 0, one)?;
                if n == 0 {
                    return Ok(());
                }
                let status = host.execute_on_same_context(
                    u64::MAX,
                    &contract("caller"),
                    &zero(),
                    "recurse",
                    vec![int_bytes(n - 1)],
                )?;
                if status != 0 {
                    return Err(host.runtime().signal_error(b"inner call failed"));
                }
                Ok(())
            }),
    );

    let output = fx.call("caller", "start", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    let account = output.account(&contract("caller")).unwrap();
    assert_eq!(account.storage_updates.len() as i64, ITERATIONS + 1);
    assert_eq!(as_u64(&output.return_data[0]), (ITERATIONS + 1) as u64);
}

#[test_log::test]
fn test_depth_limit_fails_only_the_deepest_call() {
    let fx = Fixture::with_config(
        world_with(&[("caller", CALLER)]),
        HostConfig::default().with_max_call_depth(10),
    );
    fx.register(
        CALLER,
        MockContract::new().with_method("dive", |host| {
            let status = host.execute_on_dest_context(u64::MAX, &contract("caller"), &zero(), "dive", vec![])?;
            if status != 0 {
                let depth = host.runtime().stack().depth();
                host.runtime().finish(vec![depth as u8])?;
            }
            Ok(())
        }),
    );

    let output = fx.call("caller", "dive", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![10]]);
}

#[test_log::test]
fn test_reserved_entry_points_cannot_be_called_nested() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let init = host.execute_on_dest_context(u64::MAX, &contract("callee"), &zero(), "init", vec![])?;
            let callback = host.execute_on_same_context(u64::MAX, &contract("callee"), &zero(), "callBack", vec![])?;
            let builtin =
                host.execute_on_same_context(u64::MAX, &contract("callee"), &zero(), "upgradeContract", vec![])?;
            host.runtime().finish(vec![init as u8, callback as u8, builtin as u8])
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new()
            .with_method("init", |_| Ok(()))
            .with_method("callBack", |_| Ok(())),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![1, 1, 1]]);
}

#[test_log::test]
fn test_nested_failure_charges_the_caller() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            let before = host.runtime().gas().remaining();
            host.execute_on_dest_context(5_000, &contract("callee"), &zero(), "spin", vec![])?;
            let after = host.runtime().gas().remaining();
            host.runtime().finish(int_bytes((before - after) as i64))
        }),
    );
    fx.register(
        CALLEE,
        MockContract::new().with_method("spin", |host| loop {
            host.runtime().use_gas(1_000)?;
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    let charged = as_u64(&output.return_data[0]);
    assert!(charged >= 5_000, "charged {}", charged);
}

#[test]
fn test_out_of_gas_is_not_swallowed_by_unsafe_mode() {
    let fx = fixture();
    fx.register(
        CALLER,
        MockContract::new().with_method("run", |host| {
            host.runtime().set_unsafe_mode(true);
            loop {
                host.runtime().storage_store(b"k", b"v")?;
                host.runtime().storage_store(b"k", b"w")?;
            }
        }),
    );

    let output = fx.call("caller", "run", vec![]);
    assert!(!output.is_ok());
    assert_eq!(output.return_code, ReturnCode::OutOfGas);
    assert_eq!(output.gas_remaining, 0);
}
