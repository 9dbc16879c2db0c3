//! Contracts compiled from WAT, run on the wasmtime executor.

mod common;

use std::sync::Arc;

use common::*;
use vmhost_types::{Account, Address, ContractCallInput, ContractCreateInput, ReturnCode, VmOutput};
use vmhost_vm::{AbiConfig, HostConfig, VmError, VmHost, WasmtimeExecutor, World};

/// Bytes as a WAT string literal body.
fn wat_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("\\{:02x}", byte)).collect()
}

fn compile(source: &str) -> Vec<u8> {
    wat::parse_str(source).unwrap()
}

fn host(config: HostConfig, contracts: &[(&str, Vec<u8>)]) -> VmHost {
    let world = contracts.iter().fold(
        World::new().with_account(user(), Account::new_user(1_000_000u32)),
        |world, (name, code)| world.with_account(contract(name), Account::new_contract(code.clone(), user())),
    );
    let executor = WasmtimeExecutor::new(&config).unwrap();
    VmHost::new(config, Arc::new(executor), Arc::new(world))
}

fn call(host: &VmHost, name: &str, function: &str, arguments: Vec<Vec<u8>>) -> VmOutput {
    let input = ContractCallInput::new(user(), contract(name), function, 10_000_000).with_arguments(arguments);
    host.run_smart_contract_call(&input)
}

const DOUBLER: &str = r#"
(module
  (import "env" "int64getArgument" (func $arg (param i32) (result i64)))
  (import "env" "int64finish" (func $finish (param i64)))
  (import "env" "bigIntNew" (func $bigIntNew (param i64) (result i32)))
  (memory (export "memory") 1)
  (func (export "double")
    (call $finish (i64.mul (call $arg (i32.const 0)) (i64.const 2))))
  (func (export "fresh")
    (call $finish (i64.extend_i32_s (call $bigIntNew (i64.const 0))))))
"#;

#[test_log::test]
fn test_arguments_and_finish() {
    let host = host(HostConfig::default(), &[("doubler", compile(DOUBLER))]);
    let output = call(&host, "doubler", "double", vec![vec![21]]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![42]]);
    assert!(output.gas_remaining < 10_000_000);
}

#[test_log::test]
fn test_missing_export_is_function_not_found() {
    let host = host(HostConfig::default(), &[("doubler", compile(DOUBLER))]);
    let output = call(&host, "doubler", "triple", vec![]);
    assert_eq!(output.return_code, ReturnCode::FunctionNotFound);
}

const STORAGE: &str = r#"
(module
  (import "env" "storageStore" (func $store (param i32 i32 i32 i32) (result i32)))
  (import "env" "storageLoadLength" (func $len (param i32 i32) (result i32)))
  (import "env" "storageLoad" (func $load (param i32 i32 i32) (result i32)))
  (import "env" "finish" (func $finish (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "color")
  (data (i32.const 16) "purple")
  (func (export "save")
    (drop (call $store (i32.const 0) (i32.const 5) (i32.const 16) (i32.const 6))))
  (func (export "read")
    (local $n i32)
    (local.set $n (call $len (i32.const 0) (i32.const 5)))
    (drop (call $load (i32.const 0) (i32.const 5) (i32.const 64)))
    (call $finish (i32.const 64) (local.get $n))))
"#;

/// Same key layout, legacy generation: a 32-byte key at offset 0.
const LEGACY_STORAGE: &str = r#"
(module
  (import "env" "storageStore" (func $store (param i32 i32 i32) (result i32)))
  (import "env" "storageGetValueLength" (func $len (param i32) (result i32)))
  (import "env" "finish" (func $finish (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "color")
  (data (i32.const 32) "orange")
  (func (export "save")
    (drop (call $store (i32.const 0) (i32.const 32) (i32.const 6))))
  (func (export "length")
    (i32.store8 (i32.const 64) (call $len (i32.const 0)))
    (call $finish (i32.const 64) (i32.const 1))))
"#;

#[test_log::test]
fn test_current_generation_storage() {
    let host = host(HostConfig::default(), &[("store", compile(STORAGE))]);
    let output = call(&host, "store", "save", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    let account = output.account(&contract("store")).unwrap();
    assert_eq!(account.storage_updates.get(&b"color"[..]), Some(&b"purple".to_vec()));

    let world = World::new()
        .with_account(user(), Account::new_user(1u32))
        .with_account(
            contract("store"),
            Account::new_contract(compile(STORAGE), user()).with_storage(b"color", b"green"),
        );
    let host = VmHost::new(
        HostConfig::default(),
        Arc::new(WasmtimeExecutor::new(&HostConfig::default()).unwrap()),
        Arc::new(world),
    );
    let output = call(&host, "store", "read", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![b"green".to_vec()]);
}

#[test_log::test]
fn test_legacy_generation_uses_32_byte_keys() {
    let host = host(HostConfig::default(), &[("legacy", compile(LEGACY_STORAGE))]);
    let output = call(&host, "legacy", "save", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);

    let mut key = b"color".to_vec();
    key.resize(32, 0);
    let account = output.account(&contract("legacy")).unwrap();
    assert_eq!(account.storage_updates.get(&key), Some(&b"orange".to_vec()));
}

#[test_log::test]
fn test_disabled_generation_rejects_code() {
    let config = HostConfig {
        abi: AbiConfig {
            legacy: false,
            current: true,
        },
        ..HostConfig::default()
    };
    let host = host(config, &[("legacy", compile(LEGACY_STORAGE))]);
    let output = call(&host, "legacy", "save", vec![]);
    assert_eq!(output.return_code, ReturnCode::ContractInvalid);
}

const FAULTS: &str = r#"
(module
  (import "env" "signalError" (func $signal (param i32 i32)))
  (import "env" "getArgument" (func $getArgument (param i32 i32) (result i32)))
  (import "env" "activateUnsafeMode" (func $unsafe))
  (import "env" "smallIntFinishSigned" (func $finishSigned (param i64)))
  (memory (export "memory") 1)
  (data (i32.const 0) "boom")
  (func (export "fail")
    (call $signal (i32.const 0) (i32.const 4)))
  (func (export "spin")
    (loop $forever (br $forever)))
  (func (export "strict")
    (drop (call $getArgument (i32.const 5) (i32.const 64))))
  (func (export "lenient")
    (call $unsafe)
    (call $finishSigned (i64.extend_i32_s (call $getArgument (i32.const 5) (i32.const 64))))))
"#;

#[test_log::test]
fn test_signal_error_keeps_remaining_gas() {
    let host = host(HostConfig::default(), &[("faults", compile(FAULTS))]);
    let output = call(&host, "faults", "fail", vec![]);
    assert_eq!(output.return_code, ReturnCode::UserError);
    assert_eq!(output.return_message, "boom");
    assert!(output.gas_remaining > 0);
}

#[test_log::test]
fn test_infinite_loop_runs_out_of_gas() {
    let host = host(HostConfig::default(), &[("faults", compile(FAULTS))]);
    let output = call(&host, "faults", "spin", vec![]);
    assert_eq!(output.return_code, ReturnCode::OutOfGas);
    assert_eq!(output.gas_remaining, 0);
}

#[test_log::test]
fn test_unsafe_mode_returns_neutral_value() {
    let host = host(HostConfig::default(), &[("faults", compile(FAULTS))]);
    let output = call(&host, "faults", "strict", vec![]);
    assert_eq!(
        output.return_message,
        VmError::ArgumentIndexOutOfRange { index: 5, count: 0 }.to_string()
    );

    let output = call(&host, "faults", "lenient", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![0xff]]);
}

fn composer(callee: &Address) -> String {
    format!(
        r#"
(module
  (import "env" "executeOnDestContext"
    (func $dest (param i64 i32 i32 i32 i32 i32 i32 i32) (result i32)))
  (import "env" "executeOnSameContext"
    (func $same (param i64 i32 i32 i32 i32 i32 i32 i32) (result i32)))
  (import "env" "bigIntNew" (func $bigIntNew (param i64) (result i32)))
  (import "env" "getGasLeft" (func $gasLeft (result i64)))
  (memory (export "memory") 1)
  (data (i32.const 0) "{address}")
  (data (i32.const 96) "double")
  (data (i32.const 112) "fresh")
  (data (i32.const 128) "\01\00\00\00")
  (data (i32.const 136) "\15")
  (func (export "delegate")
    (drop (call $dest (call $gasLeft) (i32.const 0) (i32.const 64)
      (i32.const 96) (i32.const 6) (i32.const 1) (i32.const 128) (i32.const 136))))
  (func (export "handles")
    (drop (call $bigIntNew (i64.const 1)))
    (drop (call $bigIntNew (i64.const 2)))
    (drop (call $bigIntNew (i64.const 3)))
    (drop (call $same (call $gasLeft) (i32.const 0) (i32.const 64)
      (i32.const 112) (i32.const 5) (i32.const 0) (i32.const 128) (i32.const 136)))
    (drop (call $dest (call $gasLeft) (i32.const 0) (i32.const 64)
      (i32.const 112) (i32.const 5) (i32.const 0) (i32.const 128) (i32.const 136)))))
"#,
        address = wat_bytes(callee.as_bytes())
    )
}

#[test_log::test]
fn test_wasm_contracts_compose() {
    let composer = compile(&composer(&contract("doubler")));
    let host = host(
        HostConfig::default(),
        &[("composer", composer), ("doubler", compile(DOUBLER))],
    );

    let output = call(&host, "composer", "delegate", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![42]]);

    // Same context continues the caller's numbering, destination context
    // starts over (zero finishes as no bytes).
    let output = call(&host, "composer", "handles", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);
    assert_eq!(output.return_data, vec![vec![3], vec![]]);
}

const DEPLOYABLE: &str = r#"
(module
  (import "env" "storageStore" (func $store (param i32 i32 i32 i32) (result i32)))
  (import "env" "getArgument" (func $getArgument (param i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "name")
  (func (export "init")
    (local $len i32)
    (local.set $len (call $getArgument (i32.const 0) (i32.const 64)))
    (drop (call $store (i32.const 0) (i32.const 4) (i32.const 64) (local.get $len)))))
"#;

#[test_log::test]
fn test_deploy_wasm_contract() {
    let host = host(HostConfig::default(), &[]);
    let code = compile(DEPLOYABLE);
    let input = ContractCreateInput::new(user(), code.clone(), 10_000_000).with_argument(b"vmhost");
    let output = host.run_smart_contract_create(&input);
    assert!(output.is_ok(), "{}", output.return_message);

    let address = Address::new_contract_address(&user(), 0);
    let account = output.account(&address).unwrap();
    assert_eq!(account.code.as_ref(), Some(&code));
    assert_eq!(account.storage_updates.get(&b"name"[..]), Some(&b"vmhost".to_vec()));
}

#[test_log::test]
fn test_deploy_rejects_bad_signatures() {
    let host = host(HostConfig::default(), &[]);
    let code = compile(r#"(module (memory (export "memory") 1) (func (export "init") (param i32)))"#);
    let output = host.run_smart_contract_create(&ContractCreateInput::new(user(), code, 10_000_000));
    assert_eq!(output.return_code, ReturnCode::FunctionWrongSignature);
}

const NOOP: &str = r#"(module (memory (export "memory") 1) (func (export "noop")))"#;

/// More nested calls than a single store could hold instances for.
const REPEATED_CALLS: u32 = 10_500;

fn repeater(callee: &Address) -> String {
    format!(
        r#"
(module
  (import "env" "executeOnDestContext"
    (func $dest (param i64 i32 i32 i32 i32 i32 i32 i32) (result i32)))
  (import "env" "int64finish" (func $finish (param i64)))
  (memory (export "memory") 1)
  (data (i32.const 0) "{address}")
  (data (i32.const 96) "noop")
  (func (export "repeat")
    (local $i i32)
    (local $failed i64)
    (block $done
      (loop $next
        (br_if $done (i32.ge_u (local.get $i) (i32.const {calls})))
        (if (call $dest (i64.const 100000) (i32.const 0) (i32.const 64)
              (i32.const 96) (i32.const 4) (i32.const 0) (i32.const 128) (i32.const 136))
          (then (local.set $failed (i64.add (local.get $failed) (i64.const 1)))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))
    (call $finish (i64.add (local.get $failed) (i64.const 1)))))
"#,
        address = wat_bytes(callee.as_bytes()),
        calls = REPEATED_CALLS,
    )
}

#[test_log::test]
fn test_many_sequential_nested_calls() {
    let repeater = compile(&repeater(&contract("noop")));
    let host = host(HostConfig::default(), &[("repeater", repeater), ("noop", compile(NOOP))]);

    let input = ContractCallInput::new(user(), contract("repeater"), "repeat", GAS);
    let output = host.run_smart_contract_call(&input);
    assert!(output.is_ok(), "{}", output.return_message);
    // Failure count plus one, so a clean run finishes [1].
    assert_eq!(output.return_data, vec![vec![1]]);
    assert!(output.gas_remaining < GAS);
}

/// Issues a promise to `destination` calling `double@15` and finishes the
/// status byte. `promise` is the import declaration, `issue` the call.
fn promise_issuer(destination: &Address, promise: &str, issue: &str) -> String {
    format!(
        r#"
(module
  {promise}
  (import "env" "getNumArguments" (func $numArgs (result i32)))
  (import "env" "getArgument" (func $getArgument (param i32 i32) (result i32)))
  (import "env" "storageStore" (func $store (param i32 i32 i32 i32) (result i32)))
  (import "env" "finish" (func $finish (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "{address}")
  (data (i32.const 96) "double@15")
  (data (i32.const 112) "onOk")
  (data (i32.const 120) "onErr")
  (data (i32.const 128) "g1")
  (data (i32.const 140) "ok\01")
  (data (i32.const 144) "err")
  (func (export "run")
    (i32.store8 (i32.const 160) {issue})
    (call $finish (i32.const 160) (i32.const 1)))
  (func (export "onOk")
    (local $len i32)
    (i32.store8 (i32.const 160) (call $numArgs))
    (call $finish (i32.const 160) (i32.const 1))
    (local.set $len (call $getArgument (i32.const 0) (i32.const 192)))
    (call $finish (i32.const 192) (local.get $len))
    (drop (call $store (i32.const 140) (i32.const 2) (i32.const 142) (i32.const 1))))
  (func (export "onErr")
    (call $finish (i32.const 144) (i32.const 3))))
"#,
        address = wat_bytes(destination.as_bytes()),
    )
}

fn assert_promise_delivered(output: &VmOutput) {
    assert!(output.is_ok(), "{}", output.return_message);
    // Argument count and the destination's finished bytes from the success
    // callback, then the issuer's own status.
    assert_eq!(output.return_data, vec![vec![1], vec![42], vec![0]]);
    let issuer = output.account(&contract("issuer")).unwrap();
    assert_eq!(issuer.storage_updates.get(&b"ok"[..]), Some(&vec![1]));
}

#[test_log::test]
fn test_wasm_promise_reaches_success_callback() {
    let issuer = promise_issuer(
        &contract("doubler"),
        r#"(import "env" "createAsyncCall"
    (func $promise (param i32 i32 i32 i32 i32 i32 i32 i32 i64 i64) (result i32)))"#,
        "(call $promise (i32.const 0) (i32.const 64) (i32.const 96) (i32.const 9)
      (i32.const 112) (i32.const 4) (i32.const 120) (i32.const 5)
      (i64.const 1000000) (i64.const 500000))",
    );
    let host = host(
        HostConfig::default(),
        &[("issuer", compile(&issuer)), ("doubler", compile(DOUBLER))],
    );

    let output = call(&host, "issuer", "run", vec![]);
    assert_promise_delivered(&output);
}

#[test_log::test]
fn test_wasm_grouped_promise_reaches_success_callback() {
    let issuer = promise_issuer(
        &contract("doubler"),
        r#"(import "env" "createAsyncCall"
    (func $promise (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32 i64) (result i32)))"#,
        "(call $promise (i32.const 128) (i32.const 2)
      (i32.const 0) (i32.const 64) (i32.const 96) (i32.const 9)
      (i32.const 112) (i32.const 4) (i32.const 120) (i32.const 5)
      (i64.const 1000000))",
    );
    let host = host(
        HostConfig::default(),
        &[("issuer", compile(&issuer)), ("doubler", compile(DOUBLER))],
    );

    let output = call(&host, "issuer", "run", vec![]);
    assert_promise_delivered(&output);
}

fn factory(code: &[u8]) -> String {
    format!(
        r#"
(module
  (import "env" "createContract"
    (func $create (param i64 i32 i32 i32 i32 i32 i32 i32 i32) (result i32)))
  (import "env" "finish" (func $finish (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 32) "\00\00")
  (data (i32.const 96) "\06\00\00\00")
  (data (i32.const 100) "vmhost")
  (data (i32.const 256) "{code}")
  (func (export "spawn")
    (i32.store8 (i32.const 110)
      (call $create (i64.const 5000000) (i32.const 0) (i32.const 256) (i32.const 32) (i32.const {len})
        (i32.const 64) (i32.const 1) (i32.const 96) (i32.const 100)))
    (call $finish (i32.const 110) (i32.const 1))
    (call $finish (i32.const 64) (i32.const 32))))
"#,
        code = wat_bytes(code),
        len = code.len(),
    )
}

#[test_log::test]
fn test_wasm_contract_creates_contract() {
    let code = compile(DEPLOYABLE);
    let host = host(HostConfig::default(), &[("factory", compile(&factory(&code)))]);

    let output = call(&host, "factory", "spawn", vec![]);
    assert!(output.is_ok(), "{}", output.return_message);

    let address = Address::new_contract_address(&contract("factory"), 0);
    assert_eq!(output.return_data, vec![vec![0], address.as_bytes().to_vec()]);
    let account = output.account(&address).unwrap();
    assert_eq!(account.code.as_ref(), Some(&code));
    assert_eq!(account.storage_updates.get(&b"name"[..]), Some(&b"vmhost".to_vec()));
}
