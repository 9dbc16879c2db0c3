use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use num_bigint::BigUint;
use vmhost_types::{Account, Address, ContractCallInput};
use vmhost_vm::{
    CallContext, CallMode, Composition, GasTracker, HostConfig, MockContract, MockExecutor, Runtime, VmHost, World,
};

const GAS: u64 = 1_000_000_000;

fn user() -> Address {
    Address::user_from_name("bench")
}

fn runtime() -> Runtime {
    let config = Arc::new(HostConfig::default());
    let world = World::new()
        .with_account(user(), Account::new_user(1_000u32))
        .with_account(Address::contract_from_name("bench"), Account::new_contract(b"bench".to_vec(), user()));
    let root = CallContext::new(
        user(),
        Address::contract_from_name("bench"),
        "run",
        GasTracker::new(GAS, config.gas_schedule),
        CallMode::Direct,
    );
    Runtime::new(config, Arc::new(world), root)
}

fn bench_handle_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("handles");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("big_int_add_1k", |b| {
        b.iter_batched(
            runtime,
            |mut rt| {
                let total = rt.big_int_new(0).unwrap();
                let one = rt.big_int_new(1).unwrap();
                for _ in 0..1000 {
                    rt.big_int_add(total, total, one).unwrap();
                }
                black_box(rt.big_int_get_int64(total).unwrap())
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("m_buffer_append_1k", |b| {
        b.iter_batched(
            runtime,
            |mut rt| {
                let buffer = rt.m_buffer_new().unwrap();
                for i in 0..1000u32 {
                    rt.m_buffer_append_bytes(buffer, &i.to_be_bytes()).unwrap();
                }
                black_box(rt.m_buffer_get_length(buffer).unwrap())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_nested_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("composition");

    let executor = MockExecutor::new()
        .with_contract(
            b"outer".to_vec(),
            MockContract::new().with_method("fanOut", |host| {
                let callee = Address::contract_from_name("inner");
                for _ in 0..100 {
                    let gas = host.runtime().gas().remaining() / 2;
                    host.execute_on_dest_context(gas, &callee, &BigUint::default(), "touch", vec![])?;
                }
                Ok(())
            }),
        )
        .with_contract(
            b"inner".to_vec(),
            MockContract::new().with_method("touch", |host| {
                host.runtime().storage_store(b"touched", &[1])?;
                Ok(())
            }),
        );
    let world = World::new()
        .with_account(user(), Account::new_user(1_000u32))
        .with_account(Address::contract_from_name("outer"), Account::new_contract(b"outer".to_vec(), user()))
        .with_account(Address::contract_from_name("inner"), Account::new_contract(b"inner".to_vec(), user()));
    let host = VmHost::new(HostConfig::default(), Arc::new(executor), Arc::new(world));
    let input = ContractCallInput::new(user(), Address::contract_from_name("outer"), "fanOut", GAS);

    group.throughput(Throughput::Elements(100));
    group.bench_function("dest_context_100", |b| {
        b.iter(|| black_box(host.run_smart_contract_call(&input)))
    });

    group.finish();
}

criterion_group!(benches, bench_handle_tables, bench_nested_calls);
criterion_main!(benches);
