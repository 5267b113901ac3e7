//! End-to-end pipeline tests: definition script -> environment -> rounds
//! flowing from a memory ingress through the dispatcher and back.

use sluice_core::{IngressRegistry, OpRegistry, Params};
use sluice_executor::GraphDef;
use sluice_ops::{register_default_ops, MemoryHandle, MemoryIngressFactory};
use std::time::Duration;

struct Pipeline {
    env: sluice_executor::ExecEnv,
    handle: MemoryHandle,
}

fn bring_up(script: &str, args: &Params) -> Pipeline {
    let mut ops = OpRegistry::new();
    register_default_ops(&mut ops).unwrap();

    let mut ingresses = IngressRegistry::new();
    let memory = MemoryIngressFactory::new();
    let handle = memory.handle();
    ingresses.register("memory", memory).unwrap();

    let def = GraphDef::parse(&ops, &ingresses, script).unwrap();
    let mut env = def.build_env(args).unwrap();
    env.start().unwrap();
    Pipeline { env, handle }
}

fn shut_down(mut pipeline: Pipeline) {
    pipeline.env.stop();
    pipeline.handle.unblock();
    pipeline.env.join();
}

#[test]
fn two_stage_pipeline_processes_inputs_in_order() {
    let pipeline = bring_up(
        "in input = test use memory{}\n\
         tmp = test_tmp(input) use str.append{value: \".\"}\n\
         out = test_out(tmp) use str.append{value: \"res\"}\n",
        &Params::new(),
    );

    pipeline.handle.send("t1").unwrap();
    assert_eq!(
        pipeline.handle.recv_timeout(Duration::from_secs(10)).unwrap(),
        "t1.res"
    );
    pipeline.handle.send("t2").unwrap();
    assert_eq!(
        pipeline.handle.recv_timeout(Duration::from_secs(10)).unwrap(),
        "t2.res"
    );

    shut_down(pipeline);
}

#[test]
fn rounds_reuse_the_single_slot() {
    let pipeline = bring_up(
        "in input = feed use memory{}\n\
         out = stamp(input) use str.append{value: \"!\"}\n",
        &Params::new(),
    );

    for i in 0..16 {
        pipeline.handle.send(format!("m{i}")).unwrap();
    }
    for i in 0..16 {
        assert_eq!(
            pipeline.handle.recv_timeout(Duration::from_secs(10)).unwrap(),
            format!("m{i}!")
        );
    }

    shut_down(pipeline);
}

#[test]
fn runtime_args_parameterize_the_deployment() {
    let mut args = Params::new();
    args.insert("value".to_string(), "-prod".to_string());
    let pipeline = bring_up(
        "in input = feed use memory{}\n\
         out = stamp(input) use str.append{value: ''}\n",
        &args,
    );

    pipeline.handle.send("x").unwrap();
    assert_eq!(
        pipeline.handle.recv_timeout(Duration::from_secs(10)).unwrap(),
        "x-prod"
    );

    shut_down(pipeline);
}

#[test]
fn diamond_pipeline_joins_both_branches() {
    let mut ops = OpRegistry::new();
    register_default_ops(&mut ops).unwrap();
    ops.register(
        "str.join",
        sluice_ops::WrapFactory::new(|_name, _type, _params| -> sluice_core::Result<sluice_core::OpFn> {
            Ok(Box::new(|ctx| {
                let left = ctx.input(0).get::<String>()?.clone();
                let right = ctx.input(1).get::<String>()?.clone();
                ctx.output(0).set(format!("{left}|{right}"));
                Ok(())
            }))
        }),
    )
    .unwrap();

    let mut ingresses = IngressRegistry::new();
    let memory = MemoryIngressFactory::new();
    let handle = memory.handle();
    ingresses.register("memory", memory).unwrap();

    let def = GraphDef::parse(
        &ops,
        &ingresses,
        "in input = feed use memory{}\n\
         left = l(input) use str.append{value: \".l\"}\n\
         right = r(input) use str.append{value: \".r\"}\n\
         out = join(left, right) use str.join{}\n",
    )
    .unwrap();
    let mut env = def.build_env(&Params::new()).unwrap();
    env.start().unwrap();

    handle.send("s").unwrap();
    assert_eq!(
        handle.recv_timeout(Duration::from_secs(10)).unwrap(),
        "s.l|s.r"
    );

    env.stop();
    handle.unblock();
    env.join();
}
