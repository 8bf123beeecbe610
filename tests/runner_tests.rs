#[cfg(test)]
mod runner_tests {
    use hwv::ir::{
        BitValue, Circuit, CircuitOp, FormalTask, Property, RelationTask, SimulationTask,
    };
    use hwv::manifest::{Suite, SuiteEntry, TaskSpec};
    use hwv::sim::SimulationConfig;
    use hwv::{RunnerOptions, TaskRunner, Verdict};
    use std::time::Duration;

    fn entry(name: &str, task: TaskSpec) -> SuiteEntry {
        SuiteEntry {
            name: name.to_string(),
            ignore: false,
            require_runners: vec![],
            exclude_runners: vec![],
            task,
        }
    }

    fn adder(mutated: bool) -> FormalTask {
        let mut c = Circuit::new("adder");
        let a = c.add_input("a", 8);
        let b = c.add_input("b", 8);
        let mut sum = c.add_op(CircuitOp::Add, vec![a, b], "sum", 8);
        if mutated {
            let one = c.add_constant("one", BitValue::from_u64(8, 1));
            sum = c.add_op(CircuitOp::Add, vec![sum, one], "bumped", 8);
        }
        let reference = c.add_op(CircuitOp::Add, vec![b, a], "reference", 8);
        let ok = c.add_op(CircuitOp::Eq, vec![sum, reference], "ok", 1);
        c.add_property(Property::assert(ok).with_label("sum_ok"));
        c.add_output(sum);
        FormalTask::new("adder", c, 3)
    }

    fn xor_pair() -> RelationTask {
        let mut lhs = Circuit::new("lhs");
        let a = lhs.add_input("a", 4);
        let b = lhs.add_input("b", 4);
        let y = lhs.add_op(CircuitOp::Xor, vec![a, b], "y", 4);
        lhs.add_output(y);

        // (a | b) & !(a & b)
        let mut rhs = Circuit::new("rhs");
        let a = rhs.add_input("a", 4);
        let b = rhs.add_input("b", 4);
        let or = rhs.add_op(CircuitOp::Or, vec![a, b], "or", 4);
        let and = rhs.add_op(CircuitOp::And, vec![a, b], "and", 4);
        let nand = rhs.add_op(CircuitOp::Not, vec![and], "nand", 4);
        let y = rhs.add_op(CircuitOp::And, vec![or, nand], "y", 4);
        rhs.add_output(y);
        RelationTask::equivalence("xor", lhs, rhs)
    }

    /// Finishes on the first running edge with `success = ok`, or never
    fn bench(finishes: bool, ok: bool) -> SimulationTask {
        let mut c = Circuit::new("bench");
        c.add_input("clk", 1);
        c.add_input("init", 1);
        let done = c.add_constant("done", BitValue::from_u64(1, finishes.into()));
        let success = c.add_constant("success", BitValue::from_u64(1, ok.into()));
        c.add_output(done);
        c.add_output(success);
        SimulationTask::new("bench", c)
    }

    fn contracted() -> Circuit {
        let mut c = Circuit::new("nz");
        let x = c.add_input("x", 8);
        let k = c.add_contract("nonzero", vec![x]);
        let y = c.contracts[k].results[0];
        let pre = c.add_contract_op(k, CircuitOp::ReduceOr, vec![x], "pre", 1);
        let post = c.add_contract_op(k, CircuitOp::ReduceOr, vec![y], "post", 1);
        c.add_contract_property(k, Property::require(pre));
        c.add_contract_property(k, Property::ensure(post));
        c.add_output(y);
        c
    }

    fn mixed_suite() -> Suite {
        let mut ignored = entry("ignored", TaskSpec::Formal(adder(true)));
        ignored.ignore = true;
        let mut nightly = entry("nightly-only", TaskSpec::Formal(adder(true)));
        nightly.require_runners = vec!["nightly".to_string()];

        Suite {
            tasks: vec![
                entry("adder", TaskSpec::Formal(adder(false))),
                entry("adder-mutant", TaskSpec::Formal(adder(true))),
                entry("xor-lec", TaskSpec::Relation(xor_pair())),
                entry("bench-ok", TaskSpec::Simulation(bench(true, true))),
                entry("bench-bad", TaskSpec::Simulation(bench(true, false))),
                entry("contracts", TaskSpec::Contracts(contracted())),
                ignored,
                nightly,
            ],
        }
    }

    fn verdicts(summary: &hwv::RunSummary) -> Vec<(&str, Verdict)> {
        summary
            .results
            .iter()
            .map(|r| (r.name.as_str(), r.verdict))
            .collect()
    }

    #[tokio::test]
    async fn test_mixed_suite() {
        let runner = TaskRunner::new(RunnerOptions::default());
        let summary = runner.run_suite(&mixed_suite()).await;

        assert_eq!(
            verdicts(&summary),
            vec![
                ("adder", Verdict::Passed),
                ("adder-mutant", Verdict::Failed),
                ("xor-lec", Verdict::Passed),
                ("bench-ok", Verdict::Passed),
                ("bench-bad", Verdict::Failed),
                ("contracts", Verdict::Passed),
                ("ignored", Verdict::Skipped),
                ("nightly-only", Verdict::Skipped),
            ]
        );
        assert_eq!(
            summary.summary(),
            "4 passed, 2 failed, 0 inconclusive, 0 errors, 2 skipped"
        );
        assert_eq!(summary.exit_code(), 1);

        let mutant = &summary.results[1];
        let report = mutant.report.as_ref().unwrap();
        assert_eq!(report["status"], "fail");
        assert_eq!(report["step"], 0);
    }

    #[tokio::test]
    async fn test_runner_identity_and_filter() {
        let options = RunnerOptions {
            runner: "nightly".to_string(),
            filter: Some("only".to_string()),
            ..RunnerOptions::default()
        };
        let summary = TaskRunner::new(options).run_suite(&mixed_suite()).await;
        let run: Vec<&str> = summary
            .results
            .iter()
            .filter(|r| r.verdict != Verdict::Skipped)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(run, vec!["nightly-only"]);
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_inconclusive() {
        let options = RunnerOptions {
            jobs: 1,
            timeout: Some(Duration::from_millis(50)),
            sim: SimulationConfig {
                max_cycles: u64::MAX,
                ..SimulationConfig::default()
            },
            ..RunnerOptions::default()
        };
        let suite = Suite {
            tasks: vec![
                entry("forever", TaskSpec::Simulation(bench(false, false))),
                entry("quick", TaskSpec::Simulation(bench(true, true))),
            ],
        };
        let summary = TaskRunner::new(options).run_suite(&suite).await;
        assert_eq!(summary.results[0].verdict, Verdict::Inconclusive);
        assert_eq!(summary.results[0].detail.as_deref(), Some("timeout"));
        assert_eq!(summary.results[1].verdict, Verdict::Passed);
        assert_eq!(summary.exit_code(), 2);
    }

    /// 12-bit multiplier commutativity: far beyond a short timeout
    fn hard_multiplier() -> RelationTask {
        let side = |name: &str, swap: bool| {
            let mut c = Circuit::new(name);
            let a = c.add_input("a", 12);
            let b = c.add_input("b", 12);
            let operands = if swap { vec![b, a] } else { vec![a, b] };
            let y = c.add_op(CircuitOp::Mul, operands, "y", 12);
            c.add_output(y);
            c
        };
        RelationTask::equivalence("mul", side("lhs", false), side("rhs", true))
    }

    #[tokio::test]
    async fn test_formal_timeout_frees_slot() {
        let options = RunnerOptions {
            jobs: 1,
            timeout: Some(Duration::from_millis(200)),
            ..RunnerOptions::default()
        };
        let suite = Suite {
            tasks: vec![
                entry("mul-lec", TaskSpec::Relation(hard_multiplier())),
                entry("quick", TaskSpec::Simulation(bench(true, true))),
            ],
        };
        // with one slot, "quick" only starts once the solver has stopped
        let summary = tokio::time::timeout(
            Duration::from_secs(60),
            TaskRunner::new(options).run_suite(&suite),
        )
        .await
        .expect("solver kept running after timeout");

        assert_eq!(summary.results[0].verdict, Verdict::Inconclusive);
        assert_eq!(summary.results[0].detail.as_deref(), Some("timeout"));
        assert_eq!(summary.results[1].verdict, Verdict::Passed);
        assert_eq!(summary.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_runner() {
        let runner = TaskRunner::new(RunnerOptions::default());
        runner.cancel_token().cancel();
        let summary = runner.run_suite(&mixed_suite()).await;
        assert_eq!(summary.count(Verdict::Inconclusive), 6);
        assert!(summary
            .results
            .iter()
            .filter(|r| r.verdict == Verdict::Inconclusive)
            .all(|r| r.detail.as_deref() == Some("cancelled")));
    }

    #[tokio::test]
    async fn test_reports_written() {
        let summary = TaskRunner::new(RunnerOptions::default())
            .run_suite(&mixed_suite())
            .await;
        let dir = tempfile::tempdir().unwrap();
        summary.write_reports(dir.path()).unwrap();

        let mut written: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        written.sort();
        assert_eq!(
            written,
            vec![
                "adder-mutant.json",
                "adder.json",
                "bench-bad.json",
                "bench-ok.json",
                "contracts.json",
                "xor-lec.json",
            ]
        );
        let text = std::fs::read_to_string(dir.path().join("xor-lec.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["verdict"], "passed");
        assert_eq!(json["report"]["check"], "equivalence");
    }
}
