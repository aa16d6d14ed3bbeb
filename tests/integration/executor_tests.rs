//! End-to-end properties of the sandboxed executor with the Python engine

use std::time::{Duration, Instant};

use pyground_sandbox::{ExecutionRequest, Executor, PythonEngine};

use crate::common::setup_test_logging;

fn executor() -> Executor {
    Executor::new(PythonEngine::new())
}

#[test]
fn hello_world_is_captured_byte_for_byte() {
    setup_test_logging();
    let result = executor().run_script("print(\"Hello, World!\")");
    assert_eq!(result.stdout, "Hello, World!\n");
    assert_eq!(result.stderr, "");
    assert!(result.figures.is_empty());
    assert!(result.success());
}

#[test]
fn raised_exception_lands_on_stderr_with_prior_output_kept() {
    setup_test_logging();
    let result = executor().run_script("print(\"before\")\nraise ValueError(\"bad\")");
    assert_eq!(result.stdout, "before\n");
    assert!(
        result.stderr.contains("ValueError: bad"),
        "stderr: {}",
        result.stderr
    );
}

#[test]
fn syntax_error_is_reported_as_diagnostic() {
    setup_test_logging();
    let result = executor().run_script("def f(:");
    assert!(
        result.stderr.contains("SyntaxError"),
        "stderr: {}",
        result.stderr
    );
}

#[test]
fn infinite_loop_times_out_within_bounded_overhead() {
    setup_test_logging();
    let request =
        ExecutionRequest::new("while True: pass").with_time_budget(Duration::from_secs(1));
    let started = Instant::now();
    let result = executor().run(&request);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert!(
        result.stderr.contains("timed out after 1 seconds"),
        "stderr: {}",
        result.stderr
    );
}

#[test]
fn figures_are_collected_in_emission_order() {
    setup_test_logging();
    let script = "plot([1, 2, 3])\nshow()\nplot([0, 1], [3, 4])\nshow()";
    let result = executor().run_script(script);
    assert_eq!(result.stderr, "", "stderr: {}", result.stderr);
    assert_eq!(result.figures.len(), 2);
    assert!(result.figures.iter().all(|figure| !figure.is_empty()));
}

#[test]
fn pure_script_is_idempotent() {
    setup_test_logging();
    let script = "print(2 + 3)\nplot([1, 1, 2])\nshow()";
    let exec = executor();
    let first = exec.run_script(script);
    let second = exec.run_script(script);
    assert_eq!(first.stdout, "5\n");
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first.figures, second.figures);
}

#[test]
fn capture_is_restored_after_a_fault() {
    setup_test_logging();
    let exec = executor();
    let faulted = exec.run_script("raise RuntimeError(\"boom\")");
    assert!(faulted.stderr.contains("RuntimeError"));

    let clean = exec.run_script("print(\"clean\")");
    assert_eq!(clean.stdout, "clean\n");
    assert_eq!(clean.stderr, "");
}

#[test]
fn capture_is_restored_after_a_timeout() {
    setup_test_logging();
    let exec = executor();
    let timed_out = exec.run(
        &ExecutionRequest::new("while True: pass").with_time_budget(Duration::from_millis(300)),
    );
    assert!(timed_out.stderr.contains("timed out"));

    let clean = exec.run_script("print(\"clean\")");
    assert_eq!(clean.stdout, "clean\n");
    assert_eq!(clean.stderr, "");
}

#[test]
fn abandoned_worker_output_does_not_leak_into_later_runs() {
    setup_test_logging();
    let exec = executor();

    // The abandoned worker wakes from its sleep long after the timeout and
    // prints while the next execution's capture is active.
    let script = "import time\ntime.sleep(1)\nprint(\"late\")";
    let timed_out = exec.run(
        &ExecutionRequest::new(script).with_time_budget(Duration::from_millis(200)),
    );
    assert!(timed_out.stderr.contains("timed out"));
    assert!(!timed_out.stdout.contains("late"));

    let overlapping = exec.run_script("import time\ntime.sleep(2)\nprint(\"clean\")");
    assert_eq!(overlapping.stdout, "clean\n");
    assert_eq!(overlapping.stderr, "");
}

#[test]
fn long_output_is_truncated_with_notice() {
    setup_test_logging();
    let exec = Executor::with_limits(
        PythonEngine::new(),
        pyground_sandbox::ResourceLimits {
            max_output_bytes: 256,
            ..pyground_sandbox::ResourceLimits::default()
        },
    );
    let result = exec.run_script("for i in range(1000):\n    print(\"x\" * 32)");
    assert!(result.stdout.contains("[output truncated]"));
    assert!(result.stdout.len() < 1024);
}
