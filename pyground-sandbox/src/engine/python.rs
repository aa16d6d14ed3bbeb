//! Embedded RustPython engine
//!
//! A fresh interpreter is built per evaluation so every script starts from a
//! clean global namespace. `sys.stdout` and `sys.stderr` are replaced with
//! writer objects that forward into the capture sink, and a minimal plotting
//! surface (`plot`, `show`, `figure`) is injected into the script's globals.
//! Cancellation is observed at output writes: once the execution's deadline
//! has passed, the next `write` raises inside the script.

use rustpython_vm::{
    builtins::PyBaseExceptionRef, compiler::Mode, function::FuncArgs, scope::Scope, AsObject,
    Interpreter, PyObjectRef, PyResult, TryFromObject, VirtualMachine,
};

use crate::capture::{self, Stream};
use crate::engine::{ScriptEngine, ScriptFault};

const CANCEL_MESSAGE: &str = "execution cancelled: time budget exceeded";

/// Embedded Python interpreter engine
#[derive(Debug, Default)]
pub struct PythonEngine;

impl PythonEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for PythonEngine {
    fn eval(&self, script: &str) -> Result<(), ScriptFault> {
        let interpreter = Interpreter::with_init(rustpython_vm::Settings::default(), |vm| {
            vm.add_native_modules(rustpython_stdlib::get_module_inits());
        });

        interpreter.enter(|vm| {
            redirect_std_streams(vm);

            let code = match vm.compile(script, Mode::Exec, "<script>".to_owned()) {
                Ok(code) => code,
                Err(err) => {
                    let (line, _col) = err.python_location();
                    return Err(ScriptFault::Syntax {
                        message: err.to_string(),
                        line: line as u32,
                    });
                }
            };

            let scope = vm.new_scope_with_builtins();
            let _ = scope
                .globals
                .set_item("__name__", vm.ctx.new_str("__main__").into(), vm);
            install_plotting(vm, &scope);

            match vm.run_code_obj(code, scope) {
                Ok(_) => Ok(()),
                Err(exc) => Err(extract_fault(vm, exc)),
            }
        })
    }

    fn name(&self) -> &str {
        "python"
    }

    fn interruptible(&self) -> bool {
        true
    }
}

/// Replace `sys.stdout` / `sys.stderr` with sink-forwarding writer objects
fn redirect_std_streams(vm: &VirtualMachine) {
    let stdout = build_writer(vm, Stream::Stdout);
    let stderr = build_writer(vm, Stream::Stderr);
    let _ = vm.sys_module.set_attr("stdout", stdout, vm);
    let _ = vm.sys_module.set_attr("stderr", stderr, vm);
}

/// Build a minimal Python object with `write(s)` and `flush()` methods
fn build_writer(vm: &VirtualMachine, stream: Stream) -> PyObjectRef {
    let write_fn = vm.new_function(
        "write",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let text: String = args
                .args
                .first()
                .and_then(|obj| obj.str(vm).ok())
                .map(|s| s.as_str().to_owned())
                .unwrap_or_default();
            if capture::write_output(stream, &text).is_err() {
                return Err(vm.new_runtime_error(CANCEL_MESSAGE.to_owned()));
            }
            Ok(vm.ctx.new_int(text.len()).into())
        },
    );

    let flush_fn = vm.new_function(
        "flush",
        move |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> { Ok(vm.ctx.none()) },
    );

    let writer = vm.new_module("<capture>", vm.ctx.new_dict(), None);
    let _ = writer.set_attr("write", write_fn, vm);
    let _ = writer.set_attr("flush", flush_fn, vm);
    let _ = writer.set_attr("closed", vm.ctx.new_bool(false), vm);
    let _ = writer.set_attr("encoding", vm.ctx.new_str("utf-8"), vm);
    writer.into()
}

/// Inject `plot`, `show`, and `figure` into the script's globals
fn install_plotting(vm: &VirtualMachine, scope: &Scope) {
    let plot_fn = vm.new_function(
        "plot",
        |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let points = parse_points(&args, vm)?;
            if capture::add_series(points).is_err() {
                return Err(vm.new_runtime_error(CANCEL_MESSAGE.to_owned()));
            }
            Ok(vm.ctx.none())
        },
    );

    let show_fn = vm.new_function(
        "show",
        |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            if capture::emit_figure().is_err() {
                return Err(vm.new_runtime_error(CANCEL_MESSAGE.to_owned()));
            }
            Ok(vm.ctx.none())
        },
    );

    let figure_fn = vm.new_function(
        "figure",
        |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            capture::reset_figure();
            Ok(vm.ctx.none())
        },
    );

    let _ = scope.globals.set_item("plot", plot_fn.into(), vm);
    let _ = scope.globals.set_item("show", show_fn.into(), vm);
    let _ = scope.globals.set_item("figure", figure_fn.into(), vm);
}

/// `plot(ys)` or `plot(xs, ys)` argument handling
fn parse_points(args: &FuncArgs, vm: &VirtualMachine) -> PyResult<Vec<(f64, f64)>> {
    match args.args.len() {
        1 => {
            let ys = extract_numbers(vm, &args.args[0])?;
            Ok(ys
                .into_iter()
                .enumerate()
                .map(|(i, y)| (i as f64, y))
                .collect())
        }
        2 => {
            let xs = extract_numbers(vm, &args.args[0])?;
            let ys = extract_numbers(vm, &args.args[1])?;
            if xs.len() != ys.len() {
                return Err(vm.new_value_error(format!(
                    "plot: x and y must have the same length ({} != {})",
                    xs.len(),
                    ys.len()
                )));
            }
            Ok(xs.into_iter().zip(ys).collect())
        }
        n => Err(vm.new_type_error(format!("plot expects 1 or 2 sequence arguments, got {n}"))),
    }
}

fn extract_numbers(vm: &VirtualMachine, obj: &PyObjectRef) -> PyResult<Vec<f64>> {
    if let Ok(values) = vm.extract_elements_with(obj, |o| f64::try_from_object(vm, o)) {
        return Ok(values);
    }
    vm.extract_elements_with(obj, |o| i64::try_from_object(vm, o))
        .map(|values: Vec<i64>| values.into_iter().map(|v| v as f64).collect())
}

/// Convert an uncaught exception into a [`ScriptFault`], with the VM's own
/// traceback formatting
fn extract_fault(vm: &VirtualMachine, exc: PyBaseExceptionRef) -> ScriptFault {
    let mut trace = String::new();
    let _ = vm.write_exception(&mut trace, &exc);

    if trace.contains(CANCEL_MESSAGE) {
        return ScriptFault::Cancelled;
    }

    let message = trace
        .trim_end()
        .lines()
        .last()
        .unwrap_or("unknown script error")
        .to_owned();
    ScriptFault::Runtime { message, trace }
}
