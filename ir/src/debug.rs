//! Diagnostic printing of program graphs.

use std::fmt::Write;

use crate::Program;

/// Render a whole program as indented text: tasks, their kernels with
/// numbered instructions, and their defined buffers. For diagnostics only;
/// the format is not stable.
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "program: {} tasks, {} kernels, {} buffers",
        program.number_of_tasks(),
        program.number_of_kernels(),
        program.number_of_buffers()
    );
    for task in program.tasks() {
        let predecessors: Vec<String> = task.predecessors().map(|task| task.to_string()).collect();
        let _ = writeln!(out, "{} (after [{}])", task.number(), predecessors.join(" "));
        for buffer in program.task_defined_buffers(task.number()) {
            let _ = writeln!(out, "  {buffer}");
        }
        for kernel in program.task_kernels(task.number()) {
            let _ = writeln!(out, "  {kernel}");
            for (id, instruction) in kernel.instructions() {
                let _ = writeln!(out, "    {id}: {instruction}");
            }
        }
    }
    out
}

/// Print [`dump_program`] to standard error.
pub fn print_program(program: &Program) {
    eprintln!("{}", dump_program(program));
}
