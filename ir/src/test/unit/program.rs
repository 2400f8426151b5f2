//! Program construction, lookup, deletion, and numbering tests.

use std::sync::Arc;

use crate::debug::dump_program;
use crate::error::Error;
use crate::instruction::FnRecord;
use crate::program::Program;
use crate::test::helpers::{copy_program, linked_task, shifted, stencil_program};
use crate::transformation::Transformation;
use crate::{InstId, shape};
use lazir_ntype::NType;

#[test]
fn test_new_program_has_initial_and_final_tasks() {
    let program = Program::new();
    assert_eq!(program.number_of_tasks(), 2);
    assert_ne!(program.initial_task(), program.final_task());
    assert_eq!(program.number_of_kernels(), 0);
    assert_eq!(program.number_of_buffers(), 0);
}

#[test]
fn test_task_dependencies_are_mirrored() {
    let mut program = Program::new();
    let task = linked_task(&mut program);
    assert!(program.task(program.initial_task()).successors().any(|successor| successor == task));
    assert!(program.task(task).predecessors().any(|predecessor| predecessor == program.initial_task()));
    assert!(program.task(task).successors().any(|successor| successor == program.final_task()));
}

#[test]
fn test_numbers_index_the_arenas() {
    let copy = copy_program(10);
    assert_eq!(copy.program.buffer(copy.source).number(), copy.source);
    assert_eq!(copy.program.kernel(copy.kernel).number(), copy.kernel);
    for (index, task) in copy.program.tasks().enumerate() {
        assert_eq!(task.number().index(), index);
    }
}

#[test]
fn test_lookup_by_number() {
    let copy = copy_program(10);
    assert_eq!(copy.program.buffer_by_number(copy.source.0).unwrap().number(), copy.source);
    assert_eq!(copy.program.kernel_by_number(copy.kernel.0).unwrap().number(), copy.kernel);
    assert!(matches!(copy.program.buffer_by_number(99), Err(Error::BufferNumberNotFound { number: 99 })));
    assert!(matches!(copy.program.kernel_by_number(99), Err(Error::KernelNumberNotFound { number: 99 })));
}

#[test]
fn test_copy_program_is_well_formed() {
    let copy = copy_program(10);
    copy.program.validate().unwrap();
}

#[test]
fn test_unlinked_tasks_fail_validation() {
    let mut program = Program::new();
    // Neither task has edges: two sources, two sinks.
    assert!(program.validate().is_err());
    program.add_task_dependency(program.initial_task(), program.final_task());
    program.validate().unwrap();
}

#[test]
fn test_buffer_classification() {
    let copy = copy_program(10);
    assert!(copy.program.buffer(copy.source).is_leaf());
    assert!(copy.program.buffer(copy.target).is_root());
    assert!(!copy.program.buffer(copy.source).is_interior());

    let stencil = stencil_program(&[0], 10);
    assert!(stencil.program.buffer(stencil.source).is_leaf());
    assert!(stencil.program.buffer(stencil.target).is_root());
}

#[test]
fn test_buffer_size_and_bits() {
    let mut program = Program::new();
    let task = linked_task(&mut program);
    let buffer = program.create_buffer(task, shape![4, 5], NType::Float32, 0);
    assert_eq!(program.buffer(buffer).size(), 20);
    assert_eq!(program.buffer(buffer).bits(), 640);
}

#[test]
fn test_leaf_alist_and_root_buffers() {
    let mut copy = copy_program(10);
    let handle: Arc<dyn std::any::Any + Send + Sync> = Arc::new("lazy array 7");
    copy.program.register_leaf(copy.source, handle);
    copy.program.add_root_buffer(copy.target);
    assert_eq!(copy.program.leaf_alist().len(), 1);
    assert_eq!(copy.program.leaf_alist()[0].0, copy.source);
    assert_eq!(copy.program.root_buffers(), &[copy.target]);
    let recovered = copy.program.leaf_alist()[0].1.downcast_ref::<&str>().unwrap();
    assert_eq!(*recovered, "lazy array 7");
}

#[test]
fn test_kernel_cost() {
    let copy = copy_program(10);
    // Instructions: load 0, store 1; the highest number is the store.
    assert_eq!(copy.program.kernel(copy.kernel).highest_instruction_number(), 1);
    assert_eq!(copy.program.kernel(copy.kernel).cost(), 10);
}

#[test]
fn test_kernel_cost_is_at_least_one() {
    let mut program = Program::new();
    let task = linked_task(&mut program);
    let kernel = program.create_kernel(task, shape![0]);
    assert_eq!(program.kernel(kernel).cost(), 1);
}

#[test]
fn test_delete_kernel_unlinks_buffers() {
    let mut copy = copy_program(10);
    copy.program.delete_kernel(copy.kernel);
    assert_eq!(copy.program.buffer(copy.source).reader_kernels().len(), 0);
    assert_eq!(copy.program.buffer(copy.target).writer_kernels().len(), 0);
    assert_eq!(copy.program.kernel(copy.kernel).number_of_instructions(), 0);
    copy.program.validate().unwrap();
}

#[test]
fn test_instruction_numbers_follow_dependencies() {
    let stencil = stencil_program(&[-1, 0, 1], 100);
    let kernel = stencil.program.kernel(stencil.kernel);
    for (id, instruction) in kernel.instructions() {
        for &(_, producer) in instruction.inputs() {
            assert!(producer < id);
        }
    }
    assert_eq!(kernel.store_instructions().max().map(|store| store.index()), Some(kernel.number_of_instructions() - 1));
}

#[test]
fn test_renumber_moves_stores_last() {
    // Interleave stores and loads so the insertion order is not
    // leaves-first.
    let mut program = Program::new();
    let task = linked_task(&mut program);
    let source = program.create_buffer(task, shape![10], NType::Float64, 1);
    let target = program.create_buffer(task, shape![10], NType::Float64, 0);
    let kernel = program.create_kernel(task, shape![10]);

    let load_a = program.add_load(kernel, source, shifted(1, vec![0])).unwrap();
    let early_store = program.add_store(kernel, (0, load_a), target, Transformation::identity(1)).unwrap();
    let load_b = program.add_load(kernel, source, shifted(1, vec![1])).unwrap();
    let call = program.add_call(kernel, FnRecord::new("combine"), 1, &[(0, load_b)]);
    let late_store = program.add_store(kernel, (0, call), target, shifted(1, vec![5])).unwrap();
    assert_eq!(early_store, InstId(1));
    assert_eq!(late_store, InstId(4));

    program.renumber_instructions(kernel);
    program.validate().unwrap();

    let kernel = program.kernel(kernel);
    // Loads first, then the call, then both stores in target order.
    assert!(kernel.instruction(InstId(0)).is_load());
    assert!(kernel.instruction(InstId(1)).is_load());
    assert!(!kernel.instruction(InstId(2)).is_store() && !kernel.instruction(InstId(2)).is_load());
    assert!(kernel.instruction(InstId(3)).is_store());
    assert!(kernel.instruction(InstId(4)).is_store());
    assert_eq!(kernel.highest_instruction_number(), 4);

    // The reader and writer tables were remapped along with the vector.
    for (_, load) in program.buffer(source).load_instructions() {
        assert!(kernel.instruction(load).is_load());
    }
    for (_, store) in program.buffer(target).store_instructions() {
        assert!(kernel.instruction(store).is_store());
    }
}

#[test]
fn test_traversal_orders_are_deterministic() {
    let stencil = stencil_program(&[-1, 0, 1], 100);
    let kernel = stencil.program.kernel(stencil.kernel);
    let loads: Vec<InstId> = kernel.load_instructions().collect();
    assert_eq!(loads, stencil.loads);
    let sources: Vec<_> = kernel.source_buffers().collect();
    assert_eq!(sources, vec![stencil.source]);
}

#[test]
fn test_dump_program_mentions_every_entity() {
    let copy = copy_program(10);
    let dump = dump_program(&copy.program);
    assert!(dump.contains("K0"));
    assert!(dump.contains("B0"));
    assert!(dump.contains("B1"));
    assert!(dump.contains("load"));
    assert!(dump.contains("store"));
}
