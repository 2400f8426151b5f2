//! Reuse-potential analysis tests.

use lazir_ntype::NType;

use crate::program::Program;
use crate::reuse::reuse_optimizing_transformation;
use crate::test::helpers::{copy_program, linked_task, stencil_program};
use crate::transformation::Transformation;
use crate::shape;

#[test]
fn test_copy_kernel_has_no_reuse() {
    let copy = copy_program(10);
    assert_eq!(copy.program.kernel_reuse_potential(copy.kernel), vec![0]);
}

#[test]
fn test_three_point_stencil_reuse() {
    // One class of three loads: two reusable pairs on axis 0.
    let stencil = stencil_program(&[-1, 0, 1], 100);
    assert_eq!(stencil.program.kernel_reuse_potential(stencil.kernel), vec![2]);
}

#[test]
fn test_separate_stencils_count_separately() {
    // {0, 1} group; {60} stays alone: one reusable pair.
    let stencil = stencil_program(&[0, 1, 60], 100);
    assert_eq!(stencil.program.kernel_reuse_potential(stencil.kernel), vec![1]);
}

#[test]
fn test_reuse_is_attributed_through_the_output_mask() {
    // A rank-2 kernel whose loads only vary along output axis 1, which
    // reads iteration axis 0: the reuse belongs to axis 0.
    let mut program = Program::new();
    let task = linked_task(&mut program);
    let source = program.create_buffer(task, shape![8, 8], NType::Float64, 1);
    let target = program.create_buffer(task, shape![8, 8], NType::Float64, 0);
    let kernel = program.create_kernel(task, shape![8, 8]);
    let swap = |offset: i64| {
        Transformation::affine()
            .input_rank(2)
            .output_rank(2)
            .output_mask(vec![Some(1), Some(0)])
            .offsets(vec![0, offset])
            .call()
            .unwrap()
    };
    let first = program.add_load(kernel, source, swap(0)).unwrap();
    program.add_load(kernel, source, swap(1)).unwrap();
    let inputs = [(0, first)];
    let call = program.add_call(kernel, crate::instruction::FnRecord::new("combine"), 1, &inputs);
    program.add_store(kernel, (0, call), target, Transformation::identity(2)).unwrap();

    assert_eq!(program.kernel_reuse_potential(kernel), vec![1, 0]);
}

#[test]
fn test_buffer_reuse_potential_weights_by_trip_count() {
    let stencil = stencil_program(&[-1, 0, 1], 100);
    // Two pairs, weighted by the 100 trips of the reading axis.
    assert_eq!(stencil.program.buffer_reuse_potential(stencil.source), vec![200]);
    // Nothing reads the target.
    assert_eq!(stencil.program.buffer_reuse_potential(stencil.target), vec![0]);
}

#[test]
fn test_reuse_optimizing_transformation_sorts_ascending() {
    let t = reuse_optimizing_transformation(&[5, 1, 7, 0]);
    assert_eq!(t.output_mask(), &[Some(3), Some(1), Some(0), Some(2)]);
    assert!(t.input_mask().iter().all(Option::is_none));
    assert!(t.scalings().iter().all(|&scaling| scaling == 1));
    assert!(t.offsets().iter().all(|&offset| offset == 0));
}

#[test]
fn test_reuse_sort_is_stable_on_ties() {
    let t = reuse_optimizing_transformation(&[3, 3, 1, 3]);
    assert_eq!(t.output_mask(), &[Some(2), Some(0), Some(1), Some(3)]);
}

#[test]
fn test_reuse_transformation_reorders_a_kernel() {
    let mut program = Program::new();
    let task = linked_task(&mut program);
    let source = program.create_buffer(task, shape![4, 6], NType::Float64, 1);
    let target = program.create_buffer(task, shape![4, 6], NType::Float64, 0);
    let kernel = program.create_kernel(task, shape![4, 6]);
    let load = program.add_load(kernel, source, Transformation::identity(2)).unwrap();
    program.add_store(kernel, (0, load), target, Transformation::identity(2)).unwrap();

    // Pretend axis 0 is the high-reuse axis: it should end up innermost.
    let t = reuse_optimizing_transformation(&[9, 2]);
    program.transform_kernel(kernel, &t).unwrap();
    assert_eq!(program.kernel(kernel).iteration_space(), &shape![6, 4]);
    program.validate().unwrap();
}
