//! Shared test helpers for `pl2b_core` integration tests.

#![allow(unreachable_pub)]

use pl2b_core::{Command, CommandId, Program};

/// Owned view of one command: name, and `(text, quoted)` per argument.
pub type Shape = (String, Vec<(String, bool)>);

/// Flatten a program into comparable shapes.
#[allow(dead_code)]
pub fn shapes(program: &Program<'_>) -> Vec<Shape> {
    program.iter().map(shape).collect()
}

/// Shape of a single command.
#[allow(dead_code)]
pub fn shape(cmd: &Command<'_>) -> Shape {
    (
        cmd.name().to_string(),
        cmd.args()
            .iter()
            .map(|a| (a.to_string(), a.is_quoted()))
            .collect(),
    )
}

/// Raw bytes of every part, name first, for non-UTF-8 comparisons.
#[allow(dead_code)]
pub fn raw_parts(program: &Program<'_>) -> Vec<Vec<(Vec<u8>, bool)>> {
    program
        .iter()
        .map(|cmd| {
            std::iter::once(cmd.name())
                .chain(cmd.args())
                .map(|p| (p.as_bytes().to_vec(), p.is_quoted()))
                .collect()
        })
        .collect()
}

/// The first command of a non-empty program.
#[allow(dead_code)]
pub fn first<'p, 's>(program: &'p Program<'s>) -> &'p Command<'s> {
    let head: CommandId = program.head().expect("program is empty");
    program.get(head).expect("head is valid")
}
