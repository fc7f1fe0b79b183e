use super::ast::Program;

/// Serialize a program to a pretty-printed JSON string.
pub fn to_pretty_json(program: &Program<'_>) -> String {
    serde_json::to_string_pretty(program).expect("Program serialization cannot fail")
}
