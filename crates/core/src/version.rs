//! Language edition and engine version.

/// Language edition implemented by this engine.
pub const EDITION: &str = "PL2-BK";
/// Engine major version.
pub const MAJOR: u16 = 0;
/// Engine minor version.
pub const MINOR: u16 = 3;
/// Engine patch version.
pub const PATCH: u16 = 0;
/// Release name.
pub const POSTFIX: &str = "BlueGiant";

/// `"PL2-BK 0.3.0 (BlueGiant)"`.
pub fn describe() -> String {
    format!("{EDITION} {MAJOR}.{MINOR}.{PATCH} ({POSTFIX})")
}

#[cfg(test)]
mod tests {
    #[test]
    fn matches_crate_version() {
        let ours = format!("{}.{}.{}", super::MAJOR, super::MINOR, super::PATCH);
        assert_eq!(ours, env!("CARGO_PKG_VERSION"));
        assert_eq!(super::describe(), "PL2-BK 0.3.0 (BlueGiant)");
    }
}
