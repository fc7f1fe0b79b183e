pub use pl2b_diagnostics::{Diagnostic, ErrorCode, Payload, Severity, SourcePos, codes, report};
