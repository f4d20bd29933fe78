//! Diagnostics printed to stderr.

/// Print a warning line to stderr, with the source position appended.
#[macro_export]
macro_rules! warn {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {{
        use std::io::Write;
        let mut out = std::io::BufWriter::new(std::io::stderr().lock());
        let _ = write!(&mut out, "W: ");
        let _ = write!(&mut out, $fmt $(, $arg)*);
        let _ = writeln!(&mut out, " at {}:{}", file!(), line!());
        let _ = out.flush();
    }}
}

/// Same interface as `warn!` but silenced; rename at the call site to
/// turn individual warnings off.
#[macro_export]
macro_rules! nowarn {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {};
}
