// LogThru
// Logging facilities for the reassembly engine, all under the "frag" target

#[macro_export]
macro_rules! log_frag {
    (error $text:expr) => {error!(
        target: "frag",
        "{}",
        $text,
    )};
    (error $fmt:literal, $($arg:expr),+) => {
        error!(target:"frag", $fmt, $($arg),+);
    };
    (warn $text:expr) => {warn!(
        target: "frag",
        "{}",
        $text,
    )};
    (warn $fmt:literal, $($arg:expr),+) => {
        warn!(target:"frag", $fmt, $($arg),+);
    };
    (debug $text:expr) => {debug!(
        target: "frag",
        "{}",
        $text,
    )};
    (debug $fmt:literal, $($arg:expr),+) => {
        debug!(target:"frag", $fmt, $($arg),+);
    };
    ($text:expr) => {trace!(
        target: "frag",
        "{}",
        $text,
    )};
    ($fmt:literal, $($arg:expr),+) => {
        trace!(target:"frag", $fmt, $($arg),+);
    }
}
