//! Build metadata banner printed at process startup.
//!
//! The values are injected at compile time (`PULSE_BUILD_VERSION`,
//! `PULSE_BUILD_DATE`, `PULSE_BUILD_COMMIT`); untagged builds print "N/A".

/// Print the three-line build banner to stdout.
pub fn print_build_info() {
    println!("Build version: {}", option_env!("PULSE_BUILD_VERSION").unwrap_or("N/A"));
    println!("Build date: {}", option_env!("PULSE_BUILD_DATE").unwrap_or("N/A"));
    println!("Build commit: {}", option_env!("PULSE_BUILD_COMMIT").unwrap_or("N/A"));
}
