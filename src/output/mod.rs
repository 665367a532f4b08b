mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::{export_report, export_roster_csv, roster_file_name};
pub use progress::TerminalProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{print_roster_summary, print_summary};

/// Prints the tool banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🧾 Payslip Collector"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Monthly and yearly payslip collection")
    );
}
