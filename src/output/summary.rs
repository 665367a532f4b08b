use chrono::NaiveDate;
use comfy_table::{Cell, Color as TableColor};
use std::fmt::Write;
use std::path::PathBuf;

use crate::hr_api::Company;
use crate::pipeline::{PeriodSelection, Roster, RunResult};

use super::styling::{bright, bright_green, bright_red, bright_yellow, check_mark, cyan, dim};
use super::tables::{
    color_coded_coverage_cell, create_table, cyan_header, optional_cell, status_cell,
};

/// Prints a human-readable summary of a collection run to stdout.
///
/// Displays:
/// - Overview: company, period, collaborator counts and coverage
/// - Payslips Collected: matched collaborators and their files
/// - Without Payslip: unmatched collaborators, the reason, and the periods
///   that do exist for them
/// - Failures: matched payslips that could not be downloaded or extracted
/// - Files Written: everything the run left on disk
pub fn print_summary(result: &RunResult, written: &[PathBuf]) {
    println!("{}", render_summary(result, written));
}

/// Prints the company overview and the collaborator roster to stdout.
pub fn print_roster_summary(roster: &Roster, written: &[PathBuf]) {
    println!("{}", render_roster(roster, written));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn month_name(month: u32) -> String {
    NaiveDate::from_ymd_opt(2000, month, 1)
        .map_or_else(|| month.to_string(), |date| date.format("%B").to_string())
}

fn render_company(output: &mut String, company: &Company) {
    let _ = writeln!(output, "  {} {}", dim("Company:"), cyan(&company.name));
    let _ = writeln!(output, "  {} {}", dim("Company id:"), dim(&company.id));
    let _ = writeln!(
        output,
        "  {} {}",
        dim("Active contracts:"),
        bright_yellow(company.nb_active_contracts)
    );

    let location: Vec<&str> = [
        company.postal_code.as_deref(),
        company.city.as_deref(),
        company.country_code.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect();
    if !location.is_empty() {
        let _ = writeln!(output, "  {} {}", dim("Location:"), location.join(" "));
    }
}

fn render_written(output: &mut String, written: &[PathBuf]) {
    if written.is_empty() {
        return;
    }
    add_section_header(output, "💾", "Files Written");
    for path in written {
        let _ = writeln!(output, "  {} {}", check_mark(), path.display());
    }
    output.push('\n');
}

#[allow(clippy::too_many_lines)]
fn render_summary(result: &RunResult, written: &[PathBuf]) -> String {
    let mut output = String::new();
    let stats = result.stats();

    add_section_header(&mut output, "📊", "Overview");
    render_company(&mut output, &result.company);
    let _ = writeln!(output, "  {} {}", dim("Period:"), cyan(&result.selection));
    let _ = writeln!(
        output,
        "  {} {}",
        dim("Collaborators:"),
        bright_yellow(stats.total_collaborators)
    );
    let _ = writeln!(
        output,
        "  {} {}",
        dim("Payslips extracted:"),
        bright_yellow(stats.total_payslips)
    );
    if let PeriodSelection::Yearly { .. } = result.selection {
        let months: Vec<String> = stats.months_covered.iter().map(|m| month_name(*m)).collect();
        let covered = if months.is_empty() {
            "none".to_string()
        } else {
            months.join(", ")
        };
        let _ = writeln!(output, "  {} {}", dim("Months covered:"), covered);
    }
    let _ = writeln!(
        output,
        "  {} {}\n",
        dim("Collected at:"),
        dim(result.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );

    let mut coverage = create_table();
    coverage.set_header(cyan_header(&["With payslip", "Without payslip", "Failures"]));
    let failures_cell = if result.failures.is_empty() {
        Cell::new(0).fg(TableColor::Green)
    } else {
        Cell::new(result.failures.len()).fg(TableColor::Red)
    };
    coverage.add_row(vec![
        color_coded_coverage_cell(result.with_match.len(), result.collaborators.len()),
        Cell::new(result.without_match.len()),
        failures_cell,
    ]);
    let _ = writeln!(output, "{coverage}\n");

    add_section_header(&mut output, "📄", "Payslips Collected");
    if result.with_match.is_empty() {
        let _ = writeln!(
            output,
            "{}\n",
            bright_yellow(format!("No payslip found for {}.", result.selection))
        );
    } else {
        let mut matched = create_table();
        matched.set_header(cyan_header(&["#", "Collaborator", "Periods", "Files"]));
        for (idx, collaborator) in result.with_match.iter().enumerate() {
            let files = result
                .payslips
                .get(&collaborator.id)
                .map(|p| {
                    p.months
                        .values()
                        .map(|payslip| payslip.file_name.as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();
            matched.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(&collaborator.name),
                Cell::new(collaborator.periods.join(", ")),
                if files.is_empty() {
                    Cell::new("none").fg(TableColor::Red)
                } else {
                    Cell::new(files)
                },
            ]);
        }
        let _ = writeln!(output, "{matched}\n");
    }

    if !result.without_match.is_empty() {
        add_section_header(&mut output, "🚫", "Without Payslip");
        let mut unmatched = create_table();
        unmatched.set_header(cyan_header(&["Collaborator", "Reason", "Available periods"]));
        for collaborator in &result.without_match {
            let available = if collaborator.available_periods.is_empty() {
                None
            } else {
                Some(collaborator.available_periods.join(", "))
            };
            unmatched.add_row(vec![
                Cell::new(&collaborator.name),
                Cell::new(&collaborator.reason).fg(TableColor::Yellow),
                optional_cell(available.as_deref()),
            ]);
        }
        let _ = writeln!(output, "{unmatched}\n");
    }

    if !result.failures.is_empty() {
        add_section_header(&mut output, "❌", "Failures");
        let mut failures = create_table();
        failures.set_header(cyan_header(&["Collaborator", "Period", "Reason"]));
        for failure in &result.failures {
            failures.add_row(vec![
                Cell::new(&failure.collaborator_name),
                Cell::new(&failure.period),
                Cell::new(&failure.reason).fg(TableColor::Red),
            ]);
        }
        let _ = writeln!(output, "{failures}\n");
    }

    render_written(&mut output, written);

    if result.archive.is_none() {
        let _ = writeln!(
            output,
            "{}",
            bright_red("No archive was produced: nothing could be extracted.")
        );
    }

    output
}

fn render_roster(roster: &Roster, written: &[PathBuf]) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    render_company(&mut output, &roster.company);
    let active = roster
        .collaborators
        .iter()
        .filter(|c| c.status == crate::hr_api::CollaboratorStatus::Active)
        .count();
    let _ = writeln!(
        output,
        "  {} {} ({} active)\n",
        dim("Collaborators:"),
        bright_yellow(roster.collaborators.len()),
        bright_green(active)
    );

    add_section_header(&mut output, "👥", "Collaborators");
    let mut table = create_table();
    table.set_header(cyan_header(&["ID", "Name", "Email", "Status", "Start", "End"]));
    for collaborator in &roster.collaborators {
        table.add_row(vec![
            Cell::new(&collaborator.id),
            Cell::new(collaborator.full_name()),
            optional_cell(collaborator.email.as_deref()),
            status_cell(collaborator.status),
            optional_cell(collaborator.start_date.as_deref()),
            optional_cell(collaborator.end_date.as_deref()),
        ]);
    }
    let _ = writeln!(output, "{table}\n");

    render_written(&mut output, written);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr_api::{Collaborator, CollaboratorStatus};
    use crate::pipeline::{
        CollaboratorPayslips, ExtractedPayslip, FailureReason, MatchedCollaborator,
        PayslipFailure, UnmatchedCollaborator, UnmatchedReason,
    };
    use chrono::Utc;
    use indexmap::IndexMap;
    use std::collections::BTreeMap;

    fn company() -> Company {
        serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "Acme",
            "nbActiveContracts": 2,
            "city": "Lyon",
            "countryCode": "FR"
        }))
        .unwrap()
    }

    fn collaborator(id: &str, first: &str, last: &str) -> Collaborator {
        serde_json::from_value(
            serde_json::json!({"id": id, "firstName": first, "lastName": last, "status": "active"}),
        )
        .unwrap()
    }

    fn create_test_result(selection: PeriodSelection) -> RunResult {
        let months = BTreeMap::from([(
            4,
            ExtractedPayslip {
                collaborator_id: "jane".to_string(),
                collaborator_name: "Jane Doe".to_string(),
                file_name: "Jane_Doe_2024_04.pdf".to_string(),
                month: 4,
                size_bytes: 3,
                content: b"pdf".to_vec(),
            },
        )]);
        let mut payslips = IndexMap::new();
        payslips.insert(
            "jane".to_string(),
            CollaboratorPayslips {
                name: "Jane Doe".to_string(),
                months,
            },
        );

        RunResult {
            company: company(),
            selection,
            collected_at: Utc::now(),
            collaborators: vec![
                collaborator("jane", "Jane", "Doe"),
                collaborator("john", "John", "Roe"),
                collaborator("max", "Max", "Poe"),
            ],
            with_match: vec![
                MatchedCollaborator {
                    id: "jane".to_string(),
                    name: "Jane Doe".to_string(),
                    periods: vec!["4/2024".to_string()],
                },
                MatchedCollaborator {
                    id: "max".to_string(),
                    name: "Max Poe".to_string(),
                    periods: vec!["4/2024".to_string()],
                },
            ],
            without_match: vec![UnmatchedCollaborator {
                id: "john".to_string(),
                name: "John Roe".to_string(),
                reason: UnmatchedReason::NoPayslipForPeriod,
                available_periods: vec!["3/2024".to_string()],
            }],
            failures: vec![PayslipFailure {
                collaborator_id: "max".to_string(),
                collaborator_name: "Max Poe".to_string(),
                period: "4/2024".to_string(),
                reason: FailureReason::PageUnavailable { page_count: 1 },
            }],
            payslips,
            archive: Some(b"zip".to_vec()),
        }
    }

    #[test]
    fn test_render_monthly_summary() {
        let result = create_test_result(PeriodSelection::Monthly {
            year: 2024,
            month: 4,
        });
        let output = render_summary(&result, &[PathBuf::from("out/payslips_2024_04.zip")]);

        assert!(output.contains("Acme"));
        assert!(output.contains("Lyon FR"));
        assert!(output.contains("Payslips Collected"));
        assert!(output.contains("Jane_Doe_2024_04.pdf"));
        assert!(output.contains("no payslip for target period"));
        assert!(output.contains("3/2024"));
        assert!(output.contains("page unavailable"));
        assert!(output.contains("payslips_2024_04.zip"));
        assert!(!output.contains("Months covered"));
        assert!(!output.contains("No archive was produced"));
    }

    #[test]
    fn test_render_yearly_summary_lists_months() {
        let result = create_test_result(PeriodSelection::Yearly { year: 2024 });
        let output = render_summary(&result, &[]);

        assert!(output.contains("Months covered:"));
        assert!(output.contains("April"));
        assert!(!output.contains("Files Written"));
    }

    #[test]
    fn test_render_summary_without_archive() {
        let mut result = create_test_result(PeriodSelection::Monthly {
            year: 2024,
            month: 4,
        });
        result.with_match.clear();
        result.failures.clear();
        result.payslips.clear();
        result.archive = None;

        let output = render_summary(&result, &[]);

        assert!(output.contains("No payslip found for 4/2024."));
        assert!(output.contains("No archive was produced"));
        assert!(!output.contains("Failures\n"));
    }

    #[test]
    fn test_render_roster() {
        let mut inactive = collaborator("b", "Bob", "Zoe");
        inactive.status = CollaboratorStatus::Inactive;
        inactive.email = Some("bob@example.com".to_string());
        let roster = Roster {
            company: company(),
            collaborators: vec![collaborator("a", "Ann", "Loe"), inactive],
        };

        let output = render_roster(&roster, &[]);

        assert!(output.contains("Ann Loe"));
        assert!(output.contains("bob@example.com"));
        assert!(output.contains("Inactive"));
        assert!(output.contains("active)"));
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(13), "13");
    }
}
