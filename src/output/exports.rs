use anyhow::Result;
use chrono::NaiveDate;
use std::io::Write;

use crate::archive::sanitize_component;
use crate::hr_api::{Collaborator, Company};
use crate::pipeline::RunResult;

/// `collaborators_{company}_{YYYYMMDD}.csv`
pub fn roster_file_name(company: &Company, date: NaiveDate) -> String {
    format!(
        "collaborators_{}_{}.csv",
        sanitize_component(&company.name),
        date.format("%Y%m%d")
    )
}

/// Writes the collaborator roster as CSV, one row per collaborator in API order.
pub fn export_roster_csv(collaborators: &[Collaborator], output: &mut dyn Write) -> Result<()> {
    writeln!(output, "ID,First name,Last name,Email,Status,Start date,End date")?;

    for collaborator in collaborators {
        writeln!(
            output,
            "{},{},{},{},{},{},{}",
            csv_field(&collaborator.id),
            csv_field(&collaborator.first_name),
            csv_field(&collaborator.last_name),
            csv_field(collaborator.email.as_deref().unwrap_or("")),
            collaborator.status,
            csv_field(collaborator.start_date.as_deref().unwrap_or("")),
            csv_field(collaborator.end_date.as_deref().unwrap_or("")),
        )?;
    }

    Ok(())
}

/// Writes the run report: everything in the result except the PDF bytes.
pub fn export_report(result: &RunResult, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr_api::CollaboratorStatus;
    use crate::pipeline::PeriodSelection;
    use chrono::Utc;
    use indexmap::IndexMap;

    fn company(name: &str) -> Company {
        serde_json::from_value(serde_json::json!({"id": "c1", "name": name})).unwrap()
    }

    fn collaborator(value: serde_json::Value) -> Collaborator {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_roster_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        assert_eq!(
            roster_file_name(&company("Acme Corp/EU"), date),
            "collaborators_Acme_Corp_EU_20240430.csv"
        );
    }

    #[test]
    fn test_export_roster_csv() {
        let collaborators = vec![
            collaborator(serde_json::json!({
                "id": "u1",
                "firstName": "Jane",
                "lastName": "Doe",
                "email": "jane@example.com",
                "status": "active",
                "startDate": "2021-02-01"
            })),
            collaborator(serde_json::json!({
                "id": "u2",
                "firstName": "John",
                "lastName": "Roe, Jr.",
                "status": "on_leave",
                "endDate": "2023-12-31"
            })),
        ];
        assert_eq!(collaborators[1].status, CollaboratorStatus::Inactive);

        let mut output = Vec::new();
        export_roster_csv(&collaborators, &mut output).unwrap();
        let csv = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID,First name,Last name,Email,Status,Start date,End date");
        assert_eq!(lines[1], "u1,Jane,Doe,jane@example.com,Active,2021-02-01,");
        assert_eq!(lines[2], "u2,John,\"Roe, Jr.\",,Inactive,,2023-12-31");
    }

    #[test]
    fn test_csv_field_escapes_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_export_report_skips_binary_payloads() {
        let result = RunResult {
            company: company("Acme"),
            selection: PeriodSelection::Yearly { year: 2024 },
            collected_at: Utc::now(),
            collaborators: Vec::new(),
            with_match: Vec::new(),
            without_match: Vec::new(),
            failures: Vec::new(),
            payslips: IndexMap::new(),
            archive: Some(vec![0x50, 0x4b]),
        };

        let mut output = Vec::new();
        export_report(&result, true, &mut output).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();

        assert_eq!(json["company"]["name"], "Acme");
        assert_eq!(json["selection"]["mode"], "yearly");
        assert!(json.get("archive").is_none());
    }
}
