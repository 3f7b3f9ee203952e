//! Serializations of a reconciliation: summary CSV, line CSV, JSON and
//! terminal tables. None of this feeds back into the computation.

use std::{fs::File, io::BufWriter, io::Write, path::Path};

use anyhow::{Context, Result};

use crate::{
    aggregate::{PayoutSummary, round_currency},
    diagnostics::Diagnostics,
    io_utils,
    model::CommissionLine,
    reconcile::Reconciliation,
    table::{Align, render_table},
};

pub const SUMMARY_HEADERS: [&str; 2] = ["salesperson", "commission"];
pub const LINE_HEADERS: [&str; 9] = [
    "contract",
    "settlement_row",
    "closing_date",
    "salesperson",
    "base_value",
    "percentage",
    "installments",
    "total_commission",
    "installment_commission",
];

pub fn summary_records(summary: &PayoutSummary) -> Vec<Vec<String>> {
    summary
        .rows
        .iter()
        .map(|row| vec![row.salesperson.clone(), row.commission.to_string()])
        .collect()
}

/// Line amounts are shown in cents; the summary is computed from the unrounded values.
pub fn line_records(lines: &[CommissionLine]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| {
            vec![
                line.contract.clone(),
                line.row.to_string(),
                line.closing_date.format("%Y-%m-%d").to_string(),
                line.salesperson.clone(),
                line.base_value.normalize().to_string(),
                line.percentage.normalize().to_string(),
                line.installments.to_string(),
                round_currency(line.total).to_string(),
                round_currency(line.per_installment).to_string(),
            ]
        })
        .collect()
}

fn write_csv(
    path: Option<&Path>,
    delimiter: u8,
    headers: &[&str],
    records: &[Vec<String>],
) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    writer.write_record(headers).context("Writing CSV headers")?;
    for record in records {
        writer.write_record(record).context("Writing CSV row")?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

pub fn write_summary_csv(summary: &PayoutSummary, path: Option<&Path>, delimiter: u8) -> Result<()> {
    write_csv(path, delimiter, &SUMMARY_HEADERS, &summary_records(summary))
}

pub fn write_lines_csv(lines: &[CommissionLine], path: &Path, delimiter: u8) -> Result<()> {
    write_csv(Some(path), delimiter, &LINE_HEADERS, &line_records(lines))
}

pub fn render_summary(summary: &PayoutSummary) -> String {
    let headers = SUMMARY_HEADERS.map(String::from).to_vec();
    let mut rows = summary_records(summary);
    if !rows.is_empty() {
        rows.push(vec!["TOTAL".to_string(), summary.total().to_string()]);
    }
    let mut rendered = format!("Commission summary for {}\n", summary.period);
    rendered.push_str(&render_table(&headers, &rows, &[Align::Left, Align::Right]));
    rendered
}

pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    let headers = vec!["check".to_string(), "rows".to_string()];
    let rows = diagnostics
        .counters()
        .into_iter()
        .map(|(label, count)| vec![label.to_string(), count.to_string()])
        .collect::<Vec<_>>();
    render_table(&headers, &rows, &[Align::Left, Align::Right])
}

fn json_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !io_utils::is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    Ok(writer)
}

pub fn write_json<T: serde::Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let mut writer = json_writer(path)?;
    serde_json::to_writer_pretty(&mut writer, value).context("Writing JSON output")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_reconciliation_json(result: &Reconciliation, path: Option<&Path>) -> Result<()> {
    #[derive(serde::Serialize)]
    struct Output<'a> {
        period: String,
        summary: &'a PayoutSummary,
        total: String,
        diagnostics: &'a Diagnostics,
    }
    write_json(
        &Output {
            period: result.period.to_string(),
            summary: &result.summary,
            total: result.summary.total().to_string(),
            diagnostics: &result.diagnostics,
        },
        path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::RawTable, reconcile::reconcile};

    fn sample() -> Reconciliation {
        let ledger = RawTable::new(["CONTRATO", "% COMISSÃO", "PARCELAS", "VENDEDOR"])
            .with_row(["100", "10", "2", "Ana"])
            .with_row(["101", "5", "3", "Bea"]);
        let settlement = RawTable::new(["CONTRATO", "VALOR", "DATA FECHAMENTO"])
            .with_row(["100", "1000", "15/01/2025"])
            .with_row(["101", "100", "20/01/2025"]);
        reconcile(&ledger, &settlement, "01/2025".parse().unwrap()).unwrap()
    }

    #[test]
    fn summary_records_use_two_decimals() {
        let result = sample();
        assert_eq!(
            summary_records(&result.summary),
            vec![
                vec!["Ana".to_string(), "50.00".to_string()],
                vec!["Bea".to_string(), "1.67".to_string()],
            ]
        );
    }

    #[test]
    fn line_records_show_cents() {
        let result = sample();
        let records = line_records(&result.lines);
        assert_eq!(records[1][0], "101");
        assert_eq!(records[1][2], "2025-01-20");
        assert_eq!(records[1][7], "5.00");
        assert_eq!(records[1][8], "1.67");
    }

    #[test]
    fn rendered_summary_has_total_row() {
        let rendered = render_summary(&sample().summary);
        assert!(rendered.starts_with("Commission summary for 01/2025"));
        assert!(rendered.contains("TOTAL"));
        assert!(rendered.contains("51.67"));
    }
}
