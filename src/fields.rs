//! Logical field resolution across varying spreadsheet column names.
//!
//! The ledger and settlement exports name the same things differently from
//! one provider or month to the next. A [`FieldTable`] lists, for each
//! [`LogicalField`], the accepted labels and optional substring patterns.
//! Resolution is two-pass:
//!
//! 1. **Exact**: aliases are tried in declared order; the first alias present
//!    in the table wins, and if that alias labels several columns the
//!    left-most one is used. A column taken by an earlier field is skipped.
//! 2. **Substring**: fields still unresolved that declare `contains` patterns
//!    take the left-most column whose label contains any pattern and that no
//!    other field of the same table has claimed (so the contract id column is
//!    never picked up as an installment count).
//!
//! Labels are compared after [`normalize_label`], so configuration files may
//! be written in any case.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    fs::File,
    io::Write,
    path::Path,
};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::SchemaError, model::TableRole, normalize::normalize_label};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    ContractId,
    BaseValue,
    CommissionPercent,
    InstallmentCount,
    Salesperson,
    ClosingDate,
}

impl LogicalField {
    pub const ALL: [LogicalField; 6] = [
        LogicalField::ContractId,
        LogicalField::BaseValue,
        LogicalField::CommissionPercent,
        LogicalField::InstallmentCount,
        LogicalField::Salesperson,
        LogicalField::ClosingDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::ContractId => "contract id",
            LogicalField::BaseValue => "base value",
            LogicalField::CommissionPercent => "commission percentage",
            LogicalField::InstallmentCount => "installment count",
            LogicalField::Salesperson => "salesperson",
            LogicalField::ClosingDate => "closing date",
        }
    }

    pub fn requirement(&self) -> FieldRequirement {
        match self {
            LogicalField::ContractId => FieldRequirement::AllTables,
            LogicalField::ClosingDate => FieldRequirement::Table(TableRole::Settlement),
            _ => FieldRequirement::EitherTable,
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a field has to be found for a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRequirement {
    AllTables,
    Table(TableRole),
    /// Schema variants disagree on which side carries it; one side is enough.
    EitherTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: LogicalField,
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contains: Vec<String>,
}

impl FieldRule {
    pub fn new(field: LogicalField, labels: &[&str], contains: &[&str]) -> Self {
        Self {
            field,
            labels: labels.iter().map(|l| normalize_label(l)).collect(),
            contains: contains.iter().map(|c| normalize_label(c)).collect(),
        }
    }

    fn normalized(self) -> Self {
        Self {
            field: self.field,
            labels: self.labels.iter().map(|l| normalize_label(l)).collect(),
            contains: self
                .contains
                .iter()
                .map(|c| normalize_label(c))
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTable {
    pub fields: Vec<FieldRule>,
}

impl Default for FieldTable {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldRule::new(
                    LogicalField::ContractId,
                    &[
                        "CONTRATO",
                        "Nº CONTRATO",
                        "N° CONTRATO",
                        "NUMERO DO CONTRATO",
                        "NÚMERO DO CONTRATO",
                        "NÚMERO CONTRATO",
                        "CONTRACT",
                        "CONTRACT ID",
                        "CONTRACT_ID",
                    ],
                    &[],
                ),
                FieldRule::new(
                    LogicalField::BaseValue,
                    &[
                        "VLR VENDIDO",
                        "VALOR VENDIDO",
                        "VALOR BASE",
                        "VLR BASE",
                        "VALOR PAGO",
                        "VALOR RECEBIDO",
                        "VALOR",
                        "BASE VALUE",
                        "SALE AMOUNT",
                        "SETTLED AMOUNT",
                        "AMOUNT",
                    ],
                    &[],
                ),
                FieldRule::new(
                    LogicalField::CommissionPercent,
                    &[
                        "% COMISSÃO",
                        "% COMISSAO",
                        "COMISSÃO %",
                        "COMISSAO %",
                        "PERCENTUAL DE COMISSÃO",
                        "PERCENTUAL COMISSÃO",
                        "PERCENTUAL",
                        "COMMISSION %",
                        "COMMISSION PERCENT",
                        "COMMISSION RATE",
                    ],
                    &[],
                ),
                FieldRule::new(
                    LogicalField::InstallmentCount,
                    &[
                        "QUANTIDADE DE PARCELAS",
                        "QTD PARCELAS",
                        "QTDE PARCELAS",
                        "QTD. PARCELAS",
                        "Nº PARCELAS",
                        "PARCELAS",
                        "INSTALLMENTS",
                        "INSTALLMENT COUNT",
                    ],
                    &["PARCELA", "INSTALLMENT"],
                ),
                FieldRule::new(
                    LogicalField::Salesperson,
                    &[
                        "VENDEDOR",
                        "VENDEDORA",
                        "VENDEDOR(A)",
                        "CONSULTOR",
                        "CORRETOR",
                        "SALESPERSON",
                        "SELLER",
                        "SALES REP",
                    ],
                    &[],
                ),
                FieldRule::new(
                    LogicalField::ClosingDate,
                    &[
                        "DATA FECHAMENTO",
                        "DATA DE FECHAMENTO",
                        "DT FECHAMENTO",
                        "FECHAMENTO",
                        "DATA PAGAMENTO",
                        "DATA",
                        "CLOSING DATE",
                        "CLOSE DATE",
                        "DATE",
                    ],
                    &[],
                ),
            ],
        }
    }
}

impl FieldTable {
    pub fn new(rules: Vec<FieldRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.field) {
                bail!("Field '{}' is declared more than once", rule.field);
            }
        }
        Ok(Self {
            fields: rules.into_iter().map(FieldRule::normalized).collect(),
        })
    }

    pub fn rule(&self, field: LogicalField) -> Option<&FieldRule> {
        self.fields.iter().find(|r| r.field == field)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening field table {path:?}"))?;
        let table: FieldTable = serde_yaml::from_reader(file)
            .with_context(|| format!("Parsing field table YAML {path:?}"))?;
        Self::new(table.fields)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml_string()?;
        let mut file =
            File::create(path).with_context(|| format!("Creating field table {path:?}"))?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing field table to YAML")
    }

    /// Resolves every field of the table against one input's normalized labels.
    pub fn resolve(&self, role: TableRole, labels: &[String]) -> ColumnMap {
        let mut columns = BTreeMap::new();
        let mut claimed = HashSet::new();

        for rule in &self.fields {
            let found = rule.labels.iter().find_map(|alias| {
                labels
                    .iter()
                    .enumerate()
                    .find(|(idx, label)| !claimed.contains(idx) && *label == alias)
                    .map(|(idx, _)| idx)
            });
            if let Some(index) = found {
                claimed.insert(index);
                columns.insert(
                    rule.field,
                    ResolvedColumn {
                        field: rule.field,
                        index,
                        label: labels[index].clone(),
                        kind: MatchKind::Exact,
                    },
                );
            }
        }

        for rule in &self.fields {
            if columns.contains_key(&rule.field) || rule.contains.is_empty() {
                continue;
            }
            let found = labels.iter().enumerate().position(|(idx, label)| {
                !claimed.contains(&idx) && rule.contains.iter().any(|p| label.contains(p.as_str()))
            });
            if let Some(index) = found {
                debug!(
                    "{role}: '{}' picked for {} by substring match",
                    labels[index], rule.field
                );
                claimed.insert(index);
                columns.insert(
                    rule.field,
                    ResolvedColumn {
                        field: rule.field,
                        index,
                        label: labels[index].clone(),
                        kind: MatchKind::Substring,
                    },
                );
            }
        }

        ColumnMap { role, columns }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Substring,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => f.write_str("exact"),
            MatchKind::Substring => f.write_str("substring"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub field: LogicalField,
    pub index: usize,
    pub label: String,
    pub kind: MatchKind,
}

/// The concrete columns chosen for one input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub role: TableRole,
    columns: BTreeMap<LogicalField, ResolvedColumn>,
}

impl ColumnMap {
    pub fn get(&self, field: LogicalField) -> Option<&ResolvedColumn> {
        self.columns.get(&field)
    }

    pub fn index(&self, field: LogicalField) -> Option<usize> {
        self.columns.get(&field).map(|c| c.index)
    }

    pub fn contains(&self, field: LogicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.values()
    }
}

/// Checks both maps against each field's [`FieldRequirement`].
pub fn validate(ledger: &ColumnMap, settlement: &ColumnMap) -> Result<(), SchemaError> {
    for field in LogicalField::ALL {
        match field.requirement() {
            FieldRequirement::AllTables => {
                for map in [ledger, settlement] {
                    if !map.contains(field) {
                        return Err(SchemaError::MissingColumn {
                            field,
                            table: map.role,
                        });
                    }
                }
            }
            FieldRequirement::Table(role) => {
                let map = if role == TableRole::Ledger {
                    ledger
                } else {
                    settlement
                };
                if !map.contains(field) {
                    return Err(SchemaError::MissingColumn { field, table: role });
                }
            }
            FieldRequirement::EitherTable => {
                if !ledger.contains(field) && !settlement.contains(field) {
                    return Err(SchemaError::MissingInBoth { field });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| normalize_label(l)).collect()
    }

    fn resolve_one(
        table: &FieldTable,
        role: TableRole,
        raw: &[&str],
        field: LogicalField,
    ) -> Option<ResolvedColumn> {
        table.resolve(role, &labels(raw)).get(field).cloned()
    }

    #[test]
    fn resolves_portuguese_export_labels() {
        let table = FieldTable::default();
        let labels = labels(&[
            "CONTRATO",
            "Vlr Vendido",
            "% COMISSÃO",
            "Quantidade de Parcelas",
            "Vendedor",
            "Data Fechamento",
        ]);
        let map = table.resolve(TableRole::Ledger, &labels);
        for (position, field) in LogicalField::ALL.iter().enumerate() {
            let column = map.get(*field).expect("field resolved");
            assert_eq!(column.index, position);
            assert_eq!(column.kind, MatchKind::Exact);
        }
    }

    #[test]
    fn earlier_alias_beats_earlier_column() {
        let table = FieldTable::default();
        let column = resolve_one(
            &table,
            TableRole::Settlement,
            &["Valor", "Vlr Vendido"],
            LogicalField::BaseValue,
        )
        .unwrap();
        assert_eq!(column.label, "VLR VENDIDO");
        assert_eq!(column.index, 1);
    }

    #[test]
    fn duplicate_labels_resolve_to_leftmost_column() {
        let table = FieldTable::default();
        let column = resolve_one(
            &table,
            TableRole::Ledger,
            &["Contrato", "Vendedor", "CONTRATO "],
            LogicalField::ContractId,
        )
        .unwrap();
        assert_eq!(column.index, 0);
    }

    #[test]
    fn installment_count_falls_back_to_substring_in_column_order() {
        let table = FieldTable::default();
        let column = resolve_one(
            &table,
            TableRole::Ledger,
            &["Contrato", "Nro Parcela Atual", "Total de Parcelas Pagas"],
            LogicalField::InstallmentCount,
        )
        .unwrap();
        assert_eq!(column.index, 1);
        assert_eq!(column.kind, MatchKind::Substring);
    }

    #[test]
    fn exact_match_skips_columns_claimed_by_earlier_fields() {
        let table = FieldTable::new(vec![
            FieldRule::new(LogicalField::ContractId, &["contrato"], &[]),
            FieldRule::new(LogicalField::ClosingDate, &["data"], &[]),
            FieldRule::new(LogicalField::BaseValue, &["data", "valor"], &[]),
            FieldRule::new(LogicalField::Salesperson, &["contrato"], &[]),
        ])
        .unwrap();
        let map = table.resolve(
            TableRole::Settlement,
            &labels(&["Contrato", "Data", "Valor"]),
        );
        assert_eq!(map.index(LogicalField::ClosingDate), Some(1));
        assert_eq!(map.index(LogicalField::BaseValue), Some(2));
        assert!(!map.contains(LogicalField::Salesperson));
    }

    #[test]
    fn repeated_label_feeds_two_fields_left_to_right() {
        let table = FieldTable::new(vec![
            FieldRule::new(LogicalField::ContractId, &["id"], &[]),
            FieldRule::new(LogicalField::Salesperson, &["id"], &[]),
        ])
        .unwrap();
        let map = table.resolve(TableRole::Ledger, &labels(&["ID", "Nome", "ID"]));
        assert_eq!(map.index(LogicalField::ContractId), Some(0));
        assert_eq!(map.index(LogicalField::Salesperson), Some(2));
    }

    #[test]
    fn substring_fallback_skips_claimed_columns() {
        let table = FieldTable::new(vec![
            FieldRule::new(LogicalField::ContractId, &["contrato parcela"], &[]),
            FieldRule::new(LogicalField::InstallmentCount, &[], &["parcela"]),
        ])
        .unwrap();
        let labels = labels(&["Contrato Parcela", "Parcelas Contratadas"]);
        let map = table.resolve(TableRole::Settlement, &labels);
        assert_eq!(map.index(LogicalField::ContractId), Some(0));
        assert_eq!(map.index(LogicalField::InstallmentCount), Some(1));
    }

    #[test]
    fn substring_fallback_finds_nothing_when_only_claimed_columns_match() {
        let table = FieldTable::new(vec![
            FieldRule::new(LogicalField::ContractId, &["parcela id"], &[]),
            FieldRule::new(LogicalField::InstallmentCount, &[], &["parcela"]),
        ])
        .unwrap();
        let map = table.resolve(TableRole::Ledger, &labels(&["Parcela ID"]));
        assert!(!map.contains(LogicalField::InstallmentCount));
    }

    #[test]
    fn validate_reports_missing_settlement_date() {
        let table = FieldTable::default();
        let ledger = table.resolve(
            TableRole::Ledger,
            &labels(&["Contrato", "% Comissão", "Parcelas", "Vendedor", "Vlr Vendido"]),
        );
        let settlement = table.resolve(TableRole::Settlement, &labels(&["Contrato", "Valor"]));
        assert_eq!(
            validate(&ledger, &settlement),
            Err(SchemaError::MissingColumn {
                field: LogicalField::ClosingDate,
                table: TableRole::Settlement,
            })
        );
    }

    #[test]
    fn validate_accepts_fields_split_across_tables() {
        let table = FieldTable::default();
        let ledger = table.resolve(TableRole::Ledger, &labels(&["Contrato", "Vendedor"]));
        let settlement = table.resolve(
            TableRole::Settlement,
            &labels(&["Contrato", "Data Fechamento", "Valor", "% Comissão", "Parcelas"]),
        );
        assert_eq!(validate(&ledger, &settlement), Ok(()));
    }

    #[test]
    fn validate_reports_field_missing_everywhere() {
        let table = FieldTable::default();
        let ledger = table.resolve(TableRole::Ledger, &labels(&["Contrato", "Vendedor"]));
        let settlement = table.resolve(
            TableRole::Settlement,
            &labels(&["Contrato", "Data Fechamento", "Valor", "Parcelas"]),
        );
        assert_eq!(
            validate(&ledger, &settlement),
            Err(SchemaError::MissingInBoth {
                field: LogicalField::CommissionPercent
            })
        );
    }

    #[test]
    fn new_rejects_duplicate_rules() {
        let result = FieldTable::new(vec![
            FieldRule::new(LogicalField::Salesperson, &["a"], &[]),
            FieldRule::new(LogicalField::Salesperson, &["b"], &[]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn yaml_round_trip_normalizes_labels() {
        let yaml = "fields:\n  - field: salesperson\n    labels: [' rep name ']\n  - field: installment_count\n    labels: []\n    contains: [parc]\n";
        let parsed: FieldTable = serde_yaml::from_str(yaml).unwrap();
        let table = FieldTable::new(parsed.fields).unwrap();
        assert_eq!(
            table.rule(LogicalField::Salesperson).unwrap().labels,
            vec!["REP NAME".to_string()]
        );
        assert_eq!(
            table.rule(LogicalField::InstallmentCount).unwrap().contains,
            vec!["PARC".to_string()]
        );
        let rendered = table.to_yaml_string().unwrap();
        assert!(rendered.contains("installment_count"));
    }
}
