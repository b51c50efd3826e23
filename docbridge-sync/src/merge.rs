//! Reconciliation: target state + source state + defaults → merged state.
//!
//! ## Column precedence (physical columns only)
//!
//! 1. Source column description, as plain text.
//! 2. Default description for the column name, as plain text.
//! 3. The target's current description.
//!
//! Computed columns (non-empty `expression`) always keep their current
//! description.

use docbridge_core::{
    Column, ColumnUpdate, DefaultDescriptions, ReconciledDelta, SourceTable, SourceTables,
    TargetEntity,
};
use docbridge_renderer::render_plain_text;

/// Merge `target` with its matching source table.
///
/// Returns `None` when `target` has no source table; unmatched datasets are
/// filtered out before merging, so callers normally never see it.
pub fn merge(
    target: &TargetEntity,
    source_tables: &SourceTables,
    defaults: &DefaultDescriptions,
) -> Option<ReconciledDelta> {
    source_tables
        .get(&target.key)
        .map(|source| merge_table(target, source, defaults))
}

/// Merge `target` with an already looked-up `source` table.
pub fn merge_table(
    target: &TargetEntity,
    source: &SourceTable,
    defaults: &DefaultDescriptions,
) -> ReconciledDelta {
    let columns_new = target
        .columns
        .iter()
        .map(|column| ColumnUpdate {
            id: column.id,
            column_name: column.column_name.clone(),
            description: column_description(column, source, defaults),
        })
        .collect();

    let description_new = match source.description.as_deref() {
        None => target.description.clone(),
        Some(description) => render_plain_text(description),
    };

    ReconciledDelta {
        description_new,
        columns_new,
        // Always resupplied: an omitted owners field clears them remotely.
        owners_new: target.owner_ids(),
    }
}

fn column_description(
    column: &Column,
    source: &SourceTable,
    defaults: &DefaultDescriptions,
) -> String {
    if column.is_computed() {
        return column.description.clone();
    }
    if let Some(description) = source
        .columns
        .get(&column.column_name)
        .and_then(|c| c.description.as_deref())
    {
        return render_plain_text(description);
    }
    if let Some(description) = defaults.description_for(&column.column_name) {
        return render_plain_text(description);
    }
    column.description.clone()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use docbridge_core::{defaults::DefaultColumn, DatasetKey, Owner, SourceColumn};
    use rstest::rstest;

    use super::*;

    fn column(id: i64, name: &str, description: &str, expression: &str) -> Column {
        Column {
            id,
            column_name: name.to_string(),
            description: description.to_string(),
            expression: expression.to_string(),
        }
    }

    fn target(columns: Vec<Column>) -> TargetEntity {
        TargetEntity {
            id: 1,
            key: DatasetKey::from("sales.orders"),
            description: "old".to_string(),
            owners: vec![Owner { id: 1 }],
            columns,
        }
    }

    fn source(description: Option<&str>, columns: &[(&str, Option<&str>)]) -> SourceTable {
        SourceTable {
            key: DatasetKey::from("sales.orders"),
            description: description.map(str::to_string),
            columns: columns
                .iter()
                .map(|(name, desc)| {
                    (
                        (*name).to_string(),
                        SourceColumn {
                            description: desc.map(str::to_string),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn defaults(entries: &[(&str, &str)]) -> DefaultDescriptions {
        DefaultDescriptions {
            columns: entries
                .iter()
                .map(|(name, desc)| {
                    (
                        (*name).to_string(),
                        DefaultColumn {
                            desc: Some((*desc).to_string()),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn end_to_end_scenario_delta() {
        let target = target(vec![column(1, "amount", "", "")]);
        let source = source(Some("**Orders** table"), &[("amount", Some("Order amount"))]);

        let delta = merge_table(&target, &source, &DefaultDescriptions::default());
        assert_eq!(delta.description_new, "Orders table");
        assert_eq!(
            delta.columns_new,
            vec![ColumnUpdate {
                id: 1,
                column_name: "amount".to_string(),
                description: "Order amount".to_string(),
            }]
        );
        assert_eq!(delta.owners_new, vec![1]);
        assert!(!delta.matches(&target));
    }

    #[test]
    fn no_op_scenario_matches_current_state() {
        let target = target(vec![column(1, "amount", "", "")]);
        let source = source(Some("old"), &[("amount", Some(""))]);
        let delta = merge_table(&target, &source, &DefaultDescriptions::default());
        assert!(delta.matches(&target));
    }

    #[test]
    fn html_wrapped_descriptions_keep_their_text() {
        let target = target(vec![column(1, "amount", "current", "")]);
        let source = source(
            Some("<p>Customer table</p>"),
            &[("amount", Some("<div>\nRevenue per order\n</div>"))],
        );
        let delta = merge_table(&target, &source, &DefaultDescriptions::default());
        assert_eq!(delta.description_new, "Customer table");
        assert_eq!(delta.columns_new[0].description, "Revenue per order");
    }

    #[test]
    fn source_description_beats_default() {
        let target = target(vec![column(1, "amount", "current", "")]);
        let source = source(None, &[("amount", Some("From *source*"))]);
        let delta = merge_table(&target, &source, &defaults(&[("amount", "From default")]));
        assert_eq!(delta.columns_new[0].description, "From source");
    }

    #[rstest]
    #[case::default_used(&[("amount", "Default **amount**")], "Default amount")]
    #[case::current_kept(&[], "current")]
    fn fallback_without_source_column(#[case] default_entries: &[(&str, &str)], #[case] expected: &str) {
        let target = target(vec![column(1, "amount", "current", "")]);
        let source = source(None, &[("other", Some("x"))]);
        let delta = merge_table(&target, &source, &defaults(default_entries));
        assert_eq!(delta.columns_new[0].description, expected);
    }

    #[test]
    fn source_column_without_description_key_falls_through_to_default() {
        let target = target(vec![column(1, "amount", "current", "")]);
        let source = source(None, &[("amount", None)]);
        let delta = merge_table(&target, &source, &defaults(&[("amount", "Default")]));
        assert_eq!(delta.columns_new[0].description, "Default");
    }

    #[test]
    fn computed_columns_are_never_touched() {
        let target = target(vec![column(2, "ratio", "keep me", "a / b")]);
        let source = source(Some("t"), &[("ratio", Some("from source"))]);
        let delta = merge_table(&target, &source, &defaults(&[("ratio", "from default")]));
        assert_eq!(delta.columns_new[0].description, "keep me");
    }

    #[test]
    fn missing_table_description_keeps_current() {
        let target = target(vec![]);
        let delta = merge_table(&target, &source(None, &[]), &DefaultDescriptions::default());
        assert_eq!(delta.description_new, "old");
    }

    #[test]
    fn owners_are_always_resupplied_in_order() {
        let mut target = target(vec![]);
        target.owners = vec![Owner { id: 3 }, Owner { id: 7 }];
        let delta = merge_table(&target, &source(Some("old"), &[]), &DefaultDescriptions::default());
        assert_eq!(delta.owners_new, vec![3, 7]);
        assert!(delta.matches(&target));
    }

    #[test]
    fn column_order_follows_target() {
        let target = target(vec![column(5, "b", "", ""), column(2, "a", "", "")]);
        let delta = merge_table(&target, &source(None, &[]), &DefaultDescriptions::default());
        let ids: Vec<_> = delta.columns_new.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 2]);
    }

    #[test]
    fn merge_looks_up_by_key() {
        let target = target(vec![]);
        let mut tables = SourceTables::new();
        assert!(merge(&target, &tables, &DefaultDescriptions::default()).is_none());

        tables.insert(target.key.clone(), source(Some("new"), &[]));
        let delta = merge(&target, &tables, &DefaultDescriptions::default()).expect("matched");
        assert_eq!(delta.description_new, "new");
    }
}
