//! Dry-run unified diff support for `docbridge diff`.

use similar::TextDiff;

use docbridge_core::{ColumnUpdate, ReconciledDelta, TargetEntity};

/// Unified diff between the dataset's current state and `delta`.
///
/// Returns `None` when nothing would change.
pub fn preview(target: &TargetEntity, delta: &ReconciledDelta) -> Option<String> {
    if delta.matches(target) {
        return None;
    }

    let current = render_state(
        &target.description,
        &target.column_updates(),
        &target.owner_ids(),
    );
    let merged = render_state(&delta.description_new, &delta.columns_new, &delta.owners_new);

    let old_header = format!("a/{}", target.key);
    let new_header = format!("b/{}", target.key);
    Some(
        TextDiff::from_lines(&current, &merged)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string(),
    )
}

/// One line per writable field, columns ordered by id.
fn render_state(description: &str, columns: &[ColumnUpdate], owners: &[i64]) -> String {
    let mut columns: Vec<_> = columns.iter().collect();
    columns.sort_by_key(|c| c.id);

    let mut out = format!("description: {description}\n");
    for column in columns {
        out.push_str(&format!(
            "column {} (id {}): {}\n",
            column.column_name, column.id, column.description
        ));
    }
    let owners: Vec<String> = owners.iter().map(i64::to_string).collect();
    out.push_str(&format!("owners: [{}]\n", owners.join(", ")));
    out
}

#[cfg(test)]
mod tests {
    use docbridge_core::{Column, DatasetKey, Owner};

    use super::*;

    fn target() -> TargetEntity {
        TargetEntity {
            id: 1,
            key: DatasetKey::from("sales.orders"),
            description: "old".to_string(),
            owners: vec![Owner { id: 1 }],
            columns: vec![Column {
                id: 1,
                column_name: "amount".to_string(),
                description: String::new(),
                expression: String::new(),
            }],
        }
    }

    #[test]
    fn unchanged_state_has_no_preview() {
        let target = target();
        let delta = ReconciledDelta {
            description_new: "old".to_string(),
            columns_new: target.column_updates(),
            owners_new: vec![1],
        };
        assert!(preview(&target, &delta).is_none());
    }

    #[test]
    fn changed_fields_show_as_unified_diff() {
        let target = target();
        let mut columns_new = target.column_updates();
        columns_new[0].description = "Order amount".to_string();
        let delta = ReconciledDelta {
            description_new: "Orders table".to_string(),
            columns_new,
            owners_new: vec![1],
        };

        let diff = preview(&target, &delta).expect("diff");
        assert!(diff.contains("--- a/sales.orders"));
        assert!(diff.contains("+++ b/sales.orders"));
        assert!(diff.contains("-description: old"));
        assert!(diff.contains("+description: Orders table"));
        assert!(diff.contains("+column amount (id 1): Order amount"));
        assert!(diff.contains(" owners: [1]"));
    }
}
