//! Column reconciliation
//!
//! Adapts an arbitrary input column set to the features a predictor was fit
//! against: configured drop columns and the target are removed, and a lone
//! remaining column is renamed to the text feature for single-text models.
//! Reconciliation is best-effort: drop names absent from the input are ignored.

use crate::config::ServiceConfig;
use crate::table::Table;
use tracing::debug;

/// Drops leakage/target columns and normalizes single-text inputs
#[derive(Debug, Clone, Default)]
pub struct ColumnReconciler {
    drop_cols: Vec<String>,
    target_col: Option<String>,
    text_col: Option<String>,
}

impl ColumnReconciler {
    pub fn new(drop_cols: Vec<String>, target_col: Option<String>, text_col: Option<String>) -> Self {
        Self {
            drop_cols,
            target_col,
            text_col,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.drop_cols.clone(),
            config.target_col.clone(),
            config.text_col.clone(),
        )
    }

    /// Columns that would be removed from `table`
    fn drop_set(&self, table: &Table) -> Vec<&str> {
        let mut drop: Vec<&str> = self.drop_cols.iter().map(String::as_str).collect();
        if let Some(target) = self.target_col.as_deref() {
            if table.column_index(target).is_some() {
                drop.push(target);
            }
        }
        drop
    }

    /// Return a reconciled copy of `table`; rows keep their order and count.
    ///
    /// A table left with zero columns is returned as-is; the caller decides
    /// how to report it.
    pub fn reconcile(&self, table: &Table) -> Table {
        let mut reconciled = table.clone();
        let drop = self.drop_set(table);
        let removed = reconciled.drop_columns(&drop);

        if let Some(text_col) = self.text_col.as_deref() {
            if reconciled.num_columns() == 1 && reconciled.columns()[0] != text_col {
                debug!(from = %reconciled.columns()[0], to = %text_col, "Renaming sole column to text feature");
                // Single column, so the new name cannot collide
                let _ = reconciled.rename_column(0, text_col);
            }
        }

        debug!(
            removed = ?removed,
            remaining = reconciled.num_columns(),
            rows = reconciled.num_rows(),
            "Columns reconciled"
        );
        reconciled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(csv: &str) -> Table {
        Table::read_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_drops_configured_and_target_columns() {
        let reconciler = ColumnReconciler::new(vec!["id".into()], Some("y".into()), None);
        let out = reconciler.reconcile(&table("id,x,y\n1,5,0\n2,9,1\n"));

        assert_eq!(out.columns(), &["x"]);
        assert_eq!(out.rows(), &[vec![json!(5)], vec![json!(9)]]);
    }

    #[test]
    fn test_never_returns_drop_or_target_columns() {
        let reconciler = ColumnReconciler::new(
            vec!["id".into(), "ts".into()],
            Some("label".into()),
            None,
        );
        for csv in [
            "id,ts,label,a\n1,2,3,4\n",
            "a,label\n1,0\n",
            "ts,a,b\n1,2,3\n",
            "a,b\n1,2\n",
        ] {
            let out = reconciler.reconcile(&table(csv));
            for forbidden in ["id", "ts", "label"] {
                assert!(out.column_index(forbidden).is_none(), "{} leaked from {:?}", forbidden, csv);
            }
        }
    }

    #[test]
    fn test_unknown_drop_columns_ignored() {
        let reconciler = ColumnReconciler::new(
            vec!["not_there".into()],
            Some("also_missing".into()),
            None,
        );
        let input = table("a,b\n1,2\n");
        let out = reconciler.reconcile(&input);
        assert_eq!(out, input);
    }

    #[test]
    fn test_single_column_renamed_to_text_col() {
        let reconciler = ColumnReconciler::new(vec![], None, Some("review".into()));
        let out = reconciler.reconcile(&table("comment\ngreat film\nboring\n"));

        assert_eq!(out.columns(), &["review"]);
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn test_rename_after_drop() {
        let reconciler = ColumnReconciler::new(vec!["id".into()], Some("sentiment".into()), Some("review".into()));
        let out = reconciler.reconcile(&table("id,body,sentiment\n1,nice,1\n"));
        assert_eq!(out.columns(), &["review"]);
        assert_eq!(out.rows()[0], vec![json!("nice")]);
    }

    #[test]
    fn test_no_rename_when_already_named() {
        let reconciler = ColumnReconciler::new(vec![], None, Some("review".into()));
        let input = table("review\nfine\n");
        assert_eq!(reconciler.reconcile(&input), input);
    }

    #[test]
    fn test_no_rename_with_multiple_columns() {
        let reconciler = ColumnReconciler::new(vec![], None, Some("review".into()));
        let out = reconciler.reconcile(&table("title,body\na,b\n"));
        assert_eq!(out.columns(), &["title", "body"]);
    }

    #[test]
    fn test_zero_columns_is_not_an_error() {
        let reconciler = ColumnReconciler::new(vec!["id".into()], Some("y".into()), Some("review".into()));
        let out = reconciler.reconcile(&table("id,y\n1,0\n2,1\n"));
        assert_eq!(out.num_columns(), 0);
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn test_column_order_preserved() {
        let reconciler = ColumnReconciler::new(vec!["b".into()], None, None);
        let out = reconciler.reconcile(&table("d,b,a,c\n1,2,3,4\n"));
        assert_eq!(out.columns(), &["d", "a", "c"]);
        assert_eq!(out.rows()[0], vec![json!(1), json!(3), json!(4)]);
    }
}
