//! Operation executor
//!
//! Applies [`Operation`]s to a named column of a [`Table`], row by row.

use crate::error::{TransformError, TransformResult};
use crate::models::Table;

use super::operations::Operation;

/// Apply `operation` to every value of `column`, in place.
///
/// Rows are independent; the first failing row aborts the whole operation
/// and the table keeps its previous values.
pub fn apply_in_place(table: &mut Table, column: &str, operation: Operation) -> TransformResult<()> {
    table.try_map_column(column, |row, value| {
        operation
            .apply(value)
            .map_err(|source| TransformError::RowFailed {
                operation: operation.name().to_string(),
                row,
                column: column.to_string(),
                source,
            })
    })
}

/// Apply `operation` to `column` and return the resulting table.
pub fn apply(table: &Table, column: &str, operation: Operation) -> TransformResult<Table> {
    let mut out = table.clone();
    apply_in_place(&mut out, column, operation)?;
    Ok(out)
}

/// Apply a sequence of `(column, operation)` pairs in order.
pub fn apply_all<'a, I>(table: &Table, steps: I) -> TransformResult<Table>
where
    I: IntoIterator<Item = (&'a str, Operation)>,
{
    let mut out = table.clone();
    for (column, operation) in steps {
        apply_in_place(&mut out, column, operation)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::compute_check_digit;
    use crate::error::ChecksumError;
    use proptest::prelude::*;

    fn table(rows: &[(&str, &str)]) -> Table {
        Table::new(
            vec!["ID".to_string(), "Phone".to_string()],
            rows.iter()
                .map(|(a, b)| vec![a.to_string(), b.to_string()])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_apply_to_every_row() {
        let t = table(&[("1", "9161234567"), ("2", "9167654321")]);
        let out = apply(&t, "Phone", Operation::PrefixPlusSeven).unwrap();

        assert_eq!(
            out.column_values("Phone").unwrap(),
            vec!["+79161234567", "+79167654321"]
        );
        // Other column untouched
        assert_eq!(out.column_values("ID").unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn test_shape_is_preserved() {
        let t = table(&[("a-1", "x"), ("", "y"), ("b2", "")]);
        for op in [
            Operation::PrefixPlusSeven,
            Operation::TrimLeftOne,
            Operation::TrimRightOne,
            Operation::StripNonDigits,
        ] {
            let out = apply(&t, "ID", op).unwrap();
            assert_eq!(out.len(), t.len());
            assert_eq!(out.columns(), t.columns());
        }
    }

    /// Tables of random shape whose cells all contain at least one digit.
    fn table_strategy() -> impl Strategy<Value = Table> {
        (1usize..6, 0usize..12).prop_flat_map(|(width, height)| {
            proptest::collection::vec(
                proptest::collection::vec("[a-z +-]{0,4}[0-9][0-9a-z -]{0,8}", width),
                height,
            )
            .prop_map(move |rows| {
                let columns = (0..width).map(|i| format!("col{}", i)).collect();
                Table::new(columns, rows).unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_every_operation_keeps_shape(t in table_strategy(), pick in any::<prop::sample::Index>()) {
            let column = t.columns()[pick.index(t.columns().len())].clone();
            for op in Operation::ALL {
                let out = apply(&t, &column, op).unwrap();
                prop_assert_eq!(out.len(), t.len());
                prop_assert_eq!(out.columns(), t.columns());
            }
        }
    }

    #[test]
    fn test_unknown_column() {
        let t = table(&[("1", "2")]);
        assert_eq!(
            apply(&t, "ICCID", Operation::StripNonDigits).unwrap_err(),
            TransformError::UnknownColumn("ICCID".into())
        );
    }

    #[test]
    fn test_failure_names_row_and_keeps_table() {
        let mut t = table(&[("123", "a"), ("n/a", "b"), ("456", "c")]);
        let before = t.clone();

        let err = apply_in_place(&mut t, "ID", Operation::AppendCheckDigit).unwrap_err();
        assert_eq!(
            err,
            TransformError::RowFailed {
                operation: "append-check-digit".into(),
                row: 1,
                column: "ID".into(),
                source: ChecksumError::Empty,
            }
        );
        assert_eq!(t, before);
    }

    #[test]
    fn test_strip_then_append_end_to_end() {
        let t = table(&[("89161234567", "")]);
        let out = apply_all(
            &t,
            [
                ("ID", Operation::StripNonDigits),
                ("ID", Operation::AppendCheckDigit),
            ],
        )
        .unwrap();

        let expected = format!("89161234567{}", compute_check_digit("89161234567").unwrap());
        assert_eq!(out.column_values("ID").unwrap(), vec![expected.as_str()]);
    }

    #[test]
    fn test_empty_table() {
        let t = table(&[]);
        let out = apply(&t, "ID", Operation::AppendCheckDigit).unwrap();
        assert!(out.is_empty());
    }
}
