//! Evaluation order properties over generated column graphs

use calcol::prelude::*;
use proptest::prelude::*;

/// Column `i` may only read columns `0..i`, so every generated graph is acyclic.
/// Columns are then defined in a shuffled order so creation order and
/// dependency order disagree.
fn acyclic_columns() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (2usize..12)
        .prop_flat_map(|n| {
            let refs = (0..n)
                .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i.min(3)))
                .collect::<Vec<_>>();
            (refs, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        })
}

fn name(i: usize) -> String {
    format!("C{i}")
}

fn formula(refs: &[usize]) -> String {
    if refs.is_empty() {
        return r#"field("Base") + 1"#.to_string();
    }
    refs.iter()
        .map(|r| format!("field(\"{}\")", name(*r)))
        .collect::<Vec<_>>()
        .join(" + ")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_column_follows_its_precedents((refs, creation) in acyclic_columns()) {
        let mut registry = ColumnRegistry::new();
        for &i in &creation {
            registry.define_calculated(&name(i), &formula(&refs[i])).unwrap();
        }

        let order = registry.full_evaluation_order();
        prop_assert_eq!(order.len(), refs.len());

        let position = |column: &str| order.iter().position(|c| c == column);
        for (i, precedents) in refs.iter().enumerate() {
            let me = position(name(i).as_str()).unwrap();
            for p in precedents {
                prop_assert!(position(name(*p).as_str()).unwrap() < me);
            }
        }
    }

    #[test]
    fn order_is_deterministic((refs, creation) in acyclic_columns()) {
        let build = || {
            let mut registry = ColumnRegistry::new();
            for &i in &creation {
                registry.define_calculated(&name(i), &formula(&refs[i])).unwrap();
            }
            registry
        };

        prop_assert_eq!(
            build().resolve_evaluation_order(["Base"]),
            build().resolve_evaluation_order(["Base"])
        );
    }

    #[test]
    fn recompute_matches_full_recompute((refs, creation) in acyclic_columns(), base in -1000i32..1000) {
        let mut registry = ColumnRegistry::new();
        for &i in &creation {
            registry.define_calculated(&name(i), &formula(&refs[i])).unwrap();
        }

        let before = RowContext::new().with("Base", 0.0);
        let mut row = before.clone();
        row.extend(recompute_all(&before, &registry));

        row.set("Base", f64::from(base));
        let mut incremental = row.clone();
        incremental.extend(recompute(&row, &["Base"], &registry));

        let mut full = row.clone();
        full.extend(recompute_all(&row, &registry));

        prop_assert_eq!(incremental, full);
    }
}
