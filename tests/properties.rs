use proptest::prelude::*;
use serde_json::{Value as Json, json};
use vizmap::{
    Accessor, Axis, AxisResolver, ProcessorConfig, SortDirection, Value, process,
};

fn cell() -> impl Strategy<Value = Json> {
    prop_oneof![
        Just(Json::Null),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(Json::String),
        "[ ]{0,2}[0-9]{1,4}[ ]{0,2}".prop_map(Json::String),
        any::<bool>().prop_map(Json::Bool),
    ]
}

fn row() -> impl Strategy<Value = Json> {
    prop_oneof![
        4 => (cell(), cell(), cell()).prop_map(|(a, b, c)| json!({"a": a, "b": b, "c": c})),
        1 => Just(Json::Null),
        1 => cell(),
    ]
}

fn indices(result: &vizmap::ProcessorResult<'_>) -> Vec<usize> {
    result.data.iter().map(|p| p.index).collect()
}

proptest! {
    #[test]
    fn counts_always_balance(
        rows in prop::collection::vec(row(), 0..40),
        remove_invalid in any::<bool>(),
        remove_nulls in any::<bool>(),
        offset in 0usize..10,
        limit in prop::option::of(0usize..10),
    ) {
        let mut builder = ProcessorConfig::builder()
            .remove_invalid(remove_invalid)
            .remove_nulls(remove_nulls)
            .offset(offset);
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        let result = process(&rows, &builder.build());
        let stats = &result.statistics;
        prop_assert!(result.errors.is_empty());
        prop_assert!(stats.valid <= stats.total);
        prop_assert_eq!(stats.valid + stats.invalid, stats.total);
        prop_assert_eq!(stats.valid, result.data.len());
        prop_assert_eq!(stats.nulls, rows.iter().filter(|r| r.is_null()).count());
    }

    #[test]
    fn explicit_mapping_wins_whatever_the_other_sources_say(
        explicit in "[a-z]{1,8}",
        key in "[a-z]{1,8}",
        axis_idx in 0usize..6,
        auto_detect in any::<bool>(),
    ) {
        let axis = Axis::ALL[axis_idx];
        let rows = vec![json!({"a": 1, "b": "x", "c": "2024-01-01"})];
        let config = ProcessorConfig::builder()
            .map_field(axis, explicit.clone())
            .accessor(axis, Accessor::new(|_| Ok(json!(0))))
            .key(axis, key)
            .auto_detect(auto_detect)
            .build();
        let result = process(&rows, &config);
        prop_assert_eq!(result.mapping.resolver(axis), &AxisResolver::Field(explicit));
    }

    #[test]
    fn accessors_win_over_keys(key in "[a-z]{1,8}") {
        let rows = vec![json!({"a": 1})];
        let config = ProcessorConfig::builder()
            .accessor(Axis::Y, Accessor::new(|_| Ok(json!(42))))
            .key(Axis::Y, key)
            .build();
        let result = process(&rows, &config);
        prop_assert!(matches!(result.mapping.resolver(Axis::Y), AxisResolver::Accessor(_)));
        prop_assert_eq!(result.data[0].y.clone(), Some(Value::Number(42.0)));
    }

    #[test]
    fn same_input_same_output(rows in prop::collection::vec(row(), 0..25)) {
        let config = ProcessorConfig::builder().sort("y", SortDirection::Desc).build();
        let first = process(&rows, &config);
        let second = process(&rows, &config);
        prop_assert_eq!(&first.data, &second.data);
        prop_assert_eq!(&first.mapping, &second.mapping);
        prop_assert_eq!(&first.statistics, &second.statistics);
    }

    #[test]
    fn missing_sort_keys_stay_last(
        ys in prop::collection::vec(prop::option::of(-1000i32..1000), 0..30),
        descending in any::<bool>(),
    ) {
        let rows = ys
            .iter()
            .map(|y| json!({ "y": y }))
            .collect::<Vec<_>>();
        let direction = if descending { SortDirection::Desc } else { SortDirection::Asc };
        let config = ProcessorConfig::builder()
            .key(Axis::Y, "y")
            .auto_detect(false)
            .remove_invalid(false)
            .sort("y", direction)
            .build();
        let result = process(&rows, &config);
        prop_assert_eq!(result.data.len(), rows.len());

        let sorted = result
            .data
            .iter()
            .map(|p| p.y.as_ref().and_then(Value::as_number))
            .collect::<Vec<_>>();
        let present = sorted.iter().take_while(|y| y.is_some()).count();
        prop_assert!(sorted[present..].iter().all(Option::is_none));
        for pair in sorted[..present].windows(2) {
            if descending {
                prop_assert!(pair[0] >= pair[1]);
            } else {
                prop_assert!(pair[0] <= pair[1]);
            }
        }

        // Equal keys keep their input order.
        let idx = indices(&result);
        for pair in idx.windows(2).zip(sorted.windows(2)) {
            let (positions, keys) = pair;
            if keys[0] == keys[1] {
                prop_assert!(positions[0] < positions[1]);
            }
        }
    }
}
