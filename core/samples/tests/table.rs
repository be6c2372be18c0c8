use proptest::prelude::*;
use samples::{dedupe_and_sort, parse_sample_log, DedupKey, Sample, SampleLogWriter};

fn arb_samples() -> impl Strategy<Value = Vec<Sample>> {
    prop::collection::vec(
        (0u64..16, 0u64..4, 1u64..8, 30u64..40).prop_map(|(l, r, i, c)| Sample::new(l, r, i, c)),
        0..80,
    )
}

proptest! {
    #[test]
    fn table_is_sorted_without_adjacent_duplicates(raw in arb_samples()) {
        for key in [DedupKey::Operands, DedupKey::CycleCount] {
            let table = dedupe_and_sort(raw.clone(), key);
            let table = table.as_slice();

            for pair in table.windows(2) {
                prop_assert!(pair[0].table_order(&pair[1]).is_lt());
                match key {
                    DedupKey::Operands => prop_assert!(
                        (pair[0].left_operand, pair[0].right_operand)
                            != (pair[1].left_operand, pair[1].right_operand)
                    ),
                    DedupKey::CycleCount => prop_assert!(pair[0].cycle_count < pair[1].cycle_count),
                }
            }

            // every kept sample came from the input
            for sample in table {
                prop_assert!(raw.contains(sample));
            }
            prop_assert_eq!(table.is_empty(), raw.is_empty());
        }
    }

    #[test]
    fn sample_log_survives_a_write(raw in arb_samples()) {
        let mut writer = SampleLogWriter::from_writer(Vec::new());
        for sample in &raw {
            writer.append(sample).unwrap();
        }
        let bytes = writer.into_inner().unwrap();

        prop_assert_eq!(parse_sample_log(bytes.as_slice()).unwrap(), raw);
    }
}
