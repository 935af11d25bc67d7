//! Property tests for recipient partitioning

use multisend::partition;
use proptest::prelude::*;

proptest! {
    #[test]
    fn batches_never_exceed_size_and_preserve_order(
        recipients in prop::collection::vec("[1-9A-HJ-NP-Za-km-z]{32,44}", 0..120),
        batch_size in 1usize..25,
    ) {
        let batches = partition(&recipients, batch_size);

        for (i, batch) in batches.iter().enumerate() {
            prop_assert_eq!(batch.index, i);
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.len() <= batch_size);
            // Only the last batch may be short
            if i + 1 < batches.len() {
                prop_assert_eq!(batch.len(), batch_size);
            }
        }

        let flattened: Vec<String> = batches.into_iter().flat_map(|b| b.recipients).collect();
        prop_assert_eq!(flattened, recipients);
    }

    #[test]
    fn batch_count_is_ceiling(len in 0usize..200, batch_size in 1usize..25) {
        let recipients: Vec<String> = (0..len).map(|i| i.to_string()).collect();
        let expected = len.div_ceil(batch_size);
        prop_assert_eq!(partition(&recipients, batch_size).len(), expected);
    }
}

#[test]
fn twenty_recipients_by_nine() {
    let recipients: Vec<String> = (0..20).map(|i| format!("r{}", i)).collect();
    let sizes: Vec<usize> = partition(&recipients, 9).iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![9, 9, 2]);
}
