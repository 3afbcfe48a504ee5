//! Property-based tests for content round-trips and entry-set stability.

use keyfs::{KeyFs, MemoryStore};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    #[test]
    fn write_then_read_returns_written_bytes(
        payload in vec(any::<u8>(), 1..4096),
        offset in 0u64..1024,
    ) {
        let mut fs = KeyFs::mount(MemoryStore::new()).unwrap();
        fs.create_file("/f", 0o644).unwrap();

        let written = fs.write_file("/f", offset, &payload).unwrap();
        prop_assert_eq!(written, payload.len());

        let read_back = fs.read_file("/f", offset, payload.len()).unwrap();
        prop_assert_eq!(read_back, payload.clone());

        // Everything before the write offset reads as zeros.
        let prefix = fs.read_file("/f", 0, offset as usize).unwrap();
        prop_assert!(prefix.iter().all(|&b| b == 0));

        let size = fs.get_attributes("/f").unwrap().size;
        prop_assert_eq!(size, offset + payload.len() as u64);
    }

    #[test]
    fn successive_shrinks_keep_prefix(
        payload in vec(any::<u8>(), 64..512),
        cut in 1usize..64,
    ) {
        let mut fs = KeyFs::mount(MemoryStore::new()).unwrap();
        fs.create_file("/f", 0o644).unwrap();
        fs.write_file("/f", 0, &payload).unwrap();

        let k = payload.len() - cut / 2;
        let j = payload.len() - cut;
        fs.truncate_file("/f", k as u64).unwrap();
        fs.truncate_file("/f", j as u64).unwrap();

        let read_back = fs.read_file("/f", 0, payload.len()).unwrap();
        prop_assert_eq!(read_back, payload[..j].to_vec());
    }

    #[test]
    fn removals_leave_exact_entry_set(
        names in proptest::collection::btree_set("[a-z]{1,12}", 2..12),
        remove_seed in any::<u64>(),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let mut fs = KeyFs::mount(MemoryStore::new()).unwrap();
        for name in &names {
            fs.create_file(&format!("/{}", name), 0o644).unwrap();
        }

        // Remove roughly half the names, picked by the seed; the swap
        // compaction must never disturb the survivors.
        let mut expected: BTreeSet<String> = names.iter().cloned().collect();
        for (i, name) in names.iter().enumerate() {
            if (remove_seed >> (i % 64)) & 1 == 1 {
                fs.unlink_file(&format!("/{}", name)).unwrap();
                expected.remove(name);
            }
        }

        let listed: BTreeSet<String> = fs
            .list_directory("/")
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        prop_assert_eq!(listed, expected);
    }
}
