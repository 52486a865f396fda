use opchild::header::{verify_app_hash, BlockId, Header, PartSetHeader, Version};
use opchild::merkle::{hash_from_byte_slices, MerkleProof};
use opchild::types::Timestamp;
use proptest::prelude::*;

fn bytes(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max)
}

prop_compose! {
    fn arb_header()(
        block in any::<u64>(),
        chain_id in "[a-z0-9-]{0,20}",
        height in any::<i64>(),
        seconds in any::<i64>(),
        nanos in 0u32..1_000_000_000,
        last_block_hash in bytes(32),
        total in any::<u32>(),
        part_hash in bytes(32),
        hashes in prop::collection::vec(bytes(32), 8),
        proposer_address in bytes(20),
    ) -> Header {
        Header {
            version: Version { block, app: 0 },
            chain_id,
            height,
            time: Timestamp { seconds, nanos },
            last_block_id: BlockId {
                hash: last_block_hash,
                part_set_header: PartSetHeader { total, hash: part_hash },
            },
            last_commit_hash: hashes[0].clone(),
            data_hash: hashes[1].clone(),
            validators_hash: hashes[2].clone(),
            next_validators_hash: hashes[3].clone(),
            consensus_hash: hashes[4].clone(),
            app_hash: hashes[5].clone(),
            last_results_hash: hashes[6].clone(),
            evidence_hash: hashes[7].clone(),
            proposer_address,
        }
    }
}

proptest! {
    #[test]
    fn app_hash_proof_verifies_against_header_hash(header in arb_header()) {
        let proof = header.app_hash_proof();
        prop_assert!(verify_app_hash(&header.hash(), &header.app_hash, &proof).is_ok());
    }

    #[test]
    fn app_hash_proof_binds_the_app_hash(header in arb_header(), other in bytes(32)) {
        prop_assume!(other != header.app_hash);
        let proof = header.app_hash_proof();
        prop_assert!(verify_app_hash(&header.hash(), &other, &proof).is_err());
    }

    #[test]
    fn merkle_proofs_verify_every_leaf(
        items in prop::collection::vec(bytes(16), 1..40),
        index in any::<prop::sample::Index>(),
    ) {
        let index = index.index(items.len());
        let root = hash_from_byte_slices(&items);
        let proof = MerkleProof::new(&items, index).unwrap();
        prop_assert_eq!(proof.compute_root_hash(), Some(root));
        prop_assert!(proof.verify(&root, &items[index]).is_ok());
    }
}

#[test]
fn proofs_for_other_leaves_are_refused() {
    let header = Header {
        chain_id: "opchild-1".to_owned(),
        height: 7,
        app_hash: vec![0xAA; 32],
        ..Default::default()
    };
    let leaves = header.leaves();
    let wrong_index = MerkleProof::new(&leaves, 9).unwrap();
    assert!(verify_app_hash(&header.hash(), &header.app_hash, &wrong_index).is_err());
}
