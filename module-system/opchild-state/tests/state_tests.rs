use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opchild_state::*;
use proptest::prelude::*;

enum Operation {
    Merge,
    Finalize,
}

impl Operation {
    fn execute<S: Storage>(&self, working_set: WorkingSet<S>) -> StateCheckpoint<S> {
        match self {
            Operation::Merge => working_set.checkpoint(),
            Operation::Finalize => {
                let storage = working_set.backing().clone();
                working_set
                    .checkpoint()
                    .commit()
                    .expect("commit to temporary storage succeeds");
                StateCheckpoint::new(storage)
            }
        }
    }
}

struct StorageOperation {
    operations: Vec<Operation>,
}

impl StorageOperation {
    fn execute<S: Storage>(&self, mut working_set: WorkingSet<S>) -> WorkingSet<S> {
        for op in self.operations.iter() {
            working_set = op.execute(working_set).to_revertable()
        }
        working_set
    }
}

fn create_storage_operations() -> Vec<(StorageOperation, StorageOperation)> {
    // Test cases for various interweavings of storage operations.
    vec![
        (
            StorageOperation { operations: vec![] },
            StorageOperation { operations: vec![] },
        ),
        (
            StorageOperation {
                operations: vec![Operation::Merge],
            },
            StorageOperation { operations: vec![] },
        ),
        (
            StorageOperation {
                operations: vec![Operation::Merge, Operation::Finalize],
            },
            StorageOperation { operations: vec![] },
        ),
        (
            StorageOperation {
                operations: vec![Operation::Merge],
            },
            StorageOperation {
                operations: vec![Operation::Finalize],
            },
        ),
        (
            StorageOperation { operations: vec![] },
            StorageOperation {
                operations: vec![Operation::Merge, Operation::Finalize],
            },
        ),
    ]
}

fn create_state_map_and_storage(key: u64, value: u64) -> (StateMap<u64, u64>, WorkingSet<ProverStorage>) {
    let mut working_set = WorkingSet::new(ProverStorage::temporary());

    let state_map = StateMap::new(Prefix::new(vec![0]));
    state_map.set(&key, &value, &mut working_set);
    (state_map, working_set)
}

#[test]
fn test_state_map_with_remove() {
    for (before_remove, after_remove) in create_storage_operations() {
        let key = 1;
        let value = 11;
        let (state_map, mut working_set) = create_state_map_and_storage(key, value);

        working_set = before_remove.execute(working_set);
        assert_eq!(state_map.remove(&key, &mut working_set).unwrap(), value);

        working_set = after_remove.execute(working_set);
        assert!(state_map.get(&key, &working_set).is_none());
    }
}

#[test]
fn test_state_map_with_delete() {
    for (before_delete, after_delete) in create_storage_operations() {
        let key = 1;
        let value = 11;
        let (state_map, mut working_set) = create_state_map_and_storage(key, value);

        working_set = before_delete.execute(working_set);
        state_map.delete(&key, &mut working_set);

        working_set = after_delete.execute(working_set);
        assert!(state_map.get(&key, &working_set).is_none());
    }
}

fn create_state_value_and_storage(value: u64) -> (StateValue<u64>, WorkingSet<ProverStorage>) {
    let mut working_set = WorkingSet::new(ProverStorage::temporary());

    let state_value = StateValue::new(Prefix::new(vec![0]));
    state_value.set(&value, &mut working_set);
    (state_value, working_set)
}

#[test]
fn test_state_value_with_remove() {
    for (before_remove, after_remove) in create_storage_operations() {
        let value = 11;
        let (state_value, mut working_set) = create_state_value_and_storage(value);

        working_set = before_remove.execute(working_set);
        assert_eq!(state_value.remove(&mut working_set).unwrap(), value);

        working_set = after_remove.execute(working_set);
        assert!(state_value.get(&working_set).is_none());
    }
}

#[test]
fn test_state_value_with_delete() {
    for (before_delete, after_delete) in create_storage_operations() {
        let value = 11;
        let (state_value, mut working_set) = create_state_value_and_storage(value);

        working_set = before_delete.execute(working_set);
        state_value.delete(&mut working_set);

        working_set = after_delete.execute(working_set);
        assert!(state_value.get(&working_set).is_none());
    }
}

#[test]
fn test_map_iteration_follows_key_order_across_commits() {
    let storage = ProverStorage::temporary();
    let state_map = StateMap::<u64, String>::new(Prefix::new(vec![1]));
    let other_map = StateMap::<u64, String>::new(Prefix::new(vec![2]));

    let mut working_set = WorkingSet::new(storage.clone());
    for key in [300u64, 2, 70_000] {
        state_map.set(&key, &key.to_string(), &mut working_set);
    }
    other_map.set(&1, &"other".to_owned(), &mut working_set);
    working_set.checkpoint().commit().unwrap();

    // Pending writes overlay the committed ones.
    let mut working_set = WorkingSet::new(storage);
    state_map.set(&5, &"5".to_owned(), &mut working_set);
    state_map.delete(&300, &mut working_set);

    assert_eq!(state_map.keys(&working_set).unwrap(), vec![2, 5, 70_000]);
    assert_eq!(other_map.keys(&working_set).unwrap(), vec![1]);

    state_map.clear(&mut working_set);
    assert!(state_map.iter(&working_set).unwrap().is_empty());
    assert_eq!(other_map.get(&1, &working_set), Some("other".to_owned()));
}

#[test]
fn test_branches_nest_and_unwind() {
    let state_value = StateValue::<u64>::new(Prefix::new(vec![0]));
    let mut working_set = WorkingSet::new(ProverStorage::temporary());
    state_value.set(&1, &mut working_set);

    working_set.branch();
    state_value.set(&2, &mut working_set);
    working_set.emit_event(Event::new("outer"));

    let inner: Result<(), &str> = working_set.with_branch(|working_set| {
        state_value.set(&3, working_set);
        working_set.emit_event(Event::new("inner"));
        Err("rejected")
    });
    assert!(inner.is_err());
    assert_eq!(state_value.get(&working_set), Some(2));
    assert_eq!(working_set.events().len(), 1);

    working_set.discard_branch().unwrap();
    assert_eq!(state_value.get(&working_set), Some(1));
    assert!(working_set.events().is_empty());
    assert_eq!(working_set.branch_depth(), 0);
    assert!(matches!(
        working_set.discard_branch(),
        Err(StateError::NoOpenBranch)
    ));
}

#[test]
fn test_proof_of_committed_value() {
    let storage = ProverStorage::temporary();
    let state_map = StateMap::<u64, u64>::new(Prefix::new(vec![7]));

    let mut working_set = WorkingSet::new(storage.clone());
    state_map.set(&1, &11, &mut working_set);
    let root = working_set.checkpoint().commit().unwrap();

    let proof = storage.get_with_proof(state_map.storage_key(&1)).unwrap();
    let (key, value) = ProverStorage::open_proof(root, proof).unwrap();
    assert_eq!(key, state_map.storage_key(&1));
    assert!(value.is_some());

    let absent = storage.get_with_proof(state_map.storage_key(&2)).unwrap();
    let (_, value) = ProverStorage::open_proof(root, absent).unwrap();
    assert!(value.is_none());
}

#[test]
fn test_gas_is_shared_across_branches() {
    let mut working_set = WorkingSet::new(ProverStorage::temporary());
    working_set.replace_gas_meter(GasMeter::new(100));

    let result: Result<(), StateError> = working_set.with_branch(|working_set| {
        working_set.charge_gas(60, "first")?;
        working_set.charge_gas(60, "second")
    });
    assert!(result.is_err());
    // Gas spent inside a dropped branch stays spent.
    assert!(working_set.gas_meter().consumed() >= 100);
}

/// Counts how many committed entries a reader pulls out of the storage.
#[derive(Clone)]
struct CountingStorage {
    inner: ProverStorage,
    reads: Arc<AtomicUsize>,
}

impl CountingStorage {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Storage for CountingStorage {
    type Proof = <ProverStorage as Storage>::Proof;
    type Root = <ProverStorage as Storage>::Root;

    fn get(&self, key: &StorageKey) -> Option<StorageValue> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Vec<(StorageKey, StorageValue)> {
        let entries = self.inner.iter_prefix(prefix);
        self.reads.fetch_add(entries.len(), Ordering::SeqCst);
        entries
    }

    fn seek_prefix(&self, prefix: &[u8], from: &[u8]) -> Option<(StorageKey, StorageValue)> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.seek_prefix(prefix, from)
    }

    fn commit(&self, writes: OrderedWrites) -> anyhow::Result<Self::Root> {
        self.inner.commit(writes)
    }

    fn root(&self) -> anyhow::Result<Self::Root> {
        self.inner.root()
    }

    fn version(&self) -> u64 {
        self.inner.version()
    }

    fn get_with_proof(&self, key: StorageKey) -> anyhow::Result<StorageProof<Self::Proof>> {
        self.inner.get_with_proof(key)
    }

    fn open_proof(
        root: Self::Root,
        proof: StorageProof<Self::Proof>,
    ) -> anyhow::Result<(StorageKey, Option<StorageValue>)> {
        ProverStorage::open_proof(root, proof)
    }
}

#[test]
fn test_lazy_entries_read_only_what_is_consumed() {
    let storage = CountingStorage {
        inner: ProverStorage::temporary(),
        reads: Arc::new(AtomicUsize::new(0)),
    };
    let state_map = StateMap::<u64, u64>::new(Prefix::new(vec![4]));

    let mut working_set = WorkingSet::new(storage.clone());
    for key in 0..1_000u64 {
        state_map.set(&key, &key, &mut working_set);
    }
    working_set.checkpoint().commit().unwrap();

    let mut working_set = WorkingSet::new(storage.clone());
    state_map.delete(&0, &mut working_set);
    state_map.delete(&1, &mut working_set);
    state_map.set(&1_500, &1_500, &mut working_set);

    let before = storage.reads();
    let first: Vec<(u64, u64)> = state_map
        .entries(&working_set)
        .take(3)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(first, vec![(2, 2), (3, 3), (4, 4)]);
    assert!(storage.reads() - before < 20);

    // A full walk agrees with the eager iteration.
    let all: Vec<(u64, u64)> = state_map
        .entries(&working_set)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(all, state_map.iter(&working_set).unwrap());
    assert_eq!(all.len(), 999);
    assert_eq!(all.last(), Some(&(1_500, 1_500)));
}

#[derive(Debug, Clone)]
enum MapOp {
    Set(u64, u64),
    Delete(u64),
    Commit,
}

fn arb_map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        4 => (0u64..32, any::<u64>()).prop_map(|(k, v)| MapOp::Set(k, v)),
        2 => (0u64..32).prop_map(MapOp::Delete),
        1 => Just(MapOp::Commit),
    ]
}

proptest! {
    #[test]
    fn map_matches_an_ordered_model(ops in prop::collection::vec(arb_map_op(), 0..64)) {
        let storage = ProverStorage::temporary();
        let state_map = StateMap::<u64, u64>::new(Prefix::new(vec![3]));
        let mut model = BTreeMap::new();

        let mut working_set = WorkingSet::new(storage.clone());
        for op in ops {
            match op {
                MapOp::Set(key, value) => {
                    state_map.set(&key, &value, &mut working_set);
                    model.insert(key, value);
                }
                MapOp::Delete(key) => {
                    state_map.delete(&key, &mut working_set);
                    model.remove(&key);
                }
                MapOp::Commit => {
                    working_set.checkpoint().commit().unwrap();
                    working_set = WorkingSet::new(storage.clone());
                }
            }
        }

        let expected: Vec<(u64, u64)> = model.into_iter().collect();
        let lazy: Vec<(u64, u64)> = state_map.entries(&working_set).collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(state_map.iter(&working_set).unwrap(), expected.clone());
        prop_assert_eq!(lazy, expected);
    }
}
