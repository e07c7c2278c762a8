use proptest::prelude::*;
use vain_registry::{CredentialStore, ErrorKind, NamespaceTable, Package, PackagePath, PathRegistry, Snapshot, Vcs};

/// Component-wise prefix test, written the obvious way.
fn naive_overlap(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.split('/').collect();
    let b: Vec<&str> = b.split('/').collect();
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

fn raw_path() -> impl Strategy<Value = String> {
    let segment = proptest::sample::select(vec!["a", "b", "ab", "a-b", "c"]);
    proptest::collection::vec(segment, 1..5).prop_map(|s| s.join("/"))
}

proptest! {
    #[test]
    fn test_overlap_matches_naive_reference(a in raw_path(), b in raw_path()) {
        let pa = PackagePath::parse(&a).unwrap();
        let pb = PackagePath::parse(&b).unwrap();
        prop_assert_eq!(pa.overlaps(&pb), naive_overlap(&a, &b));
        prop_assert_eq!(pb.overlaps(&pa), pa.overlaps(&pb));
    }

    #[test]
    fn test_registry_never_holds_overlaps(paths in proptest::collection::vec(raw_path(), 1..24)) {
        let mut registry = PathRegistry::default();
        let mut accepted: Vec<String> = Vec::new();

        for raw in &paths {
            let pkg = Package::new(Vcs::Git, "https://x", raw).unwrap();
            let expect_ok = accepted.iter().all(|kept| !naive_overlap(kept, raw));
            prop_assert_eq!(registry.add(pkg).is_ok(), expect_ok, "adding {}", raw);
            if expect_ok {
                accepted.push(raw.clone());
            }
        }

        let snapshot = Snapshot::new(registry, CredentialStore::default(), NamespaceTable::default());
        prop_assert!(snapshot.check_invariants().is_ok());
    }

    #[test]
    fn test_lookup_returns_the_covering_package(paths in proptest::collection::vec(raw_path(), 1..16), query in raw_path()) {
        let mut registry = PathRegistry::default();
        for raw in &paths {
            let _ = registry.add(Package::new(Vcs::Git, "https://x", raw).unwrap());
        }

        let query_path = PackagePath::parse(&query).unwrap();
        let covering = registry.iter().find(|p| {
            let key = p.path().as_str();
            query == key || query.starts_with(&format!("{key}/"))
        });
        match registry.get(&query_path) {
            Ok(found) => prop_assert_eq!(Some(found), covering),
            Err(err) => {
                prop_assert_eq!(err.kind(), ErrorKind::NotFound);
                prop_assert!(covering.is_none());
            }
        }
    }
}
