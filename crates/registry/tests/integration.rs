use std::time::Duration;
use vain_registry::*;

fn path(raw: &str) -> PackagePath {
    PackagePath::parse(raw).unwrap()
}

fn pkg(raw: &str) -> Package {
    Package::new(Vcs::Git, format!("https://git.example.org/{raw}"), raw).unwrap()
}

#[test]
fn test_publish_scenario() {
    let registry = Registry::in_memory();

    let t1 = registry.register_user("a@example.com").unwrap();
    registry.authorize_namespace("a", &t1).unwrap();

    registry.add_package(pkg("a/foo")).unwrap();
    assert_eq!(registry.add_package(pkg("a/foo/bar")).unwrap_err().kind(), ErrorKind::Conflict);
    assert_eq!(registry.add_package(pkg("a")).unwrap_err().kind(), ErrorKind::Conflict);

    let listed: Vec<String> =
        registry.list_packages().iter().map(|p| p.path().to_string()).collect();
    assert_eq!(listed, ["a/foo"]);
}

#[test]
fn test_add_get_remove() {
    let registry = Registry::in_memory();
    let added = pkg("a/b");
    registry.add_package(added.clone()).unwrap();

    assert_eq!(registry.get_package(&path("a/b")).unwrap(), added);
    assert_eq!(registry.get_package(&path("a/b/c/d")).unwrap(), added);
    assert!(registry.package_exists(&path("a/b")));
    assert!(!registry.package_exists(&path("a/b/c")));

    assert_eq!(registry.remove_package(&path("a/b")).unwrap(), added);
    assert_eq!(registry.get_package(&path("a/b")).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(registry.remove_package(&path("a/b")).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_list_is_sorted_by_path() {
    let registry = Registry::in_memory();
    for raw in ["z/last", "a/first", "m/middle"] {
        registry.add_package(pkg(raw)).unwrap();
    }
    let listed: Vec<String> =
        registry.list_packages().iter().map(|p| p.path().to_string()).collect();
    assert_eq!(listed, ["a/first", "m/middle", "z/last"]);
}

#[test]
fn test_hosted_packages_are_owned_by_route_namespace() {
    let registry = Registry::in_memory();
    let sm = registry.register_user("sm@example.org").unwrap();
    let dm = registry.register_user("dm@example.org").unwrap();

    let vain = Package::hosted(Vcs::Git, "https://x/sm/vain", "example.org", "/sm/vain").unwrap();
    registry.publish(&sm, vain).unwrap();

    let other = Package::hosted(Vcs::Git, "https://x/dm/vain", "example.org", "/dm/vain").unwrap();
    registry.publish(&dm, other).unwrap();

    let squat = Package::hosted(Vcs::Git, "https://x/dm/sm", "example.org", "/sm/other").unwrap();
    assert_eq!(registry.publish(&dm, squat).unwrap_err().kind(), ErrorKind::Unauthorized);

    assert_eq!(registry.namespaces_owned_by(&sm).unwrap(), ["sm"]);
    assert_eq!(registry.namespaces_owned_by(&dm).unwrap(), ["dm"]);
}

#[test]
fn test_superseded_tokens_fail_authorization() {
    let registry = Registry::in_memory();
    let first = registry.register_user("a@example.com").unwrap();
    registry.authorize_namespace("a", &first).unwrap();

    let second = registry.confirm_token(&first).unwrap();
    assert!(registry.user("a@example.com").unwrap().registered);
    assert_eq!(registry.authorize_namespace("a", &first).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(registry.authorize_namespace("a", &second).unwrap(), Grant::Existing);

    let third = registry.request_token_reset("a@example.com", Duration::from_secs(60)).unwrap();
    assert_eq!(registry.authorize_namespace("a", &second).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(registry.authorize_namespace("a", &third).unwrap(), Grant::Existing);
}

#[test]
fn test_token_reset_rate_limit() {
    let registry = Registry::in_memory();
    let window = Duration::from_millis(300);
    let original = registry.register_user("a@example.com").unwrap();

    let first = registry.request_token_reset("a@example.com", window).unwrap();
    assert_ne!(first, original);

    let err = registry.request_token_reset("a@example.com", window).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    let wait = err.retry_after().unwrap();
    assert!(wait > Duration::ZERO && wait <= window, "{wait:?}");
    assert!(err.to_string().contains("try again in"), "{err}");

    std::thread::sleep(window + Duration::from_millis(50));
    let second = registry.request_token_reset("a@example.com", window).unwrap();
    assert_ne!(second, first);

    let unknown = registry.request_token_reset("b@example.com", window).unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::NotFound);
}

#[test]
fn test_duplicate_registration() {
    let registry = Registry::in_memory();
    registry.register_user("a@example.com").unwrap();
    assert_eq!(registry.register_user("a@example.com").unwrap_err().kind(), ErrorKind::Conflict);
    assert_eq!(registry.register_user("not-an-email").unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn test_publish_keeps_binding_when_add_conflicts() {
    let registry = Registry::in_memory();
    let owner = registry.register_user("a@example.com").unwrap();
    registry.add_package(pkg("b/x")).unwrap();

    let err = registry.publish(&owner, pkg("b/x/y")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(registry.namespaces_owned_by(&owner).unwrap(), ["b"]);
}
