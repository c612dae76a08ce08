//! Unit tests for the disk cache

use super::*;
use serde_json::json;
use tempfile::TempDir;

const HOUR: Duration = Duration::from_secs(3600);

fn create_cache() -> (TempDir, DiskCache) {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap();
    let cache = DiskCache::new(root, DEFAULT_MAX_SIZE_MB).unwrap();
    (dir, cache)
}

fn set_mtime(cache: &DiskCache, key: &str, age: Duration) {
    let file = File::options().write(true).open(cache.entry_path(key)).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[test]
fn test_cache_entry_creation() {
    let entry = CacheEntry::new("package:django:latest", json!({"a": 1}), HOUR).unwrap();

    assert_eq!(entry.key, "package:django:latest");
    assert_eq!(entry.expires_at - entry.stored_at, chrono::Duration::seconds(3600));
    assert!(entry.is_fresh());
    assert!(entry.age() < Duration::from_secs(5));
}

#[test]
fn test_zero_ttl_is_immediately_stale() {
    let entry = CacheEntry::new("k", json!(null), Duration::ZERO).unwrap();
    assert!(!entry.is_fresh());
}

#[test]
fn test_set_and_get() {
    let (_dir, cache) = create_cache();
    let value = json!({"info": {"name": "django", "version": "3.2.0"}});

    cache.set("package:django:3.2.0", value.clone(), HOUR).unwrap();

    assert_eq!(cache.get("package:django:3.2.0"), Some(value));
    assert_eq!(cache.get("package:django:latest"), None);
}

#[test]
fn test_overwrite_replaces_value() {
    let (_dir, cache) = create_cache();

    cache.set("key", json!(1), HOUR).unwrap();
    cache.set("key", json!(2), HOUR).unwrap();

    assert_eq!(cache.get("key"), Some(json!(2)));
    assert_eq!(cache.stats().unwrap().total_entries, 1);
}

#[test]
fn test_expired_entry_is_removed_on_read() {
    let (_dir, cache) = create_cache();

    cache.set("stale", json!("old"), Duration::ZERO).unwrap();
    assert!(cache.entry_path("stale").exists());

    assert_eq!(cache.get("stale"), None);
    assert!(!cache.entry_path("stale").exists());
}

#[test]
fn test_corrupt_entry_is_removed() {
    let (_dir, cache) = create_cache();
    let path = cache.entry_path("broken");
    fs::write(&path, b"{ not json").unwrap();

    assert_eq!(cache.get("broken"), None);
    assert!(!path.exists());
}

#[test]
fn test_key_mismatch_is_a_miss() {
    let (_dir, cache) = create_cache();
    cache.set("real-key", json!("value"), HOUR).unwrap();

    // Pretend another key hashed to the same file
    fs::copy(cache.entry_path("real-key"), cache.entry_path("other-key")).unwrap();

    assert_eq!(cache.get("other-key"), None);
    assert_eq!(cache.get("real-key"), Some(json!("value")));
}

#[test]
fn test_read_refreshes_access_time() {
    let (_dir, cache) = create_cache();
    cache.set("key", json!(1), HOUR).unwrap();
    set_mtime(&cache, "key", HOUR);

    let before = fs::metadata(cache.entry_path("key")).unwrap().modified().unwrap();
    cache.get("key").unwrap();
    let after = fs::metadata(cache.entry_path("key")).unwrap().modified().unwrap();

    assert!(after > before);
}

#[test]
fn test_eviction_removes_least_recently_used() {
    let (_dir, cache) = create_cache();
    cache.set("key-a", json!("aaaa"), HOUR).unwrap();
    let entry_size = fs::metadata(cache.entry_path("key-a")).unwrap().len();

    // Room for two entries; a third forces eviction down to 80%
    let cache = cache.with_max_size_bytes(entry_size * 26 / 10);
    cache.set("key-b", json!("bbbb"), HOUR).unwrap();
    set_mtime(&cache, "key-a", 2 * HOUR);
    set_mtime(&cache, "key-b", HOUR);

    // Reading a makes b the least recently used
    assert!(cache.get("key-a").is_some());
    cache.set("key-c", json!("cccc"), HOUR).unwrap();

    assert!(cache.get("key-a").is_some());
    assert!(cache.get("key-b").is_none());
    assert!(cache.get("key-c").is_some());
}

#[test]
fn test_no_eviction_under_limit() {
    let (_dir, cache) = create_cache();
    for idx in 0..10 {
        cache.set(&format!("key-{idx}"), json!(idx), HOUR).unwrap();
    }
    assert_eq!(cache.stats().unwrap().total_entries, 10);
}

#[test]
fn test_cache_stats() {
    let (_dir, cache) = create_cache();

    let stats = cache.stats().unwrap();
    assert_eq!(stats, CacheStats::default());

    cache.set("fresh", json!("x"), HOUR).unwrap();
    cache.set("stale", json!("y"), Duration::ZERO).unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.expired_entries, 1);
    assert!(stats.total_bytes > 0);
}

#[test]
fn test_cache_prune() {
    let (_dir, cache) = create_cache();
    cache.set("fresh", json!("x"), HOUR).unwrap();
    cache.set("stale", json!("y"), Duration::ZERO).unwrap();

    assert_eq!(cache.prune().unwrap(), 1);
    assert_eq!(cache.get("fresh"), Some(json!("x")));
    assert_eq!(cache.stats().unwrap().total_entries, 1);
}

#[test]
fn test_cache_clear() {
    let (_dir, cache) = create_cache();
    cache.set("one", json!(1), HOUR).unwrap();
    cache.set("two", json!(2), HOUR).unwrap();
    fs::write(cache.path().join("unrelated.txt"), b"keep me").unwrap();

    assert_eq!(cache.clear().unwrap(), 2);
    assert_eq!(cache.get("one"), None);
    assert!(cache.path().join("unrelated.txt").exists());
}
