//! Unit tests for access coordinates, the cache, and the resolver.

use super::*;
use crate::prompt::NoPrompt;
use crate::test_support::{MemoryAccessCache, ScriptedPrompter};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

fn access(name: &str, project: &str, zone: &str) -> AccessConfig {
    AccessConfig::new(name, project, zone).unwrap_or_else(|err| panic!("valid access: {err}"))
}

fn overrides(name: Option<&str>, project: Option<&str>, zone: Option<&str>) -> AccessOverrides {
    AccessOverrides {
        cluster_name: name.map(str::to_owned),
        project: project.map(str::to_owned),
        zone: zone.map(str::to_owned),
    }
}

#[fixture]
fn empty_cache() -> MemoryAccessCache {
    MemoryAccessCache::default()
}

#[rstest]
#[case::uppercase("Gantry")]
#[case::leading_digit("1cluster")]
#[case::trailing_hyphen("cluster-")]
#[case::underscore("my_cluster")]
#[case::too_long("a123456789012345678901234567890123456789x")]
#[case::empty("  ")]
fn invalid_cluster_names_are_rejected(#[case] name: &str) {
    let err = AccessConfig::new(name, "proj", "us-central1-a").expect_err("name should be rejected");
    assert!(
        matches!(err, AccessError::InvalidField { ref field, .. } if field == "cluster name"),
        "unexpected error: {err}"
    );
}

#[rstest]
#[case("us-central1-a", "us-central1")]
#[case("europe-west4-b", "europe-west4")]
#[case("asia-northeast1-c", "asia-northeast1")]
#[case::no_region_part("z1", "z1")]
#[case::trailing_hyphen("us-central1-", "us-central1-")]
fn region_strips_zone_letter(#[case] zone: &str, #[case] region: &str) {
    assert_eq!(access("c1", "p1", zone).region(), region);
}

#[rstest]
#[case::empty("")]
#[case::blank("   ")]
fn blank_zones_are_rejected(#[case] zone: &str) {
    let err = AccessConfig::new("c1", "p1", zone).expect_err("zone should be rejected");
    assert!(matches!(err, AccessError::InvalidField { ref field, .. } if field == "zone"));
}

#[rstest]
fn cluster_config_rejects_inverted_autoscaling_bounds() {
    let config = ClusterConfig {
        access: access("c1", "p1", "us-central1-a"),
        instance_type: String::from(DEFAULT_INSTANCE_TYPE),
        min_instances: 4,
        max_instances: 2,
        accelerator_type: None,
    };
    let err = config.validate().expect_err("min above max");
    assert!(err.to_string().contains("exceeds max_instances"), "{err}");
}

#[rstest]
fn explicit_coordinates_win_over_cache(empty_cache: MemoryAccessCache) {
    empty_cache.seed(access("cached", "p9", "europe-west4-b"));
    let resolver = AccessResolver::new(&empty_cache, &NoPrompt, AccessDefaults::default());

    let resolved = resolver
        .resolve_existing(&overrides(Some("c1"), Some("p1"), Some("us-central1-a")))
        .expect("fully specified");

    assert_eq!(resolved, access("c1", "p1", "us-central1-a"));
}

#[rstest]
fn single_matching_cache_entry_fills_gaps(empty_cache: MemoryAccessCache) {
    empty_cache.seed(access("c1", "p1", "us-central1-a"));
    empty_cache.seed(access("c2", "p1", "europe-west4-b"));
    let resolver = AccessResolver::new(&empty_cache, &NoPrompt, AccessDefaults::default());

    let resolved = resolver
        .resolve_existing(&overrides(None, None, Some("europe-west4-b")))
        .expect("one cached cluster matches the zone");

    assert_eq!(resolved, access("c2", "p1", "europe-west4-b"));
}

#[rstest]
fn ambiguous_cache_without_prompting_reports_missing_flag(empty_cache: MemoryAccessCache) {
    empty_cache.seed(access("c1", "p1", "us-central1-a"));
    empty_cache.seed(access("c2", "p1", "europe-west4-b"));
    let resolver = AccessResolver::new(&empty_cache, &NoPrompt, AccessDefaults::default());

    let err = resolver
        .resolve_existing(&AccessOverrides::default())
        .expect_err("two candidates and no prompt");

    assert_eq!(
        err,
        AccessError::MissingField {
            field: "cluster name",
            flag: "--name"
        }
    );
}

#[rstest]
fn ambiguous_cache_offers_cached_values_as_defaults(empty_cache: MemoryAccessCache) {
    empty_cache.seed(access("c1", "p1", "us-central1-a"));
    empty_cache.seed(access("c2", "p2", "europe-west4-b"));
    let prompter = ScriptedPrompter::new();
    prompter.push_input("c2");
    prompter.push_input("p2");
    prompter.push_input("europe-west4-b");
    let resolver = AccessResolver::new(&empty_cache, &prompter, AccessDefaults::default());

    let resolved = resolver
        .resolve_existing(&AccessOverrides::default())
        .expect("prompted values");

    assert_eq!(resolved, access("c2", "p2", "europe-west4-b"));
    assert_eq!(prompter.offered("cluster name").as_deref(), Some("c1"));
    assert_eq!(prompter.offered("project").as_deref(), Some("p2"));
    assert_eq!(prompter.offered("zone").as_deref(), Some("europe-west4-b"));
}

#[rstest]
fn configured_project_is_the_preferred_default(empty_cache: MemoryAccessCache) {
    empty_cache.seed(access("c1", "p1", "us-central1-a"));
    empty_cache.seed(access("c2", "p2", "europe-west4-b"));
    let prompter = ScriptedPrompter::new();
    prompter.push_input("c1");
    prompter.push_input("p1");
    prompter.push_input("us-central1-a");
    let defaults = AccessDefaults {
        project: Some(String::from("from-credentials")),
    };
    let resolver = AccessResolver::new(&empty_cache, &prompter, defaults);

    resolver
        .resolve_existing(&AccessOverrides::default())
        .expect("prompted values");

    assert_eq!(
        prompter.offered("project").as_deref(),
        Some("from-credentials")
    );
    assert_eq!(prompter.offered("zone").as_deref(), Some("us-central1-a"));
}

#[rstest]
fn unreadable_cache_falls_back_to_prompting() {
    let cache = MemoryAccessCache::failing();
    let prompter = ScriptedPrompter::new();
    prompter.push_input("c1");
    prompter.push_input("p1");
    prompter.push_input("us-central1-a");
    let resolver = AccessResolver::new(&cache, &prompter, AccessDefaults::default());

    let resolved = resolver
        .resolve_existing(&AccessOverrides::default())
        .expect("prompted values");

    assert_eq!(resolved, access("c1", "p1", "us-central1-a"));
    assert_eq!(prompter.asked(), vec!["cluster name", "project", "zone"]);
}

#[rstest]
fn new_cluster_uses_file_values_and_defaults(empty_cache: MemoryAccessCache) {
    let file = ClusterConfigFile {
        cluster_name: Some(String::from("c1")),
        project: Some(String::from("p1")),
        zone: Some(String::from("us-central1-a")),
        accelerator_type: Some(String::from("nvidia-tesla-t4")),
        ..ClusterConfigFile::default()
    };
    let resolver = AccessResolver::new(&empty_cache, &NoPrompt, AccessDefaults::default());

    let config = resolver
        .resolve_new(&AccessOverrides::default(), &file)
        .expect("file supplies coordinates");

    assert_eq!(config.access, access("c1", "p1", "us-central1-a"));
    assert_eq!(config.instance_type, DEFAULT_INSTANCE_TYPE);
    assert_eq!(config.min_instances, DEFAULT_MIN_INSTANCES);
    assert_eq!(config.max_instances, DEFAULT_MAX_INSTANCES);
    assert_eq!(config.accelerator_type.as_deref(), Some("nvidia-tesla-t4"));
}

#[rstest]
fn new_cluster_flags_override_file(empty_cache: MemoryAccessCache) {
    let file = ClusterConfigFile {
        cluster_name: Some(String::from("from-file")),
        project: Some(String::from("p1")),
        zone: Some(String::from("us-central1-a")),
        ..ClusterConfigFile::default()
    };
    let resolver = AccessResolver::new(&empty_cache, &NoPrompt, AccessDefaults::default());

    let config = resolver
        .resolve_new(&overrides(Some("from-flag"), None, None), &file)
        .expect("merged");

    assert_eq!(config.access.cluster_name, "from-flag");
}

#[rstest]
fn new_cluster_without_zone_and_prompting_fails(empty_cache: MemoryAccessCache) {
    let resolver = AccessResolver::new(
        &empty_cache,
        &NoPrompt,
        AccessDefaults {
            project: Some(String::from("p1")),
        },
    );

    let err = resolver
        .resolve_new(&overrides(Some("c1"), Some("p1"), None), &ClusterConfigFile::default())
        .expect_err("zone is required");

    assert_eq!(
        err,
        AccessError::MissingField {
            field: "zone",
            flag: "--zone"
        }
    );
}

#[rstest]
fn prompted_counts_must_be_numbers(empty_cache: MemoryAccessCache) {
    let prompter = ScriptedPrompter::new();
    prompter.push_input("n1-standard-4");
    prompter.push_input("lots");
    let resolver = AccessResolver::new(&empty_cache, &prompter, AccessDefaults::default());

    let err = resolver
        .resolve_new(
            &overrides(Some("c1"), Some("p1"), Some("us-central1-a")),
            &ClusterConfigFile::default(),
        )
        .expect_err("not a number");

    assert!(err.to_string().contains("`lots`"), "{err}");
}

#[rstest]
fn access_cache_round_trips_entries_on_disk() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().join("cluster-configs"))
        .unwrap_or_else(|path| panic!("non-UTF-8 temp path: {}", path.display()));
    let cache = AccessCache::new(root);
    let first = access("c1", "p1", "us-central1-a");
    let second = access("c2", "p1", "europe-west4-b");

    cache.store(&first).expect("store first");
    cache.store(&second).expect("store second");
    cache.store(&first).expect("store first again");

    let mut loaded = cache.load_all().expect("load");
    loaded.sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));
    assert_eq!(loaded, vec![first.clone(), second]);

    assert!(cache.remove(&first).expect("remove"));
    assert!(!cache.remove(&first).expect("remove twice"));
    assert_eq!(cache.load_all().expect("load").len(), 1);
}

#[rstest]
fn cluster_config_file_rejects_unknown_keys() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = Utf8PathBuf::from_path_buf(tmp.path().join("cluster.toml"))
        .unwrap_or_else(|path| panic!("non-UTF-8 temp path: {}", path.display()));
    std::fs::write(&path, "cluster_name = \"c1\"\nnode_count = 3\n").expect("seed");

    let err = ClusterConfigFile::load(&path).expect_err("unknown key");
    assert!(matches!(err, AccessError::ConfigFile { .. }), "{err}");
}
