
use std::fs;
use std::path::PathBuf;

use bakrotd::{Rotator, Settings};
use tempfile::TempDir;

use test_utils::{
    archive_members, archives_for, assert_contiguous, drop_sentinel, generation_indices, settle,
    settle_past_stamp,
};

const MAX_FILES: u32 = 3;

struct Harness {
    _root: TempDir,
    watch: PathBuf,
    staging: PathBuf,
}

impl Harness {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let watch = root.path().join("logs");
        let staging = root.path().join("staging");
        fs::create_dir(&watch).unwrap();
        fs::create_dir(&staging).unwrap();
        Self {
            _root: root,
            watch,
            staging,
        }
    }

    fn settings(&self) -> Settings {
        Settings::new(
            &self.watch,
            vec!["alpha".to_owned(), "beta".to_owned(), "gamma".to_owned()],
        )
        .max_files(MAX_FILES)
    }

    fn start(&self) -> Rotator {
        Rotator::start(self.settings()).unwrap()
    }

    fn drop_sentinel(&self, name: &str, bytes: &[u8]) {
        drop_sentinel(&self.staging, &self.watch, name, bytes);
    }

    fn read(&self, name: &str) -> Vec<u8> {
        fs::read(self.watch.join(name)).unwrap()
    }

    fn exists(&self, name: &str) -> bool {
        self.watch.join(name).exists()
    }
}

#[test]
fn single_sentinel_on_empty_chain() {
    let h = Harness::new();
    let rotator = h.start();

    h.drop_sentinel("alpha.111.bak", b"first chunk");
    settle();

    assert_eq!(h.read("alpha.log.0"), b"first chunk");
    assert!(!h.exists("alpha.111.bak"));
    assert_eq!(generation_indices(&h.watch, "alpha"), vec![0]);
    assert!(archives_for(&h.watch, "alpha").is_empty());

    rotator.shutdown();
}

#[test]
fn full_chain_is_compressed() {
    let h = Harness::new();
    fs::write(h.watch.join("alpha.log.0"), b"gen zero").unwrap();
    fs::write(h.watch.join("alpha.log.1"), b"gen one").unwrap();
    fs::write(h.watch.join("alpha.log.2"), b"gen two").unwrap();
    let rotator = h.start();

    h.drop_sentinel("alpha.555.bak", b"five five five");
    settle();

    let archives = archives_for(&h.watch, "alpha");
    assert_eq!(archives.len(), 1);
    assert_eq!(
        archive_members(&archives[0]),
        vec![
            ("alpha.log.1".to_owned(), b"gen zero".to_vec()),
            ("alpha.log.2".to_owned(), b"gen one".to_vec()),
            ("alpha.log.3".to_owned(), b"gen two".to_vec()),
        ]
    );
    // The promoted sentinel was re-homed to .log.1; everything the archive
    // swallowed is off the disk.
    assert_eq!(generation_indices(&h.watch, "alpha"), vec![1]);
    assert_eq!(h.read("alpha.log.1"), b"five five five");

    rotator.shutdown();
}

#[test]
fn bytes_are_conserved_across_cycles() {
    let h = Harness::new();
    let rotator = Rotator::start(h.settings().keep_obsolete_archives()).unwrap();

    let chunks: Vec<String> = (1..=8).map(|i| format!("chunk-{:02};", i)).collect();
    let drop_chunk = |i: usize| {
        h.drop_sentinel(&format!("alpha.{}.bak", i + 1), chunks[i].as_bytes());
        std::thread::sleep(std::time::Duration::from_millis(60));
    };
    for i in 0..4 {
        drop_chunk(i);
    }
    settle_past_stamp();
    for i in 4..7 {
        drop_chunk(i);
    }
    settle_past_stamp();
    drop_chunk(7);
    settle();

    // Every chunk must live in exactly one place: some archive or some
    // generation file.
    let mut haystack = Vec::new();
    for archive in archives_for(&h.watch, "alpha") {
        for (_, bytes) in archive_members(&archive) {
            haystack.push(bytes);
        }
    }
    for idx in generation_indices(&h.watch, "alpha") {
        haystack.push(h.read(&format!("alpha.log.{}", idx)));
    }
    let all_bytes: Vec<u8> = haystack.concat();
    let total: String = String::from_utf8(all_bytes).unwrap();
    for chunk in &chunks {
        assert_eq!(
            total.matches(chunk.as_str()).count(),
            1,
            "chunk {} appears the wrong number of times in {}",
            chunk,
            total
        );
    }

    rotator.shutdown();
}

#[test]
fn mixed_families_get_separate_archives() {
    let h = Harness::new();
    for family in &["alpha", "beta", "gamma"] {
        for idx in 0..MAX_FILES {
            fs::write(
                h.watch.join(format!("{}.log.{}", family, idx)),
                format!("{} gen {}", family, idx),
            )
            .unwrap();
        }
    }
    let rotator = h.start();

    for (family, bytes) in &[
        ("alpha", b"alpha new".to_vec()),
        ("beta", b"beta new".to_vec()),
        ("gamma", b"gamma new".to_vec()),
    ] {
        h.drop_sentinel(&format!("{}.1.bak", family), bytes);
        std::thread::sleep(std::time::Duration::from_millis(60));
    }
    settle_past_stamp();

    for family in &["alpha", "beta", "gamma"] {
        let archives = archives_for(&h.watch, family);
        assert_eq!(archives.len(), 1, "family {}", family);
        assert_eq!(archive_members(&archives[0]).len(), 3, "family {}", family);
        assert_contiguous(&generation_indices(&h.watch, family));
    }

    rotator.shutdown();
}

#[test]
fn rejected_names_cause_no_changes() {
    let h = Harness::new();
    let rotator = h.start();

    h.drop_sentinel("alpha.bak", b"no stamp");
    h.drop_sentinel("alpha.bak.1", b"tool artifact");
    h.drop_sentinel("xyz.999.bak", b"unknown family");
    settle();

    // The producers' own files are all that exists.
    assert!(h.exists("alpha.bak"));
    assert!(h.exists("alpha.bak.1"));
    assert!(h.exists("xyz.999.bak"));
    assert!(generation_indices(&h.watch, "alpha").is_empty());
    assert!(archives_for(&h.watch, "alpha").is_empty());
    assert_eq!(fs::read_dir(&h.watch).unwrap().count(), 3);

    rotator.shutdown();
}

#[test]
fn interrupted_cycle_is_repaired_on_resume() {
    let h = Harness::new();
    // A crash left all four generations behind, terminal included.
    for idx in 0..=MAX_FILES {
        fs::write(
            h.watch.join(format!("alpha.log.{}", idx)),
            format!("stale gen {}", idx),
        )
        .unwrap();
    }
    let rotator = h.start();

    h.drop_sentinel("alpha.777.bak", b"fresh");
    settle();

    // The stale terminal generation was evicted, the rest shifted up and
    // compressed.
    let archives = archives_for(&h.watch, "alpha");
    assert_eq!(archives.len(), 1);
    assert_eq!(
        archive_members(&archives[0]),
        vec![
            ("alpha.log.1".to_owned(), b"stale gen 0".to_vec()),
            ("alpha.log.2".to_owned(), b"stale gen 1".to_vec()),
            ("alpha.log.3".to_owned(), b"stale gen 2".to_vec()),
        ]
    );
    assert_eq!(generation_indices(&h.watch, "alpha"), vec![1]);
    assert_eq!(h.read("alpha.log.1"), b"fresh");
    assert_contiguous(&generation_indices(&h.watch, "alpha"));

    rotator.shutdown();
}

#[test]
fn shutdown_finishes_pending_compression() {
    let h = Harness::new();
    let rotator = h.start();

    for i in 1..=4 {
        h.drop_sentinel(&format!("beta.{}.bak", i), format!("b{}", i).as_bytes());
        std::thread::sleep(std::time::Duration::from_millis(60));
    }
    // Enough time for the trigger to be raised, not necessarily consumed.
    std::thread::sleep(std::time::Duration::from_millis(300));
    rotator.shutdown();

    assert_eq!(archives_for(&h.watch, "beta").len(), 1);
}

#[test]
fn start_fails_without_watch_dir() {
    let root = TempDir::new().unwrap();
    let settings = Settings::new(root.path().join("missing"), vec!["alpha".to_owned()]);
    assert!(Rotator::start(settings).is_err());
}
