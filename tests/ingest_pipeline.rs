use dupwatch::core::ledger::DirectoryLedger;
use dupwatch::database::models::SessionStatus;
use dupwatch::database::Database;
use dupwatch::services::scanner::ScanOptions;
use dupwatch::services::{IngestionLoop, PerceptualOracle, TickOutcome};
use image::{ImageBuffer, Rgb};
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

fn write_gradient(path: &Path, invert: bool) {
    let img = ImageBuffer::from_fn(64, 64, |x, _y| {
        let v = (x * 4) as u8;
        let v = if invert { 255 - v } else { v };
        Rgb([v, v, v])
    });
    img.save(path).unwrap();
}

fn write_checkerboard(path: &Path) {
    let img = ImageBuffer::from_fn(64, 64, |x, y| {
        let v = if ((x / 8) + (y / 8)) % 2 == 0 { 255u8 } else { 0u8 };
        Rgb([v, v, v])
    });
    img.save(path).unwrap();
}

struct Fixture {
    root: TempDir,
    store: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();

        let alice = root.path().join("alice");
        fs::create_dir(&alice).unwrap();
        write_gradient(&alice.join("img1.png"), false);
        write_gradient(&alice.join("img2.png"), false);
        write_checkerboard(&alice.join("img3.png"));
        fs::write(alice.join("notes.txt"), "not an image").unwrap();

        let bob = root.path().join("bob");
        fs::create_dir(&bob).unwrap();
        write_gradient(&bob.join("light.png"), false);
        write_gradient(&bob.join("dark.png"), true);

        Self {
            root,
            store: TempDir::new().unwrap(),
        }
    }

    fn open_db(&self) -> Database {
        Database::open(&self.store.path().join("dupwatch.db")).unwrap()
    }

    fn ingest<'db>(&self, db: &'db Database) -> IngestionLoop<'db, PerceptualOracle> {
        let ledger = DirectoryLedger::open(self.root.path()).unwrap();
        let oracle = PerceptualOracle::new(ScanOptions::default(), 10);
        IngestionLoop::new(ledger, db, oracle, Arc::new(AtomicBool::new(false)))
    }
}

fn drain(ingest: &mut IngestionLoop<'_, PerceptualOracle>) -> Vec<TickOutcome> {
    let mut outcomes = Vec::new();
    loop {
        match ingest.tick().unwrap() {
            TickOutcome::Idle => return outcomes,
            outcome => outcomes.push(outcome),
        }
    }
}

#[test]
fn symmetric_duplicates_are_stored_once() {
    let fixture = Fixture::new();
    let db = fixture.open_db();
    let mut ingest = fixture.ingest(&db);

    let outcomes = drain(&mut ingest);
    assert_eq!(outcomes.len(), 2);
    assert!(ingest.ledger().is_processed("alice"));
    assert!(ingest.ledger().is_processed("bob"));

    let rows = db.duplicates().find_by_owner("alice").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].image_id, "img1.png");
    assert_eq!(rows[0].ref_image_id, "img2.png");
    assert_eq!(rows[0].similarity, 1.0);

    assert_eq!(db.duplicates().count_by_owner("bob").unwrap(), 0);

    let session = db
        .sessions()
        .find_by_directory("alice")
        .unwrap()
        .into_option()
        .unwrap();
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(session.records_written, 1);
    assert_eq!(session.redundant_skipped, 1);
}

#[test]
fn restart_does_not_duplicate_rows() {
    let fixture = Fixture::new();

    for _ in 0..2 {
        let db = fixture.open_db();
        let mut ingest = fixture.ingest(&db);
        drain(&mut ingest);
    }

    let db = fixture.open_db();
    assert_eq!(db.duplicates().count().unwrap(), 1);
    assert_eq!(
        db.sessions().list_for_directory("alice").unwrap().len(),
        2
    );
}

#[test]
fn new_submission_is_picked_up_after_backlog() {
    let fixture = Fixture::new();
    let db = fixture.open_db();
    let mut ingest = fixture.ingest(&db);
    drain(&mut ingest);

    let carol = fixture.root.path().join("carol");
    fs::create_dir(&carol).unwrap();
    write_checkerboard(&carol.join("a.png"));
    write_checkerboard(&carol.join("b.png"));

    let TickOutcome::Processed(summary) = ingest.tick().unwrap() else {
        panic!("expected carol to be processed");
    };
    assert_eq!(summary.directory, "carol");
    assert_eq!(summary.records, 1);
    assert_eq!(ingest.tick().unwrap(), TickOutcome::Idle);
}

#[test]
fn vanished_submission_is_retried_when_it_returns() {
    let fixture = Fixture::new();
    let u4 = fixture.root.path().join("u4");
    fs::create_dir(&u4).unwrap();
    write_gradient(&u4.join("x.png"), false);
    write_gradient(&u4.join("y.png"), false);

    let db = fixture.open_db();
    let mut ingest = fixture.ingest(&db);
    fs::remove_dir_all(&u4).unwrap();

    let outcomes = drain(&mut ingest);
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, TickOutcome::Retry { directory, .. } if directory == "u4")));
    assert!(!ingest.ledger().is_processed("u4"));
    assert_eq!(db.duplicates().count_by_owner("u4").unwrap(), 0);

    fs::create_dir(&u4).unwrap();
    write_gradient(&u4.join("x.png"), false);
    write_gradient(&u4.join("y.png"), false);

    let TickOutcome::Processed(summary) = ingest.tick().unwrap() else {
        panic!("expected u4 to be processed");
    };
    assert_eq!(summary.directory, "u4");
    assert!(ingest.ledger().is_processed("u4"));
    assert_eq!(db.duplicates().count_by_owner("u4").unwrap(), 1);
}
