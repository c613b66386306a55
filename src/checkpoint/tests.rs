use super::*;
use crate::assessment::Confidence;
use tempfile::TempDir;

fn assessment(fact_id: u32, score: u8) -> Assessment {
    Assessment {
        fact_id,
        score,
        confidence: Confidence::Medium,
        supporting_papers: vec![format!("paper_{fact_id}.pdf")],
        contradicting_papers: Vec::new(),
        evidence_summary: format!("Evidence for fact {fact_id}."),
        passages_reviewed: 3,
        model: "mock-model".to_string(),
        reviewed_at: Utc::now(),
    }
}

fn log_path(dir: &TempDir) -> PathBuf {
    dir.path().join(LOG_FILE)
}

#[test]
fn test_open_creates_empty_checkpoint() {
    let dir = TempDir::new().unwrap();

    let store = CheckpointStore::open(dir.path()).unwrap();

    assert_eq!(store.completed_count(), 0);
    assert!(store.unpublished().is_empty());
    assert!(dir.path().join(LOCK_FILE).exists());
    assert!(log_path(&dir).exists());
}

#[test]
fn test_second_open_is_locked() {
    let dir = TempDir::new().unwrap();
    let _first = CheckpointStore::open(dir.path()).unwrap();

    let second = CheckpointStore::open(dir.path());

    assert!(matches!(second, Err(CheckpointError::Locked { .. })));
}

#[test]
fn test_lock_released_on_drop() {
    let dir = TempDir::new().unwrap();
    drop(CheckpointStore::open(dir.path()).unwrap());

    assert!(CheckpointStore::open(dir.path()).is_ok());
}

#[test]
fn test_commit_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store.commit(1, assessment(1, 40)).unwrap();
        store.commit(2, assessment(2, 80)).unwrap();
        assert!(store.is_complete(1));
    }

    let store = CheckpointStore::open(dir.path()).unwrap();

    assert_eq!(store.completed_count(), 2);
    assert_eq!(store.assessment(2).map(|a| a.score), Some(80));
    assert_eq!(store.unpublished(), vec![1, 2]);
}

#[test]
fn test_commit_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut store = CheckpointStore::open(dir.path()).unwrap();

    let first = store.commit(3, assessment(3, 55)).unwrap();
    let log_len = fs::metadata(log_path(&dir)).unwrap().len();
    let second = store.commit(3, assessment(3, 99)).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.score, 55);
    assert_eq!(store.completed_count(), 1);
    assert_eq!(fs::metadata(log_path(&dir)).unwrap().len(), log_len);
}

#[test]
fn test_commit_rejects_mismatched_fact() {
    let dir = TempDir::new().unwrap();
    let mut store = CheckpointStore::open(dir.path()).unwrap();

    let result = store.commit(1, assessment(2, 50));

    assert!(matches!(
        result,
        Err(CheckpointError::FactMismatch {
            expected: 1,
            actual: 2
        })
    ));
    assert!(!store.is_complete(1));
    assert!(!store.is_complete(2));
}

#[test]
fn test_publish_markers() {
    let dir = TempDir::new().unwrap();
    let mut store = CheckpointStore::open(dir.path()).unwrap();
    store.commit(1, assessment(1, 10)).unwrap();
    store.commit(2, assessment(2, 20)).unwrap();

    store.mark_published(1).unwrap();
    store.mark_published(1).unwrap();

    assert_eq!(store.unpublished(), vec![2]);
    assert!(matches!(
        store.mark_published(9),
        Err(CheckpointError::NotCommitted { fact_id: 9 })
    ));
}

#[test]
fn test_reset_forces_re_review() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store.commit(1, assessment(1, 10)).unwrap();
        store.mark_published(1).unwrap();

        assert!(store.reset(1).unwrap());
        assert!(!store.reset(1).unwrap());
        assert!(!store.is_complete(1));
    }

    let mut store = CheckpointStore::open(dir.path()).unwrap();
    assert!(!store.is_complete(1));
    assert!(!store.record().published.contains(&1));

    let recommitted = store.commit(1, assessment(1, 70)).unwrap();
    assert_eq!(recommitted.score, 70);
}

#[test]
fn test_snapshot_truncates_log() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = CheckpointStore::open(dir.path())
            .unwrap()
            .with_snapshot_interval(2);
        store.commit(1, assessment(1, 10)).unwrap();
        store.commit(2, assessment(2, 20)).unwrap();

        assert!(dir.path().join(SNAPSHOT_FILE).exists());
        assert_eq!(fs::metadata(log_path(&dir)).unwrap().len(), 0);

        store.commit(3, assessment(3, 30)).unwrap();
        assert!(fs::metadata(log_path(&dir)).unwrap().len() > 0);
    }

    let store = CheckpointStore::open(dir.path()).unwrap();
    let ids: Vec<u32> = store.record().completed.keys().copied().collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_replaying_log_over_snapshot_is_harmless() {
    let dir = TempDir::new().unwrap();
    let saved_log;
    {
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store.commit(1, assessment(1, 10)).unwrap();
        store.reset(1).unwrap();
        store.commit(1, assessment(1, 60)).unwrap();
        store.mark_published(1).unwrap();
        saved_log = fs::read(log_path(&dir)).unwrap();
        store.snapshot().unwrap();
    }
    // Crash between snapshot rename and log truncation.
    fs::write(log_path(&dir), &saved_log).unwrap();

    let store = CheckpointStore::open(dir.path()).unwrap();

    assert_eq!(store.assessment(1).map(|a| a.score), Some(60));
    assert!(store.unpublished().is_empty());
}

#[test]
fn test_torn_tail_is_discarded() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store.commit(1, assessment(1, 10)).unwrap();
    }
    let intact_len = fs::metadata(log_path(&dir)).unwrap().len();
    {
        let mut log = OpenOptions::new().append(true).open(log_path(&dir)).unwrap();
        log.write_all(b"3f2a9c {\"op\":\"commit\",\"at\":").unwrap();
    }

    let store = CheckpointStore::open(dir.path()).unwrap();

    assert!(store.is_complete(1));
    assert_eq!(store.completed_count(), 1);
    assert_eq!(fs::metadata(log_path(&dir)).unwrap().len(), intact_len);
}

#[test]
fn test_corrupt_interior_line_is_fatal() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store.commit(1, assessment(1, 10)).unwrap();
        store.commit(2, assessment(2, 20)).unwrap();
    }
    let text = fs::read_to_string(log_path(&dir)).unwrap();
    let tampered = text.replacen("\"score\":10", "\"score\":11", 1);
    assert_ne!(text, tampered);
    fs::write(log_path(&dir), tampered).unwrap();

    let result = CheckpointStore::open(dir.path());

    assert!(matches!(result, Err(CheckpointError::Corrupt { line: 2, .. })));
}

#[test]
fn test_corrupt_snapshot_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(SNAPSHOT_FILE), "{ not a record").unwrap();

    let result = CheckpointStore::open(dir.path());

    assert!(matches!(result, Err(CheckpointError::CorruptSnapshot { .. })));
}

#[test]
fn test_load_reads_without_lock() {
    let dir = TempDir::new().unwrap();
    let mut store = CheckpointStore::open(dir.path()).unwrap();
    store.commit(4, assessment(4, 44)).unwrap();

    let record = CheckpointStore::load(dir.path()).unwrap();

    assert!(record.is_complete(4));
    assert_eq!(record.unpublished(), vec![4]);
}

#[test]
fn test_journal_line_roundtrip_and_checksum() {
    let entry = LogEntry::Published {
        at: Utc::now(),
        fact_id: 12,
    };
    let line = journal::encode(&entry).unwrap();

    assert!(line.ends_with('\n'));
    assert_eq!(journal::decode(line.trim_end()).unwrap(), entry);

    let tampered = line.trim_end().replace("12", "13");
    assert_eq!(
        journal::decode(&tampered).unwrap_err(),
        "checksum mismatch"
    );
    assert_eq!(journal::decode("no-space").unwrap_err(), "missing checksum");
}
