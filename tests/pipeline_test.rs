//! End-to-end tests for the one-shot pipeline and the live watch service, driven through the
//! public API with an in-memory transport.

mod common;

use common::{create_note_tree, read, MockTransport};
use mdindex::{config::IndexerConfig, run_with_transport, IndexerError};
use std::{fs, sync::Arc};
use tempfile::TempDir;
use test_log::test;

#[test]
fn one_shot_resolves_the_whole_tree() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_note_tree(&temp_dir);
    let config = IndexerConfig::new(&root).unwrap();
    let transport = Arc::new(MockTransport::for_note_tree());

    run_with_transport(&config, transport.clone()).unwrap();

    let attachments = config.attachment_root();
    assert_eq!(
        fs::read(attachments.join("1706.03762.pdf")).unwrap(),
        b"%PDF attention"
    );
    assert_eq!(fs::read(attachments.join("survey.pdf")).unwrap(), b"%PDF survey");
    assert_eq!(fs::read(attachments.join("data.csv")).unwrap(), b"a,b\n1,2\n");
    assert!(!attachments.join("ignored.pdf").exists());

    assert_eq!(
        read(config.root.join("index.md")),
        "# Reading list\n\nSee [indexer/pdf](/attachments/1706.03762.pdf) for details.\n"
    );
    assert_eq!(
        read(config.root.join("papers/survey.md")),
        "- [indexer/pdf](/attachments/survey.pdf)\n\
         - [indexer/pdf](/attachments/data.csv)\n\
         - again [indexer/pdf](/attachments/survey.pdf)\n"
    );
    assert_eq!(
        read(config.root.join("papers/readme.txt")),
        "!(indexer)https://example.com/ignored.pdf\n"
    );
    assert_eq!(read(config.root.join("plain.md")), "# Nothing to fetch\n");

    // Sorted walk; the repeated survey reference is served from disk.
    assert_eq!(
        transport.calls(),
        vec![
            "https://arxiv.org/pdf/1706.03762.pdf".to_string(),
            "https://example.com/survey.pdf".to_string(),
            "https://example.com/data.csv".to_string(),
        ]
    );
}

#[test]
fn second_run_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_note_tree(&temp_dir);
    let config = IndexerConfig::new(&root).unwrap();
    let transport = Arc::new(MockTransport::for_note_tree());

    run_with_transport(&config, transport.clone()).unwrap();
    let index = read(config.root.join("index.md"));
    let survey = read(config.root.join("papers/survey.md"));

    run_with_transport(&config, transport.clone()).unwrap();

    assert_eq!(read(config.root.join("index.md")), index);
    assert_eq!(read(config.root.join("papers/survey.md")), survey);
    assert_eq!(transport.call_count(), 3);
}

#[test]
fn one_shot_stops_at_first_failure() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_note_tree(&temp_dir);
    let config = IndexerConfig::new(&root).unwrap();
    let transport = Arc::new(
        MockTransport::default()
            .with_error("https://arxiv.org/pdf/1706.03762.pdf", "connection refused"),
    );

    let err = run_with_transport(&config, transport.clone()).unwrap_err();

    assert!(err.is_network());
    assert_eq!(transport.call_count(), 1);
    assert!(read(config.root.join("index.md")).contains("!(indexer)https://arxiv.org/abs/"));
    assert!(read(config.root.join("papers/survey.md")).contains("!(indexer)"));
}

#[test]
fn attachment_root_is_created_even_without_references() {
    let temp_dir = TempDir::new().unwrap();
    let config = IndexerConfig::new(temp_dir.path()).unwrap();

    run_with_transport(&config, MockTransport::default()).unwrap();

    assert!(config.attachment_root().is_dir());
}

#[test]
fn blocked_attachment_root_is_a_setup_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = IndexerConfig::new(temp_dir.path()).unwrap();
    fs::write(config.attachment_root(), "not a directory").unwrap();

    let err = run_with_transport(&config, MockTransport::default()).unwrap_err();

    assert!(matches!(err, IndexerError::Io(_)));
}

#[cfg(feature = "service")]
mod watching {
    use super::*;
    use mdindex::watch::WatchService;
    use std::time::{Duration, Instant};
    use test_log::test;

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn start_resolves_tree_and_isolates_failures() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_note_tree(&temp_dir);
        let config = IndexerConfig::new(&root).unwrap();
        fs::create_dir_all(config.attachment_root()).unwrap();
        let transport = Arc::new(
            MockTransport::default()
                .with_error("https://arxiv.org/pdf/1706.03762.pdf", "connection refused")
                .with_body("https://example.com/survey.pdf", b"%PDF survey")
                .with_body("https://example.com/data.csv", b"a,b\n1,2\n"),
        );

        let service = WatchService::start(config.clone(), transport.clone()).unwrap();

        assert_eq!(service.root(), config.root.as_path());
        assert_eq!(
            read(config.root.join("index.md")),
            "# Reading list\n\nSee !(indexer)https://arxiv.org/abs/1706.03762 for details.\n"
        );
        assert!(!config.attachment_root().join("1706.03762.pdf").exists());
        assert_eq!(
            read(config.root.join("papers/survey.md")),
            "- [indexer/pdf](/attachments/survey.pdf)\n\
             - [indexer/pdf](/attachments/data.csv)\n\
             - again [indexer/pdf](/attachments/survey.pdf)\n"
        );
        assert_eq!(
            fs::read(config.attachment_root().join("survey.pdf")).unwrap(),
            b"%PDF survey"
        );
    }

    #[test]
    #[ignore = "depends on filesystem notification timing"]
    fn live_watcher_rewrites_new_and_edited_documents() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_note_tree(&temp_dir);
        let config = IndexerConfig::new(&root).unwrap();
        fs::create_dir_all(config.attachment_root()).unwrap();
        let transport = Arc::new(
            MockTransport::for_note_tree()
                .with_body("https://example.com/late.pdf", b"late")
                .with_body("https://example.com/nested.pdf", b"nested"),
        );

        let service = WatchService::start(config.clone(), transport.clone()).unwrap();
        assert_eq!(service.root(), config.root.as_path());

        // The initial pass already ran.
        assert!(read(config.root.join("index.md")).contains("[indexer/pdf]"));

        fs::write(
            config.root.join("plain.md"),
            "# Nothing to fetch\n!(indexer)https://example.com/late.pdf\n",
        )
        .unwrap();
        assert!(wait_for(|| config.attachment_root().join("late.pdf").exists()));
        assert!(wait_for(|| read(config.root.join("plain.md"))
            == "# Nothing to fetch\n[indexer/pdf](/attachments/late.pdf)\n"));

        let fresh = config.root.join("fresh");
        fs::create_dir(&fresh).unwrap();
        std::thread::sleep(Duration::from_millis(500));
        fs::write(fresh.join("n.md"), "!(indexer)https://example.com/nested.pdf").unwrap();
        assert!(wait_for(
            || read(fresh.join("n.md")) == "[indexer/pdf](/attachments/nested.pdf)"
        ));
    }
}
