//! End-to-end runs through `Pipeline` with in-memory collaborators.

mod test_support;

use ember_loader::{
    DirectoryOptions, Error, FilterOptions, Pipeline, RunOptions, WriteMode,
};
use ember_models::JsonCodec;
use ember_package::{FhirPackage, PackageId};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_support::*;

fn pipeline(
    loader: Arc<InMemoryLoader>,
    emitter: Arc<RecordingEmitter>,
    options: RunOptions,
) -> Pipeline {
    Pipeline::new(loader, Arc::new(JsonCodec::new()), emitter, options)
}

fn options_for(id: &str) -> RunOptions {
    RunOptions {
        package_id: Some(id.parse().unwrap()),
        ..Default::default()
    }
}

#[tokio::test]
async fn search_bundles_are_left_out_of_the_transaction() {
    let archive = package_archive(
        "example.ig",
        "1.0.0",
        &[],
        &[
            ("package/example/Patient-a.json", patient("a")),
            ("package/example/Bundle-search.json", search_bundle("search")),
            ("package/example/Patient-b.json", patient("b")),
        ],
    );
    let loader = Arc::new(InMemoryLoader::new([
        FhirPackage::from_tar_gz_bytes(&archive).unwrap()
    ]));
    let emitter = Arc::new(RecordingEmitter::ready());

    let summary = pipeline(loader, emitter.clone(), options_for("example.ig#1.0.0"))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.extracted, 3);
    assert_eq!(summary.emitted, 2);
    let sent = emitter.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(entry_ids(&sent[0]), vec!["a", "b"]);
    assert!(sent[0]
        .entries()
        .iter()
        .all(|e| e.request.as_ref().unwrap().method == "POST"));
}

#[tokio::test]
async fn recursive_run_emits_root_then_dependencies_without_duplicates() {
    let loader = Arc::new(InMemoryLoader::new([
        example_package("root", &[("dep1", "1.0.0"), ("dep2", "1.0.0")], &["r"]),
        example_package("dep1", &[("shared", "1.0.0")], &["d1"]),
        example_package("dep2", &[("shared", "1.0.x")], &["d2"]),
        example_package("shared", &[], &["s"]),
    ]));
    let emitter = Arc::new(RecordingEmitter::ready());
    let options = RunOptions {
        load_recursively: true,
        ..options_for("root#1.0.0")
    };

    let summary = pipeline(loader.clone(), emitter.clone(), options)
        .run()
        .await
        .unwrap();

    assert_eq!(entry_ids(&emitter.sent()[0]), vec!["r", "d1", "s", "d2"]);
    assert_eq!(
        summary.packages,
        vec![
            PackageId::new("root", "1.0.0"),
            PackageId::new("dep1", "1.0.0"),
            PackageId::new("shared", "1.0.0"),
            PackageId::new("dep2", "1.0.0"),
        ]
    );
    assert_eq!(loader.loads_of(&PackageId::new("shared", "1.0.0")), 1);
    assert_eq!(loader.loads_of(&PackageId::new("shared", "1.0.x")), 0);
}

#[tokio::test]
async fn non_recursive_run_ignores_dependencies() {
    let loader = Arc::new(InMemoryLoader::new([
        example_package("root", &[("dep1", "1.0.0")], &["r"]),
        example_package("dep1", &[], &["d1"]),
    ]));
    let emitter = Arc::new(RecordingEmitter::ready());

    pipeline(loader.clone(), emitter.clone(), options_for("root#1.0.0"))
        .run()
        .await
        .unwrap();

    assert_eq!(entry_ids(&emitter.sent()[0]), vec!["r"]);
    assert_eq!(loader.loads_of(&PackageId::new("dep1", "1.0.0")), 0);
}

#[tokio::test]
async fn directory_mode_skips_packages_and_filtering() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.json"), patient("a").to_string()).unwrap();
    std::fs::write(dir.path().join("b.json"), search_bundle("b").to_string()).unwrap();
    std::fs::write(dir.path().join("c.xml"), "<Patient/>").unwrap();

    let loader = Arc::new(InMemoryLoader::default());
    let emitter = Arc::new(RecordingEmitter::ready());
    let options = RunOptions {
        directory: Some(DirectoryOptions::new(dir.path())),
        package_id: Some(PackageId::new("unused", "1.0.0")),
        ..Default::default()
    };

    let summary = pipeline(loader.clone(), emitter.clone(), options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.emitted, 2);
    assert!(summary.packages.is_empty());
    assert_eq!(entry_ids(&emitter.sent()[0]), vec!["a", "b"]);
    assert_eq!(loader.total_loads(), 0);
}

#[tokio::test]
async fn server_that_never_becomes_ready_receives_nothing() {
    let loader = Arc::new(InMemoryLoader::new([example_package("root", &[], &["r"])]));
    let emitter = Arc::new(RecordingEmitter::never_ready());
    let options = RunOptions {
        max_wait: Duration::from_secs(1),
        ..options_for("root#1.0.0")
    };

    let err = pipeline(loader, emitter.clone(), options)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ReadinessTimeout { ref endpoint, waited }
        if endpoint == "http://fhir.test/base" && waited == Duration::from_secs(1)));
    assert_eq!(emitter.wait_count(), 1);
    assert!(emitter.sent().is_empty());
}

#[tokio::test]
async fn zero_wait_sends_without_polling() {
    let loader = Arc::new(InMemoryLoader::new([example_package("root", &[], &["r"])]));
    let emitter = Arc::new(RecordingEmitter::never_ready());
    let options = RunOptions {
        max_wait: Duration::ZERO,
        ..options_for("root#1.0.0")
    };

    pipeline(loader, emitter.clone(), options).run().await.unwrap();

    assert_eq!(emitter.wait_count(), 0);
    assert_eq!(emitter.sent().len(), 1);
}

#[tokio::test]
async fn unknown_root_package_is_not_found() {
    let emitter = Arc::new(RecordingEmitter::ready());
    let err = pipeline(
        Arc::new(InMemoryLoader::default()),
        emitter.clone(),
        options_for("missing#1.0.0"),
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NotFound { ref name, .. } if name == "missing"));
    assert!(emitter.sent().is_empty());
}

#[tokio::test]
async fn malformed_example_aborts_the_run() {
    let archive = package_archive(
        "root",
        "1.0.0",
        &[],
        &[
            ("package/example/Patient-a.json", patient("a")),
            ("package/example/Basic-bad.json", json!({"id": "no-type"})),
        ],
    );
    let loader = Arc::new(InMemoryLoader::new([
        FhirPackage::from_tar_gz_bytes(&archive).unwrap()
    ]));
    let emitter = Arc::new(RecordingEmitter::ready());

    let err = pipeline(loader, emitter.clone(), options_for("root#1.0.0"))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Extraction { ref file, .. } if file.ends_with("Basic-bad.json")));
    assert!(emitter.sent().is_empty());
}

#[tokio::test]
async fn location_takes_precedence_over_package_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.tgz");
    std::fs::write(
        &path,
        package_archive(
            "local.ig",
            "0.1.0",
            &[],
            &[("package/example/Patient-l.json", patient("l"))],
        ),
    )
    .unwrap();

    let loader = Arc::new(InMemoryLoader::new([example_package("root", &[], &["r"])]));
    let emitter = Arc::new(RecordingEmitter::ready());
    let options = RunOptions {
        location: Some(path.display().to_string()),
        ..options_for("root#1.0.0")
    };

    let summary = pipeline(loader.clone(), emitter.clone(), options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.packages, vec![PackageId::new("local.ig", "0.1.0")]);
    assert_eq!(entry_ids(&emitter.sent()[0]), vec!["l"]);
    assert_eq!(loader.total_loads(), 0);
}

#[tokio::test]
async fn upsert_and_documents_only() {
    let archive = package_archive(
        "root",
        "1.0.0",
        &[],
        &[
            ("package/example/Patient-a.json", patient("a")),
            (
                "package/example/Bundle-doc.json",
                json!({"resourceType": "Bundle", "id": "doc", "type": "document"}),
            ),
            (
                "package/example/List-l.json",
                json!({"resourceType": "List", "id": "l", "status": "current", "mode": "working"}),
            ),
        ],
    );
    let loader = Arc::new(InMemoryLoader::new([
        FhirPackage::from_tar_gz_bytes(&archive).unwrap()
    ]));
    let emitter = Arc::new(RecordingEmitter::ready());
    let options = RunOptions {
        write_mode: WriteMode::Upsert,
        filter: FilterOptions {
            exclude_search_bundles: true,
            docs_and_lists_only: true,
        },
        ..options_for("root#1.0.0")
    };

    pipeline(loader, emitter.clone(), options).run().await.unwrap();

    let sent = emitter.sent();
    let urls: Vec<_> = sent[0]
        .entries()
        .iter()
        .map(|e| e.request.as_ref().unwrap().url.clone())
        .collect();
    assert_eq!(urls, vec!["Bundle/doc", "List/l"]);
}
