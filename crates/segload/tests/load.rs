use std::path::{Path, PathBuf};
use std::sync::Arc;

use segload::config::{DEFAULT_NAMESPACE, InputConfig};
use segload::features::TsvLayout;
use segload::{
    load_with, Destination, FilePipeline, ImageRecord, ImageSource, InputFormat, InputSource, LoaderConfig,
    MemorySink,
};
use tokio::sync::watch;

const HEADER: &str = "id\tx\tarea\tboundary";

fn write_tsv(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut text = format!("{HEADER}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    std::fs::write(&path, text).unwrap();
    path
}

fn tsv_config(source: InputSource, destination: Destination, image: ImageSource) -> LoaderConfig {
    let mut config = LoaderConfig::new(
        InputConfig {
            source,
            format: InputFormat::Tsv,
            workers: Some(3),
            tsv_layout: TsvLayout::default(),
        },
        destination,
        "nuclei-v1",
    );
    config.image.source = image;
    config.image.normalize = true;
    config
}

fn memory_destination() -> Destination {
    Destination::Http {
        base_url: "http://unused".into(),
        database: "unused".into(),
        username: None,
        password: None,
    }
}

fn square_image() -> ImageRecord {
    ImageRecord { width: 100.0, height: 100.0, ..Default::default() }
}

#[tokio::test]
async fn tsv_row_becomes_normalized_markup() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tsv(dir.path(), "TCGA-01-0001.tile1.tsv", &["1\t10\t250\t0,0;10,0;10,10;0,10"]);

    let config = tsv_config(InputSource::File(path.clone()), memory_destination(), ImageSource::Sink);
    config.validate().unwrap();
    let pipeline = Arc::new(FilePipeline::new(Arc::new(config)));
    let sink = MemorySink::new().with_image("TCGA-01-0001", square_image());
    let (_cancel_tx, cancel) = watch::channel(false);

    let summary = load_with(pipeline, vec![Ok(path.clone())], vec![sink.clone()], cancel).await;
    assert_eq!((summary.succeeded, summary.failed, summary.documents), (1, 0, 1));

    let docs = sink.markups_for(&path);
    assert_eq!(docs.len(), 1);
    let geometry = docs[0].geometry.as_ref().unwrap();
    assert_eq!(geometry.points, vec![[0.0, 0.0], [0.1, 0.0], [0.1, 0.1], [0.0, 0.1]]);
    assert_eq!(geometry.bounding_box, [0.0, 0.0, 0.1, 0.1]);
    assert!(geometry.normalized);

    let features = &docs[0].features[DEFAULT_NAMESPACE];
    assert_eq!(features.len(), 1);
    assert_eq!(features["area"], 250.0);
    assert_eq!(docs[0].area, Some(250.0));

    let image = &docs[0].provenance.image;
    assert_eq!(image.case_id, "TCGA-01-0001");
    assert_eq!(image.identifier, "TCGA-01-0001.tile1");
    assert_eq!(docs[0].provenance.title, "Algorithm: nuclei-v1");

    let mappings = sink.mappings();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].key(), ("TCGA-01-0001", "nuclei-v1"));
}

#[tokio::test]
async fn failing_files_do_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let row = "1\t10\t250\t0,0;10,0;10,10;0,10";
    let inputs = vec![
        write_tsv(dir.path(), "CASE-A.1.tsv", &[row, row]),
        write_tsv(dir.path(), "CASE-UNKNOWN.1.tsv", &[row]),
        dir.path().join("CASE-A.missing.tsv"),
        write_tsv(dir.path(), "CASE-A.2.tsv", &[row]),
        write_tsv(dir.path(), "CASE-B.1.tsv", &[row]),
    ];

    let config = tsv_config(InputSource::Directory(dir.path().into()), memory_destination(), ImageSource::Sink);
    let pipeline = Arc::new(FilePipeline::new(Arc::new(config)));
    let sink = MemorySink::new()
        .with_image("CASE-A", square_image())
        .with_image("CASE-B", square_image());
    let (_cancel_tx, cancel) = watch::channel(false);

    let slots = vec![sink.clone(), sink.clone(), sink.clone()];
    let summary = load_with(pipeline, inputs.iter().cloned().map(Ok), slots, cancel).await;

    assert_eq!(summary.started, 5);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.documents, 4);
    assert_eq!(sink.markups_for(&inputs[0]).len(), 2);

    // CASE-A may race across slots; CASE-B registers once
    let mappings = sink.mappings();
    assert!(mappings.iter().any(|m| m.key().0 == "CASE-A"));
    assert_eq!(mappings.iter().filter(|m| m.key().0 == "CASE-B").count(), 1);
}

#[tokio::test]
async fn single_slot_processes_inputs_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let row = "1\t1\t5\t1,1;2,1;2,2";
    let inputs: Vec<PathBuf> = ["C.3.tsv", "C.1.tsv", "C.2.tsv"]
        .iter()
        .map(|name| write_tsv(dir.path(), name, &[row]))
        .collect();

    let config = tsv_config(InputSource::File(inputs[0].clone()), memory_destination(), ImageSource::Sink);
    let pipeline = Arc::new(FilePipeline::new(Arc::new(config)));
    let sink = MemorySink::new().with_image("C", square_image());
    let (_cancel_tx, cancel) = watch::channel(false);

    let summary = load_with(pipeline, inputs.iter().cloned().map(Ok), vec![sink.clone()], cancel).await;
    assert_eq!(summary.succeeded, 3);
    assert_eq!(sink.inputs(), inputs);
    assert_eq!(sink.mappings().len(), 1);
}

#[tokio::test]
async fn file_destination_writes_json_lines() {
    let input_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_tsv(input_dir.path(), "CASE-X.a.tsv", &["1\t1\t9\t0,0;50,0;50,50", "2\t1\t4\t10,10;20,10;20,20"]);
    write_tsv(input_dir.path(), "CASE-X.b.tsv", &["1\t1\t9\t0,0;5,0;5,5"]);

    let config = tsv_config(
        InputSource::Directory(input_dir.path().into()),
        Destination::File { out_folder: out_dir.path().into() },
        ImageSource::Explicit { width: 200.0, height: 100.0 },
    );
    let (_cancel_tx, cancel) = watch::channel(false);
    let summary = segload::run(config, cancel).await.unwrap();
    assert_eq!((summary.succeeded, summary.documents), (2, 3));

    let folder = input_dir.path().file_name().unwrap().to_string_lossy().into_owned();
    let first = std::fs::read_to_string(out_dir.path().join(format!("{folder}.CASE-X.a.tsv.json"))).unwrap();
    let docs: Vec<serde_json::Value> = first.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["geometry"]["boundingBox"], serde_json::json!([0.0, 0.0, 0.25, 0.5]));
    assert_eq!(docs[1]["provenance"]["image"]["width"], serde_json::json!(200.0));

    let metadata = std::fs::read_to_string(out_dir.path().join("metadata.json")).unwrap();
    assert_eq!(metadata.lines().count(), 1);
}

#[tokio::test]
async fn same_named_inputs_in_case_folders_keep_their_documents() {
    let input_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    for case in ["CASE-A.svs", "CASE-B.svs"] {
        let folder = input_dir.path().join(case);
        std::fs::create_dir(&folder).unwrap();
        write_tsv(&folder, "tile.tsv", &["1\t1\t9\t0,0;50,0;50,50"]);
    }

    let config = tsv_config(
        InputSource::Directory(input_dir.path().into()),
        Destination::File { out_folder: out_dir.path().into() },
        ImageSource::Explicit { width: 200.0, height: 100.0 },
    );
    let (_cancel_tx, cancel) = watch::channel(false);
    let summary = segload::run(config, cancel).await.unwrap();
    assert_eq!((summary.succeeded, summary.documents), (2, 2));

    for case in ["CASE-A.svs", "CASE-B.svs"] {
        let text = std::fs::read_to_string(out_dir.path().join(format!("{case}.tile.tsv.json"))).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}

#[tokio::test]
async fn invalid_configuration_fails_before_any_input() {
    let out_dir = tempfile::tempdir().unwrap();
    let config = tsv_config(
        InputSource::Directory(PathBuf::from("/definitely/not/here")),
        Destination::File { out_folder: out_dir.path().into() },
        ImageSource::Sink,
    );
    let (_cancel_tx, cancel) = watch::channel(false);
    let err = segload::run(config, cancel).await.unwrap_err();
    assert!(matches!(err, segload::LoaderError::Configuration(_)));
    assert!(std::fs::read_dir(out_dir.path()).unwrap().next().is_none());
}
