use std::path::PathBuf;

use coverforge::{BatchOpts, CoverError, TemplateRegistry, read_rows, run_batch};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "coverforge_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn setup_registry(root: &PathBuf) -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.load_with_default(&root.join("templates")).unwrap();
    registry
}

#[test]
fn csv_to_batch_end_to_end() {
    let root = temp_dir("csv_e2e");
    std::fs::create_dir_all(&root).unwrap();
    let registry = setup_registry(&root);

    let csv_path = root.join("batch.csv");
    std::fs::write(
        &csv_path,
        "template_key,output_name,text.title,Text.title.Color\n\
         default,one.png,First,#ff0000\n\
         default,two.png,Second,\n\
         default,one.png,Collides,\n",
    )
    .unwrap();

    let rows = read_rows(&csv_path).unwrap();
    assert_eq!(rows.len(), 3);
    let first = rows[0].input.as_ref().unwrap();
    assert_eq!(first.texts["title"], "First");
    assert_eq!(first.text_colors["title"], "#ff0000");

    let out_dir = root.join("out");
    let report = run_batch(&registry, rows, &out_dir, BatchOpts::default()).unwrap();
    assert_eq!(report.rendered.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        CoverError::OutputCollision(_)
    ));
    assert!(out_dir.join("one.png").exists());
    assert!(out_dir.join("two.png").exists());

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn utf8_bom_in_header_is_transparent() {
    let root = temp_dir("csv_bom");
    std::fs::create_dir_all(&root).unwrap();

    let csv_path = root.join("batch.csv");
    let mut bytes = vec![0xef, 0xbb, 0xbf];
    bytes.extend_from_slice(b"template_key,output_name\ndefault,a.png\n");
    std::fs::write(&csv_path, &bytes).unwrap();

    let rows = read_rows(&csv_path).unwrap();
    assert_eq!(rows[0].input.as_ref().unwrap().template_key, "default");

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn case_mismatched_key_column_is_reported_not_fuzzed() {
    let root = temp_dir("csv_case");
    std::fs::create_dir_all(&root).unwrap();
    let registry = setup_registry(&root);

    // The template key is `title`; `Text.TITLE` is a different key and
    // must surface as unknown rather than silently matching.
    let csv_path = root.join("batch.csv");
    std::fs::write(
        &csv_path,
        "template_key,output_name,Text.TITLE\ndefault,a.png,Hello\n",
    )
    .unwrap();

    let rows = read_rows(&csv_path).unwrap();
    let report = run_batch(&registry, rows, &root.join("out"), BatchOpts::default()).unwrap();
    assert!(report.rendered.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(
        report.failures[0]
            .error
            .to_string()
            .contains("text.TITLE")
    );

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn header_with_legacy_columns_rejects_the_file() {
    let root = temp_dir("csv_legacy");
    std::fs::create_dir_all(&root).unwrap();

    let csv_path = root.join("batch.csv");
    std::fs::write(
        &csv_path,
        "template_key,output_name,screenshot\ndefault,a.png,x.png\n",
    )
    .unwrap();

    let err = read_rows(&csv_path).unwrap_err();
    assert!(matches!(err, CoverError::Input(_)));

    std::fs::remove_dir_all(&root).ok();
}
