use super::*;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("should write test file");
    path
}

#[test]
fn missing_directory_is_data_load_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("does-not-exist");

    let result = load_directory(&missing);
    assert!(matches!(result, Err(SopError::DataLoad(_))));
}

#[test]
fn empty_directory_is_data_load_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = load_directory(temp_dir.path());
    assert!(matches!(result, Err(SopError::DataLoad(_))));
}

#[test]
fn unsupported_files_alone_count_as_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(&temp_dir, "notes.docx", "not supported");

    let result = load_directory(temp_dir.path());
    assert!(matches!(result, Err(SopError::DataLoad(_))));
}

#[test]
fn loads_text_documents_in_path_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(&temp_dir, "b_fees.txt", "Fee schedule for identity cards.");
    write_file(&temp_dir, "a_renewal.md", "# Renewal\n\nRenewal procedure.");

    let documents = load_directory(temp_dir.path()).expect("should load documents");

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].title, "a_renewal");
    assert_eq!(documents[1].title, "b_fees");
    assert_eq!(documents[0].pages.len(), 1);
    assert_eq!(documents[0].pages[0].page_number, 1);
    assert!(documents[1].pages[0].text.contains("Fee schedule"));
}

#[test]
fn empty_text_file_aborts_the_run() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(&temp_dir, "good.txt", "Some content.");
    write_file(&temp_dir, "bad.txt", "   \n");

    let result = load_directory(temp_dir.path());
    assert!(matches!(result, Err(SopError::DataLoad(_))));
}

#[test]
fn corrupt_pdf_aborts_the_run() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(&temp_dir, "real.txt", "Some content.");
    write_file(&temp_dir, "broken.pdf", "this is not a pdf");

    let result = load_directory(temp_dir.path());
    assert!(matches!(result, Err(SopError::DataLoad(_))));
}

#[test]
fn extension_matching_is_case_insensitive() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(&temp_dir, "upper.TXT", "Uppercase extension.");

    let documents = load_directory(temp_dir.path()).expect("should load documents");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].title, "upper");
}

#[test]
fn total_chars_sums_pages() {
    let document = Document {
        path: PathBuf::from("doc.pdf"),
        title: "doc".to_string(),
        pages: vec![
            PageText {
                page_number: 1,
                text: "abcd".to_string(),
            },
            PageText {
                page_number: 2,
                text: "ef".to_string(),
            },
        ],
    };

    assert_eq!(document.total_chars(), 6);
}
