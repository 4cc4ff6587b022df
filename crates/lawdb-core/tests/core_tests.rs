use std::fs;
use std::io::Write;
use tempfile::TempDir;

use lawdb_core::data_processor::{DataProcessor, SOURCE_KEY};

#[test]
fn process_file_one_passage_per_line() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("pipl.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "《个人信息保护法》第十三条规定，符合下列情形之一的，个人信息处理者方可处理个人信息").unwrap();
    writeln!(f).unwrap();
    writeln!(f, "   《个人信息保护法》第十四条规定，基于个人同意处理个人信息的，该同意应当由个人在充分知情的前提下自愿、明确作出   ").unwrap();

    let processor = DataProcessor::new();
    let passages = processor.process_file(&file_path).expect("process");

    assert_eq!(passages.len(), 2, "blank lines are skipped");
    assert!(passages[1].text.starts_with("《个人信息保护法》第十四条"), "lines are trimmed");
    assert_eq!(passages[0].metadata.line_number, Some(1));
    assert_eq!(passages[1].metadata.line_number, Some(3), "line numbers count blank lines");
    assert_eq!(passages[1].metadata.article.as_deref(), Some("第十四条"));
}

#[test]
fn process_directory_tags_source_and_sorts_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b_criminal.txt"), "《刑法》第一条规定，为了惩罚犯罪，保护人民").unwrap();
    fs::write(dir.join("a_civil.txt"), "《民法典》第一条规定，为了保护民事主体的合法权益").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let processor = DataProcessor::new();
    let passages = processor.process_path(dir).expect("process dir");

    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].metadata.law.as_deref(), Some("《民法典》"));
    assert_eq!(passages[0].metadata.extra.get(SOURCE_KEY).map(String::as_str), Some("a_civil"));
    assert_eq!(passages[1].metadata.extra.get(SOURCE_KEY).map(String::as_str), Some("b_criminal"));
}

#[test]
fn empty_directory_yields_no_passages() {
    let tmp = TempDir::new().unwrap();
    let passages = DataProcessor::new().process_directory(tmp.path()).expect("process");
    assert!(passages.is_empty());
}
