//! Batch ingestion through the SQLite adapter: ledger, reruns and version
//! reconciliation across files.

use citeflow::SqliteStore;
use citeflow_ingest::{
    discover_inputs, BatchDriver, FileLedger, FileOutcome, FieldValue, Reconciler, RecordAssembler,
    RecordSchema, RecordStore,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

fn article(pmid: &str, version: u32, title: &str) -> String {
    format!(
        r#"<PubmedArticle>
  <MedlineCitation Status="MEDLINE">
    <PMID Version="{version}">{pmid}</PMID>
    <Article>
      <Journal><Title>Journal of Tests</Title></Journal>
      <ArticleTitle>{title}</ArticleTitle>
    </Article>
  </MedlineCitation>
</PubmedArticle>
"#
    )
}

fn write_gz(dir: &Path, name: &str, articles: &[String]) {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<PubmedArticleSet>\n");
    for a in articles {
        xml.push_str(a);
    }
    xml.push_str("</PubmedArticleSet>\n");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(xml.as_bytes()).unwrap();
    std::fs::write(dir.join(name), encoder.finish().unwrap()).unwrap();
}

fn schema() -> Arc<RecordSchema> {
    Arc::new(RecordSchema::pubmed().unwrap())
}

fn driver(store: &Arc<SqliteStore>) -> BatchDriver {
    let assembler = RecordAssembler::new(schema());
    BatchDriver::new(assembler, Reconciler::new(store.clone()), store.clone())
}

fn extensions() -> Vec<String> {
    vec!["xml".to_string(), "gz".to_string()]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_ingest_and_rerun() {
    let tmp = tempfile::TempDir::new().unwrap();
    let input_dir = tmp.path().join("baseline");
    std::fs::create_dir_all(&input_dir).unwrap();

    // The update file carries a newer version of 1 and a stale one of 2.
    write_gz(&input_dir, "pubmed0001.xml.gz", &[article("1", 1, "Old"), article("2", 2, "Kept")]);
    write_gz(&input_dir, "pubmed0002.xml.gz", &[article("1", 2, "New"), article("2", 1, "Stale")]);

    let store = Arc::new(SqliteStore::open(&tmp.path().join("db/citeflow.sqlite3"), schema()).await.unwrap());
    let inputs = discover_inputs(&input_dir, &extensions()).unwrap();
    assert_eq!(inputs.len(), 2);

    let report = driver(&store).run(&inputs).await;
    assert!(!report.has_failures());
    assert_eq!(report.count(FileOutcome::Completed), 2);
    assert_eq!(report.records_seen(), 4);
    assert_eq!(report.upserted(), 3);
    assert_eq!(report.skipped(), 1);

    let one = store.get("1").await.unwrap().unwrap();
    assert_eq!(one.version, 2);
    assert_eq!(one.source_file, "pubmed0002.xml.gz");
    assert_eq!(one.field("title"), Some(&FieldValue::Text("New".to_string())));
    let two = store.get("2").await.unwrap().unwrap();
    assert_eq!(two.version, 2);
    assert_eq!(two.text("title"), "Kept");

    let ledger = store.entries().await.unwrap();
    let ids: Vec<_> = ledger.iter().map(|e| e.file_id.as_str()).collect();
    assert_eq!(ids, vec!["pubmed0001.xml.gz", "pubmed0002.xml.gz"]);
    assert_eq!(ledger[1].skipped, 1);

    // Rerun against the same database: every file is already in the ledger.
    let rerun = driver(&store).run(&inputs).await;
    assert_eq!(rerun.count(FileOutcome::AlreadyIngested), 2);
    assert_eq!(rerun.records_seen(), 0);
    assert_eq!(store.db().citation_count().await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_truncated_file_keeps_prefix_and_stays_out_of_ledger() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut xml = String::from("<PubmedArticleSet>\n");
    xml.push_str(&article("10", 1, "Before the cut"));
    xml.push_str("<PubmedArticle><MedlineCitation><PMID Version=\"1\">11</PMID>");
    std::fs::write(tmp.path().join("cut.xml"), xml).unwrap();

    let store = Arc::new(SqliteStore::open(&tmp.path().join("citeflow.sqlite3"), schema()).await.unwrap());
    let inputs = discover_inputs(tmp.path(), &["xml".to_string()]).unwrap();
    let report = driver(&store).run(&inputs).await;

    assert!(report.has_failures());
    assert_eq!(report.files[0].outcome, FileOutcome::Corrupt);
    assert_eq!(report.upserted(), 1);
    assert_eq!(store.current_version("10").await.unwrap(), Some(1));
    assert_eq!(store.current_version("11").await.unwrap(), None);
    assert!(!store.is_complete("cut.xml").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reopened_database_remembers_ledger() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_gz(tmp.path(), "pubmed0003.xml.gz", &[article("7", 1, "Seven")]);
    let db_path = tmp.path().join("citeflow.sqlite3");
    let inputs = discover_inputs(tmp.path(), &["gz".to_string()]).unwrap();

    {
        let store = Arc::new(SqliteStore::open(&db_path, schema()).await.unwrap());
        let report = driver(&store).run(&inputs).await;
        assert_eq!(report.count(FileOutcome::Completed), 1);
    }

    let store = Arc::new(SqliteStore::open(&db_path, schema()).await.unwrap());
    let report = driver(&store).run(&inputs).await;
    assert_eq!(report.files[0].outcome, FileOutcome::AlreadyIngested);
    assert_eq!(store.get("7").await.unwrap().unwrap().text("title"), "Seven");
}
