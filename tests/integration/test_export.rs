//! Build, export and re-import through the file system.

use std::fs;

use tempfile::TempDir;

use incident_graph::analysis::groups::display_text;
use incident_graph::export::{CATEGORY_FILE, EDGE_FILE};
use incident_graph::{
    export_csv, import_csv, Collaborators, Config, DocumentBuilder, GraphStats, TraceLog,
};

const REPORT: &str = r#"{
  "ホーム転落事故": {
    "事故の概要": "乗客がホームから転落した。列車が緊急停止した。",
    "対策": {
      "設備": ["1. ホームドアを設置する。", "注 一部の駅のみ"]
    }
  },
  "扉挟まれ事故": {
    "概要": "乗客の荷物が扉に挟まれた。"
  }
}"#;

#[tokio::test]
async fn test_build_export_import_round_trip() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("鉄道事故.json");
    fs::write(&input, REPORT).unwrap();

    let config = Config::default();
    let trace = TraceLog::create(temp.path().join("logs")).unwrap();
    let mut builder = DocumentBuilder::new(&config, Collaborators::offline(), trace.clone());
    let reports = builder.process_file(&input).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].name, "ホーム転落事故");
    assert_eq!(reports[1].name, "扉挟まれ事故");

    let store = builder.into_store();
    assert_eq!(store.category(1).unwrap().title, "鉄道事故");

    let out = temp.path().join("results");
    let result = export_csv(&store, &out).unwrap();
    assert_eq!(result.categories, store.categories().len());
    assert_eq!(result.edges, store.edge_count());

    let categories = fs::read_to_string(out.join(CATEGORY_FILE)).unwrap();
    assert!(categories.contains(",2,文書名,ホーム転落事故"));
    assert!(categories.contains(",0,項目名,設備"));
    let edges = fs::read_to_string(out.join(EDGE_FILE)).unwrap();
    assert!(edges.lines().nth(1).unwrap().starts_with("1,sub,1,2"));

    let imported = import_csv(&out).unwrap();
    assert_eq!(GraphStats::collect(&imported), GraphStats::collect(&store));
    for node in store.entities() {
        assert_eq!(display_text(&imported, node.id), node.text);
    }

    trace.flush();
    let log = fs::read_to_string(trace.path().unwrap()).unwrap();
    assert!(log.contains("[parsing results for document: 扉挟まれ事故]"));
}

#[test]
fn test_empty_graph_exports_headers_only() {
    let temp = TempDir::new().unwrap();
    let store = incident_graph::GraphStore::new(TraceLog::in_memory());
    export_csv(&store, temp.path()).unwrap();

    let edges = fs::read_to_string(temp.path().join(EDGE_FILE)).unwrap();
    assert_eq!(edges.trim_end(), "index,type,from,to");
    assert_eq!(import_csv(temp.path()).unwrap().node_count(), 0);
}
