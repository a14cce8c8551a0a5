//! End-to-end document walker tests with scripted collaborators.

use std::sync::Arc;

use serde_json::json;

use incident_graph::analysis::{build_timelines, describe_groups};
use incident_graph::collaborators::stub::{
    FailingEmbeddings, ScriptedClassifier, ScriptedExtractor, StaticEmbeddings,
};
use incident_graph::collaborators::{
    CharNgramTokenizer, DiscoveredEdge, RelationResponse, SentenceStructures, TimePlace,
    TokenUsage,
};
use incident_graph::graph::{CategoryType, RelationLabel};
use incident_graph::{
    Collaborators, Config, DocumentBuilder, EdgeType, EquivalenceGroups, GraphError, GraphStats,
    StructuralEdge, TraceLog,
};

const FIRST: &str = "午前10時、エスカレーターが自動停止した。";
const SECOND: &str = "エスカレーターが逆走した。";

fn escalator_report() -> serde_json::Value {
    json!({
        "エスカレーター事故": {
            "事故の概要": format!("{}{}", FIRST, SECOND),
            "原因": "荷重オーバー"
        }
    })
}

fn scripted_extractor() -> ScriptedExtractor {
    ScriptedExtractor::new()
        .with_sentence(
            FIRST,
            TimePlace {
                time: vec!["午前10時".to_string()],
                place: vec![],
            },
            SentenceStructures {
                predicates: vec!["エスカレーター(ガ格), 自動停止した(述語)".to_string()],
                entities: vec![],
            },
        )
        .with_sentence(
            SECOND,
            TimePlace::default(),
            SentenceStructures {
                predicates: vec!["エスカレーター(ガ格), 逆走した(述語)".to_string()],
                entities: vec![],
            },
        )
}

fn embeddings() -> StaticEmbeddings {
    StaticEmbeddings::new(2)
        .with("エスカレーターが自動停止した", vec![1.0, 0.0])
        .with("エスカレーターが逆走した", vec![1.0, 0.1])
}

fn collaborators(classifier: Arc<ScriptedClassifier>) -> Collaborators {
    Collaborators {
        extractor: Arc::new(scripted_extractor()),
        classifier,
        embeddings: Arc::new(embeddings()),
        tokenizer: Arc::new(CharNgramTokenizer::default()),
        usage: TokenUsage::new(),
    }
}

/// Node ids of the escalator report, in creation order:
/// 1 root, 2 document, 3 "事故の概要", 4 "午前10時", 5 / 6 predicates,
/// 7 "原因", 8 "荷重オーバー".
#[tokio::test]
async fn test_escalator_report_end_to_end() {
    let classifier = Arc::new(ScriptedClassifier::new().with_relations(RelationResponse {
        labels: vec![RelationLabel::new("as_like", "(y)は(x)のようである")],
        edges: vec![DiscoveredEdge {
            from: 6,
            to: 5,
            label: "as_like".to_string(),
        }],
    }));
    let mut builder = DocumentBuilder::new(
        &Config::default(),
        collaborators(classifier.clone()),
        TraceLog::in_memory(),
    );

    let reports = builder
        .process_json(&escalator_report(), "accidents")
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    assert_eq!(report.name, "エスカレーター事故");
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.items[0].label, "事故の概要");
    assert_eq!(report.items[0].temporal.accepted, vec![(5, 6)]);
    assert_eq!(report.items[0].discovery.registered, vec!["as_like".to_string()]);
    assert!(report.items[1].temporal.accepted.is_empty());
    assert!(report.items[1].discovery.edges.is_empty());
    assert_eq!(report.equivalence.edges.len(), 2);

    let store = builder.store();
    assert_eq!(store.category(1).unwrap().category_type, CategoryType::Collection);
    assert_eq!(store.category(2).unwrap().hierarchical_level, 2);
    assert_eq!(store.category(3).unwrap().hierarchical_level, 1);
    assert_eq!(store.lookup_text(4), "午前10時");
    assert_eq!(store.predicate(5).unwrap().render(), "エスカレーターが自動停止した");
    assert_eq!(store.lookup_text(8), "荷重オーバー");

    let has_edge = |edge_type: EdgeType, from: u64, to: u64| {
        store
            .all_edges()
            .iter()
            .any(|e| e.edge_type == edge_type && e.from == from && e.to == to)
    };
    assert!(has_edge(StructuralEdge::Sub.into(), 1, 2));
    assert!(has_edge(StructuralEdge::Sub.into(), 3, 4));
    assert!(has_edge(StructuralEdge::Sub.into(), 7, 8));
    assert!(has_edge(StructuralEdge::SpecificTime.into(), 5, 4));
    assert!(has_edge(StructuralEdge::NextTimeStamp.into(), 5, 6));
    assert!(has_edge(StructuralEdge::Equivalent.into(), 5, 6));
    assert!(has_edge(StructuralEdge::Equivalent.into(), 6, 5));
    assert!(has_edge(EdgeType::Discovered("as_like".to_string()), 6, 5));

    let stats = GraphStats::collect(store);
    assert_eq!(stats.nodes(), 8);
    assert_eq!(stats.edges_by_type["sub"], 7);
    assert_eq!(stats.edges, 12);

    // The one-node item "原因" is never sent for discovery.
    let calls = classifier.calls();
    assert_eq!(calls.iter().filter(|c| *c == "discover_relations").count(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "check_ordering").count(), 1);

    let lines = store.trace().lines();
    assert!(lines.contains(&"[category] 'accidents' (level=3, カテゴリ名)".to_string()));
    assert!(lines
        .iter()
        .any(|l| l.contains("[parsing results for document: エスカレーター事故]")));
    assert!(lines.iter().any(|l| l.starts_with("[SIMILARITY LOG]")));
}

#[tokio::test]
async fn test_groups_and_timelines_of_built_graph() {
    let mut builder = DocumentBuilder::new(
        &Config::default(),
        collaborators(Arc::new(ScriptedClassifier::new())),
        TraceLog::in_memory(),
    );
    builder
        .process_json(&escalator_report(), "accidents")
        .await
        .unwrap();
    let store = builder.into_store();

    let groups = EquivalenceGroups::from_store(&store);
    assert_eq!(groups.merged().count(), 1);
    assert_eq!(groups.group_of(5), Some(&[5, 6][..]));

    let text = describe_groups(&store, &groups);
    assert!(text.contains("  エスカレーターが逆走した\n"));
    assert!(text.contains("  [info_SpecificTime] 午前10時\n"));

    let timelines = build_timelines(&store);
    assert_eq!(timelines.len(), 1);
    assert_eq!(timelines[0].event_groups.len(), 1);
    assert!(timelines[0].event_groups[0].entities.contains(&4));
}

#[tokio::test]
async fn test_collaborator_failures_do_not_abort() {
    let collaborators = Collaborators {
        extractor: Arc::new(scripted_extractor()),
        classifier: Arc::new(ScriptedClassifier::failing()),
        embeddings: Arc::new(FailingEmbeddings),
        tokenizer: Arc::new(CharNgramTokenizer::default()),
        usage: TokenUsage::new(),
    };
    let mut builder =
        DocumentBuilder::new(&Config::default(), collaborators, TraceLog::in_memory());

    let reports = builder
        .process_json(&escalator_report(), "accidents")
        .await
        .unwrap();
    assert!(reports[0].equivalence.edges.is_empty());
    assert!(reports[0].items[0].discovery.edges.is_empty());

    let store = builder.store();
    assert_eq!(store.node_count(), 8);
    let lines = store.trace().lines();
    assert!(lines.iter().any(|l| l.starts_with("[SIMILARITY ERROR]")));
    assert!(lines.iter().any(|l| l.starts_with("[RELATION ERROR]")));
}

#[tokio::test]
async fn test_offline_collaborators_build_entities() {
    let mut builder = DocumentBuilder::new(
        &Config::default(),
        Collaborators::offline(),
        TraceLog::in_memory(),
    );
    let report = json!({
        "転落事故": {
            "概要": ["1. 乗客がホームから転落した。", "注 詳細は調査中"]
        }
    });

    builder.process_json(&report, "reports").await.unwrap();
    let store = builder.store();

    let texts: Vec<&str> = store.entities().iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["1.", "乗客がホームから転落した", "注", "注詳細は調査中"]);
    assert!(store.predicates().is_empty());
}

#[tokio::test]
async fn test_top_level_must_be_object() {
    let mut builder = DocumentBuilder::new(
        &Config::default(),
        Collaborators::offline(),
        TraceLog::in_memory(),
    );
    let err = builder
        .process_json(&json!(["not", "an", "object"]), "bad")
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput(_)));
}

// ============================================================================
// Agentless predicates of one sentence
// ============================================================================

const BRAKE_FAILURE: &str =
    "エスカレーターは、荷重オーバーで自動停止しさらにブレーキも効かず逆走・降下した。";

fn brake_failure_collaborators(classifier: Arc<ScriptedClassifier>) -> Collaborators {
    let extractor = ScriptedExtractor::new().with_sentence(
        BRAKE_FAILURE,
        TimePlace::default(),
        SentenceStructures {
            predicates: vec![
                "自動停止し(述語)".to_string(),
                "効かず(述語)".to_string(),
                "逆走・降下した(述語)".to_string(),
            ],
            entities: vec!["荷重オーバー".to_string()],
        },
    );
    Collaborators {
        extractor: Arc::new(extractor),
        classifier,
        embeddings: Arc::new(StaticEmbeddings::new(2)),
        tokenizer: Arc::new(CharNgramTokenizer::default()),
        usage: TokenUsage::new(),
    }
}

/// Ids: 1 root, 2 document, 3 "事故の概要", 4..=6 predicates, 7 "荷重オーバー".
#[tokio::test]
async fn test_brake_failure_sentence_is_ordered() {
    let mut builder = DocumentBuilder::new(
        &Config::default(),
        brake_failure_collaborators(Arc::new(ScriptedClassifier::new())),
        TraceLog::in_memory(),
    );
    let report = json!({ "エスカレーター事故": { "事故の概要": BRAKE_FAILURE } });
    let reports = builder.process_json(&report, "accidents").await.unwrap();

    let store = builder.store();
    let predicates: Vec<_> = store.predicates().iter().map(|p| p.id).collect();
    assert_eq!(predicates, vec![4, 5, 6]);
    let entities: Vec<_> = store.entities().iter().map(|e| (e.id, e.text.as_str())).collect();
    assert_eq!(entities, vec![(7, "荷重オーバー")]);

    let temporal = &reports[0].items[0].temporal;
    assert!(temporal.accepted.contains(&(4, 5)));
    assert!(temporal.accepted.contains(&(5, 6)));
    for (from, to) in [(4, 5), (5, 6)] {
        assert!(store.all_edges().iter().any(|e| {
            e.edge_type == StructuralEdge::NextTimeStamp.into() && e.from == from && e.to == to
        }));
    }

    assert!(store
        .trace()
        .lines()
        .contains(&"[residue] エスカレーターは、荷重オーバーでさらにブレーキも。".to_string()));
}

#[tokio::test]
async fn test_document_without_keys_is_one_item() {
    let classifier = Arc::new(ScriptedClassifier::new());
    let mut builder = DocumentBuilder::new(
        &Config::default(),
        brake_failure_collaborators(classifier.clone()),
        TraceLog::in_memory(),
    );
    let report = json!({ "エスカレーター事故": BRAKE_FAILURE });
    let reports = builder.process_json(&report, "accidents").await.unwrap();

    let items = &reports[0].items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "エスカレーター事故");
    assert_eq!(items[0].temporal.accepted, vec![(3, 4), (4, 5)]);
    assert_eq!(
        classifier
            .calls()
            .iter()
            .filter(|c| *c == "discover_relations")
            .count(),
        1
    );
    assert_eq!(builder.store().open_scope_count(), 0);
}

#[tokio::test]
async fn test_heading_markers_need_a_boundary() {
    let mut builder = DocumentBuilder::new(
        &Config::default(),
        Collaborators::offline(),
        TraceLog::in_memory(),
    );
    let report = json!({
        "段差事故": {
            "対応": ["注意喚起を行った", "3.5mの段差", "（株）東日本旅客鉄道", "・ 手すりを設置"]
        }
    });
    builder.process_json(&report, "reports").await.unwrap();

    let texts: Vec<&str> = builder
        .store()
        .entities()
        .iter()
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(
        texts,
        vec![
            "注意喚起を行った",
            "3.5mの段差",
            "（株）東日本旅客鉄道",
            "・",
            "・手すりを設置"
        ]
    );
}

#[tokio::test]
async fn test_token_usage_is_reported() {
    let usage = TokenUsage::new();
    usage.record(250);
    let collaborators = Collaborators {
        usage: usage.clone(),
        ..Collaborators::offline()
    };
    let mut builder =
        DocumentBuilder::new(&Config::default(), collaborators, TraceLog::in_memory());
    builder
        .process_json(&json!({ "事故": "停止した。" }), "accidents")
        .await
        .unwrap();

    assert_eq!(builder.token_usage().tokens, 250);
    assert!(builder
        .store()
        .trace()
        .lines()
        .contains(&"[TOKEN USAGE] 'accidents': 1 calls, 250 tokens in total".to_string()));
}
