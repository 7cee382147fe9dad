//! Snapshot format tests

use std::collections::HashSet;

use learnhub_model::{BackupSnapshot, ModelError, SnapshotCounts, SNAPSHOT_VERSION};

const LEGACY_SNAPSHOT: &str = r#"{
  "users": [
    {
      "id": "clu1",
      "name": "Ana Souza",
      "email": "ana@example.com",
      "password": "$2a$10$abc",
      "points": 120,
      "level": 2,
      "isAdmin": false,
      "planId": null,
      "aiRequestsLimit": 10,
      "aiRequestsUsed": 7,
      "createdAt": "2024-05-01T12:00:00.000Z",
      "updatedAt": "2024-05-02T08:30:00.000Z"
    }
  ],
  "modules": [
    {
      "id": "mod1",
      "title": "Fundamentos",
      "description": "Primeiros passos",
      "level": "BASIC",
      "order": 1,
      "isActive": true,
      "courseId": null,
      "createdAt": "2024-05-01T12:00:00.000Z",
      "updatedAt": "2024-05-01T12:00:00.000Z"
    }
  ],
  "lessons": [
    {
      "id": "les1",
      "title": "Variáveis",
      "content": "Uma variável guarda um valor.",
      "videoUrl": "https://videos.example.com/v1",
      "imageUrl": null,
      "codeExample": "let x = 1;",
      "order": 1,
      "moduleId": "mod1",
      "isActive": true,
      "createdAt": "2024-05-01T12:00:00.000Z",
      "updatedAt": "2024-05-01T12:00:00.000Z"
    }
  ],
  "quizzes": [
    {
      "id": "qz1",
      "question": "O que é uma variável?",
      "options": "[\"Um valor nomeado\",\"Um laço\"]",
      "correctAnswer": 0,
      "lessonId": "les1",
      "order": 0,
      "isActive": true,
      "points": 10,
      "createdAt": "2024-05-01T12:00:00.000Z",
      "updatedAt": "2024-05-01T12:00:00.000Z"
    }
  ],
  "timestamp": "2024-05-03T00:00:00.000Z",
  "version": "1.0.0"
}"#;

fn legacy() -> BackupSnapshot {
    serde_json::from_str(LEGACY_SNAPSHOT).expect("legacy snapshot should parse")
}

#[test]
fn test_legacy_snapshot_loads() {
    let snapshot = legacy();
    assert_eq!(
        snapshot.counts(),
        SnapshotCounts {
            users: 1,
            modules: 1,
            lessons: 1,
            quizzes: 1
        }
    );
    assert_eq!(snapshot.users[0].ai_requests_used, 7);
    assert_eq!(snapshot.lessons[0].video_url.as_deref(), Some("https://videos.example.com/v1"));
    assert_eq!(snapshot.quizzes[0].options().unwrap().len(), 2);
    assert!(snapshot.check_version().is_ok());
    assert!(snapshot.validate_references().is_ok());
}

#[test]
fn test_new_snapshot_uses_millisecond_utc_timestamp() {
    let taken_at = chrono::DateTime::parse_from_rfc3339("2026-10-16T09:30:00.123456Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let snapshot = BackupSnapshot::new(vec![], vec![], vec![], vec![], taken_at);

    assert_eq!(snapshot.timestamp, "2026-10-16T09:30:00.123Z");
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.counts().total(), 0);
}

#[test]
fn test_unsupported_major_version_rejected() {
    let mut snapshot = legacy();
    snapshot.version = "2.0.0".to_string();
    assert!(matches!(
        snapshot.check_version(),
        Err(ModelError::UnsupportedVersion { .. })
    ));

    snapshot.version = "1.4.2".to_string();
    assert!(snapshot.check_version().is_ok());
}

#[test]
fn test_dangling_quiz_reference_reported() {
    let mut snapshot = legacy();
    snapshot.quizzes[0].lesson_id = "missing".to_string();

    match snapshot.validate_references() {
        Err(ModelError::DanglingReference { entity, id, .. }) => {
            assert_eq!(entity, "quiz");
            assert_eq!(id, "qz1");
        }
        other => panic!("expected dangling reference, got {other:?}"),
    }
}

#[test]
fn test_fresh_ids_keep_graph_connected() {
    let original = legacy();
    let fresh = original.clone().with_fresh_ids();

    assert_ne!(fresh.users[0].id, original.users[0].id);
    assert_ne!(fresh.modules[0].id, original.modules[0].id);
    assert_eq!(fresh.lessons[0].module_id, fresh.modules[0].id);
    assert_eq!(fresh.quizzes[0].lesson_id, fresh.lessons[0].id);
    assert!(fresh.validate_references().is_ok());

    let ids: HashSet<&str> = [
        fresh.users[0].id.as_str(),
        fresh.modules[0].id.as_str(),
        fresh.lessons[0].id.as_str(),
        fresh.quizzes[0].id.as_str(),
    ]
    .into_iter()
    .collect();
    assert_eq!(ids.len(), 4);
}
