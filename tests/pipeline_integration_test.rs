// ==========================================
// 导入管道集成测试
// ==========================================
// 测试目标: 文件 → 解析 → 校验 → 确认 → 逐条创建（SQLite 用户表）
// ==========================================


use bulk_import::config::ImportConfig;
use bulk_import::domain::{FieldSchema, FieldValue, RecordStatus, UserType};
use bulk_import::importer::{
    ChannelEventPublisher, ImportError, ImportPipeline, PipelineEvent, PipelineStage, SourceFile,
    TemplateGenerator, UniversalFileParser,
};
use bulk_import::logging;
use bulk_import::repository::UserRepository;
use std::collections::HashSet;
use std::sync::Arc;
use test_helpers::{create_test_db, write_import_file, RecordingSink};

const MIXED_CSV: &str = "\u{feff}email;user_type;first_name;center_id;allowed_groups;specialty\r\n\
    ana@centro.es;ADMINISTRADOR;Ana;;;\r\n\
    ;PROFESOR;SinEmail;4;;\r\n\
    luis@centro.es;ORIENTADOR;Luis;;;\r\n\
    \r\n\
    eva@centro.es;EXAMINADOR;Eva;;\"[\"1A\",\"1B\"]\";\r\n\
    no-es-email;ALUMNO;X;-3;;\r\n\
    marta@centro.es;CLINICO;Marta;;;\r\n";

#[tokio::test]
async fn test_csv_file_end_to_end_into_sqlite() {
    logging::init_test();

    let (_db_file, db_path) = create_test_db().expect("Failed to create test db");
    let repo = Arc::new(UserRepository::new(&db_path).expect("Failed to open repo"));
    let import_file = write_import_file(".csv", MIXED_CSV).expect("Failed to write csv");

    let mut pipeline = ImportPipeline::from_config(&ImportConfig::default(), repo.clone());
    let summary = pipeline
        .select_file(SourceFile::Path(import_file.path().to_path_buf()))
        .await
        .expect("select_file failed");

    // 空行不占行号：6 行数据
    assert_eq!(summary.total, 6);
    assert_eq!(summary.valid, 2);
    assert_eq!(summary.with_warnings, 2);
    assert_eq!(summary.invalid, 2);

    let review = pipeline.review().expect("review missing");
    let invalid_rows: Vec<usize> = review.report.invalid.iter().map(|r| r.row_number).collect();
    assert_eq!(invalid_rows, vec![2, 5]);

    // 第 5 行累积全部诊断，不短路
    let row5 = &review.report.invalid[1];
    assert_eq!(row5.errors().len(), 2);
    assert!(row5.errors()[0].contains("no-es-email"));
    assert!(row5.errors()[1].contains("ALUMNO"));
    assert!(row5.warnings()[0].contains("-3"));

    let result = pipeline.confirm_import().await.expect("import failed");
    assert_eq!((result.total, result.succeeded, result.failed), (4, 4, 0));

    let stored: Vec<String> = repo
        .list_all()
        .unwrap()
        .into_iter()
        .map(|u| u.email)
        .collect();
    assert_eq!(
        stored,
        vec!["ana@centro.es", "luis@centro.es", "eva@centro.es", "marta@centro.es"]
    );

    let eva = repo.find_by_email("eva@centro.es").unwrap().unwrap();
    assert_eq!(eva.user_type, UserType::Examinador);
    assert_eq!(eva.allowed_groups, vec!["1A", "1B"]);
}

#[tokio::test]
async fn test_partial_failure_tally_and_progress_events() {
    logging::init_test();

    let (_db_file, db_path) = create_test_db().expect("Failed to create test db");
    let repo = Arc::new(UserRepository::new(&db_path).expect("Failed to open repo"));

    // 第 2、4 行的邮箱已存在 → 唯一约束失败
    for email in ["u2@x.com", "u4@x.com"] {
        let user = bulk_import::importer::FieldMapper
            .map_user(
                &bulk_import::domain::RawRecord::new()
                    .with("email", email)
                    .with("user_type", "ADMINISTRADOR"),
            )
            .unwrap();
        repo.insert(&user).unwrap();
    }

    let csv: String = std::iter::once("email;user_type".to_string())
        .chain((1..=5).map(|i| format!("u{}@x.com;ADMINISTRADOR", i)))
        .collect::<Vec<_>>()
        .join("\n");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut pipeline = ImportPipeline::from_config(&ImportConfig::default(), repo.clone())
        .with_publisher(Arc::new(ChannelEventPublisher::new(tx)));

    pipeline
        .select_file(SourceFile::blob("usuarios.csv", csv))
        .await
        .unwrap();
    let result = pipeline.confirm_import().await.unwrap();

    assert_eq!((result.total, result.succeeded, result.failed), (5, 3, 2));
    assert!(result.is_consistent());

    let failed: Vec<usize> = result.failures().map(|o| o.row_number).collect();
    assert_eq!(failed, vec![2, 4]);
    assert!(matches!(
        &result.outcomes[1].status,
        RecordStatus::Failed { reason } if reason.contains("u2@x.com")
    ));

    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::Progress { percent } = event {
            progress.push(percent);
        }
    }
    assert_eq!(progress, vec![20, 40, 60, 80, 100]);
    assert_eq!(repo.count().unwrap(), 5);
}

#[tokio::test]
async fn test_only_eligible_rows_reach_create() {
    let json = r#"[
        {"email": "a@x.com", "user_type": "ADMINISTRADOR"},
        {"email": "b@x.com", "user_type": "SUPERUSUARIO"},
        {"email": "c@x.com", "user_type": "EXAMINADOR", "allowed_groups": []},
        {"user_type": "CLINICO", "specialty": "logopedia"},
        {"email": "d@x.com", "user_type": "CLINICO", "specialty": null}
    ]"#;
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = ImportPipeline::from_config(&ImportConfig::default(), sink.clone());

    pipeline
        .select_file(SourceFile::blob("usuarios.json", json))
        .await
        .unwrap();

    let review = pipeline.review().unwrap();
    let eligible: HashSet<String> = review
        .report
        .eligible()
        .iter()
        .map(|r| r.record.text("email").to_string())
        .collect();

    let result = pipeline.confirm_import().await.unwrap();
    let called: HashSet<String> = sink.calls().into_iter().collect();

    assert_eq!(called, eligible);
    assert_eq!(sink.calls(), vec!["a@x.com", "c@x.com", "d@x.com"]);
    assert_eq!(result.total, 3);
}

#[tokio::test]
async fn test_all_invalid_file_refuses_import() {
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = ImportPipeline::from_config(&ImportConfig::default(), sink.clone());

    pipeline
        .select_file(SourceFile::blob(
            "usuarios.csv",
            "email;user_type\n;PROFESOR\nmal;NADIE\n",
        ))
        .await
        .unwrap();

    let err = pipeline.confirm_import().await.unwrap_err();
    assert!(matches!(err, ImportError::NothingToImport));
    assert_eq!(pipeline.stage(), PipelineStage::ReviewingResults);
    assert!(sink.calls().is_empty());

    pipeline.reset().unwrap();
    assert_eq!(pipeline.stage(), PipelineStage::Idle);
}

#[tokio::test]
async fn test_pipeline_can_run_again_after_reset() {
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = ImportPipeline::from_config(&ImportConfig::default(), sink.clone());

    for email in ["uno@x.com", "dos@x.com"] {
        let csv = format!("email;user_type\n{};ADMINISTRADOR\n", email);
        pipeline
            .select_file(SourceFile::blob("u.csv", csv))
            .await
            .unwrap();
        pipeline.confirm_import().await.unwrap();
        pipeline.reset().unwrap();
    }

    assert_eq!(sink.calls(), vec!["uno@x.com", "dos@x.com"]);
}

#[tokio::test]
async fn test_template_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let schema = FieldSchema::user_import();
    let mut example = TemplateGenerator::user_example();

    let path = TemplateGenerator::write_to(dir.path(), "usuarios", &schema, &example).unwrap();
    let records = UniversalFileParser.parse_path(&path).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("allowed_groups"),
        Some(&FieldValue::list(["1A", "1B"]))
    );
    example.remove("allowed_groups");
    for (field, value) in &example {
        assert_eq!(records[0].text(field), value.as_str(), "campo {}", field);
    }

    // 模板示例行本身可以通过校验
    let mut pipeline =
        ImportPipeline::from_config(&ImportConfig::default(), Arc::new(RecordingSink::default()));
    let summary = pipeline.select_file(SourceFile::Path(path)).await.unwrap();
    assert_eq!(summary.invalid, 0);
}

#[tokio::test]
async fn test_non_canonical_values_never_reach_create() {
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = ImportPipeline::from_config(&ImportConfig::default(), sink.clone());

    let summary = pipeline
        .select_file(SourceFile::blob(
            "usuarios.json",
            r#"[{"email": " a@x.com ", "user_type": "administrador"}]"#,
        ))
        .await
        .unwrap();

    assert_eq!((summary.valid, summary.invalid), (0, 1));
    let errors = pipeline.review().unwrap().report.invalid[0].errors().to_vec();
    assert_eq!(
        errors,
        vec![
            "Formato de email inválido:  a@x.com ".to_string(),
            "Tipo de usuario inválido: administrador".to_string(),
        ]
    );

    let err = pipeline.confirm_import().await.unwrap_err();
    assert!(matches!(err, ImportError::NothingToImport));
    assert!(sink.calls().is_empty());
}
