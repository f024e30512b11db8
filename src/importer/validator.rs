// ==========================================
// 批量导入系统 - 行校验器实现
// ==========================================
// 阶段 1: 必填字段（硬） → 格式规则（硬） → 角色完整性（软） → 批次内规则（软）
// 红线: 所有规则都执行（不短路）；任何行都会落入三个分类之一
// ==========================================

use crate::domain::record::RawRecord;
use crate::domain::schema::{user_fields, FieldSchema};
use crate::domain::user::UserType;
use crate::domain::validation::{ValidatedRow, ValidationOutcome, ValidationReport};
use crate::i18n;
use crate::importer::import_traits::{BatchState, RuleContext, RuleSet};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email validation pattern to compile")
});

/// local@domain.tld 形式
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

// ==========================================
// UserRuleSet - 用户导入规则
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRuleSet;

impl RuleSet for UserRuleSet {
    fn format_errors(&self, record: &RawRecord, ctx: &RuleContext<'_>) -> Vec<String> {
        use user_fields::*;
        let mut errors = Vec::new();

        // 记录原样交给 create，因此按原始值校验（不去空白、不改大小写）
        if let Some(email) = record.get(EMAIL).filter(|v| !v.is_blank()) {
            let email = email.to_string();
            if !is_valid_email(&email) {
                errors.push(i18n::t_in(
                    ctx.locale,
                    "validation.invalid_email",
                    &[("value", email.as_str())],
                ));
            }
        }

        if let Some(user_type) = record.get(USER_TYPE).filter(|v| !v.is_blank()) {
            let user_type = user_type.to_string();
            if UserType::from_canonical(&user_type).is_none() {
                errors.push(i18n::t_in(
                    ctx.locale,
                    "validation.invalid_user_type",
                    &[("value", user_type.as_str())],
                ));
            }
        }

        errors
    }

    fn completeness_warnings(&self, record: &RawRecord, ctx: &RuleContext<'_>) -> Vec<String> {
        use user_fields::*;
        let mut warnings = Vec::new();

        if let Some(center_id) = record.get(CENTER_ID).filter(|v| !v.is_blank()) {
            let center_id = center_id.to_string();
            if !matches!(center_id.parse::<i64>(), Ok(id) if id > 0) {
                warnings.push(i18n::t_in(
                    ctx.locale,
                    "validation.non_numeric_center_id",
                    &[("value", center_id.as_str())],
                ));
            }
        }

        // 类型无法识别时已由格式规则报错，此处不再追加
        let user_type = match UserType::from_canonical(record.text(USER_TYPE)) {
            Some(t) => t,
            None => return warnings,
        };
        let args = [("user_type", user_type.as_str())];

        let expects = |field: &str| soft_expected(ctx, record, field);
        if user_type.expects_center() && expects(CENTER_ID) {
            warnings.push(i18n::t_in(ctx.locale, "validation.missing_center", &args));
        }
        if user_type.expects_groups() && expects(ALLOWED_GROUPS) {
            warnings.push(i18n::t_in(ctx.locale, "validation.missing_groups", &args));
        }
        if user_type.expects_specialty() && expects(SPECIALTY) {
            warnings.push(i18n::t_in(ctx.locale, "validation.missing_specialty", &args));
        }
        warnings
    }

    fn batch_warnings(
        &self,
        record: &RawRecord,
        row_number: usize,
        eligible: bool,
        ctx: &RuleContext<'_>,
        state: &mut BatchState,
    ) -> Vec<String> {
        let email = record.text(user_fields::EMAIL).trim().to_lowercase();
        if email.is_empty() {
            return Vec::new();
        }

        match state.first_seen.get(&email) {
            Some(first_row) => vec![i18n::t_in(
                ctx.locale,
                "validation.duplicate_email",
                &[("row", first_row.to_string().as_str())],
            )],
            None => {
                // 只登记会被导入的行
                if eligible {
                    state.first_seen.insert(email, row_number);
                }
                Vec::new()
            }
        }
    }
}

/// 角色字段缺失时是否给出软警告
///
/// 字段不在配置的模式中则不要求；已列为必填时由必填规则报错，不重复提示
fn soft_expected(ctx: &RuleContext<'_>, record: &RawRecord, field: &str) -> bool {
    ctx.schema.is_known(field) && !ctx.schema.is_required(field) && record.is_blank(field)
}

// ==========================================
// Validator - 行校验器
// ==========================================
pub struct Validator {
    schema: FieldSchema,
    rule_set: Box<dyn RuleSet>,
    locale: String,
}

impl Validator {
    pub fn new(schema: FieldSchema, rule_set: Box<dyn RuleSet>, locale: impl Into<String>) -> Self {
        Self {
            schema,
            rule_set,
            locale: locale.into(),
        }
    }

    /// 用户导入校验器
    pub fn for_users(schema: FieldSchema, locale: impl Into<String>) -> Self {
        Self::new(schema, Box::new(UserRuleSet), locale)
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// 校验全部行并分类
    ///
    /// 行号 = 在解析输出中的位置（从 1 开始）
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub fn validate(&self, rows: &[RawRecord]) -> ValidationReport {
        let ctx = RuleContext {
            schema: &self.schema,
            locale: &self.locale,
        };
        let mut state = BatchState::default();
        let mut report = ValidationReport::default();

        for (idx, record) in rows.iter().enumerate() {
            let row = self.validate_row(record, idx + 1, &ctx, &mut state);
            if !row.outcome.is_eligible() {
                debug!(row_number = row.row_number, errors = ?row.errors(), "行校验未通过");
            }
            report.push(row);
        }

        let summary = report.summary();
        info!(
            total = summary.total,
            valid = summary.valid,
            with_warnings = summary.with_warnings,
            invalid = summary.invalid,
            "校验完成"
        );
        report
    }

    fn validate_row(
        &self,
        record: &RawRecord,
        row_number: usize,
        ctx: &RuleContext<'_>,
        state: &mut BatchState,
    ) -> ValidatedRow {
        // 硬规则
        let mut errors = self.required_field_errors(record);
        errors.extend(self.rule_set.format_errors(record, ctx));
        let has_errors = !errors.is_empty();

        // 软规则
        let mut warnings = self.rule_set.completeness_warnings(record, ctx);
        warnings.extend(
            self.rule_set
                .batch_warnings(record, row_number, !has_errors, ctx, state),
        );

        let outcome = ValidationOutcome::classify(errors, warnings.clone());
        ValidatedRow {
            row_number,
            record: record.clone(),
            outcome,
            suppressed_warnings: if has_errors { warnings } else { Vec::new() },
        }
    }

    /// 必填字段：缺失或空白即报错
    fn required_field_errors(&self, record: &RawRecord) -> Vec<String> {
        self.schema
            .required_fields
            .iter()
            .filter(|field| record.is_blank(field))
            .map(|field| {
                i18n::t_in(
                    &self.locale,
                    "validation.required_missing",
                    &[("field", field.as_str())],
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::FieldValue;

    fn validator() -> Validator {
        Validator::for_users(FieldSchema::user_import(), "es")
    }

    fn user(email: &str, user_type: &str) -> RawRecord {
        RawRecord::new()
            .with("email", email)
            .with("user_type", user_type)
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("alice@x.com"));
        assert!(is_valid_email("a.b+c@sub.domain.es"));
        assert!(!is_valid_email("alice@x"));
        assert!(!is_valid_email("alice x@y.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("alice"));
    }

    #[test]
    fn test_missing_email_is_invalid() {
        let report = validator().validate(&[RawRecord::new().with("user_type", "ADMINISTRADOR")]);

        assert_eq!(report.invalid.len(), 1);
        let errors = report.invalid[0].errors();
        assert_eq!(errors, ["Campo obligatorio faltante: email"]);
    }

    #[test]
    fn test_blank_required_field_is_invalid() {
        let report = validator().validate(&[user("   ", "ADMINISTRADOR")]);
        assert_eq!(report.invalid.len(), 1);
        assert!(report.invalid[0].errors()[0].contains("email"));
    }

    #[test]
    fn test_errors_accumulate_without_short_circuit() {
        let report = validator().validate(&[RawRecord::new()
            .with("email", "not-an-email")
            .with("user_type", "ALUMNO")
            .with("center_id", "abc")]);

        let row = &report.invalid[0];
        assert_eq!(
            row.errors(),
            [
                "Formato de email inválido: not-an-email".to_string(),
                "Tipo de usuario inválido: ALUMNO".to_string(),
            ]
        );
        assert_eq!(row.warnings().len(), 1);
        assert!(row.warnings()[0].contains("abc"));
    }

    #[test]
    fn test_user_type_must_be_canonical() {
        let report = validator().validate(&[
            user("a@x.com", "administrador"),
            user("b@x.com", " PROFESOR"),
        ]);

        assert_eq!(report.invalid.len(), 2);
        assert_eq!(
            report.invalid[0].errors(),
            ["Tipo de usuario inválido: administrador".to_string()]
        );
        assert_eq!(
            report.invalid[1].errors(),
            ["Tipo de usuario inválido:  PROFESOR".to_string()]
        );
        // 角色完整性规则不对无效类型给出提示
        assert!(report.invalid[1].warnings().is_empty());
    }

    #[test]
    fn test_padded_email_is_invalid() {
        let report = validator().validate(&[user(" a@x.com ", "ADMINISTRADOR")]);

        assert_eq!(report.invalid.len(), 1);
        assert_eq!(
            report.invalid[0].errors(),
            ["Formato de email inválido:  a@x.com ".to_string()]
        );
    }

    #[test]
    fn test_non_numeric_center_is_a_warning() {
        let report = validator().validate(&[user("p@x.com", "PROFESOR").with("center_id", "C-12")]);

        assert!(report.invalid.is_empty());
        assert_eq!(report.with_warnings.len(), 1);
        assert_eq!(
            report.with_warnings[0].warnings(),
            ["Identificador de centro no numérico: C-12 (el backend podría rechazarlo)".to_string()]
        );
    }

    #[test]
    fn test_missing_both_required_fields() {
        let report = validator().validate(&[RawRecord::new().with("first_name", "Ana")]);
        let errors = report.invalid[0].errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("email"));
        assert!(errors[1].contains("user_type"));
    }

    #[test]
    fn test_role_warning_keeps_row_eligible() {
        let report = validator().validate(&[user("ori@x.com", "ORIENTADOR")]);

        assert!(report.invalid.is_empty());
        assert_eq!(report.with_warnings.len(), 1);
        let warnings = report.with_warnings[0].warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("center_id"));
        assert_eq!(report.eligible().len(), 1);
    }

    #[test]
    fn test_role_specific_fields_satisfied() {
        let rows = vec![
            user("p@x.com", "PROFESOR").with("center_id", "7"),
            user("e@x.com", "EXAMINADOR").with("allowed_groups", FieldValue::list(["G1"])),
            user("c@x.com", "CLINICO").with("specialty", "Logopedia"),
            user("a@x.com", "ADMINISTRADOR"),
        ];

        let report = validator().validate(&rows);
        assert_eq!(report.valid.len(), 4);
    }

    #[test]
    fn test_examiner_with_empty_group_list_warns() {
        let report = validator().validate(&[
            user("e@x.com", "EXAMINADOR").with("allowed_groups", FieldValue::List(vec![]))
        ]);
        assert_eq!(report.with_warnings.len(), 1);
        assert!(report.with_warnings[0].warnings()[0].contains("allowed_groups"));
    }

    #[test]
    fn test_invalid_row_keeps_warnings_for_display() {
        let report = validator().validate(&[user("bad-email", "CLINICO")]);

        assert_eq!(report.invalid.len(), 1);
        let row = &report.invalid[0];
        assert_eq!(row.errors().len(), 1);
        assert_eq!(row.warnings().len(), 1);
        assert!(row.warnings()[0].contains("specialty"));
    }

    #[test]
    fn test_duplicate_email_warns_on_later_rows() {
        let rows = vec![
            user("dup@x.com", "ADMINISTRADOR"),
            user("other@x.com", "ADMINISTRADOR"),
            user("DUP@x.com", "ADMINISTRADOR"),
        ];

        let report = validator().validate(&rows);
        assert_eq!(report.valid.len(), 2);
        assert_eq!(report.with_warnings.len(), 1);
        let row = &report.with_warnings[0];
        assert_eq!(row.row_number, 3);
        assert!(row.warnings()[0].contains("fila 1"));
    }

    #[test]
    fn test_duplicate_of_invalid_row_is_not_reported() {
        let rows = vec![
            user("dup@x.com", "ALUMNO"),
            user("dup@x.com", "ADMINISTRADOR"),
            user("dup@x.com", "ADMINISTRADOR"),
        ];

        let report = validator().validate(&rows);
        assert_eq!(report.invalid.len(), 1);
        assert_eq!(report.valid.len(), 1);
        assert_eq!(report.valid[0].row_number, 2);

        // 引用的是第一个会被导入的行
        assert_eq!(report.with_warnings.len(), 1);
        let row = &report.with_warnings[0];
        assert_eq!(row.row_number, 3);
        assert!(row.warnings()[0].contains("fila 2"));
    }

    #[test]
    fn test_role_warnings_follow_configured_schema() {
        // specialty 不在模式中；center_id 为必填
        let schema = FieldSchema::new(["email", "user_type", "center_id"], ["first_name"]);
        let validator = Validator::for_users(schema, "es");

        let report = validator.validate(&[
            user("c@x.com", "CLINICO"),
            user("p@x.com", "PROFESOR"),
        ]);

        assert_eq!(report.valid.len(), 0);
        assert_eq!(report.invalid.len(), 2);
        assert!(report.invalid.iter().all(|r| r.warnings().is_empty()));
        assert_eq!(
            report.invalid[1].errors(),
            ["Campo obligatorio faltante: center_id".to_string()]
        );
    }

    #[test]
    fn test_partition_property() {
        let rows = vec![
            user("a@x.com", "ADMINISTRADOR"),
            user("b@x.com", "ORIENTADOR"),
            RawRecord::new(),
            user("d@x.com", "DESCONOCIDO"),
            user("e@x.com", "PROFESOR").with("center_id", "3"),
        ];

        let report = validator().validate(&rows);
        assert_eq!(report.total(), rows.len());

        let mut numbers: Vec<usize> = report
            .valid
            .iter()
            .chain(&report.with_warnings)
            .chain(&report.invalid)
            .map(|r| r.row_number)
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        assert!(report.valid.iter().all(|r| r.outcome == ValidationOutcome::Valid));
        assert!(report
            .with_warnings
            .iter()
            .all(|r| matches!(r.outcome, ValidationOutcome::ValidWithWarnings(_))));
        assert!(report
            .invalid
            .iter()
            .all(|r| matches!(r.outcome, ValidationOutcome::Invalid(_))));
    }

    #[test]
    fn test_english_messages() {
        let validator = Validator::for_users(FieldSchema::user_import(), "en");
        let report = validator.validate(&[RawRecord::new().with("user_type", "PROFESOR")]);
        assert_eq!(report.invalid[0].errors()[0], "Missing required field: email");
    }

    #[test]
    fn test_custom_schema_required_fields() {
        let schema = FieldSchema::new(["email", "user_type", "first_name"], Vec::<String>::new());
        let validator = Validator::for_users(schema, "es");

        let report = validator.validate(&[user("a@x.com", "ADMINISTRADOR")]);
        assert_eq!(report.invalid.len(), 1);
        assert!(report.invalid[0].errors()[0].contains("first_name"));
    }
}
