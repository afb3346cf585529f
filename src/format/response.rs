use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// Backend payloads are untrusted: every field deserializes leniently and falls
// back to its default instead of failing the whole response.

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    DepartmentAttendance(DepartmentAttendance),
    ClassAttendance(ClassAttendance),
    AllLatecomers(LatecomerReport),
    ClassLatecomers(LatecomerReport),
    StudentInfo(StudentInfo),
    Summary(SummaryReport),
    Analytics(AnalyticsReport),
    Predictions(PredictionsReport),
    Insights(InsightsReport),
    Comparison(ComparisonReport),
    Help(HelpReport),
    Error { message: String },
    Other { kind: String, message: Option<String> },
}

impl QueryResponse {
    pub fn from_value(value: &Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match kind.as_str() {
            "department_attendance" => Self::DepartmentAttendance(parse_or_default(value)),
            "class_attendance" => Self::ClassAttendance(parse_or_default(value)),
            "all_latecomers" => Self::AllLatecomers(parse_or_default(value)),
            "class_latecomers" => Self::ClassLatecomers(parse_or_default(value)),
            "student_info" => Self::StudentInfo(parse_or_default(value)),
            "summary" => Self::Summary(parse_or_default(value)),
            "analytics" => Self::Analytics(parse_or_default(value)),
            "predictions" => Self::Predictions(parse_or_default(value)),
            "insights" => Self::Insights(parse_or_default(value)),
            "comparison" => Self::Comparison(parse_or_default(value)),
            "help" => Self::Help(parse_or_default(value)),
            "error" => Self::Error {
                message: value.get("message").map(text).unwrap_or_default(),
            },
            _ => Self::Other {
                message: value
                    .get("message")
                    .map(text)
                    .filter(|message| !message.trim().is_empty()),
                kind,
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::DepartmentAttendance(_) => "department_attendance",
            Self::ClassAttendance(_) => "class_attendance",
            Self::AllLatecomers(_) => "all_latecomers",
            Self::ClassLatecomers(_) => "class_latecomers",
            Self::StudentInfo(_) => "student_info",
            Self::Summary(_) => "summary",
            Self::Analytics(_) => "analytics",
            Self::Predictions(_) => "predictions",
            Self::Insights(_) => "insights",
            Self::Comparison(_) => "comparison",
            Self::Help(_) => "help",
            Self::Error { .. } => "error",
            Self::Other { kind, .. } => kind.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DepartmentAttendance {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient")]
    pub summary: DepartmentSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DepartmentSummary {
    #[serde(deserialize_with = "lenient_u64")]
    pub total_students: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_present: u64,
    #[serde(deserialize_with = "lenient_f64")]
    pub overall_percentage: f64,
    #[serde(deserialize_with = "lenient_vec")]
    pub classes: Vec<ClassSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassSummary {
    #[serde(deserialize_with = "lenient_string")]
    pub class_name: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub present: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub absent: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub late: u64,
    #[serde(deserialize_with = "lenient_f64")]
    pub percentage: f64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_students: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassAttendance {
    #[serde(deserialize_with = "lenient_string")]
    pub class_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient")]
    pub summary: ClassStats,
    #[serde(deserialize_with = "lenient_vec")]
    pub students: Vec<StudentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassStats {
    #[serde(deserialize_with = "lenient_u64")]
    pub total_students: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub present: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub absent: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub late: u64,
    #[serde(deserialize_with = "lenient_f64")]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StudentStatus {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub roll: String,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_late: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LatecomerReport {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub class_name: String,
    #[serde(deserialize_with = "lenient_vec")]
    pub latecomers: Vec<Latecomer>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Latecomer {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub roll: String,
    #[serde(rename = "class", deserialize_with = "lenient_string")]
    pub class_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StudentInfo {
    #[serde(deserialize_with = "lenient")]
    pub student: StudentProfile,
    #[serde(deserialize_with = "lenient")]
    pub stats: StudentStats,
    #[serde(deserialize_with = "lenient_vec")]
    pub recent_history: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StudentProfile {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub roll: String,
    #[serde(deserialize_with = "lenient_string")]
    pub class_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StudentStats {
    #[serde(deserialize_with = "lenient_f64")]
    pub attendance_percentage: f64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_days: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub present_days: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub absent_days: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub late_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_late: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SummaryReport {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient")]
    pub summary: DepartmentSummary,
    #[serde(deserialize_with = "lenient_vec")]
    pub trend: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrendPoint {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsReport {
    #[serde(deserialize_with = "lenient_string")]
    pub date_range: String,
    #[serde(deserialize_with = "lenient_option")]
    pub statistics: Option<AnalyticsStatistics>,
    #[serde(deserialize_with = "lenient_option")]
    pub patterns: Option<WeekdayPatterns>,
    #[serde(deserialize_with = "lenient_vec")]
    pub chart_data: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsStatistics {
    #[serde(deserialize_with = "lenient_f64")]
    pub average_attendance: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub trend_direction: String,
    #[serde(deserialize_with = "lenient_option")]
    pub best_day: Option<TrendPoint>,
    #[serde(deserialize_with = "lenient_option")]
    pub worst_day: Option<TrendPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeekdayPatterns {
    #[serde(deserialize_with = "lenient_string")]
    pub best_day: String,
    #[serde(deserialize_with = "lenient_string")]
    pub worst_day: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictionsReport {
    #[serde(deserialize_with = "lenient_string")]
    pub current_trend: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub historical_average: f64,
    #[serde(deserialize_with = "lenient_vec")]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Prediction {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub predicted_attendance: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InsightsReport {
    #[serde(deserialize_with = "lenient_f64")]
    pub current_average: f64,
    #[serde(deserialize_with = "lenient_vec")]
    pub insights: Vec<Insight>,
    #[serde(deserialize_with = "lenient_vec")]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Insight {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComparisonReport {
    #[serde(deserialize_with = "lenient_option")]
    pub week_comparison: Option<WeekComparison>,
    #[serde(deserialize_with = "lenient_option")]
    pub top_performer: Option<ClassRanking>,
    #[serde(deserialize_with = "lenient_option")]
    pub needs_attention: Option<ClassRanking>,
    #[serde(deserialize_with = "lenient_vec")]
    pub class_rankings: Vec<ClassRanking>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeekComparison {
    #[serde(deserialize_with = "lenient_f64")]
    pub current_week: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub last_week: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub change: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassRanking {
    #[serde(deserialize_with = "lenient_string")]
    pub class_name: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub attendance_percentage: f64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_students: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub present_students: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub late_students: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HelpReport {
    #[serde(deserialize_with = "lenient_vec")]
    pub commands: Vec<String>,
}

fn parse_or_default<T: DeserializeOwned + Default>(value: &Value) -> T {
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!("response payload fell back to defaults: {err}");
            T::default()
        }
    }
}

fn number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(raw) => raw.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(number(&raw))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    if let Some(exact) = raw.as_u64() {
        return Ok(exact);
    }
    Ok(number(&raw).max(0.0).round() as u64)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(text(&raw))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match &raw {
        Value::Bool(flag) => *flag,
        Value::Number(_) => number(&raw) != 0.0,
        Value::String(flag) => matches!(flag.trim(), "true" | "True" | "1"),
        _ => false,
    })
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    if !raw.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(raw).ok())
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    let Value::Array(items) = raw else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}
