pub mod markup;
pub mod response;

use crate::chart::{ChartData, ChartKind, ChartSpec};
use crate::config::SuggestionConfig;
use crate::export::{ClassRow, ExportData, LatecomerRow};
use crate::session::{TableRow, TableSpec};
use crate::tier::{confidence_marker, trend_marker, Tier};
use chrono::{DateTime, Local, NaiveDateTime};
use response::{
    AnalyticsReport, ClassAttendance, ClassSummary, ComparisonReport, DepartmentAttendance,
    HelpReport, InsightsReport, LatecomerReport, PredictionsReport, QueryResponse, StudentInfo,
    SummaryReport,
};
use std::fmt::Write as _;

pub const GENERIC_FALLBACK: &str = "Here's what I found for you.";
pub const EMPTY_ERROR_FALLBACK: &str = "The assistant could not answer that query.";

const RECENT_HISTORY_SHOWN: usize = 5;
const TREND_DAYS_SHOWN: usize = 3;
const PREDICTIONS_SHOWN: usize = 5;
const ATTENTION_THRESHOLD: f64 = 75.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedMessage {
    pub kind: String,
    pub text: String,
    pub table: Option<TableSpec>,
    pub chart: Option<ChartSpec>,
    pub export: Option<ExportData>,
    pub share_date: Option<String>,
    pub suggestions: Vec<String>,
}

impl FormattedMessage {
    fn text_only(kind: &str, text: String) -> Self {
        Self {
            kind: kind.to_string(),
            text,
            table: None,
            chart: None,
            export: None,
            share_date: None,
            suggestions: Vec::new(),
        }
    }
}

pub fn format_response(response: &QueryResponse, suggestions: &SuggestionConfig) -> FormattedMessage {
    let kind = response.kind();
    let mut formatted = match response {
        QueryResponse::DepartmentAttendance(report) => format_department(report),
        QueryResponse::ClassAttendance(report) => format_class(report),
        QueryResponse::AllLatecomers(report) | QueryResponse::ClassLatecomers(report) => {
            format_latecomers(kind, report)
        }
        QueryResponse::StudentInfo(info) => format_student(info),
        QueryResponse::Summary(report) => format_summary(report),
        QueryResponse::Analytics(report) => format_analytics(report),
        QueryResponse::Predictions(report) => format_predictions(report),
        QueryResponse::Insights(report) => format_insights(report),
        QueryResponse::Comparison(report) => format_comparison(report),
        QueryResponse::Help(report) => format_help(report),
        QueryResponse::Error { message } => {
            let text = if message.trim().is_empty() {
                EMPTY_ERROR_FALLBACK.to_string()
            } else {
                message.clone()
            };
            FormattedMessage::text_only(kind, text)
        }
        QueryResponse::Other { message, .. } => FormattedMessage::text_only(
            kind,
            message
                .clone()
                .unwrap_or_else(|| GENERIC_FALLBACK.to_string()),
        ),
    };
    formatted.suggestions = suggestions.for_query_type(kind).to_vec();
    formatted
}

fn date_label(date: &str) -> &str {
    if date.trim().is_empty() {
        "Today"
    } else {
        date
    }
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn class_table(classes: &[ClassSummary]) -> TableSpec {
    TableSpec {
        rows: classes
            .iter()
            .map(|class| TableRow {
                label: class.class_name.clone(),
                present: class.present,
                absent: class.absent,
                percentage: class.percentage,
            })
            .collect(),
    }
}

fn class_export(classes: &[ClassSummary]) -> Option<ExportData> {
    if classes.is_empty() {
        return None;
    }
    Some(ExportData::Classes(
        classes
            .iter()
            .map(|class| ClassRow {
                class_name: class.class_name.clone(),
                total_students: class.total_students,
                present: class.present,
                absent: class.absent,
                percentage: class.percentage,
            })
            .collect(),
    ))
}

fn format_department(report: &DepartmentAttendance) -> FormattedMessage {
    let summary = &report.summary;
    let mut text = format!(
        "**Department Attendance Summary - {}**\n\n",
        date_label(&report.date)
    );
    text.push_str("📊 **Overall Statistics:**\n");
    let _ = writeln!(text, "• Total Students: {}", summary.total_students);
    let _ = writeln!(text, "• Present: {}", summary.total_present);
    let _ = write!(
        text,
        "• Overall Attendance: {:.1}%\n\n",
        summary.overall_percentage
    );

    if !summary.classes.is_empty() {
        text.push_str("📋 **Class-wise Breakdown:**\n");
        for class in &summary.classes {
            let _ = writeln!(
                text,
                "{} {}: {:.1}% ({}/{})",
                Tier::from_percentage(class.percentage).status_marker(),
                class.class_name,
                class.percentage,
                class.present,
                class.total_students
            );
        }
    }

    let absent = summary.total_students.saturating_sub(summary.total_present);
    FormattedMessage {
        kind: "department_attendance".to_string(),
        text,
        table: Some(class_table(&summary.classes)),
        chart: Some(ChartSpec::new(
            ChartKind::Breakdown,
            "Department attendance",
            ChartData::breakdown(summary.total_present as f64, absent as f64, 0.0),
        )),
        export: class_export(&summary.classes),
        share_date: Some(report.date.clone()),
        suggestions: Vec::new(),
    }
}

fn format_class(report: &ClassAttendance) -> FormattedMessage {
    let stats = &report.summary;
    let mut text = format!(
        "**{} - {}**\n\n",
        report.class_name,
        date_label(&report.date)
    );
    text.push_str("📊 **Class Statistics:**\n");
    let _ = writeln!(text, "• Total Students: {}", stats.total_students);
    let _ = writeln!(text, "• Present: {}", stats.present);
    let _ = writeln!(text, "• Absent: {}", stats.absent);
    let _ = writeln!(text, "• Late: {}", stats.late);
    let _ = write!(text, "• Attendance Rate: {:.1}%\n\n", stats.percentage);

    let present: Vec<_> = report
        .students
        .iter()
        .filter(|student| student.status == "present")
        .collect();
    let absent: Vec<_> = report
        .students
        .iter()
        .filter(|student| student.status == "absent")
        .collect();

    if !present.is_empty() {
        text.push_str("✅ **Present Students:**\n");
        for student in present {
            let late = if student.is_late { " (Late)" } else { "" };
            let _ = writeln!(text, "• {}{late}", student.name);
        }
        text.push('\n');
    }
    if !absent.is_empty() {
        text.push_str("❌ **Absent Students:**\n");
        for student in absent {
            let _ = writeln!(text, "• {}", student.name);
        }
    }

    let mut formatted = FormattedMessage::text_only("class_attendance", text);
    formatted.share_date = Some(report.date.clone());
    formatted
}

pub fn no_latecomers_text(date: &str) -> String {
    let date = date_label(date);
    format!("**Latecomers Report - {date}**\n\n🎉 **Great news!** No latecomers found for {date}.")
}

fn format_latecomers(kind: &str, report: &LatecomerReport) -> FormattedMessage {
    if report.latecomers.is_empty() {
        let mut formatted = FormattedMessage::text_only(kind, no_latecomers_text(&report.date));
        formatted.share_date = Some(report.date.clone());
        return formatted;
    }

    let mut text = format!(
        "**Latecomers Report - {}**\n\n",
        date_label(&report.date)
    );
    let _ = write!(
        text,
        "⏰ **Late Arrivals ({}):**\n\n",
        report.latecomers.len()
    );
    for student in &report.latecomers {
        let _ = writeln!(text, "• **{}** ({})", student.name, student.roll);
        let _ = writeln!(text, "  Class: {}", student.class_name);
        if !student.time.trim().is_empty() {
            let _ = writeln!(text, "  Time: {}", clock_time(&student.time));
        }
        text.push('\n');
    }

    let rows = report
        .latecomers
        .iter()
        .map(|student| LatecomerRow {
            name: student.name.clone(),
            roll: student.roll.clone(),
            class_name: student.class_name.clone(),
            time: Some(student.time.clone()).filter(|time| !time.trim().is_empty()),
        })
        .collect();

    let mut formatted = FormattedMessage::text_only(kind, text);
    formatted.export = Some(ExportData::Latecomers(rows));
    formatted.share_date = Some(report.date.clone());
    formatted
}

/// Renders a backend timestamp as a local wall-clock time, or returns it verbatim.
pub fn clock_time(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed
            .with_timezone(&Local)
            .format("%-I:%M:%S %p")
            .to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return parsed.format("%-I:%M:%S %p").to_string();
        }
    }
    raw.to_string()
}

fn format_student(info: &StudentInfo) -> FormattedMessage {
    let student = &info.student;
    let stats = &info.stats;

    let mut text = format!("**Student Profile: {}**\n\n", student.name);
    text.push_str("🆔 **Details:**\n");
    let _ = writeln!(text, "• Roll Number: {}", student.roll);
    let _ = write!(text, "• Class: {}\n\n", student.class_id);

    text.push_str("📊 **Attendance Statistics:**\n");
    let _ = writeln!(
        text,
        "• Overall Attendance: {:.1}%",
        stats.attendance_percentage
    );
    let _ = writeln!(text, "• Total Days: {}", stats.total_days);
    let _ = writeln!(text, "• Present Days: {}", stats.present_days);
    let _ = writeln!(text, "• Absent Days: {}", stats.absent_days);
    let _ = write!(text, "• Late Arrivals: {}\n\n", stats.late_count);

    let _ = write!(
        text,
        "🎯 **Performance Level:** {}\n\n",
        Tier::from_percentage(stats.attendance_percentage).performance_label()
    );

    if !info.recent_history.is_empty() {
        text.push_str("📅 **Recent Attendance:**\n");
        for record in info.recent_history.iter().take(RECENT_HISTORY_SHOWN) {
            let status = match (record.status.as_str(), record.is_late) {
                ("present", true) => "🟡 Present (Late)",
                ("present", false) => "✅ Present",
                _ => "❌ Absent",
            };
            let _ = writeln!(text, "• {}: {status}", record.date);
        }
    }

    let mut formatted = FormattedMessage::text_only("student_info", text);
    formatted.chart = Some(ChartSpec::new(
        ChartKind::Breakdown,
        format!("{} attendance", student.name),
        ChartData::breakdown(
            stats.present_days as f64,
            stats.absent_days as f64,
            stats.late_count as f64,
        ),
    ));
    formatted
}

fn format_summary(report: &SummaryReport) -> FormattedMessage {
    let summary = &report.summary;
    let mut text = format!("**Department Summary - {}**\n\n", date_label(&report.date));
    text.push_str("📊 **Key Metrics:**\n");
    let _ = writeln!(
        text,
        "• Overall Attendance: {:.1}%",
        summary.overall_percentage
    );
    let _ = writeln!(text, "• Total Students: {}", summary.total_students);
    let _ = writeln!(text, "• Present Today: {}", summary.total_present);
    let _ = write!(text, "• Active Classes: {}\n\n", summary.classes.len());

    if !report.trend.is_empty() {
        text.push_str("📈 **7-Day Trend:**\n");
        let skip = report.trend.len().saturating_sub(TREND_DAYS_SHOWN);
        for day in report.trend.iter().skip(skip) {
            let _ = writeln!(
                text,
                "{} {}: {:.1}%",
                trend_marker(day.percentage),
                day.date,
                day.percentage
            );
        }
    }

    let attention: Vec<_> = summary
        .classes
        .iter()
        .filter(|class| class.percentage < ATTENTION_THRESHOLD)
        .collect();
    if !attention.is_empty() {
        text.push_str("\n⚠️ **Classes Needing Attention:**\n");
        for class in attention {
            let _ = writeln!(text, "• {}: {:.1}%", class.class_name, class.percentage);
        }
    }

    FormattedMessage {
        kind: "summary".to_string(),
        text,
        table: Some(class_table(&summary.classes)),
        chart: Some(ChartSpec::new(
            ChartKind::Trend,
            "7-day attendance trend",
            ChartData::series(
                report.trend.iter().map(|day| day.date.clone()).collect(),
                report.trend.iter().map(|day| day.percentage).collect(),
            ),
        )),
        export: class_export(&summary.classes),
        share_date: Some(report.date.clone()),
        suggestions: Vec::new(),
    }
}

fn format_analytics(report: &AnalyticsReport) -> FormattedMessage {
    let mut text = String::from("**📊 Attendance Analytics Report**\n\n");

    if let Some(statistics) = &report.statistics {
        text.push_str("**📈 Key Statistics:**\n");
        let _ = writeln!(
            text,
            "• Average Attendance: {}%",
            statistics.average_attendance
        );
        let _ = writeln!(
            text,
            "• Trend Direction: {} 📊",
            capitalize(&statistics.trend_direction)
        );
        if let Some(best) = &statistics.best_day {
            let _ = writeln!(
                text,
                "• Best Day: {} ({:.1}%) 🌟",
                best.date, best.percentage
            );
        }
        if let Some(worst) = &statistics.worst_day {
            let _ = writeln!(
                text,
                "• Needs Focus: {} ({:.1}%) 📉",
                worst.date, worst.percentage
            );
        }
    }

    if let Some(patterns) = &report.patterns {
        text.push_str("\n**📅 Weekly Patterns:**\n");
        let _ = writeln!(text, "• Best Day: {}", patterns.best_day);
        let _ = writeln!(text, "• Most Challenging: {}", patterns.worst_day);
    }

    text.push_str("\n📊 **Chart:** Showing attendance trends over the past 2 weeks\n");
    let _ = write!(text, "📍 **Period:** {}", report.date_range);

    let mut formatted = FormattedMessage::text_only("analytics", text);
    formatted.chart = Some(ChartSpec::new(
        ChartKind::Trend,
        "Attendance trend",
        ChartData::series(
            report.chart_data.iter().map(|day| day.date.clone()).collect(),
            report.chart_data.iter().map(|day| day.percentage).collect(),
        ),
    ));
    formatted
}

fn format_predictions(report: &PredictionsReport) -> FormattedMessage {
    let mut text = String::from("**🔮 Attendance Predictions**\n\n");
    let _ = writeln!(
        text,
        "**📊 Current Trend:** {}",
        capitalize(&report.current_trend)
    );
    let _ = write!(
        text,
        "**📈 Historical Average:** {}%\n\n",
        report.historical_average
    );

    if !report.predictions.is_empty() {
        text.push_str("**🗓️ Next 7 Days Forecast:**\n");
        for prediction in report.predictions.iter().take(PREDICTIONS_SHOWN) {
            let _ = writeln!(
                text,
                "{} {}: {}% ({}% confidence)",
                confidence_marker(prediction.confidence),
                prediction.date,
                prediction.predicted_attendance,
                prediction.confidence
            );
        }
    }

    let _ = write!(
        text,
        "\n**💡 Prediction Note:** Based on recent {} trend patterns",
        report.current_trend
    );

    let mut formatted = FormattedMessage::text_only("predictions", text);
    formatted.chart = Some(ChartSpec::new(
        ChartKind::Trend,
        "Attendance forecast",
        ChartData::series(
            report.predictions.iter().map(|p| p.date.clone()).collect(),
            report
                .predictions
                .iter()
                .map(|p| p.predicted_attendance)
                .collect(),
        ),
    ));
    formatted
}

fn format_insights(report: &InsightsReport) -> FormattedMessage {
    let mut text = String::from("**💡 Smart Attendance Insights**\n\n");
    let _ = write!(
        text,
        "**📊 Current Performance:** {}% average attendance\n\n",
        report.current_average
    );

    if !report.insights.is_empty() {
        text.push_str("**🔍 Key Insights:**\n");
        for insight in &report.insights {
            let icon = match insight.kind.as_str() {
                "positive" => "✅",
                "warning" => "⚠️",
                _ => "ℹ️",
            };
            let _ = writeln!(text, "{icon} **{}:** {}", insight.title, insight.message);
        }
    }

    if !report.recommendations.is_empty() {
        text.push_str("\n**📝 Recommendations:**\n");
        for recommendation in &report.recommendations {
            let _ = writeln!(text, "• {recommendation}");
        }
    }

    FormattedMessage::text_only("insights", text)
}

fn format_comparison(report: &ComparisonReport) -> FormattedMessage {
    let mut text = String::from("**🆚 Comparative Analysis**\n\n");

    if let Some(week) = &report.week_comparison {
        let icon = if week.change > 0.0 {
            "📈"
        } else if week.change < 0.0 {
            "📉"
        } else {
            "➖"
        };
        text.push_str("**📊 Week-over-Week:**\n");
        let _ = writeln!(text, "• This Week: {:.1}%", week.current_week);
        let _ = writeln!(text, "• Last Week: {:.1}%", week.last_week);
        let _ = write!(
            text,
            "• Change: {icon} {:.1} percentage points\n\n",
            week.change
        );
    }
    if let Some(top) = &report.top_performer {
        text.push_str("**🏆 Top Performer:**\n");
        let _ = write!(
            text,
            "{}: {:.1}%\n\n",
            top.class_name, top.attendance_percentage
        );
    }
    if let Some(attention) = &report.needs_attention {
        text.push_str("**⚠️ Needs Attention:**\n");
        let _ = write!(
            text,
            "{}: {:.1}%\n\n",
            attention.class_name, attention.attendance_percentage
        );
    }
    text.push_str("**📋 See table below for complete class rankings**");

    let rankings = &report.class_rankings;
    let absent_of = |present: u64, total: u64| total.saturating_sub(present);
    let table = TableSpec {
        rows: rankings
            .iter()
            .map(|class| TableRow {
                label: class.class_name.clone(),
                present: class.present_students,
                absent: absent_of(class.present_students, class.total_students),
                percentage: class.attendance_percentage,
            })
            .collect(),
    };
    let export = (!rankings.is_empty()).then(|| {
        ExportData::Classes(
            rankings
                .iter()
                .map(|class| ClassRow {
                    class_name: class.class_name.clone(),
                    total_students: class.total_students,
                    present: class.present_students,
                    absent: absent_of(class.present_students, class.total_students),
                    percentage: class.attendance_percentage,
                })
                .collect(),
        )
    });
    let chart_data = ChartData {
        labels: rankings.iter().map(|class| class.class_name.clone()).collect(),
        values: rankings
            .iter()
            .map(|class| class.attendance_percentage)
            .collect(),
        present: rankings
            .iter()
            .map(|class| class.present_students as f64)
            .collect(),
        absent: rankings
            .iter()
            .map(|class| absent_of(class.present_students, class.total_students) as f64)
            .collect(),
        late: rankings
            .iter()
            .map(|class| class.late_students as f64)
            .collect(),
    };

    FormattedMessage {
        kind: "comparison".to_string(),
        text,
        table: Some(table),
        chart: Some(ChartSpec::new(
            ChartKind::Comparison,
            "Class rankings",
            chart_data,
        )),
        export,
        share_date: None,
        suggestions: Vec::new(),
    }
}

fn format_help(report: &HelpReport) -> FormattedMessage {
    let mut text = String::from("**How to Use the AI Assistant**\n\n");
    text.push_str(
        "I can help you with various attendance-related queries. Here are some examples:\n\n",
    );

    if !report.commands.is_empty() {
        text.push_str("💡 **Sample Questions:**\n");
        for command in &report.commands {
            let _ = writeln!(text, "• \"{command}\"");
        }
    }

    text.push_str("\n🔍 **Tips:**\n");
    text.push_str("• Be specific with class names and dates\n");
    text.push_str("• Use \"today\" or \"yesterday\" for recent data\n");
    text.push_str("• Ask for help anytime by typing \"help\"\n");
    text.push_str("• I can generate reports and export data\n\n");
    text.push_str("📝 **Report Types:**\n");
    text.push_str("• Daily attendance summaries\n");
    text.push_str("• Student performance analysis\n");
    text.push_str("• Latecomer tracking\n");
    text.push_str("• Trend analysis\n");

    FormattedMessage::text_only("help", text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn format(value: Value) -> FormattedMessage {
        format_response(
            &QueryResponse::from_value(&value),
            &SuggestionConfig::default(),
        )
    }

    #[test]
    fn department_attendance_tiers_and_table() {
        let formatted = format(json!({
            "type": "department_attendance",
            "date": "2024-03-01",
            "summary": {
                "total_students": 40,
                "total_present": 34,
                "overall_percentage": 85.0,
                "classes": [{
                    "class_name": "CS 2A",
                    "present": 34,
                    "absent": 6,
                    "percentage": 85.0,
                    "total_students": 40
                }]
            }
        }));

        assert!(formatted.text.contains("85.0%"));
        assert!(formatted.text.contains(&format!(
            "\n{} CS 2A: 85.0% (34/40)",
            Tier::Good.status_marker()
        )));
        let table = formatted.table.expect("department reply should carry a table");
        assert_eq!(
            table.rows,
            vec![TableRow {
                label: "CS 2A".to_string(),
                present: 34,
                absent: 6,
                percentage: 85.0
            }]
        );
        let chart = formatted.chart.expect("department reply should carry a chart");
        assert_eq!(chart.kind, ChartKind::Breakdown);
        assert_eq!(chart.data.present, vec![34.0]);
        assert_eq!(chart.data.absent, vec![6.0]);
    }

    #[test]
    fn empty_latecomers_is_the_fixed_message_without_widgets() {
        let formatted = format(json!({
            "type": "all_latecomers",
            "date": "2024-03-01",
            "latecomers": []
        }));
        assert_eq!(formatted.text, no_latecomers_text("2024-03-01"));
        assert!(formatted.table.is_none());
        assert!(formatted.chart.is_none());
        assert!(formatted.export.is_none());
    }

    #[test]
    fn latecomers_are_exportable_but_carry_no_widgets() {
        let formatted = format(json!({
            "type": "class_latecomers",
            "date": "2024-03-01",
            "latecomers": [{ "name": "Ravi", "roll": "R7", "class": "CS 2A", "time": "" }]
        }));
        assert!(formatted.text.contains("• **Ravi** (R7)"));
        assert!(!formatted.text.contains("Time:"));
        assert!(formatted.table.is_none());
        assert!(matches!(formatted.export, Some(ExportData::Latecomers(ref rows)) if rows[0].time.is_none()));
    }

    #[test]
    fn every_known_type_survives_an_empty_payload() {
        for kind in [
            "department_attendance",
            "class_attendance",
            "all_latecomers",
            "class_latecomers",
            "student_info",
            "summary",
            "analytics",
            "predictions",
            "insights",
            "comparison",
            "help",
            "error",
            "something_new",
        ] {
            let formatted = format(json!({ "type": kind }));
            assert!(!formatted.text.trim().is_empty(), "{kind} produced empty text");
            assert_eq!(formatted.kind, kind);
        }
    }

    #[test]
    fn partially_populated_entries_default_field_by_field() {
        let class = format(json!({
            "type": "class_attendance",
            "students": [{}, { "name": "Asha", "status": "present", "is_late": 1 }, 7]
        }));
        assert!(class.text.contains("• Asha (Late)"));
        assert!(!class.text.contains("❌ **Absent Students:**"));

        let late = format(json!({
            "type": "all_latecomers",
            "latecomers": [{ "name": null, "roll": 7 }, "garbage"]
        }));
        assert!(late.text.contains("⏰ **Late Arrivals (2):**"));
        assert!(late.text.contains("• **** (7)"));
        let Some(ExportData::Latecomers(rows)) = late.export else {
            panic!("latecomers should export rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].roll, "7");
        assert_eq!(rows[0].name, "");
        assert_eq!(rows[0].time, None);

        let predictions = format(json!({
            "type": "predictions",
            "predictions": [{ "date": "x" }]
        }));
        assert!(predictions.text.contains("x: 0% (0% confidence)"));
        let chart = predictions.chart.expect("predictions should chart");
        assert_eq!(chart.data.labels, vec!["x".to_string()]);
        assert_eq!(chart.data.values, vec![0.0]);

        let insights = format(json!({
            "type": "insights",
            "insights": [{ "type": 5, "title": "Heads up" }]
        }));
        assert!(insights.text.contains("**Heads up:**"));

        let student = format(json!({
            "type": "student_info",
            "student": { "name": "Ravi" },
            "recent_history": [{ "date": 3 }]
        }));
        assert!(student.text.contains("• 3: ❌ Absent"));

        let comparison = format(json!({
            "type": "comparison",
            "class_rankings": [{ "class_name": "CS 1A", "present_students": "12" }]
        }));
        let rows = comparison.table.expect("comparison should tabulate").rows;
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].present, rows[0].absent), (12, 0));

        let department = format(json!({
            "type": "department_attendance",
            "summary": { "classes": [{ "class_name": null, "percentage": "88.5" }] }
        }));
        let rows = department.table.expect("department should tabulate").rows;
        assert_eq!(rows[0].label, "");
        assert_eq!(rows[0].percentage, 88.5);
    }

    #[test]
    fn attachments_follow_the_type_pairings() {
        let expectations = [
            ("department_attendance", true, true),
            ("class_attendance", false, false),
            ("all_latecomers", false, false),
            ("student_info", false, true),
            ("summary", true, true),
            ("analytics", false, true),
            ("predictions", false, true),
            ("insights", false, false),
            ("comparison", true, true),
            ("help", false, false),
            ("error", false, false),
        ];
        for (kind, table, chart) in expectations {
            let formatted = format(json!({ "type": kind }));
            assert_eq!(formatted.table.is_some(), table, "{kind} table");
            assert_eq!(formatted.chart.is_some(), chart, "{kind} chart");
        }
    }

    #[test]
    fn student_performance_label_and_history_limit() {
        let history: Vec<Value> = (1..=8)
            .map(|day| json!({ "date": format!("2024-03-0{day}"), "status": "present", "is_late": day == 1 }))
            .collect();
        let formatted = format(json!({
            "type": "student_info",
            "student": { "name": "Asha", "roll": "R1", "class_id": "CS2A" },
            "stats": { "attendance_percentage": 60.0 },
            "recent_history": history
        }));
        assert!(formatted.text.contains("Average 📊"));
        assert!(formatted.text.contains("2024-03-01: 🟡 Present (Late)"));
        assert!(formatted.text.contains("2024-03-05"));
        assert!(!formatted.text.contains("2024-03-06"));
    }

    #[test]
    fn summary_shows_last_three_trend_days_and_attention_list() {
        let formatted = format(json!({
            "type": "summary",
            "date": "2024-03-07",
            "summary": {
                "overall_percentage": 80.0,
                "classes": [
                    { "class_name": "CS 1A", "percentage": 70.0 },
                    { "class_name": "CS 1B", "percentage": 95.0 }
                ]
            },
            "trend": [
                { "date": "d1", "percentage": 90.0 },
                { "date": "d2", "percentage": 85.0 },
                { "date": "d3", "percentage": 70.0 },
                { "date": "d4", "percentage": 50.0 }
            ]
        }));
        assert!(!formatted.text.contains("d1:"));
        assert!(formatted.text.contains("📊 d3: 70.0%"));
        assert!(formatted.text.contains("📉 d4: 50.0%"));
        assert!(formatted.text.contains("• CS 1A: 70.0%"));
        assert!(!formatted.text.contains("• CS 1B"));
    }

    #[test]
    fn predictions_use_inclusive_confidence_tiers() {
        let formatted = format(json!({
            "type": "predictions",
            "current_trend": "improving",
            "historical_average": 82.5,
            "predictions": [
                { "date": "p1", "predicted_attendance": 84.5, "confidence": 80 },
                { "date": "p2", "predicted_attendance": 86.5, "confidence": 60 }
            ]
        }));
        assert!(formatted.text.contains("**📊 Current Trend:** Improving"));
        assert!(formatted.text.contains("🟢 p1: 84.5% (80% confidence)"));
        assert!(formatted.text.contains("🟡 p2: 86.5% (60% confidence)"));
    }

    #[test]
    fn comparison_change_direction_and_rankings_table() {
        let formatted = format(json!({
            "type": "comparison",
            "week_comparison": { "current_week": 80.0, "last_week": 85.0, "change": -5.0 },
            "class_rankings": [
                { "class_name": "CS 1A", "attendance_percentage": 92.0, "total_students": 30, "present_students": 28 }
            ]
        }));
        assert!(formatted.text.contains("📉 -5.0 percentage points"));
        let table = formatted.table.expect("comparison should carry a table");
        assert_eq!(table.rows[0].absent, 2);
    }

    #[test]
    fn error_message_is_verbatim() {
        let formatted = format(json!({
            "type": "error",
            "message": "Student not found. Please provide a valid student name or roll number."
        }));
        assert_eq!(
            formatted.text,
            "Student not found. Please provide a valid student name or roll number."
        );
    }

    #[test]
    fn unknown_type_falls_back_to_message_then_generic() {
        assert_eq!(format(json!({ "type": "default", "message": "Overview" })).text, "Overview");
        assert_eq!(format(json!({ "type": "default" })).text, GENERIC_FALLBACK);
    }

    #[test]
    fn suggestions_dispatch_by_type() {
        let config = SuggestionConfig::default();
        let formatted = format(json!({ "type": "class_attendance" }));
        assert_eq!(formatted.suggestions, config.class_attendance);
        let formatted = format(json!({ "type": "insights" }));
        assert_eq!(formatted.suggestions, config.default);
    }

    #[test]
    fn clock_time_parses_naive_and_passes_through_garbage() {
        assert_eq!(clock_time("2024-03-01T09:05:07"), "9:05:07 AM");
        assert_eq!(clock_time("2024-03-01 13:00:00.123"), "1:00:00 PM");
        assert_eq!(clock_time("soon"), "soon");
    }
}
