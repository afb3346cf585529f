use crate::format::markup;
use crate::session::Message;
use chrono::{DateTime, Local, NaiveDate};
use eframe::egui;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CLASS_HEADER: &str = "Class Name,Total Students,Present,Absent,Attendance %";
pub const LATECOMER_HEADER: &str = "Student Name,Roll Number,Class,Time";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("nothing to export")]
    NothingToExport,
    #[error("no chart is mounted at {0}")]
    MissingMount(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRow {
    pub class_name: String,
    pub total_students: u64,
    pub present: u64,
    pub absent: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatecomerRow {
    pub name: String,
    pub roll: String,
    pub class_name: String,
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportData {
    Classes(Vec<ClassRow>),
    Latecomers(Vec<LatecomerRow>),
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

pub fn csv_contents(data: &ExportData) -> String {
    let mut lines = Vec::new();
    match data {
        ExportData::Classes(rows) => {
            lines.push(CLASS_HEADER.to_string());
            for row in rows {
                lines.push(format!(
                    "{},{},{},{},{:.1}",
                    quoted(&row.class_name),
                    row.total_students,
                    row.present,
                    row.absent,
                    row.percentage
                ));
            }
        }
        ExportData::Latecomers(rows) => {
            lines.push(LATECOMER_HEADER.to_string());
            for row in rows {
                lines.push(format!(
                    "{},{},{},{}",
                    quoted(&row.name),
                    quoted(&row.roll),
                    quoted(&row.class_name),
                    quoted(row.time.as_deref().unwrap_or("N/A"))
                ));
            }
        }
    }
    let mut csv = lines.join("\n");
    csv.push('\n');
    csv
}

pub fn csv_filename(date: NaiveDate) -> String {
    format!("attendance_data_{}.csv", date.format("%Y-%m-%d"))
}

pub fn share_text(date: Option<&str>) -> String {
    let date = date
        .map(str::trim)
        .filter(|date| !date.is_empty())
        .unwrap_or("Today");
    format!("Attendance Data - {date}\n\nGenerated by Department Attendance Management System")
}

/// Writes `bytes` to `dir/filename` through a temporary sibling and a rename,
/// so a reader never observes a half-written file.
pub fn write_atomic(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    let name = Path::new(filename)
        .file_name()
        .ok_or(ExportError::NothingToExport)?;
    fs::create_dir_all(dir)?;
    let final_path = dir.join(name);
    let tmp_path = dir.join(format!("{}.tmp", name.to_string_lossy()));

    fs::write(&tmp_path, bytes)?;
    match fs::rename(&tmp_path, &final_path) {
        Ok(()) => Ok(final_path),
        Err(rename_err) => {
            if final_path.exists() {
                fs::remove_file(&final_path)?;
                fs::rename(&tmp_path, &final_path)?;
                Ok(final_path)
            } else {
                Err(rename_err.into())
            }
        }
    }
}

pub fn export_csv(dir: &Path, data: &ExportData, date: NaiveDate) -> Result<PathBuf, ExportError> {
    let empty = match data {
        ExportData::Classes(rows) => rows.is_empty(),
        ExportData::Latecomers(rows) => rows.is_empty(),
    };
    if empty {
        return Err(ExportError::NothingToExport);
    }
    let path = write_atomic(dir, &csv_filename(date), csv_contents(data).as_bytes())?;
    tracing::info!(path = %path.display(), "exported csv");
    Ok(path)
}

/// Crops a window capture to the part of `rect` (in points) inside the
/// capture and encodes it as PNG.
pub fn encode_png(
    capture: &egui::ColorImage,
    rect: egui::Rect,
    pixels_per_point: f32,
) -> Result<Vec<u8>, ExportError> {
    let [width, height] = capture.size;
    let mut raw = Vec::with_capacity(width * height * 4);
    for pixel in &capture.pixels {
        raw.extend_from_slice(&pixel.to_srgba_unmultiplied());
    }
    let full = image::RgbaImage::from_raw(width as u32, height as u32, raw)
        .ok_or(ExportError::NothingToExport)?;

    let bounds = egui::Rect::from_min_size(
        egui::Pos2::ZERO,
        egui::vec2(width as f32, height as f32) / pixels_per_point,
    );
    let visible = rect.intersect(bounds);
    if !visible.is_positive() {
        return Err(ExportError::NothingToExport);
    }

    let x = (visible.min.x * pixels_per_point).round() as u32;
    let y = (visible.min.y * pixels_per_point).round() as u32;
    let w = (visible.width() * pixels_per_point).round() as u32;
    let h = (visible.height() * pixels_per_point).round() as u32;
    let cropped = image::imageops::crop_imm(&full, x, y, w, h).to_image();
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(ExportError::NothingToExport);
    }

    let mut bytes = Cursor::new(Vec::new());
    cropped.write_to(&mut bytes, image::ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

pub fn export_png(
    dir: &Path,
    filename: &str,
    capture: &egui::ColorImage,
    rect: egui::Rect,
    pixels_per_point: f32,
) -> Result<PathBuf, ExportError> {
    let bytes = encode_png(capture, rect, pixels_per_point)?;
    let path = write_atomic(dir, filename, &bytes)?;
    tracing::info!(path = %path.display(), "exported chart image");
    Ok(path)
}

pub fn transcript_html(messages: &[Message], generated_at: DateTime<Local>) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Attendance Assistant Chat</title>\n</head>\n<body>\n",
    );
    html.push_str(&format!(
        "<h1>Attendance Assistant Chat</h1>\n<p>Exported {}</p>\n",
        markup::escape_html(&generated_at.format("%Y-%m-%d %H:%M").to_string())
    ));
    for message in messages {
        let class = if message.is_error {
            format!("{} error", message.role.as_str())
        } else {
            message.role.as_str().to_string()
        };
        html.push_str(&format!(
            "<div class=\"message {class}\">\n<small>{}</small>\n<div>{}</div>\n</div>\n",
            message.timestamp.format("%H:%M"),
            markup::to_html(&message.text)
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

pub fn transcript_filename(now: DateTime<Local>) -> String {
    format!("attendance_chat_{}.html", now.format("%Y-%m-%d_%H%M%S"))
}

pub fn export_transcript(dir: &Path, messages: &[Message]) -> Result<PathBuf, ExportError> {
    if messages.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let now = Local::now();
    let path = write_atomic(
        dir,
        &transcript_filename(now),
        transcript_html(messages, now).as_bytes(),
    )?;
    tracing::info!(path = %path.display(), "exported transcript");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, Color32, ColorImage, Rect};

    fn classes() -> ExportData {
        ExportData::Classes(vec![ClassRow {
            class_name: "CS 2A".to_string(),
            total_students: 40,
            present: 34,
            absent: 6,
            percentage: 85.0,
        }])
    }

    #[test]
    fn class_csv_has_fixed_header_and_one_decimal() {
        assert_eq!(
            csv_contents(&classes()),
            "Class Name,Total Students,Present,Absent,Attendance %\n\"CS 2A\",40,34,6,85.0\n"
        );
    }

    #[test]
    fn latecomer_csv_marks_missing_time() {
        let data = ExportData::Latecomers(vec![LatecomerRow {
            name: "Ravi \"R\" Kumar".to_string(),
            roll: "R7".to_string(),
            class_name: "CS 2A".to_string(),
            time: None,
        }]);
        assert_eq!(
            csv_contents(&data),
            "Student Name,Roll Number,Class,Time\n\"Ravi \"\"R\"\" Kumar\",\"R7\",\"CS 2A\",\"N/A\"\n"
        );
    }

    #[test]
    fn csv_filename_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date should be valid");
        assert_eq!(csv_filename(date), "attendance_data_2024-03-01.csv");
    }

    #[test]
    fn share_text_defaults_to_today() {
        assert_eq!(
            share_text(None),
            "Attendance Data - Today\n\nGenerated by Department Attendance Management System"
        );
        assert!(share_text(Some("2024-03-01")).starts_with("Attendance Data - 2024-03-01"));
    }

    #[test]
    fn export_csv_writes_without_leftover_tmp() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date should be valid");
        let path = export_csv(dir.path(), &classes(), date).expect("csv should export");
        let written = fs::read_to_string(&path).expect("csv should be readable");
        assert!(written.contains("\"CS 2A\",40,34,6,85.0"));

        export_csv(dir.path(), &classes(), date).expect("overwrite should succeed");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("dir should list")
            .flatten()
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn export_csv_rejects_empty_data() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date should be valid");
        assert!(matches!(
            export_csv(dir.path(), &ExportData::Latecomers(Vec::new()), date),
            Err(ExportError::NothingToExport)
        ));
    }

    #[test]
    fn write_atomic_stays_inside_export_dir() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = write_atomic(dir.path(), "../escape.png", b"x").expect("write should succeed");
        assert_eq!(path, dir.path().join("escape.png"));
    }

    #[test]
    fn png_is_cropped_to_chart_rect() {
        let mut capture = ColorImage::new([20, 10], Color32::BLACK);
        capture.pixels[0] = Color32::RED;
        let rect = Rect::from_min_max(pos2(2.0, 1.0), pos2(7.0, 4.0));
        let bytes = encode_png(&capture, rect, 2.0).expect("png should encode");
        let decoded = image::load_from_memory(&bytes).expect("png should decode");
        assert_eq!((decoded.width(), decoded.height()), (10, 6));
    }

    #[test]
    fn png_keeps_only_the_visible_part_of_a_scrolled_chart() {
        let mut capture = ColorImage::new([20, 10], Color32::BLACK);
        for x in 0..10 {
            capture.pixels[2 * 20 + x] = Color32::RED;
        }
        let rect = Rect::from_min_max(pos2(0.0, -7.0), pos2(10.0, 3.0));
        let bytes = encode_png(&capture, rect, 1.0).expect("png should encode");
        let decoded = image::load_from_memory(&bytes)
            .expect("png should decode")
            .to_rgba8();
        assert_eq!((decoded.width(), decoded.height()), (10, 3));
        assert_eq!(decoded.get_pixel(0, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn png_is_clipped_at_the_right_and_bottom_edges() {
        let capture = ColorImage::new([20, 10], Color32::BLACK);
        let rect = Rect::from_min_max(pos2(15.0, 6.0), pos2(30.0, 16.0));
        let bytes = encode_png(&capture, rect, 1.0).expect("png should encode");
        let decoded = image::load_from_memory(&bytes).expect("png should decode");
        assert_eq!((decoded.width(), decoded.height()), (5, 4));
    }

    #[test]
    fn png_outside_capture_is_nothing_to_export() {
        let capture = ColorImage::new([4, 4], Color32::BLACK);
        let rect = Rect::from_min_max(pos2(10.0, 10.0), pos2(20.0, 20.0));
        assert!(matches!(
            encode_png(&capture, rect, 1.0),
            Err(ExportError::NothingToExport)
        ));
    }

    #[test]
    fn transcript_html_escapes_backend_text() {
        let messages = vec![
            Message::user(1, "Show <b>all</b>"),
            Message::bot(2, "**Summary**\n• <script>x</script>"),
        ];
        let html = transcript_html(&messages, Local::now());
        assert!(html.contains("Show &lt;b&gt;all&lt;/b&gt;"));
        assert!(html.contains("<strong>Summary</strong>"));
        assert!(html.contains("<li>&lt;script&gt;x&lt;/script&gt;</li>"));
        assert!(!html.contains("<script>"));
    }
}
