//! PDF 文档生成 (genpdf)

mod quotation;
mod report;
mod sale;

use crate::config::{PdfConfig, StoreConfig};
use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use genpdf::elements::{Break, FrameCellDecorator, PaddedElement, Paragraph, StyledElement, TableLayout};
use genpdf::style::{Color, Style};
use genpdf::{Alignment, Document, Element, Margins, SimplePageDecorator};
use std::path::PathBuf;

pub use quotation::QUOTATION_TERMS;
pub use sale::HistoryFilters;

const BRAND: Color = Color::Rgb(44, 62, 80);
const MUTED: Color = Color::Greyscale(110);

fn s_normal() -> Style {
    Style::new().with_font_size(9)
}

fn s_bold() -> Style {
    Style::new().with_font_size(9).bold()
}

fn s_small() -> Style {
    Style::new().with_font_size(8)
}

fn s_small_bold() -> Style {
    Style::new().with_font_size(8).bold()
}

fn s_section() -> Style {
    Style::new().with_font_size(11).bold().with_color(BRAND)
}

fn s_total() -> Style {
    Style::new().with_font_size(12).bold()
}

fn s_muted() -> Style {
    Style::new().with_font_size(8).with_color(MUTED)
}

/// 带内边距的单元格文本
fn pp(text: &str, style: Style) -> PaddedElement<StyledElement<Paragraph>> {
    Paragraph::new(text).styled(style).padded(Margins::trbl(1, 1, 1, 3))
}

/// 右对齐 (金额列)
fn pp_right(text: &str, style: Style) -> impl Element {
    Paragraph::new(text)
        .aligned(Alignment::Right)
        .styled(style)
        .padded(Margins::trbl(1, 3, 1, 1))
}

fn pp_center(text: &str, style: Style) -> impl Element {
    Paragraph::new(text).aligned(Alignment::Center).styled(style)
}

/// 带边框的表格
fn framed_table(columns: Vec<usize>) -> TableLayout {
    let mut table = TableLayout::new(columns);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    table
}

/// 表头行
fn header_row(table: &mut TableLayout, labels: &[&str]) -> Result<(), AppError> {
    let mut row = table.row();
    for label in labels {
        row = row.element(pp(label, s_small_bold()));
    }
    row.push().map_err(pdf_err)
}

/// 两列 "标签: 值" 表
fn key_values(rows: &[(&str, String)]) -> Result<TableLayout, AppError> {
    let mut table = TableLayout::new(vec![2, 5]);
    for (label, value) in rows {
        table
            .row()
            .element(pp(label, s_bold()))
            .element(pp(value, s_normal()))
            .push()
            .map_err(pdf_err)?;
    }
    Ok(table)
}

fn pdf_err(e: genpdf::error::Error) -> AppError {
    AppError::Pdf(e.to_string())
}

fn or_dash(v: Option<&str>) -> String {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("-")
        .to_string()
}

fn datetime_text(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

/// 纸张方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Portrait,
    Landscape,
}

/// PDF 渲染器: 字体目录 + 店铺信息 (页眉/页脚)
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    font_dir: PathBuf,
    font_family: String,
    store: StoreConfig,
}

impl PdfRenderer {
    pub fn new(pdf: &PdfConfig, store: &StoreConfig) -> Self {
        Self {
            font_dir: PathBuf::from(&pdf.font_dir),
            font_family: pdf.font_family.clone(),
            store: store.clone(),
        }
    }

    /// 新建文档: 加载字体, 设置纸张与页码, 写入店铺页眉和标题
    fn document(&self, title: &str, orientation: Orientation) -> Result<Document, AppError> {
        let fonts = genpdf::fonts::from_files(&self.font_dir, &self.font_family, None).map_err(|e| {
            AppError::Pdf(format!(
                "Error cargando fuentes {} desde {}: {}",
                self.font_family,
                self.font_dir.display(),
                e
            ))
        })?;

        let mut doc = Document::new(fonts);
        doc.set_title(title);
        if orientation == Orientation::Landscape {
            doc.set_paper_size(genpdf::Size::new(297, 210));
        } else {
            doc.set_paper_size(genpdf::Size::new(210, 297));
        }

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(Margins::trbl(15, 15, 15, 15));
        decorator.set_header(|page| {
            Paragraph::new(format!("Página {}", page))
                .aligned(Alignment::Right)
                .styled(s_muted())
        });
        doc.set_page_decorator(decorator);

        doc.push(pp_center(
            &self.store.name,
            Style::new().with_font_size(20).bold().with_color(BRAND),
        ));
        doc.push(pp_center(&self.store.slogan, s_muted()));
        doc.push(Break::new(1.0));
        doc.push(pp_center(title, Style::new().with_font_size(15).bold()));
        doc.push(pp_center(
            &format!("Generado el: {}", datetime_text(Utc::now())),
            s_muted(),
        ));
        doc.push(Break::new(1.5));
        Ok(doc)
    }

    /// 页脚联系方式并输出字节
    fn finish(&self, mut doc: Document) -> Result<Vec<u8>, AppError> {
        doc.push(Break::new(2.0));
        doc.push(pp_center(
            &format!(
                "{} | Tel: {} | {} | {}",
                self.store.name, self.store.phone, self.store.email, self.store.address
            ),
            s_muted(),
        ));

        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::Pdf(format!("Error generando PDF: {}", e)))?;
        Ok(buffer)
    }
}

/// `Cotizacion_<id>_<yyyyMMdd>.pdf`
pub fn quotation_file_name(id: i64, today: NaiveDate) -> String {
    format!("Cotizacion_{}_{}.pdf", id, today.format("%Y%m%d"))
}

pub fn quotation_list_file_name(now: DateTime<Utc>) -> String {
    format!("Listado_Cotizaciones_{}.pdf", now.format("%Y%m%d_%H%M"))
}

pub fn sale_file_name(id: i64, today: NaiveDate) -> String {
    format!("Venta_{}_{}.pdf", id, today.format("%Y%m%d"))
}

pub fn sales_history_file_name(now: DateTime<Utc>) -> String {
    format!("Historial_Ventas_{}.pdf", now.format("%Y%m%d_%H%M"))
}

pub fn report_file_name(today: NaiveDate) -> String {
    format!("Reporte_Ventas_{}.pdf", today.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dated_file_names() {
        let now = Utc.with_ymd_and_hms(2024, 5, 16, 9, 5, 0).unwrap();
        let today = now.date_naive();
        assert_eq!(quotation_file_name(12, today), "Cotizacion_12_20240516.pdf");
        assert_eq!(quotation_list_file_name(now), "Listado_Cotizaciones_20240516_0905.pdf");
        assert_eq!(sale_file_name(7, today), "Venta_7_20240516.pdf");
        assert_eq!(sales_history_file_name(now), "Historial_Ventas_20240516_0905.pdf");
        assert_eq!(report_file_name(today), "Reporte_Ventas_20240516.pdf");
    }

    #[test]
    fn blank_values_render_as_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("  ")), "-");
        assert_eq!(or_dash(Some("Av. Lima")), "Av. Lima");
    }

    #[test]
    fn missing_fonts_is_a_pdf_error() {
        let renderer = PdfRenderer::new(
            &PdfConfig {
                font_dir: "/nonexistent/fonts".into(),
                font_family: "LiberationSans".into(),
            },
            &StoreConfig::default(),
        );
        assert!(matches!(
            renderer.document("Prueba", Orientation::Portrait),
            Err(AppError::Pdf(_))
        ));
    }
}
