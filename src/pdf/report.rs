use super::{framed_table, header_row, pdf_err, pp, pp_right, s_bold, s_normal, s_section, s_small, Orientation, PdfRenderer};
use crate::error::AppError;
use crate::service::report::{FullReport, ReportFilter, SoldOrigin};
use crate::service::util::format_money_grouped;
use genpdf::elements::{Break, Paragraph};
use genpdf::Element;

fn filter_text(filter: &ReportFilter) -> String {
    let date = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let period = if filter.from.is_none() && filter.to.is_none() {
        "Todo el periodo".to_string()
    } else {
        format!("{} al {}", date(filter.from), date(filter.to))
    };
    format!(
        "Periodo: {} | Categoría: {}",
        period,
        filter.category.as_deref().unwrap_or("Todas")
    )
}

fn origin_label(origin: SoldOrigin) -> &'static str {
    match origin {
        SoldOrigin::Ventas => "Venta",
        SoldOrigin::Cotizacion => "Cotización",
    }
}

impl PdfRenderer {
    /// 销售报表: 筛选条件, 关键指标, 热销商品, 售出商品, 已成交报价单
    pub fn report(&self, report: &FullReport) -> Result<Vec<u8>, AppError> {
        let mut doc = self.document("Reporte de Ventas", Orientation::Landscape)?;

        doc.push(pp(&filter_text(&report.filter), s_normal()));
        doc.push(Break::new(1.0));

        let s = &report.summary;
        doc.push(Paragraph::new("RESUMEN").styled(s_section()));
        doc.push(Break::new(0.5));
        let mut kpis = framed_table(vec![2, 2, 2, 2, 2, 2]);
        header_row(
            &mut kpis,
            &[
                "Ventas totales",
                "N° ventas",
                "Cotizaciones",
                "Cerradas",
                "Conversión",
                "Días prom. cierre",
            ],
        )?;
        kpis.row()
            .element(pp_right(&format_money_grouped(&s.ventas_totales), s_normal()))
            .element(pp(&s.total_ventas.to_string(), s_normal()))
            .element(pp(&s.total_cotizaciones.to_string(), s_normal()))
            .element(pp(&s.cotizaciones_cerradas.to_string(), s_normal()))
            .element(pp(&format!("{:.1}%", s.tasa_conversion), s_normal()))
            .element(pp(&format!("{:.1}", s.dias_promedio_cierre), s_normal()))
            .push()
            .map_err(pdf_err)?;
        doc.push(kpis);
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("PRODUCTOS MÁS VENDIDOS").styled(s_section()));
        doc.push(Break::new(0.5));
        let mut top = framed_table(vec![1, 5, 3, 2, 2, 2]);
        header_row(&mut top, &["#", "Producto", "Categoría", "Precio", "Unidades", "Total"])?;
        for (i, p) in report.top_products.iter().enumerate() {
            top.row()
                .element(pp(&(i + 1).to_string(), s_small()))
                .element(pp(&p.nombre, s_small()))
                .element(pp(&p.categoria, s_small()))
                .element(pp_right(&format_money_grouped(&p.precio), s_small()))
                .element(pp(&p.unidades_vendidas.to_string(), s_small()))
                .element(pp_right(&format_money_grouped(&p.total_ventas), s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(top);
        if report.top_products.is_empty() {
            doc.push(pp("Sin ventas en el periodo", s_small()));
        }
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("PRODUCTOS VENDIDOS").styled(s_section()));
        doc.push(Break::new(0.5));
        let mut sold = framed_table(vec![5, 3, 2, 1, 2, 2]);
        header_row(&mut sold, &["Producto", "Categoría", "P. Unit.", "Cant.", "Total", "Origen"])?;
        for p in &report.products_sold {
            sold.row()
                .element(pp(&p.nombre, s_small()))
                .element(pp(&p.categoria, s_small()))
                .element(pp_right(&format_money_grouped(&p.precio_unitario), s_small()))
                .element(pp(&p.cantidad_vendida.to_string(), s_small()))
                .element(pp_right(&format_money_grouped(&p.total_ventas), s_small()))
                .element(pp(origin_label(p.origen), s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(sold);
        doc.push(pp_right(
            &format!("Total vendido: {}", format_money_grouped(&report.total_sold_value())),
            s_bold(),
        ));
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("COTIZACIONES CERRADAS").styled(s_section()));
        doc.push(Break::new(0.5));
        let mut closed = framed_table(vec![1, 4, 4, 2, 3, 3, 2]);
        header_row(
            &mut closed,
            &["ID", "Cliente", "Email", "Teléfono", "Creación", "Cierre", "Total"],
        )?;
        for q in &report.closed_quotations {
            closed
                .row()
                .element(pp(&q.id.to_string(), s_small()))
                .element(pp(&q.nombre_cliente, s_small()))
                .element(pp(&q.email, s_small()))
                .element(pp(&q.telefono, s_small()))
                .element(pp(&q.fecha_creacion, s_small()))
                .element(pp(&q.fecha_cierre, s_small()))
                .element(pp_right(&format_money_grouped(&q.total), s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(closed);
        doc.push(pp_right(
            &format!(
                "Total cotizaciones cerradas: {}",
                format_money_grouped(&report.closed_quotations_value())
            ),
            s_bold(),
        ));

        self.finish(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn filter_description() {
        assert_eq!(
            filter_text(&ReportFilter::default()),
            "Periodo: Todo el periodo | Categoría: Todas"
        );
        let f = ReportFilter {
            from: NaiveDate::from_ymd_opt(2024, 5, 1),
            to: None,
            category: Some("Colchones".into()),
        };
        assert_eq!(filter_text(&f), "Periodo: 01/05/2024 al - | Categoría: Colchones");
    }
}
