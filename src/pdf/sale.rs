use super::{
    datetime_text, framed_table, header_row, key_values, or_dash, pdf_err, pp, pp_center, pp_right,
    s_bold, s_normal, s_section, s_small, s_total, Orientation, PdfRenderer,
};
use crate::error::AppError;
use crate::models::{DeliveryType, Sale};
use crate::service::sale::DailyReport;
use crate::service::util::format_money_grouped;
use bigdecimal::Zero;
use genpdf::elements::{Break, Paragraph, TableLayout};
use genpdf::style::Style;
use genpdf::Element;

/// 历史导出时的筛选说明
#[derive(Debug, Clone, Default)]
pub struct HistoryFilters {
    pub seller: Option<String>,
    pub status: Option<String>,
}

impl HistoryFilters {
    pub fn describe(&self) -> String {
        format!(
            "Vendedor: {} | Estado: {}",
            self.seller.as_deref().unwrap_or("Todos"),
            self.status.as_deref().unwrap_or("Todos")
        )
    }
}

fn money_row(table: &mut TableLayout, label: &str, value: String, style: Style) -> Result<(), AppError> {
    table
        .row()
        .element(pp(label, style))
        .element(pp_right(&value, style))
        .push()
        .map_err(pdf_err)
}

impl PdfRenderer {
    /// 销售凭证
    pub fn sale_receipt(&self, sale: &Sale) -> Result<Vec<u8>, AppError> {
        let mut doc = self.document(
            &format!("COMPROBANTE DE VENTA N° {:06}", sale.id),
            Orientation::Portrait,
        )?;

        doc.push(Paragraph::new("DATOS DEL CLIENTE").styled(s_section()));
        doc.push(Break::new(0.5));
        doc.push(key_values(&[
            ("Nombre:", sale.customer_name.clone()),
            ("Teléfono:", sale.customer_phone.clone()),
            ("Email:", sale.customer_email.clone()),
        ])?);
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("INFORMACIÓN DE LA VENTA").styled(s_section()));
        doc.push(Break::new(0.5));
        let mut info = vec![
            ("Fecha:", datetime_text(sale.created_at)),
            ("Vendedor:", sale.seller_display().to_string()),
            ("Estado:", sale.status.label().to_string()),
            ("Método de pago:", sale.payment_method.label().to_string()),
            ("Tipo de entrega:", sale.delivery_type.label().to_string()),
        ];
        if sale.delivery_type == DeliveryType::HomeDelivery {
            info.push(("Dirección:", or_dash(sale.delivery_address.as_deref())));
        }
        if let Some(paid) = sale.paid_at {
            info.push(("Fecha de pago:", datetime_text(paid)));
        }
        doc.push(key_values(&info)?);
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("DETALLE DE PRODUCTOS").styled(s_section()));
        doc.push(Break::new(0.5));
        let mut items = framed_table(vec![2, 6, 1, 2, 2]);
        header_row(&mut items, &["Código", "Producto", "Cant.", "P. Unit.", "Subtotal"])?;
        for item in &sale.items {
            items
                .row()
                .element(pp(&or_dash(item.product_code.as_deref()), s_small()))
                .element(pp(&item.product_name, s_small()))
                .element(pp(&item.quantity.to_string(), s_small()))
                .element(pp_right(&format_money_grouped(&item.unit_price), s_small()))
                .element(pp_right(&format_money_grouped(&item.subtotal), s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(items);
        doc.push(Break::new(1.0));

        let mut totals = TableLayout::new(vec![5, 2]);
        money_row(&mut totals, "Subtotal", format_money_grouped(&sale.subtotal), s_normal())?;
        if !sale.discount.is_zero() {
            money_row(
                &mut totals,
                "Descuento",
                format!("- {}", format_money_grouped(&sale.discount)),
                s_normal(),
            )?;
        }
        money_row(&mut totals, "IGV (18%)", format_money_grouped(&sale.igv), s_normal())?;
        if !sale.delivery_fee.is_zero() {
            money_row(&mut totals, "Costo de delivery", format_money_grouped(&sale.delivery_fee), s_normal())?;
        }
        money_row(&mut totals, "TOTAL", format_money_grouped(&sale.total), s_total())?;
        doc.push(totals);

        if let Some(notes) = sale.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            doc.push(Break::new(1.0));
            doc.push(pp("Observaciones:", s_bold()));
            doc.push(pp(notes, s_normal()));
        }

        doc.push(Break::new(1.5));
        doc.push(pp_center("¡Gracias por su compra!", s_section()));

        self.finish(doc)
    }

    /// 销售历史 (横向)
    pub fn sales_history(&self, sales: &[Sale], filters: &HistoryFilters) -> Result<Vec<u8>, AppError> {
        let mut doc = self.document("Historial de Ventas", Orientation::Landscape)?;

        doc.push(pp(&filters.describe(), s_normal()));
        doc.push(Break::new(0.5));

        let stats = DailyReport::from_sales(sales);
        let mut summary = framed_table(vec![1, 1, 1, 1, 1, 2]);
        header_row(
            &mut summary,
            &["Total", "Pendientes", "Completadas", "Entregadas", "Canceladas", "Ingresos (completadas)"],
        )?;
        summary
            .row()
            .element(pp(&stats.total_sales.to_string(), s_normal()))
            .element(pp(&stats.pending.to_string(), s_normal()))
            .element(pp(&stats.completed.to_string(), s_normal()))
            .element(pp(&stats.delivered.to_string(), s_normal()))
            .element(pp(&stats.cancelled.to_string(), s_normal()))
            .element(pp_right(&format_money_grouped(&stats.revenue), s_normal()))
            .push()
            .map_err(pdf_err)?;
        doc.push(summary);
        doc.push(Break::new(1.0));

        let mut table = framed_table(vec![1, 3, 4, 2, 3, 2, 2, 2, 2]);
        header_row(
            &mut table,
            &["ID", "Fecha", "Cliente", "Teléfono", "Vendedor", "Pago", "Entrega", "Estado", "Total"],
        )?;
        for s in sales {
            table
                .row()
                .element(pp(&s.id.to_string(), s_small()))
                .element(pp(&datetime_text(s.created_at), s_small()))
                .element(pp(&s.customer_name, s_small()))
                .element(pp(&s.customer_phone, s_small()))
                .element(pp(s.seller_display(), s_small()))
                .element(pp(s.payment_method.label(), s_small()))
                .element(pp(s.delivery_type.label(), s_small()))
                .element(pp(s.status.label(), s_small()))
                .element(pp_right(&format_money_grouped(&s.total), s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(table);

        self.finish(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_filters_default_to_everything() {
        assert_eq!(HistoryFilters::default().describe(), "Vendedor: Todos | Estado: Todos");
        let f = HistoryFilters {
            seller: Some("Luis Soto".into()),
            status: Some("Pendiente".into()),
        };
        assert_eq!(f.describe(), "Vendedor: Luis Soto | Estado: Pendiente");
    }
}
