use super::{
    datetime_text, framed_table, header_row, key_values, pdf_err, pp, pp_right, s_muted, s_normal,
    s_section, s_small, s_total, Orientation, PdfRenderer,
};
use crate::error::AppError;
use crate::models::Quotation;
use crate::service::quotation::{quotation_total, QuotationStats};
use crate::service::util::format_money_grouped;
use genpdf::elements::{Break, Paragraph};
use genpdf::Element;

/// 报价单条款
pub const QUOTATION_TERMS: [&str; 5] = [
    "Esta cotización tiene una validez de 15 días a partir de la fecha de emisión.",
    "Los precios incluyen IGV.",
    "El tiempo de entrega se coordinará después de confirmar el pedido.",
    "Para confirmar su pedido, comuníquese con nosotros por los canales indicados.",
    "Garantía de fábrica de 2 años en todos nuestros productos.",
];

impl PdfRenderer {
    /// 单张报价单
    pub fn quotation(&self, q: &Quotation) -> Result<Vec<u8>, AppError> {
        let mut doc = self.document(&format!("Cotización N° {:06}", q.id), Orientation::Portrait)?;

        doc.push(Paragraph::new("DATOS DEL CLIENTE").styled(s_section()));
        doc.push(Break::new(0.5));
        doc.push(key_values(&[
            ("Nombre:", q.customer_name.clone()),
            ("Email:", q.email.clone()),
            ("Teléfono:", q.phone.clone()),
            ("Dirección:", q.address.clone()),
        ])?);
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("INFORMACIÓN DE LA COTIZACIÓN").styled(s_section()));
        doc.push(Break::new(0.5));
        doc.push(key_values(&[
            ("Fecha de emisión:", datetime_text(q.created_at)),
            ("Fecha deseada:", q.desired_date.format("%d/%m/%Y").to_string()),
            ("Estado:", q.status.clone()),
        ])?);
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("PRODUCTOS").styled(s_section()));
        doc.push(Break::new(0.5));
        let mut table = framed_table(vec![6, 1, 2, 2]);
        header_row(&mut table, &["Producto", "Cant.", "Precio Unit.", "Subtotal"])?;
        for p in q.products.iter() {
            table
                .row()
                .element(pp(&p.name, s_small()))
                .element(pp(&p.quantity.to_string(), s_small()))
                .element(pp_right(&format_money_grouped(&p.price), s_small()))
                .element(pp_right(&format_money_grouped(&p.subtotal()), s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        if q.products.is_empty() {
            table
                .row()
                .element(pp("Sin productos", s_small()))
                .element(pp("", s_small()))
                .element(pp("", s_small()))
                .element(pp("", s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(table);
        doc.push(Break::new(0.5));

        // 明细为空时以保存的总额为准
        let total = if q.products.is_empty() {
            q.total.clone()
        } else {
            quotation_total(&q.products)
        };
        doc.push(pp_right(&format!("TOTAL: {}", format_money_grouped(&total)), s_total()));
        doc.push(Break::new(1.5));

        doc.push(Paragraph::new("TÉRMINOS Y CONDICIONES").styled(s_section()));
        doc.push(Break::new(0.5));
        for term in QUOTATION_TERMS {
            doc.push(pp(&format!("• {}", term), s_muted()));
        }

        self.finish(doc)
    }

    /// 报价单列表, `status` 为筛选条件 (仅用于标题)
    pub fn quotation_list(&self, list: &[Quotation], status: Option<&str>) -> Result<Vec<u8>, AppError> {
        let mut doc = self.document("Listado de Cotizaciones", Orientation::Portrait)?;

        doc.push(pp(
            &format!("Estado: {}", status.unwrap_or("Todos")),
            s_normal(),
        ));
        doc.push(Break::new(0.5));

        let stats = QuotationStats::from_quotations(list);
        let mut summary = framed_table(vec![1, 1, 1, 1, 1]);
        header_row(&mut summary, &["Total", "Pendientes", "En Proceso", "Contactadas", "Cerradas"])?;
        summary
            .row()
            .element(pp(&stats.total.to_string(), s_normal()))
            .element(pp(&stats.pendientes.to_string(), s_normal()))
            .element(pp(&stats.en_proceso.to_string(), s_normal()))
            .element(pp(&stats.contactadas.to_string(), s_normal()))
            .element(pp(&stats.cerradas.to_string(), s_normal()))
            .push()
            .map_err(pdf_err)?;
        doc.push(summary);
        doc.push(Break::new(1.0));

        let mut table = framed_table(vec![1, 4, 4, 3, 2, 3, 2]);
        header_row(
            &mut table,
            &["ID", "Cliente", "Email", "Teléfono", "F. Deseada", "Total", "Estado"],
        )?;
        for q in list {
            table
                .row()
                .element(pp(&q.id.to_string(), s_small()))
                .element(pp(&q.customer_name, s_small()))
                .element(pp(&q.email, s_small()))
                .element(pp(&q.phone, s_small()))
                .element(pp(&q.desired_date.format("%d/%m/%Y").to_string(), s_small()))
                .element(pp_right(&format_money_grouped(&q.total), s_small()))
                .element(pp(&q.status, s_small()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(table);

        self.finish(doc)
    }
}
