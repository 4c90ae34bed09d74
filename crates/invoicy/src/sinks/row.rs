//! Flattening of an invoice into one spreadsheet row.

use std::fmt::Write;

use crate::extraction::{LineItem, Tax, Withholding};
use crate::toolchain::InvoiceData;

/// The 23 columns appended per invoice, in sheet order.
pub fn invoice_row(data: &InvoiceData) -> Vec<String> {
    let parties = &data.emisor_receptor;
    let voucher = &parties.voucher;
    let issuer = &parties.issuer;
    let recipient = &parties.recipient;
    let other = &parties.other;
    let items = &data.items;

    vec![
        voucher.kind.clone(),
        text(&voucher.subkind),
        voucher.jurisdiction.clone(),
        voucher.number.clone(),
        voucher.issue_date.clone(),
        voucher.currency.clone(),
        issuer.name.clone(),
        text(&issuer.tax_id),
        text(&issuer.vat_condition),
        text(&issuer.address),
        recipient.name.clone(),
        text(&recipient.tax_id),
        text(&recipient.vat_condition),
        text(&recipient.address),
        describe_items(&items.lines),
        items.subtotal.to_string(),
        format_taxes(&data.impuestos.taxes),
        format_withholdings(&data.impuestos.withholdings),
        items.total.to_string(),
        text(&items.notes),
        text(&other.cae),
        text(&other.cae_due_date),
        text(&other.payment_method),
    ]
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

pub fn describe_items(lines: &[LineItem]) -> String {
    lines
        .iter()
        .map(|line| {
            format!(
                "Descripción: {}, Cantidad: {}, Precio Unitario: ${}, Precio Total: ${}",
                line.description, line.quantity, line.unit_price, line.line_total
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Numbered blocks, one per tax. Empty input renders as an empty string.
pub fn format_taxes(taxes: &[Tax]) -> String {
    taxes
        .iter()
        .enumerate()
        .map(|(index, tax)| {
            let mut block = String::new();
            let _ = writeln!(block, "Impuesto #{}:", index + 1);
            let _ = writeln!(block, "  - Tipo: {}", tax.kind);
            if let Some(description) = tax.description.as_deref().filter(|d| !d.is_empty()) {
                let _ = writeln!(block, "  - Descripción: {}", description);
            }
            let _ = writeln!(block, "  - Base Imponible: ${:.2}", tax.taxable_base);
            if let Some(rate) = tax.rate {
                let _ = writeln!(block, "  - Alícuota: {:.2}%", rate);
            }
            let _ = writeln!(block, "  - Importe: ${:.2}", tax.amount);
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_withholdings(withholdings: &[Withholding]) -> String {
    withholdings
        .iter()
        .enumerate()
        .map(|(index, withholding)| {
            let mut block = String::new();
            let _ = writeln!(block, "Retención #{}:", index + 1);
            let _ = writeln!(block, "  - Tipo: {}", withholding.kind);
            let _ = writeln!(
                block,
                "  - Descripción: {}",
                withholding
                    .description
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .unwrap_or("No especificada")
            );
            let _ = writeln!(block, "  - Base Imponible: ${:.2}", withholding.taxable_base);
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}
