//! Pure HTML templating for invoice documents.

use invoica_store::{Invoice, InvoiceItem, Profile};

/// Optional image data URLs resolved by the caller from the blob store.
#[derive(Debug, Default)]
pub struct InvoiceImages {
    pub logo: Option<String>,
    pub signature: Option<String>,
}

/// Render an invoice to a self-contained HTML document (A4 print CSS).
///
/// Stateless: all amounts are recomputed from the line items and rounded to
/// cents for display only.
pub fn invoice_html(
    invoice: &Invoice,
    items: &[InvoiceItem],
    profile: &Profile,
    images: &InvoiceImages,
) -> String {
    let totals = invoice.totals(items).rounded();
    let currency = &invoice.currency;

    let mut rows = String::new();
    for item in items {
        rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"muted\">{}</td>\
             <td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            esc(&item.name),
            esc(item.description.as_deref().unwrap_or("")),
            trim_qty(item.quantity),
            money(item.rate),
            money(item.amount()),
        ));
    }

    let logo = images
        .logo
        .as_deref()
        .map(|src| format!("<img class=\"logo\" src=\"{src}\" alt=\"logo\">"))
        .unwrap_or_default();
    let signature = images
        .signature
        .as_deref()
        .map(|src| {
            format!("<div class=\"signature\"><img src=\"{src}\" alt=\"signature\"><div>Authorized signature</div></div>")
        })
        .unwrap_or_default();

    let from_name = invoice
        .from_name
        .clone()
        .or_else(|| profile.company_name.clone())
        .unwrap_or_default();
    let from_address = invoice
        .from_address
        .clone()
        .unwrap_or_else(|| profile.address_oneline());

    let due = invoice
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "On receipt".to_string());

    let bank_details = match (&profile.bank_name, &profile.account_number) {
        (Some(bank), Some(account)) => format!(
            "<div class=\"bank\"><strong>Payment details</strong><br>{} · {} · {}</div>",
            esc(bank),
            esc(profile.account_name.as_deref().unwrap_or("")),
            esc(account),
        ),
        _ => String::new(),
    };

    let notes = invoice
        .notes
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(|n| format!("<div class=\"notes\"><strong>Notes</strong><br>{}</div>", esc(n)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Invoice {number}</title>
<style>
  @page {{ size: A4; margin: 0; }}
  body {{ font-family: Helvetica, Arial, sans-serif; font-size: 12px; color: #1f2430; margin: 0; padding: 32px; }}
  .header {{ display: flex; justify-content: space-between; align-items: flex-start; border-bottom: 2px solid #2d6cdf; padding-bottom: 16px; }}
  .logo {{ max-height: 64px; }}
  h1 {{ font-size: 24px; margin: 0; color: #2d6cdf; }}
  .meta {{ text-align: right; }}
  .muted {{ color: #6b7280; }}
  .parties {{ display: flex; justify-content: space-between; margin: 24px 0; }}
  table {{ width: 100%; border-collapse: collapse; }}
  th {{ background: #2d6cdf; color: #fff; text-align: left; padding: 8px; }}
  td {{ padding: 8px; border-bottom: 1px solid #e5e7eb; }}
  .num {{ text-align: right; white-space: nowrap; }}
  .totals {{ margin-top: 16px; margin-left: auto; width: 260px; }}
  .totals td {{ border: none; padding: 4px 8px; }}
  .totals .grand td {{ border-top: 2px solid #2d6cdf; font-weight: bold; font-size: 14px; }}
  .bank, .notes {{ margin-top: 24px; font-size: 11px; }}
  .signature {{ margin-top: 32px; text-align: right; font-size: 11px; }}
  .signature img {{ max-height: 48px; display: block; margin-left: auto; }}
</style>
</head>
<body>
  <div class="header">
    <div>{logo}<h1>INVOICE</h1><div class="muted">{number}</div></div>
    <div class="meta">
      <div><strong>{from_name}</strong></div>
      <div class="muted">{from_address}</div>
      <div class="muted">{from_email}</div>
    </div>
  </div>
  <div class="parties">
    <div>
      <div class="muted">Billed to</div>
      <div><strong>{bill_to_name}</strong></div>
      <div class="muted">{bill_to_address}</div>
      <div class="muted">{bill_to_email}</div>
    </div>
    <div class="meta">
      <div>Issue date: {issue_date}</div>
      <div>Due: {due}</div>
      <div>Status: {status}</div>
    </div>
  </div>
  <table>
    <thead><tr><th>Item</th><th>Description</th><th class="num">Qty</th><th class="num">Rate</th><th class="num">Amount</th></tr></thead>
    <tbody>
{rows}    </tbody>
  </table>
  <table class="totals">
    <tr><td>Subtotal</td><td class="num">{currency} {subtotal}</td></tr>
    <tr><td>Discount</td><td class="num">-{currency} {discount}</td></tr>
    <tr><td>Tax</td><td class="num">{currency} {tax}</td></tr>
    <tr><td>Shipping</td><td class="num">{currency} {shipping}</td></tr>
    <tr class="grand"><td>Total</td><td class="num">{currency} {total}</td></tr>
  </table>
  {bank_details}
  {notes}
  {signature}
</body>
</html>
"#,
        number = esc(&invoice.invoice_number),
        logo = logo,
        from_name = esc(&from_name),
        from_address = esc(&from_address),
        from_email = esc(invoice.from_email.as_deref().unwrap_or("")),
        bill_to_name = esc(&invoice.bill_to_name),
        bill_to_address = esc(invoice.bill_to_address.as_deref().unwrap_or("")),
        bill_to_email = esc(invoice.bill_to_email.as_deref().unwrap_or("")),
        issue_date = invoice.issue_date.format("%Y-%m-%d"),
        due = due,
        status = invoice.status.as_str(),
        rows = rows,
        currency = esc(currency),
        subtotal = money(totals.subtotal),
        discount = money(totals.discount),
        tax = money(totals.tax),
        shipping = money(totals.shipping),
        total = money(totals.total),
        bank_details = bank_details,
        notes = notes,
        signature = signature,
    )
}

fn money(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Quantities print without trailing zeros (2 not 2.00, but 2.5 stays 2.5).
fn trim_qty(qty: f64) -> String {
    if qty.fract() == 0.0 {
        format!("{qty:.0}")
    } else {
        format!("{qty}")
    }
}

fn esc(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use invoica_shared::money::Adjustment;
    use invoica_shared::types::InvoiceStatus;
    use uuid::Uuid;

    fn fixture() -> (Invoice, Vec<InvoiceItem>, Profile) {
        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            customer_id: None,
            invoice_number: "INV-0042".into(),
            status: InvoiceStatus::Sent,
            issue_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            due_date: None,
            currency: "USD".into(),
            payment_method: None,
            payment_terms: None,
            bill_to_name: "Client & Co".into(),
            bill_to_email: Some("ap@client.example".into()),
            bill_to_address: None,
            from_name: Some("Acme Studio".into()),
            from_email: None,
            from_address: None,
            discount: Adjustment::percentage(10.0),
            tax: Adjustment::percentage(5.0),
            shipping: Adjustment::amount(10.0),
            notes: Some("<script>alert(1)</script>".into()),
            created_at: now,
            updated_at: now,
        };
        let items = vec![
            InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id: invoice.id,
                name: "Design".into(),
                description: None,
                quantity: 2.0,
                rate: 50.0,
                position: 0,
            },
            InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id: invoice.id,
                name: "Hosting".into(),
                description: None,
                quantity: 1.0,
                rate: 30.0,
                position: 1,
            },
        ];
        let profile = Profile::empty(invoice.user_id);
        (invoice, items, profile)
    }

    #[test]
    fn renders_totals_rounded_to_cents() {
        let (invoice, items, profile) = fixture();
        let html = invoice_html(&invoice, &items, &profile, &InvoiceImages::default());

        assert!(html.contains("INV-0042"));
        assert!(html.contains("USD 130.00")); // subtotal
        assert!(html.contains("USD 5.85")); // tax on post-discount base
        assert!(html.contains("USD 132.85")); // grand total
    }

    #[test]
    fn escapes_user_content() {
        let (invoice, items, profile) = fixture();
        let html = invoice_html(&invoice, &items, &profile, &InvoiceImages::default());

        assert!(html.contains("Client &amp; Co"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn missing_due_date_prints_on_receipt() {
        let (invoice, items, profile) = fixture();
        let html = invoice_html(&invoice, &items, &profile, &InvoiceImages::default());
        assert!(html.contains("On receipt"));
    }

    #[test]
    fn embeds_logo_when_present() {
        let (invoice, items, profile) = fixture();
        let images = InvoiceImages {
            logo: Some("data:image/png;base64,AAAA".into()),
            signature: None,
        };
        let html = invoice_html(&invoice, &items, &profile, &images);
        assert!(html.contains("data:image/png;base64,AAAA"));
    }

    #[test]
    fn quantity_formatting() {
        assert_eq!(trim_qty(2.0), "2");
        assert_eq!(trim_qty(2.5), "2.5");
    }
}
