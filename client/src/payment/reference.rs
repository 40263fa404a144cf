//! Human-facing payment references and bank QR images.

use rand_core::{OsRng, RngCore};
use reqwest::Url;

use crate::{
    error::{ClientError, Result},
    models::payment::{InvoiceRef, PaymentLink},
};

/// No `I`, `O`, `0` or `1`, so codes survive being read aloud or retyped.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_RANDOM_LEN: usize = 4;

const VIETQR_BASE: &str = "https://img.vietqr.io/image";

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// `INV` + invoice id in base 36 (at least 4 chars) + last four digits of the
/// amount + 4 random characters, e.g. `INV001F0500KX7P`.
pub fn payment_code(invoice: &InvoiceRef) -> String {
    payment_code_with(invoice, &mut OsRng)
}

pub fn payment_code_with(invoice: &InvoiceRef, rng: &mut impl RngCore) -> String {
    let id = base36(invoice.invoice_id.unsigned_abs());
    let amount = invoice.total_amount.rem_euclid(10_000);
    let suffix: String = (0..CODE_RANDOM_LEN)
        .map(|_| {
            let idx = rng.next_u32() as usize % CODE_ALPHABET.len();
            CODE_ALPHABET[idx] as char
        })
        .collect();
    format!("INV{id:0>4}{amount:04}{suffix}")
}

/// QR template for a payment method code; only changes how the image looks.
pub fn qr_template(method_code: Option<&str>) -> &'static str {
    let Some(code) = method_code else {
        return "compact2";
    };
    let code = code.to_uppercase();
    if code.contains("MOMO") || code.contains("MO_MO") {
        "compact"
    } else if code.contains("ZALO") {
        "qr_only"
    } else if code.contains("QR") {
        "print"
    } else {
        "compact2"
    }
}

/// VietQR image URL for a payment link, or `None` when the provider did not
/// return bank details. The link's amount wins over the invoice total.
pub fn vietqr_url(
    link: &PaymentLink,
    invoice: &InvoiceRef,
    reference: &str,
    method_code: Option<&str>,
) -> Result<Option<Url>> {
    let (Some(bin), Some(account)) = (&link.bin, &link.account_number) else {
        return Ok(None);
    };
    let amount = link.amount.unwrap_or(invoice.total_amount);
    let path = format!(
        "{VIETQR_BASE}/{bin}-{account}-{}.png",
        qr_template(method_code)
    );
    let url = Url::parse_with_params(
        &path,
        &[
            ("amount", amount.to_string()),
            ("addInfo", reference.to_string()),
            ("accountName", link.account_name.clone().unwrap_or_default()),
        ],
    )
    .map_err(|e| ClientError::InvalidInput(format!("cannot build QR URL: {e}")))?;
    Ok(Some(url))
}
