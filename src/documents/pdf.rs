//! Invoice PDFs drawn with `printpdf` using the built-in Helvetica faces.
//!
//! Layout is computed in points on a US Letter page with the origin at the bottom left.
//! Built-in fonts are WinAnsi encoded, so Latin-1 names render as written.

use crate::{
    entities::{customer, invoice},
    errors::ServiceError,
};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Pt, Rect, Rgb,
};
use rust_decimal::Decimal;
use tracing::error;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 50.0;
const FOOTER_Y: f32 = 40.0;
const LAYER: &str = "Invoice";

type Shade = (f32, f32, f32);

const NAVY: Shade = (0.102, 0.180, 0.353);
const GREY: Shade = (0.4, 0.4, 0.4);
const DARK: Shade = (0.2, 0.2, 0.2);
const STRIPE: Shade = (0.961, 0.969, 0.980);
const RULE: Shade = (0.867, 0.867, 0.867);
const WHITE: Shade = (1.0, 1.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
}

fn pdf_error(err: printpdf::Error) -> ServiceError {
    error!(error = ?err, "Invoice PDF rendering failed");
    ServiceError::InternalError("Failed to render invoice PDF".to_string())
}

fn mm(points: f32) -> Mm {
    Mm::from(Pt(points))
}

fn color((r, g, b): Shade) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

/// Helvetica advance widths in 1/1000 em from the standard AFM metrics.
fn glyph_width(ch: char) -> u16 {
    match ch {
        '0'..='9' | '$' | '#' | '?' | '_' => 556,
        ' ' | '.' | ',' | ':' | ';' | '/' | '!' | '\'' | 'f' | 't' | 'I' => 278,
        '-' | '(' | ')' | 'r' => 333,
        '%' => 889,
        '&' => 667,
        'i' | 'j' | 'l' => 222,
        'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' | 'J' => 500,
        'm' | 'M' => 833,
        'w' => 722,
        'W' => 944,
        'F' | 'T' | 'Z' => 611,
        'L' => 556,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 722,
        'G' | 'O' | 'Q' => 778,
        'A'..='Z' => 667,
        _ => 556,
    }
}

/// Rendered width of `value` in points at `size`.
fn text_width(value: &str, size: f32) -> f32 {
    let units: u32 = value.chars().map(|c| u32::from(glyph_width(c))).sum();
    units as f32 * size / 1000.0
}

/// Drawing surface that tracks the current page and starts new ones on demand.
struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Canvas {
    fn new(title: &str) -> Result<Self, ServiceError> {
        let (doc, page, layer) = PdfDocument::new(title, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), LAYER);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), LAYER);
        self.layer = self.doc.get_page(page).get_layer(layer);
    }

    fn text(&self, x: f32, y: f32, size: f32, face: Face, shade: Shade, value: &str) {
        let font = match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
        };
        self.layer.set_fill_color(color(shade));
        self.layer.use_text(value, size, mm(x), mm(y), font);
    }

    /// Right-aligns text so it ends at `right`.
    fn text_right(&self, right: f32, y: f32, size: f32, face: Face, shade: Shade, value: &str) {
        self.text(right - text_width(value, size), y, size, face, shade, value);
    }

    fn fill_rect(&self, x: f32, y: f32, w: f32, h: f32, shade: Shade) {
        self.layer.set_fill_color(color(shade));
        self.layer.add_rect(Rect::new(mm(x), mm(y), mm(x + w), mm(y + h)));
    }

    fn rule(&self, x1: f32, x2: f32, y: f32) {
        self.fill_rect(x1, y - 0.25, x2 - x1, 0.5, RULE);
    }

    fn finish(self) -> Result<Vec<u8>, ServiceError> {
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

/// One table row on the invoice.
#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

fn money(currency: &str, amount: Decimal) -> String {
    format!("{} {}", currency, amount.round_dp(2))
}

fn table_header(canvas: &Canvas, y: f32, right: f32) {
    canvas.fill_rect(MARGIN, y - 6.0, right - MARGIN, 20.0, NAVY);
    canvas.text(MARGIN + 5.0, y, 9.0, Face::Bold, WHITE, "Product");
    canvas.text_right(330.0, y, 9.0, Face::Bold, WHITE, "Qty");
    canvas.text_right(430.0, y, 9.0, Face::Bold, WHITE, "Unit Price");
    canvas.text_right(right - 5.0, y, 9.0, Face::Bold, WHITE, "Total");
}

/// Renders an invoice with header, bill-to block, line items and totals.
pub fn render_invoice(
    invoice: &invoice::Model,
    customer: &customer::Model,
    lines: &[InvoiceLine],
) -> Result<Vec<u8>, ServiceError> {
    let mut canvas = Canvas::new(&invoice.invoice_number)?;
    let right = PAGE_WIDTH - MARGIN;
    let top = PAGE_HEIGHT - MARGIN;
    let currency = invoice.currency.as_str();

    canvas.text(MARGIN, top - 20.0, 24.0, Face::Bold, NAVY, "ChemOps");
    canvas.text(
        MARGIN,
        top - 38.0,
        10.0,
        Face::Regular,
        GREY,
        "Chemical Sales & Billing Platform",
    );

    canvas.text_right(right, top - 20.0, 20.0, Face::Bold, NAVY, "INVOICE");
    let issued = invoice.issued_at.unwrap_or(invoice.created_at);
    let header = [
        format!("Invoice #: {}", invoice.invoice_number),
        format!("Date: {}", issued.format("%Y-%m-%d")),
        format!("Due: {}", invoice.due_date.format("%Y-%m-%d")),
        format!("Status: {}", invoice.status),
    ];
    for (i, line) in header.iter().enumerate() {
        canvas.text_right(right, top - 40.0 - i as f32 * 15.0, 10.0, Face::Regular, DARK, line);
    }

    let mut y = top - 120.0;
    canvas.text(MARGIN, y, 12.0, Face::Bold, NAVY, "Bill To:");
    let mut bill_to = vec![customer.company_name.clone()];
    bill_to.extend(customer.contact_name.clone());
    bill_to.extend(customer.contact_email.clone());
    bill_to.extend(customer.address_lines());
    for line in bill_to.iter().filter(|l| !l.trim().is_empty()) {
        y -= 15.0;
        canvas.text(MARGIN, y, 10.0, Face::Regular, DARK, line);
    }

    y -= 40.0;
    table_header(&canvas, y, right);

    for (i, line) in lines.iter().enumerate() {
        y -= 20.0;
        if y < FOOTER_Y + 100.0 {
            canvas.new_page();
            y = top;
            table_header(&canvas, y, right);
            y -= 20.0;
        }
        if i % 2 == 0 {
            canvas.fill_rect(MARGIN, y - 5.0, right - MARGIN, 18.0, STRIPE);
        }
        canvas.text(MARGIN + 5.0, y, 9.0, Face::Regular, DARK, &line.product_name);
        canvas.text_right(330.0, y, 9.0, Face::Regular, DARK, &line.quantity.to_string());
        canvas.text_right(430.0, y, 9.0, Face::Regular, DARK, &money(currency, line.unit_price));
        canvas.text_right(right - 5.0, y, 9.0, Face::Regular, DARK, &money(currency, line.total));
    }

    y -= 20.0;
    canvas.rule(MARGIN, right, y);
    let totals = [
        ("Subtotal:", invoice.subtotal, Face::Regular, 10.0),
        ("Tax:", invoice.tax_amount, Face::Regular, 10.0),
        ("Total:", invoice.total_amount, Face::Bold, 12.0),
    ];
    for (label, amount, face, size) in totals {
        y -= 16.0;
        canvas.text_right(430.0, y, size, face, NAVY, label);
        canvas.text_right(right - 5.0, y, size, face, NAVY, &money(currency, amount));
    }

    canvas.text(
        MARGIN,
        FOOTER_Y,
        8.0,
        Face::Regular,
        GREY,
        "ChemOps - Chemical Sales & Billing Management Platform",
    );

    canvas.finish()
}
