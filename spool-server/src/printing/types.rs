//! Receipt printing types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spool_printer::TextEncoding;

/// One ordered line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Decimal,
    /// Options / modifiers (e.g. "no onions")
    #[serde(default)]
    pub modifiers: Vec<String>,
    /// Category name, items without one go under "Other Items"
    pub category: Option<String>,
    /// Short preparation tag printed in brackets (e.g. "GF", "to go")
    pub sub_type: Option<String>,
    /// Free-text note for the kitchen
    pub note: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl ReceiptItem {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            modifiers: Vec::new(),
            category: None,
            sub_type: None,
            note: None,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// qty × unit price, `None` when it does not fit in a `Decimal`
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Which copy is being printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    /// Preparation ticket for the kitchen
    Kitchen,
    /// Bill for the guest
    #[default]
    Customer,
}

/// Layout options for a receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptOptions {
    #[serde(default)]
    pub kind: ReceiptKind,
    /// Large centered title (e.g. table name)
    pub title: Option<String>,
    #[serde(default)]
    pub header: Vec<String>,
    #[serde(default)]
    pub footer: Vec<String>,
    #[serde(default)]
    pub show_prices_on_kitchen: bool,
    /// Paper width in columns (48 for 80mm, 32 for 58mm); server default when unset
    #[serde(default)]
    pub width: Option<usize>,
    /// Printed before every amount
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub encoding: TextEncoding,
    /// Lines fed before the cut
    #[serde(default = "default_feed_lines")]
    pub feed_lines: u8,
    /// Replaces the built-in category priority table (case-insensitive names)
    #[serde(default)]
    pub category_order: Vec<String>,
}

/// Columns of an 80mm roll
pub const DEFAULT_PAPER_WIDTH: usize = 48;

fn default_feed_lines() -> u8 {
    3
}

impl ReceiptOptions {
    pub fn kitchen() -> Self {
        Self {
            kind: ReceiptKind::Kitchen,
            ..Self::default()
        }
    }

    pub fn customer() -> Self {
        Self::default()
    }

    /// Effective paper width in columns
    pub fn paper_width(&self) -> usize {
        self.width.unwrap_or(DEFAULT_PAPER_WIDTH)
    }

    /// Fill in the width when the caller did not choose one
    pub fn or_width(mut self, width: usize) -> Self {
        self.width.get_or_insert(width);
        self
    }

    pub fn shows_prices(&self) -> bool {
        match self.kind {
            ReceiptKind::Customer => true,
            ReceiptKind::Kitchen => self.show_prices_on_kitchen,
        }
    }
}

impl Default for ReceiptOptions {
    fn default() -> Self {
        Self {
            kind: ReceiptKind::default(),
            title: None,
            header: Vec::new(),
            footer: Vec::new(),
            show_prices_on_kitchen: false,
            width: None,
            currency: String::new(),
            encoding: TextEncoding::default(),
            feed_lines: default_feed_lines(),
            category_order: Vec::new(),
        }
    }
}

/// A complete receipt to render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub items: Vec<ReceiptItem>,
    #[serde(default)]
    pub options: ReceiptOptions,
}
