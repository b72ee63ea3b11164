//! Receipt encoder
//!
//! Renders receipt items into ESC/POS bytes. Items are grouped by category
//! and categories are printed in menu order (starters first, beverages
//! last), whatever order the items arrived in.

use rust_decimal::Decimal;
use spool_printer::{CutMode, EscPosBuilder, PrintResult};

use super::types::{Receipt, ReceiptItem, ReceiptKind, ReceiptOptions};

/// Category used for items without one
pub const OTHER_ITEMS: &str = "Other Items";

/// Built-in menu order, each row lists the names accepted for that course
const CATEGORY_PRIORITY: &[&[&str]] = &[
    &["starter", "starters", "appetizer", "appetizers", "antipasti", "tapas", "small plates"],
    &["soup", "soups"],
    &["salad", "salads"],
    &["main", "mains", "main course", "main courses", "entree", "entrees", "entrée", "entrées"],
    &["side", "sides", "side dish", "side dishes"],
    &["dessert", "desserts", "sweets"],
    &["beverage", "beverages", "drink", "drinks"],
];

const INDENT: &str = "   ";

/// Printed instead of an amount too large for `Decimal`
const OVERFLOW_AMOUNT: &str = "***";

/// ESC/POS receipt encoder
///
/// Pure: the same items and options always produce the same bytes.
pub struct ReceiptEncoder {
    options: ReceiptOptions,
}

impl ReceiptEncoder {
    pub fn new(options: ReceiptOptions) -> Self {
        Self { options }
    }

    /// Check options that the builder cannot recover from
    pub fn validate(options: &ReceiptOptions) -> PrintResult<()> {
        EscPosBuilder::check_width(options.paper_width())?;
        Ok(())
    }

    pub fn options(&self) -> &ReceiptOptions {
        &self.options
    }

    /// Render items to printer bytes
    ///
    /// Output starts with ESC @ and ends with a full cut.
    pub fn encode(&self, items: &[ReceiptItem]) -> Vec<u8> {
        let mut b = EscPosBuilder::with_encoding(self.options.paper_width(), self.options.encoding);

        self.render_header(&mut b);

        let mut total = Some(Decimal::ZERO);
        for (category, group) in self.group_by_category(items) {
            let subtotal = self.render_category(&mut b, category, &group);
            total = total.zip(subtotal).and_then(|(t, s)| t.checked_add(s));
        }

        if self.options.shows_prices() {
            b.bold();
            b.line_lr("TOTAL", &self.money(total));
            b.bold_off();
        }

        self.render_footer(&mut b);

        b.finish(CutMode::Full, self.options.feed_lines)
    }

    fn render_header(&self, b: &mut EscPosBuilder) {
        let has_header = self.options.title.is_some() || !self.options.header.is_empty();
        if !has_header {
            return;
        }

        b.center();
        if let Some(ref title) = self.options.title {
            b.double_size();
            b.bold();
            b.line(title);
            b.bold_off();
            b.reset_size();
        }
        for line in &self.options.header {
            b.line(line);
        }
        b.left();
        b.sep_double();
    }

    /// Group items by category, ordered by course priority
    ///
    /// Unknown categories keep their first-appearance order after all known ones.
    fn group_by_category<'a>(&self, items: &'a [ReceiptItem]) -> Vec<(&'a str, Vec<&'a ReceiptItem>)> {
        let mut groups: Vec<(&'a str, Vec<&'a ReceiptItem>)> = Vec::new();

        for item in items {
            let category = item
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(OTHER_ITEMS);

            match groups
                .iter()
                .position(|(name, _)| name.eq_ignore_ascii_case(category))
            {
                Some(idx) => groups[idx].1.push(item),
                None => groups.push((category, vec![item])),
            }
        }

        // Stable sort keeps first-appearance order within the same rank
        groups.sort_by_key(|(name, _)| self.category_rank(name));
        groups
    }

    fn category_rank(&self, category: &str) -> usize {
        let name = category.trim().to_lowercase();

        if !self.options.category_order.is_empty() {
            return self
                .options
                .category_order
                .iter()
                .position(|c| c.trim().to_lowercase() == name)
                .unwrap_or(usize::MAX);
        }

        CATEGORY_PRIORITY
            .iter()
            .position(|names| names.contains(&name.as_str()))
            .unwrap_or(usize::MAX)
    }

    /// Render one category block, returning the amount it adds to the total
    ///
    /// `None` once any amount overflows.
    fn render_category(
        &self,
        b: &mut EscPosBuilder,
        category: &str,
        items: &[&ReceiptItem],
    ) -> Option<Decimal> {
        b.bold();
        b.underline();
        b.line(category);
        b.underline_off();
        b.bold_off();

        let mut subtotal = Some(Decimal::ZERO);
        for item in items {
            match self.options.kind {
                ReceiptKind::Kitchen => self.render_kitchen_item(b, item),
                ReceiptKind::Customer => self.render_customer_item(b, item),
            }
            subtotal = subtotal
                .zip(item.line_total())
                .and_then(|(sum, line)| sum.checked_add(line));
        }

        b.sep_single();
        subtotal
    }

    fn render_kitchen_item(&self, b: &mut EscPosBuilder, item: &ReceiptItem) {
        let mut label = format!("{} x {}", item.quantity, item.name);
        if let Some(ref tag) = item.sub_type
            && !tag.trim().is_empty()
        {
            label.push_str(&format!(" [{}]", tag.trim()));
        }

        b.double_height();
        if self.options.show_prices_on_kitchen {
            b.line_lr(&label, &self.money(item.line_total()));
        } else {
            b.line(&label);
        }
        b.reset_size();

        for modifier in &item.modifiers {
            b.line(&format!("{}- {}", INDENT, modifier));
        }

        if let Some(ref note) = item.note
            && !note.trim().is_empty()
        {
            b.bold();
            b.line(&format!("{}* {}", INDENT, note.trim()));
            b.bold_off();
        }
    }

    fn render_customer_item(&self, b: &mut EscPosBuilder, item: &ReceiptItem) {
        let label = format!("{} x {}", item.quantity, item.name);
        b.line_lr(&label, &self.money(item.line_total()));

        for modifier in &item.modifiers {
            b.line(&format!("{}- {}", INDENT, modifier));
        }
    }

    fn render_footer(&self, b: &mut EscPosBuilder) {
        if self.options.footer.is_empty() {
            return;
        }
        b.newline();
        b.center();
        for line in &self.options.footer {
            b.line(line);
        }
        b.left();
    }

    /// Overflowed amounts print as a placeholder
    fn money(&self, amount: Option<Decimal>) -> String {
        match amount {
            Some(amount) => format!("{}{:.2}", self.options.currency, amount.round_dp(2)),
            None => OVERFLOW_AMOUNT.to_string(),
        }
    }
}

impl Default for ReceiptEncoder {
    fn default() -> Self {
        Self::new(ReceiptOptions::default())
    }
}

/// Render a complete receipt
pub fn encode_receipt(receipt: &Receipt) -> Vec<u8> {
    ReceiptEncoder::new(receipt.options.clone()).encode(&receipt.items)
}
