use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::domain::boq::BoqItem;
use crate::domain::quote::QuoteItem;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemMatch<'a> {
    pub boq_item: &'a BoqItem,
    pub quote_item: &'a QuoteItem,
}

/// Pairing of one quote's items against the BOQ.
///
/// Every input item lands in exactly one place: a match, `unmatched_boq`, or
/// `unmatched_quote`. Matches follow BOQ order; both unmatched lists keep input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchResult<'a> {
    pub matches: Vec<ItemMatch<'a>>,
    pub unmatched_boq: Vec<&'a BoqItem>,
    pub unmatched_quote: Vec<&'a QuoteItem>,
}

impl MatchResult<'_> {
    pub fn is_complete(&self) -> bool {
        self.unmatched_boq.is_empty() && self.unmatched_quote.is_empty()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched_boq.len() + self.unmatched_quote.len()
    }
}

pub trait ItemMatcher: Send + Sync {
    fn match_items<'a>(
        &self,
        boq_items: &'a [BoqItem],
        quote_items: &'a [QuoteItem],
    ) -> MatchResult<'a>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SkuItemMatcher;

impl ItemMatcher for SkuItemMatcher {
    fn match_items<'a>(
        &self,
        boq_items: &'a [BoqItem],
        quote_items: &'a [QuoteItem],
    ) -> MatchResult<'a> {
        match_items(boq_items, quote_items)
    }
}

/// Pairs quote items with BOQ items by SKU, falling back to `boq_line_no` when a
/// quote item carries no SKU.
///
/// A SKU repeated within the BOQ makes every copy after the first unmatchable, and a
/// BOQ item is claimed by at most one quote item (first in input order wins).
pub fn match_items<'a>(boq_items: &'a [BoqItem], quote_items: &'a [QuoteItem]) -> MatchResult<'a> {
    let mut by_sku: HashMap<&str, usize> = HashMap::new();
    let mut by_line: HashMap<u32, usize> = HashMap::new();

    for (index, item) in boq_items.iter().enumerate() {
        match by_sku.entry(item.sku.trim()) {
            Entry::Occupied(_) => continue,
            Entry::Vacant(slot) => {
                slot.insert(index);
            }
        }
        by_line.entry(item.line_no).or_insert(index);
    }

    let mut claimed: Vec<Option<&'a QuoteItem>> = vec![None; boq_items.len()];
    let mut unmatched_quote = Vec::new();

    for quote_item in quote_items {
        let target = match quote_item.sku_key() {
            Some(sku) => by_sku.get(sku).copied(),
            None => quote_item.boq_line_no.and_then(|line| by_line.get(&line).copied()),
        };

        match target {
            Some(index) if claimed[index].is_none() => {
                claimed[index] = Some(quote_item);
            }
            _ => unmatched_quote.push(quote_item),
        }
    }

    let mut result = MatchResult { unmatched_quote, ..MatchResult::default() };
    for (boq_item, quote_item) in boq_items.iter().zip(claimed) {
        match quote_item {
            Some(quote_item) => result.matches.push(ItemMatch { boq_item, quote_item }),
            None => result.unmatched_boq.push(boq_item),
        }
    }

    result
}
