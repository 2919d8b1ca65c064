use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ColumnCategory – semantic bucket guessed from a column name
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnCategory {
    Region,
    Temporal,
    Quantity,
    Other,
}

impl ColumnCategory {
    /// Display order of the grouped column selector.
    pub const ALL: [ColumnCategory; 4] = [
        ColumnCategory::Region,
        ColumnCategory::Temporal,
        ColumnCategory::Quantity,
        ColumnCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ColumnCategory::Region => "Region",
            ColumnCategory::Temporal => "Date / time",
            ColumnCategory::Quantity => "Quantity",
            ColumnCategory::Other => "Other",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ColumnCategory::Region => "🏙",
            ColumnCategory::Temporal => "📅",
            ColumnCategory::Quantity => "🔢",
            ColumnCategory::Other => "📄",
        }
    }
}

// Checked in this order; the first list with a hit wins.
const REGION_KEYWORDS: &[&str] = &[
    "城市", "city", "地区", "区域", "地址", "address", "省", "province", "市", "区",
    "district", "所在地", "位置", "location", "region", "country",
];
const TEMPORAL_KEYWORDS: &[&str] = &[
    "日期", "date", "时间", "time", "年", "year", "月", "month", "天", "日", "day",
];
const QUANTITY_KEYWORDS: &[&str] = &[
    "数量", "quantity", "金额", "amount", "价格", "price", "总计", "total", "合计", "sum",
    "个数", "总数", "计数", "量", "count", "number", "库存",
];

const RULES: [(ColumnCategory, &[&str]); 3] = [
    (ColumnCategory::Region, REGION_KEYWORDS),
    (ColumnCategory::Temporal, TEMPORAL_KEYWORDS),
    (ColumnCategory::Quantity, QUANTITY_KEYWORDS),
];

/// Case-insensitive keyword match on the column name.
pub fn classify(column: &str) -> ColumnCategory {
    let lower = column.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(ColumnCategory::Other)
}

/// Every column that is not `Other`, in original order.
pub fn recommend(columns: &[String]) -> Vec<(String, ColumnCategory)> {
    columns
        .iter()
        .map(|c| (c.clone(), classify(c)))
        .filter(|(_, category)| *category != ColumnCategory::Other)
        .collect()
}

/// Columns bucketed by category, in [`ColumnCategory::ALL`] order. Empty
/// buckets are kept so callers can decide whether to show them.
pub fn group_by_category(columns: &[String]) -> Vec<(ColumnCategory, Vec<String>)> {
    ColumnCategory::ALL
        .iter()
        .map(|&category| {
            let members = columns
                .iter()
                .filter(|c| classify(c) == category)
                .cloned()
                .collect();
            (category, members)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify("所在城市"), ColumnCategory::Region);
        assert_eq!(classify("Delivery Address"), ColumnCategory::Region);
        assert_eq!(classify("下单日期"), ColumnCategory::Temporal);
        assert_eq!(classify("CreatedTime"), ColumnCategory::Temporal);
        assert_eq!(classify("库存"), ColumnCategory::Quantity);
        assert_eq!(classify("Total Amount"), ColumnCategory::Quantity);
        assert_eq!(classify("备注"), ColumnCategory::Other);
        assert_eq!(classify("Name"), ColumnCategory::Other);
    }

    #[test]
    fn test_region_beats_temporal_beats_quantity() {
        // "城市日期" hits both region and temporal lists.
        assert_eq!(classify("城市日期"), ColumnCategory::Region);
        // "daily" does not contain "day", so only the quantity list hits.
        assert_eq!(classify("daily count"), ColumnCategory::Quantity);
        assert_eq!(classify("day count"), ColumnCategory::Temporal);
    }

    #[test]
    fn test_recommend_preserves_order() {
        let columns: Vec<String> = ["备注", "金额", "城市", "姓名", "日期"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let recommended = recommend(&columns);
        assert_eq!(
            recommended,
            vec![
                ("金额".to_string(), ColumnCategory::Quantity),
                ("城市".to_string(), ColumnCategory::Region),
                ("日期".to_string(), ColumnCategory::Temporal),
            ]
        );
    }

    #[test]
    fn test_group_by_category() {
        let columns: Vec<String> = ["备注", "金额", "城市"].iter().map(|s| s.to_string()).collect();
        let groups = group_by_category(&columns);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0], (ColumnCategory::Region, vec!["城市".to_string()]));
        assert!(groups[1].1.is_empty());
        assert_eq!(groups[3], (ColumnCategory::Other, vec!["备注".to_string()]));
    }
}
