//! Relevance weights per data category

use super::classifier::{QueryAnalysis, QueryCategory};
use serde::Serialize;
use std::collections::BTreeMap;

/// Weight at or above which a category counts as explicitly requested
pub const HIGH_RELEVANCE: f64 = 0.8;

/// Uniform boost applied when the query is complex
const COMPLEX_BOOST: f64 = 0.2;

/// Named collection in a business-data snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataCategory {
    Summary,
    Recipes,
    Inventory,
    Orders,
    ProductionTasks,
    Suppliers,
    PurchaseOrders,
    InventorySupplierPrices,
    MaterialBatches,
    QualityTests,
    Analysis,
}

impl DataCategory {
    pub const ALL: [DataCategory; 11] = [
        DataCategory::Summary,
        DataCategory::Recipes,
        DataCategory::Inventory,
        DataCategory::Orders,
        DataCategory::ProductionTasks,
        DataCategory::Suppliers,
        DataCategory::PurchaseOrders,
        DataCategory::InventorySupplierPrices,
        DataCategory::MaterialBatches,
        DataCategory::QualityTests,
        DataCategory::Analysis,
    ];

    /// Key of the collection in the snapshot object
    pub fn key(&self) -> &'static str {
        match self {
            DataCategory::Summary => "summary",
            DataCategory::Recipes => "recipes",
            DataCategory::Inventory => "inventory",
            DataCategory::Orders => "orders",
            DataCategory::ProductionTasks => "productionTasks",
            DataCategory::Suppliers => "suppliers",
            DataCategory::PurchaseOrders => "purchaseOrders",
            DataCategory::InventorySupplierPrices => "inventorySupplierPrices",
            DataCategory::MaterialBatches => "materialBatches",
            DataCategory::QualityTests => "qualityTests",
            DataCategory::Analysis => "analysis",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Weight before any query-driven boost
    pub fn baseline(&self) -> f64 {
        match self {
            DataCategory::Summary => 1.0,
            DataCategory::Recipes | DataCategory::Inventory => 0.3,
            _ => 0.2,
        }
    }
}

impl std::fmt::Display for DataCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Data categories backing each query category
fn data_categories(category: QueryCategory) -> &'static [DataCategory] {
    match category {
        QueryCategory::Recipes => &[DataCategory::Recipes],
        QueryCategory::Inventory => &[DataCategory::Inventory, DataCategory::MaterialBatches],
        QueryCategory::Orders => &[DataCategory::Orders],
        QueryCategory::Production => &[DataCategory::ProductionTasks],
        QueryCategory::Suppliers => &[DataCategory::Suppliers],
        QueryCategory::Analytics => &[DataCategory::Analysis],
        QueryCategory::Quality => &[DataCategory::QualityTests],
        QueryCategory::Costs => &[
            DataCategory::InventorySupplierPrices,
            DataCategory::PurchaseOrders,
        ],
    }
}

/// Combinations of query categories that pull in further data
const CROSS_RULES: &[(QueryCategory, QueryCategory, &[DataCategory])] = &[
    (
        QueryCategory::Recipes,
        QueryCategory::Suppliers,
        &[DataCategory::PurchaseOrders, DataCategory::InventorySupplierPrices],
    ),
    (
        QueryCategory::Recipes,
        QueryCategory::Costs,
        &[DataCategory::Inventory, DataCategory::InventorySupplierPrices],
    ),
    (
        QueryCategory::Production,
        QueryCategory::Inventory,
        &[DataCategory::Recipes],
    ),
    (
        QueryCategory::Orders,
        QueryCategory::Production,
        &[DataCategory::Inventory, DataCategory::MaterialBatches],
    ),
];

/// Weight (0-1) of every data category for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RelevanceMap {
    weights: BTreeMap<DataCategory, f64>,
}

impl RelevanceMap {
    pub fn build(analysis: &QueryAnalysis) -> Self {
        let mut weights: BTreeMap<DataCategory, f64> = DataCategory::ALL
            .into_iter()
            .map(|c| (c, c.baseline()))
            .collect();

        for category in &analysis.categories {
            for data in data_categories(*category) {
                weights.insert(*data, 1.0);
            }
        }

        for (a, b, boosted) in CROSS_RULES {
            if analysis.has_category(*a) && analysis.has_category(*b) {
                for data in *boosted {
                    weights.insert(*data, 1.0);
                }
            }
        }

        if analysis.is_complex {
            for weight in weights.values_mut() {
                *weight = f64::min(*weight + COMPLEX_BOOST, 1.0);
            }
        }

        Self { weights }
    }

    /// Weight of a category; unmapped categories fall back to their baseline
    pub fn weight(&self, category: DataCategory) -> f64 {
        self.weights
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.baseline())
    }

    pub fn iter(&self) -> impl Iterator<Item = (DataCategory, f64)> + '_ {
        self.weights.iter().map(|(c, w)| (*c, *w))
    }

    /// Categories at or above the high-relevance threshold
    pub fn highly_relevant(&self) -> Vec<DataCategory> {
        self.iter()
            .filter(|(_, w)| *w >= HIGH_RELEVANCE)
            .map(|(c, _)| c)
            .collect()
    }
}
